mod common;

use do_sampler::stats::{mean_contrast, Quantiles};
use do_sampler::{ExecutionMode, Intervention, SamplerConfig};

use common::{column_mean, confounded_frame, weighting_sampler};

#[test]
fn weighting_shrinks_confounding_bias() {
    let frame = confounded_frame(5000, 2024);
    let naive = mean_contrast(&frame, "y", "d", 1.0, 0.0).unwrap();
    assert!(naive > 1.35, "naive contrast {naive}");

    let mut sampler = weighting_sampler(frame, SamplerConfig::default());
    let mut contrasts = Vec::new();
    for _ in 0..5 {
        let treated = sampler.sample(&Intervention::set("d", 1.0)).unwrap();
        let control = sampler.sample(&Intervention::set("d", 0.0)).unwrap();
        contrasts.push(column_mean(&treated, "y") - column_mean(&control, "y"));
    }
    let weighted = contrasts.iter().sum::<f64>() / contrasts.len() as f64;

    assert!((weighted - 1.0).abs() < 0.25, "weighted contrast {weighted}");
    assert!(
        (weighted - 1.0).abs() < (naive - 1.0).abs(),
        "weighted {weighted} vs naive {naive}"
    );
}

#[test]
fn sampled_control_group_matches_population_covariates() {
    let frame = confounded_frame(5000, 77);
    let population_z = column_mean(&frame, "z");
    let mut sampler = weighting_sampler(frame.clone(), SamplerConfig::default());
    let control = sampler.sample(&Intervention::set("d", 0.0)).unwrap();

    let observed_control = frame.filter_rows(|row| frame.value("d", row).unwrap() == 0.0);
    let observed_z = column_mean(&observed_control, "z");
    let reweighted_z = column_mean(&control, "z");
    assert!(
        (reweighted_z - population_z).abs() < (observed_z - population_z).abs(),
        "reweighted {reweighted_z}, observed {observed_z}, population {population_z}"
    );
    assert!(control
        .column("d")
        .unwrap()
        .values()
        .iter()
        .all(|&d| d == 0.0));
}

#[test]
fn sampling_distribution_summarises_repeated_draws() {
    let mut config = SamplerConfig::default();
    config.mode = ExecutionMode::Stateful;
    let mut sampler = weighting_sampler(confounded_frame(2000, 5), config);
    let means = sampler
        .sampling_distribution(&Intervention::set("d", 1.0), 25, |frame| {
            Ok(column_mean(frame, "y"))
        })
        .unwrap();
    assert_eq!(means.len(), 25);
    assert_eq!(sampler.disruption_runs(), 1);
    let q = Quantiles::from_values(&means);
    assert!(q.q05 <= q.q50 && q.q50 <= q.q95);
    assert!(q.q95 - q.q05 > 0.0);
}
