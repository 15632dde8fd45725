mod common;

use do_sampler::{Intervention, SamplerConfig};

use common::{confounded_frame, correlation, weighting_sampler};

fn keep_config() -> SamplerConfig {
    let mut config = SamplerConfig::default();
    config.keep_original_treatment = true;
    config
}

#[test]
fn kept_treatment_is_decorrelated_from_confounder() {
    let frame = confounded_frame(5000, 21);
    let observed = correlation(&frame, "d", "z");
    assert!(observed > 0.2, "observed correlation {observed}");

    let mut sampler = weighting_sampler(frame, keep_config());
    let draw = sampler.sample(&Intervention::keep()).unwrap();
    assert_eq!(draw.n_rows(), 5000);
    let reweighted = correlation(&draw, "d", "z");
    assert!(
        reweighted.abs() < observed / 2.0,
        "reweighted {reweighted}, observed {observed}"
    );
}

#[test]
fn vector_intervention_is_accepted_when_keeping_treatment() {
    let mut sampler = weighting_sampler(confounded_frame(100, 22), keep_config());
    let draw = sampler
        .sample(&Intervention::per_row("d", vec![1.0; 100]))
        .unwrap();
    assert_eq!(draw.n_rows(), 100);
}

#[test]
fn scalar_intervention_does_not_filter_when_keeping_treatment() {
    let frame = confounded_frame(100, 23);
    let mut sampler = weighting_sampler(frame, keep_config());
    let draw = sampler.sample(&Intervention::set("d", 1.0)).unwrap();
    assert_eq!(draw.n_rows(), 100);
}
