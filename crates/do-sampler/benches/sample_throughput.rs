use criterion::{criterion_group, criterion_main, Criterion};
use do_core::{Column, Frame, IdentifiedEstimand, ObservationalDataset, RngHandle};
use do_sampler::{DoSampler, ExecutionMode, Intervention, SamplerConfig};

fn confounded_dataset(n: usize) -> ObservationalDataset {
    let mut rng = RngHandle::from_seed(42);
    let mut z = Vec::with_capacity(n);
    let mut d = Vec::with_capacity(n);
    let mut y = Vec::with_capacity(n);
    for _ in 0..n {
        let zi = rng.uniform();
        let di = rng.bernoulli(1.0 / (1.0 + (-5.0 * zi).exp()));
        z.push(zi);
        d.push(di);
        y.push(2.0 * zi + di + 0.1 * rng.standard_normal());
    }
    let frame = Frame::new(vec![
        Column::continuous("z", z).unwrap(),
        Column::binary("d", d).unwrap(),
        Column::continuous("y", y).unwrap(),
    ])
    .unwrap();
    ObservationalDataset::new(frame).unwrap()
}

fn bench_sample(c: &mut Criterion) {
    let dataset = confounded_dataset(5000);
    let estimand = IdentifiedEstimand::backdoor(&["d"], &["y"], &["z"]);
    let intervention = Intervention::set("d", 1.0);

    let mut stateless =
        DoSampler::weighting(dataset.clone(), estimand.clone(), SamplerConfig::default()).unwrap();
    c.bench_function("do_sample_stateless", |b| {
        b.iter(|| {
            let _ = stateless.sample(&intervention).unwrap();
        })
    });

    let mut stateful = DoSampler::weighting(dataset, estimand, SamplerConfig::default()).unwrap();
    c.bench_function("do_sample_stateful", |b| {
        b.iter(|| {
            let _ = stateful
                .sample_with_mode(&intervention, ExecutionMode::Stateful)
                .unwrap();
        })
    });
}

criterion_group!(benches, bench_sample);
criterion_main!(benches);
