#![allow(dead_code)]

use do_core::{Column, Frame, IdentifiedEstimand, ObservationalDataset, RngHandle};
use do_sampler::{DoSampler, SamplerConfig, WeightingSampler};

pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// `Z ~ U(0,1)`, `D ~ Bernoulli(sigmoid(5 Z))`, `Y = 2 Z + D + 0.1 noise`.
pub fn confounded_frame(n: usize, seed: u64) -> Frame {
    let mut rng = RngHandle::from_seed(seed);
    let mut z = Vec::with_capacity(n);
    let mut d = Vec::with_capacity(n);
    let mut y = Vec::with_capacity(n);
    for _ in 0..n {
        let zi = rng.uniform();
        let di = rng.bernoulli(sigmoid(5.0 * zi));
        z.push(zi);
        d.push(di);
        y.push(2.0 * zi + di + 0.1 * rng.standard_normal());
    }
    Frame::new(vec![
        Column::continuous("z", z).unwrap(),
        Column::binary("d", d).unwrap(),
        Column::continuous("y", y).unwrap(),
    ])
    .unwrap()
}

/// Same structural equation for `Y`, but `D ~ Bernoulli(0.5)` independent of `Z`.
pub fn unconfounded_frame(n: usize, seed: u64) -> Frame {
    let mut rng = RngHandle::from_seed(seed);
    let mut z = Vec::with_capacity(n);
    let mut d = Vec::with_capacity(n);
    let mut y = Vec::with_capacity(n);
    for _ in 0..n {
        let zi = rng.uniform();
        let di = rng.bernoulli(0.5);
        z.push(zi);
        d.push(di);
        y.push(2.0 * zi + di + 0.1 * rng.standard_normal());
    }
    Frame::new(vec![
        Column::continuous("z", z).unwrap(),
        Column::binary("d", d).unwrap(),
        Column::continuous("y", y).unwrap(),
    ])
    .unwrap()
}

pub fn estimand() -> IdentifiedEstimand {
    IdentifiedEstimand::backdoor(&["d"], &["y"], &["z"])
}

pub fn weighting_sampler(frame: Frame, config: SamplerConfig) -> DoSampler<WeightingSampler> {
    DoSampler::weighting(ObservationalDataset::new(frame).unwrap(), estimand(), config).unwrap()
}

pub fn column_mean(frame: &Frame, name: &str) -> f64 {
    do_sampler::stats::mean(frame.column(name).unwrap().values())
}

pub fn correlation(frame: &Frame, a: &str, b: &str) -> f64 {
    let xs = frame.column(a).unwrap().values();
    let ys = frame.column(b).unwrap().values();
    let mx = do_sampler::stats::mean(xs);
    let my = do_sampler::stats::mean(ys);
    let mut num = 0.0;
    let mut dx2 = 0.0;
    let mut dy2 = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        num += (x - mx) * (y - my);
        dx2 += (x - mx).powi(2);
        dy2 += (y - my).powi(2);
    }
    num / (dx2.sqrt() * dy2.sqrt())
}
