use do_core::ErrorKind;
use do_sampler::{ExecutionMode, ResampleSize, SamplerConfig};

#[test]
fn yaml_overrides_merge_with_defaults() {
    let yaml = r#"
keep_original_treatment: true
mode: stateful
propensity:
  epsilon: 0.001
resample_size:
  type: fixed
  rows: 250
seed_policy:
  master_seed: 42
  label: demo
"#;
    let config = SamplerConfig::from_yaml_str(yaml).unwrap();
    assert!(config.keep_original_treatment);
    assert_eq!(config.mode, ExecutionMode::Stateful);
    assert_eq!(config.propensity.epsilon, 0.001);
    assert_eq!(config.propensity.max_iterations, 100);
    assert_eq!(config.resample_size, ResampleSize::Fixed { rows: 250 });
    assert_eq!(config.seed_policy.master_seed, 42);
    assert_eq!(config.seed_policy.label.as_deref(), Some("demo"));
    assert!(!config.proceed_when_unidentifiable);
}

#[test]
fn empty_document_is_default() {
    let config = SamplerConfig::from_yaml_str("{}").unwrap();
    assert_eq!(config, SamplerConfig::default());
    assert_eq!(config.resample_size, ResampleSize::Filtered);
}

#[test]
fn invalid_epsilon_is_rejected() {
    let err = SamplerConfig::from_yaml_str("propensity:\n  epsilon: 0.0\n").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Serde);
    assert_eq!(err.info().code, "config-invalid");
}

#[test]
fn config_roundtrips_through_yaml_and_json() {
    let mut config = SamplerConfig::default();
    config.mode = ExecutionMode::Stateful;
    config.resample_size = ResampleSize::Dataset;

    let yaml = config.to_yaml_string().unwrap();
    assert_eq!(SamplerConfig::from_yaml_str(&yaml).unwrap(), config);

    let json = serde_json::to_string(&config).unwrap();
    let restored: SamplerConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, config);
}
