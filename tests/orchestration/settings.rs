//! Settings persistence and defaults.

use decayfit::{FitSettings, LmConfig};

#[test]
fn test_settings_round_trip() {
    let settings = FitSettings::default()
        .with_simd(false)
        .with_max_iterations(250)
        .with_parallel_threshold(64)
        .with_lm(LmConfig::default().with_lambda(1e-2).with_ftol(1e-8));

    let json = serde_json::to_string(&settings).unwrap();
    let restored: FitSettings = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, settings);
    assert_eq!(restored.solver_config().max_iterations, 250);
    assert_eq!(restored.solver_config().initial_lambda, 1e-2);
}

#[test]
fn test_missing_fields_take_defaults() {
    let settings: FitSettings =
        serde_json::from_str(r#"{ "use_simd": false, "lm": { "xtol": 1e-6 } }"#).unwrap();

    assert!(!settings.use_simd);
    assert_eq!(settings.max_iterations, 100);
    assert_eq!(settings.parallel_threshold, 16);
    assert_eq!(settings.lm.xtol, 1e-6);
    assert_eq!(settings.lm.ftol, LmConfig::default().ftol);
    assert_eq!(settings.lm.lambda_up_factor, 10.0);
}

#[test]
fn test_iteration_cap_overrides_lm_config() {
    let settings = FitSettings::default()
        .with_lm(LmConfig::default().with_max_iterations(5))
        .with_max_iterations(40);
    assert_eq!(settings.solver_config().max_iterations, 40);
}
