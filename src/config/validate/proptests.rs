//! Property-based tests for configuration validation

use super::validator::validate_config;
use crate::config::schema::*;
use proptest::prelude::*;

fn arb_valid_config() -> impl Strategy<Value = LeoConfig> {
    (
        1e-6f32..1.0,    // outer_loop_lr
        0.0f32..2.0,     // inner_loop_lr
        1e-6f32..1.0,    // finetuning_lr
        0usize..10,      // num_adaptation_steps
        1usize..10,      // num_finetuning_steps
        0.0f32..0.99,    // dropout_rate
        -1i64..1000,     // episode
    )
        .prop_map(
            |(outer, inner, finetune, adapt, steps, dropout, episode)| LeoConfig {
                hyperparameters: Hyperparameters {
                    outer_loop_lr: outer,
                    inner_loop_lr: inner,
                    finetuning_lr: finetune,
                    num_adaptation_steps: adapt,
                    num_finetuning_steps: steps,
                    dropout_rate: dropout,
                    ..Default::default()
                },
                experiment: ExperimentSpec {
                    episode,
                    ..Default::default()
                },
                ..Default::default()
            },
        )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_valid_config_passes(config in arb_valid_config()) {
        prop_assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn prop_out_of_range_dropout_fails(
        config in arb_valid_config(),
        dropout in 1.0f32..10.0
    ) {
        let mut config = config;
        config.hyperparameters.dropout_rate = dropout;
        prop_assert!(validate_config(&config).is_err());
    }

    #[test]
    fn prop_yaml_round_trip_stays_valid(config in arb_valid_config()) {
        let yaml = serde_yaml::to_string(&config).unwrap();
        let back: LeoConfig = serde_yaml::from_str(&yaml).unwrap();
        prop_assert!(validate_config(&back).is_ok());
    }
}
