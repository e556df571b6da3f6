//! Property tests for configuration serialization and split validation

#[cfg(test)]
mod tests {
    use crate::config::schema::*;
    use crate::config::validate::{validate_config, validate_split};
    use proptest::prelude::*;

    fn arb_activation() -> impl Strategy<Value = Activation> {
        prop_oneof![
            Just(Activation::Relu),
            Just(Activation::Sigmoid),
            Just(Activation::Tanh)
        ]
    }

    fn arb_metric() -> impl Strategy<Value = SelectionMetric> {
        prop_oneof![
            Just(SelectionMetric::Rmse),
            Just(SelectionMetric::Mae),
            Just(SelectionMetric::MedAe),
            Just(SelectionMetric::R2)
        ]
    }

    fn arb_split() -> impl Strategy<Value = [f64; 3]> {
        (1u32..90, 0u32..90).prop_filter_map("fractions must fit", |(l, v)| {
            if l + v >= 100 || l + v == 0 {
                return None;
            }
            let t = 100 - l - v;
            if t >= 100 {
                return None;
            }
            Some([l as f64 / 100.0, v as f64 / 100.0, t as f64 / 100.0])
        })
    }

    fn arb_config() -> impl Strategy<Value = Config> {
        (
            1usize..5000,
            proptest::collection::vec(1usize..256, 0..4),
            arb_activation(),
            1e-6f32..1.0,
            1usize..512,
            proptest::option::of(1usize..100),
            any::<u64>(),
            1usize..32,
            arb_split(),
            (any::<bool>(), any::<bool>(), any::<bool>()),
            arb_metric(),
        )
            .prop_map(
                |(
                    epochs,
                    hidden_layers,
                    activation,
                    learning_rate,
                    batch_size,
                    patience,
                    seed,
                    process_count,
                    split,
                    (random, normalize, transform),
                    selection_metric,
                )| Config {
                    epochs,
                    hidden_layers,
                    activation,
                    learning_rate,
                    optimizer: OptimizerKind::Adam,
                    batch_size,
                    patience,
                    seed,
                    process_count,
                    split,
                    random,
                    normalize,
                    transform,
                    transform_components: None,
                    selection_metric,
                    extra: Default::default(),
                },
            )
    }

    proptest! {
        #[test]
        fn prop_config_yaml_round_trip(config in arb_config()) {
            let yaml = serde_yaml::to_string(&config).unwrap();
            let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
            prop_assert_eq!(parsed.epochs, config.epochs);
            prop_assert_eq!(&parsed.hidden_layers, &config.hidden_layers);
            prop_assert_eq!(parsed.activation, config.activation);
            prop_assert_eq!(parsed.batch_size, config.batch_size);
            prop_assert_eq!(parsed.patience, config.patience);
            prop_assert_eq!(parsed.seed, config.seed);
            prop_assert_eq!(parsed.selection_metric, config.selection_metric);
        }

        #[test]
        fn prop_generated_configs_validate(config in arb_config()) {
            prop_assert!(validate_config(&config).is_ok());
        }

        #[test]
        fn prop_split_scaled_away_from_one_rejected(split in arb_split(), factor in 1.01f64..2.0) {
            let scaled = [split[0] * factor, split[1] * factor, split[2] * factor];
            prop_assert!(validate_split(scaled).is_err());
        }
    }
}
