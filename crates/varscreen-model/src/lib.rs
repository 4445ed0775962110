//! Shared data model for the survey screening pipeline.

pub mod encoding;
pub mod error;
pub mod options;
pub mod value;
pub mod variable;

pub use encoding::{EncodingCatalog, EncodingDescriptor, indicator_name};
pub use error::{ModelError, Result};
pub use options::{ClassifierOptions, EncodingOptions, OrdinalImputation};
pub use value::{
    BranchingPolicy, RawValue, SentinelKind, SentinelSet, compare_keys, format_numeric,
    is_missing_token,
};
pub use variable::{ClassificationResult, ValueRange, VariableRecord, VariableType};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variable_type_round_trips_through_str() {
        for var_type in [
            VariableType::Binary,
            VariableType::Ordinal,
            VariableType::Categorical,
            VariableType::Continuous,
            VariableType::LowVariance,
            VariableType::Unknown,
            VariableType::Excluded,
        ] {
            let parsed: VariableType = var_type.as_str().parse().expect("parse type");
            assert_eq!(parsed, var_type);
        }
        assert!("text".parse::<VariableType>().is_err());
    }

    #[test]
    fn descriptor_serializes_with_kind_tag() {
        let descriptor = EncodingDescriptor::Continuous {
            mean: 10.0,
            std_dev: 2.0,
        };
        let json = serde_json::to_value(&descriptor).expect("serialize descriptor");
        assert_eq!(json["kind"], "continuous");
        let round: EncodingDescriptor = serde_json::from_value(json).expect("deserialize");
        assert_eq!(round, descriptor);
    }
}
