//! Pull scalar values out of an instant query result by label matching

use crate::prometheus::{QueryResponse, Sample};
use std::fmt;
use thiserror::Error;

/// Sector state of sectors queued in the commit aggregate batch.
pub const SECTOR_STATUS_WAITING: &str = "SCA";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ExtractError {
    #[error("No series matching {filter}")]
    NoMatchingSeries { filter: String },

    #[error("Series value '{value}' is not a non-negative integer")]
    InvalidValue { value: String },
}

/// Equality matchers over series labels; all must hold.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelFilter {
    matchers: Vec<(String, String)>,
}

impl LabelFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, label: impl Into<String>, value: impl Into<String>) -> Self {
        self.matchers.push((label.into(), value.into()));
        self
    }

    pub fn matches(&self, sample: &Sample) -> bool {
        self.matchers
            .iter()
            .all(|(label, value)| sample.metric.get(label) == Some(value))
    }
}

impl fmt::Display for LabelFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (label, value)) in self.matchers.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}=\"{}\"", label, value)?;
        }
        f.write_str("}")
    }
}

/// Value of the first series matching `filter`.
pub fn extract_scalar(samples: &[Sample], filter: &LabelFilter) -> Result<u64, ExtractError> {
    let sample = samples
        .iter()
        .find(|s| filter.matches(s))
        .ok_or_else(|| ExtractError::NoMatchingSeries {
            filter: filter.to_string(),
        })?;

    parse_integer(&sample.value.1)
}

/// Gauges are exported as floats; accept "12" and "12.0" but not "12.5".
fn parse_integer(raw: &str) -> Result<u64, ExtractError> {
    let invalid = || ExtractError::InvalidValue {
        value: raw.to_string(),
    };

    if let Ok(value) = raw.parse::<u64>() {
        return Ok(value);
    }

    let float: f64 = raw.parse().map_err(|_| invalid())?;
    // `u64::MAX as f64` rounds up to 2^64, which is already out of range
    if float.is_finite() && float >= 0.0 && float.fract() == 0.0 && float < u64::MAX as f64 {
        Ok(float as u64)
    } else {
        Err(invalid())
    }
}

/// Current base fee reported by the given Lotus daemon instance.
pub fn base_fee(response: &QueryResponse, lotus_instance: &str) -> Result<u64, ExtractError> {
    let filter = LabelFilter::new().with("instance", lotus_instance);
    extract_scalar(response.samples(), &filter)
}

/// Number of sectors of `miner_id` waiting to be batch committed.
pub fn pending_commits(response: &QueryResponse, miner_id: &str) -> Result<u64, ExtractError> {
    let filter = LabelFilter::new()
        .with("miner", miner_id)
        .with("status", SECTOR_STATUS_WAITING);
    extract_scalar(response.samples(), &filter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prometheus::parse_response;

    fn sample(labels: &[(&str, &str)], value: &str) -> Sample {
        Sample {
            metric: labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            value: (1717171717.0, value.to_string()),
        }
    }

    #[test]
    fn test_filter_requires_every_label() {
        let filter = LabelFilter::new().with("miner", "f01").with("status", "SCA");

        assert!(filter.matches(&sample(&[("miner", "f01"), ("status", "SCA")], "1")));
        assert!(!filter.matches(&sample(&[("miner", "f01"), ("status", "PC1")], "1")));
        assert!(!filter.matches(&sample(&[("miner", "f01")], "1")));
    }

    #[test]
    fn test_empty_filter_matches_anything() {
        assert!(LabelFilter::new().matches(&sample(&[], "1")));
    }

    #[test]
    fn test_first_match_wins() {
        let samples = vec![
            sample(&[("instance", "a")], "1"),
            sample(&[("instance", "b")], "2"),
            sample(&[("instance", "b")], "3"),
        ];
        let filter = LabelFilter::new().with("instance", "b");
        assert_eq!(extract_scalar(&samples, &filter), Ok(2));
    }

    #[test]
    fn test_no_match_reports_filter() {
        let filter = LabelFilter::new().with("instance", "missing");
        let err = extract_scalar(&[], &filter).unwrap_err();
        assert_eq!(
            err,
            ExtractError::NoMatchingSeries {
                filter: "{instance=\"missing\"}".to_string()
            }
        );
    }

    #[test]
    fn test_integral_float_values_accepted() {
        let filter = LabelFilter::new();
        assert_eq!(extract_scalar(&[sample(&[], "42.0")], &filter), Ok(42));
        assert_eq!(extract_scalar(&[sample(&[], "1e3")], &filter), Ok(1000));
    }

    #[test]
    fn test_fractional_and_special_values_rejected() {
        let filter = LabelFilter::new();
        for raw in ["12.5", "-1", "NaN", "+Inf", "abc"] {
            assert_eq!(
                extract_scalar(&[sample(&[], raw)], &filter),
                Err(ExtractError::InvalidValue {
                    value: raw.to_string()
                }),
                "value {raw}"
            );
        }
    }

    #[test]
    fn test_values_beyond_u64_rejected() {
        let filter = LabelFilter::new();
        for raw in ["18446744073709551616", "1.8446744073709552e19", "1e20"] {
            assert_eq!(
                extract_scalar(&[sample(&[], raw)], &filter),
                Err(ExtractError::InvalidValue {
                    value: raw.to_string()
                }),
                "value {raw}"
            );
        }
        assert_eq!(
            extract_scalar(&[sample(&[], "18446744073709551615")], &filter),
            Ok(u64::MAX)
        );
    }

    #[test]
    fn test_base_fee_and_pending_commits() {
        let basefee = parse_response(
            r#"{"status":"success","data":{"resultType":"vector","result":[
                {"metric":{"instance":"other:1234"},"value":[1,"999"]},
                {"metric":{"instance":"lotus:1234"},"value":[1,"150"]}
            ]}}"#,
        )
        .unwrap();
        assert_eq!(base_fee(&basefee, "lotus:1234"), Ok(150));

        let sectors = parse_response(
            r#"{"status":"success","data":{"resultType":"vector","result":[
                {"metric":{"miner":"f01234","status":"PC1"},"value":[1,"3"]},
                {"metric":{"miner":"f09999","status":"SCA"},"value":[1,"40"]},
                {"metric":{"miner":"f01234","status":"SCA"},"value":[1,"11"]}
            ]}}"#,
        )
        .unwrap();
        assert_eq!(pending_commits(&sectors, "f01234"), Ok(11));
        assert!(pending_commits(&sectors, "f05555").is_err());
    }
}
