use serde::{Deserialize, Serialize};

/// How many passes to record per candidate.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AcquisitionPolicy {
    /// Try every product of every day in the search window.
    #[default]
    EveryProduct,
    /// Stop searching a candidate once one pass has been recorded for it.
    FirstPerCandidate,
}

impl AcquisitionPolicy {
    /// Whether to try another product after `recorded` passes for the current candidate.
    pub fn should_continue(&self, recorded: usize) -> bool {
        match self {
            AcquisitionPolicy::EveryProduct => true,
            AcquisitionPolicy::FirstPerCandidate => recorded == 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_product_never_stops() {
        assert!(AcquisitionPolicy::EveryProduct.should_continue(0));
        assert!(AcquisitionPolicy::EveryProduct.should_continue(5));
    }

    #[test]
    fn first_per_candidate_stops_after_one() {
        assert!(AcquisitionPolicy::FirstPerCandidate.should_continue(0));
        assert!(!AcquisitionPolicy::FirstPerCandidate.should_continue(1));
    }

    #[test]
    fn parses_snake_case() {
        let p: AcquisitionPolicy = serde_yaml::from_str("first_per_candidate").unwrap();
        assert_eq!(p, AcquisitionPolicy::FirstPerCandidate);
        assert_eq!(p.to_string(), "first_per_candidate");
    }
}
