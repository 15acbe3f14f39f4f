//! Deduplication of extracted endpoint and baseline candidates.
//!
//! Free-text extraction produces one candidate per regex hit, so the same
//! measure is usually found several times. Candidates are grouped by
//! `(name, arm)` and the most complete entry of each group is kept.

use std::collections::HashMap;

use trialscope_common::record::{Arm, BaselineMeasure, Endpoint};

/// Something that can be collapsed by [`dedup_candidates`].
pub trait Candidate {
    fn dedup_key(&self) -> (&str, Arm);

    /// Number of populated fields. Higher wins.
    fn completeness(&self) -> usize;
}

impl Candidate for Endpoint {
    fn dedup_key(&self) -> (&str, Arm) {
        (&self.name, self.arm)
    }

    fn completeness(&self) -> usize {
        let strings = [
            &self.name,
            &self.description,
            &self.timepoint,
            &self.statistical_significance,
        ];
        let optional_strings = [&self.canonical_name, &self.source, &self.context];
        let numbers = [self.average_value, self.upper_end, self.lower_end];

        1 + strings.iter().filter(|s| !s.is_empty()).count()
            + optional_strings.iter().filter(|s| s.is_some()).count()
            + numbers.iter().filter(|n| n.is_some()).count()
            + usize::from(self.tier.is_some())
    }
}

impl Candidate for BaselineMeasure {
    fn dedup_key(&self) -> (&str, Arm) {
        (&self.name, self.arm)
    }

    fn completeness(&self) -> usize {
        let optional_strings = [&self.canonical_name, &self.source, &self.context];
        let numbers = [self.average_value, self.upper_end, self.lower_end];

        1 + usize::from(!self.name.is_empty())
            + usize::from(!self.description.is_empty())
            + optional_strings.iter().filter(|s| s.is_some()).count()
            + numbers.iter().filter(|n| n.is_some()).count()
            + usize::from(self.tier.is_some())
    }
}

/// Keep the most complete candidate per `(name, arm)`.
///
/// Ties go to the candidate seen first. Groups are emitted in the order their
/// first member appeared, so running the function twice changes nothing.
pub fn dedup_candidates<T: Candidate>(candidates: Vec<T>) -> Vec<T> {
    let mut winners: Vec<T> = Vec::new();
    let mut index: HashMap<(String, Arm), usize> = HashMap::new();

    for candidate in candidates {
        let (name, arm) = candidate.dedup_key();
        let key = (name.to_string(), arm);
        match index.get(&key) {
            Some(&i) => {
                if candidate.completeness() > winners[i].completeness() {
                    winners[i] = candidate;
                }
            }
            None => {
                index.insert(key, winners.len());
                winners.push(candidate);
            }
        }
    }

    winners
}

#[cfg(test)]
mod tests {
    use super::*;
    use trialscope_common::record::{Tier, NOT_SPECIFIED};

    fn endpoint(name: &str, arm: Arm, value: Option<f64>, significance: &str) -> Endpoint {
        Endpoint {
            name: name.to_string(),
            canonical_name: None,
            description: String::new(),
            timepoint: NOT_SPECIFIED.to_string(),
            arm,
            average_value: value,
            upper_end: None,
            lower_end: None,
            statistical_significance: significance.to_string(),
            source: None,
            context: None,
            tier: Some(Tier::FreeText),
        }
    }

    #[test]
    fn test_most_complete_entry_wins() {
        let input = vec![
            endpoint("PVR", Arm::Intervention, None, ""),
            endpoint("PVR", Arm::Intervention, Some(36.8), "p=0.0001"),
            endpoint("PVR", Arm::Placebo, Some(8.2), ""),
        ];
        let out = dedup_candidates(input);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].arm, Arm::Intervention);
        assert_eq!(out[0].average_value, Some(36.8));
        assert_eq!(out[1].arm, Arm::Placebo);
    }

    #[test]
    fn test_ties_keep_first_seen() {
        let input = vec![
            endpoint("6MWD", Arm::Intervention, Some(22.0), "p=0.008"),
            endpoint("6MWD", Arm::Intervention, Some(30.0), "p=0.001"),
        ];
        let out = dedup_candidates(input);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].average_value, Some(22.0));
    }

    #[test]
    fn test_dedup_is_idempotent() {
        let input = vec![
            endpoint("PVR", Arm::Placebo, Some(1.0), ""),
            endpoint("6MWD", Arm::Intervention, None, ""),
            endpoint("PVR", Arm::Placebo, Some(2.0), "p=0.01"),
            endpoint("6MWD", Arm::Intervention, Some(3.0), ""),
            endpoint("Endpoint", Arm::NotSpecified, Some(4.0), NOT_SPECIFIED),
        ];
        let once = dedup_candidates(input);
        let twice = dedup_candidates(once.clone());
        assert_eq!(once, twice);
        assert_eq!(once.len(), 3);
        assert_eq!(once[0].name, "PVR");
        assert_eq!(once[0].average_value, Some(2.0));
    }

    #[test]
    fn test_empty_input() {
        assert!(dedup_candidates::<Endpoint>(Vec::new()).is_empty());
    }
}
