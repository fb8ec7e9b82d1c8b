//! The stage table: the fixed, ordered lifecycle of a case

use crate::error::TypesError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A named, ordered step in a case's lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Intake,
    Triage,
    Plan,
    PlanReview,
    Execute,
    FixReview,
    PolicyReview,
    ChangeReview,
    PromoteBeta,
    Close,
}

impl Stage {
    /// Every stage, in processing order
    pub const ALL: [Stage; 10] = [
        Stage::Intake,
        Stage::Triage,
        Stage::Plan,
        Stage::PlanReview,
        Stage::Execute,
        Stage::FixReview,
        Stage::PolicyReview,
        Stage::ChangeReview,
        Stage::PromoteBeta,
        Stage::Close,
    ];

    /// The stage a case enters first
    pub const FIRST: Stage = Stage::Intake;

    /// The stage after this one, or `None` for [`Stage::Close`]
    pub fn successor(self) -> Option<Stage> {
        match self {
            Stage::Intake => Some(Stage::Triage),
            Stage::Triage => Some(Stage::Plan),
            Stage::Plan => Some(Stage::PlanReview),
            Stage::PlanReview => Some(Stage::Execute),
            Stage::Execute => Some(Stage::FixReview),
            Stage::FixReview => Some(Stage::PolicyReview),
            Stage::PolicyReview => Some(Stage::ChangeReview),
            Stage::ChangeReview => Some(Stage::PromoteBeta),
            Stage::PromoteBeta => Some(Stage::Close),
            Stage::Close => None,
        }
    }

    /// Review stages are the only stages eligible for risk gating
    pub fn is_review(self) -> bool {
        matches!(
            self,
            Stage::PlanReview | Stage::FixReview | Stage::PolicyReview | Stage::ChangeReview
        )
    }

    /// Zero-based position in [`Stage::ALL`]
    pub fn position(self) -> usize {
        self as usize
    }

    pub fn is_last(self) -> bool {
        self.successor().is_none()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Intake => "intake",
            Stage::Triage => "triage",
            Stage::Plan => "plan",
            Stage::PlanReview => "plan_review",
            Stage::Execute => "execute",
            Stage::FixReview => "fix_review",
            Stage::PolicyReview => "policy_review",
            Stage::ChangeReview => "change_review",
            Stage::PromoteBeta => "promote_beta",
            Stage::Close => "close",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stage::ALL
            .into_iter()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| TypesError::UnknownStage(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn successor_walks_the_table_in_order() {
        for pair in Stage::ALL.windows(2) {
            assert_eq!(pair[0].successor(), Some(pair[1]));
        }
        assert_eq!(Stage::Close.successor(), None);
        assert!(Stage::Close.is_last());
    }

    #[test]
    fn position_matches_table_index() {
        for (i, stage) in Stage::ALL.iter().enumerate() {
            assert_eq!(stage.position(), i);
        }
    }

    #[test]
    fn exactly_four_review_stages() {
        let reviews: Vec<_> = Stage::ALL.into_iter().filter(|s| s.is_review()).collect();
        assert_eq!(
            reviews,
            vec![
                Stage::PlanReview,
                Stage::FixReview,
                Stage::PolicyReview,
                Stage::ChangeReview
            ]
        );
    }

    #[test]
    fn string_form_matches_serde() {
        for stage in Stage::ALL {
            let json = serde_json::to_string(&stage).unwrap();
            assert_eq!(json, format!("\"{}\"", stage.as_str()));
            assert_eq!(stage.as_str().parse::<Stage>().unwrap(), stage);
        }
    }

    #[test]
    fn unknown_stage_rejected() {
        assert_eq!(
            "deploy".parse::<Stage>(),
            Err(TypesError::UnknownStage("deploy".into()))
        );
    }

    fn any_stage() -> impl Strategy<Value = Stage> {
        (0..Stage::ALL.len()).prop_map(|i| Stage::ALL[i])
    }

    proptest! {
        #[test]
        fn successor_is_next_position(stage in any_stage()) {
            match stage.successor() {
                Some(next) => prop_assert_eq!(next.position(), stage.position() + 1),
                None => prop_assert!(stage.is_last()),
            }
        }

        #[test]
        fn successor_is_injective(a in any_stage(), b in any_stage()) {
            if a != b {
                if let (Some(x), Some(y)) = (a.successor(), b.successor()) {
                    prop_assert_ne!(x, y);
                }
            }
        }
    }
}
