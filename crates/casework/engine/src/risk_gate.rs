//! Risk gate evaluator
//!
//! Decides whether entering a stage needs human sign-off. Only review
//! stages can be gated, and only by flags in [`NEVER_AUTO_PASS`].

use casework_types::{RiskFlag, Stage};
use std::collections::BTreeSet;

/// Risk flags that can never pass a review stage automatically
pub const NEVER_AUTO_PASS: [&str; 4] = ["auth", "billing", "security", "rls"];

/// Membership test against the fixed review-stage set
pub fn is_review_stage(stage: Stage) -> bool {
    stage.is_review()
}

pub fn is_sensitive(flag: &RiskFlag) -> bool {
    NEVER_AUTO_PASS.contains(&flag.as_str())
}

/// The flags on a case that force a gate, in sorted order
pub fn sensitive_flags(flags: &BTreeSet<RiskFlag>) -> Vec<&RiskFlag> {
    flags.iter().filter(|f| is_sensitive(f)).collect()
}

/// True iff `next_stage` is a review stage and `flags` contains any
/// never-auto-pass flag
pub fn requires_human_gate(next_stage: Stage, flags: &BTreeSet<RiskFlag>) -> bool {
    is_review_stage(next_stage) && flags.iter().any(is_sensitive)
}
