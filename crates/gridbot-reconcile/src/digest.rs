//! Plan digest for cheap no-op detection.

use gridbot_core::GridPlan;
use sha2::{Digest, Sha256};

/// Digest of a plan's canonical fields.
///
/// Two plans that imply the same ladder digest identically, regardless
/// of numeric formatting or reason strings. The digest is stored in
/// `ExecutionState::last_plan_digest` so an unchanged plan on the next
/// tick short-circuits the diff.
#[must_use]
pub fn plan_digest(plan: &GridPlan) -> String {
    let mut hasher = Sha256::new();
    hasher.update(plan.canonical_fields().as_bytes());
    hex::encode(&hasher.finalize()[..16])
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridbot_core::{GridMode, Price, QtySchedule, ResetDirective, Size};
    use rust_decimal_macros::dec;

    fn plan() -> GridPlan {
        GridPlan {
            mode: GridMode::Bilateral,
            center: Price::new(dec!(50000)),
            spacing_bps: dec!(10),
            levels_up: 3,
            levels_down: 3,
            qty: QtySchedule::Uniform(Size::new(dec!(0.1))),
            reset: ResetDirective::None,
            reason: String::new(),
        }
    }

    #[test]
    fn test_digest_stable_across_formatting() {
        let a = plan();
        let mut b = plan();
        b.center = Price::new(dec!(50000.0));
        b.reason = "anything".to_string();
        assert_eq!(plan_digest(&a), plan_digest(&b));
    }

    #[test]
    fn test_digest_changes_with_ladder() {
        let a = plan();
        let mut b = plan();
        b.levels_up = 4;
        assert_ne!(plan_digest(&a), plan_digest(&b));

        let mut c = plan();
        c.spacing_bps = dec!(20);
        assert_ne!(plan_digest(&a), plan_digest(&c));
    }

    #[test]
    fn test_digest_is_fixed_length_hex() {
        let d = plan_digest(&plan());
        assert_eq!(d.len(), 32);
        assert!(d.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
