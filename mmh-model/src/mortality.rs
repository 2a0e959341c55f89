//! Per-cycle survival draws.
use rand::Rng;

use crate::patient::Patient;
use crate::treatment::TreatmentPlan;

/// Per-cycle death probability that compounds to `probability` over
/// `remaining` independent cycles. With no cycles left the full probability
/// applies at once.
#[must_use]
pub fn cycle_hazard(probability: f64, remaining: u32) -> f64 {
    if remaining == 0 {
        return probability;
    }
    1.0 - (1.0 - probability).powf(1.0 / f64::from(remaining))
}

/// Death threshold for the patient this cycle, spread over the remaining
/// length of their active plan.
#[must_use]
pub fn cycle_threshold(patient: &Patient) -> f64 {
    let remaining = patient
        .stage()
        .plan()
        .map_or(0, TreatmentPlan::remaining_length);
    cycle_hazard(patient.probability_of_mortality(), remaining)
}

/// Whether a uniform variate in `[0, 1)` falls strictly below the threshold.
#[must_use]
pub const fn is_fatal(variate: f64, threshold: f64) -> bool {
    variate < threshold
}

/// Draw this cycle's survival outcome. Returns `true` when the patient dies.
pub fn draw_death<R: Rng + ?Sized>(patient: &Patient, rng: &mut R) -> bool {
    let threshold = cycle_threshold(patient);
    let variate: f64 = rng.r#gen();
    is_fatal(variate, threshold)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{Condition, ConditionKind};
    use crate::patient::PatientId;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn four_cycles_at_even_odds() {
        let hazard = cycle_hazard(0.5, 4);
        assert!((hazard - (1.0 - 0.5_f64.powf(0.25))).abs() < 1e-12);
        assert!((hazard - 0.1591).abs() < 1e-4);
        assert!(is_fatal(0.15, hazard));
        assert!(!is_fatal(0.16, hazard));
    }

    #[test]
    fn hazard_compounds_back_to_probability() {
        for (p, n) in [(0.3, 7), (0.05, 96), (0.9, 2)] {
            let hazard = cycle_hazard(p, n);
            let compounded = 1.0 - (1.0 - hazard).powi(i32::try_from(n).unwrap());
            assert!((compounded - p).abs() < 1e-9);
        }
    }

    #[test]
    fn zero_remaining_uses_the_full_probability() {
        assert!((cycle_hazard(0.37, 0) - 0.37).abs() < f64::EPSILON);
        let patient = Patient::new(PatientId(1), 20, [Condition::new(ConditionKind::Sepsis, 0.37, 1.0)]);
        assert!((cycle_threshold(&patient) - 0.37).abs() < 1e-12);
    }

    #[test]
    fn boundary_comparison_is_strict() {
        assert!(!is_fatal(0.0, 0.0));
        assert!(!is_fatal(0.25, 0.25));
        assert!(is_fatal(0.0, 1e-12));
    }

    #[test]
    fn healthy_patients_never_die() {
        let patient = Patient::new(PatientId(2), 20, std::iter::empty());
        let mut rng = ChaCha20Rng::seed_from_u64(11);
        assert!((0..1_000).all(|_| !draw_death(&patient, &mut rng)));
    }
}
