//! Diagnosed conditions and their untreated deterioration.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Closed vocabulary of diagnoses the model understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConditionKind {
    Delivery,
    Preeclampsia,
    Eclampsia,
    Sepsis,
    Pph,
    Anaemia,
    Aph,
    RupturedUterus,
    Abortion,
    Cardiomyopathy,
}

impl ConditionKind {
    pub const ALL: [Self; 10] = [
        Self::Delivery,
        Self::Preeclampsia,
        Self::Eclampsia,
        Self::Sepsis,
        Self::Pph,
        Self::Anaemia,
        Self::Aph,
        Self::RupturedUterus,
        Self::Abortion,
        Self::Cardiomyopathy,
    ];

    /// Identifier used by rule tables and logs.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Delivery => "DELIVERY",
            Self::Preeclampsia => "PREECLAMPSIA",
            Self::Eclampsia => "ECLAMPSIA",
            Self::Sepsis => "SEPSIS",
            Self::Pph => "PPH",
            Self::Anaemia => "ANAEMIA",
            Self::Aph => "APH",
            Self::RupturedUterus => "RUPTURED_UTERUS",
            Self::Abortion => "ABORTION",
            Self::Cardiomyopathy => "CARDIOMYOPATHY",
        }
    }
}

impl fmt::Display for ConditionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Raised when a table references a diagnosis outside the vocabulary.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown condition `{0}`")]
pub struct UnknownCondition(pub String);

impl FromStr for ConditionKind {
    type Err = UnknownCondition;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.key().eq_ignore_ascii_case(token))
            .ok_or_else(|| UnknownCondition(token.to_string()))
    }
}

/// A single diagnosed condition owned by one patient.
///
/// The probability of mortality only changes through
/// [`Condition::set_probability_of_mortality`] or [`Condition::worsen`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    kind: ConditionKind,
    probability_of_mortality: f64,
    /// `r` in `p ^ (r / (age + r))`. Values near zero deteriorate quickly.
    deterioration_rate: f64,
    age_in_cycles: u32,
}

impl Condition {
    #[must_use]
    pub const fn new(kind: ConditionKind, probability_of_mortality: f64, deterioration_rate: f64) -> Self {
        Self {
            kind,
            probability_of_mortality,
            deterioration_rate,
            age_in_cycles: 0,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> ConditionKind {
        self.kind
    }

    #[must_use]
    pub const fn probability_of_mortality(&self) -> f64 {
        self.probability_of_mortality
    }

    #[must_use]
    pub const fn deterioration_rate(&self) -> f64 {
        self.deterioration_rate
    }

    /// Cycles since admission or since the last manual adjustment.
    #[must_use]
    pub const fn age_in_cycles(&self) -> u32 {
        self.age_in_cycles
    }

    /// Assign a new probability of mortality.
    ///
    /// Values outside `(0, 1]` are ignored. Accepted values reset the condition
    /// age so later worsening starts from the new baseline.
    pub fn set_probability_of_mortality(&mut self, probability: f64) {
        if !(probability > 0.0 && probability <= 1.0) {
            return;
        }
        self.probability_of_mortality = probability;
        self.age_in_cycles = 0;
    }

    /// Deteriorate one cycle without treatment.
    pub fn worsen(&mut self) {
        self.age_in_cycles = self.age_in_cycles.saturating_add(1);
        let age = f64::from(self.age_in_cycles);
        let exponent = self.deterioration_rate / (age + self.deterioration_rate);
        self.probability_of_mortality = self.probability_of_mortality.powf(exponent);
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (pom {:.4})", self.kind, self.probability_of_mortality)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_table_identifiers() {
        assert_eq!("SEPSIS".parse::<ConditionKind>(), Ok(ConditionKind::Sepsis));
        assert_eq!(
            " ruptured_uterus ".parse::<ConditionKind>(),
            Ok(ConditionKind::RupturedUterus)
        );
        assert_eq!(
            "FEVER".parse::<ConditionKind>(),
            Err(UnknownCondition("FEVER".to_string()))
        );
    }

    #[test]
    fn worsening_is_monotone_and_approaches_one() {
        for rate in [0.05, 1.0, 25.0] {
            let mut condition = Condition::new(ConditionKind::Pph, 0.2, rate);
            let mut previous = condition.probability_of_mortality();
            for _ in 0..20_000 {
                condition.worsen();
                let current = condition.probability_of_mortality();
                assert!(current >= previous, "rate {rate} decreased severity");
                previous = current;
            }
            assert!(previous > 0.9, "rate {rate} stalled at {previous}");
        }
    }

    #[test]
    fn worsening_follows_power_law() {
        let mut condition = Condition::new(ConditionKind::Sepsis, 0.25, 2.0);
        condition.worsen();
        let expected = 0.25_f64.powf(2.0 / 3.0);
        assert!((condition.probability_of_mortality() - expected).abs() < 1e-12);
        assert_eq!(condition.age_in_cycles(), 1);
    }

    #[test]
    fn certain_death_is_a_fixed_point() {
        let mut condition = Condition::new(ConditionKind::Eclampsia, 1.0, 0.5);
        condition.worsen();
        assert!((condition.probability_of_mortality() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn out_of_range_assignment_is_ignored() {
        let mut condition = Condition::new(ConditionKind::Anaemia, 0.3, 1.0);
        condition.worsen();
        let worsened = condition.probability_of_mortality();
        for bad in [0.0, -0.1, 1.5, f64::NAN] {
            condition.set_probability_of_mortality(bad);
            assert!((condition.probability_of_mortality() - worsened).abs() < f64::EPSILON);
            assert_eq!(condition.age_in_cycles(), 1);
        }

        condition.set_probability_of_mortality(1.0);
        assert!((condition.probability_of_mortality() - 1.0).abs() < f64::EPSILON);
        condition.set_probability_of_mortality(0.1);
        assert!((condition.probability_of_mortality() - 0.1).abs() < f64::EPSILON);
        assert_eq!(condition.age_in_cycles(), 0);
    }
}
