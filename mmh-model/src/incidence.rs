//! Condition profiles, admission incidence, and the patient generator.
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::condition::{Condition, ConditionKind};
use crate::constants::{INCIDENCE_UNITY_PLACES, SEVERITY_MAX_ATTEMPTS};
use crate::numbers::round_to_places;
use crate::patient::{Patient, PatientId};

/// Severity distribution and deterioration rate for one condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionProfile {
    pub condition: String,
    /// Mean probability of mortality at admission.
    pub mean: f64,
    pub stdev: f64,
    pub deterioration_rate: f64,
}

impl ConditionProfile {
    fn check(&self) -> Result<ConditionKind, String> {
        let kind = self
            .condition
            .parse::<ConditionKind>()
            .map_err(|err| err.to_string())?;
        if !(self.mean > 0.0 && self.mean < 1.0) {
            return Err(format!("mean {} outside (0, 1)", self.mean));
        }
        if !(self.stdev >= 0.0 && self.stdev.is_finite()) {
            return Err(format!("stdev {} is negative", self.stdev));
        }
        if !(self.deterioration_rate > 0.0 && self.deterioration_rate.is_finite()) {
            return Err(format!(
                "deterioration rate {} is not positive",
                self.deterioration_rate
            ));
        }
        Ok(kind)
    }
}

/// One admission pattern: a comma-separated condition set and its probability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidenceEntry {
    pub conditions: String,
    pub probability: f64,
}

/// Raw condition table as loaded from disk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConditionTableData {
    #[serde(default)]
    pub profiles: Vec<ConditionProfile>,
    #[serde(default)]
    pub incidence: Vec<IncidenceEntry>,
}

impl ConditionTableData {
    /// Parse the condition table from JSON.
    ///
    /// # Errors
    ///
    /// Returns `IncidenceError::Parse` when the JSON does not match the table shape.
    pub fn from_json(json: &str) -> Result<Self, IncidenceError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Fatal condition-table problems.
#[derive(Debug, Error)]
pub enum IncidenceError {
    #[error("condition table could not be parsed: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("incidence probabilities sum to {sum}, not 1")]
    NotUnity { sum: f64 },
    #[error("incidence table has no usable entries")]
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Severity {
    mean: f64,
    stdev: f64,
    deterioration_rate: f64,
}

/// Validated profiles and cumulative incidence.
#[derive(Debug, Clone, PartialEq)]
pub struct IncidenceTable {
    profiles: BTreeMap<ConditionKind, Severity>,
    /// Condition sets paired with their cumulative probability.
    cumulative: Vec<(Vec<ConditionKind>, f64)>,
}

impl IncidenceTable {
    /// Validate and index a raw condition table.
    ///
    /// The raw incidence probabilities must sum to one at five decimal places.
    /// Invalid profiles, and incidence entries naming unknown or unprofiled
    /// conditions, are skipped with a warning; the remaining entries are drawn
    /// in proportion to their probabilities.
    ///
    /// # Errors
    ///
    /// Returns `IncidenceError::NotUnity` when the probabilities do not sum to
    /// one and `IncidenceError::Empty` when no entry survives validation.
    pub fn new(data: &ConditionTableData) -> Result<Self, IncidenceError> {
        let sum: f64 = data.incidence.iter().map(|entry| entry.probability).sum();
        if (round_to_places(sum, INCIDENCE_UNITY_PLACES) - 1.0).abs() > f64::EPSILON {
            return Err(IncidenceError::NotUnity { sum });
        }

        let mut profiles = BTreeMap::new();
        for profile in &data.profiles {
            match profile.check() {
                Ok(kind) => {
                    profiles.insert(
                        kind,
                        Severity {
                            mean: profile.mean,
                            stdev: profile.stdev,
                            deterioration_rate: profile.deterioration_rate,
                        },
                    );
                }
                Err(reason) => log::warn!("condition profile `{}` skipped: {reason}", profile.condition),
            }
        }

        let mut cumulative = Vec::with_capacity(data.incidence.len());
        let mut running = 0.0;
        for entry in &data.incidence {
            let Some(kinds) = Self::parse_entry(entry, &profiles) else {
                continue;
            };
            if !(entry.probability > 0.0) {
                log::debug!("incidence entry `{}` has no weight", entry.conditions);
                continue;
            }
            running += entry.probability;
            cumulative.push((kinds, running));
        }
        if cumulative.is_empty() {
            return Err(IncidenceError::Empty);
        }
        log::info!(
            "condition table loaded: {} profiles, {} incidence entries",
            profiles.len(),
            cumulative.len()
        );
        Ok(Self { profiles, cumulative })
    }

    fn parse_entry(
        entry: &IncidenceEntry,
        profiles: &BTreeMap<ConditionKind, Severity>,
    ) -> Option<Vec<ConditionKind>> {
        let mut kinds = Vec::new();
        for token in entry.conditions.split(',').map(str::trim).filter(|token| !token.is_empty()) {
            let kind = match token.parse::<ConditionKind>() {
                Ok(kind) => kind,
                Err(err) => {
                    log::warn!("incidence entry `{}` skipped: {err}", entry.conditions);
                    return None;
                }
            };
            if !profiles.contains_key(&kind) {
                log::warn!(
                    "incidence entry `{}` skipped: no profile for {kind}",
                    entry.conditions
                );
                return None;
            }
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }
        if kinds.is_empty() {
            log::warn!("incidence entry `{}` skipped: no conditions", entry.conditions);
            return None;
        }
        Some(kinds)
    }

    /// Total weight of the usable entries; one unless entries were skipped.
    #[must_use]
    pub fn total_weight(&self) -> f64 {
        self.cumulative.last().map_or(0.0, |&(_, total)| total)
    }

    /// Condition set for a uniform variate in `[0, total_weight)`: the first
    /// entry whose cumulative probability reaches the variate.
    #[must_use]
    pub fn condition_set(&self, variate: f64) -> &[ConditionKind] {
        let chosen = self
            .cumulative
            .iter()
            .find(|&&(_, cumulative)| cumulative >= variate)
            .or_else(|| self.cumulative.last());
        match chosen {
            Some((kinds, _)) => kinds.as_slice(),
            None => &[],
        }
    }

    /// Draw a severity for `kind` from its profile.
    fn severity<R: Rng + ?Sized>(&self, kind: ConditionKind, rng: &mut R) -> Option<Condition> {
        let profile = self.profiles.get(&kind)?;
        let probability = truncated_normal(profile.mean, profile.stdev, rng);
        Some(Condition::new(kind, probability, profile.deterioration_rate))
    }
}

/// Standard normal variate via the Box-Muller transform.
fn standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    let u1: f64 = rng.r#gen::<f64>().max(f64::MIN_POSITIVE);
    let u2: f64 = rng.r#gen();
    (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}

/// Normal sample resampled until it lands strictly inside `(0, 1)`. Falls back
/// to the mean when the distribution rarely reaches that interval.
fn truncated_normal<R: Rng + ?Sized>(mean: f64, stdev: f64, rng: &mut R) -> f64 {
    if stdev <= 0.0 {
        return mean;
    }
    for _ in 0..SEVERITY_MAX_ATTEMPTS {
        let sample = mean + stdev * standard_normal(rng);
        if sample > 0.0 && sample < 1.0 {
            return sample;
        }
    }
    log::debug!("severity draw for mean {mean} stdev {stdev} fell back to the mean");
    mean
}

/// Source of newly admitted patients.
pub trait PatientGenerator {
    /// Create a patient aged uniformly in `[min_age, max_age]`.
    fn create_patient(&mut self, min_age: u32, max_age: u32, rng: &mut dyn RngCore) -> Patient;
}

/// Default generator: incidence-weighted condition sets with truncated-normal
/// severities, numbering patients from 1.
#[derive(Debug, Clone)]
pub struct Shiva {
    table: IncidenceTable,
    issued: u32,
}

impl Shiva {
    #[must_use]
    pub const fn new(table: IncidenceTable) -> Self {
        Self { table, issued: 0 }
    }

    #[must_use]
    pub const fn table(&self) -> &IncidenceTable {
        &self.table
    }

    /// Patients created so far.
    #[must_use]
    pub const fn issued(&self) -> u32 {
        self.issued
    }
}

impl PatientGenerator for Shiva {
    fn create_patient(&mut self, min_age: u32, max_age: u32, rng: &mut dyn RngCore) -> Patient {
        let (low, high) = if min_age <= max_age {
            (min_age, max_age)
        } else {
            (max_age, min_age)
        };
        let age = rng.gen_range(low..=high);
        let variate = rng.r#gen::<f64>() * self.table.total_weight();
        let kinds = self.table.condition_set(variate).to_vec();
        let conditions: Vec<Condition> = kinds
            .into_iter()
            .filter_map(|kind| self.table.severity(kind, rng))
            .collect();

        self.issued = self.issued.saturating_add(1);
        Patient::new(PatientId(self.issued), age, conditions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn profile(condition: &str, mean: f64, stdev: f64) -> ConditionProfile {
        ConditionProfile {
            condition: condition.to_string(),
            mean,
            stdev,
            deterioration_rate: 2.0,
        }
    }

    fn entry(conditions: &str, probability: f64) -> IncidenceEntry {
        IncidenceEntry {
            conditions: conditions.to_string(),
            probability,
        }
    }

    fn data(incidence: Vec<IncidenceEntry>) -> ConditionTableData {
        ConditionTableData {
            profiles: vec![
                profile("DELIVERY", 0.01, 0.005),
                profile("PPH", 0.2, 0.1),
                profile("SEPSIS", 0.3, 0.0),
            ],
            incidence,
        }
    }

    #[test]
    fn unity_check_tolerates_rounding() {
        let near = data(vec![entry("DELIVERY", 0.333_333), entry("PPH", 0.333_333), entry("SEPSIS", 0.333_336)]);
        assert!(IncidenceTable::new(&near).is_ok());

        let short = data(vec![entry("DELIVERY", 0.5), entry("PPH", 0.4)]);
        assert!(matches!(
            IncidenceTable::new(&short),
            Err(IncidenceError::NotUnity { .. })
        ));
    }

    #[test]
    fn cumulative_lookup_takes_first_reaching_entry() {
        let table = IncidenceTable::new(&data(vec![
            entry("DELIVERY", 0.7),
            entry("PPH", 0.2),
            entry("PPH,SEPSIS", 0.1),
        ]))
        .unwrap();
        assert_eq!(table.condition_set(0.0), &[ConditionKind::Delivery]);
        assert_eq!(table.condition_set(0.7), &[ConditionKind::Delivery]);
        assert_eq!(table.condition_set(0.75), &[ConditionKind::Pph]);
        assert_eq!(
            table.condition_set(0.95),
            &[ConditionKind::Pph, ConditionKind::Sepsis]
        );
    }

    #[test]
    fn unknown_and_unprofiled_entries_are_skipped() {
        let table = IncidenceTable::new(&data(vec![
            entry("DELIVERY", 0.6),
            entry("FEVER", 0.1),
            entry("ECLAMPSIA", 0.3),
        ]))
        .unwrap();
        assert!((table.total_weight() - 0.6).abs() < 1e-12);
        assert_eq!(table.condition_set(0.59), &[ConditionKind::Delivery]);
    }

    #[test]
    fn invalid_profiles_are_skipped() {
        let mut raw = data(vec![entry("PPH", 1.0)]);
        raw.profiles = vec![profile("PPH", 1.5, 0.1)];
        assert!(matches!(IncidenceTable::new(&raw), Err(IncidenceError::Empty)));
    }

    #[test]
    fn generated_patients_are_well_formed() {
        let table = IncidenceTable::new(&data(vec![
            entry("DELIVERY", 0.5),
            entry("PPH,SEPSIS", 0.5),
        ]))
        .unwrap();
        let mut shiva = Shiva::new(table);
        let mut rng = ChaCha20Rng::seed_from_u64(2024);

        let mut previous = 0;
        for _ in 0..500 {
            let patient = shiva.create_patient(18, 45, &mut rng);
            assert!((18..=45).contains(&patient.age()));
            assert!(patient.id().0 > previous);
            previous = patient.id().0;
            assert!(!patient.conditions().is_empty());
            for condition in patient.conditions() {
                let p = condition.probability_of_mortality();
                assert!(p > 0.0 && p < 1.0, "severity {p} out of range");
            }
            if let Some(sepsis) = patient.condition(ConditionKind::Sepsis) {
                assert!((sepsis.probability_of_mortality() - 0.3).abs() < f64::EPSILON);
            }
        }
        assert_eq!(shiva.issued(), 500);
    }

    #[test]
    fn truncated_normal_falls_back_to_mean() {
        let mut rng = ChaCha20Rng::seed_from_u64(5);
        let sample = truncated_normal(0.999, 1e-9, &mut rng);
        assert!(sample > 0.0 && sample < 1.0);
        let far = truncated_normal(0.5, 1e6, &mut rng);
        assert!(far > 0.0 && far < 1.0);
    }

    #[test]
    fn parses_json_tables() {
        let json = r#"{
            "profiles": [{"condition": "PPH", "mean": 0.2, "stdev": 0.05, "deterioration_rate": 1.5}],
            "incidence": [{"conditions": "PPH", "probability": 1.0}]
        }"#;
        let raw = ConditionTableData::from_json(json).unwrap();
        assert!(IncidenceTable::new(&raw).is_ok());
        assert!(matches!(
            ConditionTableData::from_json("42"),
            Err(IncidenceError::Parse(_))
        ));
        assert!(matches!(
            ConditionTableData::from_json(r#"{"profiles": 3}"#),
            Err(IncidenceError::Parse(_))
        ));
    }
}
