//! Admitted patients, their conditions, and the staff they hold.
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

use crate::condition::{Condition, ConditionKind};
use crate::resources::{Doses, MaterialResource};
use crate::stage::Stage;

/// Conditions held inline; admissions rarely carry more than a few.
pub type ConditionSet = SmallVec<[Condition; 4]>;

/// Unique, monotonically increasing patient identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatientId(pub u32);

impl fmt::Display for PatientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Staff currently checked out to a patient.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveStaff {
    pub nurses: u32,
    pub doctors: u32,
}

impl ActiveStaff {
    #[must_use]
    pub const fn total(self) -> u32 {
        self.nurses.saturating_add(self.doctors)
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.nurses == 0 && self.doctors == 0
    }
}

/// Cumulative resources spent on a patient over the whole stay.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceUsage {
    /// Nurse-cycles: one nurse attending for one treated cycle.
    pub nurse_cycles: u64,
    pub doctor_cycles: u64,
    #[serde(default)]
    pub materials: Doses,
}

impl ResourceUsage {
    pub(crate) fn record_cycle(&mut self, staff: ActiveStaff, doses: &Doses) {
        self.nurse_cycles = self.nurse_cycles.saturating_add(u64::from(staff.nurses));
        self.doctor_cycles = self.doctor_cycles.saturating_add(u64::from(staff.doctors));
        for (&resource, &dose) in doses {
            *self.materials.entry(resource).or_insert(0.0) += dose;
        }
    }

    #[must_use]
    pub fn material(&self, resource: MaterialResource) -> f64 {
        self.materials.get(&resource).copied().unwrap_or(0.0)
    }
}

/// An admitted individual.
///
/// The condition set is fixed at admission; severities change through
/// treatment and worsening only.
#[derive(Debug, Clone)]
pub struct Patient {
    id: PatientId,
    age: u32,
    alive: bool,
    conditions: ConditionSet,
    pub(crate) stage: Stage,
    pub(crate) active_staff: ActiveStaff,
    usage: ResourceUsage,
}

impl Patient {
    /// Create a living, unassigned patient. Conditions repeating an earlier kind
    /// are dropped.
    #[must_use]
    pub fn new<I>(id: PatientId, age: u32, conditions: I) -> Self
    where
        I: IntoIterator<Item = Condition>,
    {
        let mut set = ConditionSet::new();
        for condition in conditions {
            if set.iter().any(|held| held.kind() == condition.kind()) {
                log::warn!(
                    "patient {id}: duplicate {} condition dropped at admission",
                    condition.kind()
                );
                continue;
            }
            set.push(condition);
        }
        Self {
            id,
            age,
            alive: true,
            conditions: set,
            stage: Stage::Unassigned,
            active_staff: ActiveStaff::default(),
            usage: ResourceUsage::default(),
        }
    }

    #[must_use]
    pub const fn id(&self) -> PatientId {
        self.id
    }

    #[must_use]
    pub const fn age(&self) -> u32 {
        self.age
    }

    #[must_use]
    pub const fn is_alive(&self) -> bool {
        self.alive
    }

    /// One-way transition to deceased.
    pub fn die(&mut self) {
        self.alive = false;
    }

    #[must_use]
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    #[must_use]
    pub fn has_condition(&self, kind: ConditionKind) -> bool {
        self.condition(kind).is_some()
    }

    #[must_use]
    pub fn condition(&self, kind: ConditionKind) -> Option<&Condition> {
        self.conditions.iter().find(|condition| condition.kind() == kind)
    }

    pub fn condition_mut(&mut self, kind: ConditionKind) -> Option<&mut Condition> {
        self.conditions
            .iter_mut()
            .find(|condition| condition.kind() == kind)
    }

    /// Overall probability of mortality, treating conditions as independent
    /// causes of death: `1 - Π(1 - pᵢ)`.
    #[must_use]
    pub fn probability_of_mortality(&self) -> f64 {
        let survival: f64 = self
            .conditions
            .iter()
            .map(|condition| 1.0 - condition.probability_of_mortality())
            .product();
        1.0 - survival
    }

    /// Worsen every condition by one untreated cycle.
    pub fn worsen_conditions(&mut self) {
        for condition in &mut self.conditions {
            condition.worsen();
        }
    }

    #[must_use]
    pub const fn stage(&self) -> &Stage {
        &self.stage
    }

    #[must_use]
    pub const fn active_staff(&self) -> ActiveStaff {
        self.active_staff
    }

    #[must_use]
    pub const fn usage(&self) -> &ResourceUsage {
        &self.usage
    }

    pub(crate) fn usage_mut(&mut self) -> &mut ResourceUsage {
        &mut self.usage
    }

    /// Whether the patient has been assigned the terminal discharge stage.
    #[must_use]
    pub const fn is_ready_for_discharge(&self) -> bool {
        matches!(self.stage, Stage::Complete)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patient_with(probabilities: &[(ConditionKind, f64)]) -> Patient {
        Patient::new(
            PatientId(1),
            30,
            probabilities
                .iter()
                .map(|&(kind, p)| Condition::new(kind, p, 1.0)),
        )
    }

    #[test]
    fn no_conditions_means_zero_mortality() {
        let patient = patient_with(&[]);
        assert!(patient.probability_of_mortality().abs() < f64::EPSILON);
    }

    #[test]
    fn single_condition_passes_through() {
        let patient = patient_with(&[(ConditionKind::Sepsis, 0.37)]);
        assert!((patient.probability_of_mortality() - 0.37).abs() < 1e-12);
    }

    #[test]
    fn independent_causes_combine() {
        let patient = patient_with(&[
            (ConditionKind::Sepsis, 0.2),
            (ConditionKind::Pph, 0.5),
            (ConditionKind::Anaemia, 0.1),
        ]);
        let expected = 1.0 - (0.8 * 0.5 * 0.9);
        assert!((patient.probability_of_mortality() - expected).abs() < 1e-12);
    }

    #[test]
    fn lookup_by_kind() {
        let patient = patient_with(&[(ConditionKind::Aph, 0.2)]);
        assert!(patient.has_condition(ConditionKind::Aph));
        assert!(!patient.has_condition(ConditionKind::Pph));
        assert_eq!(
            patient.condition(ConditionKind::Aph).map(Condition::kind),
            Some(ConditionKind::Aph)
        );
    }

    #[test]
    fn duplicate_kinds_are_collapsed() {
        let patient = patient_with(&[(ConditionKind::Pph, 0.2), (ConditionKind::Pph, 0.9)]);
        assert_eq!(patient.conditions().len(), 1);
        assert!((patient.probability_of_mortality() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn death_is_one_way() {
        let mut patient = patient_with(&[(ConditionKind::Eclampsia, 0.4)]);
        assert!(patient.is_alive());
        patient.die();
        patient.die();
        assert!(!patient.is_alive());
    }

    #[test]
    fn usage_accumulates_staff_and_doses() {
        let mut usage = ResourceUsage::default();
        let doses = Doses::from([(MaterialResource::Oxytocin, 10.0)]);
        usage.record_cycle(ActiveStaff { nurses: 2, doctors: 1 }, &doses);
        usage.record_cycle(ActiveStaff { nurses: 1, doctors: 0 }, &doses);
        assert_eq!(usage.nurse_cycles, 3);
        assert_eq!(usage.doctor_cycles, 1);
        assert!((usage.material(MaterialResource::Oxytocin) - 20.0).abs() < f64::EPSILON);
    }
}
