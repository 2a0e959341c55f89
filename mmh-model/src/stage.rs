//! Patient stages and trajectory matching.
use serde::{Deserialize, Serialize};

use crate::patient::Patient;
use crate::trajectory::{NextStep, TrajectoryId, TrajectoryRule, TrajectoryTable};
use crate::treatment::TreatmentPlan;

/// A treatment stage in progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveStage {
    plan: TreatmentPlan,
    /// Cycles the patient has spent in this stage since it was assigned.
    cycles_in_stage: u32,
}

impl ActiveStage {
    /// Start a fresh stage from a trajectory rule.
    #[must_use]
    pub fn from_rule(rule: &TrajectoryRule) -> Self {
        Self {
            plan: TreatmentPlan::new(rule.id, rule.protocol.clone()),
            cycles_in_stage: 0,
        }
    }

    #[must_use]
    pub const fn trajectory(&self) -> TrajectoryId {
        self.plan.id()
    }

    #[must_use]
    pub const fn plan(&self) -> &TreatmentPlan {
        &self.plan
    }

    pub fn plan_mut(&mut self) -> &mut TreatmentPlan {
        &mut self.plan
    }

    #[must_use]
    pub const fn cycles_in_stage(&self) -> u32 {
        self.cycles_in_stage
    }

    const fn is_elapsed(&self) -> bool {
        self.cycles_in_stage >= self.plan.length()
    }
}

/// Stages compare by trajectory id only.
impl PartialEq for ActiveStage {
    fn eq(&self, other: &Self) -> bool {
        self.trajectory() == other.trajectory()
    }
}

/// Where a patient stands in their course of care.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", content = "stage", rename_all = "snake_case")]
pub enum Stage {
    /// Admitted but never matched to a trajectory.
    #[default]
    Unassigned,
    InTreatment(ActiveStage),
    /// Ready for discharge.
    Complete,
}

impl Stage {
    #[must_use]
    pub const fn active(&self) -> Option<&ActiveStage> {
        match self {
            Self::InTreatment(active) => Some(active),
            Self::Unassigned | Self::Complete => None,
        }
    }

    pub fn active_mut(&mut self) -> Option<&mut ActiveStage> {
        match self {
            Self::InTreatment(active) => Some(active),
            Self::Unassigned | Self::Complete => None,
        }
    }

    #[must_use]
    pub fn plan(&self) -> Option<&TreatmentPlan> {
        self.active().map(ActiveStage::plan)
    }

    #[must_use]
    pub fn trajectory(&self) -> Option<TrajectoryId> {
        self.active().map(ActiveStage::trajectory)
    }
}

/// Result of re-evaluating a patient's stage for one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageDecision {
    /// The current stage carries on.
    Continued(TrajectoryId),
    /// A different trajectory was assigned.
    Assigned(TrajectoryId),
    /// Care is finished; the patient can be discharged.
    Completed,
    /// No trajectory fits. The previous stage is left in place and the patient
    /// goes untreated this cycle.
    Unmatched,
}

impl StageDecision {
    /// Whether the patient has a plan to attempt this cycle.
    #[must_use]
    pub const fn has_plan(self) -> bool {
        matches!(self, Self::Continued(_) | Self::Assigned(_))
    }
}

/// Selects stages for patients from a trajectory table.
#[derive(Debug, Clone)]
pub struct StageManager {
    table: TrajectoryTable,
}

impl StageManager {
    #[must_use]
    pub const fn new(table: TrajectoryTable) -> Self {
        Self { table }
    }

    #[must_use]
    pub const fn table(&self) -> &TrajectoryTable {
        &self.table
    }

    /// Whether the patient's conditions match `rule` exactly: the same number
    /// of conditions, each required one present with severity in `(min, max]`.
    #[must_use]
    pub fn satisfies(patient: &Patient, rule: &TrajectoryRule) -> bool {
        if patient.conditions().len() != rule.requirements.len() {
            return false;
        }
        rule.requirements.iter().all(|requirement| {
            patient
                .condition(requirement.condition)
                .is_some_and(|held| requirement.severity.contains(held.probability_of_mortality()))
        })
    }

    /// First rule in table order the patient satisfies.
    #[must_use]
    pub fn find_match(&self, patient: &Patient) -> Option<&TrajectoryRule> {
        self.table
            .rules()
            .iter()
            .find(|rule| Self::satisfies(patient, rule))
    }

    /// Re-evaluate the patient's stage and update it in place.
    ///
    /// A stage that has run its length moves to its successor, or to
    /// [`Stage::Complete`] when the rule discharges. A stage still inside its
    /// length carries on while its rule still matches. Otherwise the table is
    /// scanned for the first matching rule; a match with the current
    /// trajectory id keeps the existing plan untouched.
    pub fn select_stage(&self, patient: &mut Patient) -> StageDecision {
        if matches!(patient.stage, Stage::Complete) {
            return StageDecision::Completed;
        }

        if let Some(active) = patient.stage.active() {
            let current = active.trajectory();
            let rule = self.table.rule(current);
            if active.is_elapsed() {
                match rule.map(|rule| rule.next) {
                    Some(NextStep::Discharge) => {
                        log::debug!("patient {}: trajectory {current} complete", patient.id());
                        patient.stage = Stage::Complete;
                        return StageDecision::Completed;
                    }
                    Some(NextStep::Successor(next)) => {
                        if let Some(successor) = self.table.rule(next) {
                            log::debug!(
                                "patient {}: trajectory {current} -> {next}",
                                patient.id()
                            );
                            return Self::assign(patient, successor);
                        }
                    }
                    Some(NextStep::Stay) | None => {}
                }
            } else if rule.is_some_and(|rule| Self::satisfies(patient, rule)) {
                if let Some(active) = patient.stage.active_mut() {
                    active.cycles_in_stage = active.cycles_in_stage.saturating_add(1);
                }
                return StageDecision::Continued(current);
            }
        }

        match self.find_match(patient) {
            Some(rule) => Self::assign(patient, rule),
            None => StageDecision::Unmatched,
        }
    }

    fn assign(patient: &mut Patient, rule: &TrajectoryRule) -> StageDecision {
        if patient.stage.trajectory() == Some(rule.id) {
            return StageDecision::Continued(rule.id);
        }
        log::trace!("patient {}: assigned trajectory {}", patient.id(), rule.id);
        patient.stage = Stage::InTreatment(ActiveStage::from_rule(rule));
        StageDecision::Assigned(rule.id)
    }
}
