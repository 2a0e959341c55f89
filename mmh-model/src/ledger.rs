//! Cycle-by-cycle event log produced by a simulation run.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::condition::{Condition, ConditionKind};
use crate::hospital::{HospitalSnapshot, TreatmentReport};
use crate::numbers::usize_to_f64;
use crate::patient::{ActiveStaff, Patient, PatientId, ResourceUsage};
use crate::trajectory::TrajectoryId;

/// State of one condition at logging time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConditionSnapshot {
    pub kind: ConditionKind,
    pub probability_of_mortality: f64,
    pub age_in_cycles: u32,
}

impl From<&Condition> for ConditionSnapshot {
    fn from(condition: &Condition) -> Self {
        Self {
            kind: condition.kind(),
            probability_of_mortality: condition.probability_of_mortality(),
            age_in_cycles: condition.age_in_cycles(),
        }
    }
}

fn condition_snapshots(patient: &Patient) -> Vec<ConditionSnapshot> {
    patient.conditions().iter().map(ConditionSnapshot::from).collect()
}

/// Per-cycle view of an admitted patient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientSnapshot {
    pub id: PatientId,
    pub age: u32,
    /// `false` in the cycle the patient died.
    pub alive: bool,
    pub probability_of_mortality: f64,
    pub trajectory: Option<TrajectoryId>,
    /// Cycles administered on the current plan.
    pub plan_cycle: Option<u32>,
    pub treated: bool,
    pub active_staff: ActiveStaff,
    pub conditions: Vec<ConditionSnapshot>,
}

/// A patient entering the hospital.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdmissionRecord {
    pub cycle: u32,
    pub id: PatientId,
    pub age: u32,
    pub probability_of_mortality: f64,
    pub conditions: Vec<ConditionSnapshot>,
}

/// A patient leaving the hospital, alive or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    pub cycle: u32,
    pub id: PatientId,
    pub age: u32,
    pub probability_of_mortality: f64,
    /// Cycles spent in hospital, counting the admission cycle.
    pub stay_cycles: u32,
    pub conditions: Vec<ConditionSnapshot>,
    pub usage: ResourceUsage,
}

/// Everything that happened in one cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleRecord {
    pub cycle: u32,
    pub admissions: u32,
    pub discharges: u32,
    pub deaths: u32,
    #[serde(default)]
    pub treatment: TreatmentReport,
    pub hospital: HospitalSnapshot,
    pub patients: Vec<PatientSnapshot>,
}

/// Complete record of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelLog {
    /// Admissions in order.
    pub patients: Vec<AdmissionRecord>,
    pub cycles: Vec<CycleRecord>,
    pub discharges: Vec<OutcomeRecord>,
    pub deaths: Vec<OutcomeRecord>,
}

impl ModelLog {
    /// Serialize the log as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Parse a log previously produced by [`ModelLog::to_json`].
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON does not describe a log.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Deaths as a fraction of patients who have left the hospital.
    #[must_use]
    pub fn mortality_rate(&self) -> f64 {
        let outcomes = self.discharges.len() + self.deaths.len();
        if outcomes == 0 {
            return 0.0;
        }
        usize_to_f64(self.deaths.len()) / usize_to_f64(outcomes)
    }
}

/// Persistence for finished logs. Implementations decide the format and medium.
pub trait LogStore {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Save a log under `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be saved.
    fn save_log(&self, name: &str, log: &ModelLog) -> Result<(), Self::Error>;

    /// Load a log saved under `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be read.
    fn load_log(&self, name: &str) -> Result<Option<ModelLog>, Self::Error>;
}

/// Accumulates records while a run is in progress.
#[derive(Debug, Clone, Default)]
pub struct ModelLogger {
    log: ModelLog,
    admitted_at: BTreeMap<PatientId, u32>,
    pending: Vec<PatientSnapshot>,
    admissions: u32,
    discharges: u32,
    deaths: u32,
}

impl ModelLogger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records written so far.
    #[must_use]
    pub const fn log(&self) -> &ModelLog {
        &self.log
    }

    pub fn log_admission(&mut self, cycle: u32, patient: &Patient) {
        self.admitted_at.insert(patient.id(), cycle);
        self.admissions += 1;
        self.log.patients.push(AdmissionRecord {
            cycle,
            id: patient.id(),
            age: patient.age(),
            probability_of_mortality: patient.probability_of_mortality(),
            conditions: condition_snapshots(patient),
        });
    }

    pub fn log_patient(&mut self, patient: &Patient, treated: bool) {
        let active = patient.stage().active();
        self.pending.push(PatientSnapshot {
            id: patient.id(),
            age: patient.age(),
            alive: patient.is_alive(),
            probability_of_mortality: patient.probability_of_mortality(),
            trajectory: active.map(|stage| stage.trajectory()),
            plan_cycle: active.map(|stage| stage.plan().cycle()),
            treated,
            active_staff: patient.active_staff(),
            conditions: condition_snapshots(patient),
        });
    }

    pub fn log_discharge(&mut self, cycle: u32, patient: &Patient) {
        let record = self.outcome(cycle, patient);
        self.discharges += 1;
        self.log.discharges.push(record);
    }

    pub fn log_death(&mut self, cycle: u32, patient: &Patient) {
        let record = self.outcome(cycle, patient);
        self.deaths += 1;
        self.log.deaths.push(record);
    }

    fn outcome(&mut self, cycle: u32, patient: &Patient) -> OutcomeRecord {
        let admitted = self.admitted_at.remove(&patient.id()).unwrap_or(cycle);
        OutcomeRecord {
            cycle,
            id: patient.id(),
            age: patient.age(),
            probability_of_mortality: patient.probability_of_mortality(),
            stay_cycles: cycle.saturating_sub(admitted).saturating_add(1),
            conditions: condition_snapshots(patient),
            usage: patient.usage().clone(),
        }
    }

    /// Close the cycle, attaching the hospital state and the patient snapshots
    /// logged since the previous cycle ended.
    pub fn end_cycle(
        &mut self,
        cycle: u32,
        treatment: TreatmentReport,
        hospital: HospitalSnapshot,
    ) -> &CycleRecord {
        let record = CycleRecord {
            cycle,
            admissions: std::mem::take(&mut self.admissions),
            discharges: std::mem::take(&mut self.discharges),
            deaths: std::mem::take(&mut self.deaths),
            treatment,
            hospital,
            patients: std::mem::take(&mut self.pending),
        };
        log::debug!(
            "cycle {cycle}: {} admitted, {} discharged, {} died, census {}",
            record.admissions,
            record.discharges,
            record.deaths,
            record.patients.len()
        );
        self.log.cycles.push(record);
        let last = self.log.cycles.len() - 1;
        &self.log.cycles[last]
    }

    /// Finish the run and hand over the log.
    #[must_use]
    pub fn finish(self) -> ModelLog {
        self.log
    }
}
