//! The per-cycle simulation loop.
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::{SimulationConfig, SimulationConfigError};
use crate::hospital::{Hospital, TreatmentReport};
use crate::incidence::{PatientGenerator, Shiva};
use crate::ledger::{ModelLog, ModelLogger};
use crate::mortality;
use crate::patient::{Patient, PatientId};
use crate::rng::RngBundle;
use crate::stage::StageManager;
use crate::trajectory::TrajectoryTable;

/// What happened in one call to [`Simulator::step`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleOutcome {
    pub cycle: u32,
    pub admitted: Vec<PatientId>,
    pub discharged: Vec<PatientId>,
    pub died: Vec<PatientId>,
    pub treatment: TreatmentReport,
    /// Patients still admitted at the end of the cycle.
    pub census: usize,
}

/// Owns every piece of model state and advances it one cycle at a time.
#[derive(Debug, Clone)]
pub struct Simulator<G: PatientGenerator = Shiva> {
    config: SimulationConfig,
    hospital: Hospital,
    stages: StageManager,
    generator: G,
    rng: RngBundle,
    logger: ModelLogger,
    patients: Vec<Patient>,
    cycle: u32,
}

impl<G: PatientGenerator> Simulator<G> {
    /// Assemble a simulator from validated parts.
    ///
    /// # Errors
    ///
    /// Returns `SimulationConfigError` if the configuration is invalid.
    pub fn new(
        config: SimulationConfig,
        table: TrajectoryTable,
        generator: G,
        seed: u64,
    ) -> Result<Self, SimulationConfigError> {
        config.validate()?;
        let hospital = Hospital::new(&config.hospital);
        Ok(Self {
            config,
            hospital,
            stages: StageManager::new(table),
            generator,
            rng: RngBundle::from_user_seed(seed),
            logger: ModelLogger::new(),
            patients: Vec::new(),
            cycle: 0,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Index of the next cycle to run.
    #[must_use]
    pub const fn cycle(&self) -> u32 {
        self.cycle
    }

    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.cycle >= self.config.total_cycles
    }

    /// Patients currently admitted.
    #[must_use]
    pub fn patients(&self) -> &[Patient] {
        &self.patients
    }

    #[must_use]
    pub const fn hospital(&self) -> &Hospital {
        &self.hospital
    }

    pub fn hospital_mut(&mut self) -> &mut Hospital {
        &mut self.hospital
    }

    #[must_use]
    pub const fn stages(&self) -> &StageManager {
        &self.stages
    }

    #[must_use]
    pub const fn rng(&self) -> &RngBundle {
        &self.rng
    }

    /// Log records written so far.
    #[must_use]
    pub const fn log(&self) -> &ModelLog {
        self.logger.log()
    }

    /// Admit a patient directly, bypassing the arrival draw.
    pub fn admit(&mut self, patient: Patient) {
        self.logger.log_admission(self.cycle, &patient);
        self.patients.push(patient);
    }

    /// Run one cycle: shift change, arrivals, treatment, discharge and
    /// survival, then logging. Returns `None` once the run is over.
    pub fn step(&mut self) -> Option<CycleOutcome> {
        if self.is_finished() {
            return None;
        }
        let cycle = self.cycle;

        let staffing = self.config.shifts.staffing_at(cycle);
        self.hospital.set_nurses_on_shift(staffing.nurses);
        self.hospital.set_doctors_on_shift(staffing.doctors);

        let admitted = self.admit_arrivals();
        let treatment = self.hospital.attempt_treatments(&mut self.patients, &self.stages);
        let (discharged, died) = self.retire_patients();
        self.logger
            .end_cycle(cycle, treatment, self.hospital.snapshot());

        self.cycle = self.cycle.saturating_add(1);
        Some(CycleOutcome {
            cycle,
            admitted,
            discharged,
            died,
            treatment,
            census: self.patients.len(),
        })
    }

    /// Run every remaining cycle and hand over the finished log.
    #[must_use]
    pub fn run(mut self) -> ModelLog {
        log::info!(
            "simulation starting: {} cycles, arrival probability {}",
            self.config.total_cycles,
            self.config.arrival_probability
        );
        while self.step().is_some() {}
        let log = self.logger.finish();
        log::info!(
            "simulation finished: {} admitted, {} discharged, {} died, {} still admitted",
            log.patients.len(),
            log.discharges.len(),
            log.deaths.len(),
            self.patients.len()
        );
        log
    }

    fn admit_arrivals(&mut self) -> Vec<PatientId> {
        let mut admitted = Vec::new();
        for _ in 0..self.config.arrival_slots {
            let draw: f64 = self.rng.arrival().r#gen();
            if draw >= self.config.arrival_probability {
                continue;
            }
            let patient = self.generator.create_patient(
                self.config.min_age,
                self.config.max_age,
                self.rng.admission(),
            );
            log::trace!("cycle {}: admitted patient {}", self.cycle, patient.id());
            admitted.push(patient.id());
            self.admit(patient);
        }
        admitted
    }

    /// Discharge completed patients, then draw survival for the rest. Every
    /// patient is snapshotted in admission order, including those leaving.
    fn retire_patients(&mut self) -> (Vec<PatientId>, Vec<PatientId>) {
        let cycle = self.cycle;
        let mut discharged = Vec::new();
        let mut died = Vec::new();
        let admitted = std::mem::take(&mut self.patients);
        let mut remaining = Vec::with_capacity(admitted.len());

        for mut patient in admitted {
            let treated = self.hospital.did_treat(patient.id());
            if patient.is_ready_for_discharge() {
                self.logger.log_patient(&patient, treated);
                self.hospital.release_staff(&mut patient);
                self.hospital.forget_patient(patient.id());
                self.logger.log_discharge(cycle, &patient);
                discharged.push(patient.id());
            } else if mortality::draw_death(&patient, self.rng.mortality()) {
                patient.die();
                self.logger.log_patient(&patient, treated);
                self.hospital.notify_death(&mut patient);
                self.hospital.forget_patient(patient.id());
                self.logger.log_death(cycle, &patient);
                died.push(patient.id());
            } else {
                self.logger.log_patient(&patient, treated);
                remaining.push(patient);
            }
        }

        self.patients = remaining;
        (discharged, died)
    }
}
