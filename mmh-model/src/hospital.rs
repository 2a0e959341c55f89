//! Shared hospital resources and the per-cycle treatment pass.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::constants::DEFAULT_STOCK;
use crate::numbers::saturating_u32;
use crate::patient::{ActiveStaff, Patient, PatientId};
use crate::resources::{MaterialResource, Stock};
use crate::stage::{Stage, StageDecision, StageManager};
use crate::treatment::TreatmentPlan;

/// Opening state of the hospital.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HospitalConfig {
    #[serde(default = "HospitalConfig::default_stock")]
    pub stock: Stock,
}

impl HospitalConfig {
    fn default_stock() -> Stock {
        Stock::from_levels(DEFAULT_STOCK.iter().copied())
    }
}

impl Default for HospitalConfig {
    fn default() -> Self {
        Self {
            stock: Self::default_stock(),
        }
    }
}

/// One staff role: how many are on shift and how many are free right now.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffPool {
    pub on_shift: u32,
    pub available: u32,
}

impl StaffPool {
    /// Change the number on shift. Arrivals become available immediately;
    /// departures only lower the ceiling, and availability is clamped at the
    /// end of the next treatment pass.
    fn set_on_shift(&mut self, on_shift: u32) {
        if on_shift > self.on_shift {
            self.available = self.available.saturating_add(on_shift - self.on_shift);
        }
        self.on_shift = on_shift;
    }

    /// Whether `increment` more staff can be checked out. Negative increments
    /// hand staff back and always succeed.
    fn can_check_out(self, increment: i64) -> bool {
        increment <= i64::from(self.available)
    }

    fn check_out(&mut self, increment: i64) {
        self.available = saturating_u32(i64::from(self.available) - increment);
    }

    /// Hand staff back. The shift ceiling is applied by [`StaffPool::clamp`].
    fn release(&mut self, count: u32) {
        self.available = self.available.saturating_add(count);
    }

    fn clamp(&mut self) {
        self.available = self.available.min(self.on_shift);
    }
}

/// Counts from one treatment pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreatmentReport {
    /// Patients whose plan was administered this cycle.
    pub treated: u32,
    /// Patients who went without, either for lack of resources or of a plan.
    pub untreated: u32,
    /// Of the untreated, those with no matching trajectory.
    pub unmatched: u32,
    /// Patients whose care is finished and who await discharge.
    pub completed: u32,
}

/// Point-in-time view of the hospital for the cycle log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HospitalSnapshot {
    pub nurses: StaffPool,
    pub doctors: StaffPool,
    pub stock: BTreeMap<MaterialResource, f64>,
}

/// Staff pools, material stock and the latest treatment outcome per patient.
#[derive(Debug, Clone, Default)]
pub struct Hospital {
    nurses: StaffPool,
    doctors: StaffPool,
    stock: Stock,
    treatment_status: BTreeMap<PatientId, bool>,
}

impl Hospital {
    /// A hospital with the configured stock and nobody on shift yet.
    #[must_use]
    pub fn new(config: &HospitalConfig) -> Self {
        Self {
            stock: config.stock.clone(),
            ..Self::default()
        }
    }

    /// A hospital with staff already on shift.
    #[must_use]
    pub fn with_staff(nurses: u32, doctors: u32, stock: Stock) -> Self {
        let mut hospital = Self {
            stock,
            ..Self::default()
        };
        hospital.set_nurses_on_shift(nurses);
        hospital.set_doctors_on_shift(doctors);
        hospital
    }

    #[must_use]
    pub const fn nurses(&self) -> StaffPool {
        self.nurses
    }

    #[must_use]
    pub const fn doctors(&self) -> StaffPool {
        self.doctors
    }

    #[must_use]
    pub const fn stock(&self) -> &Stock {
        &self.stock
    }

    pub fn stock_mut(&mut self) -> &mut Stock {
        &mut self.stock
    }

    pub fn set_nurses_on_shift(&mut self, nurses: u32) {
        self.nurses.set_on_shift(nurses);
    }

    pub fn set_doctors_on_shift(&mut self, doctors: u32) {
        self.doctors.set_on_shift(doctors);
    }

    /// Latest treatment outcome for a patient; `false` if never attempted.
    #[must_use]
    pub fn did_treat(&self, id: PatientId) -> bool {
        self.treatment_status.get(&id).copied().unwrap_or(false)
    }

    /// Drop bookkeeping for a patient who has left the hospital.
    pub fn forget_patient(&mut self, id: PatientId) {
        self.treatment_status.remove(&id);
    }

    #[must_use]
    pub fn snapshot(&self) -> HospitalSnapshot {
        HospitalSnapshot {
            nurses: self.nurses,
            doctors: self.doctors,
            stock: self.stock.levels().clone(),
        }
    }

    /// Return every staff member held by a patient leaving treatment, then
    /// apply the shift ceiling.
    pub fn release_staff(&mut self, patient: &mut Patient) {
        self.return_staff(patient);
        self.nurses.clamp();
        self.doctors.clamp();
    }

    /// Return held staff without clamping, so a later patient in the same
    /// pass can use them even after the shift shrank.
    fn return_staff(&mut self, patient: &mut Patient) {
        let held = std::mem::take(&mut patient.active_staff);
        self.nurses.release(held.nurses);
        self.doctors.release(held.doctors);
    }

    /// Reclaim staff from a patient who has died. Safe to call more than once.
    pub fn notify_death(&mut self, patient: &mut Patient) {
        log::trace!(
            "patient {} died holding {} staff",
            patient.id(),
            patient.active_staff().total()
        );
        self.release_staff(patient);
    }

    /// Run one treatment pass over the admitted patients.
    ///
    /// Patients already holding staff are served first, then everyone else;
    /// within each group the sickest go first. Staff whose next-cycle
    /// requirement differs from what a patient holds are reclaimed afterwards.
    pub fn attempt_treatments(&mut self, patients: &mut [Patient], stages: &StageManager) -> TreatmentReport {
        let mut order: Vec<usize> = (0..patients.len()).collect();
        order.sort_by(|&a, &b| {
            let (a, b) = (&patients[a], &patients[b]);
            let holds = |patient: &Patient| !patient.active_staff().is_empty();
            holds(b)
                .cmp(&holds(a))
                .then_with(|| b.probability_of_mortality().total_cmp(&a.probability_of_mortality()))
        });

        let mut report = TreatmentReport::default();
        for index in order {
            let patient = &mut patients[index];
            let decision = stages.select_stage(patient);
            let treated = match decision {
                StageDecision::Completed => {
                    self.return_staff(patient);
                    report.completed += 1;
                    true
                }
                StageDecision::Unmatched => {
                    report.unmatched += 1;
                    self.withhold_treatment(patient);
                    false
                }
                StageDecision::Continued(_) | StageDecision::Assigned(_) => {
                    if self.treat(patient) {
                        true
                    } else {
                        self.withhold_treatment(patient);
                        false
                    }
                }
            };
            if treated {
                if decision.has_plan() {
                    report.treated += 1;
                }
            } else {
                report.untreated += 1;
            }
            log::trace!("patient {}: {decision:?} treated={treated}", patient.id());
            self.treatment_status.insert(patient.id(), treated);
        }

        for patient in patients.iter_mut() {
            self.reclaim_idle_staff(patient);
        }
        self.nurses.clamp();
        self.doctors.clamp();
        report
    }

    /// Administer the patient's current plan if stock and staff allow.
    fn treat(&mut self, patient: &mut Patient) -> bool {
        let mut stage = std::mem::take(&mut patient.stage);
        let treated = match stage.active_mut() {
            Some(active) => self.administer(active.plan_mut(), patient),
            None => false,
        };
        patient.stage = stage;
        treated
    }

    fn administer(&mut self, plan: &mut TreatmentPlan, patient: &mut Patient) -> bool {
        let doses = plan.required_material_resources();
        let required = ActiveStaff {
            nurses: plan.required_nurses(),
            doctors: plan.required_doctors(),
        };
        let held = patient.active_staff();
        let nurse_increment = i64::from(required.nurses) - i64::from(held.nurses);
        let doctor_increment = i64::from(required.doctors) - i64::from(held.doctors);

        if !(self.stock.covers(&doses)
            && self.nurses.can_check_out(nurse_increment)
            && self.doctors.can_check_out(doctor_increment))
        {
            return false;
        }

        let consumed = self.stock.consume_all(&doses);
        debug_assert!(consumed, "stock covered the doses but consumption failed");
        self.nurses.check_out(nurse_increment);
        self.doctors.check_out(doctor_increment);
        patient.active_staff = required;
        plan.apply_treatment(patient);
        patient.usage_mut().record_cycle(required, &doses);
        true
    }

    fn withhold_treatment(&mut self, patient: &mut Patient) {
        self.return_staff(patient);
        patient.worsen_conditions();
    }

    fn reclaim_idle_staff(&mut self, patient: &mut Patient) {
        let Stage::InTreatment(active) = &patient.stage else {
            return;
        };
        let plan = active.plan();
        let (next_nurses, next_doctors) = (plan.required_nurses(), plan.required_doctors());
        if next_nurses != patient.active_staff.nurses {
            self.nurses.release(patient.active_staff.nurses);
            patient.active_staff.nurses = 0;
        }
        if next_doctors != patient.active_staff.doctors {
            self.doctors.release(patient.active_staff.doctors);
            patient.active_staff.doctors = 0;
        }
    }
}
