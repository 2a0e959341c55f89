//! Treatment plans: duty-cycled staffing, periodic dosing, and the effect of a
//! treated cycle on a patient.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::condition::ConditionKind;
use crate::patient::Patient;
use crate::resources::{Doses, MaterialResource};
use crate::trajectory::TrajectoryId;

/// Periodic on/off presence pattern for one staff role.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DutyCycle {
    /// Staff needed while the cycle is in its on phase.
    pub needed: u32,
    /// Consecutive plan cycles the staff are present.
    pub on_time: u32,
    /// Consecutive plan cycles the staff are away.
    pub off_time: u32,
}

impl DutyCycle {
    #[must_use]
    pub const fn new(needed: u32, on_time: u32, off_time: u32) -> Self {
        Self {
            needed,
            on_time,
            off_time,
        }
    }

    /// Whether staff are present at `cycle`. A zero-length period is never active.
    #[must_use]
    pub const fn is_active(self, cycle: u32) -> bool {
        let period = self.on_time.saturating_add(self.off_time);
        if period == 0 {
            return false;
        }
        cycle % period < self.on_time
    }

    /// Staff needed at `cycle`.
    #[must_use]
    pub const fn required_at(self, cycle: u32) -> u32 {
        if self.is_active(cycle) { self.needed } else { 0 }
    }
}

/// Dose and cadence for one material resource.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaterialOrder {
    pub dose: f64,
    /// Plan cycles between administrations; `0` administers once at plan start.
    pub frequency: u32,
}

impl MaterialOrder {
    #[must_use]
    pub const fn is_due(self, cycle: u32) -> bool {
        if self.frequency == 0 {
            cycle == 0
        } else {
            cycle % self.frequency == 0
        }
    }
}

/// Description of one stage of care. Every plan created from the same
/// trajectory starts from an identical copy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TreatmentProtocol {
    /// Treated conditions with the fraction of severity removed per treated cycle.
    pub efficacies: BTreeMap<ConditionKind, f64>,
    pub materials: BTreeMap<MaterialResource, MaterialOrder>,
    pub nurses: DutyCycle,
    pub doctors: DutyCycle,
    pub total_cycles: u32,
}

/// A protocol instantiated for a single patient, with its own cycle counter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreatmentPlan {
    id: TrajectoryId,
    protocol: TreatmentProtocol,
    /// Treated cycles administered so far.
    cycle: u32,
}

impl TreatmentPlan {
    #[must_use]
    pub const fn new(id: TrajectoryId, protocol: TreatmentProtocol) -> Self {
        Self {
            id,
            protocol,
            cycle: 0,
        }
    }

    #[must_use]
    pub const fn id(&self) -> TrajectoryId {
        self.id
    }

    #[must_use]
    pub const fn protocol(&self) -> &TreatmentProtocol {
        &self.protocol
    }

    #[must_use]
    pub const fn cycle(&self) -> u32 {
        self.cycle
    }

    /// Configured plan duration in cycles.
    #[must_use]
    pub const fn length(&self) -> u32 {
        self.protocol.total_cycles
    }

    /// Cycles left before the configured duration is reached.
    #[must_use]
    pub const fn remaining_length(&self) -> u32 {
        self.protocol.total_cycles.saturating_sub(self.cycle)
    }

    /// Doses due in the current plan cycle.
    #[must_use]
    pub fn required_material_resources(&self) -> Doses {
        self.protocol
            .materials
            .iter()
            .filter(|(_, order)| order.is_due(self.cycle))
            .map(|(&resource, order)| (resource, order.dose))
            .collect()
    }

    #[must_use]
    pub const fn required_nurses(&self) -> u32 {
        self.protocol.nurses.required_at(self.cycle)
    }

    #[must_use]
    pub const fn required_doctors(&self) -> u32 {
        self.protocol.doctors.required_at(self.cycle)
    }

    /// Administer one treated cycle: each treated condition the patient has
    /// decays geometrically by `(1 - efficacy)`, then the plan advances one
    /// cycle regardless of how many conditions were touched.
    pub fn apply_treatment(&mut self, patient: &mut Patient) {
        for (&kind, &efficacy) in &self.protocol.efficacies {
            if let Some(condition) = patient.condition_mut(kind) {
                let treated = condition.probability_of_mortality() * (1.0 - efficacy);
                condition.set_probability_of_mortality(treated);
            }
        }
        self.cycle = self.cycle.saturating_add(1);
    }
}
