//! Run parameters for a simulation.
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{
    DEFAULT_ARRIVAL_PROBABILITY, DEFAULT_ARRIVAL_SLOTS, DEFAULT_CYCLES_PER_DAY,
    DEFAULT_DAY_SHIFT_END, DEFAULT_DAY_SHIFT_START, DEFAULT_DOCTORS_ON_SHIFT, DEFAULT_MAX_AGE,
    DEFAULT_MIN_AGE, DEFAULT_NURSES_ON_SHIFT, DEFAULT_TOTAL_CYCLES,
};
use crate::hospital::HospitalConfig;

/// Errors raised when run parameters are out of bounds.
#[derive(Debug, Error)]
pub enum SimulationConfigError {
    #[error("{field} must be between {min:.2} and {max:.2} (got {value:.2})")]
    RangeViolation {
        field: &'static str,
        min: f64,
        max: f64,
        value: f64,
    },
    #[error("{field} must be at least {min} (got {value})")]
    MinViolation {
        field: &'static str,
        min: u32,
        value: u32,
    },
    #[error("age window invalid (min {min} > max {max})")]
    AgeRange { min: u32, max: u32 },
    #[error("day shift {start}..{end} does not fit a {cycles_per_day}-cycle day")]
    ShiftWindow {
        start: u32,
        end: u32,
        cycles_per_day: u32,
    },
    #[error("simulation config could not be parsed: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Staff on shift for one part of the day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffLevels {
    pub nurses: u32,
    pub doctors: u32,
}

impl Default for StaffLevels {
    fn default() -> Self {
        Self {
            nurses: DEFAULT_NURSES_ON_SHIFT,
            doctors: DEFAULT_DOCTORS_ON_SHIFT,
        }
    }
}

/// Day/night staffing. The day shift covers cycles `[day_start, day_end)` of
/// each day; the rest of the day is covered by the night shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftSchedule {
    #[serde(default = "ShiftSchedule::default_cycles_per_day")]
    pub cycles_per_day: u32,
    #[serde(default = "ShiftSchedule::default_day_start")]
    pub day_start: u32,
    #[serde(default = "ShiftSchedule::default_day_end")]
    pub day_end: u32,
    #[serde(default)]
    pub day: StaffLevels,
    #[serde(default)]
    pub night: StaffLevels,
}

impl ShiftSchedule {
    #[must_use]
    pub const fn default_cycles_per_day() -> u32 {
        DEFAULT_CYCLES_PER_DAY
    }

    #[must_use]
    pub const fn default_day_start() -> u32 {
        DEFAULT_DAY_SHIFT_START
    }

    #[must_use]
    pub const fn default_day_end() -> u32 {
        DEFAULT_DAY_SHIFT_END
    }

    /// The same staffing around the clock.
    #[must_use]
    pub fn constant(nurses: u32, doctors: u32) -> Self {
        let levels = StaffLevels { nurses, doctors };
        Self {
            day: levels,
            night: levels,
            ..Self::default()
        }
    }

    /// Staffing in effect at a simulation cycle.
    #[must_use]
    pub fn staffing_at(&self, cycle: u32) -> StaffLevels {
        let time_of_day = cycle % self.cycles_per_day.max(1);
        if (self.day_start..self.day_end).contains(&time_of_day) {
            self.day
        } else {
            self.night
        }
    }

    fn validate(&self) -> Result<(), SimulationConfigError> {
        if self.cycles_per_day == 0 {
            return Err(SimulationConfigError::MinViolation {
                field: "shifts.cycles_per_day",
                min: 1,
                value: 0,
            });
        }
        if self.day_start > self.day_end || self.day_end > self.cycles_per_day {
            return Err(SimulationConfigError::ShiftWindow {
                start: self.day_start,
                end: self.day_end,
                cycles_per_day: self.cycles_per_day,
            });
        }
        Ok(())
    }
}

impl Default for ShiftSchedule {
    fn default() -> Self {
        Self {
            cycles_per_day: Self::default_cycles_per_day(),
            day_start: Self::default_day_start(),
            day_end: Self::default_day_end(),
            day: StaffLevels::default(),
            night: StaffLevels::default(),
        }
    }
}

/// Parameters for one simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Chance that an arrival slot admits a patient in a given cycle.
    #[serde(default = "SimulationConfig::default_arrival_probability")]
    pub arrival_probability: f64,
    /// Independent arrival draws per cycle.
    #[serde(default = "SimulationConfig::default_arrival_slots")]
    pub arrival_slots: u32,
    #[serde(default = "SimulationConfig::default_total_cycles")]
    pub total_cycles: u32,
    #[serde(default = "SimulationConfig::default_min_age")]
    pub min_age: u32,
    #[serde(default = "SimulationConfig::default_max_age")]
    pub max_age: u32,
    #[serde(default)]
    pub shifts: ShiftSchedule,
    #[serde(default)]
    pub hospital: HospitalConfig,
}

impl SimulationConfig {
    #[must_use]
    pub const fn default_arrival_probability() -> f64 {
        DEFAULT_ARRIVAL_PROBABILITY
    }

    #[must_use]
    pub const fn default_arrival_slots() -> u32 {
        DEFAULT_ARRIVAL_SLOTS
    }

    #[must_use]
    pub const fn default_total_cycles() -> u32 {
        DEFAULT_TOTAL_CYCLES
    }

    #[must_use]
    pub const fn default_min_age() -> u32 {
        DEFAULT_MIN_AGE
    }

    #[must_use]
    pub const fn default_max_age() -> u32 {
        DEFAULT_MAX_AGE
    }

    /// Parse overrides from JSON; missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns `SimulationConfigError::Parse` for malformed JSON, or the first
    /// validation failure.
    pub fn from_json(json: &str) -> Result<Self, SimulationConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    ///
    /// Returns `SimulationConfigError` when any field violates its bounds.
    pub fn validate(&self) -> Result<(), SimulationConfigError> {
        if !(0.0..=1.0).contains(&self.arrival_probability) {
            return Err(SimulationConfigError::RangeViolation {
                field: "arrival_probability",
                min: 0.0,
                max: 1.0,
                value: self.arrival_probability,
            });
        }
        if self.arrival_slots == 0 {
            return Err(SimulationConfigError::MinViolation {
                field: "arrival_slots",
                min: 1,
                value: 0,
            });
        }
        if self.total_cycles == 0 {
            return Err(SimulationConfigError::MinViolation {
                field: "total_cycles",
                min: 1,
                value: 0,
            });
        }
        if self.min_age > self.max_age {
            return Err(SimulationConfigError::AgeRange {
                min: self.min_age,
                max: self.max_age,
            });
        }
        self.shifts.validate()
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            arrival_probability: Self::default_arrival_probability(),
            arrival_slots: Self::default_arrival_slots(),
            total_cycles: Self::default_total_cycles(),
            min_age: Self::default_min_age(),
            max_age: Self::default_max_age(),
            shifts: ShiftSchedule::default(),
            hospital: HospitalConfig::default(),
        }
    }
}
