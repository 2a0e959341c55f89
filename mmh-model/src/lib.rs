//! MMH Model
//!
//! Discrete-cycle simulation of patient flow through a resource-constrained
//! maternity hospital: admission, condition progression, trajectory-based
//! treatment plans, contention for staff and stock, and survival.
//! This crate carries no I/O of its own; tables arrive through [`TableSource`]
//! and finished logs leave through [`LogStore`].

pub mod condition;
pub mod config;
pub mod constants;
pub mod hospital;
pub mod incidence;
pub mod ledger;
pub mod mortality;
pub mod numbers;
pub mod patient;
pub mod resources;
pub mod rng;
pub mod simulation;
pub mod stage;
pub mod trajectory;
pub mod treatment;

use anyhow::Context;

// Re-export commonly used types
pub use condition::{Condition, ConditionKind, UnknownCondition};
pub use config::{ShiftSchedule, SimulationConfig, SimulationConfigError, StaffLevels};
pub use hospital::{Hospital, HospitalConfig, HospitalSnapshot, StaffPool, TreatmentReport};
pub use incidence::{
    ConditionProfile, ConditionTableData, IncidenceEntry, IncidenceError, IncidenceTable,
    PatientGenerator, Shiva,
};
pub use ledger::{
    AdmissionRecord, ConditionSnapshot, CycleRecord, LogStore, ModelLog, ModelLogger,
    OutcomeRecord, PatientSnapshot,
};
pub use patient::{ActiveStaff, ConditionSet, Patient, PatientId, ResourceUsage};
pub use resources::{Doses, MaterialResource, Stock, UnknownResource};
pub use rng::{CountingRng, RngBundle};
pub use simulation::{CycleOutcome, Simulator};
pub use stage::{ActiveStage, Stage, StageDecision, StageManager};
pub use trajectory::{
    NextStep, Requirement, RuleError, SeverityRange, TableError, TrajectoryId, TrajectoryRow,
    TrajectoryRule, TrajectoryTable,
};
pub use treatment::{DutyCycle, MaterialOrder, TreatmentPlan, TreatmentProtocol};

const DEFAULT_TRAJECTORIES: &str = include_str!("../data/trajectories.json");
const DEFAULT_CONDITIONS: &str = include_str!("../data/conditions.json");

/// Source of the rule tables a simulation is built from.
pub trait TableSource {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load the trajectory rows as text cells.
    ///
    /// # Errors
    ///
    /// Returns an error if the rows cannot be read.
    fn load_trajectory_rows(&self) -> Result<Vec<TrajectoryRow>, Self::Error>;

    /// Load condition profiles and admission incidence.
    ///
    /// # Errors
    ///
    /// Returns an error if the table cannot be read.
    fn load_condition_table(&self) -> Result<ConditionTableData, Self::Error>;
}

/// Tables bundled with the crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticTables;

impl TableSource for StaticTables {
    type Error = serde_json::Error;

    fn load_trajectory_rows(&self) -> Result<Vec<TrajectoryRow>, Self::Error> {
        serde_json::from_str(DEFAULT_TRAJECTORIES)
    }

    fn load_condition_table(&self) -> Result<ConditionTableData, Self::Error> {
        serde_json::from_str(DEFAULT_CONDITIONS)
    }
}

/// Builds simulators from loaded tables and persists their logs.
pub struct SimulationEngine<L, S>
where
    L: TableSource,
    S: LogStore,
{
    tables: L,
    store: S,
}

impl<L, S> SimulationEngine<L, S>
where
    L: TableSource,
    S: LogStore,
{
    pub const fn new(tables: L, store: S) -> Self {
        Self { tables, store }
    }

    /// Load and validate the tables, then assemble a simulator.
    ///
    /// # Errors
    ///
    /// Returns an error if a table cannot be loaded, the trajectory table has
    /// no usable rules, the incidence table does not sum to unity, or the
    /// configuration is invalid.
    pub fn create_simulator(&self, config: SimulationConfig, seed: u64) -> anyhow::Result<Simulator> {
        let rows = self
            .tables
            .load_trajectory_rows()
            .context("loading trajectory rows")?;
        let table = TrajectoryTable::from_rows(&rows)?;
        let conditions = self
            .tables
            .load_condition_table()
            .context("loading condition table")?;
        let incidence = IncidenceTable::new(&conditions)?;
        let simulator = Simulator::new(config, table, Shiva::new(incidence), seed)?;
        Ok(simulator)
    }

    /// Run a simulation to completion and save its log under `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the simulator cannot be built or the log cannot be saved.
    pub fn run_and_save(&self, name: &str, config: SimulationConfig, seed: u64) -> anyhow::Result<ModelLog> {
        let log = self.create_simulator(config, seed)?.run();
        self.store
            .save_log(name, &log)
            .with_context(|| format!("saving log `{name}`"))?;
        Ok(log)
    }

    /// Load a saved log.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be read.
    pub fn load_log(&self, name: &str) -> Result<Option<ModelLog>, S::Error> {
        self.store.load_log(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::convert::Infallible;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct MemoryStore {
        logs: Rc<RefCell<HashMap<String, ModelLog>>>,
    }

    impl LogStore for MemoryStore {
        type Error = Infallible;

        fn save_log(&self, name: &str, log: &ModelLog) -> Result<(), Self::Error> {
            self.logs.borrow_mut().insert(name.to_string(), log.clone());
            Ok(())
        }

        fn load_log(&self, name: &str) -> Result<Option<ModelLog>, Self::Error> {
            Ok(self.logs.borrow().get(name).cloned())
        }
    }

    #[derive(Clone, Copy, Default)]
    struct BrokenTables;

    impl TableSource for BrokenTables {
        type Error = serde_json::Error;

        fn load_trajectory_rows(&self) -> Result<Vec<TrajectoryRow>, Self::Error> {
            serde_json::from_str("[]")
        }

        fn load_condition_table(&self) -> Result<ConditionTableData, Self::Error> {
            StaticTables.load_condition_table()
        }
    }

    fn short_run() -> SimulationConfig {
        SimulationConfig {
            total_cycles: 48,
            ..SimulationConfig::default()
        }
    }

    #[test]
    fn bundled_tables_load() {
        let rows = StaticTables.load_trajectory_rows().unwrap();
        let table = TrajectoryTable::from_rows(&rows).unwrap();
        assert!(table.len() >= 10);
        let conditions = StaticTables.load_condition_table().unwrap();
        assert!(IncidenceTable::new(&conditions).is_ok());
    }

    #[test]
    fn engine_runs_and_saves() {
        let store = MemoryStore::default();
        let engine = SimulationEngine::new(StaticTables, store.clone());
        let log = engine.run_and_save("smoke", short_run(), 17).unwrap();
        assert_eq!(log.cycles.len(), 48);

        let loaded = engine.load_log("smoke").unwrap().unwrap();
        assert_eq!(loaded.cycles.len(), 48);
        assert_eq!(loaded.patients.len(), log.patients.len());
        assert!(engine.load_log("missing").unwrap().is_none());
    }

    #[test]
    fn empty_trajectory_table_is_fatal() {
        let engine = SimulationEngine::new(BrokenTables, MemoryStore::default());
        let err = engine.create_simulator(short_run(), 1).unwrap_err();
        assert!(err.downcast_ref::<TableError>().is_some());
    }

    #[test]
    fn invalid_config_is_fatal() {
        let engine = SimulationEngine::new(StaticTables, MemoryStore::default());
        let config = SimulationConfig {
            arrival_slots: 0,
            ..SimulationConfig::default()
        };
        let err = engine.create_simulator(config, 1).unwrap_err();
        assert!(err.downcast_ref::<SimulationConfigError>().is_some());
    }
}
