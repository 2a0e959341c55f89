use mmh_model::{
    Condition, ConditionKind, DutyCycle, HospitalConfig, MaterialOrder, MaterialResource,
    NextStep, Patient, PatientGenerator, PatientId, Requirement, SeverityRange, ShiftSchedule,
    SimulationConfig, Simulator, StageManager, Stock, TrajectoryId, TrajectoryRule,
    TrajectoryTable, TreatmentProtocol,
};
use rand::RngCore;
use std::collections::BTreeMap;

/// Admits low-risk PPH patients numbered from 1.
struct FixedGenerator {
    issued: u32,
}

impl PatientGenerator for FixedGenerator {
    fn create_patient(&mut self, min_age: u32, _max_age: u32, _rng: &mut dyn RngCore) -> Patient {
        self.issued += 1;
        Patient::new(
            PatientId(self.issued),
            min_age,
            [Condition::new(ConditionKind::Pph, 0.01, 1.0)],
        )
    }
}

fn pph_rule(id: u32, dose: f64, nurses: DutyCycle, length: u32, next: NextStep) -> TrajectoryRule {
    TrajectoryRule {
        id: TrajectoryId(id),
        requirements: vec![Requirement {
            condition: ConditionKind::Pph,
            severity: SeverityRange::new(0.0, 1.0),
        }],
        protocol: TreatmentProtocol {
            efficacies: BTreeMap::from([(ConditionKind::Pph, 0.5)]),
            materials: BTreeMap::from([(
                MaterialResource::Oxytocin,
                MaterialOrder {
                    dose,
                    frequency: 1,
                },
            )]),
            nurses,
            doctors: DutyCycle::default(),
            total_cycles: length,
        },
        next,
    }
}

fn quiet_config(cycles: u32, nurses: u32, oxytocin: f64) -> SimulationConfig {
    SimulationConfig {
        arrival_probability: 0.0,
        total_cycles: cycles,
        shifts: ShiftSchedule::constant(nurses, 0),
        hospital: HospitalConfig {
            stock: Stock::from_levels([(MaterialResource::Oxytocin, oxytocin)]),
        },
        ..SimulationConfig::default()
    }
}

fn pph_patient(p: f64) -> Patient {
    Patient::new(
        PatientId(900),
        27,
        [Condition::new(ConditionKind::Pph, p, 1.0)],
    )
}

#[test]
fn stock_runs_out_after_two_doses() {
    let table = TrajectoryTable::from_rules([pph_rule(
        1,
        5.0,
        DutyCycle::new(1, 1, 0),
        3,
        NextStep::Stay,
    )])
    .unwrap();
    let mut sim = Simulator::new(
        quiet_config(3, 1, 10.0),
        table,
        FixedGenerator { issued: 0 },
        7,
    )
    .unwrap();
    sim.admit(pph_patient(4e-8));

    let first = sim.step().unwrap();
    assert_eq!(first.treatment.treated, 1);
    assert!((sim.hospital().stock().level(MaterialResource::Oxytocin) - 5.0).abs() < 1e-12);
    assert_eq!(sim.patients()[0].active_staff().nurses, 1);
    assert_eq!(sim.hospital().nurses().available, 0);

    let second = sim.step().unwrap();
    assert_eq!(second.treatment.treated, 1);
    assert!(sim.hospital().stock().level(MaterialResource::Oxytocin).abs() < 1e-12);
    assert_eq!(sim.patients()[0].active_staff().nurses, 1);

    let third = sim.step().unwrap();
    assert_eq!(third.treatment.untreated, 1);
    assert_eq!(sim.patients()[0].active_staff().nurses, 0);
    assert_eq!(sim.hospital().nurses().available, 1);
    assert_eq!(
        sim.patients()[0]
            .stage()
            .active()
            .map(|stage| stage.cycles_in_stage()),
        Some(2)
    );
    assert!(sim.step().is_none());

    let log = sim.log();
    let treated: Vec<bool> = log
        .cycles
        .iter()
        .map(|cycle| cycle.patients[0].treated)
        .collect();
    assert_eq!(treated, vec![true, true, false]);

    let severities: Vec<f64> = log
        .cycles
        .iter()
        .map(|cycle| cycle.patients[0].probability_of_mortality)
        .collect();
    assert!((severities[0] - 2e-8).abs() < 1e-15);
    assert!((severities[1] - 1e-8).abs() < 1e-15);
    assert!(severities[2] > severities[1]);
    assert!(log.deaths.is_empty());
    assert_eq!(log.cycles[1].patients[0].active_staff.nurses, 1);
    assert_eq!(log.cycles[2].patients[0].active_staff.nurses, 0);
}

#[test]
fn trajectory_chain_ends_in_discharge() {
    let always_one = DutyCycle::new(1, 1, 0);
    let table = TrajectoryTable::from_rules([
        pph_rule(1, 1.0, always_one, 2, NextStep::Successor(TrajectoryId(2))),
        pph_rule(2, 1.0, always_one, 1, NextStep::Discharge),
    ])
    .unwrap();
    let mut sim = Simulator::new(
        quiet_config(8, 2, 100.0),
        table,
        FixedGenerator { issued: 0 },
        11,
    )
    .unwrap();
    sim.admit(pph_patient(0.0004));

    let mut discharged_at = None;
    while let Some(outcome) = sim.step() {
        if outcome.discharged.contains(&PatientId(900)) {
            discharged_at = Some(outcome.cycle);
        }
    }
    assert_eq!(discharged_at, Some(5));

    let log = sim.log();
    let trajectories: Vec<Option<u32>> = log
        .cycles
        .iter()
        .take(5)
        .map(|cycle| cycle.patients[0].trajectory.map(|id| id.0))
        .collect();
    assert_eq!(
        trajectories,
        vec![Some(1), Some(1), Some(1), Some(2), Some(2)]
    );
    let leaving = &log.cycles[5].patients;
    assert_eq!(leaving.len(), 1);
    assert!(leaving[0].alive);
    assert_eq!(leaving[0].trajectory, None);
    assert_eq!(log.cycles[5].discharges, 1);
    assert_eq!(log.cycles[5].hospital.nurses.available, 2);

    let record = &log.discharges[0];
    assert_eq!(record.id, PatientId(900));
    assert_eq!(record.stay_cycles, 6);
    assert_eq!(record.usage.nurse_cycles, 5);
    assert!((record.usage.material(MaterialResource::Oxytocin) - 5.0).abs() < 1e-12);
    assert!(log.deaths.is_empty());
}

#[test]
fn condition_count_must_match_exactly() {
    let table = TrajectoryTable::from_rules([pph_rule(
        1,
        1.0,
        DutyCycle::default(),
        4,
        NextStep::Stay,
    )])
    .unwrap();
    let rule = &table.rules()[0];
    let comorbid = Patient::new(
        PatientId(1),
        30,
        [
            Condition::new(ConditionKind::Pph, 0.3, 1.0),
            Condition::new(ConditionKind::Sepsis, 0.3, 1.0),
        ],
    );
    assert!(!StageManager::satisfies(&comorbid, rule));
    assert!(StageManager::new(table.clone()).find_match(&comorbid).is_none());
    assert!(StageManager::satisfies(&pph_patient(0.3), rule));
}

#[test]
fn arrivals_use_the_generator() {
    let table = TrajectoryTable::from_rules([pph_rule(
        1,
        1.0,
        DutyCycle::default(),
        4,
        NextStep::Stay,
    )])
    .unwrap();
    let config = SimulationConfig {
        arrival_probability: 1.0,
        arrival_slots: 3,
        ..quiet_config(2, 0, 1_000.0)
    };
    let mut sim = Simulator::new(config, table, FixedGenerator { issued: 0 }, 3).unwrap();
    let outcome = sim.step().unwrap();
    assert_eq!(
        outcome.admitted,
        vec![PatientId(1), PatientId(2), PatientId(3)]
    );
    assert_eq!(sim.log().patients.len(), 3);
    assert_eq!(sim.log().cycles[0].admissions, 3);
}

#[test]
fn leaving_patients_appear_in_their_last_cycle() {
    let sepsis_only = TrajectoryTable::from_rules([TrajectoryRule {
        id: TrajectoryId(1),
        requirements: vec![Requirement {
            condition: ConditionKind::Sepsis,
            severity: SeverityRange::new(0.0, 1.0),
        }],
        protocol: TreatmentProtocol {
            total_cycles: 4,
            ..TreatmentProtocol::default()
        },
        next: NextStep::Stay,
    }])
    .unwrap();
    let mut sim = Simulator::new(
        quiet_config(1, 0, 0.0),
        sepsis_only,
        FixedGenerator { issued: 0 },
        5,
    )
    .unwrap();
    sim.admit(pph_patient(0.999_999));

    let outcome = sim.step().unwrap();
    assert_eq!(outcome.died, vec![PatientId(900)]);
    assert_eq!(outcome.census, 0);

    let cycle = &sim.log().cycles[0];
    assert_eq!(cycle.deaths, 1);
    assert_eq!(cycle.patients.len(), 1);
    let snapshot = &cycle.patients[0];
    assert_eq!(snapshot.id, PatientId(900));
    assert_eq!(snapshot.age, 27);
    assert!(!snapshot.alive);
    assert!(!snapshot.treated);
}
