//! Trajectory rule table: severity-matched care plans and their successors.
//!
//! Rows arrive as text cells, the way a spreadsheet export renders them.
//! Each row is parsed on its own; a malformed row is logged and skipped
//! without affecting the rest of the table.
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::condition::ConditionKind;
use crate::resources::{MaterialResource, NO_RESOURCE_KEY};
use crate::treatment::{DutyCycle, MaterialOrder, TreatmentProtocol};

/// Identifier of a trajectory row, shared by the plans created from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrajectoryId(pub u32);

impl fmt::Display for TrajectoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Half-open-low severity interval `(min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeverityRange {
    pub min: f64,
    pub max: f64,
}

impl SeverityRange {
    #[must_use]
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    #[must_use]
    pub fn contains(self, probability: f64) -> bool {
        probability > self.min && probability <= self.max
    }
}

impl FromStr for SeverityRange {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || RuleError::InvalidSeverity(s.trim().to_string());
        let (min, max) = s.trim().split_once('-').ok_or_else(invalid)?;
        let min: f64 = min.trim().parse().map_err(|_| invalid())?;
        let max: f64 = max.trim().parse().map_err(|_| invalid())?;
        if !(min.is_finite() && max.is_finite()) || min > max {
            return Err(invalid());
        }
        Ok(Self { min, max })
    }
}

/// One `(condition, severity range)` pair a patient must satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    pub condition: ConditionKind,
    pub severity: SeverityRange,
}

/// What happens once a trajectory's duration has elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum NextStep {
    /// Remain on this trajectory while it still matches.
    Stay,
    /// Patient is ready for discharge.
    Discharge,
    /// Move to the named trajectory.
    Successor(TrajectoryId),
}

/// A parsed trajectory row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryRule {
    pub id: TrajectoryId,
    pub requirements: Vec<Requirement>,
    pub protocol: TreatmentProtocol,
    pub next: NextStep,
}

impl TrajectoryRule {
    /// Parse a text row into a rule.
    ///
    /// Unknown identifiers in the treated-condition and resource lists are
    /// dropped with a warning; everything else that fails to parse rejects the
    /// whole row.
    ///
    /// # Errors
    ///
    /// Returns a `RuleError` describing the first malformed field.
    pub fn parse(row: &TrajectoryRow) -> Result<Self, RuleError> {
        let id = TrajectoryId(parse_number(&row.id, "id")?);
        if id.0 == 0 {
            return Err(RuleError::ReservedId);
        }

        let requirements = parse_requirements(row)?;
        let efficacies = parse_efficacies(id, row)?;
        let materials = parse_materials(id, row)?;

        let nurses = DutyCycle::new(
            parse_number(&row.nurses, "nurses")?,
            parse_number(&row.nurse_on_time, "nurse_on_time")?,
            parse_number(&row.nurse_off_time, "nurse_off_time")?,
        );
        let doctors = DutyCycle::new(
            parse_number(&row.doctors, "doctors")?,
            parse_number(&row.doctor_on_time, "doctor_on_time")?,
            parse_number(&row.doctor_off_time, "doctor_off_time")?,
        );
        let total_cycles = parse_number(&row.total_cycles, "total_cycles")?;

        let next = match row.next_trajectory.as_deref().map(str::trim) {
            None | Some("") => NextStep::Stay,
            Some(cell) => match parse_number::<u32>(cell, "next_trajectory")? {
                0 => NextStep::Discharge,
                next => NextStep::Successor(TrajectoryId(next)),
            },
        };

        Ok(Self {
            id,
            requirements,
            protocol: TreatmentProtocol {
                efficacies,
                materials,
                nurses,
                doctors,
                total_cycles,
            },
            next,
        })
    }
}

/// Raw trajectory row as text cells.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrajectoryRow {
    pub id: String,
    /// Comma-separated condition identifiers the patient must hold.
    pub conditions: String,
    /// Comma-separated `min-max` ranges aligned with `conditions`.
    pub severities: String,
    pub treated_conditions: String,
    pub material_resources: String,
    /// Aligned with `treated_conditions`.
    pub efficacies: String,
    /// Aligned with `material_resources`.
    pub dosages: String,
    pub frequencies: String,
    pub nurses: String,
    pub nurse_on_time: String,
    pub nurse_off_time: String,
    pub doctors: String,
    pub doctor_on_time: String,
    pub doctor_off_time: String,
    pub total_cycles: String,
    #[serde(default)]
    pub next_trajectory: Option<String>,
}

/// Recoverable problems with a single trajectory row.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RuleError {
    #[error("{field} is not a valid number (got `{value}`)")]
    InvalidNumber { field: &'static str, value: String },
    #[error("invalid severity range `{0}`; expected `min-max` with min <= max")]
    InvalidSeverity(String),
    #[error("unknown condition `{0}` in patient requirements")]
    UnknownCondition(String),
    #[error("condition {0} is required more than once")]
    DuplicateRequirement(ConditionKind),
    #[error("{field} lists {found} entries but {expected} were expected")]
    LengthMismatch {
        field: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("efficacy for {condition} must lie in [0, 1) (got {value})")]
    EfficacyOutOfRange { condition: ConditionKind, value: f64 },
    #[error("dose for {resource} must be positive (got {value})")]
    InvalidDose { resource: MaterialResource, value: f64 },
    #[error("trajectory id 0 is reserved for discharge")]
    ReservedId,
}

/// Fatal problems with a trajectory table as a whole.
#[derive(Debug, Error)]
pub enum TableError {
    #[error("trajectory table could not be parsed: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("trajectory table has no usable rules ({rows} rows read)")]
    NoValidRules { rows: usize },
}

/// Ordered, validated trajectory rules.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrajectoryTable {
    rules: Vec<TrajectoryRule>,
    index: HashMap<TrajectoryId, usize>,
}

impl TrajectoryTable {
    /// Parse a JSON array of text rows.
    ///
    /// # Errors
    ///
    /// Returns `TableError::Parse` for unparseable JSON and
    /// `TableError::NoValidRules` when every row is rejected.
    pub fn from_json(json: &str) -> Result<Self, TableError> {
        let rows: Vec<TrajectoryRow> = serde_json::from_str(json)?;
        Self::from_rows(&rows)
    }

    /// Build a table from text rows, skipping malformed rows with a warning.
    /// A leading row whose id is not numeric is treated as a header.
    ///
    /// # Errors
    ///
    /// Returns `TableError::NoValidRules` when no row survives parsing.
    pub fn from_rows(rows: &[TrajectoryRow]) -> Result<Self, TableError> {
        let mut table = Self::default();
        for (position, row) in rows.iter().enumerate() {
            if position == 0 && row.id.trim().parse::<u32>().is_err() {
                log::debug!("trajectory table: skipping header row");
                continue;
            }
            match TrajectoryRule::parse(row) {
                Ok(rule) => table.push(rule),
                Err(err) => log::warn!(
                    "trajectory row {} (id `{}`) skipped: {err}",
                    position + 1,
                    row.id.trim()
                ),
            }
        }
        table.finish(rows.len())
    }

    /// Build a table from already-parsed rules, keeping the first of any
    /// duplicated id.
    ///
    /// # Errors
    ///
    /// Returns `TableError::NoValidRules` when `rules` is empty.
    pub fn from_rules<I>(rules: I) -> Result<Self, TableError>
    where
        I: IntoIterator<Item = TrajectoryRule>,
    {
        let mut table = Self::default();
        let mut read = 0;
        for rule in rules {
            read += 1;
            table.push(rule);
        }
        table.finish(read)
    }

    fn push(&mut self, rule: TrajectoryRule) {
        if self.index.contains_key(&rule.id) {
            log::warn!("trajectory {} defined more than once; keeping the first", rule.id);
            return;
        }
        self.index.insert(rule.id, self.rules.len());
        self.rules.push(rule);
    }

    fn finish(self, rows: usize) -> Result<Self, TableError> {
        if self.rules.is_empty() {
            return Err(TableError::NoValidRules { rows });
        }
        for rule in &self.rules {
            if let NextStep::Successor(next) = rule.next
                && !self.index.contains_key(&next)
            {
                log::warn!(
                    "trajectory {} names missing successor {next}; it will be rematched on completion",
                    rule.id
                );
            }
        }
        log::info!("trajectory table loaded: {} of {rows} rows usable", self.rules.len());
        Ok(self)
    }

    #[must_use]
    pub fn rule(&self, id: TrajectoryId) -> Option<&TrajectoryRule> {
        self.index.get(&id).and_then(|&position| self.rules.get(position))
    }

    /// Rules in table order.
    #[must_use]
    pub fn rules(&self) -> &[TrajectoryRule] {
        &self.rules
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn split_list(cell: &str) -> Vec<&str> {
    cell.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .collect()
}

fn parse_number<T: FromStr>(cell: &str, field: &'static str) -> Result<T, RuleError> {
    cell.trim().parse().map_err(|_| RuleError::InvalidNumber {
        field,
        value: cell.trim().to_string(),
    })
}

fn parse_numbers<T: FromStr>(cell: &str, field: &'static str) -> Result<Vec<T>, RuleError> {
    split_list(cell)
        .into_iter()
        .map(|token| parse_number(token, field))
        .collect()
}

fn expect_len(field: &'static str, expected: usize, found: usize) -> Result<(), RuleError> {
    if expected == found {
        Ok(())
    } else {
        Err(RuleError::LengthMismatch {
            field,
            expected,
            found,
        })
    }
}

fn parse_requirements(row: &TrajectoryRow) -> Result<Vec<Requirement>, RuleError> {
    let conditions = split_list(&row.conditions);
    let severities = split_list(&row.severities);
    expect_len("severities", conditions.len(), severities.len())?;

    let mut requirements: Vec<Requirement> = Vec::with_capacity(conditions.len());
    for (name, range) in conditions.into_iter().zip(severities) {
        let condition = name
            .parse::<ConditionKind>()
            .map_err(|err| RuleError::UnknownCondition(err.0))?;
        if requirements.iter().any(|req| req.condition == condition) {
            return Err(RuleError::DuplicateRequirement(condition));
        }
        requirements.push(Requirement {
            condition,
            severity: range.parse()?,
        });
    }
    Ok(requirements)
}

fn parse_efficacies(
    id: TrajectoryId,
    row: &TrajectoryRow,
) -> Result<BTreeMap<ConditionKind, f64>, RuleError> {
    let treated = split_list(&row.treated_conditions);
    let values: Vec<f64> = parse_numbers(&row.efficacies, "efficacies")?;
    expect_len("efficacies", treated.len(), values.len())?;

    let mut efficacies = BTreeMap::new();
    for (name, value) in treated.into_iter().zip(values) {
        let Ok(condition) = name.parse::<ConditionKind>() else {
            log::warn!("trajectory {id}: ignoring unknown treated condition `{name}`");
            continue;
        };
        if !(0.0..1.0).contains(&value) {
            return Err(RuleError::EfficacyOutOfRange { condition, value });
        }
        efficacies.insert(condition, value);
    }
    Ok(efficacies)
}

fn parse_materials(
    id: TrajectoryId,
    row: &TrajectoryRow,
) -> Result<BTreeMap<MaterialResource, MaterialOrder>, RuleError> {
    let resources = split_list(&row.material_resources);
    let dosages: Vec<f64> = parse_numbers(&row.dosages, "dosages")?;
    let frequencies: Vec<u32> = parse_numbers(&row.frequencies, "frequencies")?;
    expect_len("dosages", resources.len(), dosages.len())?;
    expect_len("frequencies", resources.len(), frequencies.len())?;

    let mut materials = BTreeMap::new();
    for ((name, dose), frequency) in resources.into_iter().zip(dosages).zip(frequencies) {
        if name.eq_ignore_ascii_case(NO_RESOURCE_KEY) {
            continue;
        }
        let Ok(resource) = name.parse::<MaterialResource>() else {
            log::warn!("trajectory {id}: ignoring unknown material resource `{name}`");
            continue;
        };
        if !(dose > 0.0 && dose.is_finite()) {
            return Err(RuleError::InvalidDose {
                resource,
                value: dose,
            });
        }
        materials.insert(resource, MaterialOrder { dose, frequency });
    }
    Ok(materials)
}
