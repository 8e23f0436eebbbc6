// src/schedule.rs
use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::prelude::*;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

// --- Contract & Schedule Types ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContractType {
    Clt,
    Pj,
    Intern,
    Other,
}

impl ContractType {
    pub const ALL: [ContractType; 4] = [
        ContractType::Clt,
        ContractType::Pj,
        ContractType::Intern,
        ContractType::Other,
    ];

    /// Lenient parse of the labels found in the employee directory.
    /// Unknown labels return `None`, which the resolver treats as CLT.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_uppercase().as_str() {
            "CLT" => Some(ContractType::Clt),
            "PJ" => Some(ContractType::Pj),
            "ESTAGIO" | "ESTAGIARIO" | "INTERN" => Some(ContractType::Intern),
            "OUTRO" | "OTHER" => Some(ContractType::Other),
            _ => None,
        }
    }

    pub fn as_label(&self) -> &'static str {
        match self {
            ContractType::Clt => "CLT",
            ContractType::Pj => "PJ",
            ContractType::Intern => "INTERN",
            ContractType::Other => "OTHER",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScheduleType {
    #[serde(rename = "fixed-5x2")]
    Fixed5x2,
    #[serde(rename = "fixed-6x1")]
    Fixed6x1,
    #[serde(rename = "rotating-12x36")]
    Rotating12x36,
    CustomWeekly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BankPeriod {
    Monthly,
    Annual,
}

/// Hours per weekday, Monday first.
pub type WeeklyHours = [Decimal; 7];

// --- Rule Values ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRule {
    pub daily_hours: Decimal,
    pub tolerance_minutes: i64,
    pub overtime_rate: Decimal,
    pub night_rate: Decimal,
    pub monthly_hours: Decimal,
    pub schedule_type: ScheduleType,
    #[serde(default)]
    pub rotation_anchor: Option<NaiveDate>,
    #[serde(default)]
    pub weekly_hours: Option<WeeklyHours>,
    pub bank_period: BankPeriod,
    pub bank_start_month: u32,
}

impl ScheduleRule {
    /// Built-in default for a contract type. These are configuration values,
    /// the rule store may replace them.
    pub fn default_for(contract: ContractType) -> Self {
        let base = ScheduleRule {
            daily_hours: dec!(8),
            tolerance_minutes: 10,
            overtime_rate: dec!(1.5),
            night_rate: dec!(0.2),
            monthly_hours: dec!(220),
            schedule_type: ScheduleType::Fixed5x2,
            rotation_anchor: None,
            weekly_hours: None,
            bank_period: BankPeriod::Monthly,
            bank_start_month: 1,
        };
        match contract {
            ContractType::Clt | ContractType::Other => base,
            ContractType::Pj => ScheduleRule {
                overtime_rate: dec!(1.0),
                night_rate: dec!(0.0),
                monthly_hours: dec!(160),
                ..base
            },
            ContractType::Intern => ScheduleRule {
                daily_hours: dec!(6),
                overtime_rate: dec!(1.0),
                night_rate: dec!(0.0),
                monthly_hours: dec!(130),
                ..base
            },
        }
    }

    /// Field-by-field merge; a field set on the override wins.
    pub fn merged_with(&self, ov: &EmployeeOverride) -> ScheduleRule {
        ScheduleRule {
            daily_hours: ov.daily_hours.unwrap_or(self.daily_hours),
            tolerance_minutes: ov.tolerance_minutes.unwrap_or(self.tolerance_minutes),
            overtime_rate: ov.overtime_rate.unwrap_or(self.overtime_rate),
            night_rate: ov.night_rate.unwrap_or(self.night_rate),
            monthly_hours: ov.monthly_hours.unwrap_or(self.monthly_hours),
            schedule_type: ov.schedule_type.unwrap_or(self.schedule_type),
            rotation_anchor: ov.rotation_anchor.or(self.rotation_anchor),
            weekly_hours: ov.weekly_hours.or(self.weekly_hours),
            bank_period: ov.bank_period.unwrap_or(self.bank_period),
            bank_start_month: ov.bank_start_month.unwrap_or(self.bank_start_month),
        }
    }

    /// Checks applied when a rule is written to the rule store.
    pub fn validate(&self) -> Result<(), RuleError> {
        check_non_negative("dailyHours", Some(self.daily_hours))?;
        check_non_negative("overtimeRate", Some(self.overtime_rate))?;
        check_non_negative("nightRate", Some(self.night_rate))?;
        check_non_negative("monthlyHours", Some(self.monthly_hours))?;
        if self.tolerance_minutes < 0 {
            return Err(RuleError::Negative {
                field: "toleranceMinutes",
                value: Decimal::from(self.tolerance_minutes),
            });
        }
        check_weekly_hours(self.weekly_hours.as_ref())?;
        check_bank_start_month(Some(self.bank_start_month))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeOverride {
    pub employee_id: String,
    #[serde(default)]
    pub daily_hours: Option<Decimal>,
    #[serde(default)]
    pub tolerance_minutes: Option<i64>,
    #[serde(default)]
    pub overtime_rate: Option<Decimal>,
    #[serde(default)]
    pub night_rate: Option<Decimal>,
    #[serde(default)]
    pub monthly_hours: Option<Decimal>,
    #[serde(default)]
    pub schedule_type: Option<ScheduleType>,
    #[serde(default)]
    pub rotation_anchor: Option<NaiveDate>,
    #[serde(default)]
    pub weekly_hours: Option<WeeklyHours>,
    #[serde(default)]
    pub bank_period: Option<BankPeriod>,
    #[serde(default)]
    pub bank_start_month: Option<u32>,
}

impl EmployeeOverride {
    pub fn new(employee_id: &str) -> Self {
        Self {
            employee_id: employee_id.to_string(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), RuleError> {
        if self.employee_id.trim().is_empty() {
            return Err(RuleError::MissingEmployeeId);
        }
        check_non_negative("dailyHours", self.daily_hours)?;
        check_non_negative("overtimeRate", self.overtime_rate)?;
        check_non_negative("nightRate", self.night_rate)?;
        check_non_negative("monthlyHours", self.monthly_hours)?;
        if let Some(tolerance) = self.tolerance_minutes {
            if tolerance < 0 {
                return Err(RuleError::Negative {
                    field: "toleranceMinutes",
                    value: Decimal::from(tolerance),
                });
            }
        }
        check_weekly_hours(self.weekly_hours.as_ref())?;
        check_bank_start_month(self.bank_start_month)
    }
}

// --- Validation ---

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuleError {
    #[error("{field} must not be negative (got {value})")]
    Negative { field: &'static str, value: Decimal },
    #[error("weeklyHours entry for weekday {index} must not be negative (got {value})")]
    NegativeWeekday { index: usize, value: Decimal },
    #[error("bankStartMonth must be between 1 and 12 (got {0})")]
    BankStartMonth(u32),
    #[error("Override is missing its employee id")]
    MissingEmployeeId,
}

fn check_non_negative(field: &'static str, value: Option<Decimal>) -> Result<(), RuleError> {
    match value {
        Some(value) if value.is_sign_negative() && !value.is_zero() => {
            Err(RuleError::Negative { field, value })
        }
        _ => Ok(()),
    }
}

fn check_weekly_hours(hours: Option<&WeeklyHours>) -> Result<(), RuleError> {
    if let Some(hours) = hours {
        for (index, value) in hours.iter().enumerate() {
            if value.is_sign_negative() && !value.is_zero() {
                return Err(RuleError::NegativeWeekday {
                    index,
                    value: *value,
                });
            }
        }
    }
    Ok(())
}

fn check_bank_start_month(month: Option<u32>) -> Result<(), RuleError> {
    match month {
        Some(m) if !(1..=12).contains(&m) => Err(RuleError::BankStartMonth(m)),
        _ => Ok(()),
    }
}

// --- Rule Book (immutable snapshot) ---

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleBook {
    #[serde(default)]
    pub base: HashMap<ContractType, ScheduleRule>,
    #[serde(default)]
    pub overrides: Vec<EmployeeOverride>,
}

impl RuleBook {
    /// Rule book holding the four built-in defaults and no overrides.
    pub fn with_defaults() -> Self {
        let base = ContractType::ALL
            .iter()
            .map(|c| (*c, ScheduleRule::default_for(*c)))
            .collect();
        Self {
            base,
            overrides: Vec::new(),
        }
    }

    pub fn resolve(&self, employee_id: &str, contract: Option<ContractType>) -> ScheduleRule {
        resolve(&self.base, &self.overrides, employee_id, contract)
    }
}

/// Effective rule for an employee: the contract default (CLT when the
/// contract is unknown or has no default) merged with the employee override.
/// Never fails.
pub fn resolve(
    base: &HashMap<ContractType, ScheduleRule>,
    overrides: &[EmployeeOverride],
    employee_id: &str,
    contract: Option<ContractType>,
) -> ScheduleRule {
    let contract = contract.unwrap_or(ContractType::Clt);
    let default_rule = base
        .get(&contract)
        .or_else(|| base.get(&ContractType::Clt))
        .cloned()
        .unwrap_or_else(|| {
            debug!(
                "No stored default for {} or CLT, using built-in CLT rule",
                contract.as_label()
            );
            ScheduleRule::default_for(ContractType::Clt)
        });

    match overrides.iter().rev().find(|o| o.employee_id == employee_id) {
        Some(ov) => default_rule.merged_with(ov),
        None => default_rule,
    }
}

/// Converts a configured hour amount into whole minutes.
pub(crate) fn hours_to_minutes(hours: Decimal) -> i64 {
    (hours * dec!(60)).round().to_i64().unwrap_or(0)
}
