// src/calendar.rs
use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::schedule::{hours_to_minutes, ScheduleRule, ScheduleType};

// --- Calendar Entries ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GlobalDayKind {
    Holiday,
    ForcedWorkday,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmployeeDayKind {
    DayOff,
    ForcedWorkday,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalCalendarEntry {
    pub date: NaiveDate,
    pub kind: GlobalDayKind,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeCalendarEntry {
    pub employee_id: String,
    pub date: NaiveDate,
    pub kind: EmployeeDayKind,
    #[serde(default)]
    pub note: Option<String>,
}

/// Both calendars in insertion order. Conflicting entries for the same key
/// are kept; lookups pick the last one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarSnapshot {
    #[serde(default)]
    pub global: Vec<GlobalCalendarEntry>,
    #[serde(default)]
    pub employee: Vec<EmployeeCalendarEntry>,
}

impl CalendarSnapshot {
    pub fn global_entry(&self, date: NaiveDate) -> Option<&GlobalCalendarEntry> {
        self.global.iter().rev().find(|e| e.date == date)
    }

    pub fn employee_entry(&self, employee_id: &str, date: NaiveDate) -> Option<&EmployeeCalendarEntry> {
        self.employee
            .iter()
            .rev()
            .find(|e| e.date == date && e.employee_id == employee_id)
    }

    /// Keeps the global entries and only the per-employee entries of one employee.
    pub fn for_employee(&self, employee_id: &str) -> CalendarSnapshot {
        CalendarSnapshot {
            global: self.global.clone(),
            employee: self
                .employee
                .iter()
                .filter(|e| e.employee_id == employee_id)
                .cloned()
                .collect(),
        }
    }
}

// --- Workday Oracle ---

/// Decides whether `date` is a workday. Per-employee entries beat global
/// entries, which beat the schedule type default.
pub fn is_workday(
    date: NaiveDate,
    employee_id: Option<&str>,
    calendars: &CalendarSnapshot,
    rule: &ScheduleRule,
) -> bool {
    if let Some(emp_id) = employee_id {
        if let Some(entry) = calendars.employee_entry(emp_id, date) {
            debug!("Employee calendar decides {} for {}: {:?}", date, emp_id, entry.kind);
            return entry.kind == EmployeeDayKind::ForcedWorkday;
        }
    }
    if let Some(entry) = calendars.global_entry(date) {
        debug!("Global calendar decides {}: {:?}", date, entry.kind);
        return entry.kind == GlobalDayKind::ForcedWorkday;
    }
    is_scheduled_workday(date, rule)
}

/// Minutes the employee is expected to work on `date`; 0 on non-workdays.
pub fn expected_minutes(
    date: NaiveDate,
    employee_id: Option<&str>,
    calendars: &CalendarSnapshot,
    rule: &ScheduleRule,
) -> i64 {
    if !is_workday(date, employee_id, calendars, rule) {
        return 0;
    }
    match (rule.schedule_type, rule.weekly_hours.as_ref()) {
        (ScheduleType::CustomWeekly, Some(hours)) => hours_to_minutes(hours[weekday_index(date)]),
        _ => hours_to_minutes(rule.daily_hours),
    }
}

fn is_scheduled_workday(date: NaiveDate, rule: &ScheduleRule) -> bool {
    match rule.schedule_type {
        ScheduleType::Fixed5x2 => !matches!(date.weekday(), Weekday::Sat | Weekday::Sun),
        ScheduleType::Fixed6x1 => date.weekday() != Weekday::Sun,
        ScheduleType::Rotating12x36 => match rule.rotation_anchor {
            Some(anchor) => (date - anchor).num_days().rem_euclid(2) == 0,
            None => true,
        },
        ScheduleType::CustomWeekly => match rule.weekly_hours.as_ref() {
            Some(hours) => hours[weekday_index(date)] > rust_decimal::Decimal::ZERO,
            // No weekly table configured: behave like the daily-hours rule.
            None => rule.daily_hours > rust_decimal::Decimal::ZERO,
        },
    }
}

fn weekday_index(date: NaiveDate) -> usize {
    date.weekday().num_days_from_monday() as usize
}
