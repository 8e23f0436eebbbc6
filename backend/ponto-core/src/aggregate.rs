// src/aggregate.rs
use chrono::NaiveDate;
use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::calendar::{expected_minutes, CalendarSnapshot};
use crate::competence::Competence;
use crate::daily_time::day_night_minutes;
use crate::punch::{PunchRecord, PunchStatus};
use crate::schedule::ScheduleRule;

// --- Aggregate Structures ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayBreakdown {
    pub date: NaiveDate,
    pub worked_minutes: i64,
    pub expected_minutes: i64,
    pub delta_minutes: i64,
    pub overtime_minutes: i64,
    pub overtime100_minutes: i64,
    pub missing_minutes: i64,
    pub night_minutes: Decimal,
    pub inconsistent: bool,
}

/// Per-employee totals for one competence. Derived on every request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompetenceAggregate {
    pub employee_id: String,
    pub competence: Competence,
    pub worked_minutes: i64,
    pub expected_minutes: i64,
    pub overtime_minutes: i64,
    pub overtime100_minutes: i64,
    pub missing_minutes: i64,
    pub night_minutes: Decimal,
    pub dsr_minutes: Decimal,
    pub inconsistency_count: u32,
    pub working_days: u32,
    pub rest_days: u32,
    pub days: Vec<DayBreakdown>,
}

impl CompetenceAggregate {
    pub fn empty(employee_id: &str, competence: Competence) -> Self {
        Self {
            employee_id: employee_id.to_string(),
            competence,
            worked_minutes: 0,
            expected_minutes: 0,
            overtime_minutes: 0,
            overtime100_minutes: 0,
            missing_minutes: 0,
            night_minutes: Decimal::ZERO,
            dsr_minutes: Decimal::ZERO,
            inconsistency_count: 0,
            working_days: 0,
            rest_days: 0,
            days: Vec::new(),
        }
    }
}

// --- Day Classification ---

/// Classifies one punch record against the minutes expected on its date.
pub fn classify_day(record: &PunchRecord, expected: i64, tolerance: i64) -> DayBreakdown {
    let worked = record.worked_minutes();
    let delta = worked - expected;
    let out_of_tolerance = expected > 0 && delta.abs() > tolerance;

    let (overtime, overtime100, missing) = if expected == 0 && worked > 0 {
        (0, worked, 0)
    } else if out_of_tolerance && delta > 0 {
        (delta, 0, 0)
    } else if out_of_tolerance {
        (0, 0, -delta)
    } else {
        (0, 0, 0)
    };

    let inconsistent = record.has_half_open_pair()
        || out_of_tolerance
        || record.status == PunchStatus::Inconsistent;

    DayBreakdown {
        date: record.date,
        worked_minutes: worked,
        expected_minutes: expected,
        delta_minutes: delta,
        overtime_minutes: overtime,
        overtime100_minutes: overtime100,
        missing_minutes: missing,
        night_minutes: day_night_minutes(
            record.entrance1,
            record.exit1,
            record.entrance2,
            record.exit2,
        ),
        inconsistent,
    }
}

/// DSR minutes: combined overtime spread over the working days and paid
/// again for each rest day.
pub fn dsr_minutes(overtime_total: i64, working_days: u32, rest_days: u32) -> Decimal {
    if working_days == 0 {
        return Decimal::ZERO;
    }
    (Decimal::from(overtime_total) * Decimal::from(rest_days) / Decimal::from(working_days))
        .round_dp(2)
}

// --- Aggregation ---

/// Aggregates one employee's punch records over a competence. Records of
/// other employees or outside the competence are ignored.
pub fn aggregate(
    employee_id: &str,
    competence: Competence,
    records: &[PunchRecord],
    rule: &ScheduleRule,
    calendars: &CalendarSnapshot,
) -> CompetenceAggregate {
    let mut agg = CompetenceAggregate::empty(employee_id, competence);
    let tolerance = rule.tolerance_minutes;

    let mut own: Vec<&PunchRecord> = records
        .iter()
        .filter(|r| r.employee_id == employee_id && competence.contains(r.date))
        .collect();
    own.sort_by_key(|r| r.date);

    for record in own {
        let expected = expected_minutes(record.date, Some(employee_id), calendars, rule);
        let day = classify_day(record, expected, tolerance);
        debug!(
            "Emp={}, Date={}: worked={} expected={} delta={} inconsistent={}",
            employee_id, day.date, day.worked_minutes, day.expected_minutes, day.delta_minutes, day.inconsistent
        );

        agg.worked_minutes += day.worked_minutes;
        agg.expected_minutes += day.expected_minutes;
        agg.overtime_minutes += day.overtime_minutes;
        agg.overtime100_minutes += day.overtime100_minutes;
        agg.missing_minutes += day.missing_minutes;
        agg.night_minutes += day.night_minutes;
        if day.inconsistent {
            agg.inconsistency_count += 1;
        }
        agg.days.push(day);
    }

    // Working and rest days are counted over the whole month, punched or not.
    for date in competence.days() {
        if expected_minutes(date, Some(employee_id), calendars, rule) > 0 {
            agg.working_days += 1;
        } else {
            agg.rest_days += 1;
        }
    }
    agg.dsr_minutes = dsr_minutes(
        agg.overtime_minutes + agg.overtime100_minutes,
        agg.working_days,
        agg.rest_days,
    );
    agg
}
