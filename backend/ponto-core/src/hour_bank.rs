// src/hour_bank.rs
use serde::{Deserialize, Serialize};

use crate::aggregate::CompetenceAggregate;
use crate::competence::Competence;
use crate::schedule::{BankPeriod, ScheduleRule};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HourBankMonth {
    pub competence: Competence,
    pub credit_minutes: i64,
    pub debit_minutes: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HourBankStatement {
    pub employee_id: String,
    pub period: BankPeriod,
    pub first: Competence,
    pub last: Competence,
    pub months: Vec<HourBankMonth>,
    pub balance_minutes: i64,
}

/// Competences that feed the bank balance reported at `competence`.
/// Monthly banks reset every month; annual banks run from the most recent
/// start month up to `competence`.
pub fn bank_window(rule: &ScheduleRule, competence: Competence) -> (Competence, Competence) {
    match rule.bank_period {
        BankPeriod::Monthly => (competence, competence),
        BankPeriod::Annual => {
            let start_month = rule.bank_start_month.clamp(1, 12);
            let start_year = if competence.month() >= start_month {
                competence.year()
            } else {
                competence.year() - 1
            };
            let first = Competence::new(start_year, start_month).unwrap_or(competence);
            (first, competence)
        }
    }
}

/// Every competence from `first` to `last`, inclusive.
pub fn window_competences(first: Competence, last: Competence) -> Vec<Competence> {
    let mut out = Vec::new();
    let mut current = first;
    while current <= last {
        out.push(current);
        current = current.next();
    }
    out
}

/// Overtime (both kinds) credits the bank, missing minutes debit it.
pub fn bank_balance(aggregates: &[CompetenceAggregate]) -> i64 {
    aggregates
        .iter()
        .map(|a| a.overtime_minutes + a.overtime100_minutes - a.missing_minutes)
        .sum()
}

pub fn statement(
    employee_id: &str,
    rule: &ScheduleRule,
    competence: Competence,
    aggregates: &[CompetenceAggregate],
) -> HourBankStatement {
    let (first, last) = bank_window(rule, competence);
    let in_window: Vec<CompetenceAggregate> = aggregates
        .iter()
        .filter(|a| a.employee_id == employee_id && a.competence >= first && a.competence <= last)
        .cloned()
        .collect();

    let months = in_window
        .iter()
        .map(|a| HourBankMonth {
            competence: a.competence,
            credit_minutes: a.overtime_minutes + a.overtime100_minutes,
            debit_minutes: a.missing_minutes,
        })
        .collect();

    HourBankStatement {
        employee_id: employee_id.to_string(),
        period: rule.bank_period,
        first,
        last,
        months,
        balance_minutes: bank_balance(&in_window),
    }
}
