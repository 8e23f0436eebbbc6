// src/payroll.rs
use std::collections::HashMap;
use std::fmt;

use rust_decimal::prelude::*;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::aggregate::CompetenceAggregate;
use crate::competence::Competence;
use crate::schedule::{ContractType, ScheduleRule};

/// Note carried by every line item this engine writes.
pub const AUTO_GENERATED_NOTE: &str = "auto-generated by ponto-core";

/// Amounts closer than this are considered equal.
const AMOUNT_TOLERANCE: Decimal = dec!(0.01);

// --- Event Kinds & Codes ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    Overtime,
    Overtime100,
    NightDifferential,
    Absence,
    DsrOnOvertime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventNature {
    Provento,
    Desconto,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDefinition {
    pub code: String,
    pub description: String,
    pub nature: EventNature,
    pub incide_inss: bool,
    pub incide_irrf: bool,
    pub incide_fgts: bool,
}

impl EventKind {
    pub const ALL: [EventKind; 5] = [
        EventKind::Overtime,
        EventKind::Overtime100,
        EventKind::NightDifferential,
        EventKind::Absence,
        EventKind::DsrOnOvertime,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Overtime => "overtime",
            EventKind::Overtime100 => "overtime-100",
            EventKind::NightDifferential => "night-differential",
            EventKind::Absence => "absence",
            EventKind::DsrOnOvertime => "dsr-on-overtime",
        }
    }

    fn description(&self) -> &'static str {
        match self {
            EventKind::Overtime => "Horas extras",
            EventKind::Overtime100 => "Horas extras 100%",
            EventKind::NightDifferential => "Adicional noturno",
            EventKind::Absence => "Faltas e atrasos",
            EventKind::DsrOnOvertime => "DSR sobre horas extras",
        }
    }

    pub fn nature(&self) -> EventNature {
        match self {
            EventKind::Absence => EventNature::Desconto,
            _ => EventNature::Provento,
        }
    }

    /// Catalog metadata for this kind under the given external code.
    pub fn definition(&self, code: &str) -> EventDefinition {
        EventDefinition {
            code: code.to_string(),
            description: self.description().to_string(),
            nature: self.nature(),
            incide_inss: true,
            incide_irrf: true,
            incide_fgts: true,
        }
    }

    /// Pay multiplier applied to the event's hours.
    fn multiplier(&self, pay: &PayContext) -> Decimal {
        match self {
            EventKind::Overtime => pay.overtime_rate,
            EventKind::Overtime100 => dec!(2.0),
            EventKind::NightDifferential => pay.night_rate,
            EventKind::Absence | EventKind::DsrOnOvertime => Decimal::ONE,
        }
    }

    fn minutes(&self, agg: &CompetenceAggregate) -> Decimal {
        match self {
            EventKind::Overtime => Decimal::from(agg.overtime_minutes),
            EventKind::Overtime100 => Decimal::from(agg.overtime100_minutes),
            EventKind::NightDifferential => agg.night_minutes,
            EventKind::Absence => Decimal::from(agg.missing_minutes),
            EventKind::DsrOnOvertime => agg.dsr_minutes,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventCodeError {
    #[error("Event code for '{0}' is empty")]
    Empty(EventKind),
    #[error("Event code '{code}' is mapped to both '{first}' and '{second}'")]
    Duplicate {
        code: String,
        first: EventKind,
        second: EventKind,
    },
}

/// External ledger codes of the five event kinds. Resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventCodes {
    pub overtime: String,
    pub overtime100: String,
    pub night_differential: String,
    pub absence: String,
    pub dsr_on_overtime: String,
}

impl Default for EventCodes {
    fn default() -> Self {
        Self {
            overtime: "HE50".to_string(),
            overtime100: "HE100".to_string(),
            night_differential: "ADNOT".to_string(),
            absence: "FALTA".to_string(),
            dsr_on_overtime: "DSRHE".to_string(),
        }
    }
}

impl EventCodes {
    pub fn code(&self, kind: EventKind) -> &str {
        match kind {
            EventKind::Overtime => &self.overtime,
            EventKind::Overtime100 => &self.overtime100,
            EventKind::NightDifferential => &self.night_differential,
            EventKind::Absence => &self.absence,
            EventKind::DsrOnOvertime => &self.dsr_on_overtime,
        }
    }

    pub fn kind_of(&self, code: &str) -> Option<EventKind> {
        EventKind::ALL.into_iter().find(|k| self.code(*k) == code)
    }

    /// Codes must be non-empty and map one-to-one onto kinds.
    pub fn validated(self) -> Result<Self, EventCodeError> {
        {
            let mut seen: HashMap<&str, EventKind> = HashMap::new();
            for kind in EventKind::ALL {
                let code = self.code(kind);
                if code.trim().is_empty() {
                    return Err(EventCodeError::Empty(kind));
                }
                if let Some(first) = seen.insert(code, kind) {
                    return Err(EventCodeError::Duplicate {
                        code: code.to_string(),
                        first,
                        second: kind,
                    });
                }
            }
        }
        Ok(self)
    }

    pub fn definitions(&self) -> Vec<EventDefinition> {
        EventKind::ALL
            .iter()
            .map(|k| k.definition(self.code(*k)))
            .collect()
    }
}

// --- Employees & Rates ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SalaryKind {
    #[default]
    Monthly,
    Hourly,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub contract_type: Option<String>,
    #[serde(default)]
    pub base_salary: Option<Decimal>,
    #[serde(default)]
    pub salary_kind: SalaryKind,
    #[serde(default)]
    pub inss_percent: Option<Decimal>,
}

impl Employee {
    pub fn contract(&self) -> Option<ContractType> {
        self.contract_type.as_deref().and_then(ContractType::from_label)
    }
}

/// Hourly pay: the base salary itself for hourly employees, otherwise the
/// monthly salary spread over the rule's monthly hours.
pub fn hourly_rate(base_salary: Decimal, kind: SalaryKind, rule: &ScheduleRule) -> Decimal {
    match kind {
        SalaryKind::Hourly => base_salary,
        SalaryKind::Monthly if rule.monthly_hours > Decimal::ZERO => {
            base_salary / rule.monthly_hours
        }
        SalaryKind::Monthly => Decimal::ZERO,
    }
}

/// Rates used to price one employee's events. The default prices every
/// event at zero, so reconciling with it can only delete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayContext {
    pub hourly_rate: Decimal,
    pub overtime_rate: Decimal,
    pub night_rate: Decimal,
}

impl PayContext {
    /// A missing base salary prices at zero.
    pub fn for_employee(employee: &Employee, rule: &ScheduleRule) -> Self {
        let base = employee.base_salary.unwrap_or(Decimal::ZERO);
        Self {
            hourly_rate: hourly_rate(base, employee.salary_kind, rule),
            overtime_rate: rule.overtime_rate,
            night_rate: rule.night_rate,
        }
    }
}

// --- Computed Events ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputedEvent {
    pub kind: EventKind,
    pub code: String,
    pub hours: Decimal,
    pub amount: Decimal,
    pub reference: String,
}

pub fn hours_reference(hours: Decimal) -> String {
    format!("{}h", hours.round_dp(2).normalize())
}

/// The five monetary events of one employee's aggregate.
pub fn compute_events(
    agg: &CompetenceAggregate,
    pay: &PayContext,
    codes: &EventCodes,
) -> Vec<ComputedEvent> {
    EventKind::ALL
        .iter()
        .map(|kind| {
            let hours = kind.minutes(agg) / dec!(60);
            let amount = (hours * pay.hourly_rate * kind.multiplier(pay)).round_dp(2);
            ComputedEvent {
                kind: *kind,
                code: codes.code(*kind).to_string(),
                hours,
                amount,
                reference: hours_reference(hours),
            }
        })
        .collect()
}

// --- Line Items & Plans ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayrollLineItem {
    pub id: String,
    pub competence: Competence,
    pub employee_id: String,
    pub event_code: String,
    pub amount: Decimal,
    pub reference: String,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItemDraft {
    pub competence: Competence,
    pub employee_id: String,
    pub event_code: String,
    pub amount: Decimal,
    pub reference: String,
    #[serde(default)]
    pub note: Option<String>,
}

impl LineItemDraft {
    fn from_event(competence: Competence, employee_id: &str, event: &ComputedEvent) -> Self {
        Self {
            competence,
            employee_id: employee_id.to_string(),
            event_code: event.code.clone(),
            amount: event.amount,
            reference: event.reference.clone(),
            note: Some(AUTO_GENERATED_NOTE.to_string()),
        }
    }

    pub fn with_id(self, id: &str) -> PayrollLineItem {
        PayrollLineItem {
            id: id.to_string(),
            competence: self.competence,
            employee_id: self.employee_id,
            event_code: self.event_code,
            amount: self.amount,
            reference: self.reference,
            note: self.note,
        }
    }

    fn matches(&self, item: &PayrollLineItem) -> bool {
        (item.amount - self.amount).abs() <= AMOUNT_TOLERANCE
            && item.reference == self.reference
            && item.note == self.note
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItemUpdate {
    pub previous: PayrollLineItem,
    pub draft: LineItemDraft,
}

impl LineItemUpdate {
    pub fn id(&self) -> &str {
        &self.previous.id
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationPlan {
    pub to_create: Vec<LineItemDraft>,
    pub to_update: Vec<LineItemUpdate>,
    pub to_delete: Vec<PayrollLineItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PlannedOperation {
    Create(LineItemDraft),
    Update(LineItemUpdate),
    Delete(PayrollLineItem),
}

impl PlannedOperation {
    pub fn employee_id(&self) -> &str {
        match self {
            PlannedOperation::Create(d) => &d.employee_id,
            PlannedOperation::Update(u) => &u.draft.employee_id,
            PlannedOperation::Delete(i) => &i.employee_id,
        }
    }

    pub fn event_code(&self) -> &str {
        match self {
            PlannedOperation::Create(d) => &d.event_code,
            PlannedOperation::Update(u) => &u.draft.event_code,
            PlannedOperation::Delete(i) => &i.event_code,
        }
    }
}

/// Operations touching one (employee, event code) key, in execution order.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationGroup {
    pub employee_id: String,
    pub event_code: String,
    pub operations: Vec<PlannedOperation>,
}

impl ReconciliationPlan {
    pub fn is_empty(&self) -> bool {
        self.operation_count() == 0
    }

    pub fn operation_count(&self) -> usize {
        self.to_create.len() + self.to_update.len() + self.to_delete.len()
    }

    pub fn extend(&mut self, other: ReconciliationPlan) {
        self.to_create.extend(other.to_create);
        self.to_update.extend(other.to_update);
        self.to_delete.extend(other.to_delete);
    }

    /// Groups the plan by (employee, code), keeping first-seen key order.
    /// Inside a group creates and updates come before deletes, so the
    /// canonical item is written before its duplicates disappear.
    pub fn grouped(&self) -> Vec<OperationGroup> {
        let mut groups: Vec<OperationGroup> = Vec::new();
        let ops = self
            .to_create
            .iter()
            .cloned()
            .map(PlannedOperation::Create)
            .chain(self.to_update.iter().cloned().map(PlannedOperation::Update))
            .chain(self.to_delete.iter().cloned().map(PlannedOperation::Delete));

        for op in ops {
            let pos = groups
                .iter()
                .position(|g| g.employee_id == op.employee_id() && g.event_code == op.event_code());
            match pos {
                Some(i) => groups[i].operations.push(op),
                None => groups.push(OperationGroup {
                    employee_id: op.employee_id().to_string(),
                    event_code: op.event_code().to_string(),
                    operations: vec![op],
                }),
            }
        }
        groups
    }
}

// --- Diff ---

/// Plans the writes that bring one employee's line items in line with the
/// aggregate. `existing` may contain items of other employees, competences
/// or codes; they are left alone.
pub fn reconcile_employee(
    agg: &CompetenceAggregate,
    existing: &[PayrollLineItem],
    pay: &PayContext,
    codes: &EventCodes,
) -> ReconciliationPlan {
    let mut plan = ReconciliationPlan::default();

    for event in compute_events(agg, pay, codes) {
        let mut matching = existing.iter().filter(|item| {
            item.employee_id == agg.employee_id
                && item.competence == agg.competence
                && item.event_code == event.code
        });
        let first = matching.next();

        if event.amount > Decimal::ZERO {
            let draft = LineItemDraft::from_event(agg.competence, &agg.employee_id, &event);
            match first {
                None => plan.to_create.push(draft),
                Some(item) if !draft.matches(item) => plan.to_update.push(LineItemUpdate {
                    previous: item.clone(),
                    draft,
                }),
                Some(_) => {}
            }
        } else if let Some(item) = first {
            plan.to_delete.push(item.clone());
        }

        // anything past the first is a duplicate
        for duplicate in matching {
            debug!(
                "Emp={}, Code={}: duplicate line item {} scheduled for deletion",
                agg.employee_id, event.code, duplicate.id
            );
            plan.to_delete.push(duplicate.clone());
        }
    }
    plan
}

/// Plans every employee of the competence. An employee missing from
/// `pay_by_employee` is priced at zero, which removes their items.
pub fn reconcile(
    aggregates: &[CompetenceAggregate],
    existing: &[PayrollLineItem],
    pay_by_employee: &HashMap<String, PayContext>,
    codes: &EventCodes,
) -> ReconciliationPlan {
    let mut plan = ReconciliationPlan::default();
    for agg in aggregates {
        let pay = pay_by_employee.get(&agg.employee_id).copied().unwrap_or_else(|| {
            debug!("Emp={}: no pay context, pricing at zero", agg.employee_id);
            PayContext::default()
        });
        plan.extend(reconcile_employee(agg, existing, &pay, codes));
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;

    fn may() -> Competence {
        Competence::new(2024, 5).unwrap()
    }

    fn pay() -> PayContext {
        // 2200 / 220h
        PayContext {
            hourly_rate: dec!(10),
            overtime_rate: dec!(1.5),
            night_rate: dec!(0.2),
        }
    }

    fn agg_with_overtime(minutes: i64) -> CompetenceAggregate {
        let mut agg = CompetenceAggregate::empty("E1", may());
        agg.overtime_minutes = minutes;
        agg
    }

    fn item(id: &str, code: &str, amount: Decimal, reference: &str) -> PayrollLineItem {
        PayrollLineItem {
            id: id.to_string(),
            competence: may(),
            employee_id: "E1".to_string(),
            event_code: code.to_string(),
            amount,
            reference: reference.to_string(),
            note: Some(AUTO_GENERATED_NOTE.to_string()),
        }
    }

    /// Applies a plan to a ledger the way a store would.
    fn apply(ledger: &mut Vec<PayrollLineItem>, plan: &ReconciliationPlan) {
        for (i, d) in plan.to_create.iter().enumerate() {
            ledger.push(d.clone().with_id(&format!("new-{}", i)));
        }
        for u in &plan.to_update {
            if let Some(slot) = ledger.iter_mut().find(|it| it.id == u.id()) {
                *slot = u.draft.clone().with_id(u.id());
            }
        }
        ledger.retain(|it| !plan.to_delete.iter().any(|d| d.id == it.id));
    }

    #[test]
    fn rates_follow_salary_kind() {
        let rule = ScheduleRule::default_for(ContractType::Clt);
        assert_eq!(hourly_rate(dec!(2200), SalaryKind::Monthly, &rule), dec!(10));
        assert_eq!(hourly_rate(dec!(35), SalaryKind::Hourly, &rule), dec!(35));
        let zero = ScheduleRule {
            monthly_hours: Decimal::ZERO,
            ..rule
        };
        assert_eq!(hourly_rate(dec!(2200), SalaryKind::Monthly, &zero), Decimal::ZERO);
    }

    #[test]
    fn computes_amounts_and_references() {
        let mut agg = agg_with_overtime(120);
        agg.overtime100_minutes = 240;
        agg.night_minutes = dec!(480);
        agg.missing_minutes = 30;
        agg.dsr_minutes = dec!(41.74);

        let events = compute_events(&agg, &pay(), &EventCodes::default());
        let by_kind = |k: EventKind| events.iter().find(|e| e.kind == k).unwrap().clone();

        assert_eq!(by_kind(EventKind::Overtime).amount, dec!(30.00));
        assert_eq!(by_kind(EventKind::Overtime).reference, "2h");
        assert_eq!(by_kind(EventKind::Overtime100).amount, dec!(80.00));
        assert_eq!(by_kind(EventKind::NightDifferential).amount, dec!(16.00));
        assert_eq!(by_kind(EventKind::Absence).amount, dec!(5.00));
        assert_eq!(by_kind(EventKind::Absence).reference, "0.5h");
        // 41.74 / 60 = 0.69566..
        assert_eq!(by_kind(EventKind::DsrOnOvertime).amount, dec!(6.96));
        assert_eq!(by_kind(EventKind::DsrOnOvertime).reference, "0.7h");
    }

    #[test]
    fn second_run_is_a_no_op() {
        let agg = agg_with_overtime(120);
        let codes = EventCodes::default();
        let mut ledger = Vec::new();

        let first = reconcile_employee(&agg, &ledger, &pay(), &codes);
        assert_eq!(first.to_create.len(), 1);
        apply(&mut ledger, &first);

        let second = reconcile_employee(&agg, &ledger, &pay(), &codes);
        assert!(second.is_empty(), "unexpected plan: {:?}", second);
    }

    #[test]
    fn duplicates_collapse_onto_the_first_item() {
        let existing = vec![
            item("A", "HE50", dec!(10), "1h"),
            item("B", "HE50", dec!(20), "2h"),
            item("C", "HE50", dec!(30), "3h"),
        ];
        let codes = EventCodes::default();

        let plan = reconcile_employee(&agg_with_overtime(120), &existing, &pay(), &codes);
        assert_eq!(plan.to_update.len(), 1);
        assert_eq!(plan.to_update[0].id(), "A");
        let deleted: Vec<&str> = plan.to_delete.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(deleted, vec!["B", "C"]);
        assert!(plan.to_create.is_empty());

        let plan = reconcile_employee(&agg_with_overtime(0), &existing, &pay(), &codes);
        assert!(plan.to_update.is_empty());
        assert_eq!(plan.to_delete.len(), 3);
    }

    #[test]
    fn marker_reference_or_amount_change_triggers_update() {
        let codes = EventCodes::default();
        let agg = agg_with_overtime(120);

        let mut manual = item("A", "HE50", dec!(30), "2h");
        manual.note = None;
        let plan = reconcile_employee(&agg, &[manual], &pay(), &codes);
        assert_eq!(plan.to_update.len(), 1);

        let plan = reconcile_employee(&agg, &[item("A", "HE50", dec!(30), "2.0h")], &pay(), &codes);
        assert_eq!(plan.to_update.len(), 1);

        let plan = reconcile_employee(&agg, &[item("A", "HE50", dec!(30.02), "2h")], &pay(), &codes);
        assert_eq!(plan.to_update.len(), 1);

        let plan = reconcile_employee(&agg, &[item("A", "HE50", dec!(30.01), "2h")], &pay(), &codes);
        assert!(plan.is_empty());
    }

    #[test]
    fn leaves_foreign_items_alone_and_prices_unpaid_employees_at_zero() {
        let codes = EventCodes::default();
        let mut other_month = item("X", "HE50", dec!(99), "9h");
        other_month.competence = may().next();
        let unrelated = item("Y", "BONUS", dec!(500), "1x");

        let aggs = vec![agg_with_overtime(0), {
            let mut a = agg_with_overtime(60);
            a.employee_id = "E2".to_string();
            a
        }];
        let pays = HashMap::from([("E1".to_string(), pay())]);
        let plan = reconcile(&aggs, &[other_month.clone(), unrelated.clone()], &pays, &codes);
        assert!(plan.is_empty());

        let mut stale = item("S", "HE50", dec!(30), "1h");
        stale.employee_id = "E2".to_string();
        let plan = reconcile(&aggs, &[other_month, unrelated, stale], &pays, &codes);
        assert!(plan.to_create.is_empty() && plan.to_update.is_empty());
        let deleted: Vec<&str> = plan.to_delete.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(deleted, vec!["S"]);
    }

    #[test]
    fn missing_salary_prices_at_zero() {
        let employee = Employee {
            id: "E1".to_string(),
            name: "Ana".to_string(),
            contract_type: None,
            base_salary: None,
            salary_kind: SalaryKind::Monthly,
            inss_percent: None,
        };
        let pay = PayContext::for_employee(&employee, &ScheduleRule::default_for(ContractType::Clt));
        assert_eq!(pay.hourly_rate, Decimal::ZERO);
        let events = compute_events(&agg_with_overtime(120), &pay, &EventCodes::default());
        assert!(events.iter().all(|e| e.amount == Decimal::ZERO));
    }

    #[test]
    fn groups_put_writes_before_deletes() {
        let existing = vec![
            item("A", "HE50", dec!(10), "1h"),
            item("B", "HE50", dec!(20), "2h"),
        ];
        let mut agg = agg_with_overtime(120);
        agg.missing_minutes = 60;
        let plan = reconcile_employee(&agg, &existing, &pay(), &EventCodes::default());

        let groups = plan.grouped();
        assert_eq!(groups.len(), 2);
        let he50 = groups.iter().find(|g| g.event_code == "HE50").unwrap();
        assert!(matches!(he50.operations[0], PlannedOperation::Update(_)));
        assert!(matches!(he50.operations[1], PlannedOperation::Delete(_)));
        let falta = groups.iter().find(|g| g.event_code == "FALTA").unwrap();
        assert!(matches!(falta.operations.as_slice(), [PlannedOperation::Create(_)]));
    }

    #[test]
    fn event_codes_must_be_one_to_one() {
        assert!(EventCodes::default().validated().is_ok());
        let dup = EventCodes {
            overtime100: "HE50".to_string(),
            ..EventCodes::default()
        };
        assert!(matches!(
            dup.validated(),
            Err(EventCodeError::Duplicate { first: EventKind::Overtime, .. })
        ));
        let empty = EventCodes {
            absence: " ".to_string(),
            ..EventCodes::default()
        };
        assert_eq!(empty.validated(), Err(EventCodeError::Empty(EventKind::Absence)));
        assert_eq!(EventCodes::default().kind_of("ADNOT"), Some(EventKind::NightDifferential));
    }

    #[test]
    fn absence_is_the_only_deduction() {
        let defs = EventCodes::default().definitions();
        assert_eq!(defs.len(), 5);
        for def in defs {
            let expected = if def.code == "FALTA" {
                EventNature::Desconto
            } else {
                EventNature::Provento
            };
            assert_eq!(def.nature, expected);
            assert!(def.incide_inss && def.incide_irrf && def.incide_fgts);
        }
    }
}
