// src/engine.rs
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::aggregate::{aggregate, CompetenceAggregate};
use crate::calendar::CalendarSnapshot;
use crate::competence::Competence;
use crate::error::{EngineError, StoreError};
use crate::hour_bank::{self, HourBankStatement};
use crate::payroll::{
    reconcile_employee, Employee, EventCodes, EventDefinition, PayContext, PayrollLineItem,
    PlannedOperation, ReconciliationPlan,
};
use crate::ports::{
    fetch_all_pages, CalendarSource, EmployeeDirectory, EventCatalog, LineItemQuery,
    PayrollLedger, PunchRecordSource, ScheduleRuleSource,
};
use crate::punch::PunchRecord;
use crate::schedule::{RuleBook, ScheduleRule};

// --- Wiring ---

/// The external collaborators an engine talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub punches: Arc<dyn PunchRecordSource>,
    pub rules: Arc<dyn ScheduleRuleSource>,
    pub calendars: Arc<dyn CalendarSource>,
    pub employees: Arc<dyn EmployeeDirectory>,
    pub ledger: Arc<dyn PayrollLedger>,
    pub catalog: Arc<dyn EventCatalog>,
}

impl Collaborators {
    /// Uses one backend for every port.
    pub fn from_single<S>(store: Arc<S>) -> Self
    where
        S: PunchRecordSource
            + ScheduleRuleSource
            + CalendarSource
            + EmployeeDirectory
            + PayrollLedger
            + EventCatalog
            + 'static,
    {
        Self {
            punches: store.clone(),
            rules: store.clone(),
            calendars: store.clone(),
            employees: store.clone(),
            ledger: store.clone(),
            catalog: store,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub page_size: u32,
    pub max_concurrency: usize,
    pub event_codes: EventCodes,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            page_size: 100,
            max_concurrency: 8,
            event_codes: EventCodes::default(),
        }
    }
}

// --- Snapshot ---

/// Everything aggregation needs for a range of competences, read up front.
#[derive(Debug, Clone)]
pub struct CompetenceSnapshot {
    pub first: Competence,
    pub last: Competence,
    pub rules: RuleBook,
    pub calendars: CalendarSnapshot,
    pub employees: Vec<Employee>,
    pub punches: Vec<PunchRecord>,
}

impl CompetenceSnapshot {
    pub fn rule_for(&self, employee: &Employee) -> ScheduleRule {
        self.rules.resolve(&employee.id, employee.contract())
    }

    pub fn employee(&self, employee_id: &str) -> Option<&Employee> {
        self.employees.iter().find(|e| e.id == employee_id)
    }

    pub fn aggregate_employee(&self, employee: &Employee, competence: Competence) -> CompetenceAggregate {
        let rule = self.rule_for(employee);
        let calendars = self.calendars.for_employee(&employee.id);
        aggregate(&employee.id, competence, &self.punches, &rule, &calendars)
    }
}

// --- Reconciliation Report ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Create,
    Update,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationRecord {
    pub kind: OperationKind,
    pub employee_id: String,
    pub event_code: String,
    /// Id of the line item written or removed; absent for a create that
    /// never ran.
    pub line_item_id: Option<String>,
}

impl OperationRecord {
    fn planned(op: &PlannedOperation) -> Self {
        let (kind, line_item_id) = match op {
            PlannedOperation::Create(_) => (OperationKind::Create, None),
            PlannedOperation::Update(u) => (OperationKind::Update, Some(u.id().to_string())),
            PlannedOperation::Delete(i) => (OperationKind::Delete, Some(i.id.clone())),
        };
        Self {
            kind,
            employee_id: op.employee_id().to_string(),
            event_code: op.event_code().to_string(),
            line_item_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedOperation {
    #[serde(flatten)]
    pub operation: OperationRecord,
    pub error: String,
}

/// An employee whose existing line items could not be read; nothing was
/// planned or written for them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedEmployee {
    pub employee_id: String,
    pub error: String,
}

/// Outcome of one reconciliation run. Skipped operations were planned but
/// not attempted, either because an earlier write for the same
/// (employee, code) failed or because the run was cancelled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationReport {
    pub competence: Competence,
    pub succeeded: Vec<OperationRecord>,
    pub failed: Vec<FailedOperation>,
    pub skipped: Vec<OperationRecord>,
    #[serde(default)]
    pub failed_employees: Vec<FailedEmployee>,
    pub cancelled: bool,
}

impl ReconciliationReport {
    pub fn new(competence: Competence) -> Self {
        Self {
            competence,
            succeeded: Vec::new(),
            failed: Vec::new(),
            skipped: Vec::new(),
            failed_employees: Vec::new(),
            cancelled: false,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
            && self.skipped.is_empty()
            && self.failed_employees.is_empty()
            && !self.cancelled
    }

    pub fn summary(&self) -> String {
        let summary = format!(
            "{} operations failed, {} succeeded",
            self.failed.len(),
            self.succeeded.len()
        );
        match self.failed_employees.len() {
            0 => summary,
            n => format!("{}, {} employees not read", summary, n),
        }
    }
}

// --- Engine ---

type RunKey = (String, Competence);

pub struct PayrollEngine {
    collab: Collaborators,
    config: EngineConfig,
    run_locks: Mutex<HashMap<RunKey, Arc<tokio::sync::Mutex<()>>>>,
}

impl PayrollEngine {
    pub fn new(collab: Collaborators, config: EngineConfig) -> Result<Self, EngineError> {
        let event_codes = config.event_codes.clone().validated()?;
        Ok(Self {
            collab,
            config: EngineConfig {
                event_codes,
                ..config
            },
            run_locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn event_codes(&self) -> &EventCodes {
        &self.config.event_codes
    }

    /// Reads rules, calendars, employees and every punch of the range.
    pub async fn snapshot(
        &self,
        first: Competence,
        last: Competence,
    ) -> Result<CompetenceSnapshot, EngineError> {
        let (from, to) = (first.first_day(), last.last_day());
        debug!("Reading snapshot for {}..{}", first, last);

        let (rules, calendars, employees) = tokio::try_join!(
            async { self.collab.rules.rule_book().await.map_err(EngineError::read("schedule rules")) },
            async {
                self.collab
                    .calendars
                    .calendars(from, to)
                    .await
                    .map_err(EngineError::read("calendars"))
            },
            async { self.collab.employees.employees().await.map_err(EngineError::read("employees")) },
        )?;

        let page_size = self.config.page_size;
        let punches = fetch_all_pages("punch records", |page| {
            self.collab.punches.punch_page(from, to, page, page_size)
        })
        .await
        .map_err(EngineError::read("punch records"))?;

        info!(
            "Snapshot {}..{}: {} employees, {} punch records",
            first,
            last,
            employees.len(),
            punches.len()
        );
        Ok(CompetenceSnapshot {
            first,
            last,
            rules,
            calendars,
            employees,
            punches,
        })
    }

    /// Aggregates every employee of the snapshot in parallel, bounded by
    /// `max_concurrency`. Results follow directory order.
    pub async fn aggregate_snapshot(
        &self,
        snapshot: Arc<CompetenceSnapshot>,
        competence: Competence,
    ) -> Result<Vec<CompetenceAggregate>, EngineError> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let mut handles = Vec::with_capacity(snapshot.employees.len());

        for index in 0..snapshot.employees.len() {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| EngineError::PoolClosed)?;
            let snapshot = snapshot.clone();

            let handle = tokio::spawn(async move {
                let _permit = permit;
                let employee = &snapshot.employees[index];
                snapshot.aggregate_employee(employee, competence)
            });
            handles.push(handle);
        }

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            results.push(handle.await?);
        }
        Ok(results)
    }

    pub async fn aggregate_competence(
        &self,
        competence: Competence,
    ) -> Result<Vec<CompetenceAggregate>, EngineError> {
        let snapshot = Arc::new(self.snapshot(competence, competence).await?);
        let aggregates = self.aggregate_snapshot(snapshot, competence).await?;
        let inconsistent: u32 = aggregates.iter().map(|a| a.inconsistency_count).sum();
        info!(
            "Aggregated {} employees for {} ({} inconsistent days)",
            aggregates.len(),
            competence,
            inconsistent
        );
        Ok(aggregates)
    }

    /// `None` when the employee is not in the directory.
    pub async fn aggregate_employee(
        &self,
        competence: Competence,
        employee_id: &str,
    ) -> Result<Option<CompetenceAggregate>, EngineError> {
        let snapshot = self.snapshot(competence, competence).await?;
        Ok(snapshot
            .employee(employee_id)
            .map(|e| snapshot.aggregate_employee(e, competence)))
    }

    pub async fn hour_bank(
        &self,
        employee_id: &str,
        competence: Competence,
    ) -> Result<Option<HourBankStatement>, EngineError> {
        let rules = self
            .collab
            .rules
            .rule_book()
            .await
            .map_err(EngineError::read("schedule rules"))?;
        let employees = self
            .collab
            .employees
            .employees()
            .await
            .map_err(EngineError::read("employees"))?;
        let Some(employee) = employees.iter().find(|e| e.id == employee_id) else {
            return Ok(None);
        };
        let rule = rules.resolve(&employee.id, employee.contract());
        let (first, last) = hour_bank::bank_window(&rule, competence);

        let snapshot = self.snapshot(first, last).await?;
        let aggregates: Vec<CompetenceAggregate> = hour_bank::window_competences(first, last)
            .into_iter()
            .map(|c| snapshot.aggregate_employee(employee, c))
            .collect();
        Ok(Some(hour_bank::statement(
            employee_id,
            &rule,
            competence,
            &aggregates,
        )))
    }

    /// Creates every event definition missing from the catalog. Returns the
    /// definitions created.
    pub async fn ensure_event_catalog(&self) -> Result<Vec<EventDefinition>, EngineError> {
        let existing = self.collab.catalog.events().await.map_err(EngineError::Catalog)?;
        let mut created = Vec::new();

        for definition in self.config.event_codes.definitions() {
            if existing.iter().any(|e| e.code == definition.code) {
                continue;
            }
            info!("Creating payroll event '{}' ({})", definition.code, definition.description);
            self.collab
                .catalog
                .create_event(&definition)
                .await
                .map_err(EngineError::Catalog)?;
            created.push(definition);
        }
        Ok(created)
    }

    fn run_lock(&self, key: &RunKey) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.run_locks.lock().unwrap_or_else(|p| p.into_inner());
        locks.entry(key.clone()).or_default().clone()
    }

    /// Drops the map entry once no other run holds or waits on it.
    fn release_run_lock(&self, key: &RunKey, lock: Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self.run_locks.lock().unwrap_or_else(|p| p.into_inner());
        // one reference in the map, one here
        if Arc::strong_count(&lock) <= 2 {
            locks.remove(key);
        }
    }

    /// Number of (employee, competence) locks currently tracked.
    pub fn tracked_run_locks(&self) -> usize {
        self.run_locks.lock().map(|l| l.len()).unwrap_or_default()
    }

    async fn existing_line_items(
        &self,
        competence: Competence,
        employee_id: &str,
    ) -> Result<Vec<PayrollLineItem>, StoreError> {
        let query = LineItemQuery::competence(competence).employee(employee_id);
        let page_size = self.config.page_size;
        fetch_all_pages("line items", |page| {
            self.collab.ledger.line_item_page(&query, page, page_size)
        })
        .await
    }

    /// Recomputes the competence and brings the ledger in line with it.
    /// Employees are processed one at a time, each under a lock that keeps
    /// concurrent runs for the same employee and competence apart. An
    /// employee whose line items cannot be read lands in
    /// `failed_employees` and the run moves on.
    pub async fn reconcile_competence(
        &self,
        competence: Competence,
        cancel: &CancellationToken,
    ) -> Result<ReconciliationReport, EngineError> {
        let snapshot = Arc::new(self.snapshot(competence, competence).await?);
        let aggregates = self.aggregate_snapshot(snapshot.clone(), competence).await?;

        let mut report = ReconciliationReport::new(competence);
        if cancel.is_cancelled() {
            warn!("Reconciliation of {} cancelled before any write", competence);
            report.cancelled = true;
            return Ok(report);
        }
        self.ensure_event_catalog().await?;

        for (employee, agg) in snapshot.employees.iter().zip(aggregates.iter()) {
            if cancel.is_cancelled() {
                warn!("Reconciliation of {} cancelled before Emp={}", competence, employee.id);
                report.cancelled = true;
                break;
            }
            if employee.base_salary.is_none() {
                debug!("Emp={}: no base salary, pricing events at zero", employee.id);
            }
            let pay = PayContext::for_employee(employee, &snapshot.rule_for(employee));

            let key = (employee.id.clone(), competence);
            let lock = self.run_lock(&key);
            {
                let _guard = lock.lock().await;
                match self.existing_line_items(competence, &employee.id).await {
                    Ok(existing) => {
                        let plan = reconcile_employee(agg, &existing, &pay, &self.config.event_codes);
                        if plan.is_empty() {
                            debug!("Emp={}, Competence={}: ledger up to date", employee.id, competence);
                        } else {
                            self.apply(&plan, cancel, &mut report).await;
                        }
                    }
                    Err(e) => {
                        error!("Emp={}, Competence={}: reading line items failed: {}", employee.id, competence, e);
                        report.failed_employees.push(FailedEmployee {
                            employee_id: employee.id.clone(),
                            error: e.to_string(),
                        });
                    }
                }
            }
            self.release_run_lock(&key, lock);
        }

        info!("Reconciliation of {} finished: {}", competence, report.summary());
        Ok(report)
    }

    /// Executes a plan group by group. A failed write skips the rest of its
    /// group only; cancellation stops every write not yet issued.
    pub async fn apply(
        &self,
        plan: &ReconciliationPlan,
        cancel: &CancellationToken,
        report: &mut ReconciliationReport,
    ) {
        for group in plan.grouped() {
            let mut group_failed = false;
            for op in &group.operations {
                let record = OperationRecord::planned(op);
                if group_failed {
                    report.skipped.push(record);
                    continue;
                }
                if cancel.is_cancelled() {
                    report.cancelled = true;
                    report.skipped.push(record);
                    continue;
                }
                match self.execute(op).await {
                    Ok(line_item_id) => report.succeeded.push(OperationRecord {
                        line_item_id: Some(line_item_id),
                        ..record
                    }),
                    Err(e) => {
                        error!(
                            "Emp={}, Code={}: {:?} failed: {}",
                            group.employee_id, group.event_code, record.kind, e
                        );
                        group_failed = true;
                        report.failed.push(FailedOperation {
                            operation: record,
                            error: e.to_string(),
                        });
                    }
                }
            }
        }
    }

    async fn execute(&self, op: &PlannedOperation) -> Result<String, StoreError> {
        match op {
            PlannedOperation::Create(draft) => {
                let item = self.collab.ledger.create_line_item(draft).await?;
                debug!("Emp={}, Code={}: created {}", item.employee_id, item.event_code, item.id);
                Ok(item.id)
            }
            PlannedOperation::Update(update) => {
                self.collab
                    .ledger
                    .update_line_item(update.id(), &update.draft)
                    .await?;
                debug!(
                    "Emp={}, Code={}: updated {} ({} -> {})",
                    update.draft.employee_id,
                    update.draft.event_code,
                    update.id(),
                    update.previous.amount,
                    update.draft.amount
                );
                Ok(update.id().to_string())
            }
            PlannedOperation::Delete(item) => {
                self.collab.ledger.delete_line_item(&item.id).await?;
                debug!("Emp={}, Code={}: deleted {}", item.employee_id, item.event_code, item.id);
                Ok(item.id.clone())
            }
        }
    }
}
