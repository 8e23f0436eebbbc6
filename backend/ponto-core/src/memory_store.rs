// src/memory_store.rs
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::{debug, info};

use crate::calendar::{CalendarSnapshot, EmployeeCalendarEntry, GlobalCalendarEntry};
use crate::error::StoreError;
use crate::payroll::{Employee, EventDefinition, LineItemDraft, PayrollLineItem};
use crate::ports::{
    CalendarSource, EmployeeDirectory, EventCatalog, LineItemQuery, Page, PayrollLedger,
    PunchRecordSource, ScheduleRuleSource,
};
use crate::punch::PunchRecord;
use crate::schedule::{ContractType, EmployeeOverride, RuleBook, ScheduleRule};

fn lock<T>(m: &Mutex<T>) -> Result<MutexGuard<'_, T>, StoreError> {
    m.lock().map_err(|_| StoreError::LockError)
}

/// Process-local store implementing every collaborator port.
#[derive(Debug)]
pub struct InMemoryStore {
    punches: Mutex<Vec<PunchRecord>>,
    rules: Mutex<RuleBook>,
    calendars: Mutex<CalendarSnapshot>,
    employees: Mutex<Vec<Employee>>,
    line_items: Mutex<Vec<PayrollLineItem>>,
    events: Mutex<Vec<EventDefinition>>,
    next_id: AtomicU64,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            punches: Mutex::new(Vec::new()),
            rules: Mutex::new(RuleBook::with_defaults()),
            calendars: Mutex::new(CalendarSnapshot::default()),
            employees: Mutex::new(Vec::new()),
            line_items: Mutex::new(Vec::new()),
            events: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    fn next_id(&self, prefix: &str) -> String {
        format!("{}-{}", prefix, self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Normalizes and stores a record, replacing any record of the same
    /// employee and date. Returns the stored record.
    pub fn save_punch(&self, record: PunchRecord) -> Result<PunchRecord, StoreError> {
        let mut record = record.normalized();
        let mut punches = lock(&self.punches)?;
        match punches
            .iter_mut()
            .find(|r| r.employee_id == record.employee_id && r.date == record.date)
        {
            Some(existing) => {
                record.id = existing.id.clone();
                debug!(
                    "Emp={}, Date={}: replacing punch record {}",
                    record.employee_id, record.date, record.id
                );
                *existing = record.clone();
            }
            None => {
                if record.id.is_empty() {
                    record.id = self.next_id("PR");
                }
                punches.push(record.clone());
            }
        }
        Ok(record)
    }

    pub fn upsert_employee(&self, employee: Employee) -> Result<(), StoreError> {
        let mut employees = lock(&self.employees)?;
        employees.retain(|e| e.id != employee.id);
        employees.push(employee);
        Ok(())
    }

    /// Stores a line item as-is, keeping insertion order. Used to seed the
    /// ledger with items written by other tools.
    pub fn insert_line_item(&self, item: PayrollLineItem) -> Result<(), StoreError> {
        lock(&self.line_items)?.push(item);
        Ok(())
    }

    pub fn line_items(&self) -> Result<Vec<PayrollLineItem>, StoreError> {
        Ok(lock(&self.line_items)?.clone())
    }
}

#[async_trait]
impl PunchRecordSource for InMemoryStore {
    async fn punch_page(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        page: u32,
        page_size: u32,
    ) -> Result<Page<PunchRecord>, StoreError> {
        let mut matching: Vec<PunchRecord> = lock(&self.punches)?
            .iter()
            .filter(|r| r.date >= from && r.date <= to)
            .cloned()
            .collect();
        matching.sort_by(|a, b| (a.date, &a.employee_id).cmp(&(b.date, &b.employee_id)));
        Ok(Page::slice(&matching, page, page_size))
    }
}

#[async_trait]
impl ScheduleRuleSource for InMemoryStore {
    async fn rule_book(&self) -> Result<RuleBook, StoreError> {
        Ok(lock(&self.rules)?.clone())
    }

    async fn put_base_rule(
        &self,
        contract: ContractType,
        rule: ScheduleRule,
    ) -> Result<(), StoreError> {
        rule.validate()?;
        lock(&self.rules)?.base.insert(contract, rule);
        info!("Base rule for {} updated", contract.as_label());
        Ok(())
    }

    async fn put_override(&self, ov: EmployeeOverride) -> Result<(), StoreError> {
        ov.validate()?;
        let mut rules = lock(&self.rules)?;
        rules.overrides.retain(|o| o.employee_id != ov.employee_id);
        info!("Emp={}: schedule override stored", ov.employee_id);
        rules.overrides.push(ov);
        Ok(())
    }
}

#[async_trait]
impl CalendarSource for InMemoryStore {
    async fn calendars(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<CalendarSnapshot, StoreError> {
        let all = lock(&self.calendars)?;
        let in_range = |d: NaiveDate| d >= from && d <= to;
        Ok(CalendarSnapshot {
            global: all.global.iter().filter(|e| in_range(e.date)).cloned().collect(),
            employee: all
                .employee
                .iter()
                .filter(|e| in_range(e.date))
                .cloned()
                .collect(),
        })
    }

    async fn add_global_entry(&self, entry: GlobalCalendarEntry) -> Result<(), StoreError> {
        lock(&self.calendars)?.global.push(entry);
        Ok(())
    }

    async fn add_employee_entry(&self, entry: EmployeeCalendarEntry) -> Result<(), StoreError> {
        lock(&self.calendars)?.employee.push(entry);
        Ok(())
    }
}

#[async_trait]
impl EmployeeDirectory for InMemoryStore {
    async fn employees(&self) -> Result<Vec<Employee>, StoreError> {
        Ok(lock(&self.employees)?.clone())
    }
}

#[async_trait]
impl PayrollLedger for InMemoryStore {
    async fn line_item_page(
        &self,
        query: &LineItemQuery,
        page: u32,
        page_size: u32,
    ) -> Result<Page<PayrollLineItem>, StoreError> {
        let matching: Vec<PayrollLineItem> = lock(&self.line_items)?
            .iter()
            .filter(|item| query.matches(item))
            .cloned()
            .collect();
        Ok(Page::slice(&matching, page, page_size))
    }

    async fn create_line_item(&self, draft: &LineItemDraft) -> Result<PayrollLineItem, StoreError> {
        let item = draft.clone().with_id(&self.next_id("LI"));
        lock(&self.line_items)?.push(item.clone());
        Ok(item)
    }

    async fn update_line_item(
        &self,
        id: &str,
        draft: &LineItemDraft,
    ) -> Result<PayrollLineItem, StoreError> {
        let mut items = lock(&self.line_items)?;
        let slot = items
            .iter_mut()
            .find(|item| item.id == id)
            .ok_or_else(|| StoreError::NotFound {
                what: "line item",
                id: id.to_string(),
            })?;
        *slot = draft.clone().with_id(id);
        Ok(slot.clone())
    }

    async fn delete_line_item(&self, id: &str) -> Result<(), StoreError> {
        let mut items = lock(&self.line_items)?;
        let before = items.len();
        items.retain(|item| item.id != id);
        if items.len() == before {
            return Err(StoreError::NotFound {
                what: "line item",
                id: id.to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl EventCatalog for InMemoryStore {
    async fn events(&self) -> Result<Vec<EventDefinition>, StoreError> {
        Ok(lock(&self.events)?.clone())
    }

    async fn create_event(&self, definition: &EventDefinition) -> Result<(), StoreError> {
        let mut events = lock(&self.events)?;
        if events.iter().any(|e| e.code == definition.code) {
            return Err(StoreError::Rejected(format!(
                "event code '{}' already exists",
                definition.code
            )));
        }
        events.push(definition.clone());
        Ok(())
    }
}
