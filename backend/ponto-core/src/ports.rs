// src/ports.rs
//! Collaborators the engine reads from and writes to.

use std::future::Future;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::calendar::{CalendarSnapshot, EmployeeCalendarEntry, GlobalCalendarEntry};
use crate::competence::Competence;
use crate::error::StoreError;
use crate::payroll::{Employee, EventDefinition, LineItemDraft, PayrollLineItem};
use crate::punch::PunchRecord;
use crate::schedule::{ContractType, EmployeeOverride, RuleBook, ScheduleRule};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub total_pages: u32,
}

impl<T: Clone> Page<T> {
    /// Slices `all` into 1-based pages of `page_size`.
    pub fn slice(all: &[T], page: u32, page_size: u32) -> Self {
        let size = page_size.max(1) as usize;
        let total_pages = all.len().div_ceil(size).max(1) as u32;
        let start = (page.max(1) as usize - 1).saturating_mul(size);
        let items = all.iter().skip(start).take(size).cloned().collect();
        Self {
            items,
            page,
            total_pages,
        }
    }
}

/// Filter for ledger reads. `competence` is always set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItemQuery {
    pub competence: Competence,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employee_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_code: Option<String>,
}

impl LineItemQuery {
    pub fn competence(competence: Competence) -> Self {
        Self {
            competence,
            employee_id: None,
            event_code: None,
        }
    }

    pub fn employee(mut self, employee_id: &str) -> Self {
        self.employee_id = Some(employee_id.to_string());
        self
    }

    pub fn matches(&self, item: &PayrollLineItem) -> bool {
        item.competence == self.competence
            && self.employee_id.as_deref().map_or(true, |e| e == item.employee_id)
            && self.event_code.as_deref().map_or(true, |c| c == item.event_code)
    }
}

// --- Ports ---

#[async_trait]
pub trait PunchRecordSource: Send + Sync {
    async fn punch_page(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        page: u32,
        page_size: u32,
    ) -> Result<Page<PunchRecord>, StoreError>;
}

#[async_trait]
pub trait ScheduleRuleSource: Send + Sync {
    async fn rule_book(&self) -> Result<RuleBook, StoreError>;
    /// Rejects invalid rules with `StoreError::InvalidRule`.
    async fn put_base_rule(&self, contract: ContractType, rule: ScheduleRule)
        -> Result<(), StoreError>;
    /// Replaces any previous override of the same employee.
    async fn put_override(&self, ov: EmployeeOverride) -> Result<(), StoreError>;
}

#[async_trait]
pub trait CalendarSource: Send + Sync {
    async fn calendars(&self, from: NaiveDate, to: NaiveDate)
        -> Result<CalendarSnapshot, StoreError>;
    async fn add_global_entry(&self, entry: GlobalCalendarEntry) -> Result<(), StoreError>;
    async fn add_employee_entry(&self, entry: EmployeeCalendarEntry) -> Result<(), StoreError>;
}

#[async_trait]
pub trait EmployeeDirectory: Send + Sync {
    async fn employees(&self) -> Result<Vec<Employee>, StoreError>;
}

#[async_trait]
pub trait PayrollLedger: Send + Sync {
    async fn line_item_page(
        &self,
        query: &LineItemQuery,
        page: u32,
        page_size: u32,
    ) -> Result<Page<PayrollLineItem>, StoreError>;
    async fn create_line_item(&self, draft: &LineItemDraft) -> Result<PayrollLineItem, StoreError>;
    async fn update_line_item(
        &self,
        id: &str,
        draft: &LineItemDraft,
    ) -> Result<PayrollLineItem, StoreError>;
    async fn delete_line_item(&self, id: &str) -> Result<(), StoreError>;
}

#[async_trait]
pub trait EventCatalog: Send + Sync {
    async fn events(&self) -> Result<Vec<EventDefinition>, StoreError>;
    async fn create_event(&self, definition: &EventDefinition) -> Result<(), StoreError>;
}

// --- Paging ---

/// Reads every page, stopping on an empty page or once `total_pages` is
/// reached. Any page failure aborts the whole read.
pub async fn fetch_all_pages<T, F, Fut>(what: &str, mut fetch_page: F) -> Result<Vec<T>, StoreError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Page<T>, StoreError>>,
{
    let mut all = Vec::new();
    let mut current_page = 1;

    loop {
        debug!("Fetching {} page {}", what, current_page);
        match fetch_page(current_page).await {
            Ok(page) => {
                let fetched_count = page.items.len();
                all.extend(page.items);
                debug!(
                    "Fetched {} {} on page {}/{}",
                    fetched_count, what, current_page, page.total_pages
                );
                if fetched_count == 0 || current_page >= page.total_pages {
                    break;
                }
                current_page += 1;
            }
            Err(e) => {
                error!("Failed to fetch {} page {}: {}", what, current_page, e);
                return Err(e);
            }
        }
    }
    Ok(all)
}
