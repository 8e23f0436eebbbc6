// src/lib.rs
//! Attendance calculation per pay period and payroll line-item reconciliation.

pub mod aggregate;
pub mod backend_client;
pub mod calendar;
pub mod competence;
pub mod config;
pub mod daily_time;
pub mod engine;
pub mod error;
pub mod hour_bank;
pub mod memory_store;
pub mod payroll;
pub mod ports;
pub mod punch;
pub mod schedule;
pub mod server;

mod engine_tests;

pub use aggregate::{aggregate, CompetenceAggregate, DayBreakdown};
pub use calendar::{expected_minutes, is_workday, CalendarSnapshot};
pub use competence::Competence;
pub use engine::{Collaborators, EngineConfig, PayrollEngine, ReconciliationReport};
pub use error::{AppError, EngineError, StoreError};
pub use payroll::{reconcile, EventCodes, EventKind, ReconciliationPlan};
pub use punch::PunchRecord;
pub use schedule::{resolve, ContractType, RuleBook, ScheduleRule};
