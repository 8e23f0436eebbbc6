// src/engine_tests.rs

#[cfg(test)]
mod tests {
    use crate::calendar::{EmployeeCalendarEntry, EmployeeDayKind};
    use crate::competence::Competence;
    use crate::engine::*;
    use crate::error::{EngineError, StoreError};
    use crate::memory_store::InMemoryStore;
    use crate::payroll::*;
    use crate::ports::*;
    use crate::punch::PunchRecord;
    use crate::schedule::{BankPeriod, EmployeeOverride};
    use async_trait::async_trait;
    use chrono::{NaiveDate, NaiveTime};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    fn d(date_str: &str) -> NaiveDate {
        NaiveDate::parse_from_str(date_str, "%Y-%m-%d").unwrap()
    }

    fn t(s: &str) -> Option<NaiveTime> {
        Some(NaiveTime::parse_from_str(s, "%H:%M").unwrap())
    }

    fn may() -> Competence {
        Competence::new(2024, 5).unwrap()
    }

    fn employee(id: &str, salary: Option<Decimal>) -> Employee {
        Employee {
            id: id.to_string(),
            name: format!("Employee {}", id),
            contract_type: Some("CLT".to_string()),
            base_salary: salary,
            salary_kind: SalaryKind::Monthly,
            inss_percent: None,
        }
    }

    /// E1 earns 2200/month (10/h) and worked 2h extra on Monday 2024-05-06.
    /// E2 has no salary on file.
    fn seeded_store() -> Arc<InMemoryStore> {
        let store = Arc::new(InMemoryStore::new());
        store.upsert_employee(employee("E1", Some(dec!(2200)))).unwrap();
        store.upsert_employee(employee("E2", None)).unwrap();
        store
            .save_punch(PunchRecord::new("", "E1", d("2024-05-06")).first_pair(t("08:00"), t("18:00")))
            .unwrap();
        store
            .save_punch(PunchRecord::new("", "E2", d("2024-05-06")).first_pair(t("08:00"), t("16:00")))
            .unwrap();
        store
    }

    fn engine_for(collab: Collaborators) -> PayrollEngine {
        let config = EngineConfig {
            page_size: 1,
            max_concurrency: 2,
            event_codes: EventCodes::default(),
        };
        PayrollEngine::new(collab, config).unwrap()
    }

    fn line_item(id: &str, code: &str, amount: Decimal) -> PayrollLineItem {
        PayrollLineItem {
            id: id.to_string(),
            competence: may(),
            employee_id: "E1".to_string(),
            event_code: code.to_string(),
            amount,
            reference: "manual".to_string(),
            note: None,
        }
    }

    /// Ledger that fails writes for one event code and can cancel the run
    /// after its first successful write.
    struct FlakyLedger {
        inner: Arc<InMemoryStore>,
        fail_code: Option<String>,
        cancel_after_write: Option<CancellationToken>,
    }

    impl FlakyLedger {
        fn check(&self, code: &str) -> Result<(), StoreError> {
            if self.fail_code.as_deref() == Some(code) {
                return Err(StoreError::Api {
                    status: 503,
                    message: Some("ledger unavailable".to_string()),
                });
            }
            Ok(())
        }

        fn written(&self) {
            if let Some(token) = &self.cancel_after_write {
                token.cancel();
            }
        }
    }

    #[async_trait]
    impl PayrollLedger for FlakyLedger {
        async fn line_item_page(
            &self,
            query: &LineItemQuery,
            page: u32,
            page_size: u32,
        ) -> Result<Page<PayrollLineItem>, StoreError> {
            self.inner.line_item_page(query, page, page_size).await
        }

        async fn create_line_item(&self, draft: &LineItemDraft) -> Result<PayrollLineItem, StoreError> {
            self.check(&draft.event_code)?;
            let item = self.inner.create_line_item(draft).await?;
            self.written();
            Ok(item)
        }

        async fn update_line_item(
            &self,
            id: &str,
            draft: &LineItemDraft,
        ) -> Result<PayrollLineItem, StoreError> {
            self.check(&draft.event_code)?;
            let item = self.inner.update_line_item(id, draft).await?;
            self.written();
            Ok(item)
        }

        async fn delete_line_item(&self, id: &str) -> Result<(), StoreError> {
            self.inner.delete_line_item(id).await?;
            self.written();
            Ok(())
        }
    }

    /// Ledger whose reads fail for one employee.
    struct UnreadableLedger {
        inner: Arc<InMemoryStore>,
        employee_id: &'static str,
    }

    #[async_trait]
    impl PayrollLedger for UnreadableLedger {
        async fn line_item_page(
            &self,
            query: &LineItemQuery,
            page: u32,
            page_size: u32,
        ) -> Result<Page<PayrollLineItem>, StoreError> {
            if query.employee_id.as_deref() == Some(self.employee_id) {
                return Err(StoreError::RateLimited);
            }
            self.inner.line_item_page(query, page, page_size).await
        }

        async fn create_line_item(&self, draft: &LineItemDraft) -> Result<PayrollLineItem, StoreError> {
            self.inner.create_line_item(draft).await
        }

        async fn update_line_item(
            &self,
            id: &str,
            draft: &LineItemDraft,
        ) -> Result<PayrollLineItem, StoreError> {
            self.inner.update_line_item(id, draft).await
        }

        async fn delete_line_item(&self, id: &str) -> Result<(), StoreError> {
            self.inner.delete_line_item(id).await
        }
    }

    struct BrokenPunches;

    #[async_trait]
    impl PunchRecordSource for BrokenPunches {
        async fn punch_page(
            &self,
            _from: NaiveDate,
            _to: NaiveDate,
            _page: u32,
            _page_size: u32,
        ) -> Result<Page<PunchRecord>, StoreError> {
            Err(StoreError::RateLimited)
        }
    }

    #[tokio::test]
    async fn aggregates_every_directory_employee_in_order() {
        let engine = engine_for(Collaborators::from_single(seeded_store()));
        let aggregates = engine.aggregate_competence(may()).await.unwrap();

        let ids: Vec<&str> = aggregates.iter().map(|a| a.employee_id.as_str()).collect();
        assert_eq!(ids, vec!["E1", "E2"]);
        assert_eq!(aggregates[0].overtime_minutes, 120);
        assert_eq!(aggregates[1].overtime_minutes, 0);
        assert_eq!(aggregates[1].worked_minutes, 480);
    }

    #[tokio::test]
    async fn employee_calendar_entries_only_apply_to_their_employee() {
        let store = seeded_store();
        store
            .add_employee_entry(EmployeeCalendarEntry {
                employee_id: "E2".to_string(),
                date: d("2024-05-06"),
                kind: EmployeeDayKind::DayOff,
                note: None,
            })
            .await
            .unwrap();
        let engine = engine_for(Collaborators::from_single(store));

        let e2 = engine.aggregate_employee(may(), "E2").await.unwrap().unwrap();
        assert_eq!(e2.overtime100_minutes, 480);
        let e1 = engine.aggregate_employee(may(), "E1").await.unwrap().unwrap();
        assert_eq!(e1.overtime100_minutes, 0);
        assert!(engine.aggregate_employee(may(), "E9").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn read_failures_abort_the_computation() {
        let store = seeded_store();
        let mut collab = Collaborators::from_single(store);
        collab.punches = Arc::new(BrokenPunches);
        let engine = engine_for(collab);

        let err = engine.aggregate_competence(may()).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Read {
                what: "punch records",
                source: StoreError::RateLimited
            }
        ));
    }

    #[tokio::test]
    async fn reconciliation_is_idempotent() {
        let store = seeded_store();
        let engine = engine_for(Collaborators::from_single(store.clone()));
        let cancel = CancellationToken::new();

        let first = engine.reconcile_competence(may(), &cancel).await.unwrap();
        assert!(first.is_clean());
        // overtime and DSR on overtime for E1, nothing for the unpaid E2
        assert_eq!(first.succeeded.len(), 2);
        let mut codes: Vec<String> = store
            .line_items()
            .unwrap()
            .into_iter()
            .map(|i| {
                assert_eq!(i.employee_id, "E1");
                assert_eq!(i.note.as_deref(), Some(AUTO_GENERATED_NOTE));
                i.event_code
            })
            .collect();
        codes.sort();
        assert_eq!(codes, vec!["DSRHE", "HE50"]);

        let second = engine.reconcile_competence(may(), &cancel).await.unwrap();
        assert!(second.succeeded.is_empty());
        assert!(second.failed.is_empty());
        assert_eq!(second.summary(), "0 operations failed, 0 succeeded");
    }

    #[tokio::test]
    async fn overtime_amounts_reach_the_ledger() {
        let store = seeded_store();
        let engine = engine_for(Collaborators::from_single(store.clone()));
        engine
            .reconcile_competence(may(), &CancellationToken::new())
            .await
            .unwrap();

        let items = store.line_items().unwrap();
        let he50 = items.iter().find(|i| i.event_code == "HE50").unwrap();
        assert_eq!(he50.amount, dec!(30.00));
        assert_eq!(he50.reference, "2h");
        // 120 x 8 rest days / 23 working days = 41.74 minutes
        let dsr = items.iter().find(|i| i.event_code == "DSRHE").unwrap();
        assert_eq!(dsr.amount, dec!(6.96));
    }

    #[tokio::test]
    async fn a_failed_write_does_not_block_other_codes() {
        let store = seeded_store();
        let mut collab = Collaborators::from_single(store.clone());
        collab.ledger = Arc::new(FlakyLedger {
            inner: store.clone(),
            fail_code: Some("HE50".to_string()),
            cancel_after_write: None,
        });
        let engine = engine_for(collab);

        let report = engine
            .reconcile_competence(may(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.summary(), "1 operations failed, 1 succeeded");
        assert_eq!(report.failed[0].operation.event_code, "HE50");
        assert_eq!(report.succeeded[0].event_code, "DSRHE");

        let items = store.line_items().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].event_code, "DSRHE");
    }

    #[tokio::test]
    async fn a_failed_update_skips_the_rest_of_its_group() {
        let store = seeded_store();
        store.insert_line_item(line_item("A", "HE50", dec!(10))).unwrap();
        store.insert_line_item(line_item("B", "HE50", dec!(20))).unwrap();
        let mut collab = Collaborators::from_single(store.clone());
        collab.ledger = Arc::new(FlakyLedger {
            inner: store.clone(),
            fail_code: Some("HE50".to_string()),
            cancel_after_write: None,
        });
        let engine = engine_for(collab);

        let report = engine
            .reconcile_competence(may(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].operation.kind, OperationKind::Update);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].kind, OperationKind::Delete);
        assert_eq!(report.skipped[0].line_item_id.as_deref(), Some("B"));
        // the duplicate survives for the next run to collapse
        assert_eq!(store.line_items().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn duplicates_are_collapsed_on_the_ledger() {
        let store = seeded_store();
        store.insert_line_item(line_item("A", "HE50", dec!(10))).unwrap();
        store.insert_line_item(line_item("B", "HE50", dec!(20))).unwrap();
        store.insert_line_item(line_item("C", "HE50", dec!(30))).unwrap();
        let engine = engine_for(Collaborators::from_single(store.clone()));

        let report = engine
            .reconcile_competence(may(), &CancellationToken::new())
            .await
            .unwrap();
        assert!(report.is_clean());

        let he50: Vec<PayrollLineItem> = store
            .line_items()
            .unwrap()
            .into_iter()
            .filter(|i| i.event_code == "HE50")
            .collect();
        assert_eq!(he50.len(), 1);
        assert_eq!(he50[0].id, "A");
        assert_eq!(he50[0].amount, dec!(30.00));
    }

    #[tokio::test]
    async fn unreadable_ledger_for_one_employee_is_reported() {
        let store = seeded_store();
        store.upsert_employee(employee("E3", Some(dec!(2200)))).unwrap();
        let mut stale = line_item("S", "HE50", dec!(30));
        stale.employee_id = "E3".to_string();
        stale.note = Some(AUTO_GENERATED_NOTE.to_string());
        store.insert_line_item(stale).unwrap();
        let mut collab = Collaborators::from_single(store.clone());
        collab.ledger = Arc::new(UnreadableLedger {
            inner: store.clone(),
            employee_id: "E2",
        });
        let engine = engine_for(collab);

        let report = engine
            .reconcile_competence(may(), &CancellationToken::new())
            .await
            .unwrap();
        // E1 writes HE50 and DSRHE, E3 loses its stale item
        assert_eq!(report.succeeded.len(), 3);
        assert_eq!(report.failed_employees.len(), 1);
        assert_eq!(report.failed_employees[0].employee_id, "E2");
        assert!(!report.is_clean());
        assert_eq!(
            report.summary(),
            "0 operations failed, 3 succeeded, 1 employees not read"
        );
        let remaining: Vec<String> = store
            .line_items()
            .unwrap()
            .into_iter()
            .map(|i| i.employee_id)
            .collect();
        assert_eq!(remaining, vec!["E1", "E1"]);
    }

    #[tokio::test]
    async fn missing_salary_removes_stale_items() {
        let store = Arc::new(InMemoryStore::new());
        store.upsert_employee(employee("E1", None)).unwrap();
        let mut old = line_item("OLD", "HE50", dec!(30));
        old.note = Some(AUTO_GENERATED_NOTE.to_string());
        store.insert_line_item(old).unwrap();
        let engine = engine_for(Collaborators::from_single(store.clone()));

        let report = engine
            .reconcile_competence(may(), &CancellationToken::new())
            .await
            .unwrap();
        assert!(report.is_clean());
        assert_eq!(report.succeeded.len(), 1);
        assert_eq!(report.succeeded[0].kind, OperationKind::Delete);
        assert!(store.line_items().unwrap().is_empty());
    }

    #[tokio::test]
    async fn run_locks_are_released_after_each_employee() {
        let engine = engine_for(Collaborators::from_single(seeded_store()));
        engine
            .reconcile_competence(may(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(engine.tracked_run_locks(), 0);
    }

    #[tokio::test]
    async fn cancelled_runs_issue_no_writes() {
        let store = seeded_store();
        let engine = engine_for(Collaborators::from_single(store.clone()));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = engine.reconcile_competence(may(), &cancel).await.unwrap();
        assert!(report.cancelled);
        assert!(report.succeeded.is_empty());
        assert!(store.line_items().unwrap().is_empty());
    }

    #[tokio::test]
    async fn cancellation_stops_before_the_next_write() {
        let store = seeded_store();
        let cancel = CancellationToken::new();
        let mut collab = Collaborators::from_single(store.clone());
        collab.ledger = Arc::new(FlakyLedger {
            inner: store.clone(),
            fail_code: None,
            cancel_after_write: Some(cancel.clone()),
        });
        let engine = engine_for(collab);

        let report = engine.reconcile_competence(may(), &cancel).await.unwrap();
        assert!(report.cancelled);
        assert_eq!(report.succeeded.len(), 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(store.line_items().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn concurrent_runs_do_not_duplicate_items() {
        let store = seeded_store();
        let engine = Arc::new(engine_for(Collaborators::from_single(store.clone())));
        let cancel = CancellationToken::new();

        let (a, b) = tokio::join!(
            engine.reconcile_competence(may(), &cancel),
            engine.reconcile_competence(may(), &cancel)
        );
        let total = a.unwrap().succeeded.len() + b.unwrap().succeeded.len();
        assert_eq!(total, 2);
        assert_eq!(store.line_items().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn catalog_creates_only_missing_events() {
        let store = seeded_store();
        store
            .create_event(&EventKind::Overtime.definition("HE50"))
            .await
            .unwrap();
        let engine = engine_for(Collaborators::from_single(store.clone()));

        let created = engine.ensure_event_catalog().await.unwrap();
        let codes: Vec<&str> = created.iter().map(|e| e.code.as_str()).collect();
        assert_eq!(codes, vec!["HE100", "ADNOT", "FALTA", "DSRHE"]);
        assert_eq!(store.events().await.unwrap().len(), 5);
        assert!(engine.ensure_event_catalog().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejects_ambiguous_event_codes() {
        let config = EngineConfig {
            event_codes: EventCodes {
                night_differential: "HE50".to_string(),
                ..EventCodes::default()
            },
            ..EngineConfig::default()
        };
        let result = PayrollEngine::new(Collaborators::from_single(seeded_store()), config);
        assert!(matches!(result, Err(EngineError::InvalidEventCodes(_))));
    }

    #[tokio::test]
    async fn annual_hour_bank_spans_months() {
        let store = seeded_store();
        let mut ov = EmployeeOverride::new("E1");
        ov.bank_period = Some(BankPeriod::Annual);
        ov.bank_start_month = Some(4);
        store.put_override(ov).await.unwrap();
        // 1h short on Tuesday 2024-04-02
        store
            .save_punch(PunchRecord::new("", "E1", d("2024-04-02")).first_pair(t("08:00"), t("15:00")))
            .unwrap();
        let engine = engine_for(Collaborators::from_single(store));

        let statement = engine.hour_bank("E1", may()).await.unwrap().unwrap();
        assert_eq!(statement.first, Competence::new(2024, 4).unwrap());
        assert_eq!(statement.months.len(), 2);
        assert_eq!(statement.balance_minutes, 120 - 60);

        let monthly = engine.hour_bank("E2", may()).await.unwrap().unwrap();
        assert_eq!(monthly.period, BankPeriod::Monthly);
        assert_eq!(monthly.first, may());
        assert!(engine.hour_bank("E9", may()).await.unwrap().is_none());
    }
}
