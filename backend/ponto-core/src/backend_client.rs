// src/backend_client.rs
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, error, warn};
use url::Url;

use crate::calendar::{CalendarSnapshot, EmployeeCalendarEntry, GlobalCalendarEntry};
use crate::error::StoreError;
use crate::payroll::{Employee, EventDefinition, LineItemDraft, PayrollLineItem};
use crate::ports::{
    CalendarSource, EmployeeDirectory, EventCatalog, LineItemQuery, Page, PayrollLedger,
    PunchRecordSource, ScheduleRuleSource,
};
use crate::punch::PunchRecord;
use crate::schedule::{ContractType, EmployeeOverride, RuleBook, ScheduleRule};

/// Error body returned by the backend on non-success responses.
#[derive(Debug, Deserialize)]
struct ErrorPayload {
    message: Option<String>,
}

fn error_message(body: &str) -> Option<String> {
    match serde_json::from_str::<ErrorPayload>(body) {
        Ok(parsed) => parsed.message,
        Err(_) if body.trim().is_empty() => None,
        Err(_) => Some(body.to_string()),
    }
}

/// JSON REST client for the attendance backend. Implements every
/// collaborator port.
#[derive(Debug, Clone)]
pub struct BackendClient {
    http_client: Client,
    base_url: Url,
    token: Option<String>,
}

impl BackendClient {
    pub fn new(base_url: &str, token: Option<String>, http_client: Client) -> Result<Self, StoreError> {
        let mut base_url = Url::parse(base_url)?;
        // keep the last path segment when joining endpoints
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            http_client,
            base_url,
            token,
        })
    }

    fn endpoint_url(&self, endpoint: &str) -> Result<Url, StoreError> {
        Ok(self.base_url.join(endpoint.trim_start_matches('/'))?)
    }

    fn build_request(&self, method: Method, endpoint: &str) -> Result<RequestBuilder, StoreError> {
        let url = self.endpoint_url(endpoint)?;
        let mut builder = self
            .http_client
            .request(method, url)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json");
        if let Some(token) = &self.token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        Ok(builder)
    }

    /// Sends the request and returns the body text of a success response.
    async fn send(&self, request_builder: RequestBuilder, context_msg: &str) -> Result<String, StoreError> {
        let request = request_builder.build().map_err(|e| {
            error!("Request build failed for '{}': {}", context_msg, e);
            StoreError::Request(e)
        })?;
        let request_url = request.url().to_string();
        debug!("Sending request for '{}' to URL: {}", context_msg, request_url);

        let resp = self.http_client.execute(request).await.map_err(|e| {
            error!(
                "HTTP execution failed before receiving response for '{}' (URL: {}): {}",
                context_msg, request_url, e
            );
            StoreError::Request(e)
        })?;

        let status = resp.status();
        debug!(
            "Received response for '{}' (URL: {}): Status={}",
            context_msg, request_url, status
        );
        let body = resp.text().await?;

        if status.is_success() {
            return Ok(body);
        }
        error!(
            "API Error Response: Status={}, Body='{}' for URL: {}",
            status, body, request_url
        );
        if status == StatusCode::TOO_MANY_REQUESTS {
            warn!("Rate limit exceeded for '{}' (URL: {})", context_msg, request_url);
            return Err(StoreError::RateLimited);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound {
                what: "resource",
                id: request_url,
            });
        }
        Err(StoreError::Api {
            status: status.as_u16(),
            message: error_message(&body),
        })
    }

    async fn send_and_deserialize<T: DeserializeOwned>(
        &self,
        request_builder: RequestBuilder,
        context_msg: &str,
    ) -> Result<T, StoreError> {
        let body = self.send(request_builder, context_msg).await?;
        serde_json::from_str::<T>(&body).map_err(|e| {
            error!("JSON deserialization failed for '{}': {}", context_msg, e);
            StoreError::Json(e)
        })
    }

    async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
        context_msg: &str,
    ) -> Result<T, StoreError> {
        let request = self.build_request(Method::GET, endpoint)?.query(query);
        self.send_and_deserialize(request, context_msg).await
    }
}

fn paging(page: u32, page_size: u32) -> [(&'static str, String); 2] {
    [("page", page.to_string()), ("pageSize", page_size.to_string())]
}

#[async_trait]
impl PunchRecordSource for BackendClient {
    async fn punch_page(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        page: u32,
        page_size: u32,
    ) -> Result<Page<PunchRecord>, StoreError> {
        let mut query = vec![("from", from.to_string()), ("to", to.to_string())];
        query.extend(paging(page, page_size));
        self.get("/punch-records", &query, "Get Punch Records").await
    }
}

#[async_trait]
impl ScheduleRuleSource for BackendClient {
    async fn rule_book(&self) -> Result<RuleBook, StoreError> {
        self.get("/schedule-rules", &[], "Get Schedule Rules").await
    }

    async fn put_base_rule(
        &self,
        contract: ContractType,
        rule: ScheduleRule,
    ) -> Result<(), StoreError> {
        rule.validate()?;
        let endpoint = format!("/schedule-rules/{}", contract.as_label());
        let request = self.build_request(Method::PUT, &endpoint)?.json(&rule);
        self.send(request, "Put Schedule Rule").await.map(|_| ())
    }

    async fn put_override(&self, ov: EmployeeOverride) -> Result<(), StoreError> {
        ov.validate()?;
        let endpoint = format!("/schedule-overrides/{}", ov.employee_id);
        let request = self.build_request(Method::PUT, &endpoint)?.json(&ov);
        self.send(request, "Put Schedule Override").await.map(|_| ())
    }
}

#[async_trait]
impl CalendarSource for BackendClient {
    async fn calendars(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<CalendarSnapshot, StoreError> {
        let query = [("from", from.to_string()), ("to", to.to_string())];
        self.get("/calendar", &query, "Get Calendars").await
    }

    async fn add_global_entry(&self, entry: GlobalCalendarEntry) -> Result<(), StoreError> {
        let request = self.build_request(Method::POST, "/calendar/global")?.json(&entry);
        self.send(request, "Add Global Calendar Entry").await.map(|_| ())
    }

    async fn add_employee_entry(&self, entry: EmployeeCalendarEntry) -> Result<(), StoreError> {
        let request = self.build_request(Method::POST, "/calendar/employees")?.json(&entry);
        self.send(request, "Add Employee Calendar Entry").await.map(|_| ())
    }
}

#[async_trait]
impl EmployeeDirectory for BackendClient {
    async fn employees(&self) -> Result<Vec<Employee>, StoreError> {
        self.get("/employees", &[], "Get Employees").await
    }
}

#[async_trait]
impl PayrollLedger for BackendClient {
    async fn line_item_page(
        &self,
        query: &LineItemQuery,
        page: u32,
        page_size: u32,
    ) -> Result<Page<PayrollLineItem>, StoreError> {
        let mut params = vec![("competence", query.competence.to_string())];
        if let Some(employee_id) = &query.employee_id {
            params.push(("employeeId", employee_id.clone()));
        }
        if let Some(event_code) = &query.event_code {
            params.push(("eventCode", event_code.clone()));
        }
        params.extend(paging(page, page_size));
        self.get("/payroll/line-items", &params, "Get Line Items").await
    }

    async fn create_line_item(&self, draft: &LineItemDraft) -> Result<PayrollLineItem, StoreError> {
        let request = self.build_request(Method::POST, "/payroll/line-items")?.json(draft);
        self.send_and_deserialize(request, "Create Line Item").await
    }

    async fn update_line_item(
        &self,
        id: &str,
        draft: &LineItemDraft,
    ) -> Result<PayrollLineItem, StoreError> {
        let endpoint = format!("/payroll/line-items/{}", id);
        let request = self.build_request(Method::PUT, &endpoint)?.json(draft);
        self.send_and_deserialize(request, "Update Line Item").await
    }

    async fn delete_line_item(&self, id: &str) -> Result<(), StoreError> {
        let endpoint = format!("/payroll/line-items/{}", id);
        let request = self.build_request(Method::DELETE, &endpoint)?;
        self.send(request, "Delete Line Item").await.map(|_| ())
    }
}

#[async_trait]
impl EventCatalog for BackendClient {
    async fn events(&self) -> Result<Vec<EventDefinition>, StoreError> {
        self.get("/payroll/events", &[], "Get Payroll Events").await
    }

    async fn create_event(&self, definition: &EventDefinition) -> Result<(), StoreError> {
        let request = self.build_request(Method::POST, "/payroll/events")?.json(definition);
        self.send(request, "Create Payroll Event").await.map(|_| ())
    }
}
