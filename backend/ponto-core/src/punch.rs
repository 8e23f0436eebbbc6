// src/punch.rs
use chrono::{NaiveDate, NaiveTime};
use rust_decimal::prelude::*;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::daily_time::{day_minutes, is_half_open};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PunchStatus {
    #[default]
    Ok,
    Inconsistent,
}

/// One day of clock punches for one employee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PunchRecord {
    pub id: String,
    pub employee_id: String,
    pub date: NaiveDate,
    #[serde(default, with = "clock_time")]
    pub entrance1: Option<NaiveTime>,
    #[serde(default, with = "clock_time")]
    pub exit1: Option<NaiveTime>,
    #[serde(default, with = "clock_time")]
    pub entrance2: Option<NaiveTime>,
    #[serde(default, with = "clock_time")]
    pub exit2: Option<NaiveTime>,
    #[serde(default)]
    pub justification: Option<String>,
    #[serde(default)]
    pub status: PunchStatus,
    #[serde(default)]
    pub total_hours: Option<Decimal>,
}

impl PunchRecord {
    pub fn new(id: &str, employee_id: &str, date: NaiveDate) -> Self {
        Self {
            id: id.to_string(),
            employee_id: employee_id.to_string(),
            date,
            entrance1: None,
            exit1: None,
            entrance2: None,
            exit2: None,
            justification: None,
            status: PunchStatus::Ok,
            total_hours: None,
        }
    }

    pub fn first_pair(mut self, entrance: Option<NaiveTime>, exit: Option<NaiveTime>) -> Self {
        self.entrance1 = entrance;
        self.exit1 = exit;
        self
    }

    pub fn second_pair(mut self, entrance: Option<NaiveTime>, exit: Option<NaiveTime>) -> Self {
        self.entrance2 = entrance;
        self.exit2 = exit;
        self
    }

    pub fn has_punches(&self) -> bool {
        self.entrance1.is_some()
            || self.exit1.is_some()
            || self.entrance2.is_some()
            || self.exit2.is_some()
    }

    pub fn has_half_open_pair(&self) -> bool {
        is_half_open(self.entrance1, self.exit1) || is_half_open(self.entrance2, self.exit2)
    }

    /// Worked minutes from the punches, or from the stored total when the
    /// record carries no punches at all (e.g. a manually entered day).
    pub fn worked_minutes(&self) -> i64 {
        if self.has_punches() {
            day_minutes(self.entrance1, self.exit1, self.entrance2, self.exit2)
        } else {
            self.total_hours
                .map(|h| (h * dec!(60)).round().to_i64().unwrap_or(0))
                .unwrap_or(0)
        }
    }

    /// Recomputes the status flag and the denormalized total, as done on
    /// every save.
    pub fn normalized(mut self) -> Self {
        self.status = if self.has_half_open_pair() {
            PunchStatus::Inconsistent
        } else {
            PunchStatus::Ok
        };
        if self.has_punches() {
            let minutes = day_minutes(self.entrance1, self.exit1, self.entrance2, self.exit2);
            self.total_hours = Some((Decimal::from(minutes) / dec!(60)).round_dp(2));
        }
        self
    }
}

/// `"HH:MM"` punches; `"HH:MM:SS"` is accepted on input and an empty string
/// or null means "not punched".
pub(crate) mod clock_time {
    use chrono::NaiveTime;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<NaiveTime>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(t) => s.serialize_str(&t.format("%H:%M").to_string()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveTime>, D::Error> {
        let raw: Option<String> = Option::deserialize(d)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(text) => NaiveTime::parse_from_str(text, "%H:%M")
                .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M:%S"))
                .map(Some)
                .map_err(|e| D::Error::custom(format!("invalid punch time '{}': {}", text, e))),
        }
    }
}
