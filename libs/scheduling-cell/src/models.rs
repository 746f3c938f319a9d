// libs/scheduling-cell/src/models.rs
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use shared_database::StoreError;

// ==============================================================================
// SCHEDULE MODELS
// ==============================================================================

/// One date's view of the schedule: the currently offered times plus the
/// times carrying an active booking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayAvailability {
    pub day: NaiveDate,
    /// Offered start times, ascending `HH:MM`.
    pub available: Vec<String>,
    /// Active bookings keyed by start time. A key may legally be absent from
    /// `available` when a later republish dropped the time; the booking
    /// survives regardless.
    pub booked: BTreeMap<String, BookedSlot>,
}

impl DayAvailability {
    /// Times a client can still reserve: offered and not taken.
    pub fn free_slots(&self) -> Vec<String> {
        self.available
            .iter()
            .filter(|time| !self.booked.contains_key(*time))
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookedSlot {
    pub appointment_id: i64,
    pub patient_name: String,
}

/// Result of a publish: the normalized offered list, plus any times that
/// remain booked even though the new list no longer offers them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishOutcome {
    pub day: NaiveDate,
    pub available: Vec<String>,
    pub retained_bookings: Vec<String>,
}

// ==============================================================================
// APPOINTMENT LEDGER MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: i64,
    pub day: NaiveDate,
    pub slot_time: String,
    pub patient_name: String,
    pub patient_phone: String,
    pub patient_email: String,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub status: AppointmentStatus,
    pub is_regular: bool,
    pub regular_patient_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Confirmed,
    Cancelled,
    /// Owned by external operational tooling; representable here, never
    /// written by the coordinators.
    Completed,
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
            AppointmentStatus::Completed => write!(f, "completed"),
        }
    }
}

impl FromStr for AppointmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "confirmed" => Ok(AppointmentStatus::Confirmed),
            "cancelled" => Ok(AppointmentStatus::Cancelled),
            "completed" => Ok(AppointmentStatus::Completed),
            other => Err(format!("unknown appointment status: {}", other)),
        }
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishScheduleRequest {
    pub slots: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookSlotRequest {
    pub day: NaiveDate,
    pub slot_time: String,
    pub patient_name: String,
    pub patient_phone: String,
    pub patient_email: String,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub is_regular: Option<bool>,
    pub regular_patient_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancellationOutcome {
    pub appointment_id: i64,
    /// False when the slot no longer referenced this appointment; the status
    /// change still stands, but operators may want to audit the drift.
    pub slot_released: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppointmentSearchQuery {
    pub from_day: Option<NaiveDate>,
    pub to_day: Option<NaiveDate>,
    pub status: Option<AppointmentStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum ScheduleError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("No schedule published for {0}")]
    NoSchedule(NaiveDate),

    #[error("Slot {time} on {day} is not available")]
    SlotUnavailable { day: NaiveDate, time: String },

    #[error("Appointment {0} not found")]
    NotFound(i64),

    #[error("Appointment {0} is already cancelled")]
    AlreadyCancelled(i64),

    #[error("Store error: {0}")]
    Store(String),
}

impl From<StoreError> for ScheduleError {
    fn from(err: StoreError) -> Self {
        ScheduleError::Store(err.to_string())
    }
}

impl From<sqlx::Error> for ScheduleError {
    fn from(err: sqlx::Error) -> Self {
        ScheduleError::Store(err.to_string())
    }
}

// ==============================================================================
// VALIDATION MODELS
// ==============================================================================

#[derive(Debug, Clone)]
pub struct ScheduleValidationRules {
    pub time_pattern: Regex,
    pub max_slots_per_day: usize,
}

impl Default for ScheduleValidationRules {
    fn default() -> Self {
        Self {
            // 24h wall-clock start times, zero-padded so TEXT ordering is
            // chronological ordering.
            time_pattern: Regex::new(r"^(?:[01][0-9]|2[0-3]):[0-5][0-9]$")
                .expect("time pattern is valid"),
            // 15-minute grid over a full day
            max_slots_per_day: 96,
        }
    }
}

impl ScheduleValidationRules {
    pub fn is_valid_time(&self, raw: &str) -> bool {
        self.time_pattern.is_match(raw)
    }
}
