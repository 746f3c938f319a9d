// libs/scheduling-cell/src/services/availability.rs
use std::collections::BTreeMap;

use chrono::NaiveDate;
use sqlx::Row;
use tracing::debug;

use shared_database::ScheduleStore;

use crate::models::{BookedSlot, DayAvailability, ScheduleError};

/// Read-only projection of the schedule over a date range. No locking, no
/// side effects; whatever the pool reads is what callers see.
pub struct AvailabilityService {
    store: ScheduleStore,
}

impl AvailabilityService {
    pub fn new(store: &ScheduleStore) -> Self {
        Self {
            store: store.clone(),
        }
    }

    /// Per published date in `[from, to]`, the offered times and active
    /// bookings. Dates never published are absent from the result; clients
    /// derive effectively-free slots via [`DayAvailability::free_slots`].
    pub async fn query_availability(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<BTreeMap<NaiveDate, DayAvailability>, ScheduleError> {
        if from > to {
            return Err(ScheduleError::Validation(format!(
                "Invalid date range: {} is after {}",
                from, to
            )));
        }

        debug!("Querying availability from {} to {}", from, to);

        let day_rows = sqlx::query("SELECT day FROM schedule_days WHERE day BETWEEN ? AND ? ORDER BY day")
            .bind(from)
            .bind(to)
            .fetch_all(self.store.pool())
            .await?;

        let mut days: BTreeMap<NaiveDate, DayAvailability> = BTreeMap::new();
        for row in &day_rows {
            let day: NaiveDate = row.try_get("day")?;
            days.insert(
                day,
                DayAvailability {
                    day,
                    available: Vec::new(),
                    booked: BTreeMap::new(),
                },
            );
        }

        let slot_rows = sqlx::query(
            r#"
            SELECT day, slot_time, is_offered, appointment_id, patient_name
            FROM schedule_slots
            WHERE day BETWEEN ? AND ?
            ORDER BY day, slot_time
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(self.store.pool())
        .await?;

        for row in &slot_rows {
            let day: NaiveDate = row.try_get("day")?;
            let Some(entry) = days.get_mut(&day) else {
                continue;
            };

            let slot_time: String = row.try_get("slot_time")?;
            let is_offered: bool = row.try_get("is_offered")?;
            if is_offered {
                entry.available.push(slot_time.clone());
            }

            let appointment_id: Option<i64> = row.try_get("appointment_id")?;
            if let Some(appointment_id) = appointment_id {
                let patient_name: Option<String> = row.try_get("patient_name")?;
                entry.booked.insert(
                    slot_time,
                    BookedSlot {
                        appointment_id,
                        patient_name: patient_name.unwrap_or_default(),
                    },
                );
            }
        }

        debug!("Found {} published days in range", days.len());
        Ok(days)
    }
}
