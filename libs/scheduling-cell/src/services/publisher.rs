// libs/scheduling-cell/src/services/publisher.rs
use std::collections::BTreeSet;

use chrono::{NaiveDate, Utc};
use sqlx::Row;
use tracing::{debug, info, warn};

use shared_database::ScheduleStore;

use crate::models::{PublishOutcome, ScheduleError, ScheduleValidationRules};

/// Staff-facing schedule publisher: (re)defines the offered slot list for a
/// date without disturbing slots that already carry a booking.
pub struct SchedulePublisher {
    store: ScheduleStore,
    rules: ScheduleValidationRules,
}

impl SchedulePublisher {
    pub fn new(store: &ScheduleStore) -> Self {
        Self {
            store: store.clone(),
            rules: ScheduleValidationRules::default(),
        }
    }

    /// Validate, deduplicate and sort the candidate slot list, then upsert
    /// the date's schedule in one transaction.
    ///
    /// Booked times absent from the new list stay booked; they simply stop
    /// being offered. Publishing an empty list is legal and leaves the date
    /// published with nothing bookable.
    pub async fn publish_schedule(
        &self,
        day: NaiveDate,
        slots: &[String],
    ) -> Result<PublishOutcome, ScheduleError> {
        debug!("Publishing schedule for {} with {} candidate slots", day, slots.len());

        let offered = self.normalize_slots(slots)?;
        let now = Utc::now();

        let mut tx = self.store.begin().await?;

        // Upsert the day row first; its existence is what later separates
        // "nothing published" from "published but full/empty" for bookings.
        sqlx::query(
            r#"
            INSERT INTO schedule_days (day, published_at, updated_at)
            VALUES (?1, ?2, ?2)
            ON CONFLICT(day) DO UPDATE SET updated_at = excluded.updated_at
            "#,
        )
        .bind(day)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        // Drop unbooked slot rows, then demote whatever survives (all booked)
        // to not-offered before re-offering the new list.
        sqlx::query("DELETE FROM schedule_slots WHERE day = ? AND appointment_id IS NULL")
            .bind(day)
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE schedule_slots SET is_offered = 0 WHERE day = ?")
            .bind(day)
            .execute(&mut *tx)
            .await?;

        for slot_time in &offered {
            sqlx::query(
                r#"
                INSERT INTO schedule_slots (day, slot_time, is_offered)
                VALUES (?, ?, 1)
                ON CONFLICT(day, slot_time) DO UPDATE SET is_offered = 1
                "#,
            )
            .bind(day)
            .bind(slot_time)
            .execute(&mut *tx)
            .await?;
        }

        let stranded = sqlx::query(
            r#"
            SELECT slot_time FROM schedule_slots
            WHERE day = ? AND is_offered = 0 AND appointment_id IS NOT NULL
            ORDER BY slot_time
            "#,
        )
        .bind(day)
        .fetch_all(&mut *tx)
        .await?;

        let retained_bookings: Vec<String> = stranded
            .iter()
            .map(|row| row.try_get("slot_time"))
            .collect::<Result<_, _>>()?;

        tx.commit()
            .await
            .map_err(|e| ScheduleError::Store(e.to_string()))?;

        if !retained_bookings.is_empty() {
            warn!(
                "Schedule for {} no longer offers booked times {:?}; bookings retained",
                day, retained_bookings
            );
        }

        info!("Schedule for {} published with {} slots", day, offered.len());

        Ok(PublishOutcome {
            day,
            available: offered,
            retained_bookings,
        })
    }

    fn normalize_slots(&self, slots: &[String]) -> Result<Vec<String>, ScheduleError> {
        let mut unique = BTreeSet::new();

        for raw in slots {
            let trimmed = raw.trim();
            if !self.rules.is_valid_time(trimmed) {
                return Err(ScheduleError::Validation(format!(
                    "Invalid time slot '{}', expected HH:MM (24h)",
                    raw
                )));
            }
            unique.insert(trimmed.to_string());
        }

        if unique.len() > self.rules.max_slots_per_day {
            return Err(ScheduleError::Validation(format!(
                "Too many slots for one day: {} (maximum {})",
                unique.len(),
                self.rules.max_slots_per_day
            )));
        }

        Ok(unique.into_iter().collect())
    }
}
