// libs/scheduling-cell/src/services/cancellation.rs
use chrono::{NaiveDate, Utc};
use sqlx::Row;
use tracing::{debug, info, warn};

use shared_database::ScheduleStore;

use crate::models::{AppointmentStatus, CancellationOutcome, ScheduleError};

/// Cancellation coordinator: flips the ledger status and releases the slot
/// back to the pool in one atomic unit.
pub struct CancellationService {
    store: ScheduleStore,
}

impl CancellationService {
    pub fn new(store: &ScheduleStore) -> Self {
        Self {
            store: store.clone(),
        }
    }

    /// Cancel an appointment. The status flip is the source of truth; the
    /// slot release is best-effort cleanup and its absence is surfaced as
    /// `slot_released = false`, never as a failure.
    pub async fn cancel_appointment(
        &self,
        appointment_id: i64,
    ) -> Result<CancellationOutcome, ScheduleError> {
        debug!("Cancelling appointment {}", appointment_id);

        let now = Utc::now();
        let cancelled = AppointmentStatus::Cancelled.to_string();
        let mut tx = self.store.begin().await?;

        // Write-first: the guarded status flip opens the transaction's write
        // scope, so the slot release below reads committed state.
        let changed = sqlx::query(
            "UPDATE appointments SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status <> ?1",
        )
        .bind(&cancelled)
        .bind(now)
        .bind(appointment_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if changed == 0 {
            let existing = sqlx::query("SELECT status FROM appointments WHERE id = ?")
                .bind(appointment_id)
                .fetch_optional(&mut *tx)
                .await?;

            tx.rollback()
                .await
                .map_err(|e| ScheduleError::Store(e.to_string()))?;

            return Err(match existing {
                Some(_) => ScheduleError::AlreadyCancelled(appointment_id),
                None => ScheduleError::NotFound(appointment_id),
            });
        }

        let row = sqlx::query("SELECT day, slot_time FROM appointments WHERE id = ?")
            .bind(appointment_id)
            .fetch_one(&mut *tx)
            .await?;
        let day: NaiveDate = row.try_get("day")?;
        let slot_time: String = row.try_get("slot_time")?;

        // Release only if the slot still references this appointment; a
        // republish may already have dropped the row.
        let slot_released = sqlx::query(
            r#"
            UPDATE schedule_slots
            SET appointment_id = NULL, patient_name = NULL
            WHERE day = ? AND slot_time = ? AND appointment_id = ?
            "#,
        )
        .bind(day)
        .bind(&slot_time)
        .bind(appointment_id)
        .execute(&mut *tx)
        .await?
        .rows_affected()
            > 0;

        tx.commit()
            .await
            .map_err(|e| ScheduleError::Store(e.to_string()))?;

        if slot_released {
            info!(
                "Appointment {} cancelled, slot {} on {} released",
                appointment_id, slot_time, day
            );
        } else {
            warn!(
                "Appointment {} cancelled but slot {} on {} held no matching booking; \
                 schedule and ledger may have drifted",
                appointment_id, slot_time, day
            );
        }

        Ok(CancellationOutcome {
            appointment_id,
            slot_released,
        })
    }
}
