// libs/scheduling-cell/src/services/booking.rs
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite};
use tracing::{debug, info, warn};

use shared_database::ScheduleStore;

use crate::models::{
    Appointment, AppointmentSearchQuery, AppointmentStatus, BookSlotRequest, ScheduleError,
    ScheduleValidationRules,
};

const APPOINTMENT_COLUMNS: &str = "id, day, slot_time, patient_name, patient_phone, \
     patient_email, reason, notes, status, is_regular, regular_patient_id, \
     created_at, updated_at";

/// Booking coordinator: validates a requested (date, time) against the
/// schedule and claims it together with the ledger insert in one atomic unit.
pub struct BookingService {
    store: ScheduleStore,
    rules: ScheduleValidationRules,
}

impl BookingService {
    pub fn new(store: &ScheduleStore) -> Self {
        Self {
            store: store.clone(),
            rules: ScheduleValidationRules::default(),
        }
    }

    /// Attempt to reserve a slot. Returns the new appointment id.
    ///
    /// The ledger insert runs first: it is the transaction's opening write,
    /// so concurrent bookings serialize on the store's write lock and the
    /// slot-claim guard below always reads committed state. If the guard
    /// claims nothing the whole unit rolls back, ledger row included.
    pub async fn book_slot(&self, request: BookSlotRequest) -> Result<i64, ScheduleError> {
        self.validate_booking_request(&request)?;

        debug!("Booking slot {} on {}", request.slot_time, request.day);

        let now = Utc::now();
        let mut tx = self.store.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO appointments
                (day, slot_time, patient_name, patient_phone, patient_email,
                 reason, notes, status, is_regular, regular_patient_id,
                 created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)
            RETURNING id
            "#,
        )
        .bind(request.day)
        .bind(request.slot_time.trim())
        .bind(request.patient_name.trim())
        .bind(request.patient_phone.trim())
        .bind(request.patient_email.trim())
        .bind(&request.reason)
        .bind(&request.notes)
        .bind(AppointmentStatus::Confirmed.to_string())
        .bind(request.is_regular.unwrap_or(false))
        .bind(request.regular_patient_id)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        let appointment_id: i64 = inserted.try_get("id")?;

        // The correctness gate: only an offered, unclaimed slot row can be
        // taken. First writer to commit wins; a concurrent attempt sees the
        // claim and falls through to the failure branch.
        let claimed = sqlx::query(
            r#"
            UPDATE schedule_slots
            SET appointment_id = ?, patient_name = ?
            WHERE day = ? AND slot_time = ?
              AND is_offered = 1 AND appointment_id IS NULL
            "#,
        )
        .bind(appointment_id)
        .bind(request.patient_name.trim())
        .bind(request.day)
        .bind(request.slot_time.trim())
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if claimed == 0 {
            let day_published = sqlx::query("SELECT day FROM schedule_days WHERE day = ?")
                .bind(request.day)
                .fetch_optional(&mut *tx)
                .await?
                .is_some();

            tx.rollback()
                .await
                .map_err(|e| ScheduleError::Store(e.to_string()))?;

            return if day_published {
                warn!("Slot {} on {} is not bookable", request.slot_time, request.day);
                Err(ScheduleError::SlotUnavailable {
                    day: request.day,
                    time: request.slot_time.trim().to_string(),
                })
            } else {
                warn!("No schedule published for {}", request.day);
                Err(ScheduleError::NoSchedule(request.day))
            };
        }

        tx.commit()
            .await
            .map_err(|e| ScheduleError::Store(e.to_string()))?;

        info!(
            "Appointment {} booked for {} {}",
            appointment_id, request.day, request.slot_time
        );
        Ok(appointment_id)
    }

    /// Ledger read by id.
    pub async fn get_appointment(&self, appointment_id: i64) -> Result<Appointment, ScheduleError> {
        debug!("Fetching appointment {}", appointment_id);

        let row = sqlx::query(&format!(
            "SELECT {} FROM appointments WHERE id = ?",
            APPOINTMENT_COLUMNS
        ))
        .bind(appointment_id)
        .fetch_optional(self.store.pool())
        .await?;

        match row {
            Some(row) => appointment_from_row(&row),
            None => Err(ScheduleError::NotFound(appointment_id)),
        }
    }

    /// Staff-facing ledger listing with optional day-range and status filters.
    pub async fn search_appointments(
        &self,
        query: AppointmentSearchQuery,
    ) -> Result<Vec<Appointment>, ScheduleError> {
        debug!("Searching appointments with filters: {:?}", query);

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {} FROM appointments WHERE 1 = 1",
            APPOINTMENT_COLUMNS
        ));

        if let Some(from_day) = query.from_day {
            builder.push(" AND day >= ").push_bind(from_day);
        }
        if let Some(to_day) = query.to_day {
            builder.push(" AND day <= ").push_bind(to_day);
        }
        if let Some(status) = query.status {
            builder.push(" AND status = ").push_bind(status.to_string());
        }

        builder.push(" ORDER BY day, slot_time");

        if let Some(limit) = query.limit {
            builder.push(" LIMIT ").push_bind(limit);
            if let Some(offset) = query.offset {
                builder.push(" OFFSET ").push_bind(offset);
            }
        }

        let rows = builder.build().fetch_all(self.store.pool()).await?;
        rows.iter().map(appointment_from_row).collect()
    }

    fn validate_booking_request(&self, request: &BookSlotRequest) -> Result<(), ScheduleError> {
        if !self.rules.is_valid_time(request.slot_time.trim()) {
            return Err(ScheduleError::Validation(format!(
                "Invalid time slot '{}', expected HH:MM (24h)",
                request.slot_time
            )));
        }

        for (field, value) in [
            ("patient_name", &request.patient_name),
            ("patient_phone", &request.patient_phone),
            ("patient_email", &request.patient_email),
        ] {
            if value.trim().is_empty() {
                return Err(ScheduleError::Validation(format!(
                    "Missing required contact field: {}",
                    field
                )));
            }
        }

        Ok(())
    }
}

fn appointment_from_row(row: &SqliteRow) -> Result<Appointment, ScheduleError> {
    let status_raw: String = row.try_get("status")?;
    let status = status_raw
        .parse::<AppointmentStatus>()
        .map_err(ScheduleError::Store)?;

    Ok(Appointment {
        id: row.try_get("id")?,
        day: row.try_get("day")?,
        slot_time: row.try_get("slot_time")?,
        patient_name: row.try_get("patient_name")?,
        patient_phone: row.try_get("patient_phone")?,
        patient_email: row.try_get("patient_email")?,
        reason: row.try_get("reason")?,
        notes: row.try_get("notes")?,
        status,
        is_regular: row.try_get("is_regular")?,
        regular_patient_id: row.try_get("regular_patient_id")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
