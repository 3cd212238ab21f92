use crate::models::{DueAppointment, TenantSettings};
use async_trait::async_trait;
use sqlx::{query_as, PgPool};
use uuid::Uuid;

/// The rows the dispatcher reads and the single flag it writes.
#[async_trait]
pub trait ReminderStore: Send + Sync {
    /// All scheduled appointments, across every clinic, whose reminder is
    /// still pending.
    async fn fetch_due_appointments(&self) -> Result<Vec<DueAppointment>, sqlx::Error>;

    async fn find_settings(&self, clinic_id: Uuid) -> Result<Option<TenantSettings>, sqlx::Error>;

    /// Flips `reminder_sent` to true. Returns false when the flag was already
    /// set or the appointment no longer exists.
    async fn mark_reminder_sent(&self, appointment_id: Uuid) -> Result<bool, sqlx::Error>;
}

pub struct PgReminderStore {
    pool: PgPool,
}

impl PgReminderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReminderStore for PgReminderStore {
    async fn fetch_due_appointments(&self) -> Result<Vec<DueAppointment>, sqlx::Error> {
        query_as::<_, DueAppointment>(
            r#"
            SELECT a.id, a.clinic_id, a.appointment_date,
                   c.name AS client_name, c.phone AS client_phone
            FROM core.appointments a
            LEFT JOIN core.clients c ON c.id = a.client_id
            WHERE a.reminder_sent = false
                AND a.status = 'scheduled'
            ORDER BY a.appointment_date
            "#,
        )
        .fetch_all(&self.pool)
        .await
    }

    async fn find_settings(&self, clinic_id: Uuid) -> Result<Option<TenantSettings>, sqlx::Error> {
        query_as::<_, TenantSettings>(
            r#"
            SELECT clinic_id, clinic_name, reminder_message, send_hour,
                   zapi_instance_id, zapi_token, zapi_client_token, updated_at
            FROM core.clinic_settings
            WHERE clinic_id = $1
            "#,
        )
        .bind(clinic_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn mark_reminder_sent(&self, appointment_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE core.appointments
            SET reminder_sent = true
            WHERE id = $1
                AND reminder_sent = false
            "#,
        )
        .bind(appointment_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::clinic;
    use crate::models::{AppointmentChanges, AppointmentStatus};
    use chrono::{TimeZone, Utc};
    use sqlx::Executor;

    async fn setup(pool: &PgPool) -> (Uuid, Uuid) {
        let schema_sql = include_str!("../schema.sql");
        pool.execute(schema_sql).await.expect("Failed to create schema");

        let clinic_id: Uuid = sqlx::query_scalar(
            "INSERT INTO core.clinics (owner_id, name) VALUES ('owner-1', 'Clínica') RETURNING id",
        )
        .fetch_one(pool)
        .await
        .expect("Failed to insert clinic");

        let client_id: Uuid = sqlx::query_scalar(
            "INSERT INTO core.clients (clinic_id, name, phone) VALUES ($1, 'Ana', '5511999990000') RETURNING id",
        )
        .bind(clinic_id)
        .fetch_one(pool)
        .await
        .expect("Failed to insert client");

        (clinic_id, client_id)
    }

    async fn insert_appointment(pool: &PgPool, clinic_id: Uuid, client_id: Uuid) -> Uuid {
        sqlx::query_scalar(
            "INSERT INTO core.appointments (clinic_id, client_id, appointment_date) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(clinic_id)
        .bind(client_id)
        .bind(Utc.with_ymd_and_hms(2025, 3, 5, 17, 30, 0).unwrap())
        .fetch_one(pool)
        .await
        .expect("Failed to insert appointment")
    }

    #[sqlx::test(migrations = false)]
    #[ignore = "requires DATABASE_URL pointing at a Postgres server"]
    async fn fetches_pending_appointments_with_client(pool: PgPool) {
        let (clinic_id, client_id) = setup(&pool).await;
        let appointment_id = insert_appointment(&pool, clinic_id, client_id).await;
        let store = PgReminderStore::new(pool.clone());

        let due = store.fetch_due_appointments().await.unwrap();

        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, appointment_id);
        assert_eq!(due[0].client_name.as_deref(), Some("Ana"));
        assert_eq!(due[0].phone(), Some("5511999990000"));
    }

    #[sqlx::test(migrations = false)]
    #[ignore = "requires DATABASE_URL pointing at a Postgres server"]
    async fn marking_sent_is_one_way_and_removes_from_due(pool: PgPool) {
        let (clinic_id, client_id) = setup(&pool).await;
        let appointment_id = insert_appointment(&pool, clinic_id, client_id).await;
        let store = PgReminderStore::new(pool.clone());

        assert!(store.mark_reminder_sent(appointment_id).await.unwrap());
        assert!(!store.mark_reminder_sent(appointment_id).await.unwrap());

        let due = store.fetch_due_appointments().await.unwrap();
        assert!(due.is_empty(), "Appointment was not marked as sent");
    }

    #[sqlx::test(migrations = false)]
    #[ignore = "requires DATABASE_URL pointing at a Postgres server"]
    async fn cancelled_appointment_is_not_due(pool: PgPool) {
        let (clinic_id, client_id) = setup(&pool).await;
        let appointment_id = insert_appointment(&pool, clinic_id, client_id).await;
        let store = PgReminderStore::new(pool.clone());

        let changes = AppointmentChanges {
            appointment_date: None,
            status: Some(AppointmentStatus::Cancelled),
        };
        let updated = clinic::update_appointment(&pool, clinic_id, appointment_id, &changes)
            .await
            .unwrap()
            .expect("Appointment was not updated");
        assert_eq!(updated.status, "cancelled");

        let due = store.fetch_due_appointments().await.unwrap();
        assert!(due.is_empty(), "Cancelled appointment is still due for a reminder");

        let rejected = sqlx::query("UPDATE core.appointments SET status = 'anything' WHERE id = $1")
            .bind(appointment_id)
            .execute(&pool)
            .await;
        assert!(rejected.is_err(), "Unknown status was stored");
    }

    #[sqlx::test(migrations = false)]
    #[ignore = "requires DATABASE_URL pointing at a Postgres server"]
    async fn missing_settings_is_none(pool: PgPool) {
        let (clinic_id, _) = setup(&pool).await;
        let store = PgReminderStore::new(pool.clone());

        assert!(store.find_settings(clinic_id).await.unwrap().is_none());
    }
}
