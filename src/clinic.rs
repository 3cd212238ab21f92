//! Tenant-scoped CRUD over clients, appointments and clinic settings.
//!
//! Every query is filtered by the clinic id taken from the request, so rows
//! belonging to another clinic behave as if they did not exist.

use crate::models::{
    Appointment, AppointmentChanges, AppointmentStatus, Client, NewAppointment, NewClient,
    SettingsInput, TenantSettings,
};
use chrono::NaiveDate;
use chrono_tz::Tz;
use sqlx::{query_as, PgPool};
use uuid::Uuid;

const APPOINTMENT_COLUMNS: &str = r#"
    a.id, a.clinic_id, a.client_id, c.name AS client_name,
    a.appointment_date, a.status, a.reminder_sent, a.created_at
"#;

pub async fn list_clients(pool: &PgPool, clinic_id: Uuid) -> Result<Vec<Client>, sqlx::Error> {
    query_as::<_, Client>(
        r#"
        SELECT id, clinic_id, name, phone, created_at
        FROM core.clients
        WHERE clinic_id = $1
        ORDER BY created_at DESC
        "#,
    )
    .bind(clinic_id)
    .fetch_all(pool)
    .await
}

pub async fn create_client(
    pool: &PgPool,
    clinic_id: Uuid,
    client: &NewClient,
) -> Result<Client, sqlx::Error> {
    query_as::<_, Client>(
        r#"
        INSERT INTO core.clients (clinic_id, name, phone)
        VALUES ($1, $2, $3)
        RETURNING id, clinic_id, name, phone, created_at
        "#,
    )
    .bind(clinic_id)
    .bind(&client.name)
    .bind(&client.phone)
    .fetch_one(pool)
    .await
}

pub async fn update_client(
    pool: &PgPool,
    clinic_id: Uuid,
    client_id: Uuid,
    client: &NewClient,
) -> Result<Option<Client>, sqlx::Error> {
    query_as::<_, Client>(
        r#"
        UPDATE core.clients
        SET name = $3, phone = $4
        WHERE id = $2 AND clinic_id = $1
        RETURNING id, clinic_id, name, phone, created_at
        "#,
    )
    .bind(clinic_id)
    .bind(client_id)
    .bind(&client.name)
    .bind(&client.phone)
    .fetch_optional(pool)
    .await
}

/// Returns false when no client with that id exists for the clinic.
pub async fn delete_client(
    pool: &PgPool,
    clinic_id: Uuid,
    client_id: Uuid,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM core.clients WHERE id = $2 AND clinic_id = $1")
        .bind(clinic_id)
        .bind(client_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn list_appointments(
    pool: &PgPool,
    clinic_id: Uuid,
) -> Result<Vec<Appointment>, sqlx::Error> {
    query_as::<_, Appointment>(&format!(
        r#"
        SELECT {APPOINTMENT_COLUMNS}
        FROM core.appointments a
        LEFT JOIN core.clients c ON c.id = a.client_id
        WHERE a.clinic_id = $1
        ORDER BY a.appointment_date ASC
        "#
    ))
    .bind(clinic_id)
    .fetch_all(pool)
    .await
}

/// Returns `None` when the client does not belong to the clinic.
pub async fn create_appointment(
    pool: &PgPool,
    clinic_id: Uuid,
    appointment: &NewAppointment,
) -> Result<Option<Appointment>, sqlx::Error> {
    query_as::<_, Appointment>(&format!(
        r#"
        WITH a AS (
            INSERT INTO core.appointments (clinic_id, client_id, appointment_date)
            SELECT $1, c.id, $3
            FROM core.clients c
            WHERE c.id = $2 AND c.clinic_id = $1
            RETURNING *
        )
        SELECT {APPOINTMENT_COLUMNS}
        FROM a
        JOIN core.clients c ON c.id = a.client_id
        "#
    ))
    .bind(clinic_id)
    .bind(appointment.client_id)
    .bind(appointment.appointment_date)
    .fetch_optional(pool)
    .await
}

/// Updates date and status. `reminder_sent` is never touched here.
pub async fn update_appointment(
    pool: &PgPool,
    clinic_id: Uuid,
    appointment_id: Uuid,
    changes: &AppointmentChanges,
) -> Result<Option<Appointment>, sqlx::Error> {
    query_as::<_, Appointment>(&format!(
        r#"
        WITH a AS (
            UPDATE core.appointments
            SET appointment_date = COALESCE($3, appointment_date),
                status = COALESCE($4, status)
            WHERE id = $2 AND clinic_id = $1
            RETURNING *
        )
        SELECT {APPOINTMENT_COLUMNS}
        FROM a
        LEFT JOIN core.clients c ON c.id = a.client_id
        "#
    ))
    .bind(clinic_id)
    .bind(appointment_id)
    .bind(changes.appointment_date)
    .bind(changes.status.map(AppointmentStatus::as_str))
    .fetch_optional(pool)
    .await
}

pub async fn delete_appointment(
    pool: &PgPool,
    clinic_id: Uuid,
    appointment_id: Uuid,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM core.appointments WHERE id = $2 AND clinic_id = $1")
        .bind(clinic_id)
        .bind(appointment_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn get_settings(
    pool: &PgPool,
    clinic_id: Uuid,
) -> Result<Option<TenantSettings>, sqlx::Error> {
    query_as::<_, TenantSettings>(
        r#"
        SELECT clinic_id, clinic_name, reminder_message, send_hour,
               zapi_instance_id, zapi_token, zapi_client_token, updated_at
        FROM core.clinic_settings
        WHERE clinic_id = $1
        "#,
    )
    .bind(clinic_id)
    .fetch_optional(pool)
    .await
}

pub async fn upsert_settings(
    pool: &PgPool,
    clinic_id: Uuid,
    input: &SettingsInput,
) -> Result<TenantSettings, sqlx::Error> {
    query_as::<_, TenantSettings>(
        r#"
        INSERT INTO core.clinic_settings
            (clinic_id, clinic_name, reminder_message, send_hour,
             zapi_instance_id, zapi_token, zapi_client_token, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
        ON CONFLICT (clinic_id) DO UPDATE
        SET clinic_name = EXCLUDED.clinic_name,
            reminder_message = EXCLUDED.reminder_message,
            send_hour = EXCLUDED.send_hour,
            zapi_instance_id = EXCLUDED.zapi_instance_id,
            zapi_token = EXCLUDED.zapi_token,
            zapi_client_token = EXCLUDED.zapi_client_token,
            updated_at = NOW()
        RETURNING clinic_id, clinic_name, reminder_message, send_hour,
                  zapi_instance_id, zapi_token, zapi_client_token, updated_at
        "#,
    )
    .bind(clinic_id)
    .bind(&input.clinic_name)
    .bind(&input.reminder_message)
    .bind(input.send_hour)
    .bind(&input.zapi_instance_id)
    .bind(&input.zapi_token)
    .bind(&input.zapi_client_token)
    .fetch_one(pool)
    .await
}

/// Keeps clients whose name or phone contains `query`, ignoring case.
/// A blank query keeps everything.
pub fn filter_clients(clients: Vec<Client>, query: Option<&str>) -> Vec<Client> {
    let Some(needle) = normalized(query) else {
        return clients;
    };
    clients
        .into_iter()
        .filter(|c| {
            c.name.to_lowercase().contains(&needle)
                || c.phone
                    .as_deref()
                    .is_some_and(|p| p.to_lowercase().contains(&needle))
        })
        .collect()
}

/// Keeps appointments whose client name contains `query` and, when `date`
/// is given, that fall on that calendar day in `tz`.
pub fn filter_appointments(
    appointments: Vec<Appointment>,
    query: Option<&str>,
    date: Option<NaiveDate>,
    tz: Tz,
) -> Vec<Appointment> {
    let needle = normalized(query);
    appointments
        .into_iter()
        .filter(|a| match &needle {
            Some(needle) => a
                .client_name
                .as_deref()
                .is_some_and(|n| n.to_lowercase().contains(needle)),
            None => true,
        })
        .filter(|a| match date {
            Some(day) => a.appointment_date.with_timezone(&tz).date_naive() == day,
            None => true,
        })
        .collect()
}

fn normalized(query: Option<&str>) -> Option<String> {
    query
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(str::to_lowercase)
}
