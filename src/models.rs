use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// An appointment whose reminder has not been sent yet, joined with the
/// client it belongs to.
#[derive(Debug, Clone, FromRow)]
pub struct DueAppointment {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub appointment_date: DateTime<Utc>,
    pub client_name: Option<String>,
    pub client_phone: Option<String>,
}

impl DueAppointment {
    /// The client's phone, if present and not blank.
    pub fn phone(&self) -> Option<&str> {
        self.client_phone
            .as_deref()
            .map(str::trim)
            .filter(|phone| !phone.is_empty())
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TenantSettings {
    pub clinic_id: Uuid,
    pub clinic_name: Option<String>,
    pub reminder_message: Option<String>,
    pub send_hour: i32,
    pub zapi_instance_id: Option<String>,
    pub zapi_token: Option<String>,
    pub zapi_client_token: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Client {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub name: String,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Appointment {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub client_id: Uuid,
    pub client_name: Option<String>,
    pub appointment_date: DateTime<Utc>,
    pub status: String,
    pub reminder_sent: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct NewClient {
    pub name: String,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NewAppointment {
    pub client_id: Uuid,
    pub appointment_date: DateTime<Utc>,
}

/// Lifecycle of an appointment. Only `Scheduled` appointments get reminders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Scheduled,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AppointmentChanges {
    pub appointment_date: Option<DateTime<Utc>>,
    pub status: Option<AppointmentStatus>,
}

#[derive(Debug, Deserialize)]
pub struct SettingsInput {
    pub clinic_name: Option<String>,
    pub reminder_message: Option<String>,
    pub send_hour: i32,
    pub zapi_instance_id: Option<String>,
    pub zapi_token: Option<String>,
    pub zapi_client_token: Option<String>,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum CredentialError {
    #[error("messaging credential `{0}` is not configured")]
    Missing(&'static str),
}

/// The three Z-API credentials of a tenant, all present and non-blank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayCredentials {
    pub instance_id: String,
    pub token: String,
    pub client_token: String,
}

impl GatewayCredentials {
    pub fn from_settings(settings: &TenantSettings) -> Result<Self, CredentialError> {
        Ok(Self {
            instance_id: required(&settings.zapi_instance_id, "zapi_instance_id")?,
            token: required(&settings.zapi_token, "zapi_token")?,
            client_token: required(&settings.zapi_client_token, "zapi_client_token")?,
        })
    }
}

fn required(value: &Option<String>, field: &'static str) -> Result<String, CredentialError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(CredentialError::Missing(field)),
    }
}
