use crate::gateway::MessagingGateway;
use crate::models::{DueAppointment, GatewayCredentials, TenantSettings};
use crate::store::ReminderStore;
use crate::system::Clock;
use crate::template::{format_date, format_time, render_reminder};
use chrono::Timelike;
use chrono_tz::Tz;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn, Span};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    MissingPhone,
    MissingSettings,
    OutsideSendHour,
    MissingCredentials,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Sent,
    /// Delivered, but the appointment was already marked or no longer exists.
    SentNotMarked,
    Failed,
    Skipped(SkipReason),
}

/// Counts of what happened to each due appointment during one pass.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchSummary {
    pub due: usize,
    pub sent: usize,
    pub sent_not_marked: usize,
    pub failed: usize,
    pub skipped_missing_phone: usize,
    pub skipped_missing_settings: usize,
    pub skipped_outside_send_hour: usize,
    pub skipped_missing_credentials: usize,
}

impl DispatchSummary {
    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Sent => self.sent += 1,
            Outcome::SentNotMarked => self.sent_not_marked += 1,
            Outcome::Failed => self.failed += 1,
            Outcome::Skipped(SkipReason::MissingPhone) => self.skipped_missing_phone += 1,
            Outcome::Skipped(SkipReason::MissingSettings) => self.skipped_missing_settings += 1,
            Outcome::Skipped(SkipReason::OutsideSendHour) => self.skipped_outside_send_hour += 1,
            Outcome::Skipped(SkipReason::MissingCredentials) => {
                self.skipped_missing_credentials += 1
            }
        }
    }
}

pub struct Dispatcher {
    store: Arc<dyn ReminderStore>,
    gateway: Arc<dyn MessagingGateway>,
    clock: Arc<dyn Clock>,
    timezone: Tz,
    // Serializes passes started from the HTTP trigger and the interval timer.
    pass_lock: Mutex<()>,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn ReminderStore>,
        gateway: Arc<dyn MessagingGateway>,
        clock: Arc<dyn Clock>,
        timezone: Tz,
    ) -> Self {
        Self {
            store,
            gateway,
            clock,
            timezone,
            pass_lock: Mutex::new(()),
        }
    }

    /// Runs one complete dispatch pass over every pending appointment.
    ///
    /// Only a failure to fetch the pending appointments aborts the pass;
    /// per-appointment problems are logged and the pass moves on.
    #[instrument(skip_all, fields(due_appointments = 0, current_hour = tracing::field::Empty))]
    pub async fn run_pass(&self) -> Result<DispatchSummary, sqlx::Error> {
        let _guard = self.pass_lock.lock().await;

        let current_hour = self.clock.now().with_timezone(&self.timezone).hour();
        Span::current().record("current_hour", current_hour);
        info!("Checking for appointments with pending reminders...");

        let appointments = self.store.fetch_due_appointments().await?;

        let mut summary = DispatchSummary {
            due: appointments.len(),
            ..Default::default()
        };
        if appointments.is_empty() {
            info!("No pending reminders found.");
            return Ok(summary);
        }
        Span::current().record("due_appointments", appointments.len());

        let mut settings_cache = HashMap::new();
        for appointment in &appointments {
            let outcome = self
                .process_appointment(appointment, &mut settings_cache, current_hour)
                .await;
            summary.record(outcome);
        }

        info!(
            sent = summary.sent,
            failed = summary.failed,
            "Reminder pass complete."
        );
        Ok(summary)
    }

    #[instrument(skip_all, fields(appointment_id = %appointment.id, clinic_id = %appointment.clinic_id))]
    async fn process_appointment(
        &self,
        appointment: &DueAppointment,
        settings_cache: &mut HashMap<Uuid, Option<TenantSettings>>,
        current_hour: u32,
    ) -> Outcome {
        let Some(phone) = appointment.phone() else {
            debug!("Client has no phone number, skipping.");
            return Outcome::Skipped(SkipReason::MissingPhone);
        };

        let Some(settings) = self.settings_for(appointment.clinic_id, settings_cache).await else {
            info!("No settings found for clinic, skipping.");
            return Outcome::Skipped(SkipReason::MissingSettings);
        };

        if i64::from(settings.send_hour) != i64::from(current_hour) {
            debug!(
                current_hour,
                send_hour = settings.send_hour,
                "Not the configured send hour, skipping."
            );
            return Outcome::Skipped(SkipReason::OutsideSendHour);
        }

        let credentials = match GatewayCredentials::from_settings(&settings) {
            Ok(credentials) => credentials,
            Err(e) => {
                warn!("{}, skipping.", e);
                return Outcome::Skipped(SkipReason::MissingCredentials);
            }
        };

        let local = appointment.appointment_date.with_timezone(&self.timezone);
        let message = render_reminder(
            settings.reminder_message.as_deref(),
            appointment.client_name.as_deref().unwrap_or(""),
            &format_date(&local),
            &format_time(&local),
        );
        debug!(message_len = message.len(), "Rendered reminder.");

        if let Err(e) = self.gateway.send_text(&credentials, phone, &message).await {
            error!("Failed to send reminder: {}.", e);
            return Outcome::Failed;
        }

        match self.store.mark_reminder_sent(appointment.id).await {
            Ok(true) => {
                info!("Reminder sent and marked as sent.");
                Outcome::Sent
            }
            Ok(false) => {
                warn!(
                    appointment_id = %appointment.id,
                    "Reminder sent but the appointment was already marked or no longer exists."
                );
                Outcome::SentNotMarked
            }
            Err(e) => {
                error!("Reminder sent but marking failed: {}. It WILL be re-sent.", e);
                Outcome::Failed
            }
        }
    }

    async fn settings_for(
        &self,
        clinic_id: Uuid,
        cache: &mut HashMap<Uuid, Option<TenantSettings>>,
    ) -> Option<TenantSettings> {
        if let Some(cached) = cache.get(&clinic_id) {
            return cached.clone();
        }

        match self.store.find_settings(clinic_id).await {
            Ok(settings) => {
                cache.insert(clinic_id, settings.clone());
                settings
            }
            // Not cached, a later appointment of the same clinic retries the lookup.
            Err(e) => {
                error!("Error loading clinic settings: {}.", e);
                None
            }
        }
    }
}
