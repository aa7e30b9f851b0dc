/// Daily debt reminder run
///
/// One run:
/// 1. Promote pending debts past their due date to overdue
/// 2. Select open debts due today or earlier that were not reminded today
/// 3. For each, sequentially: compose the message, send it over WhatsApp,
///    notify staff devices, record the reminder
/// 4. Report what was found, sent and what failed
///
/// "Today" is the UTC calendar date.
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::config::Config;
use crate::db_storage::{ReminderStore, ShopStorage};
use crate::errors::{AppError, ResultExt};
use crate::formatting::{is_dialable, normalize_phone_for_wa};
use crate::models::{Debt, DueDebtRecord};
use crate::reminder_message::{build_reminder_message, ReminderMessage, ReminderRequest};
use crate::services::{
    MessageSender, OneSignalService, ProviderError, PushNotification, PushNotifier,
    WhatsAppService,
};

/// Most debts handled in one run; the rest wait for the next run.
pub const REMINDER_BATCH_LIMIT: i64 = 200;

/// Name used when a customer record has none.
pub const DEFAULT_CUSTOMER_NAME: &str = "Customer";

pub const PUSH_TITLE: &str = "Mokhtar Dashboard — Reminder sent";

/// Context attached to a failed selection read; also the client-facing error.
pub const SELECTION_FAILED: &str = "Reminder selection failed";

/// A debt ready for dispatch, joined with its customer's contact details.
#[derive(Debug, Clone, PartialEq)]
pub struct DueReminder {
    pub debt: Debt,
    pub customer_name: String,
    pub customer_phone: String,
}

impl DueReminder {
    /// Applies the join defaults: a missing name becomes a placeholder, a
    /// missing or blank phone drops the record.
    pub fn from_record(record: DueDebtRecord) -> Option<Self> {
        let phone = record
            .customer_phone
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())?;
        let name = record
            .customer_name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| DEFAULT_CUSTOMER_NAME.to_string());

        Some(Self {
            debt: record.debt,
            customer_name: name,
            customer_phone: phone,
        })
    }

    pub fn message(&self) -> ReminderMessage {
        build_reminder_message(&ReminderRequest {
            name: &self.customer_name,
            phone: &self.customer_phone,
            amount: &self.debt.amount,
            currency: self.debt.currency,
            due_date: self.debt.due_date,
            debt_type: self.debt.debt_type,
            converted_text: None,
        })
    }
}

/// Result of the selection step.
#[derive(Debug, Clone, PartialEq)]
pub struct DueSelection {
    pub today: NaiveDate,
    /// Rows the selection query returned, including ones later skipped.
    pub found: usize,
    pub reminders: Vec<DueReminder>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReminderFailure {
    pub id: Uuid,
    pub err: String,
}

/// Aggregate outcome of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReminderRunReport {
    pub today: NaiveDate,
    pub found: usize,
    pub sent: usize,
    pub failures: Vec<ReminderFailure>,
}

/// Why a single reminder did not complete.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Store(#[from] AppError),
}

/// Start of the UTC day containing `now`.
pub fn start_of_utc_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive().and_time(NaiveTime::MIN).and_utc()
}

/// Runs the selection step against the store.
///
/// A failed overdue promotion is logged and the run goes on; a failed
/// selection read aborts the run.
pub async fn select_due_reminders(
    store: &dyn ReminderStore,
    now: DateTime<Utc>,
) -> Result<DueSelection, AppError> {
    let today = now.date_naive();
    let start_of_day = start_of_utc_day(now);

    match store.mark_overdue(today).await {
        Ok(promoted) => tracing::info!("Marked {} debt(s) overdue", promoted),
        Err(e) => tracing::error!("Overdue promotion failed, continuing: {}", e),
    }

    let records = store
        .find_due_debts(today, start_of_day, REMINDER_BATCH_LIMIT)
        .await
        .context(SELECTION_FAILED)?;
    let found = records.len();

    // The store's selection is authoritative; every returned row is either
    // dispatched or logged as skipped.
    let reminders = records
        .into_iter()
        .filter_map(|record| {
            let debt_id = record.debt.id;
            let reminder = DueReminder::from_record(record);
            if reminder.is_none() {
                tracing::info!("Skipping debt {}: customer has no phone", debt_id);
            }
            reminder
        })
        .collect();

    Ok(DueSelection {
        today,
        found,
        reminders,
    })
}

/// Sends reminders and records outcomes.
pub struct ReminderRunner {
    store: Arc<dyn ReminderStore>,
    sender: Arc<dyn MessageSender>,
    notifier: Arc<dyn PushNotifier>,
    app_public_url: Option<String>,
}

impl ReminderRunner {
    pub fn new(
        store: Arc<dyn ReminderStore>,
        sender: Arc<dyn MessageSender>,
        notifier: Arc<dyn PushNotifier>,
        app_public_url: Option<String>,
    ) -> Self {
        Self {
            store,
            sender,
            notifier,
            app_public_url,
        }
    }

    /// Wires the Postgres store and the real providers.
    pub fn from_config(config: &Config, pool: PgPool) -> Result<Self, AppError> {
        let sender = WhatsAppService::from_config(config)
            .map_err(|e| AppError::InternalError(e.to_string()))?;
        let notifier = OneSignalService::from_config(config)
            .map_err(|e| AppError::InternalError(e.to_string()))?;

        Ok(Self::new(
            Arc::new(ShopStorage::new(pool)),
            Arc::new(sender),
            Arc::new(notifier),
            config.app_public_url.clone(),
        ))
    }

    /// One full run at `now`. Only a failed selection read is fatal;
    /// per-debt failures land in the report.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<ReminderRunReport, AppError> {
        tracing::info!("Reminder run starting for {}", now.date_naive());

        let selection = select_due_reminders(self.store.as_ref(), now).await?;
        tracing::info!(
            "Found {} candidate debt(s), {} with a phone",
            selection.found,
            selection.reminders.len()
        );

        let report = self.dispatch(selection, now).await;

        tracing::info!(
            "Reminder run complete: {} found, {} sent, {} failed",
            report.found,
            report.sent,
            report.failures.len()
        );
        Ok(report)
    }

    /// Strictly sequential: one debt at a time, a failure never stops the batch.
    pub async fn dispatch(&self, selection: DueSelection, now: DateTime<Utc>) -> ReminderRunReport {
        let mut sent = 0;
        let mut failures = Vec::new();

        for reminder in &selection.reminders {
            match self.deliver(reminder, now).await {
                Ok(()) => sent += 1,
                Err(e) => {
                    tracing::warn!("Reminder for debt {} failed: {}", reminder.debt.id, e);
                    failures.push(ReminderFailure {
                        id: reminder.debt.id,
                        err: e.to_string(),
                    });
                }
            }
        }

        ReminderRunReport {
            today: selection.today,
            found: selection.found,
            sent,
            failures,
        }
    }

    async fn deliver(&self, reminder: &DueReminder, now: DateTime<Utc>) -> Result<(), DeliveryError> {
        let message = reminder.message();
        let to = normalize_phone_for_wa(&reminder.customer_phone);
        if !is_dialable(&to) {
            tracing::warn!(
                "Phone '{}' of debt {} does not look dialable, sending anyway",
                to,
                reminder.debt.id
            );
        }

        self.sender.send_text(&to, &message.text).await?;

        let notification = PushNotification {
            title: PUSH_TITLE.to_string(),
            message: format!(
                "WhatsApp reminder sent to {} ({} {})",
                reminder.customer_name, reminder.debt.currency, reminder.debt.amount
            ),
            url: self.app_public_url.clone(),
        };
        self.notifier.notify_subscribers(&notification).await?;

        self.store.record_reminder_sent(reminder.debt.id, now).await?;

        tracing::info!(
            "Reminder sent for debt {} to {}",
            reminder.debt.id,
            reminder.customer_name
        );
        Ok(())
    }
}
