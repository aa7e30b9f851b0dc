//! In-memory stand-ins for the store and providers used by the reminder job.
#![allow(dead_code)]

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use mokhtar_reminders::config::{Config, DEFAULT_ONESIGNAL_API_URL, DEFAULT_WHATSAPP_API_BASE_URL};
use mokhtar_reminders::db_storage::ReminderStore;
use mokhtar_reminders::errors::AppError;
use mokhtar_reminders::models::{Currency, Debt, DebtStatus, DebtType, DueDebtRecord};
use mokhtar_reminders::reminders::ReminderRunner;
use mokhtar_reminders::services::{MessageSender, ProviderError, PushNotification, PushNotifier};

/// 2026-10-19 14:30:00 UTC
pub fn run_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 19, 14, 30, 0).unwrap()
}

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

pub fn dec(s: &str) -> BigDecimal {
    BigDecimal::from_str(s).unwrap()
}

pub fn debt_record(
    name: Option<&str>,
    phone: Option<&str>,
    due: &str,
    status: DebtStatus,
    last_sent: Option<DateTime<Utc>>,
) -> DueDebtRecord {
    DueDebtRecord {
        debt: Debt {
            id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            debt_type: DebtType::Mobile,
            currency: Currency::Usd,
            amount: dec("25.5"),
            due_date: date(due),
            status,
            notes: None,
            reminder_last_sent_at: last_sent,
            reminder_count: 0,
            created_at: Utc.with_ymd_and_hms(2026, 9, 1, 9, 0, 0).unwrap(),
        },
        customer_name: name.map(str::to_string),
        customer_phone: phone.map(str::to_string),
    }
}

pub fn test_config(cron_secret: Option<&str>) -> Config {
    Config {
        database_url: "postgres://localhost/unused".to_string(),
        port: 3000,
        cron_secret: cron_secret.map(str::to_string),
        app_public_url: Some("https://dashboard.example.com".to_string()),
        whatsapp_token: None,
        whatsapp_phone_number_id: None,
        whatsapp_api_base_url: DEFAULT_WHATSAPP_API_BASE_URL.to_string(),
        onesignal_app_id: None,
        onesignal_rest_api_key: None,
        onesignal_api_url: DEFAULT_ONESIGNAL_API_URL.to_string(),
    }
}

// ============ Store ============

#[derive(Default)]
pub struct InMemoryStore {
    pub records: Mutex<Vec<DueDebtRecord>>,
    pub fail_reads: bool,
    pub fail_overdue_sweep: bool,
    pub fail_writes_for: Vec<Uuid>,
    pub sweep_calls: AtomicUsize,
    pub read_calls: AtomicUsize,
}

impl InMemoryStore {
    pub fn with_records(records: Vec<DueDebtRecord>) -> Self {
        Self {
            records: Mutex::new(records),
            ..Default::default()
        }
    }

    pub fn debt(&self, id: Uuid) -> Debt {
        self.records
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.debt.id == id)
            .map(|r| r.debt.clone())
            .expect("debt present")
    }

    pub fn statuses(&self) -> Vec<DebtStatus> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.debt.status)
            .collect()
    }
}

/// In-memory version of the selection query's WHERE clause.
fn reminder_due(debt: &Debt, today: NaiveDate, not_reminded_since: DateTime<Utc>) -> bool {
    matches!(debt.status, DebtStatus::Pending | DebtStatus::Overdue)
        && debt.due_date <= today
        && debt
            .reminder_last_sent_at
            .map_or(true, |sent| sent < not_reminded_since)
}

#[async_trait]
impl ReminderStore for InMemoryStore {
    async fn mark_overdue(&self, today: NaiveDate) -> Result<u64, AppError> {
        self.sweep_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_overdue_sweep {
            return Err(AppError::DatabaseError(sqlx::Error::PoolTimedOut));
        }

        let mut changed = 0;
        for record in self.records.lock().unwrap().iter_mut() {
            let next = record.debt.status.after_overdue_sweep(record.debt.due_date, today);
            if next != record.debt.status {
                record.debt.status = next;
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn find_due_debts(
        &self,
        today: NaiveDate,
        not_reminded_since: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<DueDebtRecord>, AppError> {
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads {
            return Err(AppError::DatabaseError(sqlx::Error::PoolTimedOut));
        }

        let mut due: Vec<DueDebtRecord> = self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| reminder_due(&r.debt, today, not_reminded_since))
            .cloned()
            .collect();
        due.sort_by_key(|r| r.debt.due_date);
        due.truncate(limit as usize);
        Ok(due)
    }

    async fn record_reminder_sent(
        &self,
        debt_id: Uuid,
        sent_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        if self.fail_writes_for.contains(&debt_id) {
            return Err(AppError::DatabaseError(sqlx::Error::PoolTimedOut));
        }

        let mut records = self.records.lock().unwrap();
        let record = records
            .iter_mut()
            .find(|r| r.debt.id == debt_id)
            .ok_or_else(|| AppError::NotFound(format!("Debt with id {} not found", debt_id)))?;

        record.debt.reminder_last_sent_at = Some(
            record
                .debt
                .reminder_last_sent_at
                .map_or(sent_at, |prev| prev.max(sent_at)),
        );
        record.debt.reminder_count += 1;
        Ok(())
    }
}

// ============ Providers ============

#[derive(Default)]
pub struct FakeSender {
    pub sent: Mutex<Vec<(String, String)>>,
    pub fail_for_phones: Vec<String>,
}

impl FakeSender {
    pub fn failing_for(phones: &[&str]) -> Self {
        Self {
            fail_for_phones: phones.iter().map(|p| p.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn recipients(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|(to, _)| to.clone()).collect()
    }
}

#[async_trait]
impl MessageSender for FakeSender {
    async fn send_text(&self, to_phone: &str, body: &str) -> Result<(), ProviderError> {
        if self.fail_for_phones.iter().any(|p| p == to_phone) {
            return Err(ProviderError::Api {
                service: "WhatsApp API",
                status: 400,
                body: "recipient not on WhatsApp".to_string(),
            });
        }
        self.sent
            .lock()
            .unwrap()
            .push((to_phone.to_string(), body.to_string()));
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeNotifier {
    pub notifications: Mutex<Vec<PushNotification>>,
    pub fail: bool,
}

#[async_trait]
impl PushNotifier for FakeNotifier {
    async fn notify_subscribers(
        &self,
        notification: &PushNotification,
    ) -> Result<(), ProviderError> {
        if self.fail {
            return Err(ProviderError::Connection("OneSignal unreachable".to_string()));
        }
        self.notifications.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

/// Runner over the given fakes, keeping handles for assertions.
pub fn runner(
    store: Arc<InMemoryStore>,
    sender: Arc<FakeSender>,
    notifier: Arc<FakeNotifier>,
) -> ReminderRunner {
    ReminderRunner::new(
        store,
        sender,
        notifier,
        Some("https://dashboard.example.com".to_string()),
    )
}
