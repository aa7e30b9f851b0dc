//! Mokhtar Cell Debt Reminder Service Library
//!
//! Tracks customers, debts and sales for a single shop and runs the daily
//! reminder job that messages customers about due and overdue debts over
//! WhatsApp and notifies staff devices through push notifications.
//!
//! # Modules
//!
//! - `api`: API definitions.
//! - `core`: Core business logic.
//! - `data`: Data access layer.
//! - `integrations`: External service integrations.
//! - `obs`: Observability and logging.
//! - `config`: Configuration management.
//! - `cron_handler`: Scheduled reminder trigger and its authorization gate.
//! - `db`: Database connection, pool and migrations.
//! - `db_storage`: Database storage operations.
//! - `errors`: Error handling types.
//! - `formatting`: Phone normalization and money formatting.
//! - `handlers`: HTTP request handlers.
//! - `ledger`: Validation and totals for customers, debts and sales.
//! - `models`: Core data models.
//! - `reminder_message`: Bilingual reminder text and click-to-chat links.
//! - `reminders`: Due-debt selection and reminder dispatch.
//! - `router`: HTTP route table and middleware.
//! - `services`: External service clients (WhatsApp, OneSignal).

pub mod api;
pub mod core;
pub mod data;
pub mod integrations;
pub mod obs;

// Re-export primary modules for shared use in tests and other binaries
pub mod config;
pub mod cron_handler;
pub mod db;
pub mod db_storage;
pub mod errors;
pub mod formatting;
pub mod handlers;
pub mod ledger;
pub mod models;
pub mod reminder_message;
pub mod reminders;
pub mod router;
pub mod services;
