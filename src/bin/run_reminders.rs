//! Runs one reminder pass and prints the JSON report.
//!
//! For hosts that schedule the job with a system cron instead of calling the
//! HTTP endpoint. Exits non-zero when the run cannot start or the selection
//! read fails; per-debt failures are reported in the output only.

use chrono::Utc;
use mokhtar_reminders::config::Config;
use mokhtar_reminders::cron_handler::CronResponse;
use mokhtar_reminders::db::Database;
use mokhtar_reminders::obs;
use mokhtar_reminders::reminders::{ReminderRunner, SELECTION_FAILED};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    obs::init_tracing();

    let config = Config::from_env()?;
    let db = Database::new(&config.database_url).await?;
    db.run_migrations().await?;

    let runner = ReminderRunner::from_config(&config, db.pool.clone())?;

    match runner.run(Utc::now()).await {
        Ok(report) => {
            let response: CronResponse = report.into();
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
        Err(e) => {
            println!("{}", serde_json::to_string_pretty(&CronResponse::failed(SELECTION_FAILED))?);
            Err(e.into())
        }
    }
}
