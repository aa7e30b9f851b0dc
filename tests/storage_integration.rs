use bigdecimal::BigDecimal;
use chrono::{Duration, Utc};
use std::env;
use std::str::FromStr;
use uuid::Uuid;

use mokhtar_reminders::data::db_storage::{ReminderStore, ShopStorage};
use mokhtar_reminders::db::Database;
use mokhtar_reminders::models::{
    Currency, DebtStatus, DebtType, NewCustomer, NewDebt, NewSale, PaymentType,
};
use mokhtar_reminders::reminders::start_of_utc_day;

async fn storage() -> anyhow::Result<ShopStorage> {
    let db_url = env::var("TEST_DATABASE_URL")
        .or_else(|_| env::var("DATABASE_URL"))
        .map_err(|_| anyhow::anyhow!("Set TEST_DATABASE_URL or DATABASE_URL to run this test"))?;

    let db = Database::new(&db_url).await?;
    db.run_migrations().await?;
    Ok(ShopStorage::new(db.pool.clone()))
}

fn unique_phone() -> String {
    format!("03{:06}", Uuid::new_v4().as_u128() % 1_000_000)
}

/// Reminder bookkeeping against a real Postgres.
/// Marked ignored to avoid running against production by accident; set TEST_DATABASE_URL to run.
#[tokio::test]
#[ignore]
async fn reminder_bookkeeping_smoke_test() -> anyhow::Result<()> {
    let storage = storage().await?;
    let now = Utc::now();
    let today = now.date_naive();

    let customer = storage
        .create_customer(&NewCustomer {
            name: "Reminder Smoke Test".to_string(),
            phone: unique_phone(),
            notes: None,
            preferred_currency: Some(Currency::Usd),
        })
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let debt = storage
        .create_debt(&NewDebt {
            customer_id: customer.id,
            debt_type: DebtType::Repair,
            currency: Currency::Usd,
            amount: BigDecimal::from_str("15.75")?,
            due_date: today - Duration::days(1),
            notes: None,
        })
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    assert_eq!(debt.status, DebtStatus::Pending);

    storage.mark_overdue(today).await.map_err(|e| anyhow::anyhow!(e.to_string()))?;
    let promoted = storage
        .find_debt(debt.id)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?
        .ok_or_else(|| anyhow::anyhow!("debt vanished"))?;
    assert_eq!(promoted.status, DebtStatus::Overdue);

    let due = storage
        .find_due_debts(today, start_of_utc_day(now), 2000)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    let record = due
        .iter()
        .find(|r| r.debt.id == debt.id)
        .ok_or_else(|| anyhow::anyhow!("debt not selected"))?;
    assert_eq!(record.customer_name.as_deref(), Some("Reminder Smoke Test"));

    storage
        .record_reminder_sent(debt.id, now)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let due_again = storage
        .find_due_debts(today, start_of_utc_day(now), 2000)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    assert!(due_again.iter().all(|r| r.debt.id != debt.id));

    let reminded = storage
        .find_debt(debt.id)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?
        .ok_or_else(|| anyhow::anyhow!("debt vanished"))?;
    assert_eq!(reminded.reminder_count, 1);

    storage
        .delete_customer(customer.id)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    Ok(())
}

/// An unpaid debt sale creates its linked debt in the same transaction.
#[tokio::test]
#[ignore]
async fn debt_sale_creates_debt_smoke_test() -> anyhow::Result<()> {
    let storage = storage().await?;
    let today = Utc::now().date_naive();

    let customer = storage
        .create_customer(&NewCustomer {
            name: "Sale Smoke Test".to_string(),
            phone: unique_phone(),
            notes: None,
            preferred_currency: None,
        })
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let created = storage
        .create_sale(
            &NewSale {
                item_name: "Charger".to_string(),
                currency: Currency::Usd,
                total_amount: BigDecimal::from(20),
                paid_amount: BigDecimal::from(5),
                payment_type: PaymentType::Debt,
                customer_id: Some(customer.id),
                debt_type: None,
                due_date: None,
            },
            today,
        )
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let debt = created
        .debt
        .ok_or_else(|| anyhow::anyhow!("expected a linked debt"))?;
    assert_eq!(debt.amount, BigDecimal::from(15));
    assert_eq!(debt.debt_type, DebtType::Mobile);
    assert_eq!(debt.due_date, today);
    assert_eq!(debt.notes.as_deref(), Some("Auto from sale: Charger"));

    storage
        .delete_customer(customer.id)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    Ok(())
}
