use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::{AppError, ResultExt};
use crate::ledger;
use crate::models::{
    Customer, CustomerRow, Debt, DebtFilter, DebtRow, DebtStatus, DueDebtRecord, DueDebtRow,
    NewCustomer, NewDebt, NewSale, Sale, SaleCreated, SaleRow,
};

/// Upper bound on rows returned by the listing endpoints.
pub const LIST_LIMIT: i64 = 2000;

const DEBT_COLUMNS: &str = "id, customer_id, type, currency, amount, due_date, status, notes, \
                            reminder_last_sent_at, reminder_count, created_at";

/// Store operations the reminder job depends on.
#[async_trait]
pub trait ReminderStore: Send + Sync {
    /// Moves every pending debt due before `today` to overdue. Returns rows changed.
    async fn mark_overdue(&self, today: NaiveDate) -> Result<u64, AppError>;

    /// Open debts due on or before `today` with no reminder since
    /// `not_reminded_since`, soonest due first, at most `limit`.
    async fn find_due_debts(
        &self,
        today: NaiveDate,
        not_reminded_since: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<DueDebtRecord>, AppError>;

    /// Stamps a successful reminder and bumps the counter by one.
    async fn record_reminder_sent(
        &self,
        debt_id: Uuid,
        sent_at: DateTime<Utc>,
    ) -> Result<(), AppError>;
}

/// Postgres storage for customers, debts and sales.
#[derive(Clone)]
pub struct ShopStorage {
    pool: PgPool,
}

impl ShopStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ============ Customers ============

    pub async fn list_customers(&self) -> Result<Vec<Customer>, AppError> {
        let rows = sqlx::query_as::<_, CustomerRow>(
            "SELECT id, name, phone, notes, preferred_currency, created_at \
             FROM customers ORDER BY created_at DESC LIMIT $1",
        )
        .bind(LIST_LIMIT)
        .fetch_all(&self.pool)
        .await
        .context("Listing customers")?;

        rows.into_iter().map(Customer::try_from).collect()
    }

    pub async fn create_customer(&self, input: &NewCustomer) -> Result<Customer, AppError> {
        let row = sqlx::query_as::<_, CustomerRow>(
            r#"
            INSERT INTO customers (id, name, phone, notes, preferred_currency)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, name, phone, notes, preferred_currency, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&input.name)
        .bind(&input.phone)
        .bind(&input.notes)
        .bind(input.preferred_currency.unwrap_or(crate::models::Currency::Usd).as_str())
        .fetch_one(&self.pool)
        .await
        .context("Creating customer")?;

        tracing::info!("Customer created: {}", row.id);
        row.try_into()
    }

    pub async fn delete_customer(&self, id: Uuid) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM customers WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Deleting customer")?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Customer with id {} not found", id)));
        }
        tracing::info!("Customer deleted: {}", id);
        Ok(())
    }

    pub async fn find_customer(&self, id: Uuid) -> Result<Option<Customer>, AppError> {
        let row = sqlx::query_as::<_, CustomerRow>(
            "SELECT id, name, phone, notes, preferred_currency, created_at \
             FROM customers WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Loading customer")?;

        row.map(Customer::try_from).transpose()
    }

    // ============ Debts ============

    pub async fn list_debts(
        &self,
        filter: DebtFilter,
        today: NaiveDate,
    ) -> Result<Vec<Debt>, AppError> {
        let (status, due_on): (Option<DebtStatus>, Option<NaiveDate>) = match filter {
            DebtFilter::All => (None, None),
            DebtFilter::Pending => (Some(DebtStatus::Pending), None),
            DebtFilter::Overdue => (Some(DebtStatus::Overdue), None),
            DebtFilter::Paid => (Some(DebtStatus::Paid), None),
            DebtFilter::DueToday => (None, Some(today)),
        };

        let sql = format!(
            r#"
            SELECT {DEBT_COLUMNS}
            FROM debts
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::date IS NULL OR (due_date = $2 AND status <> 'PAID'))
            ORDER BY due_date ASC
            LIMIT $3
            "#
        );
        let rows = sqlx::query_as::<_, DebtRow>(&sql)
            .bind(status.map(|s| s.as_str()))
            .bind(due_on)
            .bind(LIST_LIMIT)
            .fetch_all(&self.pool)
            .await
            .context("Listing debts")?;

        rows.into_iter().map(Debt::try_from).collect()
    }

    pub async fn find_debt(&self, id: Uuid) -> Result<Option<Debt>, AppError> {
        let sql = format!("SELECT {DEBT_COLUMNS} FROM debts WHERE id = $1");
        let row = sqlx::query_as::<_, DebtRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Loading debt")?;

        row.map(Debt::try_from).transpose()
    }

    /// Open (pending or overdue) debts, used for dashboard totals.
    pub async fn open_debts(&self) -> Result<Vec<Debt>, AppError> {
        let sql = format!(
            "SELECT {DEBT_COLUMNS} FROM debts WHERE status IN ('PENDING', 'OVERDUE') \
             ORDER BY due_date ASC"
        );
        let rows = sqlx::query_as::<_, DebtRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .context("Loading open debts")?;

        rows.into_iter().map(Debt::try_from).collect()
    }

    pub async fn create_debt(&self, input: &NewDebt) -> Result<Debt, AppError> {
        if self.find_customer(input.customer_id).await?.is_none() {
            return Err(AppError::NotFound(format!(
                "Customer with id {} not found",
                input.customer_id
            )));
        }

        let sql = format!(
            r#"
            INSERT INTO debts (id, customer_id, type, currency, amount, due_date, status, notes)
            VALUES ($1, $2, $3, $4, $5, $6, 'PENDING', $7)
            RETURNING {DEBT_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, DebtRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(input.customer_id)
            .bind(input.debt_type.as_str())
            .bind(input.currency.as_str())
            .bind(&input.amount)
            .bind(input.due_date)
            .bind(&input.notes)
            .fetch_one(&self.pool)
            .await
            .context("Creating debt")?;

        tracing::info!("Debt created: {} for customer {}", row.id, row.customer_id);
        row.try_into()
    }

    /// Manual status change. A paid debt is never reopened.
    pub async fn update_debt_status(
        &self,
        id: Uuid,
        status: DebtStatus,
    ) -> Result<Debt, AppError> {
        let current = self
            .find_debt(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Debt with id {} not found", id)))?;

        if !current.status.can_change_to(status) {
            return Err(AppError::BadRequest(format!(
                "Debt {} is {} and cannot change to {}",
                id, current.status, status
            )));
        }

        // The status guard in WHERE keeps a concurrent PAID from being overwritten.
        let sql = format!(
            r#"
            UPDATE debts SET status = $2
            WHERE id = $1 AND (status <> 'PAID' OR $2 = 'PAID')
            RETURNING {DEBT_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, DebtRow>(&sql)
            .bind(id)
            .bind(status.as_str())
            .fetch_optional(&self.pool)
            .await
            .context("Updating debt status")?
            .ok_or_else(|| {
                AppError::BadRequest(format!("Debt {} is PAID and cannot be reopened", id))
            })?;

        tracing::info!("Debt {} status {} -> {}", id, current.status, status);
        row.try_into()
    }

    // ============ Sales ============

    pub async fn list_sales(&self) -> Result<Vec<Sale>, AppError> {
        let rows = sqlx::query_as::<_, SaleRow>(
            "SELECT id, item_name, currency, total_amount, paid_amount, payment_type, \
             customer_id, debt_id, created_at FROM sales ORDER BY created_at DESC LIMIT $1",
        )
        .bind(LIST_LIMIT)
        .fetch_all(&self.pool)
        .await
        .context("Listing sales")?;

        rows.into_iter().map(Sale::try_from).collect()
    }

    /// Sales recorded within `[from, to)`.
    pub async fn sales_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Sale>, AppError> {
        let rows = sqlx::query_as::<_, SaleRow>(
            "SELECT id, item_name, currency, total_amount, paid_amount, payment_type, \
             customer_id, debt_id, created_at FROM sales \
             WHERE created_at >= $1 AND created_at < $2 ORDER BY created_at DESC",
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .context("Loading sales for period")?;

        rows.into_iter().map(Sale::try_from).collect()
    }

    /// Records a sale and, for an unpaid debt sale, the debt for the remainder.
    /// Both rows are written in one transaction.
    pub async fn create_sale(
        &self,
        input: &NewSale,
        today: NaiveDate,
    ) -> Result<SaleCreated, AppError> {
        if let Some(customer_id) = input.customer_id {
            if self.find_customer(customer_id).await?.is_none() {
                return Err(AppError::NotFound(format!(
                    "Customer with id {} not found",
                    customer_id
                )));
            }
        }

        let mut tx = self.pool.begin().await.context("Starting sale transaction")?;

        let mut sale_row = sqlx::query_as::<_, SaleRow>(
            r#"
            INSERT INTO sales (id, item_name, currency, total_amount, paid_amount, payment_type, customer_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, item_name, currency, total_amount, paid_amount, payment_type,
                      customer_id, debt_id, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(input.item_name.trim())
        .bind(input.currency.as_str())
        .bind(&input.total_amount)
        .bind(&input.paid_amount)
        .bind(input.payment_type.as_str())
        .bind(input.customer_id)
        .fetch_one(&mut *tx)
        .await
        .context("Creating sale")?;

        let mut debt = None;
        if let Some(new_debt) = ledger::debt_for_sale(input, today) {
            let sql = format!(
                r#"
                INSERT INTO debts (id, customer_id, type, currency, amount, due_date, status, notes)
                VALUES ($1, $2, $3, $4, $5, $6, 'PENDING', $7)
                RETURNING {DEBT_COLUMNS}
                "#
            );
            let debt_row = sqlx::query_as::<_, DebtRow>(&sql)
                .bind(Uuid::new_v4())
                .bind(new_debt.customer_id)
                .bind(new_debt.debt_type.as_str())
                .bind(new_debt.currency.as_str())
                .bind(&new_debt.amount)
                .bind(new_debt.due_date)
                .bind(&new_debt.notes)
                .fetch_one(&mut *tx)
                .await
                .context("Creating debt for sale")?;

            sale_row = sqlx::query_as::<_, SaleRow>(
                r#"
                UPDATE sales SET debt_id = $2 WHERE id = $1
                RETURNING id, item_name, currency, total_amount, paid_amount, payment_type,
                          customer_id, debt_id, created_at
                "#,
            )
            .bind(sale_row.id)
            .bind(debt_row.id)
            .fetch_one(&mut *tx)
            .await
            .context("Linking sale to debt")?;

            debt = Some(Debt::try_from(debt_row)?);
        }

        tx.commit().await.context("Committing sale")?;

        tracing::info!(
            "Sale created: {} ({}){}",
            sale_row.id,
            sale_row.payment_type,
            if debt.is_some() { " with linked debt" } else { "" }
        );

        Ok(SaleCreated {
            sale: sale_row.try_into()?,
            debt,
        })
    }
}

#[async_trait]
impl ReminderStore for ShopStorage {
    async fn mark_overdue(&self, today: NaiveDate) -> Result<u64, AppError> {
        let result = sqlx::query(
            "UPDATE debts SET status = 'OVERDUE' WHERE status = 'PENDING' AND due_date < $1",
        )
        .bind(today)
        .execute(&self.pool)
        .await
        .context("Marking overdue debts")?;

        Ok(result.rows_affected())
    }

    async fn find_due_debts(
        &self,
        today: NaiveDate,
        not_reminded_since: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<DueDebtRecord>, AppError> {
        let rows = sqlx::query_as::<_, DueDebtRow>(
            r#"
            SELECT d.id, d.customer_id, d.type, d.currency, d.amount, d.due_date, d.status,
                   d.notes, d.reminder_last_sent_at, d.reminder_count, d.created_at,
                   c.name AS customer_name, c.phone AS customer_phone
            FROM debts d
            LEFT JOIN customers c ON c.id = d.customer_id
            WHERE d.status IN ('PENDING', 'OVERDUE')
              AND d.due_date <= $1
              AND (d.reminder_last_sent_at IS NULL OR d.reminder_last_sent_at < $2)
            ORDER BY d.due_date ASC
            LIMIT $3
            "#,
        )
        .bind(today)
        .bind(not_reminded_since)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Selecting due debts")?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let id = row.debt.id;
            match DueDebtRecord::try_from(row) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!("Skipping unreadable debt {}: {}", id, e),
            }
        }
        Ok(records)
    }

    async fn record_reminder_sent(
        &self,
        debt_id: Uuid,
        sent_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE debts
            SET reminder_last_sent_at = GREATEST(COALESCE(reminder_last_sent_at, $2), $2),
                reminder_count = reminder_count + 1
            WHERE id = $1
            "#,
        )
        .bind(debt_id)
        .bind(sent_at)
        .execute(&self.pool)
        .await
        .context("Recording reminder")?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Debt with id {} not found", debt_id)));
        }
        Ok(())
    }
}
