use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::errors::AppError;

// ============ Enumerations ============

/// Currencies the shop trades in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    Lbp,
}

/// What a debt was incurred for. Drives the label in reminder messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DebtType {
    Mobile,
    Repair,
    Transfer,
    Subscription,
    Other,
}

/// Lifecycle of a debt. Only `Pending` and `Overdue` receive reminders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DebtStatus {
    Pending,
    Overdue,
    Paid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentType {
    Cash,
    Debt,
}

/// Error returned when a stored or submitted enum value is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} value '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! text_enum {
    ($ty:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub const ALL: &'static [$ty] = &[$($ty::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_uppercase().as_str() {
                    $($text => Ok($ty::$variant),)+
                    _ => Err(UnknownVariant {
                        kind: $kind,
                        value: s.to_string(),
                    }),
                }
            }
        }
    };
}

text_enum!(Currency, "currency", { Usd => "USD", Lbp => "LBP" });
text_enum!(DebtType, "debt type", {
    Mobile => "MOBILE",
    Repair => "REPAIR",
    Transfer => "TRANSFER",
    Subscription => "SUBSCRIPTION",
    Other => "OTHER",
});
text_enum!(DebtStatus, "debt status", {
    Pending => "PENDING",
    Overdue => "OVERDUE",
    Paid => "PAID",
});
text_enum!(PaymentType, "payment type", { Cash => "CASH", Debt => "DEBT" });

impl DebtType {
    /// Lenient parse for stored values: blank or unknown types read as `Other`.
    pub fn from_stored(value: Option<&str>) -> Self {
        value
            .and_then(|v| v.parse().ok())
            .unwrap_or(DebtType::Other)
    }
}

impl DebtStatus {
    /// Status after the daily overdue sweep. Only a pending debt whose due
    /// date has passed moves, and only to `Overdue`.
    pub fn after_overdue_sweep(self, due_date: NaiveDate, today: NaiveDate) -> DebtStatus {
        match self {
            DebtStatus::Pending if due_date < today => DebtStatus::Overdue,
            other => other,
        }
    }

    /// Whether a manual status change is permitted. A paid debt never reverts.
    pub fn can_change_to(self, next: DebtStatus) -> bool {
        match self {
            DebtStatus::Paid => next == DebtStatus::Paid,
            DebtStatus::Pending | DebtStatus::Overdue => true,
        }
    }
}

// ============ Domain Records ============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    pub notes: Option<String>,
    pub preferred_currency: Currency,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Debt {
    pub id: Uuid,
    pub customer_id: Uuid,
    #[serde(rename = "type")]
    pub debt_type: DebtType,
    pub currency: Currency,
    pub amount: BigDecimal,
    pub due_date: NaiveDate,
    pub status: DebtStatus,
    pub notes: Option<String>,
    pub reminder_last_sent_at: Option<DateTime<Utc>>,
    pub reminder_count: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sale {
    pub id: Uuid,
    pub item_name: String,
    pub currency: Currency,
    pub total_amount: BigDecimal,
    pub paid_amount: BigDecimal,
    pub payment_type: PaymentType,
    pub customer_id: Option<Uuid>,
    pub debt_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// A debt joined with the customer fields the reminder job needs.
/// Customer fields are optional because the join may find nothing usable.
#[derive(Debug, Clone, PartialEq)]
pub struct DueDebtRecord {
    pub debt: Debt,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
}

// ============ Database Rows ============

fn parse_column<T>(value: &str) -> Result<T, AppError>
where
    T: FromStr<Err = UnknownVariant>,
{
    value
        .parse()
        .map_err(|e: UnknownVariant| AppError::InternalError(e.to_string()))
}

#[derive(Debug, Clone, FromRow)]
pub struct CustomerRow {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    pub notes: Option<String>,
    pub preferred_currency: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<CustomerRow> for Customer {
    type Error = AppError;

    fn try_from(row: CustomerRow) -> Result<Self, Self::Error> {
        Ok(Customer {
            id: row.id,
            name: row.name,
            phone: row.phone,
            notes: row.notes,
            preferred_currency: parse_column(&row.preferred_currency)?,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DebtRow {
    pub id: Uuid,
    pub customer_id: Uuid,
    #[sqlx(rename = "type")]
    pub debt_type: Option<String>,
    pub currency: String,
    pub amount: BigDecimal,
    pub due_date: NaiveDate,
    pub status: String,
    pub notes: Option<String>,
    pub reminder_last_sent_at: Option<DateTime<Utc>>,
    pub reminder_count: i32,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<DebtRow> for Debt {
    type Error = AppError;

    fn try_from(row: DebtRow) -> Result<Self, Self::Error> {
        Ok(Debt {
            id: row.id,
            customer_id: row.customer_id,
            debt_type: DebtType::from_stored(row.debt_type.as_deref()),
            currency: parse_column(&row.currency)?,
            amount: row.amount,
            due_date: row.due_date,
            status: parse_column(&row.status)?,
            notes: row.notes,
            reminder_last_sent_at: row.reminder_last_sent_at,
            reminder_count: row.reminder_count,
            created_at: row.created_at,
        })
    }
}

/// Row returned by the due-debt selection query.
#[derive(Debug, Clone, FromRow)]
pub struct DueDebtRow {
    #[sqlx(flatten)]
    pub debt: DebtRow,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
}

impl TryFrom<DueDebtRow> for DueDebtRecord {
    type Error = AppError;

    fn try_from(row: DueDebtRow) -> Result<Self, Self::Error> {
        Ok(DueDebtRecord {
            debt: row.debt.try_into()?,
            customer_name: row.customer_name,
            customer_phone: row.customer_phone,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct SaleRow {
    pub id: Uuid,
    pub item_name: String,
    pub currency: String,
    pub total_amount: BigDecimal,
    pub paid_amount: BigDecimal,
    pub payment_type: String,
    pub customer_id: Option<Uuid>,
    pub debt_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<SaleRow> for Sale {
    type Error = AppError;

    fn try_from(row: SaleRow) -> Result<Self, Self::Error> {
        Ok(Sale {
            id: row.id,
            item_name: row.item_name,
            currency: parse_column(&row.currency)?,
            total_amount: row.total_amount,
            paid_amount: row.paid_amount,
            payment_type: parse_column(&row.payment_type)?,
            customer_id: row.customer_id,
            debt_id: row.debt_id,
            created_at: row.created_at,
        })
    }
}

// ============ API Request Models ============

#[derive(Debug, Clone, Deserialize)]
pub struct NewCustomer {
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub preferred_currency: Option<Currency>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewDebt {
    pub customer_id: Uuid,
    #[serde(rename = "type")]
    pub debt_type: DebtType,
    pub currency: Currency,
    pub amount: BigDecimal,
    pub due_date: NaiveDate,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewSale {
    pub item_name: String,
    pub currency: Currency,
    pub total_amount: BigDecimal,
    pub paid_amount: BigDecimal,
    pub payment_type: PaymentType,
    #[serde(default)]
    pub customer_id: Option<Uuid>,
    #[serde(default)]
    pub debt_type: Option<DebtType>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DebtStatusUpdate {
    pub status: DebtStatus,
}

/// `filter` query parameter of the debt listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DebtFilter {
    #[default]
    All,
    Pending,
    Overdue,
    Paid,
    DueToday,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DebtListParams {
    #[serde(default)]
    pub filter: DebtFilter,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReminderPreviewParams {
    /// Pre-formatted currency conversion annotation, e.g. "≈ 1,340,000 LBP".
    #[serde(default)]
    pub converted: Option<String>,
}

// ============ API Response Models ============

/// A sale together with the debt it generated, if any.
#[derive(Debug, Clone, Serialize)]
pub struct SaleCreated {
    pub sale: Sale,
    pub debt: Option<Debt>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CurrencyTotals {
    #[serde(rename = "USD")]
    pub usd: BigDecimal,
    #[serde(rename = "LBP")]
    pub lbp: BigDecimal,
}

impl CurrencyTotals {
    pub fn add(&mut self, currency: Currency, value: &BigDecimal) {
        match currency {
            Currency::Usd => self.usd += value,
            Currency::Lbp => self.lbp += value,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DashboardSummary {
    pub today: Option<NaiveDate>,
    pub cash_today: CurrencyTotals,
    pub debt_created_today: CurrencyTotals,
    pub pending: CurrencyTotals,
    pub overdue: CurrencyTotals,
    pub due_today: CurrencyTotals,
}
