//! Bookkeeping rules for customers, debts and sales: input validation, the
//! debt generated by an unpaid sale, and the dashboard totals.

use bigdecimal::{BigDecimal, Zero};
use chrono::NaiveDate;

use crate::errors::AppError;
use crate::models::{
    Currency, DashboardSummary, Debt, DebtStatus, DebtType, NewCustomer, NewDebt, NewSale,
    PaymentType, Sale,
};

/// Debt type used for a sale-generated debt when none is given.
pub const DEFAULT_SALE_DEBT_TYPE: DebtType = DebtType::Mobile;

fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Trims fields and fills defaults. Name and phone are required.
pub fn validate_new_customer(input: NewCustomer) -> Result<NewCustomer, AppError> {
    let name = input.name.trim().to_string();
    let phone = input.phone.trim().to_string();

    if name.is_empty() {
        return Err(AppError::BadRequest("Customer name required".to_string()));
    }
    if phone.is_empty() {
        return Err(AppError::BadRequest("Customer phone required".to_string()));
    }

    Ok(NewCustomer {
        name,
        phone,
        notes: blank_to_none(input.notes),
        preferred_currency: Some(input.preferred_currency.unwrap_or(Currency::Usd)),
    })
}

pub fn validate_new_debt(input: NewDebt) -> Result<NewDebt, AppError> {
    if input.amount <= BigDecimal::zero() {
        return Err(AppError::BadRequest("Amount must be > 0".to_string()));
    }

    Ok(NewDebt {
        notes: blank_to_none(input.notes),
        ..input
    })
}

pub fn validate_new_sale(input: NewSale) -> Result<NewSale, AppError> {
    let item_name = input.item_name.trim().to_string();
    if item_name.is_empty() {
        return Err(AppError::BadRequest("Item name required".to_string()));
    }
    if input.total_amount <= BigDecimal::zero() {
        return Err(AppError::BadRequest("Total amount must be > 0".to_string()));
    }
    if input.paid_amount < BigDecimal::zero() {
        return Err(AppError::BadRequest("Paid amount must be >= 0".to_string()));
    }
    if input.paid_amount > input.total_amount {
        return Err(AppError::BadRequest(
            "Paid amount cannot exceed total".to_string(),
        ));
    }

    let customer_id = match input.payment_type {
        PaymentType::Debt => Some(input.customer_id.ok_or_else(|| {
            AppError::BadRequest("Choose customer for a debt sale".to_string())
        })?),
        PaymentType::Cash => input.customer_id,
    };

    Ok(NewSale {
        item_name,
        customer_id,
        ..input
    })
}

/// The debt an unpaid debt sale leaves behind: `total - paid`, pending,
/// due on the given date (or `today`). Cash sales and fully paid sales
/// produce none.
pub fn debt_for_sale(sale: &NewSale, today: NaiveDate) -> Option<NewDebt> {
    if sale.payment_type != PaymentType::Debt || sale.paid_amount >= sale.total_amount {
        return None;
    }
    let customer_id = sale.customer_id?;

    Some(NewDebt {
        customer_id,
        debt_type: sale.debt_type.unwrap_or(DEFAULT_SALE_DEBT_TYPE),
        currency: sale.currency,
        amount: &sale.total_amount - &sale.paid_amount,
        due_date: sale.due_date.unwrap_or(today),
        notes: Some(format!("Auto from sale: {}", sale.item_name.trim())),
    })
}

/// Per-currency totals for the dashboard.
///
/// `sales_today` must already be restricted to today's sales; `debts` may
/// include any status.
pub fn summarize_dashboard(sales_today: &[Sale], debts: &[Debt], today: NaiveDate) -> DashboardSummary {
    let mut summary = DashboardSummary {
        today: Some(today),
        ..Default::default()
    };

    for sale in sales_today {
        match sale.payment_type {
            PaymentType::Cash => summary.cash_today.add(sale.currency, &sale.paid_amount),
            PaymentType::Debt => {
                let remaining = &sale.total_amount - &sale.paid_amount;
                if remaining > BigDecimal::zero() {
                    summary.debt_created_today.add(sale.currency, &remaining);
                }
            }
        }
    }

    for debt in debts {
        match debt.status {
            DebtStatus::Pending => summary.pending.add(debt.currency, &debt.amount),
            DebtStatus::Overdue => summary.overdue.add(debt.currency, &debt.amount),
            DebtStatus::Paid => continue,
        }
        if debt.due_date == today {
            summary.due_today.add(debt.currency, &debt.amount);
        }
    }

    summary
}
