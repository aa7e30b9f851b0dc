//! Bilingual (English/Arabic) payment reminder text and its click-to-chat link.

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::Serialize;

use crate::formatting::{fmt_money, normalize_phone_for_wa};
use crate::models::{Currency, DebtType};

const BUSINESS_HEADER: &str = "Mokhtar Cell | مختار سيل";
const CLOSING_LINE: &str = "Please confirm once paid 🙏";
const CONTACT_LINE: &str = "— Mokhtar Cell | 03 158 798";
const WA_ME_BASE: &str = "https://wa.me";

/// Short label for a debt type in both languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeLabel {
    pub en: &'static str,
    pub ar: &'static str,
}

pub fn type_label(debt_type: DebtType) -> TypeLabel {
    match debt_type {
        DebtType::Mobile => TypeLabel {
            en: "mobile/device",
            ar: "موبايل/جهاز",
        },
        DebtType::Repair => TypeLabel {
            en: "repair service",
            ar: "تصليح/صيانة",
        },
        DebtType::Transfer => TypeLabel {
            en: "transfer/service",
            ar: "تحويل/خدمات",
        },
        DebtType::Subscription => TypeLabel {
            en: "subscription",
            ar: "اشتراك",
        },
        DebtType::Other => TypeLabel {
            en: "service",
            ar: "خدمة",
        },
    }
}

/// Inputs for one reminder.
#[derive(Debug, Clone)]
pub struct ReminderRequest<'a> {
    pub name: &'a str,
    pub phone: &'a str,
    pub amount: &'a BigDecimal,
    pub currency: Currency,
    pub due_date: NaiveDate,
    pub debt_type: DebtType,
    /// Pre-formatted conversion annotation, shown in parentheses after the amount.
    pub converted_text: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReminderMessage {
    pub text: String,
    pub wa_link: String,
}

/// Builds the reminder text and a `wa.me` deep link pre-filled with it.
///
/// Block layout: English block, blank line, Arabic block, blank line, closing.
pub fn build_reminder_message(req: &ReminderRequest<'_>) -> ReminderMessage {
    let label = type_label(req.debt_type);
    let money = fmt_money(req.amount, req.currency);
    let conv = req
        .converted_text
        .filter(|c| !c.is_empty())
        .map(|c| format!(" ({})", c))
        .unwrap_or_default();
    let due = req.due_date.format("%Y-%m-%d");

    let english = format!(
        "{header}\nHi {name} 👋\nYour {label} payment is: {money}{conv}\nDue date: {due}",
        header = BUSINESS_HEADER,
        name = req.name,
        label = label.en,
    );
    let arabic = format!(
        "مرحبا {name} 👋\nدفعتك مقابل {label} هي: {money}{conv}\nتاريخ الاستحقاق: {due}",
        name = req.name,
        label = label.ar,
    );
    let text = format!(
        "{}\n\n{}\n\n{}\n{}",
        english, arabic, CLOSING_LINE, CONTACT_LINE
    );

    let wa_link = wa_link(&normalize_phone_for_wa(req.phone), &text);
    ReminderMessage { text, wa_link }
}

/// `https://wa.me/<phone>?text=<percent-encoded text>`, spaces as `%20`.
///
/// Unreserved marks `! ' ( ) * ~` stay literal, matching the links the
/// dashboard's browser client builds.
pub fn wa_link(normalized_phone: &str, text: &str) -> String {
    // form encoding writes spaces as '+' and escapes literal '+' as %2B
    let encoded: String = url::form_urlencoded::byte_serialize(text.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
        .replace("%21", "!")
        .replace("%27", "'")
        .replace("%28", "(")
        .replace("%29", ")")
        .replace("%7E", "~");
    format!("{}/{}?text={}", WA_ME_BASE, normalized_phone, encoded)
}
