//! Display helpers shared by the reminder job and the API: phone numbers in
//! WhatsApp-addressable form and money amounts per currency.

use bigdecimal::{BigDecimal, RoundingMode, ToPrimitive};

use crate::models::Currency;

/// Lebanese country calling code.
pub const COUNTRY_CODE: &str = "961";

/// Converts a locally formatted phone number to international digits
/// (`961XXXXXXX`) for WhatsApp.
///
/// Lenient by contract: malformed input is never rejected, the stripped
/// digits are returned as-is when no rule applies.
pub fn normalize_phone_for_wa(phone: &str) -> String {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();

    if digits.starts_with(COUNTRY_CODE) {
        return digits;
    }

    if digits.len() == 8 {
        // 03xxxxxx -> 9613xxxxxx; 70xxxxxx is assumed to be missing its leading 0
        return match digits.strip_prefix('0') {
            Some(rest) => format!("{}{}", COUNTRY_CODE, rest),
            None => format!("{}{}", COUNTRY_CODE, digits),
        };
    }

    digits
}

/// Checks a normalized number against libphonenumber metadata.
///
/// Used for diagnostics only: an undialable number is still attempted.
pub fn is_dialable(normalized: &str) -> bool {
    if normalized.is_empty() {
        return false;
    }

    match phonenumber::parse(None, format!("+{}", normalized)) {
        Ok(number) => phonenumber::is_valid(&number),
        Err(e) => {
            tracing::debug!("Failed to parse phone '{}': {:?}", normalized, e);
            false
        }
    }
}

/// Renders an amount for display.
///
/// USD: `$` prefix, two decimals, halves away from zero. LBP: rounded to
/// whole pounds with halves up, grouped in thousands with `,`, ` LBP` suffix.
pub fn fmt_money(amount: &BigDecimal, currency: Currency) -> String {
    match currency {
        Currency::Usd => format!("${}", amount.with_scale_round(2, RoundingMode::HalfUp)),
        Currency::Lbp => {
            // Halves round toward positive infinity, so -2.5 renders as -2
            let rounded = (amount + BigDecimal::new(5.into(), 1))
                .with_scale_round(0, RoundingMode::Floor);
            let grouped = match rounded.to_i128() {
                Some(whole) => group_thousands(whole),
                None => rounded.to_string(),
            };
            format!("{} LBP", grouped)
        }
    }
}

fn group_thousands(value: i128) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);

    if value < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
