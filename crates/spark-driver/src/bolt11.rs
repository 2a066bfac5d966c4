//! Minimal local inspection of BOLT11 payment requests.
//!
//! Only the human-readable part is read: prefix, network and encoded amount.
//! Everything else is left to the backend's `decodepay`.

use crate::error::DriverError;

/// URI scheme used by payment links.
pub const LIGHTNING_SCHEME: &str = "lightning:";

const MSAT_PER_BTC: u64 = 100_000_000_000;

/// Strip an optional `lightning:` scheme and surrounding whitespace.
pub fn strip_scheme(invoice: &str) -> &str {
    let trimmed = invoice.trim();
    match trimmed.get(..LIGHTNING_SCHEME.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(LIGHTNING_SCHEME) => {
            &trimmed[LIGHTNING_SCHEME.len()..]
        }
        _ => trimmed,
    }
}

/// Whether the string looks like a BOLT11 payment request.
pub fn looks_like_invoice(text: &str) -> bool {
    hrp(strip_scheme(text)).is_ok()
}

/// Amount encoded in the invoice, in millisatoshi.
///
/// Returns `Ok(None)` for "any amount" invoices.
pub fn amount_msat(invoice: &str) -> Result<Option<u64>, DriverError> {
    let hrp = hrp(strip_scheme(invoice))?;

    // "ln" + currency letters, then optional digits + multiplier
    let rest = &hrp[2..];
    let amount_part = rest.trim_start_matches(|c: char| c.is_ascii_alphabetic());
    if amount_part.is_empty() {
        return Ok(None);
    }

    let (digits, multiplier) = match amount_part.char_indices().last() {
        Some((idx, c)) if c.is_ascii_alphabetic() => (&amount_part[..idx], Some(c)),
        _ => (amount_part, None),
    };

    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(DriverError::InvalidInvoice(format!(
            "malformed amount '{}'",
            amount_part
        )));
    }

    let value: u64 = digits
        .parse()
        .map_err(|_| DriverError::InvalidInvoice(format!("amount '{}' out of range", digits)))?;

    let msat = match multiplier {
        None => value.checked_mul(MSAT_PER_BTC),
        Some('m') => value.checked_mul(MSAT_PER_BTC / 1_000),
        Some('u') => value.checked_mul(MSAT_PER_BTC / 1_000_000),
        Some('n') => value.checked_mul(MSAT_PER_BTC / 1_000_000_000),
        Some('p') => {
            if value % 10 != 0 {
                return Err(DriverError::InvalidInvoice(
                    "pico amount is not a whole millisatoshi".to_string(),
                ));
            }
            Some(value / 10)
        }
        Some(other) => {
            return Err(DriverError::InvalidInvoice(format!(
                "unknown multiplier '{}'",
                other
            )))
        }
    };

    msat.map(Some)
        .ok_or_else(|| DriverError::InvalidInvoice("amount overflows".to_string()))
}

/// Human-readable part, lowercased.
fn hrp(invoice: &str) -> Result<String, DriverError> {
    let lower = invoice.to_ascii_lowercase();
    let separator = lower
        .rfind('1')
        .ok_or_else(|| DriverError::InvalidInvoice("missing separator".to_string()))?;
    let hrp = &lower[..separator];

    if !hrp.starts_with("ln") || hrp.len() < 4 {
        return Err(DriverError::InvalidInvoice(format!(
            "unexpected prefix '{}'",
            hrp
        )));
    }
    if separator + 1 >= lower.len() {
        return Err(DriverError::InvalidInvoice("empty data part".to_string()));
    }

    Ok(hrp.to_string())
}
