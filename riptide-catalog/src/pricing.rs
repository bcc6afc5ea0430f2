/// Pricing errors
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PricingError {
    #[error("Negative price: {0}")]
    NegativePrice(i64),

    #[error("Amount overflow: {price_cents} x {participants}")]
    Overflow { price_cents: i64, participants: i32 },
}

/// Total charged for a reservation: per-person price times head count.
pub fn total_amount(price_cents: i64, participants: i32) -> Result<i64, PricingError> {
    if price_cents < 0 {
        return Err(PricingError::NegativePrice(price_cents));
    }
    price_cents
        .checked_mul(i64::from(participants))
        .ok_or(PricingError::Overflow {
            price_cents,
            participants,
        })
}

/// Render minor units for display, e.g. `15000, "USD"` -> `"USD 150.00"`.
pub fn format_amount(amount_cents: i64, currency: &str) -> String {
    let sign = if amount_cents < 0 { "-" } else { "" };
    let abs = amount_cents.unsigned_abs();
    format!("{} {}{}.{:02}", currency, sign, abs / 100, abs % 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_is_price_times_participants() {
        assert_eq!(total_amount(15_000, 8), Ok(120_000));
        assert_eq!(total_amount(0, 4), Ok(0));
    }

    #[test]
    fn test_total_rejects_overflow_and_negative_prices() {
        assert!(matches!(total_amount(i64::MAX, 2), Err(PricingError::Overflow { .. })));
        assert_eq!(total_amount(-1, 2), Err(PricingError::NegativePrice(-1)));
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(22_500, "USD"), "USD 225.00");
        assert_eq!(format_amount(5, "USD"), "USD 0.05");
        assert_eq!(format_amount(-1_050, "EUR"), "EUR -10.50");
    }
}
