//! Conversion between human decimal amounts and integer minor units

use crate::error::{TransferError, TransferResult};

/// Largest decimals value for which `10^decimals` fits in a u128
const MAX_DECIMALS: u8 = 38;

/// Check that `amount` is an unsigned decimal such as `"12"`, `"0.1"` or `".5"`
pub fn is_decimal(amount: &str) -> bool {
    let mut parts = amount.splitn(2, '.');
    let whole = parts.next().unwrap_or_default();
    let fraction = parts.next();

    let digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    match fraction {
        Some(fraction) => {
            digits(whole) && digits(fraction) && !(whole.is_empty() && fraction.is_empty())
        }
        None => !whole.is_empty() && digits(whole),
    }
}

/// Scale a human decimal amount into minor units of an asset with `decimals`
pub fn to_minor_units(amount: &str, decimals: u8) -> TransferResult<u128> {
    let amount = amount.trim();
    if !is_decimal(amount) {
        return Err(TransferError::Config(format!(
            "Amount is not a decimal number: {:?}",
            amount
        )));
    }
    if decimals > MAX_DECIMALS {
        return Err(TransferError::Config(format!(
            "Unsupported asset decimals: {}",
            decimals
        )));
    }

    let (whole, fraction) = amount.split_once('.').unwrap_or((amount, ""));
    let fraction = fraction.trim_end_matches('0');
    if fraction.len() > decimals as usize {
        return Err(TransferError::Config(format!(
            "Amount {} has more than {} decimal places",
            amount, decimals
        )));
    }

    let overflow = || TransferError::Config(format!("Amount {} is too large", amount));
    let scale = 10u128.pow(decimals as u32);

    let whole: u128 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| overflow())?
    };
    let fraction_units: u128 = if fraction.is_empty() {
        0
    } else {
        let padded = format!("{:0<width$}", fraction, width = decimals as usize);
        padded.parse().map_err(|_| overflow())?
    };

    whole
        .checked_mul(scale)
        .and_then(|units| units.checked_add(fraction_units))
        .ok_or_else(overflow)
}

/// Render minor units as a human decimal without trailing zeros
pub fn from_minor_units(units: u128, decimals: u8) -> String {
    if decimals == 0 {
        return units.to_string();
    }
    let digits = format!("{:0>width$}", units, width = decimals as usize + 1);
    let (whole, fraction) = digits.split_at(digits.len() - decimals as usize);
    let fraction = fraction.trim_end_matches('0');
    if fraction.is_empty() {
        whole.to_string()
    } else {
        format!("{}.{}", whole, fraction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_decimal() {
        assert!(is_decimal("0.1"));
        assert!(is_decimal("10"));
        assert!(is_decimal(".5"));
        assert!(is_decimal("5."));
        assert!(!is_decimal("."));
        assert!(!is_decimal(""));
        assert!(!is_decimal("-1"));
        assert!(!is_decimal("1e5"));
        assert!(!is_decimal("1.2.3"));
    }

    #[test]
    fn test_scale_dot() {
        assert_eq!(to_minor_units("0.1", 10).unwrap(), 1_000_000_000);
        assert_eq!(to_minor_units("12.5", 10).unwrap(), 125_000_000_000);
        assert_eq!(to_minor_units("1.50", 1).unwrap(), 15);
        assert_eq!(to_minor_units("3", 0).unwrap(), 3);
    }

    #[test]
    fn test_too_precise_rejected() {
        assert!(to_minor_units("0.0000001", 6).is_err());
    }

    #[test]
    fn test_overflow_rejected() {
        assert!(to_minor_units("340282366920938463463374607431768211456", 0).is_err());
        assert!(to_minor_units("1000000000000000000000000000000", 18).is_err());
    }

    #[test]
    fn test_format_minor_units() {
        assert_eq!(from_minor_units(1_000_000_000, 10), "0.1");
        assert_eq!(from_minor_units(125_000_000_000, 10), "12.5");
        assert_eq!(from_minor_units(20_000_000, 6), "20");
        assert_eq!(from_minor_units(7, 0), "7");
        assert_eq!(from_minor_units(0, 12), "0");
    }
}
