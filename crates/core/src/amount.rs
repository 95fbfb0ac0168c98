//! Numeric canonicalization of decimal amounts.
//!
//! Declared amounts travel as decimal-digit strings and are scaled to a
//! deployment's fixed decimal count before use. The protocol admits exactly
//! one spelling per value: "1.50" at two decimals is invalid even though it
//! names a representable amount.

/// Number of fractional digits in an amount string.
pub fn count_decimals(text: &str) -> usize {
    match text.split_once('.') {
        Some((_, frac)) => frac.len(),
        None => 0,
    }
}

/// True for strings of the shape `\d*\.?\d*`.
fn is_valid_number(text: &str) -> bool {
    let mut seen_dot = false;
    for c in text.chars() {
        match c {
            '0'..='9' => {}
            '.' if !seen_dot => seen_dot = true,
            _ => return false,
        }
    }
    true
}

/// Canonicalizes a declared amount string into u64 minor units.
///
/// Rejections (`None`): leading zero not of the form "0."; a fractional part
/// with a trailing zero; a trailing "."; more fractional digits than
/// `decimals`; non-numeric characters; a zero value; values above 2^64 - 1.
pub fn canonicalize(text: &str, decimals: u8) -> Option<u64> {
    if text.starts_with('0') && !text.starts_with("0.") {
        return None;
    }
    if text.contains('.') && text.ends_with('0') {
        return None;
    }
    if text.ends_with('.') {
        return None;
    }
    if count_decimals(text) > decimals as usize {
        return None;
    }
    if !is_valid_number(text) {
        return None;
    }

    let (int_part, frac_part) = match text.split_once('.') {
        Some((i, f)) => (i, f.to_string()),
        None => (text, String::new()),
    };

    let mut frac = frac_part;
    while frac.len() < decimals as usize {
        frac.push('0');
    }
    frac.truncate(decimals as usize);

    let int_part = if int_part == "0" { "" } else { int_part };
    let joined = format!("{}{}", int_part, frac);
    let trimmed = joined.trim_start_matches('0');
    let canonical = if trimmed.is_empty() { "0" } else { trimmed };

    let value: u128 = canonical.parse().ok()?;
    if value == 0 || value > u64::MAX as u128 {
        return None;
    }
    Some(value as u64)
}

/// Expands minor units back into a decimal string with exactly `decimals`
/// fractional digits ("0.50" style).
pub fn format_minor(amount: u64, decimals: u8) -> String {
    let digits = amount.to_string();
    if decimals == 0 {
        return digits;
    }
    let decimals = decimals as usize;
    if digits.len() > decimals {
        let pos = digits.len() - decimals;
        format!("{}.{}", &digits[..pos], &digits[pos..])
    } else {
        format!("0.{}{}", "0".repeat(decimals - digits.len()), digits)
    }
}

/// Normalizes a decimal string for display: drops thousands separators,
/// leading zeros and trailing fractional zeros. `None` for anything that is
/// not a decimal number.
pub fn clean_float(input: &str) -> Option<String> {
    let input: String = input.chars().filter(|c| *c != ',').collect();
    let (int_part, frac_part) = match input.split_once('.') {
        Some((i, f)) => (i, Some(f.to_string())),
        None => (input.as_str(), None),
    };
    if int_part.is_empty() || !int_part.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    if let Some(frac) = &frac_part {
        if !frac.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
    }

    let trimmed = int_part.trim_start_matches('0');
    let int_clean = if trimmed.is_empty() { "0" } else { trimmed };
    let frac_clean = frac_part
        .as_deref()
        .map(|f| f.trim_end_matches('0'))
        .unwrap_or("");

    if frac_clean.is_empty() {
        Some(int_clean.to_string())
    } else {
        Some(format!("{}.{}", int_clean, frac_clean))
    }
}

/// Extracts the amount text from a push, honoring the legacy encoding.
///
/// Below `legacy_block_end` a push whose decoded text does not start with a
/// digit is taken as a raw hex amount string; from the cutoff on, the
/// decoded text is always used (and canonicalization rejects anything that
/// is not a number).
pub fn amount_text(push: &[u8], height: u64, legacy_block_end: u64) -> String {
    let decoded: String = push.iter().map(|b| *b as char).collect();
    if height < legacy_block_end {
        if decoded.chars().next().is_some_and(|c| c.is_ascii_digit()) {
            decoded
        } else {
            hex::encode(push)
        }
    } else {
        decoded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalize_basic() {
        assert_eq!(canonicalize("0.5", 2), Some(50));
        assert_eq!(canonicalize("1", 0), Some(1));
        assert_eq!(canonicalize("100.00", 2), None); // trailing zero
        assert_eq!(canonicalize("100", 2), Some(10_000));
        assert_eq!(canonicalize("10.01", 2), Some(1_001));
    }

    #[test]
    fn test_canonicalize_rejects_non_canonical() {
        assert_eq!(canonicalize("1.50", 2), None); // trailing zero
        assert_eq!(canonicalize("01", 0), None); // leading zero
        assert_eq!(canonicalize("00.5", 2), None);
        assert_eq!(canonicalize("1.", 2), None); // trailing dot
        assert_eq!(canonicalize("1.234", 2), None); // too many decimals
        assert_eq!(canonicalize("1a", 0), None);
        assert_eq!(canonicalize("1.2.3", 2), None);
        assert_eq!(canonicalize("0", 2), None); // zero value
        assert_eq!(canonicalize("", 2), None);
    }

    #[test]
    fn test_canonicalize_cap() {
        assert_eq!(canonicalize("18446744073709551615", 0), Some(u64::MAX));
        assert_eq!(canonicalize("18446744073709551616", 0), None);
    }

    #[test]
    fn test_format_minor_round_trip() {
        assert_eq!(format_minor(50, 2), "0.50");
        assert_eq!(format_minor(10_000, 2), "100.00");
        assert_eq!(format_minor(5, 0), "5");
        assert_eq!(format_minor(5, 4), "0.0005");
    }

    #[test]
    fn test_clean_float() {
        assert_eq!(clean_float("0.50").as_deref(), Some("0.5"));
        assert_eq!(clean_float("100.00").as_deref(), Some("100"));
        assert_eq!(clean_float("007").as_deref(), Some("7"));
        assert_eq!(clean_float("1,000.10").as_deref(), Some("1000.1"));
        assert_eq!(clean_float("abc"), None);
    }

    #[test]
    fn test_amount_text_legacy_rules() {
        // "10" as ASCII digits decodes to itself either way.
        assert_eq!(amount_text(b"10", 809_000, 810_000), "10");
        assert_eq!(amount_text(b"10", 811_000, 810_000), "10");
        // A binary push falls back to its hex spelling only below the cutoff.
        assert_eq!(amount_text(&[0xff, 0x01], 809_000, 810_000), "ff01");
        assert_eq!(amount_text(&[0xff, 0x01], 811_000, 810_000), "\u{ff}\u{1}");
    }
}
