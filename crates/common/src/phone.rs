//! Phone number normalization and prefix-variant expansion.
//!
//! Providers and business data disagree on whether a number carries its
//! country code (and, for Argentine mobiles, the extra `9`). Matching a
//! sender against stored records therefore compares against a small set of
//! variants instead of a single canonical form.

/// Country calling code assumed for bare national numbers.
pub const DEFAULT_COUNTRY_CODE: &str = "54";

/// Mobile marker inserted after the country code by WhatsApp for Argentina.
const MOBILE_MARKER: &str = "9";

/// Length of a national significant number without any prefix.
const NATIONAL_LEN: usize = 10;

/// Keep only ASCII digits, dropping a leading international `00` prefix.
#[must_use]
pub fn normalize_phone(raw: &str) -> String {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    match digits.strip_prefix("00") {
        Some(rest) if rest.len() > NATIONAL_LEN => rest.to_string(),
        _ => digits,
    }
}

/// National significant number of `digits`, when one can be derived.
fn national_part(digits: &str) -> Option<String> {
    let with_marker = format!("{DEFAULT_COUNTRY_CODE}{MOBILE_MARKER}");
    if let Some(rest) = digits.strip_prefix(&with_marker)
        && rest.len() == NATIONAL_LEN
    {
        Some(rest.to_string())
    } else if let Some(rest) = digits.strip_prefix(DEFAULT_COUNTRY_CODE)
        && rest.len() == NATIONAL_LEN
    {
        Some(rest.to_string())
    } else if digits.len() == NATIONAL_LEN {
        Some(digits.to_string())
    } else if digits.len() > NATIONAL_LEN {
        // Foreign country code: the trailing national part is the best guess.
        Some(digits[digits.len() - NATIONAL_LEN..].to_string())
    } else {
        None
    }
}

/// One stable form per line: the national number when derivable, otherwise
/// the bare digits. Every member of [`phone_variants`] maps to the same value.
#[must_use]
pub fn canonical_phone(raw: &str) -> String {
    let digits = normalize_phone(raw);
    national_part(&digits).unwrap_or(digits)
}

/// All prefix variants a number may be stored under, original form first.
///
/// `5492611234567`, `542611234567` and `2611234567` expand to the same set.
#[must_use]
pub fn phone_variants(raw: &str) -> Vec<String> {
    let digits = normalize_phone(raw);
    if digits.is_empty() {
        return Vec::new();
    }

    let with_marker = format!("{DEFAULT_COUNTRY_CODE}{MOBILE_MARKER}");
    let national = national_part(&digits);

    let mut variants = vec![digits.clone()];
    if let Some(national) = national {
        for candidate in [
            national.clone(),
            format!("{DEFAULT_COUNTRY_CODE}{national}"),
            format!("{with_marker}{national}"),
        ] {
            if !variants.contains(&candidate) {
                variants.push(candidate);
            }
        }
    }
    variants
}

/// Whether two phone numbers refer to the same line under prefix tolerance.
#[must_use]
pub fn phones_match(a: &str, b: &str) -> bool {
    let b = normalize_phone(b);
    !b.is_empty() && phone_variants(a).contains(&b)
}
