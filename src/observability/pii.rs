use regex::Regex;
use lazy_static::lazy_static;

lazy_static! {
    static ref EMAIL_REGEX: Regex = Regex::new(r"(?i)[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}").unwrap();
    static ref PHONE_REGEX: Regex = Regex::new(r"\+?\d[\d\s().-]{6,}\d").unwrap();
}

/// Scrubs contact details from caller-supplied text before it is logged.
/// Search strings for owners and pets are free text and sometimes carry them.
pub fn mask_pii(input: &str) -> String {
    let masked = EMAIL_REGEX.replace_all(input, "***@***.***");
    PHONE_REGEX.replace_all(&masked, "***-****").to_string()
}
