//! Masking helpers for driver contact fields.
//!
//! Raw phone numbers and full names from upstream payloads are masked during
//! normalization; nothing downstream ever holds the originals.

/// Mask a phone number, keeping only the last two digits:
/// `"(555) 867-5289"` becomes `"(555) ***-**89"` shaped as `"***-**89"`
/// when the input has no recognisable area code.
#[must_use]
pub fn mask_phone(raw: &str) -> String {
    let digits: Vec<char> = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.len() < 4 {
        return "***".to_owned();
    }
    let last_two: String = digits[digits.len() - 2..].iter().collect();
    if digits.len() >= 10 {
        let area: String = digits[digits.len() - 10..digits.len() - 7].iter().collect();
        format!("({area}) ***-**{last_two}")
    } else {
        format!("***-**{last_two}")
    }
}

/// Reduce a full name to first name plus last initial: `"Maria Gonzalez"`
/// becomes `"Maria G."`. Single-token names pass through unchanged.
#[must_use]
pub fn mask_name(raw: &str) -> String {
    let mut parts = raw.split_whitespace();
    let Some(first) = parts.next() else {
        return String::new();
    };
    match parts.last().and_then(|last| last.chars().next()) {
        Some(initial) => format!("{first} {initial}."),
        None => first.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_us_phone_keeping_area_code() {
        assert_eq!(mask_phone("(555) 867-5289"), "(555) ***-**89");
        assert_eq!(mask_phone("+1 555 867 5289"), "(555) ***-**89");
    }

    #[test]
    fn masks_short_numbers_without_area_code() {
        assert_eq!(mask_phone("8675289"), "***-**89");
        assert_eq!(mask_phone("12"), "***");
    }

    #[test]
    fn masks_name_to_first_plus_initial() {
        assert_eq!(mask_name("Maria Gonzalez"), "Maria G.");
        assert_eq!(mask_name("James Earl Jones"), "James J.");
        assert_eq!(mask_name("Cher"), "Cher");
        assert_eq!(mask_name(""), "");
    }
}
