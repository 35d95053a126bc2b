use regex::Regex;

pub const TITLE_MAX: usize = 200;
pub const DESCRIPTION_MAX: usize = 2000;
pub const BIO_MAX: usize = 500;
pub const SKILL_DESCRIPTION_MAX: usize = 500;
pub const RESPONSE_MESSAGE_MAX: usize = 1000;
pub const FEEDBACK_MAX: usize = 500;

pub fn validate_email(email: &str) -> bool {
    let re = Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap();
    re.is_match(email)
}

/// Required-field check: present and not just whitespace.
pub fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

pub fn within(value: &str, max: usize) -> bool {
    value.chars().count() <= max
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ordinary_emails() {
        assert!(validate_email("asha.rao@example.com"));
        assert!(validate_email("dev+test@mail.co.in"));
    }

    #[test]
    fn rejects_malformed_emails() {
        assert!(!validate_email("not-an-email"));
        assert!(!validate_email("missing@tld"));
        assert!(!validate_email("@example.com"));
    }

    #[test]
    fn blank_detects_whitespace_only() {
        assert!(is_blank(""));
        assert!(is_blank("   \t"));
        assert!(!is_blank("Math"));
    }

    #[test]
    fn within_counts_chars_not_bytes() {
        let s = "é".repeat(500);
        assert!(within(&s, BIO_MAX));
        assert!(!within(&format!("{}é", s), BIO_MAX));
    }
}
