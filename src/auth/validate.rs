use lazy_static::lazy_static;
use regex::Regex;

use crate::config::PasswordPolicy;

lazy_static! {
    static ref EMAIL_RE: Regex =
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s.]{2,}$").expect("static email regex");
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn is_valid_email(email: &str) -> bool {
    email.len() <= 254 && EMAIL_RE.is_match(email)
}

impl PasswordPolicy {
    /// Returns the message describing the first unmet rule.
    pub fn check(&self, password: &str) -> Result<(), String> {
        if password.chars().count() < self.min_length {
            return Err(format!(
                "Password must be at least {} characters",
                self.min_length
            ));
        }
        if self.require_classes {
            let lower = password.chars().any(|c| c.is_lowercase());
            let upper = password.chars().any(|c| c.is_uppercase());
            let digit = password.chars().any(|c| c.is_ascii_digit());
            let symbol = password.chars().any(|c| !c.is_alphanumeric() && !c.is_whitespace());
            if !(lower && upper && digit && symbol) {
                return Err(
                    "Password must contain upper and lower case letters, a number and a symbol"
                        .into(),
                );
            }
        }
        Ok(())
    }
}
