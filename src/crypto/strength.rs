//! Heuristic password strength scoring for UX guidance.

use serde::Serialize;

/// Minimum length for a master password to be accepted.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Result of [`password_strength`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PasswordStrength {
    /// `true` once the password meets the minimum length.
    pub valid: bool,
    /// 0 (very weak) to 4 (strong).
    pub score: u8,
    pub feedback: Vec<String>,
}

impl PasswordStrength {
    pub fn label(&self) -> &'static str {
        match self.score {
            0 => "very weak",
            1 => "weak",
            2 => "fair",
            3 => "good",
            _ => "strong",
        }
    }
}

/// Score a password by length tiers and character classes.
pub fn password_strength(password: &str) -> PasswordStrength {
    let len = password.chars().count();
    let mut score: u8 = 0;
    let mut feedback = Vec::new();

    if len >= MIN_PASSWORD_LEN {
        score += 1;
    } else {
        feedback.push(format!("Use at least {} characters", MIN_PASSWORD_LEN));
    }
    if len >= 12 {
        score += 1;
    } else if len >= MIN_PASSWORD_LEN {
        feedback.push("Use 12 or more characters for a stronger password".to_string());
    }

    let has_lower = password.chars().any(|c| c.is_lowercase());
    let has_upper = password.chars().any(|c| c.is_uppercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_symbol = password.chars().any(|c| !c.is_alphanumeric());

    if has_lower && has_upper {
        score += 1;
    } else {
        feedback.push("Mix uppercase and lowercase letters".to_string());
    }
    if has_digit {
        score += 1;
    } else {
        feedback.push("Add numbers".to_string());
    }
    if has_symbol {
        score += 1;
    } else {
        feedback.push("Add special characters".to_string());
    }

    PasswordStrength {
        valid: len >= MIN_PASSWORD_LEN,
        score: score.min(4),
        feedback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_password_invalid() {
        let result = password_strength("Ab1!");
        assert!(!result.valid);
        assert!(result.feedback.iter().any(|f| f.contains("at least 8")));
    }

    #[test]
    fn test_eight_lowercase_is_valid_but_weak() {
        let result = password_strength("abcdefgh");
        assert!(result.valid);
        assert_eq!(result.score, 1);
        assert_eq!(result.label(), "weak");
    }

    #[test]
    fn test_strong_password_scores_four() {
        let result = password_strength("Correct-Horse-42");
        assert!(result.valid);
        assert_eq!(result.score, 4);
        assert!(result.feedback.is_empty());
    }

    #[test]
    fn test_score_is_capped() {
        let result = password_strength("Aa1!Aa1!Aa1!Aa1!");
        assert_eq!(result.score, 4);
    }

    #[test]
    fn test_empty_password() {
        let result = password_strength("");
        assert!(!result.valid);
        assert_eq!(result.score, 0);
        assert_eq!(result.label(), "very weak");
    }
}
