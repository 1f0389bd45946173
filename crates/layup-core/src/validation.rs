//! Password strength and form validation used by signup and reset flows.

use std::fmt;

pub const MIN_PASSWORD_LEN: usize = 10;
pub const MAX_PASSWORD_LEN: usize = 32;
pub const MAX_STRENGTH: u8 = 5;

/// Scores a password from 0 (empty) to 5.
///
/// Anything shorter than the minimum length scores 1 regardless of content.
pub fn password_strength(password: &str) -> u8 {
    if password.is_empty() {
        return 0;
    }

    let len = password.chars().count();
    if len < MIN_PASSWORD_LEN {
        return 1;
    }

    let checks = [
        len >= 12,
        len >= 16,
        password.chars().any(|c| c.is_ascii_lowercase()),
        password.chars().any(|c| c.is_ascii_uppercase()),
        password.chars().any(|c| c.is_ascii_digit()),
        password.chars().any(|c| !c.is_ascii_alphanumeric()),
    ];
    let score = checks.iter().filter(|passed| **passed).count() as u8;
    score.min(MAX_STRENGTH)
}

/// Human label for a strength score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrengthLabel {
    Weak,
    Fair,
    Good,
    Strong,
    VeryStrong,
}

impl StrengthLabel {
    pub fn from_score(score: u8) -> Self {
        match score {
            0 | 1 => StrengthLabel::Weak,
            2 => StrengthLabel::Fair,
            3 => StrengthLabel::Good,
            4 => StrengthLabel::Strong,
            _ => StrengthLabel::VeryStrong,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StrengthLabel::Weak => "Weak",
            StrengthLabel::Fair => "Fair",
            StrengthLabel::Good => "Good",
            StrengthLabel::Strong => "Strong",
            StrengthLabel::VeryStrong => "Very Strong",
        }
    }

    /// Text and background colour classes for the strength meter.
    pub fn css_classes(self) -> &'static str {
        match self {
            StrengthLabel::Weak => "text-red-600 bg-red-600",
            StrengthLabel::Fair => "text-orange-600 bg-orange-600",
            StrengthLabel::Good => "text-yellow-600 bg-yellow-600",
            StrengthLabel::Strong => "text-blue-600 bg-blue-600",
            StrengthLabel::VeryStrong => "text-green-600 bg-green-600",
        }
    }
}

impl fmt::Display for StrengthLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fill percentage of the strength meter.
pub fn strength_percentage(score: u8) -> f64 {
    f64::from(score) / f64::from(MAX_STRENGTH) * 100.0
}

/// Outcome of a form-field check. Empty `errors` means valid.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Validation {
    pub errors: Vec<String>,
}

impl Validation {
    fn from_error(error: Option<&str>) -> Self {
        Self {
            errors: error.map(str::to_string).into_iter().collect(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Checks a new password. Reports only the first failing rule.
pub fn validate_password(password: &str) -> Validation {
    let len = password.chars().count();
    let has_letter = password.chars().any(|c| c.is_ascii_alphabetic());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());

    let error = if password.is_empty() {
        Some("Please enter a password")
    } else if len < MIN_PASSWORD_LEN {
        Some("Password must be at least 10 characters")
    } else if len > MAX_PASSWORD_LEN {
        Some("Password cannot exceed 32 characters")
    } else if !(has_letter && has_digit) {
        Some("Password must contain both letters and numbers")
    } else {
        None
    };

    Validation::from_error(error)
}

pub fn validate_password_confirmation(password: &str, confirmation: &str) -> Validation {
    let error = if confirmation.is_empty() {
        Some("Please confirm your password")
    } else if password != confirmation {
        Some("Passwords do not match")
    } else {
        None
    };

    Validation::from_error(error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strength_scores() {
        assert_eq!(password_strength(""), 0);
        assert_eq!(password_strength("Ab1!"), 1);
        // 10 chars, lowercase only.
        assert_eq!(password_strength("abcdefghij"), 1);
        // 10 chars, lower + digit.
        assert_eq!(password_strength("abcdefgh12"), 2);
        // 12 chars, lower + upper + digit.
        assert_eq!(password_strength("Abcdefghij12"), 4);
        // Every check passes, capped.
        assert_eq!(password_strength("Abcdefghijklm12!"), 5);
    }

    #[test]
    fn test_labels_and_percentages() {
        assert_eq!(StrengthLabel::from_score(0), StrengthLabel::Weak);
        assert_eq!(StrengthLabel::from_score(2).as_str(), "Fair");
        assert_eq!(StrengthLabel::from_score(5).to_string(), "Very Strong");
        assert_eq!(
            StrengthLabel::from_score(4).css_classes(),
            "text-blue-600 bg-blue-600"
        );
        assert!((strength_percentage(3) - 60.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_validate_password_rules_in_order() {
        let cases = [
            ("", Some("Please enter a password")),
            ("short1", Some("Password must be at least 10 characters")),
            (
                "a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a",
                Some("Password cannot exceed 32 characters"),
            ),
            ("abcdefghijk", Some("Password must contain both letters and numbers")),
            ("12345678901", Some("Password must contain both letters and numbers")),
            ("correcthorse9", None),
        ];

        for (password, expected) in cases {
            let result = validate_password(password);
            assert_eq!(
                result.errors.first().map(String::as_str),
                expected,
                "password {password:?}"
            );
            assert_eq!(result.is_valid(), expected.is_none());
        }
    }

    #[test]
    fn test_length_counts_characters_not_bytes() {
        // 10 characters, 19 bytes: long enough, but no ASCII letter.
        assert_eq!(
            validate_password("ééééééééé1").errors,
            vec!["Password must contain both letters and numbers".to_string()]
        );
        assert_eq!(
            validate_password("éééééééé1").errors,
            vec!["Password must be at least 10 characters".to_string()]
        );
    }

    #[test]
    fn test_length_counts_emoji_as_one_character() {
        // 10 characters, 18 UTF-16 units.
        let ten = format!("{}a1", "\u{1F600}".repeat(8));
        assert!(validate_password(&ten).is_valid());
        assert_eq!(password_strength(&ten), 3);

        // 32 characters, 62 UTF-16 units: still within the maximum.
        let thirty_two = format!("{}a1", "\u{1F600}".repeat(30));
        assert!(validate_password(&thirty_two).is_valid());

        let thirty_three = format!("{}a1", "\u{1F600}".repeat(31));
        assert_eq!(
            validate_password(&thirty_three).errors,
            vec!["Password cannot exceed 32 characters".to_string()]
        );
    }

    #[test]
    fn test_confirmation() {
        assert_eq!(
            validate_password_confirmation("pw", "").errors,
            vec!["Please confirm your password".to_string()]
        );
        assert_eq!(
            validate_password_confirmation("pw", "px").errors,
            vec!["Passwords do not match".to_string()]
        );
        assert!(validate_password_confirmation("pw", "pw").is_valid());
    }
}
