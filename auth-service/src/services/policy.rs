//! Password policy validation against a tenant's login configuration.

use service_core::error::AppError;

use crate::models::TenantLoginConfig;

/// The first policy rule a candidate password violates.
#[derive(Debug, Clone, PartialEq)]
pub enum PolicyError {
    TooShort { min_length: usize, actual_length: usize },
    MissingUppercase,
    MissingLowercase,
    MissingDigit,
    MissingSpecial,
}

impl std::fmt::Display for PolicyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PolicyError::TooShort {
                min_length,
                actual_length,
            } => write!(
                f,
                "Password must be at least {} characters (got {})",
                min_length, actual_length
            ),
            PolicyError::MissingUppercase => {
                write!(f, "Password must contain at least one uppercase letter")
            }
            PolicyError::MissingLowercase => {
                write!(f, "Password must contain at least one lowercase letter")
            }
            PolicyError::MissingDigit => {
                write!(f, "Password must contain at least one digit")
            }
            PolicyError::MissingSpecial => {
                write!(f, "Password must contain at least one special character")
            }
        }
    }
}

impl std::error::Error for PolicyError {}

impl From<PolicyError> for AppError {
    fn from(err: PolicyError) -> Self {
        AppError::PolicyViolation(err.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct PolicyService;

impl PolicyService {
    /// Validate a password against the tenant's policy, reporting the first
    /// violated rule.
    pub fn validate_password(
        password: &str,
        config: &TenantLoginConfig,
    ) -> Result<(), PolicyError> {
        let length = password.chars().count();
        if length < config.password_min_length {
            return Err(PolicyError::TooShort {
                min_length: config.password_min_length,
                actual_length: length,
            });
        }

        if config.password_require_upper && !password.chars().any(|c| c.is_ascii_uppercase()) {
            return Err(PolicyError::MissingUppercase);
        }

        if config.password_require_lower && !password.chars().any(|c| c.is_ascii_lowercase()) {
            return Err(PolicyError::MissingLowercase);
        }

        if config.password_require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
            return Err(PolicyError::MissingDigit);
        }

        if config.password_require_special && !password.chars().any(is_special) {
            return Err(PolicyError::MissingSpecial);
        }

        Ok(())
    }
}

fn is_special(c: char) -> bool {
    matches!(
        c,
        '!' | '@'
            | '#'
            | '$'
            | '%'
            | '^'
            | '&'
            | '*'
            | '('
            | ')'
            | '-'
            | '_'
            | '='
            | '+'
            | '['
            | ']'
            | '{'
            | '}'
            | '|'
            | '\\'
            | ';'
            | ':'
            | '\''
            | '"'
            | ','
            | '.'
            | '<'
            | '>'
            | '/'
            | '?'
            | '`'
            | '~'
    )
}
