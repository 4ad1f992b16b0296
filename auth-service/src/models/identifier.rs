use serde::{Deserialize, Serialize};

use super::User;

/// The shape of the string a user logged in with.
///
/// Detection happens against a concrete user row, by exact equality, in a
/// fixed order. Tenants whitelist the kinds they accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierKind {
    Email,
    Username,
    Phone,
    DocNumber,
}

impl IdentifierKind {
    /// Match a submitted identifier against the user's fields: email,
    /// username, phone, doc number, first hit wins. `None` means the
    /// identifier did not come from this user at all, and the caller must
    /// fail the login without saying which field mismatched.
    pub fn detect(identifier: &str, user: &User) -> Option<IdentifierKind> {
        if user.email.as_deref() == Some(identifier) {
            return Some(IdentifierKind::Email);
        }
        if user.username.as_deref() == Some(identifier) {
            return Some(IdentifierKind::Username);
        }
        if user.phone.as_deref() == Some(identifier) {
            return Some(IdentifierKind::Phone);
        }
        if user.doc_number.as_deref() == Some(identifier) {
            return Some(IdentifierKind::DocNumber);
        }
        None
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IdentifierKind::Email => "email",
            IdentifierKind::Username => "username",
            IdentifierKind::Phone => "phone",
            IdentifierKind::DocNumber => "doc_number",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User::new(
            Some("alice@example.com".to_string()),
            Some("alice".to_string()),
            Some("+15550100".to_string()),
            Some("AB-12345".to_string()),
            "hash".to_string(),
        )
    }

    #[test]
    fn detects_each_kind() {
        let u = user();
        assert_eq!(
            IdentifierKind::detect("alice@example.com", &u),
            Some(IdentifierKind::Email)
        );
        assert_eq!(
            IdentifierKind::detect("alice", &u),
            Some(IdentifierKind::Username)
        );
        assert_eq!(
            IdentifierKind::detect("+15550100", &u),
            Some(IdentifierKind::Phone)
        );
        assert_eq!(
            IdentifierKind::detect("AB-12345", &u),
            Some(IdentifierKind::DocNumber)
        );
    }

    #[test]
    fn unknown_identifier_detects_nothing() {
        assert_eq!(IdentifierKind::detect("bob@example.com", &user()), None);
    }

    #[test]
    fn email_wins_when_fields_collide() {
        let mut u = user();
        u.username = Some("alice@example.com".to_string());
        assert_eq!(
            IdentifierKind::detect("alice@example.com", &u),
            Some(IdentifierKind::Email)
        );
    }

    #[test]
    fn serializes_snake_case() {
        let json = serde_json::to_string(&IdentifierKind::DocNumber).unwrap();
        assert_eq!(json, r#""doc_number""#);
    }
}
