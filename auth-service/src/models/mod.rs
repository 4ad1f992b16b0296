pub mod identifier;
pub mod lockout;
pub mod login_attempt;
pub mod membership;
pub mod oauth_account;
pub mod permission;
pub mod refresh_credential;
pub mod role;
pub mod session;
pub mod tenant_config;
pub mod user;

pub use identifier::IdentifierKind;
pub use lockout::UserLockout;
pub use login_attempt::LoginAttempt;
pub use membership::Membership;
pub use oauth_account::{OAuthAccount, OAuthProvider};
pub use permission::{Permission, PermissionSet};
pub use refresh_credential::RefreshCredential;
pub use role::Role;
pub use session::Session;
pub use tenant_config::TenantLoginConfig;
pub use user::User;

/// Serde helper for `Option<DateTime<Utc>>` fields persisted to MongoDB.
///
/// The driver ships a helper for bare `DateTime<Utc>` only; TTL and range
/// queries require real BSON dates, so optional timestamps go through
/// `bson::DateTime` here.
pub mod bson_datetime_option {
    use chrono::{DateTime, Utc};
    use mongodb::bson;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        value.map(bson::DateTime::from_chrono).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        Ok(Option::<bson::DateTime>::deserialize(deserializer)?.map(|dt| dt.to_chrono()))
    }
}
