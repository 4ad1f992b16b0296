use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, Bson},
    options::{ClientOptions, FindOneOptions, FindOptions, IndexOptions, ReplaceOptions},
    Client as MongoClient, Collection, Database, IndexModel,
};
use service_core::error::AppError;
use std::time::Duration;

use crate::config::MongoConfig;
use crate::models::{
    LoginAttempt, Membership, OAuthAccount, OAuthProvider, RefreshCredential, Role,
    TenantLoginConfig, User, UserLockout,
};
use crate::services::CredentialStore;

/// Login attempts are kept for 24 hours, then reaped by the TTL monitor.
const LOGIN_ATTEMPT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Clone)]
pub struct MongoDb {
    client: MongoClient,
    db: Database,
}

impl MongoDb {
    pub async fn connect(config: &MongoConfig) -> Result<Self, AppError> {
        tracing::info!(database = %config.database, "Connecting to MongoDB");

        let mut options = ClientOptions::parse(&config.uri).await?;
        options.min_pool_size = Some(config.min_pool_size);
        options.max_pool_size = Some(config.max_pool_size);

        let client = MongoClient::with_options(options)?;
        let db = client.database(&config.database);

        tracing::info!(database = %config.database, "Connected to MongoDB");
        Ok(Self { client, db })
    }

    /// Declare every index the engine relies on. Idempotent; runs at startup.
    pub async fn initialize_indexes(&self) -> Result<(), AppError> {
        tracing::info!("Creating MongoDB indexes");

        // Each identifier is globally unique when present; sparse so users
        // may omit any subset.
        let users = self.users();
        for field in ["email", "username", "phone", "doc_number"] {
            users
                .create_index(
                    IndexModel::builder()
                        .keys(doc! { field: 1 })
                        .options(
                            IndexOptions::builder()
                                .unique(true)
                                .sparse(true)
                                .name(format!("{}_unique", field))
                                .build(),
                        )
                        .build(),
                    None,
                )
                .await?;
        }

        let memberships = self.memberships();
        memberships
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "user_id": 1, "tenant_id": 1 })
                    .options(
                        IndexOptions::builder()
                            .unique(true)
                            .name("user_tenant_unique".to_string())
                            .build(),
                    )
                    .build(),
                None,
            )
            .await?;
        memberships
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "tenant_id": 1, "is_active": 1 })
                    .options(
                        IndexOptions::builder()
                            .name("tenant_active_lookup".to_string())
                            .build(),
                    )
                    .build(),
                None,
            )
            .await?;

        let roles = self.roles();
        roles
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "name": 1, "tenant_id": 1 })
                    .options(
                        IndexOptions::builder()
                            .unique(true)
                            .name("name_tenant_unique".to_string())
                            .build(),
                    )
                    .build(),
                None,
            )
            .await?;

        let refresh = self.refresh_credentials();
        refresh
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "token": 1 })
                    .options(
                        IndexOptions::builder()
                            .unique(true)
                            .name("token_unique".to_string())
                            .build(),
                    )
                    .build(),
                None,
            )
            .await?;
        refresh
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "user_id": 1, "tenant_id": 1 })
                    .options(
                        IndexOptions::builder()
                            .name("user_tenant_lookup".to_string())
                            .build(),
                    )
                    .build(),
                None,
            )
            .await?;
        refresh
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "expires_at": 1 })
                    .options(
                        IndexOptions::builder()
                            .expire_after(Duration::from_secs(0))
                            .name("expiry_ttl".to_string())
                            .build(),
                    )
                    .build(),
                None,
            )
            .await?;

        let attempts = self.login_attempts();
        attempts
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "identifier": 1, "tenant_id": 1, "attempt_at": 1 })
                    .options(
                        IndexOptions::builder()
                            .name("attempt_window_lookup".to_string())
                            .build(),
                    )
                    .build(),
                None,
            )
            .await?;
        attempts
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "attempt_at": 1 })
                    .options(
                        IndexOptions::builder()
                            .expire_after(LOGIN_ATTEMPT_TTL)
                            .name("attempt_ttl".to_string())
                            .build(),
                    )
                    .build(),
                None,
            )
            .await?;

        self.lockouts()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "user_id": 1, "tenant_id": 1, "is_active": 1 })
                    .options(
                        IndexOptions::builder()
                            .name("lockout_lookup".to_string())
                            .build(),
                    )
                    .build(),
                None,
            )
            .await?;

        self.login_configs()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "tenant_id": 1 })
                    .options(
                        IndexOptions::builder()
                            .unique(true)
                            .name("tenant_unique".to_string())
                            .build(),
                    )
                    .build(),
                None,
            )
            .await?;

        self.oauth_accounts()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "provider": 1, "provider_id": 1 })
                    .options(
                        IndexOptions::builder()
                            .unique(true)
                            .name("provider_account_unique".to_string())
                            .build(),
                    )
                    .build(),
                None,
            )
            .await?;

        tracing::info!("MongoDB indexes ready");
        Ok(())
    }

    fn users(&self) -> Collection<User> {
        self.db.collection("users_auth")
    }

    fn memberships(&self) -> Collection<Membership> {
        self.db.collection("user_tenants")
    }

    fn roles(&self) -> Collection<Role> {
        self.db.collection("roles")
    }

    fn refresh_credentials(&self) -> Collection<RefreshCredential> {
        self.db.collection("refresh_tokens")
    }

    fn login_attempts(&self) -> Collection<LoginAttempt> {
        self.db.collection("login_attempts")
    }

    fn lockouts(&self) -> Collection<UserLockout> {
        self.db.collection("user_lockouts")
    }

    fn login_configs(&self) -> Collection<TenantLoginConfig> {
        self.db.collection("tenant_login_configs")
    }

    fn oauth_accounts(&self) -> Collection<OAuthAccount> {
        self.db.collection("oauth_accounts")
    }
}

/// MongoDB reports unique-index collisions as write error 11000.
fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        &*err.kind,
        mongodb::error::ErrorKind::Write(mongodb::error::WriteFailure::WriteError(we))
            if we.code == 11000
    )
}

fn now_bson() -> Bson {
    Bson::DateTime(mongodb::bson::DateTime::from_chrono(Utc::now()))
}

#[async_trait]
impl CredentialStore for MongoDb {
    async fn create_user(&self, user: &User) -> Result<(), AppError> {
        match self.users().insert_one(user, None).await {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key(&e) => Err(AppError::Conflict(anyhow::anyhow!(
                "An account with one of these identifiers already exists"
            ))),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_user_by_identifier(&self, identifier: &str) -> Result<Option<User>, AppError> {
        let filter = doc! {
            "$or": [
                { "email": identifier },
                { "username": identifier },
                { "phone": identifier },
                { "doc_number": identifier },
            ]
        };
        Ok(self.users().find_one(filter, None).await?)
    }

    async fn find_user_by_id(&self, id: &str) -> Result<Option<User>, AppError> {
        let options = FindOneOptions::builder()
            .projection(doc! { "password_hash": 0 })
            .build();
        Ok(self.users().find_one(doc! { "_id": id }, options).await?)
    }

    async fn find_user_credentials_by_id(&self, id: &str) -> Result<Option<User>, AppError> {
        Ok(self.users().find_one(doc! { "_id": id }, None).await?)
    }

    async fn update_password_hash(&self, user_id: &str, hash: &str) -> Result<(), AppError> {
        self.users()
            .update_one(
                doc! { "_id": user_id },
                doc! { "$set": { "password_hash": hash, "updated_at": now_bson() } },
                None,
            )
            .await?;
        Ok(())
    }

    async fn update_last_login(&self, user_id: &str) -> Result<(), AppError> {
        self.users()
            .update_one(
                doc! { "_id": user_id },
                doc! { "$set": { "last_login_at": now_bson() } },
                None,
            )
            .await?;
        Ok(())
    }

    async fn set_user_active(&self, user_id: &str, active: bool) -> Result<(), AppError> {
        self.users()
            .update_one(
                doc! { "_id": user_id },
                doc! { "$set": { "is_active": active, "updated_at": now_bson() } },
                None,
            )
            .await?;
        Ok(())
    }

    async fn add_membership(
        &self,
        user_id: &str,
        tenant_id: &str,
        roles: &[String],
    ) -> Result<Membership, AppError> {
        let filter = doc! { "user_id": user_id, "tenant_id": tenant_id };

        if let Some(mut existing) = self.memberships().find_one(filter.clone(), None).await? {
            self.memberships()
                .update_one(
                    filter,
                    doc! { "$set": {
                        "roles": roles,
                        "is_active": true,
                        "updated_at": now_bson(),
                    }},
                    None,
                )
                .await?;
            existing.roles = roles.to_vec();
            existing.is_active = true;
            existing.updated_at = Utc::now();
            return Ok(existing);
        }

        let membership = Membership::new(
            user_id.to_string(),
            tenant_id.to_string(),
            roles.to_vec(),
        );
        match self.memberships().insert_one(&membership, None).await {
            Ok(_) => Ok(membership),
            // Lost a race with a concurrent grant; the row exists, replace
            // its roles as if we had found it above.
            Err(e) if is_duplicate_key(&e) => {
                self.update_membership_roles(user_id, tenant_id, roles).await?;
                self.find_membership(user_id, tenant_id)
                    .await?
                    .ok_or_else(|| {
                        AppError::InternalError(anyhow::anyhow!("Membership vanished after upsert"))
                    })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_membership(
        &self,
        user_id: &str,
        tenant_id: &str,
    ) -> Result<Option<Membership>, AppError> {
        Ok(self
            .memberships()
            .find_one(doc! { "user_id": user_id, "tenant_id": tenant_id }, None)
            .await?)
    }

    async fn find_memberships_for_user(&self, user_id: &str) -> Result<Vec<Membership>, AppError> {
        let options = FindOptions::builder()
            .sort(doc! { "joined_at": 1 })
            .build();
        let cursor = self
            .memberships()
            .find(doc! { "user_id": user_id, "is_active": true }, options)
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn update_membership_roles(
        &self,
        user_id: &str,
        tenant_id: &str,
        roles: &[String],
    ) -> Result<(), AppError> {
        let result = self
            .memberships()
            .update_one(
                doc! { "user_id": user_id, "tenant_id": tenant_id },
                doc! { "$set": { "roles": roles, "updated_at": now_bson() } },
                None,
            )
            .await?;
        if result.matched_count == 0 {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Membership not found"
            )));
        }
        Ok(())
    }

    async fn deactivate_membership(&self, user_id: &str, tenant_id: &str) -> Result<(), AppError> {
        let result = self
            .memberships()
            .update_one(
                doc! { "user_id": user_id, "tenant_id": tenant_id },
                doc! { "$set": { "is_active": false, "updated_at": now_bson() } },
                None,
            )
            .await?;
        if result.matched_count == 0 {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Membership not found"
            )));
        }
        Ok(())
    }

    async fn find_roles_by_names(
        &self,
        names: &[String],
        tenant_id: &str,
    ) -> Result<Vec<Role>, AppError> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        // Hits the compound (name, tenant_id) index; system-wide roles have
        // no tenant_id.
        let filter = doc! {
            "name": { "$in": names },
            "$or": [
                { "tenant_id": tenant_id },
                { "tenant_id": Bson::Null },
                { "tenant_id": { "$exists": false } },
            ],
        };
        let cursor = self.roles().find(filter, None).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn aggregate_permissions(
        &self,
        roles: &[String],
        tenant_id: &str,
    ) -> Result<Vec<String>, AppError> {
        let found = self.find_roles_by_names(roles, tenant_id).await?;
        let mut seen = std::collections::HashSet::new();
        let mut permissions = Vec::new();
        for role in found {
            for permission in role.permissions {
                if seen.insert(permission.clone()) {
                    permissions.push(permission);
                }
            }
        }
        Ok(permissions)
    }

    async fn upsert_role(&self, role: &Role) -> Result<(), AppError> {
        let tenant: Bson = role
            .tenant_id
            .as_ref()
            .map(|t| Bson::String(t.clone()))
            .unwrap_or(Bson::Null);
        self.roles()
            .replace_one(
                doc! { "name": &role.name, "tenant_id": tenant },
                role,
                ReplaceOptions::builder().upsert(true).build(),
            )
            .await?;
        Ok(())
    }

    async fn create_refresh_credential(
        &self,
        credential: &RefreshCredential,
    ) -> Result<(), AppError> {
        self.refresh_credentials().insert_one(credential, None).await?;
        Ok(())
    }

    async fn find_refresh_credential(
        &self,
        token: &str,
    ) -> Result<Option<RefreshCredential>, AppError> {
        // Validity predicate lives in the query: revoked or expired rows are
        // invisible even while the TTL monitor lags.
        let filter = doc! {
            "token": token,
            "revoked_at": Bson::Null,
            "expires_at": { "$gt": now_bson() },
        };
        Ok(self.refresh_credentials().find_one(filter, None).await?)
    }

    async fn revoke_refresh_credential(&self, token: &str) -> Result<(), AppError> {
        self.refresh_credentials()
            .update_one(
                doc! { "token": token },
                doc! { "$set": { "revoked_at": now_bson() } },
                None,
            )
            .await?;
        Ok(())
    }

    async fn revoke_all_refresh_credentials(&self, user_id: &str) -> Result<(), AppError> {
        self.refresh_credentials()
            .update_many(
                doc! { "user_id": user_id, "revoked_at": Bson::Null },
                doc! { "$set": { "revoked_at": now_bson() } },
                None,
            )
            .await?;
        Ok(())
    }

    async fn revoke_latest_refresh_credential(
        &self,
        user_id: &str,
        tenant_id: &str,
    ) -> Result<(), AppError> {
        let options = FindOneOptions::builder()
            .sort(doc! { "created_at": -1 })
            .build();
        let latest = self
            .refresh_credentials()
            .find_one(
                doc! {
                    "user_id": user_id,
                    "tenant_id": tenant_id,
                    "revoked_at": Bson::Null,
                },
                options,
            )
            .await?;
        if let Some(credential) = latest {
            self.revoke_refresh_credential(&credential.token).await?;
        }
        Ok(())
    }

    async fn count_active_refresh_credentials(&self, user_id: &str) -> Result<u64, AppError> {
        let count = self
            .refresh_credentials()
            .count_documents(
                doc! {
                    "user_id": user_id,
                    "revoked_at": Bson::Null,
                    "expires_at": { "$gt": now_bson() },
                },
                None,
            )
            .await?;
        Ok(count)
    }

    async fn record_login_attempt(&self, attempt: &LoginAttempt) -> Result<(), AppError> {
        self.login_attempts().insert_one(attempt, None).await?;
        Ok(())
    }

    async fn find_recent_attempts(
        &self,
        identifier: &str,
        tenant_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<LoginAttempt>, AppError> {
        let filter = doc! {
            "identifier": identifier,
            "tenant_id": tenant_id,
            "attempt_at": { "$gte": Bson::DateTime(mongodb::bson::DateTime::from_chrono(since)) },
        };
        let options = FindOptions::builder().sort(doc! { "attempt_at": 1 }).build();
        let cursor = self.login_attempts().find(filter, options).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn create_lockout(&self, lockout: &UserLockout) -> Result<(), AppError> {
        self.lockouts().insert_one(lockout, None).await?;
        Ok(())
    }

    async fn find_active_lockout(
        &self,
        user_id: &str,
        tenant_id: &str,
    ) -> Result<Option<UserLockout>, AppError> {
        let filter = doc! {
            "user_id": user_id,
            "tenant_id": tenant_id,
            "is_active": true,
            "unlock_at": { "$gt": now_bson() },
        };
        let options = FindOneOptions::builder()
            .sort(doc! { "unlock_at": -1 })
            .build();
        Ok(self.lockouts().find_one(filter, options).await?)
    }

    async fn get_tenant_login_config(
        &self,
        tenant_id: &str,
    ) -> Result<TenantLoginConfig, AppError> {
        let found = self
            .login_configs()
            .find_one(doc! { "tenant_id": tenant_id }, None)
            .await?;
        Ok(found.unwrap_or_else(|| TenantLoginConfig::default_for(tenant_id)))
    }

    async fn upsert_tenant_login_config(
        &self,
        config: &TenantLoginConfig,
    ) -> Result<(), AppError> {
        self.login_configs()
            .replace_one(
                doc! { "tenant_id": &config.tenant_id },
                config,
                ReplaceOptions::builder().upsert(true).build(),
            )
            .await?;
        Ok(())
    }

    async fn find_oauth_account(
        &self,
        provider: OAuthProvider,
        provider_id: &str,
    ) -> Result<Option<OAuthAccount>, AppError> {
        Ok(self
            .oauth_accounts()
            .find_one(
                doc! { "provider": provider.as_str(), "provider_id": provider_id },
                None,
            )
            .await?)
    }

    async fn create_oauth_account(&self, account: &OAuthAccount) -> Result<(), AppError> {
        match self.oauth_accounts().insert_one(account, None).await {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key(&e) => Err(AppError::Conflict(anyhow::anyhow!(
                "OAuth account is already linked"
            ))),
            Err(e) => Err(e.into()),
        }
    }

    async fn health_check(&self) -> Result<(), AppError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await?;
        Ok(())
    }
}
