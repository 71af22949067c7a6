/*!
 * # Authentication and Authorization Module
 *
 * Credential verification and personal access token management. Tokens
 * are opaque random strings; only their SHA-256 digest is stored, so a
 * token is revoked by deleting its row. Role checks (customer vs admin)
 * live here as well.
 */

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use sea_orm::{ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, QueryFilter};
use sha2::{Digest, Sha256};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::{access_token, user, AccessToken, User, UserModel};
use crate::errors::ServiceError;
use crate::AppState;

const TOKEN_LENGTH: usize = 48;

/// Issues, resolves and revokes personal access tokens and verifies
/// passwords against their stored hashes.
#[derive(Clone)]
pub struct AuthService {
    db: DbPool,
}

impl AuthService {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    /// Verifies the credentials and returns the matching account.
    /// The failure is deliberately identical for an unknown email and a
    /// wrong password.
    #[instrument(skip(self, password))]
    pub async fn authenticate(
        &self,
        email: &str,
        password: &str,
    ) -> Result<UserModel, ServiceError> {
        let account = User::find()
            .filter(user::Column::Email.eq(email))
            .one(&self.db)
            .await?;

        let Some(account) = account else {
            return Err(ServiceError::invalid_credentials());
        };

        if !verify_password(&account.password_hash, password) {
            return Err(ServiceError::invalid_credentials());
        }

        Ok(account)
    }

    /// Issues a new token for the account and returns its plain form.
    /// The plain token is shown to the caller exactly once.
    #[instrument(skip(self))]
    pub async fn issue_token(&self, user_id: Uuid, name: &str) -> Result<String, ServiceError> {
        let plain: String = thread_rng()
            .sample_iter(&Alphanumeric)
            .take(TOKEN_LENGTH)
            .map(char::from)
            .collect();

        let token = access_token::ActiveModel {
            user_id: Set(user_id),
            token_hash: Set(digest(&plain)),
            name: Set(name.to_string()),
            last_used_at: Set(None),
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        let token = token.insert(&self.db).await?;

        debug!(token_id = token.id, %user_id, "issued access token");
        Ok(plain)
    }

    /// Resolves a bearer token to its account, touching `last_used_at`.
    pub async fn resolve_token(&self, plain: &str) -> Result<AuthUser, ServiceError> {
        let token = AccessToken::find()
            .filter(access_token::Column::TokenHash.eq(digest(plain)))
            .one(&self.db)
            .await?
            .ok_or_else(|| ServiceError::unauthenticated("Unauthenticated."))?;

        let account = User::find_by_id(token.user_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| ServiceError::unauthenticated("Unauthenticated."))?;

        let mut touch: access_token::ActiveModel = token.clone().into();
        touch.last_used_at = Set(Some(Utc::now()));
        touch.update(&self.db).await?;

        Ok(AuthUser {
            user: account,
            token_id: token.id,
        })
    }

    /// Revokes a single token. Revoking an already-deleted token is not
    /// an error.
    #[instrument(skip(self))]
    pub async fn revoke_token(&self, token_id: i64) -> Result<(), ServiceError> {
        AccessToken::delete_by_id(token_id).exec(&self.db).await?;
        Ok(())
    }

    /// Revokes every token issued to the account.
    #[instrument(skip(self))]
    pub async fn revoke_all_tokens(&self, user_id: Uuid) -> Result<u64, ServiceError> {
        let result = AccessToken::delete_many()
            .filter(access_token::Column::UserId.eq(user_id))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }
}

fn digest(plain: &str) -> String {
    hex::encode(Sha256::digest(plain.as_bytes()))
}

/// Hashes a password with Argon2id and a fresh salt.
pub fn hash_password(password: &str) -> Result<String, ServiceError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| ServiceError::Internal(format!("password hashing failed: {err}")))
}

/// Verifies a password against a stored Argon2 hash. An unparsable
/// stored hash counts as a mismatch.
pub fn verify_password(stored: &str, password: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// The account behind the current request, extracted from the bearer
/// token. Rejects with 401 when the header is missing or the token does
/// not resolve.
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user: UserModel,
    pub token_id: i64,
}

impl AuthUser {
    pub fn id(&self) -> Uuid {
        self.user.id
    }

    pub fn is_admin(&self) -> bool {
        self.user.role.is_admin()
    }

    /// Admin-only gate for management endpoints.
    pub fn require_admin(&self) -> Result<(), ServiceError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(ServiceError::forbidden(
                "Unauthorized. Admin access required.",
            ))
        }
    }

    /// Owner-or-admin gate for per-account resources.
    pub fn require_self_or_admin(&self, owner: Uuid) -> Result<(), ServiceError> {
        if self.id() == owner || self.is_admin() {
            Ok(())
        } else {
            Err(ServiceError::forbidden("This action is unauthorized."))
        }
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        let token = bearer_token(parts)
            .ok_or_else(|| ServiceError::unauthenticated("Unauthenticated."))?;
        state.auth.resolve_token(&token).await
    }
}

/// An authenticated admin account. Same extraction as [`AuthUser`] with
/// the role check folded in, rejecting with 403 for non-admins.
#[derive(Clone, Debug)]
pub struct AdminUser(pub AuthUser);

impl<S> FromRequestParts<S> for AdminUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        user.require_admin()?;
        Ok(AdminUser(user))
    }
}

fn bearer_token(parts: &Parts) -> Option<String> {
    let value = parts.headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    value
        .strip_prefix("Bearer ")
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}
