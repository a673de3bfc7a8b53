//! User accounts and login sessions.
//!
//! Passwords are stored as Argon2id PHC strings. A login issues an opaque
//! token `ys_<prefix>_<secret>`; only the SHA-256 of the secret is persisted,
//! and lookups go by the prefix before a constant-time digest comparison.

use std::sync::Arc;
use std::time::Duration;

use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::application::repos::{
    CreateSessionParams, CreateUserParams, RepoError, SessionsRepo, UsersRepo,
};
use crate::domain::entities::UserRecord;
use crate::domain::validation::{FieldErrors, SignupInput, validate_login, validate_signup};

const TOKEN_TAG: &str = "ys";
const MIN_SECRET_LEN: usize = 32;

/// Form-wide errors are reported under this field name.
pub const NON_FIELD_ERRORS: &str = "__all__";

pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(14 * 24 * 60 * 60);

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("account form is invalid: {0}")]
    Invalid(FieldErrors),
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// A freshly issued login session.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub user: UserRecord,
    pub token: String,
    pub expires_at: OffsetDateTime,
}

#[derive(Clone)]
pub struct AccountService {
    users: Arc<dyn UsersRepo>,
    sessions: Arc<dyn SessionsRepo>,
    session_ttl: Duration,
}

impl AccountService {
    pub fn new(
        users: Arc<dyn UsersRepo>,
        sessions: Arc<dyn SessionsRepo>,
        session_ttl: Duration,
    ) -> Self {
        Self {
            users,
            sessions,
            session_ttl,
        }
    }

    pub fn session_ttl(&self) -> Duration {
        self.session_ttl
    }

    pub async fn signup(&self, input: &SignupInput<'_>) -> Result<UserRecord, AccountError> {
        let draft = validate_signup(input).map_err(AccountError::Invalid)?;

        if self.users.find_by_username(&draft.username).await?.is_some() {
            return Err(username_taken());
        }

        let password_hash = hash_password(&draft.password)?;
        let user = self
            .users
            .create_user(CreateUserParams {
                username: draft.username,
                email: draft.email,
                first_name: draft.first_name,
                last_name: draft.last_name,
                password_hash,
            })
            .await
            .map_err(|err| match err {
                RepoError::Duplicate { constraint } if constraint.contains("email") => {
                    AccountError::Invalid(FieldErrors::single(
                        "email",
                        "A user with that email address already exists.",
                    ))
                }
                RepoError::Duplicate { .. } => username_taken(),
                other => AccountError::Repo(other),
            })?;

        info!(target = "yatube::accounts", username = %user.username, "user registered");
        Ok(user)
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<IssuedSession, AccountError> {
        let (username, password) = validate_login(username, password).map_err(AccountError::Invalid)?;

        let credentials = match self.users.find_credentials(&username).await? {
            Some(credentials) if credentials.user.is_active => credentials,
            _ => return Err(bad_credentials()),
        };
        if !verify_password(&password, &credentials.password_hash) {
            warn!(target = "yatube::accounts", username = %username, "login rejected");
            return Err(bad_credentials());
        }

        let now = OffsetDateTime::now_utc();
        let purged = self.sessions.delete_expired_sessions(now).await?;
        if purged > 0 {
            debug!(target = "yatube::accounts", purged, "expired sessions removed");
        }

        let prefix = generate_prefix();
        let secret = generate_secret();
        let expires_at = now + self.session_ttl;
        self.sessions
            .create_session(CreateSessionParams {
                user_id: credentials.user.id,
                prefix: prefix.clone(),
                hashed_secret: hash_secret(&secret),
                expires_at,
            })
            .await?;

        info!(target = "yatube::accounts", username = %username, "login");
        Ok(IssuedSession {
            user: credentials.user,
            token: format!("{TOKEN_TAG}_{prefix}_{secret}"),
            expires_at,
        })
    }

    /// Resolve a session token to its active user. Malformed, unknown and
    /// expired tokens all yield `None`.
    pub async fn authenticate(&self, token: &str) -> Result<Option<UserRecord>, AccountError> {
        let Some(parsed) = parse_token(token) else {
            return Ok(None);
        };
        let Some(session) = self.sessions.find_session(&parsed.prefix).await? else {
            return Ok(None);
        };

        if session.expires_at <= OffsetDateTime::now_utc() {
            self.sessions.delete_session(&session.prefix).await?;
            return Ok(None);
        }
        if session
            .hashed_secret
            .ct_eq(&hash_secret(&parsed.secret))
            .unwrap_u8()
            == 0
        {
            return Ok(None);
        }

        Ok(self
            .users
            .find_by_id(session.user_id)
            .await?
            .filter(|user| user.is_active))
    }

    pub async fn logout(&self, token: &str) -> Result<(), AccountError> {
        if let Some(parsed) = parse_token(token) {
            self.sessions.delete_session(&parsed.prefix).await?;
        }
        Ok(())
    }
}

fn username_taken() -> AccountError {
    AccountError::Invalid(FieldErrors::single(
        "username",
        "A user with that username already exists.",
    ))
}

fn bad_credentials() -> AccountError {
    AccountError::Invalid(FieldErrors::single(
        NON_FIELD_ERRORS,
        "Please enter a correct username and password. Note that both fields may be case-sensitive.",
    ))
}

fn hash_password(password: &str) -> Result<String, AccountError> {
    let salt = SaltString::encode_b64(Uuid::new_v4().as_bytes())
        .map_err(|err| AccountError::Hash(err.to_string()))?;
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AccountError::Hash(err.to_string()))
}

fn verify_password(password: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

fn hash_secret(secret: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.finalize().to_vec()
}

fn generate_prefix() -> String {
    Uuid::new_v4().simple().to_string()[..12].to_string()
}

fn generate_secret() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

struct ParsedToken {
    prefix: String,
    secret: String,
}

fn parse_token(token: &str) -> Option<ParsedToken> {
    let mut parts = token.splitn(3, '_');
    if parts.next()? != TOKEN_TAG {
        return None;
    }
    let prefix = parts.next()?;
    let secret = parts.next()?;
    if prefix.is_empty() || secret.len() < MIN_SECRET_LEN {
        return None;
    }
    Some(ParsedToken {
        prefix: prefix.to_string(),
        secret: secret.to_string(),
    })
}
