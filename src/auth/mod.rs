//! Local account service
//!
//! Accounts live in the key-value store as a single JSON list. The signed-in
//! user is remembered by id under a session key, and each account's
//! conversations are stored under a key derived from its email. Passwords
//! are kept only as SHA-256 digests.

pub mod validation;

use crate::chat::quota::UsageLimiter;
use crate::error::{Result, WestlineError};
use crate::models::{Conversation, User};
use crate::storage::{keys, read_json, write_json, KeyValueStore};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;

/// Third-party sign-in providers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthProvider {
    /// Google
    Google,
}

impl AuthProvider {
    /// Parse a provider name
    pub fn parse_str(s: &str) -> std::result::Result<Self, String> {
        match s.to_lowercase().as_str() {
            "google" => Ok(Self::Google),
            other => Err(format!("Unknown auth provider: {}", other)),
        }
    }
}

impl fmt::Display for AuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Google => write!(f, "Google"),
        }
    }
}

/// Hex SHA-256 digest of a password
///
/// # Examples
///
/// ```
/// use westline::auth::hash_password;
///
/// let digest = hash_password("secret1");
/// assert_eq!(digest.len(), 64);
/// assert_eq!(digest, hash_password("secret1"));
/// ```
pub fn hash_password(password: &str) -> String {
    let digest = Sha256::digest(password.as_bytes());
    format!("{digest:x}")
}

/// Account and per-account data access
pub struct AuthService {
    store: Arc<dyn KeyValueStore>,
    limiter: UsageLimiter,
}

impl AuthService {
    /// Create a service over `store`, resetting usage windows with `limiter`
    pub fn new(store: Arc<dyn KeyValueStore>, limiter: UsageLimiter) -> Self {
        Self { store, limiter }
    }

    /// The usage limiter applied on sign-in
    pub fn limiter(&self) -> &UsageLimiter {
        &self.limiter
    }

    /// The backing store
    pub fn store(&self) -> Arc<dyn KeyValueStore> {
        Arc::clone(&self.store)
    }

    fn users(&self) -> Result<Vec<User>> {
        Ok(read_json(self.store.as_ref(), keys::USERS)?.unwrap_or_default())
    }

    fn save_users(&self, users: &[User]) -> Result<()> {
        write_json(self.store.as_ref(), keys::USERS, users)
    }

    fn set_session(&self, user: &User) -> Result<()> {
        write_json(self.store.as_ref(), keys::SESSION_USER, &user.id)
    }

    /// Find an account by email (case-insensitive)
    pub fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let wanted = email.trim().to_lowercase();
        Ok(self
            .users()?
            .into_iter()
            .find(|u| u.email.to_lowercase() == wanted))
    }

    /// Reset an expired usage window, persisting the change
    fn refresh_usage(&self, mut user: User, now: DateTime<Utc>) -> Result<User> {
        if self.limiter.refresh_window(&mut user, now) {
            self.update_user(&user)?;
        }
        Ok(user)
    }

    /// Create an account and sign it in
    ///
    /// # Errors
    ///
    /// Returns `AccountExists` if the email is already registered
    pub fn sign_up(
        &self,
        name: &str,
        email: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<User> {
        let mut users = self.users()?;
        let wanted = email.trim().to_lowercase();
        if users.iter().any(|u| u.email.to_lowercase() == wanted) {
            return Err(WestlineError::AccountExists.into());
        }

        let mut user = User::new(name.trim(), email.trim(), now);
        user.password_hash = Some(hash_password(password));
        users.push(user.clone());
        self.save_users(&users)?;
        self.set_session(&user)?;

        tracing::info!("Created account for {}", user.email);
        Ok(user)
    }

    /// Sign in with email and password
    ///
    /// Accounts created before passwords were stored accept any password.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCredentials` for an unknown email or wrong password
    pub fn login(&self, email: &str, password: &str, now: DateTime<Utc>) -> Result<User> {
        let Some(user) = self.find_by_email(email)? else {
            tracing::debug!("Login failed: no account for {}", email);
            return Err(WestlineError::InvalidCredentials.into());
        };

        if let Some(expected) = &user.password_hash {
            if *expected != hash_password(password) {
                tracing::debug!("Login failed: wrong password for {}", email);
                return Err(WestlineError::InvalidCredentials.into());
            }
        }

        let user = self.refresh_usage(user, now)?;
        self.set_session(&user)?;
        tracing::info!("Signed in {}", user.email);
        Ok(user)
    }

    /// Sign in through a provider, creating the account on first use
    ///
    /// An existing account takes the provider's name if it changed.
    pub fn sign_in_with_provider(
        &self,
        provider: AuthProvider,
        name: &str,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<User> {
        let mut users = self.users()?;
        let wanted = email.trim().to_lowercase();

        let user = match users.iter_mut().find(|u| u.email.to_lowercase() == wanted) {
            Some(existing) => {
                if existing.name != name.trim() {
                    existing.name = name.trim().to_string();
                    let updated = existing.clone();
                    self.save_users(&users)?;
                    updated
                } else {
                    existing.clone()
                }
            }
            None => {
                let user = User::new(name.trim(), email.trim(), now);
                users.push(user.clone());
                self.save_users(&users)?;
                tracing::info!("Created {} account for {}", provider, user.email);
                user
            }
        };

        let user = self.refresh_usage(user, now)?;
        self.set_session(&user)?;
        tracing::info!("Signed in {} with {}", user.email, provider);
        Ok(user)
    }

    /// Record a password reset request
    ///
    /// There is no mail delivery; the request is only logged. The result is
    /// the same whether or not the account exists.
    pub fn request_password_reset(&self, email: &str) -> Result<()> {
        let exists = self.find_by_email(email)?.is_some();
        tracing::info!(
            "Password reset requested for {} (account exists: {})",
            email,
            exists
        );
        Ok(())
    }

    /// Forget the signed-in user
    pub fn logout(&self) -> Result<()> {
        self.store.remove(keys::SESSION_USER)?;
        tracing::info!("Signed out");
        Ok(())
    }

    /// The signed-in user, with an expired usage window reset
    pub fn current_user(&self, now: DateTime<Utc>) -> Result<Option<User>> {
        let Some(user_id) = read_json::<String>(self.store.as_ref(), keys::SESSION_USER)? else {
            return Ok(None);
        };
        let Some(user) = self.users()?.into_iter().find(|u| u.id == user_id) else {
            tracing::warn!("Session points at unknown user {}, clearing it", user_id);
            self.store.remove(keys::SESSION_USER)?;
            return Ok(None);
        };
        Ok(Some(self.refresh_usage(user, now)?))
    }

    /// Replace the stored record with the same id
    ///
    /// Unknown ids are ignored.
    pub fn update_user(&self, user: &User) -> Result<()> {
        let mut users = self.users()?;
        match users.iter_mut().find(|u| u.id == user.id) {
            Some(slot) => {
                *slot = user.clone();
                self.save_users(&users)
            }
            None => {
                tracing::warn!("Ignoring update for unknown user {}", user.id);
                Ok(())
            }
        }
    }

    /// Stored conversations for an account
    pub fn conversations_for_user(&self, email: &str) -> Result<Vec<Conversation>> {
        Ok(read_json(self.store.as_ref(), &keys::conversations(email))?.unwrap_or_default())
    }

    /// Replace the stored conversations for an account
    pub fn save_conversations_for_user(
        &self,
        email: &str,
        conversations: &[Conversation],
    ) -> Result<()> {
        write_json(
            self.store.as_ref(),
            &keys::conversations(email),
            conversations,
        )
    }
}
