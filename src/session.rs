//! Session controller: screen routing, the signed-in user and their
//! conversation list
//!
//! The controller is the single owner of session state. It starts on the
//! splash screen, restores a persisted session on [`SessionController::init`],
//! routes between the sign-in screens, and tears everything down again on
//! [`SessionController::dispose`]. User record changes go through
//! [`SessionController::mutate_user`] so they are always persisted.

use crate::auth::validation::{
    validate_forgot_password, validate_login, validate_sign_up, validate_social, RESET_LINK_NOTICE,
};
use crate::auth::{AuthProvider, AuthService};
use crate::chat::quota::QuotaDecision;
use crate::chat::store::ConversationStore;
use crate::error::{Result, WestlineError};
use crate::models::{QuotaKind, User};
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Screens of the application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    /// Brief branded start screen
    Splash,
    /// Landing screen for signed-out users
    Welcome,
    /// Email and password sign-in
    Login,
    /// Account creation
    SignUp,
    /// Password reset request
    ForgotPassword,
    /// Signed in; the chat is available
    Authenticated,
}

impl fmt::Display for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Splash => "splash",
            Self::Welcome => "welcome",
            Self::Login => "login",
            Self::SignUp => "signup",
            Self::ForgotPassword => "forgot-password",
            Self::Authenticated => "authenticated",
        };
        write!(f, "{}", name)
    }
}

impl Screen {
    /// True if the user may navigate from `self` to `to`
    ///
    /// Reaching [`Screen::Authenticated`] and leaving it happen only through
    /// sign-in and logout, never through plain navigation.
    ///
    /// # Examples
    ///
    /// ```
    /// use westline::session::Screen;
    ///
    /// assert!(Screen::Welcome.can_navigate_to(Screen::Login));
    /// assert!(!Screen::ForgotPassword.can_navigate_to(Screen::SignUp));
    /// ```
    pub fn can_navigate_to(self, to: Screen) -> bool {
        use Screen::*;
        matches!(
            (self, to),
            (Welcome, Login)
                | (Welcome, SignUp)
                | (Login, SignUp)
                | (Login, ForgotPassword)
                | (Login, Welcome)
                | (SignUp, Login)
                | (SignUp, Welcome)
                | (ForgotPassword, Login)
        )
    }

    /// True if a sign-in of this kind may complete from `self`
    fn accepts_sign_in(self, social: bool) -> bool {
        match self {
            Screen::Login | Screen::SignUp => true,
            Screen::Welcome => social,
            _ => false,
        }
    }
}

/// Owner of the signed-in session
pub struct SessionController {
    auth: Arc<AuthService>,
    splash_delay: Duration,
    screen: Screen,
    user: Option<User>,
    conversations: Option<ConversationStore>,
}

impl SessionController {
    /// Create a controller on the splash screen
    pub fn new(auth: Arc<AuthService>, splash_delay: Duration) -> Self {
        Self {
            auth,
            splash_delay,
            screen: Screen::Splash,
            user: None,
            conversations: None,
        }
    }

    /// The account service
    pub fn auth(&self) -> &Arc<AuthService> {
        &self.auth
    }

    /// Current screen
    pub fn screen(&self) -> Screen {
        self.screen
    }

    /// Signed-in user, if any
    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    /// Signed-in user
    ///
    /// # Errors
    ///
    /// Returns `NotAuthenticated` when nobody is signed in
    pub fn require_user(&self) -> Result<&User> {
        self.user
            .as_ref()
            .ok_or_else(|| WestlineError::NotAuthenticated.into())
    }

    /// The signed-in user's conversations
    pub fn conversations(&self) -> Result<&ConversationStore> {
        self.conversations
            .as_ref()
            .ok_or_else(|| WestlineError::NotAuthenticated.into())
    }

    /// The signed-in user's conversations, mutably
    pub fn conversations_mut(&mut self) -> Result<&mut ConversationStore> {
        self.conversations
            .as_mut()
            .ok_or_else(|| WestlineError::NotAuthenticated.into())
    }

    /// Wait out the splash delay, then restore the session
    pub async fn boot(&mut self) -> Result<Screen> {
        if !self.splash_delay.is_zero() {
            tokio::time::sleep(self.splash_delay).await;
        }
        self.init(Utc::now())
    }

    /// Leave the splash screen, restoring a persisted session if one exists
    ///
    /// # Returns
    ///
    /// The screen the session resolved to
    pub fn init(&mut self, now: DateTime<Utc>) -> Result<Screen> {
        if self.screen != Screen::Splash {
            return Err(self.rejected(Screen::Authenticated));
        }
        match self.auth.current_user(now)? {
            Some(user) => {
                tracing::info!("Restored session for {}", user.email);
                self.establish(user)?;
            }
            None => {
                tracing::debug!("No stored session");
                self.screen = Screen::Welcome;
            }
        }
        Ok(self.screen)
    }

    /// Move to another signed-out screen
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` for any move outside the routing table
    pub fn navigate(&mut self, to: Screen) -> Result<()> {
        if !self.screen.can_navigate_to(to) {
            return Err(self.rejected(to));
        }
        tracing::debug!("Navigate {} -> {}", self.screen, to);
        self.screen = to;
        Ok(())
    }

    fn rejected(&self, to: Screen) -> anyhow::Error {
        WestlineError::InvalidTransition {
            from: self.screen.to_string(),
            to: to.to_string(),
        }
        .into()
    }

    fn ensure_sign_in_allowed(&self, social: bool) -> Result<()> {
        if self.screen.accepts_sign_in(social) {
            Ok(())
        } else {
            Err(self.rejected(Screen::Authenticated))
        }
    }

    fn establish(&mut self, user: User) -> Result<&User> {
        let store = ConversationStore::load(Arc::clone(&self.auth), &user.email)?;
        self.conversations = Some(store);
        self.screen = Screen::Authenticated;
        Ok(self.user.insert(user))
    }

    /// Sign in from the login screen
    ///
    /// # Errors
    ///
    /// `Validation` for an incomplete form, `InvalidCredentials` when the
    /// account check fails, `InvalidTransition` off the login screen
    pub fn login(&mut self, email: &str, password: &str, now: DateTime<Utc>) -> Result<&User> {
        if self.screen != Screen::Login {
            return Err(self.rejected(Screen::Authenticated));
        }
        validate_login(email, password).map_err(WestlineError::Validation)?;
        let user = self.auth.login(email, password, now)?;
        self.establish(user)
    }

    /// Create an account from the sign-up screen
    pub fn sign_up(
        &mut self,
        name: &str,
        email: &str,
        password: &str,
        confirm_password: &str,
        now: DateTime<Utc>,
    ) -> Result<&User> {
        if self.screen != Screen::SignUp {
            return Err(self.rejected(Screen::Authenticated));
        }
        validate_sign_up(name, email, password, confirm_password)
            .map_err(WestlineError::Validation)?;
        let user = self.auth.sign_up(name, email, password, now)?;
        self.establish(user)
    }

    /// Complete a provider sign-in with the details the user confirmed
    pub fn sign_in_with_provider(
        &mut self,
        provider: AuthProvider,
        name: &str,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<&User> {
        self.ensure_sign_in_allowed(true)?;
        validate_social(name, email).map_err(WestlineError::Validation)?;
        let user = self.auth.sign_in_with_provider(provider, name, email, now)?;
        self.establish(user)
    }

    /// Request a password reset link
    ///
    /// # Returns
    ///
    /// The notice to show, identical whether or not the account exists
    pub fn forgot_password(&mut self, email: &str) -> Result<&'static str> {
        if self.screen != Screen::ForgotPassword {
            return Err(self.rejected(Screen::ForgotPassword));
        }
        validate_forgot_password(email).map_err(WestlineError::Validation)?;
        self.auth.request_password_reset(email)?;
        Ok(RESET_LINK_NOTICE)
    }

    /// Change the signed-in user's record and persist it
    ///
    /// # Returns
    ///
    /// Whatever `f` returns
    pub fn mutate_user<R>(&mut self, f: impl FnOnce(&mut User) -> R) -> Result<R> {
        let user = self
            .user
            .as_mut()
            .ok_or(WestlineError::NotAuthenticated)?;
        let result = f(user);
        self.auth.update_user(user)?;
        Ok(result)
    }

    /// Check and consume quota for a metered action
    ///
    /// The user record is persisted whenever the check changed it.
    pub fn consume_quota(&mut self, kind: QuotaKind, now: DateTime<Utc>) -> Result<QuotaDecision> {
        let user = self
            .user
            .as_mut()
            .ok_or(WestlineError::NotAuthenticated)?;
        let before = user.clone();
        let decision = self.auth.limiter().check_and_consume(user, kind, now);
        if *user != before {
            self.auth.update_user(user)?;
        }
        Ok(decision)
    }

    /// Sign out and drop all session state
    pub fn dispose(&mut self) -> Result<()> {
        if self.screen != Screen::Authenticated {
            return Err(self.rejected(Screen::Welcome));
        }
        if let Some(mut store) = self.conversations.take() {
            store.cancel_streams();
        }
        self.user = None;
        self.auth.logout()?;
        self.screen = Screen::Welcome;
        Ok(())
    }
}
