//! Mock authentication.
//!
//! Credentials are never verified: any non-empty pair signs in as the demo
//! identity. The signed-in user is mirrored to a [`LocalStore`] so it can be
//! restored on the next start.

pub mod identity;

pub use identity::{LocalStore, LocalStoreError};

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::time::{sleep, Duration};
use tracing::{error, info};

const USER_KEY: &str = "user";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(rename = "profilePicture", skip_serializing_if = "Option::is_none", default)]
    pub profile_picture: Option<String>,
}

impl User {
    pub fn demo() -> Self {
        Self {
            id: "1".to_string(),
            name: "Jane Doe".to_string(),
            email: "jane@example.com".to_string(),
            profile_picture: Some(
                "https://images.pexels.com/photos/774909/pexels-photo-774909.jpeg?auto=compress&cs=tinysrgb&w=150"
                    .to_string(),
            ),
        }
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    EmptyCredentials,
    #[error("Missing required fields")]
    MissingFields,
    #[error("Passwords do not match")]
    PasswordMismatch,
    #[error("Password must be at least 8 characters long")]
    PasswordTooShort,
    #[error("could not persist identity: {0}")]
    Storage(#[from] LocalStoreError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "user", rename_all = "lowercase")]
pub enum AuthState {
    Anonymous,
    Loading,
    Authenticated(User),
}

/// Form-level checks run before a registration is submitted.
pub fn validate_registration(password: &str, confirm_password: &str) -> Result<(), AuthError> {
    if password != confirm_password {
        return Err(AuthError::PasswordMismatch);
    }
    if password.chars().count() < 8 {
        return Err(AuthError::PasswordTooShort);
    }
    Ok(())
}

/// 0..=4: one point each for length >= 8, an uppercase letter, a digit and
/// a symbol.
pub fn password_strength(password: &str) -> u8 {
    let checks = [
        password.chars().count() >= 8,
        password.chars().any(|c| c.is_ascii_uppercase()),
        password.chars().any(|c| c.is_ascii_digit()),
        password.chars().any(|c| !c.is_ascii_alphanumeric()),
    ];
    checks.iter().filter(|&&ok| ok).count() as u8
}

pub struct AuthService {
    state: Mutex<AuthState>,
    store: Arc<LocalStore>,
    delay: Duration,
}

impl AuthService {
    /// Starts in the loading state until [`AuthService::restore`] runs.
    pub fn new(store: Arc<LocalStore>, delay: Duration) -> Self {
        Self {
            state: Mutex::new(AuthState::Loading),
            store,
            delay,
        }
    }

    pub fn store(&self) -> &Arc<LocalStore> {
        &self.store
    }

    pub fn state(&self) -> AuthState {
        self.state.lock().map(|s| s.clone()).unwrap_or(AuthState::Anonymous)
    }

    pub fn current_user(&self) -> Option<User> {
        match self.state() {
            AuthState::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    fn set_state(&self, next: AuthState) {
        if let Ok(mut state) = self.state.lock() {
            *state = next;
        }
    }

    /// Reloads a previously persisted identity after the artificial delay.
    pub async fn restore(&self) -> AuthState {
        self.set_state(AuthState::Loading);
        sleep(self.delay).await;

        let next = match self.store.get::<User>(USER_KEY) {
            Ok(Some(user)) => {
                info!(user_id = %user.id, "restored stored identity");
                AuthState::Authenticated(user)
            }
            Ok(None) => AuthState::Anonymous,
            Err(e) => {
                error!("Error checking user session: {}", e);
                AuthState::Anonymous
            }
        };
        self.set_state(next.clone());
        next
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let previous = self.state();
        self.set_state(AuthState::Loading);
        sleep(self.delay).await;

        if email.is_empty() || password.is_empty() {
            self.set_state(previous);
            error!("Login error: empty credentials");
            return Err(AuthError::EmptyCredentials);
        }

        self.sign_in(User::demo(), previous)
    }

    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<User, AuthError> {
        let previous = self.state();
        self.set_state(AuthState::Loading);
        sleep(self.delay).await;

        if name.is_empty() || email.is_empty() || password.is_empty() {
            self.set_state(previous);
            error!("Registration error: missing required fields");
            return Err(AuthError::MissingFields);
        }

        let user = User {
            name: name.to_string(),
            email: email.to_string(),
            ..User::demo()
        };
        self.sign_in(user, previous)
    }

    fn sign_in(&self, user: User, previous: AuthState) -> Result<User, AuthError> {
        if let Err(e) = self.store.set(USER_KEY, &user) {
            self.set_state(previous);
            return Err(e.into());
        }
        info!(user_id = %user.id, "signed in");
        self.set_state(AuthState::Authenticated(user.clone()));
        Ok(user)
    }

    /// Signs out and wipes local storage, saved profile included.
    pub fn logout(&self) -> Result<(), AuthError> {
        self.set_state(AuthState::Anonymous);
        self.store.clear()?;
        info!("signed out");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(store: Arc<LocalStore>) -> AuthService {
        AuthService::new(store, Duration::from_millis(1000))
    }

    #[tokio::test(start_paused = true)]
    async fn empty_credentials_are_rejected() {
        let auth = service(Arc::new(LocalStore::in_memory()));
        auth.restore().await;

        assert!(matches!(auth.login("", "secret").await, Err(AuthError::EmptyCredentials)));
        assert!(matches!(auth.login("a@b.c", "").await, Err(AuthError::EmptyCredentials)));
        assert_eq!(auth.state(), AuthState::Anonymous);
        assert!(auth.store().get::<User>(USER_KEY).unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn login_waits_then_persists_demo_identity() {
        let store = Arc::new(LocalStore::in_memory());
        let auth = Arc::new(service(store.clone()));
        auth.restore().await;

        let pending = tokio::spawn({
            let auth = auth.clone();
            async move { auth.login("anyone@example.com", "whatever").await }
        });
        tokio::task::yield_now().await;
        assert_eq!(auth.state(), AuthState::Loading);

        let user = pending.await.unwrap().unwrap();
        assert_eq!(user, User::demo());
        assert_eq!(auth.current_user(), Some(User::demo()));

        let restored = service(store);
        assert_eq!(restored.restore().await, AuthState::Authenticated(User::demo()));
    }

    #[tokio::test(start_paused = true)]
    async fn register_uses_supplied_name_and_email() {
        let auth = service(Arc::new(LocalStore::in_memory()));
        let user = auth.register("Sam", "sam@example.com", "longenough").await.unwrap();
        assert_eq!(user.name, "Sam");
        assert_eq!(user.email, "sam@example.com");
        assert_eq!(user.id, "1");

        assert!(matches!(auth.register("", "x@y.z", "pw").await, Err(AuthError::MissingFields)));
        assert_eq!(auth.current_user().map(|u| u.name), Some("Sam".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn logout_clears_identity() {
        let store = Arc::new(LocalStore::in_memory());
        let auth = service(store.clone());
        auth.login("a@b.c", "pw").await.unwrap();
        auth.logout().unwrap();

        assert_eq!(auth.state(), AuthState::Anonymous);
        assert_eq!(service(store).restore().await, AuthState::Anonymous);
    }

    #[tokio::test(start_paused = true)]
    async fn logout_forgets_the_saved_profile() {
        use crate::profile::ProfileEditor;

        let store = Arc::new(LocalStore::in_memory());
        let auth = service(store.clone());
        let jane = auth.login("jane@example.com", "pw").await.unwrap();

        let mut editor = ProfileEditor::load(&store, &jane).unwrap();
        editor.begin_edit();
        editor.set_field("medicalHistory", "panic disorder").unwrap();
        editor.submit(&store).unwrap();
        auth.logout().unwrap();

        let sam = auth.register("Sam", "sam@example.com", "longenough").await.unwrap();
        let profile = ProfileEditor::load(&store, &sam).unwrap();
        assert_eq!(profile.current().full_name, "Sam");
        assert_eq!(profile.current().email, "sam@example.com");
        assert_eq!(profile.current().medical_history, "");
    }

    #[test]
    fn registration_form_rules() {
        assert!(matches!(validate_registration("abcdefgh", "abcdefgX"), Err(AuthError::PasswordMismatch)));
        assert!(matches!(validate_registration("short", "short"), Err(AuthError::PasswordTooShort)));
        assert!(validate_registration("abcdefgh", "abcdefgh").is_ok());
    }

    #[test]
    fn strength_counts_each_rule_once() {
        assert_eq!(password_strength(""), 0);
        assert_eq!(password_strength("abcdefgh"), 1);
        assert_eq!(password_strength("Abcdefgh"), 2);
        assert_eq!(password_strength("Abcdefg1"), 3);
        assert_eq!(password_strength("Abcdef1!"), 4);
        assert_eq!(password_strength("A1!"), 3);
    }
}
