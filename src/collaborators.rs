//! External collaborators the core depends on only through traits:
//! credential checking and outbound notifications. The lifecycle code sees
//! a success/failure signal, never a concrete provider.

use chrono::Utc;
use dashmap::DashMap;

use crate::error::AppError;
use crate::models::user::UserAccount;

pub trait CredentialStore: Send + Sync {
    fn register(&self, email: &str, password: &str, role: &str) -> Result<UserAccount, AppError>;
    fn verify(&self, email: &str, password: &str) -> bool;
    fn get(&self, email: &str) -> Option<UserAccount>;
    fn count(&self) -> usize;
}

pub trait Notifier: Send + Sync {
    fn notify(&self, recipient: &str, subject: &str, message: &str);
}

/// In-memory account store with the original system's plaintext credential
/// check. Good enough for a collaborator stub; a real deployment swaps the
/// trait impl.
#[derive(Default)]
pub struct InMemoryCredentialStore {
    accounts: DashMap<String, UserAccount>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for InMemoryCredentialStore {
    fn register(&self, email: &str, password: &str, role: &str) -> Result<UserAccount, AppError> {
        if email.trim().is_empty() || !email.contains('@') {
            return Err(AppError::InvalidInput(format!(
                "invalid email: {email:?}"
            )));
        }
        if password.is_empty() {
            return Err(AppError::InvalidInput(
                "password cannot be empty".to_string(),
            ));
        }
        if self.accounts.contains_key(email) {
            return Err(AppError::Conflict(format!(
                "account {email} already exists"
            )));
        }

        let account = UserAccount {
            email: email.to_string(),
            password: password.to_string(),
            role: role.to_string(),
            created_at: Utc::now(),
        };
        self.accounts.insert(account.email.clone(), account.clone());
        Ok(account)
    }

    fn verify(&self, email: &str, password: &str) -> bool {
        self.accounts
            .get(email)
            .map(|account| account.password == password)
            .unwrap_or(false)
    }

    fn get(&self, email: &str) -> Option<UserAccount> {
        self.accounts.get(email).map(|entry| entry.value().clone())
    }

    fn count(&self) -> usize {
        self.accounts.len()
    }
}

/// Notifier that writes to the log instead of an email/SMS provider.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, recipient: &str, subject: &str, message: &str) {
        tracing::info!(recipient, subject, message, "notification sent");
    }
}
