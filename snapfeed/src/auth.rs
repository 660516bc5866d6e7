//! Identity and session.
//!
//! The auth provider is an external collaborator; snapfeed only needs the
//! capability contract below. Services receive the acting principal
//! explicitly through a [`Session`] instead of reading ambient state.

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;

use crate::{errors::FeedError, id::generate_record_id, validators::is_valid_email};

/// An authenticated identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub uid: String,
    pub email: String,
}

/// Explicit session value passed into operations that act on behalf of a user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    principal: Option<Principal>,
}

impl Session {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated(principal: Principal) -> Self {
        Self {
            principal: Some(principal),
        }
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    /// The acting principal, or `Unauthenticated`.
    pub fn require(&self) -> Result<&Principal, FeedError> {
        self.principal.as_ref().ok_or(FeedError::Unauthenticated)
    }
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Principal, FeedError>;

    async fn sign_up(&self, email: &str, password: &str) -> Result<Principal, FeedError>;

    async fn sign_out(&self) -> Result<(), FeedError>;

    async fn current_principal(&self) -> Option<Principal>;
}

struct Account {
    principal: Principal,
    password: String,
}

#[derive(Default)]
struct AuthState {
    accounts: HashMap<String, Account>,
    current: Option<Principal>,
}

/// In-process [`AuthProvider`] for tests and local runs. Credentials live in memory only.
#[derive(Default)]
pub struct MemoryAuth {
    state: Mutex<AuthState>,
}

impl MemoryAuth {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, AuthState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

#[async_trait]
impl AuthProvider for MemoryAuth {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Principal, FeedError> {
        let mut state = self.state();
        let principal = match state.accounts.get(&normalize_email(email)) {
            Some(account) if account.password == password => account.principal.clone(),
            _ => return Err(FeedError::Unauthenticated),
        };
        state.current = Some(principal.clone());
        Ok(principal)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Principal, FeedError> {
        if !is_valid_email(email) {
            return Err(FeedError::invalid(format!("'{email}' is not a valid email address")));
        }
        if password.len() < 6 {
            return Err(FeedError::invalid("password must be at least 6 characters"));
        }
        let key = normalize_email(email);
        let mut state = self.state();
        if state.accounts.contains_key(&key) {
            return Err(FeedError::invalid("email already registered"));
        }
        let principal = Principal {
            uid: generate_record_id(),
            email: key.clone(),
        };
        state.accounts.insert(
            key,
            Account {
                principal: principal.clone(),
                password: password.to_string(),
            },
        );
        state.current = Some(principal.clone());
        Ok(principal)
    }

    async fn sign_out(&self) -> Result<(), FeedError> {
        self.state().current = None;
        Ok(())
    }

    async fn current_principal(&self) -> Option<Principal> {
        self.state().current.clone()
    }
}
