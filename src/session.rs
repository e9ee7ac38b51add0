//! Credential state shared by every request.
//!
//! The access token is cached in memory and written through to the store; the
//! refresh token is only ever read from the store. Refreshes run under
//! `refresh_gate` so concurrent 401s do not race each other.

use crate::api::models::{TokenPair, UserRecord};
use crate::error::{ClientError, Result};
use crate::storage::{SqliteStore, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY};
use log::{info, warn};
use std::sync::RwLock;
use tokio::sync::{watch, Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    SignedOut,
    Active,
    /// Refresh failed; the shell must send the user to sign-in.
    Expired,
}

pub struct Session {
    store: SqliteStore,
    access: RwLock<Option<String>>,
    refresh_gate: Mutex<()>,
    status: watch::Sender<SessionStatus>,
}

impl Session {
    pub fn new(store: SqliteStore) -> Result<Self> {
        let access = store.get(ACCESS_TOKEN_KEY)?;
        let initial = if access.is_some() {
            SessionStatus::Active
        } else {
            SessionStatus::SignedOut
        };
        let (status, _) = watch::channel(initial);
        Ok(Self {
            store,
            access: RwLock::new(access),
            refresh_gate: Mutex::new(()),
            status,
        })
    }

    /// Token to attach to a request being dispatched right now.
    pub fn access_token(&self) -> Option<String> {
        self.access.read().ok().and_then(|guard| guard.clone())
    }

    pub fn refresh_token(&self) -> Option<String> {
        match self.store.get(REFRESH_TOKEN_KEY) {
            Ok(token) => token.filter(|t| !t.is_empty()),
            Err(err) => {
                warn!("could not read refresh token: {}", err);
                None
            }
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.access_token().is_some()
    }

    pub fn status(&self) -> SessionStatus {
        *self.status.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }

    pub fn sign_in(&self, tokens: &TokenPair) -> Result<()> {
        self.store.set(REFRESH_TOKEN_KEY, &tokens.refresh)?;
        self.replace_access(&tokens.access)?;
        self.status.send_replace(SessionStatus::Active);
        info!("session started");
        Ok(())
    }

    /// Becomes the bearer for every request dispatched after this call.
    pub fn replace_access(&self, access: &str) -> Result<()> {
        self.store.set(ACCESS_TOKEN_KEY, access)?;
        let mut guard = self
            .access
            .write()
            .map_err(|_| ClientError::Storage("access token lock poisoned".into()))?;
        *guard = Some(access.to_string());
        Ok(())
    }

    pub fn rotate_refresh(&self, refresh: &str) -> Result<()> {
        self.store.set(REFRESH_TOKEN_KEY, refresh)
    }

    pub fn remember_user(&self, user: &UserRecord) -> Result<()> {
        let json = serde_json::to_string(user)?;
        self.store.set(USER_KEY, &json)
    }

    pub fn current_user(&self) -> Option<UserRecord> {
        let raw = self.store.get(USER_KEY).ok().flatten()?;
        serde_json::from_str(&raw).ok()
    }

    pub fn sign_out(&self) -> Result<()> {
        self.clear_credentials();
        self.store.remove(USER_KEY)?;
        self.status.send_replace(SessionStatus::SignedOut);
        info!("signed out");
        Ok(())
    }

    /// Drops both tokens and tells observers the session is over.
    pub fn expire(&self, reason: &str) {
        self.clear_credentials();
        self.status.send_replace(SessionStatus::Expired);
        warn!("session expired: {}", reason);
    }

    fn clear_credentials(&self) {
        if let Ok(mut guard) = self.access.write() {
            *guard = None;
        }
        if let Err(err) = self.store.remove_all(&[ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY]) {
            warn!("could not clear stored credentials: {}", err);
        }
    }

    pub(crate) async fn lock_refresh(&self) -> MutexGuard<'_, ()> {
        self.refresh_gate.lock().await
    }
}
