//! Session store: who is logged in.
//!
//! Owns the in-memory mirror of the persisted session medium and is the only
//! writer of that medium. Reads never touch the medium. Every write fires the
//! [`AuthEventBus`] after the mirror has been updated.

use crate::auth_bus::{AuthEventBus, SignalOrigin};
use crate::persistence::{Fingerprint, PersistenceError, SessionMedium, TOKEN_KEY, USERNAME_KEY};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::{info, warn};

/// Credential plus display identity. Both present or both absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub token: Option<String>,
    pub identity: Option<String>,
}

impl SessionState {
    pub fn logged_in(token: impl Into<String>, identity: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            identity: Some(identity.into()),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some() && self.identity.is_some()
    }
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Session {field} must not be empty")]
    EmptyField { field: &'static str },
}

pub struct SessionStore {
    medium: Arc<dyn SessionMedium>,
    mirror: RwLock<SessionState>,
    /// Held across a medium write and the matching mirror update.
    writer: Mutex<()>,
    bus: AuthEventBus,
}

impl SessionStore {
    /// Load the session from `medium`. A medium holding only one of the two
    /// fields is treated as logged out.
    pub fn open(medium: Arc<dyn SessionMedium>, bus: AuthEventBus) -> Self {
        let state = read_medium(medium.as_ref()).unwrap_or_else(|err| {
            warn!(error = %err, "Failed to read session medium; starting logged out");
            SessionState::default()
        });
        Self {
            medium,
            mirror: RwLock::new(state),
            writer: Mutex::new(()),
            bus,
        }
    }

    pub fn bus(&self) -> &AuthEventBus {
        &self.bus
    }

    /// Current session from the in-memory mirror.
    pub fn get(&self) -> SessionState {
        self.mirror
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.mirror
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_authenticated()
    }

    pub fn identity(&self) -> Option<String> {
        self.mirror
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .identity
            .clone()
    }

    pub fn token(&self) -> Option<String> {
        self.mirror
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .token
            .clone()
    }

    /// Record a successful login.
    ///
    /// A failed medium write is logged and the mirror is still updated, so
    /// the session lasts for this process only.
    pub fn set(&self, token: &str, identity: &str) -> Result<(), SessionError> {
        if token.trim().is_empty() {
            return Err(SessionError::EmptyField { field: "token" });
        }
        if identity.trim().is_empty() {
            return Err(SessionError::EmptyField { field: "identity" });
        }

        {
            let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
            let persisted = self
                .medium
                .write(TOKEN_KEY, token)
                .and_then(|()| self.medium.write(USERNAME_KEY, identity));
            if let Err(err) = persisted {
                warn!(error = %err, "Session not persisted; keeping it for this process");
            }
            let mut mirror = self.mirror.write().unwrap_or_else(PoisonError::into_inner);
            *mirror = SessionState::logged_in(token, identity);
        }
        info!(identity = %identity, "Session started");
        self.bus.notify(SignalOrigin::Local);
        Ok(())
    }

    /// Forget the session. Clearing an empty session still signals.
    pub fn clear(&self) {
        let previous = {
            let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
            let removed = self
                .medium
                .remove(TOKEN_KEY)
                .and_then(|()| self.medium.remove(USERNAME_KEY));
            if let Err(err) = removed {
                warn!(error = %err, "Session not removed from medium; cleared for this process");
            }
            let mut mirror = self.mirror.write().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *mirror)
        };
        if let Some(identity) = previous.identity {
            info!(identity = %identity, "Session cleared");
        }
        self.bus.notify(SignalOrigin::Local);
    }

    /// Cheap change detector for the persisted medium.
    pub fn fingerprint(&self) -> Result<Fingerprint, PersistenceError> {
        self.medium.fingerprint()
    }

    /// Re-read the medium after another process may have written it.
    ///
    /// Returns `true` and fires an external signal when the mirror changed.
    pub fn reload(&self) -> Result<bool, PersistenceError> {
        {
            let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
            let state = read_medium(self.medium.as_ref())?;
            let mut mirror = self.mirror.write().unwrap_or_else(PoisonError::into_inner);
            if *mirror == state {
                return Ok(false);
            }
            *mirror = state;
        }
        info!(
            authenticated = self.is_authenticated(),
            "Session changed by another process"
        );
        self.bus.notify(SignalOrigin::External);
        Ok(true)
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.get();
        f.debug_struct("SessionStore")
            .field("identity", &state.identity)
            .field("token", &state.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

fn read_medium(medium: &dyn SessionMedium) -> Result<SessionState, PersistenceError> {
    let token = medium.read(TOKEN_KEY)?.filter(|t| !t.is_empty());
    let identity = medium.read(USERNAME_KEY)?.filter(|u| !u.is_empty());
    match (token, identity) {
        (Some(token), Some(identity)) => Ok(SessionState::logged_in(token, identity)),
        _ => Ok(SessionState::default()),
    }
}
