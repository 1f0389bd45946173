//! Reconciled auth-flow state over URL, persistent and session storage.
//!
//! The current state is whichever source answers first in
//! [`AuthStateStore::LOOKUP_ORDER`]. Sources are never merged. Public
//! operations never fail: errors are logged and reads degrade to `None`,
//! writes to a no-op. The `try_*` variants surface the error instead.

use std::sync::Arc;

use tracing::{debug, warn};

use super::query::UrlQuery;
use super::state::{AuthFlowState, AuthStatus, ExpiresAt, Source, iso_timestamp};
use crate::clock::{Clock, SystemClock};
use crate::storage::{Storage, StorageArea, StorageError};

/// Current auth-flow state, in both storage areas.
pub const AUTH_FLOW_KEY: &str = "auth_flow";
/// Legacy backup copy in session storage.
pub const VERIFICATION_BACKUP_KEY: &str = "auth_verification_data";
pub const LEGACY_OTP_KEY: &str = "auth_otp";
pub const LEGACY_REDIRECT_TIME_KEY: &str = "auth_redirect_time";
pub const LEGACY_AUTH_STATE_KEY: &str = "authState";

/// Keys removed by `clear`, in removal order.
const CLEARED_KEYS: [(StorageArea, &str); 6] = [
    (StorageArea::Persistent, AUTH_FLOW_KEY),
    (StorageArea::Persistent, LEGACY_OTP_KEY),
    (StorageArea::Persistent, LEGACY_REDIRECT_TIME_KEY),
    (StorageArea::Persistent, LEGACY_AUTH_STATE_KEY),
    (StorageArea::Session, AUTH_FLOW_KEY),
    (StorageArea::Session, VERIFICATION_BACKUP_KEY),
];

mod params {
    pub const VERIFIED: &str = "verified";
    pub const FROM_CALLBACK: &str = "from_callback";
    pub const ACTION: &str = "action";
    pub const ACCOUNT: &str = "account";
    pub const EXPIRES_AT: &str = "expires_at";
}

#[derive(Debug, thiserror::Error)]
pub enum AuthStateError {
    #[error("failed to access {area} '{key}'")]
    Storage {
        area: StorageArea,
        key: &'static str,
        #[source]
        source: StorageError,
    },
    #[error("malformed auth state in {area} '{key}'")]
    Parse {
        area: StorageArea,
        key: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize auth state")]
    Serialize(#[source] serde_json::Error),
}

pub struct AuthStateStore {
    persistent: Arc<dyn Storage>,
    session: Arc<dyn Storage>,
    location: UrlQuery,
    clock: Arc<dyn Clock>,
}

impl AuthStateStore {
    /// Reconciliation priority, highest first.
    pub const LOOKUP_ORDER: [Source; 5] = [
        Source::UrlParams,
        Source::Url,
        Source::LocalStorage,
        Source::SessionStorage,
        Source::SessionStorageBackup,
    ];

    /// Creates a store over the given areas, with the system clock and no location.
    pub fn new(persistent: Arc<dyn Storage>, session: Arc<dyn Storage>) -> Self {
        Self {
            persistent,
            session,
            location: UrlQuery::empty(),
            clock: Arc::new(SystemClock),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_location(mut self, location: UrlQuery) -> Self {
        self.location = location;
        self
    }

    /// Replaces the query snapshot (call on navigation).
    pub fn set_location(&mut self, location: UrlQuery) {
        self.location = location;
    }

    pub fn location(&self) -> &UrlQuery {
        &self.location
    }

    /// Returns the current auth-flow state, tagged with where it came from.
    pub fn get(&self) -> Option<AuthFlowState> {
        match self.try_get() {
            Ok(state) => state,
            Err(err) => {
                warn!(
                    area = err.area().map(StorageArea::as_str),
                    key = err.key(),
                    error = &err as &dyn std::error::Error,
                    "Error reading auth state"
                );
                None
            }
        }
    }

    /// Like [`get`](Self::get), but reports the first storage or parse error.
    ///
    /// # Errors
    /// Returns an error if a storage area cannot be read or holds a malformed payload.
    pub fn try_get(&self) -> Result<Option<AuthFlowState>, AuthStateError> {
        for source in Self::LOOKUP_ORDER {
            if let Some(mut state) = self.lookup(source)? {
                debug!(source = %source, "Resolved auth state");
                state.source = Some(source);
                return Ok(Some(state));
            }
        }
        Ok(None)
    }

    fn lookup(&self, source: Source) -> Result<Option<AuthFlowState>, AuthStateError> {
        match source {
            Source::UrlParams => Ok(self.callback_params_state()),
            Source::Url => Ok(self.verified_params_state()),
            Source::LocalStorage => self.read_stored(StorageArea::Persistent, AUTH_FLOW_KEY),
            Source::SessionStorage => self.read_stored(StorageArea::Session, AUTH_FLOW_KEY),
            Source::SessionStorageBackup => {
                self.read_stored(StorageArea::Session, VERIFICATION_BACKUP_KEY)
            }
        }
    }

    /// Verification callback redirect. Fields are taken as-is, even if missing.
    fn callback_params_state(&self) -> Option<AuthFlowState> {
        let query = &self.location;
        if !(query.is_true(params::VERIFIED) && query.is_true(params::FROM_CALLBACK)) {
            return None;
        }

        Some(AuthFlowState {
            status: Some(AuthStatus::Verified),
            action: query.get(params::ACTION).map(str::to_string),
            account: query.get(params::ACCOUNT).map(str::to_string),
            expires_at: self.query_expiry(),
            verified_at: Some(iso_timestamp(self.clock.now())),
            ..AuthFlowState::default()
        })
    }

    /// Plain `verified=true` link; needs both `account` and `action`.
    fn verified_params_state(&self) -> Option<AuthFlowState> {
        let query = &self.location;
        if !query.is_true(params::VERIFIED) {
            return None;
        }

        let account = query.non_empty(params::ACCOUNT)?;
        let action = query.non_empty(params::ACTION)?;
        Some(AuthFlowState {
            status: Some(AuthStatus::Verified),
            action: Some(action.to_string()),
            account: Some(account.to_string()),
            expires_at: self.query_expiry(),
            ..AuthFlowState::default()
        })
    }

    fn query_expiry(&self) -> Option<ExpiresAt> {
        self.location
            .get(params::EXPIRES_AT)
            .map(|v| ExpiresAt::Text(v.to_string()))
    }

    fn read_stored(
        &self,
        area: StorageArea,
        key: &'static str,
    ) -> Result<Option<AuthFlowState>, AuthStateError> {
        let raw = self
            .area(area)
            .get_item(key)
            .map_err(|source| AuthStateError::Storage { area, key, source })?;

        match raw {
            Some(raw) if !raw.is_empty() => AuthFlowState::from_payload(&raw)
                .map(Some)
                .map_err(|source| AuthStateError::Parse { area, key, source }),
            _ => Ok(None),
        }
    }

    /// Stores `state` in session storage, and in persistent storage too when
    /// `persistent` is set. The provenance tag is not stored.
    pub fn save(&self, state: &AuthFlowState, persistent: bool) {
        if let Err(err) = self.try_save(state, persistent) {
            warn!(
                area = err.area().map(StorageArea::as_str),
                key = err.key(),
                error = &err as &dyn std::error::Error,
                "Failed to save auth state"
            );
        }
    }

    /// Like [`save`](Self::save), but reports the failure.
    ///
    /// Persistent storage is written first; if that fails the session copy is
    /// not written either.
    ///
    /// # Errors
    /// Returns an error if serialization or a storage write fails.
    pub fn try_save(&self, state: &AuthFlowState, persistent: bool) -> Result<(), AuthStateError> {
        let payload = state.to_payload().map_err(AuthStateError::Serialize)?;

        let mut targets = vec![StorageArea::Session];
        if persistent {
            targets.insert(0, StorageArea::Persistent);
        }

        for area in targets {
            self.area(area)
                .set_item(AUTH_FLOW_KEY, &payload)
                .map_err(|source| AuthStateError::Storage {
                    area,
                    key: AUTH_FLOW_KEY,
                    source,
                })?;
        }

        debug!(
            action = state.action.as_deref().unwrap_or_default(),
            persistent, "Saved auth state"
        );
        Ok(())
    }

    /// Removes every auth-flow key from both areas. Safe to call repeatedly.
    pub fn clear(&self) {
        if let Err(err) = self.try_clear() {
            warn!(
                area = err.area().map(StorageArea::as_str),
                key = err.key(),
                error = &err as &dyn std::error::Error,
                "Failed to clear auth state"
            );
        }
    }

    /// Like [`clear`](Self::clear), but reports the failure. Stops at the first failing key.
    ///
    /// # Errors
    /// Returns an error if a key cannot be removed.
    pub fn try_clear(&self) -> Result<(), AuthStateError> {
        for (area, key) in CLEARED_KEYS {
            self.area(area)
                .remove_item(key)
                .map_err(|source| AuthStateError::Storage { area, key, source })?;
        }
        debug!("Cleared auth state");
        Ok(())
    }

    /// True if the current state is a verified, unexpired state for `action`.
    pub fn is_valid(&self, action: &str) -> bool {
        self.get()
            .is_some_and(|state| state.is_valid_for(action, self.clock.now_millis()))
    }

    fn area(&self, area: StorageArea) -> &dyn Storage {
        match area {
            StorageArea::Persistent => self.persistent.as_ref(),
            StorageArea::Session => self.session.as_ref(),
        }
    }
}

impl AuthStateError {
    /// Storage area the failing read or write touched, if any.
    pub fn area(&self) -> Option<StorageArea> {
        match self {
            AuthStateError::Storage { area, .. } | AuthStateError::Parse { area, .. } => {
                Some(*area)
            }
            AuthStateError::Serialize(_) => None,
        }
    }

    /// Storage key the failing read or write touched, if any.
    pub fn key(&self) -> Option<&'static str> {
        match self {
            AuthStateError::Storage { key, .. } | AuthStateError::Parse { key, .. } => Some(*key),
            AuthStateError::Serialize(_) => None,
        }
    }

    /// The lowest-level cause, for one-line diagnostics.
    pub fn root_cause(&self) -> String {
        let mut cause: &dyn std::error::Error = self;
        while let Some(next) = cause.source() {
            cause = next;
        }
        cause.to_string()
    }
}
