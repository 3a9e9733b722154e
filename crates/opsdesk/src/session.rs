//! Session and identity.
//!
//! A [`Session`] is an explicit value owned by the caller and passed to every
//! dashboard call. It is either unauthenticated or holds one [`Identity`].
//! Successful logins overwrite the last-access singleton; nothing else in the
//! crate writes it.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::collection::LAST_ACCESS;
use crate::error::{Error, Result};
use crate::policy::{AccessPolicy, Role};
use crate::record::Record;
use crate::store::BackendStore;

/// An authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    /// Login name.
    pub username: String,
    /// Resolved role.
    pub role: Role,
}

impl Identity {
    /// Create an identity.
    #[must_use]
    pub fn new(username: impl Into<String>, role: Role) -> Self {
        Self {
            username: username.into(),
            role,
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.username, self.role)
    }
}

/// The two session states.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionState {
    /// Nobody is logged in.
    #[default]
    Unauthenticated,
    /// A user is logged in.
    Authenticated(Identity),
}

/// One interactive session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    state: SessionState,
}

impl Session {
    /// Create an unauthenticated session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session that is already authenticated.
    ///
    /// Skips credential checks and last-access bookkeeping; meant for tests
    /// and tools that resolved the identity elsewhere.
    #[must_use]
    pub fn authenticated(identity: Identity) -> Self {
        Self {
            state: SessionState::Authenticated(identity),
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// The logged-in identity, if any.
    #[must_use]
    pub fn identity(&self) -> Option<&Identity> {
        match &self.state {
            SessionState::Authenticated(identity) => Some(identity),
            SessionState::Unauthenticated => None,
        }
    }

    /// The logged-in identity.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotAuthenticated`] if nobody is logged in.
    pub fn require_identity(&self) -> Result<&Identity> {
        self.identity().ok_or(Error::NotAuthenticated)
    }

    /// The current role; [`Role::Unauthenticated`] when logged out.
    #[must_use]
    pub fn role(&self) -> Role {
        self.identity().map_or(Role::Unauthenticated, |i| i.role)
    }

    /// Check if a user is logged in.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.identity().is_some()
    }

    /// Log in with credentials.
    ///
    /// On success the last-access singleton is overwritten before the
    /// session changes state. On any failure the session is left as it was.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AuthFailure`] for bad credentials, or a store error
    /// if the last-access record could not be saved.
    pub async fn login(
        &mut self,
        policy: &AccessPolicy,
        last_access: &LastAccessLog,
        username: &str,
        password: &str,
    ) -> Result<&Identity> {
        let role = match policy.resolve_role(username, password) {
            Ok(role) => role,
            Err(e) => {
                warn!(username, "Login rejected");
                return Err(e);
            }
        };

        last_access.record(username).await?;

        info!(username, %role, "Logged in");
        self.state = SessionState::Authenticated(Identity::new(username, role));
        self.require_identity()
    }

    /// Log out, returning the identity that was logged in.
    pub fn logout(&mut self) -> Option<Identity> {
        match std::mem::take(&mut self.state) {
            SessionState::Authenticated(identity) => {
                info!(username = %identity.username, "Logged out");
                Some(identity)
            }
            SessionState::Unauthenticated => None,
        }
    }
}

/// Who logged in most recently, and when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LastAccess {
    /// Username of the last successful login.
    pub user: String,
    /// Time of that login.
    pub time: DateTime<Utc>,
}

impl LastAccess {
    fn to_record(&self) -> Record {
        Record::new()
            .with("user", self.user.as_str())
            .with("time", self.time.to_rfc3339())
    }

    fn from_record(record: &Record) -> Option<Self> {
        let user = record.get_str("user")?.to_string();
        let time = parse_time(record.get_str("time")?)?;
        Some(Self { user, time })
    }
}

impl fmt::Display for LastAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} at {}",
            self.user,
            self.time.format("%Y-%m-%d %H:%M:%S UTC")
        )
    }
}

/// Accept RFC 3339 as well as the older `YYYY-MM-DD HH:MM:SS[.ffffff]` form.
fn parse_time(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f")
                .ok()
                .map(|naive| naive.and_utc())
        })
}

/// The last-access singleton, stored as a one-record collection.
#[derive(Debug, Clone)]
pub struct LastAccessLog {
    store: Arc<dyn BackendStore>,
}

impl LastAccessLog {
    /// Create a log backed by a store.
    #[must_use]
    pub fn new(store: Arc<dyn BackendStore>) -> Self {
        Self { store }
    }

    /// Read the last access, if any has been recorded and is readable.
    pub async fn read(&self) -> Option<LastAccess> {
        let records = self.store.read(LAST_ACCESS).await.into_records();
        let last = records.last()?;
        let parsed = LastAccess::from_record(last);
        if parsed.is_none() {
            warn!("Ignoring malformed last-access record");
        }
        parsed
    }

    /// Overwrite the singleton with `username` and the current time.
    async fn record(&self, username: &str) -> Result<LastAccess> {
        let entry = LastAccess {
            user: username.to_string(),
            time: Utc::now(),
        };
        self.store
            .write(LAST_ACCESS, &[entry.to_record()])
            .await?;
        Ok(entry)
    }
}
