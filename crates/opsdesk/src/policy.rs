//! Access policy: who may do what to which collection.
//!
//! Credentials resolve to a [`Role`] in a fixed order, and each
//! `(role, collection)` pair resolves to a [`CapabilitySet`]. Both mappings
//! are pure and total. Per-record rights on work assignments are decided in
//! [`crate::assignment`].

use std::fmt;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::assignment::DeletionPolicy;
use crate::collection::{CollectionKind, CollectionSpec};
use crate::config::{AuthConfig, Config, Credential};
use crate::error::{Error, Result};

/// A capability tier resolved from credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Manages the standard collections.
    Editor,
    /// Posts to publisher-only collections.
    RestrictedPublisher,
    /// Reads everything, changes nothing.
    Viewer,
    /// No identity.
    Unauthenticated,
}

impl Role {
    /// Every role, for exhaustive checks.
    pub const ALL: [Role; 4] = [
        Role::Editor,
        Role::RestrictedPublisher,
        Role::Viewer,
        Role::Unauthenticated,
    ];
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Editor => write!(f, "editor"),
            Self::RestrictedPublisher => write!(f, "restricted publisher"),
            Self::Viewer => write!(f, "viewer"),
            Self::Unauthenticated => write!(f, "unauthenticated"),
        }
    }
}

/// One permitted operation on a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// List records.
    View,
    /// Append records.
    Create,
    /// Replace records.
    Edit,
    /// Remove records.
    Delete,
}

impl Capability {
    /// Every capability, in display order.
    pub const ALL: [Capability; 4] = [
        Capability::View,
        Capability::Create,
        Capability::Edit,
        Capability::Delete,
    ];

    const fn bit(self) -> u8 {
        match self {
            Self::View => 1,
            Self::Create => 1 << 1,
            Self::Edit => 1 << 2,
            Self::Delete => 1 << 3,
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::View => write!(f, "view"),
            Self::Create => write!(f, "create"),
            Self::Edit => write!(f, "edit"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

/// A set of capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CapabilitySet(u8);

impl CapabilitySet {
    /// No capabilities.
    pub const NONE: Self = Self(0);

    /// View only.
    pub const VIEW: Self = Self(Capability::View.bit());

    /// Every capability.
    pub const ALL: Self = Self(
        Capability::View.bit()
            | Capability::Create.bit()
            | Capability::Edit.bit()
            | Capability::Delete.bit(),
    );

    /// Add a capability.
    #[must_use]
    pub const fn with(self, capability: Capability) -> Self {
        Self(self.0 | capability.bit())
    }

    /// Check membership.
    #[must_use]
    pub const fn contains(self, capability: Capability) -> bool {
        self.0 & capability.bit() != 0
    }

    /// Check if no capability is granted.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Granted capabilities in display order.
    pub fn iter(self) -> impl Iterator<Item = Capability> {
        Capability::ALL.into_iter().filter(move |c| self.contains(*c))
    }
}

impl fmt::Display for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "none");
        }
        let names: Vec<String> = self.iter().map(|c| c.to_string()).collect();
        f.write_str(&names.join(", "))
    }
}

/// Capabilities of a role on a collection of the given kind.
///
/// Work assignments only list the collection-wide rights here; assignees
/// additionally toggle and (policy permitting) delete their own records.
#[must_use]
pub fn capabilities_for_kind(
    role: Role,
    kind: CollectionKind,
    deletion_policy: DeletionPolicy,
) -> CapabilitySet {
    match (role, kind) {
        (Role::Unauthenticated, _) => CapabilitySet::NONE,
        (Role::Viewer, _)
        | (Role::Editor, CollectionKind::PublisherOnly)
        | (
            Role::RestrictedPublisher,
            CollectionKind::Standard | CollectionKind::WorkAssignment,
        ) => CapabilitySet::VIEW,
        (Role::Editor, CollectionKind::Standard)
        | (Role::RestrictedPublisher, CollectionKind::PublisherOnly) => CapabilitySet::ALL,
        (Role::Editor, CollectionKind::WorkAssignment) => {
            let caps = CapabilitySet::VIEW.with(Capability::Create);
            if deletion_policy.allows_editor() {
                caps.with(Capability::Delete)
            } else {
                caps
            }
        }
    }
}

/// Hash a password using Argon2id.
///
/// Returns the PHC-formatted hash string that includes the salt and parameters.
///
/// # Errors
///
/// Returns [`Error::PasswordHash`] if hashing fails.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| Error::PasswordHash(format!("failed to hash password: {e}")))
}

/// Verify a password against a stored PHC hash.
///
/// # Errors
///
/// Returns [`Error::PasswordHash`] if the stored hash cannot be parsed.
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| Error::PasswordHash(format!("invalid password hash format: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Resolves credentials to roles and roles to capabilities.
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    auth: AuthConfig,
    collections: Vec<CollectionSpec>,
    deletion_policy: DeletionPolicy,
}

impl AccessPolicy {
    /// Create a policy from its parts.
    #[must_use]
    pub fn new(
        auth: AuthConfig,
        collections: Vec<CollectionSpec>,
        deletion_policy: DeletionPolicy,
    ) -> Self {
        Self {
            auth,
            collections,
            deletion_policy,
        }
    }

    /// Create a policy from loaded configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.auth.clone(),
            config.collections.clone(),
            config.assignments.deletion_policy,
        )
    }

    /// The configured work-assignment deletion policy.
    #[must_use]
    pub fn deletion_policy(&self) -> DeletionPolicy {
        self.deletion_policy
    }

    /// Resolve credentials to a role.
    ///
    /// Checked in order: the editor table, the restricted-publisher table,
    /// then the shared viewer password (any non-blank name).
    ///
    /// # Errors
    ///
    /// Returns [`Error::AuthFailure`] if nothing matches.
    pub fn resolve_role(&self, username: &str, password: &str) -> Result<Role> {
        if matches_table(&self.auth.editors, username, password) {
            debug!(username, "Matched editor credentials");
            return Ok(Role::Editor);
        }
        if matches_table(&self.auth.publishers, username, password) {
            debug!(username, "Matched publisher credentials");
            return Ok(Role::RestrictedPublisher);
        }
        if !username.trim().is_empty() {
            if let Some(hash) = &self.auth.viewer_password_hash {
                if checked_verify(password, hash) {
                    debug!(username, "Matched shared viewer password");
                    return Ok(Role::Viewer);
                }
            }
        }
        Err(Error::auth_failure(username))
    }

    /// Capabilities of a role on a named collection.
    ///
    /// Unknown collections grant nothing.
    #[must_use]
    pub fn capabilities_for(&self, role: Role, collection: &str) -> CapabilitySet {
        self.collections
            .iter()
            .find(|c| c.name == collection)
            .map_or(CapabilitySet::NONE, |spec| {
                capabilities_for_kind(role, spec.kind, self.deletion_policy)
            })
    }
}

fn matches_table(table: &[Credential], username: &str, password: &str) -> bool {
    table
        .iter()
        .filter(|c| c.username == username)
        .any(|c| checked_verify(password, &c.password_hash))
}

fn checked_verify(password: &str, hash: &str) -> bool {
    match verify_password(password, hash) {
        Ok(matched) => matched,
        Err(e) => {
            warn!("Skipping credential with unusable hash: {e}");
            false
        }
    }
}
