//! The dashboard: the surface a UI drives.
//!
//! Every call takes the caller's [`Session`] explicitly. Capabilities are
//! checked before the store is touched; the work-assignment collection is
//! routed through [`AssignmentBoard`] so ownership rules always apply.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::assignment::{Assignment, AssignmentBoard, AssignmentView};
use crate::collection::CollectionSpec;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::policy::{AccessPolicy, Capability, CapabilitySet};
use crate::record::Record;
use crate::repository::CollectionRepository;
use crate::session::{Identity, LastAccess, LastAccessLog, Session};
use crate::store::{open_store, BackendStore};

/// Role-gated access to the configured collections.
#[derive(Debug, Clone)]
pub struct Dashboard {
    store: Arc<dyn BackendStore>,
    policy: AccessPolicy,
    collections: Vec<CollectionSpec>,
    board: AssignmentBoard,
    last_access: LastAccessLog,
}

impl Dashboard {
    /// Create a dashboard over an existing store.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigValidation`] if `config` does not pass
    /// [`Config::validate`], e.g. a second work-assignment collection or one
    /// named `last_access`.
    pub fn new(store: Arc<dyn BackendStore>, config: &Config) -> Result<Self> {
        config.validate()?;
        let assignments = config
            .collection(&config.assignments.collection)
            .cloned()
            .ok_or_else(|| Error::UnknownCollection(config.assignments.collection.clone()))?;

        let board = AssignmentBoard::new(
            CollectionRepository::new(Arc::clone(&store), assignments),
            config.assignments.deletion_policy,
        );

        Ok(Self {
            policy: AccessPolicy::from_config(config),
            collections: config.collections.clone(),
            last_access: LastAccessLog::new(Arc::clone(&store)),
            board,
            store,
        })
    }

    /// Open the store named by configuration and create a dashboard on it.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be opened.
    pub fn open(config: &Config) -> Result<Self> {
        let store = open_store(&config.store)?;
        debug!(store = store.name(), "Opened backend store");
        Self::new(store, config)
    }

    /// The access policy in use.
    #[must_use]
    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    /// The configured collections, in display order.
    #[must_use]
    pub fn collections(&self) -> &[CollectionSpec] {
        &self.collections
    }

    /// Log in. See [`Session::login`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::AuthFailure`] for bad credentials or a store error if
    /// the last-access record could not be saved.
    pub async fn authenticate(
        &self,
        session: &mut Session,
        username: &str,
        password: &str,
    ) -> Result<Identity> {
        session
            .login(&self.policy, &self.last_access, username, password)
            .await
            .cloned()
    }

    /// Log out.
    pub fn logout(&self, session: &mut Session) -> Option<Identity> {
        session.logout()
    }

    /// What the session may do to a collection.
    #[must_use]
    pub fn capabilities(&self, session: &Session, collection: &str) -> CapabilitySet {
        self.policy.capabilities_for(session.role(), collection)
    }

    /// The most recent successful login.
    pub async fn last_access(&self) -> Option<LastAccess> {
        self.last_access.read().await
    }

    /// List a collection.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection is unknown or the session may not
    /// view it. Unreadable collections list as empty.
    pub async fn get_records(&self, session: &Session, collection: &str) -> Result<Vec<Record>> {
        let (_, spec) = self.authorize(session, collection, Capability::View)?;
        Ok(self.repository(spec).list().await)
    }

    /// Append a record to a collection and return its position.
    ///
    /// Work assignments without a `done` field start pending.
    ///
    /// # Errors
    ///
    /// Returns an error if the session may not create records here, the
    /// record is invalid, or the store fails.
    pub async fn create_record(
        &self,
        session: &Session,
        collection: &str,
        record: Record,
    ) -> Result<usize> {
        let (identity, spec) = self.authorize(session, collection, Capability::Create)?;
        spec.validate_record(&record)?;

        if spec.name == self.board.name() {
            let record = if record.get("done").is_none() {
                record.with("done", false)
            } else {
                record
            };
            let assignment = Assignment::from_record(&spec.name, &record)?;
            return self.board.create(identity, &assignment).await;
        }
        self.repository(spec).append(record).await
    }

    /// Replace the record at `index`, returning the previous one.
    ///
    /// # Errors
    ///
    /// Returns an error if the session may not edit records here, the record
    /// is invalid, no record is at `index`, or the store fails.
    pub async fn update_record(
        &self,
        session: &Session,
        collection: &str,
        index: usize,
        record: Record,
    ) -> Result<Record> {
        let (_, spec) = self.authorize(session, collection, Capability::Edit)?;
        self.repository(spec).update_at(index, record).await
    }

    /// Remove the record at `index`, returning it.
    ///
    /// Work assignments follow the configured deletion policy, so assignees
    /// may remove their own even without collection-wide delete rights.
    ///
    /// # Errors
    ///
    /// Returns an error if the session may not delete the record, no record
    /// is at `index`, or the store fails.
    pub async fn delete_record(
        &self,
        session: &Session,
        collection: &str,
        index: usize,
    ) -> Result<Record> {
        self.spec(collection)?;
        if collection == self.board.name() {
            let identity = session.require_identity()?;
            let removed = self.board.delete(identity, index).await?;
            return Ok(removed.to_record());
        }

        let (_, spec) = self.authorize(session, collection, Capability::Delete)?;
        self.repository(spec).delete_at(index).await
    }

    /// Flip done/pending on the assignment at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotOwner`] unless the session belongs to the
    /// assignee, or an error for a bad target or failed write.
    pub async fn toggle_assignment_done(
        &self,
        session: &Session,
        index: usize,
    ) -> Result<Assignment> {
        let identity = session.require_identity()?;
        self.board.toggle_done(identity, index).await
    }

    /// The assignments, annotated with what the session may do to each.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotAuthenticated`] for a logged-out session.
    pub async fn assignment_views(&self, session: &Session) -> Result<Vec<AssignmentView>> {
        let identity = session.require_identity()?;
        Ok(self.board.views(identity).await)
    }

    fn spec(&self, collection: &str) -> Result<&CollectionSpec> {
        self.collections
            .iter()
            .find(|c| c.name == collection)
            .ok_or_else(|| Error::UnknownCollection(collection.to_string()))
    }

    fn repository(&self, spec: &CollectionSpec) -> CollectionRepository {
        CollectionRepository::new(Arc::clone(&self.store), spec.clone())
    }

    fn authorize<'a>(
        &'a self,
        session: &'a Session,
        collection: &str,
        capability: Capability,
    ) -> Result<(&'a Identity, &'a CollectionSpec)> {
        let spec = self.spec(collection)?;
        let identity = session.require_identity()?;

        if self
            .policy
            .capabilities_for(identity.role, collection)
            .contains(capability)
        {
            Ok((identity, spec))
        } else {
            warn!(
                username = %identity.username,
                role = %identity.role,
                %capability,
                collection,
                "Denied"
            );
            Err(Error::CapabilityDenied {
                role: identity.role.to_string(),
                capability,
                collection: collection.to_string(),
            })
        }
    }
}
