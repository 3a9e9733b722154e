//! Work assignments.
//!
//! An assignment is either pending or done. Only the assignee may move it
//! between the two, and every move is written through immediately. Who may
//! delete an assignment is decided by the configured [`DeletionPolicy`].

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::collection::CollectionKind;
use crate::error::{Error, Result};
use crate::policy::{capabilities_for_kind, Capability, CapabilitySet, Role};
use crate::record::{FieldValue, Record};
use crate::repository::CollectionRepository;
use crate::session::Identity;

/// Fields every assignment record carries.
pub const REQUIRED_FIELDS: [&str; 4] = ["task", "assigned_to", "priority", "done"];

/// Who may delete an assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletionPolicy {
    /// Only the assignee.
    OwnerOnly,
    /// Only editors.
    EditorOnly,
    /// The assignee or any editor.
    #[default]
    OwnerOrEditor,
}

impl DeletionPolicy {
    /// Check if assignees may delete their own assignments.
    #[must_use]
    pub fn allows_owner(self) -> bool {
        matches!(self, Self::OwnerOnly | Self::OwnerOrEditor)
    }

    /// Check if editors may delete any assignment.
    #[must_use]
    pub fn allows_editor(self) -> bool {
        matches!(self, Self::EditorOnly | Self::OwnerOrEditor)
    }

    /// Check if `identity` may delete `assignment`.
    #[must_use]
    pub fn permits(self, identity: &Identity, assignment: &Assignment) -> bool {
        (self.allows_owner() && assignment.is_owned_by(&identity.username))
            || (self.allows_editor() && identity.role == Role::Editor)
    }
}

impl fmt::Display for DeletionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OwnerOnly => write!(f, "owner only"),
            Self::EditorOnly => write!(f, "editor only"),
            Self::OwnerOrEditor => write!(f, "owner or editor"),
        }
    }
}

/// Lifecycle state of an assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    /// Not done yet.
    Pending,
    /// Finished.
    Done,
}

impl AssignmentStatus {
    /// The other state.
    #[must_use]
    pub fn toggled(self) -> Self {
        match self {
            Self::Pending => Self::Done,
            Self::Done => Self::Pending,
        }
    }
}

impl From<bool> for AssignmentStatus {
    fn from(done: bool) -> Self {
        if done {
            Self::Done
        } else {
            Self::Pending
        }
    }
}

impl fmt::Display for AssignmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Done => write!(f, "done"),
        }
    }
}

/// A typed work-assignment record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Assignment {
    /// What needs doing.
    pub task: String,
    /// Username of the assignee.
    pub assigned_to: String,
    /// Priority, lower is more urgent.
    pub priority: u32,
    /// Whether the assignment is finished.
    pub done: bool,
}

impl Assignment {
    /// Create a pending assignment.
    #[must_use]
    pub fn new(task: impl Into<String>, assigned_to: impl Into<String>, priority: u32) -> Self {
        Self {
            task: task.into(),
            assigned_to: assigned_to.into(),
            priority,
            done: false,
        }
    }

    /// Current state.
    #[must_use]
    pub fn status(&self) -> AssignmentStatus {
        AssignmentStatus::from(self.done)
    }

    /// Check if `username` is the assignee.
    #[must_use]
    pub fn is_owned_by(&self, username: &str) -> bool {
        self.assigned_to == username
    }

    /// Parse an assignment out of a stored record.
    ///
    /// Numeric text is accepted for `priority` and `"true"`/`"false"` for
    /// `done`, since older files were written from form input.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRecord`] if a required field is missing or
    /// has the wrong type.
    pub fn from_record(collection: &str, record: &Record) -> Result<Self> {
        let text = |field: &str| {
            record
                .get_str(field)
                .map(str::to_string)
                .ok_or_else(|| bad_field(collection, field, record.get(field)))
        };

        let priority = match record.get("priority") {
            Some(FieldValue::Integer(n)) => u32::try_from(*n).ok(),
            Some(FieldValue::Text(s)) => s.trim().parse().ok(),
            _ => None,
        }
        .ok_or_else(|| bad_field(collection, "priority", record.get("priority")))?;

        let done = match record.get("done") {
            Some(FieldValue::Bool(b)) => Some(*b),
            Some(FieldValue::Text(s)) => s.trim().parse().ok(),
            _ => None,
        }
        .ok_or_else(|| bad_field(collection, "done", record.get("done")))?;

        Ok(Self {
            task: text("task")?,
            assigned_to: text("assigned_to")?,
            priority,
            done,
        })
    }

    /// Convert to a record with fields in canonical order.
    #[must_use]
    pub fn to_record(&self) -> Record {
        Record::new()
            .with("task", self.task.as_str())
            .with("assigned_to", self.assigned_to.as_str())
            .with("priority", self.priority)
            .with("done", self.done)
    }
}

impl From<&Assignment> for Record {
    fn from(assignment: &Assignment) -> Self {
        assignment.to_record()
    }
}

fn bad_field(collection: &str, field: &str, value: Option<&FieldValue>) -> Error {
    let message = match value {
        None => format!("assignment is missing '{field}'"),
        Some(v) => format!("assignment field '{field}' has unexpected {} value", v.kind()),
    };
    Error::invalid_record(collection, message)
}

/// An assignment as one identity sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssignmentView {
    /// Position in the collection.
    pub index: usize,
    /// The assignment.
    pub assignment: Assignment,
    /// Whether the viewer may flip done/pending.
    pub can_toggle: bool,
    /// Whether the viewer may delete it.
    pub can_delete: bool,
}

/// Work-assignment operations over one collection.
#[derive(Debug, Clone)]
pub struct AssignmentBoard {
    repo: CollectionRepository,
    deletion_policy: DeletionPolicy,
}

impl AssignmentBoard {
    /// Create a board over a repository.
    #[must_use]
    pub fn new(repo: CollectionRepository, deletion_policy: DeletionPolicy) -> Self {
        Self {
            repo,
            deletion_policy,
        }
    }

    /// The deletion policy in force.
    #[must_use]
    pub fn deletion_policy(&self) -> DeletionPolicy {
        self.deletion_policy
    }

    /// Name of the collection the board manages.
    #[must_use]
    pub fn name(&self) -> &str {
        self.repo.name()
    }

    fn capabilities(&self, role: Role) -> CapabilitySet {
        capabilities_for_kind(role, CollectionKind::WorkAssignment, self.deletion_policy)
    }

    fn denied(&self, role: Role, capability: Capability) -> Error {
        warn!(%role, %capability, collection = self.name(), "Denied");
        Error::CapabilityDenied {
            role: role.to_string(),
            capability,
            collection: self.name().to_string(),
        }
    }

    /// All parseable assignments with their positions.
    ///
    /// Records that are not valid assignments are skipped with a warning.
    pub async fn list(&self) -> Vec<(usize, Assignment)> {
        self.repo
            .list()
            .await
            .iter()
            .enumerate()
            .filter_map(|(index, record)| match Assignment::from_record(self.name(), record) {
                Ok(assignment) => Some((index, assignment)),
                Err(e) => {
                    warn!(index, "Skipping malformed assignment: {e}");
                    None
                }
            })
            .collect()
    }

    /// Assignments annotated with what `identity` may do to each.
    pub async fn views(&self, identity: &Identity) -> Vec<AssignmentView> {
        self.list()
            .await
            .into_iter()
            .map(|(index, assignment)| AssignmentView {
                index,
                can_toggle: assignment.is_owned_by(&identity.username),
                can_delete: self.deletion_policy.permits(identity, &assignment),
                assignment,
            })
            .collect()
    }

    /// Create an assignment and return its position.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CapabilityDenied`] unless the identity may create
    /// assignments, or any error from the repository.
    pub async fn create(&self, identity: &Identity, assignment: &Assignment) -> Result<usize> {
        if !self.capabilities(identity.role).contains(Capability::Create) {
            return Err(self.denied(identity.role, Capability::Create));
        }
        let index = self.repo.append(assignment.to_record()).await?;
        info!(
            by = %identity.username,
            assigned_to = %assignment.assigned_to,
            index,
            "Created assignment"
        );
        Ok(index)
    }

    /// Flip done/pending on the assignment at `index`.
    ///
    /// Returns the assignment in its new state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotOwner`] unless the identity is the assignee,
    /// [`Error::RecordNotFound`] or [`Error::InvalidRecord`] for a bad
    /// target, or any store error. Nothing is written on error.
    pub async fn toggle_done(&self, identity: &Identity, index: usize) -> Result<Assignment> {
        if identity.role == Role::Unauthenticated {
            return Err(Error::NotAuthenticated);
        }

        let collection = self.name().to_string();
        let before = self
            .repo
            .modify_at(index, |record| {
                let current = Assignment::from_record(&collection, record)?;
                if !current.is_owned_by(&identity.username) {
                    return Err(Error::NotOwner {
                        owner: current.assigned_to,
                        action: "toggle",
                        index,
                    });
                }
                record.insert("done", !current.done);
                Ok(())
            })
            .await
            .map_err(|e| {
                if e.is_denied() {
                    warn!(username = %identity.username, index, "Toggle refused: {e}");
                }
                e
            })?;

        let mut after = Assignment::from_record(&collection, &before)?;
        after.done = !after.done;
        info!(
            username = %identity.username,
            index,
            status = %after.status(),
            "Toggled assignment"
        );
        Ok(after)
    }

    /// Delete the assignment at `index` if the policy allows it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CapabilityDenied`] or [`Error::NotOwner`] when the
    /// policy forbids it, [`Error::RecordNotFound`] or
    /// [`Error::InvalidRecord`] for a bad target, or any store error.
    pub async fn delete(&self, identity: &Identity, index: usize) -> Result<Assignment> {
        let role = identity.role;
        // nobody outside these can ever pass, so refuse before reading
        let may_try = role != Role::Unauthenticated
            && (self.deletion_policy.allows_owner()
                || self.capabilities(role).contains(Capability::Delete));
        if !may_try {
            return Err(self.denied(role, Capability::Delete));
        }

        let collection = self.name().to_string();
        let policy = self.deletion_policy;
        let removed = self
            .repo
            .delete_at_if(index, |record| {
                let target = Assignment::from_record(&collection, record)?;
                if policy.permits(identity, &target) {
                    Ok(())
                } else if policy.allows_owner() {
                    Err(Error::NotOwner {
                        owner: target.assigned_to,
                        action: "delete",
                        index,
                    })
                } else {
                    Err(Error::CapabilityDenied {
                        role: role.to_string(),
                        capability: Capability::Delete,
                        collection: collection.clone(),
                    })
                }
            })
            .await?;

        let removed = Assignment::from_record(&collection, &removed)?;
        info!(username = %identity.username, index, task = %removed.task, "Deleted assignment");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::collection::CollectionSpec;
    use crate::store::{BackendStore, MemoryStore};

    fn spec() -> CollectionSpec {
        CollectionSpec::new(
            "assignments",
            "Work Distribution",
            &REQUIRED_FIELDS,
            CollectionKind::WorkAssignment,
        )
    }

    fn create_board(policy: DeletionPolicy) -> (Arc<MemoryStore>, AssignmentBoard) {
        let store = Arc::new(MemoryStore::new());
        let repo = CollectionRepository::new(store.clone(), spec());
        (store, AssignmentBoard::new(repo, policy))
    }

    fn editor(name: &str) -> Identity {
        Identity::new(name, Role::Editor)
    }

    async fn seeded(policy: DeletionPolicy) -> (Arc<MemoryStore>, AssignmentBoard) {
        let (store, board) = create_board(policy);
        board
            .create(&editor("anna"), &Assignment::new("Call school", "anna", 1))
            .await
            .unwrap();
        board
            .create(&editor("anna"), &Assignment::new("Fix bug", "shruti", 2))
            .await
            .unwrap();
        (store, board)
    }

    #[test]
    fn test_deletion_policy_flags() {
        assert!(DeletionPolicy::OwnerOnly.allows_owner());
        assert!(!DeletionPolicy::OwnerOnly.allows_editor());
        assert!(!DeletionPolicy::EditorOnly.allows_owner());
        assert!(DeletionPolicy::EditorOnly.allows_editor());
        assert!(DeletionPolicy::OwnerOrEditor.allows_owner());
        assert!(DeletionPolicy::OwnerOrEditor.allows_editor());
        assert_eq!(DeletionPolicy::default(), DeletionPolicy::OwnerOrEditor);
    }

    #[test]
    fn test_status_toggled() {
        assert_eq!(AssignmentStatus::Pending.toggled(), AssignmentStatus::Done);
        assert_eq!(AssignmentStatus::Done.toggled(), AssignmentStatus::Pending);
        assert_eq!(AssignmentStatus::from(true).to_string(), "done");
    }

    #[test]
    fn test_from_record_accepts_form_text() {
        let record = Record::new()
            .with("task", "Review")
            .with("assigned_to", "anna")
            .with("priority", "3")
            .with("done", "false");
        let parsed = Assignment::from_record("assignments", &record).unwrap();
        assert_eq!(parsed, Assignment::new("Review", "anna", 3));
    }

    #[test]
    fn test_from_record_rejects_bad_fields() {
        let missing = Record::new().with("task", "x").with("priority", 1_i64).with("done", false);
        let err = Assignment::from_record("assignments", &missing).unwrap_err();
        assert!(err.to_string().contains("missing 'assigned_to'"));

        let negative = Assignment::new("x", "anna", 0).to_record().with("priority", -1_i64);
        assert!(Assignment::from_record("assignments", &negative).is_err());

        let bad_done = Assignment::new("x", "anna", 0).to_record().with("done", 1_i64);
        let err = Assignment::from_record("assignments", &bad_done).unwrap_err();
        assert!(matches!(err, Error::InvalidRecord { .. }));
    }

    #[test]
    fn test_to_record_field_order() {
        let record = Assignment::new("x", "anna", 2).to_record();
        assert_eq!(record.fields().collect::<Vec<_>>(), REQUIRED_FIELDS);
    }

    #[tokio::test]
    async fn test_create_requires_editor() {
        let (_store, board) = create_board(DeletionPolicy::default());
        let assignment = Assignment::new("x", "anna", 1);

        for role in [Role::Viewer, Role::RestrictedPublisher, Role::Unauthenticated] {
            let err = board
                .create(&Identity::new("someone", role), &assignment)
                .await
                .unwrap_err();
            assert!(matches!(err, Error::CapabilityDenied { .. }));
        }
        assert!(board.list().await.is_empty());
        assert_eq!(board.create(&editor("anna"), &assignment).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_owner_toggles_twice() {
        let (_store, board) = seeded(DeletionPolicy::default()).await;
        let anna = editor("anna");

        let after = board.toggle_done(&anna, 0).await.unwrap();
        assert_eq!(after.status(), AssignmentStatus::Done);
        assert!(board.list().await[0].1.done);

        let after = board.toggle_done(&anna, 0).await.unwrap();
        assert_eq!(after.status(), AssignmentStatus::Pending);
        assert!(!board.list().await[0].1.done);
    }

    #[tokio::test]
    async fn test_non_owner_cannot_toggle() {
        let (store, board) = seeded(DeletionPolicy::default()).await;
        let before = store.read("assignments").await;

        let err = board.toggle_done(&editor("anna"), 1).await.unwrap_err();
        assert!(matches!(err, Error::NotOwner { action: "toggle", index: 1, .. }));
        assert_eq!(store.read("assignments").await, before);
    }

    #[tokio::test]
    async fn test_viewer_owner_may_toggle() {
        let (_store, board) = seeded(DeletionPolicy::default()).await;
        let shruti = Identity::new("shruti", Role::Viewer);
        assert!(board.toggle_done(&shruti, 1).await.unwrap().done);
    }

    #[tokio::test]
    async fn test_toggle_failed_write_keeps_state() {
        let (store, board) = seeded(DeletionPolicy::default()).await;
        store.set_fail_writes(true);

        let err = board.toggle_done(&editor("anna"), 0).await.unwrap_err();
        assert!(matches!(err, Error::StoreWrite { .. }));
        store.set_fail_writes(false);
        assert!(!board.list().await[0].1.done);
    }

    #[tokio::test]
    async fn test_views_flags() {
        let (_store, board) = seeded(DeletionPolicy::OwnerOnly).await;
        let views = board.views(&editor("anna")).await;

        assert_eq!(views.len(), 2);
        assert!(views[0].can_toggle && views[0].can_delete);
        assert!(!views[1].can_toggle && !views[1].can_delete);
    }

    #[tokio::test]
    async fn test_delete_owner_or_editor() {
        let (_store, board) = seeded(DeletionPolicy::OwnerOrEditor).await;

        let removed = board.delete(&editor("anna"), 1).await.unwrap();
        assert_eq!(removed.assigned_to, "shruti");
        let removed = board
            .delete(&Identity::new("anna", Role::Viewer), 0)
            .await
            .unwrap();
        assert_eq!(removed.task, "Call school");
        assert!(board.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_delete_owner_only() {
        let (_store, board) = seeded(DeletionPolicy::OwnerOnly).await;

        let err = board.delete(&editor("anna"), 1).await.unwrap_err();
        assert!(matches!(err, Error::NotOwner { action: "delete", .. }));
        board.delete(&editor("shruti"), 1).await.unwrap();
        assert_eq!(board.list().await.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_editor_only() {
        let (store, board) = seeded(DeletionPolicy::EditorOnly).await;
        store.set_fail_writes(true);

        // refused before the store is touched
        let err = board
            .delete(&Identity::new("anna", Role::Viewer), 0)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::CapabilityDenied { .. }));

        store.set_fail_writes(false);
        board.delete(&editor("shruti"), 0).await.unwrap();
    }

    #[tokio::test]
    async fn test_malformed_target() {
        let (store, board) = create_board(DeletionPolicy::default());
        store
            .write("assignments", &[Record::new().with("task", "orphan")])
            .await
            .unwrap();

        assert!(board.list().await.is_empty());
        let err = board.toggle_done(&editor("anna"), 0).await.unwrap_err();
        assert!(matches!(err, Error::InvalidRecord { .. }));
        let err = board.delete(&editor("anna"), 0).await.unwrap_err();
        assert!(matches!(err, Error::InvalidRecord { .. }));
    }

    #[tokio::test]
    async fn test_toggle_out_of_range() {
        let (_store, board) = seeded(DeletionPolicy::default()).await;
        let err = board.toggle_done(&editor("anna"), 9).await.unwrap_err();
        assert!(matches!(err, Error::RecordNotFound { index: 9, len: 2, .. }));
    }
}
