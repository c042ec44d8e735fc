//! Realtime change feed.
//!
//! ARCHITECTURE
//! ============
//! Route handlers publish a [`Change`] after every committed mutation. The
//! [`ChangeHub`] fans it out over a `tokio::sync::broadcast` channel to every
//! websocket connection and to the stats refresher. Each connection keeps a
//! [`Subscriptions`] set and turns matching changes into `change:<op>` frames
//! carrying the full row, so a client can merge by id instead of refetching.
//!
//! SCOPING
//! =======
//! Admins may watch every table. Workers see only rows they own; clients see
//! their projects and the tasks, approved photos and check-ins of those
//! projects. Scoping is applied on delivery, on top of any client filter.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::frame::{Data, ErrorCode, Frame};
use crate::model::UserRole;

// =============================================================================
// CHANGE
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Profiles,
    Projects,
    Tasks,
    CheckIns,
    Photos,
    Issues,
    Notifications,
}

impl Table {
    pub const ALL: [Table; 7] = [
        Table::Profiles,
        Table::Projects,
        Table::Tasks,
        Table::CheckIns,
        Table::Photos,
        Table::Issues,
        Table::Notifications,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Table::Profiles => "profiles",
            Table::Projects => "projects",
            Table::Tasks => "tasks",
            Table::CheckIns => "check_ins",
            Table::Photos => "photos",
            Table::Issues => "issues",
            Table::Notifications => "notifications",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == raw)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

impl ChangeOp {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeOp::Insert => "insert",
            ChangeOp::Update => "update",
            ChangeOp::Delete => "delete",
        }
    }
}

/// One committed row change. `row` is the full row after the change, or the
/// last known row for deletes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Change {
    pub table: Table,
    pub op: ChangeOp,
    pub id: Uuid,
    pub row: Value,
}

impl Change {
    pub fn new(table: Table, op: ChangeOp, id: Uuid, row: &impl Serialize) -> Self {
        let row = serde_json::to_value(row).unwrap_or(Value::Null);
        Self { table, op, id, row }
    }

    fn column(&self, name: &str) -> Option<&Value> {
        self.row.get(name)
    }

    fn column_is(&self, name: &str, id: Uuid) -> bool {
        self.column(name).and_then(Value::as_str).and_then(|v| Uuid::parse_str(v).ok()) == Some(id)
    }

    fn column_uuid(&self, name: &str) -> Option<Uuid> {
        self.column(name).and_then(Value::as_str).and_then(|v| Uuid::parse_str(v).ok())
    }

    #[must_use]
    pub fn to_frame(&self, subscription_ids: &[Uuid]) -> Frame {
        Frame::request(format!("change:{}", self.op.as_str()), Data::new())
            .with_data("table", self.table.as_str())
            .with_data("id", self.id.to_string())
            .with_data("row", self.row.clone())
            .with_data(
                "subscriptions",
                subscription_ids.iter().map(ToString::to_string).collect::<Vec<_>>(),
            )
    }
}

/// Frame sent when a connection fell behind the hub and must refetch.
#[must_use]
pub fn resync_frame(skipped: u64) -> Frame {
    Frame::request("change:resync", Data::new()).with_data("skipped", skipped)
}

// =============================================================================
// HUB
// =============================================================================

/// Process-wide broadcast of committed changes.
#[derive(Clone)]
pub struct ChangeHub {
    tx: broadcast::Sender<Arc<Change>>,
}

impl ChangeHub {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish a change. Returns how many receivers got it.
    pub fn publish(&self, change: Change) -> usize {
        tracing::debug!(table = change.table.as_str(), op = change.op.as_str(), id = %change.id, "change published");
        self.tx.send(Arc::new(change)).unwrap_or(0)
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<Change>> {
        self.tx.subscribe()
    }
}

// =============================================================================
// SUBSCRIPTIONS
// =============================================================================

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RealtimeError {
    #[error("missing field: {0}")]
    MissingField(&'static str),
    #[error("unknown table: {0}")]
    UnknownTable(String),
    #[error("table {0} is not available to this role")]
    TableNotAllowed(&'static str),
    #[error("invalid filter: {0}")]
    InvalidFilter(String),
    #[error("unknown subscription: {0}")]
    UnknownSubscription(String),
}

impl ErrorCode for RealtimeError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::MissingField(_) | Self::InvalidFilter(_) => "E_VALIDATION",
            Self::UnknownTable(_) | Self::UnknownSubscription(_) => "E_NOT_FOUND",
            Self::TableNotAllowed(_) => "E_FORBIDDEN",
        }
    }
}

/// Equality filter on one column of the row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub column: String,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Subscription {
    pub id: Uuid,
    pub table: Table,
    pub filter: Option<Filter>,
}

impl Subscription {
    fn matches(&self, change: &Change) -> bool {
        self.table == change.table
            && self
                .filter
                .as_ref()
                .is_none_or(|f| change.column(&f.column) == Some(&f.value))
    }
}

/// What a connection is allowed to see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    Admin,
    Worker { id: Uuid },
    Client { id: Uuid, projects: HashSet<Uuid> },
}

impl Scope {
    #[must_use]
    pub fn for_role(role: UserRole, id: Uuid, client_projects: HashSet<Uuid>) -> Self {
        match role {
            UserRole::Admin => Scope::Admin,
            UserRole::Worker => Scope::Worker { id },
            UserRole::Client => Scope::Client { id, projects: client_projects },
        }
    }

    #[must_use]
    pub fn can_watch(&self, table: Table) -> bool {
        match self {
            Scope::Admin => true,
            Scope::Worker { .. } => matches!(table, Table::Tasks | Table::CheckIns | Table::Issues | Table::Notifications),
            Scope::Client { .. } => matches!(
                table,
                Table::Projects | Table::Tasks | Table::CheckIns | Table::Photos | Table::Notifications
            ),
        }
    }

    /// Owner check applied to every delivered change.
    #[must_use]
    pub fn allows(&self, change: &Change) -> bool {
        if !self.can_watch(change.table) {
            return false;
        }
        match self {
            Scope::Admin => true,
            Scope::Worker { id } => match change.table {
                Table::Tasks => change.column_is("assigned_to", *id),
                Table::CheckIns => change.column_is("worker_id", *id),
                Table::Issues => change.column_is("reported_by", *id),
                Table::Notifications => change.column_is("user_id", *id),
                _ => false,
            },
            Scope::Client { id, projects } => {
                let owns = |column: &str| change.column_uuid(column).is_some_and(|p| projects.contains(&p));
                match change.table {
                    Table::Projects => change.column_is("client_id", *id) || projects.contains(&change.id),
                    Table::Tasks | Table::CheckIns => owns("project_id"),
                    Table::Photos => owns("project_id") && change.column("is_approved") == Some(&Value::Bool(true)),
                    Table::Notifications => change.column_is("user_id", *id),
                    _ => false,
                }
            }
        }
    }

    /// Track a project newly assigned to this client.
    pub fn observe(&mut self, change: &Change) {
        if let Scope::Client { id, projects } = self {
            if change.table == Table::Projects {
                if change.op != ChangeOp::Delete && change.column_is("client_id", *id) {
                    projects.insert(change.id);
                } else {
                    projects.remove(&change.id);
                }
            }
        }
    }
}

/// Per-connection subscription set.
#[derive(Debug)]
pub struct Subscriptions {
    scope: Scope,
    entries: BTreeMap<Uuid, Subscription>,
}

impl Subscriptions {
    #[must_use]
    pub fn new(scope: Scope) -> Self {
        Self { scope, entries: BTreeMap::new() }
    }

    /// Swap in a reloaded scope, keeping the subscriptions.
    pub fn replace_scope(&mut self, scope: Scope) {
        self.scope = scope;
    }

    pub fn subscribe(&mut self, table: &str, filter: Option<Filter>) -> Result<&Subscription, RealtimeError> {
        let table = Table::parse(table).ok_or_else(|| RealtimeError::UnknownTable(table.to_owned()))?;
        if !self.scope.can_watch(table) {
            return Err(RealtimeError::TableNotAllowed(table.as_str()));
        }
        if let Some(f) = &filter {
            if f.column.trim().is_empty() {
                return Err(RealtimeError::InvalidFilter("column is empty".into()));
            }
        }
        let id = Uuid::new_v4();
        Ok(self.entries.entry(id).or_insert(Subscription { id, table, filter }))
    }

    pub fn unsubscribe(&mut self, id: Uuid) -> Result<Subscription, RealtimeError> {
        self.entries.remove(&id).ok_or_else(|| RealtimeError::UnknownSubscription(id.to_string()))
    }

    pub fn list(&self) -> impl Iterator<Item = &Subscription> {
        self.entries.values()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Frame for `change` when it passes the scope and at least one subscription.
    /// A client whose project is deleted or reassigned still gets that change.
    pub fn frame_for(&mut self, change: &Change) -> Option<Frame> {
        let visible_before = self.scope.allows(change);
        self.scope.observe(change);
        if !visible_before && !self.scope.allows(change) {
            return None;
        }
        let matched: Vec<Uuid> = self.entries.values().filter(|s| s.matches(change)).map(|s| s.id).collect();
        (!matched.is_empty()).then(|| change.to_frame(&matched))
    }
}

#[cfg(test)]
#[path = "realtime_test.rs"]
mod tests;
