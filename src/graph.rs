//! Interaction Graph
//!
//! Stores the bipartite user↔item relation behind a single `RwLock` and owns
//! identifier interning for both sides.
//!
//! External identifiers are arbitrary caller-supplied strings. On first
//! sight each is assigned a dense, zero-based integer handle ([`UserId`] /
//! [`ItemId`]); all adjacency storage and similarity-cache keys work on
//! handles so set operations hash and compare integers, not strings.
//! Handles are never reused or reassigned and there is no deletion.
//!
//! The two adjacency maps (`user_to_items` and its inverse `item_to_users`)
//! are mirror images: for every stored pair (u, i), `i ∈ items_of(u)` iff
//! `u ∈ users_of(i)`. Both maps are updated under one write lock, so readers
//! observe either the pre- or post-insertion state, never a partial one.
//!
//! Every item additionally carries an audience version counter, bumped on
//! each effective insertion touching it. The similarity cache compares these
//! versions on lookup, which turns the reference implementation's silent
//! cache staleness into an explicit invalidation policy.

use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::trace;

use crate::error::{Error, Result};

// ============================================================================
// Handles
// ============================================================================

/// Dense internal handle for a user, assigned monotonically on first sight
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UserId(pub(crate) u32);

/// Dense internal handle for an item, assigned monotonically on first sight
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ItemId(pub(crate) u32);

impl UserId {
    /// Zero-based index of this handle
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl ItemId {
    /// Zero-based index of this handle
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "u{}", self.0)
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "i{}", self.0)
    }
}

// ============================================================================
// Interner
// ============================================================================

/// Bidirectional mapping between external string identifiers and dense
/// integer handles. Entries are created lazily and never removed.
#[derive(Debug, Default)]
struct Interner {
    lookup: HashMap<String, u32>,
    tokens: Vec<String>,
}

impl Interner {
    /// Return the existing handle for `token`, or allocate the next
    /// sequential one starting at 0.
    fn intern(&mut self, token: &str) -> u32 {
        if let Some(&id) = self.lookup.get(token) {
            return id;
        }
        let id = self.tokens.len() as u32;
        self.lookup.insert(token.to_string(), id);
        self.tokens.push(token.to_string());
        id
    }

    fn get(&self, token: &str) -> Option<u32> {
        self.lookup.get(token).copied()
    }

    fn resolve(&self, id: u32) -> Option<&str> {
        self.tokens.get(id as usize).map(String::as_str)
    }

    fn len(&self) -> usize {
        self.tokens.len()
    }
}

// ============================================================================
// Graph state
// ============================================================================

#[derive(Debug, Default)]
struct GraphInner {
    users: Interner,
    items: Interner,
    user_to_items: HashMap<UserId, HashSet<ItemId>>,
    item_to_users: HashMap<ItemId, HashSet<UserId>>,
    /// Bumped per item on every effective insertion touching its audience
    audience_versions: HashMap<ItemId, u64>,
    /// Number of distinct (user, item) edges stored
    interaction_count: u64,
}

/// Thread-safe bipartite user↔item interaction graph
#[derive(Debug, Default)]
pub struct InteractionGraph {
    inner: RwLock<GraphInner>,
}

impl InteractionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn read_inner(&self) -> RwLockReadGuard<'_, GraphInner> {
        // A poisoned lock means a panic mid-operation elsewhere; the stored
        // data is still the last consistent state, so recover it.
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_inner(&self) -> RwLockWriteGuard<'_, GraphInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Intern a user identifier, allocating a handle on first sight.
    /// Idempotent: the same identifier always maps to the same handle.
    pub fn intern_user(&self, user: &str) -> Result<UserId> {
        validate_identifier(user, "user")?;
        Ok(UserId(self.write_inner().users.intern(user)))
    }

    /// Intern an item identifier, allocating a handle on first sight.
    pub fn intern_item(&self, item: &str) -> Result<ItemId> {
        validate_identifier(item, "item")?;
        Ok(ItemId(self.write_inner().items.intern(item)))
    }

    /// Record one interaction edge between a user and an item.
    ///
    /// Interns both identifiers, then inserts the item into the user's
    /// history and the user into the item's audience under one write lock.
    /// Re-adding an existing pair is a no-op; the return value reports
    /// whether the edge was new.
    pub fn add_interaction(&self, user: &str, item: &str) -> Result<bool> {
        validate_identifier(user, "user")?;
        validate_identifier(item, "item")?;

        let mut inner = self.write_inner();
        let uid = UserId(inner.users.intern(user));
        let iid = ItemId(inner.items.intern(item));

        let inserted = inner.user_to_items.entry(uid).or_default().insert(iid);
        if inserted {
            inner.item_to_users.entry(iid).or_default().insert(uid);
            *inner.audience_versions.entry(iid).or_insert(0) += 1;
            inner.interaction_count += 1;
            trace!(user = %uid, item = %iid, "interaction recorded");
        }

        Ok(inserted)
    }

    /// The user's history: handles of every item they interacted with.
    /// Unseen users yield an empty set, not an error.
    pub fn items_of(&self, user: &str) -> HashSet<ItemId> {
        let inner = self.read_inner();
        inner
            .users
            .get(user)
            .and_then(|uid| inner.user_to_items.get(&UserId(uid)))
            .cloned()
            .unwrap_or_default()
    }

    /// The item's audience: handles of every user who interacted with it.
    /// Unseen items yield an empty set.
    pub fn users_of(&self, item: ItemId) -> HashSet<UserId> {
        self.read_inner()
            .item_to_users
            .get(&item)
            .cloned()
            .unwrap_or_default()
    }

    /// Current audience version of an item (0 if never interacted with)
    pub fn audience_version(&self, item: ItemId) -> u64 {
        self.read_inner()
            .audience_versions
            .get(&item)
            .copied()
            .unwrap_or(0)
    }

    /// Look up a user's handle without interning
    pub fn user_handle(&self, user: &str) -> Option<UserId> {
        self.read_inner().users.get(user).map(UserId)
    }

    /// Look up an item's handle without interning
    pub fn item_handle(&self, item: &str) -> Option<ItemId> {
        self.read_inner().items.get(item).map(ItemId)
    }

    /// Translate a user handle back to its external identifier
    pub fn resolve_user(&self, user: UserId) -> Option<String> {
        self.read_inner().users.resolve(user.0).map(str::to_string)
    }

    /// Translate an item handle back to its external identifier
    pub fn resolve_item(&self, item: ItemId) -> Option<String> {
        self.read_inner().items.resolve(item.0).map(str::to_string)
    }

    /// Number of distinct users seen
    pub fn user_count(&self) -> usize {
        self.read_inner().users.len()
    }

    /// Number of distinct items seen
    pub fn item_count(&self) -> usize {
        self.read_inner().items.len()
    }

    /// Number of distinct (user, item) edges stored
    pub fn interaction_count(&self) -> u64 {
        self.read_inner().interaction_count
    }

    /// A consistent read snapshot for multi-step queries. The engine holds
    /// one view for an entire recommendation so candidate generation and
    /// scoring observe the same graph state.
    pub(crate) fn view(&self) -> GraphView<'_> {
        GraphView {
            inner: self.read_inner(),
        }
    }
}

// ============================================================================
// Read snapshot
// ============================================================================

/// Borrowed, consistent view of the graph under a read lock
pub(crate) struct GraphView<'a> {
    inner: RwLockReadGuard<'a, GraphInner>,
}

impl GraphView<'_> {
    pub(crate) fn user_handle(&self, user: &str) -> Option<UserId> {
        self.inner.users.get(user).map(UserId)
    }

    pub(crate) fn history(&self, user: UserId) -> Option<&HashSet<ItemId>> {
        self.inner.user_to_items.get(&user)
    }

    pub(crate) fn audience(&self, item: ItemId) -> Option<&HashSet<UserId>> {
        self.inner.item_to_users.get(&item)
    }

    pub(crate) fn audience_version(&self, item: ItemId) -> u64 {
        self.inner.audience_versions.get(&item).copied().unwrap_or(0)
    }

    pub(crate) fn external_item(&self, item: ItemId) -> Option<&str> {
        self.inner.items.resolve(item.0)
    }
}

// ============================================================================
// Validation
// ============================================================================

/// Reject empty or whitespace-only identifiers at the boundary instead of
/// interning an unreachable phantom entity.
fn validate_identifier(token: &str, kind: &'static str) -> Result<()> {
    if token.trim().is_empty() {
        return Err(Error::empty_identifier(kind));
    }
    Ok(())
}
