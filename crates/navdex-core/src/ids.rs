//! Identifier model and the run-wide id unifier.
//!
//! Record streams carry ids that are only unique inside the crate that
//! emitted them. [`IdUnifier`] maps every `(crate name, local id)` pair to a
//! single [`GlobalId`] for the whole run:
//!
//! - Local id `0` is the universal "no target" sentinel. It always maps to
//!   [`GlobalId::NONE`] and never consumes a counter value.
//! - The first lookup of a pair allocates the next counter value; later
//!   lookups are memoized reads and never renumber.
//! - Each crate additionally owns one pre-allocated id for its synthetic root
//!   module, handed out by [`IdUnifier::crate_root`].
//!
//! Keying by crate name rather than by unit means a reference from one unit
//! into another indexed crate lands on the same global id that crate's own
//! definition receives, regardless of processing order.
//!
//! [`CrateTable`] holds the per-unit mapping from crate numbers (as written in
//! `refidcrate`-style attributes) to canonical crate names.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::record::RecordError;

// ============================================================================
// ID Types
// ============================================================================

/// Run-wide unique entity id.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord,
)]
pub struct GlobalId(pub u32);

impl GlobalId {
    /// The "no target" sentinel.
    pub const NONE: GlobalId = GlobalId(0);

    /// Create a new global ID.
    pub fn new(id: u32) -> Self {
        GlobalId(id)
    }

    /// True for the sentinel.
    pub fn is_none(&self) -> bool {
        self.0 == 0
    }

    /// `None` for the sentinel, `Some(self)` otherwise.
    pub fn resolved(self) -> Option<GlobalId> {
        if self.is_none() {
            None
        } else {
            Some(self)
        }
    }
}

impl fmt::Display for GlobalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Id as emitted by the producer, unique only within its crate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocalId(pub u32);

impl LocalId {
    /// The "no target" sentinel.
    pub const SENTINEL: LocalId = LocalId(0);

    /// Create a new local ID.
    pub fn new(id: u32) -> Self {
        LocalId(id)
    }

    /// True for the sentinel.
    pub fn is_sentinel(&self) -> bool {
        self.0 == 0
    }
}

/// Unit-local crate number. `0` always denotes the unit's own crate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CrateNum(pub u32);

impl CrateNum {
    /// The unit's own crate.
    pub const LOCAL: CrateNum = CrateNum(0);

    /// Create a new crate number.
    pub fn new(num: u32) -> Self {
        CrateNum(num)
    }
}

/// A local id qualified by the crate number it belongs to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CrateLocalId {
    pub id: LocalId,
    pub krate: CrateNum,
}

impl CrateLocalId {
    /// Create an id in an explicit crate.
    pub fn new(id: LocalId, krate: CrateNum) -> Self {
        CrateLocalId { id, krate }
    }

    /// Create an id in the unit's own crate.
    pub fn local(id: LocalId) -> Self {
        CrateLocalId {
            id,
            krate: CrateNum::LOCAL,
        }
    }
}

// ============================================================================
// IdUnifier
// ============================================================================

/// Maps `(crate name, local id)` pairs to run-wide [`GlobalId`]s.
#[derive(Debug, Default)]
pub struct IdUnifier {
    ids: HashMap<String, HashMap<LocalId, GlobalId>>,
    roots: HashMap<String, GlobalId>,
    allocated: u32,
}

impl IdUnifier {
    /// Create an empty unifier. The first allocation is `GlobalId(1)`.
    pub fn new() -> Self {
        IdUnifier::default()
    }

    /// Return the global id for a pair, allocating it on first sight.
    pub fn global_id(&mut self, crate_name: &str, local: LocalId) -> GlobalId {
        if local.is_sentinel() {
            return GlobalId::NONE;
        }
        if let Some(id) = self.lookup(crate_name, local) {
            return id;
        }
        let id = self.allocate();
        self.ids
            .entry(crate_name.to_string())
            .or_default()
            .insert(local, id);
        id
    }

    /// Memoized read without allocation.
    pub fn lookup(&self, crate_name: &str, local: LocalId) -> Option<GlobalId> {
        if local.is_sentinel() {
            return Some(GlobalId::NONE);
        }
        self.ids
            .get(crate_name)
            .and_then(|by_local| by_local.get(&local))
            .copied()
    }

    /// The pre-allocated id of a crate's synthetic root module.
    pub fn crate_root(&mut self, crate_name: &str) -> GlobalId {
        if let Some(id) = self.roots.get(crate_name) {
            return *id;
        }
        let id = self.allocate();
        self.roots.insert(crate_name.to_string(), id);
        id
    }

    /// Name of the crate whose root module is `id`, if any.
    pub fn root_crate(&self, id: GlobalId) -> Option<&str> {
        self.roots
            .iter()
            .find(|(_, root)| **root == id)
            .map(|(name, _)| name.as_str())
    }

    /// Number of ids handed out so far (the sentinel is not counted).
    pub fn allocated(&self) -> u32 {
        self.allocated
    }

    fn allocate(&mut self) -> GlobalId {
        self.allocated += 1;
        GlobalId(self.allocated)
    }
}

// ============================================================================
// CrateTable
// ============================================================================

/// A crate known to the unit currently being ingested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrateEntry {
    /// Canonical crate name.
    pub name: String,
    /// Global id of the crate's synthetic root module.
    pub root: GlobalId,
}

/// Per-unit mapping from crate numbers to canonical crate names.
///
/// Crate `0` is registered from the unit's `crate` record. Other numbers are
/// registered by `external_crate` records, which must all appear before the
/// `end_external_crates` record closes the block.
#[derive(Debug, Clone)]
pub struct CrateTable {
    crates: HashMap<CrateNum, CrateEntry>,
    closed: bool,
}

impl CrateTable {
    /// Create a table whose crate `0` is the unit's own crate.
    pub fn new(local: CrateEntry) -> Self {
        let mut crates = HashMap::new();
        crates.insert(CrateNum::LOCAL, local);
        CrateTable {
            crates,
            closed: false,
        }
    }

    /// The unit's own crate.
    pub fn local(&self) -> &CrateEntry {
        // Crate 0 is inserted by the constructor and never removed.
        &self.crates[&CrateNum::LOCAL]
    }

    /// Register an external crate number.
    pub fn register(&mut self, num: CrateNum, entry: CrateEntry) -> Result<(), RecordError> {
        if self.closed {
            return Err(RecordError::ExternalCrateAfterEnd { name: entry.name });
        }
        if num == CrateNum::LOCAL {
            return Err(RecordError::InvalidValue {
                attr: "crate",
                value: "0".to_string(),
            });
        }
        self.crates.insert(num, entry);
        Ok(())
    }

    /// Close the external crate block.
    pub fn close(&mut self) {
        self.closed = true;
    }

    /// Whether `end_external_crates` has been seen.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Look up a crate number.
    pub fn get(&self, num: CrateNum) -> Result<&CrateEntry, RecordError> {
        self.crates
            .get(&num)
            .ok_or(RecordError::UnknownCrate { num: num.0 })
    }
}

// ============================================================================
// Tests
// ============================================================================
