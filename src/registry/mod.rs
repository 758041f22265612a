//! Per-method decision registry
//!
//! One `Registry` is created per search run and passed down to the builder
//! and the injector. Entries are written during a class's one-time analysis
//! pass and only read afterwards; `DashMap` shards make both sides safe to
//! share between threads without an outer lock.

pub mod pool;

pub use pool::GraphPool;

use crate::bytecode::{AccessFlags, MethodKey};
use crate::cfg::{BranchId, VertexId};
use dashmap::DashMap;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::debug;

/// Methods that are never analyzed, whatever their flags
const EXCLUDED_METHODS: &[&str] = &["<clinit>", "__STATIC_RESET"];

const CONSTRUCTOR: &str = "<init>";

/// Decision metadata of one method
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MethodEntry {
    /// Reportable decisions (every switch case counts once)
    pub decision_count: u32,
    pub is_branchless: bool,
    /// Decision vertex -> anchor id (the first case id for switches)
    pub branch_id_map: BTreeMap<VertexId, BranchId>,
    /// (switch vertex, case key) -> case id
    pub case_ids: BTreeMap<(VertexId, i32), BranchId>,
    pub instrumented: bool,
}

/// Registry state of one class
#[derive(Debug, Clone, Default)]
pub struct ClassEntry {
    pub methods: BTreeMap<String, MethodEntry>,
    pub usable: BTreeSet<String>,
}

/// Process-wide (per search run) decision registry
#[derive(Debug)]
pub struct Registry {
    next_id: AtomicU32,
    classes: DashMap<String, ClassEntry>,
    analyze_constructors: bool,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU32::new(0),
            classes: DashMap::new(),
            analyze_constructors: true,
        }
    }

    /// Whether instance initializers count as usable methods
    pub fn with_constructors(mut self, analyze_constructors: bool) -> Self {
        self.analyze_constructors = analyze_constructors;
        self
    }

    /// Id of the decision at `vertex` (or of one of its switch cases),
    /// allocating a fresh one the first time the position is seen.
    ///
    /// Allocation and the decision count update happen under the class
    /// entry's lock, so concurrent callers always agree on the id.
    pub fn decision_id(&self, key: &MethodKey, vertex: VertexId, case: Option<i32>) -> BranchId {
        let mut class = self.classes.entry(key.class_name.clone()).or_default();
        let entry = class.methods.entry(key.method.clone()).or_default();

        let existing = match case {
            None => entry.branch_id_map.get(&vertex).copied(),
            Some(k) => entry.case_ids.get(&(vertex, k)).copied(),
        };
        if let Some(id) = existing {
            return id;
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        match case {
            None => {
                entry.branch_id_map.insert(vertex, id);
            }
            Some(k) => {
                entry.case_ids.insert((vertex, k), id);
                entry.branch_id_map.entry(vertex).or_insert(id);
            }
        }
        entry.decision_count += 1;
        debug!(method = %key, vertex, ?case, branch_id = id, "allocated decision id");
        id
    }

    /// Count one more decision for a method without allocating an id
    pub fn count_decision(&self, class_name: &str, method: &str) {
        self.with_method(class_name, method, |entry| entry.decision_count += 1);
    }

    pub fn record_branchless(&self, class_name: &str, method: &str) {
        self.with_method(class_name, method, |entry| entry.is_branchless = true);
    }

    pub fn record_usable(&self, class_name: &str, method: &str) {
        let mut class = self.classes.entry(class_name.to_string()).or_default();
        class.usable.insert(method.to_string());
    }

    /// Whether a method takes part in the search at all.
    ///
    /// `method` may be a bare name or a name followed by its descriptor.
    pub fn is_usable_method(&self, method: &str, access: AccessFlags) -> bool {
        if access.contains(AccessFlags::SYNTHETIC)
            || access.contains(AccessFlags::BRIDGE)
            || access.contains(AccessFlags::ABSTRACT)
        {
            return false;
        }
        if EXCLUDED_METHODS.iter().any(|name| method.starts_with(name)) {
            return false;
        }
        if method.starts_with(CONSTRUCTOR) {
            return self.analyze_constructors && !access.contains(AccessFlags::PRIVATE);
        }
        true
    }

    /// Mark a method instrumented; false if it already was
    pub fn mark_instrumented(&self, key: &MethodKey) -> bool {
        let mut class = self.classes.entry(key.class_name.clone()).or_default();
        let entry = class.methods.entry(key.method.clone()).or_default();
        if entry.instrumented {
            false
        } else {
            entry.instrumented = true;
            true
        }
    }

    pub fn is_instrumented(&self, key: &MethodKey) -> bool {
        self.method_entry(key).is_some_and(|e| e.instrumented)
    }

    // ----- read API -----

    pub fn branch_count(&self, class_name: &str, method: &str) -> u32 {
        self.classes
            .get(class_name)
            .and_then(|c| c.methods.get(method).map(|m| m.decision_count))
            .unwrap_or(0)
    }

    /// Number of decision ids handed out so far
    pub fn total_branches(&self) -> u32 {
        self.next_id.load(Ordering::SeqCst)
    }

    pub fn branchless_methods(&self) -> Vec<MethodKey> {
        self.collect_methods(|class, out| {
            for (method, entry) in &class.methods {
                if entry.is_branchless && class.usable.contains(method) {
                    out.push(method.clone());
                }
            }
        })
    }

    pub fn usable_methods(&self) -> Vec<MethodKey> {
        self.collect_methods(|class, out| out.extend(class.usable.iter().cloned()))
    }

    pub fn branch_id_for(&self, key: &MethodKey, vertex: VertexId) -> Option<BranchId> {
        self.classes
            .get(&key.class_name)?
            .methods
            .get(&key.method)?
            .branch_id_map
            .get(&vertex)
            .copied()
    }

    pub fn case_id_for(&self, key: &MethodKey, vertex: VertexId, case: i32) -> Option<BranchId> {
        self.classes
            .get(&key.class_name)?
            .methods
            .get(&key.method)?
            .case_ids
            .get(&(vertex, case))
            .copied()
    }

    /// Snapshot of a method's entry
    pub fn method_entry(&self, key: &MethodKey) -> Option<MethodEntry> {
        self.classes
            .get(&key.class_name)?
            .methods
            .get(&key.method)
            .cloned()
    }

    pub fn class_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.classes.iter().map(|c| c.key().clone()).collect();
        names.sort();
        names
    }

    fn with_method(&self, class_name: &str, method: &str, f: impl FnOnce(&mut MethodEntry)) {
        let mut class = self.classes.entry(class_name.to_string()).or_default();
        f(class.methods.entry(method.to_string()).or_default());
    }

    fn collect_methods(&self, f: impl Fn(&ClassEntry, &mut Vec<String>)) -> Vec<MethodKey> {
        let mut keys = Vec::new();
        for class in self.classes.iter() {
            let mut methods = Vec::new();
            f(class.value(), &mut methods);
            keys.extend(
                methods
                    .into_iter()
                    .map(|m| MethodKey::new(class.key().clone(), m)),
            );
        }
        keys.sort();
        keys
    }
}
