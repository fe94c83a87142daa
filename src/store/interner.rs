//! Structural deduplication of nodes.
//!
//! Every node is created through an [`Interner`]. The interner maps a
//! [`StructuralKey`] to the one live node with that key, so building the same
//! (kind, args, continuation) twice returns the same `Arc`.
//!
//! Entries are never evicted. A process that keeps producing distinct chains
//! grows the cache without bound.

use super::args::{canonicalize, CanonicalArgs};
use super::key::StructuralKey;
use super::types::{NodeId, TypeTag};
use crate::chain::error::ConstructionError;
use crate::chain::node::{Chain, Check, Link, Node};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InternerConfig {
    /// Number of independently locked buckets. Clamped to at least 1.
    pub shards: usize,
}

impl Default for InternerConfig {
    fn default() -> Self { Self { shards: 16 } }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InternerStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

pub(crate) struct Shared {
    shards: Box<[RwLock<HashMap<StructuralKey, Chain>>]>,
    hits: AtomicU64,
    misses: AtomicU64,
}

/// A handle to a node cache. Clones share the same cache.
#[derive(Clone)]
pub struct Interner(pub(crate) Arc<Shared>);

static GLOBAL: OnceLock<Interner> = OnceLock::new();

impl Interner {
    pub fn new() -> Self { Self::with_config(InternerConfig::default()) }

    pub fn with_config(config: InternerConfig) -> Self {
        let shards = (0..config.shards.max(1)).map(|_| RwLock::new(HashMap::new())).collect();
        Self(Arc::new(Shared { shards, hits: AtomicU64::new(0), misses: AtomicU64::new(0) }))
    }

    /// The process-wide interner used by [`Chain::of`] and the `&` operator.
    pub fn global() -> Self {
        GLOBAL.get_or_init(Interner::new).clone()
    }

    /// Builds the canonical node for `check` followed by `next`.
    ///
    /// A `next` chain owned by another interner is adopted first. On a cache hit
    /// `check` is dropped and the existing node is returned.
    pub fn build<C: Check>(&self, check: C, next: Option<&Chain>) -> Result<Chain, ConstructionError> {
        let tag = TypeTag::of::<C>();
        let args = canonicalize(&check.args()).map_err(|e| ConstructionError::UnhashableArgument {
            kind: tag,
            path: e.path,
            reason: e.reason,
        })?;
        let next = next.map(|n| self.adopt(n));
        Ok(self.intern(tag, args, Arc::new(check), next))
    }

    /// Shorthand for a single-node chain.
    pub fn node<C: Check>(&self, check: C) -> Result<Chain, ConstructionError> {
        self.build(check, None)
    }

    pub(crate) fn intern(
        &self,
        tag: TypeTag,
        args: CanonicalArgs,
        check: Arc<dyn Check>,
        next: Option<Chain>,
    ) -> Chain {
        let key = StructuralKey::new(tag, args, next.as_ref().map(|n| (n.id(), n.fingerprint())));
        let shard = &self.0.shards[key.fingerprint().0 as usize % self.0.shards.len()];

        // 1. Fast path: shared lock only.
        if let Some(found) = shard.read().get(&key) {
            self.0.hits.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(kind = %tag, fingerprint = %key.fingerprint(), "interner: hit");
            return found.clone();
        }

        // 2. Slow path: re-check under the write lock, then insert.
        let mut map = shard.write();
        match map.entry(key) {
            Entry::Occupied(entry) => {
                self.0.hits.fetch_add(1, Ordering::Relaxed);
                entry.get().clone()
            }
            Entry::Vacant(entry) => {
                let len = next.as_ref().map_or(0, |n| n.len()) + 1;
                let chain = Chain(Arc::new(Node {
                    id: NodeId::fresh(),
                    key: entry.key().clone(),
                    check,
                    next,
                    len,
                    home: Arc::downgrade(&self.0),
                }));
                self.0.misses.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(
                    kind = %tag,
                    fingerprint = %chain.fingerprint(),
                    id = chain.id().index(),
                    "interner: miss"
                );
                entry.insert(chain.clone());
                chain
            }
        }
    }

    /// Re-interns `prefix` (head first) on top of `tail`, innermost first.
    pub(crate) fn relink_onto<'a, I>(&self, prefix: I, tail: Chain) -> Chain
    where
        I: DoubleEndedIterator<Item = &'a Chain>,
    {
        prefix.rev().fold(tail, |next, node| {
            self.intern(node.tag(), node.args().clone(), node.check_arc(), Some(next))
        })
    }

    /// Returns the equivalent chain owned by this interner.
    ///
    /// The longest suffix already owned here is reused as is; only the foreign
    /// prefix is re-interned.
    pub fn adopt(&self, chain: &Chain) -> Chain {
        let mut foreign = Vec::new();
        let mut owned = None;
        for node in chain.iter() {
            if self.owns(node) {
                owned = Some(node.clone());
                break;
            }
            foreign.push(node);
        }
        let tail = match owned {
            Some(tail) => tail,
            None => match foreign.pop() {
                Some(last) => self.intern(last.tag(), last.args().clone(), last.check_arc(), None),
                None => return chain.clone(),
            },
        };
        self.relink_onto(foreign.into_iter(), tail)
    }

    /// Rebuilds a chain from its flattened links. Empty input yields `None`.
    pub fn link(&self, links: impl IntoIterator<Item = Link>) -> Option<Chain> {
        let links: Vec<Link> = links.into_iter().collect();
        links
            .into_iter()
            .rev()
            .fold(None, |next, link| Some(self.intern(link.tag, link.args, link.check, next)))
    }

    pub fn owns(&self, chain: &Chain) -> bool {
        std::ptr::eq(chain.home.as_ptr(), Arc::as_ptr(&self.0))
    }

    pub fn len(&self) -> usize {
        self.0.shards.iter().map(|s| s.read().len()).sum()
    }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    pub fn stats(&self) -> InternerStats {
        InternerStats {
            entries: self.len(),
            hits: self.0.hits.load(Ordering::Relaxed),
            misses: self.0.misses.load(Ordering::Relaxed),
        }
    }

    /// Every interned node, ordered by id (creation order).
    pub fn snapshot(&self) -> Vec<Chain> {
        let mut nodes: Vec<Chain> = self
            .0
            .shards
            .iter()
            .flat_map(|s| s.read().values().cloned().collect::<Vec<_>>())
            .collect();
        nodes.sort_by_key(|n| n.id());
        nodes
    }
}

impl Default for Interner {
    fn default() -> Self { Self::new() }
}

impl std::fmt::Debug for Interner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interner").field("stats", &self.stats()).finish()
    }
}
