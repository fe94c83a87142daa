//! Pure operations over immutable chains.
//!
//! Every result is re-interned, so composing the same pieces twice yields the
//! same object. Only the ancestors of the point where a chain changes are
//! rebuilt; the untouched suffix is shared.

use crate::chain::error::ConstructionError;
use crate::chain::node::{Chain, Check, Link};
use crate::store::{Interner, TypeTag};
use std::iter::{FusedIterator, Map};
use std::ops::BitAnd;

/// Head-to-tail iterator over the nodes of a chain.
#[derive(Clone)]
pub struct Iter<'a> {
    cursor: Option<&'a Chain>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a Chain;

    fn next(&mut self) -> Option<&'a Chain> {
        let node = self.cursor?;
        self.cursor = node.next();
        Some(node)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.cursor.map_or(0, |c| c.len());
        (n, Some(n))
    }
}

impl ExactSizeIterator for Iter<'_> {}
impl FusedIterator for Iter<'_> {}

impl Chain {
    pub fn iter(&self) -> Iter<'_> { Iter { cursor: Some(self) } }

    /// Lazily maps `f` over the nodes. The result can be cloned to restart.
    pub fn walk<'a, T, F>(&'a self, f: F) -> Map<Iter<'a>, F>
    where
        F: FnMut(&'a Chain) -> T,
    {
        self.iter().map(f)
    }

    pub fn tail(&self) -> &Chain {
        let mut node = self;
        while let Some(next) = node.next() {
            node = next;
        }
        node
    }

    /// `self` followed by all of `other`, on `self`'s interner.
    pub fn append(&self, other: &Chain) -> Chain { self.append_in(&self.home(), other) }

    pub fn append_in(&self, interner: &Interner, other: &Chain) -> Chain {
        let tail = interner.adopt(other);
        let prefix: Vec<&Chain> = self.iter().collect();
        interner.relink_onto(prefix.into_iter(), tail)
    }

    /// Alias of [`Chain::append`].
    pub fn merge(&self, other: &Chain) -> Chain { self.append(other) }

    /// Splices `other` in before position `index`. `0` puts it in front of
    /// the head; an index at or past the length appends.
    pub fn insert(&self, index: usize, other: &Chain) -> Chain { self.insert_in(&self.home(), index, other) }

    pub fn insert_in(&self, interner: &Interner, index: usize, other: &Chain) -> Chain {
        let prefix: Vec<&Chain> = self.iter().take(index).collect();
        let middle = match self.iter().nth(index) {
            Some(suffix) => other.append_in(interner, suffix),
            None => interner.adopt(other),
        };
        interner.relink_onto(prefix.into_iter(), middle)
    }

    /// Appends a freshly built node for `check`.
    pub fn then<C: Check>(&self, check: C) -> Result<Chain, ConstructionError> {
        let interner = self.home();
        let node = interner.node(check)?;
        Ok(self.append_in(&interner, &node))
    }

    /// Flattens the chain into links, head first. See [`Interner::link`].
    pub fn links(&self) -> Vec<Link> { self.iter().map(Link::from).collect() }

    pub fn kinds(&self) -> Vec<TypeTag> { self.walk(|n| n.tag()).collect() }

    pub fn contains_kind<C: Check>(&self) -> bool {
        let tag = TypeTag::of::<C>();
        self.iter().any(|n| n.tag() == tag)
    }
}

impl<'a> IntoIterator for &'a Chain {
    type Item = &'a Chain;
    type IntoIter = Iter<'a>;
    fn into_iter(self) -> Iter<'a> { self.iter() }
}

impl BitAnd for &Chain {
    type Output = Chain;
    fn bitand(self, rhs: &Chain) -> Chain { self.merge(rhs) }
}

impl BitAnd for Chain {
    type Output = Chain;
    fn bitand(self, rhs: Chain) -> Chain { self.merge(&rhs) }
}

impl BitAnd<&Chain> for Chain {
    type Output = Chain;
    fn bitand(self, rhs: &Chain) -> Chain { self.merge(rhs) }
}
