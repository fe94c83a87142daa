use super::args::CanonicalArgs;
use super::types::{Fingerprint, NodeId, TypeTag};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// The identity of a node for interning: (kind, canonical args, continuation).
///
/// The continuation is recorded by node id. Continuations are canonical within
/// an interner, so id equality coincides with structural equality of the tail.
#[derive(Debug, Clone)]
pub struct StructuralKey {
    tag: TypeTag,
    args: CanonicalArgs,
    next: Option<NodeId>,
    fingerprint: Fingerprint,
}

impl StructuralKey {
    /// `next` is the id and fingerprint of the continuation, if any.
    pub fn new(tag: TypeTag, args: CanonicalArgs, next: Option<(NodeId, Fingerprint)>) -> Self {
        let mut hasher = DefaultHasher::new();
        tag.hash(&mut hasher);
        args.hash(&mut hasher);
        next.map(|(_, fp)| fp).hash(&mut hasher);

        Self {
            tag,
            args,
            next: next.map(|(id, _)| id),
            fingerprint: Fingerprint(hasher.finish()),
        }
    }

    #[inline(always)]
    pub fn fingerprint(&self) -> Fingerprint { self.fingerprint }
    pub fn tag(&self) -> TypeTag { self.tag }
    pub fn args(&self) -> &CanonicalArgs { &self.args }
    pub fn next(&self) -> Option<NodeId> { self.next }
}

impl Hash for StructuralKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.fingerprint.0);
    }
}

// Fingerprints may collide; equality always compares the full key.
impl PartialEq for StructuralKey {
    fn eq(&self, other: &Self) -> bool {
        self.fingerprint == other.fingerprint
            && self.tag == other.tag
            && self.next == other.next
            && self.args == other.args
    }
}

impl Eq for StructuralKey {}
