use crate::chain::Chain;
use crate::store::{Fingerprint, NodeId, TypeTag};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// A chain lowered into a flat step table.
///
/// Step `i` tests `steps[i]`; its continuation is always step `i + 1`. The
/// compiled backend replays this table without walking continuation links.
#[derive(Debug, Clone)]
pub struct Program {
    pub head: NodeId,
    pub fingerprint: Fingerprint,
    pub steps: Vec<Chain>,
    pub kinds: Vec<TypeTag>,
}

impl Program {
    pub fn lower(chain: &Chain) -> Self {
        let steps: Vec<Chain> = chain.iter().cloned().collect();
        let kinds = steps.iter().map(|s| s.tag()).collect();
        Self { head: chain.id(), fingerprint: chain.fingerprint(), steps, kinds }
    }

    pub fn len(&self) -> usize { self.steps.len() }
    pub fn is_empty(&self) -> bool { self.steps.is_empty() }

    /// Steps from the head through `depth`, inclusive. The unwind path of a
    /// lane that failed at `depth`.
    pub fn path(&self, depth: usize) -> &[Chain] {
        &self.steps[..=depth.min(self.steps.len().saturating_sub(1))]
    }
}

/// Lowers chains and caches the result per chain head.
///
/// Chains are immutable and node ids are never reused, so a cached program
/// never goes stale.
#[derive(Default)]
pub struct Compiler {
    cache: RwLock<HashMap<NodeId, Arc<Program>>>,
}

impl Compiler {
    pub fn new() -> Self { Self::default() }

    pub fn compile(&self, chain: &Chain) -> Arc<Program> {
        if let Some(program) = self.cache.read().get(&chain.id()) {
            return Arc::clone(program);
        }
        let mut cache = self.cache.write();
        let program = cache.entry(chain.id()).or_insert_with(|| {
            let program = Program::lower(chain);
            tracing::debug!(
                head = %chain.tag(),
                fingerprint = %program.fingerprint,
                steps = program.len(),
                "compiler: lowered chain"
            );
            Arc::new(program)
        });
        Arc::clone(program)
    }

    /// Number of cached programs.
    pub fn cached(&self) -> usize { self.cache.read().len() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Interner;
    use crate::testing::{Even, Positive};

    #[test]
    fn test_lower_flattens_in_walk_order() {
        let interner = Interner::new();
        let chain = &interner.node(Positive).unwrap() & &interner.node(Even).unwrap();
        let program = Program::lower(&chain);

        assert_eq!(program.len(), 2);
        assert_eq!(program.kinds, chain.kinds());
        assert_eq!(program.path(0).len(), 1);
        assert_eq!(program.path(1), program.steps.as_slice());
    }

    #[test]
    fn test_compile_caches_per_head() {
        let interner = Interner::new();
        let a = interner.node(Positive).unwrap();
        let b = interner.node(Even).unwrap();
        let compiler = Compiler::new();

        let first = compiler.compile(&a);
        let again = compiler.compile(&a);
        compiler.compile(&b);

        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(compiler.cached(), 2);
    }
}
