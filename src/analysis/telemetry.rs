use crate::analysis::sharing::{self, SharingReport};
use crate::chain::Chain;
use crate::compute::KernelStats;
use crate::store::{Interner, InternerStats};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChainStats {
    pub length: usize,
    pub distinct_kinds: usize,
    pub kind_counts: BTreeMap<&'static str, usize>,
}

impl ChainStats {
    pub fn of(chain: &Chain) -> Self {
        let mut kind_counts = BTreeMap::new();
        for node in chain {
            *kind_counts.entry(node.tag().short_name()).or_insert(0) += 1;
        }
        Self { length: chain.len(), distinct_kinds: kind_counts.len(), kind_counts }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TelemetryReport {
    pub interner: InternerStats,
    /// Fraction of construction requests answered from the cache.
    pub hit_rate: f64,
    pub sharing: SharingReport,
    pub chain: Option<ChainStats>,
    pub kernel: Option<KernelStats>,
}

impl TelemetryReport {
    pub fn analyze(interner: &Interner) -> Self {
        // 1. Cache effectiveness
        let stats = interner.stats();
        let requests = stats.hits + stats.misses;
        let hit_rate = if requests > 0 { stats.hits as f64 / requests as f64 } else { 0.0 };

        // 2. Shape of the node forest
        let sharing = sharing::analyze(interner);

        Self { interner: stats, hit_rate, sharing, chain: None, kernel: None }
    }

    pub fn with_chain(mut self, chain: &Chain) -> Self {
        self.chain = Some(ChainStats::of(chain));
        self
    }

    /// Adds kernel counters, merging with any already present.
    pub fn with_kernel(mut self, stats: &KernelStats) -> Self {
        self.kernel.get_or_insert_with(KernelStats::default).merge(stats);
        self
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
