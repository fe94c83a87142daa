pub mod control;
pub mod numeric;
pub mod structure;

pub use control::{Annotate, Collect, Log, Passthrough, Raise, Suppress, SuppressWhenFlagged};
pub use numeric::{all_within, Finite, InRange, NonNegative, Probability};
pub use structure::{BatchShape, DtypeIs, Floating, RankIs};
