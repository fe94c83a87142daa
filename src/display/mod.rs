pub mod trace;

pub use trace::{format_chain, format_trace};
