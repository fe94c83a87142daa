use crate::chain::Chain;
use crate::compute::{Trace, Transition};
use std::fmt::Write;

const RULE: &str = "--------------------------------------------------";

fn label(node: &Chain) -> String {
    if node.args().is_empty() {
        node.tag().to_string()
    } else {
        format!("{}({})", node.tag(), node.args())
    }
}

fn connector(i: usize, count: usize) -> &'static str {
    if i + 1 == count { "`--" } else { "|--" }
}

/// One line per node, head first.
pub fn format_chain(chain: &Chain) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "CHAIN of {} node{}:", chain.len(), if chain.len() == 1 { "" } else { "s" });
    let _ = writeln!(output, "{}", RULE);
    for (i, node) in chain.iter().enumerate() {
        let _ = writeln!(output, "{} [{}] {}", connector(i, chain.len()), i, label(node));
    }
    output
}

/// Renders recorded transitions. Handler calls are indented under the
/// failing test that triggered them.
pub fn format_trace(trace: &Trace) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "EXECUTION TRACE:");
    let _ = writeln!(output, "{}", RULE);

    let count = trace.transitions.len();
    for (i, transition) in trace.transitions.iter().enumerate() {
        let indent = match transition {
            Transition::Unwinding(..) => "    ",
            _ => "",
        };
        let _ = writeln!(output, "{}{} {}", indent, connector(i, count), transition);
    }
    output
}
