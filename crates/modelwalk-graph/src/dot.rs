//! Graphviz export of an exploration graph.

use std::borrow::Cow;
use std::fmt::Display;
use std::hash::Hash;
use std::io;

use crate::graph::ExplorationGraph;

impl<S: Clone + Eq + Hash + Display> ExplorationGraph<S> {
    /// Write `digraph <name> { <origin> -> <dest> [label="<action>"]; ... }`,
    /// one line per distinct edge.
    pub fn write_dot<W: io::Write>(&self, model_name: &str, out: &mut W) -> io::Result<()> {
        out.write_all(self.to_dot(model_name).as_bytes())
    }

    pub fn to_dot(&self, model_name: &str) -> String {
        let mut dot = format!("digraph {} {{\n", dot_id(model_name));
        for edge in self.edges() {
            dot.push_str(&format!(
                "  {} -> {} [label={}];\n",
                dot_id(&edge.start.to_string()),
                dot_id(&edge.end.to_string()),
                quote(&edge.action)
            ));
        }
        dot.push_str("}\n");
        dot
    }
}

/// Identifiers and plain numerals pass through, anything else is quoted.
pub fn dot_id(text: &str) -> Cow<'_, str> {
    let mut chars = text.chars();
    let ident = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    let numeral = !text.is_empty() && text.chars().all(|c| c.is_ascii_digit());
    if ident || numeral {
        Cow::Borrowed(text)
    } else {
        Cow::Owned(quote(text))
    }
}

fn quote(text: &str) -> String {
    format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
}
