pub mod node;
pub mod outline;
pub mod parser;
pub mod render;

pub use node::{ColumnAlignment, Embed, EmbedType, Node, NodeKind, Slot, Step};

/// Parse a Markdown string with file id 0.
pub fn parse(source: &str) -> Result<Node, Vec<parser::ParseError>> {
    parser::Parser::new(source.to_string(), 0).parse()
}
