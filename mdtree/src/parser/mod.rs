pub mod embed;
pub mod error;
mod structural;

pub use error::ParseError;
pub use structural::MAX_NESTING;

use crate::node::Node;

/// Parser entry point.
pub struct Parser {
    source: String,
    file_id: usize,
}

impl Parser {
    pub fn new(source: String, file_id: usize) -> Self {
        Parser { source, file_id }
    }

    /// Parse the source Markdown into a document tree rooted at a `Root` node.
    pub fn parse(&self) -> Result<Node, Vec<ParseError>> {
        structural::parse_tree(&self.source, self.file_id)
    }
}
