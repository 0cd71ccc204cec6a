use mdtree::Node;
use mdtree::parser::{ParseError, Parser};

/// Turns fetched text into a tree. The engine treats the result as opaque
/// apart from the node kinds it inspects.
pub trait DocumentParser: Send + Sync {
    fn parse(&self, source: &str) -> Result<Node, Vec<ParseError>>;
}

/// The default parser: CommonMark plus embed references.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownParser;

impl DocumentParser for MarkdownParser {
    fn parse(&self, source: &str) -> Result<Node, Vec<ParseError>> {
        Parser::new(source.to_string(), 0).parse()
    }
}
