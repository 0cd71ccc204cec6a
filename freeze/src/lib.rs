//! Embed resolution for Markdown document trees.
//!
//! A [`Freezer`] walks a tree, replaces every embed node with the parsed
//! content of the document it names, recursively, and shifts the headings of
//! that content so they nest under the embed's position. Reference cycles,
//! missing documents and parse failures drop the offending embed and are
//! reported in the returned [`FreezeReport`]; they never abort resolution.

pub mod context;
pub mod engine;
pub mod error;
pub mod headings;
pub mod options;
pub mod parser;
pub mod site;
pub mod source;
pub mod stack;

pub use engine::{FreezeReport, Freezer};
pub use error::{FreezeDiagnostic, FreezeWarning, SourceError};
pub use options::{ContextMode, FreezeOptions};
pub use parser::{DocumentParser, MarkdownParser};
pub use source::{ContentSource, FsSource, MemorySource};
pub use stack::PathStack;
