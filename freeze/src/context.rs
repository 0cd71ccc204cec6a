//! Where an embed sits in its host document.
//!
//! All queries work on the ancestor kinds captured while scanning for embeds:
//! `path[0]` is the root and the last entry is the embed's direct parent. The
//! embed itself is never part of the path.

use mdtree::NodeKind;

/// Context of one embed site, derived from its ancestor path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Context {
    /// Depth of the nearest enclosing heading, 0 if there is none.
    pub heading_depth: u8,
    /// Position in the path of the closest enclosing list item.
    pub list_item: Option<usize>,
}

impl Context {
    pub fn detect(path: &[NodeKind]) -> Self {
        Context {
            heading_depth: context_depth(nearest_heading(path)),
            list_item: nearest_list_item(path),
        }
    }

    pub fn in_list_item(&self) -> bool {
        self.list_item.is_some()
    }
}

/// The closest heading ancestor, scanning from the parent toward the root.
pub fn nearest_heading(path: &[NodeKind]) -> Option<&NodeKind> {
    path.iter().rev().find(|kind| kind.is_heading())
}

pub fn context_depth(heading: Option<&NodeKind>) -> u8 {
    match heading {
        Some(NodeKind::Heading { depth }) => *depth,
        _ => 0,
    }
}

pub fn is_inside_list_item(path: &[NodeKind]) -> bool {
    path.iter().any(NodeKind::is_list_item)
}

/// Index into `path` of the closest list-item ancestor. The list item's own
/// address is the first `index` steps of the embed's address.
pub fn nearest_list_item(path: &[NodeKind]) -> Option<usize> {
    path.iter().rposition(NodeKind::is_list_item)
}
