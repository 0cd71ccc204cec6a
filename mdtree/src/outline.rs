//! Outline (section) view of a document.
//!
//! In the flat view produced by the parser, a heading is a leaf-like block
//! followed by its siblings. In the outline view every heading owns, through
//! its `content`, the blocks that follow it up to the next heading of the same
//! or shallower depth.

use crate::node::{Node, NodeKind};

/// Nest the blocks following each top-level heading into that heading.
pub fn sectionize(mut root: Node) -> Node {
    let flat = std::mem::take(&mut root.children);
    root.children = nest(flat);
    root
}

/// Undo [`sectionize`]: hoist every heading's content back after it.
pub fn flatten(mut root: Node) -> Node {
    let nested = std::mem::take(&mut root.children);
    let mut out = Vec::with_capacity(nested.len());
    hoist(nested, &mut out);
    root.children = out;
    root
}

fn nest(nodes: Vec<Node>) -> Vec<Node> {
    // Stack of open headings; the innermost heading collects blocks.
    let mut stack: Vec<(u8, Node)> = Vec::new();
    let mut top: Vec<Node> = Vec::new();

    for node in nodes {
        if let NodeKind::Heading { depth } = node.kind {
            close_to_depth(&mut stack, &mut top, depth);
            stack.push((depth, node));
        } else if let Some((_, open)) = stack.last_mut() {
            open.content.push(node);
        } else {
            top.push(node);
        }
    }

    close_to_depth(&mut stack, &mut top, 0);
    top
}

/// Close headings at `depth` or deeper, attaching each to its parent.
fn close_to_depth(stack: &mut Vec<(u8, Node)>, top: &mut Vec<Node>, depth: u8) {
    while let Some((open_depth, _)) = stack.last() {
        if *open_depth < depth {
            break;
        }
        let Some((_, closed)) = stack.pop() else {
            break;
        };
        match stack.last_mut() {
            Some((_, parent)) => parent.content.push(closed),
            None => top.push(closed),
        }
    }
}

fn hoist(nodes: Vec<Node>, out: &mut Vec<Node>) {
    for mut node in nodes {
        let content = std::mem::take(&mut node.content);
        node.children = flatten_children(std::mem::take(&mut node.children));
        out.push(node);
        hoist(content, out);
    }
}

/// Headings may appear below non-heading containers (a converted list, a
/// list item holding embedded content); flatten those too.
fn flatten_children(children: Vec<Node>) -> Vec<Node> {
    if children.iter().all(|c| c.content.is_empty() && c.children.is_empty()) {
        return children;
    }
    let mut out = Vec::with_capacity(children.len());
    hoist(children, &mut out);
    out
}
