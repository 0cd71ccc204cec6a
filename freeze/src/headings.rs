//! Heading depth renormalization for spliced-in content.

use mdtree::{Node, NodeKind};

pub const MAX_HEADING_DEPTH: u8 = 6;

/// Shift every heading under `root` so it nests below a heading of
/// `context_depth`: a heading of depth `d` becomes `d + context_depth + 1`.
///
/// Headings that would land deeper than level 6 are converted into a
/// single-item bullet list whose first paragraph carries the heading text,
/// followed by the blocks the heading owned.
pub fn adjust_headings(root: &mut Node, context_depth: u8) {
    if let NodeKind::Heading { depth } = root.kind {
        let new_depth = depth as u16 + context_depth as u16 + 1;
        if new_depth > MAX_HEADING_DEPTH as u16 {
            convert_to_list(root);
        } else {
            root.kind = NodeKind::Heading {
                depth: new_depth as u8,
            };
        }
    }

    for child in root.children.iter_mut().chain(root.content.iter_mut()) {
        adjust_headings(child, context_depth);
    }
}

/// Replace a heading in place with `list > listItem > [paragraph(label), ..content]`.
fn convert_to_list(heading: &mut Node) {
    let label = heading.text_content();
    let mut item_children = vec![Node::paragraph(vec![Node::text(label)])];
    item_children.append(&mut heading.content);

    *heading = Node::list(vec![Node::list_item(item_children)]);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn para(s: &str) -> Node {
        Node::paragraph(vec![Node::text(s)])
    }

    fn depth_of(node: &Node) -> u8 {
        match node.kind {
            NodeKind::Heading { depth } => depth,
            ref other => panic!("expected heading, got {:?}", other),
        }
    }

    #[test]
    fn shifts_by_context_plus_one() {
        let mut root = Node::root(vec![Node::heading(1, "H")]);
        adjust_headings(&mut root, 0);
        assert_eq!(depth_of(&root.children[0]), 2);

        let mut root = Node::root(vec![Node::heading(1, "H")]);
        adjust_headings(&mut root, 2);
        assert_eq!(depth_of(&root.children[0]), 4);
    }

    #[test]
    fn nested_headings_each_shift() {
        let inner = Node::heading(2, "Inner");
        let outer = Node::heading(1, "Outer").with_content(vec![inner]);
        let mut root = Node::root(vec![outer]);
        adjust_headings(&mut root, 1);

        assert_eq!(depth_of(&root.children[0]), 3);
        assert_eq!(depth_of(&root.children[0].content[0]), 4);
    }

    #[test]
    fn depth_six_exactly_is_kept() {
        let mut root = Node::root(vec![Node::heading(5, "Five")]);
        adjust_headings(&mut root, 0);
        assert_eq!(depth_of(&root.children[0]), 6);
    }

    #[test]
    fn overflow_becomes_list_with_label() {
        let mut root = Node::root(vec![Node::heading(6, "Heading 6")]);
        adjust_headings(&mut root, 0);

        let list = &root.children[0];
        assert!(matches!(list.kind, NodeKind::List { ordered: false, .. }));
        assert_eq!(list.children.len(), 1);
        let item = &list.children[0];
        assert!(item.kind.is_list_item());
        assert_eq!(item.children[0].kind, NodeKind::Paragraph);
        assert_eq!(item.children[0].children, vec![Node::text("Heading 6")]);
        assert!(list.content.is_empty());
        assert!(list.span.is_none());
    }

    #[test]
    fn overflow_keeps_owned_content_after_label() {
        let heading = Node::heading(6, "Heading 6").with_content(vec![para("Content")]);
        let mut root = Node::root(vec![heading]);
        adjust_headings(&mut root, 0);

        let item = &root.children[0].children[0];
        assert_eq!(item.children.len(), 2);
        assert_eq!(item.children[0].text_content(), "Heading 6");
        assert_eq!(item.children[1].text_content(), "Content");
    }

    #[test]
    fn label_concatenates_nested_inline_text() {
        let heading = Node::new(
            NodeKind::Heading { depth: 2 },
            vec![
                Node::text("A "),
                Node::new(NodeKind::Strong, vec![Node::text("bold")]),
                Node::text(" title"),
            ],
        );
        let mut root = Node::root(vec![heading]);
        adjust_headings(&mut root, 6);
        assert_eq!(root.children[0].children[0].children[0].text_content(), "A bold title");
    }

    #[test]
    fn context_six_overflows_level_one() {
        let mut root = Node::root(vec![Node::heading(1, "One")]);
        adjust_headings(&mut root, 6);
        assert!(matches!(root.children[0].kind, NodeKind::List { .. }));
    }

    #[test]
    fn overflowed_content_is_adjusted_too() {
        // 4 + 2 + 1 = 7 overflows; the owned depth-1 heading becomes 1 + 2 + 1 = 4,
        // and the owned depth-5 heading overflows in turn.
        let owned = vec![Node::heading(1, "Kept"), Node::heading(5, "Deep")];
        let heading = Node::heading(4, "Outer").with_content(owned);
        let mut root = Node::root(vec![heading]);
        adjust_headings(&mut root, 2);

        let item = &root.children[0].children[0];
        assert_eq!(depth_of(&item.children[1]), 4);
        let deep = &item.children[2];
        assert!(matches!(deep.kind, NodeKind::List { .. }));
        assert_eq!(deep.children[0].children[0].text_content(), "Deep");
    }

    #[test]
    fn non_headings_untouched() {
        let mut root = Node::root(vec![para("Content")]);
        let before = root.clone();
        adjust_headings(&mut root, 2);
        assert_eq!(root, before);

        let mut empty = Node::root(Vec::new());
        adjust_headings(&mut empty, 0);
        assert!(empty.children.is_empty());
    }
}
