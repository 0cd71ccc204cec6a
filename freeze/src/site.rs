//! Locating embeds in a tree and splicing replacement nodes in their place.

use std::ops::Range;

use mdtree::{Embed, Node, NodeKind, Step};

/// One embed found during a scan, with everything needed to replace it later
/// in the same pass.
#[derive(Debug, Clone)]
pub struct EmbedSite {
    /// Address of the embed node from the root.
    pub address: Vec<Step>,
    /// Kinds of the nodes along `address`, root first, direct parent last.
    /// `ancestors[i]` is the node reached by `address[..i]`.
    pub ancestors: Vec<NodeKind>,
    pub embed: Embed,
    pub span: Option<Range<usize>>,
}

impl EmbedSite {
    pub fn parent_address(&self) -> &[Step] {
        &self.address[..self.address.len().saturating_sub(1)]
    }

    pub fn index(&self) -> usize {
        self.address.last().map_or(0, |step| step.index)
    }

    pub fn parent_kind(&self) -> Option<&NodeKind> {
        self.ancestors.last()
    }
}

/// Every embed in `root`, in pre-order (children before heading content).
pub fn collect_sites(root: &Node) -> Vec<EmbedSite> {
    let mut sites = Vec::new();
    let mut address = Vec::new();
    let mut ancestors = Vec::new();
    scan(root, &mut address, &mut ancestors, &mut sites);
    sites
}

fn scan(
    node: &Node,
    address: &mut Vec<Step>,
    ancestors: &mut Vec<NodeKind>,
    sites: &mut Vec<EmbedSite>,
) {
    if let NodeKind::Embed(embed) = &node.kind {
        sites.push(EmbedSite {
            address: address.clone(),
            ancestors: ancestors.clone(),
            embed: embed.clone(),
            span: node.span.clone(),
        });
        return;
    }

    ancestors.push(node.kind.clone());
    let steps = (0..node.children.len())
        .map(Step::child)
        .chain((0..node.content.len()).map(Step::content));
    for step in steps {
        let child = &node.slot(step.slot)[step.index];
        address.push(step);
        scan(child, address, ancestors, sites);
        address.pop();
    }
    ancestors.pop();
}

/// True if the node at the site's address is still the embed that was found.
pub fn still_present(tree: &Node, site: &EmbedSite) -> bool {
    tree.at(&site.address).and_then(Node::embed_ref) == Some(&site.embed)
}

// ---------------------------------------------------------------------------
// Splicing
// ---------------------------------------------------------------------------

/// Remove the embed. A paragraph left with nothing but whitespace goes too.
pub fn remove(tree: &mut Node, site: &EmbedSite) -> bool {
    if !tree.replace_at(&site.address, Vec::new()) {
        return false;
    }
    let parent_address = site.parent_address();
    let emptied = !parent_address.is_empty()
        && tree
            .at(parent_address)
            .is_some_and(|parent| parent.kind == NodeKind::Paragraph && parent.is_blank());
    if emptied {
        tree.replace_at(parent_address, Vec::new());
    }
    true
}

/// Splice resolved block content into a host tree outside any list item.
///
/// An embed inside a paragraph takes the paragraph's place. This is not a
/// wholesale replacement of the paragraph: the inline runs before and after
/// the embed survive as their own paragraphs when they hold any text, and
/// only a paragraph holding nothing but the embed disappears entirely.
///
/// An embed in a heading label leaves the label and the content follows the
/// heading. Anywhere else the embed node alone is replaced.
pub fn splice_block(tree: &mut Node, site: &EmbedSite, nodes: Vec<Node>) -> bool {
    if nodes.is_empty() {
        return remove(tree, site);
    }
    if in_heading_label(site) {
        return splice_after_heading(tree, site, nodes);
    }
    let parent_address = site.parent_address();
    if parent_address.is_empty() || site.parent_kind() != Some(&NodeKind::Paragraph) {
        return tree.replace_at(&site.address, nodes);
    }

    let index = site.index();
    let Some(paragraph) = tree.at_mut(parent_address) else {
        return false;
    };
    if index >= paragraph.children.len() {
        return false;
    }

    let mut before = std::mem::take(&mut paragraph.children);
    let after = before.split_off(index + 1);
    before.pop();
    let span = paragraph.span.clone();

    let mut replacement = Vec::with_capacity(nodes.len() + 2);
    let leading = Node {
        span,
        ..Node::paragraph(before)
    };
    if !leading.is_blank() {
        replacement.push(leading);
    }
    replacement.extend(nodes);
    let trailing = Node::paragraph(after);
    if !trailing.is_blank() {
        replacement.push(trailing);
    }

    tree.replace_at(parent_address, replacement)
}

/// Splice content for an embed that sits inside the list item at
/// `address[..list_item]`. When the embed is the only thing in its container
/// the container itself is replaced, so the item does not end up with a
/// paragraph wrapping block content.
pub fn splice_in_list_item(
    tree: &mut Node,
    site: &EmbedSite,
    list_item: usize,
    nodes: Vec<Node>,
) -> bool {
    if nodes.is_empty() {
        return remove(tree, site);
    }
    if in_heading_label(site) {
        return splice_after_heading(tree, site, nodes);
    }
    let parent_address = site.parent_address();
    let direct_child = parent_address.len() == list_item + 1;
    let replaceable = direct_child || site.parent_kind() == Some(&NodeKind::Paragraph);

    let index = site.index();
    let sole_content = tree.at(parent_address).is_some_and(|parent| {
        parent
            .children
            .iter()
            .enumerate()
            .all(|(i, child)| i == index || child.is_blank())
    });

    if replaceable && sole_content && parent_address.len() > list_item {
        tree.replace_at(parent_address, nodes)
    } else {
        tree.replace_at(&site.address, nodes)
    }
}

fn in_heading_label(site: &EmbedSite) -> bool {
    matches!(site.parent_kind(), Some(NodeKind::Heading { .. }))
}

/// Take the embed out of its heading label and put `nodes` directly after the
/// heading: at the front of the blocks it owns, or as its next siblings when
/// it owns none.
fn splice_after_heading(tree: &mut Node, site: &EmbedSite, nodes: Vec<Node>) -> bool {
    let parent_address = site.parent_address();
    let Some((heading_step, outer)) = parent_address.split_last() else {
        return false;
    };
    let index = site.index();
    let Some(heading) = tree.at_mut(parent_address) else {
        return false;
    };
    if index >= heading.children.len() {
        return false;
    }
    heading.children.remove(index);
    trim_label(&mut heading.children);

    if !heading.content.is_empty() {
        heading.content.splice(0..0, nodes);
        return true;
    }
    let Some(container) = tree.at_mut(outer) else {
        return false;
    };
    let siblings = container.slot_mut(heading_step.slot);
    let at = (heading_step.index + 1).min(siblings.len());
    siblings.splice(at..at, nodes);
    true
}

fn trim_label(label: &mut Vec<Node>) {
    if let Some(NodeKind::Text(s)) = label.first_mut().map(|n| &mut n.kind) {
        *s = s.trim_start().to_string();
    }
    if let Some(NodeKind::Text(s)) = label.last_mut().map(|n| &mut n.kind) {
        *s = s.trim_end().to_string();
    }
    label.retain(|n| !matches!(&n.kind, NodeKind::Text(s) if s.is_empty()));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn para(children: Vec<Node>) -> Node {
        Node::paragraph(children)
    }

    fn block(s: &str) -> Node {
        Node::paragraph(vec![Node::text(s)])
    }

    #[test]
    fn sites_carry_address_and_ancestors() {
        let tree = Node::root(vec![
            Node::heading(1, "T"),
            para(vec![Node::text("a"), Node::embed("x")]),
            Node::list(vec![Node::list_item(vec![para(vec![Node::embed("y")])])]),
        ]);
        let sites = collect_sites(&tree);
        assert_eq!(sites.len(), 2);

        assert_eq!(sites[0].address, vec![Step::child(1), Step::child(1)]);
        assert_eq!(sites[0].ancestors, vec![NodeKind::Root, NodeKind::Paragraph]);
        assert_eq!(sites[1].address.len(), sites[1].ancestors.len());
        assert!(sites[1].ancestors[2].is_list_item());
    }

    #[test]
    fn heading_content_is_scanned_after_label() {
        let heading = Node::new(NodeKind::Heading { depth: 1 }, vec![Node::embed("label")])
            .with_content(vec![para(vec![Node::embed("body")])]);
        let sites = collect_sites(&Node::root(vec![heading]));
        let targets: Vec<_> = sites
            .iter()
            .map(|s| s.embed.target.clone().unwrap_or_default())
            .collect();
        assert_eq!(targets, ["label", "body"]);
        assert_eq!(sites[1].address[1], Step::content(0));
    }

    #[test]
    fn sole_embed_replaces_paragraph() {
        let mut tree = Node::root(vec![para(vec![Node::embed("x")])]);
        let site = collect_sites(&tree).remove(0);
        assert!(splice_block(&mut tree, &site, vec![Node::heading(2, "X"), block("body")]));
        assert_eq!(tree.children.len(), 2);
        assert!(tree.children[0].kind.is_heading());
    }

    #[test]
    fn inline_embed_splits_paragraph() {
        let mut tree = Node::root(vec![para(vec![
            Node::text("before "),
            Node::embed("x"),
            Node::text(" after"),
        ])]);
        let site = collect_sites(&tree).remove(0);
        assert!(splice_block(&mut tree, &site, vec![block("middle")]));
        let texts: Vec<_> = tree.children.iter().map(Node::text_content).collect();
        assert_eq!(texts, ["before ", "middle", " after"]);
    }

    #[test]
    fn earlier_sibling_embed_survives_split() {
        let mut tree = Node::root(vec![para(vec![
            Node::embed("a"),
            Node::text(" and "),
            Node::embed("b"),
        ])]);
        let sites = collect_sites(&tree);
        assert!(splice_block(&mut tree, &sites[1], vec![block("B")]));
        assert!(still_present(&tree, &sites[0]));
        assert!(splice_block(&mut tree, &sites[0], vec![block("A")]));
        let texts: Vec<_> = tree.children.iter().map(Node::text_content).collect();
        assert_eq!(texts, ["A", " and ", "B"]);
    }

    #[test]
    fn removing_last_embed_removes_paragraph() {
        let mut tree = Node::root(vec![block("keep"), para(vec![Node::embed("x")])]);
        let site = collect_sites(&tree).remove(0);
        assert!(remove(&mut tree, &site));
        assert_eq!(tree.children, vec![block("keep")]);
    }

    #[test]
    fn removing_inline_embed_keeps_text() {
        let mut tree = Node::root(vec![para(vec![Node::text("a "), Node::embed("x")])]);
        let site = collect_sites(&tree).remove(0);
        assert!(splice_block(&mut tree, &site, Vec::new()));
        assert_eq!(tree.children.len(), 1);
        assert_eq!(tree.children[0].text_content(), "a ");
    }

    #[test]
    fn list_item_sole_embed_replaces_container() {
        let mut tree = Node::root(vec![Node::list(vec![Node::list_item(vec![para(vec![
            Node::embed("x"),
        ])])])]);
        let site = collect_sites(&tree).remove(0);
        assert!(splice_in_list_item(&mut tree, &site, 2, vec![block("one"), block("two")]));
        let item = &tree.children[0].children[0];
        assert_eq!(item.children, vec![block("one"), block("two")]);
    }

    #[test]
    fn list_item_inline_embed_splices_in_place() {
        let mut tree = Node::root(vec![Node::list(vec![Node::list_item(vec![para(vec![
            Node::text("see "),
            Node::embed("x"),
        ])])])]);
        let site = collect_sites(&tree).remove(0);
        assert!(splice_in_list_item(&mut tree, &site, 2, vec![Node::text("X")]));
        let paragraph = &tree.children[0].children[0].children[0];
        assert_eq!(paragraph.text_content(), "see X");
    }

    #[test]
    fn label_embed_content_follows_heading() {
        let mut tree = Node::root(vec![
            Node::new(
                NodeKind::Heading { depth: 1 },
                vec![Node::text("Title "), Node::embed("x")],
            ),
            block("after"),
        ]);
        let site = collect_sites(&tree).remove(0);
        assert!(splice_block(&mut tree, &site, vec![Node::heading(3, "Inner"), block("body")]));

        let texts: Vec<_> = tree.children.iter().map(Node::text_content).collect();
        assert_eq!(texts, ["Title", "Inner", "body", "after"]);
        assert_eq!(tree.children[0].children.len(), 1);
    }

    #[test]
    fn label_embed_goes_before_owned_section() {
        let heading = Node::new(
            NodeKind::Heading { depth: 1 },
            vec![Node::text("Title "), Node::embed("x")],
        )
        .with_content(vec![block("owned")]);
        let mut tree = Node::root(vec![heading]);
        let site = collect_sites(&tree).remove(0);
        assert!(splice_block(&mut tree, &site, vec![block("inserted")]));

        assert_eq!(tree.children.len(), 1);
        let content: Vec<_> = tree.children[0].content.iter().map(Node::text_content).collect();
        assert_eq!(content, ["inserted", "owned"]);
    }

    #[test]
    fn stale_site_is_detected() {
        let mut tree = Node::root(vec![para(vec![Node::embed("x")])]);
        let site = collect_sites(&tree).remove(0);
        tree.children.clear();
        assert!(!still_present(&tree, &site));
    }
}
