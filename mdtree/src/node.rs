use std::ops::Range;

/// A single element of a Markdown document tree.
///
/// Nodes own their children outright; there are no parent links. Ancestry is
/// recovered by walking down from the root and remembering the path taken.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    /// Inline or block children. For a heading these are the label inlines.
    pub children: Vec<Node>,
    /// Blocks owned by a heading in the outline view. Always empty otherwise.
    pub content: Vec<Node>,
    /// Byte span in the source this node was parsed from.
    pub span: Option<Range<usize>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Root,

    // Block-level
    Heading { depth: u8 },
    Paragraph,
    List { ordered: bool, start: Option<u64> },
    ListItem { checked: Option<bool> },
    Blockquote,
    CodeBlock {
        language: Option<String>,
        value: String,
    },
    ThematicBreak,
    Html(String),
    Table { alignments: Vec<ColumnAlignment> },
    TableRow { head: bool },
    TableCell,

    // Inline
    Text(String),
    Embed(Embed),
    Emphasis,
    Strong,
    Strikethrough,
    InlineCode(String),
    InlineHtml(String),
    Link { dest: String, title: String },
    Image { dest: String, title: String },
    SoftBreak,
    HardBreak,
}

/// A transclusion reference, written `![[target]]` or `{{embed:target}}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Embed {
    /// Identifier of the referenced document. `None` when the reference is empty.
    pub target: Option<String>,
    pub embed_type: EmbedType,
    /// Display text after a `|` separator, if any.
    pub alt: Option<String>,
    /// The reference exactly as written in the source.
    pub raw: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedType {
    Wikilink,
    Image,
}

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "svg", "webp", "bmp"];

impl EmbedType {
    /// Classify a target by its file extension.
    pub fn for_target(target: &str) -> Self {
        let ext = target
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            EmbedType::Image
        } else {
            EmbedType::Wikilink
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnAlignment {
    None,
    Left,
    Center,
    Right,
}

/// Which child sequence of a node a step descends into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Children,
    Content,
}

/// One step of an address: the slot of the parent and the index within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub slot: Slot,
    pub index: usize,
}

impl Step {
    pub fn child(index: usize) -> Self {
        Step {
            slot: Slot::Children,
            index,
        }
    }

    pub fn content(index: usize) -> Self {
        Step {
            slot: Slot::Content,
            index,
        }
    }
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

impl Node {
    pub fn new(kind: NodeKind, children: Vec<Node>) -> Self {
        Node {
            kind,
            children,
            content: Vec::new(),
            span: None,
        }
    }

    pub fn leaf(kind: NodeKind) -> Self {
        Node::new(kind, Vec::new())
    }

    pub fn root(children: Vec<Node>) -> Self {
        Node::new(NodeKind::Root, children)
    }

    pub fn heading(depth: u8, label: &str) -> Self {
        Node::new(NodeKind::Heading { depth }, vec![Node::text(label)])
    }

    pub fn paragraph(children: Vec<Node>) -> Self {
        Node::new(NodeKind::Paragraph, children)
    }

    pub fn text(value: impl Into<String>) -> Self {
        Node::leaf(NodeKind::Text(value.into()))
    }

    /// A wikilink embed of `target`, as if parsed from `![[target]]`.
    pub fn embed(target: &str) -> Self {
        Node::leaf(NodeKind::Embed(Embed {
            target: Some(target.to_string()),
            embed_type: EmbedType::for_target(target),
            alt: None,
            raw: format!("![[{}]]", target),
        }))
    }

    pub fn list(items: Vec<Node>) -> Self {
        Node::new(
            NodeKind::List {
                ordered: false,
                start: None,
            },
            items,
        )
    }

    pub fn list_item(children: Vec<Node>) -> Self {
        Node::new(NodeKind::ListItem { checked: None }, children)
    }

    pub fn with_content(mut self, content: Vec<Node>) -> Self {
        self.content = content;
        self
    }

    pub fn with_span(mut self, span: Range<usize>) -> Self {
        self.span = Some(span);
        self
    }
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

impl NodeKind {
    pub fn is_heading(&self) -> bool {
        matches!(self, NodeKind::Heading { .. })
    }

    pub fn is_list_item(&self) -> bool {
        matches!(self, NodeKind::ListItem { .. })
    }

    pub fn is_embed(&self) -> bool {
        matches!(self, NodeKind::Embed(_))
    }

    /// True for nodes that occupy their own block in rendered output.
    pub fn is_block(&self) -> bool {
        matches!(
            self,
            NodeKind::Root
                | NodeKind::Heading { .. }
                | NodeKind::Paragraph
                | NodeKind::List { .. }
                | NodeKind::ListItem { .. }
                | NodeKind::Blockquote
                | NodeKind::CodeBlock { .. }
                | NodeKind::ThematicBreak
                | NodeKind::Html(_)
                | NodeKind::Table { .. }
                | NodeKind::TableRow { .. }
                | NodeKind::TableCell
        )
    }
}

impl Node {
    pub fn embed_ref(&self) -> Option<&Embed> {
        match &self.kind {
            NodeKind::Embed(embed) => Some(embed),
            _ => None,
        }
    }

    pub fn slot(&self, slot: Slot) -> &Vec<Node> {
        match slot {
            Slot::Children => &self.children,
            Slot::Content => &self.content,
        }
    }

    pub fn slot_mut(&mut self, slot: Slot) -> &mut Vec<Node> {
        match slot {
            Slot::Children => &mut self.children,
            Slot::Content => &mut self.content,
        }
    }

    /// The node at `address`, relative to `self`.
    pub fn at(&self, address: &[Step]) -> Option<&Node> {
        let mut node = self;
        for step in address {
            node = node.slot(step.slot).get(step.index)?;
        }
        Some(node)
    }

    pub fn at_mut(&mut self, address: &[Step]) -> Option<&mut Node> {
        let mut node = self;
        for step in address {
            node = node.slot_mut(step.slot).get_mut(step.index)?;
        }
        Some(node)
    }

    /// Replace the node at `address` with `replacement` (zero or more nodes)
    /// in its parent's sequence. Returns false if the address is empty or
    /// does not resolve.
    pub fn replace_at(&mut self, address: &[Step], replacement: Vec<Node>) -> bool {
        let Some((last, parent_address)) = address.split_last() else {
            return false;
        };
        let Some(parent) = self.at_mut(parent_address) else {
            return false;
        };
        let siblings = parent.slot_mut(last.slot);
        if last.index >= siblings.len() {
            return false;
        }
        siblings.splice(last.index..=last.index, replacement);
        true
    }

    /// Concatenation of every `Text` leaf below this node, without separators.
    pub fn text_content(&self) -> String {
        let mut text = String::new();
        collect_text(self, &mut text);
        text
    }

    /// True if the node holds nothing but whitespace text and line breaks.
    pub fn is_blank(&self) -> bool {
        match &self.kind {
            NodeKind::Text(s) => s.trim().is_empty(),
            NodeKind::SoftBreak | NodeKind::HardBreak => true,
            NodeKind::Paragraph => self.children.iter().all(Node::is_blank),
            _ => false,
        }
    }

    /// Visit every node depth-first (children before content) together with
    /// its ancestors, root first.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a Node, &[&'a Node])) {
        let mut path = Vec::new();
        walk_inner(self, &mut path, visit);
    }

    /// Number of nodes in the tree (including `self`) matching `pred`.
    pub fn count(&self, pred: impl Fn(&Node) -> bool) -> usize {
        let mut n = 0;
        self.walk(&mut |node, _| {
            if pred(node) {
                n += 1;
            }
        });
        n
    }

    /// All headings in document order as `(depth, label)` pairs.
    pub fn headings(&self) -> Vec<(u8, String)> {
        let mut out = Vec::new();
        self.walk(&mut |node, _| {
            if let NodeKind::Heading { depth } = node.kind {
                out.push((depth, node.text_content()));
            }
        });
        out
    }
}

fn collect_text(node: &Node, out: &mut String) {
    if let NodeKind::Text(s) = &node.kind {
        out.push_str(s);
    }
    for child in &node.children {
        collect_text(child, out);
    }
}

fn walk_inner<'a>(
    node: &'a Node,
    path: &mut Vec<&'a Node>,
    visit: &mut dyn FnMut(&'a Node, &[&'a Node]),
) {
    visit(node, path);
    path.push(node);
    for child in node.children.iter().chain(node.content.iter()) {
        walk_inner(child, path, visit);
    }
    path.pop();
}
