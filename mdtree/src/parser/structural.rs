use std::ops::Range;

use pulldown_cmark::{Event, HeadingLevel, Options, Parser as CmarkParser, Tag};

use crate::node::{ColumnAlignment, Node, NodeKind};
use crate::parser::embed::{self, Piece};
use crate::parser::error::ParseError;

/// Containers nested deeper than this are rejected.
pub const MAX_NESTING: usize = 128;

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Parse Markdown source text into a `Root` node.
pub fn parse_tree(source: &str, file_id: usize) -> Result<Node, Vec<ParseError>> {
    let options =
        Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TABLES | Options::ENABLE_TASKLISTS;
    let parser = CmarkParser::new_ext(source, options);
    let events: Vec<(Event<'_>, Range<usize>)> = parser.into_offset_iter().collect();

    let mut state = ParseState::new(source, file_id);
    let mut i = 0;
    let children = state
        .collect_children(&events, &mut i, 0)
        .map_err(|err| vec![err])?;

    Ok(Node::root(children).with_span(0..source.len()))
}

// ---------------------------------------------------------------------------
// Parse state
// ---------------------------------------------------------------------------

struct ParseState<'a> {
    source: &'a str,
    file_id: usize,
    /// Task marker seen inside the list item currently being built.
    pending_check: Option<bool>,
}

impl<'a> ParseState<'a> {
    fn new(source: &'a str, file_id: usize) -> Self {
        ParseState {
            source,
            file_id,
            pending_check: None,
        }
    }

    /// Collect nodes until the `End` event closing the current container.
    fn collect_children(
        &mut self,
        events: &[(Event<'_>, Range<usize>)],
        i: &mut usize,
        depth: usize,
    ) -> Result<Vec<Node>, ParseError> {
        let mut nodes = Vec::new();

        while *i < events.len() {
            let (ref ev, ref range) = events[*i];
            *i += 1;

            match ev {
                Event::End(_) => break,
                Event::Start(tag) => {
                    let opened = self.open(tag, range.clone(), events, i, depth + 1)?;
                    nodes.extend(opened);
                }
                Event::Text(s) => {
                    nodes.push(Node::text(s.to_string()).with_span(range.clone()));
                }
                Event::InlineHtml(s) => {
                    nodes.push(
                        Node::leaf(NodeKind::InlineHtml(s.to_string())).with_span(range.clone()),
                    );
                }
                Event::Code(s) => {
                    nodes.push(
                        Node::leaf(NodeKind::InlineCode(s.to_string())).with_span(range.clone()),
                    );
                }
                Event::Html(s) => {
                    nodes.push(Node::leaf(NodeKind::Html(s.to_string())).with_span(range.clone()));
                }
                Event::SoftBreak => {
                    nodes.push(Node::leaf(NodeKind::SoftBreak).with_span(range.clone()));
                }
                Event::HardBreak => {
                    nodes.push(Node::leaf(NodeKind::HardBreak).with_span(range.clone()));
                }
                Event::Rule => {
                    nodes.push(Node::leaf(NodeKind::ThematicBreak).with_span(range.clone()));
                }
                Event::TaskListMarker(checked) => {
                    self.pending_check = Some(*checked);
                }
                _ => {}
            }
        }

        Ok(self.merge_text(nodes))
    }

    /// Build the node(s) for a container tag. Unsupported containers are
    /// transparent: their children are returned in place.
    fn open(
        &mut self,
        tag: &Tag<'_>,
        range: Range<usize>,
        events: &[(Event<'_>, Range<usize>)],
        i: &mut usize,
        depth: usize,
    ) -> Result<Vec<Node>, ParseError> {
        if depth > MAX_NESTING {
            return Err(ParseError::error(
                format!("document nesting exceeds {} levels", MAX_NESTING),
                range,
                self.file_id,
            )
            .with_note("flatten the deeply nested lists or blockquotes"));
        }

        let kind = match tag {
            Tag::Paragraph => NodeKind::Paragraph,
            Tag::Heading { level, .. } => NodeKind::Heading {
                depth: heading_level_to_u8(level),
            },
            Tag::BlockQuote(_) => NodeKind::Blockquote,
            Tag::CodeBlock(kind) => {
                let language = match kind {
                    pulldown_cmark::CodeBlockKind::Fenced(lang) => {
                        let lang = lang.to_string();
                        if lang.is_empty() { None } else { Some(lang) }
                    }
                    pulldown_cmark::CodeBlockKind::Indented => None,
                };
                let value = collect_raw_until_end(events, i);
                return Ok(vec![
                    Node::leaf(NodeKind::CodeBlock { language, value }).with_span(range),
                ]);
            }
            Tag::HtmlBlock => {
                let value = collect_raw_until_end(events, i);
                return Ok(vec![Node::leaf(NodeKind::Html(value)).with_span(range)]);
            }
            Tag::List(start) => NodeKind::List {
                ordered: start.is_some(),
                start: *start,
            },
            Tag::Item => {
                let enclosing = self.pending_check.take();
                let children = self.collect_children(events, i, depth)?;
                let checked = self.pending_check.take();
                self.pending_check = enclosing;
                let item = Node::new(
                    NodeKind::ListItem { checked },
                    wrap_inline_runs(children),
                );
                return Ok(vec![item.with_span(range)]);
            }
            Tag::Table(alignments) => NodeKind::Table {
                alignments: alignments
                    .iter()
                    .map(|a| match a {
                        pulldown_cmark::Alignment::None => ColumnAlignment::None,
                        pulldown_cmark::Alignment::Left => ColumnAlignment::Left,
                        pulldown_cmark::Alignment::Center => ColumnAlignment::Center,
                        pulldown_cmark::Alignment::Right => ColumnAlignment::Right,
                    })
                    .collect(),
            },
            Tag::TableHead => NodeKind::TableRow { head: true },
            Tag::TableRow => NodeKind::TableRow { head: false },
            Tag::TableCell => NodeKind::TableCell,
            Tag::Emphasis => NodeKind::Emphasis,
            Tag::Strong => NodeKind::Strong,
            Tag::Strikethrough => NodeKind::Strikethrough,
            Tag::Link {
                dest_url, title, ..
            } => NodeKind::Link {
                dest: dest_url.to_string(),
                title: title.to_string(),
            },
            Tag::Image {
                dest_url, title, ..
            } => NodeKind::Image {
                dest: dest_url.to_string(),
                title: title.to_string(),
            },
            _ => return self.collect_children(events, i, depth),
        };

        let children = self.collect_children(events, i, depth)?;
        Ok(vec![Node::new(kind, children).with_span(range)])
    }

    /// Merge adjacent text nodes, then split the merged runs at embed
    /// references.
    fn merge_text(&self, nodes: Vec<Node>) -> Vec<Node> {
        let mut out: Vec<Node> = Vec::with_capacity(nodes.len());
        let mut run: Option<(String, Range<usize>)> = None;

        for node in nodes {
            match node.kind {
                NodeKind::Text(s) => {
                    let span = node.span.unwrap_or(0..0);
                    run = Some(match run.take() {
                        Some((mut text, prev)) => {
                            text.push_str(&s);
                            (text, prev.start..span.end)
                        }
                        None => (s, span),
                    });
                }
                _ => {
                    if let Some((text, span)) = run.take() {
                        self.push_run(&mut out, text, span);
                    }
                    out.push(node);
                }
            }
        }
        if let Some((text, span)) = run.take() {
            self.push_run(&mut out, text, span);
        }
        out
    }

    fn push_run(&self, out: &mut Vec<Node>, text: String, span: Range<usize>) {
        // Sub-spans are exact only when the run maps onto the source byte for
        // byte (no escapes or entities were decoded).
        let exact = self.source.get(span.clone()) == Some(text.as_str());
        let sub_span = |r: &Range<usize>| {
            if exact {
                span.start + r.start..span.start + r.end
            } else {
                span.clone()
            }
        };

        for piece in embed::split_embeds(&text) {
            match piece {
                Piece::Text(r) => {
                    let node = Node::text(&text[r.clone()]).with_span(sub_span(&r));
                    out.push(node);
                }
                Piece::Embed(r, embed) => {
                    let node = Node::leaf(NodeKind::Embed(embed)).with_span(sub_span(&r));
                    out.push(node);
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn heading_level_to_u8(level: &HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

/// Collect raw text and HTML until the closing `End` event.
fn collect_raw_until_end(events: &[(Event<'_>, Range<usize>)], i: &mut usize) -> String {
    let mut text = String::new();
    while *i < events.len() {
        let (ref ev, _) = events[*i];
        *i += 1;
        match ev {
            Event::End(_) => break,
            Event::Text(s) | Event::Html(s) => text.push_str(s),
            _ => {}
        }
    }
    text
}

/// Tight list items carry bare inlines; wrap each inline run in a paragraph
/// so every item child is a block.
fn wrap_inline_runs(children: Vec<Node>) -> Vec<Node> {
    let mut out = Vec::with_capacity(children.len());
    let mut run: Vec<Node> = Vec::new();

    for child in children {
        if child.kind.is_block() {
            flush_run(&mut run, &mut out);
            out.push(child);
        } else {
            run.push(child);
        }
    }
    flush_run(&mut run, &mut out);
    out
}

fn flush_run(run: &mut Vec<Node>, out: &mut Vec<Node>) {
    if run.is_empty() {
        return;
    }
    let inlines = std::mem::take(run);
    let paragraph = Node::paragraph(inlines);
    if paragraph.is_blank() {
        return;
    }
    let start = paragraph.children.first().and_then(|n| n.span.clone());
    let end = paragraph.children.last().and_then(|n| n.span.clone());
    let paragraph = match (start, end) {
        (Some(s), Some(e)) => paragraph.with_span(s.start..e.end),
        _ => paragraph,
    };
    out.push(paragraph);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> Node {
        parse_tree(src, 0).expect("parse failed")
    }

    #[test]
    fn headings_and_paragraphs() {
        let root = parse("# Title\n\nBody text\n\n### Deep");
        assert_eq!(root.children.len(), 3);
        assert_eq!(root.children[0].kind, NodeKind::Heading { depth: 1 });
        assert_eq!(root.children[0].text_content(), "Title");
        assert_eq!(root.children[1].kind, NodeKind::Paragraph);
        assert_eq!(root.children[2].kind, NodeKind::Heading { depth: 3 });
    }

    #[test]
    fn inline_html_is_kept_apart_from_text() {
        let root = parse("a <b>x</b> c");
        let kinds: Vec<_> = root.children[0].children.iter().map(|n| n.kind.clone()).collect();
        assert_eq!(
            kinds,
            vec![
                NodeKind::Text("a ".into()),
                NodeKind::InlineHtml("<b>".into()),
                NodeKind::Text("x".into()),
                NodeKind::InlineHtml("</b>".into()),
                NodeKind::Text(" c".into()),
            ]
        );
    }

    #[test]
    fn embed_alone_in_paragraph() {
        let src = "# Main\n\n{{embed:A}}";
        let root = parse(src);
        let para = &root.children[1];
        assert_eq!(para.kind, NodeKind::Paragraph);
        assert_eq!(para.children.len(), 1);
        let embed = para.children[0].embed_ref().expect("embed");
        assert_eq!(embed.target.as_deref(), Some("A"));
        let span = para.children[0].span.clone().unwrap();
        assert_eq!(&src[span], "{{embed:A}}");
    }

    #[test]
    fn wikilink_embed_between_text() {
        let src = "Some text ![[file1.md]] more text";
        let root = parse(src);
        let para = &root.children[0];
        assert_eq!(para.children.len(), 3);
        assert_eq!(para.children[0].kind, NodeKind::Text("Some text ".into()));
        let embed = para.children[1].embed_ref().expect("embed");
        assert_eq!(embed.raw, "![[file1.md]]");
        assert_eq!(&src[para.children[1].span.clone().unwrap()], "![[file1.md]]");
    }

    #[test]
    fn embed_in_code_is_not_recognized() {
        let root = parse("`![[a.md]]`\n\n```\n![[b.md]]\n```");
        assert_eq!(root.count(|n| n.kind.is_embed()), 0);
    }

    #[test]
    fn tight_list_item_gets_paragraph() {
        let root = parse("- List item\n  ![[file1.md]]\n- Other");
        let list = &root.children[0];
        assert!(matches!(list.kind, NodeKind::List { ordered: false, .. }));
        let item = &list.children[0];
        assert!(item.kind.is_list_item());
        assert_eq!(item.children.len(), 1);
        let para = &item.children[0];
        assert_eq!(para.kind, NodeKind::Paragraph);
        assert!(para.children.iter().any(|n| n.kind.is_embed()));
    }

    #[test]
    fn task_markers_attach_to_their_item() {
        let root = parse("- [x] done\n  - [ ] nested\n- plain");
        let list = &root.children[0];
        assert_eq!(list.children[0].kind, NodeKind::ListItem { checked: Some(true) });
        let nested = &list.children[0].children[1].children[0];
        assert_eq!(nested.kind, NodeKind::ListItem { checked: Some(false) });
        assert_eq!(list.children[1].kind, NodeKind::ListItem { checked: None });
    }

    #[test]
    fn ordered_list_start() {
        let root = parse("3. a\n4. b");
        assert_eq!(
            root.children[0].kind,
            NodeKind::List {
                ordered: true,
                start: Some(3)
            }
        );
    }

    #[test]
    fn excessive_nesting_is_an_error() {
        let src = ">".repeat(MAX_NESTING + 5) + " deep";
        let errors = parse_tree(&src, 7).expect_err("should fail");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].file_id, 7);
        assert!(errors[0].message.contains("nesting"));
    }
}
