//! Markdown serialization of a document tree.

use std::fmt;

use crate::node::{ColumnAlignment, Node, NodeKind};

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            NodeKind::Root => {
                let body = blocks(&self.children);
                if body.is_empty() {
                    Ok(())
                } else {
                    writeln!(f, "{}", body)
                }
            }
            kind if kind.is_block() => writeln!(f, "{}", block(self)),
            _ => write!(f, "{}", inline(self)),
        }
    }
}

/// Render a sequence of blocks separated by blank lines.
fn blocks(nodes: &[Node]) -> String {
    nodes
        .iter()
        .map(block)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn block(node: &Node) -> String {
    match &node.kind {
        NodeKind::Root | NodeKind::ListItem { .. } => blocks(&node.children),
        NodeKind::Heading { depth } => {
            let hashes = "#".repeat(*depth as usize);
            let label: String = node
                .children
                .iter()
                .filter(|c| !c.kind.is_block())
                .map(inline)
                .collect();
            let mut parts = vec![match label.trim() {
                "" => hashes,
                label => format!("{} {}", hashes, label),
            }];
            // Blocks never belong in a label; they follow the heading.
            parts.extend(
                node.children
                    .iter()
                    .filter(|c| c.kind.is_block())
                    .map(block)
                    .filter(|s| !s.is_empty()),
            );
            let body = blocks(&node.content);
            if !body.is_empty() {
                parts.push(body);
            }
            parts.join("\n\n")
        }
        NodeKind::Paragraph => paragraph(&node.children),
        NodeKind::List { ordered, start } => {
            let first = start.unwrap_or(1);
            node.children
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    let marker = if *ordered {
                        format!("{}. ", first + i as u64)
                    } else {
                        "- ".to_string()
                    };
                    let check = match item.kind {
                        NodeKind::ListItem { checked: Some(true) } => "[x] ",
                        NodeKind::ListItem { checked: Some(false) } => "[ ] ",
                        _ => "",
                    };
                    let body = format!("{}{}", check, block(item));
                    format!("{}{}", marker, indent(&body, marker.len()))
                })
                .collect::<Vec<_>>()
                .join("\n")
        }
        NodeKind::Blockquote => blocks(&node.children)
            .lines()
            .map(|line| {
                if line.is_empty() {
                    ">".to_string()
                } else {
                    format!("> {}", line)
                }
            })
            .collect::<Vec<_>>()
            .join("\n"),
        NodeKind::CodeBlock { language, value } => {
            let mut out = format!("```{}\n{}", language.as_deref().unwrap_or(""), value);
            if !value.is_empty() && !value.ends_with('\n') {
                out.push('\n');
            }
            out.push_str("```");
            out
        }
        NodeKind::ThematicBreak => "---".to_string(),
        NodeKind::Html(raw) => raw.trim_end().to_string(),
        NodeKind::Table { alignments } => table(node, alignments),
        NodeKind::TableRow { .. } => table_row(node),
        NodeKind::TableCell => inlines(&node.children),
        _ => inline(node),
    }
}

/// A paragraph normally holds inlines only, but resolved list-item embeds can
/// leave blocks inside one. Those are rendered on their own.
fn paragraph(children: &[Node]) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut run = String::new();

    for child in children {
        if child.kind.is_block() {
            let text = run.trim();
            if !text.is_empty() {
                parts.push(escape_line_starts(text));
            }
            run.clear();
            parts.push(block(child));
        } else {
            run.push_str(&inline(child));
        }
    }
    let text = run.trim();
    if !text.is_empty() {
        parts.push(escape_line_starts(text));
    }
    parts.join("\n\n")
}

fn inlines(nodes: &[Node]) -> String {
    nodes.iter().map(inline).collect()
}

fn inline(node: &Node) -> String {
    match &node.kind {
        NodeKind::Text(s) => escape(s),
        NodeKind::Embed(embed) => embed.raw.clone(),
        NodeKind::Emphasis => format!("*{}*", inlines(&node.children)),
        NodeKind::Strong => format!("**{}**", inlines(&node.children)),
        NodeKind::Strikethrough => format!("~~{}~~", inlines(&node.children)),
        NodeKind::InlineCode(code) => code_span(code),
        NodeKind::InlineHtml(raw) => raw.clone(),
        NodeKind::Link { dest, title } => {
            if title.is_empty() {
                format!("[{}]({})", inlines(&node.children), dest)
            } else {
                format!("[{}]({} \"{}\")", inlines(&node.children), dest, title)
            }
        }
        NodeKind::Image { dest, .. } => format!("![{}]({})", inlines(&node.children), dest),
        NodeKind::SoftBreak => "\n".to_string(),
        NodeKind::HardBreak => "\\\n".to_string(),
        _ => block(node),
    }
}

fn table(node: &Node, alignments: &[ColumnAlignment]) -> String {
    let mut lines = Vec::new();
    for (i, row) in node.children.iter().enumerate() {
        lines.push(table_row(row));
        if i == 0 {
            let sep: Vec<&str> = alignments
                .iter()
                .map(|a| match a {
                    ColumnAlignment::None => "---",
                    ColumnAlignment::Left => ":--",
                    ColumnAlignment::Center => ":-:",
                    ColumnAlignment::Right => "--:",
                })
                .collect();
            lines.push(format!("| {} |", sep.join(" | ")));
        }
    }
    lines.join("\n")
}

fn table_row(row: &Node) -> String {
    let cells: Vec<String> = row
        .children
        .iter()
        .map(|c| inlines(&c.children).replace('|', "\\|"))
        .collect();
    format!("| {} |", cells.join(" | "))
}

// ---------------------------------------------------------------------------
// Escaping
// ---------------------------------------------------------------------------

/// Backslash-escape the characters that would read as inline markup.
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '*' | '_' | '[' | ']' | '#' | '`' | '<' | '>' | '~') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Escape list markers and setext underlines at the start of each line of a
/// paragraph. `#` and `>` are already escaped wherever they occur.
fn escape_line_starts(text: &str) -> String {
    text.split('\n')
        .map(escape_line_start)
        .collect::<Vec<_>>()
        .join("\n")
}

fn escape_line_start(line: &str) -> String {
    let body = line.trim_start();
    let lead = &line[..line.len() - body.len()];
    let digits = body.bytes().take_while(|b| b.is_ascii_digit()).count();
    if body.starts_with(['-', '+', '=']) {
        format!("{}\\{}", lead, body)
    } else if digits > 0 && body[digits..].starts_with(['.', ')']) {
        format!("{}{}\\{}", lead, &body[..digits], &body[digits..])
    } else {
        line.to_string()
    }
}

/// Wrap `code` in a backtick fence longer than any run inside it.
fn code_span(code: &str) -> String {
    let longest = code.split(|c| c != '`').map(str::len).max().unwrap_or(0);
    let fence = "`".repeat(longest + 1);
    if code.starts_with('`') || code.ends_with('`') {
        format!("{} {} {}", fence, code, fence)
    } else {
        format!("{}{}{}", fence, code, fence)
    }
}

/// Indent every line after the first by `width` spaces. Blank lines stay empty.
fn indent(text: &str, width: usize) -> String {
    let pad = " ".repeat(width);
    text.lines()
        .enumerate()
        .map(|(i, line)| {
            if i == 0 || line.is_empty() {
                line.to_string()
            } else {
                format!("{}{}", pad, line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn para(s: &str) -> Node {
        Node::paragraph(vec![Node::text(s)])
    }

    #[test]
    fn headings_and_paragraphs() {
        let root = Node::root(vec![Node::heading(2, "Title"), para("Body")]);
        assert_eq!(root.to_string(), "## Title\n\nBody\n");
    }

    #[test]
    fn empty_root_renders_nothing() {
        assert_eq!(Node::root(Vec::new()).to_string(), "");
    }

    #[test]
    fn list_items_indent_continuation() {
        let item = Node::list_item(vec![para("Label"), para("More")]);
        let root = Node::root(vec![Node::list(vec![item, Node::list_item(vec![para("Two")])])]);
        assert_eq!(root.to_string(), "- Label\n\n  More\n- Two\n");
    }

    #[test]
    fn ordered_list_numbers_from_start() {
        let list = Node::new(
            NodeKind::List {
                ordered: true,
                start: Some(3),
            },
            vec![Node::list_item(vec![para("a")]), Node::list_item(vec![para("b")])],
        );
        assert_eq!(Node::root(vec![list]).to_string(), "3. a\n4. b\n");
    }

    #[test]
    fn blocks_inside_paragraph_get_their_own_lines() {
        let p = Node::paragraph(vec![
            Node::text("List item"),
            Node::leaf(NodeKind::SoftBreak),
            Node::heading(1, "Inner"),
            para("Content"),
        ]);
        assert_eq!(Node::root(vec![p]).to_string(), "List item\n\n# Inner\n\nContent\n");
    }

    #[test]
    fn heading_content_follows_heading() {
        let h = Node::heading(1, "A").with_content(vec![para("owned")]);
        assert_eq!(Node::root(vec![h]).to_string(), "# A\n\nowned\n");
    }

    #[test]
    fn inline_markup_and_embeds() {
        let p = Node::paragraph(vec![
            Node::new(NodeKind::Strong, vec![Node::text("b")]),
            Node::text(" "),
            Node::leaf(NodeKind::InlineCode("c".into())),
            Node::text(" "),
            Node::embed("x.md"),
        ]);
        assert_eq!(p.to_string(), "**b** `c` ![[x.md]]\n");
    }

    #[test]
    fn escaped_text_survives_a_round_trip() {
        let source =
            "Literal \\*stars\\* and \\# not heading\n\n\\- not a list\n\n1\\. not ordered\n";
        let tree = crate::parse(source).unwrap();
        let rendered = tree.to_string();
        let again = crate::parse(&rendered).unwrap();

        let kinds: Vec<_> = again.children.iter().map(|c| c.kind.clone()).collect();
        assert_eq!(kinds, vec![NodeKind::Paragraph; 3]);
        let texts: Vec<_> = again.children.iter().map(Node::text_content).collect();
        assert_eq!(texts, ["Literal *stars* and # not heading", "- not a list", "1. not ordered"]);
        assert_eq!(rendered, again.to_string());
    }

    #[test]
    fn markup_characters_are_escaped() {
        let p = Node::paragraph(vec![Node::text("a_b [c] <d> `e` ~f~ \\")]);
        assert_eq!(p.to_string(), "a\\_b \\[c\\] \\<d\\> \\`e\\` \\~f\\~ \\\\\n");
    }

    #[test]
    fn inline_html_and_code_are_not_escaped() {
        let tree = crate::parse("a <b>bold</b> and `x*y` and `` a`b ``\n").unwrap();
        assert_eq!(tree.to_string(), "a <b>bold</b> and `x*y` and ``a`b``\n");
    }

    #[test]
    fn heading_block_children_follow_label() {
        let h = Node::new(
            NodeKind::Heading { depth: 1 },
            vec![Node::text("Title "), Node::heading(3, "Inner"), para("Body")],
        );
        assert_eq!(
            Node::root(vec![h, para("after")]).to_string(),
            "# Title\n\n### Inner\n\nBody\n\nafter\n"
        );
    }

    #[test]
    fn blockquote_prefixes_lines() {
        let q = Node::new(NodeKind::Blockquote, vec![para("one"), para("two")]);
        assert_eq!(Node::root(vec![q]).to_string(), "> one\n>\n> two\n");
    }
}
