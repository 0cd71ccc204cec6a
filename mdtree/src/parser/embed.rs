//! Recognition of embed references inside running text.
//!
//! Two spellings are accepted:
//!
//! - `![[target]]` and `![[target|alt]]` (Obsidian wikilink embeds)
//! - `{{embed:target}}`

use std::ops::Range;

use crate::node::{Embed, EmbedType};

const WIKI_OPEN: &str = "![[";
const WIKI_CLOSE: &str = "]]";
const BRACE_OPEN: &str = "{{embed:";
const BRACE_CLOSE: &str = "}}";

/// A slice of a text run: either plain text or an embed reference.
#[derive(Debug, Clone, PartialEq)]
pub enum Piece {
    Text(Range<usize>),
    Embed(Range<usize>, Embed),
}

/// Split `text` into plain-text and embed pieces. Byte ranges are relative to
/// `text`. An opener without its closer is left as plain text.
pub fn split_embeds(text: &str) -> Vec<Piece> {
    let mut pieces = Vec::new();
    let mut plain_start = 0;
    let mut cursor = 0;

    while cursor < text.len() {
        let Some((open_at, open, close)) = next_opener(&text[cursor..]) else {
            break;
        };
        let open_at = cursor + open_at;
        let inner_start = open_at + open.len();
        let Some(close_rel) = text[inner_start..].find(close) else {
            break;
        };
        let inner_end = inner_start + close_rel;
        let end = inner_end + close.len();

        if plain_start < open_at {
            pieces.push(Piece::Text(plain_start..open_at));
        }
        let embed = build_embed(&text[inner_start..inner_end], &text[open_at..end], open == WIKI_OPEN);
        pieces.push(Piece::Embed(open_at..end, embed));

        cursor = end;
        plain_start = end;
    }

    if plain_start < text.len() {
        pieces.push(Piece::Text(plain_start..text.len()));
    }
    pieces
}

fn next_opener(text: &str) -> Option<(usize, &'static str, &'static str)> {
    let wiki = text.find(WIKI_OPEN).map(|at| (at, WIKI_OPEN, WIKI_CLOSE));
    let brace = text.find(BRACE_OPEN).map(|at| (at, BRACE_OPEN, BRACE_CLOSE));
    match (wiki, brace) {
        (Some(w), Some(b)) => Some(if w.0 <= b.0 { w } else { b }),
        (w, b) => w.or(b),
    }
}

fn build_embed(inner: &str, raw: &str, wikilink: bool) -> Embed {
    let (target, alt) = if wikilink {
        match inner.split_once('|') {
            Some((target, alt)) => (target, Some(alt.trim().to_string())),
            None => (inner, None),
        }
    } else {
        (inner, None)
    };

    let target = target.trim();
    let target = (!target.is_empty()).then(|| target.to_string());
    let embed_type = target
        .as_deref()
        .map(EmbedType::for_target)
        .unwrap_or(EmbedType::Wikilink);

    Embed {
        target,
        embed_type,
        alt,
        raw: raw.to_string(),
    }
}
