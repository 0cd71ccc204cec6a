use std::ops::Range;

use thiserror::Error;

/// Failure to retrieve the raw text behind an embed target.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("no document named '{0}'")]
    NotFound(String),

    #[error("target '{0}' escapes the vault root")]
    Escapes(String),

    #[error("cannot read '{target}': {source}")]
    Io {
        target: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Other(String),
}

/// A per-embed fault. None of these abort resolution; each one drops the
/// offending embed and is reported alongside the resolved tree.
#[derive(Debug, Error)]
pub enum FreezeWarning {
    #[error("embed has no target: {raw}")]
    MissingTarget { raw: String },

    #[error("circular embed of '{target}' (chain: {chain})")]
    Cycle { target: String, chain: String },

    #[error("embed chain too deep at '{target}' ({depth} levels)")]
    ChainTooDeep { target: String, depth: usize },

    #[error("failed to read '{target}': {source}")]
    Fetch {
        target: String,
        #[source]
        source: SourceError,
    },

    #[error("failed to parse '{target}': {}", .messages.join("; "))]
    Parse {
        target: String,
        messages: Vec<String>,
    },

    #[error("gave up after {passes} passes; removed {remaining} unresolved embed(s)")]
    PassLimit { passes: usize, remaining: usize },

    #[error("resolution cancelled; removed {remaining} unresolved embed(s)")]
    Cancelled { remaining: usize },
}

/// A warning together with where it happened.
#[derive(Debug)]
pub struct FreezeDiagnostic {
    pub warning: FreezeWarning,
    /// Byte span of the embed in the document it was found in.
    pub span: Option<Range<usize>>,
    /// Embed chain leading to that document. Empty for the host document.
    pub chain: Vec<String>,
}

impl FreezeDiagnostic {
    /// True if `span` refers to the host document's own source.
    pub fn in_host(&self) -> bool {
        self.chain.is_empty()
    }

    /// The embed target the warning is about, if it names one.
    pub fn target(&self) -> Option<&str> {
        match &self.warning {
            FreezeWarning::Cycle { target, .. }
            | FreezeWarning::ChainTooDeep { target, .. }
            | FreezeWarning::Fetch { target, .. }
            | FreezeWarning::Parse { target, .. } => Some(target),
            _ => None,
        }
    }
}

impl std::fmt::Display for FreezeDiagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.chain.last() {
            Some(doc) => write!(f, "{} (in {})", self.warning, doc),
            None => write!(f, "{}", self.warning),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_warning_names_target_and_cause() {
        let w = FreezeWarning::Fetch {
            target: "a.md".into(),
            source: SourceError::NotFound("a.md".into()),
        };
        let msg = w.to_string();
        assert!(msg.contains("failed to read 'a.md'"));
        assert!(msg.contains("no document named"));
    }

    #[test]
    fn diagnostic_mentions_embedding_document() {
        let diag = FreezeDiagnostic {
            warning: FreezeWarning::Cycle {
                target: "a.md".into(),
                chain: "a.md -> b.md".into(),
            },
            span: None,
            chain: vec!["a.md".into(), "b.md".into()],
        };
        assert!(!diag.in_host());
        assert_eq!(diag.target(), Some("a.md"));
        assert!(diag.to_string().ends_with("(in b.md)"));
    }

    #[test]
    fn parse_warning_joins_messages() {
        let w = FreezeWarning::Parse {
            target: "x".into(),
            messages: vec!["one".into(), "two".into()],
        };
        assert_eq!(w.to_string(), "failed to parse 'x': one; two");
    }
}
