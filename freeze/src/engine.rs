use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::future::BoxFuture;
use mdtree::outline::{flatten, sectionize};
use mdtree::parser::ParseError;
use mdtree::{Node, NodeKind};
use tracing::{debug, info, warn};

use crate::context::Context;
use crate::error::{FreezeDiagnostic, FreezeWarning};
use crate::headings::adjust_headings;
use crate::options::{ContextMode, FreezeOptions};
use crate::parser::{DocumentParser, MarkdownParser};
use crate::site::{self, EmbedSite};
use crate::source::ContentSource;
use crate::stack::PathStack;

/// Outcome of one top-level resolution.
#[derive(Debug, Default)]
pub struct FreezeReport {
    /// Passes over the host tree that found at least one embed.
    pub passes: usize,
    /// Embeds replaced by content, at every nesting level.
    pub resolved: usize,
    pub diagnostics: Vec<FreezeDiagnostic>,
}

impl FreezeReport {
    pub fn warnings(&self) -> impl Iterator<Item = &FreezeWarning> {
        self.diagnostics.iter().map(|d| &d.warning)
    }

    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// Accumulated across the recursive calls of one resolution.
struct Tally {
    resolved: usize,
    diagnostics: Vec<FreezeDiagnostic>,
    /// Entries of the stack that identify the host document itself.
    root_len: usize,
}

impl Tally {
    fn record(&mut self, warning: FreezeWarning, site: Option<&EmbedSite>, stack: &PathStack) {
        let chain = stack.as_slice()[self.root_len.min(stack.depth())..].to_vec();
        warn!(chain = %stack, "{}", warning);
        self.diagnostics.push(FreezeDiagnostic {
            warning,
            span: site.and_then(|s| s.span.clone()),
            chain,
        });
    }
}

// ---------------------------------------------------------------------------
// Freezer
// ---------------------------------------------------------------------------

/// Replaces every embed in a tree, recursively, with the parsed content of
/// the document it names.
pub struct Freezer<S, P = MarkdownParser> {
    source: S,
    parser: P,
    options: FreezeOptions,
    cancel: Option<Arc<AtomicBool>>,
}

impl<S: ContentSource> Freezer<S> {
    pub fn new(source: S) -> Self {
        Freezer {
            source,
            parser: MarkdownParser,
            options: FreezeOptions::default(),
            cancel: None,
        }
    }
}

impl<S: ContentSource, P: DocumentParser> Freezer<S, P> {
    pub fn with_parser<Q: DocumentParser>(self, parser: Q) -> Freezer<S, Q> {
        Freezer {
            source: self.source,
            parser,
            options: self.options,
            cancel: self.cancel,
        }
    }

    pub fn with_options(mut self, options: FreezeOptions) -> Self {
        self.options = options;
        self
    }

    /// Stop between passes once `flag` is set. Embeds still present at that
    /// point are removed.
    pub fn with_cancellation(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn options(&self) -> &FreezeOptions {
        &self.options
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Resolve every embed in `tree` in place.
    pub async fn freeze(&self, tree: &mut Node) -> FreezeReport {
        self.freeze_from(tree, None).await
    }

    /// Like [`Freezer::freeze`], with the host document's own identifier on
    /// the stack so that a document embedding itself is caught as a cycle.
    pub async fn freeze_from(&self, tree: &mut Node, root_id: Option<&str>) -> FreezeReport {
        let stack = root_id.map(PathStack::with_root).unwrap_or_default();
        let mut tally = Tally {
            resolved: 0,
            diagnostics: Vec::new(),
            root_len: stack.depth(),
        };

        let passes = self.resolve_tree(tree, stack, &mut tally).await;
        info!(
            passes,
            resolved = tally.resolved,
            warnings = tally.diagnostics.len(),
            "embeds frozen"
        );

        FreezeReport {
            passes,
            resolved: tally.resolved,
            diagnostics: tally.diagnostics,
        }
    }

    /// Parse `text` with this freezer's parser and resolve it.
    pub async fn freeze_source(
        &self,
        text: &str,
    ) -> Result<(Node, FreezeReport), Vec<ParseError>> {
        let mut tree = self.parser.parse(text)?;
        let report = self.freeze(&mut tree).await;
        Ok((tree, report))
    }

    fn cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    // -----------------------------------------------------------------------
    // Passes
    // -----------------------------------------------------------------------

    /// Run passes over `tree` until a scan finds no embed. Returns the number
    /// of passes that found something.
    fn resolve_tree<'a>(
        &'a self,
        tree: &'a mut Node,
        stack: PathStack,
        tally: &'a mut Tally,
    ) -> BoxFuture<'a, usize> {
        Box::pin(async move {
            let outline = self.options.context == ContextMode::Outline;
            let mut passes = 0;

            loop {
                if self.cancelled() {
                    let remaining = strip_embeds(tree);
                    if remaining > 0 {
                        tally.record(FreezeWarning::Cancelled { remaining }, None, &stack);
                    }
                    break;
                }

                if outline {
                    *tree = sectionize(std::mem::replace(tree, Node::root(Vec::new())));
                }

                let sites = site::collect_sites(tree);
                let done = if sites.is_empty() {
                    true
                } else if passes >= self.options.max_passes {
                    let remaining = strip_embeds(tree);
                    tally.record(FreezeWarning::PassLimit { passes, remaining }, None, &stack);
                    true
                } else {
                    passes += 1;
                    debug!(pass = passes, embeds = sites.len(), chain = %stack, "scanning");
                    // Last-found first: splicing never shifts an earlier site.
                    for found in sites.into_iter().rev() {
                        self.resolve_site(tree, &found, &stack, tally).await;
                    }
                    false
                };

                if outline {
                    *tree = flatten(std::mem::replace(tree, Node::root(Vec::new())));
                }
                if done {
                    break;
                }
            }

            passes
        })
    }

    async fn resolve_site(
        &self,
        tree: &mut Node,
        found: &EmbedSite,
        stack: &PathStack,
        tally: &mut Tally,
    ) {
        if !site::still_present(tree, found) {
            debug!(raw = %found.embed.raw, "embed moved during pass; deferring");
            return;
        }

        // 1. Target and guards
        let Some(target) = found.embed.target.clone() else {
            let warning = FreezeWarning::MissingTarget {
                raw: found.embed.raw.clone(),
            };
            return drop_embed(tree, found, warning, stack, tally);
        };
        if stack.contains(&target) {
            let warning = FreezeWarning::Cycle {
                chain: format!("{} -> {}", stack, target),
                target,
            };
            return drop_embed(tree, found, warning, stack, tally);
        }
        if stack.depth() >= self.options.max_chain_depth {
            let warning = FreezeWarning::ChainTooDeep {
                target,
                depth: stack.depth(),
            };
            return drop_embed(tree, found, warning, stack, tally);
        }
        let inner = stack.extend(&target);

        // 2. Fetch and parse
        let text = match self.source.read(&found.embed).await {
            Ok(text) => text,
            Err(source) => {
                let warning = FreezeWarning::Fetch { target, source };
                return drop_embed(tree, found, warning, stack, tally);
            }
        };
        let mut content = match self.parser.parse(&text) {
            Ok(content) => content,
            Err(errors) => {
                let warning = FreezeWarning::Parse {
                    target,
                    messages: errors.into_iter().map(|e| e.message).collect(),
                };
                return drop_embed(tree, found, warning, stack, tally);
            }
        };

        // 3. Nested embeds, innermost first
        self.resolve_tree(&mut content, inner, tally).await;

        // 4. Splice
        let context = Context::detect(&found.ancestors);
        let spliced = match context.list_item {
            Some(list_item) => {
                site::splice_in_list_item(tree, found, list_item, take_blocks(content))
            }
            None => {
                // Headings own their sections while being renumbered, so an
                // overflowed heading takes its section into the list item.
                let mut outlined = sectionize(content);
                adjust_headings(&mut outlined, context.heading_depth);
                site::splice_block(tree, found, take_blocks(flatten(outlined)))
            }
        };

        if spliced {
            tally.resolved += 1;
            debug!(
                embed = %target,
                context = context.heading_depth,
                list_item = context.in_list_item(),
                "resolved"
            );
        }
    }
}

fn take_blocks(content: Node) -> Vec<Node> {
    match content.kind {
        NodeKind::Root => content.children,
        _ => vec![content],
    }
}

fn drop_embed(
    tree: &mut Node,
    found: &EmbedSite,
    warning: FreezeWarning,
    stack: &PathStack,
    tally: &mut Tally,
) {
    tally.record(warning, Some(found), stack);
    site::remove(tree, found);
}

/// Remove every embed left in `tree`. Returns how many there were.
fn strip_embeds(tree: &mut Node) -> usize {
    let sites = site::collect_sites(tree);
    for found in sites.iter().rev() {
        site::remove(tree, found);
    }
    sites.len()
}
