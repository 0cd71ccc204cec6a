use serde::Deserialize;

/// Passes over one tree before giving up.
pub const DEFAULT_MAX_PASSES: usize = 100;

/// Longest embed chain (A embeds B embeds C ...) followed before dropping.
pub const DEFAULT_MAX_CHAIN_DEPTH: usize = 64;

/// How the heading context of an embed is determined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContextMode {
    /// Use the tree exactly as given: only headings that are real ancestors
    /// of the embed count.
    #[default]
    Ancestry,
    /// Treat every heading as owning the blocks after it, so an embed that
    /// follows `## Part` is nested under that heading.
    Outline,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct FreezeOptions {
    pub max_passes: usize,
    pub max_chain_depth: usize,
    pub context: ContextMode,
}

impl Default for FreezeOptions {
    fn default() -> Self {
        FreezeOptions {
            max_passes: DEFAULT_MAX_PASSES,
            max_chain_depth: DEFAULT_MAX_CHAIN_DEPTH,
            context: ContextMode::Ancestry,
        }
    }
}
