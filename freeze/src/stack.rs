use std::fmt;

/// The chain of embed targets currently being expanded, outermost first.
///
/// Extending a stack yields a new stack and leaves the original untouched, so
/// sibling expansions that branch from the same ancestor never see each
/// other's entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathStack {
    targets: Vec<String>,
}

impl PathStack {
    pub fn new() -> Self {
        PathStack::default()
    }

    /// A stack seeded with the host document's own identifier.
    pub fn with_root(id: impl Into<String>) -> Self {
        PathStack {
            targets: vec![id.into()],
        }
    }

    /// True if `target` is already being expanded somewhere up the chain.
    pub fn contains(&self, target: &str) -> bool {
        self.targets.iter().any(|t| t == target)
    }

    /// Return a new stack with `target` pushed on top.
    ///
    /// Callers must check [`PathStack::contains`] first; pushing a target that
    /// is already present would break the no-duplicates invariant.
    pub fn extend(&self, target: &str) -> PathStack {
        debug_assert!(
            !self.contains(target),
            "'{}' is already on the embed stack",
            target
        );
        let mut targets = Vec::with_capacity(self.targets.len() + 1);
        targets.extend(self.targets.iter().cloned());
        targets.push(target.to_string());
        PathStack { targets }
    }

    pub fn depth(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.targets
    }
}

impl fmt::Display for PathStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.targets.is_empty() {
            return write!(f, "(root)");
        }
        write!(f, "{}", self.targets.join(" -> "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_stack_contains_nothing() {
        let stack = PathStack::new();
        assert!(!stack.contains("a.md"));
        assert!(stack.is_empty());
    }

    #[test]
    fn contains_checks_every_level() {
        let stack = PathStack::new().extend("a.md").extend("b.md").extend("c.md");
        assert!(stack.contains("a.md"));
        assert!(stack.contains("c.md"));
        assert!(!stack.contains("d.md"));
        assert_eq!(stack.depth(), 3);
    }

    #[test]
    fn extend_leaves_original_untouched() {
        let base = PathStack::with_root("root.md");
        let left = base.extend("a.md");
        let right = base.extend("b.md");

        assert_eq!(base.as_slice(), ["root.md"]);
        assert!(!left.contains("b.md"));
        assert!(!right.contains("a.md"));
        assert_eq!(right.as_slice(), ["root.md", "b.md"]);
    }

    #[test]
    fn displays_chain() {
        let stack = PathStack::new().extend("a").extend("b");
        assert_eq!(stack.to_string(), "a -> b");
        assert_eq!(PathStack::new().to_string(), "(root)");
    }
}
