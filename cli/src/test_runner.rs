//! Runner for `.test.md` fixtures.
//!
//! A fixture is TOML frontmatter between `---` lines followed by the host
//! document. The documents it may embed live in a `[files]` table:
//!
//! ```text
//! ---
//! description = "embed under a heading"
//! expect_output = """
//! # Main
//!
//! ## Title
//! """
//!
//! [files]
//! A = "# Title"
//! ---
//! # Main
//!
//! ![[A]]
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use freeze::{ContextMode, FreezeDiagnostic, FreezeOptions, Freezer, MemorySource};

#[derive(Debug, Deserialize)]
pub struct ExpectedWarning {
    /// Substring that must appear in the warning message.
    pub contains: String,

    /// If set, the warning must point at this 1-based line of the host document.
    #[serde(default)]
    pub line: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestConfig {
    #[serde(default)]
    pub description: Option<String>,

    /// Expected rendered document (trimmed comparison).
    #[serde(default)]
    pub expect_output: Option<String>,

    /// Substrings the rendered document must contain.
    #[serde(default)]
    pub expect_contains: Vec<String>,

    /// Substrings the rendered document must not contain.
    #[serde(default)]
    pub expect_absent: Vec<String>,

    /// Expected warnings. If present (even empty), count and content are checked.
    #[serde(default)]
    pub expect_warnings: Option<Vec<ExpectedWarning>>,

    /// Resolve in outline mode.
    #[serde(default)]
    pub outline: bool,

    #[serde(default)]
    pub max_passes: Option<usize>,

    /// Documents available to embed, keyed by target.
    #[serde(default)]
    pub files: BTreeMap<String, String>,
}

impl TestConfig {
    fn options(&self) -> FreezeOptions {
        let mut options = FreezeOptions::default();
        if self.outline {
            options.context = ContextMode::Outline;
        }
        if let Some(max_passes) = self.max_passes {
            options.max_passes = max_passes;
        }
        options
    }
}

/// Split a fixture into its config and the host document.
fn parse_test_file(content: &str) -> Result<(TestConfig, &str), String> {
    let content = content.trim_start_matches('\u{feff}');

    let after_open = content
        .strip_prefix("---")
        .ok_or("missing opening --- frontmatter delimiter")?;
    let after_open = after_open
        .strip_prefix('\n')
        .or_else(|| after_open.strip_prefix("\r\n"))
        .unwrap_or(after_open);

    let close = after_open
        .find("\n---")
        .ok_or("missing closing --- frontmatter delimiter")?;
    let frontmatter = after_open[..close].trim_end_matches('\r');
    let rest = &after_open[close + 4..];
    let source = rest
        .strip_prefix("\r\n")
        .or_else(|| rest.strip_prefix('\n'))
        .unwrap_or(rest);

    let config: TestConfig =
        toml::from_str(frontmatter).map_err(|e| format!("TOML parse error: {}", e))?;
    Ok((config, source))
}

pub enum TestOutcome {
    Pass,
    Fail(String),
}

pub struct TestResult {
    pub path: PathBuf,
    pub description: Option<String>,
    pub outcome: TestOutcome,
}

impl TestResult {
    fn label(&self) -> &str {
        self.description.as_deref().unwrap_or_else(|| {
            self.path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("?")
        })
    }
}

async fn run_single_test(path: &Path) -> TestResult {
    let finish = |description: Option<String>, outcome: TestOutcome| TestResult {
        path: path.to_path_buf(),
        description,
        outcome,
    };

    // 1. Read and split
    let content = match tokio::fs::read_to_string(path).await {
        Ok(c) => c,
        Err(e) => return finish(None, TestOutcome::Fail(format!("cannot read file: {}", e))),
    };
    let (config, source) = match parse_test_file(&content) {
        Ok(pair) => pair,
        Err(e) => return finish(None, TestOutcome::Fail(format!("frontmatter error: {}", e))),
    };
    let description = config.description.clone();

    // 2. Resolve against the in-memory files
    let vault: MemorySource = config.files.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
    let freezer = Freezer::new(vault).with_options(config.options());
    let (tree, report) = match freezer.freeze_source(source).await {
        Ok(pair) => pair,
        Err(errors) => {
            let msgs: Vec<String> = errors.iter().map(|e| e.message.clone()).collect();
            return finish(
                description,
                TestOutcome::Fail(format!("unexpected parse error: {}", msgs.join("; "))),
            );
        }
    };
    let output = tree.to_string();

    // 3. Check expectations
    let failure = check_output(&config, &output)
        .or_else(|| {
            config
                .expect_warnings
                .as_ref()
                .and_then(|expected| check_warnings(source, &report.diagnostics, expected))
        });

    match failure {
        Some(reason) => finish(description, TestOutcome::Fail(reason)),
        None => finish(description, TestOutcome::Pass),
    }
}

fn check_output(config: &TestConfig, output: &str) -> Option<String> {
    if let Some(expected) = &config.expect_output {
        let actual = output.trim();
        let expected = expected.trim();
        if actual != expected {
            return Some(format!(
                "output mismatch\n  expected:\n{}\n  actual:\n{}",
                indent(expected),
                indent(actual)
            ));
        }
    }
    if let Some(missing) = config.expect_contains.iter().find(|s| !output.contains(s.as_str())) {
        return Some(format!("output does not contain \"{}\"\n{}", missing, indent(output)));
    }
    if let Some(present) = config.expect_absent.iter().find(|s| output.contains(s.as_str())) {
        return Some(format!("output unexpectedly contains \"{}\"\n{}", present, indent(output)));
    }
    None
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|line| format!("    {}", line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Convert a byte offset in `source` to a 1-based line number.
pub fn byte_offset_to_line(source: &str, offset: usize) -> usize {
    source.as_bytes()[..offset.min(source.len())]
        .iter()
        .filter(|&&b| b == b'\n')
        .count()
        + 1
}

fn check_warnings(
    source: &str,
    diagnostics: &[FreezeDiagnostic],
    expected: &[ExpectedWarning],
) -> Option<String> {
    if diagnostics.len() != expected.len() {
        let actual: Vec<String> = diagnostics.iter().map(|d| format!("  - {}", d)).collect();
        return Some(format!(
            "expected {} warning(s), got {}\n  actual warnings:\n{}",
            expected.len(),
            diagnostics.len(),
            if actual.is_empty() {
                "    (none)".to_string()
            } else {
                actual.join("\n")
            }
        ));
    }

    for (i, (actual, expected)) in diagnostics.iter().zip(expected).enumerate() {
        let msg = actual.to_string();
        if !msg.contains(&expected.contains) {
            return Some(format!(
                "warning[{}]: expected message containing \"{}\", got: {}",
                i, expected.contains, msg
            ));
        }

        let Some(expected_line) = expected.line else {
            continue;
        };
        match &actual.span {
            Some(span) if actual.in_host() => {
                let actual_line = byte_offset_to_line(source, span.start);
                if actual_line != expected_line {
                    return Some(format!(
                        "warning[{}]: expected on line {}, but span is on line {}",
                        i, expected_line, actual_line
                    ));
                }
            }
            _ => {
                return Some(format!(
                    "warning[{}]: expected on line {}, but warning has no span in the host document",
                    i, expected_line
                ));
            }
        }
    }

    None
}

// ---------------------------------------------------------------------------
// Discovery and reporting
// ---------------------------------------------------------------------------

/// `.test.md` files under `root` grouped by subfolder. Files directly in
/// `root` get category "".
fn discover_categorized(root: &Path) -> BTreeMap<String, Vec<PathBuf>> {
    let mut categories: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    collect_tests(root, root, &mut categories);
    for files in categories.values_mut() {
        files.sort();
    }
    categories
}

fn collect_tests(dir: &Path, root: &Path, out: &mut BTreeMap<String, Vec<PathBuf>>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_tests(&path, root, out);
            continue;
        }
        let is_fixture = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(".test.md"));
        if is_fixture {
            let category = path
                .parent()
                .and_then(|p| p.strip_prefix(root).ok())
                .map(|p| p.to_string_lossy().replace('\\', "/"))
                .unwrap_or_default();
            out.entry(category).or_default().push(path);
        }
    }
}

fn category_label(category: &str) -> &str {
    if category.is_empty() { "(root)" } else { category }
}

pub fn list_categories(path: &Path) {
    if path.is_file() {
        eprintln!("(single file, no categories)");
        return;
    }

    let categories = discover_categorized(path);
    if categories.is_empty() {
        eprintln!("no .test.md files found in {}", path.display());
        return;
    }

    eprintln!("available categories:");
    for (category, files) in &categories {
        eprintln!("  {} ({} tests)", category_label(category), files.len());
    }
}

/// Keep the categories matching any of `requested` (a category matches
/// itself and its subfolders). Everything when `requested` is empty.
fn select_categories<'a>(
    all: &'a BTreeMap<String, Vec<PathBuf>>,
    requested: &[String],
) -> BTreeMap<&'a str, &'a Vec<PathBuf>> {
    if requested.is_empty() {
        return all.iter().map(|(k, v)| (k.as_str(), v)).collect();
    }

    let mut selected = BTreeMap::new();
    for request in requested {
        let request = request.trim_matches('/');
        let prefix = format!("{}/", request);
        let before = selected.len();
        for (category, files) in all {
            if category == request || category.starts_with(&prefix) {
                selected.insert(category.as_str(), files);
            }
        }
        if selected.len() == before {
            eprintln!(
                "warning: category '{}' not found (available: {})",
                request,
                all.keys()
                    .map(|k| category_label(k))
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
    }
    selected
}

struct Style {
    no_color: bool,
}

impl Style {
    fn paint(&self, text: &str, code: &str) -> String {
        if self.no_color {
            text.to_string()
        } else {
            format!("\x1b[{}m{}\x1b[0m", code, text)
        }
    }

    fn pass(&self) -> String {
        self.paint("PASS", "32")
    }

    fn fail(&self) -> String {
        self.paint("FAIL", "31")
    }

    fn bold(&self, text: &str) -> String {
        self.paint(text, "1")
    }
}

/// Run every fixture under `path` (or the single file `path`), restricted to
/// `categories` when non-empty. Returns the process exit code.
pub async fn run_tests(path: &Path, no_color: bool, categories: &[String]) -> i32 {
    let style = Style { no_color };

    let groups: Vec<(String, Vec<PathBuf>)> = if path.is_file() {
        vec![(String::new(), vec![path.to_path_buf()])]
    } else {
        let all = discover_categorized(path);
        if all.is_empty() {
            eprintln!("no .test.md files found in {}", path.display());
            return 1;
        }
        let selected = select_categories(&all, categories);
        if selected.is_empty() {
            eprintln!("no matching categories found");
            return 1;
        }
        selected
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    };

    let mut passed = 0usize;
    let mut failures: Vec<TestResult> = Vec::new();

    for (category, files) in &groups {
        if path.is_dir() {
            eprintln!();
            eprintln!("{}", style.bold(category_label(category)));
        }
        for file in files {
            let result = run_single_test(file).await;
            match &result.outcome {
                TestOutcome::Pass => {
                    passed += 1;
                    eprintln!("  {}  {}", style.pass(), result.label());
                }
                TestOutcome::Fail(_) => {
                    eprintln!("  {}  {}", style.fail(), result.label());
                    failures.push(result);
                }
            }
        }
    }

    if !failures.is_empty() {
        eprintln!();
        eprintln!("failures:");
        for failure in &failures {
            eprintln!();
            eprintln!("  --- {} ---", failure.path.display());
            if let TestOutcome::Fail(reason) = &failure.outcome {
                for line in reason.lines() {
                    eprintln!("  {}", line);
                }
            }
        }
    }

    eprintln!();
    if failures.is_empty() {
        eprintln!("test result: {}. {} passed, 0 failed", style.paint("ok", "32"), passed);
        0
    } else {
        eprintln!(
            "test result: {}. {} passed, {} failed (of {})",
            style.paint("FAILED", "31"),
            passed,
            failures.len(),
            passed + failures.len()
        );
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixtures_dir() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("../fixtures")
    }

    #[test]
    fn frontmatter_is_split_from_source() {
        let content = "---\ndescription = \"d\"\n[files]\nA = \"x\"\n---\n# Host\n";
        let (config, source) = parse_test_file(content).unwrap();
        assert_eq!(config.description.as_deref(), Some("d"));
        assert_eq!(config.files.get("A").map(String::as_str), Some("x"));
        assert_eq!(source, "# Host\n");
    }

    #[test]
    fn missing_delimiters_are_reported() {
        assert!(parse_test_file("# no frontmatter").is_err());
        assert!(parse_test_file("---\ndescription = \"d\"\n").is_err());
        assert!(parse_test_file("---\nunknown_key = 1\n---\n").is_err());
    }

    #[test]
    fn line_numbers_are_one_based() {
        let source = "a\nb\nc";
        assert_eq!(byte_offset_to_line(source, 0), 1);
        assert_eq!(byte_offset_to_line(source, 2), 2);
        assert_eq!(byte_offset_to_line(source, 100), 3);
    }

    #[tokio::test]
    async fn failing_expectation_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("wrong.test.md");
        std::fs::write(&file, "---\nexpect_output = \"nope\"\n---\nactual\n").unwrap();

        let result = run_single_test(&file).await;
        match result.outcome {
            TestOutcome::Fail(reason) => assert!(reason.contains("output mismatch")),
            TestOutcome::Pass => panic!("expected failure"),
        }
    }

    #[tokio::test]
    async fn bundled_fixtures_pass() {
        let categories = discover_categorized(&fixtures_dir());
        assert!(!categories.is_empty(), "no fixtures found");

        let mut failures = Vec::new();
        for file in categories.values().flatten() {
            let result = run_single_test(file).await;
            if let TestOutcome::Fail(reason) = result.outcome {
                failures.push(format!("{}: {}", file.display(), reason));
            }
        }
        assert!(failures.is_empty(), "{}", failures.join("\n\n"));
    }
}
