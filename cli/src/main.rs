mod config;
mod test_runner;

use std::path::{Path, PathBuf};
use std::process;

use clap::{ArgAction, Parser, Subcommand};
use codespan_reporting::diagnostic::{Diagnostic, Label, Severity};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use freeze::{ContextMode, FreezeDiagnostic, Freezer, FsSource};
use mdtree::Node;

use crate::config::Config;

const SUBCOMMANDS: &[&str] = &["run", "test", "help"];

#[derive(Parser)]
#[command(name = "mdfreeze", version, about = "Inline Markdown embeds into a single document")]
struct Cli {
    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Log more (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve every embed in a Markdown file
    Run(RunArgs),

    /// Run .test.md fixture files
    Test(TestArgs),
}

#[derive(clap::Args)]
struct RunArgs {
    /// Markdown file to resolve
    file: PathBuf,

    /// Write the result here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Directory embed targets are read from (default: the file's directory)
    #[arg(long)]
    vault: Option<PathBuf>,

    /// Nest embeds under the heading that precedes them
    #[arg(long)]
    outline: bool,

    /// Give up after this many passes
    #[arg(long)]
    max_passes: Option<usize>,

    /// Config file (default: mdfreeze.toml next to FILE, if present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Dump the resolved tree
    #[arg(long)]
    ast: bool,

    /// List the embeds in FILE without resolving them
    #[arg(long)]
    list_embeds: bool,

    /// Resolve without writing output; exit 1 if any embed was dropped
    #[arg(long)]
    check: bool,

    /// Don't write the resolved document
    #[arg(short, long)]
    quiet: bool,

    /// Exit 1 if any warning was reported
    #[arg(long)]
    deny_warnings: bool,
}

#[derive(clap::Args)]
struct TestArgs {
    /// Path to a .test.md file or a directory containing them
    path: PathBuf,

    /// Run only tests in these categories (subfolder names). Repeatable.
    #[arg(short, long)]
    category: Vec<String>,

    /// List available categories and exit
    #[arg(long)]
    list_categories: bool,
}

#[tokio::main]
async fn main() {
    // `mdfreeze doc.md` is shorthand for `mdfreeze run doc.md`.
    let mut args: Vec<String> = std::env::args().collect();
    let first_positional = args
        .iter()
        .enumerate()
        .skip(1)
        .find(|(_, a)| !a.starts_with('-'))
        .map(|(pos, a)| (pos, a.clone()));
    if let Some((pos, first)) = first_positional {
        if !SUBCOMMANDS.contains(&first.as_str()) {
            args.insert(pos, "run".to_string());
        }
    }

    let cli = Cli::parse_from(&args);
    init_tracing(cli.verbose, cli.no_color);

    match cli.command {
        Command::Run(run_args) => {
            let exit_code = do_run(run_args, cli.no_color).await;
            process::exit(exit_code);
        }
        Command::Test(test_args) => {
            if test_args.list_categories {
                test_runner::list_categories(&test_args.path);
                return;
            }
            let exit_code =
                test_runner::run_tests(&test_args.path, cli.no_color, &test_args.category).await;
            process::exit(exit_code);
        }
    }
}

fn init_tracing(verbose: u8, no_color: bool) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(!no_color)
        .without_time()
        .init();
}

async fn do_run(args: RunArgs, no_color: bool) -> i32 {
    let color_choice = if no_color {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    };
    let writer = StandardStream::stderr(color_choice);
    let term_config = term::Config::default();

    // 1. Source and config
    let source = match std::fs::read_to_string(&args.file) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: cannot read '{}': {}", args.file.display(), e);
            return 1;
        }
    };
    let config = match Config::load(args.config.as_deref(), &args.file) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {}", e);
            return 1;
        }
    };

    let mut options = config.freeze;
    if args.outline {
        options.context = ContextMode::Outline;
    }
    if let Some(max_passes) = args.max_passes {
        options.max_passes = max_passes;
    }
    let vault = args
        .vault
        .or(config.vault)
        .unwrap_or_else(|| config::input_dir(&args.file));

    // 2. Parse
    let mut files = SimpleFiles::new();
    let file_id = files.add(args.file.display().to_string(), source.clone());

    let parser = mdtree::parser::Parser::new(source.clone(), file_id);
    let mut tree = match parser.parse() {
        Ok(tree) => tree,
        Err(errors) => {
            for error in &errors {
                let diagnostic = error.to_diagnostic();
                let _ = term::emit_to_write_style(
                    &mut writer.lock(),
                    &term_config,
                    &files,
                    &diagnostic,
                );
            }
            return 1;
        }
    };

    if args.list_embeds {
        list_embeds(&tree, &source);
        return 0;
    }

    // 3. Resolve
    let root_id = document_id(&args.file, &vault);
    debug!(vault = %vault.display(), root = ?root_id, ?options, "resolving");
    let freezer = Freezer::new(FsSource::new(&vault)).with_options(options);
    let report = freezer.freeze_from(&mut tree, root_id.as_deref()).await;

    for diag in &report.diagnostics {
        emit_warning(&writer, &term_config, &files, file_id, diag);
    }

    if args.check {
        eprintln!(
            "{}: {} embed(s) resolved, {} warning(s)",
            args.file.display(),
            report.resolved,
            report.diagnostics.len()
        );
        return if report.is_clean() { 0 } else { 1 };
    }

    if args.ast {
        println!("{:#?}", tree);
    } else if !args.quiet {
        let rendered = tree.to_string();
        match &args.output {
            Some(path) => {
                if let Err(e) = std::fs::write(path, rendered) {
                    eprintln!("error: cannot write '{}': {}", path.display(), e);
                    return 1;
                }
            }
            None => print!("{}", rendered),
        }
    }

    if args.deny_warnings && !report.is_clean() {
        1
    } else {
        0
    }
}

/// The identifier an embed would use to refer to `file`: its path below the
/// vault without the `.md` extension.
fn document_id(file: &Path, vault: &Path) -> Option<String> {
    let file = file.canonicalize().ok()?;
    let vault = vault.canonicalize().ok()?;
    let relative = file.strip_prefix(&vault).ok()?;
    let relative = match relative.extension() {
        Some(ext) if ext == "md" => relative.with_extension(""),
        _ => relative.to_path_buf(),
    };
    Some(relative.to_string_lossy().replace('\\', "/"))
}

fn list_embeds(tree: &Node, source: &str) {
    for site in freeze::site::collect_sites(tree) {
        let line = site
            .span
            .as_ref()
            .map(|span| test_runner::byte_offset_to_line(source, span.start));
        let target = site.embed.target.as_deref().unwrap_or("(no target)");
        match line {
            Some(line) => println!("{:>4}  {}  {}", line, target, site.embed.raw),
            None => println!("   ?  {}  {}", target, site.embed.raw),
        }
    }
}

fn emit_warning(
    writer: &StandardStream,
    config: &term::Config,
    files: &SimpleFiles<String, String>,
    file_id: usize,
    diag: &FreezeDiagnostic,
) {
    match &diag.span {
        Some(span) if diag.in_host() => {
            let diagnostic = Diagnostic::new(Severity::Warning)
                .with_message(diag.warning.to_string())
                .with_labels(vec![Label::primary(file_id, span.clone())]);
            let _ = term::emit_to_write_style(&mut writer.lock(), config, files, &diagnostic);
        }
        _ => eprintln!("warning: {}", diag),
    }
}
