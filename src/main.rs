use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use miette::{Context, IntoDiagnostic, Result};
use tracing_subscriber::EnvFilter;

use codectags_core::CtagsConfig;
use codectags_repomap::tags::CtagsTagger;
use codectags_repomap::RepoMap;

const CONFIG_FILE: &str = ".code-ctags.toml";

#[derive(Parser)]
#[command(
    name = "code-ctags",
    version,
    about = "Ranked ctags maps of a repository",
    long_about = "code-ctags tags a repository with Universal Ctags, ranks definitions by how\n\
                   often other files reference them, and prints the most important ones as a\n\
                   compact tree sized for an LLM context window.\n\n\
                   Examples:\n  \
                     code-ctags map                           Map every file under the current directory\n  \
                     code-ctags map --focus src/main.rs       Bias the map towards files you are editing\n  \
                     code-ctags map --fnames a.py b.py        Map only the listed files\n  \
                     code-ctags doctor                        Check that ctags is usable"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file (default: .code-ctags.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging on stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    /// When to use colors
    #[arg(long, global = true, default_value = "auto")]
    color: ColorChoice,
}

#[derive(Subcommand)]
enum Command {
    /// Print a ranked map of the repository's definitions
    #[command(long_about = "Print a ranked map of the repository's definitions.\n\n\
        Files are tagged with Universal Ctags and linked by the identifiers they share.\n\
        PageRank, biased towards --focus files, orders the definitions; the best ones\n\
        that fit in --max-tokens are printed as a tab-indented tree. Without a usable\n\
        ctags the plain file list is printed instead.\n\n\
        Examples:\n  code-ctags map --path .\n  code-ctags map --max-tokens 2048 --focus src/lib.rs")]
    Map {
        /// Files to map, relative to --path (default: every text file under --path)
        #[arg(long, num_args = 1..)]
        fnames: Vec<PathBuf>,

        /// Repository root (default: current directory)
        #[arg(long, default_value = ".")]
        path: PathBuf,

        /// Files being worked on; they steer the ranking but their own definitions are omitted
        #[arg(long)]
        focus: Vec<PathBuf>,

        /// Size budget for the map, 0 for unlimited (default: from config, 1024)
        #[arg(long)]
        max_tokens: Option<usize>,

        /// Keep references from a file to its own definitions
        #[arg(long)]
        full: bool,

        /// Neither read nor write the tag cache
        #[arg(long)]
        no_cache: bool,
    },
    /// Create a default .code-ctags.toml configuration file
    #[command(long_about = "Create a default .code-ctags.toml configuration file.\n\n\
        Generates a commented template with all available options.\n\
        Fails if .code-ctags.toml already exists.")]
    Init,
    /// Check that ctags and the configuration are usable
    #[command(long_about = "Check that ctags and the configuration are usable.\n\n\
        Verifies that the configured ctags binary is Universal Ctags built with JSON\n\
        output, that the config file parses, and reports the state of the tag cache.")]
    Doctor,
    /// Generate shell completion scripts
    #[command(hide = true)]
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Clone, PartialEq, Eq, ValueEnum)]
enum ColorChoice {
    /// Auto-detect based on terminal
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

fn print_welcome(use_color: bool) {
    let version = env!("CARGO_PKG_VERSION");

    if use_color {
        println!("\x1b[1mcode-ctags\x1b[0m v{version}: ranked ctags maps for LLM context\n");
        println!("Commands:");
        println!("  \x1b[32mmap\x1b[0m       Ranked map of the repository's definitions");
        println!("  \x1b[32mdoctor\x1b[0m    Check ctags and configuration");
        println!("  \x1b[32minit\x1b[0m      Create default configuration\n");
    } else {
        println!("code-ctags v{version}: ranked ctags maps for LLM context\n");
        println!("Commands:");
        println!("  map       Ranked map of the repository's definitions");
        println!("  doctor    Check ctags and configuration");
        println!("  init      Create default configuration\n");
    }

    println!("Run 'code-ctags <command> --help' for details.");
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        "warn,code_ctags=debug,codectags_core=debug,codectags_repomap=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(explicit: Option<&Path>) -> Result<CtagsConfig> {
    let config = match explicit {
        Some(path) => CtagsConfig::from_file(path)?,
        None => {
            let default_path = Path::new(CONFIG_FILE);
            if default_path.exists() {
                CtagsConfig::from_file(default_path)?
            } else {
                CtagsConfig::default()
            }
        }
    };
    Ok(config)
}

struct MapArgs {
    fnames: Vec<PathBuf>,
    path: PathBuf,
    focus: Vec<PathBuf>,
    max_tokens: Option<usize>,
    full: bool,
    no_cache: bool,
}

async fn run_map(mut config: CtagsConfig, args: MapArgs) -> Result<()> {
    if args.full {
        config.map.full = true;
    }
    if args.no_cache {
        config.cache.enabled = false;
    }
    let max_tokens = args.max_tokens.unwrap_or(config.map.max_tokens);
    let max_size = (max_tokens > 0).then_some(max_tokens);

    let candidates = if args.fnames.is_empty() {
        codectags_repomap::walker::walk_repo(&args.path)?
    } else {
        args.fnames
    };

    tracing::debug!(
        root = %args.path.display(),
        candidates = candidates.len(),
        focus = args.focus.len(),
        ?max_size,
        "generating map"
    );

    let repo_map = RepoMap::from_config(&args.path, &config);
    if let Some(map) = repo_map
        .generate_map(&args.focus, &candidates, max_size)
        .await
        .wrap_err("generating repository map")?
    {
        print!("{map}");
    }
    Ok(())
}

struct CheckResult {
    name: &'static str,
    status: CheckStatus,
    detail: String,
    hint: Option<String>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum CheckStatus {
    Pass,
    Fail,
    Info,
}

impl CheckResult {
    fn pass(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            status: CheckStatus::Pass,
            detail: detail.into(),
            hint: None,
        }
    }

    fn fail(name: &'static str, detail: impl Into<String>, hint: impl Into<String>) -> Self {
        Self {
            name,
            status: CheckStatus::Fail,
            detail: detail.into(),
            hint: Some(hint.into()),
        }
    }

    fn info(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            status: CheckStatus::Info,
            detail: detail.into(),
            hint: None,
        }
    }

    fn symbol(&self, use_color: bool) -> &'static str {
        match (self.status, use_color) {
            (CheckStatus::Pass, false) => "\u{2713}",
            (CheckStatus::Fail, false) => "\u{2717}",
            (CheckStatus::Info, false) => "~",
            (CheckStatus::Pass, true) => "\x1b[32m\u{2713}\x1b[0m",
            (CheckStatus::Fail, true) => "\x1b[31m\u{2717}\x1b[0m",
            (CheckStatus::Info, true) => "\x1b[33m~\x1b[0m",
        }
    }
}

async fn run_doctor(config: &CtagsConfig, config_path: Option<&Path>, use_color: bool) {
    let mut checks: Vec<CheckResult> = Vec::new();

    // 1. ctags binary
    let tagger = CtagsTagger::new(&config.tagger.ctags_bin, &config.map.encoding);
    match tagger.check_install().await {
        Ok(version) => checks.push(CheckResult::pass("ctags", version)),
        Err(err) => checks.push(CheckResult::fail(
            "ctags",
            err.to_string(),
            "install Universal Ctags with JSON support (https://ctags.io) or set [tagger] ctags_bin",
        )),
    }

    // 2. Config file
    let config_path = config_path.unwrap_or(Path::new(CONFIG_FILE));
    if config_path.exists() {
        checks.push(CheckResult::pass(
            "config_file",
            format!("{} parsed", config_path.display()),
        ));
    } else {
        checks.push(CheckResult::info(
            "config_file",
            format!("{} not found, using defaults", config_path.display()),
        ));
    }

    // 3. Tag cache
    if config.cache.enabled {
        let cache_path = &config.cache.path;
        if cache_path.exists() {
            checks.push(CheckResult::pass(
                "tag_cache",
                format!("{} present", cache_path.display()),
            ));
        } else {
            checks.push(CheckResult::info(
                "tag_cache",
                format!("{} will be created on first map", cache_path.display()),
            ));
        }
    } else {
        checks.push(CheckResult::info("tag_cache", "disabled"));
    }

    let version = env!("CARGO_PKG_VERSION");
    println!("code-ctags v{version}: environment check\n");

    for check in &checks {
        let sym = check.symbol(use_color);
        let label = check.name.replace('_', " ");
        println!("  {sym} {label:<14} {}", check.detail);
        if let Some(hint) = &check.hint {
            println!("    hint: {hint}");
        }
    }

    let passed = checks.iter().filter(|c| c.status == CheckStatus::Pass).count();
    let failed = checks.iter().filter(|c| c.status == CheckStatus::Fail).count();
    let info = checks.iter().filter(|c| c.status == CheckStatus::Info).count();
    println!("\n{passed} checks passed, {failed} failed, {info} info");
}

const DEFAULT_CONFIG: &str = r#"# code-ctags configuration

[map]
# Size budget for the rendered map (0 = unlimited)
# max_tokens = 1024
# Keep references from a file to its own definitions
# full = false
# Source encoding passed to ctags and used when reading files
# ("utf-8", "ascii" and "latin-1" are decoded exactly)
# encoding = "utf-8"
# How the budget is measured: "tokens" (chars / 4) or "chars"
# size_metric = "tokens"
# Header printed before the map; {other} and {ctags_msg} are filled in
# prefix = "Here are summaries of some {other}files{ctags_msg}:\n"

[rank]
# damping = 0.85
# max_iterations = 100
# tolerance = 1e-6

[tagger]
# ctags_bin = "ctags"
# Per-file deadline for a ctags run
# timeout_secs = 10
# Files tagged in parallel (default: number of CPUs)
# concurrency = 8

[cache]
# enabled = true
# path = ".code-ctags/tags-cache.json"
"#;

#[tokio::main]
async fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))
    .into_diagnostic()?;
    human_panic::setup_panic!();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    let use_color = match cli.color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => std::io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    };

    match cli.command {
        None => {
            print_welcome(use_color);
        }
        Some(Command::Map {
            fnames,
            path,
            focus,
            max_tokens,
            full,
            no_cache,
        }) => {
            let config = load_config(cli.config.as_deref())?;
            run_map(
                config,
                MapArgs {
                    fnames,
                    path,
                    focus,
                    max_tokens,
                    full,
                    no_cache,
                },
            )
            .await?;
        }
        Some(Command::Init) => {
            let path = Path::new(CONFIG_FILE);
            if path.exists() {
                miette::bail!("{CONFIG_FILE} already exists");
            }
            std::fs::write(path, DEFAULT_CONFIG).into_diagnostic()?;
            println!("Created {CONFIG_FILE} with default configuration");
        }
        Some(Command::Doctor) => {
            let config = load_config(cli.config.as_deref())?;
            run_doctor(&config, cli.config.as_deref(), use_color).await;
        }
        Some(Command::Completions { shell }) => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "code-ctags", &mut std::io::stdout());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_parses() {
        let config = CtagsConfig::from_toml(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.map.max_tokens, 1024);
        assert!(config.cache.enabled);
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn map_flags_parse() {
        let cli = Cli::try_parse_from([
            "code-ctags",
            "map",
            "--fnames",
            "a.py",
            "b.py",
            "--focus",
            "a.py",
            "--max-tokens",
            "0",
            "--no-cache",
        ])
        .unwrap();
        let Some(Command::Map {
            fnames,
            focus,
            max_tokens,
            no_cache,
            full,
            ..
        }) = cli.command
        else {
            panic!("expected map");
        };
        assert_eq!(fnames, vec![PathBuf::from("a.py"), PathBuf::from("b.py")]);
        assert_eq!(focus, vec![PathBuf::from("a.py")]);
        assert_eq!(max_tokens, Some(0));
        assert!(no_cache);
        assert!(!full);
    }
}
