use clap::{Parser, Subcommand};
use galley::cache::{ContentCache, FileCache};
use galley::config::{self, SiteConfig};
use galley::lifecycle::BuildEvent;
use galley::{BuildOptions, BuildReport, Lifecycle, Stage, logging, output, plugins};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::mpsc;

#[derive(Parser)]
#[command(name = "galley")]
#[command(about = "Plugin-driven static site generator")]
#[command(long_about = "\
Plugin-driven static site generator

Markdown documents with YAML or TOML frontmatter go in; a rendered site with
filtered, paginated feeds (HTML, RSS, Atom, JSON Feed, sitemap) comes out.

Project structure:

  my-site/
  ├── config.toml          # Site config (optional; see 'galley gen-config')
  ├── content/             # Markdown documents, any depth
  │   ├── index.md         # → /
  │   └── posts/
  │       └── 010-hello.md # → /posts/hello/ (NNN- prefix stripped)
  └── static/              # Copied verbatim into the output

Feeds are declared in config.toml:

  [[feeds]]
  name = \"blog\"
  filter = \"published == true and 'rust' in tags\"
  sort = \"date\"
  reverse = true
  formats = [\"html\", \"rss\", \"atom\"]

Exit status: 0 success, 1 errors were reported, 2 nothing matched the glob.")]
#[command(version = env!("GALLEY_BUILD_VERSION"))]
struct Cli {
    /// Project directory containing config.toml
    #[arg(long = "config", default_value = ".", global = true)]
    project: PathBuf,

    /// Content directory (overrides content_dir)
    #[arg(long, global = true)]
    source: Option<PathBuf>,

    /// Output directory (overrides output_dir)
    #[arg(long, global = true)]
    output: Option<PathBuf>,

    /// Disable a plugin by name (repeatable)
    #[arg(long = "disable", value_name = "PLUGIN", global = true)]
    disabled: Vec<String>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

/// Flags for commands that run the lifecycle past Validate.
#[derive(clap::Args, Clone)]
struct BuildArgs {
    /// Stop after this stage (configure, validate, glob, load, transform,
    /// render, collect, write, cleanup)
    #[arg(long)]
    until: Option<Stage>,

    /// Worker threads (overrides processing.concurrency)
    #[arg(long, short)]
    jobs: Option<usize>,

    /// Disable the render cache for this build
    #[arg(long)]
    no_cache: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Run the full lifecycle: configure → … → write → cleanup
    Build(BuildArgs),
    /// Validate configuration and list candidate files without building
    Check,
    /// List registered plugins by stage and priority
    Plugins,
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = logging::init(cli.verbose) {
        eprintln!("warning: logging unavailable: {err}");
    }

    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, Box<dyn std::error::Error>> {
    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(ExitCode::SUCCESS);
    }

    let config = load_site_config(&cli)?;
    let registry = plugins::default_registry();

    match &cli.command {
        Command::Build(args) => {
            let cache = open_cache(&config, args.no_cache);
            let options = BuildOptions {
                concurrency: args.jobs,
                disabled: cli.disabled.iter().cloned().collect(),
                cache,
                ..BuildOptions::default()
            };
            println!("==> Building {}", config.content_dir.display());
            let last = args.until.unwrap_or(Stage::Cleanup);
            let report = run_with_progress(config, registry, options, last)?;
            output::print_report(&report);
            Ok(ExitCode::from(report.exit_code()))
        }
        Command::Check => {
            let options = BuildOptions {
                disabled: cli.disabled.iter().cloned().collect(),
                ..BuildOptions::default()
            };
            println!("==> Checking {}", config.content_dir.display());
            let report = run_with_progress(config, registry, options, Stage::Glob)?;
            output::print_report(&report);
            if report.success() && !report.no_candidates() {
                println!("==> Content is valid");
            }
            Ok(ExitCode::from(report.exit_code()))
        }
        Command::Plugins => {
            let lifecycle = Lifecycle::new(config, registry).with_options(BuildOptions {
                disabled: cli.disabled.iter().cloned().collect(),
                ..BuildOptions::default()
            });
            output::print_plugin_table(&lifecycle.registry().plugins());
            Ok(ExitCode::SUCCESS)
        }
        Command::GenConfig => Ok(ExitCode::SUCCESS),
    }
}

/// Load `config.toml` from the project directory and apply CLI overrides.
fn load_site_config(cli: &Cli) -> Result<SiteConfig, config::ConfigError> {
    let mut config = config::load_config(&cli.project)?;
    if let Some(source) = &cli.source {
        config.content_dir = source.clone();
    }
    if let Some(output) = &cli.output {
        config.output_dir = output.clone();
    }
    Ok(config)
}

fn open_cache(config: &SiteConfig, no_cache: bool) -> Option<Arc<dyn ContentCache>> {
    if no_cache || !config.cache.enabled {
        return None;
    }
    Some(Arc::new(FileCache::open(&config.cache.dir)))
}

/// Run the lifecycle through `last`, printing stage timings from a
/// dedicated thread as events arrive.
fn run_with_progress(
    config: SiteConfig,
    registry: galley::Registry,
    mut options: BuildOptions,
    last: Stage,
) -> Result<BuildReport, galley::BuildError> {
    let (tx, rx) = mpsc::channel::<BuildEvent>();
    options.events = Some(tx);
    let printer = std::thread::spawn(move || {
        for event in rx {
            for line in output::format_build_event(&event) {
                println!("{}", line);
            }
        }
    });

    // The lifecycle owns the only sender; dropping it ends the printer loop.
    let result = {
        let lifecycle = Lifecycle::new(config, registry).with_options(options);
        lifecycle.run_to(last)
    };
    if printer.join().is_err() {
        tracing::warn!("progress printer panicked");
    }
    result
}
