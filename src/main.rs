// Use jemalloc for better memory allocation performance on Unix-like systems
#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

// Use mimalloc on Windows for better performance
#[cfg(target_env = "msvc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use colored::*;
use std::fs;
use std::path::{Path, PathBuf};

use pagespeed_lib::config::{self as pagespeed_config, Config, OutputFormat, RuleRegistry};
use pagespeed_lib::engine::AlwaysAcceptResultFilter;
use pagespeed_lib::exit_codes::{self, exit};
use pagespeed_lib::formatter::ResultsFormatter;
use pagespeed_lib::l10n::{self, CatalogLocalizer};
use pagespeed_lib::output::{self, OutputFormatter, Report};
use pagespeed_lib::rules;
use pagespeed_lib::snapshot::PageSnapshot;

const DEFAULT_OPTIMIZED_CONTENT_DIR: &str = "optimized";

#[derive(Parser)]
#[command(author, version, about, long_about = None, arg_required_else_help = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Control colored output: auto, always, never
    #[arg(long, global = true, default_value = "auto", value_parser = ["auto", "always", "never"], help = "Control colored output: auto, always, never")]
    color: String,

    /// Path to configuration file
    #[arg(long, global = true, help = "Path to configuration file")]
    config: Option<String>,

    /// Ignore all configuration files and use built-in defaults
    #[arg(
        long,
        global = true,
        help = "Ignore all configuration files and use built-in defaults"
    )]
    no_config: bool,
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    /// Page-load snapshot (JSON) to analyze
    snapshot: PathBuf,

    /// Only run these rules (comma-separated)
    #[arg(long, value_delimiter = ',')]
    enable: Vec<String>,

    /// Do not run these rules (comma-separated, "all" for every rule)
    #[arg(long, value_delimiter = ',')]
    disable: Vec<String>,

    /// Output format: text or json
    #[arg(long, short = 'o', value_parser = ["text", "json"])]
    output: Option<String>,

    /// Locale of the report ("raw" for unformatted values)
    #[arg(long)]
    locale: Option<String>,

    /// Write optimized resources (minified CSS and HTML) into this directory
    #[arg(long, value_name = "DIR")]
    save_optimized_content: Option<PathBuf>,

    /// Run rules one after another
    #[arg(long)]
    no_parallel: bool,

    /// Only show rules that have suggestions
    #[arg(long)]
    only_with_results: bool,

    /// Show debug logging
    #[arg(long, short)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a captured page load and print suggestions
    Analyze(AnalyzeArgs),
    /// List all rules
    Rules,
    /// Initialize a new configuration file
    Init {
        /// Where to write the configuration
        #[arg(default_value = "pagespeed.toml")]
        path: String,
    },
    /// Print the JSON schema of the configuration file
    Schema,
}

fn load_config(cli_config: Option<&str>, no_config: bool) -> Config {
    if no_config {
        return Config::default();
    }
    Config::load(cli_config).unwrap_or_else(|e| {
        eprintln!("{}: {}", "Error".red().bold(), e);
        exit::tool_error();
    })
}

fn print_config_warnings(config: &Config) {
    let registry = RuleRegistry::from_rules(&rules::all_rules(config));
    for warning in pagespeed_config::validate_config(config, &registry) {
        eprintln!("{} {}", "[config warning]".yellow().bold(), warning.message);
    }
}

fn init_logging(verbose: bool) {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    // A logger may already be installed when embedded in tests.
    let _ = builder.try_init();
}

/// Fold the command line into the loaded config. Command-line options win.
fn apply_cli_overrides(config: &mut Config, args: &AnalyzeArgs) {
    if !args.enable.is_empty() {
        config.global.enable = args.enable.clone();
    }
    config.global.disable.extend(args.disable.iter().cloned());
    if let Some(output) = &args.output {
        config.global.output_format = output.parse().ok();
    }
    if args.locale.is_some() {
        config.global.locale = args.locale.clone();
    }
    if args.no_parallel {
        config.global.parallel = false;
    }
    if let Some(dir) = &args.save_optimized_content {
        config.global.save_optimized_content = true;
        config.global.optimized_content_dir = Some(dir.display().to_string());
    }
}

fn load_catalog(config: &Config) -> anyhow::Result<Option<CatalogLocalizer>> {
    let Some(path) = &config.global.catalog else {
        return Ok(None);
    };
    let locale = config.global.locale.as_deref().unwrap_or("und");
    let text = fs::read_to_string(path).with_context(|| format!("Failed to read message catalog {path}"))?;
    let catalog =
        CatalogLocalizer::from_toml_str(locale, &text).with_context(|| format!("Invalid message catalog {path}"))?;
    log::debug!("Loaded {} messages for {locale} from {path}", catalog.len());
    Ok(Some(catalog))
}

fn run_analyze(config: &Config, args: &AnalyzeArgs) -> anyhow::Result<i32> {
    let engine = pagespeed_lib::engine_from_config(config).context("Failed to set up rules")?;

    let snapshot = PageSnapshot::load(&args.snapshot)?;
    let input = snapshot
        .into_input(&config.client)
        .with_context(|| format!("Failed to build input from {}", args.snapshot.display()))?;

    let results = engine.compute_results(&input)?;

    let localizer = l10n::localizer_for(config.global.locale.as_deref(), load_catalog(config)?);
    let formatted = engine.format_results(
        &results,
        &AlwaysAcceptResultFilter,
        ResultsFormatter::new(localizer.as_ref()),
    )?;

    let report = Report {
        formatted: &formatted,
        results: &results,
    };
    let formatter: Box<dyn OutputFormatter> = match config.global.output_format.unwrap_or_default() {
        OutputFormat::Text => Box::new(output::TextFormatter {
            only_with_results: args.only_with_results,
        }),
        format => output::formatter_for(format),
    };
    let rendered = formatter.format_report(&report);
    print!("{rendered}");
    if !rendered.ends_with('\n') {
        println!();
    }

    if config.global.save_optimized_content {
        let dir = config
            .global
            .optimized_content_dir
            .as_deref()
            .unwrap_or(DEFAULT_OPTIMIZED_CONTENT_DIR);
        let written = output::write_optimized_content(&results, Path::new(dir))
            .with_context(|| format!("Failed to write optimized content to {dir}"))?;
        if written > 0 {
            eprintln!("Wrote {written} optimized file(s) to {dir}");
        }
    }

    Ok(exit_codes::for_results(&results))
}

fn list_rules(config: &Config) {
    println!("Available rules:");
    for rule in rules::all_rules(config) {
        let mut line = format!("  {:<36} {}", rule.name(), rule.header().text());
        if rule.is_experimental() {
            line.push_str(&" (experimental)".dimmed().to_string());
        }
        println!("{line}");
        println!("  {:<36} {}", "", format!("needs: {}", rule.capability_requirements()).dimmed());
    }
}

fn print_schema() {
    let schema = pagespeed_config::config_json_schema().unwrap_or_else(|e| {
        eprintln!("{}: Failed to generate schema: {}", "Error".red().bold(), e);
        exit::tool_error();
    });
    let schema_json = serde_json::to_string_pretty(&schema).unwrap_or_else(|e| {
        eprintln!("{}: Failed to serialize schema: {}", "Error".red().bold(), e);
        exit::tool_error();
    });
    println!("{schema_json}");
}

fn main() {
    // Reset SIGPIPE to default behavior on Unix so piping to `head` etc. works correctly.
    #[cfg(unix)]
    {
        // SAFETY: restoring the default SIGPIPE disposition before any output is written.
        unsafe {
            libc::signal(libc::SIGPIPE, libc::SIG_DFL);
        }
    }

    let cli = Cli::parse();

    match cli.color.as_str() {
        "always" => colored::control::set_override(true),
        "never" => colored::control::set_override(false),
        _ => colored::control::unset_override(),
    }

    match cli.command {
        Commands::Analyze(args) => {
            init_logging(args.verbose);
            let mut config = load_config(cli.config.as_deref(), cli.no_config);
            print_config_warnings(&config);
            apply_cli_overrides(&mut config, &args);

            match run_analyze(&config, &args) {
                Ok(code) => std::process::exit(code),
                Err(e) => {
                    eprintln!("{}: {:#}", "Error".red().bold(), e);
                    exit::tool_error();
                }
            }
        }
        Commands::Rules => {
            init_logging(false);
            let config = load_config(cli.config.as_deref(), cli.no_config);
            list_rules(&config);
        }
        Commands::Init { path } => match pagespeed_config::create_default_config(&path) {
            Ok(()) => println!("Created default configuration file: {path}"),
            Err(e) => {
                eprintln!("{}: Failed to create config file: {}", "Error".red().bold(), e);
                exit::tool_error();
            }
        },
        Commands::Schema => print_schema(),
    }
    exit::success();
}
