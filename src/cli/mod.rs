use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

use plugcheck::{PluginLayout, RuleSet, Validator};

mod rules;
mod validate;

/// Exit status for an unusable rule set.
const EXIT_CONFIG: i32 = 2;

#[derive(Parser)]
#[command(
    name = "plugcheck",
    version,
    about = "Static validator for host-application plugin packages"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory containing one subdirectory per plugin
    #[arg(
        long,
        global = true,
        env = "PLUGCHECK_PLUGINS_DIR",
        default_value = "server/plugins"
    )]
    plugins_dir: PathBuf,

    /// Registry file [default: <plugins-dir>/registry.json]
    #[arg(long, global = true)]
    registry: Option<PathBuf>,

    /// YAML rule set replacing the built-in rules
    #[arg(long, global = true)]
    rules: Option<PathBuf>,

    /// Number of plugins validated in parallel [default: available cores]
    #[arg(short, long, global = true)]
    jobs: Option<NonZeroUsize>,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t)]
    format: Format,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

/// Output format for validation results.
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum Format {
    /// Human-readable text output (default)
    #[default]
    Text,
    /// JSON report (or batch summary)
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate one plugin or every plugin under the plugins directory
    Validate {
        #[command(flatten)]
        target: Target,

        /// Add passing plugins to the registry
        #[arg(long)]
        register: bool,
    },
    /// Print the active rule set as YAML
    Rules,
}

/// Which plugins to validate.
#[derive(Args)]
#[group(required = true, multiple = false)]
struct Target {
    /// Plugin id, resolved under the plugins directory
    #[arg(long)]
    id: Option<String>,

    /// Explicit plugin directory
    #[arg(long)]
    path: Option<PathBuf>,

    /// Every plugin under the plugins directory
    #[arg(long)]
    all: bool,
}

pub fn run(cli: Cli) {
    let rules = match load_rules(cli.rules.as_deref()) {
        Ok(rules) => rules,
        Err(e) => {
            eprintln!("plugcheck: {e}");
            std::process::exit(EXIT_CONFIG);
        }
    };

    match cli.command {
        Commands::Validate { target, register } => {
            let registry = cli
                .registry
                .unwrap_or_else(|| cli.plugins_dir.join("registry.json"));
            let ctx = validate::Context {
                validator: Validator::new(rules, PluginLayout::default()),
                plugins_dir: cli.plugins_dir,
                registry: register.then_some(registry),
                jobs: cli.jobs.map_or_else(plugcheck::default_jobs, NonZeroUsize::get),
                format: cli.format,
            };
            validate::run(&ctx, target);
        }
        Commands::Rules => rules::run(&rules),
    }
}

fn load_rules(path: Option<&Path>) -> plugcheck::Result<RuleSet> {
    match path {
        Some(p) => RuleSet::load(p),
        None => Ok(RuleSet::default()),
    }
}
