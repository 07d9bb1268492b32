//! Convoy CLI - layered configuration and helm template | kubectl pipelines

use clap::error::{ContextKind, ContextValue, ErrorKind};
use clap::{Args, CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use convoy_core::{Overrides, USER_CONFIG_ENV, UserConfig};
use convoy_kube::{Action, ToolConfig};

mod commands;
mod display;
mod error;
mod exit_codes;
mod prompt;

use commands::inspect::View;
use error::{CliError, Result};

/// Environment variable holding the log filter
const LOG_ENV: &str = "CONVOY_LOG";

#[derive(Parser)]
#[command(name = "convoy")]
#[command(author = "Convoy Contributors")]
#[command(version)]
#[command(about = "Deploy many charts at once from layered configuration", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalArgs,
}

/// Flags accepted by every command
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Skip the confirmation prompt
    #[arg(short = 'y', long, global = true)]
    pub yes: bool,

    /// Enable debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Render everything but ask the cluster tool not to change anything
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Print the pipelines instead of running them
    #[arg(long, global = true)]
    pub explain: bool,

    /// Act on a single chart: a declared name, a chart directory or a .tgz
    #[arg(long, global = true, value_name = "NAME|PATH")]
    pub chart: Option<String>,

    /// Project config files, merged after convoy.yaml in order
    #[arg(short = 'f', long = "config-file", global = true)]
    pub config_files: Vec<PathBuf>,

    /// Cluster context for both tools
    #[arg(long, global = true)]
    pub kube_context: Option<String>,

    /// Selector for the values and secrets axes
    #[arg(long, global = true)]
    pub environment: Option<String>,

    /// Selector for the resource-profile axis
    #[arg(long, global = true)]
    pub profile: Option<String>,

    /// Namespace for both tools
    #[arg(long, global = true)]
    pub namespace: Option<String>,

    /// Release name passed to the templating tool
    #[arg(long, global = true)]
    pub release: Option<String>,

    /// Registry root charts are fetched from
    #[arg(long, global = true, alias = "helm-registry-url")]
    pub registry_url: Option<String>,

    /// Kubeconfig forwarded to the cluster tool
    #[arg(long, global = true)]
    pub kubeconfig: Option<PathBuf>,

    /// User context file (default: ~/.convoy/config)
    #[arg(long, global = true, env = USER_CONFIG_ENV)]
    pub user_config: Option<PathBuf>,

    /// Templating tool executable
    #[arg(long, global = true, env = "CONVOY_HELM", default_value = "helm")]
    pub helm_bin: String,

    /// Cluster tool executable
    #[arg(long, global = true, env = "CONVOY_KUBECTL", default_value = "kubectl")]
    pub kubectl_bin: String,
}

impl GlobalArgs {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            kube_context: self.kube_context.clone(),
            environment: self.environment.clone(),
            profile: self.profile.clone(),
            namespace: self.namespace.clone(),
            release: self.release.clone(),
            registry_url: self.registry_url.clone(),
        }
    }

    pub fn tool_config(&self) -> ToolConfig {
        ToolConfig {
            helm: self.helm_bin.clone(),
            kubectl: self.kubectl_bin.clone(),
            kubeconfig: self.kubeconfig.clone(),
        }
    }

    pub fn user_config_path(&self) -> Option<PathBuf> {
        self.user_config.clone().or_else(UserConfig::default_path)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run bootstrap scripts, then apply every chart
    Apply,

    /// Delete every chart's resources, then run teardown scripts
    Delete,

    /// Render every chart to stdout
    Template,

    /// Inspect the configuration and switch contexts
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Show what each chart ships and what the configuration sets for it
    Inspect {
        #[command(subcommand)]
        command: InspectCommand,
    },
}

#[derive(Subcommand)]
enum InspectCommand {
    /// Print inline values and the values files shipped with each chart
    Values {
        /// Reduce everything to the current environment and profile
        #[arg(long)]
        use_context: bool,
    },

    /// Print each chart's Chart.yaml
    Chart,

    /// Print each chart's templates
    Templates,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Print the merged configuration
    View,

    /// Print the current context
    CurrentContext,

    /// List the contexts of the user context file
    GetContexts,

    /// Make a context current
    UseContext {
        /// Context name
        name: String,
    },
}

fn main() {
    miette::set_panic_hook();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => std::process::exit(handle_parse_error(err)),
    };

    init_logging(cli.global.verbose);

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => std::process::exit(report(CliError::internal(e.to_string()))),
    };

    let result = runtime.block_on(async {
        tokio::select! {
            result = run(cli) => result,
            Ok(()) = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                Err(CliError::Interrupted)
            }
        }
    });

    // Kills whatever the interrupted run still had in flight
    runtime.shutdown_timeout(Duration::from_millis(500));

    let code = match result {
        Ok(()) => exit_codes::SUCCESS,
        Err(err) => report(err),
    };
    std::process::exit(code);
}

async fn run(cli: Cli) -> Result<()> {
    let global = &cli.global;
    match cli.command {
        Commands::Apply => commands::deploy::run(Action::Apply, global).await,
        Commands::Delete => commands::deploy::run(Action::Delete, global).await,
        Commands::Template => commands::deploy::run(Action::Template, global).await,
        Commands::Config { command } => match command {
            ConfigCommand::View => commands::config::view(global),
            ConfigCommand::CurrentContext => commands::config::current_context(global),
            ConfigCommand::GetContexts => commands::config::get_contexts(global),
            ConfigCommand::UseContext { name } => commands::config::use_context(global, &name),
        },
        Commands::Inspect { command } => {
            let view = match command {
                InspectCommand::Values { use_context } => View::Values { use_context },
                InspectCommand::Chart => View::Chart,
                InspectCommand::Templates => View::Templates,
            };
            commands::inspect::run(view, global).await
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .without_time()
                .with_target(false),
        )
        .init();
}

/// Print an error and return its exit code
fn report(err: CliError) -> i32 {
    let code = err.exit_code();
    eprintln!("{:?}", miette::Report::new(err));
    code
}

fn handle_parse_error(err: clap::Error) -> i32 {
    match err.kind() {
        ErrorKind::InvalidSubcommand => {
            let command = match err.get(ContextKind::InvalidSubcommand) {
                Some(ContextValue::String(command)) => command.clone(),
                _ => String::new(),
            };
            let candidates = command_candidates();
            let names: Vec<&str> = candidates.iter().map(String::as_str).collect();
            let suggestion = commands::closest_command(&command, &names);
            report(CliError::unknown_command(command, suggestion))
        }
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            let _ = err.print();
            exit_codes::SUCCESS
        }
        _ => {
            let _ = err.print();
            exit_codes::ERROR
        }
    }
}

/// Names valid at the position of the unknown command
fn command_candidates() -> Vec<String> {
    let cli = Cli::command();
    let parent = std::env::args()
        .skip(1)
        .find(|arg| arg == "config" || arg == "inspect");
    let scope = parent
        .and_then(|name| cli.find_subcommand(&name))
        .unwrap_or(&cli);
    scope
        .get_subcommands()
        .map(|c| c.get_name().to_string())
        .collect()
}
