//! Apply, delete and template
//!
//! A run gathers configuration in the working directory first. When that
//! configuration lists dependency directories, the action runs in each of them
//! in turn instead, and the first failure stops the list.

use std::path::PathBuf;

use convoy_core::{
    Config, CoreError, GatherOptions, Gathered, Selectors, ValueChainResolver, Workspace,
    config_files, gather, keys,
};
use convoy_kube::{
    Action, CommandBuilder, Engine, HelmInspector, ScriptPhase, ScriptRunner, TargetResolver,
    script_requests,
};
use convoy_repo::{HttpChartFetcher, RetryPolicy};

use crate::GlobalArgs;
use crate::display;
use crate::error::Result;
use crate::prompt::TermPrompter;

pub async fn run(action: Action, args: &GlobalArgs) -> Result<()> {
    tracing::info!("Gathering global configuration...");
    let gathered = gather_in(&Workspace::current(), args)?;

    let dependencies = dependency_dirs(&gathered.config);
    if dependencies.is_empty() {
        return run_in(&Workspace::current(), action, args, false).await;
    }

    tracing::debug!("Found dependencies: {:?}", dependencies);
    for dependency in dependencies {
        tracing::info!("Satisfying dependency: {}", dependency);
        run_in(&Workspace::new(dependency), action, args, true).await?;
    }
    Ok(())
}

/// Directories to run in, admin dependencies first when cluster-admin is set
pub fn dependency_dirs(config: &Config) -> Vec<String> {
    let mut dirs = Vec::new();
    let admin = config.get_strings(keys::ADMIN_DEPENDENCIES);
    if !admin.is_empty() {
        if config.get_bool(keys::CLUSTER_ADMIN) {
            tracing::debug!("Current context has cluster-admin: adding admin-dependencies");
            dirs.extend(admin);
        } else {
            tracing::debug!("Current context does not have cluster-admin: skipping admin-dependencies");
        }
    }
    dirs.extend(config.get_strings(keys::DEPENDENCIES));
    dirs
}

/// Host name substituted into ingress hosts
pub fn local_hostname() -> Option<String> {
    hostname::get().ok().and_then(|name| name.into_string().ok())
}

pub(crate) fn gather_in(workspace: &Workspace, args: &GlobalArgs) -> Result<Gathered> {
    let user_config = args.user_config_path();
    let files = config_files(&args.config_files);
    let overrides = args.overrides();
    let hostname = local_hostname();

    Ok(gather(&GatherOptions {
        workspace,
        user_config: user_config.as_deref(),
        config_files: &files,
        overrides: &overrides,
        hostname: hostname.as_deref(),
    })?)
}

/// Whether any project file of a run declares its own dependencies
fn declares_dependencies(loaded: &[PathBuf]) -> Result<bool> {
    for path in loaded {
        let project = Config::from_file(path)?;
        if !project.get_strings(keys::DEPENDENCIES).is_empty() {
            return Ok(true);
        }
    }
    Ok(false)
}

async fn run_in(
    workspace: &Workspace,
    action: Action,
    args: &GlobalArgs,
    as_dependency: bool,
) -> Result<()> {
    tracing::info!("Running from directory {}", workspace.root().display());
    tracing::info!("Gathering local configuration...");
    let gathered = gather_in(workspace, args)?;

    if as_dependency && declares_dependencies(&gathered.loaded)? {
        return Err(CoreError::RecursiveDependencies {
            dir: workspace.root().display().to_string(),
        }
        .into());
    }

    let config = gathered.config;
    config.validate()?;

    let runner = ScriptRunner::new(args.dry_run || args.explain);

    if action == Action::Apply {
        let scripts = script_requests(&config, workspace, ScriptPhase::Bootstrap)?;
        if !scripts.is_empty() {
            display::command_header("Bootstrapping", &config);
            runner.run_all(&scripts).await?;
        }
    }

    if config.charts().is_empty() {
        tracing::warn!(
            "`charts` section not found in config. Nothing to do. Run `convoy config view` to see the config that will be used."
        );
    } else {
        let title = match action {
            Action::Apply => "Deploying",
            Action::Delete => "Deleting",
            Action::Template => "Templating",
        };
        display::command_header(title, &config);
        deploy_charts(workspace, action, args, &config).await?;
    }

    if action == Action::Delete {
        let scripts = script_requests(&config, workspace, ScriptPhase::Teardown)?;
        if !scripts.is_empty() {
            display::command_header("Tearing down", &config);
            runner.run_all(&scripts).await?;
        }
    }

    Ok(())
}

async fn deploy_charts(
    workspace: &Workspace,
    action: Action,
    args: &GlobalArgs,
    config: &Config,
) -> Result<()> {
    let tools = args.tool_config();
    let selectors = Selectors::from_config(config)?;
    let registry = config.get_str(keys::REGISTRY_URL).unwrap_or_default();

    let fetcher = HttpChartFetcher::with_options(
        registry,
        workspace.charts_dir(),
        config.get_bool(keys::INSECURE_SKIP_TLS),
        RetryPolicy::default(),
    )?;
    let inspector = HelmInspector::new(&tools.helm);
    let resolution = TargetResolver::new(workspace, &inspector, &fetcher)
        .resolve(config, args.chart.as_deref())
        .await?;
    if !resolution.invalid.is_empty() {
        tracing::warn!("Skipped {} invalid chart entries", resolution.invalid.len());
    }

    let scratch = tempfile::Builder::new().prefix("convoy-").tempdir()?;
    let chains = ValueChainResolver::new(workspace, &selectors).with_scratch(scratch.path());
    let builder = CommandBuilder::new(&tools, config, action)?.with_dry_run(args.dry_run);

    let mut specs = Vec::with_capacity(resolution.targets.len());
    for target in &resolution.targets {
        let chain = chains.resolve(target)?;
        specs.push(builder.build(target, &chain));
    }

    let mut prompter = TermPrompter::new();
    let mut stdout = std::io::stdout();
    let report = Engine::new(action, &mut prompter, &mut stdout)
        .auto_confirm(args.yes)
        .explain(args.explain)
        .run(&specs)
        .await?;

    if !report.completed.is_empty() {
        display::success(&format!(
            "{} {} target(s)",
            match action {
                Action::Apply => "Applied",
                Action::Delete => "Deleted",
                Action::Template => "Rendered",
            },
            report.completed.len()
        ));
    }
    Ok(())
}
