//! Config commands - view the merged configuration and manage contexts

use std::path::PathBuf;

use convoy_core::{GatherOptions, UserConfig, Workspace, config_files, gather};

use crate::GlobalArgs;
use crate::commands::deploy::local_hostname;
use crate::display;
use crate::error::{CliError, Result};

/// Print the gathered configuration as YAML
pub fn view(args: &GlobalArgs) -> Result<()> {
    let workspace = Workspace::current();
    let user_config = args.user_config_path();
    let files = config_files(&args.config_files);
    let overrides = args.overrides();
    let hostname = local_hostname();

    let gathered = gather(&GatherOptions {
        workspace: &workspace,
        user_config: user_config.as_deref(),
        config_files: &files,
        overrides: &overrides,
        hostname: hostname.as_deref(),
    })?;

    print!("{}", gathered.config.to_yaml()?);
    Ok(())
}

pub fn current_context(args: &GlobalArgs) -> Result<()> {
    let (path, user) = load_user_config(args)?;
    match user.current_context {
        Some(name) => {
            println!("{}", name);
            Ok(())
        }
        None => Err(CliError::config(format!(
            "No current-context key found in {}",
            path.display()
        ))),
    }
}

pub fn get_contexts(args: &GlobalArgs) -> Result<()> {
    let (_, user) = load_user_config(args)?;
    let names = user.context_names();
    if !names.is_empty() {
        println!("{}", display::context_list(&names, user.current_context.as_deref()));
    }
    Ok(())
}

pub fn use_context(args: &GlobalArgs, name: &str) -> Result<()> {
    let (path, mut user) = load_user_config(args)?;
    user.use_context(name)?;
    user.save(&path)?;
    println!("Switched to context \"{}\".", name);
    Ok(())
}

fn load_user_config(args: &GlobalArgs) -> Result<(PathBuf, UserConfig)> {
    let path = args.user_config_path().ok_or_else(|| {
        CliError::config_with_help(
            "No user context file location known",
            "Pass --user-config or set CONVOYCONFIG",
        )
    })?;

    match UserConfig::load(&path)? {
        Some(user) => Ok((path, user)),
        None => Err(CliError::config(format!(
            "No user context file found at {}",
            path.display()
        ))),
    }
}
