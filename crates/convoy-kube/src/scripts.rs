//! Bootstrap and teardown scripts
//!
//! Scripts are declared as `bootstrap.scripts` / `teardown.scripts` entries with
//! a `path`. Each one runs as `<path> <kube-context>` with the cluster context
//! and the YAML of the `global` mapping in its environment.

use serde_json::Value as JsonValue;
use std::path::PathBuf;
use std::process::Stdio;

use convoy_core::{Config, Workspace, keys};

use crate::error::{KubeError, Result};

/// Environment variable carrying the cluster context
pub const KUBE_CONTEXT_ENV: &str = "CONVOY_KUBE_CONTEXT";

/// Environment variable carrying the YAML of `global`
pub const CONFIG_CONTEXT_ENV: &str = "CONVOY_CONFIG_CONTEXT";

/// Which script section to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptPhase {
    Bootstrap,
    Teardown,
}

impl ScriptPhase {
    pub fn key(self) -> &'static str {
        match self {
            ScriptPhase::Bootstrap => keys::BOOTSTRAP,
            ScriptPhase::Teardown => keys::TEARDOWN,
        }
    }
}

/// One script invocation with everything it is handed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptRequest {
    pub path: PathBuf,
    pub kube_context: String,
    /// YAML rendering of the `global` mapping
    pub config_context: String,
}

/// Build the requests of a section, skipping entries without a path
pub fn script_requests(
    config: &Config,
    workspace: &Workspace,
    phase: ScriptPhase,
) -> Result<Vec<ScriptRequest>> {
    let section = format!("{}.scripts", phase.key());
    let Some(JsonValue::Array(entries)) = config.get(&section) else {
        tracing::debug!("`{}` section not found in config. Skipping.", section);
        return Ok(Vec::new());
    };

    let kube_context = config.get_str(keys::KUBE_CONTEXT).unwrap_or_default();
    let config_context = match config.get(keys::GLOBAL) {
        Some(global) => serde_yaml::to_string(global).map_err(convoy_core::CoreError::from)?,
        None => String::new(),
    };

    let mut requests = Vec::new();
    for entry in entries {
        match entry.get("path").and_then(JsonValue::as_str) {
            Some(path) if !path.is_empty() => requests.push(ScriptRequest {
                path: workspace.resolve(path),
                kube_context: kube_context.to_string(),
                config_context: config_context.clone(),
            }),
            _ => tracing::info!("{}: missing path in script {}", phase.key(), entry),
        }
    }
    Ok(requests)
}

/// Runs script requests one after another
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptRunner {
    dry_run: bool,
}

impl ScriptRunner {
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }

    pub async fn run_all(&self, requests: &[ScriptRequest]) -> Result<()> {
        for request in requests {
            self.run(request).await?;
        }
        Ok(())
    }

    pub async fn run(&self, request: &ScriptRequest) -> Result<()> {
        let path = request.path.display().to_string();
        tracing::info!("Running script: {} {}", path, request.kube_context);

        if self.dry_run {
            tracing::info!("- OK (dry) {}", path);
            return Ok(());
        }
        if !request.path.exists() {
            tracing::warn!("- Skipping {}: no such file", path);
            return Ok(());
        }

        let output = tokio::process::Command::new(&request.path)
            .arg(&request.kube_context)
            .env(KUBE_CONTEXT_ENV, &request.kube_context)
            .env(CONFIG_CONTEXT_ENV, &request.config_context)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| KubeError::Spawn {
                program: path.clone(),
                source: e,
            })?;

        if !output.status.success() {
            return Err(KubeError::ScriptFailed {
                path,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim_end().to_string(),
            });
        }

        tracing::info!("- OK {}", path);
        tracing::debug!("{}", String::from_utf8_lossy(&output.stdout).trim_end());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_requests_skip_entries_without_path() {
        let dir = TempDir::new().unwrap();
        let ws = Workspace::new(dir.path());
        let config = Config::from_yaml(
            "kube-context: minikube\nglobal:\n  region: eu\nbootstrap:\n  scripts:\n    - path: scripts/setup.sh\n    - name: no-path\n",
        )
        .unwrap();

        let requests = script_requests(&config, &ws, ScriptPhase::Bootstrap).unwrap();
        assert_eq!(
            requests,
            vec![ScriptRequest {
                path: dir.path().join("scripts/setup.sh"),
                kube_context: "minikube".into(),
                config_context: "region: eu\n".into(),
            }]
        );
        assert!(
            script_requests(&config, &ws, ScriptPhase::Teardown)
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_dry_run_and_missing_script_are_skipped() {
        let request = ScriptRequest {
            path: PathBuf::from("/nonexistent/convoy-script.sh"),
            kube_context: "c".into(),
            config_context: String::new(),
        };
        ScriptRunner::new(true).run(&request).await.unwrap();
        ScriptRunner::new(false).run(&request).await.unwrap();
    }

    #[cfg(unix)]
    fn write_script(dir: &TempDir, name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.path().join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_script_receives_context() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("seen");
        let script = write_script(
            &dir,
            "record.sh",
            &format!(
                "echo \"$1 $CONVOY_KUBE_CONTEXT $CONVOY_CONFIG_CONTEXT\" > {}",
                out.display()
            ),
        );

        let request = ScriptRequest {
            path: script,
            kube_context: "minikube".into(),
            config_context: "region: eu".into(),
        };
        ScriptRunner::new(false).run(&request).await.unwrap();

        assert_eq!(
            std::fs::read_to_string(out).unwrap(),
            "minikube minikube region: eu\n"
        );
        assert!(std::env::var(KUBE_CONTEXT_ENV).is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_script_is_fatal() {
        let dir = TempDir::new().unwrap();
        let script = write_script(&dir, "fail.sh", "echo nope >&2\nexit 4");

        let request = ScriptRequest {
            path: script,
            kube_context: "c".into(),
            config_context: String::new(),
        };
        let err = ScriptRunner::new(false).run_all(&[request]).await.unwrap_err();
        assert!(matches!(err, KubeError::ScriptFailed { stderr, .. } if stderr == "nope"));
    }
}
