//! Command building
//!
//! Every target becomes a [`PipelineSpec`]: the templating invocation and the
//! action invocation, built once and executed unchanged. Flag order matters
//! because both tools let later flags override earlier ones.

use std::path::PathBuf;

use convoy_core::{
    Config, CoreError, ResolvedChart, ValueChain, ValueLayer, ValueSource, collapse_with_prefix,
    keys,
};

use crate::error::Result;

/// Stage 2 of a render-only run: copies stdin to stdout
pub const PASS_THROUGH: &str = "cat";

/// External tool locations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolConfig {
    pub helm: String,
    pub kubectl: String,
    /// Forwarded to the action tool
    pub kubeconfig: Option<PathBuf>,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            helm: "helm".to_string(),
            kubectl: "kubectl".to_string(),
            kubeconfig: None,
        }
    }
}

/// What the action stage does with the rendered manifests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Apply,
    Delete,
    /// Render only
    Template,
}

impl Action {
    pub fn name(self) -> &'static str {
        match self {
            Action::Apply => "apply",
            Action::Delete => "delete",
            Action::Template => "template",
        }
    }

    /// Flags appended after the common action flags
    pub fn extra_args(self) -> &'static [&'static str] {
        match self {
            Action::Delete => &["--ignore-not-found"],
            Action::Apply | Action::Template => &[],
        }
    }

    pub fn is_render_only(self) -> bool {
        self == Action::Template
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// The two argument vectors of one target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSpec {
    pub target: String,
    pub template: Vec<String>,
    pub action: Vec<String>,
    /// How the templating flags were chosen, printed in explain mode
    pub notes: Vec<String>,
}

impl PipelineSpec {
    /// `stage1 | stage2`
    pub fn explain(&self) -> String {
        format!("{} | {}", self.template.join(" "), self.action.join(" "))
    }
}

/// Builds pipeline specs for one run
#[derive(Debug, Clone)]
pub struct CommandBuilder<'a> {
    tools: &'a ToolConfig,
    config: &'a Config,
    action: Action,
    kube_context: &'a str,
    dry_run: bool,
}

impl<'a> CommandBuilder<'a> {
    pub fn new(tools: &'a ToolConfig, config: &'a Config, action: Action) -> Result<Self> {
        let kube_context = config
            .get_str(keys::KUBE_CONTEXT)
            .ok_or_else(|| CoreError::MissingKeys {
                keys: vec![keys::KUBE_CONTEXT.to_string()],
            })?;

        Ok(Self {
            tools,
            config,
            action,
            kube_context,
            dry_run: false,
        })
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn action(&self) -> Action {
        self.action
    }

    pub fn build(&self, chart: &ResolvedChart, chain: &ValueChain) -> PipelineSpec {
        PipelineSpec {
            target: chart.name.clone(),
            template: self.template_args(chart, chain),
            action: self.action_args(),
            notes: self.notes(chart, chain),
        }
    }

    /// Explanations in the order the templating flags are emitted
    pub fn notes(&self, chart: &ResolvedChart, chain: &ValueChain) -> Vec<String> {
        let mut notes = Vec::new();

        match self.config.get(keys::GLOBAL) {
            Some(global) => {
                for item in collapse_with_prefix(Some(keys::GLOBAL), global) {
                    notes.push(format!(
                        "Appending {} since it is set under 'global' in the config",
                        item
                    ));
                }
            }
            None => notes.push("No 'global' section in the config".to_string()),
        }

        if let Some(host) = self.config.ingress_host(&chart.name) {
            notes.push(format!(
                "Setting {} to {} since chart {} has an ingress host under 'global.ingress'",
                chart.spec.ingress_variable(),
                host,
                chart.name
            ));
        }

        for layer in [&chain.secrets, &chain.values, &chain.resource_profile] {
            notes.extend(layer.notes.iter().cloned());
        }
        notes
    }

    pub fn template_args(&self, chart: &ResolvedChart, chain: &ValueChain) -> Vec<String> {
        let mut args = vec![
            self.tools.helm.clone(),
            "template".to_string(),
            "--kube-context".to_string(),
            self.kube_context.to_string(),
        ];
        self.push_namespace(&mut args);

        if let Some(global) = self.config.get(keys::GLOBAL) {
            for item in collapse_with_prefix(Some(keys::GLOBAL), global) {
                args.push("--set".to_string());
                args.push(item);
            }
        }

        if let Some(host) = self.config.ingress_host(&chart.name) {
            args.push("--set".to_string());
            args.push(format!("{}={}", chart.spec.ingress_variable(), host));
        }

        push_layer(&mut args, &chain.secrets);
        push_layer(&mut args, &chain.values);
        push_layer(&mut args, &chain.resource_profile);

        if let Some(release) = self.config.get_str(keys::RELEASE) {
            args.push("--name".to_string());
            args.push(release.to_string());
        }

        args.push(chart.chartref.display().to_string());
        args
    }

    pub fn action_args(&self) -> Vec<String> {
        if self.action.is_render_only() {
            return vec![PASS_THROUGH.to_string()];
        }

        let mut args = vec![
            self.tools.kubectl.clone(),
            self.action.name().to_string(),
            "--context".to_string(),
            self.kube_context.to_string(),
        ];
        self.push_namespace(&mut args);
        if self.dry_run {
            args.push("--dry-run".to_string());
        }
        args.extend(self.action.extra_args().iter().map(|a| a.to_string()));
        if let Some(kubeconfig) = &self.tools.kubeconfig {
            args.push("--kubeconfig".to_string());
            args.push(kubeconfig.display().to_string());
        }
        args.push("-f".to_string());
        args.push("-".to_string());
        args
    }

    fn push_namespace(&self, args: &mut Vec<String>) {
        if let Some(namespace) = self.config.get_str(keys::NAMESPACE) {
            args.push("--namespace".to_string());
            args.push(namespace.to_string());
        }
    }
}

fn push_layer(args: &mut Vec<String>, layer: &ValueLayer) {
    for source in &layer.sources {
        match source {
            ValueSource::File(path) => {
                args.push("-f".to_string());
                args.push(path.display().to_string());
            }
            ValueSource::Set(pair) => {
                args.push("--set".to_string());
                args.push(pair.clone());
            }
        }
    }
}
