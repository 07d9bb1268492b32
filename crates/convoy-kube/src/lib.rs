//! Convoy cluster-side execution
//!
//! Everything that spawns external tools lives here:
//!
//! - [`TargetResolver`]: declared charts (or a local `--chart` path) to concrete targets
//! - [`CommandBuilder`]: one [`PipelineSpec`] per target, `helm template ... | kubectl <action> ... -f -`
//! - [`Engine`]: confirmation, concurrent execution and in-order reporting with fail-fast
//! - [`ScriptRunner`]: bootstrap and teardown scripts
//!
//! # Example
//!
//! ```ignore
//! use convoy_kube::{Action, CommandBuilder, Engine, ToolConfig};
//!
//! let tools = ToolConfig::default();
//! let builder = CommandBuilder::new(&tools, &config, Action::Apply)?;
//! let specs: Vec<_> = targets.iter().map(|t| builder.build(t, &chains[&t.name])).collect();
//!
//! let report = Engine::new(Action::Apply, &mut prompter, &mut std::io::stdout())
//!     .auto_confirm(true)
//!     .run(&specs)
//!     .await?;
//! ```

pub mod command;
pub mod error;
pub mod inspect;
pub mod pipeline;
pub mod scripts;
pub mod targets;

pub use command::{Action, CommandBuilder, PASS_THROUGH, PipelineSpec, ToolConfig};
pub use error::{KubeError, Result, Stage};
pub use inspect::{ChartInspector, ChartMetadata, HelmInspector};
pub use pipeline::{Engine, Phase, Prompter, RunReport, confirmation_message, is_affirmative};
pub use scripts::{
    CONFIG_CONTEXT_ENV, KUBE_CONTEXT_ENV, ScriptPhase, ScriptRequest, ScriptRunner,
    script_requests,
};
pub use targets::{TargetResolution, TargetResolver};
