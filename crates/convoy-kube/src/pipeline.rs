//! Pipelined execution engine
//!
//! A run moves through `collecting -> confirm -> executing -> reporting` and
//! ends in `done` or `aborted`. Every target gets a two-stage pipeline, the
//! templating process piped into the action process. All pipelines are spawned
//! before the first one is awaited; results are then reported in target order.
//!
//! The first failing pipeline ends the run. Pipelines still in flight at that
//! point are cancelled and their processes killed before the error is
//! returned. Dropping a run has the same effect on everything it spawned.
//!
//! Explain mode confirms like a real run, then prints each pipeline, preceded
//! by its `# ` notes, instead of spawning it.

use async_trait::async_trait;
use std::io::Write;
use std::process::{Output, Stdio};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

use crate::command::{Action, PipelineSpec};
use crate::error::{KubeError, Result, Stage};

/// Run lifecycle, for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Collecting,
    Confirm,
    Executing,
    Reporting,
    Done,
    Aborted,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Phase::Collecting => "collecting",
            Phase::Confirm => "confirm",
            Phase::Executing => "executing",
            Phase::Reporting => "reporting",
            Phase::Done => "done",
            Phase::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Interactive confirmation
#[async_trait]
pub trait Prompter: Send {
    /// Show `message` and return the answer line
    async fn ask(&mut self, message: &str) -> std::io::Result<String>;
}

/// Only `y` and `Y` confirm
pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim_end_matches(['\r', '\n']), "y" | "Y")
}

/// Confirmation text shown before anything is spawned
pub fn confirmation_message(action: Action, targets: &[&str]) -> String {
    format!(
        "# Executing action '{}' on targets: {}\nokay? y/N > ",
        action,
        targets.join(" ")
    )
}

/// Outcome of a completed run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Targets whose pipelines succeeded, in report order
    pub completed: Vec<String>,
    /// Pipelines printed instead of run
    pub explained: usize,
}

/// Runs pipeline specs for one action
pub struct Engine<'a> {
    action: Action,
    auto_confirm: bool,
    explain: bool,
    prompter: &'a mut dyn Prompter,
    out: &'a mut (dyn Write + Send),
    phase: Phase,
}

impl<'a> Engine<'a> {
    pub fn new(
        action: Action,
        prompter: &'a mut dyn Prompter,
        out: &'a mut (dyn Write + Send),
    ) -> Self {
        Self {
            action,
            auto_confirm: false,
            explain: false,
            prompter,
            out,
            phase: Phase::Collecting,
        }
    }

    /// Skip the confirmation prompt
    pub fn auto_confirm(mut self, yes: bool) -> Self {
        self.auto_confirm = yes;
        self
    }

    /// Print pipelines instead of running them
    pub fn explain(mut self, explain: bool) -> Self {
        self.explain = explain;
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    fn enter(&mut self, phase: Phase) {
        tracing::debug!("{} -> {}", self.phase, phase);
        self.phase = phase;
    }

    pub async fn run(&mut self, specs: &[PipelineSpec]) -> Result<RunReport> {
        if !self.auto_confirm {
            self.enter(Phase::Confirm);
            let targets: Vec<&str> = specs.iter().map(|s| s.target.as_str()).collect();
            let answer = self
                .prompter
                .ask(&confirmation_message(self.action, &targets))
                .await?;
            if !is_affirmative(&answer) {
                self.enter(Phase::Aborted);
                return Err(KubeError::Aborted);
            }
        }

        if self.explain {
            for spec in specs {
                for note in &spec.notes {
                    writeln!(self.out, "# {}", note)?;
                }
                writeln!(self.out, "{}", spec.explain())?;
            }
            self.enter(Phase::Done);
            return Ok(RunReport {
                completed: Vec::new(),
                explained: specs.len(),
            });
        }

        self.enter(Phase::Executing);
        let mut running = Vec::with_capacity(specs.len());
        for spec in specs {
            tracing::debug!("Running template command: {}", spec.template.join(" "));
            tracing::debug!("Running action command: {}", spec.action.join(" "));
            running.push(RunningPipeline::spawn(spec).inspect_err(|_| {
                self.phase = Phase::Aborted;
            })?);
        }

        self.enter(Phase::Reporting);
        tracing::info!("Waiting for processes...");

        let mut completed = Vec::new();
        let mut pending = running.into_iter();
        while let Some(pipeline) = pending.next() {
            match pipeline.wait().await {
                Ok(finished) => {
                    tracing::info!("** {}: {} OK", finished.target, finished.action_program);
                    if !finished.action_stdout.is_empty() && !self.action.is_render_only() {
                        tracing::debug!(
                            "{}",
                            String::from_utf8_lossy(&finished.action_stdout).trim_end()
                        );
                    }
                    tracing::info!("** {}: {} OK", finished.target, finished.template_program);
                    if self.action.is_render_only() {
                        self.out.write_all(&finished.action_stdout)?;
                        self.out.flush()?;
                    }
                    completed.push(finished.target);
                }
                Err(failure) => {
                    tracing::error!(
                        "** {}: {} FAILED: {}",
                        failure.target,
                        failure.program,
                        failure.stderr.trim_end()
                    );
                    cancel(pending).await;
                    self.enter(Phase::Aborted);
                    return Err(KubeError::PipelineFailed {
                        target: failure.target,
                        stage: failure.stage,
                        status: failure.status,
                        stderr: failure.stderr,
                        completed,
                    });
                }
            }
        }

        self.enter(Phase::Done);
        Ok(RunReport {
            completed,
            explained: 0,
        })
    }
}

/// Abort every remaining pipeline and wait until its tasks are gone
async fn cancel(pending: impl Iterator<Item = RunningPipeline>) {
    for mut pipeline in pending {
        tracing::debug!("Cancelling pipeline for {}", pipeline.target);
        pipeline.template.abort();
        pipeline.action.abort();
        let _ = (&mut pipeline.action).await;
        let _ = (&mut pipeline.template).await;
    }
}

struct Finished {
    target: String,
    template_program: String,
    action_program: String,
    action_stdout: Vec<u8>,
}

struct Failure {
    target: String,
    stage: Stage,
    program: String,
    status: String,
    stderr: String,
}

/// Both stages of one target, each awaited by its own task
struct RunningPipeline {
    target: String,
    template_program: String,
    action_program: String,
    template: JoinHandle<std::io::Result<Output>>,
    action: JoinHandle<std::io::Result<Output>>,
}

impl RunningPipeline {
    fn spawn(spec: &PipelineSpec) -> Result<Self> {
        let mut template = spawn_stage(&spec.template, Stdio::null())?;
        let rendered = template.stdout.take().ok_or_else(|| {
            std::io::Error::other(format!("no stdout captured for {}", spec.template[0]))
        })?;
        let stdin: Stdio = rendered.try_into()?;
        let action = spawn_stage(&spec.action, stdin)?;

        Ok(Self {
            target: spec.target.clone(),
            template_program: spec.template[0].clone(),
            action_program: spec.action[0].clone(),
            template: tokio::spawn(template.wait_with_output()),
            action: tokio::spawn(action.wait_with_output()),
        })
    }

    /// Action stage first, then the templating stage
    async fn wait(mut self) -> std::result::Result<Finished, Failure> {
        let action = join_stage(&mut self.action).await;
        let action = self.check(Stage::Action, action)?;

        let template = join_stage(&mut self.template).await;
        self.check(Stage::Template, template)?;

        Ok(Finished {
            target: self.target.clone(),
            template_program: self.template_program.clone(),
            action_program: self.action_program.clone(),
            action_stdout: action.stdout,
        })
    }

    fn check(
        &self,
        stage: Stage,
        result: std::io::Result<Output>,
    ) -> std::result::Result<Output, Failure> {
        let program = match stage {
            Stage::Template => &self.template_program,
            Stage::Action => &self.action_program,
        };
        let fail = |status: String, stderr: String| Failure {
            target: self.target.clone(),
            stage,
            program: program.clone(),
            status,
            stderr,
        };

        match result {
            Ok(output) if output.status.success() => Ok(output),
            Ok(output) => Err(fail(
                output.status.to_string(),
                String::from_utf8_lossy(&output.stderr).into_owned(),
            )),
            Err(e) => Err(fail("not awaited".to_string(), e.to_string())),
        }
    }
}

impl Drop for RunningPipeline {
    fn drop(&mut self) {
        self.template.abort();
        self.action.abort();
    }
}

fn spawn_stage(argv: &[String], stdin: Stdio) -> Result<Child> {
    let (program, args) = argv.split_first().ok_or_else(|| KubeError::Spawn {
        program: String::new(),
        source: std::io::Error::other("empty command"),
    })?;

    Command::new(program)
        .args(args)
        .stdin(stdin)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| KubeError::Spawn {
            program: program.clone(),
            source: e,
        })
}

async fn join_stage(handle: &mut JoinHandle<std::io::Result<Output>>) -> std::io::Result<Output> {
    match handle.await {
        Ok(result) => result,
        Err(e) => Err(std::io::Error::other(e)),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    struct ScriptedPrompter {
        answer: String,
        asked: Vec<String>,
    }

    impl ScriptedPrompter {
        fn answering(answer: &str) -> Self {
            Self {
                answer: answer.to_string(),
                asked: Vec::new(),
            }
        }
    }

    #[async_trait]
    impl Prompter for ScriptedPrompter {
        async fn ask(&mut self, message: &str) -> std::io::Result<String> {
            self.asked.push(message.to_string());
            Ok(self.answer.clone())
        }
    }

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".into(), "-c".into(), script.into()]
    }

    fn spec(target: &str, template: Vec<String>, action: Vec<String>) -> PipelineSpec {
        PipelineSpec {
            target: target.to_string(),
            template,
            action,
            notes: Vec::new(),
        }
    }

    #[test]
    fn test_affirmative_answers() {
        assert!(is_affirmative("y"));
        assert!(is_affirmative("Y\n"));
        assert!(!is_affirmative("yes"));
        assert!(!is_affirmative(""));
        assert!(!is_affirmative("n"));
    }

    #[tokio::test]
    async fn test_render_only_writes_rendered_output() {
        let mut prompter = ScriptedPrompter::answering("n");
        let mut out = Vec::new();
        let specs = vec![
            spec("web", sh("echo 'kind: Service'"), vec!["cat".into()]),
            spec("api", sh("echo 'kind: Deployment'"), vec!["cat".into()]),
        ];

        let report = Engine::new(Action::Template, &mut prompter, &mut out)
            .auto_confirm(true)
            .run(&specs)
            .await
            .unwrap();

        assert_eq!(report.completed, vec!["web", "api"]);
        assert_eq!(String::from_utf8(out).unwrap(), "kind: Service\nkind: Deployment\n");
        assert!(prompter.asked.is_empty());
    }

    #[tokio::test]
    async fn test_second_action_failure_reports_first_success() {
        let mut prompter = ScriptedPrompter::answering("y");
        let mut out = Vec::new();
        let specs = vec![
            spec("one", sh("echo a"), sh("cat > /dev/null")),
            spec("two", sh("echo b"), sh("cat > /dev/null; echo boom >&2; exit 3")),
        ];

        let mut engine = Engine::new(Action::Apply, &mut prompter, &mut out);
        let err = engine.run(&specs).await.unwrap_err();
        assert_eq!(engine.phase(), Phase::Aborted);

        match err {
            KubeError::PipelineFailed {
                target,
                stage,
                stderr,
                completed,
                ..
            } => {
                assert_eq!(target, "two");
                assert_eq!(stage, Stage::Action);
                assert_eq!(stderr.trim(), "boom");
                assert_eq!(completed, vec!["one"]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(prompter.asked.len(), 1);
        assert!(prompter.asked[0].contains("'apply' on targets: one two"));
    }

    #[tokio::test]
    async fn test_template_failure_is_fatal() {
        let mut prompter = ScriptedPrompter::answering("y");
        let mut out = Vec::new();
        let specs = vec![spec("web", sh("echo bad chart >&2; exit 2"), vec!["cat".into()])];

        let err = Engine::new(Action::Template, &mut prompter, &mut out)
            .auto_confirm(true)
            .run(&specs)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            KubeError::PipelineFailed { stage: Stage::Template, ref completed, .. } if completed.is_empty()
        ));
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_declined_confirmation_spawns_nothing() {
        let dir = TempDir::new().unwrap();
        let marker = dir.path().join("spawned");
        let mut prompter = ScriptedPrompter::answering("no");
        let mut out = Vec::new();
        let specs = vec![spec(
            "web",
            sh(&format!("touch {}", marker.display())),
            vec!["cat".into()],
        )];

        let err = Engine::new(Action::Apply, &mut prompter, &mut out)
            .run(&specs)
            .await
            .unwrap_err();

        assert!(matches!(err, KubeError::Aborted));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!marker.exists());
    }

    fn explained_spec() -> PipelineSpec {
        let mut spec = spec(
            "web",
            vec!["helm".into(), "template".into(), "charts/web".into()],
            vec!["kubectl".into(), "apply".into(), "-f".into(), "-".into()],
        );
        spec.notes = vec![
            "No shared values.yaml found".into(),
            "Appending base values file values/web.yaml".into(),
        ];
        spec
    }

    #[tokio::test]
    async fn test_explain_prints_notes_and_pipeline() {
        let mut prompter = ScriptedPrompter::answering("y");
        let mut out = Vec::new();

        let report = Engine::new(Action::Apply, &mut prompter, &mut out)
            .explain(true)
            .run(&[explained_spec()])
            .await
            .unwrap();

        assert_eq!(report.explained, 1);
        assert!(report.completed.is_empty());
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "# No shared values.yaml found\n\
             # Appending base values file values/web.yaml\n\
             helm template charts/web | kubectl apply -f -\n"
        );
        assert_eq!(prompter.asked.len(), 1);
    }

    #[tokio::test]
    async fn test_explain_still_asks_for_confirmation() {
        let mut prompter = ScriptedPrompter::answering("n");
        let mut out = Vec::new();

        let mut engine = Engine::new(Action::Apply, &mut prompter, &mut out).explain(true);
        let err = engine.run(&[explained_spec()]).await.unwrap_err();

        assert!(matches!(err, KubeError::Aborted));
        assert_eq!(engine.phase(), Phase::Aborted);
        drop(engine);
        assert_eq!(prompter.asked.len(), 1);
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_failure_cancels_in_flight_pipelines() {
        let mut prompter = ScriptedPrompter::answering("y");
        let mut out = Vec::new();
        let specs = vec![
            spec("fails", sh("echo x"), sh("cat > /dev/null; exit 1")),
            spec("slow", sh("sleep 30"), vec!["cat".into()]),
        ];

        let started = Instant::now();
        let err = Engine::new(Action::Apply, &mut prompter, &mut out)
            .auto_confirm(true)
            .run(&specs)
            .await
            .unwrap_err();

        assert!(matches!(err, KubeError::PipelineFailed { ref target, .. } if target == "fails"));
        assert!(started.elapsed() < Duration::from_secs(20));
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let mut prompter = ScriptedPrompter::answering("y");
        let mut out = Vec::new();
        let specs = vec![spec(
            "web",
            vec!["convoy-no-such-helm-binary".into()],
            vec!["cat".into()],
        )];

        let err = Engine::new(Action::Apply, &mut prompter, &mut out)
            .auto_confirm(true)
            .run(&specs)
            .await
            .unwrap_err();
        assert!(matches!(err, KubeError::Spawn { program, .. } if program == "convoy-no-such-helm-binary"));
    }
}
