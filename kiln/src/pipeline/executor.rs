//! Pipeline executor.
//!
//! Sequences the four phases in fixed order and guarantees the exit phase
//! runs on every path.

use super::def::PipelineDef;
use super::phase_runner::{PhaseOutcome, PhaseReport, PhaseRunner, PluginFailureRecord};
use crate::capabilities::Capabilities;
use crate::core::BuildPhase;
use crate::errors::BuildError;
use crate::events::{get_event_sink, EventSink};
use crate::plugin::{BuildstepPlugin, Plugin, PluginRegistry};
use crate::workflow::{BuildFailure, WorkflowState};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// The final outcome of one pipeline execution.
///
/// The executor never raises past its own boundary; the caller turns this
/// into a process exit code.
#[derive(Debug, Clone, Serialize)]
pub enum BuildOutcome {
    /// All required phases completed without abort.
    Success {
        /// Per-phase execution reports.
        reports: Vec<PhaseReport>,
    },
    /// A phase aborted; the failure names the offending plugin and phase.
    Failure {
        /// The phase that failed.
        phase: BuildPhase,
        /// The plugin that caused the failure.
        plugin: String,
        /// The original cause.
        reason: String,
        /// True when the build was canceled rather than genuinely failing.
        canceled: bool,
        /// Per-phase execution reports, including the exit phase.
        reports: Vec<PhaseReport>,
    },
}

impl BuildOutcome {
    /// Returns true on success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Returns the per-phase reports.
    #[must_use]
    pub fn reports(&self) -> &[PhaseReport] {
        match self {
            Self::Success { reports } | Self::Failure { reports, .. } => reports,
        }
    }
}

struct ResolvedPhase {
    plugins: Vec<Arc<dyn Plugin>>,
    skipped: Vec<String>,
}

/// Executes a resolved pipeline: pre-build, build-step, post-build, exit.
///
/// An abort in any of the first three phases skips the remaining build
/// phases; the exit phase always runs and receives the failure cause
/// through the workflow state.
pub struct PipelineExecutor {
    prebuild: ResolvedPhase,
    buildstep: Vec<Arc<dyn BuildstepPlugin>>,
    buildstep_skipped: Vec<String>,
    postbuild: ResolvedPhase,
    exit_phase: ResolvedPhase,
    sink: Arc<dyn EventSink>,
}

impl std::fmt::Debug for PipelineExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineExecutor").finish_non_exhaustive()
    }
}

impl PipelineExecutor {
    /// Resolves a pipeline definition against a plugin registry.
    ///
    /// Plugin lookup and argument validation happen here, once, before any
    /// phase starts. Optional unregistered plugins are skipped; required
    /// ones are configuration errors.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for duplicate keys, unknown required
    /// plugins, or invalid plugin arguments.
    pub fn from_def(registry: &PluginRegistry, def: &PipelineDef) -> Result<Self, BuildError> {
        def.validate()?;

        let prebuild = Self::resolve_phase(registry, def, BuildPhase::Prebuild)?;
        let postbuild = Self::resolve_phase(registry, def, BuildPhase::Postbuild)?;
        let exit_phase = Self::resolve_phase(registry, def, BuildPhase::Exit)?;

        let mut buildstep = Vec::new();
        let mut buildstep_skipped = Vec::new();
        for request in def.phase(BuildPhase::Buildstep) {
            if registry.contains_buildstep(&request.name) {
                buildstep.push(registry.build_buildstep(&request.name, &request.args)?);
            } else if request.required {
                return Err(BuildError::configuration(format!(
                    "unknown buildstep plugin '{}'",
                    request.name
                )));
            } else {
                buildstep_skipped.push(request.name.clone());
            }
        }

        Ok(Self {
            prebuild,
            buildstep,
            buildstep_skipped,
            postbuild,
            exit_phase,
            sink: get_event_sink(),
        })
    }

    /// Replaces the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    fn resolve_phase(
        registry: &PluginRegistry,
        def: &PipelineDef,
        phase: BuildPhase,
    ) -> Result<ResolvedPhase, BuildError> {
        let mut plugins = Vec::new();
        let mut skipped = Vec::new();

        for request in def.phase(phase) {
            if registry.contains(&request.name) {
                plugins.push(registry.build(&request.name, &request.args)?);
            } else if request.required {
                return Err(BuildError::configuration(format!(
                    "unknown plugin '{}' in {phase} phase",
                    request.name
                )));
            } else {
                skipped.push(request.name.clone());
            }
        }

        Ok(ResolvedPhase { plugins, skipped })
    }

    /// Executes the pipeline against a workflow state.
    ///
    /// Plugins run strictly sequentially, in declaration order, one phase
    /// at a time.
    pub async fn execute(&self, state: &WorkflowState, caps: &Capabilities) -> BuildOutcome {
        let started = Instant::now();
        let mut reports = Vec::new();
        let mut failure: Option<BuildFailure> = None;

        let report = self
            .phase_runner(BuildPhase::Prebuild, &self.prebuild)
            .run(state, caps)
            .await;
        Self::note_abort(&mut failure, &report);
        reports.push(report);

        if failure.is_none() {
            let report = self.run_buildstep(state, caps).await;
            Self::note_abort(&mut failure, &report);
            reports.push(report);
        }

        if failure.is_none() {
            let report = self
                .phase_runner(BuildPhase::Postbuild, &self.postbuild)
                .run(state, caps)
                .await;
            Self::note_abort(&mut failure, &report);
            reports.push(report);
        }

        if let Some(cause) = &failure {
            state.mark_failed(cause.clone());
            if cause.canceled {
                self.sink.try_emit(
                    "build.canceled",
                    Some(serde_json::json!({
                        "phase": cause.phase.to_string(),
                        "plugin": &cause.plugin,
                        "reason": &cause.reason,
                    })),
                );
            }
        }

        // The exit phase runs on every path, success or abort.
        let exit_report = self
            .phase_runner(BuildPhase::Exit, &self.exit_phase)
            .run(state, caps)
            .await;
        if failure.is_none() {
            Self::note_abort(&mut failure, &exit_report);
            if let Some(cause) = &failure {
                state.mark_failed(cause.clone());
            }
        } else if exit_report.outcome.is_aborted() {
            warn!("exit phase aborted after an earlier failure; keeping the original cause");
        }
        reports.push(exit_report);

        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
        self.sink.try_emit(
            "pipeline.completed",
            Some(serde_json::json!({
                "success": failure.is_none(),
                "duration_ms": duration_ms,
            })),
        );

        match failure {
            None => {
                info!(duration_ms, "pipeline completed successfully");
                BuildOutcome::Success { reports }
            }
            Some(cause) => {
                info!(
                    phase = %cause.phase,
                    plugin = %cause.plugin,
                    canceled = cause.canceled,
                    "pipeline failed"
                );
                BuildOutcome::Failure {
                    phase: cause.phase,
                    plugin: cause.plugin,
                    reason: cause.reason,
                    canceled: cause.canceled,
                    reports,
                }
            }
        }
    }

    fn phase_runner(&self, phase: BuildPhase, resolved: &ResolvedPhase) -> PhaseRunner {
        PhaseRunner::new(
            phase,
            resolved.plugins.clone(),
            resolved.skipped.clone(),
            self.sink.clone(),
        )
    }

    fn note_abort(failure: &mut Option<BuildFailure>, report: &PhaseReport) {
        if failure.is_some() {
            return;
        }
        if let PhaseOutcome::Aborted {
            plugin,
            reason,
            canceled,
        } = &report.outcome
        {
            *failure = Some(BuildFailure {
                phase: report.phase,
                plugin: plugin.clone(),
                reason: reason.clone(),
                canceled: *canceled,
            });
        }
    }

    /// Runs the build-step fallback chain: the first plugin producing a
    /// successful build wins and the remaining ones are skipped; if plugins
    /// were declared and none succeeds, the phase aborts.
    async fn run_buildstep(&self, state: &WorkflowState, caps: &Capabilities) -> PhaseReport {
        let mut report = PhaseReport {
            phase: BuildPhase::Buildstep,
            executed: Vec::new(),
            failures: Vec::new(),
            skipped: self.buildstep_skipped.clone(),
            outcome: PhaseOutcome::Completed,
        };
        let mut won = false;

        for plugin in &self.buildstep {
            let key = plugin.key().to_string();
            self.sink.try_emit(
                "plugin.started",
                Some(serde_json::json!({
                    "phase": "buildstep",
                    "plugin": &key,
                })),
            );

            match plugin.build(state, caps).await {
                Ok(result) if !result.is_failed() => {
                    report.executed.push(key.clone());
                    if let Err(err) = state.set_buildstep_result(&key, result) {
                        let err: BuildError = err.into();
                        self.fail_buildstep(state, &mut report, &key, &err);
                        return report;
                    }
                    self.sink.try_emit(
                        "plugin.completed",
                        Some(serde_json::json!({
                            "phase": "buildstep",
                            "plugin": &key,
                        })),
                    );
                    won = true;
                    break;
                }
                Ok(result) => {
                    // A structured build failure participates in the
                    // fallback chain like an error would.
                    let reason = result
                        .fail_reason
                        .unwrap_or_else(|| "build failed".to_string());
                    report.executed.push(key.clone());
                    self.tolerate_buildstep(state, &mut report, &key, &reason);
                }
                Err(err) if err.is_canceled() => {
                    report.executed.push(key.clone());
                    self.fail_buildstep(state, &mut report, &key, &err);
                    return report;
                }
                Err(err) => {
                    report.executed.push(key.clone());
                    self.tolerate_buildstep(state, &mut report, &key, &err.to_string());
                }
            }
        }

        if !won && !self.buildstep.is_empty() {
            let (plugin, reason) = report.failures.last().map_or_else(
                || ("buildstep".to_string(), "no build-step plugin ran".to_string()),
                |last| (last.plugin.clone(), last.reason.clone()),
            );
            report.outcome = PhaseOutcome::Aborted {
                plugin,
                reason: format!("no build-step plugin produced an image: {reason}"),
                canceled: false,
            };
            self.sink.try_emit(
                "phase.aborted",
                Some(serde_json::json!({
                    "phase": "buildstep",
                    "error": "no build-step plugin produced an image",
                })),
            );
        }

        report
    }

    fn tolerate_buildstep(
        &self,
        state: &WorkflowState,
        report: &mut PhaseReport,
        key: &str,
        reason: &str,
    ) {
        warn!(plugin = %key, error = %reason, "build-step plugin failed, trying next");
        state.record_plugin_error(key, reason);
        report.failures.push(PluginFailureRecord {
            plugin: key.to_string(),
            reason: reason.to_string(),
        });
        self.sink.try_emit(
            "plugin.failed",
            Some(serde_json::json!({
                "phase": "buildstep",
                "plugin": key,
                "error": reason,
                "fatal": false,
            })),
        );
    }

    fn fail_buildstep(
        &self,
        state: &WorkflowState,
        report: &mut PhaseReport,
        key: &str,
        err: &BuildError,
    ) {
        state.record_plugin_error(key, err.to_string());
        report.failures.push(PluginFailureRecord {
            plugin: key.to_string(),
            reason: err.to_string(),
        });
        report.outcome = PhaseOutcome::Aborted {
            plugin: key.to_string(),
            reason: err.to_string(),
            canceled: err.is_canceled(),
        };
        self.sink.try_emit(
            "phase.aborted",
            Some(serde_json::json!({
                "phase": "buildstep",
                "plugin": key,
                "error": err.to_string(),
            })),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::BuildResult;
    use crate::pipeline::PluginRequest;
    use crate::testing::{test_state, MockBuildstepPlugin, MockPlugin};

    fn registry_with(
        plugins: Vec<MockPlugin>,
        buildsteps: Vec<MockBuildstepPlugin>,
    ) -> PluginRegistry {
        let mut registry = PluginRegistry::new();
        for plugin in plugins {
            let plugin = Arc::new(plugin);
            registry
                .register(plugin.key().to_string(), move |_args| {
                    Ok(plugin.clone() as Arc<dyn Plugin>)
                })
                .unwrap();
        }
        for plugin in buildsteps {
            let plugin = Arc::new(plugin);
            registry
                .register_buildstep(plugin.key().to_string(), move |_args| {
                    Ok(plugin.clone() as Arc<dyn BuildstepPlugin>)
                })
                .unwrap();
        }
        registry
    }

    #[tokio::test]
    async fn test_exit_runs_on_success() {
        let registry = registry_with(
            vec![MockPlugin::new("prep"), MockPlugin::new("report")],
            vec![MockBuildstepPlugin::new("builder")],
        );
        let def = PipelineDef::new()
            .prebuild(PluginRequest::new("prep"))
            .buildstep(PluginRequest::new("builder"))
            .exit(PluginRequest::new("report"));

        let state = test_state();
        let executor = PipelineExecutor::from_def(&registry, &def).unwrap();
        let outcome = executor.execute(&state, &Capabilities::new()).await;

        assert!(outcome.is_success());
        assert!(state.phase_results(BuildPhase::Exit).contains_key("report"));
        assert!(state.build_result().is_some());
    }

    #[tokio::test]
    async fn test_exit_runs_on_prebuild_abort() {
        let registry = registry_with(
            vec![
                MockPlugin::new("prep").failing_with("koji down"),
                MockPlugin::new("report"),
            ],
            vec![MockBuildstepPlugin::new("builder")],
        );
        let def = PipelineDef::new()
            .prebuild(PluginRequest::new("prep"))
            .buildstep(PluginRequest::new("builder"))
            .exit(PluginRequest::new("report"));

        let state = test_state();
        let executor = PipelineExecutor::from_def(&registry, &def).unwrap();
        let outcome = executor.execute(&state, &Capabilities::new()).await;

        match &outcome {
            BuildOutcome::Failure { phase, plugin, .. } => {
                assert_eq!(*phase, BuildPhase::Prebuild);
                assert_eq!(plugin, "prep");
            }
            BuildOutcome::Success { .. } => panic!("pipeline should have failed"),
        }

        // Buildstep never ran, exit did, and it saw the failure cause
        assert!(state.build_result().is_none());
        assert!(state.phase_results(BuildPhase::Exit).contains_key("report"));
        assert_eq!(state.failure().unwrap().plugin, "prep");
    }

    #[tokio::test]
    async fn test_buildstep_fallback_chain() {
        let registry = registry_with(
            vec![],
            vec![
                MockBuildstepPlugin::new("flaky_builder").failing_with("backend down"),
                MockBuildstepPlugin::new("steady_builder")
                    .with_result(BuildResult::success("sha256:win")),
            ],
        );
        let def = PipelineDef::new()
            .buildstep(PluginRequest::new("flaky_builder"))
            .buildstep(PluginRequest::new("steady_builder"));

        let state = test_state();
        let executor = PipelineExecutor::from_def(&registry, &def).unwrap();
        let outcome = executor.execute(&state, &Capabilities::new()).await;

        assert!(outcome.is_success());
        let (key, result) = state.buildstep_result().unwrap();
        assert_eq!(key, "steady_builder");
        assert_eq!(result.image_id.as_deref(), Some("sha256:win"));
        assert!(state.plugin_errors().contains_key("flaky_builder"));
    }

    #[tokio::test]
    async fn test_buildstep_all_fail_aborts() {
        let registry = registry_with(
            vec![MockPlugin::new("report")],
            vec![MockBuildstepPlugin::new("only_builder").failing_with("backend down")],
        );
        let def = PipelineDef::new()
            .buildstep(PluginRequest::new("only_builder"))
            .exit(PluginRequest::new("report"));

        let state = test_state();
        let executor = PipelineExecutor::from_def(&registry, &def).unwrap();
        let outcome = executor.execute(&state, &Capabilities::new()).await;

        match &outcome {
            BuildOutcome::Failure { phase, .. } => assert_eq!(*phase, BuildPhase::Buildstep),
            BuildOutcome::Success { .. } => panic!("pipeline should have failed"),
        }
        assert!(state.phase_results(BuildPhase::Exit).contains_key("report"));
    }

    #[tokio::test]
    async fn test_unknown_required_plugin_rejected() {
        let registry = registry_with(vec![], vec![]);
        let def = PipelineDef::new().prebuild(PluginRequest::new("missing"));

        let err = PipelineExecutor::from_def(&registry, &def).unwrap_err();
        assert!(matches!(err, BuildError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_unknown_optional_plugin_skipped() {
        let registry = registry_with(vec![MockPlugin::new("prep")], vec![]);
        let def = PipelineDef::new()
            .prebuild(PluginRequest::new("prep"))
            .postbuild(PluginRequest::new("verify_media").optional());

        let state = test_state();
        let executor = PipelineExecutor::from_def(&registry, &def).unwrap();
        let outcome = executor.execute(&state, &Capabilities::new()).await;

        assert!(outcome.is_success());
        let postbuild = outcome
            .reports()
            .iter()
            .find(|r| r.phase == BuildPhase::Postbuild)
            .unwrap();
        assert_eq!(postbuild.skipped, vec!["verify_media"]);
    }
}
