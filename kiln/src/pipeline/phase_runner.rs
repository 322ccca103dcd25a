//! Per-phase plugin execution.

use crate::capabilities::Capabilities;
use crate::core::BuildPhase;
use crate::errors::BuildError;
use crate::events::EventSink;
use crate::plugin::Plugin;
use crate::workflow::WorkflowState;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, warn};

/// The classified result of a single plugin execution.
///
/// The runner decides continuation purely from this tag; it never inspects
/// plugin-internal errors beyond the fail-fast vs fail-soft classification.
#[derive(Debug)]
pub enum PluginExecution {
    /// The plugin succeeded with a result value.
    Ok(serde_json::Value),
    /// The plugin failed but is allowed to fail; the phase continues.
    Recoverable(BuildError),
    /// The plugin failed fatally; the phase aborts.
    Fatal(BuildError),
}

impl PluginExecution {
    /// Classifies a plugin result using its allowed-to-fail attribute.
    #[must_use]
    pub fn classify(
        allowed_to_fail: bool,
        result: Result<serde_json::Value, BuildError>,
    ) -> Self {
        match result {
            Ok(value) => Self::Ok(value),
            Err(err) if allowed_to_fail => Self::Recoverable(err),
            Err(err) => Self::Fatal(err),
        }
    }
}

/// The terminal state of one phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhaseOutcome {
    /// Every plugin in the phase ran (possibly with tolerated failures).
    Completed,
    /// A fatal plugin failure aborted the remaining plugins in the phase.
    Aborted {
        /// The plugin that caused the abort.
        plugin: String,
        /// The failure reason.
        reason: String,
        /// True when the abort is an external cancellation.
        canceled: bool,
    },
}

impl PhaseOutcome {
    /// Returns true if the phase aborted.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted { .. })
    }
}

/// One recorded plugin failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginFailureRecord {
    /// The failing plugin's key.
    pub plugin: String,
    /// The failure reason.
    pub reason: String,
}

/// The report of one phase execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseReport {
    /// The phase this report describes.
    pub phase: BuildPhase,
    /// Keys of plugins that ran, in execution order.
    pub executed: Vec<String>,
    /// Failures recorded during the phase (tolerated and fatal).
    pub failures: Vec<PluginFailureRecord>,
    /// Keys of optional plugins skipped because they were unregistered.
    pub skipped: Vec<String>,
    /// The terminal state of the phase.
    pub outcome: PhaseOutcome,
}

/// Executes the ordered plugins of one phase against the workflow state.
///
/// State machine per phase: each plugin goes `Running → Succeeded|Failed`;
/// a fatal failure aborts the remaining plugins, a tolerated one is
/// recorded and execution continues.
pub struct PhaseRunner {
    phase: BuildPhase,
    plugins: Vec<Arc<dyn Plugin>>,
    skipped: Vec<String>,
    sink: Arc<dyn EventSink>,
}

impl PhaseRunner {
    /// Creates a runner for a phase.
    #[must_use]
    pub fn new(
        phase: BuildPhase,
        plugins: Vec<Arc<dyn Plugin>>,
        skipped: Vec<String>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            phase,
            plugins,
            skipped,
            sink,
        }
    }

    /// Returns the phase this runner executes.
    #[must_use]
    pub fn phase(&self) -> BuildPhase {
        self.phase
    }

    /// Returns the number of plugins that will run.
    #[must_use]
    pub fn plugin_count(&self) -> usize {
        self.plugins.len()
    }

    /// Runs the phase's plugins strictly in declaration order.
    pub async fn run(&self, state: &WorkflowState, caps: &Capabilities) -> PhaseReport {
        let mut report = PhaseReport {
            phase: self.phase,
            executed: Vec::new(),
            failures: Vec::new(),
            skipped: self.skipped.clone(),
            outcome: PhaseOutcome::Completed,
        };

        for plugin in &self.plugins {
            let key = plugin.key().to_string();

            self.sink.try_emit(
                "plugin.started",
                Some(serde_json::json!({
                    "phase": self.phase.to_string(),
                    "plugin": &key,
                })),
            );

            let started = Instant::now();
            let result = plugin.run(state, caps).await;
            let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
            report.executed.push(key.clone());

            match PluginExecution::classify(plugin.is_allowed_to_fail(), result) {
                PluginExecution::Ok(value) => {
                    if let Err(err) = state.record_phase_result(self.phase, &key, value) {
                        // A result slot collision is a state conflict, fatal
                        // to the phase like any other fatal plugin failure.
                        self.record_fatal(state, &mut report, &key, &err);
                        break;
                    }
                    self.sink.try_emit(
                        "plugin.completed",
                        Some(serde_json::json!({
                            "phase": self.phase.to_string(),
                            "plugin": &key,
                            "duration_ms": duration_ms,
                        })),
                    );
                }
                PluginExecution::Recoverable(err) => {
                    warn!(
                        phase = %self.phase,
                        plugin = %key,
                        error = %err,
                        "plugin failed (allowed to fail), continuing"
                    );
                    state.record_plugin_error(&key, err.to_string());
                    report.failures.push(PluginFailureRecord {
                        plugin: key.clone(),
                        reason: err.to_string(),
                    });
                    self.sink.try_emit(
                        "plugin.failed",
                        Some(serde_json::json!({
                            "phase": self.phase.to_string(),
                            "plugin": &key,
                            "error": err.to_string(),
                            "fatal": false,
                        })),
                    );
                }
                PluginExecution::Fatal(err) => {
                    self.record_fatal(state, &mut report, &key, &err);
                    break;
                }
            }
        }

        if !report.outcome.is_aborted() {
            self.sink.try_emit(
                "phase.completed",
                Some(serde_json::json!({
                    "phase": self.phase.to_string(),
                    "plugins": &report.executed,
                })),
            );
        }

        report
    }

    fn record_fatal(
        &self,
        state: &WorkflowState,
        report: &mut PhaseReport,
        key: &str,
        err: &BuildError,
    ) {
        error!(
            phase = %self.phase,
            plugin = %key,
            error = %err,
            "plugin failed, aborting phase"
        );
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
                "phase": self.phase.to_string(),
                "plugin": key,
                "error": err.to_string(),
            })),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{CollectingEventSink, NoOpEventSink};
    use crate::testing::{test_state, MockPlugin};

    fn runner(phase: BuildPhase, plugins: Vec<Arc<dyn Plugin>>) -> PhaseRunner {
        PhaseRunner::new(phase, plugins, Vec::new(), Arc::new(NoOpEventSink))
    }

    #[tokio::test]
    async fn test_plugins_run_in_declaration_order() {
        let log = MockPlugin::shared_log();
        let plugins: Vec<Arc<dyn Plugin>> = vec![
            Arc::new(MockPlugin::new("first").with_log(log.clone())),
            Arc::new(MockPlugin::new("second").with_log(log.clone())),
            Arc::new(MockPlugin::new("third").with_log(log.clone())),
        ];

        let state = test_state();
        let report = runner(BuildPhase::Prebuild, plugins)
            .run(&state, &Capabilities::new())
            .await;

        assert!(!report.outcome.is_aborted());
        assert_eq!(*log.lock(), vec!["first", "second", "third"]);
        assert_eq!(report.executed, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_allowed_to_fail_continues() {
        let plugins: Vec<Arc<dyn Plugin>> = vec![
            Arc::new(
                MockPlugin::new("flaky")
                    .allowed_to_fail()
                    .failing_with("registry unreachable"),
            ),
            Arc::new(MockPlugin::new("steady")),
        ];

        let state = test_state();
        let report = runner(BuildPhase::Prebuild, plugins)
            .run(&state, &Capabilities::new())
            .await;

        assert!(!report.outcome.is_aborted());
        assert_eq!(report.executed, vec!["flaky", "steady"]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].plugin, "flaky");

        // Failure recorded against the key, result absent
        assert!(state.plugin_errors().contains_key("flaky"));
        assert!(!state.phase_results(BuildPhase::Prebuild).contains_key("flaky"));
        assert!(state.phase_results(BuildPhase::Prebuild).contains_key("steady"));
    }

    #[tokio::test]
    async fn test_fatal_failure_aborts_remaining() {
        let log = MockPlugin::shared_log();
        let plugins: Vec<Arc<dyn Plugin>> = vec![
            Arc::new(
                MockPlugin::new("broken")
                    .with_log(log.clone())
                    .failing_with("koji down"),
            ),
            Arc::new(MockPlugin::new("never_runs").with_log(log.clone())),
        ];

        let state = test_state();
        let report = runner(BuildPhase::Prebuild, plugins)
            .run(&state, &Capabilities::new())
            .await;

        match &report.outcome {
            PhaseOutcome::Aborted { plugin, canceled, .. } => {
                assert_eq!(plugin, "broken");
                assert!(!canceled);
            }
            PhaseOutcome::Completed => panic!("phase should have aborted"),
        }
        assert_eq!(*log.lock(), vec!["broken"]);
    }

    #[tokio::test]
    async fn test_canceled_plugin_marks_abort_canceled() {
        let plugins: Vec<Arc<dyn Plugin>> =
            vec![Arc::new(MockPlugin::new("poller").canceling_with("orchestrator signal"))];

        let state = test_state();
        let report = runner(BuildPhase::Buildstep, plugins)
            .run(&state, &Capabilities::new())
            .await;

        match &report.outcome {
            PhaseOutcome::Aborted { canceled, .. } => assert!(canceled),
            PhaseOutcome::Completed => panic!("phase should have aborted"),
        }
    }

    #[tokio::test]
    async fn test_events_emitted() {
        let sink = Arc::new(CollectingEventSink::new());
        let plugins: Vec<Arc<dyn Plugin>> = vec![Arc::new(MockPlugin::new("only"))];
        let runner = PhaseRunner::new(BuildPhase::Exit, plugins, Vec::new(), sink.clone());

        let state = test_state();
        runner.run(&state, &Capabilities::new()).await;

        assert_eq!(sink.events_of_type("plugin.started").len(), 1);
        assert_eq!(sink.events_of_type("plugin.completed").len(), 1);
        assert_eq!(sink.events_of_type("phase.completed").len(), 1);
    }

    #[tokio::test]
    async fn test_skipped_plugins_reported() {
        let runner = PhaseRunner::new(
            BuildPhase::Postbuild,
            Vec::new(),
            vec!["verify_media".to_string()],
            Arc::new(NoOpEventSink),
        );

        let state = test_state();
        let report = runner.run(&state, &Capabilities::new()).await;

        assert!(!report.outcome.is_aborted());
        assert_eq!(report.skipped, vec!["verify_media"]);
        assert!(report.executed.is_empty());
    }
}
