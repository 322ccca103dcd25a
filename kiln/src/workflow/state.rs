//! The shared workflow state accumulator.

use crate::core::{BuildPhase, BuildResult, ImageComponent};
use crate::errors::{BuildError, StateConflictError};
use crate::workflow::{BuildDir, DockerfileImages, Source, UserParams};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

/// A build reservation obtained from the build-tracking service.
///
/// Set by at most one plugin and consumed at most once during the exit
/// phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildReservation {
    /// The reserved build id.
    pub build_id: u64,
    /// The reservation token required to import or refund the build.
    pub token: String,
}

/// The recorded cause of a failed build, given to exit-phase plugins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildFailure {
    /// The phase the failure occurred in.
    pub phase: BuildPhase,
    /// The key of the plugin that failed.
    pub plugin: String,
    /// The failure reason.
    pub reason: String,
    /// True when the failure is an external cancellation rather than a
    /// genuine error.
    pub canceled: bool,
}

/// The shared, mutable accumulator of build facts and per-phase plugin
/// results.
///
/// One `WorkflowState` is created per build invocation, lives for the full
/// pipeline execution, and is owned by the executor; plugins receive a
/// reference and mutate only the fields documented as shared-write. Fields
/// marked "set once" enforce that invariant in their accessors: a second
/// write fails with [`StateConflictError`] rather than overwriting.
#[derive(Debug)]
pub struct WorkflowState {
    run_id: Uuid,
    user_params: UserParams,
    dockerfile_images: DockerfileImages,
    build_dir: BuildDir,
    source: Source,
    release: RwLock<Option<String>>,
    image_components: RwLock<Option<Vec<ImageComponent>>>,
    prebuild_results: RwLock<HashMap<String, serde_json::Value>>,
    postbuild_results: RwLock<HashMap<String, serde_json::Value>>,
    exit_results: RwLock<HashMap<String, serde_json::Value>>,
    buildstep_result: RwLock<Option<(String, BuildResult)>>,
    plugin_workspace: RwLock<HashMap<String, serde_json::Value>>,
    plugin_errors: RwLock<HashMap<String, String>>,
    reservation: RwLock<Option<BuildReservation>>,
    failure: RwLock<Option<BuildFailure>>,
    cancel_requested: AtomicBool,
    cancel_reason: RwLock<Option<String>>,
}

impl WorkflowState {
    /// Creates a new workflow state for one build invocation.
    #[must_use]
    pub fn new(
        user_params: UserParams,
        dockerfile_images: DockerfileImages,
        build_dir: BuildDir,
        source: Source,
    ) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            user_params,
            dockerfile_images,
            build_dir,
            source,
            release: RwLock::new(None),
            image_components: RwLock::new(None),
            prebuild_results: RwLock::new(HashMap::new()),
            postbuild_results: RwLock::new(HashMap::new()),
            exit_results: RwLock::new(HashMap::new()),
            buildstep_result: RwLock::new(None),
            plugin_workspace: RwLock::new(HashMap::new()),
            plugin_errors: RwLock::new(HashMap::new()),
            reservation: RwLock::new(None),
            failure: RwLock::new(None),
            cancel_requested: AtomicBool::new(false),
            cancel_reason: RwLock::new(None),
        }
    }

    /// Returns the unique id of this build run.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Returns the immutable build-invocation parameters.
    #[must_use]
    pub fn user_params(&self) -> &UserParams {
        &self.user_params
    }

    /// Returns the Dockerfile parent image chain.
    #[must_use]
    pub fn dockerfile_images(&self) -> &DockerfileImages {
        &self.dockerfile_images
    }

    /// Returns the build directory.
    #[must_use]
    pub fn build_dir(&self) -> &BuildDir {
        &self.build_dir
    }

    /// Returns the build source.
    #[must_use]
    pub fn source(&self) -> &Source {
        &self.source
    }

    /// Sets the resolved release label. Set once.
    ///
    /// # Errors
    ///
    /// Returns [`StateConflictError`] if a release was already resolved.
    pub fn set_release(&self, release: impl Into<String>) -> Result<(), StateConflictError> {
        let mut slot = self.release.write();
        if slot.is_some() {
            return Err(StateConflictError::new("release"));
        }
        *slot = Some(release.into());
        Ok(())
    }

    /// Returns the resolved release label, falling back to the explicit
    /// release from the user params.
    #[must_use]
    pub fn release(&self) -> Option<String> {
        self.release
            .read()
            .clone()
            .or_else(|| self.user_params.release.clone())
    }

    /// Sets the image component list. Set once; later plugins only read it.
    ///
    /// # Errors
    ///
    /// Returns [`StateConflictError`] if the components were already set.
    pub fn set_image_components(
        &self,
        components: Vec<ImageComponent>,
    ) -> Result<(), StateConflictError> {
        let mut slot = self.image_components.write();
        if slot.is_some() {
            return Err(StateConflictError::new("image_components"));
        }
        *slot = Some(components);
        Ok(())
    }

    /// Returns the image component list, or `None` before population.
    #[must_use]
    pub fn image_components(&self) -> Option<Vec<ImageComponent>> {
        self.image_components.read().clone()
    }

    /// Records a plugin result under its key for the given phase.
    ///
    /// # Errors
    ///
    /// Returns an error if the key already holds a result in that phase, or
    /// if the phase is the build step (which stores a [`BuildResult`]
    /// through [`Self::set_buildstep_result`] instead).
    pub fn record_phase_result(
        &self,
        phase: BuildPhase,
        key: impl Into<String>,
        value: serde_json::Value,
    ) -> Result<(), BuildError> {
        let key = key.into();
        let results = self.results_for(phase)?;
        let mut results = results.write();
        if results.contains_key(&key) {
            return Err(StateConflictError::new(format!("{phase}:{key}")).into());
        }
        results.insert(key, value);
        Ok(())
    }

    /// Returns a copy of the recorded results for the given phase.
    ///
    /// The build-step phase has no keyed result map; it returns empty.
    #[must_use]
    pub fn phase_results(&self, phase: BuildPhase) -> HashMap<String, serde_json::Value> {
        self.results_for(phase)
            .map(|results| results.read().clone())
            .unwrap_or_default()
    }

    fn results_for(
        &self,
        phase: BuildPhase,
    ) -> Result<&RwLock<HashMap<String, serde_json::Value>>, BuildError> {
        match phase {
            BuildPhase::Prebuild => Ok(&self.prebuild_results),
            BuildPhase::Postbuild => Ok(&self.postbuild_results),
            BuildPhase::Exit => Ok(&self.exit_results),
            BuildPhase::Buildstep => Err(BuildError::configuration(
                "buildstep results are stored through set_buildstep_result",
            )),
        }
    }

    /// Stores the winning build-step result. Set once.
    ///
    /// # Errors
    ///
    /// Returns [`StateConflictError`] if a build-step result already exists.
    pub fn set_buildstep_result(
        &self,
        key: impl Into<String>,
        result: BuildResult,
    ) -> Result<(), StateConflictError> {
        let mut slot = self.buildstep_result.write();
        if slot.is_some() {
            return Err(StateConflictError::new("buildstep_result"));
        }
        *slot = Some((key.into(), result));
        Ok(())
    }

    /// Returns the winning build-step plugin key and result.
    #[must_use]
    pub fn buildstep_result(&self) -> Option<(String, BuildResult)> {
        self.buildstep_result.read().clone()
    }

    /// Returns the winning build result, if the build step has completed.
    #[must_use]
    pub fn build_result(&self) -> Option<BuildResult> {
        self.buildstep_result.read().as_ref().map(|(_, r)| r.clone())
    }

    /// Stores a private workspace value for a plugin key.
    ///
    /// The workspace is a side channel for cross-plugin data (e.g. shared
    /// configuration loaded once); overwriting is allowed.
    pub fn workspace_insert(&self, key: impl Into<String>, value: serde_json::Value) {
        self.plugin_workspace.write().insert(key.into(), value);
    }

    /// Returns a plugin's workspace value.
    #[must_use]
    pub fn workspace_get(&self, key: &str) -> Option<serde_json::Value> {
        self.plugin_workspace.read().get(key).cloned()
    }

    /// Records a plugin failure reason under its key.
    pub fn record_plugin_error(&self, key: impl Into<String>, reason: impl Into<String>) {
        self.plugin_errors.write().insert(key.into(), reason.into());
    }

    /// Returns a copy of all recorded plugin failure reasons.
    #[must_use]
    pub fn plugin_errors(&self) -> HashMap<String, String> {
        self.plugin_errors.read().clone()
    }

    /// Stores the build reservation. Set once by the reserving plugin.
    ///
    /// # Errors
    ///
    /// Returns [`StateConflictError`] if a reservation already exists.
    pub fn set_reservation(
        &self,
        build_id: u64,
        token: impl Into<String>,
    ) -> Result<(), StateConflictError> {
        let mut slot = self.reservation.write();
        if slot.is_some() {
            return Err(StateConflictError::new("reserved_build_id"));
        }
        *slot = Some(BuildReservation {
            build_id,
            token: token.into(),
        });
        Ok(())
    }

    /// Consumes the build reservation; at most one caller gets it.
    #[must_use]
    pub fn take_reservation(&self) -> Option<BuildReservation> {
        self.reservation.write().take()
    }

    /// Returns the reserved build id without consuming the reservation.
    #[must_use]
    pub fn reserved_build_id(&self) -> Option<u64> {
        self.reservation.read().as_ref().map(|r| r.build_id)
    }

    /// Signals that an external orchestrator canceled the build.
    ///
    /// Long-running plugins observe this cooperatively.
    pub fn request_cancel(&self, reason: impl Into<String>) {
        self.cancel_requested.store(true, Ordering::SeqCst);
        let mut slot = self.cancel_reason.write();
        if slot.is_none() {
            *slot = Some(reason.into());
        }
    }

    /// Returns true when a cancellation was requested.
    #[must_use]
    pub fn is_cancel_requested(&self) -> bool {
        self.cancel_requested.load(Ordering::SeqCst)
    }

    /// Returns the cancellation reason, if any.
    #[must_use]
    pub fn cancel_reason(&self) -> Option<String> {
        self.cancel_reason.read().clone()
    }

    /// Records the build failure cause for exit-phase plugins.
    ///
    /// Only the first failure is kept; later failures never mask the
    /// original cause.
    pub fn mark_failed(&self, failure: BuildFailure) {
        let mut slot = self.failure.write();
        if slot.is_none() {
            *slot = Some(failure);
        }
    }

    /// Returns true when an earlier phase failed.
    #[must_use]
    pub fn build_process_failed(&self) -> bool {
        self.failure.read().is_some()
    }

    /// Returns the recorded failure cause, if any.
    #[must_use]
    pub fn failure(&self) -> Option<BuildFailure> {
        self.failure.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::params::UserParams;

    fn state() -> WorkflowState {
        WorkflowState::new(
            UserParams::new("x86_64", "httpd", "2.4"),
            DockerfileImages::new(vec!["registry.example.com/ubi9:latest".to_string()]),
            BuildDir::new("/tmp/build"),
            Source::dummy("/tmp/build"),
        )
    }

    #[test]
    fn test_image_components_write_once() {
        let state = state();
        assert!(state.image_components().is_none());

        state
            .set_image_components(vec![ImageComponent::rpm("bash", "5.1", "1", "x86_64")])
            .unwrap();
        assert_eq!(state.image_components().unwrap().len(), 1);

        let err = state.set_image_components(Vec::new()).unwrap_err();
        assert_eq!(err.field, "image_components");
    }

    #[test]
    fn test_phase_result_keys_unique() {
        let state = state();
        state
            .record_phase_result(BuildPhase::Prebuild, "bump_release", serde_json::json!("1.1"))
            .unwrap();

        let err = state
            .record_phase_result(BuildPhase::Prebuild, "bump_release", serde_json::json!("1.2"))
            .unwrap_err();
        assert!(matches!(err, BuildError::StateConflict(_)));

        // Same key in another phase is fine
        state
            .record_phase_result(BuildPhase::Exit, "bump_release", serde_json::json!(null))
            .unwrap();
    }

    #[test]
    fn test_buildstep_phase_has_no_keyed_results() {
        let state = state();
        let err = state
            .record_phase_result(BuildPhase::Buildstep, "builder", serde_json::json!({}))
            .unwrap_err();
        assert!(matches!(err, BuildError::Configuration(_)));
        assert!(state.phase_results(BuildPhase::Buildstep).is_empty());
    }

    #[test]
    fn test_buildstep_result_set_once() {
        let state = state();
        state
            .set_buildstep_result("builder_a", BuildResult::success("sha256:aa"))
            .unwrap();

        let err = state
            .set_buildstep_result("builder_b", BuildResult::success("sha256:bb"))
            .unwrap_err();
        assert_eq!(err.field, "buildstep_result");

        let (key, result) = state.buildstep_result().unwrap();
        assert_eq!(key, "builder_a");
        assert_eq!(result.image_id.as_deref(), Some("sha256:aa"));
    }

    #[test]
    fn test_workspace_allows_overwrite() {
        let state = state();
        state.workspace_insert("config", serde_json::json!(1));
        state.workspace_insert("config", serde_json::json!(2));
        assert_eq!(state.workspace_get("config"), Some(serde_json::json!(2)));
    }

    #[test]
    fn test_reservation_set_once_consume_once() {
        let state = state();
        state.set_reservation(12345, "token-abc").unwrap();

        let err = state.set_reservation(99, "other").unwrap_err();
        assert_eq!(err.field, "reserved_build_id");

        let reservation = state.take_reservation().unwrap();
        assert_eq!(reservation.build_id, 12345);
        assert_eq!(reservation.token, "token-abc");

        assert!(state.take_reservation().is_none());
    }

    #[test]
    fn test_release_falls_back_to_params() {
        let explicit = WorkflowState::new(
            UserParams::new("x86_64", "httpd", "2.4").with_release("7"),
            DockerfileImages::default(),
            BuildDir::new("/tmp/build"),
            Source::dummy("/tmp/build"),
        );
        assert_eq!(explicit.release().as_deref(), Some("7"));

        let state = state();
        assert!(state.release().is_none());
        state.set_release("3").unwrap();
        assert_eq!(state.release().as_deref(), Some("3"));
        assert!(state.set_release("4").is_err());
    }

    #[test]
    fn test_cancel_request() {
        let state = state();
        assert!(!state.is_cancel_requested());

        state.request_cancel("orchestrator timeout");
        assert!(state.is_cancel_requested());
        assert_eq!(state.cancel_reason().as_deref(), Some("orchestrator timeout"));

        // The first reason wins
        state.request_cancel("second signal");
        assert_eq!(state.cancel_reason().as_deref(), Some("orchestrator timeout"));
    }

    #[test]
    fn test_first_failure_wins() {
        let state = state();
        assert!(!state.build_process_failed());

        state.mark_failed(BuildFailure {
            phase: BuildPhase::Prebuild,
            plugin: "bump_release".to_string(),
            reason: "koji down".to_string(),
            canceled: false,
        });
        state.mark_failed(BuildFailure {
            phase: BuildPhase::Exit,
            plugin: "store_metadata".to_string(),
            reason: "disk full".to_string(),
            canceled: false,
        });

        let failure = state.failure().unwrap();
        assert_eq!(failure.plugin, "bump_release");
        assert_eq!(failure.phase, BuildPhase::Prebuild);
    }

    #[test]
    fn test_plugin_errors_recorded() {
        let state = state();
        state.record_plugin_error("verify_media", "registry unreachable");
        let errors = state.plugin_errors();
        assert_eq!(errors.get("verify_media").unwrap(), "registry unreachable");
    }
}
