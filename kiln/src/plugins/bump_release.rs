//! Release resolution and build reservation.

use crate::capabilities::{Capabilities, KojiClient, NvrRequest};
use crate::errors::BuildError;
use crate::plugin::Plugin;
use crate::workflow::WorkflowState;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

const RESERVE_MAX_RETRIES: usize = 10;
const RESERVE_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Agent name reported when reserving builds.
const AGENT: &str = "kiln";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct Args {
    append: bool,
    reserve_build: bool,
    retry_delay_ms: Option<u64>,
}

/// When no release is set, asks the build-tracking service what the next
/// release should be; optionally reserves the build for a later import.
///
/// The resolved release is written to the workflow once, and the
/// reservation (build id and token) at most once, for the exit phase to
/// consume.
#[derive(Debug)]
pub struct BumpRelease {
    append: bool,
    reserve_build: bool,
    retry_delay: Duration,
}

impl BumpRelease {
    /// The plugin key.
    pub const KEY: &'static str = "bump_release";

    /// Creates the plugin from its JSON arguments.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for unknown or ill-typed arguments.
    pub fn from_args(args: &serde_json::Value) -> Result<Self, BuildError> {
        let args: Args = if args.is_null() {
            Args::default()
        } else {
            serde_json::from_value(args.clone()).map_err(|err| {
                BuildError::configuration(format!("bad arguments for {}: {err}", Self::KEY))
            })?
        };
        Ok(Self {
            append: args.append,
            reserve_build: args.reserve_build,
            retry_delay: args
                .retry_delay_ms
                .map_or(RESERVE_RETRY_DELAY, Duration::from_millis),
        })
    }

    /// Splits a release into up to three dot-separated parts, drops a
    /// purely numeric middle part, and optionally increments the first.
    fn patched_release(original: &str, increment: bool) -> Result<String, BuildError> {
        let mut parts = original.splitn(3, '.');
        let release = parts.next().unwrap_or(original);
        let suffix = parts.next();
        let rest = parts.next();

        let release = if increment {
            let numeric: u64 = release.parse().map_err(|_| {
                BuildError::invalid_data(format!("non-numeric release '{release}'"))
            })?;
            (numeric + 1).to_string()
        } else {
            release.to_string()
        };

        let suffix = suffix.filter(|s| s.is_empty() || !s.chars().all(|c| c.is_ascii_digit()));

        let joined = [Some(release.as_str()), suffix, rest]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(".");
        Ok(joined)
    }

    async fn next_release_standard(
        &self,
        koji: &Arc<dyn KojiClient>,
        component: &str,
        version: &str,
    ) -> Result<String, BuildError> {
        let build = NvrRequest::new(component, version);
        debug!(component, version, "getting next release");
        let mut next = Self::patched_release(&koji.get_next_release(&build).await?, false)?;

        // The next release reported by the service tracks the last
        // successful build; a failed build may already occupy it, and
        // imports cannot be re-uploaded. Probe until the build is free.
        loop {
            let nvr = NvrRequest::new(component, version).with_release(&next);
            debug!(release = %next, "checking that the build does not exist");
            if koji.get_build(&nvr).await?.is_none() {
                return Ok(next);
            }
            next = Self::patched_release(&next, true)?;
        }
    }

    async fn next_release_append(
        &self,
        koji: &Arc<dyn KojiClient>,
        component: &str,
        version: &str,
        base_release: Option<&str>,
    ) -> Result<String, BuildError> {
        let release = base_release.unwrap_or("1");
        let mut suffix = 1u64;
        loop {
            let next = format!("{release}.{suffix}");
            let nvr = NvrRequest::new(component, version).with_release(&next);
            debug!(release = %next, "checking that the build does not exist");
            if koji.get_build(&nvr).await?.is_none() {
                return Ok(next);
            }
            suffix += 1;
        }
    }

    async fn next_release(
        &self,
        koji: &Arc<dyn KojiClient>,
        state: &WorkflowState,
        release: Option<&str>,
    ) -> Result<String, BuildError> {
        let params = state.user_params();
        if params.scratch {
            // Scratch builds are never imported, any release will do.
            return Ok(release.unwrap_or("1").to_string());
        }
        if self.append {
            return self
                .next_release_append(koji, &params.component, &params.version, release)
                .await;
        }
        self.next_release_standard(koji, &params.component, &params.version)
            .await
    }

    async fn check_build_existence(
        &self,
        koji: &Arc<dyn KojiClient>,
        component: &str,
        version: &str,
        release: &str,
    ) -> Result<(), BuildError> {
        let nvr = NvrRequest::new(component, version).with_release(release);
        debug!(release, "checking that the build does not exist");
        if let Some(build) = koji.get_build(&nvr).await? {
            return Err(BuildError::invalid_data(format!(
                "build already exists: {} (id {})",
                build.nvr, build.id
            )));
        }
        Ok(())
    }

    async fn reserve_build(
        &self,
        koji: &Arc<dyn KojiClient>,
        state: &WorkflowState,
        explicit_release: bool,
        mut release: String,
    ) -> Result<String, BuildError> {
        let params = state.user_params();

        for counter in 0..=RESERVE_MAX_RETRIES {
            let nvr = NvrRequest::new(&params.component, &params.version).with_release(&release);
            info!(nvr = ?nvr, "reserving build");

            match koji.cg_init_build(AGENT, &nvr).await {
                Ok(reservation) => {
                    state.set_reservation(reservation.build_id, reservation.token)?;
                    return Ok(release);
                }
                Err(err) => {
                    if explicit_release {
                        error!("reservation failed, not retrying: release was explicitly set");
                        return Err(err.into());
                    }
                    if counter < RESERVE_MAX_RETRIES {
                        info!("retrying build reservation");
                        tokio::time::sleep(self.retry_delay).await;
                        release = self.next_release(koji, state, None).await?;
                    } else {
                        error!(
                            retries = RESERVE_MAX_RETRIES,
                            "reservation failed, reached maximum number of retries"
                        );
                        return Err(err.into());
                    }
                }
            }
        }

        // The loop always returns; reaching here would mean zero iterations.
        Err(BuildError::configuration("build reservation never attempted"))
    }
}

#[async_trait]
impl Plugin for BumpRelease {
    fn key(&self) -> &str {
        Self::KEY
    }

    async fn run(
        &self,
        state: &WorkflowState,
        caps: &Capabilities,
    ) -> Result<serde_json::Value, BuildError> {
        let koji = caps.koji()?.clone();
        let params = state.user_params();
        let explicit_release = params.release.clone();

        let mut chosen = None;
        if let Some(release) = &explicit_release {
            if !self.append {
                if params.scratch {
                    debug!("release set explicitly for a scratch build, nothing to do");
                    return Ok(serde_json::json!({ "release": release }));
                }
                debug!("release set explicitly so not incrementing");
                self.check_build_existence(&koji, &params.component, &params.version, release)
                    .await?;
                chosen = Some(release.clone());
            }
        }

        let mut release = match chosen {
            Some(release) => release,
            None => {
                self.next_release(&koji, state, explicit_release.as_deref())
                    .await?
            }
        };

        if self.reserve_build && !params.scratch {
            release = self
                .reserve_build(&koji, state, explicit_release.is_some(), release)
                .await?;
        }

        info!(release = %release, "resolved release");
        if explicit_release.as_deref() != Some(release.as_str()) {
            state.set_release(&release)?;
        }

        Ok(serde_json::json!({ "release": release }))
    }
}
