//! Build reservation cleanup.

use crate::capabilities::Capabilities;
use crate::errors::BuildError;
use crate::plugin::Plugin;
use crate::workflow::WorkflowState;
use async_trait::async_trait;
use tracing::{debug, info};

/// Agent name reported when refunding reservations.
const AGENT: &str = "kiln";

/// Exit-phase plugin consuming the build reservation.
///
/// A failed or canceled build refunds its reservation so the build id can
/// be reused; a successful build leaves the reservation to be consumed by
/// the import. Runs on every exit path and is a no-op when nothing was
/// reserved.
#[derive(Debug, Default)]
pub struct CancelBuildReservation;

impl CancelBuildReservation {
    /// The plugin key.
    pub const KEY: &'static str = "cancel_build_reservation";

    /// Creates the plugin from its JSON arguments.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when arguments are supplied; this
    /// plugin takes none.
    pub fn from_args(args: &serde_json::Value) -> Result<Self, BuildError> {
        if !args.is_null() && args != &serde_json::json!({}) {
            return Err(BuildError::configuration(format!(
                "{} takes no arguments",
                Self::KEY
            )));
        }
        Ok(Self)
    }
}

#[async_trait]
impl Plugin for CancelBuildReservation {
    fn key(&self) -> &str {
        Self::KEY
    }

    async fn run(
        &self,
        state: &WorkflowState,
        caps: &Capabilities,
    ) -> Result<serde_json::Value, BuildError> {
        let Some(reservation) = state.take_reservation() else {
            debug!("no build reservation to cancel");
            return Ok(serde_json::Value::Null);
        };

        if !state.build_process_failed() {
            debug!(
                build_id = reservation.build_id,
                "build succeeded, reservation is consumed by the import"
            );
            return Ok(serde_json::json!({
                "build_id": reservation.build_id,
                "refunded": false,
            }));
        }

        info!(build_id = reservation.build_id, "refunding build reservation");
        caps.koji()?
            .cg_refund_build(AGENT, reservation.build_id, &reservation.token)
            .await?;

        Ok(serde_json::json!({
            "build_id": reservation.build_id,
            "refunded": true,
        }))
    }
}
