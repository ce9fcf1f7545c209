//! Failure isolation around the cycle controller.
//!
//! The supervisor owns the link for the whole process lifetime: it opens it
//! once at startup (the only fatal failure), runs cycles back to back, cools
//! down after transport faults, reopens the link after repeated faults and
//! performs the stop/close sequence on shutdown.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn, Instrument};
use uuid::Uuid;

use crate::config::MonitorConfig;
use crate::controller::{CycleController, Devices};
use crate::error::Result;
use crate::metrics::Metrics;
use crate::obs;
use crate::ports::{LinkCommand, LinkConnector, TransportLink};
use crate::shutdown::Shutdown;

/// Summary returned once the supervisor has shut down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupervisorReport {
    pub cycles: u64,
    pub faults: u64,
    pub alarms: u64,
}

/// Runs monitoring cycles until shutdown is requested.
pub struct Supervisor {
    config: MonitorConfig,
    connector: Arc<dyn LinkConnector>,
    controller: CycleController,
    metrics: Arc<Metrics>,
    consecutive_faults: u32,
    session_id: Uuid,
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("session_id", &self.session_id)
            .field("endpoint", &self.connector.endpoint())
            .field("state", &self.controller.state())
            .field("consecutive_faults", &self.consecutive_faults)
            .finish_non_exhaustive()
    }
}

impl Supervisor {
    /// Validate the configuration and open the transport link.
    ///
    /// Fails only if the configuration is invalid or the link cannot be
    /// opened; there is no monitoring without the link.
    pub async fn establish(
        config: MonitorConfig,
        connector: Arc<dyn LinkConnector>,
        devices: Devices,
    ) -> Result<Self> {
        config.validate()?;
        let link = connector.connect().await?;
        Self::from_link(config, connector, link, devices)
    }

    /// Build a supervisor around a link the caller already opened.
    ///
    /// Lets the caller open the link before slower device setup, so a
    /// missing link fails startup first. `connector` is kept for reconnects.
    pub fn from_link(
        config: MonitorConfig,
        connector: Arc<dyn LinkConnector>,
        link: Arc<dyn TransportLink>,
        devices: Devices,
    ) -> Result<Self> {
        config.validate()?;
        info!(endpoint = %connector.endpoint(), "transport link established");

        let controller = CycleController::new(config.clone(), link, devices);
        Ok(Self {
            config,
            connector,
            controller,
            metrics: Arc::new(Metrics::new()),
            consecutive_faults: 0,
            session_id: Uuid::new_v4(),
        })
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        self.metrics.clone()
    }

    /// Speak a one-off announcement (e.g. at startup). Failures are logged.
    pub async fn announce(&self, text: &str) {
        if let Err(e) = self.controller.speak(text).await {
            obs::emit_step_error("announce", &e);
        }
    }

    /// Identifier of this monitoring session, attached to every log line.
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Run cycles until `shutdown` fires, then stop and release the link.
    pub async fn run(self, shutdown: Shutdown) -> SupervisorReport {
        let span = tracing::info_span!("safer.session", session_id = %self.session_id);
        self.supervise(shutdown).instrument(span).await
    }

    async fn supervise(mut self, mut shutdown: Shutdown) -> SupervisorReport {
        info!(
            settle_secs = self.config.settle_secs,
            poll_interval_secs = self.config.poll_interval_secs,
            max_polls = self.config.max_polls,
            "monitoring started"
        );

        while !shutdown.is_requested() {
            let outcome = self.controller.run_one_cycle(&shutdown).await;
            self.metrics.record(&outcome);

            let flush_every = self.config.metrics_flush_every;
            if flush_every > 0 && self.metrics.cycles() % flush_every == 0 {
                self.metrics.flush();
            }

            if !outcome.is_fault() {
                self.consecutive_faults = 0;
                continue;
            }

            self.consecutive_faults += 1;
            obs::emit_fault_cooldown(
                self.consecutive_faults,
                self.metrics.faults(),
                self.config.fault_cooldown_secs,
            );

            let reconnect_after = self.config.reconnect_after_faults;
            if reconnect_after > 0 && self.consecutive_faults % reconnect_after == 0 {
                self.reconnect().await;
            }

            if !shutdown.sleep(self.config.fault_cooldown()).await {
                break;
            }
        }

        info!("shutdown requested; stopping sensors");
        self.release_link().await;
        self.metrics.flush();

        SupervisorReport {
            cycles: self.metrics.cycles(),
            faults: self.metrics.faults(),
            alarms: self.metrics.alarms_raised(),
        }
    }

    /// Close the current link and open a fresh one through the connector.
    async fn reconnect(&mut self) {
        let endpoint = self.connector.endpoint();
        if let Err(e) = self.controller.link().close().await {
            obs::emit_step_error("close_link", &e);
        }
        match self.connector.connect().await {
            Ok(link) => {
                self.controller.replace_link(link);
                obs::emit_reconnect(&endpoint, true);
            }
            Err(e) => {
                warn!(error = %e, "reconnect failed");
                obs::emit_reconnect(&endpoint, false);
            }
        }
    }

    async fn release_link(&self) {
        let link = self.controller.link();
        if let Err(e) = link.send(LinkCommand::Stop).await {
            obs::emit_step_error("final_stop", &e);
        }
        if let Err(e) = link.close().await {
            obs::emit_step_error("close_link", &e);
        }
    }
}
