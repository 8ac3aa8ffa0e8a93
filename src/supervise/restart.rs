//! Restart strategy: how a clean-restart request is honored
//!
//! `LocalExit` keeps everything on this host: the supervised loop simply
//! relaunches the managed process. `RemoteRedeploy` asks the cluster
//! orchestration layer for a rolling redeployment instead; it is strictly
//! best-effort, bounded by a timeout, and always falls back to local
//! behavior on any error so a broken cluster API can never wedge the loop.

use crate::error::StokerResult;
use crate::settings::{RestartSettings, RestartStrategyKind};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{info, warn};

/// What the supervised loop should do after the strategy ran
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartAction {
    /// Relaunch the managed process in this orchestrator
    Relaunch,
    /// The cluster is replacing this container; exit cleanly
    Detach,
}

/// Pluggable handling of a clean-restart request
#[async_trait]
pub trait RestartStrategy: Send + Sync {
    async fn restart(&self) -> StokerResult<RestartAction>;

    fn name(&self) -> &'static str;
}

/// Always-available strategy: restart by relaunching locally
pub struct LocalExit;

#[async_trait]
impl RestartStrategy for LocalExit {
    async fn restart(&self) -> StokerResult<RestartAction> {
        Ok(RestartAction::Relaunch)
    }

    fn name(&self) -> &'static str {
        "local"
    }
}

/// Best-effort rolling redeployment through the cluster API
pub struct RemoteRedeploy {
    url: String,
    timeout: Duration,
}

impl RemoteRedeploy {
    pub fn new(url: String, timeout: Duration) -> Self {
        Self { url, timeout }
    }

    fn request(url: String, timeout: Duration) -> Result<(), ureq::Error> {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        agent.post(&url).send_empty()?;
        Ok(())
    }
}

#[async_trait]
impl RestartStrategy for RemoteRedeploy {
    async fn restart(&self) -> StokerResult<RestartAction> {
        let url = self.url.clone();
        let timeout = self.timeout;

        let result = tokio::task::spawn_blocking(move || Self::request(url, timeout)).await;

        match result {
            Ok(Ok(())) => {
                info!("Remote redeploy accepted by {}, detaching", self.url);
                Ok(RestartAction::Detach)
            }
            Ok(Err(e)) => {
                warn!("Remote redeploy via {} failed ({}), falling back to local restart", self.url, e);
                Ok(RestartAction::Relaunch)
            }
            Err(e) => {
                warn!("Remote redeploy task failed ({}), falling back to local restart", e);
                Ok(RestartAction::Relaunch)
            }
        }
    }

    fn name(&self) -> &'static str {
        "remote"
    }
}

/// Build the configured strategy
pub fn build_strategy(settings: &RestartSettings) -> Box<dyn RestartStrategy> {
    match settings.kind {
        RestartStrategyKind::Local => Box::new(LocalExit),
        RestartStrategyKind::Remote => {
            // Resolution guarantees the URL is present for the remote kind.
            let url = settings.redeploy_url.clone().unwrap_or_default();
            Box::new(RemoteRedeploy::new(url, settings.redeploy_timeout))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn local_always_relaunches() {
        assert_eq!(LocalExit.restart().await.unwrap(), RestartAction::Relaunch);
    }

    #[tokio::test]
    async fn remote_falls_back_on_unreachable_api() {
        let strategy = RemoteRedeploy::new(
            "http://stoker.invalid/redeploy".to_string(),
            Duration::from_millis(500),
        );
        assert_eq!(strategy.restart().await.unwrap(), RestartAction::Relaunch);
    }

    #[test]
    fn strategy_selection() {
        let local = RestartSettings {
            kind: RestartStrategyKind::Local,
            redeploy_url: None,
            redeploy_timeout: Duration::from_secs(10),
        };
        assert_eq!(build_strategy(&local).name(), "local");

        let remote = RestartSettings {
            kind: RestartStrategyKind::Remote,
            redeploy_url: Some("http://cluster/redeploy".to_string()),
            redeploy_timeout: Duration::from_secs(10),
        };
        assert_eq!(build_strategy(&remote).name(), "remote");
    }
}
