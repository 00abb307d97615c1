//! Load Governor: admits work only while the shared host's serving account
//! stays under a CPU ceiling.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System, Uid, UpdateKind, Users};
use tracing::{debug, info, warn};

use newscred_common::config::GovernorConfig;

/// Current CPU utilization, in percent, of the processes that matter.
#[async_trait]
pub trait LoadSampler: Send + Sync {
    async fn sample(&self) -> Result<f32>;
}

/// Sums the CPU usage of every process owned by one OS account.
///
/// Percentages are per core as sysinfo reports them, so the sum can exceed
/// 100 on multi-core hosts unless `normalize_per_core` is set.
pub struct SysinfoSampler {
    account: String,
    window: Duration,
    normalize_per_core: bool,
    system: Mutex<System>,
}

impl SysinfoSampler {
    pub fn new(account: impl Into<String>, window: Duration, normalize_per_core: bool) -> Self {
        Self {
            account: account.into(),
            window,
            normalize_per_core,
            system: Mutex::new(System::new()),
        }
    }

    pub fn from_config(config: &GovernorConfig) -> Self {
        Self::new(
            config.account.clone(),
            config.sample_window(),
            config.normalize_per_core,
        )
    }

    fn resolve_uid(&self) -> Result<Uid> {
        let users = Users::new_with_refreshed_list();
        users
            .list()
            .iter()
            .find(|u| u.name() == self.account)
            .map(|u| u.id().clone())
            .ok_or_else(|| anyhow!("account '{}' not found", self.account))
    }

    fn refresh(&self) -> Result<()> {
        let mut system = self
            .system
            .lock()
            .map_err(|_| anyhow!("process table lock poisoned"))?;
        system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::nothing()
                .with_cpu()
                .with_user(UpdateKind::OnlyIfNotSet),
        );
        Ok(())
    }

    fn sum_for(&self, uid: &Uid) -> Result<f32> {
        let system = self
            .system
            .lock()
            .map_err(|_| anyhow!("process table lock poisoned"))?;
        let total: f32 = system
            .processes()
            .values()
            .filter(|p| p.user_id() == Some(uid))
            .map(|p| p.cpu_usage())
            .sum();
        Ok(total)
    }
}

#[async_trait]
impl LoadSampler for SysinfoSampler {
    async fn sample(&self) -> Result<f32> {
        let uid = self.resolve_uid()?;

        // CPU usage is a delta between two refreshes.
        self.refresh()?;
        tokio::time::sleep(self.window).await;
        self.refresh()?;

        let mut total = self.sum_for(&uid)?;
        if self.normalize_per_core {
            let cores = std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1);
            total /= cores as f32;
        }
        Ok(total)
    }
}

pub struct LoadGovernor {
    sampler: Arc<dyn LoadSampler>,
    ceiling_percent: f32,
    fail_closed: bool,
}

impl LoadGovernor {
    pub fn new(sampler: Arc<dyn LoadSampler>, ceiling_percent: f32) -> Self {
        Self {
            sampler,
            ceiling_percent,
            fail_closed: false,
        }
    }

    pub fn from_config(config: &GovernorConfig) -> Self {
        Self::new(
            Arc::new(SysinfoSampler::from_config(config)),
            config.cpu_ceiling_percent,
        )
        .fail_closed(config.fail_closed)
    }

    pub fn fail_closed(mut self, fail_closed: bool) -> Self {
        self.fail_closed = fail_closed;
        self
    }

    /// Whether new work may start now. Never blocks longer than one sample.
    pub async fn admit(&self) -> bool {
        let cpu = match self.sampler.sample().await {
            Ok(cpu) => cpu,
            Err(e) if self.fail_closed => {
                warn!(error = %e, "CPU sampling failed, denying admission");
                return false;
            }
            Err(e) => {
                warn!(error = %e, "CPU sampling failed, admitting");
                0.0
            }
        };

        let allowed = cpu < self.ceiling_percent;
        if allowed {
            debug!(cpu, ceiling = self.ceiling_percent, "Load under ceiling");
        } else {
            info!(cpu, ceiling = self.ceiling_percent, "Load over ceiling, holding off");
        }
        allowed
    }
}
