//! Background job table.

use std::fmt;
use std::time::Duration;

use crate::config::ControllerConfig;
use crate::panel::NodeInfo;
use crate::task::PeriodicTask;

/// The recurring jobs a controller may own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum JobKind {
    NodeInfoRefresh,
    UserReport,
    CertRenewal,
    DynamicSpeedLimit,
    OnlineIpReport,
}

impl JobKind {
    pub const COUNT: usize = 5;

    pub const ALL: [JobKind; JobKind::COUNT] = [
        JobKind::NodeInfoRefresh,
        JobKind::UserReport,
        JobKind::CertRenewal,
        JobKind::DynamicSpeedLimit,
        JobKind::OnlineIpReport,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            JobKind::NodeInfoRefresh => "node_info_refresh",
            JobKind::UserReport => "user_report",
            JobKind::CertRenewal => "cert_renewal",
            JobKind::DynamicSpeedLimit => "dynamic_speed_limit",
            JobKind::OnlineIpReport => "online_ip_report",
        }
    }

    /// Whether this job runs for the given node and configuration.
    pub fn enabled(&self, node: &NodeInfo, config: &ControllerConfig) -> bool {
        match self {
            JobKind::NodeInfoRefresh | JobKind::UserReport => true,
            JobKind::CertRenewal => node.requires_cert(),
            JobKind::DynamicSpeedLimit => config.limit.enable_dynamic_speed_limit,
            JobKind::OnlineIpReport => config.limit.enable_ip_recorder,
        }
    }

    pub fn interval(&self, node: &NodeInfo, config: &ControllerConfig) -> Duration {
        match self {
            JobKind::NodeInfoRefresh => node.pull_interval,
            JobKind::UserReport => node.push_interval,
            JobKind::CertRenewal => config.cert.renew_interval(),
            JobKind::DynamicSpeedLimit => config.limit.dynamic_speed_limit.periodic(),
            JobKind::OnlineIpReport => config.limit.ip_recorder.periodic(),
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One optional handle per [`JobKind`].
///
/// A slot is occupied iff its job was started; `close_all` empties every slot.
#[derive(Debug, Default)]
pub struct JobSet {
    slots: [Option<PeriodicTask>; JobKind::COUNT],
}

impl JobSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a started job. Returns `false` and cancels `task` when the slot
    /// is already taken.
    pub fn insert(&mut self, kind: JobKind, task: PeriodicTask) -> bool {
        let slot = &mut self.slots[kind.index()];
        if slot.is_some() {
            tracing::warn!(job = %kind, "Job already running, discarding duplicate");
            task.close();
            return false;
        }
        *slot = Some(task);
        true
    }

    pub fn contains(&self, kind: JobKind) -> bool {
        self.slots[kind.index()].is_some()
    }

    pub fn running(&self) -> Vec<JobKind> {
        JobKind::ALL
            .into_iter()
            .filter(|kind| self.contains(*kind))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Cancel every started job, returning how many were closed.
    pub fn close_all(&mut self) -> usize {
        let mut closed = 0;
        for slot in self.slots.iter_mut() {
            if let Some(task) = slot.take() {
                task.close();
                closed += 1;
            }
        }
        closed
    }
}
