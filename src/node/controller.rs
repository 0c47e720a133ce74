//! Node lifecycle controller.
//!
//! # Responsibilities
//! - Bring a node from cold start to serving, in a fixed order
//! - Launch the background jobs the node's configuration calls for
//! - Tear everything down again on close
//!
//! # Design Decisions
//! - Fail fast: the first failing step aborts startup, no rollback
//! - The limiter entry is removed by tag on close however far startup got
//! - Close never fails, and a closed controller can be started again

use std::future::Future;
use std::sync::Arc;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use dashmap::DashMap;

use crate::cert::{CertManager, CertProvisioner};
use crate::config::ControllerConfig;
use crate::engine::{AddUsersParams, Core};
use crate::iprecorder::{IpRecorder, PanelRecorder};
use crate::lifecycle::Service;
use crate::limiter::{Limiter, LimiterRegistry};
use crate::node::context::NodeContext;
use crate::node::error::{ControllerError, JobError};
use crate::node::jobs::{JobKind, JobSet};
use crate::node::tag::build_node_tag;
use crate::observability::metrics;
use crate::panel::{ControlPlane, NodeInfo, UserInfo};
use crate::task::PeriodicTask;

/// Controls one node for the lifetime between `start` and `close`.
pub struct Controller {
    core: Arc<dyn Core>,
    panel: Arc<dyn ControlPlane>,
    limiters: Arc<LimiterRegistry>,
    cert: Arc<dyn CertProvisioner>,
    ip_recorder: Arc<dyn IpRecorder>,
    config: Arc<ControllerConfig>,
    tag: String,
    /// Set once `add_node` succeeded for `tag`.
    registered: bool,
    context: Option<Arc<NodeContext>>,
    jobs: JobSet,
}

impl Controller {
    /// Create a controller with the config-driven certificate manager and
    /// the panel as IP recorder.
    pub fn new(
        core: Arc<dyn Core>,
        panel: Arc<dyn ControlPlane>,
        limiters: Arc<LimiterRegistry>,
        config: ControllerConfig,
    ) -> Self {
        let cert = Arc::new(CertManager::new(config.cert.clone()));
        let ip_recorder = Arc::new(PanelRecorder::new(panel.clone()));
        Self {
            core,
            panel,
            limiters,
            cert,
            ip_recorder,
            config: Arc::new(config),
            tag: String::new(),
            registered: false,
            context: None,
            jobs: JobSet::new(),
        }
    }

    pub fn with_cert_provisioner(mut self, cert: Arc<dyn CertProvisioner>) -> Self {
        self.cert = cert;
        self
    }

    pub fn with_ip_recorder(mut self, ip_recorder: Arc<dyn IpRecorder>) -> Self {
        self.ip_recorder = ip_recorder;
        self
    }

    /// Node tag, empty until startup derived it.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn running_jobs(&self) -> Vec<JobKind> {
        self.jobs.running()
    }

    pub fn is_running(&self) -> bool {
        self.context.is_some()
    }

    pub fn limiter(&self) -> Option<Arc<Limiter>> {
        self.context.as_ref().map(|c| c.limiter.clone())
    }

    /// Current cached cohort snapshot.
    pub fn users(&self) -> Option<Arc<Vec<UserInfo>>> {
        self.context.as_ref().map(|c| c.users.load_full())
    }

    /// Current cached descriptor snapshot.
    pub fn node_info(&self) -> Option<Arc<NodeInfo>> {
        self.context.as_ref().map(|c| c.node.load_full())
    }

    /// Run the startup pipeline, then launch background jobs.
    pub async fn start(&mut self) -> Result<(), ControllerError> {
        let result = self.bring_up().await;
        metrics::record_startup(match &result {
            Ok(()) => "ok",
            Err(e) => e.step(),
        });
        result
    }

    async fn bring_up(&mut self) -> Result<(), ControllerError> {
        if !self.jobs.is_empty() {
            return Err(ControllerError::AlreadyStarted(self.tag.clone()));
        }

        let node = self
            .panel
            .get_node_info()
            .await
            .map_err(ControllerError::GetNodeInfo)?;
        let users = self
            .panel
            .get_user_list()
            .await
            .map_err(ControllerError::GetUserList)?;
        if users.is_empty() {
            return Err(ControllerError::NoUsers);
        }
        self.tag = build_node_tag(self.panel.host(), &node);

        let limiter = self.limiters.add(&self.tag, &self.config.limit, &users);
        limiter
            .update_rule(&node.rules)
            .map_err(ControllerError::UpdateRule)?;

        if node.requires_cert() {
            self.cert
                .request_cert()
                .await
                .map_err(ControllerError::RequestCert)?;
        }

        self.core
            .add_node(&self.tag, &node, &self.config)
            .await
            .map_err(ControllerError::AddNode)?;
        self.registered = true;
        let added = self
            .core
            .add_users(AddUsersParams {
                tag: &self.tag,
                config: &self.config,
                users: &users,
                node: &node,
            })
            .await
            .map_err(ControllerError::AddUsers)?;
        tracing::info!(tag = %self.tag, "Added {} new users", added);
        metrics::record_users(&self.tag, users.len());

        let context = Arc::new(NodeContext {
            tag: self.tag.clone(),
            core: self.core.clone(),
            panel: self.panel.clone(),
            cert: self.cert.clone(),
            ip_recorder: self.ip_recorder.clone(),
            limiter,
            config: self.config.clone(),
            node: ArcSwap::from_pointee(node),
            users: ArcSwap::from_pointee(users),
            traffic: DashMap::new(),
            unreported: DashMap::new(),
        });
        self.start_jobs(&context);
        self.context = Some(context);
        Ok(())
    }

    fn start_jobs(&mut self, context: &Arc<NodeContext>) {
        let node = context.node.load_full();
        for kind in JobKind::ALL {
            if !kind.enabled(&node, &self.config) {
                continue;
            }
            let interval = kind.interval(&node, &self.config);
            let ctx = context.clone();
            let task = match kind {
                JobKind::NodeInfoRefresh => spawn_job(kind, interval, ctx, |c| async move {
                    c.refresh_node_info().await
                }),
                JobKind::UserReport => {
                    spawn_job(kind, interval, ctx, |c| async move { c.report_users().await })
                }
                JobKind::CertRenewal => {
                    spawn_job(kind, interval, ctx, |c| async move { c.renew_cert().await })
                }
                JobKind::DynamicSpeedLimit => spawn_job(kind, interval, ctx, |c| async move {
                    c.adjust_speed_limits().await
                }),
                JobKind::OnlineIpReport => spawn_job(kind, interval, ctx, |c| async move {
                    c.report_online_ips().await
                }),
            };
            self.jobs.insert(kind, task);
        }
        tracing::info!(tag = %self.tag, jobs = ?self.jobs.running(), "Background jobs started");
    }

    /// Deregister the limiter, cancel every started job and remove the node
    /// from the engine if this controller registered it.
    ///
    /// Always returns `Ok`: shutdown must be completable whatever state
    /// startup left behind. Engine errors are logged. Calling it again is a
    /// no-op, and the controller may be started again afterwards.
    pub async fn close(&mut self) -> Result<(), ControllerError> {
        self.limiters.remove(&self.tag);
        let closed = self.jobs.close_all();
        self.context = None;

        if std::mem::take(&mut self.registered) {
            if let Err(e) = self.core.del_node(&self.tag).await {
                tracing::warn!(tag = %self.tag, error = %e, "Remove node from engine failed");
            }
        }
        tracing::info!(tag = %self.tag, jobs = closed, "Controller closed");
        Ok(())
    }
}

fn spawn_job<F, Fut>(
    kind: JobKind,
    interval: std::time::Duration,
    context: Arc<NodeContext>,
    run: F,
) -> PeriodicTask
where
    F: Fn(Arc<NodeContext>) -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), JobError>> + Send + 'static,
{
    PeriodicTask::start(kind.name(), interval, false, move || run(context.clone()))
}

#[async_trait]
impl Service for Controller {
    type Error = ControllerError;

    fn name(&self) -> &str {
        &self.tag
    }

    async fn start(&mut self) -> Result<(), ControllerError> {
        Controller::start(self).await
    }

    async fn close(&mut self) -> Result<(), ControllerError> {
        Controller::close(self).await
    }
}
