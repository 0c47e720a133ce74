//! State shared between a started controller and its background jobs.

use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;
use dashmap::DashMap;

use crate::cert::CertProvisioner;
use crate::config::ControllerConfig;
use crate::engine::{AddUsersParams, Core};
use crate::iprecorder::IpRecorder;
use crate::limiter::Limiter;
use crate::node::diff::diff_users;
use crate::node::error::JobError;
use crate::observability::metrics;
use crate::panel::{ControlPlane, NodeInfo, UserInfo, UserTraffic};
use crate::task::MAX_INTERVAL;

/// Everything a job run needs. Snapshots are swapped wholesale, never patched.
pub(crate) struct NodeContext {
    pub(crate) tag: String,
    pub(crate) core: Arc<dyn Core>,
    pub(crate) panel: Arc<dyn ControlPlane>,
    pub(crate) cert: Arc<dyn CertProvisioner>,
    pub(crate) ip_recorder: Arc<dyn IpRecorder>,
    pub(crate) limiter: Arc<Limiter>,
    pub(crate) config: Arc<ControllerConfig>,
    pub(crate) node: ArcSwap<NodeInfo>,
    pub(crate) users: ArcSwap<Vec<UserInfo>>,
    /// Bytes per user since the last dynamic speed-limit pass.
    pub(crate) traffic: DashMap<String, u64>,
    /// `(upload, download)` by uid read from the engine but not yet accepted
    /// by the panel.
    pub(crate) unreported: DashMap<i64, (u64, u64)>,
}

impl NodeContext {
    /// Re-fetch the descriptor and apply drift under the same tag.
    pub(crate) async fn refresh_node_info(&self) -> Result<(), JobError> {
        let latest = self.panel.get_node_info().await?;
        let current = self.node.load_full();
        if *current == latest {
            return Ok(());
        }

        if latest.rules != current.rules {
            self.limiter.update_rule(&latest.rules)?;
            tracing::info!(tag = %self.tag, "Node rules updated");
        }

        if !latest.same_setup(&current) {
            tracing::info!(tag = %self.tag, "Node config changed, re-registering");
            if latest.requires_cert() {
                self.cert.request_cert().await?;
            }
            if let Err(e) = self.core.del_node(&self.tag).await {
                tracing::warn!(tag = %self.tag, error = %e, "Remove old node failed");
            }
            self.core.add_node(&self.tag, &latest, &self.config).await?;

            let users = self.users.load_full();
            let added = self
                .core
                .add_users(AddUsersParams {
                    tag: &self.tag,
                    config: &self.config,
                    users: &users,
                    node: &latest,
                })
                .await?;
            tracing::info!(tag = %self.tag, "Added {} users after node change", added);
        }

        if latest.pull_interval != current.pull_interval
            || latest.push_interval != current.push_interval
        {
            tracing::info!(
                tag = %self.tag,
                pull = ?latest.pull_interval,
                push = ?latest.push_interval,
                "Panel intervals changed, applied on next start"
            );
        }

        self.node.store(Arc::new(latest));
        Ok(())
    }

    /// Report traffic upstream, then re-sync the cohort.
    ///
    /// Counters are reset on read; traffic from a failed push stays in
    /// `unreported` and goes out with the next report.
    pub(crate) async fn report_users(&self) -> Result<(), JobError> {
        let users = self.users.load_full();
        let track = self.config.limit.enable_dynamic_speed_limit;

        for user in users.iter() {
            let (upload, download) = self.core.user_traffic(&self.tag, &user.uuid, true).await;
            if upload == 0 && download == 0 {
                continue;
            }
            if track {
                *self.traffic.entry(user.uuid.clone()).or_insert(0) += upload + download;
            }
            let mut pending = self.unreported.entry(user.id).or_insert((0, 0));
            pending.0 += upload;
            pending.1 += download;
        }

        let mut report: Vec<UserTraffic> = self
            .unreported
            .iter()
            .map(|e| UserTraffic {
                uid: *e.key(),
                upload: e.value().0,
                download: e.value().1,
            })
            .collect();
        report.sort_by_key(|t| t.uid);

        let reported = if report.is_empty() {
            Ok(())
        } else {
            let result = self.panel.report_user_traffic(&report).await;
            match &result {
                Ok(()) => {
                    for t in &report {
                        self.unreported.remove(&t.uid);
                    }
                    tracing::debug!(tag = %self.tag, users = report.len(), "Traffic reported");
                }
                Err(e) => tracing::warn!(
                    tag = %self.tag,
                    error = %e,
                    users = report.len(),
                    "Report user traffic failed, retrying next run"
                ),
            }
            result
        };

        self.sync_users().await?;
        reported?;
        Ok(())
    }

    async fn sync_users(&self) -> Result<(), JobError> {
        let latest = self.panel.get_user_list().await?;
        if latest.is_empty() {
            tracing::warn!(tag = %self.tag, "Panel returned no users, keeping current list");
            return Ok(());
        }

        let current = self.users.load_full();
        let (deleted, added) = diff_users(&current, &latest);
        if deleted.is_empty() && added.is_empty() {
            return Ok(());
        }

        if !deleted.is_empty() {
            self.core.del_users(&self.tag, &deleted).await?;
        }
        if !added.is_empty() {
            let node = self.node.load_full();
            self.core
                .add_users(AddUsersParams {
                    tag: &self.tag,
                    config: &self.config,
                    users: &added,
                    node: &node,
                })
                .await?;
        }
        self.limiter.update_users(&deleted, &added);
        for user in &deleted {
            self.traffic.remove(&user.uuid);
        }

        metrics::record_users(&self.tag, latest.len());
        self.users.store(Arc::new(latest));
        tracing::info!(
            tag = %self.tag,
            deleted = deleted.len(),
            added = added.len(),
            "User list updated"
        );
        Ok(())
    }

    pub(crate) async fn renew_cert(&self) -> Result<(), JobError> {
        self.cert.renew_cert().await?;
        Ok(())
    }

    /// Limit users whose traffic since the last pass crossed the threshold.
    pub(crate) async fn adjust_speed_limits(&self) -> Result<(), JobError> {
        let config = &self.config.limit.dynamic_speed_limit;
        let now = Instant::now();
        self.limiter.purge_expired(now);

        let expires_at = now
            .checked_add(config.expire().min(MAX_INTERVAL))
            .unwrap_or(now);
        let mut limited = 0usize;
        self.traffic.retain(|uuid, bytes| {
            if *bytes >= config.traffic {
                self.limiter
                    .add_dynamic_speed_limit(uuid, config.speed_limit, expires_at);
                limited += 1;
            }
            false
        });

        if limited > 0 {
            tracing::info!(
                tag = %self.tag,
                users = limited,
                speed_limit = config.speed_limit,
                "Dynamic speed limit applied"
            );
        }
        Ok(())
    }

    pub(crate) async fn report_online_ips(&self) -> Result<(), JobError> {
        let online = self.limiter.take_online_users();
        if online.is_empty() {
            return Ok(());
        }
        self.ip_recorder.sync_ips(&self.tag, &online).await?;
        tracing::debug!(tag = %self.tag, ips = online.len(), "Online IPs reported");
        Ok(())
    }
}
