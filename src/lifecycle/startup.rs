//! Startup assembly.
//!
//! # Responsibilities
//! - Build one controller per configured node
//! - Wire the shared engine and limiter registry into each
//! - Pick the IP recorder each node's config asks for

use std::sync::Arc;

use thiserror::Error;

use crate::config::{AgentConfig, RecorderType};
use crate::engine::Core;
use crate::iprecorder::{HttpRecorder, RecorderError};
use crate::limiter::LimiterRegistry;
use crate::node::Controller;
use crate::panel::{PanelClient, PanelError};

/// Errors raised while assembling controllers.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("node #{index}: create panel client: {source}")]
    Panel {
        index: usize,
        #[source]
        source: PanelError,
    },

    #[error("node #{index}: create ip recorder: {source}")]
    Recorder {
        index: usize,
        #[source]
        source: RecorderError,
    },
}

/// Build unstarted controllers for every node in `config`.
pub fn build_controllers(
    config: &AgentConfig,
    core: Arc<dyn Core>,
    limiters: Arc<LimiterRegistry>,
) -> Result<Vec<Controller>, StartupError> {
    let mut controllers = Vec::with_capacity(config.nodes.len());
    for (index, node) in config.nodes.iter().enumerate() {
        let panel = PanelClient::new(&node.api)
            .map_err(|source| StartupError::Panel { index, source })?;

        let mut controller = Controller::new(
            core.clone(),
            Arc::new(panel),
            limiters.clone(),
            node.controller.clone(),
        );

        let recorder = &node.controller.limit.ip_recorder;
        if node.controller.limit.enable_ip_recorder && recorder.recorder_type == RecorderType::Http {
            let http = HttpRecorder::new(recorder)
                .map_err(|source| StartupError::Recorder { index, source })?;
            controller = controller.with_ip_recorder(Arc::new(http));
        }

        tracing::debug!(
            index,
            api_host = %node.api.api_host,
            node_id = node.api.node_id,
            node_type = %node.api.node_type,
            "Controller created"
        );
        controllers.push(controller);
    }
    Ok(controllers)
}
