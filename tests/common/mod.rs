//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use node_agent::cert::{CertError, CertProvisioner, CertResult};
use node_agent::config::ControllerConfig;
use node_agent::engine::{AddUsersParams, Core, CoreError, CoreResult, MemoryCore};
use node_agent::limiter::LimiterRegistry;
use node_agent::node::Controller;
use node_agent::panel::{
    ControlPlane, NodeInfo, NodeType, OnlineUser, PanelError, PanelResult, Rules, UserInfo,
    UserTraffic,
};

pub fn node_info(id: u32, node_type: NodeType, tls: bool) -> NodeInfo {
    NodeInfo {
        id,
        node_type,
        host: "edge.example".into(),
        port: 443,
        network: "tcp".into(),
        server_name: String::new(),
        tls,
        cipher: None,
        server_key: None,
        up_mbps: 0,
        down_mbps: 0,
        rules: Rules::default(),
        push_interval: Duration::from_secs(10),
        pull_interval: Duration::from_secs(20),
    }
}

pub fn users(count: i64) -> Vec<UserInfo> {
    (1..=count).map(user).collect()
}

pub fn user(id: i64) -> UserInfo {
    UserInfo {
        id,
        uuid: format!("u{id}"),
        speed_limit: 0,
        device_limit: 0,
    }
}

fn unavailable() -> PanelError {
    PanelError::Status {
        code: 503,
        body: "unavailable".into(),
    }
}

/// Scriptable control plane.
pub struct MockPanel {
    host: String,
    node: Mutex<NodeInfo>,
    users: Mutex<Vec<UserInfo>>,
    pub fail_node: AtomicBool,
    pub fail_users: AtomicBool,
    pub fail_reports: AtomicBool,
    pub node_calls: AtomicUsize,
    pub user_calls: AtomicUsize,
    pub traffic: Mutex<Vec<UserTraffic>>,
    pub online: Mutex<Vec<OnlineUser>>,
}

impl MockPanel {
    pub fn new(host: &str, node: NodeInfo, users: Vec<UserInfo>) -> Self {
        Self {
            host: host.to_string(),
            node: Mutex::new(node),
            users: Mutex::new(users),
            fail_node: AtomicBool::new(false),
            fail_users: AtomicBool::new(false),
            fail_reports: AtomicBool::new(false),
            node_calls: AtomicUsize::new(0),
            user_calls: AtomicUsize::new(0),
            traffic: Mutex::new(Vec::new()),
            online: Mutex::new(Vec::new()),
        }
    }

    pub fn set_node(&self, node: NodeInfo) {
        *self.node.lock().unwrap() = node;
    }

    pub fn set_users(&self, users: Vec<UserInfo>) {
        *self.users.lock().unwrap() = users;
    }
}

#[async_trait]
impl ControlPlane for MockPanel {
    fn host(&self) -> &str {
        &self.host
    }

    async fn get_node_info(&self) -> PanelResult<NodeInfo> {
        self.node_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_node.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(self.node.lock().unwrap().clone())
    }

    async fn get_user_list(&self) -> PanelResult<Vec<UserInfo>> {
        self.user_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_users.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(self.users.lock().unwrap().clone())
    }

    async fn report_user_traffic(&self, traffic: &[UserTraffic]) -> PanelResult<()> {
        if self.fail_reports.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        self.traffic.lock().unwrap().extend_from_slice(traffic);
        Ok(())
    }

    async fn report_online_users(&self, users: &[OnlineUser]) -> PanelResult<()> {
        self.online.lock().unwrap().extend_from_slice(users);
        Ok(())
    }
}

/// Engine with failure injection on top of the bookkeeping engine.
#[derive(Default)]
pub struct MockCore {
    pub inner: MemoryCore,
    pub fail_add_node: AtomicBool,
    pub fail_add_users: AtomicBool,
    pub add_node_calls: AtomicUsize,
}

#[async_trait]
impl Core for MockCore {
    async fn add_node(&self, tag: &str, node: &NodeInfo, config: &ControllerConfig) -> CoreResult<()> {
        self.add_node_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_add_node.load(Ordering::SeqCst) {
            return Err(CoreError::Rejected("port in use".into()));
        }
        self.inner.add_node(tag, node, config).await
    }

    async fn del_node(&self, tag: &str) -> CoreResult<()> {
        self.inner.del_node(tag).await
    }

    async fn add_users(&self, params: AddUsersParams<'_>) -> CoreResult<usize> {
        if self.fail_add_users.load(Ordering::SeqCst) {
            return Err(CoreError::Rejected("bad user".into()));
        }
        self.inner.add_users(params).await
    }

    async fn del_users(&self, tag: &str, users: &[UserInfo]) -> CoreResult<()> {
        self.inner.del_users(tag, users).await
    }

    async fn user_traffic(&self, tag: &str, uuid: &str, reset: bool) -> (u64, u64) {
        self.inner.user_traffic(tag, uuid, reset).await
    }
}

/// Certificate provisioner that counts calls.
#[derive(Default)]
pub struct MockCert {
    pub fail: AtomicBool,
    pub requests: AtomicUsize,
    pub renewals: AtomicUsize,
}

#[async_trait]
impl CertProvisioner for MockCert {
    async fn request_cert(&self) -> CertResult<()> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(CertError::UnsupportedMode("http"));
        }
        Ok(())
    }

    async fn renew_cert(&self) -> CertResult<()> {
        self.renewals.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// One node's collaborators wired together.
pub struct Harness {
    pub panel: Arc<MockPanel>,
    pub core: Arc<MockCore>,
    pub cert: Arc<MockCert>,
    pub limiters: Arc<LimiterRegistry>,
}

impl Harness {
    pub fn new(node: NodeInfo, users: Vec<UserInfo>) -> Self {
        Self {
            panel: Arc::new(MockPanel::new("panel.example", node, users)),
            core: Arc::new(MockCore::default()),
            cert: Arc::new(MockCert::default()),
            limiters: Arc::new(LimiterRegistry::new()),
        }
    }

    pub fn controller(&self, config: ControllerConfig) -> Controller {
        Controller::new(
            self.core.clone(),
            self.panel.clone(),
            self.limiters.clone(),
            config,
        )
        .with_cert_provisioner(self.cert.clone())
    }
}

/// A request captured by the programmable backend.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub request_line: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Canned response for the programmable backend.
pub struct MockResponse {
    pub status: u16,
    pub headers: Vec<(&'static str, String)>,
    pub body: String,
}

impl MockResponse {
    pub fn json(body: &str) -> Self {
        Self {
            status: 200,
            headers: Vec::new(),
            body: body.to_string(),
        }
    }
}

/// Start an HTTP backend on an ephemeral port that answers with `f`.
pub async fn start_programmable_backend<F>(f: F) -> SocketAddr
where
    F: Fn(RecordedRequest) -> MockResponse + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let Some(request) = read_request(&mut socket).await else {
                            return;
                        };
                        let response = f(request);
                        let reason = match response.status {
                            200 => "OK",
                            304 => "Not Modified",
                            404 => "Not Found",
                            500 => "Internal Server Error",
                            _ => "Unknown",
                        };
                        let mut raw = format!(
                            "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nConnection: close\r\n",
                            response.status,
                            reason,
                            response.body.len()
                        );
                        for (name, value) in &response.headers {
                            raw.push_str(&format!("{}: {}\r\n", name, value));
                        }
                        raw.push_str("\r\n");
                        raw.push_str(&response.body);
                        let _ = socket.write_all(raw.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> Option<RecordedRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.split("\r\n").filter(|l| !l.is_empty());
    let request_line = lines.next()?.to_string();
    let headers: Vec<(String, String)> = lines
        .filter_map(|l| l.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect();

    let content_length = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);
    while buf.len() < header_end + content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let body = String::from_utf8_lossy(&buf[header_end..]).to_string();

    Some(RecordedRequest {
        request_line,
        headers,
        body,
    })
}
