//! HTTP client for the panel's UniProxy API.
//!
//! # Responsibilities
//! - Fetch node descriptor and user list
//! - Push traffic and online-user reports
//! - Cache responses by ETag

use std::collections::BTreeMap;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use reqwest::header::{ETAG, IF_NONE_MATCH};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

use crate::config::ApiConfig;
use crate::panel::types::{NodeInfoResponse, UserListResponse};
use crate::panel::{
    ControlPlane, NodeInfo, NodeType, OnlineUser, PanelError, PanelResult, UserInfo, UserTraffic,
};

struct Cached<T> {
    etag: String,
    value: T,
}

/// Panel API client bound to one node.
pub struct PanelClient {
    http: reqwest::Client,
    host: String,
    base: Url,
    token: String,
    node_id: u32,
    node_type: NodeType,
    node_cache: ArcSwapOption<Cached<NodeInfo>>,
    user_cache: ArcSwapOption<Cached<Vec<UserInfo>>>,
}

impl PanelClient {
    /// Create a client from the node's API configuration.
    pub fn new(config: &ApiConfig) -> PanelResult<Self> {
        let base = Url::parse(&format!(
            "{}/api/v1/server/UniProxy/",
            config.api_host.trim_end_matches('/')
        ))?;
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            http,
            host: config.api_host.clone(),
            base,
            token: config.api_key.clone(),
            node_id: config.node_id,
            node_type: config.node_type,
            node_cache: ArcSwapOption::empty(),
            user_cache: ArcSwapOption::empty(),
        })
    }

    fn endpoint(&self, name: &str) -> PanelResult<Url> {
        Ok(self.base.join(name)?)
    }

    fn with_node_query(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.query(&[
            ("node_type", self.node_type.as_str().to_string()),
            ("node_id", self.node_id.to_string()),
            ("token", self.token.clone()),
        ])
    }

    /// GET with ETag revalidation against `cache`.
    async fn get_cached<R, T>(
        &self,
        name: &str,
        cache: &ArcSwapOption<Cached<T>>,
        convert: impl FnOnce(R) -> T + Send,
    ) -> PanelResult<T>
    where
        R: DeserializeOwned + Send,
        T: Clone + Send + Sync,
    {
        let cached = cache.load_full();
        let mut builder = self.with_node_query(self.http.get(self.endpoint(name)?));
        if let Some(cached) = cached.as_ref() {
            builder = builder.header(IF_NONE_MATCH, cached.etag.as_str());
        }

        let response = builder.send().await?;
        if response.status() == StatusCode::NOT_MODIFIED {
            if let Some(cached) = cached {
                tracing::debug!(endpoint = name, "Panel response not modified");
                return Ok(cached.value.clone());
            }
        }

        let response = check_status(response).await?;
        let etag = response
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let body = response.bytes().await?;
        let value = convert(serde_json::from_slice::<R>(&body)?);

        match etag {
            Some(etag) => cache.store(Some(Arc::new(Cached {
                etag,
                value: value.clone(),
            }))),
            None => cache.store(None),
        }
        Ok(value)
    }

    async fn post<B: serde::Serialize + Sync>(&self, name: &str, body: &B) -> PanelResult<()> {
        let response = self
            .with_node_query(self.http.post(self.endpoint(name)?))
            .json(body)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }
}

async fn check_status(response: Response) -> PanelResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(PanelError::Status {
        code: status.as_u16(),
        body,
    })
}

#[async_trait]
impl ControlPlane for PanelClient {
    fn host(&self) -> &str {
        &self.host
    }

    async fn get_node_info(&self) -> PanelResult<NodeInfo> {
        let (id, node_type) = (self.node_id, self.node_type);
        self.get_cached("config", &self.node_cache, |resp: NodeInfoResponse| {
            resp.into_node_info(id, node_type)
        })
        .await
    }

    async fn get_user_list(&self) -> PanelResult<Vec<UserInfo>> {
        self.get_cached("user", &self.user_cache, |resp: UserListResponse| resp.users)
            .await
    }

    async fn report_user_traffic(&self, traffic: &[UserTraffic]) -> PanelResult<()> {
        let body: BTreeMap<i64, [u64; 2]> = traffic
            .iter()
            .map(|t| (t.uid, [t.upload, t.download]))
            .collect();
        self.post("push", &body).await
    }

    async fn report_online_users(&self, users: &[OnlineUser]) -> PanelResult<()> {
        let mut body: BTreeMap<i64, Vec<String>> = BTreeMap::new();
        for user in users {
            body.entry(user.uid).or_default().push(user.ip.clone());
        }
        self.post("alive", &body).await
    }
}
