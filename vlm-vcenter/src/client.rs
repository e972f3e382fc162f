use std::{collections::BTreeMap, time::Duration};

use reqwest::{Client, ClientBuilder, Method, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::debug;
use validator::Validate;

use vlm_slo::{errors, Result};

use crate::{
    DiskEntry, Hypervisor, PowerAction, PowerCall, PowerState, VmResources,
};

const SESSION_HEADER: &str = "vmware-api-session-id";

const MIB: i64 = 1024 * 1024;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct VcenterConfig {
    /// Base endpoint, e.g. "https://vcenter.lab.example.org".
    #[validate(url)]
    pub endpoint: String,
    pub username: String,
    pub password: String,
    /// Seconds, applied to every request.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    /// Lab managers commonly run self-signed certificates.
    #[serde(default)]
    pub danger_accept_invalid_certs: bool,
}

fn default_timeout() -> u64 {
    30
}

/// vSphere Automation REST adapter. The session token is acquired lazily,
/// shared across concurrent callers, and renewed once per call when the
/// manager answers 401.
#[derive(Debug)]
pub struct VcenterClient {
    config: VcenterConfig,
    http: Client,
    session: RwLock<Option<String>>,
}

impl VcenterClient {
    pub fn new(config: VcenterConfig) -> Result<Self> {
        let http = ClientBuilder::new()
            .timeout(Duration::from_secs(config.timeout))
            .danger_accept_invalid_certs(config.danger_accept_invalid_certs)
            .build()
            .map_err(errors::any)?;
        Ok(Self {
            config,
            http,
            session: RwLock::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.endpoint.trim_end_matches('/'), path)
    }

    async fn session_token(&self) -> Result<String> {
        if let Some(token) = self.session.read().await.clone() {
            return Ok(token);
        }
        let mut slot = self.session.write().await;
        // Re-check under the write lock: concurrent first calls must
        // share one session instead of each opening their own.
        if let Some(token) = slot.clone() {
            return Ok(token);
        }
        let token = self.login().await?;
        *slot = Some(token.clone());
        Ok(token)
    }

    /// Raw login call. Callers hold the session lock while awaiting this.
    async fn login(&self) -> Result<String> {
        let response = self
            .http
            .post(self.url("/api/session"))
            .basic_auth(&self.config.username, Some(&self.config.password))
            .send()
            .await
            .map_err(|err| errors::gateway(&err))?;
        read_json(response).await
    }

    /// Replaces the session after a 401, unless another caller already
    /// swapped the stale token out; the fresh one is then reused as is.
    async fn renew(&self, stale: &str) -> Result<String> {
        let mut slot = self.session.write().await;
        match slot.clone() {
            Some(token) if token != stale => Ok(token),
            _ => {
                let token = self.login().await?;
                *slot = Some(token.clone());
                Ok(token)
            }
        }
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Response> {
        let token = self.session_token().await?;
        let response =
            self.dispatch(&token, method.clone(), path, body).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }
        debug!("session expired, renewing");
        let token = self.renew(&token).await?;
        self.dispatch(&token, method, path, body).await
    }

    async fn dispatch(
        &self,
        token: &str,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Response> {
        let mut builder = self
            .http
            .request(method, self.url(path))
            .header(SESSION_HEADER, token);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        builder.send().await.map_err(|err| errors::gateway(&err))
    }
}

#[async_trait::async_trait]
impl Hypervisor for VcenterClient {
    async fn power_state(&self, vm_ref: &str) -> Result<PowerState> {
        let path = format!("/api/vcenter/vm/{}/power", vm_ref);
        let response = self.send(Method::GET, &path, None).await?;
        let info: PowerInfo = read_json(response).await?;
        Ok(info.state)
    }

    async fn resource_usage(&self, vm_ref: &str) -> Result<VmResources> {
        let path = format!("/api/vcenter/vm/{}", vm_ref);
        let response = self.send(Method::GET, &path, None).await?;
        let info: VmInfo = read_json(response).await?;
        Ok(info.into())
    }

    async fn power_action(
        &self,
        vm_ref: &str,
        action: PowerAction,
    ) -> Result<PowerCall> {
        let path = format!(
            "/api/vcenter/vm/{}/power?action={}",
            vm_ref,
            action.as_str()
        );
        let response = self.send(Method::POST, &path, None).await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_else(|_| String::new());
        power_call_from(status, body)
    }

    async fn set_cpu(&self, vm_ref: &str, count: i64) -> Result<()> {
        let (method, path) = hardware_update(vm_ref, "cpu");
        let body = json!({ "count": count });
        let response = self.send(method, &path, Some(&body)).await?;
        expect_success(response).await
    }

    async fn set_memory(&self, vm_ref: &str, size_mib: i64) -> Result<()> {
        let (method, path) = hardware_update(vm_ref, "memory");
        let body = json!({ "size_MiB": size_mib });
        let response = self.send(method, &path, Some(&body)).await?;
        expect_success(response).await
    }

    async fn set_network_ports(
        &self,
        network_ref: &str,
        count: i64,
    ) -> Result<()> {
        let (method, path) = ports_update(network_ref);
        let body = json!({ "count": count });
        let response = self.send(method, &path, Some(&body)).await?;
        expect_success(response).await
    }
}

#[derive(Debug, Deserialize)]
struct PowerInfo {
    state: PowerState,
}

#[derive(Debug, Deserialize)]
struct VmInfo {
    cpu: CpuInfo,
    memory: MemoryInfo,
    #[serde(default)]
    disks: BTreeMap<String, DiskInfo>,
}

#[derive(Debug, Deserialize)]
struct CpuInfo {
    count: i64,
}

#[derive(Debug, Deserialize)]
struct MemoryInfo {
    #[serde(rename = "size_MiB")]
    size_mib: i64,
}

#[derive(Debug, Deserialize)]
struct DiskInfo {
    /// Bytes. Absent for backings the manager cannot size.
    #[serde(default)]
    capacity: Option<i64>,
}

impl From<VmInfo> for VmResources {
    fn from(info: VmInfo) -> Self {
        let disks = info
            .disks
            .into_iter()
            .map(|(key, disk)| DiskEntry {
                key,
                capacity: disk.capacity.unwrap_or(0) / MIB,
            })
            .collect();
        Self {
            cpu_count: info.cpu.count,
            memory_mib: info.memory.size_mib,
            disks,
        }
    }
}

/// Hardware updates go out as PATCH; the Automation API does not route
/// PUT on these paths.
fn hardware_update(vm_ref: &str, resource: &str) -> (Method, String) {
    (
        Method::PATCH,
        format!("/api/vcenter/vm/{}/hardware/{}", vm_ref, resource),
    )
}

fn ports_update(network_ref: &str) -> (Method, String) {
    (
        Method::PATCH,
        format!("/api/vcenter/network/{}/ports", network_ref),
    )
}

fn power_call_from(status: StatusCode, body: String) -> Result<PowerCall> {
    if status.is_success() {
        return Ok(PowerCall::Completed);
    }
    if status == StatusCode::BAD_REQUEST {
        return Ok(PowerCall::ValidationRejected(body));
    }
    Err(errors::gateway(&format!("power call {}: {}", status, body)))
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|err| errors::gateway(&err))?;
    if !status.is_success() {
        return Err(errors::gateway(&format!("{}: {}", status, body)));
    }
    serde_json::from_str(&body).map_err(|err| errors::gateway(&err))
}

async fn expect_success(response: Response) -> Result<()> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_else(|_| String::new());
    Err(errors::gateway(&format!("{}: {}", status, body)))
}
