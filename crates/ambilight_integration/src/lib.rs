use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use shared::{
    domain::{Side, SourceTopology, ZoneSnapshot},
    error::FetchError,
    protocol::{AmbilightMode, ProcessedResponse, TopologyResponse},
};
use tokio::sync::OnceCell;
use tracing::{debug, info};
use url::Url;

pub const JOINTSPACE_PORT: u16 = 1925;
pub const DEFAULT_API_VERSION: u32 = 6;
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[async_trait]
pub trait ZoneColorSource: Send + Sync {
    /// Zone counts per side. Fetched once, then served from cache.
    async fn topology(&self) -> Result<SourceTopology, FetchError>;
    /// Current zone colors, fetched fresh on every call.
    async fn colors(&self) -> Result<ZoneSnapshot, FetchError>;
}

/// HTTP client for the ambilight endpoints of a Philips TV's JointSpace API.
pub struct JointSpaceClient {
    http: Client,
    base_url: Url,
    topology: OnceCell<SourceTopology>,
}

impl JointSpaceClient {
    pub fn new(tv_host: &str, api_version: u32) -> Result<Self, FetchError> {
        let base_url = Url::parse(&format!(
            "http://{tv_host}:{JOINTSPACE_PORT}/{api_version}/"
        ))
        .map_err(|err| FetchError::Malformed(format!("invalid TV address '{tv_host}': {err}")))?;
        Self::with_base_url(base_url, REQUEST_TIMEOUT)
    }

    pub fn with_base_url(mut base_url: Url, timeout: Duration) -> Result<Self, FetchError> {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| FetchError::Transport(err.to_string()))?;
        Ok(Self {
            http,
            base_url,
            topology: OnceCell::new(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub async fn mode(&self) -> Result<AmbilightMode, FetchError> {
        self.get_json("ambilight/mode").await
    }

    pub async fn set_mode(&self, mode: &str) -> Result<(), FetchError> {
        let url = self.endpoint("ambilight/mode")?;
        let response = self
            .http
            .post(url)
            .json(&AmbilightMode::new(mode))
            .send()
            .await
            .map_err(|err| FetchError::Transport(err.to_string()))?;
        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().as_u16()));
        }
        info!(mode, "ambilight: mode updated");
        Ok(())
    }

    fn endpoint(&self, path: &str) -> Result<Url, FetchError> {
        self.base_url
            .join(path)
            .map_err(|err| FetchError::Malformed(format!("invalid endpoint '{path}': {err}")))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, FetchError> {
        let url = self.endpoint(path)?;
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|err| FetchError::Transport(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        response
            .json::<T>()
            .await
            .map_err(|err| FetchError::Malformed(format!("{path}: {err}")))
    }
}

#[async_trait]
impl ZoneColorSource for JointSpaceClient {
    async fn topology(&self) -> Result<SourceTopology, FetchError> {
        let topology = self
            .topology
            .get_or_try_init(|| async {
                let response: TopologyResponse = self.get_json("ambilight/topology").await?;
                let topology = SourceTopology::from(response);
                info!(
                    left = topology.left,
                    top = topology.top,
                    right = topology.right,
                    bottom = topology.bottom,
                    "ambilight: topology discovered"
                );
                Ok::<_, FetchError>(topology)
            })
            .await?;
        Ok(*topology)
    }

    async fn colors(&self) -> Result<ZoneSnapshot, FetchError> {
        let topology = self.topology().await?;
        let response: ProcessedResponse = self.get_json("ambilight/processed").await?;
        let snapshot = ZoneSnapshot::from(response.layer1);
        check_topology(&snapshot, &topology)?;
        debug!(zones = snapshot.zone_count(), "ambilight: colors fetched");
        Ok(snapshot)
    }
}

/// Every side must carry exactly as many zones as the topology advertised.
pub fn check_topology(snapshot: &ZoneSnapshot, topology: &SourceTopology) -> Result<(), FetchError> {
    for side in Side::ALL {
        let expected = topology.count(side);
        let actual = snapshot.side(side).len();
        if expected != actual {
            return Err(FetchError::TopologyMismatch {
                side,
                expected,
                actual,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
