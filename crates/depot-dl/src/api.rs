//! Registry metadata and archive lookups.

use serde::{de::DeserializeOwned, Deserialize};
use tracing::debug;
use ureq::{http::Response, Body};

use crate::{
    endpoints::RegistryEndpoints,
    error::{ApiError, Result},
    http_client::{ClientConfig, HttpClient},
};

/// Upper bound on a buffered archive body.
pub const MAX_ARCHIVE_SIZE: u64 = 512 * 1024 * 1024;

/// Descriptive metadata of a package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageInfo {
    /// Canonical name as the registry spells it.
    pub name: String,
    pub description: Option<String>,
    pub documentation: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionInfo {
    pub license: Option<String>,
}

/// The registry's HTTP surface. Calls block; no retries are attempted.
pub trait RegistryApi: Send + Sync {
    fn fetch_package_info(&self, name: &str) -> Result<PackageInfo>;

    fn fetch_version_info(&self, name: &str, version: &str) -> Result<VersionInfo>;

    /// Downloads the whole archive into memory. `checksum` only feeds download URL
    /// templates; verification is up to the caller.
    fn fetch_archive(&self, name: &str, version: &str, checksum: &str) -> Result<Vec<u8>>;
}

#[derive(Deserialize)]
struct CrateResponse {
    #[serde(rename = "crate")]
    krate: CrateData,
}

#[derive(Deserialize)]
struct CrateData {
    id: String,
    description: Option<String>,
    documentation: Option<String>,
}

#[derive(Deserialize)]
struct VersionResponse {
    version: VersionData,
}

#[derive(Deserialize)]
struct VersionData {
    license: Option<String>,
}

pub struct HttpRegistryClient {
    http: HttpClient,
    endpoints: RegistryEndpoints,
}

impl HttpRegistryClient {
    pub fn new(config: &ClientConfig, endpoints: RegistryEndpoints) -> Self {
        Self {
            http: HttpClient::new(config),
            endpoints,
        }
    }

    fn get(&self, url: &str) -> Result<Response<Body>> {
        debug!(url, "GET");
        let resp = self.http.get(url).call()?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ApiError::from_status(status.as_u16(), url));
        }
        Ok(resp)
    }

    fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let mut resp = self.get(url)?;
        let bytes = resp.body_mut().read_to_vec()?;
        serde_json::from_slice(&bytes).map_err(|err| {
            ApiError::Malformed {
                url: url.to_string(),
                reason: err.to_string(),
            }
        })
    }
}

impl RegistryApi for HttpRegistryClient {
    fn fetch_package_info(&self, name: &str) -> Result<PackageInfo> {
        let resp: CrateResponse = self.get_json(&self.endpoints.package_url(name))?;
        Ok(PackageInfo {
            name: resp.krate.id,
            description: resp.krate.description,
            documentation: resp.krate.documentation,
        })
    }

    fn fetch_version_info(&self, name: &str, version: &str) -> Result<VersionInfo> {
        let resp: VersionResponse = self.get_json(&self.endpoints.version_url(name, version))?;
        Ok(VersionInfo {
            license: resp.version.license,
        })
    }

    fn fetch_archive(&self, name: &str, version: &str, checksum: &str) -> Result<Vec<u8>> {
        let url = self.endpoints.download_url(name, version, checksum);
        let mut resp = self.get(&url)?;
        let bytes = resp
            .body_mut()
            .with_config()
            .limit(MAX_ARCHIVE_SIZE)
            .read_to_vec()?;
        Ok(bytes)
    }
}
