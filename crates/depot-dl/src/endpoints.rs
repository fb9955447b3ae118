use depot_utils::path::shard_prefix;

use crate::error::{ApiError, Result};

const TEMPLATE_MARKERS: [&str; 5] = [
    "{crate}",
    "{version}",
    "{prefix}",
    "{lowerprefix}",
    "{sha256-checksum}",
];

/// Where package metadata and archives live on the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEndpoints {
    api_base: String,
    download: String,
}

impl RegistryEndpoints {
    /// `api_base` serves `{base}/{name}` and `{base}/{name}/{version}`; `download` is either a
    /// plain base or a template with `{crate}`-style markers.
    pub fn new(api_base: &str, download: &str) -> Result<Self> {
        for url in [api_base, download] {
            url::Url::parse(url).map_err(|source| {
                ApiError::InvalidUrl {
                    url: url.to_string(),
                    source,
                }
            })?;
        }

        Ok(Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            download: download.to_string(),
        })
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    pub fn package_url(&self, name: &str) -> String {
        format!("{}/{name}", self.api_base)
    }

    pub fn version_url(&self, name: &str, version: &str) -> String {
        format!("{}/{name}/{version}", self.api_base)
    }

    pub fn download_url(&self, name: &str, version: &str, checksum: &str) -> String {
        if !TEMPLATE_MARKERS.iter().any(|m| self.download.contains(m)) {
            return format!(
                "{}/{name}/{version}/download",
                self.download.trim_end_matches('/')
            );
        }

        let prefix = shard_prefix(name);
        self.download
            .replace("{crate}", name)
            .replace("{version}", version)
            .replace("{lowerprefix}", &prefix.to_lowercase())
            .replace("{prefix}", &prefix)
            .replace("{sha256-checksum}", checksum)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_download_base() {
        let endpoints = RegistryEndpoints::new(
            "https://crates.io/api/v1/crates/",
            "https://crates.io/api/v1/crates",
        )
        .unwrap();

        assert_eq!(
            endpoints.package_url("serde"),
            "https://crates.io/api/v1/crates/serde"
        );
        assert_eq!(
            endpoints.version_url("serde", "1.0.0"),
            "https://crates.io/api/v1/crates/serde/1.0.0"
        );
        assert_eq!(
            endpoints.download_url("serde", "1.0.0", "abc"),
            "https://crates.io/api/v1/crates/serde/1.0.0/download"
        );
    }

    #[test]
    fn test_download_template() {
        let endpoints = RegistryEndpoints::new(
            "https://crates.io/api/v1/crates",
            "https://static.example/{lowerprefix}/{crate}/{crate}-{version}.crate?h={sha256-checksum}",
        )
        .unwrap();

        assert_eq!(
            endpoints.download_url("Inflector", "0.11.4", "ff00"),
            "https://static.example/in/fl/Inflector/Inflector-0.11.4.crate?h=ff00"
        );
    }

    #[test]
    fn test_invalid_url() {
        assert!(matches!(
            RegistryEndpoints::new("not a url", "https://x.example"),
            Err(ApiError::InvalidUrl { .. })
        ));
    }
}
