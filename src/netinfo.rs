//! Public network identity lookup.
//!
//! Chains three providers: ipify for the public IP, ipapi.co for
//! geolocation and ISP details, and Cloudflare DNS-over-HTTPS as a resolver
//! health probe. Any link failing fails the whole lookup; a partial record
//! is never returned.

use log::debug;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::errors::DiagError;

/// Resolver label plus a coarse responsiveness verdict.
#[derive(Debug, Clone, Serialize)]
pub struct DnsInfo {
    pub resolver: String,
    pub response_time: String,
}

/// The client's public identity as the wider internet sees it.
#[derive(Debug, Clone, Serialize)]
pub struct NetworkInfo {
    pub ip: String,
    pub city: String,
    pub region: String,
    pub country: String,
    pub country_code: String,
    pub isp: String,
    pub timezone: String,
    pub latitude: f64,
    pub longitude: f64,
    pub asn: String,
    pub dns: DnsInfo,
}

#[derive(Deserialize)]
struct IpifyResponse {
    ip: String,
}

#[derive(Deserialize)]
struct IpapiResponse {
    #[serde(default)]
    city: String,
    #[serde(default)]
    region: String,
    #[serde(default)]
    country_name: String,
    #[serde(default)]
    country_code: String,
    #[serde(default)]
    org: String,
    #[serde(default)]
    timezone: String,
    #[serde(default)]
    latitude: f64,
    #[serde(default)]
    longitude: f64,
    #[serde(default)]
    asn: String,
}

#[derive(Deserialize)]
struct DnsQueryResponse {
    #[serde(rename = "Answer")]
    answer: Option<serde_json::Value>,
}

/// Fetches [`NetworkInfo`] once per session.
#[derive(Debug, Clone)]
pub struct NetworkInfoProvider {
    client: Client,
}

impl NetworkInfoProvider {
    pub fn new(client: Client) -> Self {
        NetworkInfoProvider { client }
    }

    pub async fn fetch(&self) -> Result<NetworkInfo, DiagError> {
        let ip = self.public_ip().await?;
        debug!("public ip resolved: {}", ip);
        let details = self.ip_details(&ip).await?;
        let dns = self.dns_probe().await?;

        Ok(NetworkInfo {
            ip,
            city: details.city,
            region: details.region,
            country: details.country_name,
            country_code: details.country_code,
            isp: details.org,
            timezone: details.timezone,
            latitude: details.latitude,
            longitude: details.longitude,
            asn: details.asn,
            dns,
        })
    }

    async fn public_ip(&self) -> Result<String, DiagError> {
        let response: IpifyResponse = self
            .client
            .get("https://api.ipify.org?format=json")
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| {
                DiagError::network_with_source("fetching public ip", e)
            })?
            .json()
            .await
            .map_err(|e| {
                DiagError::network_with_source("decoding public ip", e)
            })?;

        Ok(response.ip)
    }

    async fn ip_details(&self, ip: &str) -> Result<IpapiResponse, DiagError> {
        let url = format!("https://ipapi.co/{}/json/", ip);
        self.client
            .get(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| {
                DiagError::network_with_source("fetching ip details", e)
            })?
            .json()
            .await
            .map_err(|e| {
                DiagError::network_with_source("decoding ip details", e)
            })
    }

    async fn dns_probe(&self) -> Result<DnsInfo, DiagError> {
        let response: DnsQueryResponse = self
            .client
            .get("https://cloudflare-dns.com/dns-query?name=google.com&type=A")
            .header("accept", "application/dns-json")
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| {
                DiagError::network_with_source("probing dns resolver", e)
            })?
            .json()
            .await
            .map_err(|e| {
                DiagError::network_with_source("decoding dns probe", e)
            })?;

        Ok(DnsInfo {
            resolver: "Cloudflare (1.1.1.1)".into(),
            response_time: if response.answer.is_some() {
                "Fast".into()
            } else {
                "Unknown".into()
            },
        })
    }
}
