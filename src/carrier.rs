//! Live delivery status from the carrier's global tracking API.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::CarrierError;
use crate::model::{DeliveryStatus, TrackingIdChange};

/// Maximum times a renumbered tracking id is followed before giving up.
pub const MAX_REDIRECT_DEPTH: u32 = 3;

/// Fetches the current delivery status for a tracking id.
///
/// When the carrier reports a renumbered id, the rename is pushed onto
/// `changes` (request-scoped, supplied by the caller) and the new id is
/// queried, up to [`MAX_REDIRECT_DEPTH`] hops.
#[async_trait]
pub trait CarrierClient: Send + Sync {
    async fn fetch_status(
        &self,
        tracking_id: &str,
        depth: u32,
        changes: &mut Vec<TrackingIdChange>,
    ) -> Result<DeliveryStatus, CarrierError>;
}

/// Carrier client for the Cainiao global tracking endpoint.
pub struct CainiaoClient {
    client: reqwest::Client,
    endpoint: String,
}

impl CainiaoClient {
    pub fn new(endpoint: String, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            endpoint,
        }
    }

    async fn fetch_module(&self, tracking_id: &str) -> Result<TraceModule, CarrierError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("mailNos", tracking_id),
                ("lang", "en-US"),
                ("language", "en-US"),
            ])
            .send()
            .await
            .map_err(|e| CarrierError::Fetch(e.to_string()))?;

        let body: DetailResponse = response
            .json()
            .await
            .map_err(|e| CarrierError::Fetch(format!("invalid carrier response: {e}")))?;

        body.module
            .into_iter()
            .next()
            .ok_or_else(|| CarrierError::NotFound {
                tracking_id: tracking_id.to_string(),
            })
    }
}

// Cainiao detail.json response, reduced to the fields we read.

#[derive(Debug, Deserialize)]
struct DetailResponse {
    #[serde(default)]
    module: Vec<TraceModule>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TraceModule {
    #[serde(default)]
    mail_no_source: Option<String>,
    #[serde(default)]
    copy_real_mail_no: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    latest_trace: Option<LatestTrace>,
    #[serde(default)]
    dest_cp_info: Option<CpInfo>,
    #[serde(default)]
    origin_country: Option<String>,
    #[serde(default)]
    dest_country: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LatestTrace {
    #[serde(default)]
    desc: Option<String>,
    /// Carrier-side spelling.
    #[serde(default, rename = "standerdDesc")]
    standard_desc: Option<String>,
    #[serde(default)]
    time: Option<i64>,
    #[serde(default)]
    action_code: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CpInfo {
    #[serde(default)]
    cp_name: Option<String>,
    #[serde(default)]
    phone: Option<String>,
}

fn to_delivery_status(module: TraceModule) -> DeliveryStatus {
    if module.mail_no_source.as_deref() == Some("EXTERNAL") {
        return DeliveryStatus::external();
    }

    let trace = module.latest_trace.unwrap_or(LatestTrace {
        desc: None,
        standard_desc: None,
        time: None,
        action_code: None,
    });
    let cp = module.dest_cp_info;

    DeliveryStatus {
        e_status: module.status.unwrap_or_default(),
        status_desc: trace.desc.unwrap_or_default(),
        status_detailed_desc: trace.standard_desc,
        time: trace.time,
        action_code: trace.action_code,
        contact: cp.as_ref().and_then(|c| c.cp_name.clone()),
        contact_details: cp.and_then(|c| c.phone),
        origin_country: module.origin_country,
        dest_country: module.dest_country,
    }
}

#[async_trait]
impl CarrierClient for CainiaoClient {
    async fn fetch_status(
        &self,
        tracking_id: &str,
        depth: u32,
        changes: &mut Vec<TrackingIdChange>,
    ) -> Result<DeliveryStatus, CarrierError> {
        let mut id = tracking_id.to_string();
        let mut depth = depth;

        loop {
            if depth >= MAX_REDIRECT_DEPTH {
                return Err(CarrierError::MaxRetriesExceeded {
                    tracking_id: id,
                    max: MAX_REDIRECT_DEPTH,
                });
            }

            let module = self.fetch_module(&id).await?;

            // Carrier renumbered the shipment: record the rename and follow it
            if let Some(real) = module
                .copy_real_mail_no
                .as_deref()
                .filter(|real| !real.is_empty() && *real != id)
            {
                info!(old = %id, new = %real, "Carrier reported renumbered tracking id");
                changes.push(TrackingIdChange {
                    old_package_id: id.clone(),
                    new_package_id: real.to_string(),
                });
                id = real.to_string();
                depth += 1;
                continue;
            }

            debug!(tracking_id = %id, depth, "Carrier status fetched");
            return Ok(to_delivery_status(module));
        }
    }
}
