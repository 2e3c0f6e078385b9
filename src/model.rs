//! Core data model: packages, patches, delivery status, tracking renames.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a package.
///
/// Transitions only move forward, except `Archived`, which is terminal and
/// set explicitly by a user action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "i64", try_from = "i64")]
pub enum PackageStatus {
    /// Soft-deleted by the archive endpoint.
    Archived,
    /// Created, no message processed yet.
    Pending,
    /// A message was seen but no address could be resolved.
    InTransit,
    /// Address extracted and geocoded.
    AddressResolved,
}

impl From<PackageStatus> for i64 {
    fn from(status: PackageStatus) -> i64 {
        match status {
            PackageStatus::Archived => -1,
            PackageStatus::Pending => 0,
            PackageStatus::InTransit => 1,
            PackageStatus::AddressResolved => 2,
        }
    }
}

impl TryFrom<i64> for PackageStatus {
    type Error = String;

    fn try_from(code: i64) -> Result<Self, String> {
        match code {
            -1 => Ok(PackageStatus::Archived),
            0 => Ok(PackageStatus::Pending),
            1 => Ok(PackageStatus::InTransit),
            2 => Ok(PackageStatus::AddressResolved),
            other => Err(format!("unknown package status code: {other}")),
        }
    }
}

/// A persisted shipment record.
///
/// `coordinates` is either empty or exactly a `[lat, lng]` pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Package {
    /// Storage key (generated at insert, not the carrier id).
    pub id: String,
    /// Carrier tracking id. Not guaranteed unique across renumbering events.
    pub package_id: String,
    pub address: String,
    pub description: String,
    pub post_office_code: String,
    pub pickup_point_name: String,
    pub status: PackageStatus,
    pub coordinates: Vec<f64>,
    /// Owning user.
    pub uid: String,
    pub e_status: String,
    pub status_desc: String,
    pub status_detailed_desc: String,
    pub time: i64,
    pub action_code: String,
    pub contact: String,
    pub contact_details: String,
    pub origin_country: String,
    pub dest_country: String,
    /// Last message that produced an address.
    pub arrival_msg: String,
    pub created_at: DateTime<Utc>,
}

impl Package {
    /// Build a new record from intake fields, defaulting everything optional.
    pub fn new(tracking_id: impl Into<String>, uid: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            package_id: tracking_id.into(),
            address: String::new(),
            description: String::new(),
            post_office_code: String::new(),
            pickup_point_name: String::new(),
            status: PackageStatus::Pending,
            coordinates: Vec::new(),
            uid: uid.into(),
            e_status: String::new(),
            status_desc: String::new(),
            status_detailed_desc: String::new(),
            time: 0,
            action_code: String::new(),
            contact: String::new(),
            contact_details: String::new(),
            origin_country: String::new(),
            dest_country: String::new(),
            arrival_msg: String::new(),
            created_at: Utc::now(),
        }
    }
}

/// Carrier-reported status fields for one tracking id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryStatus {
    pub e_status: String,
    pub status_desc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_detailed_desc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin_country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dest_country: Option<String>,
}

impl DeliveryStatus {
    /// The sentinel status returned for externally sourced shipments the
    /// carrier has no data for.
    pub fn external() -> Self {
        Self {
            e_status: "ERROR".to_string(),
            status_desc: "External Package - No tracking information available".to_string(),
            ..Default::default()
        }
    }
}

/// Partial update for one package, applied as a single persistence write.
///
/// Only `Some` fields are written; everything else keeps its stored value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PackagePatch {
    pub address: Option<String>,
    pub coordinates: Option<Vec<f64>>,
    pub pickup_point_name: Option<String>,
    pub post_office_code: Option<String>,
    pub status: Option<PackageStatus>,
    pub arrival_msg: Option<String>,
    pub e_status: Option<String>,
    pub status_desc: Option<String>,
    pub status_detailed_desc: Option<String>,
    pub time: Option<i64>,
    pub action_code: Option<String>,
    pub contact: Option<String>,
    pub contact_details: Option<String>,
    pub origin_country: Option<String>,
    pub dest_country: Option<String>,
}

impl PackagePatch {
    /// Whether this patch carries a resolved (non-empty) address.
    pub fn has_resolved_address(&self) -> bool {
        self.address.as_deref().is_some_and(|a| !a.is_empty())
    }

    /// Whether the patch writes anything at all.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Merge carrier-reported fields. Status fields always refresh;
    /// address-derived fields are untouched.
    pub fn merge_delivery_status(&mut self, status: &DeliveryStatus) {
        self.e_status = Some(status.e_status.clone());
        self.status_desc = Some(status.status_desc.clone());
        self.status_detailed_desc = status.status_detailed_desc.clone();
        self.time = status.time;
        self.action_code = status.action_code.clone();
        self.contact = status.contact.clone();
        self.contact_details = status.contact_details.clone();
        self.origin_country = status.origin_country.clone();
        self.dest_country = status.dest_country.clone();
    }
}

/// One carrier-side renumbering event, recorded during a processing batch
/// and returned to the caller. Request-scoped — threaded explicitly through
/// the pipeline, never global.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingIdChange {
    #[serde(rename = "oldPackageId")]
    pub old_package_id: String,
    #[serde(rename = "newPackageId")]
    pub new_package_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_codes() {
        for status in [
            PackageStatus::Archived,
            PackageStatus::Pending,
            PackageStatus::InTransit,
            PackageStatus::AddressResolved,
        ] {
            let code: i64 = status.into();
            assert_eq!(PackageStatus::try_from(code).unwrap(), status);
        }
        assert!(PackageStatus::try_from(7).is_err());
    }

    #[test]
    fn status_serializes_as_integer() {
        let json = serde_json::to_string(&PackageStatus::AddressResolved).unwrap();
        assert_eq!(json, "2");
        let back: PackageStatus = serde_json::from_str("-1").unwrap();
        assert_eq!(back, PackageStatus::Archived);
    }

    #[test]
    fn package_serializes_with_camel_case_keys() {
        let pkg = Package::new("LP00112233445566", "user-1");
        let value = serde_json::to_value(&pkg).unwrap();
        assert!(value.get("packageId").is_some());
        assert!(value.get("pickupPointName").is_some());
        assert!(value.get("eStatus").is_some());
        assert_eq!(value["status"], 0);
    }

    #[test]
    fn merge_delivery_status_leaves_address_fields_alone() {
        let mut patch = PackagePatch {
            address: Some("הרצל 5, תל אביב".to_string()),
            status: Some(PackageStatus::AddressResolved),
            ..Default::default()
        };
        let status = DeliveryStatus {
            e_status: "DELIVERING".to_string(),
            status_desc: "Out for delivery".to_string(),
            time: Some(1_700_000_000_000),
            ..Default::default()
        };
        patch.merge_delivery_status(&status);
        assert_eq!(patch.address.as_deref(), Some("הרצל 5, תל אביב"));
        assert_eq!(patch.e_status.as_deref(), Some("DELIVERING"));
        assert_eq!(patch.time, Some(1_700_000_000_000));
    }
}
