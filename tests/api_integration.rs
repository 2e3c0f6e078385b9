//! Integration tests for the package REST API.
//!
//! Each test spins up the real Axum router on a random port with an
//! in-memory store and stubbed upstream clients, then exercises the HTTP
//! contract with a plain reqwest client.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::net::TcpListener;

use parcel_track::api::package_routes;
use parcel_track::carrier::CarrierClient;
use parcel_track::error::{CarrierError, GeocodingError};
use parcel_track::extract::RegexExtractor;
use parcel_track::geo::Geocoder;
use parcel_track::model::{DeliveryStatus, TrackingIdChange};
use parcel_track::pipeline::Pipeline;
use parcel_track::store::{LibSqlStore, PackageStore};

/// Geocoder stub: Tel Aviv for everything.
struct StubGeocoder;

#[async_trait]
impl Geocoder for StubGeocoder {
    async fn locate(&self, _address: &str) -> Result<Vec<f64>, GeocodingError> {
        Ok(vec![32.0661, 34.7748])
    }
}

/// Carrier stub: canned status, optional single rename.
struct StubCarrier {
    rename: Option<(String, String)>,
}

#[async_trait]
impl CarrierClient for StubCarrier {
    async fn fetch_status(
        &self,
        tracking_id: &str,
        _depth: u32,
        changes: &mut Vec<TrackingIdChange>,
    ) -> Result<DeliveryStatus, CarrierError> {
        if tracking_id == "LP404" {
            return Err(CarrierError::NotFound {
                tracking_id: tracking_id.to_string(),
            });
        }
        if let Some((old, new)) = &self.rename {
            if tracking_id == old {
                changes.push(TrackingIdChange {
                    old_package_id: old.clone(),
                    new_package_id: new.clone(),
                });
            }
        }
        Ok(DeliveryStatus {
            e_status: "DELIVERING".to_string(),
            status_desc: "Out for delivery".to_string(),
            dest_country: Some("IL".to_string()),
            ..Default::default()
        })
    }
}

/// Start the app on a random port. Returns its base URL.
async fn start_server(rename: Option<(&str, &str)>) -> String {
    let store: Arc<dyn PackageStore> = Arc::new(LibSqlStore::new_memory().await.unwrap());
    let carrier: Arc<dyn CarrierClient> = Arc::new(StubCarrier {
        rename: rename.map(|(a, b)| (a.to_string(), b.to_string())),
    });
    let pipeline = Arc::new(Pipeline::new(
        store.clone(),
        Arc::new(RegexExtractor::new()),
        Arc::new(StubGeocoder),
        carrier.clone(),
    ));
    let app = package_routes(store, pipeline, carrier);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://127.0.0.1:{port}")
}

async fn create_package(client: &reqwest::Client, base: &str, tracking_id: &str, uid: &str) -> Value {
    let resp = client
        .post(format!("{base}/api/new-package"))
        .json(&json!({"packageId": tracking_id, "uid": uid, "description": "ספר"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    resp.json().await.unwrap()
}

#[tokio::test]
async fn new_package_creates_record_and_runs_first_pass() {
    let base = start_server(None).await;
    let client = reqwest::Client::new();

    let created = create_package(&client, &base, "LP001", "user-1").await;
    assert_eq!(created["message"], "Package added successfully!");
    assert!(created["firebaseId"].is_string());

    let resp = client
        .post(format!("{base}/api/get-packages"))
        .json(&json!("user-1"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "success");
    assert_eq!(body["data-size"], 1);
    // First pass refreshed carrier fields even with no messages
    assert_eq!(body["data"][0]["eStatus"], "DELIVERING");
    assert_eq!(body["data"][0]["status"], 0);
}

#[tokio::test]
async fn new_package_requires_tracking_id() {
    let base = start_server(None).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/api/new-package"))
        .json(&json!({"uid": "user-1"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn send_messages_resolves_matched_package_only() {
    let base = start_server(None).await;
    let client = reqwest::Client::new();

    create_package(&client, &base, "LP001", "user-1").await;
    create_package(&client, &base, "LP002", "user-1").await;

    let resp = client
        .post(format!("{base}/api/send-messages"))
        .json(&json!({
            "uid": "user-1",
            "messages": [
                "שלום! סתם הודעה",
                "החבילה LP001 ממתינה: הרצל 5 תל אביב",
                "עוד הודעה בלי מספר מעקב",
            ],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert!(body["res"].as_str().unwrap().contains("2 packages"));
    assert_eq!(body["trackingNumberChanges"], json!([]));

    let packages: Value = client
        .post(format!("{base}/api/get-packages"))
        .json(&json!("user-1"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let data = packages["data"].as_array().unwrap();
    let a = data.iter().find(|p| p["packageId"] == "LP001").unwrap();
    let b = data.iter().find(|p| p["packageId"] == "LP002").unwrap();

    assert_eq!(a["status"], 2);
    assert_eq!(a["address"], "הרצל 5, תל אביב");
    assert_eq!(a["coordinates"], json!([32.0661, 34.7748]));
    assert!(a["arrivalMsg"].as_str().unwrap().contains("LP001"));

    // No matching message: carrier fields refreshed, nothing else
    assert_eq!(b["status"], 0);
    assert_eq!(b["address"], "");
    assert_eq!(b["eStatus"], "DELIVERING");
}

#[tokio::test]
async fn send_messages_reports_tracking_id_changes() {
    let base = start_server(Some(("LP001", "LP001X"))).await;
    let client = reqwest::Client::new();

    create_package(&client, &base, "LP001", "user-1").await;

    let resp = client
        .post(format!("{base}/api/send-messages"))
        .json(&json!({"uid": "user-1", "messages": []}))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(
        body["trackingNumberChanges"],
        json!([{"oldPackageId": "LP001", "newPackageId": "LP001X"}])
    );
}

#[tokio::test]
async fn archive_package_sets_terminal_status() {
    let base = start_server(None).await;
    let client = reqwest::Client::new();

    let created = create_package(&client, &base, "LP001", "user-1").await;
    let id = created["firebaseId"].as_str().unwrap();

    let resp = client
        .post(format!("{base}/api/archive-package"))
        .json(&json!({"id": id}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let packages: Value = client
        .post(format!("{base}/api/get-packages"))
        .json(&json!("user-1"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(packages["data"][0]["status"], -1);
}

#[tokio::test]
async fn hard_archive_deletes_record() {
    let base = start_server(None).await;
    let client = reqwest::Client::new();

    let created = create_package(&client, &base, "LP001", "user-1").await;
    let id = created["firebaseId"].as_str().unwrap();

    let resp = client
        .post(format!("{base}/api/archive-package"))
        .json(&json!({"id": id, "hard": true}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let packages: Value = client
        .post(format!("{base}/api/get-packages"))
        .json(&json!("user-1"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(packages["data-size"], 0);
}

#[tokio::test]
async fn archive_unknown_package_is_404() {
    let base = start_server(None).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/api/archive-package"))
        .json(&json!({"id": "no-such-id"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn package_status_passthrough() {
    let base = start_server(None).await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{base}/api/package-status?packageId=LP001"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["eStatus"], "DELIVERING");
    assert_eq!(body["statusDesc"], "Out for delivery");

    let missing = client
        .get(format!("{base}/api/package-status"))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), 400);

    let unknown = client
        .get(format!("{base}/api/package-status?packageId=LP404"))
        .send()
        .await
        .unwrap();
    assert_eq!(unknown.status(), 404);
}

#[tokio::test]
async fn count_msgs_counts() {
    let base = start_server(None).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/api/count-msgs"))
        .json(&json!({"messages": ["a", "b", "c"]}))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["count"], 3);
}

#[tokio::test]
async fn malformed_body_is_400_with_error() {
    let base = start_server(None).await;
    let client = reqwest::Client::new();

    // Wrong field type
    let resp = client
        .post(format!("{base}/api/send-messages"))
        .json(&json!({"uid": "user-1", "messages": "not-an-array"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].is_string());

    // Not JSON at all
    let resp = client
        .post(format!("{base}/api/archive-package"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn wrong_method_is_405() {
    let base = start_server(None).await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{base}/api/new-package"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 405);

    let resp = client
        .post(format!("{base}/api/package-status"))
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 405);
}
