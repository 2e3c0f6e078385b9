//! libSQL backend — async `PackageStore` implementation.
//!
//! Supports local file and in-memory databases.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, Value, params};
use tracing::info;

use crate::error::DatabaseError;
use crate::model::{Package, PackagePatch, PackageStatus};
use crate::store::migrations;
use crate::store::traits::PackageStore;

/// Column list shared by every SELECT, so row mapping stays positional.
const PACKAGE_COLUMNS: &str = "id, package_id, address, description, post_office_code, \
     pickup_point_name, status, coordinates, uid, e_status, status_desc, \
     status_detailed_desc, time, action_code, contact, contact_details, \
     origin_country, dest_country, arrival_msg, created_at";

/// libSQL package store.
///
/// Holds a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlStore {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlStore {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Connection(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Connection(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Connection(format!("Failed to create connection: {e}")))?;

        migrations::run_migrations(&conn).await?;
        info!(path = %path.display(), "Database opened");
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Connection(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Connection(format!("Failed to create connection: {e}")))?;

        migrations::run_migrations(&conn).await?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn row_to_package(row: &libsql::Row) -> Result<Package, DatabaseError> {
    let coordinates_json: String = row
        .get(7)
        .map_err(|e| DatabaseError::Query(format!("coordinates column: {e}")))?;
    let coordinates: Vec<f64> = serde_json::from_str(&coordinates_json)
        .map_err(|e| DatabaseError::Serialization(format!("coordinates: {e}")))?;

    let status_code: i64 = row
        .get(6)
        .map_err(|e| DatabaseError::Query(format!("status column: {e}")))?;
    let status = PackageStatus::try_from(status_code).map_err(DatabaseError::Serialization)?;

    let get_text = |idx: i32| -> Result<String, DatabaseError> {
        row.get(idx)
            .map_err(|e| DatabaseError::Query(format!("column {idx}: {e}")))
    };

    let created_at_raw = get_text(19)?;

    Ok(Package {
        id: get_text(0)?,
        package_id: get_text(1)?,
        address: get_text(2)?,
        description: get_text(3)?,
        post_office_code: get_text(4)?,
        pickup_point_name: get_text(5)?,
        status,
        coordinates,
        uid: get_text(8)?,
        e_status: get_text(9)?,
        status_desc: get_text(10)?,
        status_detailed_desc: get_text(11)?,
        time: row
            .get(12)
            .map_err(|e| DatabaseError::Query(format!("time column: {e}")))?,
        action_code: get_text(13)?,
        contact: get_text(14)?,
        contact_details: get_text(15)?,
        origin_country: get_text(16)?,
        dest_country: get_text(17)?,
        arrival_msg: get_text(18)?,
        created_at: parse_datetime(&created_at_raw),
    })
}

#[async_trait]
impl PackageStore for LibSqlStore {
    async fn insert(&self, package: &Package) -> Result<(), DatabaseError> {
        let coordinates = serde_json::to_string(&package.coordinates)
            .map_err(|e| DatabaseError::Serialization(format!("coordinates: {e}")))?;

        self.conn()
            .execute(
                &format!(
                    "INSERT INTO packages ({PACKAGE_COLUMNS}) VALUES \
                     (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)"
                ),
                params![
                    package.id.as_str(),
                    package.package_id.as_str(),
                    package.address.as_str(),
                    package.description.as_str(),
                    package.post_office_code.as_str(),
                    package.pickup_point_name.as_str(),
                    i64::from(package.status),
                    coordinates,
                    package.uid.as_str(),
                    package.e_status.as_str(),
                    package.status_desc.as_str(),
                    package.status_detailed_desc.as_str(),
                    package.time,
                    package.action_code.as_str(),
                    package.contact.as_str(),
                    package.contact_details.as_str(),
                    package.origin_country.as_str(),
                    package.dest_country.as_str(),
                    package.arrival_msg.as_str(),
                    package.created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("insert package: {e}")))?;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Package>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {PACKAGE_COLUMNS} FROM packages WHERE id = ?1"),
                params![id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get package: {e}")))?;

        match rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("get package row: {e}")))?
        {
            Some(row) => Ok(Some(row_to_package(&row)?)),
            None => Ok(None),
        }
    }

    async fn list_by_uid(&self, uid: &str) -> Result<Vec<Package>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {PACKAGE_COLUMNS} FROM packages \
                     WHERE uid = ?1 ORDER BY status, created_at"
                ),
                params![uid],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list packages: {e}")))?;

        let mut packages = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("list packages row: {e}")))?
        {
            packages.push(row_to_package(&row)?);
        }
        Ok(packages)
    }

    async fn list_all(&self) -> Result<Vec<Package>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {PACKAGE_COLUMNS} FROM packages ORDER BY created_at"),
                (),
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list all packages: {e}")))?;

        let mut packages = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("list all packages row: {e}")))?
        {
            packages.push(row_to_package(&row)?);
        }
        Ok(packages)
    }

    async fn apply_patch(&self, id: &str, patch: &PackagePatch) -> Result<(), DatabaseError> {
        // Build the SET clause from the fields the patch actually carries.
        let mut sets: Vec<String> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        let mut push = |column: &str, value: Value, sets: &mut Vec<String>, values: &mut Vec<Value>| {
            values.push(value);
            sets.push(format!("{column} = ?{}", values.len()));
        };

        if let Some(ref address) = patch.address {
            push("address", Value::Text(address.clone()), &mut sets, &mut values);
        }
        if let Some(ref coordinates) = patch.coordinates {
            let json = serde_json::to_string(coordinates)
                .map_err(|e| DatabaseError::Serialization(format!("coordinates: {e}")))?;
            push("coordinates", Value::Text(json), &mut sets, &mut values);
        }
        if let Some(ref name) = patch.pickup_point_name {
            push("pickup_point_name", Value::Text(name.clone()), &mut sets, &mut values);
        }
        if let Some(ref code) = patch.post_office_code {
            push("post_office_code", Value::Text(code.clone()), &mut sets, &mut values);
        }
        if let Some(status) = patch.status {
            push("status", Value::Integer(i64::from(status)), &mut sets, &mut values);
        }
        if let Some(ref msg) = patch.arrival_msg {
            push("arrival_msg", Value::Text(msg.clone()), &mut sets, &mut values);
        }
        if let Some(ref e_status) = patch.e_status {
            push("e_status", Value::Text(e_status.clone()), &mut sets, &mut values);
        }
        if let Some(ref desc) = patch.status_desc {
            push("status_desc", Value::Text(desc.clone()), &mut sets, &mut values);
        }
        if let Some(ref desc) = patch.status_detailed_desc {
            push("status_detailed_desc", Value::Text(desc.clone()), &mut sets, &mut values);
        }
        if let Some(time) = patch.time {
            push("time", Value::Integer(time), &mut sets, &mut values);
        }
        if let Some(ref code) = patch.action_code {
            push("action_code", Value::Text(code.clone()), &mut sets, &mut values);
        }
        if let Some(ref contact) = patch.contact {
            push("contact", Value::Text(contact.clone()), &mut sets, &mut values);
        }
        if let Some(ref details) = patch.contact_details {
            push("contact_details", Value::Text(details.clone()), &mut sets, &mut values);
        }
        if let Some(ref country) = patch.origin_country {
            push("origin_country", Value::Text(country.clone()), &mut sets, &mut values);
        }
        if let Some(ref country) = patch.dest_country {
            push("dest_country", Value::Text(country.clone()), &mut sets, &mut values);
        }

        if sets.is_empty() {
            return Ok(());
        }

        values.push(Value::Text(id.to_string()));
        let sql = format!(
            "UPDATE packages SET {} WHERE id = ?{}",
            sets.join(", "),
            values.len()
        );

        let affected = self
            .conn()
            .execute(&sql, libsql::params_from_iter(values))
            .await
            .map_err(|e| DatabaseError::Query(format!("apply patch: {e}")))?;

        if affected == 0 {
            return Err(DatabaseError::NotFound {
                entity: "package".to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn set_status(&self, id: &str, status: PackageStatus) -> Result<(), DatabaseError> {
        let affected = self
            .conn()
            .execute(
                "UPDATE packages SET status = ?1 WHERE id = ?2",
                params![i64::from(status), id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("set status: {e}")))?;

        if affected == 0 {
            return Err(DatabaseError::NotFound {
                entity: "package".to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), DatabaseError> {
        let affected = self
            .conn()
            .execute("DELETE FROM packages WHERE id = ?1", params![id])
            .await
            .map_err(|e| DatabaseError::Query(format!("delete package: {e}")))?;

        if affected == 0 {
            return Err(DatabaseError::NotFound {
                entity: "package".to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PackageStatus;

    async fn store() -> LibSqlStore {
        LibSqlStore::new_memory().await.unwrap()
    }

    #[tokio::test]
    async fn insert_and_get_round_trip() {
        let store = store().await;
        let mut pkg = Package::new("LP00112233", "user-1");
        pkg.coordinates = vec![32.0661, 34.7748];
        pkg.address = "הרצל 5, תל אביב".to_string();

        store.insert(&pkg).await.unwrap();
        let loaded = store.get(&pkg.id).await.unwrap().unwrap();

        assert_eq!(loaded.package_id, "LP00112233");
        assert_eq!(loaded.coordinates, vec![32.0661, 34.7748]);
        assert_eq!(loaded.address, "הרצל 5, תל אביב");
        assert_eq!(loaded.status, PackageStatus::Pending);
    }

    #[tokio::test]
    async fn get_unknown_returns_none() {
        let store = store().await;
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_by_uid_orders_by_status() {
        let store = store().await;

        let mut delivered = Package::new("LP2", "user-1");
        delivered.status = PackageStatus::AddressResolved;
        let pending = Package::new("LP1", "user-1");
        let other_user = Package::new("LP3", "user-2");

        store.insert(&delivered).await.unwrap();
        store.insert(&pending).await.unwrap();
        store.insert(&other_user).await.unwrap();

        let packages = store.list_by_uid("user-1").await.unwrap();
        assert_eq!(packages.len(), 2);
        assert_eq!(packages[0].package_id, "LP1");
        assert_eq!(packages[1].package_id, "LP2");
    }

    #[tokio::test]
    async fn apply_patch_writes_only_set_fields() {
        let store = store().await;
        let mut pkg = Package::new("LP1", "user-1");
        pkg.description = "ספר".to_string();
        store.insert(&pkg).await.unwrap();

        let patch = PackagePatch {
            address: Some("הרצל 5, תל אביב".to_string()),
            coordinates: Some(vec![32.0661, 34.7748]),
            status: Some(PackageStatus::AddressResolved),
            e_status: Some("DELIVERING".to_string()),
            ..Default::default()
        };
        store.apply_patch(&pkg.id, &patch).await.unwrap();

        let loaded = store.get(&pkg.id).await.unwrap().unwrap();
        assert_eq!(loaded.address, "הרצל 5, תל אביב");
        assert_eq!(loaded.status, PackageStatus::AddressResolved);
        assert_eq!(loaded.e_status, "DELIVERING");
        // untouched fields keep their stored values
        assert_eq!(loaded.description, "ספר");
        assert_eq!(loaded.package_id, "LP1");
    }

    #[tokio::test]
    async fn apply_patch_unknown_id_is_not_found() {
        let store = store().await;
        let patch = PackagePatch {
            e_status: Some("X".to_string()),
            ..Default::default()
        };
        let err = store.apply_patch("missing", &patch).await.unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }

    #[tokio::test]
    async fn empty_patch_is_a_no_op() {
        let store = store().await;
        let pkg = Package::new("LP1", "user-1");
        store.insert(&pkg).await.unwrap();
        store.apply_patch(&pkg.id, &PackagePatch::default()).await.unwrap();
    }

    #[tokio::test]
    async fn set_status_archives() {
        let store = store().await;
        let pkg = Package::new("LP1", "user-1");
        store.insert(&pkg).await.unwrap();

        store.set_status(&pkg.id, PackageStatus::Archived).await.unwrap();
        let loaded = store.get(&pkg.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, PackageStatus::Archived);

        let err = store
            .set_status("missing", PackageStatus::Archived)
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }

    #[tokio::test]
    async fn delete_removes_record() {
        let store = store().await;
        let pkg = Package::new("LP1", "user-1");
        store.insert(&pkg).await.unwrap();

        store.delete(&pkg.id).await.unwrap();
        assert!(store.get(&pkg.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn file_backed_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("packages.db");

        {
            let store = LibSqlStore::new_local(&path).await.unwrap();
            store.insert(&Package::new("LP1", "user-1")).await.unwrap();
        }

        let reopened = LibSqlStore::new_local(&path).await.unwrap();
        assert_eq!(reopened.list_all().await.unwrap().len(), 1);
    }
}
