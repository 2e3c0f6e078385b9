//! Backend-agnostic persistence trait for package records.

use async_trait::async_trait;

use crate::error::DatabaseError;
use crate::model::{Package, PackagePatch, PackageStatus};

/// Package persistence interface.
///
/// Patches are partial: only fields set on the [`PackagePatch`] are
/// written, everything else keeps its stored value.
#[async_trait]
pub trait PackageStore: Send + Sync {
    /// Insert a new package record.
    async fn insert(&self, package: &Package) -> Result<(), DatabaseError>;

    /// Get a package by its storage key.
    async fn get(&self, id: &str) -> Result<Option<Package>, DatabaseError>;

    /// All packages for one user, ordered by status.
    async fn list_by_uid(&self, uid: &str) -> Result<Vec<Package>, DatabaseError>;

    /// Every stored package (back-fill processing).
    async fn list_all(&self) -> Result<Vec<Package>, DatabaseError>;

    /// Apply a partial update. `NotFound` when the id has no record.
    async fn apply_patch(&self, id: &str, patch: &PackagePatch) -> Result<(), DatabaseError>;

    /// Set the lifecycle status (archive uses this with `Archived`).
    async fn set_status(&self, id: &str, status: PackageStatus) -> Result<(), DatabaseError>;

    /// Hard-delete a record.
    async fn delete(&self, id: &str) -> Result<(), DatabaseError>;
}
