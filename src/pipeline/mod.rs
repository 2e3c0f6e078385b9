//! Message-processing pipeline: match, extract, geocode, refresh, persist.
//!
//! One batch = one request. All accumulated state (patches, tracking-id
//! renames) is scoped to the batch and returned in [`BatchOutcome`];
//! nothing survives the call.
//!
//! Per-package failures of extraction, geocoding, or the carrier fetch are
//! logged and degrade that package's patch only. Persistence is
//! best-effort and non-transactional: one failed write never blocks the
//! siblings.

mod matcher;

pub use matcher::{MatchedPackage, match_messages_to_packages, match_package_messages};

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::carrier::CarrierClient;
use crate::error::Result;
use crate::extract::{AddressExtractor, clean_delivery_message};
use crate::geo::Geocoder;
use crate::model::{Package, PackagePatch, PackageStatus, TrackingIdChange};
use crate::store::PackageStore;

/// Everything one processing batch produced.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Patch per package storage key, in package order.
    pub patches: Vec<(String, PackagePatch)>,
    /// Tracking-id renames the carrier reported during this batch.
    pub changes: Vec<TrackingIdChange>,
    /// Number of patches that were persisted successfully.
    pub updated: usize,
}

/// The full enrichment pipeline over one user's packages.
pub struct Pipeline {
    store: Arc<dyn PackageStore>,
    extractor: Arc<dyn AddressExtractor>,
    geocoder: Arc<dyn Geocoder>,
    carrier: Arc<dyn CarrierClient>,
}

impl Pipeline {
    pub fn new(
        store: Arc<dyn PackageStore>,
        extractor: Arc<dyn AddressExtractor>,
        geocoder: Arc<dyn Geocoder>,
        carrier: Arc<dyn CarrierClient>,
    ) -> Self {
        Self {
            store,
            extractor,
            geocoder,
            carrier,
        }
    }

    /// Run the batch for all of one user's active packages, persisting the
    /// resulting patches.
    pub async fn run_for_user(&self, uid: &str, messages: &[String]) -> Result<BatchOutcome> {
        let packages: Vec<Package> = self
            .store
            .list_by_uid(uid)
            .await?
            .into_iter()
            // Archived is terminal; never resurrect it with a status patch.
            .filter(|p| p.status != PackageStatus::Archived)
            .collect();

        let mut outcome = self.compute(&packages, messages).await;
        outcome.updated = self.persist(&outcome.patches).await;
        info!(uid, updated = outcome.updated, "Processing batch complete");
        Ok(outcome)
    }

    /// First-pass run for a freshly created package: no messages, just a
    /// carrier status refresh.
    pub async fn run_first_pass(&self, package: &Package) -> Result<BatchOutcome> {
        let packages = std::slice::from_ref(package);
        let no_messages: &[String] = &[];
        let mut outcome = self.compute(packages, no_messages).await;
        outcome.updated = self.persist(&outcome.patches).await;
        Ok(outcome)
    }

    /// Compute patches for a batch without touching the store.
    ///
    /// For each package, in order: skip extraction when the stored record
    /// or the accumulated patch already has a resolved address (a resolved
    /// address is final; first resolution wins within a batch), otherwise
    /// extract + geocode from the matched message; then always refresh
    /// carrier status fields.
    pub async fn compute<S: AsRef<str>>(
        &self,
        packages: &[Package],
        messages: &[S],
    ) -> BatchOutcome {
        let mut changes: Vec<TrackingIdChange> = Vec::new();
        let mut patches: Vec<(String, PackagePatch)> = Vec::new();

        for matched in match_package_messages(packages, messages) {
            let package = matched.package;
            let index = match patches.iter().position(|(id, _)| id == &package.id) {
                Some(index) => index,
                None => {
                    patches.push((package.id.clone(), PackagePatch::default()));
                    patches.len() - 1
                }
            };

            // Status only moves forward: a record that already resolved an
            // address keeps it, and a later message without one must not
            // drag it back to InTransit.
            let already_resolved = package.status == PackageStatus::AddressResolved
                || !package.address.is_empty();

            if let Some(message) = matched.message {
                if already_resolved || patches[index].1.has_resolved_address() {
                    debug!(
                        package_id = %package.package_id,
                        "Skipping extraction — address already resolved"
                    );
                } else {
                    self.extract_into(&mut patches[index].1, message).await;
                }
            }

            // Carrier status fields always refresh, resolved address or not.
            match self
                .carrier
                .fetch_status(&package.package_id, 0, &mut changes)
                .await
            {
                Ok(status) => patches[index].1.merge_delivery_status(&status),
                Err(e) => warn!(
                    package_id = %package.package_id,
                    error = %e,
                    "Carrier status fetch failed"
                ),
            }
        }

        BatchOutcome {
            patches,
            changes,
            updated: 0,
        }
    }

    /// Extract address fields from one message into the patch.
    async fn extract_into(&self, patch: &mut PackagePatch, raw_message: &str) {
        let message = clean_delivery_message(raw_message);

        let fields = match self.extractor.extract(&message).await {
            Ok(fields) => fields,
            Err(e) => {
                warn!(error = %e, "Address extraction failed");
                return;
            }
        };

        if let Some(address) = fields.address.filter(|a| !a.is_empty()) {
            let coordinates = match self.geocoder.locate(&address).await {
                Ok(coordinates) => coordinates,
                Err(e) => {
                    warn!(address = %address, error = %e, "Geocoding failed");
                    Vec::new()
                }
            };
            patch.address = Some(address);
            patch.coordinates = Some(coordinates);
            patch.status = Some(PackageStatus::AddressResolved);
            patch.arrival_msg = Some(message);
        } else {
            patch.status = Some(PackageStatus::InTransit);
        }

        if fields.pickup_point.is_some() {
            patch.pickup_point_name = fields.pickup_point;
        }
        if fields.internal_code.is_some() {
            patch.post_office_code = fields.internal_code;
        }
    }

    /// Write all patches concurrently; a failed write is logged and does
    /// not affect the others. Returns the number of successful writes.
    async fn persist(&self, patches: &[(String, PackagePatch)]) -> usize {
        let writes = patches
            .iter()
            .filter(|(_, patch)| !patch.is_empty())
            .map(|(id, patch)| async move {
                match self.store.apply_patch(id, patch).await {
                    Ok(()) => true,
                    Err(e) => {
                        warn!(package = %id, error = %e, "Failed to persist patch");
                        false
                    }
                }
            });

        join_all(writes).await.into_iter().filter(|ok| *ok).count()
    }
}
