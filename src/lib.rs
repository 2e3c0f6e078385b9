//! parcel-track — package-tracking backend.
//!
//! Stores shipment records, enriches them from free-text delivery messages
//! (address extraction + geocoding), and polls the carrier for live status.

pub mod api;
pub mod carrier;
pub mod config;
pub mod error;
pub mod extract;
pub mod geo;
pub mod llm;
pub mod model;
pub mod pipeline;
pub mod store;
