//! Browser-side adapters for the SHADOWCORE session layer.

pub mod profile_api;

pub use profile_api::HttpProfileApi;
