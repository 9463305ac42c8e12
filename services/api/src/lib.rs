//! services/api/src/lib.rs
//!
//! The SHADOWCORE API service: identity callback, route guard and profile endpoints.

pub mod adapters;
pub mod config;
pub mod error;
pub mod web;
