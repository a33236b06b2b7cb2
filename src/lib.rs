//! RankBlaze payments core - order, payment, reconciliation, and entitlement
//! handling for the RankBlaze tool storefront.
//!
//! This library provides the backend for the single documented flow:
//! a checkout creates an order, a payment gateway confirms it (webhook or
//! verify call), the entitlement writer grants tool access atomically, and
//! the reconciliation job repairs orders whose confirmation was lost.

pub mod config;
pub mod db;
pub mod entitlements;
pub mod error;
pub mod extractors;
pub mod gateways;
pub mod handlers;
pub mod models;
pub mod reconcile;
