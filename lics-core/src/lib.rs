//! # lics-core
//!
//! License leasing engine. A central ledger hands out a fixed quota of
//! algorithm licenses to authenticated clients: VIDEO licenses one request
//! at a time, PICTURE licenses as a fair share recomputed on every
//! heartbeat. Clients that stop heartbeating lose their lease and their
//! licenses flow back to the pool.

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod event_queue;
pub mod eviction;
pub mod fair_share;
pub mod infrastructure;
#[cfg(feature = "http")]
#[path = "infrastructure_http.rs"]
pub mod infrastructure_http;
#[path = "infrastructure_in_memory.rs"]
pub mod infrastructure_in_memory;
pub mod ledger;
pub mod protocol;
pub mod reconciler;
pub mod service;
pub mod transport;
#[cfg(feature = "http")]
pub mod transport_http;
pub mod types;

#[cfg(test)]
mod client_test;
#[cfg(test)]
mod eviction_test;
#[cfg(test)]
mod service_test;
