//! Partitioned key-value table engine and intra-host federation
//! rendezvous for a standalone (single-host) federated-learning compute
//! backend.
//!
//! The two load-bearing pieces are [`table::Table`], a partitioned,
//! LMDB-backed, byte-keyed/byte-valued map with parallel map/shuffle/reduce
//! transformations and binary set operations, and [`federation::Federation`],
//! a rendezvous layered on that same engine by which named parties exchange
//! tables and objects. [`session::Session`] owns the worker pool and the
//! namespace every transformation's output lands in by default.
//!
//! Out of scope: higher-level session orchestration beyond what's exposed
//! here, logging configuration (the crate only calls into the `log`
//! facade), user-supplied key/value codecs, user-supplied partitioner
//! callables (treated as opaque `Fn` values), a CLI/embedding application,
//! and parent-process liveness watchdogging.

pub mod catalog;
pub mod config;
pub mod error;
pub mod federation;
pub mod operand;
pub mod partition_path;
pub mod partitioner;
pub mod session;
pub mod table;

mod storage;
mod worker;

pub use config::Options;
pub use error::{Error, Result};
pub use federation::{Federation, FederationValue, Party, Role};
pub use session::Session;
pub use table::Table;
