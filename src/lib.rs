//! A high-throughput enumerator for S3-compatible object stores: a
//! concurrent prefix-tree crawler (`frontier`/`worker`/`autoscaler`) driven
//! by a signed listing client (`signing`/`listing`/`transport`/`resolver`)
//! and drained by a lock-free output writer (`writer`).

pub mod autoscaler;
pub mod coordinator;
pub mod credentials;
pub mod error;
pub mod frontier;
pub mod listing;
pub mod metrics;
pub mod resolver;
pub mod signing;
pub mod transport;
pub mod worker;
pub mod writer;
pub mod xml;

pub use credentials::Credentials;
pub use error::S3Error;
