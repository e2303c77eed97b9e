//! # FiberSync Protocol
//!
//! Wire types for the paged-read contract between the replication engine
//! and the remote data service.
//!
//! This crate provides:
//! - [`Row`] and value ordering helpers
//! - [`Filter`] / [`Filters`] for equality and comparison filters
//! - [`PageRequest`] / [`PageResponse`] for one paged read
//! - [`RemotePage`] with the implicit "has more" signal
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod filter;
mod page;
mod row;

pub use error::{ProtocolError, ProtocolResult};
pub use filter::{Filter, Filters, Operator};
pub use page::{OrderDir, PageRequest, PageResponse, RemotePage};
pub use row::{compare_values, is_present, max_value, Row, Value};
