//! # pwtable - precomputed digest lookup tables
//!
//! Builds disk-resident tables mapping `digest(password) -> password` for
//! every password a rule describes, so a digest can later be reversed with a
//! single bucket walk.
//!
//! ## Architecture
//!
//! - [`rules`] - Rule syntax, password-space enumeration by rank
//! - [`digest`] - MD5 / SHA-1 / SHA-256 primitives
//! - [`table`] - On-disk hash table writer, reader and the populator
//! - [`config`] - `<prefix>.json` generator configuration
//! - [`error`] - Crate error type and its three families
//! - [`logging`] - `tracing` subscriber setup
//! - [`utils`] - Encoding helpers and the progress bar shim
//!
//! ## Quick Start
//!
//! ```ignore
//! use pwtable::table::build::{build_table, BuildOptions};
//! use std::path::Path;
//!
//! // Reads tables/digits.json, writes tables/digits.key and tables/digits.data
//! let outcome = build_table(Path::new("tables/digits"), &BuildOptions::default())?;
//! println!("{} records", outcome.stats.records);
//! ```
//!
//! ## Format
//!
//! A table is a fixed directory of buckets, each pointing at a chain of
//! fixed-size blocks in an append-only data file. The layout parameters,
//! digest and bucket hash are recorded in a 64-byte header so a reader needs
//! nothing else to interpret the files.

pub mod config;
pub mod digest;
pub mod error;
pub mod logging;
pub mod rules;
pub mod table;
pub mod utils;

pub use error::{Error, ErrorKind, Result};
