//! aeroconsensus - replication rounds for a Raft-style consensus engine
//!
//! - `consensus`: rounds, term fencing, bootstrap descriptors, fault hooks
//! - `config`: per-replica configuration
//! - `observability`: structured logging and counters

pub mod config;
pub mod consensus;
pub mod observability;
