//! Ethereum Keyspace Scanner
//!
//! An exhaustive-search tool that enumerates candidate secp256k1 private
//! keys, derives the Ethereum address for each one, and polls a remote node
//! for a non-zero balance. Positive results are appended to a durable
//! findings file. This library provides:
//!
//! - Three candidate enumeration modes: sequential increment from a seed,
//!   uniform random draws, and password-derived keys (brain wallets)
//! - A fixed-size pool of checker workers fed through a bounded channel,
//!   so concurrent RPC pressure and memory stay bounded
//! - Exactly-once, non-interleaved recording of findings under concurrency
//! - Coordinated shutdown with an accurate final progress count
//!
//! # Architecture
//!
//! A single generator task owns the enumeration cursor and feeds
//! `(candidate, address)` work items through a small bounded channel. Each
//! worker pulls an item, queries the node's `eth_getBalance` endpoint, and
//! records any hit. The channel provides natural backpressure: the generator
//! never runs more than a handful of candidates ahead of the workers.
//!
//! # Error Model
//!
//! Every error is either absorbed-and-counted (a single failed lookup skips
//! that candidate) or fatal (startup configuration problems, a transport
//! that died mid-response, a findings write failure). There are no retries.

pub mod address;
pub mod config;
pub mod engine;
pub mod keyspace;
pub mod ledger;
pub mod progress;
pub mod recorder;

pub use config::{KeyMode, ScanConfig};
pub use engine::{DispatchEngine, WorkItem};
pub use keyspace::{Candidate, GeneratedKey, KeySource};
pub use ledger::{HttpLedger, LedgerQuery, QueryError};
pub use progress::ProgressCounter;
pub use recorder::{Finding, FindingsLog};
