//! Model-Based Settlement Oracle
//!
//! Drives a black-box exchange through its command surface, keeps a shadow
//! model of every trader's expected balances, and cross-checks the model
//! against the exchange's observable state: order book, trade tape, and
//! deposited balances.
//!
//! # Modules
//! - `context` — Immutable per-run context (market, tolerance, pacing)
//! - `trader` — Shadow ledger per trader with predicate gates
//! - `ops` — Deposit/withdraw/place-order executors
//! - `generator` — Weighted, constraint-gated random operation selection
//! - `scenarios` — Deterministic multi-party settlement choreographies
//! - `oracle` — Structural and balance assertions with bounded tolerance
//! - `orchestrator` — Sequencing, validation rounds, and the run summary
//! - `settlement` — Pluggable settlement-quiescence waits
//! - `surface` — External control/query/chain surfaces and a test double

pub mod context;
pub mod error;
pub mod generator;
pub mod ops;
pub mod oracle;
pub mod orchestrator;
pub mod scenarios;
pub mod settlement;
pub mod surface;
pub mod trader;

pub use error::OracleError;

/// Crate version constant
pub const VERSION: &str = "0.1.0";
