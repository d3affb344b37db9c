//! BIFROST Library
//!
//! Polls a network monitoring API for node records, translates each one
//! into an enterprise SNMP trap, and delivers the traps sequentially
//! over UDP to a fixed receiver, with per-phase timing written to an
//! execution log for auditing.

pub mod config;
pub mod error;
pub mod fetcher;
pub mod orchestrator;
pub mod sender;
pub mod snmp;
pub mod telemetry;
pub mod translator;

pub use config::Config;
pub use error::{DeliveryError, FetchError, RunError, TranslateError};
pub use fetcher::{NodeFetcher, NodeRecord, NodeSource};
pub use orchestrator::{Orchestrator, RunSummary};
pub use sender::{TrapDelivery, TrapSender};
pub use telemetry::Telemetry;
pub use translator::{build_varbinds, Varbind, VarbindSet};
