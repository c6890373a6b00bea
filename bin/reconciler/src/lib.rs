pub mod chain;
pub mod claims;
pub mod config;
pub mod directory;
pub mod ledger;

pub use chain::{ChainEvent, LogWatcher, ServiceStatus};
pub use claims::{ClaimContext, ClaimTicket, SignatureService};
pub use ledger::{ReconcileReport, Reconciler};
