//! Custody Connect - peer session layer for the custody wallet
//!
//! Pairs with remote applications over a relay, scopes what each session may
//! ask for and answers every inbound request through the core signing
//! dispatcher.

pub mod approval;
pub mod config;
pub mod relay;
pub mod session;
pub mod telemetry;

pub use approval::{AutoApprove, RequestApproval};
pub use config::ConnectConfig;
pub use relay::{InMemoryRelay, JsonRpcError, JsonRpcResponse, RelayClient, RelayEvent};
pub use session::{Session, SessionEvent, SessionManager};
