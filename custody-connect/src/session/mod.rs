//! Peer sessions
//!
//! Models, capability grants and the state machine that serves inbound
//! signing requests over approved sessions.

pub mod manager;
pub mod models;
pub mod namespaces;

pub use manager::SessionManager;
pub use models::{ManagerState, Session, SessionEvent, SignRequest};
