//! User confirmation of inbound sign requests

use async_trait::async_trait;

use crate::session::{Session, SignRequest};

/// Consulted before a request reaches the signing dispatcher.
/// Returning false answers the peer with a user-rejected error.
#[async_trait]
pub trait RequestApproval: Send + Sync {
    async fn approve(&self, session: &Session, request: &SignRequest) -> bool;
}

/// Approves everything
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoApprove;

#[async_trait]
impl RequestApproval for AutoApprove {
    async fn approve(&self, _session: &Session, _request: &SignRequest) -> bool {
        true
    }
}
