//! Session data models

use chrono::{DateTime, TimeZone, Utc};
use custody_core::transaction::chains::parse_caip2;
use custody_core::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::namespaces::{parse_caip10, EIP155};
use crate::relay::{PeerMetadata, SessionProposal, SessionSettlement};

/// Lifecycle of the session manager itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ManagerState {
    Uninitialized,
    Ready,
}

impl Default for ManagerState {
    fn default() -> Self {
        Self::Uninitialized
    }
}

/// An approved, capability-scoped connection to a peer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub topic: String,
    pub peer_metadata: PeerMetadata,
    pub approved_chains: Vec<u64>,
    /// Lowercase 0x addresses
    pub approved_accounts: Vec<String>,
    pub methods: Vec<String>,
    pub expiry: DateTime<Utc>,
}

impl Session {
    /// Build from a relay settlement. A grant with no chains or no accounts is rejected.
    pub fn from_settlement(settlement: &SessionSettlement) -> Result<Self> {
        let namespace = settlement
            .namespaces
            .get(EIP155)
            .ok_or_else(|| Error::Validation(format!("Session {} has no {} namespace", settlement.topic, EIP155)))?;

        let mut approved_chains = namespace
            .chains
            .iter()
            .map(|chain| parse_caip2(chain))
            .collect::<Result<Vec<_>>>()?;

        let mut approved_accounts = Vec::new();
        for reference in &namespace.accounts {
            let (chain_id, address) = parse_caip10(reference)?;
            if !approved_chains.contains(&chain_id) {
                approved_chains.push(chain_id);
            }
            let address = format!("{:?}", address);
            if !approved_accounts.contains(&address) {
                approved_accounts.push(address);
            }
        }
        approved_chains.sort_unstable();
        approved_chains.dedup();

        if approved_chains.is_empty() || approved_accounts.is_empty() {
            return Err(Error::Validation(format!(
                "Session {} must approve at least one chain and account",
                settlement.topic
            )));
        }

        let expiry = Utc
            .timestamp_opt(settlement.expiry, 0)
            .single()
            .ok_or_else(|| Error::Validation(format!("Invalid session expiry: {}", settlement.expiry)))?;

        Ok(Self {
            topic: settlement.topic.clone(),
            peer_metadata: settlement.peer.clone(),
            approved_chains,
            approved_accounts,
            methods: namespace.methods.clone(),
            expiry,
        })
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expiry
    }

    pub fn allows_chain(&self, chain_id: u64) -> bool {
        self.approved_chains.contains(&chain_id)
    }

    pub fn allows_method(&self, method: &str) -> bool {
        self.methods.iter().any(|m| m == method)
    }
}

/// One inbound call awaiting exactly one response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignRequest {
    pub id: u64,
    pub session_topic: String,
    pub method: String,
    pub params: Value,
    pub chain_id: u64,
}

/// Notifications for whoever renders the session UI
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    ProposalReceived(SessionProposal),
    SessionApproved(Session),
    SessionDeleted { topic: String },
    RequestAnswered { topic: String, id: u64, approved: bool },
}
