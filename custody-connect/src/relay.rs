//! Peer-session relay boundary

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use custody_core::{Error, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

/// JSON-RPC error codes sent back to peers
pub mod codes {
    pub const USER_REJECTED: i64 = 5000;
    pub const UNSUPPORTED_CHAINS: i64 = 5100;
    pub const UNSUPPORTED_METHODS: i64 = 5101;
    pub const USER_DISCONNECTED: i64 = 6000;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL: i64 = -32000;
}

/// Application metadata exchanged during pairing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerMetadata {
    pub name: String,
    pub description: String,
    pub url: String,
    pub icons: Vec<String>,
}

/// Capability grant for one namespace (`eip155`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Namespace {
    /// CAIP-2 chain references
    pub chains: Vec<String>,
    /// CAIP-10 account references
    pub accounts: Vec<String>,
    pub methods: Vec<String>,
    pub events: Vec<String>,
}

pub type Namespaces = BTreeMap<String, Namespace>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionProposal {
    pub id: u64,
    pub proposer: PeerMetadata,
    #[serde(default)]
    pub required_chains: Vec<String>,
    #[serde(default)]
    pub required_methods: Vec<String>,
}

/// A session as settled by the relay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSettlement {
    pub topic: String,
    pub peer: PeerMetadata,
    pub namespaces: Namespaces,
    /// Unix seconds
    pub expiry: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequestEvent {
    pub id: u64,
    pub topic: String,
    /// CAIP-2, e.g. `eip155:1`
    pub chain_id: String,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

/// Events pushed by the relay after `init`
#[derive(Debug, Clone, PartialEq)]
pub enum RelayEvent {
    SessionProposal(SessionProposal),
    SessionRequest(SessionRequestEvent),
    SessionDelete { topic: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

impl JsonRpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn user_rejected() -> Self {
        Self::new(codes::USER_REJECTED, "User rejected the request")
    }
}

/// `{id, jsonrpc: "2.0", result | error}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub id: u64,
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn result(id: u64, result: Value) -> Self {
        Self {
            id,
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: u64, error: JsonRpcError) -> Self {
        Self {
            id,
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(error),
        }
    }
}

/// Client for the relay network. Every method may fail with `Error::Transport`.
#[async_trait]
pub trait RelayClient: Send + Sync {
    /// Open the relay connection; inbound events arrive on the returned channel
    async fn init(&self, project_id: &str, metadata: &PeerMetadata) -> Result<mpsc::UnboundedReceiver<RelayEvent>>;

    async fn pair(&self, uri: &str) -> Result<()>;

    async fn approve_session(&self, proposal_id: u64, namespaces: &Namespaces) -> Result<SessionSettlement>;

    async fn reject_session(&self, proposal_id: u64, reason: &JsonRpcError) -> Result<()>;

    async fn respond_session_request(&self, topic: &str, response: &JsonRpcResponse) -> Result<()>;

    async fn reject_session_request(&self, topic: &str, response: &JsonRpcResponse) -> Result<()>;

    async fn get_active_sessions(&self) -> Result<Vec<SessionSettlement>>;

    async fn disconnect_session(&self, topic: &str, reason: &JsonRpcError) -> Result<()>;
}

#[derive(Default)]
struct RelayState {
    sender: Option<mpsc::UnboundedSender<RelayEvent>>,
    init_calls: usize,
    unavailable: bool,
    pairing_error: Option<String>,
    proposers: HashMap<u64, PeerMetadata>,
    next_topic: u64,
    paired: Vec<String>,
    approved: Vec<(u64, Namespaces)>,
    rejected_proposals: Vec<u64>,
    responses: Vec<(String, JsonRpcResponse)>,
    rejections: Vec<(String, JsonRpcResponse)>,
    active: Vec<SessionSettlement>,
    disconnected: Vec<String>,
}

/// Loopback relay that records every call. Events are injected with [`InMemoryRelay::emit`].
#[derive(Default)]
pub struct InMemoryRelay {
    state: Mutex<RelayState>,
}

impl InMemoryRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver an event as if it came from a peer; false before `init`
    pub fn emit(&self, event: RelayEvent) -> bool {
        let mut state = self.state.lock();
        if let RelayEvent::SessionProposal(proposal) = &event {
            state.proposers.insert(proposal.id, proposal.proposer.clone());
        }
        match &state.sender {
            Some(sender) => sender.send(event).is_ok(),
            None => false,
        }
    }

    /// Fail every call with a transport error
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().unavailable = unavailable;
    }

    pub fn set_pairing_error(&self, error: Option<&str>) {
        self.state.lock().pairing_error = error.map(str::to_string);
    }

    /// Sessions reported by `get_active_sessions`
    pub fn set_active_sessions(&self, sessions: Vec<SessionSettlement>) {
        self.state.lock().active = sessions;
    }

    pub fn init_calls(&self) -> usize {
        self.state.lock().init_calls
    }

    pub fn paired(&self) -> Vec<String> {
        self.state.lock().paired.clone()
    }

    pub fn approved(&self) -> Vec<(u64, Namespaces)> {
        self.state.lock().approved.clone()
    }

    pub fn rejected_proposals(&self) -> Vec<u64> {
        self.state.lock().rejected_proposals.clone()
    }

    pub fn responses(&self) -> Vec<(String, JsonRpcResponse)> {
        self.state.lock().responses.clone()
    }

    pub fn rejections(&self) -> Vec<(String, JsonRpcResponse)> {
        self.state.lock().rejections.clone()
    }

    pub fn disconnected(&self) -> Vec<String> {
        self.state.lock().disconnected.clone()
    }

    fn check_available(state: &RelayState) -> Result<()> {
        if state.unavailable {
            return Err(Error::Transport("Relay unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl RelayClient for InMemoryRelay {
    async fn init(&self, project_id: &str, _metadata: &PeerMetadata) -> Result<mpsc::UnboundedReceiver<RelayEvent>> {
        let mut state = self.state.lock();
        Self::check_available(&state)?;
        if project_id.is_empty() {
            return Err(Error::Transport("Project id rejected by relay".to_string()));
        }
        let (sender, receiver) = mpsc::unbounded_channel();
        state.sender = Some(sender);
        state.init_calls += 1;
        Ok(receiver)
    }

    async fn pair(&self, uri: &str) -> Result<()> {
        let mut state = self.state.lock();
        Self::check_available(&state)?;
        if let Some(error) = &state.pairing_error {
            return Err(Error::Transport(error.clone()));
        }
        state.paired.push(uri.to_string());
        Ok(())
    }

    async fn approve_session(&self, proposal_id: u64, namespaces: &Namespaces) -> Result<SessionSettlement> {
        let mut state = self.state.lock();
        Self::check_available(&state)?;
        state.next_topic += 1;
        let settlement = SessionSettlement {
            topic: format!("topic-{}", state.next_topic),
            peer: state.proposers.get(&proposal_id).cloned().unwrap_or_default(),
            namespaces: namespaces.clone(),
            expiry: (Utc::now() + Duration::days(7)).timestamp(),
        };
        state.approved.push((proposal_id, namespaces.clone()));
        state.active.push(settlement.clone());
        Ok(settlement)
    }

    async fn reject_session(&self, proposal_id: u64, _reason: &JsonRpcError) -> Result<()> {
        let mut state = self.state.lock();
        Self::check_available(&state)?;
        state.rejected_proposals.push(proposal_id);
        Ok(())
    }

    async fn respond_session_request(&self, topic: &str, response: &JsonRpcResponse) -> Result<()> {
        let mut state = self.state.lock();
        Self::check_available(&state)?;
        state.responses.push((topic.to_string(), response.clone()));
        Ok(())
    }

    async fn reject_session_request(&self, topic: &str, response: &JsonRpcResponse) -> Result<()> {
        let mut state = self.state.lock();
        Self::check_available(&state)?;
        state.rejections.push((topic.to_string(), response.clone()));
        Ok(())
    }

    async fn get_active_sessions(&self) -> Result<Vec<SessionSettlement>> {
        let state = self.state.lock();
        Self::check_available(&state)?;
        Ok(state.active.clone())
    }

    async fn disconnect_session(&self, topic: &str, _reason: &JsonRpcError) -> Result<()> {
        let mut state = self.state.lock();
        Self::check_available(&state)?;
        state.active.retain(|s| s.topic != topic);
        state.disconnected.push(topic.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_response_wire_shape() {
        let ok = serde_json::to_value(JsonRpcResponse::result(7, json!("0xabc"))).unwrap();
        assert_eq!(ok, json!({"id": 7, "jsonrpc": "2.0", "result": "0xabc"}));

        let err = serde_json::to_value(JsonRpcResponse::error(8, JsonRpcError::user_rejected())).unwrap();
        assert_eq!(err["error"]["code"], 5000);
        assert!(err.get("result").is_none());
    }

    #[tokio::test]
    async fn test_emit_requires_init() {
        let relay = InMemoryRelay::new();
        assert!(!relay.emit(RelayEvent::SessionDelete { topic: "t".into() }));

        let mut events = relay.init("project", &PeerMetadata::default()).await.unwrap();
        assert!(relay.emit(RelayEvent::SessionDelete { topic: "t".into() }));
        assert_eq!(events.recv().await, Some(RelayEvent::SessionDelete { topic: "t".into() }));
    }

    #[tokio::test]
    async fn test_unavailable_relay_is_transport_error() {
        let relay = InMemoryRelay::new();
        relay.set_unavailable(true);
        let err = relay.pair("wc:abc@2").await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }
}
