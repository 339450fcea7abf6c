//! Peer session state machine

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};

use custody_core::transaction::chains::parse_caip2;
use custody_core::transaction::WalletRequest;
use custody_core::{Error, ErrorKind, Result, SigningDispatcher};
use ethers::types::Address;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use super::models::{ManagerState, Session, SessionEvent, SignRequest};
use super::namespaces::build_namespaces;
use crate::approval::{AutoApprove, RequestApproval};
use crate::config::ConnectConfig;
use crate::relay::{codes, JsonRpcError, JsonRpcResponse, RelayClient, RelayEvent, SessionProposal, SessionRequestEvent};

const EVENT_CAPACITY: usize = 64;

type RequestKey = (String, u64);

/// Requests in flight plus the ones already answered, so a redelivered
/// request is never served twice
#[derive(Default)]
struct RequestLedger {
    pending: HashMap<RequestKey, SignRequest>,
    answered: HashSet<RequestKey>,
}

impl RequestLedger {
    fn register(&mut self, request: SignRequest) -> bool {
        let key = (request.session_topic.clone(), request.id);
        if self.pending.contains_key(&key) || self.answered.contains(&key) {
            return false;
        }
        self.pending.insert(key, request);
        true
    }

    fn take(&mut self, topic: &str, id: u64) -> Option<SignRequest> {
        let key = (topic.to_string(), id);
        let request = self.pending.remove(&key)?;
        self.answered.insert(key);
        Some(request)
    }

    fn forget_topic(&mut self, topic: &str) {
        self.answered.retain(|(t, _)| t != topic);
    }
}

/// Owns the peer sessions of one wallet.
///
/// Relay callbacks are served concurrently, one task per inbound request.
/// Every request is answered exactly once, either by the automatic flow or
/// by an explicit [`SessionManager::respond_request`] /
/// [`SessionManager::reject_request`] call, whichever claims it first.
pub struct SessionManager {
    config: ConnectConfig,
    relay: Arc<dyn RelayClient>,
    dispatcher: SigningDispatcher,
    approval: Arc<dyn RequestApproval>,
    init_lock: tokio::sync::Mutex<()>,
    state: RwLock<ManagerState>,
    sessions: RwLock<HashMap<String, Session>>,
    proposals: Mutex<HashMap<u64, SessionProposal>>,
    requests: Mutex<RequestLedger>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionManager {
    pub fn new(config: ConnectConfig, relay: Arc<dyn RelayClient>, dispatcher: SigningDispatcher) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            config,
            relay,
            dispatcher,
            approval: Arc::new(AutoApprove),
            init_lock: tokio::sync::Mutex::new(()),
            state: RwLock::new(ManagerState::Uninitialized),
            sessions: RwLock::new(HashMap::new()),
            proposals: Mutex::new(HashMap::new()),
            requests: Mutex::new(RequestLedger::default()),
            events,
        }
    }

    /// Replace the confirmation hook consulted before each request is signed
    pub fn with_approval(mut self, approval: Arc<dyn RequestApproval>) -> Self {
        self.approval = approval;
        self
    }

    pub fn state(&self) -> ManagerState {
        *self.state.read()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Open the relay, load the sessions it still knows about and start
    /// serving its events. Later calls are no-ops.
    pub async fn initialize(self: &Arc<Self>) -> Result<()> {
        let _guard = self.init_lock.lock().await;
        if self.state() == ManagerState::Ready {
            debug!("Session manager already initialized");
            return Ok(());
        }
        if self.config.project_id.is_empty() {
            return Err(Error::Validation("Relay project id is not configured".to_string()));
        }

        let events = self.relay.init(&self.config.project_id, &self.config.metadata).await?;
        let settlements = self.relay.get_active_sessions().await?;

        let mut restored = 0;
        {
            let mut sessions = self.sessions.write();
            for settlement in &settlements {
                match Session::from_settlement(settlement) {
                    Ok(session) if !session.is_expired() => {
                        sessions.insert(session.topic.clone(), session);
                        restored += 1;
                    }
                    Ok(session) => debug!(topic = %session.topic, "Skipping expired session"),
                    Err(e) => warn!(topic = %settlement.topic, "Dropping unusable session: {}", e),
                }
            }
        }

        tokio::spawn(Self::run_event_loop(Arc::downgrade(self), events));
        *self.state.write() = ManagerState::Ready;

        info!(restored, "Session manager initialized");
        Ok(())
    }

    /// Pair with a peer from its connection URI
    pub async fn pair(&self, uri: &str) -> Result<()> {
        self.ensure_ready()?;
        self.relay.pair(uri).await?;
        info!("Pairing started");
        Ok(())
    }

    pub async fn connect(&self, uri: &str) -> Result<()> {
        self.pair(uri).await
    }

    pub fn pending_proposals(&self) -> Vec<SessionProposal> {
        let mut proposals: Vec<_> = self.proposals.lock().values().cloned().collect();
        proposals.sort_by_key(|p| p.id);
        proposals
    }

    /// Approve a proposal received from the relay
    pub async fn approve(&self, proposal_id: u64, address: &str, chain_ids: &[u64]) -> Result<Session> {
        self.ensure_ready()?;
        self.check_grant(address, chain_ids)?;
        let proposal = self
            .proposals
            .lock()
            .remove(&proposal_id)
            .ok_or_else(|| unknown_proposal(proposal_id))?;
        self.settle(proposal, address, chain_ids).await
    }

    /// Approve `proposal`, granting every supported method on `chain_ids` for `address`
    pub async fn approve_session(&self, proposal: &SessionProposal, address: &str, chain_ids: &[u64]) -> Result<Session> {
        self.ensure_ready()?;
        self.check_grant(address, chain_ids)?;
        let proposal = self
            .proposals
            .lock()
            .remove(&proposal.id)
            .ok_or_else(|| unknown_proposal(proposal.id))?;
        self.settle(proposal, address, chain_ids).await
    }

    pub async fn reject(&self, proposal_id: u64) -> Result<()> {
        self.ensure_ready()?;
        let proposal = self
            .proposals
            .lock()
            .remove(&proposal_id)
            .ok_or_else(|| unknown_proposal(proposal_id))?;
        self.send_rejection(proposal).await
    }

    pub async fn reject_session(&self, proposal: &SessionProposal) -> Result<()> {
        self.ensure_ready()?;
        let proposal = self
            .proposals
            .lock()
            .remove(&proposal.id)
            .ok_or_else(|| unknown_proposal(proposal.id))?;
        self.send_rejection(proposal).await
    }

    /// Live sessions; expired ones are pruned first
    pub fn active_sessions(&self) -> Result<Vec<Session>> {
        self.ensure_ready()?;
        self.prune_expired();
        let mut sessions: Vec<_> = self.sessions.read().values().cloned().collect();
        sessions.sort_by(|a, b| a.topic.cmp(&b.topic));
        Ok(sessions)
    }

    pub async fn disconnect(&self, topic: &str) -> Result<()> {
        self.ensure_ready()?;
        let removed = self.sessions.write().remove(topic).is_some();
        self.requests.lock().forget_topic(topic);
        if !removed {
            debug!(topic, "Disconnecting session unknown locally");
        }

        let reason = JsonRpcError::new(codes::USER_DISCONNECTED, "User disconnected");
        self.relay.disconnect_session(topic, &reason).await?;

        info!(topic, "Session disconnected");
        self.emit(SessionEvent::SessionDeleted { topic: topic.to_string() });
        Ok(())
    }

    pub async fn disconnect_session(&self, topic: &str) -> Result<()> {
        self.disconnect(topic).await
    }

    /// Requests received but not answered yet
    pub fn pending_requests(&self) -> Vec<SignRequest> {
        let mut requests: Vec<_> = self.requests.lock().pending.values().cloned().collect();
        requests.sort_by(|a, b| (&a.session_topic, a.id).cmp(&(&b.session_topic, b.id)));
        requests
    }

    /// Answer a pending request with a result
    pub async fn respond_request(&self, topic: &str, id: u64, result: Value) -> Result<()> {
        self.ensure_ready()?;
        self.claim(topic, id)?;
        self.relay
            .respond_session_request(topic, &JsonRpcResponse::result(id, result))
            .await?;

        info!(topic, id, "Request answered");
        self.emit(SessionEvent::RequestAnswered {
            topic: topic.to_string(),
            id,
            approved: true,
        });
        Ok(())
    }

    /// Answer a pending request with an error
    pub async fn reject_request(&self, topic: &str, id: u64, reason: JsonRpcError) -> Result<()> {
        self.ensure_ready()?;
        self.claim(topic, id)?;
        self.relay
            .reject_session_request(topic, &JsonRpcResponse::error(id, reason.clone()))
            .await?;

        info!(topic, id, code = reason.code, "Request rejected: {}", reason.message);
        self.emit(SessionEvent::RequestAnswered {
            topic: topic.to_string(),
            id,
            approved: false,
        });
        Ok(())
    }

    fn ensure_ready(&self) -> Result<()> {
        match self.state() {
            ManagerState::Ready => Ok(()),
            ManagerState::Uninitialized => Err(Error::NotInitialized),
        }
    }

    fn check_grant(&self, address: &str, chain_ids: &[u64]) -> Result<()> {
        for chain_id in chain_ids {
            self.dispatcher.chains().get(*chain_id)?;
        }
        build_namespaces(address, chain_ids).map(|_| ())
    }

    fn claim(&self, topic: &str, id: u64) -> Result<SignRequest> {
        self.requests
            .lock()
            .take(topic, id)
            .ok_or_else(|| Error::Validation(format!("No pending request {} on {}", id, topic)))
    }

    async fn settle(&self, proposal: SessionProposal, address: &str, chain_ids: &[u64]) -> Result<Session> {
        let namespaces = build_namespaces(address, chain_ids)?;

        let settlement = match self.relay.approve_session(proposal.id, &namespaces).await {
            Ok(settlement) => settlement,
            Err(e) => {
                // still answerable
                self.proposals.lock().insert(proposal.id, proposal);
                return Err(e);
            }
        };

        let session = Session::from_settlement(&settlement)?;
        self.sessions.write().insert(session.topic.clone(), session.clone());

        info!(
            proposal = proposal.id,
            topic = %session.topic,
            peer = %session.peer_metadata.name,
            "Session approved"
        );
        self.emit(SessionEvent::SessionApproved(session.clone()));
        Ok(session)
    }

    async fn send_rejection(&self, proposal: SessionProposal) -> Result<()> {
        if let Err(e) = self.relay.reject_session(proposal.id, &JsonRpcError::user_rejected()).await {
            self.proposals.lock().insert(proposal.id, proposal);
            return Err(e);
        }
        info!(proposal = proposal.id, peer = %proposal.proposer.name, "Session proposal rejected");
        Ok(())
    }

    fn prune_expired(&self) {
        let expired: Vec<String> = {
            let mut sessions = self.sessions.write();
            let topics: Vec<String> = sessions
                .values()
                .filter(|session| session.is_expired())
                .map(|session| session.topic.clone())
                .collect();
            for topic in &topics {
                sessions.remove(topic);
            }
            topics
        };
        if expired.is_empty() {
            return;
        }

        let mut requests = self.requests.lock();
        for topic in &expired {
            requests.forget_topic(topic);
        }
        info!(pruned = expired.len(), "Pruned expired sessions");
    }

    fn live_session(&self, topic: &str) -> Option<Session> {
        self.prune_expired();
        self.sessions.read().get(topic).cloned()
    }

    fn emit(&self, event: SessionEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }

    async fn run_event_loop(manager: Weak<Self>, mut events: mpsc::UnboundedReceiver<RelayEvent>) {
        while let Some(event) = events.recv().await {
            let manager = match manager.upgrade() {
                Some(manager) => manager,
                None => break,
            };
            manager.handle_event(event);
        }
        debug!("Relay event stream closed");
    }

    fn handle_event(self: Arc<Self>, event: RelayEvent) {
        match event {
            RelayEvent::SessionProposal(proposal) => {
                info!(proposal = proposal.id, peer = %proposal.proposer.name, "Session proposal received");
                self.proposals.lock().insert(proposal.id, proposal.clone());
                self.emit(SessionEvent::ProposalReceived(proposal));
            }
            RelayEvent::SessionRequest(request) => {
                tokio::spawn(async move { self.handle_session_request(request).await });
            }
            RelayEvent::SessionDelete { topic } => {
                self.sessions.write().remove(&topic);
                self.requests.lock().forget_topic(&topic);
                info!(topic = %topic, "Session deleted by peer");
                self.emit(SessionEvent::SessionDeleted { topic });
            }
        }
    }

    async fn handle_session_request(&self, event: SessionRequestEvent) {
        let chain_id = parse_caip2(&event.chain_id);
        let request = SignRequest {
            id: event.id,
            session_topic: event.topic,
            method: event.method,
            params: event.params,
            chain_id: chain_id.as_ref().copied().unwrap_or_default(),
        };
        if !self.requests.lock().register(request.clone()) {
            warn!(topic = %request.session_topic, id = request.id, "Ignoring duplicate request");
            return;
        }
        info!(
            topic = %request.session_topic,
            id = request.id,
            method = %request.method,
            chain = %request.chain_id,
            "Request received"
        );

        let topic = request.session_topic.clone();
        let outcome = match chain_id {
            Ok(_) => self.serve(&request).await,
            Err(e) => Err(JsonRpcError::new(codes::INVALID_PARAMS, e.to_string())),
        };

        let answered = match outcome {
            Ok(result) => self.respond_request(&topic, request.id, Value::String(result)).await,
            Err(reason) => self.reject_request(&topic, request.id, reason).await,
        };
        if let Err(e) = answered {
            match e.kind() {
                ErrorKind::Validation => debug!(topic = %topic, id = request.id, "Request answered elsewhere"),
                _ => error!(topic = %topic, id = request.id, "Failed to answer request: {}", e),
            }
        }
    }

    /// Gate the request against its session, then sign it
    async fn serve(&self, request: &SignRequest) -> std::result::Result<String, JsonRpcError> {
        let session = self
            .live_session(&request.session_topic)
            .ok_or_else(|| JsonRpcError::new(codes::USER_REJECTED, "Unknown or expired session"))?;

        if !session.allows_chain(request.chain_id) {
            return Err(JsonRpcError::new(
                codes::UNSUPPORTED_CHAINS,
                format!("Unsupported chain: {}", request.chain_id),
            ));
        }
        if !session.allows_method(&request.method) {
            return Err(JsonRpcError::new(
                codes::UNSUPPORTED_METHODS,
                format!("Unsupported method: {}", request.method),
            ));
        }

        let granted = session
            .approved_accounts
            .first()
            .and_then(|account| account.parse::<Address>().ok())
            .ok_or_else(|| JsonRpcError::new(codes::USER_REJECTED, "Session has no usable account"))?;
        // unaddressed requests sign as the session's first account
        let decoded = WalletRequest::decode(&request.method, &request.params)
            .map_err(|e| rpc_error(&e))?
            .with_default_signer(granted);
        if let Some(address) = decoded.address() {
            let address = format!("{:?}", address);
            if !session.approved_accounts.contains(&address) {
                return Err(JsonRpcError::new(
                    codes::USER_REJECTED,
                    format!("Account {} is not approved for this session", address),
                ));
            }
        }

        if !self.approval.approve(&session, request).await {
            return Err(JsonRpcError::user_rejected());
        }

        self.dispatcher.dispatch(decoded, request.chain_id).await.map_err(|e| {
            warn!(topic = %request.session_topic, id = request.id, "Signing failed: {}", e);
            rpc_error(&e)
        })
    }
}

fn unknown_proposal(proposal_id: u64) -> Error {
    Error::Validation(format!("Unknown proposal: {}", proposal_id))
}

/// Translate a signing failure into the error sent to the peer
pub fn rpc_error(error: &Error) -> JsonRpcError {
    let code = match error {
        Error::UnsupportedOperation(message) if message.starts_with("Unsupported method") => {
            codes::UNSUPPORTED_METHODS
        }
        Error::UnsupportedOperation(_) => codes::UNSUPPORTED_CHAINS,
        _ => match error.kind() {
            ErrorKind::Validation => codes::INVALID_PARAMS,
            ErrorKind::Authentication => codes::USER_REJECTED,
            _ => codes::INTERNAL,
        },
    };
    JsonRpcError::new(code, error.to_string())
}
