//! Hardware-backed keystore boundary

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use zeroize::Zeroizing;

use crate::error::{Error, Result};

/// Text shown by the platform when a read requires biometrics or the device passcode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptOptions {
    pub title: String,
    pub subtitle: Option<String>,
    pub cancel_label: Option<String>,
}

impl Default for PromptOptions {
    fn default() -> Self {
        Self {
            title: "Unlock your wallet".to_string(),
            subtitle: None,
            cancel_label: Some("Use PIN".to_string()),
        }
    }
}

/// Secure enclave / keychain style storage.
///
/// `get_entry` with `None` is a silent read; with `Some` the platform may show
/// a biometric or passcode prompt before releasing the secret.
#[async_trait]
pub trait HardwareKeystore: Send + Sync {
    async fn set_entry(&self, service: &str, secret: &str) -> Result<()>;

    async fn get_entry(&self, service: &str, prompt: Option<&PromptOptions>) -> Result<Option<Zeroizing<String>>>;

    async fn reset_entry(&self, service: &str) -> Result<()>;
}

#[derive(Default)]
struct KeystoreState {
    entries: HashMap<String, Zeroizing<String>>,
    silent_read_fails: bool,
    requires_prompt: bool,
    prompt_denied: bool,
    writes_fail: bool,
    resets_fail: bool,
    prompts_shown: usize,
}

/// Process-local keystore used by tests and headless hosts.
///
/// Each failure mode can be toggled to exercise the fall-through paths of
/// [`SecretStore`](super::SecretStore).
#[derive(Default)]
pub struct InMemoryKeystore {
    state: Mutex<KeystoreState>,
}

impl InMemoryKeystore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Silent reads return an error
    pub fn set_silent_read_fails(&self, fails: bool) {
        self.state.lock().silent_read_fails = fails;
    }

    /// Silent reads return nothing; the secret is only released behind a prompt
    pub fn set_requires_prompt(&self, required: bool) {
        self.state.lock().requires_prompt = required;
    }

    /// The user cancels every prompt
    pub fn set_prompt_denied(&self, denied: bool) {
        self.state.lock().prompt_denied = denied;
    }

    pub fn set_writes_fail(&self, fails: bool) {
        self.state.lock().writes_fail = fails;
    }

    pub fn set_resets_fail(&self, fails: bool) {
        self.state.lock().resets_fail = fails;
    }

    pub fn prompts_shown(&self) -> usize {
        self.state.lock().prompts_shown
    }

    pub fn contains(&self, service: &str) -> bool {
        self.state.lock().entries.contains_key(service)
    }
}

#[async_trait]
impl HardwareKeystore for InMemoryKeystore {
    async fn set_entry(&self, service: &str, secret: &str) -> Result<()> {
        let mut state = self.state.lock();
        if state.writes_fail {
            return Err(Error::Storage("Keystore write rejected".to_string()));
        }
        state
            .entries
            .insert(service.to_string(), Zeroizing::new(secret.to_string()));
        Ok(())
    }

    async fn get_entry(&self, service: &str, prompt: Option<&PromptOptions>) -> Result<Option<Zeroizing<String>>> {
        let mut state = self.state.lock();
        match prompt {
            None => {
                if state.silent_read_fails {
                    return Err(Error::Storage("Keystore unavailable".to_string()));
                }
                if state.requires_prompt {
                    return Ok(None);
                }
            }
            Some(_) => {
                state.prompts_shown += 1;
                if state.prompt_denied {
                    return Err(Error::Authentication("User cancelled authentication".to_string()));
                }
            }
        }
        Ok(state.entries.get(service).cloned())
    }

    async fn reset_entry(&self, service: &str) -> Result<()> {
        let mut state = self.state.lock();
        if state.resets_fail {
            return Err(Error::Storage("Keystore reset rejected".to_string()));
        }
        state.entries.remove(service);
        Ok(())
    }
}
