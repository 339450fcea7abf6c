//! Configuration for the peer session layer

use std::env;

use crate::relay::PeerMetadata;

const DEFAULT_WALLET_NAME: &str = "Custody Wallet";
const DEFAULT_WALLET_DESCRIPTION: &str = "Self-custody multi-chain wallet";
const DEFAULT_WALLET_URL: &str = "https://custody.wallet";

/// Relay credentials and the metadata advertised to peers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectConfig {
    pub project_id: String,
    pub metadata: PeerMetadata,
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            metadata: PeerMetadata {
                name: DEFAULT_WALLET_NAME.to_string(),
                description: DEFAULT_WALLET_DESCRIPTION.to_string(),
                url: DEFAULT_WALLET_URL.to_string(),
                icons: Vec::new(),
            },
        }
    }
}

impl ConnectConfig {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            ..Self::default()
        }
    }

    /// Read `RELAY_PROJECT_ID` and the `WALLET_*` metadata variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(project_id) = lookup("RELAY_PROJECT_ID") {
            config.project_id = project_id;
        }
        if let Some(name) = lookup("WALLET_NAME") {
            config.metadata.name = name;
        }
        if let Some(description) = lookup("WALLET_DESCRIPTION") {
            config.metadata.description = description;
        }
        if let Some(url) = lookup("WALLET_URL") {
            config.metadata.url = url;
        }
        if let Some(icon) = lookup("WALLET_ICON") {
            config.metadata.icons = vec![icon];
        }
        config
    }
}
