//! eip155 capability grants and CAIP identifiers

use custody_core::transaction::chains::parse_caip2;
use custody_core::transaction::SUPPORTED_METHODS;
use custody_core::{Error, Result};
use ethers::types::Address;

use crate::relay::{Namespace, Namespaces};

pub const EIP155: &str = "eip155";

pub const SUPPORTED_EVENTS: [&str; 2] = ["chainChanged", "accountsChanged"];

pub fn caip2(chain_id: u64) -> String {
    format!("{}:{}", EIP155, chain_id)
}

/// `eip155:<chain>:<address>` with the address lowercased
pub fn caip10(chain_id: u64, address: &Address) -> String {
    format!("{}:{:?}", caip2(chain_id), address)
}

pub fn parse_caip10(reference: &str) -> Result<(u64, Address)> {
    let invalid = || Error::Validation(format!("Invalid account reference: {}", reference));
    let (chain, address) = reference.rsplit_once(':').ok_or_else(invalid)?;
    let chain_id = parse_caip2(chain).map_err(|_| invalid())?;
    let address = address.parse::<Address>().map_err(|_| invalid())?;
    Ok((chain_id, address))
}

/// Grant every supported method and event on `chain_ids` for one account
pub fn build_namespaces(address: &str, chain_ids: &[u64]) -> Result<Namespaces> {
    let address = address
        .parse::<Address>()
        .map_err(|_| Error::Validation(format!("Invalid address: {}", address)))?;

    let mut chains: Vec<u64> = chain_ids.to_vec();
    chains.sort_unstable();
    chains.dedup();
    if chains.is_empty() {
        return Err(Error::Validation("At least one chain must be approved".to_string()));
    }

    let namespace = Namespace {
        chains: chains.iter().map(|id| caip2(*id)).collect(),
        accounts: chains.iter().map(|id| caip10(*id, &address)).collect(),
        methods: SUPPORTED_METHODS.iter().map(|m| m.to_string()).collect(),
        events: SUPPORTED_EVENTS.iter().map(|e| e.to_string()).collect(),
    };

    Ok(Namespaces::from([(EIP155.to_string(), namespace)]))
}
