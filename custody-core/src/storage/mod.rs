//! Secret and account persistence
//!
//! Host platforms provide the hardware keystore and the key-value store; the
//! in-memory implementations back tests and headless embeddings.

pub mod keystore;
pub mod kv;
pub mod secret_store;

pub use keystore::{HardwareKeystore, InMemoryKeystore, PromptOptions};
pub use kv::{InMemoryKeyValueStore, KeyValueStore};
pub use secret_store::SecretStore;
