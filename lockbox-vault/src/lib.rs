//! Namespaced encrypted storage engine.
//!
//! Stores a conversational client's configuration and history in local
//! key-value backends. Every value lives in a *namespace* identified by
//! `hash(title ++ subtitle)`, with its own random master key.
//!
//! # Architecture
//!
//! - [`StorageTypeResolver`] locks the session to the ephemeral or durable
//!   backend, once, based on whether the session was entered via a share blob.
//! - [`KeyHierarchy`] finds a namespace by trial decryption and opens its
//!   master key with the session key, falling back to the namespace hash.
//! - [`NamespacedStore`] encrypts each value under a key derived from the
//!   master key and a fresh salt.
//!
//! Backends are injected as `Arc<dyn KvBackend>` handles; nothing here
//! touches global state.

mod config;
mod error;
pub mod keys;
mod layout;
pub mod resolver;
mod store;
mod value;

pub use config::VaultConfig;
pub use error::{VaultError, VaultResult};
pub use keys::{namespace_hash, KeyHierarchy, KeySource, NamespaceHandle, Resolution};
pub use layout::KeyLayout;
pub use resolver::{
    durable_scope, EntryContext, StorageClass, StorageClassDecision, StorageTypeResolver,
};
pub use store::{Backends, NamespacedStore};
pub use value::{HistoryEntry, Role, SharePayload, StoredValue};

/// Installs a stderr `tracing` subscriber filtered by `RUST_LOG`
/// (default `info`). Calling it more than once is harmless.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}
