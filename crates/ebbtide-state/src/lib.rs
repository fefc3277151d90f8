//! ebbtide-state — shared scale state for cooperating autoscaler instances.
//!
//! Every running instance of the application keeps a [`ScaleState`] record
//! per managed process type and synchronizes it through a shared key-value
//! store. There is no leader: writers reconcile by last-writer-wins on the
//! record's `updated_at` timestamp, and a reader that observes a newer
//! remote record adopts it wholesale.
//!
//! # Architecture
//!
//! [`SharedStore`] is the narrow key-value interface the rest of the system
//! consumes (get / set / set-with-expiry / delete over small string-encoded
//! records). [`MemoryStore`] backs tests and single-process setups;
//! [`EmbeddedStore`] persists the same interface into a local
//! [redb](https://docs.rs/redb) database for single-node deployments.
//! [`StateRepository`] layers JSON encoding of [`ScaleState`] on top.

pub mod embedded;
pub mod error;
pub mod repo;
pub mod store;
pub mod types;

pub use embedded::EmbeddedStore;
pub use error::{StoreError, StoreResult};
pub use repo::StateRepository;
pub use store::{MemoryStore, SharedStore};
pub use types::ScaleState;
