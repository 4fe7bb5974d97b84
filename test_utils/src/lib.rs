//! Shared test helpers: wire fixtures, a recording checkpoint store and a
//! scripted mock node

pub mod fixtures;
pub mod mock_node;
pub mod store;

pub use fixtures::{block_hash, v5, v6, BLOCK_SIZE, ISSUER_VK};
pub use mock_node::{MockNode, NodeSocket};
pub use store::RecordingStore;
