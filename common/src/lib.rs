// Ogmios chain-sync common library - main library exports

pub mod checkpoint;
pub mod point;
pub mod types;
pub mod wire;

// Flattened re-exports
pub use self::checkpoint::{CheckpointStore, InMemoryCheckpointStore};
pub use self::point::*;
pub use self::types::*;
