//! Saving and loading vessels in the block config format

pub mod node;
pub mod vessel;

use thiserror::Error;

use crate::behaviour::BehaviourError;
use crate::core::error::SolverError;

pub use node::{ConfigNode, NodeError};
pub use vessel::{load_file, load_processor, load_str, save_file, save_processor, LoadedVessel};

/// Errors raised while reading or writing saved vessels
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("Failed to parse vessel: {0}")]
    Node(#[from] NodeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Behaviour error: {0}")]
    Behaviour(#[from] BehaviourError),

    #[error("Solver error: {0}")]
    Solver(#[from] SolverError),

    #[error("Invalid {field}: {reason}")]
    Invalid { field: String, reason: String },

    /// A single malformed entry that was left out of a loaded vessel
    #[error("Skipped {kind} #{index}: {source}")]
    Skipped {
        kind: String,
        index: usize,
        #[source]
        source: Box<PersistError>,
    },
}
