//! Decoder for MT5 scene-graph models.
//!
//! Bytes go through [`mt5::Mt5::read`], which rebuilds the node tree, runs every node's
//! strip bytecode and assembles a [`model::Model`] with one shared vertex buffer.
//! [`mesh_processing::consolidate`] cleans the result in place.

pub mod container;
pub mod error;
pub mod hash_db;
pub mod math;
pub mod mesh_processing;
pub mod model;
pub mod mt5;

pub use error::{ConsolidateError, DecodeError, ErrorKind, Result};
pub use mesh_processing::{ConsolidateOptions, ConsolidateReport};
pub use model::{Model, ModelNode, NodeId};
pub use mt5::{decode_model, Mt5, Mt5ReadOptions};
