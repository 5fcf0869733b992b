//! Durable knowledge base for one workflow run.
//!
//! Holds extracted key/value data in a volatile (current attempt) and a persistent
//! (replan-surviving) layer, a bounded history of classified page states, and a
//! bounded list of named checkpoints that can be mirrored to disk.

mod accumulator;
mod checkpoint;
mod error;
mod page_state;
mod store;

pub use accumulator::{AccumulatorConfig, StateAccumulator};
pub use checkpoint::{load_checkpoints, Checkpoint, CHECKPOINT_FILE};
pub use error::StateError;
pub use page_state::{classify, AvailableAction, PageKind, PageSection, SemanticPageState};
pub use store::{is_meaningful_key, ExtractedData, ExtractedDataStore};
