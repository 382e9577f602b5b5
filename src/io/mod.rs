//! Checkpoint persistence
//!
//! A [`CheckpointStore`] owns one experiment directory. Records are written
//! as JSON, and replacing an existing record goes through a
//! [`ConfirmationProvider`] so the engine never reads the terminal itself.

mod confirm;
mod record;
mod state;
mod store;

pub use confirm::{
    Answer, AutoConfirm, ConfirmationProvider, LineConfirmation, ScriptedConfirmation,
    StdinConfirmation,
};
pub use record::CheckpointRecord;
pub use state::{ParameterInfo, ParameterState};
pub use store::{CheckpointStore, ExperimentStatus, CONFIRMATION_ATTEMPTS};
