//! Engine error taxonomy.
//!
//! Runtime variants (`UnknownCommand`, `WriteDisabled`) are recoverable: the
//! session loop reports them as one diagnostic line and returns to the
//! prompt. Registration and open-time variants are startup failures and
//! abort before the loop begins.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("unknown command `{name}`")]
    UnknownCommand { name: String },

    #[error("write access is disabled (use `enablewrite` first)")]
    WriteDisabled,

    #[error("device `{device}` is mounted; refusing to open it")]
    MountedDeviceRefused { device: String },

    #[error("command table is full ({capacity} entries); cannot register `{name}`")]
    CommandTableFull { name: String, capacity: usize },

    #[error("type catalogue is full ({capacity} entries); cannot register `{name}`")]
    TypeCatalogueFull { name: String, capacity: usize },
}
