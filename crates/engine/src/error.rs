use std::path::PathBuf;

use crate::control::ControlError;
use crate::core::ConfigError;
use crate::render::{RecordError, RenderError};

/// Everything that can end a run early.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("cannot read config {}: {source}", path.display())]
    ReadConfig {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    ParseConfig(#[from] serde_json::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error(transparent)]
    Control(#[from] ControlError),
}
