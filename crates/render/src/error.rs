use std::path::PathBuf;

/// A frame could not be drawn. The previous frame stays on the surface.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("{width}x{height} surface does not fit in memory")]
    TooLarge { width: u32, height: u32 },

    #[error("failed to reserve {bytes} bytes for the render target")]
    Allocation { bytes: usize },

    #[error("snapshot holds {cells} cells, expected {expected}")]
    SnapshotMismatch { cells: usize, expected: usize },
}

/// Writing a frame failed after every retry. Fatal for the run.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("cannot create output directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("writing {} failed after {attempts} attempts: {source}", path.display())]
    Write {
        path: PathBuf,
        attempts: u32,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Surface(#[from] RenderError),
}
