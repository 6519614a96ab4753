use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("History I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("History encoding error: {0}")]
    Json(#[from] serde_json::Error),
}
