use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DefinitionParseError {
    #[error("invalid definition JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("definition has no name")]
    MissingName,
    #[error("definition has no channels")]
    NoChannels,
    #[error("duplicate channel index {index}")]
    DuplicateChannelIndex { index: usize },
    #[error("channel indices must be contiguous from 0: expected {expected}, found {found}")]
    NonContiguousChannels { expected: usize, found: usize },
    #[error("channel {index} ('{name}') is flagged 16-bit but does not follow its coarse channel")]
    MisplacedFineChannel { index: usize, name: String },
    #[error("invalid physics: {0}")]
    InvalidPhysics(String),
    #[error("invalid color wheel: {0}")]
    InvalidWheel(String),
}
