use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("failed to open word list {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed word list: {0}")]
    Wordlist(#[from] csv::Error),

    #[error("session {0} has no rows in the word list")]
    EmptySession(u32),

    #[error("need at least two delay lengths to permute, got {0}")]
    NotEnoughDelays(usize),
}
