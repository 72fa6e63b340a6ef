use thiserror::Error;

#[derive(Error, Debug)]
pub enum DemuxError {
    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("parser error: {0}")]
    Parser(String),

    #[error("codec error: {0}")]
    Codec(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("parser used before init")]
    NotInitialized,

    #[error("sample sink error: {0}")]
    Sink(String),

    #[error("pid {pid}: {count} consecutive parse failures")]
    TooManyErrors { pid: u16, count: u32 },
}

impl DemuxError {
    /// Whether the error must abort the whole stream rather than a single PID.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DemuxError::NotInitialized | DemuxError::Sink(_) | DemuxError::TooManyErrors { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, DemuxError>;
