use thiserror::Error;

#[derive(Debug, Error)]
pub enum SdkError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("raw content path does not exist: {0}")]
    MissingRawContent(String),

    #[error("format error: {0}")]
    Format(#[from] hs_format::FormatError),

    #[error("pack error: {0}")]
    Pack(#[from] hs_pack::PackError),

    #[error("index error: {0}")]
    Index(#[from] hs_index::IndexError),

    #[error("pipeline error: {0}")]
    Pipeline(#[from] hs_pipeline::PipelineError),

    #[error("stream error: {0}")]
    Stream(#[from] hs_streamer::StreamError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type SdkResult<T> = Result<T, SdkError>;
