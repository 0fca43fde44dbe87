use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("I/O error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("malformed object listing: {0}")]
    Listing(String),

    #[error("object store returned {status} for {key}")]
    Status { key: String, status: u16 },

    #[error("workbook error: {0}")]
    Workbook(String),

    #[error("sheet '{0}' not found in workbook")]
    MissingSheet(String),
}

impl SourceError {
    pub(crate) fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        SourceError::Io { path: path.into(), source }
    }
}
