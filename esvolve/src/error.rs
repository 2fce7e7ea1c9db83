#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    /// A repository operation failed; the message is the stable,
    /// operation-specific contract string and `source` carries the cause.
    #[error("{message}")]
    Repository {
        message: String,
        #[source]
        source: Box<MigrationError>,
    },

    #[error("{description} - response status is not OK: {status}")]
    StatusNotOk { description: String, status: u16 },

    #[error("transport `{0}`")]
    Transport(#[from] anyhow::Error),

    #[cfg(feature = "http")]
    #[error("reqwest `{0}`")]
    Reqwest(#[from] reqwest::Error),

    #[error("serde_json `{0}`")]
    SerdeJson(#[from] serde_json::Error),

    #[error("unexpected response body: {0}")]
    UnexpectedResponse(String),
}

impl MigrationError {
    pub fn repository(message: impl Into<String>, source: MigrationError) -> Self {
        Self::Repository {
            message: message.into(),
            source: Box::new(source),
        }
    }
}

pub type Result<T> = std::result::Result<T, MigrationError>;
