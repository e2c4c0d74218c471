use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Store(#[from] courier_store::Error),

    #[error(transparent)]
    Common(#[from] courier_common::Error),

    #[error(transparent)]
    CronParse(#[from] cron::error::Error),

    #[error("unknown trigger type: {kind}")]
    UnknownKind { kind: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("{0}")]
    Message(String),
}

impl Error {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }

    #[must_use]
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }
}

impl courier_common::FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Message(message)
    }
}

courier_common::impl_context!();

pub type Result<T> = std::result::Result<T, Error>;
