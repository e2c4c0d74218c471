use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Store(#[from] courier_store::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("responder returned HTTP {status}: {body}")]
    Responder { status: u16, body: String },
}

pub type Result<T> = std::result::Result<T, Error>;
