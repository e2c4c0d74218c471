use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Store(#[from] courier_store::Error),

    #[error(transparent)]
    Common(#[from] courier_common::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
