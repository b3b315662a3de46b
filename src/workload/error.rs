#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid workload id: {0:?}")]
    InvalidWorkloadID(String),
    #[error("unknown operating system family `{0}`")]
    UnknownOsFamily(String),
}

pub type Result<T> = std::result::Result<T, Error>;
