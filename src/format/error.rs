#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("template parsing error: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, Error>;
