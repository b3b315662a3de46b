use crate::stats::DecodeError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unsupported daemon address `{0}`: only unix:// sockets are supported")]
    UnsupportedHost(String),
    #[error("failed to build request: {0}")]
    Request(#[from] hyper::http::Error),
    #[error("cannot connect to the daemon: {0}")]
    Transport(#[source] hyper_util::client::legacy::Error),
    #[error("failed to read response body: {0}")]
    Body(#[source] hyper::Error),
    #[error("error response from daemon: {message}")]
    Api { status: u16, message: String },
    #[error("failed to decode daemon response: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("failed to read stream: {0}")]
    Stream(#[from] DecodeError),
    #[error("event stream closed by the daemon")]
    StreamClosed,
    #[error(transparent)]
    Workload(#[from] crate::workload::Error),
}

impl Error {
    /// Whether this error is the daemon going away mid-stream.
    ///
    /// Such errors happen when the daemon restarts, and end a watch session cleanly
    /// instead of being reported.
    pub fn is_unexpected_eof(&self) -> bool {
        match self {
            Error::Stream(err) => err.is_unexpected_eof(),
            Error::Body(err) => is_cut_off(err),
            Error::StreamClosed => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Whether a body error means the connection ended in the middle of a response.
///
/// hyper reports a cut-off chunked body as a body error caused by an `UnexpectedEof`
/// I/O error, and a cut-off fixed-length body as an incomplete message.
pub(super) fn is_cut_off(err: &hyper::Error) -> bool {
    if err.is_incomplete_message() {
        return true;
    }
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(cause) = source {
        if cause
            .downcast_ref::<std::io::Error>()
            .is_some_and(|io| io.kind() == std::io::ErrorKind::UnexpectedEof)
        {
            return true;
        }
        source = cause.source();
    }
    false
}
