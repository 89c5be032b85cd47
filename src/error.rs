use derive_more::{Display, Error};

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    #[display("unable to load configuration")]
    Config,
    #[display("unable to open audio source")]
    Source,
    #[display("unable to open cache database")]
    Database,
    #[display("unable to prepare scan")]
    Setup,
    #[display("scan failed")]
    Scan,
    #[display("requested format cannot be decoded")]
    Format,
    #[display("unable to write worker response")]
    Output,
}

impl ErrorKind {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Scan)
    }
}
