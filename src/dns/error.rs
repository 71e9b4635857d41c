use std::fmt::Display;

/// Failures while answering a query that still deserve a reply: they
/// surface as SERVFAIL rather than a dropped datagram.
#[derive(Debug)]
pub enum HandleError {
    Store(crate::service::database::Error),
}

impl Display for HandleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(error) => write!(f, "store error: {error}"),
        }
    }
}

impl std::error::Error for HandleError {}

impl From<crate::service::database::Error> for HandleError {
    fn from(value: crate::service::database::Error) -> Self {
        Self::Store(value)
    }
}
