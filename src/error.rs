use std::{error::Error as StdError, fmt, io};

#[derive(Debug)]
pub enum Error {
    /// A part header line could not be split into a name and a value,
    /// or one of its values could not be understood.
    MalformedHeader(String),
    /// The input ended before the expected delimiter was found.
    UnterminatedBody,
    /// A `Content-Disposition` header without a `name` parameter.
    MissingFieldName,
    /// Reading the underlying source failed.
    Io(io::Error),

    /// Cannot turn a message without a Content-Type into a form.
    ContentTypeMissing,
    NotMultipart,
    InvalidMimeType(mime::FromStrError),
    BoundaryMissing,
    InvalidBoundary(String),
}

impl Error {
    pub(crate) fn malformed<S: Into<String>>(msg: S) -> Self {
        Error::MalformedHeader(msg.into())
    }

    pub(crate) fn invalid_boundary<S: Into<String>>(msg: S) -> Self {
        Error::InvalidBoundary(msg.into())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::MalformedHeader(ref msg) => write!(f, "Malformed part header: {}", msg),
            Error::UnterminatedBody => {
                write!(f, "Multipart body ended before the closing delimiter")
            }
            Error::MissingFieldName => {
                write!(f, "Content-Disposition header is missing the name parameter")
            }
            Error::Io(ref e) => write!(f, "Reading multipart body: {}", e),
            Error::ContentTypeMissing => write!(f, "Content Type header missing from message"),
            Error::NotMultipart => {
                write!(f, "Cannot handle a non multipart/form-data message as a form.")
            }
            Error::InvalidMimeType(ref e) => write!(f, "Content-Type value invalid: {}", e),
            Error::BoundaryMissing => write!(f, "mime param boundary missing"),
            Error::InvalidBoundary(ref msg) => write!(f, "Invalid boundary: {}", msg),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match *self {
            Error::Io(ref e) => Some(e),
            Error::InvalidMimeType(ref e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(inner: io::Error) -> Self {
        Error::Io(inner)
    }
}

impl From<mime::FromStrError> for Error {
    fn from(inner: mime::FromStrError) -> Self {
        Error::InvalidMimeType(inner)
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn io_errors_keep_their_source() {
        let err = Error::from(io::Error::new(io::ErrorKind::UnexpectedEof, "gone"));

        assert!(err.source().is_some());
        assert_eq!("Reading multipart body: gone", err.to_string());
    }

    #[test]
    fn codec_errors_have_no_source() {
        assert!(Error::UnterminatedBody.source().is_none());
        assert!(Error::MissingFieldName.source().is_none());
        assert!(Error::malformed("no colon").source().is_none());
    }
}
