/// Main error type for the library.
#[derive(Debug)]
pub enum Error {
    /// Used when the user pass a logically invalid argument to a function,
    /// like malformed shapes or mismatched lengths.
    InvalidArgument(String),
    /// Missing or unreadable file.
    Io(std::io::Error),
    /// The content of a file could not be understood.
    Parser(String),
    /// The input has no extent, like a point set where every point is the centroid.
    DegenerateInput(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::InvalidArgument(err) => write!(f, "Invalid argument: {err}"),
            Error::Io(err) => write!(f, "IO error: {err}"),
            Error::Parser(err) => write!(f, "Parser error: {err}"),
            Error::DegenerateInput(err) => write!(f, "Degenerate input: {err}"),
        }
    }
}

impl Error {
    /// Create a error with the kind `InvalidArgument`.
    /// # Arguments
    /// * `msg` - The error message.
    pub fn invalid_argument<T: ToString>(msg: T) -> Self {
        Error::InvalidArgument(msg.to_string())
    }

    /// Create a error with the kind `Parser`.
    pub fn parser<T: ToString>(msg: T) -> Self {
        Error::Parser(msg.to_string())
    }

    /// Create a error with the kind `DegenerateInput`.
    pub fn degenerate<T: ToString>(msg: T) -> Self {
        Error::DegenerateInput(msg.to_string())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::InvalidArgument(_) => None,
            Error::Parser(_) => None,
            Error::DegenerateInput(_) => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        if err.is_io() {
            Error::Io(err.into())
        } else {
            Error::Parser(err.to_string())
        }
    }
}

impl From<csv::Error> for Error {
    fn from(err: csv::Error) -> Self {
        if err.is_io_error() {
            match err.into_kind() {
                csv::ErrorKind::Io(err) => Error::Io(err),
                other => Error::Parser(format!("{other:?}")),
            }
        } else {
            Error::Parser(err.to_string())
        }
    }
}

impl From<rust_xlsxwriter::XlsxError> for Error {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        match err {
            rust_xlsxwriter::XlsxError::IoError(err) => Error::Io(err),
            other => Error::InvalidArgument(other.to_string()),
        }
    }
}

impl From<ndarray::ShapeError> for Error {
    fn from(err: ndarray::ShapeError) -> Self {
        Error::InvalidArgument(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
