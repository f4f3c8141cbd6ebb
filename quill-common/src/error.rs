use std::fmt;

#[derive(Debug)]
pub enum Error {
    /// The remote service rejected the supplied credentials.
    Authentication { code: String, message: String },
    /// A fault reported by the remote service itself.
    Provider { code: String, message: String },
    /// The operation is not offered by this protocol.
    MethodUnsupported(&'static str),
    /// The service answered, but not with anything we can use.
    InvalidServerResponse {
        operation: String,
        message: String,
        body: String,
    },
    /// The service refused the file upload.
    FileUploadUnsupported { code: String, message: String },
    PostAsDraftUnsupported,
    /// The user (or an injected strategy) declined to continue.
    OperationCancelled,
    Http(reqwest::Error),
    Url(url::ParseError),
    Xml(String),
    Io(std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn invalid_response(
        operation: impl Into<String>,
        message: impl Into<String>,
        body: impl Into<String>,
    ) -> Error {
        Error::InvalidServerResponse {
            operation: operation.into(),
            message: message.into(),
            body: body.into(),
        }
    }

    pub fn provider(code: impl Into<String>, message: impl Into<String>) -> Error {
        Error::Provider {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn authentication(code: impl Into<String>, message: impl Into<String>) -> Error {
        Error::Authentication {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Authentication { code, message } => {
                write!(f, "authentication failed ({}): {}", code, message)
            }
            Error::Provider { code, message } => {
                write!(f, "service error {}: {}", code, message)
            }
            Error::MethodUnsupported(name) => {
                write!(f, "operation not supported by this blog service: {}", name)
            }
            Error::InvalidServerResponse {
                operation, message, ..
            } => write!(f, "invalid response to {}: {}", operation, message),
            Error::FileUploadUnsupported { code, message } => {
                write!(f, "file upload refused ({}): {}", code, message)
            }
            Error::PostAsDraftUnsupported => {
                write!(f, "this blog service cannot save posts as drafts")
            }
            Error::OperationCancelled => write!(f, "operation cancelled"),
            Error::Http(e) => write!(f, "http error: {}", e),
            Error::Url(e) => write!(f, "invalid url: {}", e),
            Error::Xml(msg) => write!(f, "xml error: {}", msg),
            Error::Io(e) => write!(f, "io error: {}", e),
        }
    }
}

impl std::error::Error for Error {}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Http(err)
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::Url(err)
    }
}

impl From<xmltree::ParseError> for Error {
    fn from(err: xmltree::ParseError) -> Self {
        Error::Xml(err.to_string())
    }
}

impl From<xmltree::Error> for Error {
    fn from(err: xmltree::Error) -> Self {
        Error::Xml(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}
