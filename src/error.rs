use reqwest::StatusCode;
use thiserror::Error;

/// Everything that can go wrong while talking to the API.
#[derive(Error, Debug)]
pub enum ApiError {
    /// The request could not be sent, or its body could not be read.
    #[error("Failed to execute API call: {uri}")]
    Transport {
        uri: String,
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a status we don't accept.
    #[error("{message} (HTTP {status})")]
    Status { status: u16, message: String },

    /// The server rejected our access token.
    /// This is the only error that triggers a re-authenticated retry.
    #[error("Unauthorized: {uri}")]
    Unauthorized { uri: String },

    /// The response body was not the XML we expected for `type_name`.
    #[error("Failed to parse response as {type_name}")]
    Parse {
        status: Option<u16>,
        type_name: &'static str,
        #[source]
        source: quick_xml::de::DeError,
    },

    /// The OAuth2 password grant did not give us a token.
    #[error("Failed to acquire access token: {message}")]
    TokenAcquisition {
        status: Option<u16>,
        message: String,
    },

    #[error("Invalid cloud URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl ApiError {
    /// The HTTP status attached to this error, if the server got far enough to send one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Unauthorized { .. } => Some(StatusCode::UNAUTHORIZED.as_u16()),
            ApiError::Parse { status, .. } => *status,
            ApiError::TokenAcquisition { status, .. } => *status,
            ApiError::Transport { .. } | ApiError::InvalidUrl(_) => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized { .. })
    }

    /// Maps a non-success response status to an error.
    /// 401 is singled out so the client knows to refresh its token.
    pub(crate) fn from_status(uri: &str, status: StatusCode, message: String) -> Self {
        if status == StatusCode::UNAUTHORIZED {
            return ApiError::Unauthorized {
                uri: uri.to_string(),
            };
        }
        ApiError::Status {
            status: status.as_u16(),
            message,
        }
    }
}
