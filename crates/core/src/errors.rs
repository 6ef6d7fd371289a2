use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("signature header is missing")]
    Missing,
    #[error("signature header is malformed (expected `<method>=<hex-digest>`)")]
    Malformed,
    #[error("unsupported signature method `{0}`")]
    UnsupportedMethod(String),
    #[error("signature does not match request body")]
    Mismatch,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum IngressError {
    #[error("webhook authentication failed: {0}")]
    Authentication(#[from] SignatureError),
    #[error("malformed webhook payload: {0}")]
    MalformedPayload(String),
}

/// Status class the HTTP layer should answer with for an ingress failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IngressStatus {
    Unauthorized,
    BadRequest,
}

impl IngressStatus {
    pub fn code(self) -> u16 {
        match self {
            Self::Unauthorized => 401,
            Self::BadRequest => 400,
        }
    }
}

impl IngressError {
    pub fn status(&self) -> IngressStatus {
        match self {
            Self::Authentication(_) => IngressStatus::Unauthorized,
            Self::MalformedPayload(_) => IngressStatus::BadRequest,
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Authentication(_) => "Request signature could not be verified.",
            Self::MalformedPayload(_) => "Request body is not a valid webhook payload.",
        }
    }
}
