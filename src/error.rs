use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;

use crate::codec::CodecError;
use crate::registry::RegistryError;

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: String,
}

/// Errors that abort a feed operation. Degradable failures never reach here.
#[derive(thiserror::Error, Debug)]
pub enum FeedError {
    #[error("registry: {0}")]
    Registry(#[from] RegistryError),
    #[error("invalid content id: {0}")]
    InvalidId(#[from] CodecError),
    #[error("registry returned {got} owners for {expected} tokens")]
    OwnerMismatch { expected: usize, got: usize },
    #[error("post not found")]
    PostNotFound,
    #[error("reaction already pending")]
    ReactionPending,
    #[error("reaction rejected: {0}")]
    ReactionRejected(String),
    #[error("sign in required")]
    Unauthenticated,
}

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("not found")] NotFound,
    #[error("bad request: {0}")] BadRequest(String),
    #[error("unauthorized")] Unauthorized,
    #[error("conflict")] Conflict,
    #[error("too many requests")] TooManyRequests,
    #[error("upstream error: {0}")] Upstream(String),
}

impl From<FeedError> for ApiError {
    fn from(e: FeedError) -> Self {
        match e {
            FeedError::Registry(r) => ApiError::Upstream(r.to_string()),
            FeedError::InvalidId(c) => ApiError::BadRequest(c.to_string()),
            FeedError::OwnerMismatch { .. } => ApiError::Upstream(e.to_string()),
            FeedError::PostNotFound => ApiError::NotFound,
            FeedError::ReactionPending => ApiError::Conflict,
            FeedError::ReactionRejected(msg) => ApiError::Upstream(msg),
            FeedError::Unauthenticated => ApiError::Unauthorized,
        }
    }
}

impl ResponseError for ApiError {
    fn error_response(&self) -> HttpResponse {
        use actix_web::http::StatusCode;
        let status = match self {
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Conflict => StatusCode::CONFLICT,
            ApiError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
        };
        HttpResponse::build(status).json(ApiErrorBody { error: self.to_string() })
    }
}
