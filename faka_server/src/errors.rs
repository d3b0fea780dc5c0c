use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use faka_engine::{
    helpers::{CallbackError, CouponError},
    traits::{ProvisioningError, StorefrontError},
    OrderFlowError,
};
use thiserror::Error;
use traffic_tools::TrafficApiError;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    CouponRejected(CouponError),
    #[error("{0}")]
    InvalidCallback(CallbackError),
    #[error("A valid API key is required.")]
    Unauthorized,
    #[error("The upstream service failed. {0}")]
    UpstreamError(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::CouponRejected(CouponError::NotFound(_)) => StatusCode::NOT_FOUND,
            Self::CouponRejected(_) => StatusCode::BAD_REQUEST,
            Self::InvalidCallback(_) => StatusCode::BAD_REQUEST,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::UpstreamError(_) => StatusCode::BAD_GATEWAY,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

impl From<StorefrontError> for ServerError {
    fn from(e: StorefrontError) -> Self {
        match e {
            StorefrontError::DatabaseError(s) => Self::BackendError(format!("Database error: {s}")),
            StorefrontError::ProductNotFound(_) | StorefrontError::OrderNotFound(_) => {
                Self::NoRecordFound(e.to_string())
            },
            StorefrontError::InsufficientStock { .. } => Self::Conflict(e.to_string()),
            StorefrontError::CouponError(c) => Self::CouponRejected(c),
            StorefrontError::CouponAlreadyExists(_) => Self::Conflict(e.to_string()),
            StorefrontError::InvalidInput(s) => Self::InvalidRequestBody(s),
            StorefrontError::ProvisioningRequired(_) => Self::BackendError(e.to_string()),
            StorefrontError::StateConflict(_) => Self::Conflict(e.to_string()),
        }
    }
}

impl From<OrderFlowError> for ServerError {
    fn from(e: OrderFlowError) -> Self {
        match e {
            OrderFlowError::StorefrontError(e) => e.into(),
            OrderFlowError::CallbackError(e) => Self::InvalidCallback(e),
            OrderFlowError::ProvisioningError(ProvisioningError::NotConfigured) => {
                Self::ConfigurationError(ProvisioningError::NotConfigured.to_string())
            },
            OrderFlowError::ProvisioningError(e) => Self::UpstreamError(e.to_string()),
            OrderFlowError::PaymentRequestError(e) => {
                Self::ConfigurationError(format!("Could not sign the payment request. {e}"))
            },
            OrderFlowError::InvalidInput(s) => Self::InvalidRequestBody(s),
        }
    }
}

impl From<TrafficApiError> for ServerError {
    fn from(e: TrafficApiError) -> Self {
        match e {
            TrafficApiError::NotConfigured => Self::ConfigurationError(e.to_string()),
            e => Self::UpstreamError(e.to_string()),
        }
    }
}
