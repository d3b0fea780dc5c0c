use thiserror::Error;

use crate::{
    helpers::{CallbackError, SignatureError},
    traits::{ProvisioningError, StorefrontError},
};

#[derive(Debug, Clone, Error)]
pub enum OrderFlowError {
    #[error("{0}")]
    StorefrontError(#[from] StorefrontError),
    #[error("{0}")]
    CallbackError(#[from] CallbackError),
    #[error("{0}")]
    ProvisioningError(#[from] ProvisioningError),
    #[error("Could not sign the payment request. {0}")]
    PaymentRequestError(#[from] SignatureError),
    #[error("Invalid input. {0}")]
    InvalidInput(String),
}
