mod amount;
mod helpers;

pub mod op;
mod secret;

pub use amount::{Amount, AmountConversionError, CURRENCY_CODE, CURRENCY_SYMBOL};
pub use helpers::{parse_boolean_flag, parse_number};
pub use secret::Secret;
