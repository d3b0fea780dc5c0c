mod api;
mod config;
mod error;
mod helpers;

mod data_objects;

pub use api::TrafficApi;
pub use config::TrafficConfig;
pub use data_objects::{ApiResponse, SubUserUsage};
pub use error::TrafficApiError;
pub use helpers::{random_password, strip_region_suffix, sub_user_name};
