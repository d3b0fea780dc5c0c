use crate::{db_types::Setting, traits::StorefrontError};

/// The runtime key/value settings store. Operators change gateway credentials here without a redeploy.
#[allow(async_fn_in_trait)]
pub trait SettingsManagement {
    async fn fetch_settings(&self) -> Result<Vec<Setting>, StorefrontError>;

    /// Inserts or replaces each setting. Returns the number of settings written.
    async fn upsert_settings(&self, settings: &[Setting]) -> Result<usize, StorefrontError>;
}
