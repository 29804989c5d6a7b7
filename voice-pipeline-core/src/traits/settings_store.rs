use crate::models::error::SettingsError;
use crate::storage::settings::PersistedSettings;

/// Persistence for the user's audio choices across restarts.
pub trait SettingsStore: Send + Sync {
    /// Load the last saved settings, `Ok(None)` if nothing was saved yet.
    fn load(&self) -> Result<Option<PersistedSettings>, SettingsError>;

    fn save(&self, settings: &PersistedSettings) -> Result<(), SettingsError>;
}
