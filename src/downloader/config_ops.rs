//! Settings access and runtime updates.

use std::sync::Arc;

use crate::config::{Config, Settings, SettingsStore};
use crate::error::{Error, Result};

use super::DownloadManager;

impl DownloadManager {
    /// Static configuration the manager was built with
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Settings store consulted on every request
    pub fn settings_store(&self) -> Arc<dyn SettingsStore> {
        Arc::clone(&self.settings)
    }

    /// Current settings, when the manager owns them
    pub fn settings(&self) -> Option<Settings> {
        self.shared_settings.as_ref().map(|shared| shared.snapshot())
    }

    /// Change settings at runtime; applies to the next request
    ///
    /// Tasks already queued keep the destination and quality they were created with.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when an external [`SettingsStore`] was supplied
    /// to the builder (update that store directly instead), or when the changed
    /// settings fail [`Settings::validate`]. A rejected change is not applied.
    pub fn update_settings(&self, f: impl FnOnce(&mut Settings)) -> Result<()> {
        let shared = self.shared_settings.as_ref().ok_or_else(|| Error::Config {
            message: "settings are managed by an external store".to_string(),
            key: None,
        })?;

        if let Err(e) = shared.update(f) {
            tracing::warn!(error = %e, "Rejected settings update");
            return Err(e);
        }
        let current = shared.snapshot();
        tracing::info!(
            save_dir = ?current.save_dir,
            default_quality = %current.default_quality,
            download_lyrics = current.download_lyrics,
            "Settings updated"
        );
        Ok(())
    }
}
