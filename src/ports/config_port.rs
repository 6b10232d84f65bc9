//! Configuration access port trait.

use crate::domain::error::TradetermError;

/// Sectioned key/value configuration (INI layout).
pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    fn get_int(&self, section: &str, key: &str, default: i64) -> i64;
    fn get_double(&self, section: &str, key: &str, default: f64) -> f64;
    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool;

    /// Non-blank string value, or `ConfigMissing`.
    fn require_string(&self, section: &str, key: &str) -> Result<String, TradetermError> {
        self.get_string(section, key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| TradetermError::ConfigMissing {
                section: section.to_string(),
                key: key.to_string(),
            })
    }

    /// Non-negative integer value. Negative values are `ConfigInvalid`.
    fn get_count(&self, section: &str, key: &str, default: usize) -> Result<usize, TradetermError> {
        let value = self.get_int(section, key, default as i64);
        usize::try_from(value).map_err(|_| TradetermError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: format!("{key} must be non-negative, got {value}"),
        })
    }
}
