//! Configuration access port trait.
//!
//! Lookups are by INI section and key and return the raw text. Parsing and
//! range checks live in `domain::config_validation`, so a malformed value is
//! reported rather than replaced by a default.

pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;

    /// Trimmed value, treating a blank entry the same as a missing one.
    fn get_value(&self, section: &str, key: &str) -> Option<String> {
        self.get_string(section, key)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }
}
