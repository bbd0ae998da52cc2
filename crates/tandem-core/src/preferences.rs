//! Preference store.
//!
//! Holds the single most recent preference bundle. Read when building a
//! `join_queue` message, either on explicit submission or on automatic
//! requeue. No history is kept.

use tandem_proto::UserPreferences;

/// Last submitted preferences.
#[derive(Debug, Clone, Default)]
pub struct PreferenceStore {
    current: Option<UserPreferences>,
}

impl PreferenceStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored bundle.
    pub fn set(&mut self, preferences: UserPreferences) {
        self.current = Some(preferences);
    }

    /// Last stored bundle, if any.
    pub fn get(&self) -> Option<&UserPreferences> {
        self.current.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use tandem_proto::Gender;

    use super::*;

    #[test]
    fn starts_empty() {
        assert!(PreferenceStore::new().get().is_none());
    }

    #[test]
    fn keeps_only_latest() {
        let mut store = PreferenceStore::new();
        store.set(UserPreferences::new(Gender::Male, Gender::Any, "first", false));
        store.set(UserPreferences::new(Gender::Female, Gender::Male, "second", true));

        let prefs = store.get().map(|p| p.bio_text.as_str());
        assert_eq!(prefs, Some("second"));
    }
}
