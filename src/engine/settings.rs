use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

fn default_role() -> String {
    "Bingo Master".to_string()
}

/// Per-user game state, keyed by user id inside `CommunitySettings`.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserState {
    /// Whether a bingo has already been announced for this user's current
    /// sheet. Re-armed when a new sheet is created, never by play.
    #[serde(default)]
    pub bingo_declared: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub declared_at: Option<DateTime<Utc>>,
}

/// Settings scoped to one community, persisted as JSON. Loaded at the
/// start of a command and written back before it replies; nothing is
/// cached across commands.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommunitySettings {
    #[serde(default)]
    pub free_space_enabled: bool,
    /// Name of the chat role that grants game-master permissions. The
    /// connector resolves membership; the core only stores the name.
    #[serde(default = "default_role")]
    pub required_role: String,
    #[serde(default)]
    pub per_user: HashMap<String, UserState>,
}

impl Default for CommunitySettings {
    fn default() -> Self {
        CommunitySettings {
            free_space_enabled: false,
            required_role: default_role(),
            per_user: HashMap::new(),
        }
    }
}

impl CommunitySettings {
    pub fn bingo_declared(&self, user: &str) -> bool {
        self.per_user
            .get(user)
            .map(|state| state.bingo_declared)
            .unwrap_or(false)
    }

    /// Record a win declaration. Returns true exactly once per armed
    /// state: the first call after creation (or reset) declares, every
    /// later call reports that the announcement already went out.
    pub fn declare_bingo(&mut self, user: &str, at: DateTime<Utc>) -> bool {
        let state = self.per_user.entry(user.to_string()).or_default();
        if state.bingo_declared {
            return false;
        }
        state.bingo_declared = true;
        state.declared_at = Some(at);
        true
    }

    /// Re-arm the declaration for a user, called when a fresh sheet is
    /// created for them.
    pub fn reset_bingo(&mut self, user: &str) {
        if let Some(state) = self.per_user.get_mut(user) {
            state.bingo_declared = false;
            state.declared_at = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = CommunitySettings::default();
        assert!(!settings.free_space_enabled);
        assert_eq!(settings.required_role, "Bingo Master");
        assert!(settings.per_user.is_empty());
    }

    #[test]
    fn test_defaults_fill_missing_json_fields() {
        let settings: CommunitySettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, CommunitySettings::default());

        let settings: CommunitySettings =
            serde_json::from_str(r#"{"free_space_enabled": true}"#).unwrap();
        assert!(settings.free_space_enabled);
        assert_eq!(settings.required_role, "Bingo Master");
    }

    #[test]
    fn test_declare_bingo_fires_once() {
        let mut settings = CommunitySettings::default();
        let now = Utc::now();

        assert!(!settings.bingo_declared("77"));
        assert!(settings.declare_bingo("77", now));
        assert!(settings.bingo_declared("77"));

        // Repeated declarations stay silent.
        assert!(!settings.declare_bingo("77", now));
        assert!(!settings.declare_bingo("77", now));
    }

    #[test]
    fn test_reset_rearms_declaration() {
        let mut settings = CommunitySettings::default();
        let now = Utc::now();

        assert!(settings.declare_bingo("77", now));
        settings.reset_bingo("77");
        assert!(!settings.bingo_declared("77"));
        assert!(settings.declare_bingo("77", now));
    }

    #[test]
    fn test_declarations_are_per_user() {
        let mut settings = CommunitySettings::default();
        let now = Utc::now();

        assert!(settings.declare_bingo("77", now));
        assert!(settings.declare_bingo("88", now));
        assert!(!settings.declare_bingo("77", now));
    }

    #[test]
    fn test_settings_json_round_trip() {
        let mut settings = CommunitySettings {
            free_space_enabled: true,
            required_role: "Game Master".to_string(),
            per_user: HashMap::new(),
        };
        settings.declare_bingo("77", Utc::now());

        let json = serde_json::to_string(&settings).unwrap();
        let decoded: CommunitySettings = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, settings);
    }
}
