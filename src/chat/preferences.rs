//! Partial updates to user preferences and profile fields
//!
//! A patch names only the fields it changes. Present fields win over the
//! stored value, absent fields keep it. `Preferences::version` moves forward
//! only when a value actually changes, so repeated identical updates are
//! no-ops.

use crate::models::{LearningLevel, Preferences, Theme, User, Voice};

/// Partial update for [`Preferences`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreferencesPatch {
    /// New reduce-motion flag
    pub reduce_motion: Option<bool>,
    /// New voice
    pub voice: Option<Voice>,
    /// New learning level
    pub learning_level: Option<LearningLevel>,
}

impl PreferencesPatch {
    /// True when the patch names no field
    pub fn is_empty(&self) -> bool {
        self.reduce_motion.is_none() && self.voice.is_none() && self.learning_level.is_none()
    }
}

/// Partial update for the editable parts of a [`User`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfilePatch {
    /// New display name (blank names are ignored)
    pub name: Option<String>,
    /// `Some(None)` clears the picture, `Some(Some(url))` replaces it
    pub profile_picture: Option<Option<String>>,
    /// New theme
    pub theme: Option<Theme>,
    /// Preference changes
    pub preferences: PreferencesPatch,
}

/// Apply a preferences patch
///
/// # Returns
///
/// The merged record; its `version` is one higher than `current` when any
/// value changed.
///
/// # Examples
///
/// ```
/// use westline::chat::preferences::{merge_preferences, PreferencesPatch};
/// use westline::models::{Preferences, Voice};
///
/// let current = Preferences::default();
/// let merged = merge_preferences(&current, &PreferencesPatch {
///     voice: Some(Voice::Kore),
///     ..Default::default()
/// });
/// assert_eq!(merged.voice, Some(Voice::Kore));
/// assert_eq!(merged.version, 1);
/// ```
pub fn merge_preferences(current: &Preferences, patch: &PreferencesPatch) -> Preferences {
    let mut merged = current.clone();

    if let Some(reduce_motion) = patch.reduce_motion {
        merged.reduce_motion = reduce_motion;
    }
    if let Some(voice) = patch.voice {
        merged.voice = Some(voice);
    }
    if let Some(level) = patch.learning_level {
        merged.learning_level = Some(level);
    }

    let changed = merged.reduce_motion != current.reduce_motion
        || merged.voice != current.voice
        || merged.learning_level != current.learning_level;
    if changed {
        merged.version = current.version.saturating_add(1);
    }
    merged
}

/// Apply a profile patch to a user record in place
///
/// # Returns
///
/// `true` when anything changed
pub fn apply_profile_patch(user: &mut User, patch: &ProfilePatch) -> bool {
    let before = user.clone();

    if let Some(name) = patch.name.as_deref().map(str::trim) {
        if !name.is_empty() {
            user.name = name.to_string();
        }
    }
    if let Some(picture) = &patch.profile_picture {
        user.profile_picture = picture.clone();
    }
    if let Some(theme) = patch.theme {
        user.theme = theme;
    }
    user.preferences = merge_preferences(&user.preferences, &patch.preferences);

    *user != before
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_absent_fields_keep_current_values() {
        let current = Preferences {
            reduce_motion: true,
            voice: Some(Voice::Charon),
            learning_level: Some(LearningLevel::Creator),
            version: 4,
        };
        let merged = merge_preferences(
            &current,
            &PreferencesPatch {
                learning_level: Some(LearningLevel::ProPractitioner),
                ..Default::default()
            },
        );
        assert!(merged.reduce_motion);
        assert_eq!(merged.voice, Some(Voice::Charon));
        assert_eq!(merged.learning_level, Some(LearningLevel::ProPractitioner));
        assert_eq!(merged.version, 5);
    }

    #[test]
    fn test_identical_patch_does_not_bump_version() {
        let current = Preferences {
            reduce_motion: false,
            voice: Some(Voice::Puck),
            learning_level: None,
            version: 2,
        };
        let merged = merge_preferences(
            &current,
            &PreferencesPatch {
                reduce_motion: Some(false),
                voice: Some(Voice::Puck),
                learning_level: None,
            },
        );
        assert_eq!(merged, current);
    }

    #[test]
    fn test_empty_patch() {
        assert!(PreferencesPatch::default().is_empty());
        let current = Preferences::default();
        assert_eq!(merge_preferences(&current, &PreferencesPatch::default()), current);
    }

    #[test]
    fn test_profile_patch_clears_picture_and_sets_theme() {
        let mut user = User::new("Ada", "ada@example.com", Utc::now());
        user.profile_picture = Some("data:image/png;base64,AAAA".to_string());

        let changed = apply_profile_patch(
            &mut user,
            &ProfilePatch {
                profile_picture: Some(None),
                theme: Some(Theme::Light),
                ..Default::default()
            },
        );
        assert!(changed);
        assert!(user.profile_picture.is_none());
        assert_eq!(user.theme, Theme::Light);
        assert_eq!(user.preferences.version, 0);
    }

    #[test]
    fn test_profile_patch_ignores_blank_name() {
        let mut user = User::new("Ada", "ada@example.com", Utc::now());
        let changed = apply_profile_patch(
            &mut user,
            &ProfilePatch {
                name: Some("   ".to_string()),
                ..Default::default()
            },
        );
        assert!(!changed);
        assert_eq!(user.name, "Ada");
    }
}
