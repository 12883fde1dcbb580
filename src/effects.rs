//! Cosmetic effects: aura overlays, the shockwave burst and aura suggestions
//!
//! Nothing here touches storage or the gateway. The coordinator only tracks
//! what the presentation layer should be showing at a given instant.

use crate::models::{Aura, AuraIntensity};
use chrono::{DateTime, Duration, Utc};

/// How long the screen shakes after a shockwave
pub const SHAKE_DURATION_MS: i64 = 800;

/// How long the lightning flash lasts
pub const FLASH_DURATION_MS: i64 = 600;

/// Vibration pattern in milliseconds (on, off, on, off, on)
pub const SHOCKWAVE_HAPTIC_PATTERN: [u64; 5] = [50, 50, 50, 50, 200];

/// Number of particles an aura draws at a given intensity
///
/// # Examples
///
/// ```
/// use westline::effects::particle_count;
/// use westline::models::{Aura, AuraIntensity};
///
/// assert_eq!(particle_count(Aura::Rain, AuraIntensity::High), 100);
/// assert_eq!(particle_count(Aura::Off, AuraIntensity::High), 0);
/// ```
pub fn particle_count(aura: Aura, intensity: AuraIntensity) -> usize {
    let [low, medium, high] = match aura {
        Aura::Off => [0, 0, 0],
        Aura::Rain => [25, 60, 100],
        Aura::IceDrip => [15, 30, 50],
        Aura::Lava => [5, 12, 20],
        Aura::Steam => [8, 15, 25],
        Aura::Fire => [20, 45, 70],
    };
    match intensity {
        AuraIntensity::Low => low,
        AuraIntensity::Medium => medium,
        AuraIntensity::High => high,
    }
}

/// What a shockwave asks the presentation layer to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectBurst {
    /// Shake length; zero when motion is reduced
    pub shake: Duration,
    /// Flash length; zero when motion is reduced
    pub flash: Duration,
    /// Vibration pattern
    pub haptic: &'static [u64],
}

/// A proposed aura change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuraSuggestion {
    /// Aura to switch to
    pub aura: Aura,
    /// Short explanation shown with the offer
    pub reason: &'static str,
    /// Only premium accounts may accept it
    pub is_premium: bool,
}

/// Result of accepting the pending suggestion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuggestionOutcome {
    /// The aura was switched
    Applied(Aura),
    /// The aura needs premium; nothing changed
    PremiumRequired(Aura),
    /// There was nothing to accept
    NoSuggestion,
}

const SUGGESTION_RULES: [(&[&str], AuraSuggestion); 3] = [
    (
        &["sad", "cry", "rain", "blue"],
        AuraSuggestion {
            aura: Aura::Rain,
            reason: "I sense a somber mood.",
            is_premium: false,
        },
    ),
    (
        &["excited", "fire", "bold", "fast"],
        AuraSuggestion {
            aura: Aura::Fire,
            reason: "Matching your high energy!",
            is_premium: true,
        },
    ),
    (
        &["cool", "ice", "freeze"],
        AuraSuggestion {
            aura: Aura::IceDrip,
            reason: "Staying cool.",
            is_premium: false,
        },
    ),
];

/// Tracks aura state and transient effects
#[derive(Debug, Clone, Default)]
pub struct EffectsCoordinator {
    aura: Aura,
    intensity: AuraIntensity,
    reduce_motion: bool,
    shake_until: Option<DateTime<Utc>>,
    flash_until: Option<DateTime<Utc>>,
    pending: Option<AuraSuggestion>,
}

impl EffectsCoordinator {
    /// Start with the given aura at medium intensity
    pub fn new(aura: Aura) -> Self {
        Self {
            aura,
            ..Self::default()
        }
    }

    /// Current aura
    pub fn aura(&self) -> Aura {
        self.aura
    }

    /// Switch aura; clears a pending suggestion for the same aura
    pub fn set_aura(&mut self, aura: Aura) {
        self.aura = aura;
        if self.pending.is_some_and(|s| s.aura == aura) {
            self.pending = None;
        }
    }

    /// Current intensity
    pub fn intensity(&self) -> AuraIntensity {
        self.intensity
    }

    /// Change intensity
    pub fn set_intensity(&mut self, intensity: AuraIntensity) {
        self.intensity = intensity;
    }

    /// True when animated effects are suppressed
    pub fn reduce_motion(&self) -> bool {
        self.reduce_motion
    }

    /// Follow the user's reduce-motion preference
    pub fn set_reduce_motion(&mut self, reduce_motion: bool) {
        self.reduce_motion = reduce_motion;
    }

    /// Particles to draw right now
    pub fn particle_count(&self) -> usize {
        if self.reduce_motion {
            return 0;
        }
        particle_count(self.aura, self.intensity)
    }

    /// Fire a shockwave: shake, lightning flash and a haptic rumble
    ///
    /// With reduced motion only the haptic pattern is reported.
    pub fn trigger_shockwave(&mut self, now: DateTime<Utc>) -> EffectBurst {
        let (shake, flash) = if self.reduce_motion {
            (Duration::zero(), Duration::zero())
        } else {
            (
                Duration::milliseconds(SHAKE_DURATION_MS),
                Duration::milliseconds(FLASH_DURATION_MS),
            )
        };
        self.shake_until = Some(now + shake);
        self.flash_until = Some(now + flash);
        tracing::debug!("Shockwave triggered (reduce motion: {})", self.reduce_motion);
        EffectBurst {
            shake,
            flash,
            haptic: &SHOCKWAVE_HAPTIC_PATTERN,
        }
    }

    /// True while the screen should shake
    pub fn is_shaking(&self, now: DateTime<Utc>) -> bool {
        self.shake_until.is_some_and(|until| now < until)
    }

    /// True while the lightning flash should show
    pub fn is_flashing(&self, now: DateTime<Utc>) -> bool {
        self.flash_until.is_some_and(|until| now < until)
    }

    /// Look for mood keywords in `prompt` and remember a matching suggestion
    ///
    /// The current aura is never suggested.
    pub fn suggest_aura(&mut self, prompt: &str) -> Option<AuraSuggestion> {
        let lower = prompt.to_lowercase();
        let suggestion = SUGGESTION_RULES
            .iter()
            .find(|(words, s)| s.aura != self.aura && words.iter().any(|w| lower.contains(w)))
            .map(|(_, s)| *s);
        if let Some(s) = suggestion {
            tracing::debug!("Suggesting aura {}: {}", s.aura, s.reason);
            self.pending = Some(s);
        }
        suggestion
    }

    /// The suggestion waiting for an answer
    pub fn pending_suggestion(&self) -> Option<AuraSuggestion> {
        self.pending
    }

    /// Accept the pending suggestion
    pub fn accept_suggestion(&mut self, is_premium: bool) -> SuggestionOutcome {
        let Some(suggestion) = self.pending.take() else {
            return SuggestionOutcome::NoSuggestion;
        };
        if suggestion.is_premium && !is_premium {
            return SuggestionOutcome::PremiumRequired(suggestion.aura);
        }
        self.aura = suggestion.aura;
        SuggestionOutcome::Applied(suggestion.aura)
    }

    /// Drop the pending suggestion
    pub fn dismiss_suggestion(&mut self) {
        self.pending = None;
    }

    /// An amped-up rewrite of a short prompt while the Fire aura is on
    pub fn aura_sync_suggestion(&self, prompt: &str) -> Option<String> {
        let len = prompt.chars().count();
        if self.aura == Aura::Fire && len > 5 && len < 30 {
            Some(format!(
                "🔥 {}!!! Tell me more about it with PASSION!",
                prompt.to_uppercase()
            ))
        } else {
            None
        }
    }
}
