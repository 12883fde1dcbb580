//! Domain records for Westline
//!
//! Users, conversations, messages and gallery items, plus the small
//! enumerations (aura, voice, learning level, ...) that travel with them.
//! Records serialize with camelCase field names and millisecond timestamps
//! so persisted JSON stays stable across releases.

use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{Result, WestlineError};

/// Build a prefixed random identifier, e.g. `convo_3f2a...`
pub fn new_id(prefix: &str) -> String {
    format!("{}_{}", prefix, Uuid::new_v4().simple())
}

/// Lowercase and strip separators so "Ice Drip", "ice-drip" and "icedrip"
/// compare equal.
fn normalize(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(|c| c.to_lowercase())
        .collect()
}

/// An image carried inline as a base64 data URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageAttachment {
    /// `data:<mime>;base64,<payload>`
    pub data: String,
    /// MIME type of the payload
    pub mime_type: String,
}

impl ImageAttachment {
    /// Wrap an already base64-encoded payload
    pub fn from_base64(mime_type: impl Into<String>, payload: &str) -> Self {
        let mime_type = mime_type.into();
        Self {
            data: format!("data:{};base64,{}", mime_type, payload),
            mime_type,
        }
    }

    /// Encode raw bytes
    pub fn from_bytes(mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        let payload = base64::engine::general_purpose::STANDARD.encode(bytes);
        Self::from_base64(mime_type, &payload)
    }

    /// The base64 payload without the `data:...;base64,` prefix
    pub fn base64_payload(&self) -> &str {
        match self.data.split_once(";base64,") {
            Some((prefix, payload)) if prefix.starts_with("data:") => payload,
            _ => &self.data,
        }
    }

    /// Decode the payload into raw bytes
    pub fn decode(&self) -> Result<Vec<u8>> {
        base64::engine::general_purpose::STANDARD
            .decode(self.base64_payload())
            .map_err(|e| WestlineError::Gateway(format!("Invalid image payload: {}", e)).into())
    }
}

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    /// The signed-in user
    User,
    /// The assistant
    Bot,
}

/// Thumbs up / thumbs down on a bot message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feedback {
    /// Thumbs up
    Like,
    /// Thumbs down
    Dislike,
}

impl Feedback {
    /// Parse feedback from a string
    pub fn parse_str(s: &str) -> std::result::Result<Self, String> {
        match normalize(s).as_str() {
            "like" | "up" => Ok(Self::Like),
            "dislike" | "down" => Ok(Self::Dislike),
            other => Err(format!("Unknown feedback: {}", other)),
        }
    }
}

impl fmt::Display for Feedback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Like => write!(f, "like"),
            Self::Dislike => write!(f, "dislike"),
        }
    }
}

/// A single chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Unique message id
    pub id: String,
    /// Message text; grows while a bot reply streams in
    pub text: String,
    /// Author of the message
    pub sender: Sender,
    /// False only for the in-flight bot placeholder
    pub is_final: bool,
    /// Optional user feedback
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<Feedback>,
    /// Creation time
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    /// Optional attached image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageAttachment>,
}

impl Message {
    /// A finished user message
    pub fn user(text: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: new_id("msg"),
            text: text.into(),
            sender: Sender::User,
            is_final: true,
            feedback: None,
            timestamp: now,
            image: None,
        }
    }

    /// An empty, non-final bot message that a streamed reply fills in
    pub fn bot_placeholder(now: DateTime<Utc>) -> Self {
        Self {
            id: new_id("msg"),
            text: String::new(),
            sender: Sender::Bot,
            is_final: false,
            feedback: None,
            timestamp: now,
            image: None,
        }
    }
}

/// A conversation and the messages it owns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    /// Unique conversation id
    pub id: String,
    /// Display title
    pub title: String,
    /// Messages in send order
    pub messages: Vec<Message>,
    /// Last activity time
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    /// Pinned conversations sort first
    #[serde(default)]
    pub is_pinned: bool,
}

/// Title used until a generated one arrives
pub const DEFAULT_CONVERSATION_TITLE: &str = "New Chat";

impl Conversation {
    /// A new, empty conversation titled "New Chat"
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            id: new_id("convo"),
            title: DEFAULT_CONVERSATION_TITLE.to_string(),
            messages: Vec::new(),
            timestamp: now,
            is_pinned: false,
        }
    }

    /// True when the conversation holds no messages
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Text of the last `n` user messages, oldest first
    pub fn recent_user_texts(&self, n: usize) -> Vec<&str> {
        let mut texts: Vec<&str> = self
            .messages
            .iter()
            .rev()
            .filter(|m| m.sender == Sender::User)
            .take(n)
            .map(|m| m.text.as_str())
            .collect();
        texts.reverse();
        texts
    }
}

/// UI theme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    /// Dark theme
    #[default]
    Dark,
    /// Light theme
    Light,
}

impl Theme {
    /// Parse a theme from a string
    pub fn parse_str(s: &str) -> std::result::Result<Self, String> {
        match normalize(s).as_str() {
            "dark" => Ok(Self::Dark),
            "light" => Ok(Self::Light),
            other => Err(format!("Unknown theme: {}", other)),
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dark => write!(f, "dark"),
            Self::Light => write!(f, "light"),
        }
    }
}

/// Prebuilt speech synthesis voices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Voice {
    /// Puck
    #[default]
    Puck,
    /// Charon
    Charon,
    /// Kore
    Kore,
    /// Fenrir
    Fenrir,
    /// Zephyr
    Zephyr,
}

impl Voice {
    /// Every voice, in menu order
    pub const ALL: [Voice; 5] = [
        Voice::Puck,
        Voice::Charon,
        Voice::Kore,
        Voice::Fenrir,
        Voice::Zephyr,
    ];

    /// Voice name as the speech API expects it
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Puck => "Puck",
            Self::Charon => "Charon",
            Self::Kore => "Kore",
            Self::Fenrir => "Fenrir",
            Self::Zephyr => "Zephyr",
        }
    }

    /// Parse a voice from a string
    pub fn parse_str(s: &str) -> std::result::Result<Self, String> {
        let wanted = normalize(s);
        Self::ALL
            .into_iter()
            .find(|v| normalize(v.as_str()) == wanted)
            .ok_or_else(|| format!("Unknown voice: {}", s))
    }
}

impl fmt::Display for Voice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Persona/verbosity tier that shapes the assistant's tone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LearningLevel {
    /// Zero prior knowledge
    #[default]
    #[serde(rename = "Absolute Beginner")]
    AbsoluteBeginner,
    /// Knows the basics, needs practice
    #[serde(rename = "Beginner Builder")]
    BeginnerBuilder,
    /// Building real projects
    #[serde(rename = "Creator")]
    Creator,
    /// Advanced and skilled
    #[serde(rename = "Pro Practitioner")]
    ProPractitioner,
    /// Expert or leader
    #[serde(rename = "Mentor & Launch")]
    MentorAndLaunch,
}

impl LearningLevel {
    /// Every level, from beginner to expert
    pub const ALL: [LearningLevel; 5] = [
        LearningLevel::AbsoluteBeginner,
        LearningLevel::BeginnerBuilder,
        LearningLevel::Creator,
        LearningLevel::ProPractitioner,
        LearningLevel::MentorAndLaunch,
    ];

    /// Display name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AbsoluteBeginner => "Absolute Beginner",
            Self::BeginnerBuilder => "Beginner Builder",
            Self::Creator => "Creator",
            Self::ProPractitioner => "Pro Practitioner",
            Self::MentorAndLaunch => "Mentor & Launch",
        }
    }

    /// Parse a level from its display name (case and separators ignored)
    pub fn parse_str(s: &str) -> std::result::Result<Self, String> {
        let wanted = normalize(s);
        Self::ALL
            .into_iter()
            .find(|l| normalize(l.as_str()) == wanted)
            .ok_or_else(|| format!("Unknown learning level: {}", s))
    }
}

impl fmt::Display for LearningLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// User preferences
///
/// Changed only through [`crate::chat::preferences`] so that `version`
/// tracks every effective update.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    /// Suppress animated effects
    #[serde(default)]
    pub reduce_motion: bool,
    /// Preferred speech voice
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<Voice>,
    /// Preferred learning level
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub learning_level: Option<LearningLevel>,
    /// Incremented on every effective change
    #[serde(default)]
    pub version: u32,
}

/// A registered account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Unique user id
    pub id: String,
    /// Display name
    pub name: String,
    /// Login email; conversations and gallery are keyed by it
    pub email: String,
    /// Premium accounts have no usage limits
    #[serde(default)]
    pub is_premium: bool,
    /// Image generations used in the current window
    #[serde(default)]
    pub image_generation_count: u32,
    /// Image edits used in the current window
    #[serde(default)]
    pub image_edit_count: u32,
    /// Start of the current usage window (missing on legacy records)
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub usage_window_start: Option<DateTime<Utc>>,
    /// Optional profile picture as a data URL
    #[serde(default)]
    pub profile_picture: Option<String>,
    /// UI theme
    #[serde(default)]
    pub theme: Theme,
    /// User preferences
    #[serde(default)]
    pub preferences: Preferences,
    /// Hex SHA-256 of the password, absent for social and legacy accounts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
}

impl User {
    /// A fresh, non-premium account with an open usage window
    pub fn new(name: impl Into<String>, email: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: new_id("user"),
            name: name.into(),
            email: email.into(),
            is_premium: false,
            image_generation_count: 0,
            image_edit_count: 0,
            usage_window_start: Some(now),
            profile_picture: None,
            theme: Theme::Dark,
            preferences: Preferences::default(),
            password_hash: None,
        }
    }

    /// Usage counter for a quota kind
    pub fn usage_count(&self, kind: QuotaKind) -> u32 {
        match kind {
            QuotaKind::Generate => self.image_generation_count,
            QuotaKind::Edit => self.image_edit_count,
        }
    }

    /// Mutable usage counter for a quota kind
    pub fn usage_count_mut(&mut self, kind: QuotaKind) -> &mut u32 {
        match kind {
            QuotaKind::Generate => &mut self.image_generation_count,
            QuotaKind::Edit => &mut self.image_edit_count,
        }
    }

    /// Preferred voice, falling back to the default
    pub fn voice(&self) -> Voice {
        self.preferences.voice.unwrap_or_default()
    }

    /// Preferred learning level, falling back to the default
    pub fn learning_level(&self) -> LearningLevel {
        self.preferences.learning_level.unwrap_or_default()
    }
}

/// A generated image kept in the user's library
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryItem {
    /// Unique item id
    pub id: String,
    /// Image as a data URL
    pub data: String,
    /// MIME type
    pub mime_type: String,
    /// Prompt the user typed (before quality suffixes)
    pub prompt: String,
    /// Creation time
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

/// Ambient visual theme; cosmetic, but also colors the assistant persona
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Aura {
    /// No aura
    #[default]
    Off,
    /// Rain
    Rain,
    /// Ice drip
    #[serde(rename = "Ice Drip")]
    IceDrip,
    /// Lava
    Lava,
    /// Steam
    Steam,
    /// Fire
    Fire,
}

impl Aura {
    /// Every aura, in menu order
    pub const ALL: [Aura; 6] = [
        Aura::Off,
        Aura::Rain,
        Aura::IceDrip,
        Aura::Lava,
        Aura::Steam,
        Aura::Fire,
    ];

    /// Display name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Off => "Off",
            Self::Rain => "Rain",
            Self::IceDrip => "Ice Drip",
            Self::Lava => "Lava",
            Self::Steam => "Steam",
            Self::Fire => "Fire",
        }
    }

    /// Parse an aura from its display name
    pub fn parse_str(s: &str) -> std::result::Result<Self, String> {
        let wanted = normalize(s);
        Self::ALL
            .into_iter()
            .find(|a| normalize(a.as_str()) == wanted)
            .ok_or_else(|| format!("Unknown aura: {}", s))
    }
}

impl fmt::Display for Aura {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Strength of the aura overlay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AuraIntensity {
    /// Low
    Low,
    /// Medium
    #[default]
    Medium,
    /// High
    High,
}

impl AuraIntensity {
    /// Parse an intensity from a string
    pub fn parse_str(s: &str) -> std::result::Result<Self, String> {
        match normalize(s).as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(format!("Unknown intensity: {}", other)),
        }
    }
}

impl fmt::Display for AuraIntensity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        };
        write!(f, "{}", name)
    }
}

/// The two metered image actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuotaKind {
    /// Text-to-image generation
    Generate,
    /// Image + text editing
    Edit,
}

impl fmt::Display for QuotaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Generate => write!(f, "Generate"),
            Self::Edit => write!(f, "Edit"),
        }
    }
}

/// Aspect ratios offered for image generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AspectRatio {
    /// 1:1
    #[default]
    Square,
    /// 16:9
    Landscape,
    /// 9:16
    Portrait,
    /// 4:3
    Standard,
    /// 3:4
    StandardPortrait,
}

impl AspectRatio {
    /// Every ratio, in menu order
    pub const ALL: [AspectRatio; 5] = [
        AspectRatio::Square,
        AspectRatio::Landscape,
        AspectRatio::Portrait,
        AspectRatio::Standard,
        AspectRatio::StandardPortrait,
    ];

    /// Ratio as the image API expects it
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Square => "1:1",
            Self::Landscape => "16:9",
            Self::Portrait => "9:16",
            Self::Standard => "4:3",
            Self::StandardPortrait => "3:4",
        }
    }

    /// Parse a ratio such as `16:9`
    pub fn parse_str(s: &str) -> std::result::Result<Self, String> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|r| r.as_str() == wanted)
            .ok_or_else(|| format!("Unknown aspect ratio: {}", s))
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Image generation quality preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageQuality {
    /// Prompt sent as typed
    #[default]
    Standard,
    /// Adds a high-detail hint
    Hd,
    /// Adds an ultra-detail hint
    Ultra,
}

impl ImageQuality {
    /// Text appended to the prompt for this preset
    pub fn prompt_suffix(&self) -> &'static str {
        match self {
            Self::Standard => "",
            Self::Hd => ", high detail, high resolution",
            Self::Ultra => ", 4k, ultra detailed, hyper realistic, masterpiece",
        }
    }

    /// Parse a quality preset from a string
    pub fn parse_str(s: &str) -> std::result::Result<Self, String> {
        match normalize(s).as_str() {
            "standard" => Ok(Self::Standard),
            "hd" => Ok(Self::Hd),
            "ultra" => Ok(Self::Ultra),
            other => Err(format!("Unknown quality: {}", other)),
        }
    }
}
