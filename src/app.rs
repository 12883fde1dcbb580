//! Application controller
//!
//! [`ChatApp`] wires the session, the conversation store, the AI gateway,
//! the gallery and the effects coordinator together and exposes the
//! user-level operations: sending messages, managing conversations,
//! changing preferences, generating and editing images, and speech.

use crate::audio::SpeechAudio;
use crate::auth::AuthService;
use crate::chat::gallery::Gallery;
use crate::chat::preferences::{apply_profile_patch, PreferencesPatch, ProfilePatch};
use crate::chat::quota::{QuotaDecision, UsageLimiter};
use crate::config::Config;
use crate::effects::{AuraSuggestion, EffectBurst, EffectsCoordinator};
use crate::error::{FieldError, Result, WestlineError};
use crate::gateway::persona::{
    clean_title, follow_up_prompt, level_change_prompt, CREATIVE_IMAGE_PROMPTS,
    INITIAL_QUICK_PROMPTS,
};
use crate::gateway::{AiGateway, ChatRequest, StreamEvent};
use crate::models::{
    new_id, AspectRatio, Aura, Feedback, GalleryItem, ImageAttachment, ImageQuality, LearningLevel,
    Message, QuotaKind, Voice, DEFAULT_CONVERSATION_TITLE,
};
use crate::session::SessionController;
use crate::storage::KeyValueStore;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Shown when image generation produced nothing
pub const IMAGE_FAILURE_TEXT: &str = "Failed to generate image. Please try a different prompt.";

/// Shown when an image edit produced nothing
pub const EDIT_FAILURE_TEXT: &str = "Failed to edit image. Please try a different prompt.";

/// How a message is sent
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendOptions {
    /// System-triggered: no user message, no title, no nudges
    pub hidden: bool,
    /// Learning level to answer with instead of the user's preference
    pub learning_level: Option<LearningLevel>,
}

/// Result of sending a message
#[derive(Debug, Clone, PartialEq)]
pub struct SendOutcome {
    /// Conversation the exchange happened in
    pub conversation_id: String,
    /// True when the conversation was created by this send
    pub created_conversation: bool,
    /// The finished bot reply
    pub reply: Option<Message>,
    /// True when the reply is the failure apology
    pub failed: bool,
    /// Non-premium user with enough history to be offered premium
    pub suggest_premium: bool,
    /// Aura offered because of the prompt's mood
    pub aura_suggestion: Option<AuraSuggestion>,
    /// Title given to a newly created conversation
    pub title: Option<String>,
}

/// Result of an image generation or edit
#[derive(Debug, Clone, PartialEq)]
pub enum ImageOutcome {
    /// A new image; generated images are also in the gallery
    Ready {
        /// The image
        image: ImageAttachment,
        /// Gallery item created for it
        gallery_item: Option<GalleryItem>,
    },
    /// The usage window is exhausted
    LimitReached {
        /// Which action was refused
        kind: QuotaKind,
        /// When the allowance renews
        renews_at: DateTime<Utc>,
    },
    /// The gateway produced no image; carries the message to show
    Failed(&'static str),
}

/// Remaining image actions in the current window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageStatus {
    /// Generations left, `None` when unlimited
    pub generate_remaining: Option<u32>,
    /// Edits left, `None` when unlimited
    pub edit_remaining: Option<u32>,
    /// End of the current window
    pub renews_at: Option<DateTime<Utc>>,
}

/// Build an attachment from raw image bytes, detecting the format
///
/// # Errors
///
/// Returns a validation error when the bytes are not a recognized image
pub fn attachment_from_bytes(bytes: &[u8]) -> Result<ImageAttachment> {
    let format = image::guess_format(bytes).map_err(|_| {
        WestlineError::Validation(FieldError::new("image", "Unsupported image format."))
    })?;
    Ok(ImageAttachment::from_bytes(format.to_mime_type(), bytes))
}

/// Main application controller
pub struct ChatApp {
    config: Config,
    gateway: Arc<dyn AiGateway>,
    session: SessionController,
    gallery: Gallery,
    effects: EffectsCoordinator,
    speech_cache: HashMap<String, SpeechAudio>,
}

impl ChatApp {
    /// Build the application over a store and a gateway
    pub fn new(config: Config, store: Arc<dyn KeyValueStore>, gateway: Arc<dyn AiGateway>) -> Self {
        let limiter = UsageLimiter::new(config.limits.quota_limits());
        let auth = Arc::new(AuthService::new(Arc::clone(&store), limiter));
        let session = SessionController::new(
            auth,
            Duration::from_millis(config.session.splash_delay_ms),
        );
        let gallery = Gallery::new(store, config.limits.gallery_capacity);
        let effects = EffectsCoordinator::new(config.chat.default_aura);

        Self {
            config,
            gateway,
            session,
            gallery,
            effects,
            speech_cache: HashMap::new(),
        }
    }

    /// Active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The session controller
    pub fn session(&self) -> &SessionController {
        &self.session
    }

    /// The session controller, for sign-in flows and navigation
    pub fn session_mut(&mut self) -> &mut SessionController {
        &mut self.session
    }

    /// Effects state
    pub fn effects(&self) -> &EffectsCoordinator {
        &self.effects
    }

    /// Effects state, mutably
    pub fn effects_mut(&mut self) -> &mut EffectsCoordinator {
        &mut self.effects
    }

    fn user_email(&self) -> Result<String> {
        Ok(self.session.require_user()?.email.clone())
    }

    fn shockwave(&mut self, now: DateTime<Utc>) -> EffectBurst {
        if let Some(user) = self.session.user() {
            self.effects
                .set_reduce_motion(user.preferences.reduce_motion);
        }
        self.effects.trigger_shockwave(now)
    }

    /// Send a user message and stream the reply
    pub async fn send_message(&mut self, text: &str) -> Result<SendOutcome> {
        self.send_with(text, SendOptions::default(), |_| {}).await
    }

    /// Send a message, reporting every applied stream event to `on_event`
    ///
    /// # Errors
    ///
    /// `Validation` for an empty message, `NotAuthenticated` when signed
    /// out, `StreamInFlight` when the conversation is still streaming.
    /// Gateway failures are not errors; they end the reply with the failure
    /// text.
    pub async fn send_with<F>(
        &mut self,
        text: &str,
        options: SendOptions,
        mut on_event: F,
    ) -> Result<SendOutcome>
    where
        F: FnMut(&StreamEvent),
    {
        let text = text.trim();
        if text.is_empty() {
            return Err(WestlineError::Validation(FieldError::new(
                "message",
                "Message cannot be empty.",
            ))
            .into());
        }

        let user = self.session.require_user()?.clone();
        let now = Utc::now();
        let store = self.session.conversations_mut()?;

        let (conversation_id, created) = store.ensure_active(now);
        if store.is_streaming(&conversation_id) {
            return Err(WestlineError::StreamInFlight(conversation_id).into());
        }

        let history = store.history(&conversation_id);
        let prior_messages = store
            .get(&conversation_id)
            .map(|c| c.messages.len())
            .unwrap_or_default();
        if !options.hidden {
            store.append_user_message(&conversation_id, text, now)?;
        }
        let ticket = store.begin_reply(&conversation_id, now)?;

        let sent_messages = prior_messages + usize::from(!options.hidden);
        let suggest_premium = !options.hidden
            && !user.is_premium
            && sent_messages > self.config.chat.premium_nudge_after;

        let title_task = (created && !options.hidden).then(|| {
            let gateway = Arc::clone(&self.gateway);
            let first_message = text.to_string();
            tokio::spawn(async move { gateway.generate_title(&first_message).await })
        });

        let aura_suggestion = if options.hidden {
            None
        } else {
            self.effects.suggest_aura(text)
        };

        let request = ChatRequest {
            prompt: text.to_string(),
            history,
            aura: self.effects.aura(),
            premium: user.is_premium,
            learning_level: options
                .learning_level
                .unwrap_or_else(|| user.learning_level()),
        };

        tracing::info!(
            "Sending message in {} ({} prior turn(s), hidden: {})",
            conversation_id,
            request.history.len(),
            options.hidden
        );

        let mut failed = false;
        match self.gateway.stream_response(request).await {
            Ok(mut events) => {
                while let Some(item) = events.next().await {
                    match item {
                        Ok(event) => {
                            let store = self.session.conversations_mut()?;
                            if store.apply_event(&ticket, event.clone()) {
                                on_event(&event);
                            }
                        }
                        Err(e) => {
                            tracing::error!("Reply stream failed: {:#}", e);
                            failed = true;
                            break;
                        }
                    }
                }
            }
            Err(e) => {
                tracing::warn!("Could not open reply stream: {:#}", e);
                failed = true;
            }
        }

        let store = self.session.conversations_mut()?;
        store.finish_reply(&ticket, failed, Utc::now())?;

        let mut title = None;
        if let Some(task) = title_task {
            let generated = match task.await {
                Ok(Ok(raw)) => clean_title(&raw),
                Ok(Err(e)) => {
                    tracing::warn!("Title generation failed: {:#}", e);
                    DEFAULT_CONVERSATION_TITLE.to_string()
                }
                Err(e) => {
                    tracing::warn!("Title task did not complete: {}", e);
                    DEFAULT_CONVERSATION_TITLE.to_string()
                }
            };
            let store = self.session.conversations_mut()?;
            if store.set_title(&conversation_id, &generated)? {
                title = Some(generated);
            }
        }

        let reply = self
            .session
            .conversations()?
            .reply_message(&ticket)
            .cloned();

        Ok(SendOutcome {
            conversation_id,
            created_conversation: created,
            reply,
            failed,
            suggest_premium,
            aura_suggestion,
            title,
        })
    }

    /// An enhanced prompt to offer instead of `prompt`, for premium users
    /// with an aura on
    pub fn aura_sync_suggestion(&self, prompt: &str) -> Option<String> {
        let premium = self.session.user().is_some_and(|u| u.is_premium);
        if !premium || self.effects.aura() == Aura::Off {
            return None;
        }
        self.effects.aura_sync_suggestion(prompt)
    }

    /// Start a new chat; nothing is created until the next send
    pub fn new_chat(&mut self) -> Result<()> {
        self.session.conversations_mut()?.new_chat();
        Ok(())
    }

    /// Switch to another conversation
    pub fn select_conversation(&mut self, id: &str) -> Result<()> {
        self.session.conversations_mut()?.select(id)
    }

    /// Delete a conversation
    pub fn delete_conversation(&mut self, id: &str) -> Result<()> {
        self.session.conversations_mut()?.delete(id)
    }

    /// Toggle a conversation's pin; returns the new state
    pub fn toggle_pin(&mut self, id: &str) -> Result<bool> {
        self.session.conversations_mut()?.toggle_pin(id)
    }

    /// Rename a conversation
    pub fn rename_conversation(&mut self, id: &str, title: &str) -> Result<()> {
        self.session.conversations_mut()?.rename(id, title)
    }

    /// Delete every conversation
    pub fn clear_history(&mut self) -> Result<()> {
        self.speech_cache.clear();
        self.session.conversations_mut()?.clear()
    }

    /// Toggle feedback on a message in any conversation
    ///
    /// A dislike fires a shockwave.
    pub fn set_feedback(
        &mut self,
        message_id: &str,
        feedback: Feedback,
    ) -> Result<(Option<Feedback>, Option<EffectBurst>)> {
        let store = self.session.conversations_mut()?;
        let conversation_id = store
            .find_message(message_id)
            .map(|(c, _)| c.id.clone())
            .ok_or_else(|| WestlineError::MessageNotFound(message_id.to_string()))?;
        let current = store.set_feedback(&conversation_id, message_id, feedback)?;

        let burst = (feedback == Feedback::Dislike).then(|| self.shockwave(Utc::now()));
        Ok((current, burst))
    }

    /// Switch learning level and let the assistant greet the user at it
    pub async fn change_learning_level(
        &mut self,
        level: LearningLevel,
    ) -> Result<(EffectBurst, SendOutcome)> {
        self.update_profile(&ProfilePatch {
            preferences: PreferencesPatch {
                learning_level: Some(level),
                ..Default::default()
            },
            ..Default::default()
        })?;
        let burst = self.shockwave(Utc::now());
        tracing::info!("Learning level changed to {}", level);

        let outcome = self
            .send_with(
                &level_change_prompt(level),
                SendOptions {
                    hidden: true,
                    learning_level: Some(level),
                },
                |_| {},
            )
            .await?;
        Ok((burst, outcome))
    }

    /// Unlock premium with an access code
    ///
    /// # Returns
    ///
    /// The celebration burst, or `None` when the code is wrong
    pub fn unlock_premium(&mut self, code: &str) -> Result<Option<EffectBurst>> {
        self.session.require_user()?;
        if code != self.config.premium.access_code {
            tracing::info!("Rejected premium access code");
            return Ok(None);
        }
        self.session.mutate_user(|u| u.is_premium = true)?;
        tracing::info!("Premium unlocked");
        Ok(Some(self.shockwave(Utc::now())))
    }

    /// Apply a profile patch and persist it
    ///
    /// # Returns
    ///
    /// `true` when anything changed
    pub fn update_profile(&mut self, patch: &ProfilePatch) -> Result<bool> {
        let changed = self
            .session
            .mutate_user(|user| apply_profile_patch(user, patch))?;
        if let Some(user) = self.session.user() {
            self.effects
                .set_reduce_motion(user.preferences.reduce_motion);
        }
        Ok(changed)
    }

    /// Prompts to offer on an empty chat
    ///
    /// Derived from the last three user messages of the most recent other
    /// conversation; the built-in prompts are used when there is nothing to
    /// go on or the gateway fails.
    pub async fn quick_prompts(&self) -> Result<Vec<String>> {
        let fallback = || INITIAL_QUICK_PROMPTS.iter().map(|s| s.to_string()).collect();
        let store = self.session.conversations()?;

        if store.active().is_some_and(|c| !c.is_empty()) {
            return Ok(fallback());
        }
        let Some(source) = store.most_recent(store.active_id()) else {
            return Ok(fallback());
        };
        let context = source.recent_user_texts(3).join("\n");
        if context.trim().is_empty() {
            return Ok(fallback());
        }

        match self
            .gateway
            .generate_json_list(&follow_up_prompt(&context))
            .await
        {
            Ok(prompts) => {
                let prompts: Vec<String> = prompts
                    .into_iter()
                    .map(|p| p.trim().to_string())
                    .filter(|p| !p.is_empty())
                    .take(INITIAL_QUICK_PROMPTS.len())
                    .collect();
                if prompts.is_empty() {
                    Ok(fallback())
                } else {
                    Ok(prompts)
                }
            }
            Err(e) => {
                tracing::warn!("Could not generate quick prompts: {:#}", e);
                Ok(fallback())
            }
        }
    }

    /// A random creative image prompt
    pub fn surprise_prompt(&self) -> &'static str {
        let index = rand::rng().random_range(0..CREATIVE_IMAGE_PROMPTS.len());
        CREATIVE_IMAGE_PROMPTS[index]
    }

    /// Remaining image actions for the signed-in user
    pub fn usage_status(&self, now: DateTime<Utc>) -> Result<UsageStatus> {
        let user = self.session.require_user()?;
        let limiter = self.session.auth().limiter();
        Ok(UsageStatus {
            generate_remaining: limiter.remaining(user, QuotaKind::Generate, now),
            edit_remaining: limiter.remaining(user, QuotaKind::Edit, now),
            renews_at: if user.is_premium {
                None
            } else {
                limiter.renews_at(user)
            },
        })
    }

    /// Generate an image and keep it in the gallery
    pub async fn generate_image(
        &mut self,
        prompt: &str,
        aspect_ratio: AspectRatio,
        quality: ImageQuality,
    ) -> Result<ImageOutcome> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(WestlineError::Validation(FieldError::new(
                "prompt",
                "Please describe the image you want.",
            ))
            .into());
        }
        let email = self.user_email()?;
        let now = Utc::now();
        if let QuotaDecision::Denied { renews_at } =
            self.session.consume_quota(QuotaKind::Generate, now)?
        {
            return Ok(ImageOutcome::LimitReached {
                kind: QuotaKind::Generate,
                renews_at,
            });
        }

        let full_prompt = format!("{}{}", prompt, quality.prompt_suffix());
        tracing::info!("Generating {} image", aspect_ratio);
        let image = match self.gateway.generate_image(&full_prompt, aspect_ratio).await {
            Ok(Some(image)) => image,
            Ok(None) => {
                tracing::warn!("Image model returned no image");
                return Ok(ImageOutcome::Failed(IMAGE_FAILURE_TEXT));
            }
            Err(e) => {
                tracing::warn!("Image generation failed: {:#}", e);
                return Ok(ImageOutcome::Failed(IMAGE_FAILURE_TEXT));
            }
        };

        let item = GalleryItem {
            id: new_id("img"),
            data: image.data.clone(),
            mime_type: image.mime_type.clone(),
            prompt: prompt.to_string(),
            timestamp: now,
        };
        // Quota is already consumed; the image is delivered even when the
        // gallery write fails.
        let gallery_item = match self.gallery.save(&email, item.clone()) {
            Ok(_) => Some(item),
            Err(e) => {
                tracing::warn!("Could not save image to gallery: {:#}", e);
                None
            }
        };
        Ok(ImageOutcome::Ready {
            image,
            gallery_item,
        })
    }

    /// Edit an image according to a prompt
    pub async fn edit_image(&mut self, image: &ImageAttachment, prompt: &str) -> Result<ImageOutcome> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(WestlineError::Validation(FieldError::new(
                "prompt",
                "Please describe the edit you want.",
            ))
            .into());
        }
        if let QuotaDecision::Denied { renews_at } =
            self.session.consume_quota(QuotaKind::Edit, Utc::now())?
        {
            return Ok(ImageOutcome::LimitReached {
                kind: QuotaKind::Edit,
                renews_at,
            });
        }

        match self.gateway.edit_image(image, prompt).await {
            Ok(Some(edited)) => Ok(ImageOutcome::Ready {
                image: edited,
                gallery_item: None,
            }),
            Ok(None) => {
                tracing::warn!("Image model returned no edit");
                Ok(ImageOutcome::Failed(EDIT_FAILURE_TEXT))
            }
            Err(e) => {
                tracing::warn!("Image edit failed: {:#}", e);
                Ok(ImageOutcome::Failed(EDIT_FAILURE_TEXT))
            }
        }
    }

    /// Speak a message in the user's voice; results are cached per message
    pub async fn speak_message(&mut self, message_id: &str) -> Result<Option<SpeechAudio>> {
        if let Some(audio) = self.speech_cache.get(message_id) {
            tracing::debug!("Speech cache hit for {}", message_id);
            return Ok(Some(audio.clone()));
        }

        let text = self
            .session
            .conversations()?
            .find_message(message_id)
            .map(|(_, m)| m.text.clone())
            .ok_or_else(|| WestlineError::MessageNotFound(message_id.to_string()))?;

        let audio = self.speak_text(&text).await?;
        if let Some(audio) = &audio {
            self.speech_cache
                .insert(message_id.to_string(), audio.clone());
        }
        Ok(audio)
    }

    /// Speak arbitrary text in the user's voice
    pub async fn speak_text(&self, text: &str) -> Result<Option<SpeechAudio>> {
        let voice = self.session.require_user()?.voice();
        self.speak_text_as(text, voice).await
    }

    /// Speak text in a specific voice
    ///
    /// Synthesis failures are logged and reported as `None`.
    pub async fn speak_text_as(&self, text: &str, voice: Voice) -> Result<Option<SpeechAudio>> {
        self.session.require_user()?;
        match self.gateway.synthesize_speech(text, voice).await {
            Ok(audio) => Ok(audio),
            Err(e) => {
                tracing::warn!("Speech synthesis failed: {:#}", e);
                Ok(None)
            }
        }
    }

    /// The signed-in user's gallery, newest first
    pub fn gallery_items(&self) -> Result<Vec<GalleryItem>> {
        self.gallery.list(&self.user_email()?)
    }

    /// One gallery item
    pub fn gallery_item(&self, id: &str) -> Result<Option<GalleryItem>> {
        self.gallery.get(&self.user_email()?, id)
    }

    /// Remove a gallery item
    pub fn delete_gallery_item(&mut self, id: &str) -> Result<Vec<GalleryItem>> {
        let email = self.user_email()?;
        self.gallery.delete(&email, id)
    }

    /// Sign out, dropping session state and cached audio
    pub fn logout(&mut self) -> Result<()> {
        self.speech_cache.clear();
        self.effects.dismiss_suggestion();
        self.session.dispose()
    }
}
