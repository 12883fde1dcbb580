//! Prompt text that shapes the WestlineGPT persona
//!
//! The system instruction is assembled from a fixed base, a block for the
//! user's learning level and a line for the current aura. The helpers for
//! titles, follow-up prompts and level changes live here too so every
//! piece of model-facing wording is in one place.

use crate::gateway::logo::LOGO_MARKER;
use crate::models::{Aura, LearningLevel, DEFAULT_CONVERSATION_TITLE};

const BASE_INSTRUCTION: &str = "You are WestlineGPT, a helpful creative assistant developed by Westline Techlabs.\n\n\
**FORMATTING GUIDELINES:**\n\
1. **Casual Chat:** For greetings, simple questions, or short conversational turns, use PLAIN TEXT. Do NOT use bullet points, headers, or excessive bold text. Keep it natural.\n\
2. **Learning & Detailed Content:** When explaining concepts, providing tutorials, listing steps, or giving long answers, you MUST use MARKDOWN. Use bullet points for lists, bolding for key terms, and headers to organize the information clearly.\n\n";

fn level_block(level: LearningLevel) -> &'static str {
    match level {
        LearningLevel::AbsoluteBeginner => "**LEARNING MODE: ABSOLUTE BEGINNER**\n\
- Assume the user has zero prior knowledge.\n\
- Use simple, non-technical language.\n\
- Explain step-by-step with analogies.\n\
- Tone: Encouraging, patient, and welcoming.\n",
        LearningLevel::BeginnerBuilder => "**LEARNING MODE: BEGINNER BUILDER**\n\
- The user knows basics but needs practice.\n\
- Focus on 'how-to' for simple tools and tasks.\n\
- Keep explanations clear but start introducing proper terminology.\n\
- Tone: Supportive and action-oriented.\n",
        LearningLevel::Creator => "**LEARNING MODE: CREATOR**\n\
- The user is building real projects.\n\
- Focus on creative identity, combining tools, and project workflows.\n\
- Offer suggestions for new tools to try.\n\
- Tone: Inspiring and collaborative.\n",
        LearningLevel::ProPractitioner => "**LEARNING MODE: PRO PRACTITIONER**\n\
- The user is advanced and skilled.\n\
- Focus on efficiency, professional workflows, and high-level polish.\n\
- Be concise, technical, and precise.\n\
- Tone: Professional and efficient.\n",
        LearningLevel::MentorAndLaunch => "**LEARNING MODE: MENTOR & LAUNCH**\n\
- The user is an expert or leader.\n\
- Focus on business strategy, portfolio building, and teaching others.\n\
- Discuss industry trends and leadership.\n\
- Tone: Peer-to-peer, strategic, and sophisticated.\n",
    }
}

fn aura_line(aura: Aura) -> &'static str {
    match aura {
        Aura::Rain => "Your personality is calm, reflective, and slightly poetic, like a rainy day.",
        Aura::Fire => "Your personality is bold, energetic, and concise. You get straight to the point with enthusiasm.",
        Aura::IceDrip => "Your personality is cool, sophisticated, and precise. You focus on elegance and clarity.",
        Aura::Lava => "Your personality is intense and flowing. You are passionate about creativity.",
        Aura::Steam => "Your personality is mysterious and ephemeral. You give hints and encourage exploration.",
        Aura::Off => "Be friendly, professional, and helpful.",
    }
}

/// Build the system instruction for one chat turn
///
/// The logo hint is only added when the prompt mentions a logo.
///
/// # Examples
///
/// ```
/// use westline::gateway::persona::system_instruction;
/// use westline::models::{Aura, LearningLevel};
///
/// let text = system_instruction(LearningLevel::Creator, Aura::Rain, "hi");
/// assert!(text.contains("LEARNING MODE: CREATOR"));
/// assert!(text.contains("like a rainy day"));
/// assert!(!text.contains("[[WESTLINE_LOGO]]"));
/// ```
pub fn system_instruction(level: LearningLevel, aura: Aura, prompt: &str) -> String {
    let mut instruction = String::from(BASE_INSTRUCTION);
    instruction.push_str(level_block(level));
    instruction.push_str("\n**AURA PERSONALITY:**\n");
    instruction.push_str(aura_line(aura));

    if prompt.to_lowercase().contains("logo") {
        instruction.push_str(&format!(
            " If the user asks for the Westline logo, include the token {} in your response.",
            LOGO_MARKER
        ));
    }
    instruction
}

/// Prompt asking for a short conversation title
pub fn title_prompt(first_message: &str) -> String {
    format!(
        "Generate a very short, specific title (max 4 words) for a chat starting with: \"{}\". Do NOT use quotation marks.",
        first_message
    )
}

/// Normalize a generated title
///
/// Trims whitespace and one pair of surrounding quotes; an empty result
/// falls back to "New Chat".
pub fn clean_title(raw: &str) -> String {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix(['"', '\'']).unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix(['"', '\'']).unwrap_or(trimmed);
    if trimmed.trim().is_empty() {
        DEFAULT_CONVERSATION_TITLE.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Prompt asking for four follow-up suggestions based on `context`
pub fn follow_up_prompt(context: &str) -> String {
    format!(
        "Based on the following conversation context, generate 4 short, relevant follow-up questions or creative prompts for the user.\n\nContext:\n{}",
        context
    )
}

/// Hidden prompt sent after the user switches learning level
pub fn level_change_prompt(level: LearningLevel) -> String {
    format!(
        "[SYSTEM EVENT: Level Changed to \"{level}\"] You are WestlineGPT. The user has just selected the \"{level}\" learning level. \
Task: 1. Welcome the user to the {level} level. 2. Briefly explain what they will achieve here or how you will help them at this stage. \
3. Provide a short, punchy motivation in the Westline Techlabs tone (Innovative, Empowering, \"Smart Way\"). 4. Keep it concise and encouraging.",
        level = level
    )
}

/// Prompts offered before the user has any history
pub const INITIAL_QUICK_PROMPTS: [&str; 4] = [
    "Suggest a creative project for social media",
    "What are some good color palettes for a tech brand?",
    "Explain what a motion graphic is",
    "How can I monetize my design skills?",
];

/// Prompts used by the "surprise me" image generator
pub const CREATIVE_IMAGE_PROMPTS: [&str; 6] = [
    "A cyberpunk street food vendor in Tokyo, neon lights reflecting on wet pavement, cinematic lighting",
    "A cozy library inside a giant hollow tree, warm lighting, fantasy style, digital art",
    "An astronaut floating in a nebula made of colorful candy, surrealism, high detail",
    "A futuristic eco-city with vertical gardens and solar glass, architectural visualization, 4k",
    "Portrait of a mechanical owl with gears visible, steampunk aesthetic, intricate details",
    "A calm zen garden on Mars, terraformed bubble, red dust outside, lush green inside",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_aura_is_friendly() {
        let text = system_instruction(LearningLevel::AbsoluteBeginner, Aura::Off, "hello");
        assert!(text.starts_with("You are WestlineGPT"));
        assert!(text.contains("ABSOLUTE BEGINNER"));
        assert!(text.ends_with("Be friendly, professional, and helpful."));
    }

    #[test]
    fn test_every_level_has_a_block() {
        for level in LearningLevel::ALL {
            let text = system_instruction(level, Aura::Fire, "x");
            assert!(text.contains(&level.as_str().to_uppercase()));
        }
    }

    #[test]
    fn test_logo_hint_only_when_logo_mentioned() {
        let with = system_instruction(LearningLevel::Creator, Aura::Off, "Show me the LOGO");
        assert!(with.contains("[[WESTLINE_LOGO]]"));
        let without = system_instruction(LearningLevel::Creator, Aura::Off, "Show me a poster");
        assert!(!without.contains("[[WESTLINE_LOGO]]"));
    }

    #[test]
    fn test_clean_title_strips_quotes() {
        assert_eq!(clean_title("  \"Brand Colors\"\n"), "Brand Colors");
        assert_eq!(clean_title("'Motion Basics'"), "Motion Basics");
        assert_eq!(clean_title("Plain"), "Plain");
        assert_eq!(clean_title("  "), "New Chat");
        assert_eq!(clean_title("\"\""), "New Chat");
    }

    #[test]
    fn test_level_change_prompt_names_level() {
        let prompt = level_change_prompt(LearningLevel::MentorAndLaunch);
        assert!(prompt.starts_with("[SYSTEM EVENT: Level Changed to \"Mentor & Launch\"]"));
        assert!(prompt.contains("Welcome the user to the Mentor & Launch level"));
    }

    #[test]
    fn test_prompt_builders_embed_input() {
        assert!(title_prompt("color palettes").contains("\"color palettes\""));
        assert!(follow_up_prompt("a\nb").ends_with("Context:\na\nb"));
    }
}
