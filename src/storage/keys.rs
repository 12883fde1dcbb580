//! Storage key names
//!
//! Keys are stable across releases; renaming one orphans existing data.

/// All registered accounts
pub const USERS: &str = "westlinegpt_users";

/// Id of the signed-in user
pub const SESSION_USER: &str = "westlinegpt_session_user";

const CONVERSATIONS_PREFIX: &str = "westlinegpt_convos_";
const GALLERY_PREFIX: &str = "westline_gallery_";

/// Conversation list for an account
pub fn conversations(email: &str) -> String {
    format!("{}{}", CONVERSATIONS_PREFIX, email)
}

/// Image gallery for an account
pub fn gallery(email: &str) -> String {
    format!("{}{}", GALLERY_PREFIX, email)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_user_keys() {
        assert_eq!(
            conversations("a@b.co"),
            "westlinegpt_convos_a@b.co".to_string()
        );
        assert_eq!(gallery("a@b.co"), "westline_gallery_a@b.co".to_string());
    }
}
