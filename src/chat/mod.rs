//! Chat core: conversation list, reply assembly, quotas, preferences and
//! the image gallery

pub mod assembler;
pub mod gallery;
pub mod preferences;
pub mod quota;
pub mod store;

pub use assembler::{ReplyAssembler, StreamTicket, FAILURE_TEXT};
pub use gallery::Gallery;
pub use quota::{QuotaDecision, QuotaLimits, UsageLimiter};
pub use store::ConversationStore;
