//! Westline logo asset and marker translation
//!
//! When asked for the Westline logo the model is instructed to answer with
//! [`LOGO_MARKER`] instead of describing it. [`LogoMarkerFilter`] watches the
//! raw text as it streams in and, once the marker shows up, emits a single
//! [`StreamEvent::AssetAttachment`] carrying the static logo. Nothing
//! downstream ever has to look for the marker in message text.

use crate::gateway::StreamEvent;
use crate::models::ImageAttachment;

/// Text the model emits in place of the logo
pub const LOGO_MARKER: &str = "[[WESTLINE_LOGO]]";

/// Caption shown with the logo
pub const LOGO_CAPTION: &str = "Here is the high-quality WestlineGPT logo you requested!";

/// MIME type of the logo asset
pub const LOGO_MIME_TYPE: &str = "image/svg+xml";

const LOGO_SVG_BASE64: &str = "PHN2ZyB2aWV3Qm94PSIwIDAgMTAwIDEwMCIgZmlsbD0ibm9uZSIgeG1sbnM9Imh0dHA6Ly93d3cudzMub3JnLzIwMDAvc3ZnIj48Y2lyY2xlIGN4PSI1MCIgY3k9IjUwIiByPSI1MCIgZmlsbD0iI0U0OUUxMCIvPjxwYXRoIGQ9Ik0yMiA2OCBMMzggMzIgTDQ2IDU0IEw1NCAzMiBMNzAgNjggSDYwIEw1NCA1MiBMNDggNjggSDM4IEw0NiA0OCBMNDAgNjggSDIyIFoiIGZpbGw9ImJsYWNrIi8+PHBhdGggZD0iTTc1IDI2IEw3OC41IDI5LjUgTDgyIDMyIEw3OC41IDM0LjUgTDc1IDM4IEw3MS41IDM0LjUgTDY4IDMyIEw3MS41IDI5LjUgWiIgZmlsbD0iIzRmNDZlNSIvPjwvc3ZnPg==";

/// The static Westline logo
pub fn logo_attachment() -> ImageAttachment {
    ImageAttachment::from_base64(LOGO_MIME_TYPE, LOGO_SVG_BASE64)
}

/// The event that replaces a reply containing the marker
pub fn logo_event() -> StreamEvent {
    StreamEvent::AssetAttachment {
        caption: LOGO_CAPTION.to_string(),
        image: logo_attachment(),
    }
}

/// Converts raw model text chunks into stream events
///
/// Text is forwarded as it arrives. The marker can be split across chunks,
/// so the full reply seen so far is checked after every chunk; text that
/// could still be the start of the marker is held back until it is
/// resolved either way.
#[derive(Debug, Default)]
pub struct LogoMarkerFilter {
    seen: String,
    pending: String,
    fired: bool,
}

impl LogoMarkerFilter {
    /// Create a filter for one reply
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one raw chunk
    ///
    /// # Returns
    ///
    /// Events to forward, in order. After the logo event fires every later
    /// chunk yields nothing.
    pub fn push(&mut self, chunk: &str) -> Vec<StreamEvent> {
        if self.fired {
            return Vec::new();
        }

        self.seen.push_str(chunk);
        if self.seen.contains(LOGO_MARKER) {
            self.fired = true;
            self.pending.clear();
            return vec![logo_event()];
        }

        self.pending.push_str(chunk);
        let keep = marker_prefix_len(&self.pending);
        let emit_len = self.pending.len() - keep;
        if emit_len == 0 {
            return Vec::new();
        }

        let rest = self.pending.split_off(emit_len);
        let emit = std::mem::replace(&mut self.pending, rest);
        vec![StreamEvent::TextFragment(emit)]
    }

    /// Flush held-back text once the model is done
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        if self.fired || self.pending.is_empty() {
            return Vec::new();
        }
        vec![StreamEvent::TextFragment(std::mem::take(&mut self.pending))]
    }
}

/// Length of the longest suffix of `text` that is a proper prefix of the
/// marker
fn marker_prefix_len(text: &str) -> usize {
    let max = (LOGO_MARKER.len() - 1).min(text.len());
    (1..=max)
        .rev()
        .find(|&n| {
            let start = text.len() - n;
            text.is_char_boundary(start) && LOGO_MARKER.starts_with(&text[start..])
        })
        .unwrap_or(0)
}
