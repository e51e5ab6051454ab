//! Age-based retention: which unpinned clips have outlived their kind's window.

use crate::{Clip, ClipKind};
use time::{Duration, OffsetDateTime};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub text_max_age: Duration,
    pub image_max_age: Duration,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            text_max_age: Duration::days(3),
            image_max_age: Duration::hours(10),
        }
    }
}

impl RetentionPolicy {
    pub fn threshold(&self, kind: ClipKind) -> Duration {
        match kind {
            ClipKind::Text => self.text_max_age,
            ClipKind::Image => self.image_max_age,
        }
    }

    /// Pinned clips are never evicted; others once strictly older than the threshold.
    pub fn should_evict(&self, clip: &Clip, now: OffsetDateTime) -> bool {
        if clip.pinned {
            return false;
        }
        now - clip.created_at > self.threshold(clip.kind)
    }
}
