//! Generated image association
//!
//! Images produced for a page are attached to the most recent html entry of
//! the timeline that rendered it.

use crate::error::Result;
use crate::ledger::last_html_mut;
use crate::store::SessionStore;
use crate::types::{GeneratedImage, SessionRecord};
use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

pub const DEFAULT_IMAGE_RATIO: &str = "1:1";
pub const DEFAULT_IMAGE_PROVIDER: &str = "openai";
pub const DEFAULT_IMAGE_MODEL: &str = "gpt-image-1.5";
pub const DEFAULT_IMAGE_MIME: &str = "image/png";

fn fill(field: &mut String, default: impl FnOnce() -> String) {
    if field.trim().is_empty() {
        *field = default();
    }
}

impl GeneratedImage {
    /// Fill every missing field with its default.
    ///
    /// A missing url becomes a data URL when the image bytes are inline,
    /// else the `/generated-images/{cacheKey}.png` route.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        fill(&mut self.id, || Uuid::new_v4().to_string());
        fill(&mut self.ratio, || DEFAULT_IMAGE_RATIO.to_string());
        fill(&mut self.provider, || DEFAULT_IMAGE_PROVIDER.to_string());
        fill(&mut self.model_id, || DEFAULT_IMAGE_MODEL.to_string());
        fill(&mut self.mime_type, || DEFAULT_IMAGE_MIME.to_string());
        if self.cache_key.is_empty() {
            self.cache_key = self.id.clone();
        }
        if self.url.trim().is_empty() {
            self.url = match self.base64.as_deref().filter(|b| !b.is_empty()) {
                Some(data) => format!("data:{};base64,{}", self.mime_type, data),
                None => format!("/generated-images/{}.png", self.cache_key),
            };
        }
        if self.created_at.is_none() {
            self.created_at = Some(Utc::now());
        }
        self
    }
}

impl SessionRecord {
    /// Attach `image` to the last html entry of the base timeline or a
    /// branch. Returns false when that timeline has no html entry yet.
    pub fn attach_image(&mut self, image: GeneratedImage, branch_id: Option<&str>) -> Result<bool> {
        let entries = match branch_id {
            Some(id) => &mut self.branch_mut(id)?.history,
            None => {
                self.ensure_base_writable()?;
                &mut self.history
            }
        };
        Ok(match last_html_mut(entries) {
            Some(entry) => {
                entry.generated_images.push(image.normalized());
                true
            }
            None => false,
        })
    }
}

impl SessionStore {
    /// Record an image against the page that requested it.
    ///
    /// Returns `Ok(false)` without creating anything when the session is
    /// unknown or its timeline has no html entry.
    pub fn record_generated_image(
        &self,
        sid: &str,
        image: GeneratedImage,
        branch_id: Option<&str>,
    ) -> Result<bool> {
        let attached = self
            .write_existing(sid, |record, _| record.attach_image(image, branch_id))?
            .unwrap_or(false);
        debug!(session_id = %sid, branch_id = ?branch_id, attached, "Recorded generated image");
        Ok(attached)
    }
}
