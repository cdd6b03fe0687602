//! Shared, asynchronously populated textures
//!
//! A [`TextureHandle`] exists as soon as a load is requested. Its pixels arrive
//! later (or never); materials may reference the handle in the meantime and the
//! renderer draws them as untextured until [`TextureHandle::is_ready`] flips.

use std::{
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, OnceLock,
    },
};

static NEXT_TEXTURE_ID: AtomicU64 = AtomicU64::new(1);

/// Largest texture side the renderer requests from the device
pub const MAX_TEXTURE_DIMENSION: u32 = 4096;

/// Decoded RGBA8 pixel data
#[derive(Debug, Clone, PartialEq)]
pub struct TextureImage {
    pub width: u32,
    pub height: u32,
    /// Tightly packed RGBA8, `width * height * 4` bytes
    pub pixels: Vec<u8>,
}

impl TextureImage {
    /// A single-pixel image, mostly useful as a stand-in in tests
    pub fn solid(rgba: [u8; 4]) -> Self {
        Self {
            width: 1,
            height: 1,
            pixels: rgba.to_vec(),
        }
    }
}

impl From<image::RgbaImage> for TextureImage {
    fn from(image: image::RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            pixels: image.into_raw(),
        }
    }
}

struct TextureSlot {
    id: u64,
    label: String,
    image: OnceLock<TextureImage>,
}

/// Reference-counted texture whose pixels are filled in at most once
///
/// Cloning shares the slot, so both sand layers see the normal map arrive at
/// the same moment.
#[derive(Clone)]
pub struct TextureHandle {
    inner: Arc<TextureSlot>,
}

impl TextureHandle {
    /// A handle with no pixel data yet
    pub fn pending(label: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(TextureSlot {
                id: NEXT_TEXTURE_ID.fetch_add(1, Ordering::Relaxed),
                label: label.into(),
                image: OnceLock::new(),
            }),
        }
    }

    /// A handle that is ready immediately
    pub fn from_image(label: impl Into<String>, image: TextureImage) -> Self {
        let handle = Self::pending(label);
        handle.fulfill(image);
        handle
    }

    /// Process-unique identifier, stable across clones
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }

    pub fn is_ready(&self) -> bool {
        self.inner.image.get().is_some()
    }

    pub fn image(&self) -> Option<&TextureImage> {
        self.inner.image.get()
    }

    /// Stores the decoded pixels; returns `false` if the texture was already populated
    pub fn fulfill(&self, image: TextureImage) -> bool {
        self.inner.image.set(image).is_ok()
    }

    /// True if both handles share the same slot
    pub fn ptr_eq(&self, other: &TextureHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PartialEq for TextureHandle {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for TextureHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextureHandle")
            .field("id", &self.inner.id)
            .field("label", &self.inner.label)
            .field("ready", &self.is_ready())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_handle_becomes_ready_once() {
        let handle = TextureHandle::pending("sand normal");
        assert!(!handle.is_ready());
        assert!(handle.image().is_none());

        assert!(handle.fulfill(TextureImage::solid([128, 128, 255, 255])));
        assert!(handle.is_ready());
        assert!(!handle.fulfill(TextureImage::solid([0, 0, 0, 255])));
        assert_eq!(handle.image().unwrap().pixels, vec![128, 128, 255, 255]);
    }

    #[test]
    fn test_clones_share_population() {
        let handle = TextureHandle::pending("shared");
        let clone = handle.clone();
        handle.fulfill(TextureImage::solid([1, 2, 3, 4]));
        assert!(clone.is_ready());
        assert_eq!(handle, clone);
        assert_eq!(handle.id(), clone.id());
    }

    #[test]
    fn test_distinct_handles_have_distinct_ids() {
        let a = TextureHandle::pending("a");
        let b = TextureHandle::pending("a");
        assert_ne!(a.id(), b.id());
        assert_ne!(a, b);
    }
}
