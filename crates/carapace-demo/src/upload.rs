//! Image upload: validation and the in-memory blob store
//!
//! Uploaded bytes stay here; the inference engine only ever sees the
//! `blob:<uuid>` reference handed out by [`ImageStore::insert`].

use bytes::Bytes;
use carapace_core::{Error, ImageRef, Result};
use mime_guess::mime;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Upload size limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadLimits {
    /// Largest accepted file
    #[serde(default = "default_max_bytes")]
    pub max_bytes: u64,

    /// Smaller files are treated as corrupt
    #[serde(default = "default_min_bytes")]
    pub min_bytes: u64,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_bytes: default_max_bytes(),
            min_bytes: default_min_bytes(),
        }
    }
}

fn default_max_bytes() -> u64 {
    10 * 1024 * 1024
}

fn default_min_bytes() -> u64 {
    1024
}

/// Checks an upload before it is stored
#[derive(Debug, Clone, Default)]
pub struct ImageValidator {
    limits: UploadLimits,
}

impl ImageValidator {
    pub fn new(limits: UploadLimits) -> Self {
        Self { limits }
    }

    /// Validate by file name and size, returning the image MIME type
    pub fn validate(&self, name: &str, size: u64) -> Result<String> {
        let mime = mime_guess::from_path(name)
            .first()
            .filter(|m| m.type_() == mime::IMAGE)
            .ok_or_else(|| Error::invalid_image("Please upload an image file (JPG, PNG, WebP, etc.)"))?;

        if size > self.limits.max_bytes {
            return Err(Error::invalid_image(format!(
                "Image must be smaller than {}MB",
                self.limits.max_bytes / (1024 * 1024)
            )));
        }

        if size < self.limits.min_bytes {
            return Err(Error::invalid_image(
                "Image file appears to be corrupted or too small",
            ));
        }

        Ok(mime.essence_str().to_string())
    }
}

/// Metadata of the image currently held by a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadedImage {
    pub reference: ImageRef,
    pub name: String,
    pub size: u64,
    pub mime: String,
}

/// In-memory store resolving `blob:` references to bytes
#[derive(Default)]
pub struct ImageStore {
    blobs: RwLock<HashMap<ImageRef, Bytes>>,
}

impl ImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store bytes and hand out a fresh reference
    pub fn insert(&self, bytes: Bytes) -> ImageRef {
        let reference = ImageRef::new(format!("blob:{}", uuid::Uuid::new_v4()));
        self.blobs.write().insert(reference.clone(), bytes);
        reference
    }

    /// Bytes behind `reference`, unless revoked
    pub fn resolve(&self, reference: &ImageRef) -> Option<Bytes> {
        self.blobs.read().get(reference).cloned()
    }

    /// Invalidate `reference`; returns whether it was live
    pub fn revoke(&self, reference: &ImageRef) -> bool {
        self.blobs.write().remove(reference).is_some()
    }

    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_common_image_types() {
        let validator = ImageValidator::default();
        assert_eq!(validator.validate("crab.jpg", 50_000).unwrap(), "image/jpeg");
        assert_eq!(validator.validate("crab.PNG", 50_000).unwrap(), "image/png");
        assert_eq!(validator.validate("crab.webp", 50_000).unwrap(), "image/webp");
    }

    #[test]
    fn test_rejects_non_images() {
        let validator = ImageValidator::default();
        let err = validator.validate("notes.txt", 50_000).unwrap_err();
        assert!(err.to_string().contains("Please upload an image file"));
        assert!(validator.validate("no_extension", 50_000).is_err());
    }

    #[test]
    fn test_size_limits() {
        let validator = ImageValidator::default();
        let too_big = validator.validate("crab.jpg", 10 * 1024 * 1024 + 1).unwrap_err();
        assert!(too_big.to_string().contains("smaller than 10MB"));

        let too_small = validator.validate("crab.jpg", 1023).unwrap_err();
        assert!(too_small.to_string().contains("corrupted or too small"));

        assert!(validator.validate("crab.jpg", 1024).is_ok());
        assert!(validator.validate("crab.jpg", 10 * 1024 * 1024).is_ok());
    }

    #[test]
    fn test_store_resolve_and_revoke() {
        let store = ImageStore::new();
        let reference = store.insert(Bytes::from_static(b"pixels"));

        assert!(reference.is_blob());
        assert_eq!(store.resolve(&reference).unwrap(), Bytes::from_static(b"pixels"));

        assert!(store.revoke(&reference));
        assert!(store.resolve(&reference).is_none());
        assert!(!store.revoke(&reference));
        assert!(store.is_empty());
    }

    #[test]
    fn test_references_are_unique() {
        let store = ImageStore::new();
        let a = store.insert(Bytes::from_static(b"a"));
        let b = store.insert(Bytes::from_static(b"a"));
        assert_ne!(a, b);
        assert_eq!(store.len(), 2);
    }
}
