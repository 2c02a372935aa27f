//! Font payloads keyed by logical face.

use std::{collections::HashMap, fmt, sync::Arc};

use base64::{Engine as _, engine::general_purpose::STANDARD};

use super::request::FontSelector;

/// One font face: raw bytes plus their base64 embedding.
#[derive(Clone)]
pub struct FontAsset {
    selector: FontSelector,
    bytes: Arc<[u8]>,
    base64: Arc<str>,
}

impl FontAsset {
    pub fn new(selector: FontSelector, bytes: impl Into<Arc<[u8]>>) -> Self {
        let bytes = bytes.into();
        let base64: Arc<str> = STANDARD.encode(&bytes).into();
        Self {
            selector,
            bytes,
            base64,
        }
    }

    pub fn selector(&self) -> FontSelector {
        self.selector
    }

    pub fn name(&self) -> &'static str {
        self.selector.name()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn shared_bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }

    pub fn base64(&self) -> &str {
        &self.base64
    }
}

impl fmt::Debug for FontAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FontAsset")
            .field("name", &self.name())
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Immutable set of loaded faces. The default face is always present.
#[derive(Debug, Clone)]
pub struct FontAssetCache {
    default: Arc<FontAsset>,
    faces: HashMap<FontSelector, Arc<FontAsset>>,
}

impl FontAssetCache {
    /// Start a cache from the bytes of the default face.
    pub fn new(default_bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            default: Arc::new(FontAsset::new(FontSelector::Default, default_bytes)),
            faces: HashMap::new(),
        }
    }

    pub fn with_face(mut self, selector: FontSelector, bytes: impl Into<Arc<[u8]>>) -> Self {
        let asset = Arc::new(FontAsset::new(selector, bytes));
        if selector == FontSelector::Default {
            self.default = asset;
        } else {
            self.faces.insert(selector, asset);
        }
        self
    }

    /// Return the requested face, or the default face when it was not loaded.
    pub fn resolve(&self, selector: FontSelector) -> Arc<FontAsset> {
        self.faces
            .get(&selector)
            .map(Arc::clone)
            .unwrap_or_else(|| Arc::clone(&self.default))
    }

    pub fn contains(&self, selector: FontSelector) -> bool {
        selector == FontSelector::Default || self.faces.contains_key(&selector)
    }

    /// Names of every loaded face, default first.
    pub fn loaded_names(&self) -> Vec<&'static str> {
        FontSelector::ALL
            .into_iter()
            .filter(|selector| self.contains(*selector))
            .map(FontSelector::name)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_face_falls_back_to_default() {
        let cache = FontAssetCache::new(vec![1_u8, 2, 3]).with_face(FontSelector::Gothic, vec![9_u8]);

        assert_eq!(cache.resolve(FontSelector::Gothic).name(), "gothic");
        let mincho = cache.resolve(FontSelector::Mincho);
        assert_eq!(mincho.name(), "antique");
        assert_eq!(mincho.bytes(), &[1, 2, 3]);
        assert_eq!(cache.loaded_names(), vec!["antique", "gothic"]);
    }

    #[test]
    fn base64_embedding_matches_bytes() {
        let asset = FontAsset::new(FontSelector::Mincho, b"font".to_vec());
        assert_eq!(asset.base64(), "Zm9udA==");
    }
}
