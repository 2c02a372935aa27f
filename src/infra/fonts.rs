//! Loads font files from disk into a [`FontAssetCache`].

use std::path::Path;

use tracing::{info, warn};

use crate::{
    config::FontSettings,
    domain::{fonts::FontAssetCache, request::FontSelector},
};

use super::error::InfraError;

/// Read every configured face. The default face is required; a missing
/// optional face is logged and requests for it fall back to the default.
pub async fn load_font_cache(settings: &FontSettings) -> Result<FontAssetCache, InfraError> {
    let default_bytes = read_font(&settings.default_path).await?;
    let mut cache = FontAssetCache::new(default_bytes);

    let optional = [
        (FontSelector::Gothic, settings.gothic_path.as_deref()),
        (FontSelector::Mincho, settings.mincho_path.as_deref()),
    ];
    for (selector, path) in optional {
        let Some(path) = path else {
            continue;
        };
        match read_font(path).await {
            Ok(bytes) => cache = cache.with_face(selector, bytes),
            Err(err) => {
                warn!(
                    target = "tategaki::fonts",
                    font = selector.name(),
                    error = %err,
                    "optional font unavailable; falling back to default face"
                );
            }
        }
    }

    info!(
        target = "tategaki::fonts",
        loaded = ?cache.loaded_names(),
        "font assets loaded"
    );
    Ok(cache)
}

async fn read_font(path: &Path) -> Result<Vec<u8>, InfraError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|err| InfraError::font(path, err.to_string()))?;
    if bytes.is_empty() {
        return Err(InfraError::font(path, "file is empty"));
    }
    Ok(bytes)
}
