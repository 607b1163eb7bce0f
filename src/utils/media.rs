//! Image attachment helpers

use std::error::Error;
use std::fs;
use std::path::Path;

/// Media type for an image file, judged by its extension.
pub fn media_type_for_path(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    match extension.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

/// Reads an image file and returns its media type and raw bytes.
pub fn read_image(path: &Path) -> Result<(&'static str, Vec<u8>), Box<dyn Error>> {
    let media_type = media_type_for_path(path).ok_or_else(|| {
        format!(
            "unsupported image type for {} (expected png, jpeg, gif or webp)",
            path.display()
        )
    })?;
    let bytes = fs::read(path).map_err(|err| format!("failed to read {}: {err}", path.display()))?;
    if bytes.is_empty() {
        return Err(format!("{} is empty", path.display()).into());
    }
    Ok((media_type, bytes))
}
