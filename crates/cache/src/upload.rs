//! Turning a user's image file into the cached payload.

use std::path::Path;

use {
    base64::{Engine, engine::general_purpose::STANDARD},
    tracing::debug,
};

use crate::error::{CacheError, Context, Result};

/// Largest reference image accepted for upload.
pub const MAX_REFERENCE_BYTES: usize = 10 * 1024 * 1024;

/// Encode raw image bytes as a `data:<mime>;base64,...` URL.
///
/// The format is sniffed from the file's magic bytes; anything the `image`
/// crate does not recognize is rejected.
pub fn encode_reference_image(bytes: &[u8]) -> Result<String> {
    if bytes.is_empty() {
        return Err(CacheError::upload("image file is empty"));
    }
    if bytes.len() > MAX_REFERENCE_BYTES {
        return Err(CacheError::upload(format!(
            "image is {} bytes, limit is {MAX_REFERENCE_BYTES}",
            bytes.len()
        )));
    }
    let format = image::guess_format(bytes)
        .map_err(|e| CacheError::upload(format!("not a recognized image: {e}")))?;
    let mime = format.to_mime_type();
    debug!(mime, bytes = bytes.len(), "encoded reference image");
    Ok(format!("data:{mime};base64,{}", STANDARD.encode(bytes)))
}

/// Read `path` and encode it with [`encode_reference_image`].
pub async fn read_reference_image(path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("read {}", path.display()))?;
    encode_reference_image(&bytes)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    // 1x1 transparent PNG.
    const PNG_B64: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

    #[test]
    fn png_becomes_data_url() {
        let bytes = STANDARD.decode(PNG_B64).unwrap();
        let encoded = encode_reference_image(&bytes).unwrap();
        assert_eq!(encoded, format!("data:image/png;base64,{PNG_B64}"));
    }

    #[test]
    fn jpeg_magic_is_recognized() {
        let bytes = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];
        let encoded = encode_reference_image(&bytes).unwrap();
        assert!(encoded.starts_with("data:image/jpeg;base64,"));
    }

    #[test]
    fn rejects_non_images() {
        let err = encode_reference_image(b"hello, not an image").unwrap_err();
        assert!(matches!(err, CacheError::Upload(_)));
        assert!(matches!(
            encode_reference_image(&[]).unwrap_err(),
            CacheError::Upload(_)
        ));
    }

    #[tokio::test]
    async fn missing_file_names_the_path() {
        let err = read_reference_image(Path::new("/nonexistent/model.png"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("/nonexistent/model.png"));
    }
}
