//! PNG thumbnails of uploaded images.

use std::io::Cursor;

use bytes::Bytes;
use image::ImageFormat;
use walog_shared::MediaKind;

use crate::error::ServerError;

/// Longest edge of a generated thumbnail, in pixels.
pub const THUMBNAIL_EDGE: u32 = 256;

/// Render a thumbnail of `data`. Non-image media and undecodable images
/// yield [`ServerError::Unsupported`]; callers show a default icon instead.
pub async fn render(data: Bytes, mimetype: &str) -> Result<Vec<u8>, ServerError> {
    if MediaKind::from_mimetype(mimetype) != MediaKind::Image {
        return Err(ServerError::Unsupported(format!(
            "no thumbnail for {mimetype}"
        )));
    }

    tokio::task::spawn_blocking(move || {
        let img = image::load_from_memory(&data)
            .map_err(|e| ServerError::Unsupported(format!("cannot decode image: {e}")))?;
        let thumb = img.thumbnail(THUMBNAIL_EDGE, THUMBNAIL_EDGE);

        let mut buf = Vec::new();
        thumb
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .map_err(|e| ServerError::Internal(format!("thumbnail encoding failed: {e}")))?;
        Ok(buf)
    })
    .await
    .map_err(|e| ServerError::Internal(format!("thumbnail task failed: {e}")))?
}
