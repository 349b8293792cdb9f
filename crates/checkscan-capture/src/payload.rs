// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image payloads for upload. Scanners hand back TIFF or bitmap data; the
// ledger stores every check image as PNG.

use checkscan_core::error::{CheckscanError, Result};
use image::{ImageFormat, guess_format};
use tracing::{debug, instrument};

/// MIME type of every uploaded image.
pub const PNG_MIME_TYPE: &str = "image/png";

/// Re-encode scanner image bytes as PNG. PNG input is returned unchanged.
#[instrument(skip(data), fields(data_len = data.len()))]
pub fn to_png(data: &[u8]) -> Result<Vec<u8>> {
    if matches!(guess_format(data), Ok(ImageFormat::Png)) {
        return Ok(data.to_vec());
    }

    let img = image::load_from_memory(data)
        .map_err(|err| CheckscanError::ImageError(format!("failed to decode image: {err}")))?;

    let mut buffer = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut buffer), ImageFormat::Png)
        .map_err(|err| CheckscanError::ImageError(format!("image encoding failed: {err}")))?;
    debug!(
        width = img.width(),
        height = img.height(),
        png_len = buffer.len(),
        "image re-encoded as PNG"
    );
    Ok(buffer)
}
