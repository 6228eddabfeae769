//! QR image rendering for signed payloads.

use qrcode::render::svg;
use qrcode::{EcLevel, QrCode};

/// Smallest rendered edge in pixels.
const MIN_DIMENSION: u32 = 240;

#[derive(Debug, thiserror::Error)]
#[error("QR encoding failed: {0}")]
pub struct RenderError(String);

/// Render a payload as a standalone SVG document.
///
/// Payloads use the uppercase transport alphabet, which the encoder packs in
/// alphanumeric mode.
pub fn render_svg(payload: &str) -> Result<String, RenderError> {
    let code = QrCode::with_error_correction_level(payload.as_bytes(), EcLevel::M)
        .map_err(|e| RenderError(e.to_string()))?;

    Ok(code
        .render::<svg::Color<'_>>()
        .min_dimensions(MIN_DIMENSION, MIN_DIMENSION)
        .dark_color(svg::Color("#000000"))
        .light_color(svg::Color("#ffffff"))
        .build())
}
