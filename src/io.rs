//! Decode and export — image bytes in, encoded documents out.
//!
//! Raster formats rasterize the composited scene (or one isolated layer);
//! SVG serializes the current object graph textually with each layer's
//! bitmap embedded as a base64 PNG payload.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::{ColorType, DynamicImage, ImageEncoder, RgbaImage};
use std::fmt::Write as _;

use crate::error::EditorError;
use crate::layers::LayerEngine;
use crate::scene::Scene;

/// JPEG export quality.
const JPEG_QUALITY: u8 = 90;

// ============================================================================
// FORMATS
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportFormat {
    Png,
    Jpg,
    Webp,
    Svg,
}

impl ExportFormat {
    /// Parse a user-facing format name; `jpeg` normalizes to `Jpg`.
    pub fn parse(name: &str) -> Option<ExportFormat> {
        match name.to_ascii_lowercase().as_str() {
            "png" => Some(ExportFormat::Png),
            "jpg" | "jpeg" => Some(ExportFormat::Jpg),
            "webp" => Some(ExportFormat::Webp),
            "svg" => Some(ExportFormat::Svg),
            _ => None,
        }
    }

    pub fn is_vector(&self) -> bool {
        matches!(self, ExportFormat::Svg)
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Png => "png",
            ExportFormat::Jpg => "jpg",
            ExportFormat::Webp => "webp",
            ExportFormat::Svg => "svg",
        }
    }
}

// ============================================================================
// DECODE
// ============================================================================

/// Decode image bytes (any format the `image` crate understands) to RGBA.
pub fn decode_image(bytes: &[u8]) -> Result<RgbaImage, EditorError> {
    image::load_from_memory(bytes)
        .map(|img| img.to_rgba8())
        .map_err(|e| EditorError::Decode(e.to_string()))
}

// ============================================================================
// COMPOSITING
// ============================================================================

/// Flatten the visible layers onto a transparent canvas of the given size.
/// Painter's algorithm over the layer stack; nearest-neighbour sampling for
/// scaled nodes.  Node rotation is not applied here — the raster exporters
/// share the engine's axis-aligned limitation.
pub fn composite(scene: &Scene, layers: &LayerEngine, width: u32, height: u32) -> RgbaImage {
    let mut out = RgbaImage::new(width, height);

    for layer in layers.layers() {
        if !layer.visible || layer.opacity <= 0.0 {
            continue;
        }
        let Some(node) = scene.node(layer.node) else { continue };
        if node.image.width() == 0 || node.image.height() == 0 {
            continue;
        }

        let dst_x0 = node.left.floor().max(0.0) as u32;
        let dst_y0 = node.top.floor().max(0.0) as u32;
        let dst_x1 = ((node.left + node.scaled_width()).ceil() as i64).clamp(0, width as i64) as u32;
        let dst_y1 =
            ((node.top + node.scaled_height()).ceil() as i64).clamp(0, height as i64) as u32;

        for dy in dst_y0..dst_y1 {
            for dx in dst_x0..dst_x1 {
                let sx = ((dx as f64 - node.left) / node.scale_x).floor() as i64;
                let sy = ((dy as f64 - node.top) / node.scale_y).floor() as i64;
                if sx < 0
                    || sy < 0
                    || sx >= node.image.width() as i64
                    || sy >= node.image.height() as i64
                {
                    continue;
                }
                let src = node.image.get_pixel(sx as u32, sy as u32).0;
                let alpha = (src[3] as f32 / 255.0) * layer.opacity;
                if alpha <= 0.0 {
                    continue;
                }
                let dst = out.get_pixel_mut(dx, dy);
                for c in 0..3 {
                    dst.0[c] = (src[c] as f32 * alpha + dst.0[c] as f32 * (1.0 - alpha))
                        .round()
                        .clamp(0.0, 255.0) as u8;
                }
                dst.0[3] = ((alpha + dst.0[3] as f32 / 255.0 * (1.0 - alpha)) * 255.0)
                    .round()
                    .clamp(0.0, 255.0) as u8;
            }
        }
    }

    out
}

// ============================================================================
// RASTER ENCODERS
// ============================================================================

/// Encode an RGBA bitmap to the requested raster format.  JPEG has no alpha
/// channel, so transparency is dropped against black.
pub fn encode_raster(img: &RgbaImage, format: ExportFormat) -> Result<Vec<u8>, EditorError> {
    let mut out = Vec::new();
    let (w, h) = (img.width(), img.height());

    match format {
        ExportFormat::Png => {
            PngEncoder::new(&mut out)
                .write_image(img.as_raw(), w, h, ColorType::Rgba8)
                .map_err(|e| EditorError::Encode(e.to_string()))?;
        }
        ExportFormat::Jpg => {
            let rgb = DynamicImage::ImageRgba8(img.clone()).to_rgb8();
            JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY)
                .write_image(rgb.as_raw(), w, h, ColorType::Rgb8)
                .map_err(|e| EditorError::Encode(e.to_string()))?;
        }
        ExportFormat::Webp => {
            WebPEncoder::new_lossless(&mut out)
                .write_image(img.as_raw(), w, h, ColorType::Rgba8)
                .map_err(|e| EditorError::Encode(e.to_string()))?;
        }
        ExportFormat::Svg => {
            return Err(EditorError::Encode("svg is not a raster format".into()));
        }
    }

    Ok(out)
}

// ============================================================================
// SVG EXPORT
// ============================================================================

fn svg_escape(name: &str) -> String {
    name.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;").replace('"', "&quot;")
}

/// Serialize the visible object graph as a textual SVG document.  Each layer
/// becomes an `<image>` element carrying its placement and a base64 PNG
/// payload.
pub fn export_svg(
    scene: &Scene,
    layers: &LayerEngine,
    width: u32,
    height: u32,
) -> Result<String, EditorError> {
    let mut svg = String::new();
    let _ = writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" viewBox="0 0 {width} {height}">"#,
    );

    for layer in layers.layers() {
        if !layer.visible {
            continue;
        }
        let Some(node) = scene.node(layer.node) else { continue };
        let png = encode_raster(&node.image, ExportFormat::Png)?;
        let _ = writeln!(
            svg,
            r#"  <image data-name="{}" x="{}" y="{}" width="{}" height="{}" opacity="{}" href="data:image/png;base64,{}"/>"#,
            svg_escape(&layer.name),
            node.left,
            node.top,
            node.scaled_width(),
            node.scaled_height(),
            layer.opacity,
            BASE64.encode(&png),
        );
    }

    svg.push_str("</svg>\n");
    Ok(svg)
}
