//! QR code rendering for payment request URIs
//!
//! Generate scannable images that wallet apps can read with a phone camera.

use base64::{engine::general_purpose::STANDARD, Engine};
use image::{ImageBuffer, Rgb};
use qrcode::{render::svg, EcLevel, QrCode};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// QR code output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QrFormat {
    /// PNG image bytes
    #[default]
    Png,
    /// SVG string
    Svg,
    /// Unicode art for terminal display
    Terminal,
}

/// Error-correction level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ErrorCorrection {
    /// ~7% recovery
    L,
    /// ~15% recovery
    M,
    /// ~25% recovery, reliable for camera capture off a screen
    #[default]
    Q,
    /// ~30% recovery
    H,
}

impl From<ErrorCorrection> for EcLevel {
    fn from(level: ErrorCorrection) -> Self {
        match level {
            ErrorCorrection::L => EcLevel::L,
            ErrorCorrection::M => EcLevel::M,
            ErrorCorrection::Q => EcLevel::Q,
            ErrorCorrection::H => EcLevel::H,
        }
    }
}

/// Options for QR code generation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QrOptions {
    /// Minimum image size in pixels (PNG and SVG)
    pub size: u32,
    /// Whether to surround the code with a quiet zone
    pub quiet_zone: bool,
    pub error_correction: ErrorCorrection,
    /// Foreground color as `#RRGGBB`, applied to PNG and SVG
    pub fg_color: String,
    /// Background color as `#RRGGBB`, applied to PNG and SVG
    pub bg_color: String,
}

impl Default for QrOptions {
    fn default() -> Self {
        Self {
            size: 256,
            quiet_zone: true,
            error_correction: ErrorCorrection::Q,
            fg_color: "#000000".to_string(),
            bg_color: "#FFFFFF".to_string(),
        }
    }
}

/// Render arbitrary text in the given format
pub fn render(data: &str, format: QrFormat, options: &QrOptions) -> Result<Vec<u8>> {
    let code = build_code(data, options)?;
    match format {
        QrFormat::Png => render_png(&code, options),
        QrFormat::Svg => Ok(render_svg(&code, options).into_bytes()),
        QrFormat::Terminal => Ok(render_terminal(&code).into_bytes()),
    }
}

/// Render text as PNG bytes
pub fn render_png_bytes(data: &str, options: &QrOptions) -> Result<Vec<u8>> {
    render(data, QrFormat::Png, options)
}

/// Render text as a terminal-printable block
pub fn render_terminal_string(data: &str, options: &QrOptions) -> Result<String> {
    let code = build_code(data, options)?;
    Ok(render_terminal(&code))
}

/// Wrap PNG bytes in a data URI for embedding in HTML
pub fn png_data_uri(png: &[u8]) -> String {
    format!("data:image/png;base64,{}", STANDARD.encode(png))
}

fn build_code(data: &str, options: &QrOptions) -> Result<QrCode> {
    QrCode::with_error_correction_level(data.as_bytes(), options.error_correction.into())
        .map_err(|e| Error::EncodingFailure(format!("QR generation failed: {}", e)))
}

fn parse_color(hex: &str) -> Result<Rgb<u8>> {
    let invalid = || Error::EncodingFailure(format!("invalid color {:?}, expected #RRGGBB", hex));
    let digits = hex.strip_prefix('#').ok_or_else(invalid)?;
    if digits.len() != 6 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(invalid());
    }
    let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).map_err(|_| invalid());
    Ok(Rgb([channel(0)?, channel(2)?, channel(4)?]))
}

fn render_png(code: &QrCode, options: &QrOptions) -> Result<Vec<u8>> {
    let dark = parse_color(&options.fg_color)?;
    let light = parse_color(&options.bg_color)?;

    let image: ImageBuffer<Rgb<u8>, Vec<u8>> = code
        .render::<Rgb<u8>>()
        .quiet_zone(options.quiet_zone)
        .min_dimensions(options.size, options.size)
        .dark_color(dark)
        .light_color(light)
        .build();

    let mut bytes = Vec::new();
    let encoder = image::codecs::png::PngEncoder::new(&mut bytes);

    image::ImageEncoder::write_image(
        encoder,
        image.as_raw(),
        image.width(),
        image.height(),
        image::ExtendedColorType::Rgb8,
    )
    .map_err(|e| Error::EncodingFailure(format!("PNG encoding failed: {}", e)))?;

    Ok(bytes)
}

fn render_svg(code: &QrCode, options: &QrOptions) -> String {
    code.render::<svg::Color<'_>>()
        .quiet_zone(options.quiet_zone)
        .min_dimensions(options.size, options.size)
        .dark_color(svg::Color(&options.fg_color))
        .light_color(svg::Color(&options.bg_color))
        .build()
}

fn render_terminal(code: &QrCode) -> String {
    code.render::<char>()
        .quiet_zone(true)
        .module_dimensions(2, 1)
        .build()
}
