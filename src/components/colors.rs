//! Color parsing, formatting, and palette tooling.
//!
//! Colors cross the engine boundary as CSS-style strings (`#RRGGBB`,
//! `rgba(...)`, `transparent`) because that is what the eyedropper reports
//! and what palette presets are written in; inside the engine everything is
//! `Rgba<u8>`.

use image::Rgba;

use crate::canvas::PixelBuffer;

/// Basic preset colors shown in the picker.
pub const PRESET_PALETTE: &[&str] = &[
    "transparent",
    "#000000", // Black
    "#FFFFFF", // White
    "#FF0000", // Red
    "#00FF00", // Green
    "#0000FF", // Blue
    "#FFFF00", // Yellow
    "#FF00FF", // Magenta
    "#00FFFF", // Cyan
    "#FFA500", // Orange
    "#800080", // Purple
];

/// Arne Niklas Jansson's 16-color palette
/// (http://androidarts.com/palette/16pal.htm).
pub const ARNE16_PALETTE: &[&str] = &[
    "#000000", "#9D9D9D", "#FFFFFF", "#BE2633", "#E06F8B", "#493C2B", "#A46422", "#EB8931",
    "#F7E26B", "#2F484E", "#44891A", "#A3CE27", "#1B2632", "#005784", "#31A2F2", "#B2DCEF",
];

/// A named preset palette.
#[derive(Clone, Copy, Debug)]
pub struct PaletteInfo {
    pub name: &'static str,
    pub colors: &'static [&'static str],
}

/// All built-in palettes, picker order.
#[must_use]
pub fn preset_palettes() -> &'static [PaletteInfo] {
    &[
        PaletteInfo {
            name: "Presets",
            colors: PRESET_PALETTE,
        },
        PaletteInfo {
            name: "ARNE 16",
            colors: ARNE16_PALETTE,
        },
    ]
}

/// Parse a CSS-style color: `transparent`, `#RGB`, `#RRGGBB`, `#RRGGBBAA`,
/// or `rgba(r, g, b, a)` with `a` in `[0, 1]`. Returns `None` for anything
/// else.
#[must_use]
pub fn parse_css_color(s: &str) -> Option<Rgba<u8>> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("transparent") {
        return Some(Rgba([0, 0, 0, 0]));
    }
    if let Some(hex) = s.strip_prefix('#') {
        return parse_hex(hex);
    }
    if let Some(body) = s
        .strip_prefix("rgba(")
        .or_else(|| s.strip_prefix("rgb("))
        .and_then(|rest| rest.strip_suffix(')'))
    {
        let parts: Vec<&str> = body.split(',').map(str::trim).collect();
        if parts.len() != 3 && parts.len() != 4 {
            return None;
        }
        let r = parts[0].parse::<u8>().ok()?;
        let g = parts[1].parse::<u8>().ok()?;
        let b = parts[2].parse::<u8>().ok()?;
        let a = if parts.len() == 4 {
            let alpha = parts[3].parse::<f32>().ok()?;
            if !(0.0..=1.0).contains(&alpha) {
                return None;
            }
            (alpha * 255.0).round() as u8
        } else {
            255
        };
        return Some(Rgba([r, g, b, a]));
    }
    None
}

fn parse_hex(hex: &str) -> Option<Rgba<u8>> {
    let nibble = |c: u8| -> Option<u8> {
        match c {
            b'0'..=b'9' => Some(c - b'0'),
            b'a'..=b'f' => Some(c - b'a' + 10),
            b'A'..=b'F' => Some(c - b'A' + 10),
            _ => None,
        }
    };
    let bytes = hex.as_bytes();
    match bytes.len() {
        3 => {
            let r = nibble(bytes[0])?;
            let g = nibble(bytes[1])?;
            let b = nibble(bytes[2])?;
            Some(Rgba([r * 17, g * 17, b * 17, 255]))
        }
        6 | 8 => {
            let mut channels = [0u8; 4];
            channels[3] = 255;
            for (i, pair) in bytes.chunks(2).enumerate() {
                channels[i] = nibble(pair[0])? * 16 + nibble(pair[1])?;
            }
            Some(Rgba(channels))
        }
        _ => None,
    }
}

/// Format a pixel the way the eyedropper reports it: `transparent` for
/// alpha 0, uppercase `#RRGGBB` for full alpha, `rgba(r, g, b, a)` with a
/// two-decimal alpha otherwise.
#[must_use]
pub fn format_css_color(px: Rgba<u8>) -> String {
    match px[3] {
        0 => "transparent".to_string(),
        255 => format!("#{:02X}{:02X}{:02X}", px[0], px[1], px[2]),
        a => format!(
            "rgba({}, {}, {}, {:.2})",
            px[0],
            px[1],
            px[2],
            a as f32 / 255.0
        ),
    }
}

/// Unique colors of a buffer as uppercase hex, in first-seen scan order.
/// Fully transparent pixels are skipped; alpha is otherwise ignored so the
/// result is usable as a palette.
#[must_use]
pub fn extract_colors(buffer: &PixelBuffer) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    let Some(img) = buffer.raw_image() else {
        return out;
    };
    for px in img.pixels() {
        if px[3] == 0 {
            continue;
        }
        let hex = format!("#{:02X}{:02X}{:02X}", px[0], px[1], px[2]);
        if seen.insert(hex.clone()) {
            out.push(hex);
        }
    }
    out
}
