//! Color strings to rasterizer color arguments.
//!
//! Accepted inputs:
//! - `#RRGGBB`
//! - `rgb(r, g, b)` with channels in `[0, 255]` or `[0, 1]`
//! - anything containing `transparent` (any case), passed through untouched
//!
//! Output is the rasterizer's `rgb R G B` form with fractional channels.

use mathcha_common::CaptchaError;

/// Normalize a color string for the rasterizer's `-fg`/`-bg` arguments
pub fn normalize_color(input: &str) -> Result<String, CaptchaError> {
    if input.to_ascii_lowercase().contains("transparent") {
        return Ok(input.to_string());
    }

    let trimmed = input.trim();
    let channels = if let Some(hex) = trimmed.strip_prefix('#') {
        parse_hex(hex)
    } else {
        parse_rgb(trimmed)
    }
    .ok_or_else(|| CaptchaError::InvalidConfig(format!("unrecognized color '{}'", input)))?;

    // Any channel above 1 means the whole triplet is on the 0-255 scale.
    let scale = if channels.iter().any(|c| *c > 1.0) { 255.0 } else { 1.0 };
    let [r, g, b] = channels.map(|c| c / scale);

    Ok(format!("rgb {:.3} {:.3} {:.3}", r, g, b))
}

fn parse_hex(hex: &str) -> Option<[f64; 3]> {
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }

    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok().map(f64::from);
    Some([channel(0)?, channel(2)?, channel(4)?])
}

fn parse_rgb(text: &str) -> Option<[f64; 3]> {
    let lower = text.to_ascii_lowercase();
    let inner = lower.strip_prefix("rgb")?.trim_start();
    let inner = inner.strip_prefix('(')?.strip_suffix(')')?;

    let parts: Vec<f64> = inner
        .split(',')
        .map(|p| p.trim().parse::<f64>().ok())
        .collect::<Option<_>>()?;

    match parts.as_slice() {
        &[r, g, b] if [r, g, b].iter().all(|c| (0.0..=255.0).contains(c)) => Some([r, g, b]),
        _ => None,
    }
}
