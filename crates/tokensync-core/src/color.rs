//! Color string grammars and CSS color rendering.
//!
//! Accepted inputs (surrounding whitespace ignored):
//!
//! - `rgb(r, g, b)` / `rgba(r, g, b, a)`, channels 0-255, alpha 0-1
//! - `hsl(h, s%, l%)` / `hsla(h, s%, l%, a)`, hue in degrees (wrapped)
//! - `#rgb` / `#rrggbb`
//! - `{r: 0.1, g: 0.2, b: 0.3, opacity: 0.5}` with channels already in 0-1

use crate::ItemError;
use regex::Regex;
use std::sync::LazyLock;
use tokensync_store::Color;

static RGB: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^rgb\(\s*(\d{1,3})\s*,\s*(\d{1,3})\s*,\s*(\d{1,3})\s*\)$").expect("valid regex")
});
static RGBA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^rgba\(\s*(\d{1,3})\s*,\s*(\d{1,3})\s*,\s*(\d{1,3})\s*,\s*([\d.]+)\s*\)$")
        .expect("valid regex")
});
static HSL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^hsl\(\s*(-?[\d.]+)\s*,\s*([\d.]+)%\s*,\s*([\d.]+)%\s*\)$").expect("valid regex")
});
static HSLA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^hsla\(\s*(-?[\d.]+)\s*,\s*([\d.]+)%\s*,\s*([\d.]+)%\s*,\s*([\d.]+)\s*\)$")
        .expect("valid regex")
});
static HEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^#([0-9A-Fa-f]{3}|[0-9A-Fa-f]{6})$").expect("valid regex")
});
static FLOAT_OBJECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"^\{\s*"?r"?\s*:\s*([\d.]+)\s*,\s*"?g"?\s*:\s*([\d.]+)\s*,\s*"?b"?\s*:\s*([\d.]+)\s*(?:,\s*"?opacity"?\s*:\s*([\d.]+)\s*)?\}$"#,
    )
    .expect("valid regex")
});

/// How a [`Color`] is rendered as CSS text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColorStyle {
    pub alpha_precision: usize,
    pub alpha_zero_keyword: Option<String>,
}

impl Default for ColorStyle {
    fn default() -> Self {
        Self {
            alpha_precision: 4,
            alpha_zero_keyword: None,
        }
    }
}

pub fn parse_color(input: &str) -> Result<Color, ItemError> {
    let color = input.trim();
    let invalid = || ItemError::InvalidColorFormat(input.to_string());

    if let Some(caps) = RGB.captures(color) {
        return Ok(Color::rgb(
            byte_channel(&caps[1]).ok_or_else(invalid)?,
            byte_channel(&caps[2]).ok_or_else(invalid)?,
            byte_channel(&caps[3]).ok_or_else(invalid)?,
        ));
    }

    if let Some(caps) = RGBA.captures(color) {
        return Ok(Color::rgba(
            byte_channel(&caps[1]).ok_or_else(invalid)?,
            byte_channel(&caps[2]).ok_or_else(invalid)?,
            byte_channel(&caps[3]).ok_or_else(invalid)?,
            unit_channel(&caps[4]).ok_or_else(invalid)?,
        ));
    }

    if let Some(caps) = HSL.captures(color) {
        let (hue, saturation, lightness) =
            hsl_parts(&caps[1], &caps[2], &caps[3]).ok_or_else(invalid)?;
        return Ok(hsl_to_rgb(hue, saturation, lightness));
    }

    if let Some(caps) = HSLA.captures(color) {
        let (hue, saturation, lightness) =
            hsl_parts(&caps[1], &caps[2], &caps[3]).ok_or_else(invalid)?;
        let alpha = unit_channel(&caps[4]).ok_or_else(invalid)?;
        return Ok(Color {
            a: alpha,
            ..hsl_to_rgb(hue, saturation, lightness)
        });
    }

    if let Some(caps) = HEX.captures(color) {
        let digits = &caps[1];
        let expanded = if digits.len() == 3 {
            digits.chars().flat_map(|ch| [ch, ch]).collect::<String>()
        } else {
            digits.to_string()
        };
        let channel = |range: std::ops::Range<usize>| -> Result<f64, ItemError> {
            u8::from_str_radix(&expanded[range], 16)
                .map(|value| f64::from(value) / 255.0)
                .map_err(|_| invalid())
        };
        return Ok(Color::rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?));
    }

    if let Some(caps) = FLOAT_OBJECT.captures(color) {
        let opacity = match caps.get(4) {
            Some(raw) => unit_channel(raw.as_str()).ok_or_else(invalid)?,
            None => 1.0,
        };
        return Ok(Color::rgba(
            unit_channel(&caps[1]).ok_or_else(invalid)?,
            unit_channel(&caps[2]).ok_or_else(invalid)?,
            unit_channel(&caps[3]).ok_or_else(invalid)?,
            opacity,
        ));
    }

    Err(invalid())
}

pub fn render_color(color: &Color, style: &ColorStyle) -> String {
    if color.a == 0.0 {
        if let Some(keyword) = &style.alpha_zero_keyword {
            return keyword.clone();
        }
    }

    if !color.is_opaque() {
        return format!(
            "rgba({}, {}, {}, {:.*})",
            to_byte(color.r),
            to_byte(color.g),
            to_byte(color.b),
            style.alpha_precision,
            color.a
        );
    }

    format!(
        "#{:02x}{:02x}{:02x}",
        to_byte(color.r),
        to_byte(color.g),
        to_byte(color.b)
    )
}

/// HSL to RGB. `hue` in degrees, `saturation` and `lightness` in `[0, 1]`.
pub fn hsl_to_rgb(hue: f64, saturation: f64, lightness: f64) -> Color {
    if saturation == 0.0 {
        return Color::rgb(lightness, lightness, lightness);
    }

    let h = (hue / 360.0).rem_euclid(1.0);
    let q = if lightness < 0.5 {
        lightness * (1.0 + saturation)
    } else {
        lightness + saturation - lightness * saturation
    };
    let p = 2.0 * lightness - q;

    Color::rgb(
        hue_to_channel(p, q, h + 1.0 / 3.0),
        hue_to_channel(p, q, h),
        hue_to_channel(p, q, h - 1.0 / 3.0),
    )
}

fn hue_to_channel(p: f64, q: f64, mut t: f64) -> f64 {
    if t < 0.0 {
        t += 1.0;
    }
    if t > 1.0 {
        t -= 1.0;
    }
    if t < 1.0 / 6.0 {
        return p + (q - p) * 6.0 * t;
    }
    if t < 1.0 / 2.0 {
        return q;
    }
    if t < 2.0 / 3.0 {
        return p + (q - p) * (2.0 / 3.0 - t) * 6.0;
    }
    p
}

fn hsl_parts(hue: &str, saturation: &str, lightness: &str) -> Option<(f64, f64, f64)> {
    let hue = hue.parse::<f64>().ok()?;
    let saturation = percent(saturation)?;
    let lightness = percent(lightness)?;
    Some((hue, saturation, lightness))
}

fn percent(raw: &str) -> Option<f64> {
    let value = raw.parse::<f64>().ok()?;
    (0.0..=100.0).contains(&value).then_some(value / 100.0)
}

fn byte_channel(raw: &str) -> Option<f64> {
    let value = raw.parse::<u16>().ok()?;
    (value <= 255).then(|| f64::from(value) / 255.0)
}

fn unit_channel(raw: &str) -> Option<f64> {
    let value = raw.parse::<f64>().ok()?;
    (0.0..=1.0).contains(&value).then_some(value)
}

fn to_byte(channel: f64) -> u8 {
    (channel.clamp(0.0, 1.0) * 255.0).round() as u8
}
