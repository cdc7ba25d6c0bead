//! CSS colour parsing for scene styles

/// An sRGB colour with straight alpha
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const BLACK: Rgba = Rgba::rgb(0, 0, 0);
    pub const WHITE: Rgba = Rgba::rgb(255, 255, 255);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Parse a CSS colour: `#rgb`, `#rrggbb`, `rgb(..)`, `rgba(..)` or a
    /// small set of names. `none` and `transparent` give `None`.
    pub fn parse(input: &str) -> Option<Self> {
        let s = input.trim();
        if let Some(hex) = s.strip_prefix('#') {
            return parse_hex(hex);
        }
        if let Some(body) = s.strip_prefix("rgba(").and_then(|b| b.strip_suffix(')')) {
            return parse_components(body, true);
        }
        if let Some(body) = s.strip_prefix("rgb(").and_then(|b| b.strip_suffix(')')) {
            return parse_components(body, false);
        }
        named(&s.to_ascii_lowercase())
    }

    /// Multiply alpha by `opacity` in `[0, 1]`
    pub fn with_opacity(self, opacity: f64) -> Self {
        let a = (self.a as f64 * opacity.clamp(0.0, 1.0)).round() as u8;
        Self { a, ..self }
    }

    /// CSS form, `#rrggbb` when opaque
    pub fn to_css(&self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!(
                "rgba({}, {}, {}, {:.3})",
                self.r,
                self.g,
                self.b,
                self.a as f64 / 255.0
            )
        }
    }
}

fn parse_hex(hex: &str) -> Option<Rgba> {
    let digit = |i: usize| u8::from_str_radix(hex.get(i..i + 1)?, 16).ok();
    let pair = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
    match hex.len() {
        3 => Some(Rgba::rgb(digit(0)? * 17, digit(1)? * 17, digit(2)? * 17)),
        6 => Some(Rgba::rgb(pair(0)?, pair(2)?, pair(4)?)),
        8 => Some(Rgba {
            a: pair(6)?,
            ..Rgba::rgb(pair(0)?, pair(2)?, pair(4)?)
        }),
        _ => None,
    }
}

fn parse_components(body: &str, with_alpha: bool) -> Option<Rgba> {
    let parts: Vec<&str> = body.split(',').map(str::trim).collect();
    let expected = if with_alpha { 4 } else { 3 };
    if parts.len() != expected {
        return None;
    }
    let channel = |s: &str| s.parse::<f64>().ok().map(|v| v.clamp(0.0, 255.0).round() as u8);
    let mut color = Rgba::rgb(channel(parts[0])?, channel(parts[1])?, channel(parts[2])?);
    if with_alpha {
        let alpha: f64 = parts[3].parse().ok()?;
        color.a = (alpha.clamp(0.0, 1.0) * 255.0).round() as u8;
    }
    Some(color)
}

fn named(name: &str) -> Option<Rgba> {
    match name {
        "black" => Some(Rgba::BLACK),
        "white" => Some(Rgba::WHITE),
        "red" => Some(Rgba::rgb(255, 0, 0)),
        "green" => Some(Rgba::rgb(0, 128, 0)),
        "blue" => Some(Rgba::rgb(0, 0, 255)),
        "gray" | "grey" => Some(Rgba::rgb(128, 128, 128)),
        "orange" => Some(Rgba::rgb(255, 165, 0)),
        "yellow" => Some(Rgba::rgb(255, 255, 0)),
        "purple" => Some(Rgba::rgb(128, 0, 128)),
        _ => None,
    }
}
