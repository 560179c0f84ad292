//! Conversions from the host's stored style values to the map server's units.

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConversionError {
    #[error("'{key}' is not a number ({value:?})")]
    NotANumber { key: String, value: String },
    #[error("'{key}' is not an 'r,g,b,a' color ({value:?})")]
    MalformedColor { key: String, value: String },
}

/// Unit marker the host uses for millimeters.
const MILLIMETER: &str = "MM";

/// What a length is used for; decides the millimeter scale factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthClass {
    /// Line widths and outline widths.
    Stroke,
    /// Point symbol sizes.
    Marker,
}

impl LengthClass {
    fn millimeter_factor(self) -> f64 {
        match self {
            LengthClass::Stroke => 10.0,
            LengthClass::Marker => 4.0,
        }
    }
}

/// A stored `r,g,b,a` color. Components are kept verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color<'a> {
    rgb: [&'a str; 3],
    alpha: &'a str,
}

impl<'a> Color<'a> {
    pub fn parse(key: &str, value: &'a str) -> Result<Self, ConversionError> {
        let mut parts = value.split(',').map(str::trim);
        let (Some(r), Some(g), Some(b), Some(alpha)) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(ConversionError::MalformedColor {
                key: key.to_owned(),
                value: value.to_owned(),
            });
        };
        Ok(Color {
            rgb: [r, g, b],
            alpha,
        })
    }

    /// `"r g b"`, as the map server expects colors.
    pub fn rgb_text(&self) -> String {
        self.rgb.join(" ")
    }

    /// A stored alpha of exactly `"0"` means the color is not drawn at all.
    pub fn is_invisible(&self) -> bool {
        self.alpha == "0"
    }

    pub fn alpha_channel(&self, key: &str) -> Result<f64, ConversionError> {
        parse_number(key, self.alpha)
    }
}

pub fn parse_number(key: &str, value: &str) -> Result<f64, ConversionError> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|_| ConversionError::NotANumber {
            key: key.to_owned(),
            value: value.to_owned(),
        })
}

/// Opacity in percent from a color's alpha channel (0-255) and a symbol's
/// alpha (fraction of 1). Truncates like the host does.
pub fn opacity_percent(alpha_channel: f64, symbol_alpha: f64) -> u32 {
    ((alpha_channel / 255.0 * symbol_alpha) * 100.0).floor() as u32
}

/// [`opacity_percent`] straight from the color stored under `key`.
pub fn transparency(key: &str, color: &str, symbol_alpha: f64) -> Result<u32, ConversionError> {
    let alpha = Color::parse(key, color)?.alpha_channel(key)?;
    Ok(opacity_percent(alpha, symbol_alpha))
}

/// Millimeter lengths are scaled and floored, anything else is assumed to
/// already be in the server's units.
pub fn length_in_target_units(value: f64, unit: &str, class: LengthClass) -> f64 {
    if unit == MILLIMETER {
        (value * class.millimeter_factor()).floor()
    } else {
        value
    }
}

/// Dash pattern for a line style, `None` for solid lines.
pub fn dash_pattern(line_style: &str) -> Option<&'static str> {
    match line_style {
        "solid" => None,
        "dash" => Some("10 4"),
        "dot" => Some("4 4"),
        "dash dot" | "dash-dot" => Some("10 4 4 4"),
        "dash dot dot" | "dash-dot-dot" => Some("10 4 4 4 4 2"),
        _ => Some("10 4"),
    }
}

pub fn marker_symbol(shape: &str) -> &'static str {
    match shape {
        "square" => "square",
        "star" => "star",
        "cross2" => "cross",
        _ => "circle",
    }
}
