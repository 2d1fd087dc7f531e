//! RGB color value type used for light state, transitions and effect files.

use std::fmt;
use std::str::FromStr;

use palette::{FromColor, Hsl, Hsv, Srgb};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// RGB color with all three channels normalized to `[0, 1]`.
///
/// Arithmetic never leaves that range: [`Color::scale`] clamps its factor and
/// [`Color::add`] saturates per channel. Equality is exact per-channel
/// comparison; use [`Color::to_packed`] for quantized (8 bits per channel)
/// comparisons.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Color {
    red: f32,
    green: f32,
    blue: f32,
}

impl Color {
    /// Color from normalized `[0, 1]` channel values.
    pub fn rgb(red: f32, green: f32, blue: f32) -> Self {
        Self {
            red: red.clamp(0., 1.),
            green: green.clamp(0., 1.),
            blue: blue.clamp(0., 1.),
        }
    }

    /// Color from 8-bit channel values.
    pub fn rgb8(red: u8, green: u8, blue: u8) -> Self {
        Self {
            red: red as f32 / 255.,
            green: green as f32 / 255.,
            blue: blue as f32 / 255.,
        }
    }

    /// Color from hue, saturation and value, all normalized to `[0, 1]`.
    pub fn hsv(hue: f32, saturation: f32, value: f32) -> Self {
        let hsv: Hsv = Hsv::new(hue * 360., saturation, value);
        let rgb = Srgb::from_color(hsv);
        Self::rgb(rgb.red, rgb.green, rgb.blue)
    }

    /// Color from hue, lightness and saturation, all normalized to `[0, 1]`.
    pub fn hls(hue: f32, lightness: f32, saturation: f32) -> Self {
        let hsl: Hsl = Hsl::new(hue * 360., saturation, lightness);
        let rgb = Srgb::from_color(hsl);
        Self::rgb(rgb.red, rgb.green, rgb.blue)
    }

    /// Color from a 24-bit packed value, 8 bits per channel.
    pub fn from_packed(packed: u32) -> Self {
        Self::rgb8(
            ((packed >> 16) & 0xff) as u8,
            ((packed >> 8) & 0xff) as u8,
            (packed & 0xff) as u8,
        )
    }

    /// Multiply all channels by `factor`, clamped into `[0, 1]`.
    pub fn scale(self, factor: f32) -> Self {
        let factor = factor.clamp(0., 1.);

        Self {
            red: self.red * factor,
            green: self.green * factor,
            blue: self.blue * factor,
        }
    }

    /// Per-channel sum, saturating at 1.
    pub fn add(self, other: Self) -> Self {
        Self {
            red: (self.red + other.red).min(1.),
            green: (self.green + other.green).min(1.),
            blue: (self.blue + other.blue).min(1.),
        }
    }

    /// Linear blend: `self` at `fraction == 0`, `other` at `fraction == 1`.
    pub fn blend(self, other: Self, fraction: f32) -> Self {
        self.scale(1. - fraction).add(other.scale(fraction))
    }

    /// Same color with the hue replaced, `hue` normalized to `[0, 1]`.
    pub fn hue(self, hue: f32) -> Self {
        let (_, lightness, saturation) = self.to_hls();
        Self::hls(hue, lightness, saturation)
    }

    /// Same color with the lightness replaced, `lightness` in `[0, 1]`.
    pub fn lightness(self, lightness: f32) -> Self {
        let (hue, _, saturation) = self.to_hls();
        Self::hls(hue, lightness, saturation)
    }

    /// Hue, lightness and saturation components, all normalized to `[0, 1]`.
    pub fn to_hls(self) -> (f32, f32, f32) {
        let hsl = Hsl::from_color(Srgb::new(self.red, self.green, self.blue));
        (
            hsl.hue.into_positive_degrees() / 360.,
            hsl.lightness,
            hsl.saturation,
        )
    }

    /// 24-bit packed value, 8 bits per channel, channels truncated.
    pub fn to_packed(self) -> u32 {
        let (red, green, blue) = self.to_rgb8();
        ((red as u32) << 16) | ((green as u32) << 8) | blue as u32
    }

    /// 8-bit channel values, truncated.
    pub fn to_rgb8(self) -> (u8, u8, u8) {
        (
            (self.red * 255.) as u8,
            (self.green * 255.) as u8,
            (self.blue * 255.) as u8,
        )
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:06x}", self.to_packed())
    }
}

#[derive(Debug, Error)]
pub enum ColorParseError {
    #[error("invalid color literal: {0:?}")]
    Format(String),
    #[error("invalid hex digits: {0}")]
    Hex(#[from] hex::FromHexError),
}

impl FromStr for Color {
    type Err = ColorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix('#')
            .filter(|digits| digits.len() == 6)
            .ok_or_else(|| ColorParseError::Format(s.to_owned()))?;

        let bytes = hex::decode(digits)?;
        Ok(Self::rgb8(bytes[0], bytes[1], bytes[2]))
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE_COLORS: [(u8, u8, u8); 8] = [
        (0, 0, 0),
        (255, 255, 255),
        (255, 0, 0),
        (0, 255, 0),
        (0, 0, 255),
        (255, 255, 0),
        (0, 255, 255),
        (255, 0, 255),
    ];

    #[test]
    fn test_blend_endpoints() {
        for &(r1, g1, b1) in &BASE_COLORS {
            for &(r2, g2, b2) in &BASE_COLORS {
                let c1 = Color::rgb8(r1, g1, b1);
                let c2 = Color::rgb8(r2, g2, b2);

                assert_eq!(c1.blend(c2, 0.).to_packed(), c1.to_packed());
                assert_eq!(c1.blend(c2, 1.).to_packed(), c2.to_packed());
            }
        }
    }

    #[test]
    fn test_blend_midpoint() {
        let mid = Color::rgb(0., 0., 0.).blend(Color::rgb(1., 1., 1.), 0.5);
        assert_eq!(mid, Color::rgb(0.5, 0.5, 0.5));
    }

    #[test]
    fn test_arithmetic_stays_in_range() {
        let c = Color::rgb(0.8, 0.9, 1.);

        // Saturating addition
        assert_eq!(c.add(c), Color::rgb(1., 1., 1.));
        // Scale factors above 1 are clamped
        assert_eq!(c.scale(4.), c);
        // Negative factors never produce negative channels
        assert_eq!(c.scale(-1.), Color::rgb(0., 0., 0.));
    }

    #[test]
    fn test_packed_round_trip() {
        for &(r, g, b) in &BASE_COLORS {
            let color = Color::rgb8(r, g, b);
            assert_eq!(Color::from_packed(color.to_packed()), color);
            assert_eq!(color.to_rgb8(), (r, g, b));
        }

        assert_eq!(Color::rgb8(0x12, 0x34, 0x56).to_packed(), 0x123456);
    }

    fn assert_close(actual: Color, expected: Color) {
        let (ar, ag, ab) = actual.to_rgb8();
        let (er, eg, eb) = expected.to_rgb8();

        for (a, e) in [(ar, er), (ag, eg), (ab, eb)] {
            assert!(
                (a as i16 - e as i16).abs() <= 1,
                "{} too far from {}",
                actual,
                expected
            );
        }
    }

    #[test]
    fn test_hue_lightness() {
        let red = Color::rgb8(255, 0, 0);

        // Rotating red by a third of the hue circle lands on green
        assert_close(red.hue(1. / 3.), Color::rgb8(0, 255, 0));
        // Full lightness is white, zero lightness is black
        assert_close(red.lightness(1.), Color::rgb8(255, 255, 255));
        assert_close(red.lightness(0.), Color::rgb8(0, 0, 0));
    }

    #[test]
    fn test_hex_display_and_parse() {
        let color = Color::rgb8(255, 0, 255);
        assert_eq!(color.to_string(), "#ff00ff");
        assert_eq!("#ff00ff".parse::<Color>().unwrap(), color);
        assert_eq!("#00ff00".parse::<Color>().unwrap().to_packed(), 0x00ff00);

        assert!("ff00ff".parse::<Color>().is_err());
        assert!("#ff00f".parse::<Color>().is_err());
        assert!("#zzzzzz".parse::<Color>().is_err());
    }

    #[test]
    fn test_serde_hex_form() {
        let colors: Vec<Color> = serde_json::from_str(r##"["#ff0000","#00ff00"]"##).unwrap();
        assert_eq!(colors[0].to_packed(), 0xff0000);
        assert_eq!(colors[1].to_packed(), 0x00ff00);

        assert_eq!(
            serde_json::to_string(&colors).unwrap(),
            r##"["#ff0000","#00ff00"]"##
        );
    }
}
