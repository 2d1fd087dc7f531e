//! Wire payloads exchanged with the pub/sub collaborator.
//!
//! The JSON keys here are the external contract: inbound commands carry
//! optional `state`, `brightness`, `color` and `effect` fields; outbound
//! state snapshots mirror them plus a `color_mode` marker.

use parse_display::Display;
use serde_derive::{Deserialize, Serialize};

use crate::color::Color;

/// Power field of the command and state payloads.
#[derive(Display, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SwitchState {
    #[display("ON")]
    On,
    #[display("OFF")]
    Off,
}

impl From<bool> for SwitchState {
    fn from(is_on: bool) -> Self {
        if is_on {
            Self::On
        } else {
            Self::Off
        }
    }
}

impl SwitchState {
    pub fn is_on(self) -> bool {
        self == Self::On
    }
}

/// `{r, g, b}` color record with 8-bit channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RgbValue {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl From<RgbValue> for Color {
    fn from(value: RgbValue) -> Self {
        Color::rgb8(value.r, value.g, value.b)
    }
}

impl From<Color> for RgbValue {
    fn from(color: Color) -> Self {
        let (r, g, b) = color.to_rgb8();
        Self { r, g, b }
    }
}

/// Marker for the color representation used in state payloads.
#[derive(Display, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    #[display("rgb")]
    Rgb,
}

/// Inbound light command. Every field is optional; a `null` (or absent)
/// `effect` clears the active effect.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct LightCommand {
    #[serde(default)]
    pub state: Option<SwitchState>,
    #[serde(default)]
    pub brightness: Option<u8>,
    #[serde(default)]
    pub color: Option<RgbValue>,
    #[serde(default)]
    pub effect: Option<String>,
}

/// Outbound state snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateMessage {
    pub state: SwitchState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brightness: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<RgbValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_mode: Option<ColorMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect: Option<String>,
}
