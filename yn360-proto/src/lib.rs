//! YN360 fixture protocol - light state and command framing
//!
//! The fixture accepts one fixed-length command per write to its control
//! characteristic. This crate holds the logical light state, the merge rules
//! for partial updates, and the codec that turns a state into a frame.

pub mod ble;
mod frame;

pub use frame::{CommandFrame, OFF_FRAME, encode};

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lowest supported color temperature (warm white LEDs only)
pub const MIN_COLOR_TEMP_KELVIN: u16 = 3200;

/// Highest supported color temperature (cold white LEDs only)
pub const MAX_COLOR_TEMP_KELVIN: u16 = 5600;

/// A desired state the fixture cannot express
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidState {
    #[error("color temperature {0}K outside 3200K..=5600K")]
    ColorTempOutOfRange(u16),
    #[error("unknown color mode: {0:?}")]
    UnknownColorMode(String),
}

/// Which channel group the fixture is currently driven through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorMode {
    /// Plain on/off, always at full brightness
    OnOff,
    /// Dimmable white
    Brightness,
    /// RGB LEDs, scaled by brightness
    Rgb,
    /// Cold/warm white mix
    ColorTemp,
}

impl FromStr for ColorMode {
    type Err = InvalidState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "on_off" | "onoff" => Ok(Self::OnOff),
            "brightness" => Ok(Self::Brightness),
            "rgb" => Ok(Self::Rgb),
            "color_temp" | "temp" => Ok(Self::ColorTemp),
            _ => Err(InvalidState::UnknownColorMode(s.to_string())),
        }
    }
}

/// The logical light as last confirmed by a fixture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureState {
    pub power: bool,
    pub color_mode: ColorMode,
    pub brightness: u8,
    pub rgb: (u8, u8, u8),
    pub color_temp_kelvin: u16,
}

impl Default for FixtureState {
    fn default() -> Self {
        Self {
            power: false,
            color_mode: ColorMode::OnOff,
            brightness: u8::MAX,
            rgb: (u8::MAX, u8::MAX, u8::MAX),
            color_temp_kelvin: MAX_COLOR_TEMP_KELVIN,
        }
    }
}

impl FixtureState {
    /// Check the fields the type system does not already bound
    pub fn validate(&self) -> Result<(), InvalidState> {
        if !(MIN_COLOR_TEMP_KELVIN..=MAX_COLOR_TEMP_KELVIN).contains(&self.color_temp_kelvin) {
            return Err(InvalidState::ColorTempOutOfRange(self.color_temp_kelvin));
        }
        Ok(())
    }

    /// Fold a partial update into a copy of this state
    ///
    /// Attributes are applied brightness, then rgb, then color temperature;
    /// each one switches the color mode to the mode it implies, so the last
    /// attribute present decides the active mode. Supplying any attribute
    /// without an explicit `power` turns the light on.
    pub fn merge(&self, desired: &DesiredState) -> FixtureState {
        let mut next = *self;

        if let Some(brightness) = desired.brightness {
            next.brightness = brightness;
            next.color_mode = ColorMode::Brightness;
        }
        if let Some(rgb) = desired.rgb {
            next.rgb = rgb;
            next.color_mode = ColorMode::Rgb;
        }
        if let Some(kelvin) = desired.color_temp_kelvin {
            next.color_temp_kelvin = kelvin;
            next.color_mode = ColorMode::ColorTemp;
        }

        next.power = match desired.power {
            Some(power) => power,
            None if desired.has_attributes() => true,
            None => self.power,
        };

        next
    }
}

/// A partial state requested by the host; absent fields keep their value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brightness: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rgb: Option<(u8, u8, u8)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_temp_kelvin: Option<u16>,
}

impl DesiredState {
    pub fn on() -> Self {
        Self { power: Some(true), ..Self::default() }
    }

    pub fn off() -> Self {
        Self { power: Some(false), ..Self::default() }
    }

    pub fn with_brightness(mut self, brightness: u8) -> Self {
        self.brightness = Some(brightness);
        self
    }

    pub fn with_rgb(mut self, r: u8, g: u8, b: u8) -> Self {
        self.rgb = Some((r, g, b));
        self
    }

    pub fn with_color_temp(mut self, kelvin: u16) -> Self {
        self.color_temp_kelvin = Some(kelvin);
        self
    }

    fn has_attributes(&self) -> bool {
        self.brightness.is_some() || self.rgb.is_some() || self.color_temp_kelvin.is_some()
    }
}
