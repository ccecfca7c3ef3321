//! Command frame codec
//!
//! Every command is six bytes: a two byte header, three payload bytes and the
//! `0x56` terminator. The fixture's reference tooling writes frames as hex
//! text with the header and terminator in upper case and the payload in lower
//! case (`AEA1ffffff56`); `CommandFrame::hex` renders the same text.

use std::fmt;

use data_encoding::{HEXLOWER, HEXUPPER};

use crate::{ColorMode, FixtureState, InvalidState, MAX_COLOR_TEMP_KELVIN, MIN_COLOR_TEMP_KELVIN};

pub const FRAME_LEN: usize = 6;

const LEAD: u8 = 0xAE;
const TERMINATOR: u8 = 0x56;

/// Sub-header for white channel commands (cold, warm)
const WHITE: u8 = 0xAA;
/// Sub-header for RGB commands
const RGB: u8 = 0xA1;
/// Channel selector carried by white channel commands
const CHANNEL: u8 = 0x01;

/// Turns the fixture off whatever mode it was in
pub const OFF_FRAME: [u8; FRAME_LEN] = [LEAD, 0xEE, 0x00, 0x00, 0x00, TERMINATOR];

/// A single command, ready to be written to the control characteristic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandFrame([u8; FRAME_LEN]);

impl CommandFrame {
    fn new(sub_header: u8, payload: [u8; 3]) -> Self {
        let [a, b, c] = payload;
        Self([LEAD, sub_header, a, b, c, TERMINATOR])
    }

    pub fn off() -> Self {
        Self(OFF_FRAME)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The frame as hex text, e.g. `AEAA0100ff56`
    pub fn hex(&self) -> String {
        let mut text = HEXUPPER.encode(&self.0[..2]);
        text.push_str(&HEXLOWER.encode(&self.0[2..5]));
        text.push_str(&HEXUPPER.encode(&self.0[5..]));
        text
    }
}

impl fmt::Display for CommandFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hex())
    }
}

/// Encode a light state as the command that puts the fixture in that state
///
/// Pure and deterministic. A powered-off state always yields `OFF_FRAME`;
/// other fields are still validated so a bad state never reaches the radio.
pub fn encode(state: &FixtureState) -> Result<CommandFrame, InvalidState> {
    state.validate()?;

    if !state.power {
        return Ok(CommandFrame::off());
    }

    let frame = match state.color_mode {
        ColorMode::OnOff => white(0, u8::MAX),
        ColorMode::Brightness => white(0, state.brightness),
        ColorMode::Rgb => {
            let (r, g, b) = state.rgb;
            CommandFrame::new(
                RGB,
                [
                    scale(r, state.brightness),
                    scale(g, state.brightness),
                    scale(b, state.brightness),
                ],
            )
        }
        ColorMode::ColorTemp => {
            let (cold, warm) = white_mix(state.color_temp_kelvin, state.brightness);
            white(cold, warm)
        }
    };

    Ok(frame)
}

fn white(cold: u8, warm: u8) -> CommandFrame {
    CommandFrame::new(WHITE, [CHANNEL, cold, warm])
}

/// `component * brightness / 255`, truncated
fn scale(component: u8, brightness: u8) -> u8 {
    (f64::from(component) * f64::from(brightness) / 255.0) as u8
}

/// Split brightness between the cold and warm LEDs
///
/// 3200K lights only the warm LEDs, 5600K only the cold ones.
fn white_mix(kelvin: u16, brightness: u8) -> (u8, u8) {
    let span = f64::from(MAX_COLOR_TEMP_KELVIN - MIN_COLOR_TEMP_KELVIN);
    let t = ((f64::from(kelvin) - f64::from(MIN_COLOR_TEMP_KELVIN)) / span).clamp(0.0, 1.0);
    let brightness = f64::from(brightness);

    let cold = (brightness * t).floor() as u8;
    let warm = (brightness * (1.0 - t)).floor() as u8;
    (cold, warm)
}
