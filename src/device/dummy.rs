use std::fmt::Write;

use super::{DeviceError, PixelDeviceImpl};
use crate::{color::Color, models};

/// Device that renders frames to the log instead of hardware.
pub struct DummyDevice {
    leds: Vec<Color>,
    mode: models::DummyDeviceMode,
    ansi_buf: String,
}

impl DummyDevice {
    pub fn new(config: &models::Dummy) -> Self {
        Self {
            leds: vec![Default::default(); config.led_count as _],
            mode: config.mode,
            ansi_buf: String::new(),
        }
    }
}

#[async_trait::async_trait]
impl PixelDeviceImpl for DummyDevice {
    fn set_pixel(&mut self, index: usize, color: Color) {
        self.leds[index] = color;
    }

    async fn show(&mut self) -> Result<(), DeviceError> {
        match self.mode {
            models::DummyDeviceMode::Text => {
                for (i, led) in self.leds.iter().enumerate() {
                    let (red, green, blue) = led.to_rgb8();
                    info!(
                        led = %format_args!("{:3}", i),
                        red = %format_args!("{:3}", red),
                        green = %format_args!("{:3}", green),
                        blue = %format_args!("{:3}", blue),
                    );
                }
            }

            models::DummyDeviceMode::Ansi => {
                // Build a truecolor ANSI sequence for the whole strip
                self.ansi_buf.clear();

                for led in self.leds.iter() {
                    let (red, green, blue) = led.to_rgb8();
                    write!(
                        &mut self.ansi_buf,
                        "\x1B[38;2;{red};{green};{blue}m█",
                        red = red,
                        green = green,
                        blue = blue
                    )?;
                }

                // Reset
                write!(&mut self.ansi_buf, "\x1B[0m")?;

                info!("{}", &self.ansi_buf);
            }
        }

        Ok(())
    }
}
