//! Pixel-device collaborator: receives per-pixel colors and commits frames.

use thiserror::Error;

use crate::{color::Color, models::DeviceConfig};

mod dummy;
mod file;

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("device not supported: {0}")]
    NotSupported(&'static str),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("format error: {0}")]
    Format(#[from] std::fmt::Error),
}

#[async_trait::async_trait]
trait PixelDeviceImpl: Send {
    /// Store a pixel value. `index` is guaranteed to be within the
    /// configured LED count by the [`Device`] wrapper.
    fn set_pixel(&mut self, index: usize, color: Color);

    /// Commit the stored frame to the output.
    async fn show(&mut self) -> Result<(), DeviceError>;
}

/// Pixel device front end. Applies the global brightness by scaling colors
/// before they reach the implementation, and bounds pixel indices.
pub struct Device {
    inner: Box<dyn PixelDeviceImpl>,
    led_count: usize,
    notified_out_of_range: bool,
}

impl Device {
    fn build_inner(config: &DeviceConfig) -> Result<Box<dyn PixelDeviceImpl>, DeviceError> {
        match config {
            DeviceConfig::Dummy(dummy) => Ok(Box::new(dummy::DummyDevice::new(dummy))),
            DeviceConfig::File(file) => Ok(Box::new(file::FileDevice::new(file)?)),
            other => Err(DeviceError::NotSupported(other.into())),
        }
    }

    pub fn new(config: &DeviceConfig) -> Result<Self, DeviceError> {
        Ok(Self {
            inner: Self::build_inner(config)?,
            led_count: config.led_count(),
            notified_out_of_range: false,
        })
    }

    pub fn led_count(&self) -> usize {
        self.led_count
    }

    /// Set every pixel to `color` at the given brightness.
    pub fn fill(&mut self, color: Color, brightness: u8) {
        let scaled = apply_brightness(color, brightness);

        for index in 0..self.led_count {
            self.inner.set_pixel(index, scaled);
        }
    }

    /// Set one pixel at the given brightness. Out-of-range indices are
    /// dropped (reported once).
    pub fn set_pixel(&mut self, index: usize, color: Color, brightness: u8) {
        if index >= self.led_count {
            if !self.notified_out_of_range {
                self.notified_out_of_range = true;
                warn!(
                    index = %index,
                    led_count = %self.led_count,
                    "dropping out-of-range pixel"
                );
            }
            return;
        }

        self.inner.set_pixel(index, apply_brightness(color, brightness));
    }

    /// Commit the current frame to the hardware.
    pub async fn show(&mut self) -> Result<(), DeviceError> {
        self.inner.show().await
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("led_count", &self.led_count)
            .finish()
    }
}

fn apply_brightness(color: Color, brightness: u8) -> Color {
    color.scale(brightness as f32 / 255.)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Dummy, DummyDeviceMode, Ws2812Spi};

    #[test]
    fn test_brightness_scaling() {
        let white = Color::rgb8(255, 255, 255);

        assert_eq!(apply_brightness(white, 255).to_rgb8(), (255, 255, 255));
        assert_eq!(apply_brightness(white, 0).to_rgb8(), (0, 0, 0));

        let (r, g, b) = apply_brightness(white, 127).to_rgb8();
        assert_eq!((r, g, b), (127, 127, 127));
    }

    #[test]
    fn test_unsupported_device() {
        let config = DeviceConfig::Ws2812Spi(Ws2812Spi::default());

        match Device::new(&config) {
            Err(DeviceError::NotSupported(name)) => assert_eq!(name, "Ws2812Spi"),
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_dummy_device_frame() {
        let config = DeviceConfig::Dummy(Dummy {
            led_count: 4,
            mode: DummyDeviceMode::Text,
        });

        let mut device = Device::new(&config).unwrap();
        device.fill(Color::rgb8(255, 0, 0), 255);
        device.set_pixel(1, Color::rgb8(0, 255, 0), 255);
        // Out of range, dropped
        device.set_pixel(10, Color::rgb8(0, 0, 255), 255);
        device.show().await.unwrap();
    }
}
