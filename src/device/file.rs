use std::fmt::Write;
use std::time::Instant;

use chrono::Utc;
use tokio::{fs::File, io::AsyncWriteExt};

use super::{DeviceError, PixelDeviceImpl};
use crate::{color::Color, models};

/// Device that appends one line per frame to a file.
pub struct FileDevice {
    leds: Vec<Color>,
    print_timestamp: bool,
    file_handle: File,
    last_write_time: Instant,
    str_buf: String,
}

impl FileDevice {
    pub fn new(config: &models::File) -> Result<Self, DeviceError> {
        let file_handle = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.output)?;

        Ok(Self {
            leds: vec![Default::default(); config.led_count as _],
            print_timestamp: config.print_timestamp,
            file_handle: File::from_std(file_handle),
            last_write_time: Instant::now(),
            str_buf: String::new(),
        })
    }
}

#[async_trait::async_trait]
impl PixelDeviceImpl for FileDevice {
    fn set_pixel(&mut self, index: usize, color: Color) {
        self.leds[index] = color;
    }

    async fn show(&mut self) -> Result<(), DeviceError> {
        self.str_buf.clear();

        if self.print_timestamp {
            // Prepend timestamp and elapsed time since the previous frame
            let now = Utc::now();
            let elapsed_time_ms = self.last_write_time.elapsed().as_millis();
            self.last_write_time = Instant::now();

            write!(self.str_buf, "{} | +{}", now, elapsed_time_ms)?;
        }

        write!(self.str_buf, " [")?;
        for led in &self.leds {
            let (red, green, blue) = led.to_rgb8();
            write!(self.str_buf, "{{{},{},{}}}", red, green, blue)?;
        }
        writeln!(self.str_buf, "]")?;

        self.file_handle.write_all(self.str_buf.as_bytes()).await?;
        self.file_handle.flush().await?;

        Ok(())
    }
}
