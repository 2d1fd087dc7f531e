//! Render loop: samples the shared light state every tick and pushes pixels
//! to the device.

use std::time::{Duration, Instant};

use crate::{
    device::Device,
    effects::{CodecError, EffectLibrary, EffectReader},
    light::{LightHandle, SharedLight},
};

/// Floor for the inter-frame wait when decoding overruns the frame delay.
const MIN_FRAME_WAIT: Duration = Duration::from_millis(2);

pub struct RenderLoop {
    state: SharedLight,
    device: Device,
    light: LightHandle,
    library: EffectLibrary,
    frame_duration: Duration,
    reader: Option<EffectReader>,
}

impl RenderLoop {
    pub fn new(
        state: SharedLight,
        device: Device,
        light: LightHandle,
        library: EffectLibrary,
        frame_duration: Duration,
    ) -> Self {
        Self {
            state,
            device,
            light,
            library,
            frame_duration,
            reader: None,
        }
    }

    /// Drive the device until the controller goes away.
    ///
    /// Static rendering is paced by the configured frame duration; effect
    /// playback is paced by the effect's own frame delay, compensated for
    /// the time spent decoding so playback speed does not depend on decode
    /// cost.
    pub async fn run(mut self) {
        loop {
            let snapshot = self.state.snapshot();

            let effect = match snapshot.effect {
                Some(effect) => effect,
                None => {
                    self.device.fill(snapshot.color, snapshot.brightness);
                    if let Err(error) = self.device.show().await {
                        warn!(error = %error, "device write failed");
                    }

                    tokio::time::sleep(self.frame_duration).await;
                    continue;
                }
            };

            let frame_started = Instant::now();

            match self.effect_frame(&effect, snapshot.brightness).await {
                Ok(frame_delay) => {
                    if let Err(error) = self.device.show().await {
                        warn!(error = %error, "device write failed");
                    }

                    let elapsed = frame_started.elapsed();
                    let wait = frame_delay
                        .checked_sub(elapsed)
                        .filter(|wait| !wait.is_zero())
                        .unwrap_or(MIN_FRAME_WAIT);
                    tokio::time::sleep(wait).await;
                }
                Err(error) => {
                    warn!(
                        effect = %effect,
                        error = %error,
                        "effect playback failed, reverting to color"
                    );
                    self.reader = None;

                    // The controller clears the effect and republishes; if
                    // it is gone, rendering is over too
                    if self.light.effect_aborted().await.is_err() {
                        break;
                    }

                    tokio::time::sleep(self.frame_duration).await;
                }
            }
        }
    }

    /// Decode and apply the next frame of `effect`, returning its frame
    /// delay. Reopens the reader when the requested effect changed.
    async fn effect_frame(
        &mut self,
        effect: &str,
        brightness: u8,
    ) -> Result<Duration, CodecError> {
        let needs_open = !matches!(&self.reader, Some(reader) if reader.name() == effect);
        let reader = if needs_open {
            let opened = EffectReader::open(effect, self.library.path_for(effect)).await?;
            debug!(reader = ?opened, "opened effect");
            self.reader.insert(opened)
        } else {
            match &mut self.reader {
                Some(reader) => reader,
                None => unreachable!(),
            }
        };

        let frame_delay = reader.frame_delay();
        let frame = reader.next_frame().await?;

        for (index, color) in frame.iter().enumerate() {
            self.device.set_pixel(index, *color, brightness);
        }

        Ok(frame_delay)
    }
}
