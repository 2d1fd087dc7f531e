//! Light controller: reconciles inbound commands into transitions, effect
//! selection and outbound state publishes.

use std::sync::{Arc, RwLock};

use bytes::Bytes;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::{
    color::Color,
    command::{ColorMode, LightCommand, StateMessage},
    models::{LightConfig, TopicsConfig},
    transition::{self, TransitionHandle, TransitionTiming},
    transport::{MessageBus, TransportError},
};

/// Mutable record of the light.
///
/// `saved_color`/`saved_brightness` snapshot the values at the moment power
/// is switched off and are restored when it is switched back on.
#[derive(Debug, Clone, PartialEq)]
pub struct LightState {
    pub is_on: bool,
    pub color: Color,
    pub brightness: u8,
    pub effect: Option<String>,
    pub saved_color: Color,
    pub saved_brightness: u8,
}

impl Default for LightState {
    fn default() -> Self {
        Self {
            is_on: true,
            color: Color::rgb(1., 1., 1.),
            brightness: 255,
            effect: None,
            saved_color: Color::rgb(1., 1., 1.),
            saved_brightness: 255,
        }
    }
}

/// Shared handle on the light state.
///
/// The controller is the owner; transition tasks each write a single axis
/// through [`SharedLight::update`]; the render loop only takes snapshots.
#[derive(Debug, Clone, Default)]
pub struct SharedLight(Arc<RwLock<LightState>>);

impl SharedLight {
    pub fn new(state: LightState) -> Self {
        Self(Arc::new(RwLock::new(state)))
    }

    pub fn snapshot(&self) -> LightState {
        self.0.read().expect("light state lock poisoned").clone()
    }

    pub fn update(&self, f: impl FnOnce(&mut LightState)) {
        f(&mut self.0.write().expect("light state lock poisoned"))
    }
}

/// Events delivered to the controller task.
#[derive(Debug)]
pub enum LightEvent {
    /// Inbound message from the transport
    Message { topic: String, payload: Bytes },
    /// The transport (re)connected; re-announce everything
    BusRestored,
    /// Effect playback failed in the render loop
    EffectAborted,
}

#[derive(Debug, Error)]
pub enum LightHandleError {
    #[error("the light controller is no longer running")]
    Dropped,
}

impl<T> From<mpsc::error::SendError<T>> for LightHandleError {
    fn from(_: mpsc::error::SendError<T>) -> Self {
        Self::Dropped
    }
}

/// Cloneable mailbox for the controller task.
#[derive(Debug, Clone)]
pub struct LightHandle {
    tx: mpsc::Sender<LightEvent>,
}

impl LightHandle {
    pub async fn message(
        &self,
        topic: impl Into<String>,
        payload: Bytes,
    ) -> Result<(), LightHandleError> {
        Ok(self
            .tx
            .send(LightEvent::Message {
                topic: topic.into(),
                payload,
            })
            .await?)
    }

    pub async fn bus_restored(&self) -> Result<(), LightHandleError> {
        Ok(self.tx.send(LightEvent::BusRestored).await?)
    }

    pub async fn effect_aborted(&self) -> Result<(), LightHandleError> {
        Ok(self.tx.send(LightEvent::EffectAborted).await?)
    }
}

/// Create the controller mailbox.
pub fn channel() -> (LightHandle, mpsc::Receiver<LightEvent>) {
    let (tx, rx) = mpsc::channel(16);
    (LightHandle { tx }, rx)
}

/// The command/state-machine layer of the light.
pub struct LightController {
    config: LightConfig,
    topics: TopicsConfig,
    effects: Vec<String>,
    bus: Arc<dyn MessageBus>,
    state: SharedLight,
    color_transition: Option<TransitionHandle>,
    brightness_transition: Option<TransitionHandle>,
}

impl LightController {
    pub fn new(
        config: LightConfig,
        topics: TopicsConfig,
        effects: Vec<String>,
        bus: Arc<dyn MessageBus>,
        state: SharedLight,
    ) -> Self {
        Self {
            config,
            topics,
            effects,
            bus,
            state,
            color_transition: None,
            brightness_transition: None,
        }
    }

    /// Register with the transport and publish the current state.
    ///
    /// Safe to call repeatedly; also used for the reconnection signal.
    pub async fn announce(&self) -> Result<(), TransportError> {
        if self.config.supports_availability {
            self.bus
                .set_last_will(
                    &self.topics.availability(),
                    Bytes::from_static(b"unavailable"),
                )
                .await?;
        }

        self.bus.subscribe(&self.topics.command()).await?;

        if self.config.supports_availability {
            self.bus
                .publish(&self.topics.availability(), Bytes::from_static(b"available"))
                .await?;
        }

        self.publish_state(None, None).await
    }

    /// Dispatch an inbound transport message.
    pub async fn handle_message(&mut self, topic: &str, payload: &[u8]) {
        if topic == self.topics.command() {
            self.handle_command(payload).await;
        }
    }

    async fn handle_command(&mut self, payload: &[u8]) {
        let command: LightCommand = match serde_json::from_slice(payload) {
            Ok(command) => command,
            Err(error) => {
                warn!(error = %error, "ignoring malformed command");
                return;
            }
        };

        debug!(command = ?command, "handling command");

        let mut changed = false;
        // Published values are the transition targets, not whatever partial
        // value is in the cell when the publish goes out
        let mut target_brightness = None;
        let mut target_color = None;

        if let Some(switch) = command.state {
            let was_on = self.state.snapshot().is_on;

            if switch.is_on() && !was_on {
                let (saved_color, saved_brightness) = {
                    let snapshot = self.state.snapshot();
                    (snapshot.saved_color, snapshot.saved_brightness)
                };

                self.state.update(|state| state.is_on = true);
                self.start_color_transition(saved_color);
                self.start_brightness_transition(saved_brightness);

                target_color = Some(saved_color);
                target_brightness = Some(saved_brightness);
                changed = true;
            } else if !switch.is_on() && was_on {
                self.state.update(|state| {
                    state.saved_color = state.color;
                    state.saved_brightness = state.brightness;
                    state.is_on = false;
                });
                self.start_color_transition(Color::rgb(0., 0., 0.));
                self.start_brightness_transition(0);

                // Report the values the light will come back on with
                let snapshot = self.state.snapshot();
                target_color = Some(snapshot.saved_color);
                target_brightness = Some(snapshot.saved_brightness);
                changed = true;
            }
        }

        if self.config.supports_effects {
            match command.effect {
                // An absent field clears too; the command schema carries no
                // distinction between null and missing
                None => {
                    if self.state.snapshot().effect.is_some() {
                        self.state.update(|state| state.effect = None);
                        changed = true;
                    }
                }
                Some(ref name) if self.effects.contains(name) => {
                    let name = name.clone();
                    self.state.update(|state| state.effect = Some(name));
                    changed = true;
                }
                Some(ref name) => {
                    warn!(effect = %name, "unknown effect requested, keeping current");
                }
            }
        }

        if let Some(brightness) = command.brightness {
            self.start_brightness_transition(brightness);
            target_brightness = Some(brightness);
            changed = true;
        }

        if let Some(rgb) = command.color {
            let color = Color::from(rgb);
            self.start_color_transition(color);
            target_color = Some(color);
            changed = true;
        }

        if changed {
            if let Err(error) = self.publish_state(target_brightness, target_color).await {
                warn!(error = %error, "failed to publish state");
            }
        }
    }

    fn timing(&self) -> TransitionTiming {
        TransitionTiming::from_millis(
            self.config.transition_duration_ms,
            self.config.frame_duration_ms,
        )
    }

    fn start_brightness_transition(&mut self, target: u8) {
        // One live writer per axis: the previous transition goes first
        if let Some(previous) = self.brightness_transition.take() {
            previous.cancel();
        }

        let start = self.state.snapshot().brightness;
        let state = self.state.clone();

        self.brightness_transition = Some(transition::start(
            start,
            target,
            self.timing(),
            move |value| state.update(|s| s.brightness = value),
        ));
    }

    fn start_color_transition(&mut self, target: Color) {
        if let Some(previous) = self.color_transition.take() {
            previous.cancel();
        }

        let start = self.state.snapshot().color;
        let state = self.state.clone();

        self.color_transition = Some(transition::start(
            start,
            target,
            self.timing(),
            move |value| state.update(|s| s.color = value),
        ));
    }

    /// Publish a state snapshot, overriding brightness/color with the given
    /// target values when present.
    pub async fn publish_state(
        &self,
        brightness: Option<u8>,
        color: Option<Color>,
    ) -> Result<(), TransportError> {
        let snapshot = self.state.snapshot();

        let message = StateMessage {
            state: snapshot.is_on.into(),
            brightness: Some(brightness.unwrap_or(snapshot.brightness)),
            color: Some(color.unwrap_or(snapshot.color).into()),
            color_mode: Some(ColorMode::Rgb),
            effect: snapshot.effect,
        };

        let payload = serde_json::to_vec(&message)?;
        self.bus
            .publish(&self.topics.state(), payload.into())
            .await
    }

    /// Controller task: announces once, then processes events until every
    /// handle is dropped. Commands are strictly serialized here.
    pub async fn run(mut self, mut events: mpsc::Receiver<LightEvent>) {
        if let Err(error) = self.announce().await {
            warn!(error = %error, "initial announce failed");
        }

        while let Some(event) = events.recv().await {
            trace!(event = ?event, "controller event");

            match event {
                LightEvent::Message { topic, payload } => {
                    self.handle_message(&topic, &payload).await;
                }
                LightEvent::BusRestored => {
                    if let Err(error) = self.announce().await {
                        warn!(error = %error, "re-announce failed");
                    }
                }
                LightEvent::EffectAborted => {
                    self.state.update(|state| state.effect = None);
                    if let Err(error) = self.publish_state(None, None).await {
                        warn!(error = %error, "failed to publish state");
                    }
                }
            }
        }
    }
}

impl std::fmt::Debug for LightController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LightController")
            .field("name", &self.config.name)
            .finish()
    }
}
