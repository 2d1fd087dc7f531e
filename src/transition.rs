//! Time-boxed linear interpolation tasks for brightness and color.
//!
//! A transition is a background task stepping a shared state cell from a
//! start value to a target. Only one transition may write a given axis at a
//! time: the owner stores the [`TransitionHandle`] per axis, and replacing
//! (or dropping) a handle aborts the previous task before it can write
//! again.

use std::time::Duration;

use tokio::task::JoinHandle;

use crate::color::Color;

/// Values a transition can interpolate.
pub trait Interpolate: Copy + Send + 'static {
    /// Linear interpolation: `self` at `fraction == 0`, `target` at
    /// `fraction == 1`.
    fn interpolate(self, target: Self, fraction: f32) -> Self;
}

impl Interpolate for Color {
    fn interpolate(self, target: Self, fraction: f32) -> Self {
        self.blend(target, fraction)
    }
}

impl Interpolate for u8 {
    fn interpolate(self, target: Self, fraction: f32) -> Self {
        // Truncating; fractions are within [0, 1] so the result always lies
        // between the endpoints
        (self as f32 * (1. - fraction) + target as f32 * fraction) as u8
    }
}

/// Step timing of a transition.
#[derive(Debug, Clone, Copy)]
pub struct TransitionTiming {
    pub duration: Duration,
    pub frame_duration: Duration,
}

impl TransitionTiming {
    pub fn from_millis(duration_ms: u32, frame_duration_ms: u32) -> Self {
        Self {
            duration: Duration::from_millis(duration_ms as _),
            frame_duration: Duration::from_millis(frame_duration_ms as _),
        }
    }

    /// Number of interpolation steps: `ceil(duration / frame_duration)`.
    pub fn total_frames(&self) -> u32 {
        let frame_ms = self.frame_duration.as_millis();
        if frame_ms == 0 {
            return 0;
        }

        ((self.duration.as_millis() + frame_ms - 1) / frame_ms) as u32
    }
}

/// Handle on a running transition task.
///
/// Cancellation is cooperative: the task stops at its next timing wait,
/// leaving the last written value in place. The handle aborts the task when
/// dropped, so storing the latest handle per axis is enough to guarantee a
/// single live writer.
#[derive(Debug)]
pub struct TransitionHandle {
    task: JoinHandle<()>,
}

impl TransitionHandle {
    pub fn cancel(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the transition to run to completion.
    pub async fn join(mut self) {
        // Aborting on drop would race the normal completion
        (&mut self.task).await.ok();
    }
}

impl Drop for TransitionHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Start a transition from `start` to `target`, applying each interpolated
/// value through `apply`.
///
/// The final step writes `target` itself, so an uninterrupted transition
/// always lands exactly on the target value.
pub fn start<T, F>(start: T, target: T, timing: TransitionTiming, mut apply: F) -> TransitionHandle
where
    T: Interpolate,
    F: FnMut(T) + Send + 'static,
{
    let task = tokio::spawn(async move {
        let total_frames = timing.total_frames();
        if total_frames == 0 {
            apply(target);
            return;
        }

        for frame in 0..=total_frames {
            let fraction = frame as f32 / total_frames as f32;
            apply(start.interpolate(target, fraction));

            if frame < total_frames {
                tokio::time::sleep(timing.frame_duration).await;
            }
        }
    });

    TransitionHandle { task }
}
