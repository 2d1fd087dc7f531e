//! `strandlight` drives an addressable LED strip as a smart-home light.
//!
//! The crate exposes the light as a pub/sub entity with power, brightness,
//! RGB color and named animated effects. Effects are authored offline into a
//! compressed text format (see [`effects`]) and decoded on the fly with
//! bounded memory. Command handling, transitions and rendering run as
//! independent tokio tasks sharing a single [`light::SharedLight`] state.

#[macro_use]
extern crate tracing;

pub mod color;
pub mod command;
pub mod device;
pub mod effects;
pub mod light;
pub mod models;
pub mod render;
pub mod servers;
pub mod transition;
pub mod transport;
