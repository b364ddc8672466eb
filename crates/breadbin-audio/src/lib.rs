#![forbid(unsafe_code)]

//! Breadbin audio subsystem.
//!
//! This crate provides the shared sound mixer that expansion-port sound
//! chips register with, plus the sink trait used to hand mixed frames to a
//! host backend.

pub mod mixer;
pub mod sink;

pub use mixer::{ChipDescriptor, SoundChipHandle, SoundMixer};
pub use sink::AudioSink;
