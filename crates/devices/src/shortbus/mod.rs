//! IDE64 short-bus expansions.
//!
//! The IDE64 cartridge carries a small expansion connector ("short bus") of
//! its own. Devices plugged into it only respond on the expansion I/O pages
//! while the IDE64 interface itself is attached, so every short-bus device
//! gates its bus window on the host cartridge's lifecycle in addition to
//! its own enable switch.

pub mod digimax;

pub use digimax::ShortbusDigimax;
