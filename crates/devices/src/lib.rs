#![forbid(unsafe_code)]

pub mod shortbus;

pub use shortbus::digimax::ShortbusDigimax;
