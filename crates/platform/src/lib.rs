#![forbid(unsafe_code)]

pub mod io;

pub use io::{ExpansionBus, ExpansionIoDevice, IoWindow, WindowFlags};
