pub mod emutime;
pub mod math;

pub use emutime::{Clock, EmuTime};
