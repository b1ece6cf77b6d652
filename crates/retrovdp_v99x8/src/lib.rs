pub mod harness;
pub mod interface;
pub mod mode;
mod renderer;
pub mod settings;
mod vram;

pub use mode::{DisplayMode, ModeFlags};
pub use renderer::{PixelRenderer, RendererState};
pub use settings::{Accuracy, RenderSettings};
pub use vram::{CoreState, ObserverId, TableKind, VdpVram, VramMem, VramWindow};

/// Master-clock ticks per display line. One tick corresponds to one
/// horizontal screen position at the highest resolution the chip supports.
pub const TICKS_PER_LINE: i32 = 1368;

/// Save-state layout version for [`CoreState`].
pub const SAVE_STATE_VERSION: u32 = 1;
