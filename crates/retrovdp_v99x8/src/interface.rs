//! Seams between the VRAM/renderer core and the rest of an emulated
//! machine. The core never blocks and never calls back into itself through
//! these traits; every method is synchronous and returns once its stated
//! postcondition holds.

use retrovdp_common::EmuTime;

use crate::mode::DisplayMode;
use crate::vram::VdpVram;

/// Stateless receiver of draw calls and mode-change notifications.
///
/// All coordinates are in master-clock ticks horizontally and display lines
/// vertically; `x1`/`y1` bounds are exclusive. Calls are fire-and-forget:
/// no return value carries error state.
pub trait Rasterizer {
    fn reset(&mut self);
    fn frame_start(&mut self);
    fn frame_end(&mut self);

    /// Whether the backend currently produces visible output. When it does
    /// not, frame pacing stops skipping (there is nothing to save).
    fn is_active(&self) -> bool;

    fn draw_border(&mut self, x0: i32, y0: i32, x1: i32, y1: i32);
    fn draw_display(
        &mut self,
        x0: i32,
        y0: i32,
        display_x: i32,
        display_y: i32,
        width: i32,
        height: i32,
    );
    fn draw_sprites(
        &mut self,
        x0: i32,
        y0: i32,
        display_x: i32,
        display_y: i32,
        width: i32,
        height: i32,
    );

    fn set_transparency(&mut self, enabled: bool);
    fn set_background_colour(&mut self, index: u8);
    fn set_palette(&mut self, index: u8, grb: u16);
    fn set_display_mode(&mut self, mode: DisplayMode);

    /// A VRAM byte at `address` changed; any cached conversion of it is
    /// stale. Called after the new value has been committed.
    fn update_vram_cache(&mut self, address: u32);
}

/// The autonomous drawing unit, able to write VRAM outside direct CPU
/// instruction execution.
pub trait CommandEngine {
    /// Bring all pending command writes up to `time`. The store lends
    /// itself out for the duration of this call; the engine commits its
    /// backlog through [`VdpVram::cmd_write`].
    fn sync(&mut self, vram: &mut VdpVram, vdp: &dyn VdpContext, time: EmuTime);

    fn update_display_mode(&mut self, _mode: DisplayMode, _time: EmuTime) {}
    fn update_display_enabled(&mut self, _enabled: bool, _time: EmuTime) {}
    fn update_sprites_enabled(&mut self, _enabled: bool, _time: EmuTime) {}
}

/// Sprite collision/attribute state tracker.
pub trait SpriteChecker {
    /// Bring collision and per-line sprite state up to `time`. Called
    /// before any sprite-enabled region is rendered.
    fn check_until(&mut self, time: EmuTime);

    /// A byte inside the sprite attribute table is about to change;
    /// `offset` is relative to the window base. The old value is still in
    /// place when this is called.
    fn update_sprite_attrib(&mut self, _offset: u32, _time: EmuTime) {}

    /// Same as `update_sprite_attrib` for the sprite pattern table.
    fn update_sprite_pattern(&mut self, _offset: u32, _time: EmuTime) {}

    /// A sprite table window was reconfigured (`enabled == false` means it
    /// now matches no address). Fired before the new mask takes effect.
    fn update_window(&mut self, _enabled: bool, _time: EmuTime) {}

    fn update_display_mode(&mut self, _mode: DisplayMode, _time: EmuTime) {}
    fn update_display_enabled(&mut self, _enabled: bool, _time: EmuTime) {}
    fn update_sprites_enabled(&mut self, _enabled: bool, _time: EmuTime) {}
}

/// Read-only view of the VDP register file and frame timing.
///
/// Register-update handlers on the store are invoked *before* the register
/// file applies the change, so these queries still return the old values at
/// that point; everything up to the handler's `time` is rendered with the
/// old state.
pub trait VdpContext {
    /// Ticks elapsed since the start of the current frame at `time`.
    fn ticks_this_frame(&self, time: EmuTime) -> i32;
    fn ticks_per_frame(&self) -> i32;

    /// Line number where the display area starts (top border height).
    fn line_zero(&self) -> i32;
    /// First display tick of a line (end of left border).
    fn left_border(&self) -> i32;
    /// First right-border tick of a line.
    fn right_border(&self) -> i32;
    /// Start of the border-coloured background strip left of the display.
    fn left_background(&self) -> i32;
    /// Leftmost tick where sprites are visible.
    fn left_sprites(&self) -> i32;

    fn is_border_masked(&self) -> bool;
    fn horizontal_scroll_low(&self) -> u8;
    fn vertical_scroll(&self) -> u8;
    fn display_mode(&self) -> DisplayMode;
    fn is_display_enabled(&self) -> bool;
    fn sprites_enabled(&self) -> bool;
    fn is_interlaced(&self) -> bool;
    fn is_multi_page_scrolling(&self) -> bool;
    /// Interlace even/odd page interchange, expressed as a mask on the
    /// line number (0 or 0x100).
    fn even_odd_mask(&self) -> u32;
    fn background_colour(&self) -> u8;
}

/// Real-time budget oracle for the frame-skip heuristic.
pub trait PacingSource {
    /// Whether there is slack to spend `estimated_cost_us` microseconds on
    /// backend work and still meet the next frame's real-time deadline.
    fn time_left(&mut self, estimated_cost_us: u64, time: EmuTime) -> bool;
}
