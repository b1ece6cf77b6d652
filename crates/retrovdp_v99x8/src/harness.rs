//! Minimal collaborator implementations for headless runs and tests.

use std::cell::RefCell;
use std::rc::Rc;

use retrovdp_common::EmuTime;

use crate::interface::{CommandEngine, PacingSource, Rasterizer, SpriteChecker, VdpContext};
use crate::mode::DisplayMode;
use crate::vram::VdpVram;
use crate::TICKS_PER_LINE;

/// A fixed register/timing snapshot implementing [`VdpContext`].
///
/// Values default to a plausible NTSC non-interlaced setup; tests and the
/// demo harness tweak individual fields.
#[derive(Clone, Debug)]
pub struct FixedVdp {
    pub frame_start_time: EmuTime,
    pub ticks_per_frame: i32,
    pub line_zero: i32,
    pub left_border: i32,
    pub right_border: i32,
    pub left_background: i32,
    pub left_sprites: i32,
    pub border_masked: bool,
    pub horizontal_scroll_low: u8,
    pub vertical_scroll: u8,
    pub display_mode: DisplayMode,
    pub display_enabled: bool,
    pub sprites_enabled: bool,
    pub interlaced: bool,
    pub multi_page_scrolling: bool,
    pub even_odd_mask: u32,
    pub background_colour: u8,
}

impl Default for FixedVdp {
    fn default() -> Self {
        FixedVdp {
            frame_start_time: EmuTime::ZERO,
            ticks_per_frame: 262 * TICKS_PER_LINE,
            line_zero: 16,
            left_border: 102,
            right_border: 102 + 1024,
            left_background: 102,
            left_sprites: 102,
            border_masked: false,
            horizontal_scroll_low: 0,
            vertical_scroll: 0,
            display_mode: DisplayMode::GRAPHIC4,
            display_enabled: true,
            sprites_enabled: false,
            interlaced: false,
            multi_page_scrolling: false,
            even_odd_mask: 0,
            background_colour: 0,
        }
    }
}

impl VdpContext for FixedVdp {
    fn ticks_this_frame(&self, time: EmuTime) -> i32 {
        (time - self.frame_start_time) as i32
    }

    fn ticks_per_frame(&self) -> i32 {
        self.ticks_per_frame
    }

    fn line_zero(&self) -> i32 {
        self.line_zero
    }

    fn left_border(&self) -> i32 {
        self.left_border
    }

    fn right_border(&self) -> i32 {
        self.right_border
    }

    fn left_background(&self) -> i32 {
        self.left_background
    }

    fn left_sprites(&self) -> i32 {
        self.left_sprites
    }

    fn is_border_masked(&self) -> bool {
        self.border_masked
    }

    fn horizontal_scroll_low(&self) -> u8 {
        self.horizontal_scroll_low
    }

    fn vertical_scroll(&self) -> u8 {
        self.vertical_scroll
    }

    fn display_mode(&self) -> DisplayMode {
        self.display_mode
    }

    fn is_display_enabled(&self) -> bool {
        self.display_enabled
    }

    fn sprites_enabled(&self) -> bool {
        self.sprites_enabled
    }

    fn is_interlaced(&self) -> bool {
        self.interlaced
    }

    fn is_multi_page_scrolling(&self) -> bool {
        self.multi_page_scrolling
    }

    fn even_odd_mask(&self) -> u32 {
        self.even_odd_mask
    }

    fn background_colour(&self) -> u8 {
        self.background_colour
    }
}

/// A command engine with no pending work; `sync` is a no-op.
#[derive(Default)]
pub struct NullCommandEngine;

impl CommandEngine for NullCommandEngine {
    fn sync(&mut self, _vram: &mut VdpVram, _vdp: &dyn VdpContext, _time: EmuTime) {}
}

/// A sprite checker that ignores everything.
#[derive(Default)]
pub struct NullSpriteChecker;

impl SpriteChecker for NullSpriteChecker {
    fn check_until(&mut self, _time: EmuTime) {}
}

/// A pacing source that always reports slack (never skips on deadline).
#[derive(Default)]
pub struct AlwaysPace;

impl PacingSource for AlwaysPace {
    fn time_left(&mut self, _estimated_cost_us: u64, _time: EmuTime) -> bool {
        true
    }
}

/// Counters accumulated by [`StatsRasterizer`].
#[derive(Default, Clone, Debug)]
pub struct RasterStats {
    pub border_calls: u64,
    pub display_calls: u64,
    pub sprite_calls: u64,
    pub border_pixels: u64,
    pub display_pixels: u64,
    pub cache_updates: u64,
    pub frames: u64,
}

/// A rasterizer that counts calls and covered pixels instead of drawing.
///
/// The rasterizer itself is boxed into the store; the returned handle
/// stays with the caller for inspection.
pub struct StatsRasterizer {
    pub active: bool,
    stats: Rc<RefCell<RasterStats>>,
}

impl StatsRasterizer {
    pub fn new() -> (StatsRasterizer, Rc<RefCell<RasterStats>>) {
        let stats = Rc::new(RefCell::new(RasterStats::default()));
        (
            StatsRasterizer {
                active: true,
                stats: Rc::clone(&stats),
            },
            stats,
        )
    }
}

impl Rasterizer for StatsRasterizer {
    fn reset(&mut self) {}

    fn frame_start(&mut self) {}

    fn frame_end(&mut self) {
        self.stats.borrow_mut().frames += 1;
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn draw_border(&mut self, x0: i32, y0: i32, x1: i32, y1: i32) {
        let mut stats = self.stats.borrow_mut();
        stats.border_calls += 1;
        stats.border_pixels += ((x1 - x0) as i64 * (y1 - y0) as i64) as u64;
    }

    fn draw_display(
        &mut self,
        _x0: i32,
        _y0: i32,
        _display_x: i32,
        _display_y: i32,
        width: i32,
        height: i32,
    ) {
        let mut stats = self.stats.borrow_mut();
        stats.display_calls += 1;
        stats.display_pixels += (width as i64 * height as i64) as u64;
    }

    fn draw_sprites(
        &mut self,
        _x0: i32,
        _y0: i32,
        _display_x: i32,
        _display_y: i32,
        _width: i32,
        _height: i32,
    ) {
        self.stats.borrow_mut().sprite_calls += 1;
    }

    fn set_transparency(&mut self, _enabled: bool) {}

    fn set_background_colour(&mut self, _index: u8) {}

    fn set_palette(&mut self, _index: u8, _grb: u16) {}

    fn set_display_mode(&mut self, _mode: DisplayMode) {}

    fn update_vram_cache(&mut self, _address: u32) {
        self.stats.borrow_mut().cache_updates += 1;
    }
}
