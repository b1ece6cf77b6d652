//! Timing-driven incremental rasterization.
//!
//! The renderer is itself a VRAM observer: it converts elapsed emulated
//! time plus display-register changes into draw calls against the
//! rasterizer backend, always rendering the region between its cursor and
//! the current moment before any state that region depends on changes.
//! Frame skipping only ever drops the final backend draw; it never skips
//! synchronization, so emulation state stays exact.

use std::time::Instant;

use retrovdp_common::EmuTime;
use serde::{Deserialize, Serialize};

use crate::interface::{PacingSource, Rasterizer, SpriteChecker, VdpContext};
use crate::mode::DisplayMode;
use crate::settings::{Accuracy, RenderSettings};
use crate::vram::{VdpVram, VramWindow, VramWindows};
use crate::TICKS_PER_LINE;

/// Sentinel frame-skip counter that forces the next frame to be drawn.
const FORCE_DRAW_COUNTER: u32 = 999;

/// Rounding bias for line-level accuracy. Chosen so the rounding point
/// does not depend on the left border position, which can change mid-frame
/// and would otherwise make a line render without time advancing.
const LINE_ROUND_TICKS: i32 = 400;

/// Smoothing factor of the backend finish-latency moving average.
const FINISH_EMA_ALPHA: f64 = 0.2;

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
enum DrawType {
    Border,
    Display,
}

/// Snapshot of the renderer's mutable state.
#[derive(Clone, Serialize, Deserialize)]
pub struct RendererState {
    pub settings: RenderSettings,
    pub accuracy: Accuracy,
    pub display_enabled: bool,
    pub frame_skip_counter: u32,
    pub finish_frame_duration_us: f64,
    pub draw_frame: bool,
    pub prev_draw_frame: bool,
    pub render_frame: bool,
    pub next_x: i32,
    pub next_y: i32,
    pub text_mode_counter: i32,
}

/// Per-frame render scheduling state. Owned by the VRAM store; the entry
/// points live as `impl VdpVram` below because rendering needs the store's
/// windows and sprite checker alongside this state.
pub struct PixelRenderer {
    rasterizer: Box<dyn Rasterizer>,
    pacing: Box<dyn PacingSource>,
    settings: RenderSettings,
    /// Accuracy snapshotted at frame start; setting changes mid-frame must
    /// not change behaviour until the next frame.
    accuracy: Accuracy,
    display_enabled: bool,
    frame_skip_counter: u32,
    /// EMA of the backend's frame-finish latency, in microseconds.
    finish_frame_duration_us: f64,
    draw_frame: bool,
    prev_draw_frame: bool,
    render_frame: bool,
    /// Render cursor: output up to this pixel has been produced this frame.
    next_x: i32,
    next_y: i32,
    /// Software row counter emulating a non-standard text-mode scroll
    /// quirk; advanced once per update batch.
    text_mode_counter: i32,
    /// Guard against re-entering the render path.
    in_render: bool,
    frame_finished: Option<Box<dyn FnMut(EmuTime)>>,
}

impl PixelRenderer {
    pub(crate) fn new(
        mut rasterizer: Box<dyn Rasterizer>,
        pacing: Box<dyn PacingSource>,
        settings: RenderSettings,
        display_enabled: bool,
    ) -> PixelRenderer {
        rasterizer.reset();
        PixelRenderer {
            rasterizer,
            pacing,
            settings,
            accuracy: settings.accuracy,
            display_enabled,
            // Force the first frame to be drawn.
            frame_skip_counter: FORCE_DRAW_COUNTER,
            finish_frame_duration_us: 0.0,
            // Nothing is drawn before frame_start is called.
            draw_frame: false,
            prev_draw_frame: false,
            render_frame: false,
            next_x: 0,
            next_y: 0,
            text_mode_counter: 0,
            in_render: false,
            frame_finished: None,
        }
    }

    #[inline]
    pub fn rasterizer_mut(&mut self) -> &mut dyn Rasterizer {
        self.rasterizer.as_mut()
    }

    #[inline]
    pub fn display_enabled(&self) -> bool {
        self.display_enabled
    }

    /// Whether the current frame accumulates render output at all.
    #[inline]
    pub fn render_frame(&self) -> bool {
        self.render_frame
    }

    #[cfg(test)]
    pub(crate) fn cursor(&self) -> (i32, i32) {
        (self.next_x, self.next_y)
    }

    /// Install new settings; takes effect at the next frame start, which is
    /// forced to draw so the change becomes visible immediately.
    pub fn set_settings(&mut self, settings: RenderSettings) {
        self.settings = settings;
        self.frame_skip_counter = FORCE_DRAW_COUNTER;
    }

    #[inline]
    pub fn settings(&self) -> RenderSettings {
        self.settings
    }

    /// Register a callback fired after each frame that was selected for
    /// drawing has been handed to the backend.
    pub fn set_frame_finished_callback(&mut self, callback: Box<dyn FnMut(EmuTime)>) {
        self.frame_finished = Some(callback);
    }

    pub(crate) fn save_state(&self) -> RendererState {
        RendererState {
            settings: self.settings,
            accuracy: self.accuracy,
            display_enabled: self.display_enabled,
            frame_skip_counter: self.frame_skip_counter,
            finish_frame_duration_us: self.finish_frame_duration_us,
            draw_frame: self.draw_frame,
            prev_draw_frame: self.prev_draw_frame,
            render_frame: self.render_frame,
            next_x: self.next_x,
            next_y: self.next_y,
            text_mode_counter: self.text_mode_counter,
        }
    }

    pub(crate) fn restore_state(&mut self, state: &RendererState) {
        self.settings = state.settings;
        self.accuracy = state.accuracy;
        self.display_enabled = state.display_enabled;
        self.frame_skip_counter = state.frame_skip_counter;
        self.finish_frame_duration_us = state.finish_frame_duration_us;
        self.draw_frame = state.draw_frame;
        self.prev_draw_frame = state.prev_draw_frame;
        self.render_frame = state.render_frame;
        self.next_x = state.next_x;
        self.next_y = state.next_y;
        self.text_mode_counter = state.text_mode_counter;
        self.in_render = false;
    }

    /// Frame pacing: decide whether this frame gets drawn, then reset the
    /// per-frame render state.
    fn frame_start(&mut self, vdp: &dyn VdpContext, time: EmuTime) {
        let mut draw = false;
        if !self.rasterizer.is_active() {
            // Nothing visible to save by skipping.
            self.frame_skip_counter = 0;
        } else if self.frame_skip_counter < self.settings.min_frame_skip {
            self.frame_skip_counter += 1;
        } else if self.frame_skip_counter >= self.settings.max_frame_skip {
            self.frame_skip_counter = 0;
            draw = true;
        } else {
            self.frame_skip_counter += 1;
            draw = self
                .pacing
                .time_left(self.finish_frame_duration_us as u64, time);
            if draw {
                self.frame_skip_counter = 0;
            }
        }
        self.prev_draw_frame = self.draw_frame;
        self.draw_frame = draw;
        // An odd skipped field may still need rendering to complete an
        // interlaced pair.
        self.render_frame = self.draw_frame
            || (self.prev_draw_frame && vdp.is_interlaced() && self.settings.deinterlace);
        if !self.render_frame {
            return;
        }

        self.rasterizer.frame_start();
        self.accuracy = self.settings.accuracy;
        self.next_x = 0;
        self.next_y = 0;
        self.text_mode_counter = 0;
    }

    /// Hand the finished frame to the backend and fold its finish latency
    /// into the pacing estimate.
    fn finish_frame(&mut self, time: EmuTime) {
        let start = Instant::now();
        self.rasterizer.frame_end();
        let current = start.elapsed().as_micros() as f64;
        self.finish_frame_duration_us =
            self.finish_frame_duration_us * (1.0 - FINISH_EMA_ALPHA) + current * FINISH_EMA_ALPHA;

        if self.draw_frame {
            log::debug!(
                "frame finished at {}, backend latency EMA {:.0}us",
                time,
                self.finish_frame_duration_us
            );
            if let Some(callback) = &mut self.frame_finished {
                callback(time);
            }
        }
    }

    fn draw(
        &mut self,
        vdp: &dyn VdpContext,
        x0: i32,
        y0: i32,
        x1: i32,
        y1: i32,
        draw_type: DrawType,
        at_end: bool,
    ) {
        match draw_type {
            DrawType::Border => self.rasterizer.draw_border(x0, y0, x1, y1),
            DrawType::Display => {
                let zero = vdp.line_zero();
                let display_x = (x0 - vdp.left_sprites()) / 2;
                let mut display_y = y0 - zero;
                if !vdp.display_mode().is_text_mode() {
                    display_y += vdp.vertical_scroll() as i32;
                } else {
                    // The real chip latches text rows differently; a
                    // software row counter advanced once per update batch
                    // matches the observable scroll behaviour.
                    display_y = (display_y & 7) | (self.text_mode_counter * 8);
                    if at_end {
                        let low = 0.max(y0 - zero) / 8;
                        let high = 0.max(y1 - zero) / 8;
                        self.text_mode_counter += high - low;
                    }
                }

                display_y &= 255; // page wrap
                let display_width = (x1 - (x0 & !1)) / 2;
                let display_height = y1 - y0;

                debug_assert!(display_x >= 0);
                debug_assert!(display_x + display_width <= 512);

                self.rasterizer.draw_display(
                    x0,
                    y0,
                    display_x - vdp.horizontal_scroll_low() as i32 * 2,
                    display_y,
                    display_width,
                    display_height,
                );
                if vdp.sprites_enabled() {
                    self.rasterizer.draw_sprites(
                        x0,
                        y0,
                        display_x / 2,
                        display_y,
                        (display_width + 1) / 2,
                        display_height,
                    );
                }
            }
        }
    }

    /// Emit the rectangle from the old cursor to (`end_x`, `end_y`),
    /// clipped to [`clip_l`, `clip_r`), as at most three draw calls: a
    /// partial first line, the full middle lines in one call, and a partial
    /// last line. Pieces are issued top to bottom even though that costs an
    /// extra conditional; it improves memory locality in the backend.
    fn subdivide(
        &mut self,
        vdp: &dyn VdpContext,
        start_x: i32,
        start_y: i32,
        end_x: i32,
        end_y: i32,
        clip_l: i32,
        clip_r: i32,
        draw_type: DrawType,
    ) {
        let mut start_y = start_y;
        let mut end_y = end_y;
        // Partial first line.
        if start_x > clip_l {
            let at_end = (start_y != end_y) || (end_x >= clip_r);
            if start_x < clip_r {
                self.draw(
                    vdp,
                    start_x,
                    start_y,
                    if at_end { clip_r } else { end_x },
                    start_y + 1,
                    draw_type,
                    at_end,
                );
            }
            if start_y == end_y {
                return;
            }
            start_y += 1;
        }
        // Partial last line.
        let mut draw_last = false;
        if end_x >= clip_r {
            end_y += 1;
        } else if end_x > clip_l {
            draw_last = true;
        }
        // Full middle lines.
        if start_y < end_y {
            self.draw(vdp, clip_l, start_y, clip_r, end_y, draw_type, true);
        }
        if draw_last {
            self.draw(vdp, clip_l, end_y, end_x, end_y + 1, draw_type, false);
        }
    }

    /// Replay the region between the render cursor and `time` through the
    /// rasterizer, then advance the cursor. Runs to completion; must not be
    /// re-entered.
    fn render_until(&mut self, vdp: &dyn VdpContext, sprites: &mut dyn SpriteChecker, time: EmuTime) {
        debug_assert!(!self.in_render, "render path re-entered");
        self.in_render = true;

        // Translate time into a target pixel position.
        let limit_ticks = vdp.ticks_this_frame(time);
        debug_assert!(limit_ticks <= vdp.ticks_per_frame());
        let (limit_x, limit_y) = match self.accuracy {
            Accuracy::Pixel => (limit_ticks % TICKS_PER_LINE, limit_ticks / TICKS_PER_LINE),
            Accuracy::Line | Accuracy::Screen => {
                (0, (limit_ticks + TICKS_PER_LINE - LINE_ROUND_TICKS) / TICKS_PER_LINE)
            }
        };

        // Nothing to render. This also ensures no pixels are produced in a
        // series of updates landing on exactly the same instant: subsystem
        // state may be transiently inconsistent until all of them applied.
        if limit_x == self.next_x && limit_y == self.next_y {
            self.in_render = false;
            return;
        }

        if self.display_enabled {
            if vdp.sprites_enabled() {
                // Sprite state must be current before the rasterizer pulls
                // the per-line sprite data.
                sprites.check_until(time);
            }

            // The 0..7 horizontal-scroll-low pixels are drawn in border
            // colour together with the border, but sprites above them clip
            // at the real border.
            let border_l = vdp.left_border();
            let display_l = if vdp.is_border_masked() {
                border_l
            } else {
                vdp.left_background()
            };
            let border_r = vdp.right_border();

            let (next_x, next_y) = (self.next_x, self.next_y);
            self.subdivide(vdp, next_x, next_y, limit_x, limit_y, 0, display_l, DrawType::Border);
            self.subdivide(
                vdp,
                next_x,
                next_y,
                limit_x,
                limit_y,
                display_l,
                border_r,
                DrawType::Display,
            );
            self.subdivide(
                vdp,
                next_x,
                next_y,
                limit_x,
                limit_y,
                border_r,
                TICKS_PER_LINE,
                DrawType::Border,
            );
        } else {
            let (next_x, next_y) = (self.next_x, self.next_y);
            self.subdivide(
                vdp,
                next_x,
                next_y,
                limit_x,
                limit_y,
                0,
                TICKS_PER_LINE,
                DrawType::Border,
            );
        }

        self.next_x = limit_x;
        self.next_y = limit_y;
        self.in_render = false;
    }

    /// Decide whether a VRAM change at `offset` can affect pixels that are
    /// already due, which would require a partial render before the byte
    /// changes. False negatives are a correctness bug; false positives only
    /// cost performance, so unmodelled cases answer conservatively.
    fn check_sync(
        &self,
        windows: &VramWindows,
        vdp: &dyn VdpContext,
        offset: u32,
        time: EmuTime,
    ) -> bool {
        // With the display off, output does not depend on VRAM at all.
        if !self.display_enabled {
            return false;
        }
        if self.accuracy == Accuracy::Screen {
            return false;
        }

        // Display lines scanned between the cursor and the update moment.
        // display_y1 is inclusive; the display range may wrap at 256.
        let delta_y = vdp.vertical_scroll() as i32 - vdp.line_zero();
        let limit_y = vdp.ticks_this_frame(time) / TICKS_PER_LINE;
        let display_y0 = (self.next_y + delta_y) & 255;
        let display_y1 = (limit_y + delta_y) & 255;

        match vdp.display_mode().base() {
            DisplayMode::GRAPHIC2 | DisplayMode::GRAPHIC3 => {
                // Colour and pattern tables span four 64-line quarters;
                // undecoded base bits mirror a written quarter into others.
                let quarter_hit = |window: &VramWindow| {
                    if !window.is_inside(offset) {
                        return false;
                    }
                    let written_quarter = (offset & 0x1800) >> 11;
                    let mask = (window.get_mask() & 0x1800) >> 11;
                    (0u32..4).any(|quarter| {
                        (quarter & mask) == written_quarter
                            && overlap(
                                display_y0,
                                display_y1,
                                quarter as i32 * 64,
                                (quarter as i32 + 1) * 64,
                            )
                    })
                };
                if quarter_hit(&windows.colour_table) || quarter_hit(&windows.pattern_table) {
                    return true;
                }
                if windows.name_table.is_inside(offset) {
                    let vram_line = (((offset & 0x3FF) / 32) * 8) as i32;
                    if overlap(display_y0, display_y1, vram_line, vram_line + 8) {
                        return true;
                    }
                }
                false
            }
            DisplayMode::GRAPHIC4 | DisplayMode::GRAPHIC5 => {
                // Page-level test: is the address inside the visible
                // page(s)? Line-level precision is not modelled here.
                let visible_page =
                    windows.name_table.get_mask() & (0x10000 | (vdp.even_odd_mask() << 7));
                if vdp.is_multi_page_scrolling() {
                    (offset & 0x18000) == visible_page
                        || (offset & 0x18000) == (visible_page & 0x10000)
                } else {
                    (offset & 0x18000) == visible_page
                }
            }
            // Precise detection is not modelled for these; overlap is
            // assumed so nothing is missed.
            DisplayMode::GRAPHIC6 | DisplayMode::GRAPHIC7 => true,
            _ => {
                // Range unknown; assume any configured table overlaps.
                windows.name_table.is_inside(offset)
                    || windows.colour_table.is_inside(offset)
                    || windows.pattern_table.is_inside(offset)
            }
        }
    }
}

/// Does the (possibly wrapping) display line range intersect the
/// non-wrapping VRAM line range [`vram_line0`, `vram_line1`)?
/// `display_y1` is inclusive.
fn overlap(display_y0: i32, display_y1: i32, vram_line0: i32, vram_line1: i32) -> bool {
    if display_y0 <= display_y1 {
        vram_line1 > display_y0 && vram_line0 <= display_y1
    } else {
        vram_line1 > display_y0 || vram_line0 <= display_y1
    }
}

/// Renderer entry points. These live on the store because rendering needs
/// the windows, sprite checker and command engine next to the renderer
/// state; the borrows split per field.
impl VdpVram {
    /// Start a new frame: run the pacing decision and reset the cursor.
    pub fn frame_start(&mut self, vdp: &dyn VdpContext, time: EmuTime) {
        self.renderer.frame_start(vdp, time);
    }

    /// Finish the frame: force a final sync, let the backend finish, and
    /// emit the frame-completed notification if this frame was drawn.
    pub fn frame_end(&mut self, vdp: &dyn VdpContext, time: EmuTime) {
        if self.renderer.render_frame {
            self.render_sync(vdp, time, true);
            self.renderer.finish_frame(time);
        }
    }

    /// Catch up VRAM, then render up to `time`.
    ///
    /// Two phases: the command-engine catch-up may itself trigger
    /// `renderer_update_vram` -> `render_until` for intermediate moments;
    /// running `render_until` afterwards picks up register changes made
    /// after the last VRAM write. This ordering is what keeps the render
    /// path from being re-entered.
    pub(crate) fn render_sync(&mut self, vdp: &dyn VdpContext, time: EmuTime, force: bool) {
        if !self.renderer.render_frame {
            return;
        }
        if self.renderer.accuracy != Accuracy::Screen || force {
            self.sync(vdp, time);
            self.renderer.render_until(vdp, self.sprites.as_mut(), time);
        }
    }

    /// Pre-commit VRAM change notification for the renderer's window: if
    /// the change overlaps pixels already due, render them from the old
    /// state first.
    pub(crate) fn renderer_update_vram(&mut self, vdp: &dyn VdpContext, offset: u32, time: EmuTime) {
        if self.renderer.render_frame
            && self.renderer.display_enabled
            && self
                .renderer
                .check_sync(&self.windows, vdp, offset, time)
        {
            self.renderer.render_until(vdp, self.sprites.as_mut(), time);
        }
    }

    /// The renderer's observed window moved. Redundant for rendering:
    /// the same reconfiguration always arrives through a register-update
    /// handler as well.
    pub(crate) fn renderer_update_window(
        &mut self,
        _vdp: &dyn VdpContext,
        _enabled: bool,
        _time: EmuTime,
    ) {
    }

    /// Reset the render pipeline and restart the current frame.
    pub fn reset_renderer(&mut self, vdp: &dyn VdpContext, time: EmuTime) {
        self.renderer.rasterizer.reset();
        self.renderer.display_enabled = vdp.is_display_enabled();
        self.frame_start(vdp, time);
    }

    pub fn set_render_settings(&mut self, settings: RenderSettings) {
        self.renderer.set_settings(settings);
    }

    pub fn set_frame_finished_callback(&mut self, callback: Box<dyn FnMut(EmuTime)>) {
        self.renderer.set_frame_finished_callback(callback);
    }

    #[inline]
    pub fn renderer(&self) -> &PixelRenderer {
        &self.renderer
    }

    #[inline]
    pub fn renderer_mut(&mut self) -> &mut PixelRenderer {
        &mut self.renderer
    }

    // Display-register update handlers. Each follows one rule: force an
    // incremental sync before the register change lands, so everything up
    // to `time` renders with the old value. The register file still
    // returns the old values through `vdp` at this point.

    pub fn update_horizontal_scroll_low(&mut self, vdp: &dyn VdpContext, _scroll: u8, time: EmuTime) {
        if self.renderer.display_enabled {
            self.render_sync(vdp, time, false);
        }
    }

    pub fn update_horizontal_scroll_high(&mut self, vdp: &dyn VdpContext, _scroll: u8, time: EmuTime) {
        if self.renderer.display_enabled {
            self.render_sync(vdp, time, false);
        }
    }

    pub fn update_border_mask(&mut self, vdp: &dyn VdpContext, _masked: bool, time: EmuTime) {
        if self.renderer.display_enabled {
            self.render_sync(vdp, time, false);
        }
    }

    pub fn update_multi_page(&mut self, vdp: &dyn VdpContext, _multi_page: bool, time: EmuTime) {
        if self.renderer.display_enabled {
            self.render_sync(vdp, time, false);
        }
    }

    pub fn update_transparency(&mut self, vdp: &dyn VdpContext, enabled: bool, time: EmuTime) {
        if self.renderer.display_enabled {
            self.render_sync(vdp, time, false);
        }
        self.renderer.rasterizer.set_transparency(enabled);
    }

    pub fn update_foreground_colour(&mut self, vdp: &dyn VdpContext, _colour: u8, time: EmuTime) {
        if self.renderer.display_enabled {
            self.render_sync(vdp, time, false);
        }
    }

    pub fn update_background_colour(&mut self, vdp: &dyn VdpContext, colour: u8, time: EmuTime) {
        self.render_sync(vdp, time, false);
        // GRAPHIC7 has no background-colour register effect; its border
        // colour comes from the palette instead.
        if vdp.display_mode() != DisplayMode::GRAPHIC7 {
            self.renderer.rasterizer.set_background_colour(colour);
        }
    }

    pub fn update_blink_foreground_colour(&mut self, vdp: &dyn VdpContext, _colour: u8, time: EmuTime) {
        if self.renderer.display_enabled {
            self.render_sync(vdp, time, false);
        }
    }

    pub fn update_blink_background_colour(&mut self, vdp: &dyn VdpContext, _colour: u8, time: EmuTime) {
        if self.renderer.display_enabled {
            self.render_sync(vdp, time, false);
        }
    }

    pub fn update_blink_state(&mut self, _vdp: &dyn VdpContext, _enabled: bool, _time: EmuTime) {
        // Deliberately no sync: this lands at frame start and syncing here
        // makes the whole screen flash on every blink period.
    }

    pub fn update_palette(&mut self, vdp: &dyn VdpContext, index: u8, grb: u16, time: EmuTime) {
        if self.renderer.display_enabled {
            self.render_sync(vdp, time, false);
        } else {
            // Only the border is visible; sync only when this palette
            // entry feeds the border colour in the current mode.
            let mode = vdp.display_mode();
            if mode.base() == DisplayMode::GRAPHIC5 {
                let bg = vdp.background_colour();
                if index == (bg & 3) || index == (bg >> 2) {
                    self.render_sync(vdp, time, false);
                }
            } else if mode != DisplayMode::GRAPHIC7 && index == vdp.background_colour() {
                self.render_sync(vdp, time, false);
            }
        }
        self.renderer.rasterizer.set_palette(index, grb);
    }

    pub fn update_vertical_scroll(&mut self, vdp: &dyn VdpContext, _scroll: u8, time: EmuTime) {
        if self.renderer.display_enabled {
            self.render_sync(vdp, time, false);
        }
    }

    pub fn update_horizontal_adjust(&mut self, vdp: &dyn VdpContext, _adjust: i32, time: EmuTime) {
        if self.renderer.display_enabled {
            self.render_sync(vdp, time, false);
        }
    }

    pub fn update_name_base(&mut self, vdp: &dyn VdpContext, _addr: u32, time: EmuTime) {
        if self.renderer.display_enabled {
            self.render_sync(vdp, time, false);
        }
    }

    pub fn update_pattern_base(&mut self, vdp: &dyn VdpContext, _addr: u32, time: EmuTime) {
        if self.renderer.display_enabled {
            self.render_sync(vdp, time, false);
        }
    }

    pub fn update_colour_base(&mut self, vdp: &dyn VdpContext, _addr: u32, time: EmuTime) {
        if self.renderer.display_enabled {
            self.render_sync(vdp, time, false);
        }
    }

    /// Display mode change: sync if the display is visible or if the
    /// border drawing process changes (the modes whose border colour comes
    /// from the palette rather than the background register).
    pub fn update_display_mode(&mut self, vdp: &dyn VdpContext, mode: DisplayMode, time: EmuTime) {
        let old = vdp.display_mode();
        if self.renderer.display_enabled
            || old == DisplayMode::GRAPHIC5
            || old == DisplayMode::GRAPHIC7
            || mode == DisplayMode::GRAPHIC5
            || mode == DisplayMode::GRAPHIC7
        {
            self.render_sync(vdp, time, true);
        }
        self.renderer.rasterizer.set_display_mode(mode);
        if let Some(cmd) = self.cmd.as_mut() {
            cmd.update_display_mode(mode, time);
        }
        self.sprites.update_display_mode(mode, time);
    }

    /// Display enabled change. Border start/end and forced blanking both
    /// count.
    pub fn update_display_enabled(&mut self, vdp: &dyn VdpContext, enabled: bool, time: EmuTime) {
        self.render_sync(vdp, time, true);
        self.renderer.display_enabled = enabled;
        if let Some(cmd) = self.cmd.as_mut() {
            cmd.update_display_enabled(enabled, time);
        }
        self.sprites.update_display_enabled(enabled, time);
    }

    pub fn update_sprites_enabled(&mut self, vdp: &dyn VdpContext, enabled: bool, time: EmuTime) {
        if self.renderer.display_enabled {
            self.render_sync(vdp, time, false);
        }
        if let Some(cmd) = self.cmd.as_mut() {
            cmd.update_sprites_enabled(enabled, time);
        }
        self.sprites.update_sprites_enabled(enabled, time);
    }
}
