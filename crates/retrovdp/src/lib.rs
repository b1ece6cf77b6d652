//! Headless driver for the V99x8 core.
//!
//! Runs a synthetic workload (bitmap uploads into the visible page plus
//! mid-frame register tricks) for a fixed number of frames against the
//! stats-collecting rasterizer and reports what the render scheduler did.

use std::cell::RefCell;
use std::rc::Rc;

use anyhow::{ensure, Result};
use retrovdp_common::EmuTime;
use retrovdp_v99x8::harness::{
    AlwaysPace, FixedVdp, NullCommandEngine, NullSpriteChecker, RasterStats, StatsRasterizer,
};
use retrovdp_v99x8::{RenderSettings, TableKind, VdpVram, TICKS_PER_LINE};

/// What a [`run`] produced, for the caller to report.
pub struct RunSummary {
    pub frames: u32,
    pub frames_drawn: u32,
    pub stats: RasterStats,
    pub vram_clock: EmuTime,
}

/// Emulate `frames` frames of a GRAPHIC4 screen being redrawn by the CPU.
pub fn run(frames: u32, settings: RenderSettings) -> Result<RunSummary> {
    ensure!(frames > 0, "frame count must be at least 1");

    let mut vdp = FixedVdp::default();
    let frame_ticks = vdp.ticks_per_frame as u64;
    let line = |frame: u32, n: u64| {
        EmuTime::from_ticks(u64::from(frame) * frame_ticks + n * TICKS_PER_LINE as u64)
    };

    let (rasterizer, stats) = StatsRasterizer::new();
    let mut vram = VdpVram::new(
        0x20000,
        EmuTime::ZERO,
        &vdp,
        Box::new(rasterizer),
        Box::new(NullCommandEngine),
        Box::new(NullSpriteChecker),
        Box::new(AlwaysPace),
        settings,
    );
    // GRAPHIC4 name table on the second 64K half; the renderer watches all
    // of VRAM and renders partially whenever an upload hits that page.
    vram.set_table_mask(TableKind::BitmapVisible, 0x1FFFF, !0x1FFFFu32, &vdp, EmuTime::ZERO);
    vram.set_table_mask(TableKind::NameTable, 0x1FFFF, !0x7FFFu32, &vdp, EmuTime::ZERO);

    let drawn = Rc::new(RefCell::new(0u32));
    let counter = Rc::clone(&drawn);
    vram.set_frame_finished_callback(Box::new(move |_| *counter.borrow_mut() += 1));

    for frame in 0..frames {
        vdp.frame_start_time = line(frame, 0);
        vram.frame_start(&vdp, vdp.frame_start_time);

        // A burst of uploads into the visible page, one per display line.
        for i in 0..64u64 {
            let addr = 0x10000 + ((u64::from(frame) * 64 + i) & 0x7FFF) as u32;
            let value = (u64::from(frame) + i) as u8;
            vram.cpu_write(&vdp, addr, value, line(frame, 16 + i));
        }

        // A mid-frame palette trick every eighth frame.
        if frame % 8 == 0 {
            vram.update_palette(&vdp, vdp.background_colour, 0x0777, line(frame, 100));
        }

        vram.frame_end(&vdp, line(frame + 1, 0));
        log::debug!(
            "frame {} done, display draw calls so far: {}",
            frame,
            stats.borrow().display_calls
        );
    }

    let stats = stats.borrow().clone();
    let frames_drawn = *drawn.borrow();
    Ok(RunSummary {
        frames,
        frames_drawn,
        stats,
        vram_clock: vram.time(),
    })
}
