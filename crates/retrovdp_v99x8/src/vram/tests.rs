use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use retrovdp_common::EmuTime;

use crate::harness::{AlwaysPace, FixedVdp, NullCommandEngine, NullSpriteChecker, StatsRasterizer};
use crate::interface::{CommandEngine, SpriteChecker, VdpContext};
use crate::settings::RenderSettings;
use crate::vram::{ObserverId, TableKind, VdpVram};

fn t(ticks: u64) -> EmuTime {
    EmuTime::from_ticks(ticks)
}

fn core(size: usize, vdp: &FixedVdp) -> VdpVram {
    let (rasterizer, _stats) = StatsRasterizer::new();
    VdpVram::new(
        size,
        EmuTime::ZERO,
        vdp,
        Box::new(rasterizer),
        Box::new(NullCommandEngine),
        Box::new(NullSpriteChecker),
        Box::new(AlwaysPace),
        RenderSettings::default(),
    )
}

/// Sprite checker that records every notification it receives.
#[derive(Default)]
struct RecordingSprites {
    log: Rc<RefCell<SpriteLog>>,
}

#[derive(Default)]
struct SpriteLog {
    attrib: Vec<(u32, u64)>,
    pattern: Vec<(u32, u64)>,
    window_events: Vec<bool>,
}

impl SpriteChecker for RecordingSprites {
    fn check_until(&mut self, _time: EmuTime) {}

    fn update_sprite_attrib(&mut self, offset: u32, time: EmuTime) {
        self.log.borrow_mut().attrib.push((offset, time.ticks()));
    }

    fn update_sprite_pattern(&mut self, offset: u32, time: EmuTime) {
        self.log.borrow_mut().pattern.push((offset, time.ticks()));
    }

    fn update_window(&mut self, enabled: bool, _time: EmuTime) {
        self.log.borrow_mut().window_events.push(enabled);
    }
}

fn core_with_sprite_log(size: usize, vdp: &FixedVdp) -> (VdpVram, Rc<RefCell<SpriteLog>>) {
    let log = Rc::new(RefCell::new(SpriteLog::default()));
    let sprites = RecordingSprites {
        log: Rc::clone(&log),
    };
    let (rasterizer, _stats) = StatsRasterizer::new();
    let vram = VdpVram::new(
        size,
        EmuTime::ZERO,
        vdp,
        Box::new(rasterizer),
        Box::new(NullCommandEngine),
        Box::new(sprites),
        Box::new(AlwaysPace),
        RenderSettings::default(),
    );
    (vram, log)
}

/// Command engine with a scripted backlog, flushed on sync.
struct QueueEngine {
    pending: Vec<(u32, u8, u64)>,
    log: Rc<RefCell<Vec<u64>>>,
}

impl CommandEngine for QueueEngine {
    fn sync(&mut self, vram: &mut VdpVram, vdp: &dyn VdpContext, time: EmuTime) {
        self.log.borrow_mut().push(time.ticks());
        let due: Vec<_> = self
            .pending
            .iter()
            .filter(|&&(_, _, when)| when <= time.ticks())
            .copied()
            .collect();
        self.pending.retain(|&(_, _, when)| when > time.ticks());
        for (addr, value, when) in due {
            vram.cmd_write(vdp, addr, value, t(when));
        }
    }
}

#[test]
fn window_membership_matches_brute_force() {
    let vdp = FixedVdp::default();
    let mut vram = core(0x8000, &vdp);

    // Bit 11 is set in the base mask but free in the index mask, which
    // mirrors the table across the 2 KiB boundary; bit 10 is a hole.
    let base_mask = 0x1BFF;
    let index_mask = !0xFFFu32;
    vram.set_table_mask(TableKind::NameTable, base_mask, index_mask, &vdp, t(0));
    let window = vram.window(TableKind::NameTable);

    // Every address reachable as base_mask & (index_mask | index) is a
    // member; index bits outside !index_mask are forced to one.
    let span = (!index_mask & vram.mem().size_mask()) + 1;
    let mut reachable = HashSet::new();
    for index in 0..span {
        reachable.insert(base_mask & vram.mem().size_mask() & (index_mask | index));
    }

    for addr in 0..=vram.mem().size_mask() {
        assert_eq!(
            window.is_inside(addr),
            reachable.contains(&addr),
            "membership mismatch at {addr:#07x}"
        );
    }
}

#[test]
fn disabled_window_matches_nothing() {
    let vdp = FixedVdp::default();
    let mut vram = core(0x8000, &vdp);
    vram.set_table_mask(TableKind::NameTable, 0x1FFF, !0x3FFu32, &vdp, t(0));
    assert!(vram.window(TableKind::NameTable).is_inside(0x1C00));

    vram.disable_table(TableKind::NameTable, &vdp, t(10));
    let window = vram.window(TableKind::NameTable);
    for addr in 0..=vram.mem().size_mask() {
        assert!(!window.is_inside(addr));
    }
}

#[test]
fn redundant_write_produces_one_notification_and_one_advance() {
    let vdp = FixedVdp::default();
    let (mut vram, log) = core_with_sprite_log(0x8000, &vdp);
    // Sprite attribute table at 0x1E00, 128 bytes.
    vram.set_table_mask(TableKind::SpriteAttrib, 0x1E7F, !0x7Fu32, &vdp, t(0));

    vram.cpu_write(&vdp, 0x1E00, 0x55, t(10));
    vram.cpu_write(&vdp, 0x1E00, 0x55, t(20));

    assert_eq!(log.borrow().attrib, vec![(0, 10)]);
    assert_eq!(vram.time(), t(10), "redundant write must not advance the clock");

    // A genuinely different value goes through again.
    vram.cpu_write(&vdp, 0x1E00, 0x56, t(30));
    assert_eq!(log.borrow().attrib, vec![(0, 10), (0, 30)]);
    assert_eq!(vram.time(), t(30));
}

#[test]
fn clock_is_non_decreasing_over_write_sequences() {
    let vdp = FixedVdp::default();
    let mut vram = core(0x8000, &vdp);
    let mut previous = vram.time();
    for (i, when) in [0u64, 5, 5, 17, 120, 120, 4000].iter().enumerate() {
        vram.cpu_write(&vdp, 0x100 + i as u32, (i + 1) as u8, t(*when));
        assert!(vram.time() >= previous);
        previous = vram.time();
    }
}

#[test]
fn mirror_band_write_is_dropped_without_side_effects() {
    let vdp = FixedVdp::default();
    // 16 KiB of real VRAM decodes a 32 KiB window.
    let (mut vram, log) = core_with_sprite_log(0x4000, &vdp);
    assert_eq!(vram.mem().size_mask(), 0x7FFF);
    assert_eq!(vram.size(), 0x4000);
    // Observe all of VRAM through the sprite attribute table.
    vram.set_table_mask(TableKind::SpriteAttrib, 0x7FFF, !0x7FFFu32, &vdp, t(0));

    vram.cpu_write(&vdp, 0x5000, 0xAA, t(10));

    assert_eq!(vram.mem().read(0x1000), 0, "mirrored twin must stay untouched");
    assert_eq!(vram.mem().read(0x5000), 0);
    assert!(log.borrow().attrib.is_empty());
    assert_eq!(vram.time(), t(0), "dropped write must not advance the clock");
}

#[test]
fn cpu_read_syncs_command_engine_first() {
    let vdp = FixedVdp::default();
    let sync_log = Rc::new(RefCell::new(Vec::new()));
    let engine = QueueEngine {
        pending: vec![(0x100, 0x42, 50)],
        log: Rc::clone(&sync_log),
    };
    let (rasterizer, _stats) = StatsRasterizer::new();
    let mut vram = VdpVram::new(
        0x8000,
        EmuTime::ZERO,
        &vdp,
        Box::new(rasterizer),
        Box::new(engine),
        Box::new(NullSpriteChecker),
        Box::new(AlwaysPace),
        RenderSettings::default(),
    );
    // Engine write window covers [0x100, 0x200).
    vram.set_table_mask(TableKind::CmdWrite, 0x1FF, !0xFFu32, &vdp, t(0));

    let value = vram.cpu_read(&vdp, 0x100, t(60));

    assert_eq!(sync_log.borrow().as_slice(), &[60]);
    assert_eq!(value, 0x42, "read must observe the engine's pending write");
    assert_eq!(vram.time(), t(50));

    // Reads outside the engine's write window do not sync.
    let _ = vram.cpu_read(&vdp, 0x4000, t(70));
    assert_eq!(sync_log.borrow().len(), 1);
}

#[test]
fn cpu_write_inside_engine_window_syncs_and_orders_notifications() {
    let vdp = FixedVdp::default();
    let sync_log = Rc::new(RefCell::new(Vec::new()));
    let engine = QueueEngine {
        pending: vec![(0x1E00, 0x11, 50)],
        log: Rc::clone(&sync_log),
    };
    let sprite_log = Rc::new(RefCell::new(SpriteLog::default()));
    let sprites = RecordingSprites {
        log: Rc::clone(&sprite_log),
    };
    let (rasterizer, _stats) = StatsRasterizer::new();
    let mut vram = VdpVram::new(
        0x8000,
        EmuTime::ZERO,
        &vdp,
        Box::new(rasterizer),
        Box::new(engine),
        Box::new(sprites),
        Box::new(AlwaysPace),
        RenderSettings::default(),
    );
    vram.set_table_mask(TableKind::CmdWrite, 0x1FFF, !0xFFFu32, &vdp, t(0));
    vram.set_table_mask(TableKind::SpriteAttrib, 0x1E7F, !0x7Fu32, &vdp, t(0));

    vram.cpu_write(&vdp, 0x1E00, 0x22, t(60));

    // The engine's backlog write lands first, then the CPU's.
    assert_eq!(sync_log.borrow().as_slice(), &[60]);
    assert_eq!(sprite_log.borrow().attrib, vec![(0, 50), (0, 60)]);
    assert_eq!(vram.mem().read(0x1E00), 0x22);
}

#[test]
fn window_reconfiguration_notifies_before_commit_and_skips_no_ops() {
    let vdp = FixedVdp::default();
    let (mut vram, log) = core_with_sprite_log(0x8000, &vdp);

    vram.set_table_mask(TableKind::SpriteAttrib, 0x1E7F, !0x7Fu32, &vdp, t(0));
    assert_eq!(log.borrow().window_events, vec![true]);

    // Same effective mask: no event.
    vram.set_table_mask(TableKind::SpriteAttrib, 0x1E7F, !0x7Fu32, &vdp, t(5));
    assert_eq!(log.borrow().window_events, vec![true]);

    vram.set_table_mask(TableKind::SpriteAttrib, 0x3E7F, !0x7Fu32, &vdp, t(10));
    assert_eq!(log.borrow().window_events, vec![true, true]);

    vram.disable_table(TableKind::SpriteAttrib, &vdp, t(20));
    assert_eq!(log.borrow().window_events, vec![true, true, false]);
}

#[test]
fn detached_observer_is_never_called() {
    let vdp = FixedVdp::default();
    let (mut vram, log) = core_with_sprite_log(0x8000, &vdp);
    vram.set_table_mask(TableKind::SpriteAttrib, 0x1E7F, !0x7Fu32, &vdp, t(0));
    vram.reset_observer(TableKind::SpriteAttrib);

    vram.cpu_write(&vdp, 0x1E00, 0x77, t(10));
    vram.set_table_mask(TableKind::SpriteAttrib, 0x3E7F, !0x7Fu32, &vdp, t(20));

    assert!(log.borrow().attrib.is_empty());
    assert_eq!(log.borrow().window_events, vec![true]);

    // Re-attaching resumes notifications.
    vram.set_observer(TableKind::SpriteAttrib, ObserverId::SpriteChecker);
    vram.cpu_write(&vdp, 0x3E01, 0x78, t(30));
    assert_eq!(log.borrow().attrib, vec![(1, 30)]);
}

#[test]
fn read_area_and_masked_reads() {
    let vdp = FixedVdp::default();
    let mut vram = core(0x8000, &vdp);
    // Pattern table at 0x0800, 2 KiB.
    vram.set_table_mask(TableKind::PatternTable, 0x0FFF, !0x7FFu32, &vdp, t(0));

    for i in 0..8u32 {
        vram.cpu_write(&vdp, 0x0800 + i, 0xA0 + i as u8, t(u64::from(i) + 1));
    }

    let window = vram.window(TableKind::PatternTable);
    let area = window.read_area(vram.mem(), 0, 8);
    assert_eq!(area, &[0xA0, 0xA1, 0xA2, 0xA3, 0xA4, 0xA5, 0xA6, 0xA7]);

    // Single-byte reads take an index with unused bits high.
    assert_eq!(window.read_np(vram.mem(), !0x7FFu32 | 3), 0xA3);
}

#[test]
fn planar_read_selects_vram_half_by_bit_zero() {
    let vdp = FixedVdp::default();
    let mut vram = core(0x20000, &vdp);
    vram.set_table_mask(TableKind::BitmapCache, 0x1FFFF, !0x1FFFFu32, &vdp, t(0));

    // Planar address 0x0002 -> even half 0x00001; 0x0003 -> odd half 0x10001.
    vram.cpu_write(&vdp, 0x00001, 0xE0, t(1));
    vram.cpu_write(&vdp, 0x10001, 0x0D, t(2));

    let window = vram.window(TableKind::BitmapCache);
    assert_eq!(window.read_planar(vram.mem(), 0x0002), 0xE0);
    assert_eq!(window.read_planar(vram.mem(), 0x0003), 0x0D);

    let (even, odd) = window.read_area_planar(vram.mem(), 0, 4);
    assert_eq!(even[1], 0xE0);
    assert_eq!(odd[1], 0x0D);
}

#[test]
fn save_state_round_trips() {
    let vdp = FixedVdp::default();
    let mut vram = core(0x8000, &vdp);
    vram.set_table_mask(TableKind::NameTable, 0x1FFF, !0x3FFu32, &vdp, t(0));
    vram.cpu_write(&vdp, 0x1C00, 0x12, t(100));
    vram.cpu_write(&vdp, 0x1C01, 0x34, t(200));

    let snapshot = vram.save_state();

    vram.cpu_write(&vdp, 0x1C00, 0x99, t(300));
    vram.disable_table(TableKind::NameTable, &vdp, t(300));

    vram.restore_state(&snapshot);
    assert_eq!(vram.mem().read(0x1C00), 0x12);
    assert_eq!(vram.mem().read(0x1C01), 0x34);
    assert_eq!(vram.time(), t(200));
    assert!(vram.window(TableKind::NameTable).is_inside(0x1C00));
}
