//! VRAM contents and the synchronization of its users.
//!
//! Several actors observe and mutate the same byte array at different,
//! overlapping moments of emulated time: the CPU bus, the autonomous
//! command engine, the sprite checker and the pixel renderer. The store
//! keeps one authoritative clock ("VRAM is caught up to time T") and
//! guarantees that any read of address A at time T observes exactly the
//! writes to A with write-time <= T, no matter which actor runs first in
//! host call order. The key rule: before serving a read or write that
//! falls inside the command engine's active windows, the engine is caught
//! up to T, and each of its backlog writes re-enters through `cmd_write`
//! so every other observer sees them in order.

use retrovdp_common::{Clock, EmuTime};
use serde::{Deserialize, Serialize};

use crate::interface::{CommandEngine, PacingSource, Rasterizer, SpriteChecker, VdpContext};
use crate::renderer::{PixelRenderer, RendererState};
use crate::settings::RenderSettings;
use crate::SAVE_STATE_VERSION;

/// Sentinel `base_addr` for a window that matches no address. Out of range
/// for any real VRAM address, so it can never collide with one.
const NO_BASE: u32 = u32::MAX;

/// The named VRAM regions subsystems can claim.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub enum TableKind {
    CmdRead,
    CmdWrite,
    NameTable,
    ColourTable,
    PatternTable,
    BitmapVisible,
    BitmapCache,
    SpriteAttrib,
    SpritePattern,
}

impl TableKind {
    pub const ALL: [TableKind; 9] = [
        TableKind::CmdRead,
        TableKind::CmdWrite,
        TableKind::NameTable,
        TableKind::ColourTable,
        TableKind::PatternTable,
        TableKind::BitmapVisible,
        TableKind::BitmapCache,
        TableKind::SpriteAttrib,
        TableKind::SpritePattern,
    ];
}

/// Identifies which collaborator a window's change notifications are routed
/// to. Windows hold an id instead of a reference; the store owns (or boxes)
/// every observer, so a notification can never reach a dead object.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub enum ObserverId {
    /// The pixel renderer: pre-commit notification, may trigger an
    /// incremental render of the backlog using the old byte value.
    Renderer,
    /// The sprite checker: pre-commit notification for sprite tables.
    SpriteChecker,
    /// The rasterizer's conversion cache: post-commit invalidation.
    RasterizerCache,
}

/// The raw VRAM byte array with its mirroring masks.
///
/// The buffer is allocated to the full mirror span (`size_mask + 1`) so a
/// masked address is always in range; only the `actual_size` prefix is
/// backed by real chips, the rest reads zero and ignores writes.
pub struct VramMem {
    data: Box<[u8]>,
    size_mask: u32,
    actual_size: u32,
}

impl VramMem {
    fn new(size: usize) -> VramMem {
        // A 16 KiB configuration still decodes a 32 KiB window, which is
        // where the [0x4000, 0x8000) dead band comes from.
        let span = size.next_power_of_two().max(0x8000);
        VramMem {
            data: vec![0; span].into_boxed_slice(),
            size_mask: (span - 1) as u32,
            actual_size: size as u32,
        }
    }

    #[inline]
    pub fn size_mask(&self) -> u32 {
        self.size_mask
    }

    #[inline]
    pub fn actual_size(&self) -> u32 {
        self.actual_size
    }

    /// Read a byte at an already-masked address.
    #[inline]
    pub fn read(&self, address: u32) -> u8 {
        debug_assert!(address <= self.size_mask);
        self.data[address as usize]
    }
}

/// A mask-defined, possibly mirrored view over VRAM claimed by one
/// subsystem.
///
/// Membership is mask algebra, not an interval: real table-base registers
/// leave address bits undecoded, which wraps and duplicates the table
/// across power-of-two boundaries. An address is inside iff
/// `(addr & combi_mask) == base_addr`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VramWindow {
    base_mask: u32,
    index_mask: u32,
    /// Lowest address in the window, or `NO_BASE` when disabled.
    base_addr: u32,
    combi_mask: u32,
    size_mask: u32,
    observer: Option<ObserverId>,
}

impl VramWindow {
    fn new(size_mask: u32) -> VramWindow {
        VramWindow {
            base_mask: 0,
            index_mask: 0,
            base_addr: NO_BASE,
            combi_mask: 0,
            size_mask,
            observer: None,
        }
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.base_addr != NO_BASE
    }

    /// The table base mask. Only meaningful while the window is enabled.
    #[inline]
    pub fn get_mask(&self) -> u32 {
        debug_assert!(self.is_enabled());
        self.base_mask
    }

    /// Whether at least one index of this window maps to `address`.
    /// Always false while the window is disabled.
    #[inline]
    pub fn is_inside(&self, address: u32) -> bool {
        (address & self.combi_mask) == self.base_addr
    }

    /// `Some(address - base_addr)` when `address` is inside the enabled
    /// window; the offset is what observers see.
    #[inline]
    fn offset_of(&self, address: u32) -> Option<u32> {
        if self.is_inside(address) {
            Some(address - self.base_addr)
        } else {
            None
        }
    }

    #[inline]
    pub fn observer(&self) -> Option<ObserverId> {
        self.observer
    }

    fn would_change(&self, base_mask: u32, index_mask: u32) -> bool {
        !(self.is_enabled() && self.base_mask == base_mask && self.index_mask == index_mask)
    }

    /// Commit a new mask pair and enable the window. The store notifies the
    /// observer *before* calling this, while the old mask is still live.
    fn apply_mask(&mut self, base_mask: u32, index_mask: u32) {
        self.base_mask = base_mask;
        self.index_mask = index_mask;
        self.base_addr = base_mask & index_mask;
        self.combi_mask = !base_mask | index_mask;
    }

    fn clear(&mut self) {
        self.base_addr = NO_BASE;
        // combi_mask of 0 with a NO_BASE base_addr matches nothing.
        self.combi_mask = 0;
    }

    /// Check that the block [index, index + size) stays inside one
    /// contiguous stretch of the window: the address bits the block spans
    /// must be fully decoded by both masks.
    #[inline]
    fn assert_contiguous(&self, index: u32, size: u32) {
        debug_assert!(self.is_enabled());
        debug_assert!(size > 0);
        let area_bits = retrovdp_common::math::flood_right(index ^ (index + size - 1));
        debug_assert!(
            (area_bits & self.base_mask) == area_bits,
            "read area crosses a base-mask hole"
        );
        debug_assert!(
            (area_bits & !self.index_mask) == area_bits,
            "read area exceeds window granularity"
        );
        let _ = area_bits;
    }

    /// A borrow of the live bytes for the contiguous block
    /// [index, index + size) of this window. The slice must not be retained
    /// across any subsequent write aliasing the same mirror.
    #[inline]
    pub fn read_area<'a>(&self, mem: &'a VramMem, index: u32, size: u32) -> &'a [u8] {
        self.assert_contiguous(index, size);
        let start = (self.base_mask & (self.index_mask | index)) as usize;
        &mem.data[start..start + size as usize]
    }

    /// Planar variant of [`read_area`](Self::read_area): the block is split
    /// over the two VRAM halves, even bytes in the first slice, odd bytes
    /// in the second.
    #[inline]
    pub fn read_area_planar<'a>(
        &self,
        mem: &'a VramMem,
        index: u32,
        size: u32,
    ) -> (&'a [u8], &'a [u8]) {
        self.assert_contiguous(index, size);
        let addr = self.base_mask & (self.index_mask | index);
        debug_assert!(addr & 1 == 0);
        debug_assert!(size & 1 == 0);
        let half = (size / 2) as usize;
        let even = (addr / 2) as usize;
        let odd = ((addr / 2) | 0x10000) as usize;
        (&mem.data[even..even + half], &mem.data[odd..odd + half])
    }

    /// Direct masked byte read, non-planar. `index` must have its unused
    /// bits set to one.
    #[inline]
    pub fn read_np(&self, mem: &VramMem, index: u32) -> u8 {
        debug_assert!(self.is_enabled());
        mem.read(self.base_mask & index)
    }

    /// Direct masked byte read with planar remapping: address bit 0 selects
    /// the VRAM half.
    #[inline]
    pub fn read_planar(&self, mem: &VramMem, index: u32) -> u8 {
        debug_assert!(self.is_enabled());
        let addr = self.base_mask & index;
        let addr = ((addr << 16) | (addr >> 1)) & 0x1FFFF;
        mem.read(addr)
    }
}

/// The fixed set of windows, one per claimable region.
pub struct VramWindows {
    pub cmd_read: VramWindow,
    pub cmd_write: VramWindow,
    pub name_table: VramWindow,
    pub colour_table: VramWindow,
    pub pattern_table: VramWindow,
    pub bitmap_visible: VramWindow,
    pub bitmap_cache: VramWindow,
    pub sprite_attrib: VramWindow,
    pub sprite_pattern: VramWindow,
}

impl VramWindows {
    fn new(size_mask: u32) -> VramWindows {
        VramWindows {
            cmd_read: VramWindow::new(size_mask),
            cmd_write: VramWindow::new(size_mask),
            name_table: VramWindow::new(size_mask),
            colour_table: VramWindow::new(size_mask),
            pattern_table: VramWindow::new(size_mask),
            bitmap_visible: VramWindow::new(size_mask),
            bitmap_cache: VramWindow::new(size_mask),
            sprite_attrib: VramWindow::new(size_mask),
            sprite_pattern: VramWindow::new(size_mask),
        }
    }

    pub fn get(&self, table: TableKind) -> &VramWindow {
        match table {
            TableKind::CmdRead => &self.cmd_read,
            TableKind::CmdWrite => &self.cmd_write,
            TableKind::NameTable => &self.name_table,
            TableKind::ColourTable => &self.colour_table,
            TableKind::PatternTable => &self.pattern_table,
            TableKind::BitmapVisible => &self.bitmap_visible,
            TableKind::BitmapCache => &self.bitmap_cache,
            TableKind::SpriteAttrib => &self.sprite_attrib,
            TableKind::SpritePattern => &self.sprite_pattern,
        }
    }

    fn get_mut(&mut self, table: TableKind) -> &mut VramWindow {
        match table {
            TableKind::CmdRead => &mut self.cmd_read,
            TableKind::CmdWrite => &mut self.cmd_write,
            TableKind::NameTable => &mut self.name_table,
            TableKind::ColourTable => &mut self.colour_table,
            TableKind::PatternTable => &mut self.pattern_table,
            TableKind::BitmapVisible => &mut self.bitmap_visible,
            TableKind::BitmapCache => &mut self.bitmap_cache,
            TableKind::SpriteAttrib => &mut self.sprite_attrib,
            TableKind::SpritePattern => &mut self.sprite_pattern,
        }
    }
}

/// Versioned snapshot of every mutable field in the store and renderer.
/// The wire format is whatever the embedding machine serializes this to.
#[derive(Clone, Serialize, Deserialize)]
pub struct CoreState {
    pub version: u32,
    pub vram: Vec<u8>,
    pub clock: EmuTime,
    /// Window states in [`TableKind::ALL`] order.
    pub windows: Vec<VramWindow>,
    pub renderer: RendererState,
}

/// Owns the VRAM byte array and synchronizes its users.
pub struct VdpVram {
    pub(crate) mem: VramMem,
    pub(crate) windows: VramWindows,
    /// The moment up to which VRAM contents are authoritative. Never moves
    /// backward; every commit advances it to the write's time.
    pub(crate) clock: Clock,
    pub(crate) renderer: PixelRenderer,
    /// Taken out while the engine itself is being synchronized.
    pub(crate) cmd: Option<Box<dyn CommandEngine>>,
    pub(crate) sprites: Box<dyn SpriteChecker>,
}

impl VdpVram {
    /// Build the store and wire all collaborators in one pass.
    ///
    /// Collaborators are constructed by the caller first, so none of them
    /// ever observes a partially built sibling. The canonical observer
    /// attachments are made here: the renderer watches the bitmap-visible
    /// window, the sprite checker its two tables, and the rasterizer cache
    /// the bitmap-cache and name/colour/pattern windows.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        size: usize,
        time: EmuTime,
        vdp: &dyn VdpContext,
        rasterizer: Box<dyn Rasterizer>,
        cmd: Box<dyn CommandEngine>,
        sprites: Box<dyn SpriteChecker>,
        pacing: Box<dyn PacingSource>,
        settings: RenderSettings,
    ) -> VdpVram {
        let mem = VramMem::new(size);
        let size_mask = mem.size_mask();
        let mut vram = VdpVram {
            mem,
            windows: VramWindows::new(size_mask),
            clock: Clock::new(time),
            renderer: PixelRenderer::new(rasterizer, pacing, settings, vdp.is_display_enabled()),
            cmd: Some(cmd),
            sprites,
        };
        vram.set_observer(TableKind::BitmapVisible, ObserverId::Renderer);
        vram.set_observer(TableKind::SpriteAttrib, ObserverId::SpriteChecker);
        vram.set_observer(TableKind::SpritePattern, ObserverId::SpriteChecker);
        vram.set_observer(TableKind::BitmapCache, ObserverId::RasterizerCache);
        vram.set_observer(TableKind::NameTable, ObserverId::RasterizerCache);
        vram.set_observer(TableKind::ColourTable, ObserverId::RasterizerCache);
        vram.set_observer(TableKind::PatternTable, ObserverId::RasterizerCache);
        vram
    }

    /// Size of the populated VRAM prefix in bytes.
    #[inline]
    pub fn size(&self) -> u32 {
        self.mem.actual_size()
    }

    #[inline]
    pub fn mem(&self) -> &VramMem {
        &self.mem
    }

    #[inline]
    pub fn window(&self, table: TableKind) -> &VramWindow {
        self.windows.get(table)
    }

    /// The moment up to which VRAM is caught up.
    #[inline]
    pub fn time(&self) -> EmuTime {
        self.clock.time()
    }

    /// Attach an observer to a window, replacing any previous one.
    pub fn set_observer(&mut self, table: TableKind, observer: ObserverId) {
        self.windows.get_mut(table).observer = Some(observer);
    }

    /// Detach the observer of a window. Owners of observer state must do
    /// this on their own teardown; afterwards the window notifies nobody.
    pub fn reset_observer(&mut self, table: TableKind) {
        self.windows.get_mut(table).observer = None;
    }

    /// Reconfigure a window's mask pair at `time`. No-op when the effective
    /// mask is unchanged; otherwise the attached observer is told the
    /// topology changed *before* the new mask is committed, so it can
    /// finish rendering against the old one. Committing implicitly enables
    /// the window.
    pub fn set_table_mask(
        &mut self,
        table: TableKind,
        base_mask: u32,
        index_mask: u32,
        vdp: &dyn VdpContext,
        time: EmuTime,
    ) {
        let base_mask = base_mask & self.mem.size_mask();
        if !self.windows.get(table).would_change(base_mask, index_mask) {
            return;
        }
        log::debug!(
            "vram window {:?}: mask {:#07x}/{:#07x} at {}",
            table,
            base_mask,
            index_mask,
            time
        );
        self.notify_window_change(table, true, vdp, time);
        self.windows.get_mut(table).apply_mask(base_mask, index_mask);
    }

    /// Disable a window at `time`: afterwards no address is inside it.
    pub fn disable_table(&mut self, table: TableKind, vdp: &dyn VdpContext, time: EmuTime) {
        self.notify_window_change(table, false, vdp, time);
        self.windows.get_mut(table).clear();
    }

    fn notify_window_change(
        &mut self,
        table: TableKind,
        enabled: bool,
        vdp: &dyn VdpContext,
        time: EmuTime,
    ) {
        match self.windows.get(table).observer {
            Some(ObserverId::Renderer) => self.renderer_update_window(vdp, enabled, time),
            Some(ObserverId::SpriteChecker) => self.sprites.update_window(enabled, time),
            // Conversion caches key on absolute addresses; a moved window
            // shows up as ordinary per-byte invalidations.
            Some(ObserverId::RasterizerCache) | None => {}
        }
    }

    /// Write a byte through the CPU interface.
    pub fn cpu_write(&mut self, vdp: &dyn VdpContext, address: u32, value: u8, time: EmuTime) {
        debug_assert!(time >= self.clock.time(), "rewriting history");
        let address = address & self.mem.size_mask();
        if address >= self.mem.actual_size() {
            // Mirroring of extended VRAM is handled elsewhere; only the
            // dead band of small configurations lands here.
            debug_assert!(address < 0x30000);
            return;
        }
        // A write of the value already stored is invisible to every
        // observer; skipping it here saves a great deal of synchronization
        // because full-frame redundant uploads are common.
        if self.mem.data[address as usize] == value {
            return;
        }
        // The CPU must never observe or clobber state the command engine
        // has not caught up to.
        if self.windows.cmd_read.is_inside(address) || self.windows.cmd_write.is_inside(address) {
            self.sync(vdp, time);
        }
        self.write_common(vdp, address, value, time);
    }

    /// Write a byte from the command engine. The engine is by definition
    /// already at `time`, so no engine synchronization happens here.
    pub fn cmd_write(&mut self, vdp: &dyn VdpContext, address: u32, value: u8, time: EmuTime) {
        debug_assert!(time >= self.clock.time(), "rewriting history");
        let address = address & self.mem.size_mask();
        if address >= self.mem.actual_size() {
            debug_assert!(address < 0x30000);
            return;
        }
        if self.mem.data[address as usize] == value {
            return;
        }
        self.write_common(vdp, address, value, time);
    }

    /// Read a byte through the CPU interface. If the address is inside the
    /// command engine's write window, the engine is caught up first so the
    /// CPU never sees a stale pre-write value.
    pub fn cpu_read(&mut self, vdp: &dyn VdpContext, address: u32, time: EmuTime) -> u8 {
        debug_assert!(time >= self.clock.time(), "VRAM ahead of CPU");
        let address = address & self.mem.size_mask();
        if self.windows.cmd_write.is_inside(address) {
            self.sync(vdp, time);
        }
        self.mem.data[address as usize]
    }

    /// Bring VRAM to a consistent state as of `time` without issuing a new
    /// write: the command engine commits its backlog through `cmd_write`.
    pub fn sync(&mut self, vdp: &dyn VdpContext, time: EmuTime) {
        if let Some(mut cmd) = self.cmd.take() {
            cmd.sync(self, vdp, time);
            self.cmd = Some(cmd);
        }
    }

    /// Two-phase commit: subsystem synchronization happens before the byte
    /// changes (a renderer mid-sync must still be able to draw backlog from
    /// the old state), cache invalidation after (so a cache observer that
    /// reads back sees the new value).
    fn write_common(&mut self, vdp: &dyn VdpContext, address: u32, value: u8, time: EmuTime) {
        self.notify_table(TableKind::BitmapVisible, vdp, address, time);
        self.notify_table(TableKind::SpriteAttrib, vdp, address, time);
        self.notify_table(TableKind::SpritePattern, vdp, address, time);

        self.mem.data[address as usize] = value;
        self.clock.advance(time);

        self.notify_table(TableKind::BitmapCache, vdp, address, time);
        self.notify_table(TableKind::NameTable, vdp, address, time);
        self.notify_table(TableKind::ColourTable, vdp, address, time);
        self.notify_table(TableKind::PatternTable, vdp, address, time);
    }

    fn notify_table(&mut self, table: TableKind, vdp: &dyn VdpContext, address: u32, time: EmuTime) {
        let window = self.windows.get(table);
        let Some(observer) = window.observer else {
            return;
        };
        let Some(offset) = window.offset_of(address) else {
            return;
        };
        match observer {
            ObserverId::Renderer => self.renderer_update_vram(vdp, offset, time),
            ObserverId::SpriteChecker => match table {
                TableKind::SpriteAttrib => self.sprites.update_sprite_attrib(offset, time),
                TableKind::SpritePattern => self.sprites.update_sprite_pattern(offset, time),
                _ => debug_assert!(false, "sprite checker attached to {table:?}"),
            },
            ObserverId::RasterizerCache => {
                self.renderer.rasterizer_mut().update_vram_cache(address)
            }
        }
    }

    /// Snapshot every mutable field of the store and renderer.
    pub fn save_state(&self) -> CoreState {
        CoreState {
            version: SAVE_STATE_VERSION,
            vram: self.mem.data.to_vec(),
            clock: self.clock.time(),
            windows: TableKind::ALL
                .iter()
                .map(|&t| self.windows.get(t).clone())
                .collect(),
            renderer: self.renderer.save_state(),
        }
    }

    /// Restore a snapshot taken by [`save_state`](Self::save_state) on a
    /// store of the same configuration.
    pub fn restore_state(&mut self, state: &CoreState) {
        debug_assert_eq!(state.version, SAVE_STATE_VERSION);
        debug_assert_eq!(state.vram.len(), self.mem.data.len());
        debug_assert_eq!(state.windows.len(), TableKind::ALL.len());
        self.mem.data.copy_from_slice(&state.vram);
        self.clock.restore(state.clock);
        for (&table, window) in TableKind::ALL.iter().zip(&state.windows) {
            *self.windows.get_mut(table) = window.clone();
        }
        self.renderer.restore_state(&state.renderer);
    }
}

#[cfg(test)]
mod tests;
