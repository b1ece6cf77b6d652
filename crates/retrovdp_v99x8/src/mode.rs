use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Raw display mode bits: M1..M5 select the screen mode, YJK/YAE select
    /// the colour space used on top of the GRAPHIC7 layout.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ModeFlags: u8 {
        const M1  = 0x01;
        const M2  = 0x02;
        const M3  = 0x04;
        const M4  = 0x08;
        const M5  = 0x10;
        const YJK = 0x20;
        const YAE = 0x40;
    }
}

/// A display mode of the video processor.
///
/// The interesting structure for synchronization purposes is the *base*
/// mode (colour-space bits stripped): it decides table layouts, planar
/// addressing and which VRAM regions feed the visible frame.
#[derive(Copy, Clone, Eq, PartialEq, Default, Debug, Serialize, Deserialize)]
pub struct DisplayMode(u8);

impl DisplayMode {
    pub const GRAPHIC1: DisplayMode = DisplayMode(0x00);
    pub const TEXT1: DisplayMode = DisplayMode(ModeFlags::M1.bits());
    pub const MULTICOLOUR: DisplayMode = DisplayMode(ModeFlags::M2.bits());
    pub const GRAPHIC2: DisplayMode = DisplayMode(ModeFlags::M3.bits());
    pub const GRAPHIC3: DisplayMode = DisplayMode(ModeFlags::M4.bits());
    pub const TEXT2: DisplayMode =
        DisplayMode(ModeFlags::M1.bits() | ModeFlags::M4.bits());
    pub const GRAPHIC4: DisplayMode =
        DisplayMode(ModeFlags::M3.bits() | ModeFlags::M4.bits());
    pub const GRAPHIC5: DisplayMode = DisplayMode(ModeFlags::M5.bits());
    pub const GRAPHIC6: DisplayMode =
        DisplayMode(ModeFlags::M3.bits() | ModeFlags::M5.bits());
    pub const GRAPHIC7: DisplayMode =
        DisplayMode(ModeFlags::M3.bits() | ModeFlags::M4.bits() | ModeFlags::M5.bits());

    #[inline]
    pub const fn from_flags(flags: ModeFlags) -> DisplayMode {
        DisplayMode(flags.bits())
    }

    #[inline]
    pub const fn bits(self) -> u8 {
        self.0
    }

    #[inline]
    pub fn flags(self) -> ModeFlags {
        ModeFlags::from_bits_truncate(self.0)
    }

    /// The mode with the colour-space bits (YJK/YAE) stripped.
    #[inline]
    pub fn base(self) -> DisplayMode {
        DisplayMode(self.0 & !(ModeFlags::YJK.bits() | ModeFlags::YAE.bits()))
    }

    #[inline]
    pub fn is_text_mode(self) -> bool {
        self.flags().contains(ModeFlags::M1)
    }

    /// Bitmap modes read pixel data straight from VRAM pages instead of
    /// name/pattern/colour tables.
    #[inline]
    pub fn is_bitmap_mode(self) -> bool {
        matches!(
            self.base(),
            DisplayMode::GRAPHIC4
                | DisplayMode::GRAPHIC5
                | DisplayMode::GRAPHIC6
                | DisplayMode::GRAPHIC7
        )
    }

    /// Planar modes interleave even/odd bytes over the two VRAM halves.
    #[inline]
    pub fn is_planar(self) -> bool {
        matches!(self.base(), DisplayMode::GRAPHIC6 | DisplayMode::GRAPHIC7)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_strips_colour_space_bits() {
        let yjk = DisplayMode::from_flags(
            ModeFlags::M3 | ModeFlags::M4 | ModeFlags::M5 | ModeFlags::YJK,
        );
        assert_ne!(yjk, DisplayMode::GRAPHIC7);
        assert_eq!(yjk.base(), DisplayMode::GRAPHIC7);
    }

    #[test]
    fn mode_predicates() {
        assert!(DisplayMode::TEXT1.is_text_mode());
        assert!(DisplayMode::TEXT2.is_text_mode());
        assert!(!DisplayMode::GRAPHIC4.is_text_mode());

        assert!(DisplayMode::GRAPHIC4.is_bitmap_mode());
        assert!(DisplayMode::GRAPHIC7.is_bitmap_mode());
        assert!(!DisplayMode::GRAPHIC2.is_bitmap_mode());

        assert!(DisplayMode::GRAPHIC6.is_planar());
        assert!(DisplayMode::GRAPHIC7.is_planar());
        assert!(!DisplayMode::GRAPHIC5.is_planar());
    }
}
