use serde::{Deserialize, Serialize};

/// How finely the renderer subdivides emulated time into output.
///
/// Coarser levels trade visual artefacts during mid-frame register tricks
/// for speed; emulation state stays exact at every level.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Serialize, Deserialize)]
pub enum Accuracy {
    /// Exact tick-to-pixel mapping inside the current line.
    #[default]
    Pixel,
    /// Render in whole-line steps.
    Line,
    /// Defer everything to frame boundaries.
    Screen,
}

/// Renderer tuning knobs, read at the start of each frame.
///
/// Changing the settings mid-frame has no effect until the next
/// `frame_start`; pushing new settings through
/// [`crate::VdpVram::set_render_settings`] forces the next frame to be
/// drawn regardless of the frame-skip state.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RenderSettings {
    pub accuracy: Accuracy,
    /// Skip at least this many frames between drawn frames.
    pub min_frame_skip: u32,
    /// Never skip more than this many frames in a row.
    pub max_frame_skip: u32,
    /// Render skipped odd fields when needed to complete an interlaced pair.
    pub deinterlace: bool,
}

impl Default for RenderSettings {
    fn default() -> Self {
        RenderSettings {
            accuracy: Accuracy::Pixel,
            min_frame_skip: 0,
            max_frame_skip: 3,
            deinterlace: true,
        }
    }
}
