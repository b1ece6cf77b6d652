use retrovdp_v99x8::{Accuracy, RenderSettings};

fn main() {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let frames = match args.next() {
        None => 60,
        Some(arg) => match arg.parse::<u32>() {
            Ok(frames) => frames,
            Err(_) => {
                eprintln!("Invalid frame count '{arg}'. Usage: retrovdp [frames] [pixel|line|screen]");
                std::process::exit(1);
            }
        },
    };
    let accuracy = match args.next().as_deref() {
        None | Some("pixel") => Accuracy::Pixel,
        Some("line") => Accuracy::Line,
        Some("screen") => Accuracy::Screen,
        Some(other) => {
            eprintln!("Unknown accuracy '{other}'. Supported: pixel, line, screen");
            std::process::exit(1);
        }
    };
    let settings = RenderSettings {
        accuracy,
        ..RenderSettings::default()
    };

    match retrovdp::run(frames, settings) {
        Ok(summary) => {
            log::info!("vram clock at exit: {}", summary.vram_clock);
            println!(
                "{} frames emulated, {} drawn ({} finished by backend)",
                summary.frames, summary.frames_drawn, summary.stats.frames
            );
            println!(
                "draw calls: {} border / {} display / {} sprite, {} cache invalidations",
                summary.stats.border_calls,
                summary.stats.display_calls,
                summary.stats.sprite_calls,
                summary.stats.cache_updates
            );
        }
        Err(err) => {
            eprintln!("error: {err:#}");
            std::process::exit(1);
        }
    }
}
