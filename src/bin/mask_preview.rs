use std::path::PathBuf;

use clap::Parser;
use opencv::highgui;

use invisible_cloak::camera::{CameraProperty, FrameSource, open_camera};
use invisible_cloak::config::CloakConfig;

#[derive(Parser, Debug)]
#[command(
    name = "invisible-cloak mask preview",
    version = "0.1.0",
    about = "Preview the cloak mask of a color range.",
    long_about = r#"Shows the live camera feed next to the cleaned-up cloak mask, so a color range can be tuned before running the cloak itself.

White areas in the "mask" window are the pixels that would be replaced by the background. Press any key to exit."#
)]
struct Args {
    /// The device index of the camera. Laptop's builtin camera is usually at index 0.
    #[arg(short, long, default_value_t = 0)]
    cam_id: i32,

    /// The requested camera resolution's X component.
    #[arg(long, default_value_t = 640)]
    res_x: u32,

    /// The requested camera resolution's Y component.
    #[arg(long, default_value_t = 480)]
    res_y: u32,

    /// JSON configuration file holding the color range to preview.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .try_init()?;

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => CloakConfig::from_json_file(path)?,
        None => CloakConfig::default(),
    };
    let mask_builder = config.mask_builder()?;
    log::info!(
        "Previewing HSV range {:?} - {:?}",
        mask_builder.range().lower,
        mask_builder.range().upper
    );

    let window1 = "video capture";
    let window2 = "mask";
    highgui::named_window(window1, highgui::WINDOW_AUTOSIZE)?;
    highgui::named_window(window2, highgui::WINDOW_AUTOSIZE)?;
    let mut cam = open_camera(&CameraProperty::new(args.cam_id, (args.res_x, args.res_y)))?;
    loop {
        if let Some(frame) = cam.grab_frame()? {
            let mask = mask_builder.build(&frame)?;
            highgui::imshow(window1, &frame)?;
            highgui::imshow(window2, &mask)?;
        }
        let key = highgui::wait_key(10)?;
        if key > 0 && key != 255 {
            break;
        }
    }
    cam.release()?;
    highgui::destroy_all_windows()?;
    Ok(())
}
