use std::error::Error;
use std::path::PathBuf;

use clap::Parser;

use invisible_cloak::camera::{CameraProperty, open_camera};
use invisible_cloak::config::CloakConfig;
use invisible_cloak::session::Session;
use invisible_cloak::session::display::HighguiDisplay;

#[derive(Parser, Debug)]
#[command(
    name = "invisible-cloak",
    version = "0.1.0",
    about = "Make a blue cloak invisible in your webcam feed.",
    long_about = r#"Make a colored cloak invisible in your webcam feed.

After launching, step out of the camera's view while the background is captured. Then put on the cloak: every pixel matching the cloak color is replaced by the captured background.

Press 'r' to recapture the background and 'q' to quit."#
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

    /// JSON file overriding the cloak color range, background sampling and morphology
    /// settings. Missing fields keep their defaults.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .try_init()?;

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => CloakConfig::from_json_file(path)?,
        None => CloakConfig::default(),
    };
    log::info!("OpenCV version: {}", opencv::core::get_version_string()?);

    let camera_prop = CameraProperty::new(args.cam_id, (args.res_x, args.res_y));
    let cam = open_camera(&camera_prop).inspect_err(|e| log::error!("Error: {}", e))?;
    let display = HighguiDisplay::new(config.window_name.clone())?;

    let mut session = Session::new(cam, display, config)?;
    session.run()?;
    Ok(())
}
