use anyhow::Result;
use clap::Parser;

use overlay_layout_rust::Strategy;

#[derive(Parser, Debug)]
#[command(
    name = "overlay-layout-rust",
    version,
    about = "Fit translated text into detected regions and place it on a canvas"
)]
struct Cli {
    /// Layout job JSON ({width, height, regions, texts, colors?})
    #[arg(short = 'j', long = "job")]
    job: String,

    /// Canvas image to draw the text on
    #[arg(short = 'i', long = "image")]
    image: Option<String>,

    /// Output file (.svg, .png, .jpg, .webp, ...). Prints SVG when omitted
    #[arg(short = 'o', long = "output")]
    output: Option<String>,

    /// Print {text, x1, y1, x2, y2} records as JSON
    #[arg(short = 'a', long = "annotations")]
    annotations: bool,

    /// Draw regions and final text boxes instead of the text
    #[arg(long = "debug-boxes")]
    debug_boxes: bool,

    /// Placement strategy: action or force (default from settings)
    #[arg(short = 's', long = "strategy")]
    strategy: Option<Strategy>,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "settings")]
    settings: Option<String>,

    /// Enable verbose logging
    #[arg(long = "verbose")]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    overlay_layout_rust::logging::init(cli.verbose)?;

    let output = overlay_layout_rust::run(overlay_layout_rust::Config {
        job_path: cli.job,
        image_path: cli.image,
        output_path: cli.output,
        annotations: cli.annotations,
        debug_boxes: cli.debug_boxes,
        strategy: cli.strategy,
        settings_path: cli.settings,
    })?;

    println!("{}", output);
    Ok(())
}
