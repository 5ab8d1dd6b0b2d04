use anyhow::{Context, Result, anyhow};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

pub mod logging;
pub mod overlay;
pub mod settings;
mod test_util;

pub use overlay::{
    Annotation, LayoutConfig, LayoutJob, LayoutOutcome, LayoutRequest, Region, Strategy,
    TextBlock, layout_text,
};

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub job_path: String,
    pub image_path: Option<String>,
    pub output_path: Option<String>,
    pub annotations: bool,
    pub debug_boxes: bool,
    pub strategy: Option<Strategy>,
    pub settings_path: Option<String>,
}

pub fn run(config: Config) -> Result<String> {
    let settings_path = config.settings_path.as_deref().map(Path::new);
    let settings = settings::load_settings(settings_path)?;
    let mut layout = settings.layout_config();
    if let Some(strategy) = config.strategy {
        layout.strategy = strategy;
    }

    let raw = fs::read_to_string(&config.job_path)
        .with_context(|| format!("failed to read layout job: {}", config.job_path))?;
    let job = LayoutJob::from_json(&raw)?;

    let mut style = settings.overlay_style();
    let wants_font = config.image_path.is_some()
        || settings.overlay_font_path.is_some()
        || settings.overlay_font_family.is_some();
    if wants_font {
        match overlay::resolve_overlay_font(
            settings.overlay_font_path.as_deref().map(Path::new),
            settings.overlay_font_family.as_deref(),
            overlay::overlay_fallback_fonts(),
        ) {
            Ok(resolved) => {
                style.font_family = Some(resolved.family);
                style.font_metrics = Some(resolved.metrics);
            }
            Err(err) => warn!("falling back to estimated text widths: {}", err),
        }
    }

    let outcome = layout_text(&job.request(), &layout, style.font_metrics.as_ref())?;
    info!(
        blocks = outcome.blocks.len(),
        unresolved = outcome.unresolved().len(),
        font_size = outcome.working_font_size,
        "layout finished"
    );

    let Some(image_path) = config.image_path.as_deref() else {
        return format_annotations(&outcome);
    };

    let image_bytes =
        fs::read(image_path).with_context(|| format!("failed to read canvas image: {}", image_path))?;
    let image_mime = infer::get(&image_bytes)
        .map(|kind| kind.mime_type())
        .filter(|mime| mime.starts_with("image/"))
        .ok_or_else(|| anyhow!("canvas is not a recognised image: {}", image_path))?;

    let svg = if config.debug_boxes {
        overlay::render_debug_svg(&image_bytes, image_mime, job.width, job.height, &outcome.blocks)?
    } else {
        overlay::render_svg(
            &image_bytes,
            image_mime,
            job.width,
            job.height,
            &outcome.blocks,
            &style,
        )?
    };

    let Some(output_path) = config.output_path.as_deref() else {
        if config.annotations {
            return format_annotations(&outcome);
        }
        return Ok(svg);
    };
    write_output(output_path, &svg, style.font_metrics.as_ref().map(|m| m.data()))?;
    if config.annotations {
        return format_annotations(&outcome);
    }
    Ok(format!("wrote {}", output_path))
}

fn format_annotations(outcome: &LayoutOutcome) -> Result<String> {
    serde_json::to_string_pretty(&outcome.annotations())
        .with_context(|| "failed to serialise annotations")
}

fn write_output(path: &str, svg: &str, font_data: Option<&[u8]>) -> Result<()> {
    let mime = output_mime(path)?;
    let bytes = if mime == "image/svg+xml" {
        svg.as_bytes().to_vec()
    } else {
        overlay::render_svg_bytes(svg, mime, font_data)?
    };
    fs::write(path, bytes).with_context(|| format!("failed to write output: {}", path))
}

fn output_mime(path: &str) -> Result<&'static str> {
    let ext = Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();
    let mime = match ext.as_str() {
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "gif" => "image/gif",
        "tif" | "tiff" => "image/tiff",
        _ => return Err(anyhow!("unsupported output extension: {}", path)),
    };
    Ok(mime)
}
