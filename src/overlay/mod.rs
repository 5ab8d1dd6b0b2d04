pub mod engine;
mod font;
mod render;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub use engine::{
    Alignment, BlockId, FontBounds, FontSizing, LayoutConfig, LayoutOutcome, LayoutRequest,
    MIN_FONT_SIZE, Region, Strategy, StrategyReport, TextBlock, layout_text,
};
pub use font::{
    FontMetrics, ResolvedOverlayFont, load_font_metrics, overlay_fallback_fonts,
    resolve_overlay_font,
};
pub use render::{image_format_from_mime, render_debug_svg, render_svg, render_svg_bytes};

/// Position record for client-side rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Annotation {
    pub text: String,
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

/// A layout call as read from a JSON job file.
#[derive(Debug, Clone, Deserialize)]
pub struct LayoutJob {
    pub width: u32,
    pub height: u32,
    pub regions: Vec<Region>,
    pub texts: Vec<String>,
    #[serde(default)]
    pub colors: Option<Vec<Option<String>>>,
}

impl LayoutJob {
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).with_context(|| "failed to parse layout job JSON")
    }

    pub fn request(&self) -> LayoutRequest<'_> {
        let request = LayoutRequest::new(self.width, self.height, &self.regions, &self.texts);
        match &self.colors {
            Some(colors) => request.with_colors(colors),
            None => request,
        }
    }
}

pub struct OverlayStyle {
    pub text_color: String,
    pub stroke_color: String,
    pub alignment: Alignment,
    pub font_family: Option<String>,
    pub font_metrics: Option<FontMetrics>,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            text_color: "#111111".to_string(),
            stroke_color: "#ffffff".to_string(),
            alignment: Alignment::Center,
            font_family: None,
            font_metrics: None,
        }
    }
}
