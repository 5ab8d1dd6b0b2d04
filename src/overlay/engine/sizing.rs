use serde::Serialize;
use tracing::debug;

use super::block::{Region, TextBlock};
use super::config::{FontSizing, LayoutConfig};
use super::measure::{Measured, Measurer};

/// Image relative font size range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FontBounds {
    pub min: u32,
    pub max: u32,
}

impl FontBounds {
    /// Linear in the shorter image side, clamped to the configured floor.
    pub fn for_image(width: u32, height: u32, config: &LayoutConfig) -> Self {
        let shorter = width.min(height) as f32;
        let raw = (config.font_base + config.font_scale * shorter).round();
        let min = if raw.is_finite() && raw > 0.0 {
            (raw as u32).max(config.font_floor)
        } else {
            config.font_floor
        };
        let max = ((min as f32 * config.font_spread).round() as u32).max(min);
        Self { min, max }
    }
}

#[derive(Debug, Clone)]
pub struct FitResult {
    pub font_size: u32,
    pub fits: bool,
    pub measured: Measured,
}

/// Largest size in `floor..=start` whose wrapped text fits `region`, within
/// `tolerance`. Falls back to `floor` with `fits == false`.
pub fn fit_font_size(
    measurer: &mut Measurer<'_>,
    text: &str,
    region: &Region,
    start: u32,
    floor: u32,
    tolerance: f32,
) -> FitResult {
    let start = start.max(floor);
    let max_width = region.width() * tolerance;
    let max_height = region.height() * tolerance;
    for size in (floor..=start).rev() {
        let measured = measurer.measure(text, size, region.width(), size == floor);
        if measured.width <= max_width && measured.height <= max_height {
            return FitResult {
                font_size: size,
                fits: true,
                measured,
            };
        }
    }
    let measured = measurer.measure(text, floor, region.width(), true);
    FitResult {
        font_size: floor,
        fits: false,
        measured,
    }
}

pub fn clutter_ratio(blocks: &[TextBlock], canvas_area: f32) -> f32 {
    if canvas_area <= 0.0 {
        return 0.0;
    }
    let covered: f32 = blocks.iter().map(|block| block.final_bbox().area()).sum();
    covered / canvas_area
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkingSize {
    pub font_size: u32,
    pub clutter_ratio: f32,
    /// Every shared size tried, largest first.
    pub history: Vec<u32>,
}

/// Flat pass at `start`, then shrink the shared size by the declutter ratio
/// until the covered share drops under the threshold or `floor` is reached.
pub(crate) fn declutter(
    blocks: &mut [TextBlock],
    measurer: &mut Measurer<'_>,
    start: u32,
    floor: u32,
    config: &LayoutConfig,
    canvas_area: f32,
) -> WorkingSize {
    let mut size = start.max(floor);
    for block in blocks.iter_mut() {
        block.font_size = size;
        block.refit(measurer, floor);
    }
    let mut ratio = clutter_ratio(blocks, canvas_area);
    let mut history = vec![size];

    while ratio > config.clutter_threshold && size > floor {
        let scaled = (size as f32 * config.declutter_ratio).round() as u32;
        size = scaled.min(size - 1).max(floor);
        for block in blocks.iter_mut() {
            block.shrink_to(size, measurer, floor);
        }
        ratio = clutter_ratio(blocks, canvas_area);
        history.push(size);
        debug!(font_size = size, clutter = ratio, "declutter step");
    }

    WorkingSize {
        font_size: size,
        clutter_ratio: ratio,
        history,
    }
}

/// Whether the rendered text stays within its own region, scaled by `tolerance`.
pub(crate) fn fits_region(block: &TextBlock, tolerance: f32) -> bool {
    if block.is_empty() {
        return true;
    }
    let bbox = block.final_bbox();
    let region = block.region();
    bbox.width() <= region.width() * tolerance && bbox.height() <= region.height() * tolerance
}

/// Per-box escape valve plus the `fits` flag for every block.
pub(crate) fn apply_font_sizing(
    blocks: &mut [TextBlock],
    measurer: &mut Measurer<'_>,
    working: u32,
    floor: u32,
    config: &LayoutConfig,
) {
    for block in blocks.iter_mut() {
        if block.is_empty() {
            block.fits = true;
            continue;
        }
        match config.font_sizing {
            FontSizing::Shared => {
                block.fits = fits_region(block, config.fit_tolerance);
            }
            FontSizing::PerBox => {
                let fit = fit_font_size(
                    measurer,
                    block.content(),
                    block.region(),
                    working,
                    floor,
                    config.fit_tolerance,
                );
                block.shrink_to(fit.font_size, measurer, floor);
                block.fits = fit.fits;
            }
        }
    }
}
