mod actions;
mod block;
mod config;
mod force;
mod geom;
mod measure;
mod recenter;
mod sizing;

use anyhow::{Result, bail};
use tracing::{info, warn};

use crate::overlay::Annotation;
use crate::overlay::font::FontMetrics;

pub use actions::{Action, ActionKind, ActionReport, Direction, palette};
pub use block::{BlockId, Region, TextBlock};
pub use config::{FontSizing, ForceConfig, LayoutConfig, MIN_FONT_SIZE, Strategy};
pub use force::ForceReport;
pub use geom::{Canvas, Point, Rect, Vector};
pub use measure::{Alignment, Measured, Measurer};
pub use sizing::{FitResult, FontBounds, WorkingSize, clutter_ratio, fit_font_size};

/// One layout call: canvas size plus parallel region and text lists.
#[derive(Debug, Clone, Copy)]
pub struct LayoutRequest<'a> {
    pub width: u32,
    pub height: u32,
    pub regions: &'a [Region],
    pub texts: &'a [String],
    pub colors: Option<&'a [Option<String>]>,
}

impl<'a> LayoutRequest<'a> {
    pub fn new(width: u32, height: u32, regions: &'a [Region], texts: &'a [String]) -> Self {
        Self {
            width,
            height,
            regions,
            texts,
            colors: None,
        }
    }

    pub fn with_colors(mut self, colors: &'a [Option<String>]) -> Self {
        self.colors = Some(colors);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyReport {
    Action(ActionReport),
    Force(ForceReport),
}

#[derive(Debug, Clone)]
pub struct LayoutOutcome {
    pub blocks: Vec<TextBlock>,
    pub working_font_size: u32,
    pub bounds: FontBounds,
    pub clutter_ratio: f32,
    pub strategy: Option<StrategyReport>,
}

impl LayoutOutcome {
    fn empty(bounds: FontBounds) -> Self {
        Self {
            blocks: Vec::new(),
            working_font_size: bounds.max,
            bounds,
            clutter_ratio: 0.0,
            strategy: None,
        }
    }

    /// Blocks still colliding or off the canvas after every fallback.
    pub fn unresolved(&self) -> Vec<&TextBlock> {
        self.blocks.iter().filter(|block| !block.resolved()).collect()
    }

    /// `{text, x1, y1, x2, y2}` records for every visible block.
    pub fn annotations(&self) -> Vec<Annotation> {
        annotations(&self.blocks)
    }
}

pub fn annotations(blocks: &[TextBlock]) -> Vec<Annotation> {
    blocks
        .iter()
        .filter(|block| !block.is_empty())
        .map(|block| {
            let bbox = block.final_bbox();
            Annotation {
                text: block.wrapped_text(),
                x1: bbox.x1.round() as i32,
                y1: bbox.y1.round() as i32,
                x2: bbox.x2.round() as i32,
                y2: bbox.y2.round() as i32,
            }
        })
        .collect()
}

/// Pick font sizes, wrap every text and place its box.
///
/// Never fails because text could not be placed; check `resolved` and
/// `fits` on the returned blocks instead.
pub fn layout_text(
    request: &LayoutRequest<'_>,
    config: &LayoutConfig,
    font: Option<&FontMetrics>,
) -> Result<LayoutOutcome> {
    config.validate()?;
    if request.regions.len() != request.texts.len() {
        bail!(
            "regions and texts differ in length: {} regions, {} texts",
            request.regions.len(),
            request.texts.len()
        );
    }
    if let Some(colors) = request.colors {
        if colors.len() != request.regions.len() {
            bail!(
                "colors and regions differ in length: {} colors, {} regions",
                colors.len(),
                request.regions.len()
            );
        }
    }

    let bounds = FontBounds::for_image(request.width, request.height, config);
    if request.regions.is_empty() {
        return Ok(LayoutOutcome::empty(bounds));
    }
    if request.width == 0 || request.height == 0 {
        bail!(
            "cannot lay out {} regions on an empty {}x{} canvas",
            request.regions.len(),
            request.width,
            request.height
        );
    }

    let canvas = Canvas::new(request.width, request.height, config.canvas_margin);
    // the image relative minimum is the working floor; font_floor only clamps it
    let floor = bounds.min.max(config.font_floor);
    let mut measurer = Measurer::new(font, config.stroke_scale, config.alignment);
    let mut blocks: Vec<TextBlock> = request
        .regions
        .iter()
        .zip(request.texts)
        .enumerate()
        .map(|(idx, (region, text))| {
            let color = request
                .colors
                .and_then(|colors| colors.get(idx).cloned().flatten());
            TextBlock::new(BlockId(idx), *region, text, color, bounds.max)
        })
        .collect();

    let working = sizing::declutter(
        &mut blocks,
        &mut measurer,
        bounds.max,
        floor,
        config,
        canvas.area(),
    );
    info!(
        font_size = working.font_size,
        min = bounds.min,
        max = bounds.max,
        clutter = working.clutter_ratio,
        steps = working.history.len(),
        "chose working font size"
    );
    sizing::apply_font_sizing(&mut blocks, &mut measurer, working.font_size, floor, config);

    let report = match config.strategy {
        Strategy::Action => {
            let mut ctx = actions::ActionContext {
                measurer: &mut measurer,
                canvas,
                config,
                floor,
            };
            let report = actions::place_with_actions(&mut blocks, &mut ctx);
            for _ in 0..config.recenter_passes {
                recenter::recenter(&mut blocks, &canvas, config.collision_margin);
            }
            info!(
                processed = report.processed,
                resolved = report.resolved,
                merged = report.merged,
                "action placement finished"
            );
            StrategyReport::Action(report)
        }
        Strategy::Force => {
            let report = force::relax(&mut blocks, &mut measurer, &canvas, config, floor)?;
            info!(
                iterations = report.iterations,
                converged = report.converged,
                last_ditch = report.last_ditch_rounds,
                "force placement finished"
            );
            StrategyReport::Force(report)
        }
    };

    mark_resolved(&mut blocks, &canvas, config);
    let unresolved = blocks.iter().filter(|block| !block.resolved()).count();
    if unresolved > 0 {
        warn!(
            unresolved,
            total = blocks.len(),
            "some text blocks still overlap or overflow the canvas"
        );
    }
    let (hits, misses) = measurer.cache_stats();
    tracing::debug!(hits, misses, "measurement cache");

    Ok(LayoutOutcome {
        clutter_ratio: sizing::clutter_ratio(&blocks, canvas.area()),
        blocks,
        working_font_size: working.font_size,
        bounds,
        strategy: Some(report),
    })
}

/// Final `resolved` and `fits` flags; placement may have shrunk, moved or
/// merged text since sizing.
fn mark_resolved(blocks: &mut [TextBlock], canvas: &Canvas, config: &LayoutConfig) {
    let margin = config.collision_margin;
    let all: &[TextBlock] = blocks;
    let flags: Vec<(bool, bool)> = all
        .iter()
        .map(|block| {
            let resolved = block.is_empty()
                || (block::collision_count(block, all, margin) == 0
                    && !canvas.overflows(&block.final_bbox()));
            (resolved, sizing::fits_region(block, config.fit_tolerance))
        })
        .collect();
    for (block, (resolved, fits)) in blocks.iter_mut().zip(flags) {
        block.resolved = resolved;
        block.fits = fits;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn empty_request_returns_empty_outcome() {
        let request = LayoutRequest::new(640, 480, &[], &[]);
        let outcome = layout_text(&request, &LayoutConfig::default(), None).unwrap();
        assert!(outcome.blocks.is_empty());
        assert!(outcome.annotations().is_empty());
        assert!(outcome.strategy.is_none());
    }

    #[test]
    fn length_mismatch_is_rejected() {
        let regions = [Region::new(0, 0, 10, 10)];
        let request = LayoutRequest::new(100, 100, &regions, &[]);
        let err = layout_text(&request, &LayoutConfig::default(), None).unwrap_err();
        assert!(err.to_string().contains("differ in length"));
    }

    #[test]
    fn color_length_mismatch_is_rejected() {
        let regions = [Region::new(0, 0, 10, 10)];
        let texts = texts(&["a"]);
        let colors = vec![None, None];
        let request = LayoutRequest::new(100, 100, &regions, &texts).with_colors(&colors);
        assert!(layout_text(&request, &LayoutConfig::default(), None).is_err());
    }

    #[test]
    fn empty_canvas_with_regions_is_rejected() {
        let regions = [Region::new(0, 0, 10, 10)];
        let texts = texts(&["a"]);
        let request = LayoutRequest::new(0, 100, &regions, &texts);
        assert!(layout_text(&request, &LayoutConfig::default(), None).is_err());
    }

    #[test]
    fn empty_text_is_resolved_and_not_annotated() {
        let regions = [Region::new(10, 10, 110, 50), Region::new(200, 10, 300, 50)];
        let texts = texts(&["hello", "   "]);
        let request = LayoutRequest::new(400, 300, &regions, &texts);
        let outcome = layout_text(&request, &LayoutConfig::default(), None).unwrap();
        assert!(outcome.blocks[1].is_empty());
        assert!(outcome.blocks[1].resolved());
        let annotations = outcome.annotations();
        assert_eq!(annotations.len(), 1);
        assert_eq!(annotations[0].text, "hello");
    }

    #[test]
    fn colors_are_carried_to_blocks() {
        let regions = [Region::new(10, 10, 110, 50)];
        let texts = texts(&["hello"]);
        let colors = vec![Some("#ff0000".to_string())];
        let request = LayoutRequest::new(400, 300, &regions, &texts).with_colors(&colors);
        let outcome = layout_text(&request, &LayoutConfig::default(), None).unwrap();
        assert_eq!(outcome.blocks[0].color(), Some("#ff0000"));
    }

    #[test]
    fn fits_is_recomputed_after_placement() {
        let config = LayoutConfig::default();
        let mut measurer = Measurer::new(None, config.stroke_scale, config.alignment);
        let mut target = TextBlock::new(BlockId(0), Region::new(0, 0, 60, 30), "abc", None, 10);
        target.refit(&mut measurer, 10);
        target.fits = true;
        target.absorb("a much longer merged sentence that wraps");
        target.refit(&mut measurer, 10);
        let mut source = TextBlock::new(BlockId(1), Region::new(200, 200, 260, 230), "x", None, 10);
        source.clear_content(BlockId(0));
        source.fits = false;
        let mut blocks = vec![target, source];

        mark_resolved(&mut blocks, &Canvas::new(400, 300, config.canvas_margin), &config);
        assert!(!blocks[0].fits());
        assert!(blocks[1].fits());
        assert!(blocks[1].resolved());
    }

    #[test]
    fn large_image_never_goes_below_its_minimum_size() {
        let mut regions = Vec::new();
        for row in 0..6 {
            for col in 0..5 {
                let x = 40 + col * 390;
                let y = 40 + row * 320;
                regions.push(Region::new(x, y, x + 300, y + 60));
            }
        }
        let texts = vec!["a translated caption that is long enough to wrap".to_string(); regions.len()];
        let request = LayoutRequest::new(2000, 2000, &regions, &texts);
        for strategy in [Strategy::Action, Strategy::Force] {
            for font_sizing in [FontSizing::Shared, FontSizing::PerBox] {
                let config = LayoutConfig {
                    strategy,
                    font_sizing,
                    clutter_threshold: 0.05,
                    ..LayoutConfig::default()
                };
                let outcome = layout_text(&request, &config, None).unwrap();
                assert_eq!(outcome.bounds.min, 30);
                assert_eq!(outcome.working_font_size, 30);
                for block in &outcome.blocks {
                    assert!(block.font_size() >= outcome.bounds.min);
                }
            }
        }
    }

    #[test]
    fn unresolved_lists_blocks_that_cannot_fit() {
        // stacking two boxes needs more height than the canvas has
        let regions = [Region::new(0, 0, 60, 30), Region::new(0, 0, 60, 30)];
        let texts = texts(&["abc", "abc"]);
        let request = LayoutRequest::new(60, 30, &regions, &texts);
        let config = LayoutConfig {
            strategy: Strategy::Force,
            ..LayoutConfig::default()
        };
        let outcome = layout_text(&request, &config, None).unwrap();
        assert!(!outcome.unresolved().is_empty());
        assert!(outcome.blocks.iter().all(|block| block.font_size() == MIN_FONT_SIZE));
    }
}
