use serde::{Deserialize, Serialize};

use super::geom::{Point, Rect, Vector};
use super::measure::{Alignment, Measurer};

/// Detected text area in source image pixels. Never mutated by layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl Region {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.x1 as f32, self.y1 as f32, self.x2 as f32, self.y2 as f32)
    }

    pub fn width(&self) -> f32 {
        self.x2.abs_diff(self.x1) as f32
    }

    pub fn height(&self) -> f32 {
        self.y2.abs_diff(self.y1) as f32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct BlockId(pub usize);

/// Mutable layout state for one region.
///
/// `final_bbox` is only ever derived by [`TextBlock::refit`] from the
/// current content, font size, container width and alignment.
#[derive(Debug, Clone)]
pub struct TextBlock {
    id: BlockId,
    region: Region,
    anchor: Point,
    translated: String,
    pub(crate) content: String,
    pub(crate) lines: Vec<String>,
    pub(crate) font_size: u32,
    pub(crate) rect: Rect,
    pub(crate) final_bbox: Rect,
    pub(crate) stroke: u32,
    pub(crate) spacing: u32,
    pub(crate) mass: f32,
    pub(crate) displacement: Vector,
    pub(crate) color: Option<String>,
    pub(crate) fits: bool,
    pub(crate) resolved: bool,
    pub(crate) merged_into: Option<BlockId>,
}

impl TextBlock {
    pub(crate) fn new(
        id: BlockId,
        region: Region,
        translated: &str,
        color: Option<String>,
        font_size: u32,
    ) -> Self {
        let rect = region.rect();
        let anchor = rect.center();
        let content = translated.trim().to_string();
        Self {
            id,
            region,
            anchor,
            translated: translated.to_string(),
            content,
            lines: Vec::new(),
            font_size,
            rect,
            final_bbox: Rect::from_center(anchor, 0.0, 0.0),
            stroke: 0,
            spacing: 0,
            mass: 0.0,
            displacement: Vector::ZERO,
            color,
            fits: true,
            resolved: false,
            merged_into: None,
        }
    }

    pub fn id(&self) -> BlockId {
        self.id
    }

    pub fn region(&self) -> &Region {
        &self.region
    }

    pub fn anchor(&self) -> Point {
        self.anchor
    }

    pub fn translated_text(&self) -> &str {
        &self.translated
    }

    /// Text currently shown; differs from the translation after a merge.
    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn wrapped_lines(&self) -> &[String] {
        &self.lines
    }

    pub fn wrapped_text(&self) -> String {
        self.lines.join("\n")
    }

    pub fn font_size(&self) -> u32 {
        self.font_size
    }

    pub fn rect(&self) -> Rect {
        self.rect
    }

    pub fn final_bbox(&self) -> Rect {
        self.final_bbox
    }

    pub fn stroke_width(&self) -> u32 {
        self.stroke
    }

    pub fn line_spacing(&self) -> u32 {
        self.spacing
    }

    pub fn mass(&self) -> f32 {
        self.mass
    }

    pub fn color(&self) -> Option<&str> {
        self.color.as_deref()
    }

    /// Whether the text fit its own region at the chosen size.
    pub fn fits(&self) -> bool {
        self.fits
    }

    /// Whether the final bbox is collision free and inside the canvas.
    pub fn resolved(&self) -> bool {
        self.resolved
    }

    pub fn merged_into(&self) -> Option<BlockId> {
        self.merged_into
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Re-wrap and re-measure at the current container width, hyphenating
    /// long words only once the block sits at `floor`.
    pub(crate) fn refit(&mut self, measurer: &mut Measurer<'_>, floor: u32) {
        let hyphenate = self.font_size <= floor;
        let measured = measurer.measure(&self.content, self.font_size, self.rect.width(), hyphenate);
        let center = self.rect.center();
        let x1 = match measurer.align() {
            Alignment::Left => self.rect.x1,
            Alignment::Center => center.x - measured.width * 0.5,
            Alignment::Right => self.rect.x2 - measured.width,
        };
        let y1 = center.y - measured.height * 0.5;
        self.final_bbox = Rect {
            x1,
            y1,
            x2: x1 + measured.width,
            y2: y1 + measured.height,
        };
        self.mass = measured.line_count() as f32 * self.final_bbox.area();
        self.stroke = measured.stroke;
        self.spacing = measured.spacing;
        self.lines = measured.lines;
    }

    /// Set the font size, never raising it, and refit.
    pub(crate) fn shrink_to(&mut self, font_size: u32, measurer: &mut Measurer<'_>, floor: u32) {
        self.font_size = font_size.max(floor).min(self.font_size);
        self.refit(measurer, floor);
    }

    pub(crate) fn translate(&mut self, by: Vector) {
        self.rect = self.rect.translate(by);
        self.final_bbox = self.final_bbox.translate(by);
    }

    /// Move the container so the rendered text is centred on the anchor.
    pub(crate) fn center_on_anchor(&mut self) {
        let center = self.final_bbox.center();
        self.translate(&self.anchor - &center);
    }

    pub(crate) fn anchor_distance(&self) -> f32 {
        self.final_bbox.center().distance(&self.anchor)
    }

    /// Farthest a move may carry the text from its anchor.
    pub(crate) fn drift_limit(&self, factor: f32) -> f32 {
        let rect = self.region.rect();
        let diagonal = (rect.width().powi(2) + rect.height().powi(2)).sqrt();
        diagonal.max(self.font_size as f32) * factor
    }

    pub(crate) fn absorb(&mut self, other: &str) {
        if other.is_empty() {
            return;
        }
        if self.content.is_empty() {
            self.content = other.to_string();
        } else {
            self.content = format!("{} {}", self.content, other);
        }
    }

    pub(crate) fn clear_content(&mut self, merged_into: BlockId) {
        self.content.clear();
        self.merged_into = Some(merged_into);
    }
}

/// Two distinct, non-empty blocks whose bboxes come closer than `margin`.
pub(crate) fn collides(a: &TextBlock, b: &TextBlock, margin: f32) -> bool {
    a.id != b.id
        && !a.is_empty()
        && !b.is_empty()
        && a.final_bbox.expand(margin).intersects(&b.final_bbox)
}

pub(crate) fn collision_count(block: &TextBlock, others: &[TextBlock], margin: f32) -> usize {
    others
        .iter()
        .filter(|other| collides(block, other, margin))
        .count()
}

pub(crate) fn colliding_ids(block: &TextBlock, others: &[TextBlock], margin: f32) -> Vec<BlockId> {
    others
        .iter()
        .filter(|other| collides(block, other, margin))
        .map(|other| other.id)
        .collect()
}

pub(crate) fn colliding_pairs(blocks: &[TextBlock], margin: f32) -> Vec<(usize, usize)> {
    let mut pairs = Vec::new();
    for i in 0..blocks.len() {
        for j in (i + 1)..blocks.len() {
            if collides(&blocks[i], &blocks[j], margin) {
                pairs.push((i, j));
            }
        }
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(text: &str) -> TextBlock {
        TextBlock::new(BlockId(0), Region::new(100, 100, 200, 140), text, None, 20)
    }

    #[test]
    fn anchor_is_region_center() {
        let block = block("hello");
        assert_eq!(block.anchor(), Point::new(150.0, 120.0));
    }

    #[test]
    fn extreme_region_coordinates_do_not_overflow() {
        let region = Region::new(i32::MIN, i32::MAX, i32::MAX, i32::MIN);
        assert_eq!(region.width(), u32::MAX as f32);
        assert_eq!(region.height(), u32::MAX as f32);
        assert_eq!(Region::new(30, 40, 10, 5).width(), 20.0);
    }

    #[test]
    fn refit_centres_text_in_container() {
        let mut measurer = Measurer::new(None, 0.0, Alignment::Center);
        let mut block = block("hello");
        block.refit(&mut measurer, 10);
        let bbox = block.final_bbox();
        assert_eq!(bbox.center(), Point::new(150.0, 120.0));
        assert_eq!(block.wrapped_lines(), &["hello".to_string()]);
        assert!((block.mass() - bbox.area()).abs() < 1e-3);
    }

    #[test]
    fn left_alignment_pins_left_edge() {
        let mut measurer = Measurer::new(None, 0.0, Alignment::Left);
        let mut block = block("hi");
        block.refit(&mut measurer, 10);
        assert_eq!(block.final_bbox().x1, 100.0);
    }

    #[test]
    fn shrink_never_raises_font_size() {
        let mut measurer = Measurer::new(None, 0.0, Alignment::Center);
        let mut block = block("hello");
        block.shrink_to(30, &mut measurer, 10);
        assert_eq!(block.font_size(), 20);
        block.shrink_to(4, &mut measurer, 10);
        assert_eq!(block.font_size(), 10);
    }

    #[test]
    fn collision_respects_margin_and_emptiness() {
        let mut measurer = Measurer::new(None, 0.0, Alignment::Center);
        let mut a = TextBlock::new(BlockId(0), Region::new(0, 0, 40, 20), "ab", None, 20);
        let mut b = TextBlock::new(BlockId(1), Region::new(25, 0, 65, 20), "ab", None, 20);
        a.refit(&mut measurer, 10);
        b.refit(&mut measurer, 10);
        // a spans 9..31, b spans 34..56
        assert!(!collides(&a, &b, 2.0));
        assert!(collides(&a, &b, 4.0));
        assert!(!collides(&a, &a, 4.0));
        b.clear_content(BlockId(0));
        b.refit(&mut measurer, 10);
        assert!(!collides(&a, &b, 4.0));
        assert_eq!(colliding_pairs(&[a, b], 4.0), Vec::new());
    }

    #[test]
    fn empty_block_has_zero_bbox() {
        let mut measurer = Measurer::new(None, 0.07, Alignment::Center);
        let mut block = block("  ");
        block.refit(&mut measurer, 10);
        assert!(block.is_empty());
        assert!(block.final_bbox().is_empty());
        assert_eq!(block.mass(), 0.0);
    }
}
