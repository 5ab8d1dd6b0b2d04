use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

use super::measure::Alignment;

/// Lowest font size any block may end a layout run with.
pub const MIN_FONT_SIZE: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Rule based retry/action placement.
    #[default]
    Action,
    /// Force directed relaxation.
    Force,
}

impl std::str::FromStr for Strategy {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "action" | "actions" | "rule" => Ok(Strategy::Action),
            "force" | "physics" => Ok(Strategy::Force),
            other => bail!("unknown layout strategy '{}'", other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FontSizing {
    /// Every block uses the decluttered working size.
    #[default]
    Shared,
    /// Each block searches downward from the working size for its own fit.
    PerBox,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForceConfig {
    pub max_iterations: usize,
    pub last_ditch_iterations: usize,
    pub repulsion: f32,
    pub spring: f32,
    pub boundary: f32,
    pub damping: f32,
    /// Convergence threshold as a fraction of the canvas diagonal.
    pub convergence_ratio: f32,
}

impl Default for ForceConfig {
    fn default() -> Self {
        Self {
            max_iterations: 300,
            last_ditch_iterations: 50,
            repulsion: 1.0,
            spring: 0.05,
            boundary: 1.0,
            damping: 0.9,
            convergence_ratio: 0.0005,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutConfig {
    pub strategy: Strategy,
    pub font_sizing: FontSizing,
    pub alignment: Alignment,
    /// Stroke width as a fraction of the font size.
    pub stroke_scale: f32,
    /// Maximum share of the canvas covered by text before decluttering.
    pub clutter_threshold: f32,
    pub declutter_ratio: f32,
    pub font_floor: u32,
    pub font_base: f32,
    pub font_scale: f32,
    pub font_spread: f32,
    pub fit_tolerance: f32,
    pub collision_margin: f32,
    pub canvas_margin: f32,
    pub shrink_ratio: f32,
    /// Width/height ratio a narrow container is widened towards.
    pub target_aspect: f32,
    /// Maximum share of the canvas one expanded block may cover.
    pub max_coverage: f32,
    /// How far a move may carry text from its anchor, in region diagonals.
    pub max_drift: f32,
    pub recenter_passes: usize,
    pub force: ForceConfig,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::Action,
            font_sizing: FontSizing::Shared,
            alignment: Alignment::Center,
            stroke_scale: 0.07,
            clutter_threshold: 0.18,
            declutter_ratio: 0.85,
            font_floor: MIN_FONT_SIZE,
            font_base: 6.0,
            font_scale: 0.012,
            font_spread: 1.6,
            fit_tolerance: 1.25,
            collision_margin: 2.0,
            canvas_margin: 4.0,
            shrink_ratio: 0.9,
            target_aspect: 1.5,
            max_coverage: 0.25,
            max_drift: 3.0,
            recenter_passes: 2,
            force: ForceConfig::default(),
        }
    }
}

impl LayoutConfig {
    pub fn validate(&self) -> Result<()> {
        if self.font_floor == 0 {
            bail!("font floor must be at least 1");
        }
        if !(self.declutter_ratio > 0.0 && self.declutter_ratio < 1.0) {
            bail!("declutter ratio must be in (0, 1): {}", self.declutter_ratio);
        }
        if !(self.shrink_ratio > 0.0 && self.shrink_ratio < 1.0) {
            bail!("shrink ratio must be in (0, 1): {}", self.shrink_ratio);
        }
        if !(self.clutter_threshold > 0.0) {
            bail!("clutter threshold must be positive: {}", self.clutter_threshold);
        }
        if !(self.font_spread >= 1.0) {
            bail!("font spread must be at least 1: {}", self.font_spread);
        }
        if !(self.fit_tolerance >= 1.0) {
            bail!("fit tolerance must be at least 1: {}", self.fit_tolerance);
        }
        if !(self.stroke_scale >= 0.0) || !(self.font_scale >= 0.0) {
            bail!("stroke and font scale must not be negative");
        }
        if !(self.collision_margin >= 0.0) || !(self.canvas_margin >= 0.0) {
            bail!("margins must not be negative");
        }
        if !(self.target_aspect > 0.0) || !(self.max_coverage > 0.0) || !(self.max_drift > 0.0) {
            bail!("expand and drift limits must be positive");
        }
        if !(self.force.damping > 0.0 && self.force.damping <= 1.0) {
            bail!("damping must be in (0, 1]: {}", self.force.damping);
        }
        if !(self.force.convergence_ratio >= 0.0) {
            bail!("convergence ratio must not be negative");
        }
        Ok(())
    }
}
