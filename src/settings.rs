use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::overlay::{Alignment, FontSizing, LayoutConfig, OverlayStyle, Strategy};

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");

#[derive(Debug, Clone)]
pub struct Settings {
    pub layout: LayoutConfig,
    pub overlay_text_color: String,
    pub overlay_stroke_color: String,
    pub overlay_font_family: Option<String>,
    pub overlay_font_path: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        let style = OverlayStyle::default();
        Self {
            layout: LayoutConfig::default(),
            overlay_text_color: style.text_color,
            overlay_stroke_color: style.stroke_color,
            overlay_font_family: None,
            overlay_font_path: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    layout: Option<LayoutSettings>,
    overlay: Option<OverlaySettings>,
}

#[derive(Debug, Default, Deserialize)]
struct LayoutSettings {
    strategy: Option<String>,
    font_sizing: Option<FontSizing>,
    alignment: Option<Alignment>,
    stroke_scale: Option<f32>,
    clutter_threshold: Option<f32>,
    declutter_ratio: Option<f32>,
    font_floor: Option<u32>,
    font_base: Option<f32>,
    font_scale: Option<f32>,
    font_spread: Option<f32>,
    fit_tolerance: Option<f32>,
    collision_margin: Option<f32>,
    canvas_margin: Option<f32>,
    shrink_ratio: Option<f32>,
    target_aspect: Option<f32>,
    max_coverage: Option<f32>,
    max_drift: Option<f32>,
    recenter_passes: Option<usize>,
    force: Option<ForceSettings>,
}

#[derive(Debug, Default, Deserialize)]
struct ForceSettings {
    max_iterations: Option<usize>,
    last_ditch_iterations: Option<usize>,
    repulsion: Option<f32>,
    spring: Option<f32>,
    boundary: Option<f32>,
    damping: Option<f32>,
    convergence_ratio: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
struct OverlaySettings {
    text_color: Option<String>,
    stroke_color: Option<String>,
    font_family: Option<String>,
    font_path: Option<String>,
}

pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();
    ensure_home_settings_file()?;

    let mut ordered_paths = Vec::new();
    ordered_paths.push(PathBuf::from("settings.toml"));
    ordered_paths.push(PathBuf::from("settings.local.toml"));

    if let Some(home) = home_dir() {
        ordered_paths.push(home.join("settings.toml"));
        ordered_paths.push(home.join("settings.local.toml"));
    }

    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            let parsed: SettingsFile = toml::from_str(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
            settings
                .merge(parsed)
                .with_context(|| format!("invalid settings: {}", path.display()))?;
        }
    }

    settings.layout.validate()?;
    Ok(settings)
}

impl Settings {
    pub fn layout_config(&self) -> LayoutConfig {
        self.layout.clone()
    }

    /// Renderer style without font metrics; the caller resolves the font.
    pub fn overlay_style(&self) -> OverlayStyle {
        OverlayStyle {
            text_color: self.overlay_text_color.clone(),
            stroke_color: self.overlay_stroke_color.clone(),
            alignment: self.layout.alignment,
            font_family: self.overlay_font_family.clone(),
            font_metrics: None,
        }
    }

    fn merge(&mut self, incoming: SettingsFile) -> Result<()> {
        if let Some(layout) = incoming.layout {
            self.merge_layout(layout)?;
        }
        if let Some(overlay) = incoming.overlay {
            if let Some(color) = non_blank(overlay.text_color) {
                self.overlay_text_color = color;
            }
            if let Some(color) = non_blank(overlay.stroke_color) {
                self.overlay_stroke_color = color;
            }
            if let Some(family) = non_blank(overlay.font_family) {
                self.overlay_font_family = Some(family);
            }
            if let Some(path) = non_blank(overlay.font_path) {
                self.overlay_font_path = Some(path);
            }
        }
        Ok(())
    }

    fn merge_layout(&mut self, incoming: LayoutSettings) -> Result<()> {
        let layout = &mut self.layout;
        if let Some(strategy) = non_blank(incoming.strategy) {
            layout.strategy = strategy.parse::<Strategy>()?;
        }
        if let Some(sizing) = incoming.font_sizing {
            layout.font_sizing = sizing;
        }
        if let Some(alignment) = incoming.alignment {
            layout.alignment = alignment;
        }
        set_non_negative(&mut layout.stroke_scale, incoming.stroke_scale);
        set_positive(&mut layout.clutter_threshold, incoming.clutter_threshold);
        set_positive(&mut layout.declutter_ratio, incoming.declutter_ratio);
        set_non_negative(&mut layout.font_base, incoming.font_base);
        set_positive(&mut layout.font_scale, incoming.font_scale);
        set_positive(&mut layout.font_spread, incoming.font_spread);
        set_positive(&mut layout.fit_tolerance, incoming.fit_tolerance);
        set_non_negative(&mut layout.collision_margin, incoming.collision_margin);
        set_non_negative(&mut layout.canvas_margin, incoming.canvas_margin);
        set_positive(&mut layout.shrink_ratio, incoming.shrink_ratio);
        set_positive(&mut layout.target_aspect, incoming.target_aspect);
        set_positive(&mut layout.max_coverage, incoming.max_coverage);
        set_positive(&mut layout.max_drift, incoming.max_drift);
        if let Some(floor) = incoming.font_floor.filter(|floor| *floor > 0) {
            layout.font_floor = floor;
        }
        if let Some(passes) = incoming.recenter_passes {
            layout.recenter_passes = passes;
        }

        if let Some(force) = incoming.force {
            let target = &mut layout.force;
            if let Some(limit) = force.max_iterations.filter(|limit| *limit > 0) {
                target.max_iterations = limit;
            }
            if let Some(limit) = force.last_ditch_iterations.filter(|limit| *limit > 0) {
                target.last_ditch_iterations = limit;
            }
            set_positive(&mut target.repulsion, force.repulsion);
            set_positive(&mut target.spring, force.spring);
            set_positive(&mut target.boundary, force.boundary);
            set_positive(&mut target.damping, force.damping);
            set_positive(&mut target.convergence_ratio, force.convergence_ratio);
        }
        Ok(())
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

fn set_positive(target: &mut f32, value: Option<f32>) {
    if let Some(value) = value {
        if value > 0.0 {
            *target = value;
        }
    }
}

fn set_non_negative(target: &mut f32, value: Option<f32>) {
    if let Some(value) = value.filter(|value| *value >= 0.0) {
        *target = value;
    }
}

fn ensure_home_settings_file() -> Result<()> {
    let Some(home) = home_dir() else {
        return Ok(());
    };
    fs::create_dir_all(&home)
        .with_context(|| format!("failed to create settings directory: {}", home.display()))?;
    let path = home.join("settings.toml");
    if !path.exists() {
        fs::write(&path, DEFAULT_SETTINGS_TOML)
            .with_context(|| format!("failed to write settings: {}", path.display()))?;
    }
    Ok(())
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(".overlay-layout-rust"))
        }
    })
}
