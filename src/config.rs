use anyhow::{bail, Context, Result};
use faceprep_vision::{
    ApertureParams, CanvasGeometry, ColorMode, Compositor, ReferencePair, ResizeFilter,
};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub static CONFIG_PATH: Lazy<PathBuf> = Lazy::new(|| match option_env!("FACEPREP_CONFIG_PATH") {
    Some(p) => PathBuf::from(p),
    None => directories::ProjectDirs::from("", "", "faceprep")
        .map(|d| d.config_dir().join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("faceprep.toml")),
});

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub color: Color,
    /// Worker threads for per-image alignment; 0 uses every core.
    pub workers: usize,
    pub paths: PathsConfig,
    pub reference: ReferenceConfig,
    pub canvas: CanvasConfig,
    pub aperture: ApertureConfig,
    pub composite: CompositeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PathsConfig {
    pub image_dir: PathBuf,
    pub landmark_dir: PathBuf,
    pub output_dir: PathBuf,
    pub image_extensions: Vec<String>,
    pub landmark_suffix: String,
    pub output_suffix: String,
    /// Persisted template to reuse instead of averaging the current batch.
    pub template_file: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            image_dir: PathBuf::from("original"),
            landmark_dir: PathBuf::from("landmarks"),
            output_dir: PathBuf::from("aligned"),
            image_extensions: vec!["jpg".into(), "jpeg".into(), "png".into()],
            landmark_suffix: "_landmarks".into(),
            output_suffix: "_align".into(),
            template_file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReferenceConfig {
    pub left: usize,
    pub right: usize,
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        Self { left: 0, right: 1 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CanvasConfig {
    pub width: u32,
    pub height: u32,
    pub eye_distance: f64,
    pub eye_y_ratio: f64,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        let g = CanvasGeometry::default();
        Self {
            width: g.width,
            height: g.height,
            eye_distance: g.eye_distance,
            eye_y_ratio: g.eye_y_ratio,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ApertureConfig {
    pub enabled: bool,
    pub shape_strength: f64,
    pub feather: f64,
    pub margin: f64,
    pub background: u8,
}

impl Default for ApertureConfig {
    fn default() -> Self {
        let p = ApertureParams::default();
        Self {
            enabled: true,
            shape_strength: p.shape_strength,
            feather: p.feather,
            margin: p.margin,
            background: p.background,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CompositeConfig {
    pub enabled: bool,
    pub presentation_width: u32,
    pub presentation_height: u32,
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub top_ratio: f64,
    pub filter: Filter,
}

impl Default for CompositeConfig {
    fn default() -> Self {
        let c = Compositor::default();
        Self {
            enabled: true,
            presentation_width: c.presentation.0,
            presentation_height: c.presentation.1,
            canvas_width: c.canvas.0,
            canvas_height: c.canvas.1,
            top_ratio: c.top_ratio,
            filter: Filter::Area,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Filter {
    #[default]
    Area,
    Triangle,
    Lanczos3,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    #[default]
    Rgb,
    Grayscale,
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        let r = &self.reference;
        if r.left == r.right {
            bail!("reference.left and reference.right must differ (both {})", r.left);
        }
        let c = &self.canvas;
        if c.width == 0 || c.height == 0 {
            bail!("canvas size must be non-zero, got {}x{}", c.width, c.height);
        }
        if !(c.eye_distance > 0.0 && c.eye_distance.is_finite()) {
            bail!("canvas.eye_distance must be positive, got {}", c.eye_distance);
        }
        if !(0.0..=1.0).contains(&c.eye_y_ratio) {
            bail!("canvas.eye_y_ratio must be within [0, 1], got {}", c.eye_y_ratio);
        }
        let a = &self.aperture;
        if !(a.feather >= 0.0 && a.feather.is_finite()) {
            bail!("aperture.feather must be non-negative, got {}", a.feather);
        }
        if !(0.0..1.0).contains(&a.shape_strength) {
            bail!("aperture.shape_strength must be within [0, 1), got {}", a.shape_strength);
        }
        if a.margin < 0.0 || a.margin >= c.width.min(c.height) as f64 {
            bail!("aperture.margin {} does not fit the canvas", a.margin);
        }
        let k = &self.composite;
        if k.presentation_width == 0 || k.presentation_height == 0 {
            bail!("composite presentation size must be non-zero");
        }
        if k.presentation_width > k.canvas_width || k.presentation_height > k.canvas_height {
            bail!(
                "composite presentation {}x{} exceeds canvas {}x{}",
                k.presentation_width,
                k.presentation_height,
                k.canvas_width,
                k.canvas_height
            );
        }
        if !(0.0..=1.0).contains(&k.top_ratio) {
            bail!("composite.top_ratio must be within [0, 1], got {}", k.top_ratio);
        }
        if self.paths.image_extensions.is_empty() {
            bail!("paths.image_extensions must list at least one extension");
        }
        Ok(())
    }

    pub fn reference_pair(&self) -> ReferencePair {
        ReferencePair::new(self.reference.left, self.reference.right)
    }

    pub fn geometry(&self) -> CanvasGeometry {
        CanvasGeometry {
            width: self.canvas.width,
            height: self.canvas.height,
            eye_distance: self.canvas.eye_distance,
            eye_y_ratio: self.canvas.eye_y_ratio,
        }
    }

    pub fn aperture_params(&self) -> Option<ApertureParams> {
        let a = &self.aperture;
        a.enabled.then_some(ApertureParams {
            shape_strength: a.shape_strength,
            feather: a.feather,
            margin: a.margin,
            background: a.background,
        })
    }

    pub fn compositor(&self) -> Option<Compositor> {
        let k = &self.composite;
        k.enabled.then_some(Compositor {
            presentation: (k.presentation_width, k.presentation_height),
            canvas: (k.canvas_width, k.canvas_height),
            top_ratio: k.top_ratio,
            background: self.aperture.background,
            filter: match k.filter {
                Filter::Area => ResizeFilter::Area,
                Filter::Triangle => ResizeFilter::Triangle,
                Filter::Lanczos3 => ResizeFilter::Lanczos3,
            },
        })
    }

    pub fn color_mode(&self) -> ColorMode {
        match self.color {
            Color::Rgb => ColorMode::Rgb,
            Color::Grayscale => ColorMode::Grayscale,
        }
    }
}

pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = path.unwrap_or(CONFIG_PATH.as_path());
    let cfg = if path.exists() {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config at {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))?
    } else {
        Config::default()
    };
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

pub fn save_config(cfg: &Config, path: Option<&Path>) -> Result<()> {
    let path = path.unwrap_or(CONFIG_PATH.as_path());
    let data = toml::to_string_pretty(cfg)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, data)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = Config::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.geometry(), CanvasGeometry::default());
        assert_eq!(cfg.reference_pair(), ReferencePair::new(0, 1));
        assert!(cfg.aperture_params().is_some());
        assert_eq!(cfg.compositor(), Some(Compositor::default()));
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            workers = 4
            color = "grayscale"

            [canvas]
            eye_distance = 90.0

            [composite]
            enabled = false
            filter = "lanczos3"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.workers, 4);
        assert_eq!(cfg.color_mode(), ColorMode::Grayscale);
        assert_eq!(cfg.canvas.eye_distance, 90.0);
        assert_eq!(cfg.canvas.width, 562);
        assert_eq!(cfg.composite.filter, Filter::Lanczos3);
        assert!(cfg.compositor().is_none());
        assert_eq!(cfg.paths.landmark_suffix, "_landmarks");
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut cfg = Config::default();
        cfg.reference.right = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.canvas.eye_y_ratio = 1.5;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.aperture.feather = -0.1;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.composite.presentation_width = 1000;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.canvas.eye_distance = 0.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_save_then_load() {
        let dir = std::env::temp_dir().join(uuid::Uuid::new_v4().to_string());
        let path = dir.join("config.toml");
        let mut cfg = Config::default();
        cfg.workers = 2;
        cfg.paths.template_file = Some(PathBuf::from("template.json"));
        save_config(&cfg, Some(&path)).unwrap();
        assert_eq!(load_config(Some(&path)).unwrap(), cfg);
        std::fs::remove_dir_all(dir).unwrap();
    }
}
