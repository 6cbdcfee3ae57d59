use std::path::{Path, PathBuf};

use anyhow::bail;
use serde::{Deserialize, Serialize};

use crate::model::types::WindowLayoutMode;

const MAX_VIRTUAL_PIXEL_RATIO: f32 = 8.0;

pub fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(std::env::temp_dir)
        .join("wmserver")
}

pub fn config_file() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(data_dir)
        .join("wmserver")
        .join("config.toml")
}

fn yes() -> bool { true }

fn default_sentinel() -> PathBuf { PathBuf::from("/etc/wmserver/window_animation_enabled") }

fn default_snapshot_timeout_ms() -> u64 { 2000 }

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub layout: LayoutSettings,
    #[serde(default)]
    pub display: DisplaySettings,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default)]
    pub layout_mode: WindowLayoutMode,
    /// Whether transitions are handed to a remote (compositor side) animator.
    #[serde(default = "yes")]
    pub remote_animation: bool,
    /// Window animation for render tree attach/detach is enabled iff this
    /// file exists.
    #[serde(default = "default_sentinel")]
    pub window_animation_sentinel: PathBuf,
    #[serde(default = "default_snapshot_timeout_ms")]
    pub snapshot_timeout_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            layout_mode: WindowLayoutMode::default(),
            remote_animation: true,
            window_animation_sentinel: default_sentinel(),
            snapshot_timeout_ms: default_snapshot_timeout_ms(),
        }
    }
}

impl Settings {
    pub fn window_animation_enabled(&self) -> bool { self.window_animation_sentinel.exists() }

    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.snapshot_timeout_ms == 0 {
            issues.push("snapshot_timeout_ms must be greater than 0".to_string());
        }
        issues
    }
}

/// Layout constants, all in virtual pixels (scaled by the display's virtual
/// pixel ratio at use).
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct LayoutSettings {
    #[serde(default = "default_max_floating_size")]
    pub max_floating_size: u32,
    #[serde(default = "default_min_floating_width")]
    pub min_floating_width: u32,
    #[serde(default = "default_min_floating_height")]
    pub min_floating_height: u32,
    #[serde(default = "default_title_bar_height")]
    pub title_bar_height: u32,
    #[serde(default = "default_frame_width")]
    pub frame_width: u32,
    #[serde(default = "default_divider_width")]
    pub divider_width: u32,
    #[serde(default = "default_split_ratio")]
    pub split_ratio: f32,
    /// Fraction of the display taken by the first cascade rect.
    #[serde(default = "default_cascade_ratio")]
    pub cascade_ratio: f32,
    #[serde(default = "default_min_split_width")]
    pub min_split_width: u32,
    #[serde(default = "default_min_split_height")]
    pub min_split_height: u32,
    #[serde(default)]
    pub tile: TileSettings,
}

fn default_max_floating_size() -> u32 { 2560 }
fn default_min_floating_width() -> u32 { 320 }
fn default_min_floating_height() -> u32 { 240 }
fn default_title_bar_height() -> u32 { 37 }
fn default_frame_width() -> u32 { 5 }
fn default_divider_width() -> u32 { 8 }
fn default_split_ratio() -> f32 { 0.5 }
fn default_cascade_ratio() -> f32 { 0.75 }
fn default_min_split_width() -> u32 { 320 }
fn default_min_split_height() -> u32 { 240 }

impl Default for LayoutSettings {
    fn default() -> Self {
        Self {
            max_floating_size: default_max_floating_size(),
            min_floating_width: default_min_floating_width(),
            min_floating_height: default_min_floating_height(),
            title_bar_height: default_title_bar_height(),
            frame_width: default_frame_width(),
            divider_width: default_divider_width(),
            split_ratio: default_split_ratio(),
            cascade_ratio: default_cascade_ratio(),
            min_split_width: default_min_split_width(),
            min_split_height: default_min_split_height(),
            tile: TileSettings::default(),
        }
    }
}

impl LayoutSettings {
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if !(0.1..=0.9).contains(&self.split_ratio) {
            issues.push(format!(
                "split_ratio must be between 0.1 and 0.9, got {}",
                self.split_ratio
            ));
        }
        if !(0.1..=1.0).contains(&self.cascade_ratio) {
            issues.push(format!(
                "cascade_ratio must be between 0.1 and 1.0, got {}",
                self.cascade_ratio
            ));
        }
        if self.min_floating_width > self.max_floating_size
            || self.min_floating_height > self.max_floating_size
        {
            issues.push("minimum floating size exceeds max_floating_size".to_string());
        }
        if self.divider_width == 0 {
            issues.push("divider_width must be at least 1".to_string());
        }
        issues.extend(self.tile.validate());
        issues
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct TileSettings {
    /// Gap between the display edge and the outermost tile.
    #[serde(default = "default_edge_interval")]
    pub edge_interval: u32,
    /// Gap between two neighbouring tiles.
    #[serde(default = "default_mid_interval")]
    pub mid_interval: u32,
}

fn default_edge_interval() -> u32 { 48 }
fn default_mid_interval() -> u32 { 24 }

impl Default for TileSettings {
    fn default() -> Self {
        Self {
            edge_interval: default_edge_interval(),
            mid_interval: default_mid_interval(),
        }
    }
}

impl TileSettings {
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.mid_interval > self.edge_interval * 4 {
            issues.push(format!(
                "tile.mid_interval ({}) is unreasonably large compared to edge_interval ({})",
                self.mid_interval, self.edge_interval
            ));
        }
        issues
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct DisplaySettings {
    #[serde(default = "default_display_width")]
    pub width: u32,
    #[serde(default = "default_display_height")]
    pub height: u32,
    #[serde(default = "default_virtual_pixel_ratio")]
    pub virtual_pixel_ratio: f32,
}

fn default_display_width() -> u32 { 1080 }
fn default_display_height() -> u32 { 2340 }
fn default_virtual_pixel_ratio() -> f32 { 1.0 }

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            width: default_display_width(),
            height: default_display_height(),
            virtual_pixel_ratio: default_virtual_pixel_ratio(),
        }
    }
}

impl DisplaySettings {
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.width == 0 || self.height == 0 {
            issues.push("display width and height must be non-zero".to_string());
        }
        if !(self.virtual_pixel_ratio > 0.0 && self.virtual_pixel_ratio <= MAX_VIRTUAL_PIXEL_RATIO)
        {
            issues.push(format!(
                "virtual_pixel_ratio must be in (0, {}], got {}",
                MAX_VIRTUAL_PIXEL_RATIO, self.virtual_pixel_ratio
            ));
        }
        issues
    }
}

impl Default for Config {
    fn default() -> Config {
        match Self::parse(include_str!("../../wmserver.default.toml")) {
            Ok(config) => config,
            Err(_) => Config {
                settings: Settings::default(),
                layout: LayoutSettings::default(),
                display: DisplaySettings::default(),
            },
        }
    }
}

impl Config {
    pub fn read(path: &Path) -> anyhow::Result<Config> {
        let buf = std::fs::read_to_string(path)?;
        Self::parse(&buf)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let toml_string = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, toml_string.as_bytes())?;
        Ok(())
    }

    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        issues.extend(self.settings.validate());
        issues.extend(self.layout.validate());
        issues.extend(self.display.validate());
        issues
    }

    fn parse(buf: &str) -> anyhow::Result<Config> {
        match toml::from_str::<Config>(buf) {
            Ok(config) => Ok(config),
            Err(e) => bail!("{e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_empty(), "{:?}", config.validate());
        assert_eq!(config.layout.max_floating_size, 2560);
        assert_eq!(config.settings.snapshot_timeout_ms, 2000);
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let cfg = Config::parse(
            r#"
            [settings]
            layout_mode = "tile"

            [layout.tile]
            edge_interval = 16
            "#,
        )
        .unwrap();
        assert_eq!(cfg.settings.layout_mode, WindowLayoutMode::Tile);
        assert_eq!(cfg.layout.tile.edge_interval, 16);
        assert_eq!(cfg.layout.tile.mid_interval, 24);
        assert_eq!(cfg.layout.cascade_ratio, 0.75);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = Config::parse("[settings]\nlayout = 3\n").unwrap_err();
        assert!(err.to_string().contains("unknown field"));
    }

    #[test]
    fn validation_reports_bad_ratios() {
        let mut cfg = Config::default();
        cfg.layout.split_ratio = 0.95;
        cfg.display.virtual_pixel_ratio = 0.0;
        let issues = cfg.validate();
        assert!(issues.iter().any(|i| i.contains("split_ratio")));
        assert!(issues.iter().any(|i| i.contains("virtual_pixel_ratio")));
    }

    #[test]
    fn read_and_save_round_trip_through_a_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[display]\nwidth = 1280\nheight = 800").unwrap();
        let cfg = Config::read(file.path()).unwrap();
        assert_eq!(cfg.display.width, 1280);

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested").join("config.toml");
        cfg.save(&out).unwrap();
        assert_eq!(Config::read(&out).unwrap(), cfg);
    }

    #[test]
    fn window_animation_follows_sentinel_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut settings = Settings::default();
        settings.window_animation_sentinel = file.path().to_path_buf();
        assert!(settings.window_animation_enabled());
        settings.window_animation_sentinel = PathBuf::from("/nonexistent/wmserver/sentinel");
        assert!(!settings.window_animation_enabled());
    }
}
