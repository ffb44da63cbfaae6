//! Simple configuration persistence for LayerAudio
//!
//! Stores the export defaults a new session starts from.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use layer_audio::{ExportFormat, SurroundLayout};

/// Application configuration
#[derive(Debug, Default)]
pub struct Config {
    /// Default export format
    pub format: Option<ExportFormat>,
    /// Default bitrate in kbit/s
    pub bitrate: Option<u32>,
    /// Default pan-expression complexity ("craziness")
    pub complexity: Option<usize>,
    /// Default surround layout
    pub layout: Option<SurroundLayout>,
}

impl Config {
    /// Load config from the default location
    ///
    /// Returns default config if the file doesn't exist or can't be
    /// parsed.
    pub fn load() -> Self {
        let path = Self::config_path();
        Self::load_from(&path).unwrap_or_default()
    }

    /// Load config from a specific path
    pub fn load_from(path: &Path) -> io::Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(Self::parse(&content))
    }

    /// Save config to the default location
    pub fn save(&self) -> io::Result<()> {
        let path = Self::config_path();
        self.save_to(&path)
    }

    /// Save config to a specific path
    pub fn save_to(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(path, self.serialize())
    }

    /// Get the default config file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("layeraudio")
            .join("config.txt")
    }

    /// Parse config from simple key=value format
    fn parse(content: &str) -> Self {
        let mut config = Self::default();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some((key, value)) = line.split_once('=') {
                let key = key.trim();
                let value = value.trim();

                match key {
                    "format" => config.format = value.parse().ok(),
                    "bitrate" => config.bitrate = value.parse().ok(),
                    "complexity" => config.complexity = value.parse().ok(),
                    "layout" => config.layout = value.parse().ok(),
                    _ => {} // Ignore unknown keys
                }
            }
        }

        config
    }

    /// Serialize config to simple key=value format
    fn serialize(&self) -> String {
        let mut lines = Vec::new();
        lines.push("# LayerAudio Configuration".to_string());

        if let Some(format) = self.format {
            lines.push(format!("format={}", format));
        }
        if let Some(bitrate) = self.bitrate {
            lines.push(format!("bitrate={}", bitrate));
        }
        if let Some(complexity) = self.complexity {
            lines.push(format!("complexity={}", complexity));
        }
        if let Some(layout) = self.layout {
            lines.push(format!("layout={}", layout));
        }

        lines.join("\n")
    }
}
