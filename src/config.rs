// =============================================================================
// CONFIGURATION - Load settings from config.toml
// =============================================================================
//
// This module handles loading and parsing configuration from config.toml.
// Provides sensible defaults if config file is missing or has errors.

use anyhow::{Context, Result};
use ash::vk;
use serde::Deserialize;
use std::path::Path;

use crate::backend::device::{DeviceRequirements, DeviceSelection};
use crate::renderer::RenderTarget;

/// Root configuration structure
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub window: WindowConfig,
    pub graphics: GraphicsConfig,
    pub debug: DebugConfig,
}

/// Window settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub fullscreen: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Vortex Renderer".to_string(),
            width: 1280,
            height: 720,
            fullscreen: false,
        }
    }
}

/// Graphics settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GraphicsConfig {
    pub present_mode: String,
    pub clear_color: [f32; 4],
    pub frames_in_flight: usize,
    pub render_target: RenderTarget,
    pub device_selection: DeviceSelection,
    pub ray_tracing: bool,
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            present_mode: "mailbox".to_string(),
            clear_color: [0.1, 0.2, 0.8, 1.0],
            frames_in_flight: 3,
            render_target: RenderTarget::Direct,
            device_selection: DeviceSelection::MostMemory,
            ray_tracing: false,
        }
    }
}

/// Debug settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    pub validation_layers: bool,
    pub show_fps: bool,
    /// env_logger filter used when RUST_LOG is unset
    pub log_level: String,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            validation_layers: cfg!(debug_assertions),
            show_fps: true,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file, falling back to defaults if not found
    pub fn load() -> Self {
        Self::load_from_path("config.toml").unwrap_or_else(|e| {
            log::warn!("Failed to load config.toml: {:#}. Using defaults.", e);
            Config::default()
        })
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config = Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        log::info!("Loaded configuration from {:?}", path);
        log::debug!("Config: {:?}", config);

        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Present modes to try, best first. FIFO is the implicit last resort.
    pub fn present_mode_preference(&self) -> Vec<vk::PresentModeKHR> {
        match self.graphics.present_mode.to_lowercase().as_str() {
            "immediate" => vec![vk::PresentModeKHR::IMMEDIATE, vk::PresentModeKHR::MAILBOX],
            "mailbox" => vec![vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::IMMEDIATE],
            "fifo" => vec![vk::PresentModeKHR::FIFO],
            "fifo_relaxed" => vec![vk::PresentModeKHR::FIFO_RELAXED],
            _ => {
                log::warn!(
                    "Unknown present mode '{}', defaulting to MAILBOX",
                    self.graphics.present_mode
                );
                vec![vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::IMMEDIATE]
            }
        }
    }

    pub fn frames_in_flight(&self) -> usize {
        if self.graphics.frames_in_flight == 0 {
            log::warn!("frames_in_flight must be at least 1, using 1");
            return 1;
        }
        self.graphics.frames_in_flight
    }

    pub fn device_requirements(&self) -> DeviceRequirements {
        DeviceRequirements {
            selection: self.graphics.device_selection,
            ray_tracing: self.graphics.ray_tracing,
        }
    }
}
