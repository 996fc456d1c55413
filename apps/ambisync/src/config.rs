use std::{
    env, fs,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use anyhow::Context;
use color_mapping::{ColorMapper, LedTopology, StripSpec};
use serde::Deserialize;
use shared::domain::{Side, SyncMode};
use sync_core::SyncConfig;
use wled_integration::{WledProtocol, DEFAULT_PORT, DEFAULT_TIMEOUT_MULTIPLIER};

pub const DEFAULT_CONFIG_FILE: &str = "ambisync.toml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub tv_ip: String,
    pub api_version: u32,
    pub wled_host: String,
    pub wled_port: u16,
    pub poll_interval_ms: u64,
    pub sync_mode: SyncMode,
    pub brightness: f64,
    pub white: u8,
    pub protocol: WledProtocol,
    pub timeout_multiplier: u8,
    /// Repeat the average color once per LED instead of sending one pixel.
    pub average_fill: bool,
    pub stats_interval_secs: u64,
    pub strips: Vec<StripSpec>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tv_ip: "192.168.2.11".into(),
            api_version: 6,
            wled_host: "192.168.2.2".into(),
            wled_port: DEFAULT_PORT,
            poll_interval_ms: 100,
            sync_mode: SyncMode::Average,
            brightness: 0.4,
            white: 50,
            protocol: WledProtocol::Drgbw,
            timeout_multiplier: DEFAULT_TIMEOUT_MULTIPLIER,
            average_fill: false,
            stats_interval_secs: 10,
            strips: default_strips(),
        }
    }
}

impl Settings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.stats_interval_secs.max(1))
    }

    pub fn sync_config(&self) -> anyhow::Result<SyncConfig> {
        let topology = LedTopology::new(self.strips.clone()).context("invalid strip layout")?;
        if topology.led_count() > self.protocol.max_leds() {
            anyhow::bail!(
                "strip layout spans {} LEDs but {} packets carry at most {}",
                topology.led_count(),
                self.protocol,
                self.protocol.max_leds()
            );
        }
        let mapper = ColorMapper::new(topology, self.brightness, self.white)
            .context("invalid color settings")?;
        Ok(SyncConfig {
            poll_interval: self.poll_interval(),
            mapper,
            protocol: self.protocol,
            timeout_multiplier: self.timeout_multiplier,
            average_fill: self.average_fill,
        })
    }
}

/// Three gradient strips down the left edge and three solid strips on the
/// right, 141 LEDs in total.
pub fn default_strips() -> Vec<StripSpec> {
    vec![
        StripSpec::gradient("left-outer", 0, 21, Side::Left),
        StripSpec::gradient("left-middle", 57, 22, Side::Left),
        StripSpec::gradient("left-inner", 58, 84, Side::Left),
        StripSpec::solid("right-inner", 103, 85, Side::Top, 5),
        StripSpec::solid("right-middle", 104, 128, Side::Top, 6),
        StripSpec::solid("right-outer", 140, 129, Side::Right, 0),
    ]
}

/// Defaults, then the TOML file, then environment variables.
///
/// An explicit `path` must exist; otherwise `ambisync.toml` in the working
/// directory is read when present.
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<Settings> {
    let mut settings = match path {
        Some(path) => read_settings_file(path)?,
        None => {
            let fallback = PathBuf::from(DEFAULT_CONFIG_FILE);
            if fallback.exists() {
                read_settings_file(&fallback)?
            } else {
                Settings::default()
            }
        }
    };
    apply_env(&mut settings, |key| env::var(key).ok())?;
    Ok(settings)
}

fn read_settings_file(path: &Path) -> anyhow::Result<Settings> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file '{}'", path.display()))?;
    parse_settings(&raw).with_context(|| format!("invalid config file '{}'", path.display()))
}

pub fn parse_settings(raw: &str) -> anyhow::Result<Settings> {
    Ok(toml::from_str(raw)?)
}

pub fn apply_env(
    settings: &mut Settings,
    lookup: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<()> {
    if let Some(v) = lookup("TV_IP") {
        settings.tv_ip = v;
    }
    if let Some(v) = lookup("API_VERSION") {
        settings.api_version = parse_var("API_VERSION", &v)?;
    }
    if let Some(v) = lookup("WLED_HOST") {
        settings.wled_host = v;
    }
    if let Some(v) = lookup("WLED_PORT") {
        settings.wled_port = parse_var("WLED_PORT", &v)?;
    }
    if let Some(v) = lookup("POLL_INTERVAL") {
        settings.poll_interval_ms = parse_var("POLL_INTERVAL", &v)?;
    }
    if let Some(v) = lookup("SYNC_MODE") {
        settings.sync_mode = parse_var("SYNC_MODE", &v)?;
    }
    if let Some(v) = lookup("BRIGHTNESS") {
        settings.brightness = parse_var("BRIGHTNESS", &v)?;
    }
    if let Some(v) = lookup("WHITE_LEVEL") {
        settings.white = parse_var("WHITE_LEVEL", &v)?;
    }
    if let Some(v) = lookup("WLED_PROTOCOL") {
        settings.protocol = parse_var("WLED_PROTOCOL", &v)?;
    }
    if let Some(v) = lookup("AVERAGE_FILL") {
        settings.average_fill = parse_var("AVERAGE_FILL", &v)?;
    }
    Ok(())
}

fn parse_var<T>(key: &str, value: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|err| anyhow::anyhow!("invalid {key}='{value}': {err}"))
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
