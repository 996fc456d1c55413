use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Zone color as sampled by the TV.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Self = Self::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// Output color for one physical LED. RGB-only wire protocols drop `w`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct LedColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub w: u8,
}

impl LedColor {
    pub const OFF: Self = Self::new(0, 0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8, w: u8) -> Self {
        Self { r, g, b, w }
    }

    /// Scales every RGB channel by `brightness`; `white` is used as-is.
    pub fn scaled(color: Rgb, brightness: f64, white: u8) -> Self {
        Self {
            r: scale_channel(f64::from(color.r), brightness),
            g: scale_channel(f64::from(color.g), brightness),
            b: scale_channel(f64::from(color.b), brightness),
            w: white,
        }
    }

    /// Linear blend from `from` toward `to`, scaled afterwards.
    pub fn lerp(from: Rgb, to: Rgb, fraction: f64, brightness: f64, white: u8) -> Self {
        let mix = |a: u8, b: u8| {
            let a = f64::from(a);
            a + (f64::from(b) - a) * fraction
        };
        Self {
            r: scale_channel(mix(from.r, to.r), brightness),
            g: scale_channel(mix(from.g, to.g), brightness),
            b: scale_channel(mix(from.b, to.b), brightness),
            w: white,
        }
    }
}

/// Rounds `value * brightness` to the nearest integer and clamps it into `0..=255`.
pub fn scale_channel(value: f64, brightness: f64) -> u8 {
    let scaled = (value * brightness).round();
    if scaled.is_nan() {
        return 0;
    }
    scaled.clamp(0.0, 255.0) as u8
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Top,
    Right,
    Bottom,
}

impl Side {
    pub const ALL: [Side; 4] = [Side::Left, Side::Top, Side::Right, Side::Bottom];

    pub fn as_str(self) -> &'static str {
        match self {
            Side::Left => "left",
            Side::Top => "top",
            Side::Right => "right",
            Side::Bottom => "bottom",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Zone counts per side, as reported by the TV once per connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SourceTopology {
    #[serde(default)]
    pub left: usize,
    #[serde(default)]
    pub top: usize,
    #[serde(default)]
    pub right: usize,
    #[serde(default)]
    pub bottom: usize,
}

impl SourceTopology {
    pub fn count(&self, side: Side) -> usize {
        match side {
            Side::Left => self.left,
            Side::Top => self.top,
            Side::Right => self.right,
            Side::Bottom => self.bottom,
        }
    }

    pub fn total(&self) -> usize {
        Side::ALL.iter().map(|side| self.count(*side)).sum()
    }
}

/// Point-in-time zone colors grouped by side. Index `i` of a side always refers
/// to the same physical zone.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ZoneSnapshot {
    #[serde(default)]
    pub left: Vec<Rgb>,
    #[serde(default)]
    pub top: Vec<Rgb>,
    #[serde(default)]
    pub right: Vec<Rgb>,
    #[serde(default)]
    pub bottom: Vec<Rgb>,
}

impl ZoneSnapshot {
    pub fn side(&self, side: Side) -> &[Rgb] {
        match side {
            Side::Left => &self.left,
            Side::Top => &self.top,
            Side::Right => &self.right,
            Side::Bottom => &self.bottom,
        }
    }

    pub fn side_mut(&mut self, side: Side) -> &mut Vec<Rgb> {
        match side {
            Side::Left => &mut self.left,
            Side::Top => &mut self.top,
            Side::Right => &mut self.right,
            Side::Bottom => &mut self.bottom,
        }
    }

    /// All zones flattened in left, top, right, bottom order.
    pub fn zones(&self) -> impl Iterator<Item = &Rgb> + '_ {
        Side::ALL.into_iter().flat_map(|side| self.side(side).iter())
    }

    pub fn zone_count(&self) -> usize {
        Side::ALL.iter().map(|side| self.side(*side).len()).sum()
    }

    /// Per-channel arithmetic mean over every zone, rounded half up. Black when empty.
    pub fn average(&self) -> Rgb {
        let (mut r, mut g, mut b, mut n) = (0u64, 0u64, 0u64, 0u64);
        for zone in self.zones() {
            r += u64::from(zone.r);
            g += u64::from(zone.g);
            b += u64::from(zone.b);
            n += 1;
        }
        if n == 0 {
            return Rgb::BLACK;
        }
        let mean = |sum: u64| ((sum * 2 + n) / (n * 2)) as u8;
        Rgb::new(mean(r), mean(g), mean(b))
    }
}

/// Dense per-LED output, indexed by physical LED position.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LedFrame(Vec<LedColor>);

impl LedFrame {
    pub fn off(len: usize) -> Self {
        Self::filled(len, LedColor::OFF)
    }

    pub fn filled(len: usize, color: LedColor) -> Self {
        Self(vec![color; len])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<LedColor> {
        self.0.get(index).copied()
    }

    pub fn pixels(&self) -> &[LedColor] {
        &self.0
    }

    pub fn pixels_mut(&mut self) -> &mut [LedColor] {
        &mut self.0
    }

    pub fn into_inner(self) -> Vec<LedColor> {
        self.0
    }
}

impl From<Vec<LedColor>> for LedFrame {
    fn from(value: Vec<LedColor>) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// One mean color for the whole strip.
    #[default]
    Average,
    /// Zone colors projected through the LED topology.
    Direct,
}

impl SyncMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SyncMode::Average => "average",
            SyncMode::Direct => "direct",
        }
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        if value.eq_ignore_ascii_case("average") {
            Ok(SyncMode::Average)
        } else if value.eq_ignore_ascii_case("direct") {
            Ok(SyncMode::Direct)
        } else {
            Err(format!(
                "unknown sync mode '{value}', expected 'average' or 'direct'"
            ))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "mode", rename_all = "snake_case")]
pub enum SyncState {
    #[default]
    Stopped,
    Running(SyncMode),
}

impl SyncState {
    pub fn is_running(self) -> bool {
        matches!(self, SyncState::Running(_))
    }

    pub fn mode(self) -> Option<SyncMode> {
        match self {
            SyncState::Stopped => None,
            SyncState::Running(mode) => Some(mode),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SyncStats {
    pub update_count: u64,
    pub errors: u64,
    pub average_latency_ms: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update: Option<DateTime<Utc>>,
}

impl SyncStats {
    /// Counts a delivered frame and folds `latency_ms` into the running mean.
    pub fn record_update(&mut self, latency_ms: f64, at: DateTime<Utc>) {
        self.update_count += 1;
        let n = self.update_count as f64;
        self.average_latency_ms = (self.average_latency_ms * (n - 1.0) + latency_ms) / n;
        self.last_update = Some(at);
    }

    pub fn record_error(&mut self) {
        self.errors += 1;
    }
}

#[cfg(test)]
#[path = "tests/domain_tests.rs"]
mod tests;
