//! Projects sparse TV zone colors onto a dense physical LED array.
//!
//! Each [`StripSpec`] claims a contiguous run of LED indices and pulls its
//! colors from one side of the TV. Gradient strips on the same side share one
//! interpolated gradient sized to the tallest of them; shorter strips are
//! aligned to its bottom end. Solid strips copy a single configured zone.

use serde::{Deserialize, Serialize};
use shared::{
    domain::{LedColor, LedFrame, Rgb, Side, ZoneSnapshot},
    error::InvalidInput,
};
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RenderMode {
    Gradient,
    Solid { zone: usize },
}

/// One physical strip. `start` may be greater than `end`, in which case the
/// strip runs in descending index order; position 0 is always `start`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StripSpec {
    pub name: String,
    pub start: usize,
    pub end: usize,
    pub side: Side,
    #[serde(flatten)]
    pub mode: RenderMode,
}

impl StripSpec {
    pub fn gradient(name: impl Into<String>, start: usize, end: usize, side: Side) -> Self {
        Self {
            name: name.into(),
            start,
            end,
            side,
            mode: RenderMode::Gradient,
        }
    }

    pub fn solid(
        name: impl Into<String>,
        start: usize,
        end: usize,
        side: Side,
        zone: usize,
    ) -> Self {
        Self {
            name: name.into(),
            start,
            end,
            side,
            mode: RenderMode::Solid { zone },
        }
    }

    pub fn len(&self) -> usize {
        self.start.abs_diff(self.end) + 1
    }

    pub fn max_index(&self) -> usize {
        self.start.max(self.end)
    }

    /// LED index at `position` steps from the strip's physical start.
    pub fn index_at(&self, position: usize) -> usize {
        if self.end >= self.start {
            self.start + position
        } else {
            self.start - position
        }
    }

    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.len()).map(move |position| self.index_at(position))
    }
}

/// Most LEDs one realtime packet can address (DRGB; DRGBW fits fewer).
pub const MAX_LED_COUNT: usize = 490;

/// Validated, non-overlapping strip layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedTopology {
    strips: Vec<StripSpec>,
    led_count: usize,
}

impl LedTopology {
    pub fn new(strips: Vec<StripSpec>) -> Result<Self, InvalidInput> {
        let widest = strips
            .iter()
            .max_by_key(|strip| strip.max_index())
            .ok_or(InvalidInput::EmptyTopology)?;
        if widest.max_index() >= MAX_LED_COUNT {
            return Err(InvalidInput::TooManyLeds {
                strip: widest.name.clone(),
                index: widest.max_index(),
                max: MAX_LED_COUNT,
            });
        }
        let led_count = widest.max_index() + 1;

        let mut claimed = vec![false; led_count];
        for strip in &strips {
            for index in strip.indices() {
                if claimed[index] {
                    return Err(InvalidInput::OverlappingStrip {
                        strip: strip.name.clone(),
                        index,
                    });
                }
                claimed[index] = true;
            }
        }

        Ok(Self { strips, led_count })
    }

    pub fn strips(&self) -> &[StripSpec] {
        &self.strips
    }

    /// Highest claimed index plus one.
    pub fn led_count(&self) -> usize {
        self.led_count
    }

    fn gradient_strips(&self, side: Side) -> impl Iterator<Item = &StripSpec> + '_ {
        self.strips
            .iter()
            .filter(move |strip| strip.side == side && strip.mode == RenderMode::Gradient)
    }
}

/// Resamples `source` into `target` colors by linear interpolation.
///
/// Sample `i` reads source position `i / target * (len - 1)`. When the lengths
/// already match the source is copied through without interpolation.
pub fn resample(source: &[Rgb], target: usize, brightness: f64, white: u8) -> Vec<LedColor> {
    if source.is_empty() {
        return Vec::new();
    }
    if source.len() == target {
        return source
            .iter()
            .map(|color| LedColor::scaled(*color, brightness, white))
            .collect();
    }

    let last = source.len() - 1;
    (0..target)
        .map(|i| {
            let position = (i as f64 / target as f64) * last as f64;
            let index = position.floor() as usize;
            let fraction = position - index as f64;
            if index < last {
                LedColor::lerp(source[index], source[index + 1], fraction, brightness, white)
            } else {
                LedColor::scaled(source[last], brightness, white)
            }
        })
        .collect()
}

/// Gradient index for `position` on a strip of `strip_len` LEDs sharing a
/// gradient of `tallest_len` samples, aligned so both strips end together.
/// A one-LED strip always takes the last sample.
pub fn bottom_aligned_index(strip_len: usize, tallest_len: usize, position: usize) -> usize {
    let last = tallest_len.saturating_sub(1);
    if strip_len <= 1 {
        return last;
    }

    let l = strip_len as f64;
    let t = tallest_len as f64;
    let steps_from_end = strip_len.saturating_sub(1 + position) as f64;
    let raw = steps_from_end * (l / t) * (t - 1.0) / (l - 1.0);
    (raw.floor().max(0.0) as usize).min(last)
}

#[derive(Debug, Clone)]
pub struct ColorMapper {
    topology: LedTopology,
    brightness: f64,
    white: u8,
}

impl ColorMapper {
    pub fn new(topology: LedTopology, brightness: f64, white: u8) -> Result<Self, InvalidInput> {
        if !(0.0..=1.0).contains(&brightness) {
            return Err(InvalidInput::Brightness(brightness));
        }
        Ok(Self {
            topology,
            brightness,
            white,
        })
    }

    pub fn topology(&self) -> &LedTopology {
        &self.topology
    }

    pub fn brightness(&self) -> f64 {
        self.brightness
    }

    pub fn white(&self) -> u8 {
        self.white
    }

    /// Maps `zones` onto a fresh all-off frame.
    pub fn map(&self, zones: &ZoneSnapshot) -> Result<LedFrame, InvalidInput> {
        let mut frame = LedFrame::off(self.topology.led_count);
        self.map_into(zones, &mut frame)?;
        Ok(frame)
    }

    /// Overwrites the LEDs owned by a strip; every other index keeps its value.
    /// Nothing is written unless the whole snapshot maps cleanly.
    pub fn map_into(&self, zones: &ZoneSnapshot, frame: &mut LedFrame) -> Result<(), InvalidInput> {
        if frame.len() < self.topology.led_count {
            return Err(InvalidInput::FrameTooShort {
                expected: self.topology.led_count,
                actual: frame.len(),
            });
        }

        let mut writes = Vec::with_capacity(self.topology.led_count);
        for side in Side::ALL {
            self.render_gradient_side(side, zones, &mut writes)?;
        }
        for strip in &self.topology.strips {
            if let RenderMode::Solid { zone } = strip.mode {
                let color = self.solid_color(strip, zone, zones)?;
                writes.extend(strip.indices().map(|index| (index, color)));
            }
        }

        trace!(leds = writes.len(), "mapping: frame rendered");
        let pixels = frame.pixels_mut();
        for (index, color) in writes {
            pixels[index] = color;
        }
        Ok(())
    }

    fn render_gradient_side(
        &self,
        side: Side,
        zones: &ZoneSnapshot,
        writes: &mut Vec<(usize, LedColor)>,
    ) -> Result<(), InvalidInput> {
        let mut tallest: Option<&StripSpec> = None;
        for strip in self.topology.gradient_strips(side) {
            if tallest.map_or(true, |current| strip.len() > current.len()) {
                tallest = Some(strip);
            }
        }
        let Some(tallest) = tallest else {
            return Ok(());
        };

        let source = zones.side(side);
        if source.is_empty() {
            return Err(InvalidInput::MissingZones {
                strip: tallest.name.clone(),
                side,
            });
        }

        let tallest_len = tallest.len();
        let gradient = resample(source, tallest_len, self.brightness, self.white);

        for strip in self.topology.gradient_strips(side) {
            if std::ptr::eq(strip, tallest) {
                // Gradient runs bottom-up, the strip top-down.
                writes.extend(
                    strip
                        .indices()
                        .enumerate()
                        .map(|(position, index)| (index, gradient[tallest_len - 1 - position])),
                );
            } else {
                let strip_len = strip.len();
                writes.extend(strip.indices().enumerate().map(|(position, index)| {
                    let sample = bottom_aligned_index(strip_len, tallest_len, position);
                    (index, gradient[sample])
                }));
            }
        }
        Ok(())
    }

    fn solid_color(
        &self,
        strip: &StripSpec,
        zone: usize,
        zones: &ZoneSnapshot,
    ) -> Result<LedColor, InvalidInput> {
        let source = zones.side(strip.side);
        let color = source
            .get(zone)
            .ok_or_else(|| InvalidInput::ZoneOutOfRange {
                strip: strip.name.clone(),
                side: strip.side,
                zone,
                available: source.len(),
            })?;
        Ok(LedColor::scaled(*color, self.brightness, self.white))
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
