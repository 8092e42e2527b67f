//! Display-side mapping: temperatures to colours, cells to rectangles,
//! surface coordinates back to cells, slider levels to heat constants.
//!
//! Nothing here touches simulation state. A renderer reads
//! [`Grid::snapshot_temperatures`](crate::Grid::snapshot_temperatures) on
//! its own timer and feeds the values through a [`ColorRamp`].

use crate::cell::{Cell, validate_heat_constant};
use crate::error::{HotplateError, Result};

/// Renderer sampling cadence used by the CLI.
pub const DEFAULT_SAMPLE_INTERVAL_MS: u64 = 20;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// Linear two-colour gradient over a fixed temperature range.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColorRamp {
    pub cold: Rgb,
    pub hot: Rgb,
    pub min: f64,
    pub max: f64,
}

impl Default for ColorRamp {
    /// Blue at 0 degrees to red at 1000 degrees.
    fn default() -> Self {
        Self {
            cold: Rgb::new(0, 0, 255),
            hot: Rgb::new(255, 0, 0),
            min: 0.0,
            max: 1000.0,
        }
    }
}

impl ColorRamp {
    pub fn new(cold: Rgb, hot: Rgb, min: f64, max: f64) -> Result<Self> {
        if !(min.is_finite() && max.is_finite() && min < max) {
            return Err(HotplateError::invalid(
                "color_range",
                format!("need finite min < max, got [{min}, {max}]"),
            ));
        }
        Ok(Self { cold, hot, min, max })
    }

    /// Colour for `temperature`. Values outside the range take the end
    /// colour; NaN renders cold.
    pub fn color_for(&self, temperature: f64) -> Rgb {
        let t = ((temperature - self.min) / (self.max - self.min)).clamp(0.0, 1.0);
        let t = if t.is_nan() { 0.0 } else { t };
        let lerp = |a: u8, b: u8| -> u8 {
            (f64::from(a) + (f64::from(b) - f64::from(a)) * t).round() as u8
        };
        Rgb {
            r: lerp(self.cold.r, self.hot.r),
            g: lerp(self.cold.g, self.hot.g),
            b: lerp(self.cold.b, self.hot.b),
        }
    }
}

/// Screen rectangle in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Where `cell` is drawn: columns run along x, rows along y.
pub fn cell_rect(cell: &Cell) -> Rect {
    let (row, col) = cell.position();
    let size = cell.render_size();
    Rect {
        x: col as u32 * size,
        y: row as u32 * size,
        width: size,
        height: size,
    }
}

/// Translate a pointer position on a `width` x `height` surface into the
/// grid cell underneath it. `None` when the pointer is off the surface.
pub fn surface_to_cell(
    x: i32,
    y: i32,
    width: u32,
    height: u32,
    rows: usize,
    cols: usize,
) -> Option<(usize, usize)> {
    if x < 0 || y < 0 || width == 0 || height == 0 {
        return None;
    }
    let (x, y) = (x as u64, y as u64);
    if x >= u64::from(width) || y >= u64::from(height) {
        return None;
    }
    let row = (y * rows as u64 / u64::from(height)) as usize;
    let col = (x * cols as u64 / u64::from(width)) as usize;
    Some((row, col))
}

/// Heat constant selected by a 1..=10 slider, in tenths.
pub fn heat_constant_from_level(level: u8) -> Result<f64> {
    if !(1..=10).contains(&level) {
        return Err(HotplateError::invalid(
            "heat_level",
            format!("slider level must be in 1..=10, got {level}"),
        ));
    }
    validate_heat_constant(f64::from(level) / 10.0)
}
