//! A single hotplate cell and its update loop.
//!
//! A cell owns one scalar temperature and a heat constant. Both live behind
//! a per-cell mutex so that the cell's own loop, heat injection from a
//! controller and reads from a renderer serialize instead of tearing.
//! Neighbour references are plain `Arc`s to the neighbours' guarded state;
//! they are fixed once wiring is done and read without any grid-wide lock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use tracing::error;

use crate::error::{HotplateError, Result};

/// Sleep between two steps of a cell's update loop.
pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_millis(200);

/// Reject heat constants outside `(0.0, 1.0]`. NaN is rejected too.
pub fn validate_heat_constant(value: f64) -> Result<f64> {
    if value > 0.0 && value <= 1.0 {
        Ok(value)
    } else {
        Err(HotplateError::invalid(
            "heat_constant",
            format!("must be in (0.0, 1.0], got {value}"),
        ))
    }
}

#[derive(Clone, Copy, Debug)]
struct Thermal {
    temperature: f64,
    heat_constant: f64,
}

impl Thermal {
    // One relaxation step toward `target`. Shared by `step` and `apply_heat`.
    fn relax_toward(&mut self, target: f64) -> f64 {
        self.temperature += (target - self.temperature) * self.heat_constant;
        self.temperature
    }
}

/// The mutable part of a cell, shared with every cell that lists it as a
/// neighbour.
#[derive(Debug)]
pub(crate) struct ThermalState {
    inner: Mutex<Thermal>,
}

impl ThermalState {
    fn new(temperature: f64, heat_constant: f64) -> Self {
        Self {
            inner: Mutex::new(Thermal {
                temperature,
                heat_constant,
            }),
        }
    }

    // The guarded data is two plain floats, so a panic elsewhere cannot leave
    // it half-written; a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, Thermal> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn temperature(&self) -> f64 {
        self.lock().temperature
    }
}

/// One independently updating unit of the hotplate.
#[derive(Debug)]
pub struct Cell {
    state: Arc<ThermalState>,
    neighbors: Vec<Arc<ThermalState>>,
    stop_requested: AtomicBool,
    row: usize,
    col: usize,
    render_size: u32,
}

impl Cell {
    /// Create an unplaced cell with no neighbours.
    pub fn new(initial_temperature: f64, heat_constant: f64) -> Result<Cell> {
        Self::with_position(initial_temperature, heat_constant, 0, 0, 0)
    }

    /// Create a cell that knows where it sits on the display.
    ///
    /// `row`, `col` and `render_size` only feed the renderer; they play no
    /// part in the update rule.
    pub fn with_position(
        initial_temperature: f64,
        heat_constant: f64,
        row: usize,
        col: usize,
        render_size: u32,
    ) -> Result<Cell> {
        let heat_constant = validate_heat_constant(heat_constant)?;
        Ok(Cell {
            state: Arc::new(ThermalState::new(initial_temperature, heat_constant)),
            neighbors: Vec::new(),
            stop_requested: AtomicBool::new(false),
            row,
            col,
            render_size,
        })
    }

    /// Append `other` to this cell's neighbours.
    ///
    /// Links are one-directional and duplicates are kept: adding the same
    /// neighbour twice doubles its weight in the average.
    pub fn add_neighbor(&mut self, other: &Cell) {
        self.neighbors.push(Arc::clone(&other.state));
    }

    pub fn neighbor_count(&self) -> usize {
        self.neighbors.len()
    }

    /// Current temperature. Never observes a half-written value.
    pub fn temperature(&self) -> f64 {
        self.state.temperature()
    }

    /// Overwrite the temperature outright, bypassing the heat constant.
    pub fn set_temperature(&self, temperature: f64) {
        self.state.lock().temperature = temperature;
    }

    pub fn heat_constant(&self) -> f64 {
        self.state.lock().heat_constant
    }

    /// Replace the heat constant. Rejected values leave the cell untouched.
    pub fn set_heat_constant(&self, value: f64) -> Result<()> {
        let value = validate_heat_constant(value)?;
        self.state.lock().heat_constant = value;
        Ok(())
    }

    /// Pull the temperature toward `amount` by one relaxation step.
    ///
    /// Returns the new temperature.
    pub fn apply_heat(&self, amount: f64) -> f64 {
        self.state.lock().relax_toward(amount)
    }

    /// Relax toward the mean of the neighbours' current temperatures.
    ///
    /// Each neighbour is read under its own lock, one after the other, so the
    /// values averaged here are not a consistent snapshot of the grid. Only
    /// the final write to this cell is atomic. Returns the new temperature.
    pub fn step(&self) -> Result<f64> {
        if self.neighbors.is_empty() {
            return Err(HotplateError::precondition(format!(
                "cell ({}, {}) has no neighbours to average",
                self.row, self.col
            )));
        }
        let sum: f64 = self.neighbors.iter().map(|n| n.temperature()).sum();
        let average = sum / self.neighbors.len() as f64;
        Ok(self.state.lock().relax_toward(average))
    }

    /// Step, sleep, repeat until [`Cell::request_stop`] is observed.
    ///
    /// The flag is checked before every step, so a stop lands within one
    /// `update_interval`. A failed step ends the loop with that error.
    pub fn run(&self, update_interval: Duration) -> Result<()> {
        while !self.is_stop_requested() {
            if let Err(err) = self.step() {
                error!(row = self.row, col = self.col, %err, "cell update loop aborted");
                return Err(err);
            }
            thread::sleep(update_interval);
        }
        Ok(())
    }

    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::Release);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    // Re-arm the loop before a restart.
    pub(crate) fn clear_stop(&self) {
        self.stop_requested.store(false, Ordering::Release);
    }

    /// `(row, col)` of the cell on the display grid.
    pub fn position(&self) -> (usize, usize) {
        (self.row, self.col)
    }

    /// Edge length of the cell's square on the display, in pixels.
    pub fn render_size(&self) -> u32 {
        self.render_size
    }
}
