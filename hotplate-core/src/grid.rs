//! The hotplate: a fixed rows x cols arrangement of cells with 4-neighbour
//! adjacency, and the threads that drive them.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::cell::{Cell, validate_heat_constant};
use crate::error::{HotplateError, Result};

/// How update loops are mapped onto threads.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Schedule {
    /// One thread per cell, each running [`Cell::run`].
    #[default]
    PerCell,
    /// A fixed set of worker threads. Worker `w` owns every cell whose
    /// row-major index is `w` modulo `workers` and steps each of them once
    /// per tick. Neighbour reads stay independently stale.
    Pool { workers: NonZeroUsize },
}

/// A fixed 2D grid of cells.
///
/// Lifecycle: [`Grid::new`], then [`Grid::wire_neighbors`] exactly once,
/// then [`Grid::start_all`]. [`Grid::stop_all`] asks every loop to finish
/// and [`Grid::join_all`] waits for them. Dropping a running grid does both.
#[derive(Debug)]
pub struct Grid {
    rows: usize,
    cols: usize,
    cells: Vec<Arc<Cell>>,
    wired: bool,
    loops: Vec<JoinHandle<Result<()>>>,
}

impl Grid {
    pub fn new(
        rows: usize,
        cols: usize,
        initial_temperature: f64,
        initial_heat_constant: f64,
        cell_render_size: u32,
    ) -> Result<Grid> {
        if rows == 0 {
            return Err(HotplateError::invalid("rows", "grid needs at least one row"));
        }
        if cols == 0 {
            return Err(HotplateError::invalid("cols", "grid needs at least one column"));
        }
        let heat_constant = validate_heat_constant(initial_heat_constant)?;

        let mut cells = Vec::with_capacity(rows * cols);
        for row in 0..rows {
            for col in 0..cols {
                let cell = Cell::with_position(
                    initial_temperature,
                    heat_constant,
                    row,
                    col,
                    cell_render_size,
                )?;
                cells.push(Arc::new(cell));
            }
        }

        info!(rows, cols, initial_temperature, heat_constant, "hotplate grid created");
        Ok(Grid {
            rows,
            cols,
            cells,
            wired: false,
            loops: Vec::new(),
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn is_wired(&self) -> bool {
        self.wired
    }

    /// True from a successful start until [`Grid::join_all`] has reaped
    /// every loop.
    pub fn is_running(&self) -> bool {
        !self.loops.is_empty()
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&Cell> {
        self.index(row, col).map(|i| self.cells[i].as_ref())
    }

    /// Cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.iter().map(Arc::as_ref)
    }

    fn index(&self, row: usize, col: usize) -> Option<usize> {
        (row < self.rows && col < self.cols).then(|| row * self.cols + col)
    }

    /// Link every cell with the in-bounds cells above, below, left and right.
    ///
    /// Each edge is added in both directions at once. Wiring needs exclusive
    /// access to every cell, so it is refused once loops hold references,
    /// and it may only happen once.
    pub fn wire_neighbors(&mut self) -> Result<()> {
        if self.wired {
            return Err(HotplateError::precondition("neighbours are already wired"));
        }
        if self.is_running() || self.cells.iter_mut().any(|c| Arc::get_mut(c).is_none()) {
            return Err(HotplateError::precondition(
                "cannot wire neighbours while update loops hold the cells",
            ));
        }

        let mut edges = 0usize;
        for row in 0..self.rows {
            for col in 0..self.cols {
                let here = row * self.cols + col;
                if row + 1 < self.rows {
                    self.link(here, here + self.cols)?;
                    edges += 1;
                }
                if col + 1 < self.cols {
                    self.link(here, here + 1)?;
                    edges += 1;
                }
            }
        }
        self.wired = true;
        debug!(rows = self.rows, cols = self.cols, edges, "neighbours wired");
        Ok(())
    }

    // `a < b` always holds for the edges produced above.
    fn link(&mut self, a: usize, b: usize) -> Result<()> {
        let (head, tail) = self.cells.split_at_mut(b);
        match (Arc::get_mut(&mut head[a]), Arc::get_mut(&mut tail[0])) {
            (Some(first), Some(second)) => {
                first.add_neighbor(second);
                second.add_neighbor(first);
                Ok(())
            }
            _ => Err(HotplateError::precondition(
                "cell became shared while wiring neighbours",
            )),
        }
    }

    /// Start one update thread per cell.
    pub fn start_all(&mut self, update_interval: Duration) -> Result<()> {
        self.start(Schedule::PerCell, update_interval)
    }

    /// Start the update loops with the given schedule.
    ///
    /// If the OS refuses a thread, loops started so far are asked to stop
    /// and the error is returned; [`Grid::join_all`] still reaps them.
    pub fn start(&mut self, schedule: Schedule, update_interval: Duration) -> Result<()> {
        if !self.wired {
            return Err(HotplateError::precondition(
                "neighbours must be wired before the update loops start",
            ));
        }
        if self.is_running() {
            return Err(HotplateError::precondition("update loops are already running"));
        }

        for cell in &self.cells {
            cell.clear_stop();
        }

        let spawned = match schedule {
            Schedule::PerCell => self.spawn_per_cell(update_interval),
            Schedule::Pool { workers } => self.spawn_pool(workers, update_interval),
        };
        if let Err(err) = spawned {
            error!(%err, "failed to start update loops");
            self.stop_all();
            return Err(err);
        }

        info!(
            ?schedule,
            threads = self.loops.len(),
            interval_ms = update_interval.as_millis() as u64,
            "update loops started"
        );
        Ok(())
    }

    fn spawn_per_cell(&mut self, update_interval: Duration) -> Result<()> {
        for cell in &self.cells {
            let cell = Arc::clone(cell);
            let (row, col) = cell.position();
            let handle = thread::Builder::new()
                .name(format!("hotplate-cell-{row}-{col}"))
                .spawn(move || cell.run(update_interval))
                .map_err(|e| HotplateError::Spawn {
                    reason: e.to_string(),
                })?;
            self.loops.push(handle);
        }
        Ok(())
    }

    fn spawn_pool(&mut self, workers: NonZeroUsize, update_interval: Duration) -> Result<()> {
        let workers = workers.get().min(self.cells.len());
        for worker in 0..workers {
            let owned: Vec<Arc<Cell>> = self
                .cells
                .iter()
                .skip(worker)
                .step_by(workers)
                .cloned()
                .collect();
            let handle = thread::Builder::new()
                .name(format!("hotplate-worker-{worker}"))
                .spawn(move || sweep(&owned, update_interval))
                .map_err(|e| HotplateError::Spawn {
                    reason: e.to_string(),
                })?;
            self.loops.push(handle);
        }
        Ok(())
    }

    /// Ask every loop to finish. Returns immediately; each loop notices
    /// within one update interval.
    pub fn stop_all(&self) {
        for cell in &self.cells {
            cell.request_stop();
        }
        info!("stop requested for all cells");
    }

    /// Wait for every update loop to end.
    ///
    /// Blocks forever if loops are running and nobody called
    /// [`Grid::stop_all`]. Returns the first loop error, if any; every
    /// thread is joined regardless.
    pub fn join_all(&mut self) -> Result<()> {
        let mut first_err = None;
        for handle in self.loops.drain(..) {
            let outcome = handle.join().unwrap_or_else(|_| {
                Err(HotplateError::precondition("update thread panicked"))
            });
            if let Err(err) = outcome {
                first_err.get_or_insert(err);
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Set the heat constant of every cell.
    ///
    /// The value is validated once up front, so an invalid value changes
    /// nothing. Cells are updated one at a time; a concurrent reader can see
    /// a mix of old and new constants.
    pub fn broadcast_heat_constant(&self, value: f64) -> Result<()> {
        let value = validate_heat_constant(value)?;
        for cell in &self.cells {
            cell.set_heat_constant(value)?;
        }
        debug!(heat_constant = value, "heat constant broadcast");
        Ok(())
    }

    /// Inject heat at `(row, col)`. Returns the cell's new temperature.
    pub fn apply_heat_at(&self, row: usize, col: usize, amount: f64) -> Result<f64> {
        let Some(i) = self.index(row, col) else {
            warn!(row, col, rows = self.rows, cols = self.cols, "heat injection outside grid");
            return Err(HotplateError::OutOfRange {
                row,
                col,
                rows: self.rows,
                cols: self.cols,
            });
        };
        Ok(self.cells[i].apply_heat(amount))
    }

    /// Temperatures of every cell, `rows` vectors of `cols` values.
    ///
    /// Each cell is read independently, so the result is not a consistent
    /// snapshot of a running grid.
    pub fn snapshot_temperatures(&self) -> Vec<Vec<f64>> {
        self.cells
            .chunks(self.cols)
            .map(|row| row.iter().map(|c| c.temperature()).collect())
            .collect()
    }
}

impl Drop for Grid {
    fn drop(&mut self) {
        if self.is_running() {
            self.stop_all();
            if let Err(err) = self.join_all() {
                warn!(%err, "update loop ended with an error during shutdown");
            }
        }
    }
}

// Pool worker: one sweep over its cells per tick until all of them are
// stopped. A failed step ends the worker.
fn sweep(cells: &[Arc<Cell>], update_interval: Duration) -> Result<()> {
    loop {
        let mut live = 0usize;
        for cell in cells {
            if cell.is_stop_requested() {
                continue;
            }
            live += 1;
            if let Err(err) = cell.step() {
                let (row, col) = cell.position();
                error!(row, col, %err, "pool worker aborted");
                return Err(err);
            }
        }
        if live == 0 {
            return Ok(());
        }
        thread::sleep(update_interval);
    }
}
