//! Concurrent heat diffusion on a 2D hotplate.
//!
//! Every [`Cell`] runs its own update loop: read the neighbours, relax
//! toward their mean, sleep, repeat. The [`Grid`] builds the cells, wires
//! them into a 4-neighbour graph and starts and stops the loops. Heat can be
//! injected into any cell at any time while the loops run.
//!
//! Cells are individually atomic and the grid as a whole is only eventually
//! consistent: a step averages neighbour values read one at a time.

pub mod cell;
pub mod error;
pub mod grid;
pub mod render;

pub use cell::{Cell, DEFAULT_UPDATE_INTERVAL, validate_heat_constant};
pub use error::{HotplateError, Result};
pub use grid::{Grid, Schedule};
pub use render::{ColorRamp, Rect, Rgb, cell_rect, heat_constant_from_level, surface_to_cell};
