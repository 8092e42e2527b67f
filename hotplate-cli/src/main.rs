mod inject;

use clap::Parser;
use hotplate_core::{
    ColorRamp, Grid, Schedule, cell_rect, heat_constant_from_level, surface_to_cell,
};
use inject::{InjectionPattern, generate_targets, sample_pattern};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Grid rows
    #[arg(long, default_value_t = 15)]
    rows: usize,

    /// Grid columns
    #[arg(long, default_value_t = 15)]
    cols: usize,

    /// Starting temperature of every cell
    #[arg(long, default_value_t = 0.0)]
    initial_temp: f64,

    /// Heat constant in (0, 1] given to every cell at start
    #[arg(long, default_value_t = 1.0)]
    heat_constant: f64,

    /// Slider level 1..=10 broadcast as heat constant halfway through the run
    #[arg(long)]
    retune_level: Option<u8>,

    /// Sleep between two steps of a cell, in ms
    #[arg(long, default_value_t = 200)]
    interval_ms: u64,

    /// Renderer sampling period, in ms
    #[arg(long, default_value_t = hotplate_core::render::DEFAULT_SAMPLE_INTERVAL_MS)]
    sample_ms: u64,

    /// Total run time, in ms
    #[arg(long, default_value_t = 3000)]
    duration_ms: u64,

    /// Temperature applied by each simulated press
    #[arg(long, default_value_t = 500.0)]
    apply_temp: f64,

    /// Number of simulated presses, spread evenly over the run
    #[arg(long, default_value_t = 40)]
    injections: usize,

    /// Press pattern (sampled from the seed when omitted)
    #[arg(long, value_enum)]
    pattern: Option<InjectionPattern>,

    /// Sweep cells with this many worker threads instead of one thread per cell
    #[arg(long)]
    workers: Option<NonZeroUsize>,

    /// Pixel edge of a cell on the virtual drawing surface
    #[arg(long, default_value_t = 40)]
    cell_size: u32,

    /// RNG seed for the press pattern
    #[arg(long, default_value_t = 123)]
    seed: u64,

    /// Output directory for frames.bin and meta.jsonl
    #[arg(long)]
    out: Option<PathBuf>,

    /// Draw every sampled frame to the terminal
    #[arg(long)]
    render: bool,
}

#[derive(Serialize)]
struct MetaRow {
    frame_idx: u64,
    elapsed_ms: u64,

    rows: usize,
    cols: usize,

    heat_constant: f64,
    presses: usize,
    pattern: &'static str,
    seed: u64,

    min: f64,
    mean: f64,
    max: f64,

    hottest: [usize; 2],
    hottest_rect: [u32; 4],
}

struct Recorder {
    frames: BufWriter<File>,
    meta: BufWriter<File>,
}

impl Recorder {
    fn create(dir: &Path) -> io::Result<Recorder> {
        fs::create_dir_all(dir)?;
        let frames = BufWriter::new(File::create(dir.join("frames.bin"))?);
        let meta = BufWriter::new(
            OpenOptions::new()
                .create(true)
                .truncate(true)
                .write(true)
                .open(dir.join("meta.jsonl"))?,
        );
        Ok(Recorder { frames, meta })
    }

    fn write(&mut self, snap: &[Vec<f64>], row: &MetaRow) -> Result<(), Box<dyn std::error::Error>> {
        for values in snap {
            write_f64_vec(&mut self.frames, values)?;
        }
        serde_json::to_writer(&mut self.meta, row)?;
        self.meta.write_all(b"\n")?;
        Ok(())
    }

    fn finish(mut self) -> io::Result<()> {
        self.frames.flush()?;
        self.meta.flush()
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    if args.sample_ms == 0 {
        return Err("sample_ms must be > 0".into());
    }
    if args.cell_size == 0 {
        return Err("cell_size must be > 0".into());
    }

    let mut grid = Grid::new(
        args.rows,
        args.cols,
        args.initial_temp,
        args.heat_constant,
        args.cell_size,
    )?;
    grid.wire_neighbors()?;

    let retune = args.retune_level.map(heat_constant_from_level).transpose()?;

    // Presses are generated on the grid, then turned into pointer positions
    // on a virtual surface and mapped back the way a UI controller would.
    let mut rng = ChaCha8Rng::seed_from_u64(args.seed);
    let pattern = args.pattern.unwrap_or_else(|| sample_pattern(&mut rng));
    let surface_w = args.cols as u32 * args.cell_size;
    let surface_h = args.rows as u32 * args.cell_size;
    let pointer: Vec<(i32, i32)> = generate_targets(&mut rng, args.rows, args.cols, pattern, args.injections)
        .into_iter()
        .map(|(r, c)| {
            let x = c as u32 * args.cell_size + rng.gen_range(0..args.cell_size);
            let y = r as u32 * args.cell_size + rng.gen_range(0..args.cell_size);
            (x as i32, y as i32)
        })
        .collect();

    let schedule = match args.workers {
        Some(workers) => Schedule::Pool { workers },
        None => Schedule::PerCell,
    };
    let duration = Duration::from_millis(args.duration_ms);
    let sample = Duration::from_millis(args.sample_ms);
    let ramp = ColorRamp::default();

    let mut recorder = args.out.as_deref().map(Recorder::create).transpose()?;

    info!(pattern = pattern.as_str(), presses = pointer.len(), "starting hotplate");
    grid.start(schedule, Duration::from_millis(args.interval_ms))?;
    let started = Instant::now();

    let mut frame_idx: u64 = 0;
    let mut pressed = 0usize;
    let mut retuned = false;

    loop {
        let elapsed = started.elapsed();
        if elapsed >= duration {
            break;
        }

        while pressed < pointer.len() && press_due(pressed, pointer.len(), duration) <= elapsed {
            let (x, y) = pointer[pressed];
            if let Some((r, c)) = surface_to_cell(x, y, surface_w, surface_h, args.rows, args.cols) {
                grid.apply_heat_at(r, c, args.apply_temp)?;
            }
            pressed += 1;
        }

        if let Some(k) = retune {
            if !retuned && elapsed >= duration / 2 {
                grid.broadcast_heat_constant(k)?;
                retuned = true;
                info!(heat_constant = k, "heat constant retuned");
            }
        }

        let snap = grid.snapshot_temperatures();

        if let Some(rec) = recorder.as_mut() {
            let row = summarize(&grid, &snap, frame_idx, elapsed, pressed, pattern, args.seed);
            rec.write(&snap, &row)?;
        }

        if args.render {
            draw(&snap, &ramp)?;
        }

        frame_idx += 1;
        thread::sleep(sample);
    }

    grid.stop_all();
    grid.join_all()?;

    if let Some(rec) = recorder {
        rec.finish()?;
    }

    let final_snap = grid.snapshot_temperatures();
    let flat: Vec<f64> = final_snap.iter().flatten().copied().collect();
    let mean = flat.iter().sum::<f64>() / flat.len() as f64;

    if let Some(dir) = &args.out {
        println!("Wrote frames to: {}", dir.display());
    }
    println!(
        "Frames: {} (presses={} pattern={} mean_temp={:.3})",
        frame_idx,
        pressed,
        pattern.as_str(),
        mean
    );

    Ok(())
}

// Press `i` of `n` lands at (i + 1) / (n + 1) of the run.
fn press_due(i: usize, n: usize, duration: Duration) -> Duration {
    duration.mul_f64((i + 1) as f64 / (n + 1) as f64)
}

fn summarize(
    grid: &Grid,
    snap: &[Vec<f64>],
    frame_idx: u64,
    elapsed: Duration,
    presses: usize,
    pattern: InjectionPattern,
    seed: u64,
) -> MetaRow {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut sum = 0.0;
    let mut hottest = [0usize; 2];
    for (r, values) in snap.iter().enumerate() {
        for (c, &t) in values.iter().enumerate() {
            sum += t;
            min = min.min(t);
            if t > max {
                max = t;
                hottest = [r, c];
            }
        }
    }
    let count = (grid.rows() * grid.cols()) as f64;

    let (heat_constant, hottest_rect) = match grid.cell(hottest[0], hottest[1]) {
        Some(cell) => {
            let rect = cell_rect(cell);
            (cell.heat_constant(), [rect.x, rect.y, rect.width, rect.height])
        }
        None => (f64::NAN, [0; 4]),
    };

    MetaRow {
        frame_idx,
        elapsed_ms: elapsed.as_millis() as u64,
        rows: grid.rows(),
        cols: grid.cols(),
        heat_constant,
        presses,
        pattern: pattern.as_str(),
        seed,
        min,
        mean: sum / count,
        max,
        hottest,
        hottest_rect,
    }
}

fn draw(snap: &[Vec<f64>], ramp: &ColorRamp) -> io::Result<()> {
    let mut out = io::stdout().lock();
    // home the cursor so frames overwrite each other
    out.write_all(b"\x1b[H")?;
    for values in snap {
        for &t in values {
            let c = ramp.color_for(t);
            write!(out, "\x1b[48;2;{};{};{}m  ", c.r, c.g, c.b)?;
        }
        out.write_all(b"\x1b[0m\n")?;
    }
    out.flush()
}

fn write_f64_vec<W: Write>(w: &mut W, v: &[f64]) -> io::Result<()> {
    for &x in v {
        w.write_all(&x.to_le_bytes())?;
    }
    Ok(())
}
