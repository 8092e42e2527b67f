use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use hotplate_core::{Grid, HotplateError, Schedule};

fn spread(grid: &Grid) -> f64 {
    let temps: Vec<f64> = grid.snapshot_temperatures().into_iter().flatten().collect();
    let max = temps.iter().copied().fold(f64::MIN, f64::max);
    let min = temps.iter().copied().fold(f64::MAX, f64::min);
    max - min
}

fn wait_for_spread(grid: &Grid, below: f64, budget: Duration) -> bool {
    let deadline = Instant::now() + budget;
    while Instant::now() < deadline {
        if spread(grid) < below {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    false
}

#[test]
fn running_grid_reaches_equilibrium() {
    let mut grid = Grid::new(3, 3, 0.0, 0.5, 10).unwrap();
    grid.wire_neighbors().unwrap();
    grid.cell(0, 0).unwrap().set_temperature(1000.0);
    grid.cell(2, 2).unwrap().set_temperature(400.0);

    grid.start_all(Duration::from_millis(1)).unwrap();
    assert!(
        wait_for_spread(&grid, 1e-3, Duration::from_secs(10)),
        "grid never settled: {:?}",
        grid.snapshot_temperatures()
    );

    let temps: Vec<f64> = grid.snapshot_temperatures().into_iter().flatten().collect();
    assert!(temps.iter().all(|t| (0.0..=1000.0).contains(t)));

    grid.stop_all();
    grid.join_all().unwrap();
}

#[test]
fn pooled_grid_reaches_equilibrium() {
    let mut grid = Grid::new(4, 4, 0.0, 0.5, 10).unwrap();
    grid.wire_neighbors().unwrap();
    grid.cell(1, 2).unwrap().set_temperature(800.0);

    let schedule = Schedule::Pool {
        workers: NonZeroUsize::new(3).unwrap(),
    };
    grid.start(schedule, Duration::from_millis(1)).unwrap();
    assert!(wait_for_spread(&grid, 1e-3, Duration::from_secs(10)));

    grid.stop_all();
    grid.join_all().unwrap();
}

#[test]
fn concurrent_reads_stay_within_historical_range() {
    // Every temperature is a convex combination of earlier temperatures and
    // injected amounts, all inside [0, 1000]. A torn read would escape it.
    let mut grid = Grid::new(4, 4, 0.0, 0.3, 10).unwrap();
    grid.wire_neighbors().unwrap();
    grid.cell(0, 0).unwrap().set_temperature(1000.0);
    grid.start_all(Duration::from_micros(50)).unwrap();
    let grid = Arc::new(grid);
    let done = Arc::new(AtomicBool::new(false));

    let injectors: Vec<_> = (0..2)
        .map(|i| {
            let grid = Arc::clone(&grid);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut n = 0usize;
                while !done.load(Ordering::Relaxed) {
                    let amount = if (n + i) % 2 == 0 { 1000.0 } else { 0.0 };
                    grid.apply_heat_at(n % 4, (n / 4) % 4, amount).unwrap();
                    grid.broadcast_heat_constant(if n % 3 == 0 { 0.9 } else { 0.1 })
                        .unwrap();
                    n += 1;
                }
            })
        })
        .collect();

    let readers: Vec<_> = (0..2)
        .map(|_| {
            let grid = Arc::clone(&grid);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut reads = 0usize;
                while !done.load(Ordering::Relaxed) {
                    for cell in grid.cells() {
                        let t = cell.temperature();
                        assert!(t.is_finite() && (-1e-9..=1000.0 + 1e-9).contains(&t), "read {t}");
                        let k = cell.heat_constant();
                        assert!(k == 0.3 || k == 0.9 || k == 0.1, "read constant {k}");
                        reads += 1;
                    }
                }
                reads
            })
        })
        .collect();

    thread::sleep(Duration::from_millis(300));
    done.store(true, Ordering::Relaxed);
    for handle in injectors {
        handle.join().unwrap();
    }
    for handle in readers {
        assert!(handle.join().unwrap() > 0);
    }

    grid.stop_all();
    let mut grid = Arc::into_inner(grid).expect("all helper threads joined");
    grid.join_all().unwrap();
}

#[test]
fn stop_lands_within_one_interval() {
    let interval = Duration::from_millis(100);
    let mut grid = Grid::new(3, 3, 10.0, 0.5, 10).unwrap();
    grid.wire_neighbors().unwrap();
    grid.start_all(interval).unwrap();
    thread::sleep(Duration::from_millis(30));

    let asked = Instant::now();
    grid.stop_all();
    grid.join_all().unwrap();
    // one interval plus generous scheduling slack
    assert!(asked.elapsed() < interval * 10, "took {:?}", asked.elapsed());
}

#[test]
fn stopped_grid_stays_still() {
    let mut grid = Grid::new(2, 2, 0.0, 1.0, 10).unwrap();
    grid.wire_neighbors().unwrap();
    grid.start_all(Duration::from_millis(1)).unwrap();
    grid.stop_all();
    grid.join_all().unwrap();

    // no loop is alive to average the injected heat away
    grid.apply_heat_at(0, 0, 500.0).unwrap();
    let before = grid.snapshot_temperatures();
    thread::sleep(Duration::from_millis(20));
    assert_eq!(before, grid.snapshot_temperatures());
    assert_eq!(before[0][0], 500.0);
}

#[test]
fn wiring_is_closed_once_loops_run() {
    let mut grid = Grid::new(2, 2, 0.0, 0.5, 10).unwrap();
    grid.wire_neighbors().unwrap();
    grid.start_all(Duration::from_millis(2)).unwrap();
    assert!(matches!(
        grid.wire_neighbors(),
        Err(HotplateError::PreconditionViolation { .. })
    ));
    assert!(grid.cells().all(|c| c.neighbor_count() == 2));
    grid.stop_all();
    grid.join_all().unwrap();
}

#[test]
fn heat_injected_while_running_spreads() {
    let mut grid = Grid::new(1, 3, 0.0, 0.5, 10).unwrap();
    grid.wire_neighbors().unwrap();
    grid.start_all(Duration::from_millis(1)).unwrap();

    for _ in 0..20 {
        grid.apply_heat_at(0, 0, 1000.0).unwrap();
    }
    let deadline = Instant::now() + Duration::from_secs(10);
    while grid.cell(0, 2).unwrap().temperature() <= 0.0 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(2));
    }
    assert!(grid.cell(0, 2).unwrap().temperature() > 0.0);

    grid.stop_all();
    grid.join_all().unwrap();
}
