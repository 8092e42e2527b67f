use clap::ValueEnum;
use rand::Rng;

/// Shape of the simulated pointer interaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum InjectionPattern {
    /// Repeated presses on one cell.
    Point,
    /// Independent presses anywhere on the plate.
    Scatter,
    /// A drag: a random walk of adjacent cells.
    Stroke,
    /// Presses around a circle.
    Ring,
}

impl InjectionPattern {
    pub fn as_str(&self) -> &'static str {
        match self {
            InjectionPattern::Point => "point",
            InjectionPattern::Scatter => "scatter",
            InjectionPattern::Stroke => "stroke",
            InjectionPattern::Ring => "ring",
        }
    }
}

pub fn sample_pattern<R: Rng>(rng: &mut R) -> InjectionPattern {
    match rng.gen_range(0..4) {
        0 => InjectionPattern::Point,
        1 => InjectionPattern::Scatter,
        2 => InjectionPattern::Stroke,
        _ => InjectionPattern::Ring,
    }
}

/// `count` grid coordinates `(row, col)` to press, in order, all in bounds.
pub fn generate_targets<R: Rng>(
    rng: &mut R,
    rows: usize,
    cols: usize,
    pattern: InjectionPattern,
    count: usize,
) -> Vec<(usize, usize)> {
    let mut out = Vec::with_capacity(count);

    match pattern {
        InjectionPattern::Point => {
            let at = (rng.gen_range(0..rows), rng.gen_range(0..cols));
            out.resize(count, at);
        }

        InjectionPattern::Scatter => {
            for _ in 0..count {
                out.push((rng.gen_range(0..rows), rng.gen_range(0..cols)));
            }
        }

        InjectionPattern::Stroke => {
            let (mut r, mut c) = (rng.gen_range(0..rows), rng.gen_range(0..cols));
            for _ in 0..count {
                out.push((r, c));
                // stay put when the chosen direction leaves the plate
                match rng.gen_range(0..4) {
                    0 if r + 1 < rows => r += 1,
                    1 if r > 0 => r -= 1,
                    2 if c + 1 < cols => c += 1,
                    3 if c > 0 => c -= 1,
                    _ => {}
                }
            }
        }

        InjectionPattern::Ring => {
            let cr = (rows as f64 - 1.0) / 2.0;
            let cc = (cols as f64 - 1.0) / 2.0;
            let radius = rng.gen_range(0.25..0.45) * rows.min(cols) as f64;
            let phase = rng.gen_range(0.0..std::f64::consts::TAU);
            for i in 0..count {
                let a = phase + std::f64::consts::TAU * i as f64 / count.max(1) as f64;
                let r = (cr + radius * a.sin()).round().clamp(0.0, rows as f64 - 1.0);
                let c = (cc + radius * a.cos()).round().clamp(0.0, cols as f64 - 1.0);
                out.push((r as usize, c as usize));
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    const ALL: [InjectionPattern; 4] = [
        InjectionPattern::Point,
        InjectionPattern::Scatter,
        InjectionPattern::Stroke,
        InjectionPattern::Ring,
    ];

    #[test]
    fn targets_stay_on_the_plate() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for pattern in ALL {
            for (rows, cols) in [(1, 1), (1, 9), (15, 15), (4, 30)] {
                let targets = generate_targets(&mut rng, rows, cols, pattern, 64);
                assert_eq!(targets.len(), 64, "{}", pattern.as_str());
                assert!(targets.iter().all(|&(r, c)| r < rows && c < cols));
            }
        }
    }

    #[test]
    fn stroke_moves_between_adjacent_cells() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let targets = generate_targets(&mut rng, 10, 10, InjectionPattern::Stroke, 200);
        for pair in targets.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            let dist = a.0.abs_diff(b.0) + a.1.abs_diff(b.1);
            assert!(dist <= 1, "{a:?} -> {b:?}");
        }
    }

    #[test]
    fn point_repeats_one_cell() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let targets = generate_targets(&mut rng, 8, 8, InjectionPattern::Point, 10);
        assert!(targets.iter().all(|&t| t == targets[0]));
    }

    #[test]
    fn same_seed_same_targets() {
        let a = generate_targets(&mut ChaCha8Rng::seed_from_u64(5), 15, 15, InjectionPattern::Scatter, 20);
        let b = generate_targets(&mut ChaCha8Rng::seed_from_u64(5), 15, 15, InjectionPattern::Scatter, 20);
        assert_eq!(a, b);
    }
}
