#![allow(dead_code)]
use geo::{polygon, Coord, Polygon};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use watershed_mesh::geometry::Segment;

/// Axis-aligned square with its lower-left corner at `(x, y)`.
pub fn square(x: f64, y: f64, size: f64) -> Polygon<f64> {
    polygon![
        (x: x, y: y),
        (x: x + size, y: y),
        (x: x + size, y: y + size),
        (x: x, y: y + size),
    ]
}

/// Two unit squares sharing the edge x = 1.
pub fn two_squares() -> Vec<Polygon<f64>> {
    vec![square(0.0, 0.0, 1.0), square(1.0, 0.0, 1.0)]
}

pub fn line(coords: &[(f64, f64)]) -> Segment {
    coords.to_vec().into()
}

pub fn c(x: f64, y: f64) -> Coord<f64> {
    Coord { x, y }
}

pub fn assert_close(got: f64, want: f64, tol: f64) {
    assert!(
        (got - want).abs() <= tol,
        "expected {want} within {tol}, got {got}"
    );
}

/// A dendritic network of `depth` levels draining to `(outlet_x, 0)`,
/// with reaches jittered by a seeded rng so runs are reproducible.
pub fn dendritic(outlet_x: f64, depth: usize, reach_len: f64, seed: u64) -> Vec<Segment> {
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut reaches = Vec::new();
    let mut frontier = vec![(outlet_x, 0.0, 0.0f64)];
    for level in 0..depth {
        let mut next = Vec::new();
        for (x, y, heading) in frontier {
            let branches = if level == 0 { 1 } else { 2 };
            for b in 0..branches {
                let spread = if branches == 1 { 0.0 } else if b == 0 { -0.5 } else { 0.5 };
                let h = heading + spread + rng.gen_range(-0.1..0.1);
                let mid = (
                    x + 0.5 * reach_len * h.sin() + rng.gen_range(-0.05..0.05) * reach_len,
                    y + 0.5 * reach_len * h.cos(),
                );
                let top = (x + reach_len * h.sin(), y + reach_len * h.cos());
                // reaches flow downstream: from `top` to `(x, y)`
                reaches.push(line(&[top, mid, (x, y)]));
                next.push((top.0, top.1, h));
            }
        }
        frontier = next;
    }
    reaches
}
