use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of uniform draws in `[0, 1)`. Injected wherever behaviour is randomized.
pub trait RandomSource: Send + Sync {
    fn next_unit(&self) -> f64;
}

/// True with probability `p`.
pub fn roll(rng: &dyn RandomSource, p: f64) -> bool {
    rng.next_unit() < p
}

/// Uniformly pick one item. Consumes a draw only when `items` is non-empty.
pub fn pick<'a, T>(rng: &dyn RandomSource, items: &'a [T]) -> Option<&'a T> {
    if items.is_empty() {
        return None;
    }
    let idx = (rng.next_unit() * items.len() as f64).floor() as usize;
    items.get(idx.min(items.len() - 1))
}

/// `StdRng`-backed source; seed it for reproducible runs.
#[derive(Debug)]
pub struct SeededRandom {
    rng: Mutex<StdRng>,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self { rng: Mutex::new(StdRng::seed_from_u64(seed)) }
    }

    pub fn from_entropy() -> Self {
        Self { rng: Mutex::new(StdRng::from_entropy()) }
    }
}

impl RandomSource for SeededRandom {
    fn next_unit(&self) -> f64 {
        match self.rng.lock() {
            Ok(mut rng) => rng.gen_range(0.0..1.0),
            Err(poisoned) => poisoned.into_inner().gen_range(0.0..1.0),
        }
    }
}

/// Replays a fixed sequence of draws, cycling when exhausted.
#[derive(Debug)]
pub struct ScriptedRandom {
    values: Vec<f64>,
    cursor: AtomicUsize,
}

impl ScriptedRandom {
    pub fn new(values: impl Into<Vec<f64>>) -> Self {
        Self { values: values.into(), cursor: AtomicUsize::new(0) }
    }
}

impl RandomSource for ScriptedRandom {
    fn next_unit(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        let i = self.cursor.fetch_add(1, Ordering::Relaxed) % self.values.len();
        self.values[i].clamp(0.0, 0.999_999)
    }
}
