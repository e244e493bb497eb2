//! Worker selection
//!
//! Uniform random pick over a group's members. No state survives between
//! calls, so repeated picks can land on the same host, and host health or
//! load never enters into it.

use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::HostGroupError;
use crate::model::HostGroup;

/// Source of uniform draws in `0..len`
pub trait RandomSource: Send + Sync {
    /// `len` is always at least 1
    fn draw_index(&self, len: usize) -> usize;
}

/// Thread-local RNG, the default source
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn draw_index(&self, len: usize) -> usize {
        rand::thread_rng().gen_range(0..len)
    }
}

/// Seeded RNG for reproducible picks
#[derive(Debug)]
pub struct SeededRandom {
    rng: Mutex<StdRng>,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl RandomSource for SeededRandom {
    fn draw_index(&self, len: usize) -> usize {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        rng.gen_range(0..len)
    }
}

/// Map a draw onto a membership of `len` hosts
pub fn select_index(len: usize, draw: usize) -> usize {
    draw % len
}

#[derive(Clone)]
pub struct WorkerSelector {
    source: Arc<dyn RandomSource>,
}

impl Default for WorkerSelector {
    fn default() -> Self {
        Self::new(Arc::new(ThreadRandom))
    }
}

impl WorkerSelector {
    pub fn new(source: Arc<dyn RandomSource>) -> Self {
        Self { source }
    }

    pub fn seeded(seed: u64) -> Self {
        Self::new(Arc::new(SeededRandom::new(seed)))
    }

    /// Pick the host id a task in this group should run on
    pub fn pick_host(&self, group: &HostGroup) -> Result<String, HostGroupError> {
        let len = group.hosts_id.len();
        if len == 0 {
            return Err(HostGroupError::NoWorker {
                group: group.id.clone(),
            });
        }

        let index = select_index(len, self.source.draw_index(len));
        Ok(group.hosts_id[index].clone())
    }
}
