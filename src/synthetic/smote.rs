//! SMOTE (Synthetic Minority Over-sampling Technique)

use crate::error::{RacoonsError, Result};
use crate::optimizer::search_space::{ParamGrid, ParamValue};
use crate::synthetic::{class_counts, class_indices, ResampleResult, Sampler};
use ndarray::{Array1, Array2, ArrayView1};
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};
use tracing::debug;

/// Ordered float for BinaryHeap-based partial sort
#[derive(Debug, Clone, Copy)]
struct DistIdx(f64, usize);

impl PartialEq for DistIdx {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for DistIdx {}
impl PartialOrd for DistIdx {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for DistIdx {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0).then(self.1.cmp(&other.1))
    }
}

/// SMOTE settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmoteConfig {
    /// Number of nearest neighbours interpolated towards
    pub k_neighbors: usize,
    /// Target minority count as a fraction of the majority count
    pub sampling_strategy: f64,
    pub random_state: Option<u64>,
}

impl Default for SmoteConfig {
    fn default() -> Self {
        Self {
            k_neighbors: 5,
            sampling_strategy: 1.0,
            random_state: Some(42),
        }
    }
}

/// SMOTE oversampler for binary 0/1 labels
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SMOTE {
    pub config: SmoteConfig,
    target_counts: Option<BTreeMap<i64, usize>>,
}

impl SMOTE {
    /// Create new SMOTE sampler
    pub fn new() -> Self {
        Self::with_config(SmoteConfig::default())
    }

    pub fn with_config(config: SmoteConfig) -> Self {
        Self {
            config,
            target_counts: None,
        }
    }

    /// Set number of neighbors
    pub fn with_k_neighbors(mut self, k: usize) -> Self {
        self.config.k_neighbors = k.max(1);
        self
    }

    /// Set random seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.config.random_state = Some(seed);
        self
    }

    fn squared_distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        a.iter().zip(b.iter()).map(|(ai, bi)| (ai - bi).powi(2)).sum()
    }

    /// Positions (within `members`) of the k nearest neighbours of
    /// `members[own]`; the sample itself is excluded by position, so exact
    /// duplicates still count as neighbours
    fn find_neighbors(x: &Array2<f64>, members: &[usize], own: usize, k: usize) -> Vec<usize> {
        let point = x.row(members[own]);
        let mut heap: BinaryHeap<DistIdx> = BinaryHeap::with_capacity(k + 1);

        for (pos, &row) in members.iter().enumerate() {
            if pos == own {
                continue;
            }
            let dist = Self::squared_distance(point, x.row(row));
            if heap.len() < k {
                heap.push(DistIdx(dist, pos));
            } else if let Some(&top) = heap.peek() {
                if DistIdx(dist, pos) < top {
                    heap.pop();
                    heap.push(DistIdx(dist, pos));
                }
            }
        }

        let mut neighbors: Vec<DistIdx> = heap.into_vec();
        neighbors.sort();
        neighbors.into_iter().map(|DistIdx(_, pos)| pos).collect()
    }

    /// Generate synthetic sample between two points
    fn generate_sample(point: ArrayView1<f64>, neighbor: ArrayView1<f64>, rng: &mut StdRng) -> Vec<f64> {
        let gap: f64 = rng.gen();
        point
            .iter()
            .zip(neighbor.iter())
            .map(|(&p, &n)| p + gap * (n - p))
            .collect()
    }

    pub fn param_grid() -> ParamGrid {
        ParamGrid::new().with("k_neighbors", vec![ParamValue::Int(3), ParamValue::Int(5)])
    }

    pub fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        match name {
            "k_neighbors" => self.config.k_neighbors = value.as_usize(name)?,
            "sampling_strategy" => {
                let ratio = value.as_f64(name)?;
                if !(ratio > 0.0 && ratio <= 1.0) {
                    return Err(RacoonsError::invalid_parameter(name, ratio, "must be in (0, 1]"));
                }
                self.config.sampling_strategy = ratio;
            }
            "random_state" => self.config.random_state = Some(value.as_i64(name)? as u64),
            _ => {
                return Err(RacoonsError::invalid_parameter(
                    name,
                    value,
                    "unknown sampler parameter",
                ))
            }
        }
        Ok(())
    }
}

impl Default for SMOTE {
    fn default() -> Self {
        Self::new()
    }
}

impl Sampler for SMOTE {
    fn fit(&mut self, _x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let counts = class_counts(y);

        let max_count = match counts.values().max() {
            Some(&max) if counts.len() >= 2 => max,
            _ => {
                return Err(RacoonsError::ValidationError(
                    "Need at least 2 classes for SMOTE".to_string(),
                ))
            }
        };

        let targets = counts
            .iter()
            .map(|(&class, &count)| {
                let target = (max_count as f64 * self.config.sampling_strategy) as usize;
                (class, target.max(count))
            })
            .collect();

        self.target_counts = Some(targets);
        Ok(())
    }

    fn resample(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<ResampleResult> {
        let targets = self
            .target_counts
            .as_ref()
            .ok_or_else(|| RacoonsError::ModelNotFitted("SMOTE".to_string()))?;
        if x.nrows() != y.len() {
            return Err(RacoonsError::ShapeError {
                expected: format!("y length = {}", x.nrows()),
                actual: format!("y length = {}", y.len()),
            });
        }

        let mut rng = match self.config.random_state {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let indices = class_indices(y);
        let n_features = x.ncols();

        let mut synthetic_x: Vec<Vec<f64>> = Vec::new();
        let mut synthetic_y: Vec<f64> = Vec::new();
        let mut n_synthetic = Vec::new();

        for (&class, &target_count) in targets {
            let members = match indices.get(&class) {
                Some(members) if !members.is_empty() => members,
                _ => {
                    n_synthetic.push(0);
                    continue;
                }
            };
            let n_to_generate = target_count.saturating_sub(members.len());
            n_synthetic.push(n_to_generate);
            if n_to_generate == 0 {
                continue;
            }

            let k = self.config.k_neighbors.min(members.len() - 1);
            // neighbour lists are computed once per member, lazily
            let mut neighbor_cache: Vec<Option<Vec<usize>>> = vec![None; members.len()];

            for _ in 0..n_to_generate {
                let own = rng.gen_range(0..members.len());
                let point = x.row(members[own]);

                if k == 0 {
                    // a lone minority sample can only be duplicated
                    synthetic_x.push(point.to_vec());
                } else {
                    let neighbors = neighbor_cache[own]
                        .get_or_insert_with(|| Self::find_neighbors(x, members, own, k));
                    let neighbor = neighbors[rng.gen_range(0..neighbors.len())];
                    synthetic_x.push(Self::generate_sample(point, x.row(members[neighbor]), &mut rng));
                }
                synthetic_y.push(class as f64);
            }
        }

        debug!(
            n_original = x.nrows(),
            n_synthetic = synthetic_x.len(),
            k_neighbors = self.config.k_neighbors,
            "SMOTE resampled"
        );

        // original rows first, synthetic rows after
        let n_original = x.nrows();
        let n_total = n_original + synthetic_x.len();
        let result_x = Array2::from_shape_fn((n_total, n_features), |(i, j)| {
            if i < n_original {
                x[[i, j]]
            } else {
                synthetic_x[i - n_original][j]
            }
        });

        let mut all_y: Vec<f64> = y.to_vec();
        all_y.extend_from_slice(&synthetic_y);

        Ok(ResampleResult {
            x: result_x,
            y: Array1::from_vec(all_y),
            n_synthetic,
        })
    }
}
