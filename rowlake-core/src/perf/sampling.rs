//! Statistical samplers over row sequences.
//!
//! Every sampler keeps the input order of the rows it picks.

use crate::data::record::{Record, stringify_value};
use rand::Rng;
use rand::seq::index;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleMethod {
    Random,
    Systematic,
    Stratified,
    Percent,
}

impl fmt::Display for SampleMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SampleMethod::Random => "random",
            SampleMethod::Systematic => "systematic",
            SampleMethod::Stratified => "stratified",
            SampleMethod::Percent => "percent",
        })
    }
}

impl FromStr for SampleMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "random" => Ok(Self::Random),
            "systematic" => Ok(Self::Systematic),
            "stratified" => Ok(Self::Stratified),
            "percent" | "percentage" => Ok(Self::Percent),
            other => Err(format!("unknown sample method '{other}'")),
        }
    }
}

/// Uniform sample without replacement using the thread-local RNG.
pub fn random_sample<T: Clone>(data: &[T], size: usize) -> Vec<T> {
    random_sample_with(data, size, &mut rand::thread_rng())
}

/// Uniform sample without replacement. Returns all of `data` when `size`
/// is at least its length.
pub fn random_sample_with<T: Clone, R: Rng + ?Sized>(data: &[T], size: usize, rng: &mut R) -> Vec<T> {
    if size >= data.len() {
        return data.to_vec();
    }
    let mut picked = index::sample(rng, data.len(), size).into_vec();
    picked.sort_unstable();
    picked.into_iter().map(|i| data[i].clone()).collect()
}

/// Evenly spaced picks at stride `len / size`.
pub fn systematic_sample<T: Clone>(data: &[T], size: usize) -> Vec<T> {
    if size >= data.len() {
        return data.to_vec();
    }
    if size == 0 {
        return Vec::new();
    }
    let step = data.len() as f64 / size as f64;
    (0..size)
        .map(|i| ((i as f64 * step).floor() as usize).min(data.len() - 1))
        .map(|i| data[i].clone())
        .collect()
}

/// Partition rows by the stringified value of `field`, sample each
/// partition systematically in proportion to its size, then trim to exactly
/// `size` rows.
///
/// Shares are rounded up, so the combined picks never fall short and no
/// top-up is needed. Partitions appear in first-seen order; trimming takes
/// from the last ones.
pub fn stratified_sample(rows: &[Record], field: &str, size: usize) -> Vec<Record> {
    if size >= rows.len() {
        return rows.to_vec();
    }
    if size == 0 {
        return Vec::new();
    }

    let mut order: Vec<String> = Vec::new();
    let mut strata: HashMap<String, Vec<Record>> = HashMap::new();
    for row in rows {
        let key = stringify_value(row.get(field).unwrap_or(&Value::Null));
        strata
            .entry(key.clone())
            .or_insert_with(|| {
                order.push(key);
                Vec::new()
            })
            .push(row.clone());
    }

    let total = rows.len();
    let mut out = Vec::with_capacity(size);
    for key in &order {
        let members = &strata[key];
        let share = (size * members.len()).div_ceil(total);
        out.extend(systematic_sample(members, share));
    }
    out.truncate(size);
    out
}

/// Systematic sample sized as a percentage of the input, rounded to the
/// nearest row. Percentages outside `0..=100` are clamped.
pub fn percent_sample<T: Clone>(data: &[T], percent: f64) -> Vec<T> {
    let percent = if percent.is_nan() { 0.0 } else { percent.clamp(0.0, 100.0) };
    let size = (data.len() as f64 * percent / 100.0).round() as usize;
    systematic_sample(data, size)
}
