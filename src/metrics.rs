//! Scalar time series emitted once per training iteration.
//!
//! - MetricsSink:   trait used by the training loop
//! - NoopMetrics:   discards all records
//! - MemoryMetrics: keeps records in memory (tests, plotting)
//! - CsvMetrics:    appends `iteration,name,value` lines to a file

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::TrainError;

pub const LOSS: &str = "loss";
pub const REWARD_BOUND: &str = "reward_bound";
pub const REWARD_MEAN: &str = "reward_mean";

/// Receives named scalars indexed by iteration number.
pub trait MetricsSink {
    fn record(&mut self, name: &str, value: f32, iteration: usize) -> Result<(), TrainError>;

    fn flush(&mut self) -> Result<(), TrainError> {
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn record(&mut self, _name: &str, _value: f32, _iteration: usize) -> Result<(), TrainError> {
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MetricRecord {
    pub name: String,
    pub iteration: usize,
    pub value: f32,
}

#[derive(Debug, Default, Clone)]
pub struct MemoryMetrics {
    records: Vec<MetricRecord>,
}

impl MemoryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[MetricRecord] {
        &self.records
    }

    /// `(iteration, value)` pairs recorded under `name`, in insertion order.
    pub fn series(&self, name: &str) -> Vec<(usize, f32)> {
        self.records
            .iter()
            .filter(|record| record.name == name)
            .map(|record| (record.iteration, record.value))
            .collect()
    }
}

impl MetricsSink for MemoryMetrics {
    fn record(&mut self, name: &str, value: f32, iteration: usize) -> Result<(), TrainError> {
        self.records.push(MetricRecord {
            name: name.to_string(),
            iteration,
            value,
        });
        Ok(())
    }
}

/// CSV file sink with an `iteration,name,value` header.
pub struct CsvMetrics {
    writer: BufWriter<File>,
}

impl CsvMetrics {
    pub fn create(path: impl AsRef<Path>) -> Result<Self, TrainError> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "iteration,name,value")?;
        Ok(Self { writer })
    }
}

impl MetricsSink for CsvMetrics {
    fn record(&mut self, name: &str, value: f32, iteration: usize) -> Result<(), TrainError> {
        writeln!(self.writer, "{iteration},{name},{value}")?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), TrainError> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_metrics_groups_by_name() {
        let mut metrics = MemoryMetrics::new();
        metrics.record(LOSS, 1.5, 0).expect("record");
        metrics.record(REWARD_MEAN, 0.1, 0).expect("record");
        metrics.record(LOSS, 1.2, 1).expect("record");
        assert_eq!(metrics.series(LOSS), vec![(0, 1.5), (1, 1.2)]);
        assert_eq!(metrics.series(REWARD_MEAN), vec![(0, 0.1)]);
        assert!(metrics.series(REWARD_BOUND).is_empty());
    }

    #[test]
    fn csv_metrics_writes_lines() {
        let path = std::env::temp_dir().join(format!("cemlake-metrics-{}.csv", std::process::id()));
        {
            let mut metrics = CsvMetrics::create(&path).expect("create");
            metrics.record(REWARD_BOUND, 0.25, 3).expect("record");
            metrics.flush().expect("flush");
        }
        let contents = std::fs::read_to_string(&path).expect("read");
        assert_eq!(contents, "iteration,name,value\n3,reward_bound,0.25\n");
        let _ = std::fs::remove_file(&path);
    }
}
