//! Deterministic synthetic runs used by the CLI `generate` command, tests and benches.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use shot_core::errors::ShotError;
use shot_core::{NdArray, RngHandle};

use crate::alias::AliasMap;
use crate::dataset::Dataset;
use crate::shot_file::ShotFile;
use crate::store::{MemoryStore, SHOT_EXTENSION};

/// Dataset path of the per-shot scalar signal.
pub const SIGNAL_PATH: &str = "detector/signal";
/// Dataset path of the per-shot camera image.
pub const IMAGE_PATH: &str = "camera/vmi/image";
/// Dataset path of the per-shot time-of-flight trace.
pub const TRACE_PATH: &str = "digitizer/tof/trace";
/// Dataset path of the modulator reference signal.
pub const MODULATOR_PATH: &str = "laser/slu/signal";
/// Dataset path of the per-shot intensity monitor.
pub const INTENSITY_PATH: &str = "photon/i0/monitor";

/// Parameters of a synthetic run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthSpec {
    /// Number of files.
    pub files: usize,
    /// Shots per file.
    pub shots: usize,
    /// Master seed; file `k` uses substream `k`.
    pub seed: u64,
    /// Shot index of the first shot of the first file.
    pub first_shot: i64,
    /// Source period written to the source-period dataset.
    pub source_period: i64,
    /// Phase at which the source is off.
    pub source_offset: i64,
    /// Modulator period.
    pub modulator_period: i64,
    /// Phase at which the modulator is off.
    pub modulator_offset: i64,
    /// Width of the camera image row.
    pub image_width: usize,
    /// Length of the time-of-flight trace.
    pub trace_len: usize,
}

impl Default for SynthSpec {
    fn default() -> Self {
        Self {
            files: 2,
            shots: 100,
            seed: 7,
            first_shot: 0,
            source_period: 2,
            source_offset: 0,
            modulator_period: 2,
            modulator_offset: 1,
            image_width: 8,
            trace_len: 16,
        }
    }
}

impl SynthSpec {
    /// Alias map binding short keywords to the generated dataset paths.
    pub fn aliases() -> AliasMap {
        AliasMap::new()
            .with("signal", SIGNAL_PATH)
            .with("vmi", IMAGE_PATH)
            .with("tof", TRACE_PATH)
            .with("slu", MODULATOR_PATH)
            .with("i0m", INTENSITY_PATH)
    }

    /// File identifier of file `index`.
    pub fn file_name(index: usize) -> String {
        format!("run_{index:03}.{SHOT_EXTENSION}")
    }

    /// Shot indices of file `index`.
    pub fn shot_indices(&self, index: usize) -> Vec<i64> {
        let start = self.first_shot + (index * self.shots) as i64;
        (0..self.shots as i64).map(|offset| start + offset).collect()
    }

    fn is_off(shot: i64, period: i64, offset: i64) -> bool {
        period > 0 && (shot - offset).rem_euclid(period) == 0
    }

    /// Generates file `index`.
    pub fn generate_file(&self, index: usize) -> Result<ShotFile, ShotError> {
        let mut rng = RngHandle::substream(self.seed, index as u64);
        let shots = self.shot_indices(index);
        let mut signal = Vec::with_capacity(shots.len());
        let mut modulator = Vec::with_capacity(shots.len());
        let mut intensity = Vec::with_capacity(shots.len());
        let mut image = Vec::with_capacity(shots.len() * self.image_width);
        let mut trace = Vec::with_capacity(shots.len() * self.trace_len);

        for &shot in &shots {
            let source_on = !Self::is_off(shot, self.source_period, self.source_offset);
            let modulator_on = !Self::is_off(shot, self.modulator_period, self.modulator_offset);
            let i0 = rng.normal(10.0, 2.0);
            intensity.push(i0);
            modulator.push(if modulator_on {
                1.0 + 0.05 * rng.gaussian()
            } else {
                0.05 * rng.gaussian().abs()
            });
            let level = 1.0
                + if source_on { 2.0 } else { 0.0 }
                + if modulator_on { 0.5 } else { 0.0 };
            signal.push(level + 0.1 * rng.gaussian());
            for pixel in 0..self.image_width {
                let profile = 1.0 / (1.0 + pixel as f64);
                image.push(level * profile * i0 * 0.1 + 0.01 * rng.gaussian());
            }
            for bin in 0..self.trace_len {
                let peak = if bin == self.trace_len / 2 { level } else { 0.0 };
                trace.push(peak + 0.02 * rng.gaussian());
            }
        }

        let count = shots.len();
        let file = ShotFile::new()
            .with(
                "bunches",
                NdArray::from_vec(shots.iter().map(|shot| *shot as f64).collect()),
            )
            .with(
                "Background_Period",
                NdArray::scalar(self.source_period as f64),
            )
            .with(SIGNAL_PATH, NdArray::from_vec(signal))
            .with(MODULATOR_PATH, NdArray::from_vec(modulator))
            .with(INTENSITY_PATH, NdArray::from_vec(intensity))
            .with(IMAGE_PATH, NdArray::new(vec![count, self.image_width], image)?)
            .with(TRACE_PATH, NdArray::new(vec![count, self.trace_len], trace)?)
            .with("scan/delay", NdArray::scalar(index as f64))
            .with(
                "meta/mode",
                Dataset::Text {
                    values: vec!["pump".to_string()],
                },
            );
        Ok(file)
    }

    /// Generates every file of the run.
    pub fn generate(&self) -> Result<Vec<(String, ShotFile)>, ShotError> {
        (0..self.files)
            .map(|index| Ok((Self::file_name(index), self.generate_file(index)?)))
            .collect()
    }

    /// Generates the run into an in-memory store.
    pub fn memory_store(&self) -> Result<MemoryStore, ShotError> {
        Ok(self.generate()?.into_iter().collect())
    }

    /// Writes the run into `dir` and returns the written paths.
    pub fn write_run(&self, dir: &Path) -> Result<Vec<PathBuf>, ShotError> {
        let mut written = Vec::with_capacity(self.files);
        for (name, file) in self.generate()? {
            let path = dir.join(&name);
            file.write(&path)?;
            log::debug!("wrote synthetic shot file {}", path.display());
            written.push(path);
        }
        Ok(written)
    }
}
