//! Periodic source/modulator classification of shots into four conditions.

use serde::{Deserialize, Serialize};
use shot_core::errors::{ErrorInfo, ShotError};

/// Number of conditions.
pub const CONDITIONS: usize = 4;

/// Crossing of the source and modulator on/off states, in output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Condition {
    /// Source on, modulator on.
    SourceOnModulatorOn = 0,
    /// Source off, modulator on.
    SourceOffModulatorOn = 1,
    /// Source on, modulator off.
    SourceOnModulatorOff = 2,
    /// Source off, modulator off.
    SourceOffModulatorOff = 3,
}

impl Condition {
    /// All conditions in output order.
    pub const ALL: [Condition; CONDITIONS] = [
        Condition::SourceOnModulatorOn,
        Condition::SourceOffModulatorOn,
        Condition::SourceOnModulatorOff,
        Condition::SourceOffModulatorOff,
    ];

    /// Condition of a shot with the given effective flags.
    pub fn from_flags(source_off: bool, modulator_off: bool) -> Self {
        match (source_off, modulator_off) {
            (false, false) => Condition::SourceOnModulatorOn,
            (true, false) => Condition::SourceOffModulatorOn,
            (false, true) => Condition::SourceOnModulatorOff,
            (true, true) => Condition::SourceOffModulatorOff,
        }
    }

    /// Position along the condition axis.
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Which periodic signals separate shots into their own conditions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Splits {
    /// Separate source-off shots.
    pub source: bool,
    /// Separate modulator-off shots.
    pub modulator: bool,
}

impl Splits {
    /// Both splits active.
    pub fn both() -> Self {
        Self {
            source: true,
            modulator: true,
        }
    }

    /// Whether any split is requested.
    pub fn any(&self) -> bool {
        self.source || self.modulator
    }
}

/// Per-shot "off" flags of the two periodic signals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShotFlags {
    /// `true` where the source is off.
    pub source_off: Vec<bool>,
    /// `true` where the modulator is off.
    pub modulator_off: Vec<bool>,
}

fn off_flags(shots: &[i64], period: i64, offset: i64) -> Vec<bool> {
    if period <= 0 {
        return vec![false; shots.len()];
    }
    shots
        .iter()
        .map(|shot| (shot - offset).rem_euclid(period) == 0)
        .collect()
}

/// Flags shots whose index sits at the "off" phase of each signal.
///
/// A non-positive period is unknown and flags no shot.
pub fn classify(
    shots: &[i64],
    source_period: i64,
    source_offset: i64,
    modulator_period: i64,
    modulator_offset: i64,
) -> ShotFlags {
    ShotFlags {
        source_off: off_flags(shots, source_period, source_offset),
        modulator_off: off_flags(shots, modulator_period, modulator_offset),
    }
}

impl ShotFlags {
    /// Number of shots.
    pub fn len(&self) -> usize {
        self.source_off.len()
    }

    /// True for an empty file.
    pub fn is_empty(&self) -> bool {
        self.source_off.is_empty()
    }

    /// Condition masks in output order; an inactive split folds "off" into "on".
    ///
    /// The four masks partition the shots.
    pub fn condition_masks(&self, splits: Splits) -> [Vec<bool>; CONDITIONS] {
        let mut masks: [Vec<bool>; CONDITIONS] = Default::default();
        for mask in &mut masks {
            *mask = vec![false; self.len()];
        }
        for (shot, (source_off, modulator_off)) in self
            .source_off
            .iter()
            .zip(&self.modulator_off)
            .enumerate()
        {
            let condition = Condition::from_flags(
                splits.source && *source_off,
                splits.modulator && *modulator_off,
            );
            masks[condition.index()][shot] = true;
        }
        masks
    }
}

/// Phase `0..period` whose reference samples have the lowest mean magnitude.
///
/// `values` holds one reference value per shot. Ties go to the lowest phase;
/// phases without samples are skipped.
pub fn detect_modulator_offset(
    shots: &[i64],
    values: &[f64],
    period: i64,
) -> Result<i64, ShotError> {
    if period <= 0 {
        return Err(ShotError::Classify(
            ErrorInfo::new("modulator_period", "cannot detect an offset without a period")
                .with_context("period", period.to_string()),
        ));
    }
    if shots.len() != values.len() {
        return Err(ShotError::Classify(
            ErrorInfo::new("reference_length", "reference signal is not per-shot")
                .with_context("shots", shots.len().to_string())
                .with_context("values", values.len().to_string()),
        ));
    }
    let mut totals = vec![0.0; period as usize];
    let mut counts = vec![0usize; period as usize];
    for (shot, value) in shots.iter().zip(values) {
        let phase = shot.rem_euclid(period) as usize;
        totals[phase] += value.abs();
        counts[phase] += 1;
    }
    let mut best: Option<(i64, f64)> = None;
    for (phase, (total, count)) in totals.iter().zip(&counts).enumerate() {
        if *count == 0 {
            continue;
        }
        let mean = total / *count as f64;
        if best.map(|(_, lowest)| mean < lowest).unwrap_or(true) {
            best = Some((phase as i64, mean));
        }
    }
    best.map(|(phase, _)| phase).ok_or_else(|| {
        ShotError::Classify(ErrorInfo::new(
            "reference_empty",
            "reference signal has no samples",
        ))
    })
}
