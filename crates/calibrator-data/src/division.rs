//! Detection and narrowing of response discontinuities.
//!
//! Receiver front ends switch filter banks and LO ranges at fixed
//! frequencies, producing step discontinuities in the calibrated
//! response. Interpolating across one of those steps is wrong, so the
//! grid records them as divisions and the lookup snaps to a boundary
//! instead. This module finds candidate steps in a swept response and
//! iteratively re-sweeps across each one to pin down tight bounds.

use crate::interp::remove_duplicates;

/// Narrowed bounds of one discontinuity, suitable for recording in a
/// calibration file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DivisionBounds {
    pub lower: f64,
    pub upper: f64,
}

/// Result of narrowing one division candidate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NarrowOutcome {
    Narrowed(DivisionBounds),
    /// The re-sweep at a stricter threshold found nothing; the
    /// candidate was noise.
    FalsePositive,
}

/// Tuning for [`narrow_division`].
#[derive(Debug, Clone, Copy)]
pub struct NarrowSettings {
    /// Stop once the bounds are closer together than this, in Hz.
    pub resolution: f64,
    /// Fraction of the current width swept beyond each bound.
    pub buffer_fraction: f64,
    /// Slope averaging half-width, in samples.
    pub averaging_factor: usize,
    /// Number of frequency steps per re-sweep.
    pub steps: usize,
    /// Ratio threshold for the re-sweeps. Stricter than the threshold
    /// used for the initial detection, since the structure is known to
    /// be there.
    pub slope_ratio_threshold: f64,
}

impl Default for NarrowSettings {
    fn default() -> Self {
        Self {
            resolution: 1e4,
            buffer_fraction: 0.25,
            averaging_factor: 2,
            steps: 20,
            slope_ratio_threshold: 2.0,
        }
    }
}

/// Find discontinuity candidates in a swept response.
///
/// For each adjacent pair the absolute slope is computed, then every
/// slope is compared against the average of its `2d + 1` wide
/// neighborhood with and without itself. A slope whose with/without
/// ratio deviates from unity by more than `threshold`, and which is a
/// local maximum of that deviation, marks a candidate.
///
/// Returns slope indices: a returned `i` means the step sits between
/// `x[i]` and `x[i + 1]`. Needs at least `2d + 2` samples; fewer
/// return no candidates.
pub fn determine_divisions(x: &[f64], y: &[f64], d: usize, threshold: f64) -> Vec<usize> {
    debug_assert_eq!(x.len(), y.len());
    if x.len() < 2 * d + 2 {
        return Vec::new();
    }

    let m: Vec<f64> = (0..x.len() - 1)
        .map(|i| ((y[i + 1] - y[i]) / (x[i + 1] - x[i])).abs())
        .collect();

    // Deviation of each interior slope from its neighborhood average.
    let width = 2 * d + 1;
    let m_d: Vec<f64> = (0..m.len() - 2 * d)
        .map(|i| {
            let sum: f64 = m[i..i + width].iter().sum();
            let with_center = sum / width as f64;
            let without_center = (sum - m[i + d]) / (2 * d) as f64;
            (with_center / without_center - 1.0).abs()
        })
        .collect();

    let mut candidates = Vec::new();
    for i in 0..m_d.len() {
        if m_d[i] <= threshold {
            continue;
        }
        let peak = if i == 0 {
            m_d.len() == 1 || m_d[i] > m_d[i + 1]
        } else if i == m_d.len() - 1 {
            m_d[i] > m_d[i - 1]
        } else {
            m_d[i] > m_d[i + 1] && m_d[i] > m_d[i - 1]
        };
        if peak {
            // Offset back from deviation index to slope index.
            candidates.push(i + d);
        }
    }
    candidates
}

/// Iteratively narrow one division candidate by re-sweeping across it.
///
/// `sweep` runs a measurement over `[min, max]` in `steps` linear steps
/// and returns the frequencies actually tuned and the measured values.
/// Each pass sweeps the current bounds plus a buffer, re-runs
/// [`determine_divisions`] at the stricter narrowing threshold, and
/// tightens the bounds to the flagged sample pair. Narrowing stops when
/// the bounds fall under `resolution`, or when the receiver's tuning
/// resolution is reached and the sweep starts producing duplicate
/// frequencies. A pass with too few distinct samples widens the bounds
/// and retries; a pass with no candidate declares a false positive.
pub fn narrow_division<E, F>(
    initial: DivisionBounds,
    settings: &NarrowSettings,
    mut sweep: F,
) -> Result<NarrowOutcome, E>
where
    F: FnMut(f64, f64, usize) -> Result<(Vec<f64>, Vec<f64>), E>,
{
    let d = settings.averaging_factor;
    let mut lower = initial.lower;
    let mut upper = initial.upper;

    loop {
        log::debug!("division currently between [{lower} Hz, {upper} Hz]");
        let buffer = (upper - lower) * settings.buffer_fraction;
        let (freqs, values) = sweep(lower - buffer, upper + buffer, settings.steps)?;

        // Duplicate tunes mean the requested step is below the
        // receiver's tuning resolution.
        let before_dedup = freqs.len();
        let (freqs, values) = remove_duplicates(&freqs, &values);

        // The detector needs a margin of samples around the step.
        if freqs.len() < 2 * d + 8 {
            lower -= buffer;
            upper += buffer;
            log::debug!("narrowed too far, widening bounds before re-running");
            continue;
        }

        let candidates =
            determine_divisions(&freqs, &values, d, settings.slope_ratio_threshold);
        if candidates.is_empty() {
            log::warn!("re-sweep found no discontinuity, assuming a false positive");
            return Ok(NarrowOutcome::FalsePositive);
        }
        if candidates.len() > 1 {
            log::warn!(
                "re-sweep found {} discontinuities, assuming the first",
                candidates.len()
            );
        }
        let i = candidates[0];
        lower = freqs[i];
        upper = freqs[i + 1];
        log::debug!("narrowed division to [{lower} Hz, {upper} Hz]");

        if upper - lower < settings.resolution || freqs.len() != before_dedup {
            return Ok(NarrowOutcome::Narrowed(DivisionBounds { lower, upper }));
        }
    }
}
