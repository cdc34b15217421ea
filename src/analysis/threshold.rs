// Adaptive per-band thresholding
//
// Each sub-band is judged against its own recent history rather than a fixed
// level: energies are normalized by the band's window maximum, and the
// trigger threshold is a linear function of the normalized window variance.
// With the negative slope, a quiet band (low variance) needs to exceed a
// high multiple of its average to flag, while a busy band flags more easily.
//
// Per band i:
//   max     = max(history[..][i])            (0 -> everything normalizes to 0)
//   norm(x) = x / max
//   thr     = variance_slope * var(norm history) + variance_intercept
//   flag    = norm(current) > thr * avg(norm history) / average_divisor
//          OR norm(current) > absolute_floor

use crate::analysis::history::EnergyHistory;
use crate::config::ThresholdConfig;

/// Compute the per-band beat flags for one frame.
///
/// `current` must have the same band count as the vectors in `history`.
/// Stateless: the caller rotates the history after detection, so the window
/// never includes the frame under test.
pub fn beat_flags(
    current: &[f64],
    history: &EnergyHistory,
    config: &ThresholdConfig,
) -> Vec<bool> {
    let window_len = history.len();
    let mut flags = vec![false; current.len()];

    for (band, flag) in flags.iter_mut().enumerate() {
        let max_energy = history
            .band_iter(band)
            .fold(0.0f64, |acc, e| if e > acc { e } else { acc });

        // Zero max only happens during initial silence; define everything as
        // 0 rather than dividing.
        let normalize = |e: f64| if max_energy > 0.0 { e / max_energy } else { 0.0 };

        let norm_current = normalize(current[band]);

        let norm_avg =
            history.band_iter(band).map(normalize).sum::<f64>() / window_len as f64;
        let norm_var = history
            .band_iter(band)
            .map(normalize)
            .map(|e| {
                let d = e - norm_avg;
                d * d
            })
            .sum::<f64>()
            / window_len as f64;

        let threshold = config.variance_slope * norm_var + config.variance_intercept;

        *flag = norm_current > threshold * norm_avg / config.average_divisor
            || norm_current > config.absolute_floor;
    }

    flags
}
