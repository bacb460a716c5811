use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::GeoHazardError;
use crate::types::{with_metadata, ComputationOutput};
use crate::GeoHazardResult;

/// Bootstrap runs with fewer valid resamples than this are flagged.
const LOW_CONFIDENCE_FLOOR: u32 = 100;

// ---------------------------------------------------------------------------
// Input / Output
// ---------------------------------------------------------------------------

/// Predicted probabilities paired with observed hazard occurrence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationInput {
    /// Probability of hazard occurrence per location, in [0, 1].
    pub predicted: Vec<f64>,
    /// Observed occurrence per location: 0 or 1.
    pub actual: Vec<u8>,
    /// Classification threshold.
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    /// Bootstrap resamples for the AUC confidence interval.
    #[serde(default = "default_n_bootstrap")]
    pub n_bootstrap: u32,
    /// Confidence level for the AUC interval, in (0, 1).
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    /// Seed for the bootstrap resampler.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_threshold() -> f64 {
    0.5
}

fn default_n_bootstrap() -> u32 {
    1000
}

fn default_confidence() -> f64 {
    0.95
}

fn default_seed() -> u64 {
    42
}

/// Confusion counts at the classification threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionCounts {
    pub true_positives: u64,
    pub true_negatives: u64,
    pub false_positives: u64,
    pub false_negatives: u64,
}

impl ConfusionCounts {
    pub fn total(&self) -> u64 {
        self.true_positives + self.true_negatives + self.false_positives + self.false_negatives
    }
}

/// Bootstrap confidence interval for the AUC.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BootstrapCi {
    /// Mean AUC across valid resamples.
    pub mean: f64,
    pub lower: f64,
    pub upper: f64,
    /// Resamples that contained both classes.
    pub valid_iterations: u32,
    /// Fewer than 100 valid resamples.
    pub low_confidence: bool,
}

/// Qualitative model tier by AUC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PerformanceTier {
    Excellent,
    Good,
    Acceptable,
    Poor,
    Fail,
}

/// Full validation report for one prediction set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub threshold: f64,
    pub confusion: ConfusionCounts,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub specificity: f64,
    pub f1: f64,
    pub kappa: f64,
    pub auc: f64,
    pub auc_ci: BootstrapCi,
    pub tier: PerformanceTier,
    /// Bootstrap resamples requested for the confidence interval.
    pub n_bootstrap: u32,
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

pub(crate) fn validate_sample(predicted: &[f64], actual: &[u8]) -> GeoHazardResult<()> {
    if predicted.is_empty() {
        return Err(GeoHazardError::InsufficientData(
            "At least one prediction is required.".into(),
        ));
    }
    if predicted.len() != actual.len() {
        return Err(GeoHazardError::InvalidInput {
            field: "actual".into(),
            reason: format!(
                "Length {} does not match {} predictions",
                actual.len(),
                predicted.len()
            ),
        });
    }
    if predicted.iter().any(|p| !p.is_finite() || !(0.0..=1.0).contains(p)) {
        return Err(GeoHazardError::InvalidInput {
            field: "predicted".into(),
            reason: "Probabilities must lie in [0, 1]".into(),
        });
    }
    if actual.iter().any(|&a| a > 1) {
        return Err(GeoHazardError::InvalidInput {
            field: "actual".into(),
            reason: "Observed values must be 0 or 1".into(),
        });
    }
    Ok(())
}

fn validate_input(input: &ValidationInput) -> GeoHazardResult<()> {
    validate_sample(&input.predicted, &input.actual)?;
    if !input.threshold.is_finite() || !(0.0..=1.0).contains(&input.threshold) {
        return Err(GeoHazardError::InvalidInput {
            field: "threshold".into(),
            reason: format!("Must lie in [0, 1], got {}", input.threshold),
        });
    }
    if !input.confidence.is_finite() || input.confidence <= 0.0 || input.confidence >= 1.0 {
        return Err(GeoHazardError::InvalidInput {
            field: "confidence".into(),
            reason: format!("Must lie in (0, 1), got {}", input.confidence),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Threshold metrics
// ---------------------------------------------------------------------------

pub(crate) fn confusion_counts(predicted: &[f64], actual: &[u8], threshold: f64) -> ConfusionCounts {
    let mut counts = ConfusionCounts {
        true_positives: 0,
        true_negatives: 0,
        false_positives: 0,
        false_negatives: 0,
    };
    for (&p, &a) in predicted.iter().zip(actual) {
        let positive = p >= threshold;
        match (positive, a == 1) {
            (true, true) => counts.true_positives += 1,
            (false, false) => counts.true_negatives += 1,
            (true, false) => counts.false_positives += 1,
            (false, true) => counts.false_negatives += 1,
        }
    }
    counts
}

/// Ratio with a 0 fallback on a zero denominator.
fn safe_ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

fn cohens_kappa(counts: &ConfusionCounts) -> f64 {
    let n = counts.total() as f64;
    if n == 0.0 {
        return 0.0;
    }
    let tp = counts.true_positives as f64;
    let tn = counts.true_negatives as f64;
    let fp = counts.false_positives as f64;
    let fn_ = counts.false_negatives as f64;

    let observed = (tp + tn) / n;
    let expected =
        ((tp + fp) / n) * ((tp + fn_) / n) + ((tn + fn_) / n) * ((tn + fp) / n);
    if expected >= 1.0 {
        0.0
    } else {
        (observed - expected) / (1.0 - expected)
    }
}

// ---------------------------------------------------------------------------
// AUC-ROC
// ---------------------------------------------------------------------------

/// Trapezoidal AUC-ROC with tied scores grouped into one ROC step.
/// Single-class ground truth yields 0.5.
pub(crate) fn roc_auc(predicted: &[f64], actual: &[u8]) -> f64 {
    let total_pos = actual.iter().filter(|&&a| a == 1).count();
    let total_neg = actual.len() - total_pos;
    if total_pos == 0 || total_neg == 0 {
        return 0.5;
    }

    let mut sorted: Vec<(f64, u8)> = predicted
        .iter()
        .copied()
        .zip(actual.iter().copied())
        .collect();
    sorted.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

    let mut auc = 0.0;
    let mut tp = 0u64;
    let mut fp = 0u64;
    let mut prev_tp = 0u64;
    let mut prev_fp = 0u64;

    let mut i = 0usize;
    while i < sorted.len() {
        let score = sorted[i].0;
        while i < sorted.len() && sorted[i].0 == score {
            if sorted[i].1 == 1 {
                tp += 1;
            } else {
                fp += 1;
            }
            i += 1;
        }
        let tpr = tp as f64 / total_pos as f64;
        let fpr = fp as f64 / total_neg as f64;
        let prev_tpr = prev_tp as f64 / total_pos as f64;
        let prev_fpr = prev_fp as f64 / total_neg as f64;
        auc += (fpr - prev_fpr) * (tpr + prev_tpr) / 2.0;
        prev_tp = tp;
        prev_fp = fp;
    }

    auc
}

/// AUC per bootstrap resample. Index draws come off the seeded RNG
/// sequentially, so the stream never depends on which resamples end up
/// evaluated; single-class resamples are skipped.
pub(crate) fn bootstrap_aucs(
    predicted: &[f64],
    actual: &[u8],
    iterations: u32,
    seed: u64,
) -> Vec<f64> {
    let n = predicted.len();
    let mut rng = StdRng::seed_from_u64(seed);
    let mut aucs = Vec::with_capacity(iterations as usize);
    for _ in 0..iterations {
        let indices: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
        let resampled_actual: Vec<u8> = indices.iter().map(|&i| actual[i]).collect();
        let first = resampled_actual[0];
        if resampled_actual.iter().all(|&a| a == first) {
            continue;
        }
        let resampled_predicted: Vec<f64> = indices.iter().map(|&i| predicted[i]).collect();
        aucs.push(roc_auc(&resampled_predicted, &resampled_actual));
    }
    aucs
}

/// Percentile of a **sorted** slice using linear interpolation.
fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        sorted[lower]
    } else {
        let frac = rank - lower as f64;
        sorted[lower] * (1.0 - frac) + sorted[upper] * frac
    }
}

fn bootstrap_ci(
    point_auc: f64,
    predicted: &[f64],
    actual: &[u8],
    iterations: u32,
    confidence: f64,
    seed: u64,
) -> BootstrapCi {
    let mut aucs = bootstrap_aucs(predicted, actual, iterations, seed);
    let valid_iterations = aucs.len() as u32;

    if aucs.is_empty() {
        // Every resample was single-class: degrade to the point estimate.
        return BootstrapCi {
            mean: point_auc,
            lower: point_auc,
            upper: point_auc,
            valid_iterations: 0,
            low_confidence: true,
        };
    }

    aucs.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mean = aucs.iter().sum::<f64>() / aucs.len() as f64;
    let alpha = 1.0 - confidence;
    BootstrapCi {
        mean,
        lower: percentile_sorted(&aucs, alpha / 2.0 * 100.0),
        upper: percentile_sorted(&aucs, (1.0 - alpha / 2.0) * 100.0),
        valid_iterations,
        low_confidence: valid_iterations < LOW_CONFIDENCE_FLOOR,
    }
}

/// Qualitative tier for an AUC value.
pub(crate) fn classify_auc(auc: f64) -> PerformanceTier {
    if auc >= 0.9 {
        PerformanceTier::Excellent
    } else if auc >= 0.8 {
        PerformanceTier::Good
    } else if auc >= 0.7 {
        PerformanceTier::Acceptable
    } else if auc >= 0.6 {
        PerformanceTier::Poor
    } else {
        PerformanceTier::Fail
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Validate predicted probabilities against observed hazard occurrence.
///
/// Identical inputs and seed produce a byte-identical report.
pub fn evaluate_predictions(
    input: &ValidationInput,
) -> GeoHazardResult<ComputationOutput<ValidationReport>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    validate_input(input)?;

    let confusion = confusion_counts(&input.predicted, &input.actual, input.threshold);
    let tp = confusion.true_positives as f64;
    let tn = confusion.true_negatives as f64;
    let fp = confusion.false_positives as f64;
    let fn_ = confusion.false_negatives as f64;
    let n = confusion.total() as f64;

    let accuracy = safe_ratio(tp + tn, n);
    let precision = safe_ratio(tp, tp + fp);
    let recall = safe_ratio(tp, tp + fn_);
    let specificity = safe_ratio(tn, tn + fp);
    let f1 = safe_ratio(2.0 * precision * recall, precision + recall);
    let kappa = cohens_kappa(&confusion);

    let single_class = input.actual.iter().all(|&a| a == input.actual[0]);
    if single_class {
        warnings.push("Ground truth contains a single class; AUC defaults to 0.5".into());
    }
    let auc = roc_auc(&input.predicted, &input.actual);
    let auc_ci = bootstrap_ci(
        auc,
        &input.predicted,
        &input.actual,
        input.n_bootstrap,
        input.confidence,
        input.seed,
    );
    if auc_ci.low_confidence {
        warnings.push(format!(
            "Only {} of {} bootstrap resamples were valid; interval is low-confidence",
            auc_ci.valid_iterations, input.n_bootstrap
        ));
    }

    let report = ValidationReport {
        threshold: input.threshold,
        confusion,
        accuracy,
        precision,
        recall,
        specificity,
        f1,
        kappa,
        auc,
        auc_ci,
        tier: classify_auc(auc),
        n_bootstrap: input.n_bootstrap,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Hazard Prediction Validation",
        &serde_json::json!({
            "n_locations": input.predicted.len(),
            "threshold": input.threshold,
            "n_bootstrap": input.n_bootstrap,
            "confidence": input.confidence,
            "seed": input.seed,
        }),
        warnings,
        elapsed,
        report,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SEED: u64 = 42;

    fn approx_eq(a: f64, b: f64, eps: f64) -> bool {
        (a - b).abs() < eps
    }

    fn input(predicted: Vec<f64>, actual: Vec<u8>) -> ValidationInput {
        ValidationInput {
            predicted,
            actual,
            threshold: 0.5,
            n_bootstrap: 200,
            confidence: 0.95,
            seed: SEED,
        }
    }

    fn mixed_input() -> ValidationInput {
        input(
            vec![0.9, 0.8, 0.7, 0.65, 0.6, 0.45, 0.4, 0.3, 0.2, 0.1],
            vec![1, 1, 0, 1, 1, 0, 1, 0, 0, 0],
        )
    }

    // --- Confusion and derived metrics ---

    #[test]
    fn test_confusion_counts_sum_to_n() {
        let out = evaluate_predictions(&mixed_input()).unwrap();
        assert_eq!(out.result.confusion.total(), 10);
    }

    #[test]
    fn test_confusion_counts_values() {
        let out = evaluate_predictions(&mixed_input()).unwrap();
        let c = &out.result.confusion;
        assert_eq!(c.true_positives, 4);
        assert_eq!(c.false_positives, 1);
        assert_eq!(c.false_negatives, 1);
        assert_eq!(c.true_negatives, 4);
    }

    #[test]
    fn test_threshold_boundary_counts_as_positive() {
        let out = evaluate_predictions(&input(vec![0.5, 0.4], vec![1, 0])).unwrap();
        assert_eq!(out.result.confusion.true_positives, 1);
        assert_eq!(out.result.confusion.true_negatives, 1);
    }

    #[test]
    fn test_derived_metrics() {
        let out = evaluate_predictions(&mixed_input()).unwrap();
        let r = &out.result;
        assert!(approx_eq(r.accuracy, 0.8, 1e-12));
        assert!(approx_eq(r.precision, 0.8, 1e-12));
        assert!(approx_eq(r.recall, 0.8, 1e-12));
        assert!(approx_eq(r.specificity, 0.8, 1e-12));
        assert!(approx_eq(r.f1, 0.8, 1e-12));
    }

    #[test]
    fn test_precision_zero_when_no_positive_predictions() {
        let out = evaluate_predictions(&input(vec![0.1, 0.2, 0.3], vec![1, 0, 1])).unwrap();
        assert_eq!(out.result.precision, 0.0);
        assert_eq!(out.result.recall, 0.0);
        assert_eq!(out.result.f1, 0.0);
    }

    #[test]
    fn test_specificity_zero_when_no_actual_negatives() {
        let out = evaluate_predictions(&input(vec![0.9, 0.8], vec![1, 1])).unwrap();
        assert_eq!(out.result.specificity, 0.0);
    }

    // --- Kappa ---

    #[test]
    fn test_kappa_perfect_balanced_agreement() {
        let out =
            evaluate_predictions(&input(vec![0.9, 0.8, 0.1, 0.2], vec![1, 1, 0, 0])).unwrap();
        assert_eq!(out.result.kappa, 1.0);
    }

    #[test]
    fn test_kappa_zero_when_expected_agreement_is_total() {
        // Everything predicted and observed positive: pe = 1.
        let out = evaluate_predictions(&input(vec![0.9, 0.8], vec![1, 1])).unwrap();
        assert_eq!(out.result.kappa, 0.0);
    }

    #[test]
    fn test_kappa_negative_for_systematic_disagreement() {
        let out =
            evaluate_predictions(&input(vec![0.9, 0.8, 0.1, 0.2], vec![0, 0, 1, 1])).unwrap();
        assert!(out.result.kappa < 0.0);
    }

    // --- AUC ---

    #[test]
    fn test_perfect_separation_auc_one_tier_excellent() {
        let out = evaluate_predictions(&input(
            vec![0.9, 0.85, 0.8, 0.2, 0.15, 0.1],
            vec![1, 1, 1, 0, 0, 0],
        ))
        .unwrap();
        assert_eq!(out.result.auc, 1.0);
        assert_eq!(out.result.tier, PerformanceTier::Excellent);
    }

    #[test]
    fn test_inverted_predictions_auc_zero() {
        let out =
            evaluate_predictions(&input(vec![0.9, 0.1], vec![0, 1])).unwrap();
        assert_eq!(out.result.auc, 0.0);
    }

    #[test]
    fn test_single_class_auc_half_with_warning() {
        let out = evaluate_predictions(&input(vec![0.9, 0.8, 0.7], vec![1, 1, 1])).unwrap();
        assert_eq!(out.result.auc, 0.5);
        assert!(out.warnings.iter().any(|w| w.contains("single class")));
    }

    #[test]
    fn test_tied_scores_handled() {
        let out = evaluate_predictions(&input(
            vec![0.5, 0.5, 0.5, 0.5],
            vec![1, 0, 1, 0],
        ))
        .unwrap();
        assert!(approx_eq(out.result.auc, 0.5, 1e-12));
    }

    #[test]
    fn test_classify_auc_tiers() {
        assert_eq!(classify_auc(0.95), PerformanceTier::Excellent);
        assert_eq!(classify_auc(0.9), PerformanceTier::Excellent);
        assert_eq!(classify_auc(0.85), PerformanceTier::Good);
        assert_eq!(classify_auc(0.75), PerformanceTier::Acceptable);
        assert_eq!(classify_auc(0.65), PerformanceTier::Poor);
        assert_eq!(classify_auc(0.5), PerformanceTier::Fail);
    }

    // --- Bootstrap CI ---

    #[test]
    fn test_bootstrap_reproducible_with_seed() {
        let a = evaluate_predictions(&mixed_input()).unwrap();
        let b = evaluate_predictions(&mixed_input()).unwrap();
        assert_eq!(a.result.auc_ci, b.result.auc_ci);
    }

    #[test]
    fn test_bootstrap_bounds_ordered_and_in_range() {
        let out = evaluate_predictions(&mixed_input()).unwrap();
        let ci = &out.result.auc_ci;
        assert!(ci.lower <= ci.upper);
        assert!((0.0..=1.0).contains(&ci.lower));
        assert!((0.0..=1.0).contains(&ci.upper));
        assert!((0.0..=1.0).contains(&ci.mean));
    }

    #[test]
    fn test_bootstrap_low_confidence_flagged() {
        let mut inp = mixed_input();
        inp.n_bootstrap = 50;
        let out = evaluate_predictions(&inp).unwrap();
        assert!(out.result.auc_ci.low_confidence);
        assert!(out.warnings.iter().any(|w| w.contains("low-confidence")));
    }

    #[test]
    fn test_bootstrap_single_class_degrades_to_point() {
        let out = evaluate_predictions(&input(vec![0.9, 0.8], vec![1, 1])).unwrap();
        let ci = &out.result.auc_ci;
        assert_eq!(ci.valid_iterations, 0);
        assert_eq!(ci.mean, 0.5);
        assert_eq!(ci.lower, 0.5);
        assert_eq!(ci.upper, 0.5);
        assert!(ci.low_confidence);
    }

    #[test]
    fn test_bootstrap_seed_changes_draws() {
        let a = evaluate_predictions(&mixed_input()).unwrap();
        let mut inp = mixed_input();
        inp.seed = 7;
        let b = evaluate_predictions(&inp).unwrap();
        // Same point estimate, different resample stream.
        assert_eq!(a.result.auc, b.result.auc);
        assert_ne!(a.result.auc_ci, b.result.auc_ci);
    }

    // --- Input validation ---

    #[test]
    fn test_reject_length_mismatch() {
        assert!(evaluate_predictions(&input(vec![0.5], vec![1, 0])).is_err());
    }

    #[test]
    fn test_reject_empty() {
        assert!(evaluate_predictions(&input(vec![], vec![])).is_err());
    }

    #[test]
    fn test_reject_probability_out_of_range() {
        assert!(evaluate_predictions(&input(vec![1.5, 0.5], vec![1, 0])).is_err());
    }

    #[test]
    fn test_reject_non_binary_actual() {
        assert!(evaluate_predictions(&input(vec![0.5, 0.5], vec![2, 0])).is_err());
    }

    #[test]
    fn test_reject_bad_threshold() {
        let mut inp = mixed_input();
        inp.threshold = 1.5;
        assert!(evaluate_predictions(&inp).is_err());
    }

    #[test]
    fn test_reject_bad_confidence() {
        let mut inp = mixed_input();
        inp.confidence = 1.0;
        assert!(evaluate_predictions(&inp).is_err());
    }

    #[test]
    fn test_serialization_roundtrip() {
        let out = evaluate_predictions(&mixed_input()).unwrap();
        let json = serde_json::to_string(&out.result).unwrap();
        let _: ValidationReport = serde_json::from_str(&json).unwrap();
    }
}
