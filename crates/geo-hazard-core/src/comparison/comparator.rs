//! Multi-model comparison over one labeled location set.
//!
//! Models register their probability output and hard class predictions,
//! the ground truth is set once, then every comparison runs the
//! validation engine per model and two pairwise tests per model pair:
//! a bootstrap-approximated DeLong AUC test and a continuity-corrected
//! McNemar test. The DeLong variant here estimates standard errors by
//! seeded bootstrap and the AUC covariance through the Pearson
//! correlation of the raw probability vectors; it is deliberately not
//! the placement-based textbook algorithm.

use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::comparison::pairwise::{
    chi_square_survival_df1, normal_two_sided_p, pearson_correlation, sample_std_dev,
    PairwiseTestResult,
};
use crate::error::GeoHazardError;
use crate::types::{with_metadata, ComputationOutput};
use crate::validation::engine::{
    bootstrap_aucs, evaluate_predictions, roc_auc, validate_sample, ValidationInput,
    ValidationReport,
};
use crate::GeoHazardResult;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Fixed parameters shared by every comparison run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparatorConfig {
    pub threshold: f64,
    pub n_bootstrap: u32,
    pub confidence: f64,
    pub seed: u64,
    /// Bootstrap resamples behind each DeLong standard error.
    pub delong_resamples: u32,
    pub significance_level: f64,
}

impl Default for ComparatorConfig {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            n_bootstrap: 1000,
            confidence: 0.95,
            seed: 42,
            delong_resamples: 500,
            significance_level: 0.05,
        }
    }
}

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// Per-model validation metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub model: String,
    pub report: ValidationReport,
    /// Area under cumulative hazards vs cumulative area, locations sorted
    /// by descending probability.
    pub success_rate_auc: f64,
}

/// One row of the comparison summary table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSummaryRow {
    pub rank: usize,
    pub model: String,
    pub auc: f64,
    pub success_rate_auc: f64,
    pub accuracy: f64,
    pub f1: f64,
    pub kappa: f64,
}

/// Full multi-model comparison report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonReport {
    /// Metrics per model, in registration order.
    pub models: Vec<ModelMetrics>,
    /// DeLong and McNemar results for every unordered model pair.
    pub pairwise_tests: Vec<PairwiseTestResult>,
    /// Model names by descending AUC.
    pub ranking: Vec<String>,
    /// Summary rows, best model first.
    pub summary: Vec<ModelSummaryRow>,
}

// ---------------------------------------------------------------------------
// Comparator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct RegisteredModel {
    name: String,
    probabilities: Vec<f64>,
    predicted_classes: Vec<u8>,
}

/// Compares named models against one ground truth.
#[derive(Debug, Clone, Default)]
pub struct ModelComparator {
    config: ComparatorConfig,
    models: Vec<RegisteredModel>,
    ground_truth: Option<Vec<u8>>,
}

impl ModelComparator {
    pub fn new() -> Self {
        Self::with_config(ComparatorConfig::default())
    }

    pub fn with_config(config: ComparatorConfig) -> Self {
        Self {
            config,
            models: Vec::new(),
            ground_truth: None,
        }
    }

    /// Register a model's probability output and hard class predictions.
    /// Re-registering a name replaces its data, keeping the original
    /// registration order.
    pub fn register_model(
        &mut self,
        name: &str,
        probabilities: Vec<f64>,
        predicted_classes: Vec<u8>,
    ) -> GeoHazardResult<()> {
        if name.is_empty() {
            return Err(GeoHazardError::InvalidInput {
                field: "name".into(),
                reason: "Model name must not be empty".into(),
            });
        }
        validate_sample(&probabilities, &predicted_classes)?;
        let model = RegisteredModel {
            name: name.to_string(),
            probabilities,
            predicted_classes,
        };
        match self.models.iter_mut().find(|m| m.name == name) {
            Some(existing) => *existing = model,
            None => self.models.push(model),
        }
        Ok(())
    }

    /// Set the observed hazard occurrence all models are scored against.
    pub fn set_ground_truth(&mut self, actual: Vec<u8>) -> GeoHazardResult<()> {
        if actual.is_empty() {
            return Err(GeoHazardError::InsufficientData(
                "Ground truth must not be empty.".into(),
            ));
        }
        if actual.iter().any(|&a| a > 1) {
            return Err(GeoHazardError::InvalidInput {
                field: "actual".into(),
                reason: "Observed values must be 0 or 1".into(),
            });
        }
        self.ground_truth = Some(actual);
        Ok(())
    }

    fn truth(&self) -> GeoHazardResult<&[u8]> {
        self.ground_truth
            .as_deref()
            .ok_or_else(|| GeoHazardError::Configuration("Ground truth has not been set".into()))
    }

    fn model(&self, name: &str) -> GeoHazardResult<&RegisteredModel> {
        self.models
            .iter()
            .find(|m| m.name == name)
            .ok_or_else(|| {
                GeoHazardError::Configuration(format!("Model '{name}' is not registered"))
            })
    }

    /// Comparison precondition: ground truth set, at least two models,
    /// every model aligned with the truth length.
    fn ensure_ready(&self) -> GeoHazardResult<&[u8]> {
        let truth = self.truth()?;
        if self.models.len() < 2 {
            return Err(GeoHazardError::InvalidInput {
                field: "models".into(),
                reason: format!(
                    "At least 2 models are required for comparison, got {}",
                    self.models.len()
                ),
            });
        }
        for model in &self.models {
            if model.probabilities.len() != truth.len() {
                return Err(GeoHazardError::InvalidInput {
                    field: "models".into(),
                    reason: format!(
                        "Model '{}' has {} predictions for {} locations",
                        model.name,
                        model.probabilities.len(),
                        truth.len()
                    ),
                });
            }
        }
        Ok(truth)
    }

    // -----------------------------------------------------------------
    // Per-model metrics
    // -----------------------------------------------------------------

    /// Run the validation engine for every registered model.
    pub fn per_model_metrics(&self) -> GeoHazardResult<Vec<ModelMetrics>> {
        let (metrics, _) = self.metrics_with_warnings()?;
        Ok(metrics)
    }

    fn metrics_with_warnings(&self) -> GeoHazardResult<(Vec<ModelMetrics>, Vec<String>)> {
        let truth = self.ensure_ready()?;
        let mut metrics = Vec::with_capacity(self.models.len());
        let mut warnings = Vec::new();
        for model in &self.models {
            let evaluated = evaluate_predictions(&ValidationInput {
                predicted: model.probabilities.clone(),
                actual: truth.to_vec(),
                threshold: self.config.threshold,
                n_bootstrap: self.config.n_bootstrap,
                confidence: self.config.confidence,
                seed: self.config.seed,
            })?;
            warnings.extend(
                evaluated
                    .warnings
                    .iter()
                    .map(|w| format!("{}: {w}", model.name)),
            );
            metrics.push(ModelMetrics {
                model: model.name.clone(),
                report: evaluated.result,
                success_rate_auc: success_rate_auc(&model.probabilities, truth),
            });
        }
        Ok((metrics, warnings))
    }

    // -----------------------------------------------------------------
    // Pairwise tests
    // -----------------------------------------------------------------

    /// Bootstrap-approximated DeLong test on the two models' AUCs.
    pub fn delong_test(&self, model_a: &str, model_b: &str) -> GeoHazardResult<PairwiseTestResult> {
        let truth = self.ensure_ready()?;
        let a = self.model(model_a)?;
        let b = self.model(model_b)?;

        let auc_a = roc_auc(&a.probabilities, truth);
        let auc_b = roc_auc(&b.probabilities, truth);

        let se_a = sample_std_dev(&bootstrap_aucs(
            &a.probabilities,
            truth,
            self.config.delong_resamples,
            self.config.seed,
        ));
        let se_b = sample_std_dev(&bootstrap_aucs(
            &b.probabilities,
            truth,
            self.config.delong_resamples,
            self.config.seed,
        ));

        let correlation = pearson_correlation(&a.probabilities, &b.probabilities);
        let se_diff =
            (se_a * se_a + se_b * se_b - 2.0 * correlation * se_a * se_b).max(0.0).sqrt();
        let statistic = if se_diff == 0.0 {
            0.0
        } else {
            (auc_a - auc_b) / se_diff
        };
        let p_value = normal_two_sided_p(statistic)?;
        let significant = p_value < self.config.significance_level;

        let winner = if significant {
            Some(if auc_a >= auc_b {
                a.name.clone()
            } else {
                b.name.clone()
            })
        } else {
            None
        };

        Ok(PairwiseTestResult {
            test_name: "delong_bootstrap".into(),
            model_a: a.name.clone(),
            model_b: b.name.clone(),
            statistic,
            p_value,
            significant,
            winner,
        })
    }

    /// Continuity-corrected McNemar test on the two models' hard
    /// predictions.
    pub fn mcnemar_test(
        &self,
        model_a: &str,
        model_b: &str,
    ) -> GeoHazardResult<PairwiseTestResult> {
        let truth = self.ensure_ready()?;
        let a = self.model(model_a)?;
        let b = self.model(model_b)?;

        let mut a_only = 0u64;
        let mut b_only = 0u64;
        for i in 0..truth.len() {
            let a_correct = a.predicted_classes[i] == truth[i];
            let b_correct = b.predicted_classes[i] == truth[i];
            if a_correct && !b_correct {
                a_only += 1;
            } else if !a_correct && b_correct {
                b_only += 1;
            }
        }

        let discordant = a_only + b_only;
        let (statistic, p_value) = if discordant == 0 {
            (0.0, 1.0)
        } else {
            let diff = (a_only as f64 - b_only as f64).abs() - 1.0;
            let statistic = diff * diff / discordant as f64;
            let p_value = chi_square_survival_df1(statistic)?;
            (statistic, p_value)
        };
        let significant = p_value < self.config.significance_level;

        let accuracy_a = class_accuracy(&a.predicted_classes, truth);
        let accuracy_b = class_accuracy(&b.predicted_classes, truth);
        let winner = if significant && accuracy_a != accuracy_b {
            Some(if accuracy_a > accuracy_b {
                a.name.clone()
            } else {
                b.name.clone()
            })
        } else {
            None
        };

        Ok(PairwiseTestResult {
            test_name: "mcnemar".into(),
            model_a: a.name.clone(),
            model_b: b.name.clone(),
            statistic,
            p_value,
            significant,
            winner,
        })
    }

    // -----------------------------------------------------------------
    // Full comparison
    // -----------------------------------------------------------------

    /// Metrics for every model, both pairwise tests for every unordered
    /// pair, and the AUC-descending ranking.
    pub fn compare_all(&self) -> GeoHazardResult<ComputationOutput<ComparisonReport>> {
        let start = Instant::now();

        let (models, warnings) = self.metrics_with_warnings()?;

        let mut pairwise_tests = Vec::new();
        for i in 0..self.models.len() {
            for j in (i + 1)..self.models.len() {
                let a = &self.models[i].name;
                let b = &self.models[j].name;
                pairwise_tests.push(self.delong_test(a, b)?);
                pairwise_tests.push(self.mcnemar_test(a, b)?);
            }
        }

        let mut ordered: Vec<&ModelMetrics> = models.iter().collect();
        ordered.sort_by(|a, b| {
            b.report
                .auc
                .partial_cmp(&a.report.auc)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let ranking: Vec<String> = ordered.iter().map(|m| m.model.clone()).collect();
        let summary: Vec<ModelSummaryRow> = ordered
            .iter()
            .enumerate()
            .map(|(rank, m)| ModelSummaryRow {
                rank: rank + 1,
                model: m.model.clone(),
                auc: m.report.auc,
                success_rate_auc: m.success_rate_auc,
                accuracy: m.report.accuracy,
                f1: m.report.f1,
                kappa: m.report.kappa,
            })
            .collect();

        let report = ComparisonReport {
            models,
            pairwise_tests,
            ranking,
            summary,
        };

        let elapsed = start.elapsed().as_micros() as u64;
        Ok(with_metadata(
            "Multi-Model Susceptibility Comparison",
            &serde_json::json!({
                "models": report.models.iter().map(|m| &m.model).collect::<Vec<_>>(),
                "threshold": self.config.threshold,
                "n_bootstrap": self.config.n_bootstrap,
                "delong_resamples": self.config.delong_resamples,
                "significance_level": self.config.significance_level,
                "seed": self.config.seed,
            }),
            warnings,
            elapsed,
            report,
        ))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn class_accuracy(predicted_classes: &[u8], truth: &[u8]) -> f64 {
    let correct = predicted_classes
        .iter()
        .zip(truth)
        .filter(|(p, a)| p == a)
        .count();
    correct as f64 / truth.len() as f64
}

/// Area under the success-rate curve: cumulative hazard fraction against
/// cumulative area fraction, locations sorted by descending probability.
/// A truth with no positives yields 0.5.
fn success_rate_auc(probabilities: &[f64], truth: &[u8]) -> f64 {
    let total_pos = truth.iter().filter(|&&a| a == 1).count();
    if total_pos == 0 {
        return 0.5;
    }
    let n = truth.len();

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| {
        probabilities[j]
            .partial_cmp(&probabilities[i])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut auc = 0.0;
    let mut cumulative_pos = 0usize;
    let mut prev_y = 0.0;
    let dx = 1.0 / n as f64;
    for &idx in &order {
        if truth[idx] == 1 {
            cumulative_pos += 1;
        }
        let y = cumulative_pos as f64 / total_pos as f64;
        auc += dx * (y + prev_y) / 2.0;
        prev_y = y;
    }
    auc
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
