use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Instant;

use crate::error::GeoHazardError;
use crate::types::{with_metadata, ComputationOutput};
use crate::GeoHazardResult;

/// Literal floor assigned to classes with zero hazard density under the
/// information value method.
pub(crate) const INFORMATION_VALUE_FLOOR: f64 = -5.0;

/// Relative tolerance for class areas summing to the study area.
const AREA_SUM_TOLERANCE: f64 = 1e-6;

// ---------------------------------------------------------------------------
// Input types
// ---------------------------------------------------------------------------

/// One class of a conditioning factor, with its mapped area and the hazard
/// area observed inside it. Areas share one unit (e.g. km^2 or pixels).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactorClass {
    pub class_name: String,
    pub class_area: f64,
    pub hazard_area: f64,
}

/// A conditioning factor and its exhaustive class table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Factor {
    pub name: String,
    pub classes: Vec<FactorClass>,
}

/// Scoring method for the bivariate analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BivariateMethod {
    FrequencyRatio,
    InformationValue,
    CertaintyFactor,
}

/// Input for bivariate factor scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BivariateInput {
    pub method: BivariateMethod,
    pub total_study_area: f64,
    pub total_hazard_area: f64,
    pub factors: Vec<Factor>,
}

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// Score of one factor class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassScore {
    pub class_name: String,
    /// Class share of the study area, percent.
    pub class_area_pct: f64,
    /// Class share of the total hazard area, percent.
    pub hazard_area_pct: f64,
    /// FR, IV, or CF value depending on the method.
    pub score: f64,
    pub label: String,
}

/// Scored classes of one factor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactorAnalysis {
    pub factor: String,
    pub classes: Vec<ClassScore>,
    /// max(IV) - min(IV); populated for the information value method.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contrast: Option<f64>,
}

/// Output of a bivariate analysis run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BivariateOutput {
    pub method: BivariateMethod,
    pub total_study_area: f64,
    pub total_hazard_area: f64,
    pub factors: Vec<FactorAnalysis>,
    /// Factors ordered by descending contrast; information value only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub importance_ranking: Option<Vec<String>>,
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate_input(input: &BivariateInput) -> GeoHazardResult<()> {
    if !input.total_study_area.is_finite() || input.total_study_area <= 0.0 {
        return Err(GeoHazardError::InvalidInput {
            field: "total_study_area".into(),
            reason: format!("Must be positive, got {}", input.total_study_area),
        });
    }
    if !input.total_hazard_area.is_finite()
        || input.total_hazard_area < 0.0
        || input.total_hazard_area > input.total_study_area
    {
        return Err(GeoHazardError::InvalidInput {
            field: "total_hazard_area".into(),
            reason: format!(
                "Must lie in [0, total_study_area], got {}",
                input.total_hazard_area
            ),
        });
    }
    if input.factors.is_empty() {
        return Err(GeoHazardError::InsufficientData(
            "At least one factor is required.".into(),
        ));
    }
    for factor in &input.factors {
        if factor.classes.is_empty() {
            return Err(GeoHazardError::InsufficientData(format!(
                "Factor '{}' has no classes.",
                factor.name
            )));
        }
        let mut seen = HashSet::new();
        for class in &factor.classes {
            if !seen.insert(class.class_name.as_str()) {
                return Err(GeoHazardError::InvalidInput {
                    field: "factors".into(),
                    reason: format!(
                        "Factor '{}' repeats class '{}'",
                        factor.name, class.class_name
                    ),
                });
            }
            if !class.class_area.is_finite() || class.class_area < 0.0 {
                return Err(GeoHazardError::InvalidInput {
                    field: "factors".into(),
                    reason: format!(
                        "Class '{}' of '{}' has invalid area {}",
                        class.class_name, factor.name, class.class_area
                    ),
                });
            }
            if !class.hazard_area.is_finite()
                || class.hazard_area < 0.0
                || class.hazard_area > class.class_area
            {
                return Err(GeoHazardError::InvalidInput {
                    field: "factors".into(),
                    reason: format!(
                        "Class '{}' of '{}' has hazard area {} outside [0, class_area]",
                        class.class_name, factor.name, class.hazard_area
                    ),
                });
            }
        }
        let area_sum: f64 = factor.classes.iter().map(|c| c.class_area).sum();
        if (area_sum - input.total_study_area).abs()
            > AREA_SUM_TOLERANCE * input.total_study_area
        {
            return Err(GeoHazardError::InvalidInput {
                field: "factors".into(),
                reason: format!(
                    "Factor '{}' class areas sum to {area_sum}, expected {}",
                    factor.name, input.total_study_area
                ),
            });
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Per-class scores
// ---------------------------------------------------------------------------

fn frequency_ratio(class_area_pct: f64, hazard_area_pct: f64) -> f64 {
    if class_area_pct == 0.0 {
        0.0
    } else {
        hazard_area_pct / class_area_pct
    }
}

fn information_value(class: &FactorClass, density_map: f64) -> f64 {
    let density_class = if class.class_area > 0.0 {
        class.hazard_area / class.class_area
    } else {
        0.0
    };
    if density_map == 0.0 {
        0.0
    } else if density_class == 0.0 {
        INFORMATION_VALUE_FLOOR
    } else {
        (density_class / density_map).ln()
    }
}

fn certainty_factor(class: &FactorClass, pps: f64) -> f64 {
    let ppa = if class.class_area > 0.0 {
        class.hazard_area / class.class_area
    } else {
        0.0
    };
    if pps == 0.0 || pps == 1.0 {
        return 0.0;
    }
    let cf = if ppa >= pps {
        (ppa - pps) / (1.0 - pps)
    } else {
        (ppa - pps) / pps
    };
    cf.clamp(-1.0, 1.0)
}

fn frequency_ratio_label(fr: f64) -> &'static str {
    if fr >= 2.0 {
        "Very high"
    } else if fr >= 1.0 {
        "High"
    } else if fr >= 0.5 {
        "Moderate"
    } else {
        "Low"
    }
}

fn information_value_label(iv: f64) -> &'static str {
    if iv > 0.0 {
        "Positive association"
    } else if iv < 0.0 {
        "Negative association"
    } else {
        "Neutral"
    }
}

pub(crate) fn certainty_factor_label(cf: f64) -> &'static str {
    if cf > 0.5 {
        "Strong positive"
    } else if cf > 0.2 {
        "Moderate positive"
    } else if cf > -0.2 {
        "Weak or none"
    } else if cf > -0.5 {
        "Moderate negative"
    } else {
        "Strong negative"
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Score every factor class against historical hazard occurrence.
///
/// Degenerate denominators never fail: zero-area classes score 0 under FR,
/// the fixed floor under IV, and 0 under CF; a study with no recorded
/// hazard degrades to all-zero scores with a warning.
pub fn calculate_factor_scores(
    input: &BivariateInput,
) -> GeoHazardResult<ComputationOutput<BivariateOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    validate_input(input)?;

    if input.total_hazard_area == 0.0 {
        warnings.push(
            "Total hazard area is 0; class scores degrade to their documented fallbacks".into(),
        );
    }

    let density_map = input.total_hazard_area / input.total_study_area;
    let mut factors: Vec<FactorAnalysis> = Vec::with_capacity(input.factors.len());

    for factor in &input.factors {
        let classes: Vec<ClassScore> = factor
            .classes
            .iter()
            .map(|class| {
                let class_area_pct = class.class_area / input.total_study_area * 100.0;
                let hazard_area_pct = if input.total_hazard_area > 0.0 {
                    class.hazard_area / input.total_hazard_area * 100.0
                } else {
                    0.0
                };
                let (score, label) = match input.method {
                    BivariateMethod::FrequencyRatio => {
                        let fr = frequency_ratio(class_area_pct, hazard_area_pct);
                        (fr, frequency_ratio_label(fr))
                    }
                    BivariateMethod::InformationValue => {
                        let iv = information_value(class, density_map);
                        (iv, information_value_label(iv))
                    }
                    BivariateMethod::CertaintyFactor => {
                        let cf = certainty_factor(class, density_map);
                        (cf, certainty_factor_label(cf))
                    }
                };
                ClassScore {
                    class_name: class.class_name.clone(),
                    class_area_pct,
                    hazard_area_pct,
                    score,
                    label: label.to_string(),
                }
            })
            .collect();

        let contrast = if input.method == BivariateMethod::InformationValue {
            let max = classes.iter().map(|c| c.score).fold(f64::NEG_INFINITY, f64::max);
            let min = classes.iter().map(|c| c.score).fold(f64::INFINITY, f64::min);
            Some(max - min)
        } else {
            None
        };

        factors.push(FactorAnalysis {
            factor: factor.name.clone(),
            classes,
            contrast,
        });
    }

    let importance_ranking = if input.method == BivariateMethod::InformationValue {
        let mut ranked: Vec<(&FactorAnalysis, f64)> = factors
            .iter()
            .map(|f| (f, f.contrast.unwrap_or(0.0)))
            .collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        Some(ranked.into_iter().map(|(f, _)| f.factor.clone()).collect())
    } else {
        None
    };

    let output = BivariateOutput {
        method: input.method,
        total_study_area: input.total_study_area,
        total_hazard_area: input.total_hazard_area,
        factors,
        importance_ranking,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Bivariate Factor Scoring",
        &serde_json::json!({
            "method": input.method,
            "total_study_area": input.total_study_area,
            "total_hazard_area": input.total_hazard_area,
            "factors": input.factors.iter().map(|f| &f.name).collect::<Vec<_>>(),
        }),
        warnings,
        elapsed,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
