//! Predictor capability and the concrete model formats that implement it.

use serde::{Deserialize, Serialize};

use crate::data::model::{Table, Value};
use crate::error::{Result, ScoringError};

/// A loaded model: maps a table to one prediction per row.
pub trait Predictor {
    /// Short description for logs.
    fn describe(&self) -> String;

    fn infer(&self, table: &Table) -> Result<Vec<Value>>;
}

/// Apply `model` to every row of `table`.
///
/// The model's own error is returned unchanged.
pub fn predict(model: &dyn Predictor, table: &Table) -> Result<Vec<Value>> {
    log::info!("predicting {} rows with {}", table.len(), model.describe());
    let predictions = model.infer(table)?;
    log::debug!("model returned {} predictions", predictions.len());
    Ok(predictions)
}

// ---------------------------------------------------------------------------
// Artifact format (model.json)
// ---------------------------------------------------------------------------

/// On-disk model document, tagged by `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelArtifact {
    LogisticRegression(LogisticRegression),
    DecisionTree(DecisionTree),
}

impl ModelArtifact {
    /// Check structural consistency and turn the document into a predictor.
    pub fn into_predictor(self) -> std::result::Result<Box<dyn Predictor>, String> {
        match self {
            ModelArtifact::LogisticRegression(m) => {
                if m.features.len() != m.coefficients.len() {
                    return Err(format!(
                        "{} features but {} coefficients",
                        m.features.len(),
                        m.coefficients.len()
                    ));
                }
                Ok(Box::new(m))
            }
            ModelArtifact::DecisionTree(m) => {
                if m.nodes.is_empty() {
                    return Err("decision tree has no nodes".to_string());
                }
                Ok(Box::new(m))
            }
        }
    }
}

fn default_threshold() -> f64 {
    0.5
}

fn default_classes() -> [i64; 2] {
    [0, 1]
}

/// Read feature columns by name into row-major numeric vectors.
fn feature_matrix(table: &Table, features: &[String]) -> Result<Vec<Vec<f64>>> {
    let columns = features
        .iter()
        .map(|name| {
            table
                .column(name)
                .ok_or_else(|| ScoringError::Inference(format!("missing feature column '{name}'")))
        })
        .collect::<Result<Vec<_>>>()?;

    (0..table.len())
        .map(|row| {
            columns
                .iter()
                .map(|col| {
                    col.values[row].as_f64().ok_or_else(|| {
                        ScoringError::Inference(format!(
                            "row {row}: feature '{}' is {}, expected a number",
                            col.name,
                            col.values[row].type_name()
                        ))
                    })
                })
                .collect::<Result<Vec<f64>>>()
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Logistic regression
// ---------------------------------------------------------------------------

/// Binary linear classifier over named features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    pub features: Vec<String>,
    pub coefficients: Vec<f64>,
    #[serde(default)]
    pub intercept: f64,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    /// Labels for the negative and positive class.
    #[serde(default = "default_classes")]
    pub classes: [i64; 2],
}

impl LogisticRegression {
    fn score(&self, row: &[f64]) -> f64 {
        let z = self.intercept
            + self
                .coefficients
                .iter()
                .zip(row)
                .map(|(w, x)| w * x)
                .sum::<f64>();
        1.0 / (1.0 + (-z).exp())
    }
}

impl Predictor for LogisticRegression {
    fn describe(&self) -> String {
        format!("logistic regression over {} features", self.features.len())
    }

    fn infer(&self, table: &Table) -> Result<Vec<Value>> {
        Ok(feature_matrix(table, &self.features)?
            .iter()
            .map(|row| {
                let label = if self.score(row) >= self.threshold {
                    self.classes[1]
                } else {
                    self.classes[0]
                };
                Value::Integer(label)
            })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Decision tree
// ---------------------------------------------------------------------------

/// A node of a flat, array-backed classification tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    /// Numeric split: go left iff `value < threshold`.
    Split {
        split: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf { leaf: i64 },
}

/// Classification tree; node 0 is the root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    pub features: Vec<String>,
    pub nodes: Vec<TreeNode>,
}

impl DecisionTree {
    fn classify(&self, row: &[f64]) -> Result<i64> {
        let mut idx = 0usize;
        // A well-formed tree reaches a leaf in fewer steps than it has nodes.
        for _ in 0..self.nodes.len() {
            let node = self
                .nodes
                .get(idx)
                .ok_or_else(|| ScoringError::Inference(format!("tree node {idx} does not exist")))?;
            match node {
                TreeNode::Leaf { leaf } => return Ok(*leaf),
                TreeNode::Split {
                    split,
                    threshold,
                    left,
                    right,
                } => {
                    let value = row.get(*split).copied().ok_or_else(|| {
                        ScoringError::Inference(format!("tree splits on unknown feature index {split}"))
                    })?;
                    idx = if value < *threshold { *left } else { *right };
                }
            }
        }
        Err(ScoringError::Inference("tree traversal does not terminate".to_string()))
    }
}

impl Predictor for DecisionTree {
    fn describe(&self) -> String {
        format!("decision tree with {} nodes", self.nodes.len())
    }

    fn infer(&self, table: &Table) -> Result<Vec<Value>> {
        feature_matrix(table, &self.features)?
            .iter()
            .map(|row| self.classify(row).map(Value::Integer))
            .collect()
    }
}
