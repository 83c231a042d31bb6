//! Gradient-boosted tree ensemble read from XGBoost's JSON model format.
//!
//! Only the `gbtree` booster with regression objectives is supported. Trees
//! are stored in XGBoost's flat array layout: node `i` is a leaf when
//! `left_children[i] == -1`, in which case `split_conditions[i]` holds the
//! leaf value.

use super::regressor::Regressor;
use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer};
use std::path::Path;
use tracing::{debug, info};

#[derive(Deserialize)]
struct ModelFile {
    learner: Learner,
}

#[derive(Deserialize)]
struct Learner {
    learner_model_param: LearnerModelParam,
    gradient_booster: GradientBooster,
    objective: Objective,
}

#[derive(Deserialize)]
struct LearnerModelParam {
    base_score: String,
    #[serde(default)]
    num_feature: Option<String>,
}

#[derive(Deserialize)]
struct GradientBooster {
    name: String,
    #[serde(default)]
    model: Option<GbTreeModel>,
}

#[derive(Deserialize)]
struct GbTreeModel {
    trees: Vec<RawTree>,
}

#[derive(Deserialize)]
struct RawTree {
    left_children: Vec<i32>,
    right_children: Vec<i32>,
    split_indices: Vec<i64>,
    split_conditions: Vec<f32>,
    #[serde(deserialize_with = "flags")]
    default_left: Vec<bool>,
}

#[derive(Deserialize)]
struct Objective {
    name: String,
}

/// XGBoost writes `default_left` as 0/1 integers in some versions and booleans in others
fn flags<'de, D>(deserializer: D) -> std::result::Result<Vec<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(u8),
    }

    let raw = Vec::<Flag>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|flag| match flag {
            Flag::Bool(b) => b,
            Flag::Int(i) => i != 0,
        })
        .collect())
}

/// Link between the summed margin and the prediction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Link {
    Identity,
    Log,
}

impl Link {
    /// Link function for a regression objective
    pub fn for_objective(objective: &str) -> Result<Self> {
        match objective {
            "reg:squarederror" | "reg:linear" | "reg:squaredlogerror" | "reg:absoluteerror"
            | "reg:pseudohubererror" | "reg:quantileerror" => Ok(Link::Identity),
            "reg:gamma" | "reg:tweedie" | "count:poisson" => Ok(Link::Log),
            other => anyhow::bail!("Unsupported XGBoost objective '{}'", other),
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Split {
        feature: usize,
        threshold: f32,
        left: usize,
        right: usize,
        default_left: bool,
    },
    Leaf(f32),
}

/// A single regression tree
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    fn from_raw(raw: RawTree, index: usize) -> Result<Self> {
        let n = raw.left_children.len();
        if n == 0 {
            anyhow::bail!("Tree {} has no nodes", index);
        }
        if raw.right_children.len() != n
            || raw.split_indices.len() != n
            || raw.split_conditions.len() != n
            || raw.default_left.len() != n
        {
            anyhow::bail!("Tree {} has inconsistent node array lengths", index);
        }

        let child = |value: i32| -> Result<usize> {
            usize::try_from(value)
                .ok()
                .filter(|&c| c < n)
                .with_context(|| format!("Tree {} references missing node {}", index, value))
        };

        let mut nodes = Vec::with_capacity(n);
        for i in 0..n {
            if raw.left_children[i] == -1 {
                nodes.push(Node::Leaf(raw.split_conditions[i]));
                continue;
            }
            let feature = usize::try_from(raw.split_indices[i])
                .with_context(|| format!("Tree {} node {} has a negative split index", index, i))?;
            nodes.push(Node::Split {
                feature,
                threshold: raw.split_conditions[i],
                left: child(raw.left_children[i])?,
                right: child(raw.right_children[i])?,
                default_left: raw.default_left[i],
            });
        }

        Ok(Self { nodes })
    }

    /// Largest feature index any split reads
    fn max_feature(&self) -> Option<usize> {
        self.nodes
            .iter()
            .filter_map(|node| match node {
                Node::Split { feature, .. } => Some(*feature),
                Node::Leaf(_) => None,
            })
            .max()
    }

    /// Walk from the root to a leaf
    fn leaf_value(&self, features: &[f32]) -> Result<f32> {
        let mut idx = 0;
        // A well-formed tree reaches a leaf in fewer steps than it has nodes
        for _ in 0..self.nodes.len() {
            match &self.nodes[idx] {
                Node::Leaf(value) => return Ok(*value),
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    default_left,
                } => {
                    let x = features.get(*feature).copied().unwrap_or(f32::NAN);
                    idx = if x.is_nan() {
                        if *default_left {
                            *left
                        } else {
                            *right
                        }
                    } else if x < *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
        anyhow::bail!("Tree traversal did not terminate")
    }
}

/// Tree ensemble evaluated as `link(base_margin + Σ leaf values)`
#[derive(Debug, Clone)]
pub struct XgboostRegressor {
    trees: Vec<Tree>,
    base_margin: f32,
    link: Link,
    num_feature: Option<usize>,
}

impl XgboostRegressor {
    /// Load an ensemble from an XGBoost JSON model file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read XGBoost model from {}", path.display()))?;
        let model = Self::from_json(&raw)
            .with_context(|| format!("Failed to parse XGBoost model {}", path.display()))?;

        info!(
            path = %path.display(),
            trees = model.tree_count(),
            num_feature = ?model.num_feature,
            "XGBoost model loaded"
        );
        Ok(model)
    }

    /// Parse an ensemble from XGBoost JSON text
    pub fn from_json(raw: &str) -> Result<Self> {
        let file: ModelFile = serde_json::from_str(raw)?;
        let learner = file.learner;

        if learner.gradient_booster.name != "gbtree" {
            anyhow::bail!(
                "Unsupported booster '{}', only gbtree is supported",
                learner.gradient_booster.name
            );
        }
        let model = learner
            .gradient_booster
            .model
            .context("gbtree booster has no model section")?;

        let link = Link::for_objective(&learner.objective.name)?;
        let base_score = parse_base_score(&learner.learner_model_param.base_score)?;
        let base_margin = match link {
            Link::Identity => base_score,
            Link::Log => {
                if base_score <= 0.0 {
                    anyhow::bail!("base_score must be positive for a log-link objective");
                }
                base_score.ln()
            }
        };

        let num_feature = learner
            .learner_model_param
            .num_feature
            .as_deref()
            .map(str::parse::<usize>)
            .transpose()
            .context("Invalid num_feature")?
            .filter(|&n| n > 0);

        let trees = model
            .trees
            .into_iter()
            .enumerate()
            .map(|(i, raw)| Tree::from_raw(raw, i))
            .collect::<Result<Vec<_>>>()?;

        if let (Some(n), Some(max)) = (num_feature, trees.iter().filter_map(Tree::max_feature).max())
        {
            if max >= n {
                anyhow::bail!("Tree splits on feature {} but model has {} features", max, n);
            }
        }

        debug!(
            trees = trees.len(),
            objective = %learner.objective.name,
            base_score = base_score,
            "Parsed XGBoost model"
        );

        Ok(Self {
            trees,
            base_margin,
            link,
            num_feature,
        })
    }

    /// Number of trees in the ensemble
    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }
}

/// `base_score` is written as `"1.5E2"` or, since XGBoost 2.1, `"[1.5E2]"`
fn parse_base_score(raw: &str) -> Result<f32> {
    let trimmed = raw.trim().trim_start_matches('[').trim_end_matches(']');
    let first = trimmed.split(',').next().unwrap_or_default().trim();
    first
        .parse::<f32>()
        .with_context(|| format!("Invalid base_score '{}'", raw))
}

impl Regressor for XgboostRegressor {
    fn name(&self) -> &str {
        "xgboost"
    }

    fn input_width(&self) -> Option<usize> {
        self.num_feature
    }

    fn predict(&self, features: &[f32]) -> Result<f64> {
        let mut margin = self.base_margin;
        for tree in &self.trees {
            margin += tree.leaf_value(features)?;
        }

        let margin = margin as f64;
        Ok(match self.link {
            Link::Identity => margin,
            Link::Log => margin.exp(),
        })
    }
}
