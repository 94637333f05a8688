//! Classifier artifacts and the capability tiers they are adapted to.
//!
//! A classifier is persisted as JSON tagged by `kind`. At load time it is
//! turned into a [`ModelCapability`], which fixes once which inference
//! path the probability resolver may use for it.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Deserializer};

use crate::error::InferenceError;

/// Every capability can at least name a class.
pub trait HardLabelModel: Send + Sync {
    /// Class labels stored with the model, possibly empty.
    fn classes(&self) -> &[String];

    /// Index of the predicted class.
    fn predict(&self, x: &[f64]) -> Result<usize, InferenceError>;

    /// Input width the model was fitted on, when its parameters fix one.
    /// Trees only index into the input and report `None`.
    fn n_features(&self) -> Option<usize> {
        None
    }
}

pub trait ProbabilisticModel: HardLabelModel {
    /// One probability per class, summing to 1.
    fn predict_proba(&self, x: &[f64]) -> Result<Vec<f64>, InferenceError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum DecisionScore {
    /// Signed distance to a binary decision boundary; positive favors class 1.
    Margin(f64),
    PerClass(Vec<f64>),
}

pub trait ScoredModel: HardLabelModel {
    fn decision_function(&self, x: &[f64]) -> Result<DecisionScore, InferenceError>;
}

pub enum ModelCapability {
    Probabilistic(Box<dyn ProbabilisticModel>),
    Scored(Box<dyn ScoredModel>),
    HardLabel(Box<dyn HardLabelModel>),
}

impl ModelCapability {
    pub fn tier(&self) -> &'static str {
        match self {
            ModelCapability::Probabilistic(_) => "probabilistic",
            ModelCapability::Scored(_) => "scored",
            ModelCapability::HardLabel(_) => "hard_label",
        }
    }

    pub fn classes(&self) -> &[String] {
        match self {
            ModelCapability::Probabilistic(m) => m.classes(),
            ModelCapability::Scored(m) => m.classes(),
            ModelCapability::HardLabel(m) => m.classes(),
        }
    }

    pub fn predict(&self, x: &[f64]) -> Result<usize, InferenceError> {
        match self {
            ModelCapability::Probabilistic(m) => m.predict(x),
            ModelCapability::Scored(m) => m.predict(x),
            ModelCapability::HardLabel(m) => m.predict(x),
        }
    }

    pub fn n_features(&self) -> Option<usize> {
        match self {
            ModelCapability::Probabilistic(m) => m.n_features(),
            ModelCapability::Scored(m) => m.n_features(),
            ModelCapability::HardLabel(m) => m.n_features(),
        }
    }
}

impl std::fmt::Debug for ModelCapability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelCapability")
            .field("tier", &self.tier())
            .field("classes", &self.classes())
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClassifierArtifact {
    LogisticRegression(LinearParams),
    LinearSvm(LinearParams),
    DecisionTree(TreeParams),
    RandomForest(ForestParams),
    NearestCentroid(CentroidParams),
}

#[derive(Debug, Clone, Deserialize)]
pub struct LinearParams {
    pub coef: Vec<Vec<f64>>,
    pub intercept: Vec<f64>,
    #[serde(default, deserialize_with = "deserialize_labels")]
    pub classes: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TreeParams {
    pub nodes: Vec<TreeNode>,
    #[serde(default, deserialize_with = "deserialize_labels")]
    pub classes: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForestParams {
    pub trees: Vec<TreeParams>,
    #[serde(default, deserialize_with = "deserialize_labels")]
    pub classes: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CentroidParams {
    pub centroids: Vec<Vec<f64>>,
    #[serde(default, deserialize_with = "deserialize_labels")]
    pub classes: Vec<String>,
}

/// `x[feature] <= threshold` goes left.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: Vec<f64>,
    },
}

impl ClassifierArtifact {
    /// Validates shapes and adapts the artifact to its capability tier.
    pub fn into_capability(self) -> Result<ModelCapability, String> {
        let capability = match self {
            ClassifierArtifact::LogisticRegression(params) => {
                let model = LinearModel::from_params(params)?;
                ModelCapability::Probabilistic(Box::new(LogisticRegression(model)))
            }
            ClassifierArtifact::LinearSvm(params) => {
                ModelCapability::Scored(Box::new(LinearSvm(LinearModel::from_params(params)?)))
            }
            ClassifierArtifact::DecisionTree(params) => {
                ModelCapability::Probabilistic(Box::new(DecisionTree::from_params(params)?))
            }
            ClassifierArtifact::RandomForest(params) => {
                ModelCapability::Probabilistic(Box::new(RandomForest::from_params(params)?))
            }
            ClassifierArtifact::NearestCentroid(params) => {
                ModelCapability::HardLabel(Box::new(NearestCentroid::from_params(params)?))
            }
        };
        Ok(capability)
    }
}

/// Class labels may be persisted as strings or numbers; numbers keep their
/// JSON spelling.
pub(crate) fn deserialize_labels<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Vec<serde_json::Value>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .map(|v| match v {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        })
        .collect())
}

fn check_classes(classes: &[String], n_classes: usize) -> Result<(), String> {
    if !classes.is_empty() && classes.len() != n_classes {
        return Err(format!(
            "{} class labels for a model with {} outputs",
            classes.len(),
            n_classes
        ));
    }
    Ok(())
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

pub(crate) fn argmax(values: &[f64]) -> Result<usize, InferenceError> {
    if values.iter().any(|v| v.is_nan()) {
        return Err(InferenceError::InvalidDistribution("NaN score".into()));
    }
    values
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (i, &v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
        .ok_or_else(|| InferenceError::InvalidDistribution("no scores".into()))
}

struct LinearModel {
    coef: DMatrix<f64>,
    intercept: DVector<f64>,
    classes: Vec<String>,
}

impl LinearModel {
    fn from_params(params: LinearParams) -> Result<Self, String> {
        let rows = params.coef.len();
        let cols = params.coef.first().map(Vec::len).unwrap_or(0);
        if rows == 0 || cols == 0 {
            return Err("coef must be a non-empty matrix".into());
        }
        if params.coef.iter().any(|r| r.len() != cols) {
            return Err("coef rows have unequal lengths".into());
        }
        if params.intercept.len() != rows {
            return Err(format!(
                "intercept has {} entries for {} coef rows",
                params.intercept.len(),
                rows
            ));
        }

        let model = Self {
            coef: DMatrix::from_row_iterator(rows, cols, params.coef.into_iter().flatten()),
            intercept: DVector::from_vec(params.intercept),
            classes: params.classes,
        };
        check_classes(&model.classes, model.n_classes())?;
        Ok(model)
    }

    // a single row of coefficients describes a binary problem
    fn n_classes(&self) -> usize {
        match self.coef.nrows() {
            1 => 2,
            n => n,
        }
    }

    fn margins(&self, x: &[f64]) -> Result<DVector<f64>, InferenceError> {
        if x.len() != self.coef.ncols() {
            return Err(InferenceError::FeatureCountMismatch {
                expected: self.coef.ncols(),
                actual: x.len(),
            });
        }
        let x = DVector::from_column_slice(x);
        Ok(&self.coef * x + &self.intercept)
    }
}

struct LogisticRegression(LinearModel);

impl HardLabelModel for LogisticRegression {
    fn classes(&self) -> &[String] {
        &self.0.classes
    }

    fn n_features(&self) -> Option<usize> {
        Some(self.0.coef.ncols())
    }

    fn predict(&self, x: &[f64]) -> Result<usize, InferenceError> {
        argmax(&self.predict_proba(x)?)
    }
}

impl ProbabilisticModel for LogisticRegression {
    fn predict_proba(&self, x: &[f64]) -> Result<Vec<f64>, InferenceError> {
        let z = self.0.margins(x)?;
        if z.len() == 1 {
            let p = sigmoid(z[0]);
            return Ok(vec![1.0 - p, p]);
        }

        let max = z.max();
        let exp = z.map(|v| (v - max).exp());
        let total = exp.sum();
        Ok(exp.iter().map(|v| v / total).collect())
    }
}

struct LinearSvm(LinearModel);

impl HardLabelModel for LinearSvm {
    fn classes(&self) -> &[String] {
        &self.0.classes
    }

    fn n_features(&self) -> Option<usize> {
        Some(self.0.coef.ncols())
    }

    fn predict(&self, x: &[f64]) -> Result<usize, InferenceError> {
        match self.decision_function(x)? {
            DecisionScore::Margin(m) => Ok(usize::from(m > 0.0)),
            DecisionScore::PerClass(scores) => argmax(&scores),
        }
    }
}

impl ScoredModel for LinearSvm {
    fn decision_function(&self, x: &[f64]) -> Result<DecisionScore, InferenceError> {
        let z = self.0.margins(x)?;
        if z.len() == 1 {
            Ok(DecisionScore::Margin(z[0]))
        } else {
            Ok(DecisionScore::PerClass(z.iter().copied().collect()))
        }
    }
}

struct DecisionTree {
    nodes: Vec<TreeNode>,
    n_classes: usize,
    classes: Vec<String>,
}

impl DecisionTree {
    fn from_params(params: TreeParams) -> Result<Self, String> {
        if params.nodes.is_empty() {
            return Err("tree has no nodes".into());
        }

        let mut n_classes = None;
        for (i, node) in params.nodes.iter().enumerate() {
            match node {
                TreeNode::Split { left, right, .. } => {
                    if *left >= params.nodes.len() || *right >= params.nodes.len() {
                        return Err(format!("node {} points past the end of the tree", i));
                    }
                }
                TreeNode::Leaf { value } => {
                    let unusable = value.iter().any(|v| !v.is_finite() || *v < 0.0);
                    if unusable || value.iter().sum::<f64>() <= 0.0 {
                        return Err(format!("leaf {} has no usable class counts", i));
                    }
                    match n_classes {
                        None => n_classes = Some(value.len()),
                        Some(n) if n != value.len() => {
                            return Err(format!(
                                "leaf {} has {} classes, expected {}",
                                i,
                                value.len(),
                                n
                            ));
                        }
                        Some(_) => {}
                    }
                }
            }
        }

        let n_classes = n_classes.ok_or("tree has no leaves")?;
        check_classes(&params.classes, n_classes)?;
        Ok(Self {
            nodes: params.nodes,
            n_classes,
            classes: params.classes,
        })
    }

    fn leaf(&self, x: &[f64]) -> Result<&[f64], InferenceError> {
        let mut idx = 0;
        // a well-formed tree reaches a leaf in fewer steps than it has nodes
        for _ in 0..self.nodes.len() {
            match &self.nodes[idx] {
                TreeNode::Leaf { value } => return Ok(value),
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let v = x.get(*feature).ok_or(InferenceError::FeatureCountMismatch {
                        expected: feature + 1,
                        actual: x.len(),
                    })?;
                    idx = if *v <= *threshold { *left } else { *right };
                }
            }
        }
        Err(InferenceError::MalformedTree("cycle between split nodes".into()))
    }
}

impl HardLabelModel for DecisionTree {
    fn classes(&self) -> &[String] {
        &self.classes
    }

    fn predict(&self, x: &[f64]) -> Result<usize, InferenceError> {
        argmax(self.leaf(x)?)
    }
}

impl ProbabilisticModel for DecisionTree {
    fn predict_proba(&self, x: &[f64]) -> Result<Vec<f64>, InferenceError> {
        let counts = self.leaf(x)?;
        let total: f64 = counts.iter().sum();
        Ok(counts.iter().map(|c| c / total).collect())
    }
}

struct RandomForest {
    trees: Vec<DecisionTree>,
    n_classes: usize,
    classes: Vec<String>,
}

impl RandomForest {
    fn from_params(params: ForestParams) -> Result<Self, String> {
        let trees = params
            .trees
            .into_iter()
            .map(DecisionTree::from_params)
            .collect::<Result<Vec<_>, _>>()?;
        let n_classes = trees.first().map(|t| t.n_classes).ok_or("forest has no trees")?;
        if trees.iter().any(|t| t.n_classes != n_classes) {
            return Err("trees disagree on the number of classes".into());
        }
        check_classes(&params.classes, n_classes)?;
        Ok(Self {
            trees,
            n_classes,
            classes: params.classes,
        })
    }
}

impl HardLabelModel for RandomForest {
    fn classes(&self) -> &[String] {
        &self.classes
    }

    fn predict(&self, x: &[f64]) -> Result<usize, InferenceError> {
        argmax(&self.predict_proba(x)?)
    }
}

impl ProbabilisticModel for RandomForest {
    fn predict_proba(&self, x: &[f64]) -> Result<Vec<f64>, InferenceError> {
        let mut mean = DVector::<f64>::zeros(self.n_classes);
        for tree in &self.trees {
            mean += DVector::from_vec(tree.predict_proba(x)?);
        }
        mean /= self.trees.len() as f64;
        Ok(mean.iter().copied().collect())
    }
}

struct NearestCentroid {
    centroids: DMatrix<f64>,
    classes: Vec<String>,
}

impl NearestCentroid {
    fn from_params(params: CentroidParams) -> Result<Self, String> {
        let rows = params.centroids.len();
        let cols = params.centroids.first().map(Vec::len).unwrap_or(0);
        if rows == 0 || cols == 0 {
            return Err("centroids must be a non-empty matrix".into());
        }
        if params.centroids.iter().any(|r| r.len() != cols) {
            return Err("centroid rows have unequal lengths".into());
        }
        check_classes(&params.classes, rows)?;
        Ok(Self {
            centroids: DMatrix::from_row_iterator(
                rows,
                cols,
                params.centroids.into_iter().flatten(),
            ),
            classes: params.classes,
        })
    }
}

impl HardLabelModel for NearestCentroid {
    fn classes(&self) -> &[String] {
        &self.classes
    }

    fn n_features(&self) -> Option<usize> {
        Some(self.centroids.ncols())
    }

    fn predict(&self, x: &[f64]) -> Result<usize, InferenceError> {
        if x.len() != self.centroids.ncols() {
            return Err(InferenceError::FeatureCountMismatch {
                expected: self.centroids.ncols(),
                actual: x.len(),
            });
        }
        let distances: Vec<f64> = self
            .centroids
            .row_iter()
            .map(|row| -row.iter().zip(x).map(|(c, v)| (c - v).powi(2)).sum::<f64>())
            .collect();
        argmax(&distances)
    }
}
