//! Random forest of gini decision trees
//!
//! Each tree is grown on a bootstrap sample with balanced-subsample class
//! weights: class `c` of the bootstrap gets weight `n / (k * n_c)` where `k`
//! is the number of classes present in that bootstrap. Every node considers
//! `floor(sqrt(n_features))` randomly drawn non-constant features.
//! Feature importance is the weighted gini decrease, normalised per tree and
//! again across the forest, so it sums to 1.0 whenever any tree split.

use crate::structs::{ConcordError, Result};
use linfa::traits::{Fit, PredictInplace};
use linfa::{DatasetBase, ParamGuard};
use ndarray::{Array1, ArrayBase, ArrayView1, ArrayView2, Data, Ix2};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// Checked forest hyperparameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForestValidParams {
    n_trees: usize,
    min_samples_split: usize,
    max_depth: Option<usize>,
    seed: u64,
}

impl ForestValidParams {
    #[must_use]
    pub const fn n_trees(&self) -> usize {
        self.n_trees
    }

    #[must_use]
    pub const fn min_samples_split(&self) -> usize {
        self.min_samples_split
    }

    #[must_use]
    pub const fn max_depth(&self) -> Option<usize> {
        self.max_depth
    }

    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }
}

/// Unchecked forest hyperparameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForestParams(ForestValidParams);

impl ForestParams {
    #[must_use]
    pub const fn new(n_trees: usize) -> Self {
        Self(ForestValidParams {
            n_trees,
            min_samples_split: 2,
            max_depth: None,
            seed: 0,
        })
    }

    #[must_use]
    pub const fn n_trees(mut self, n_trees: usize) -> Self {
        self.0.n_trees = n_trees;
        self
    }

    #[must_use]
    pub const fn min_samples_split(mut self, min_samples_split: usize) -> Self {
        self.0.min_samples_split = min_samples_split;
        self
    }

    #[must_use]
    pub const fn max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.0.max_depth = max_depth;
        self
    }

    #[must_use]
    pub const fn seed(mut self, seed: u64) -> Self {
        self.0.seed = seed;
        self
    }
}

impl Default for ForestParams {
    fn default() -> Self {
        Self::new(300)
    }
}

impl ParamGuard for ForestParams {
    type Checked = ForestValidParams;
    type Error = ConcordError;

    fn check_ref(&self) -> Result<&Self::Checked> {
        if self.0.n_trees == 0 {
            return Err(ConcordError::Config("forest needs at least one tree".into()));
        }
        if self.0.min_samples_split < 2 {
            return Err(ConcordError::Config(format!(
                "min_samples_split must be at least 2, got {}",
                self.0.min_samples_split
            )));
        }
        if self.0.max_depth == Some(0) {
            return Err(ConcordError::Config("max_depth must be at least 1".into()));
        }
        Ok(&self.0)
    }

    fn check(self) -> Result<Self::Checked> {
        self.check_ref()?;
        Ok(self.0)
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        proba: Vec<f64>,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone)]
struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    fn leaf(&self, row: ArrayView1<'_, f64>) -> &[f64] {
        let mut id = 0;
        loop {
            match &self.nodes[id] {
                Node::Leaf { proba } => return proba,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => id = if row[*feature] <= *threshold { *left } else { *right },
            }
        }
    }
}

/// Fitted ensemble
#[derive(Debug, Clone)]
pub struct RandomForest {
    trees: Vec<Tree>,
    n_classes: usize,
    importance: Array1<f64>,
}

impl RandomForest {
    /// Per-feature importance; sums to 1.0 unless no tree could split
    #[must_use]
    pub const fn feature_importance(&self) -> &Array1<f64> {
        &self.importance
    }

    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Mean leaf class distribution over all trees
    #[allow(clippy::cast_precision_loss)]
    fn proba(&self, row: ArrayView1<'_, f64>) -> Vec<f64> {
        let mut total = vec![0.0; self.n_classes];
        for tree in &self.trees {
            for (t, p) in total.iter_mut().zip(tree.leaf(row)) {
                *t += p;
            }
        }
        let n = self.trees.len() as f64;
        total.iter().map(|t| t / n).collect()
    }
}

fn gini(dist: &[f64], total: f64) -> f64 {
    if total <= 0.0 {
        return 0.0;
    }
    1.0 - dist.iter().map(|w| (w / total).powi(2)).sum::<f64>()
}

struct Candidate {
    feature: usize,
    threshold: f64,
    decrease: f64,
}

/// Grows one tree over weighted samples
struct Grower<'a> {
    x: ArrayView2<'a, f64>,
    y: &'a [usize],
    weights: Vec<f64>,
    n_classes: usize,
    max_features: usize,
    params: &'a ForestValidParams,
    nodes: Vec<Node>,
    importance: Vec<f64>,
}

impl Grower<'_> {
    fn distribution(&self, samples: &[usize]) -> Vec<f64> {
        let mut dist = vec![0.0; self.n_classes];
        for &i in samples {
            dist[self.y[i]] += self.weights[i];
        }
        dist
    }

    fn grow(&mut self, samples: Vec<usize>, depth: usize, rng: &mut StdRng) -> usize {
        let dist = self.distribution(&samples);
        let total: f64 = dist.iter().sum();
        let impurity = gini(&dist, total);

        let splittable = samples.len() >= self.params.min_samples_split
            && impurity > 0.0
            && self.params.max_depth.map_or(true, |d| depth < d);

        if splittable {
            if let Some(best) = self.best_split(&samples, &dist, total, impurity, rng) {
                let (left, right): (Vec<usize>, Vec<usize>) = samples
                    .iter()
                    .copied()
                    .partition(|&i| self.x[[i, best.feature]] <= best.threshold);
                self.importance[best.feature] += best.decrease;

                let id = self.nodes.len();
                self.nodes.push(Node::Leaf { proba: Vec::new() });
                let left = self.grow(left, depth + 1, rng);
                let right = self.grow(right, depth + 1, rng);
                self.nodes[id] = Node::Split {
                    feature: best.feature,
                    threshold: best.threshold,
                    left,
                    right,
                };
                return id;
            }
        }

        let id = self.nodes.len();
        self.nodes.push(Node::Leaf {
            proba: dist.iter().map(|w| w / total).collect(),
        });
        id
    }

    #[allow(clippy::float_cmp)]
    fn best_split(
        &self,
        samples: &[usize],
        parent: &[f64],
        total: f64,
        impurity: f64,
        rng: &mut StdRng,
    ) -> Option<Candidate> {
        let mut features: Vec<usize> = (0..self.x.ncols()).collect();
        features.shuffle(rng);

        let mut order = samples.to_vec();
        let mut visited = 0;
        let mut best: Option<Candidate> = None;

        for feature in features {
            if visited == self.max_features {
                break;
            }
            let column = self.x.column(feature);
            order.sort_by(|&a, &b| column[a].total_cmp(&column[b]));
            let (first, last) = (column[order[0]], column[order[order.len() - 1]]);
            if first == last {
                continue;
            }
            visited += 1;

            let mut left = vec![0.0; self.n_classes];
            let mut left_total = 0.0;
            for pos in 0..order.len() - 1 {
                let i = order[pos];
                left[self.y[i]] += self.weights[i];
                left_total += self.weights[i];

                let (value, next) = (column[i], column[order[pos + 1]]);
                if value == next {
                    continue;
                }

                let right: Vec<f64> = parent.iter().zip(&left).map(|(p, l)| p - l).collect();
                let right_total = total - left_total;
                let decrease = total * impurity
                    - left_total * gini(&left, left_total)
                    - right_total * gini(&right, right_total);

                if best.as_ref().map_or(true, |b| decrease > b.decrease) {
                    let mid = (value + next) / 2.0;
                    let threshold = if mid < next { mid } else { value };
                    best = Some(Candidate {
                        feature,
                        threshold,
                        decrease,
                    });
                }
            }
        }

        best
    }
}

#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn grow_tree<'a>(
    x: ArrayView2<'a, f64>,
    y: &'a [usize],
    n_classes: usize,
    params: &'a ForestValidParams,
    rng: &mut StdRng,
) -> (Tree, Vec<f64>) {
    let n = x.nrows();
    let mut counts = vec![0usize; n];
    for _ in 0..n {
        counts[rng.gen_range(0..n)] += 1;
    }

    let mut class_counts = vec![0usize; n_classes];
    for (i, &c) in counts.iter().enumerate() {
        class_counts[y[i]] += c;
    }
    let present = class_counts.iter().filter(|&&c| c > 0).count();
    let class_weight: Vec<f64> = class_counts
        .iter()
        .map(|&c| {
            if c == 0 {
                0.0
            } else {
                n as f64 / (present * c) as f64
            }
        })
        .collect();

    let weights: Vec<f64> = counts
        .iter()
        .zip(y)
        .map(|(&c, &label)| c as f64 * class_weight[label])
        .collect();
    let samples: Vec<usize> = (0..n).filter(|&i| counts[i] > 0).collect();
    let max_features = ((x.ncols() as f64).sqrt().floor() as usize).max(1);

    let mut grower = Grower {
        x,
        y,
        weights,
        n_classes,
        max_features,
        params,
        nodes: Vec::new(),
        importance: vec![0.0; x.ncols()],
    };
    grower.grow(samples, 0, rng);

    (
        Tree {
            nodes: grower.nodes,
        },
        grower.importance,
    )
}

impl<D> Fit<ArrayBase<D, Ix2>, Array1<usize>, ConcordError> for ForestValidParams
where
    D: Data<Elem = f64>,
{
    type Object = RandomForest;

    #[allow(clippy::cast_precision_loss)]
    fn fit(&self, dataset: &DatasetBase<ArrayBase<D, Ix2>, Array1<usize>>) -> Result<RandomForest> {
        let x = dataset.records.view();
        let y: Vec<usize> = dataset.targets.to_vec();

        if x.nrows() == 0 || x.ncols() == 0 {
            return Err(ConcordError::EmptyInput(
                "cannot fit a forest without samples or features".into(),
            ));
        }
        if y.len() != x.nrows() {
            return Err(ConcordError::Precondition(format!(
                "{} samples but {} labels",
                x.nrows(),
                y.len()
            )));
        }

        let n_classes = y.iter().max().map_or(0, |m| m + 1);
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut trees = Vec::with_capacity(self.n_trees);
        let mut per_tree = Vec::new();

        for _ in 0..self.n_trees {
            let (tree, raw) = grow_tree(x, &y, n_classes, self, &mut rng);
            let sum: f64 = raw.iter().sum();
            if tree.nodes.len() > 1 && sum > 0.0 {
                per_tree.push(Array1::from(raw) / sum);
            }
            trees.push(tree);
        }

        let mut importance = Array1::zeros(x.ncols());
        if !per_tree.is_empty() {
            for imp in &per_tree {
                importance += imp;
            }
            importance /= per_tree.len() as f64;
            let sum = importance.sum();
            if sum > 0.0 {
                importance /= sum;
            }
        }

        Ok(RandomForest {
            trees,
            n_classes,
            importance,
        })
    }
}

impl<D> PredictInplace<ArrayBase<D, Ix2>, Array1<usize>> for RandomForest
where
    D: Data<Elem = f64>,
{
    fn predict_inplace<'a>(&'a self, x: &'a ArrayBase<D, Ix2>, y: &mut Array1<usize>) {
        assert_eq!(
            x.nrows(),
            y.len(),
            "The number of data points must match the number of output targets."
        );

        for (row, target) in x.rows().into_iter().zip(y.iter_mut()) {
            let proba = self.proba(row);
            *target = proba
                .iter()
                .enumerate()
                .fold((0, f64::NEG_INFINITY), |(bi, bp), (i, &p)| {
                    if p > bp {
                        (i, p)
                    } else {
                        (bi, bp)
                    }
                })
                .0;
        }
    }

    fn default_target(&self, x: &ArrayBase<D, Ix2>) -> Array1<usize> {
        Array1::zeros(x.nrows())
    }
}
