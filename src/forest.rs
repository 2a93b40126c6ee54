use ndarray::{Array1, ArrayView2};
use rand::{Rng, RngCore, SeedableRng, rngs::StdRng};
use rayon::prelude::*;

use crate::{
    data::ReadmissionData,
    error::{Result, RiskError},
    model::{Classifier, FeatureRanking, RankingKind},
    tree::{DecisionTree, TreeParams},
};

/// bagged ensemble of gini trees
///
/// every tree gets its own `StdRng`, seeded from a master rng before any tree
/// is grown, so the fitted forest is identical whether trees grow in parallel or not.
#[derive(Debug, Clone)]
pub struct RandomForest {
    n_trees: usize,
    max_depth: usize,
    min_samples_split: usize,
    min_samples_leaf: usize,
    max_features: Option<usize>, // None -> sqrt(n_features)
    bootstrap: bool,
    seed: u64,
    parallel: bool,
    trees: Vec<DecisionTree>,
    feature_names: Option<Vec<String>>,
    importances: Option<Array1<f64>>,
}

impl Default for RandomForest {
    fn default() -> Self {
        Self {
            n_trees: 2000,
            max_depth: 8,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            bootstrap: true,
            seed: 42,
            parallel: true,
            trees: Vec::new(),
            feature_names: None,
            importances: None,
        }
    }
}

impl RandomForest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_n_trees(mut self, n_trees: usize) -> Self {
        self.n_trees = n_trees;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_min_samples_split(mut self, min_samples_split: usize) -> Self {
        self.min_samples_split = min_samples_split;
        self
    }

    pub fn with_min_samples_leaf(mut self, min_samples_leaf: usize) -> Self {
        self.min_samples_leaf = min_samples_leaf;
        self
    }

    /// features tried per split; `None` means sqrt of the column count
    pub fn with_max_features(mut self, max_features: Option<usize>) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn with_bootstrap(mut self, bootstrap: bool) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// grow trees on the rayon pool (results don't depend on this)
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn n_trees(&self) -> usize {
        self.n_trees
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    /// mean decrease in impurity, averaged over trees and summing to 1
    pub fn feature_importances(&self) -> Result<&Array1<f64>> {
        self.importances.as_ref().ok_or(RiskError::ModelNotFitted)
    }

    fn tree_params(&self, n_features: usize) -> TreeParams {
        let max_features = self
            .max_features
            .unwrap_or_else(|| (n_features as f64).sqrt().floor() as usize)
            .clamp(1, n_features.max(1));
        TreeParams {
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
            max_features,
        }
    }

    fn grow_tree(
        &self,
        data: &ReadmissionData,
        params: TreeParams,
        tree_seed: u64,
    ) -> Result<DecisionTree> {
        let n = data.n_samples();
        let mut rng = StdRng::seed_from_u64(tree_seed);
        let rows: Vec<usize> = if self.bootstrap {
            (0..n).map(|_| rng.gen_range(0..n)).collect()
        } else {
            (0..n).collect()
        };
        DecisionTree::fit(data.features(), data.labels(), &rows, params, &mut rng)
    }
}

impl Classifier for RandomForest {
    fn name(&self) -> &str {
        "Random Forest"
    }

    fn fit(&mut self, data: &ReadmissionData) -> Result<()> {
        if self.n_trees == 0 {
            return Err(RiskError::invalid_parameter("n_trees", "0"));
        }
        if self.max_depth == 0 {
            return Err(RiskError::invalid_parameter("max_depth", "0"));
        }
        if data.n_samples() == 0 {
            return Err(RiskError::invalid_dimensions("can't fit a forest on zero rows"));
        }

        let params = self.tree_params(data.n_features());
        let mut master = StdRng::seed_from_u64(self.seed);
        let tree_seeds: Vec<u64> = (0..self.n_trees).map(|_| master.next_u64()).collect();

        log::info!(
            "random forest: growing {} trees (max depth {}, {} of {} features per split)",
            self.n_trees,
            self.max_depth,
            params.max_features,
            data.n_features()
        );

        let trees: Vec<DecisionTree> = if self.parallel {
            tree_seeds
                .par_iter()
                .map(|&seed| self.grow_tree(data, params, seed))
                .collect::<Result<_>>()?
        } else {
            tree_seeds
                .iter()
                .map(|&seed| self.grow_tree(data, params, seed))
                .collect::<Result<_>>()?
        };

        let mut importances = Array1::zeros(data.n_features());
        for tree in &trees {
            importances += &tree.feature_importances();
        }
        let total = importances.sum();
        if total > 0.0 {
            importances /= total;
        }

        let mean_depth = trees.iter().map(|t| t.depth()).sum::<usize>() as f64 / trees.len() as f64;
        log::debug!("random forest: mean tree depth {mean_depth:.2}");

        self.trees = trees;
        self.importances = Some(importances);
        self.feature_names = Some(data.feature_names().to_vec());
        Ok(())
    }

    fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }

    fn feature_names(&self) -> Option<&[String]> {
        self.feature_names.as_deref()
    }

    fn predict_proba_matrix(&self, features: ArrayView2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(RiskError::ModelNotFitted);
        }

        let mut total = Array1::zeros(features.nrows());
        for tree in &self.trees {
            total += &tree.predict_proba(features)?;
        }
        Ok(total / self.trees.len() as f64)
    }

    fn feature_ranking(&self) -> Result<FeatureRanking> {
        let importances = self.feature_importances()?;
        let names = self.feature_names.as_deref().ok_or(RiskError::ModelNotFitted)?;
        FeatureRanking::new(RankingKind::Importance, names, importances.view())
    }
}
