use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};

use crate::error::{Result, RiskError};

/// row indices for each side of a split, both sorted ascending
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// split row indices so each class keeps its share in both partitions
pub fn stratified_split(labels: &[bool], test_fraction: f64, seed: u64) -> Result<SplitIndices> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(RiskError::invalid_parameter("test_fraction", test_fraction.to_string()));
    }

    let n = labels.len();
    if n == 0 {
        return Err(RiskError::invalid_dimensions("can't split an empty label set"));
    }

    let negatives: Vec<usize> = (0..n).filter(|&i| !labels[i]).collect();
    let positives: Vec<usize> = (0..n).filter(|&i| labels[i]).collect();
    let classes: Vec<Vec<usize>> = [negatives, positives]
        .into_iter()
        .filter(|members| !members.is_empty())
        .collect();

    if let Some(smallest) = classes.iter().map(Vec::len).min() {
        if smallest < 2 {
            return Err(RiskError::invalid_dimensions(
                "least populated class has only 1 member - need at least 2 to stratify",
            ));
        }
    }

    let n_test = (test_fraction * n as f64).ceil() as usize;
    if n_test < classes.len() {
        return Err(RiskError::invalid_dimensions(format!(
            "holdout of {n_test} rows can't hold all {} classes",
            classes.len()
        )));
    }
    if n_test > n - classes.len() {
        return Err(RiskError::invalid_dimensions(format!(
            "holdout of {n_test} rows leaves a class w/ nothing to train on ({n} rows total)"
        )));
    }

    let sizes: Vec<usize> = classes.iter().map(Vec::len).collect();
    let allocation = allocate_holdout(&sizes, n_test);

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(n - n_test);
    let mut test = Vec::with_capacity(n_test);

    for (mut members, k) in classes.into_iter().zip(allocation) {
        members.shuffle(&mut rng);
        test.extend_from_slice(&members[..k]);
        train.extend_from_slice(&members[k..]);
    }

    train.sort_unstable();
    test.sort_unstable();

    log::debug!("stratified split: {} train / {} holdout (seed {seed})", train.len(), test.len());
    Ok(SplitIndices { train, test })
}

/// share `n_test` across classes by largest remainder, keeping every class on both sides
fn allocate_holdout(sizes: &[usize], n_test: usize) -> Vec<usize> {
    let n: usize = sizes.iter().sum();
    let exact: Vec<f64> = sizes
        .iter()
        .map(|&size| n_test as f64 * size as f64 / n as f64)
        .collect();

    let mut allocation: Vec<usize> = exact.iter().map(|x| x.floor() as usize).collect();
    let mut remaining = n_test - allocation.iter().sum::<usize>();

    // ties go to the lower class index so the result doesn't depend on float noise ordering
    let mut order: Vec<usize> = (0..sizes.len()).collect();
    order.sort_by(|&a, &b| {
        let ra = exact[a] - exact[a].floor();
        let rb = exact[b] - exact[b].floor();
        rb.partial_cmp(&ra).unwrap_or(std::cmp::Ordering::Equal).then(a.cmp(&b))
    });
    for &class in order.iter().cycle() {
        if remaining == 0 {
            break;
        }
        if allocation[class] < sizes[class] - 1 {
            allocation[class] += 1;
            remaining -= 1;
        }
    }

    // every class needs a foot in both partitions
    for class in 0..sizes.len() {
        if allocation[class] == 0 {
            if let Some(donor) = (0..sizes.len()).max_by_key(|&c| allocation[c]) {
                allocation[donor] -= 1;
                allocation[class] += 1;
            }
        }
        if allocation[class] >= sizes[class] {
            if let Some(receiver) = (0..sizes.len()).find(|&c| allocation[c] + 1 < sizes[c]) {
                allocation[class] -= 1;
                allocation[receiver] += 1;
            }
        }
    }

    allocation
}
