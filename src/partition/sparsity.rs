//! Objectives scoring a two-coloring of a transition matrix. Lower is better.

use crate::task::TransitionMatrix;

/// Replacement for any zero denominator in a sparsity objective.
pub const SPARSITY_EPSILON: f64 = 1e-3;

fn nonzero(denominator: f64) -> f64 {
    if denominator == 0.0 {
        SPARSITY_EPSILON
    } else {
        denominator
    }
}

/// Edge weights of a coloring: crossing edges and edges inside each color.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EdgeTally {
    pub cut: f64,
    pub inside_zero: f64,
    pub inside_one: f64,
    pub zeros: usize,
    pub ones: usize,
}

impl EdgeTally {
    pub fn of(matrix: &TransitionMatrix, coloring: &[bool]) -> Self {
        let size = matrix.size();
        let mut tally = EdgeTally::default();
        for i in 0..size {
            for j in 0..size {
                let w = matrix.get(i, j);
                if w <= 0.0 {
                    continue;
                }
                if coloring[i] != coloring[j] {
                    tally.cut += w;
                } else if coloring[i] {
                    tally.inside_one += w;
                } else {
                    tally.inside_zero += w;
                }
            }
        }
        tally.ones = coloring.iter().filter(|&&c| c).count();
        tally.zeros = size - tally.ones;
        tally
    }
}

/// Sparsity objective used by randomized local-search partitioning.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Sparsity {
    /// cut / (w(S0) · w(S1))
    #[default]
    CutOverEdgeCost,
    /// cut / (|S0| · |S1|)
    CutOverGraphSizes,
    /// cut / min(|S0|, |S1|)
    CutOverSmallerGraphSize,
    /// Weighted blend of the cut share and the size imbalance of the two
    /// groups, estimating communication overhead against load balance.
    EstimatedEfficiency { cut_weight: f64, balance_weight: f64 },
}

impl Sparsity {
    pub fn estimated_efficiency() -> Self {
        Sparsity::EstimatedEfficiency {
            cut_weight: 1.0,
            balance_weight: 1.0,
        }
    }

    pub fn evaluate(&self, matrix: &TransitionMatrix, coloring: &[bool]) -> f64 {
        let t = EdgeTally::of(matrix, coloring);
        let zeros = t.zeros as f64;
        let ones = t.ones as f64;
        match *self {
            Sparsity::CutOverEdgeCost => t.cut / nonzero(t.inside_zero * t.inside_one),
            Sparsity::CutOverGraphSizes => t.cut / nonzero(zeros * ones),
            Sparsity::CutOverSmallerGraphSize => t.cut / nonzero(zeros.min(ones)),
            Sparsity::EstimatedEfficiency {
                cut_weight,
                balance_weight,
            } => {
                let total = t.cut + t.inside_zero + t.inside_one;
                let cut_share = t.cut / nonzero(total);
                let imbalance = (zeros - ones).abs() / nonzero(zeros + ones);
                cut_weight * cut_share + balance_weight * imbalance
            }
        }
    }
}

impl std::fmt::Display for Sparsity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Sparsity::CutOverEdgeCost => write!(f, "cut_over_edge_cost"),
            Sparsity::CutOverGraphSizes => write!(f, "cut_over_graph_sizes"),
            Sparsity::CutOverSmallerGraphSize => write!(f, "cut_over_smaller_graph_size"),
            Sparsity::EstimatedEfficiency {
                cut_weight,
                balance_weight,
            } => write!(f, "estimated_efficiency({},{})", cut_weight, balance_weight),
        }
    }
}

impl std::str::FromStr for Sparsity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        if let Some(args) = normalized
            .strip_prefix("estimated_efficiency(")
            .and_then(|rest| rest.strip_suffix(')'))
        {
            let weights: Vec<f64> = args
                .split(',')
                .map(|w| w.trim().parse::<f64>())
                .collect::<Result<_, _>>()
                .map_err(|e| format!("Invalid estimated_efficiency weights '{}': {}", args, e))?;
            return match weights.as_slice() {
                [cut_weight, balance_weight] => Ok(Sparsity::EstimatedEfficiency {
                    cut_weight: *cut_weight,
                    balance_weight: *balance_weight,
                }),
                _ => Err(format!(
                    "estimated_efficiency takes two weights, got '{}'",
                    args
                )),
            };
        }
        match normalized.as_str() {
            "cut_over_edge_cost" | "edge_cost" => Ok(Sparsity::CutOverEdgeCost),
            "cut_over_graph_sizes" | "graph_sizes" => Ok(Sparsity::CutOverGraphSizes),
            "cut_over_smaller_graph_size" | "smaller_graph_size" => {
                Ok(Sparsity::CutOverSmallerGraphSize)
            }
            "estimated_efficiency" | "efficiency" => Ok(Sparsity::estimated_efficiency()),
            _ => Err(format!(
                "Unknown sparsity: '{}'. Valid options: cut_over_edge_cost, cut_over_graph_sizes, \
                 cut_over_smaller_graph_size, estimated_efficiency",
                s
            )),
        }
    }
}
