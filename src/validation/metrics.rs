//! Binary classification metrics

use crate::error::{RacoonsError, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Receiver operating characteristic curve
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RocCurve {
    /// False positive rate per threshold, non-decreasing from 0 to 1
    pub fpr: Array1<f64>,
    /// True positive rate per threshold
    pub tpr: Array1<f64>,
    /// Decreasing score thresholds; the first is `+inf`
    pub thresholds: Array1<f64>,
}

/// Confusion counts at a fixed decision threshold
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionCounts {
    pub tp: usize,
    pub fp: usize,
    pub tn: usize,
    pub fn_: usize,
}

impl ConfusionCounts {
    /// Count predictions against 0/1 labels
    pub fn from_predictions(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Self {
        let mut counts = Self::default();
        for (&p, &a) in y_pred.iter().zip(y_true.iter()) {
            match (p >= 0.5, a >= 0.5) {
                (true, true) => counts.tp += 1,
                (true, false) => counts.fp += 1,
                (false, false) => counts.tn += 1,
                (false, true) => counts.fn_ += 1,
            }
        }
        counts
    }
}

fn check_lengths(a: &Array1<f64>, b: &Array1<f64>) -> Result<()> {
    if a.len() != b.len() {
        return Err(RacoonsError::ShapeError {
            expected: format!("{} values", a.len()),
            actual: format!("{} values", b.len()),
        });
    }
    Ok(())
}

/// Compute the ROC curve of `scores` against 0/1 labels.
///
/// One point per distinct score, plus the origin. Fails when `y_true` does
/// not contain both classes, since one of the rates is then undefined.
pub fn roc_curve(y_true: &Array1<f64>, scores: &Array1<f64>) -> Result<RocCurve> {
    check_lengths(y_true, scores)?;
    let n_pos = y_true.iter().filter(|&&v| v >= 0.5).count();
    let n_neg = y_true.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return Err(RacoonsError::ValidationError(
            "ROC curve needs both classes in y_true".to_string(),
        ));
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let mut fpr = vec![0.0];
    let mut tpr = vec![0.0];
    let mut thresholds = vec![f64::INFINITY];
    let (mut tp, mut fp) = (0usize, 0usize);
    for (rank, &idx) in order.iter().enumerate() {
        if y_true[idx] >= 0.5 {
            tp += 1;
        } else {
            fp += 1;
        }
        // emit a point only after the last sample sharing this score
        let last_of_score = order
            .get(rank + 1)
            .map_or(true, |&next| scores[next] != scores[idx]);
        if last_of_score {
            fpr.push(fp as f64 / n_neg as f64);
            tpr.push(tp as f64 / n_pos as f64);
            thresholds.push(scores[idx]);
        }
    }

    Ok(RocCurve {
        fpr: Array1::from_vec(fpr),
        tpr: Array1::from_vec(tpr),
        thresholds: Array1::from_vec(thresholds),
    })
}

/// Trapezoidal area under a curve with non-decreasing `x`
pub fn auc(x: &Array1<f64>, y: &Array1<f64>) -> Result<f64> {
    check_lengths(x, y)?;
    Ok(x.iter()
        .zip(y.iter())
        .zip(x.iter().skip(1).zip(y.iter().skip(1)))
        .map(|((x0, y0), (x1, y1))| (x1 - x0) * (y0 + y1) / 2.0)
        .sum())
}

/// Area under the ROC curve
pub fn roc_auc_score(y_true: &Array1<f64>, scores: &Array1<f64>) -> Result<f64> {
    let roc = roc_curve(y_true, scores)?;
    auc(&roc.fpr, &roc.tpr)
}

/// F1 score of hard 0/1 predictions
///
/// F1 = 2TP / (2TP + FP + FN), defined as 0 when there are no positives
/// in either the labels or the predictions
pub fn f1_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
    check_lengths(y_true, y_pred)?;
    let c = ConfusionCounts::from_predictions(y_true, y_pred);
    let denom = 2 * c.tp + c.fp + c.fn_;
    if denom == 0 {
        return Ok(0.0);
    }
    Ok(2.0 * c.tp as f64 / denom as f64)
}

/// One-dimensional linear interpolation of `(xp, fp)` at the points `x`.
///
/// `xp` must be non-decreasing. Values outside its range take the nearest
/// endpoint; at repeated `xp` entries the last one wins.
pub fn interp(x: &Array1<f64>, xp: &Array1<f64>, fp: &Array1<f64>) -> Result<Array1<f64>> {
    check_lengths(xp, fp)?;
    if xp.is_empty() {
        return Err(RacoonsError::DataError("Cannot interpolate an empty curve".to_string()));
    }
    let xs = xp.to_vec();
    let last = xs.len() - 1;

    Ok(x.mapv(|v| {
        let j = xs.partition_point(|&p| p <= v);
        if j == 0 {
            fp[0]
        } else if j > last {
            fp[last]
        } else {
            let lo = j - 1;
            let (x0, x1) = (xs[lo], xs[j]);
            fp[lo] + (fp[j] - fp[lo]) * (v - x0) / (x1 - x0)
        }
    }))
}

/// Mean and population standard deviation, ignoring NaN entries.
/// Both are NaN when no finite value is present.
pub fn mean_std(values: &[f64]) -> (f64, f64) {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return (f64::NAN, f64::NAN);
    }
    let n = finite.len() as f64;
    let mean = finite.iter().sum::<f64>() / n;
    let variance = finite.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

/// Point-wise mean of equally sized curves, ignoring NaN curves
pub fn mean_curve(curves: &[Array1<f64>], len: usize) -> Array1<f64> {
    Array1::from_shape_fn(len, |i| {
        let column: Vec<f64> = curves.iter().filter_map(|c| c.get(i).copied()).collect();
        mean_std(&column).0
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_roc_curve_perfect_and_ties() {
        let y = array![0.0, 0.0, 1.0, 1.0];
        let roc = roc_curve(&y, &array![0.1, 0.4, 0.35, 0.8]).unwrap();
        assert_eq!(roc.fpr.to_vec(), vec![0.0, 0.0, 0.5, 0.5, 1.0]);
        assert_eq!(roc.tpr.to_vec(), vec![0.0, 0.5, 0.5, 1.0, 1.0]);
        assert!((roc_auc_score(&y, &array![0.1, 0.4, 0.35, 0.8]).unwrap() - 0.75).abs() < 1e-12);

        // constant scores collapse to the diagonal
        let roc = roc_curve(&y, &array![0.5, 0.5, 0.5, 0.5]).unwrap();
        assert_eq!(roc.fpr.len(), 2);
        assert!((auc(&roc.fpr, &roc.tpr).unwrap() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_roc_needs_both_classes() {
        assert!(roc_curve(&array![1.0, 1.0], &array![0.2, 0.9]).is_err());
    }

    #[test]
    fn test_f1_score() {
        let y = array![1.0, 1.0, 0.0, 0.0];
        assert!((f1_score(&y, &array![1.0, 0.0, 1.0, 0.0]).unwrap() - 0.5).abs() < 1e-12);
        assert_eq!(f1_score(&array![0.0, 0.0], &array![0.0, 0.0]).unwrap(), 0.0);
    }

    #[test]
    fn test_interp() {
        let xp = array![0.0, 0.5, 0.5, 1.0];
        let fp = array![0.0, 0.2, 0.8, 1.0];
        let out = interp(&array![-1.0, 0.25, 0.5, 0.75, 2.0], &xp, &fp).unwrap();
        for (got, want) in out.iter().zip([0.0, 0.1, 0.8, 0.9, 1.0]) {
            assert!((got - want).abs() < 1e-12, "{} != {}", got, want);
        }
    }

    #[test]
    fn test_mean_std_skips_nan() {
        let (mean, std) = mean_std(&[1.0, f64::NAN, 3.0]);
        assert_eq!(mean, 2.0);
        assert_eq!(std, 1.0);
        assert!(mean_std(&[f64::NAN]).0.is_nan());
    }
}
