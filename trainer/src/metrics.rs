use ndarray::ArrayView1;
use serde::Serialize;

/// Regression quality over a set of examples
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct RegressionMetrics {
    /// Mean squared error
    pub loss: f64,
    pub rmse: f64,
    /// Squared Pearson correlation
    pub r2: f64,
    /// Coefficient of determination
    pub r2_score: f64,
    pub count: usize,
}

/// Running sums, so metrics can be computed over many batches without keeping the predictions
#[derive(Debug, Default, Clone)]
pub struct MetricsAccumulator {
    count: usize,
    sum_preds: f64,
    sum_labels: f64,
    sum_preds_sq: f64,
    sum_labels_sq: f64,
    sum_cross: f64,
    sum_sq_error: f64,
}

impl MetricsAccumulator {
    pub fn add(&mut self, preds: ArrayView1<f32>, labels: ArrayView1<f32>) {
        for (pred, label) in preds.iter().zip(labels.iter()) {
            let (pred, label) = (*pred as f64, *label as f64);
            self.count += 1;
            self.sum_preds += pred;
            self.sum_labels += label;
            self.sum_preds_sq += pred * pred;
            self.sum_labels_sq += label * label;
            self.sum_cross += pred * label;
            self.sum_sq_error += (pred - label) * (pred - label);
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Zero-variance predictions or labels give an r2 of 0
    pub fn finish(&self) -> RegressionMetrics {
        if self.count == 0 {
            return RegressionMetrics::default();
        }

        let n = self.count as f64;
        let loss = self.sum_sq_error / n;
        let var_preds = n * self.sum_preds_sq - self.sum_preds * self.sum_preds;
        let var_labels = n * self.sum_labels_sq - self.sum_labels * self.sum_labels;
        let cov = n * self.sum_cross - self.sum_preds * self.sum_labels;

        let r2 = if var_preds > 0.0 && var_labels > 0.0 {
            (cov * cov) / (var_preds * var_labels)
        } else {
            0.0
        };
        let total = var_labels / n;
        let r2_score = if total > 0.0 { 1.0 - self.sum_sq_error / total } else { 0.0 };

        RegressionMetrics {
            loss,
            rmse: loss.sqrt(),
            r2,
            r2_score,
            count: self.count,
        }
    }
}

/// Metrics of one evaluation, tagged with the number of finished training epochs
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvalRecord {
    pub epoch: usize,
    #[serde(flatten)]
    pub metrics: RegressionMetrics,
}

#[cfg(test)]
mod tests {
    use ndarray::array;
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_perfect_predictions() {
        let mut acc = MetricsAccumulator::default();
        acc.add(array![1.0, 2.0, 3.0].view(), array![1.0, 2.0, 3.0].view());
        let metrics = acc.finish();
        assert_eq!(metrics.count, 3);
        assert!(close(metrics.loss, 0.0));
        assert!(close(metrics.r2, 1.0));
        assert!(close(metrics.r2_score, 1.0));
    }

    #[test]
    fn test_batches_add_up() {
        let preds = array![1.0, 3.0, 2.0, 5.0];
        let labels = array![1.5, 2.0, 2.5, 4.0];

        let mut whole = MetricsAccumulator::default();
        whole.add(preds.view(), labels.view());
        let mut parts = MetricsAccumulator::default();
        parts.add(preds.slice(ndarray::s![..2]), labels.slice(ndarray::s![..2]));
        parts.add(preds.slice(ndarray::s![2..]), labels.slice(ndarray::s![2..]));

        let (a, b) = (whole.finish(), parts.finish());
        assert!(close(a.loss, b.loss));
        assert!(close(a.r2, b.r2));
        assert!(close(a.loss, (0.25 + 1.0 + 0.25 + 1.0) / 4.0));
        assert!(close(a.rmse, a.loss.sqrt()));
    }

    #[test]
    fn test_shifted_predictions_keep_pearson() {
        let mut acc = MetricsAccumulator::default();
        acc.add(array![2.0, 3.0, 4.0].view(), array![1.0, 2.0, 3.0].view());
        let metrics = acc.finish();
        assert!(close(metrics.r2, 1.0));
        // sse = 3, sst = 2
        assert!(close(metrics.r2_score, -0.5));
    }

    #[test]
    fn test_empty_and_constant() {
        assert_eq!(MetricsAccumulator::default().finish(), RegressionMetrics::default());

        let mut acc = MetricsAccumulator::default();
        acc.add(array![1.0, 1.0].view(), array![0.0, 2.0].view());
        assert_eq!(acc.finish().r2, 0.0);
    }
}
