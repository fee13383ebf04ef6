use serde::Serialize;

/// Rows are true labels, columns are predicted labels.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfusionMatrix {
    pub counts: Vec<Vec<usize>>,
    /// Predictions whose index falls outside the label set.
    pub out_of_range: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassMetrics {
    pub label: String,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

pub fn accuracy(truth: &[usize], predicted: &[usize]) -> f64 {
    if truth.is_empty() {
        return 0.0;
    }
    let correct = truth
        .iter()
        .zip(predicted)
        .filter(|(t, p)| t == p)
        .count();
    correct as f64 / truth.len() as f64
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

impl ConfusionMatrix {
    pub fn new(truth: &[usize], predicted: &[usize], num_classes: usize) -> Self {
        let mut counts = vec![vec![0; num_classes]; num_classes];
        let mut out_of_range = 0;
        for (&t, &p) in truth.iter().zip(predicted) {
            if t < num_classes && p < num_classes {
                counts[t][p] += 1;
            } else {
                out_of_range += 1;
            }
        }
        Self {
            counts,
            out_of_range,
        }
    }

    pub fn num_classes(&self) -> usize {
        self.counts.len()
    }

    pub fn support(&self, class: usize) -> usize {
        self.counts[class].iter().sum()
    }

    pub fn predicted_total(&self, class: usize) -> usize {
        self.counts.iter().map(|row| row[class]).sum()
    }

    /// Fraction of class samples predicted correctly, i.e. recall.
    pub fn class_accuracy(&self, class: usize) -> f64 {
        ratio(self.counts[class][class], self.support(class))
    }

    pub fn per_class(&self, labels: &[String]) -> Vec<ClassMetrics> {
        (0..self.num_classes())
            .map(|class| {
                let hits = self.counts[class][class];
                let precision = ratio(hits, self.predicted_total(class));
                let recall = ratio(hits, self.support(class));
                let f1 = if precision + recall > 0.0 {
                    2.0 * precision * recall / (precision + recall)
                } else {
                    0.0
                };
                ClassMetrics {
                    label: labels
                        .get(class)
                        .cloned()
                        .unwrap_or_else(|| class.to_string()),
                    precision,
                    recall,
                    f1,
                    support: self.support(class),
                }
            })
            .collect()
    }
}
