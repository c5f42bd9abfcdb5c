use crate::models::{AggregationResult, EnrichedDetection};

/// Collects enriched detections in order and sums their points.
#[derive(Debug, Default)]
pub struct ResultAggregator {
    detections: Vec<EnrichedDetection>,
    total_points: u64,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, det: EnrichedDetection) {
        self.total_points += u64::from(det.points);
        self.detections.push(det);
    }

    pub fn finish(self) -> AggregationResult {
        AggregationResult {
            detections: self.detections,
            total_points: self.total_points,
        }
    }
}

impl FromIterator<EnrichedDetection> for AggregationResult {
    fn from_iter<I: IntoIterator<Item = EnrichedDetection>>(iter: I) -> Self {
        let mut aggregator = ResultAggregator::new();
        for det in iter {
            aggregator.push(det);
        }
        aggregator.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BoundingBox;

    fn enriched(label: &str, points: u32) -> EnrichedDetection {
        EnrichedDetection {
            bbox: BoundingBox::new(0, 0, 10, 10),
            score: 0.9,
            class_id: 0,
            label: label.to_string(),
            points,
            crop: String::new(),
            ocr: String::new(),
        }
    }

    #[test]
    fn sums_baked_in_points_in_order() {
        let result: AggregationResult =
            vec![enriched("9V", 50), enriched("AAA", 5), enriched("mystery", 0), enriched("9V", 50)]
                .into_iter()
                .collect();

        assert_eq!(result.total_points, 105);
        let labels: Vec<&str> = result.detections.iter().map(|d| d.label.as_str()).collect();
        assert_eq!(labels, vec!["9V", "AAA", "mystery", "9V"]);
    }

    #[test]
    fn empty_is_zero() {
        let result = ResultAggregator::new().finish();
        assert!(result.detections.is_empty());
        assert_eq!(result.total_points, 0);
    }
}
