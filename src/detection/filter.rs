use crate::models::RawDetection;

/// Boxes narrower or shorter than this are treated as noise.
pub const MIN_BOX_SIDE: i64 = 5;

/// Drops low-confidence and degenerate detections.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionFilter {
    pub confidence_threshold: f32,
    pub min_side: i64,
}

impl DetectionFilter {
    pub fn new(confidence_threshold: f32) -> Self {
        Self {
            confidence_threshold,
            min_side: MIN_BOX_SIDE,
        }
    }

    /// The detector may use a different floor, so the caller's threshold is
    /// checked again here.
    pub fn passes_confidence(&self, det: &RawDetection) -> bool {
        det.score >= self.confidence_threshold
    }

    pub fn passes_size(&self, det: &RawDetection) -> bool {
        det.bbox.width() >= self.min_side && det.bbox.height() >= self.min_side
    }

    /// Keep admitted detections in input order, paired with their emission
    /// index.
    pub fn apply<'a>(&self, raw: &'a [RawDetection]) -> Vec<(usize, &'a RawDetection)> {
        raw.iter()
            .enumerate()
            .filter(|(_, det)| self.passes_confidence(det) && self.passes_size(det))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BoundingBox;

    fn det(score: f32, x1: i32, y1: i32, x2: i32, y2: i32) -> RawDetection {
        RawDetection {
            bbox: BoundingBox::new(x1, y1, x2, y2),
            score,
            class_id: 0,
        }
    }

    #[test]
    fn threshold_is_inclusive() {
        let filter = DetectionFilter::new(0.5);
        let raw = vec![det(0.5, 0, 0, 10, 10), det(0.4999, 0, 0, 10, 10), det(0.9, 0, 0, 10, 10)];
        let kept: Vec<usize> = filter.apply(&raw).into_iter().map(|(i, _)| i).collect();
        assert_eq!(kept, vec![0, 2]);
    }

    #[test]
    fn small_boxes_are_dropped_regardless_of_score() {
        let filter = DetectionFilter::new(0.0);
        let raw = vec![
            det(1.0, 0, 0, 4, 100),
            det(1.0, 0, 0, 100, 4),
            det(1.0, 10, 10, 15, 15),
            det(1.0, 20, 20, 10, 40),
        ];
        let kept = filter.apply(&raw);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].0, 2);
    }

    #[test]
    fn extreme_boxes_are_judged_without_overflow() {
        let filter = DetectionFilter::new(0.25);
        let raw = vec![
            det(0.9, i32::MIN, 0, i32::MAX, 10),
            det(0.9, i32::MAX, 0, i32::MIN, 10),
            det(0.9, 0, i32::MAX, 10, i32::MIN),
        ];
        let kept: Vec<usize> = filter.apply(&raw).into_iter().map(|(i, _)| i).collect();
        assert_eq!(kept, vec![0]);
    }

    #[test]
    fn order_is_preserved() {
        let filter = DetectionFilter::new(0.3);
        let raw = vec![
            det(0.4, 0, 0, 20, 20),
            det(0.1, 0, 0, 20, 20),
            det(0.9, 5, 5, 50, 50),
            det(0.3, 1, 1, 9, 9),
        ];
        let kept: Vec<usize> = filter.apply(&raw).into_iter().map(|(i, _)| i).collect();
        assert_eq!(kept, vec![0, 2, 3]);
    }

    #[test]
    fn no_survivors_is_empty() {
        let filter = DetectionFilter::new(0.99);
        assert!(filter.apply(&[det(0.2, 0, 0, 20, 20)]).is_empty());
        assert!(filter.apply(&[]).is_empty());
    }
}
