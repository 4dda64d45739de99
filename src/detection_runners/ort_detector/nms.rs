pub trait Nms {
    fn iou(&self, other: &Self) -> f32;
    fn confidence(&self) -> f32;
    fn class_id(&self) -> usize;
}

/// Greedy per-class non-maximum suppression.
///
/// Boxes are ordered by descending confidence (stable, so equal scores keep their input
/// order) and a box is dropped when an already kept box of the same class overlaps it by
/// more than `iou_threshold`. Kept boxes stay in confidence order.
pub fn non_max_suppression<T: Nms>(boxes: &mut Vec<T>, iou_threshold: f32) {
    boxes.sort_by(|b1, b2| b2.confidence().total_cmp(&b1.confidence()));
    let mut current_index = 0;
    for index in 0..boxes.len() {
        let mut drop = false;
        for prev_index in 0..current_index {
            if boxes[prev_index].class_id() != boxes[index].class_id() {
                continue;
            }
            if boxes[prev_index].iou(&boxes[index]) > iou_threshold {
                drop = true;
                break;
            }
        }
        if !drop {
            boxes.swap(current_index, index);
            current_index += 1;
        }
    }
    boxes.truncate(current_index);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{BoundingBox, Detection};

    fn det(class_id: usize, conf: f32, x: f32, y: f32, w: f32, h: f32) -> Detection {
        Detection::new(class_id, "", conf, BoundingBox::new(x, y, w, h))
    }

    #[test]
    fn suppresses_lower_confidence_overlap_of_same_class() {
        // IoU = 0.225 / 0.275 ≈ 0.82
        let a = det(0, 0.9, 0.0, 0.0, 0.5, 0.5);
        let b = det(0, 0.4, 0.0, 0.05, 0.5, 0.5);
        assert!(a.iou(&b) > 0.5);
        let mut boxes = vec![b, a.clone()];
        non_max_suppression(&mut boxes, 0.5);
        assert_eq!(boxes, vec![a]);
    }

    #[test]
    fn iou_of_seven_tenths_is_suppressed_at_half() {
        // widths 17/64 offset by 3/64: intersection 14, union 20
        let a = det(3, 0.9, 0.0, 0.25, 17.0 / 64.0, 0.5);
        let b = det(3, 0.4, 3.0 / 64.0, 0.25, 17.0 / 64.0, 0.5);
        assert!((a.iou(&b) - 0.7).abs() < 1e-6);
        let mut boxes = vec![a.clone(), b];
        non_max_suppression(&mut boxes, 0.5);
        assert_eq!(boxes, vec![a]);
    }

    #[test]
    fn different_classes_never_suppress_each_other() {
        let a = det(0, 0.9, 0.1, 0.1, 0.3, 0.3);
        let b = det(2, 0.8, 0.1, 0.1, 0.3, 0.3);
        let mut boxes = vec![a, b];
        non_max_suppression(&mut boxes, 0.5);
        assert_eq!(boxes.len(), 2);
    }

    #[test]
    fn overlap_at_threshold_is_kept() {
        // Half-width overlap: IoU = 1/3
        let a = det(1, 0.9, 0.0, 0.0, 0.2, 0.2);
        let b = det(1, 0.6, 0.1, 0.0, 0.2, 0.2);
        let iou = a.iou(&b);
        let mut boxes = vec![a, b];
        non_max_suppression(&mut boxes, iou);
        assert_eq!(boxes.len(), 2);
    }

    #[test]
    fn equal_confidence_keeps_input_order() {
        let first = det(0, 0.7, 0.0, 0.0, 0.4, 0.4);
        let second = det(0, 0.7, 0.01, 0.0, 0.4, 0.4);
        let mut boxes = vec![first.clone(), second];
        non_max_suppression(&mut boxes, 0.5);
        assert_eq!(boxes, vec![first]);
    }

    #[test]
    fn output_sorted_by_confidence() {
        let mut boxes = vec![
            det(0, 0.3, 0.0, 0.0, 0.1, 0.1),
            det(0, 0.8, 0.5, 0.5, 0.1, 0.1),
            det(1, 0.6, 0.2, 0.2, 0.1, 0.1),
        ];
        non_max_suppression(&mut boxes, 0.5);
        let confs: Vec<f32> = boxes.iter().map(|b| b.confidence).collect();
        assert_eq!(confs, vec![0.8, 0.6, 0.3]);
    }
}
