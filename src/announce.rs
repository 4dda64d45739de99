//! Spoken scene summaries.

use crate::common::DetectionWithDepth;
use crate::data::Priority;

pub const NOTHING_IN_VIEW: &str =
    "No objects of interest present in the scenery. Try moving your camera around to explore different areas.";

/// Remembers the last published detection count and reports changes.
#[derive(Debug, Default)]
pub struct SceneChangeTracker {
    last_count: usize,
}

impl SceneChangeTracker {
    pub fn new() -> Self {
        Default::default()
    }

    /// Announcement text when `count` differs from the previous observation.
    pub fn observe(&mut self, count: usize) -> Option<String> {
        if count == self.last_count {
            return None;
        }
        log::debug!("Scene change: {} -> {} objects", self.last_count, count);
        self.last_count = count;
        Some(match count {
            0 => "No detections".to_string(),
            1 => "1 detection".to_string(),
            n => format!("{n} detections"),
        })
    }

    pub fn reset(&mut self) {
        self.last_count = 0;
    }
}

/// "N millimeters", "X.X meters" or "unknown distance".
pub fn spoken_distance(distance_mm: u32) -> String {
    match distance_mm {
        0 => "unknown distance".to_string(),
        mm if mm < 1000 => format!("{mm} millimeters"),
        mm => format!("{:.1} meters", mm as f32 / 1000.0),
    }
}

/// Describes what is to the left and right of the frame center, nearest first.
pub fn describe_sides(detections: &[DetectionWithDepth]) -> (String, Priority) {
    if detections.is_empty() {
        return (NOTHING_IN_VIEW.to_string(), Priority::High);
    }

    let (mut left, mut right): (Vec<&DetectionWithDepth>, Vec<&DetectionWithDepth>) =
        detections.iter().partition(|d| d.detection.bbox.cx() < 0.5);
    left.sort_by_key(|d| d.distance_mm);
    right.sort_by_key(|d| d.distance_mm);

    let side = |title: &str, items: &[&DetectionWithDepth]| {
        let listed: Vec<String> = items
            .iter()
            .map(|d| format!("{} at {}", d.detection.label, spoken_distance(d.distance_mm)))
            .collect();
        format!("{title}: {}", listed.join(", "))
    };

    let mut parts = Vec::with_capacity(2);
    if !left.is_empty() {
        parts.push(side("Objects to your left", &left));
    }
    if !right.is_empty() {
        parts.push(side("Objects to your right", &right));
    }
    (parts.join(". "), Priority::High)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{BoundingBox, Detection};

    fn dwd(label: &str, x: f32, distance_mm: u32) -> DetectionWithDepth {
        DetectionWithDepth::new(
            Detection::new(0, label, 0.9, BoundingBox::new(x, 0.2, 0.1, 0.1)),
            distance_mm,
        )
    }

    #[test]
    fn reports_only_count_changes() {
        let mut tracker = SceneChangeTracker::new();
        assert_eq!(tracker.observe(0), None);
        assert_eq!(tracker.observe(1).as_deref(), Some("1 detection"));
        assert_eq!(tracker.observe(1), None);
        assert_eq!(tracker.observe(3).as_deref(), Some("3 detections"));
        assert_eq!(tracker.observe(0).as_deref(), Some("No detections"));
    }

    #[test]
    fn distance_wording() {
        assert_eq!(spoken_distance(0), "unknown distance");
        assert_eq!(spoken_distance(999), "999 millimeters");
        assert_eq!(spoken_distance(1000), "1.0 meters");
        assert_eq!(spoken_distance(2345), "2.3 meters");
    }

    #[test]
    fn empty_scene_sentence() {
        assert_eq!(describe_sides(&[]), (NOTHING_IN_VIEW.to_string(), Priority::High));
    }

    #[test]
    fn splits_sides_nearest_first() {
        let detections = vec![
            dwd("chair", 0.1, 2500),
            dwd("cup", 0.6, 400),
            dwd("person", 0.2, 800),
            dwd("dog", 0.8, 0),
        ];
        let (text, priority) = describe_sides(&detections);
        assert_eq!(priority, Priority::High);
        assert_eq!(
            text,
            "Objects to your left: person at 800 millimeters, chair at 2.5 meters. \
             Objects to your right: dog at unknown distance, cup at 400 millimeters"
        );
    }

    #[test]
    fn single_side_has_no_separator() {
        let (text, _) = describe_sides(&[dwd("cup", 0.7, 1200)]);
        assert_eq!(text, "Objects to your right: cup at 1.2 meters");
    }
}
