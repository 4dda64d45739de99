extern crate ar_depth_detect;

use std::time::Instant;
use anyhow::Result;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;

use rand::{Rng, SeedableRng};
use rand::rngs::StdRng;

use ar_depth_detect::common::{BoundingBox, Detection, DetectorConfig, InferenceDevice};
use ar_depth_detect::data::{DepthSnapshot, X};
use ar_depth_detect::detection_runners::nms::non_max_suppression;
use ar_depth_detect::detection_runners::{interpreter_factory, Interpreter};
use ar_depth_detect::YoloDetector;

mod colours;

const SIDE: u32 = 320;

/// Reports one person box around whatever is bright in the red channel of the model input.
struct BrightSpotInterpreter;

impl Interpreter for BrightSpotInterpreter {
    fn output_shape(&self) -> Vec<i64> {
        vec![1, 6, 4]
    }

    fn invoke(&mut self, input: &X, output: &mut X) -> Result<()> {
        let side = SIDE as usize;
        let red = &input.data()?[..side * side];
        let (mut x0, mut y0, mut x1, mut y1) = (usize::MAX, usize::MAX, 0, 0);
        for (i, v) in red.iter().enumerate() {
            if *v > 0.5 {
                let (x, y) = (i % side, i / side);
                x0 = x0.min(x);
                y0 = y0.min(y);
                x1 = x1.max(x);
                y1 = y1.max(y);
            }
        }

        let out = output.data_mut()?;
        out.fill(0.0);
        if x0 <= x1 && y0 <= y1 {
            let anchors = 4;
            out[0] = (x0 + x1 + 1) as f32 / 2.0;
            out[anchors] = (y0 + y1 + 1) as f32 / 2.0;
            out[2 * anchors] = (x1 - x0 + 1) as f32;
            out[3 * anchors] = (y1 - y0 + 1) as f32;
            out[4 * anchors] = 0.95;
        }
        Ok(())
    }

    fn backend(&self) -> InferenceDevice {
        InferenceDevice::CPU
    }
}

fn bright_spot_detector() -> YoloDetector {
    let config = DetectorConfig::new()
        .with_model(concat!(env!("CARGO_MANIFEST_DIR"), "/Cargo.toml"))
        .with_input_size(SIDE)
        .with_nc(2);
    let mut detector = YoloDetector::with_factory(
        config,
        interpreter_factory(|_, _| Ok(Box::new(BrightSpotInterpreter) as Box<dyn Interpreter>)),
    );
    assert!(detector.initialize());
    detector
}

fn painted_scene() -> RgbImage {
    let mut image = RgbImage::new(1280, 720);
    draw_filled_rect_mut(&mut image, Rect::at(320, 180).of_size(256, 144), Rgb([255, 255, 255]));
    image
}

#[test]
fn letterboxed_box_maps_back_to_painted_rectangle() {
    let mut detector = bright_spot_detector();
    let image = painted_scene();

    let detections = detector.detect(&image);
    assert_eq!(detections.len(), 1);
    let bbox = &detections[0].bbox;
    let tol = 0.02;
    assert!((bbox.x - 0.25).abs() < tol, "{bbox:?}");
    assert!((bbox.y - 0.25).abs() < tol, "{bbox:?}");
    assert!((bbox.w - 0.2).abs() < tol, "{bbox:?}");
    assert!((bbox.h - 0.2).abs() < tol, "{bbox:?}");
    assert_eq!(detections[0].label, "person");
}

#[test]
fn depth_is_sampled_at_box_center() {
    let mut detector = bright_spot_detector();
    let (w, h) = (160u32, 90u32);
    let mut raw = vec![0u8; (w * h * 2) as usize];
    // 1.2m over the painted rectangle, nothing elsewhere
    for y in 23..40 {
        for x in 41..71 {
            let at = (y * w as usize + x) * 2;
            raw[at..at + 2].copy_from_slice(&1200u16.to_le_bytes());
        }
    }
    let depth = DepthSnapshot::new(raw, w, h, 2, w as usize * 2);

    let fused = ar_depth_detect::run_detection(&mut detector, &painted_scene(), Some(&depth));
    assert_eq!(fused.len(), 1);
    assert_eq!(fused[0].distance_mm, 1200);
}

#[test]
fn detections_drawn_on_scene() {
    let mut detector = bright_spot_detector();
    let mut image = painted_scene();
    let fused = ar_depth_detect::run_detection(&mut detector, &image, None);
    assert_eq!(fused.len(), 1);

    let (iw, ih) = (image.width() as f32, image.height() as f32);
    for item in &fused {
        let (x, y, w, h) = item.detection.bbox.xy_wh();
        let rect = Rect::at((x * iw) as i32, (y * ih) as i32).of_size((w * iw).max(1.0) as u32, (h * ih).max(1.0) as u32);
        draw_hollow_rect_mut(&mut image, rect, colours::get_distance_colour(item.distance_mm));
    }
    // unknown distance outlines in grey
    assert!(image.pixels().any(|p| p.0 == [128, 128, 128]));
    image.save(std::env::temp_dir().join("ar_depth_detect_scene.jpg")).unwrap();
}

#[test]
fn nms_survivors_never_overlap_within_class() {
    let mut rng = StdRng::seed_from_u64(7);
    let iou = 0.45;
    for _ in 0..20 {
        let mut dets: Vec<Detection> = (0..60)
            .map(|_| {
                let (x, y) = (rng.gen_range(0.0..0.6), rng.gen_range(0.0..0.6));
                let (w, h) = (rng.gen_range(0.05..0.4), rng.gen_range(0.05..0.4));
                let class_id = rng.gen_range(0..3);
                Detection::new(class_id, "", rng.gen_range(0.3..1.0), BoundingBox::new(x, y, w, h))
            })
            .collect();
        non_max_suppression(&mut dets, iou);

        assert!(dets.windows(2).all(|p| p[0].confidence >= p[1].confidence));
        for (i, a) in dets.iter().enumerate() {
            for b in &dets[i + 1..] {
                if a.class_id == b.class_id {
                    assert!(a.bbox.iou(&b.bbox) <= iou, "{a:?} / {b:?}");
                }
            }
        }
    }
}

/// Full run on a real model. Point `AR_DEPTH_DETECT_MODEL` at an ONNX file (and optionally
/// `AR_DEPTH_DETECT_ORT_LIB` at the runtime library) to enable.
#[test]
fn detection_with_real_model() {
    /////////////////////
    // Testing variables
    let loop_count: u32 = 10;
    let Ok(onnx_path) = std::env::var("AR_DEPTH_DETECT_MODEL") else {
        println!("AR_DEPTH_DETECT_MODEL not set, skipping");
        return;
    };
    /////////////////////

    let mut config = DetectorConfig::new().with_model(&onnx_path).with_device(InferenceDevice::CPU);
    if let Ok(lib) = std::env::var("AR_DEPTH_DETECT_ORT_LIB") {
        config = config.with_ort_lib_path(&lib);
    }

    let mut detector = match ar_depth_detect::init_detector(&config) {
        Ok(detector) => detector,
        Err(e) => panic!("Failed to initialize YOLO model: {e:?}"),
    };
    let image = painted_scene();

    let now = Instant::now();
    let mut elapsed = now.elapsed();
    for count in 0..loop_count {
        let result = ar_depth_detect::run_detection(&mut detector, &image, None);
        let mut detection_thres = String::from("Confidence: ");
        for i in &result {
            assert!(i.detection.confidence >= config.conf_threshold);
            detection_thres += " | ";
            detection_thres += i.detection.confidence.to_string().as_str();
        }
        println!("\n{}", detection_thres.as_str());
        println!("TIME | Total={:.2?} | {}th detection={:.2?}", now.elapsed(), count, now.elapsed() - elapsed);
        elapsed = now.elapsed();
    }
    detector.close();
}
