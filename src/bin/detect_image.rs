//! detect_image - run the detector on one image and print detections as JSON.
//!
//! An optional raw depth file (little-endian u16 millimeters, tightly packed) is joined at
//! each box center the same way the live pipeline does.

use anyhow::{Context, Result};
use clap::Parser;

use ar_depth_detect::common::{DetectorConfig, InferenceDevice};
use ar_depth_detect::data::DepthSnapshot;
use ar_depth_detect::overlay::{layout_all, Viewport};
use ar_depth_detect::{init_detector, run_detection};

#[derive(Parser, Debug)]
#[command(name = "detect_image", about = "Detect objects in an image, optionally with depth")]
struct Args {
    /// Detector config (JSON); flags below override it
    #[arg(long, value_name = "PATH")]
    config: Option<String>,

    /// ONNX model file or a name under the models directory
    #[arg(long, value_name = "PATH")]
    model: Option<String>,

    /// Path to the ONNX Runtime shared library
    #[arg(long, value_name = "PATH")]
    ort_lib: Option<String>,

    /// Execution provider (cpu|cuda|tensorrt|coreml)
    #[arg(long)]
    device: Option<String>,

    #[arg(long, default_value_t = 0)]
    device_id: usize,

    /// Intra-op threads for the CPU execution path
    #[arg(long)]
    threads: Option<usize>,

    /// Image to run detection on
    #[arg(long, value_name = "PATH")]
    image: String,

    /// Raw 16-bit depth map
    #[arg(long, value_name = "PATH", requires_all = ["depth_width", "depth_height"])]
    depth: Option<String>,

    #[arg(long)]
    depth_width: Option<u32>,

    #[arg(long)]
    depth_height: Option<u32>,

    /// Also print overlay boxes laid out for this view size (WIDTHxHEIGHT)
    #[arg(long, value_name = "WxH")]
    view: Option<String>,
}

fn load_config(args: &Args) -> Result<DetectorConfig> {
    let mut config = match &args.config {
        Some(path) => DetectorConfig::from_json_file(path)?,
        None => DetectorConfig::new(),
    };
    if let Some(model) = &args.model {
        config = config.with_model(model);
    }
    if let Some(lib) = &args.ort_lib {
        config = config.with_ort_lib_path(lib);
    }
    if let Some(threads) = args.threads {
        config = config.with_threads(threads);
    }
    if let Some(device) = &args.device {
        let device = InferenceDevice::from_str(device, args.device_id).with_context(|| {
            format!("Unknown device {device}, expected one of {:?}", InferenceDevice::all_inference_devices())
        })?;
        config = config.with_device(device);
    }
    Ok(config)
}

fn load_depth(path: &str, width: u32, height: u32) -> Result<DepthSnapshot> {
    let raw = std::fs::read(path).with_context(|| format!("Failed to read depth file {path}"))?;
    let expected = width as usize * height as usize * 2;
    if raw.len() < expected {
        anyhow::bail!("Depth file holds {} bytes, {width}x{height} needs {expected}", raw.len());
    }
    Ok(DepthSnapshot::new(raw, width, height, 2, width as usize * 2))
}

fn parse_view(view: &str) -> Result<Viewport> {
    let (w, h) = view.split_once('x').context("View size must look like 1080x2400")?;
    Ok(Viewport { width: w.trim().parse()?, height: h.trim().parse()? })
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = load_config(&args)?;
    log::info!("\n{config}");

    let image = image::open(&args.image)
        .with_context(|| format!("Failed to open image {}", args.image))?
        .to_rgb8();

    let depth = match (&args.depth, args.depth_width, args.depth_height) {
        (Some(path), Some(w), Some(h)) => Some(load_depth(path, w, h)?),
        _ => None,
    };

    let mut detector = init_detector(&config)?;
    log::info!("Backend: {}", detector.backend_info());

    let detections = run_detection(&mut detector, &image, depth.as_ref());
    println!("{}", serde_json::to_string_pretty(&detections)?);

    if let Some(view) = &args.view {
        let boxes = layout_all(&detections, parse_view(view)?);
        println!("{}", serde_json::to_string_pretty(&boxes)?);
    }

    detector.close();
    Ok(())
}
