//! Per-frame orchestration: paced detection on a background task, depth fusion, publishing,
//! on-demand capture and pause/resume.

use std::sync::Arc;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::announce::{describe_sides, SceneChangeTracker};
use crate::common::{DetectionWithDepth, PipelineConfig};
use crate::data::{
    fuse_depth, AcquireError, Announcer, CancelToken, CaptureSink, CaptureTrigger, DepthSnapshot,
    DetectionSink, Priority, SensorFrame, TrackingState, UiSenders,
};
use crate::detection_runners::{convert_frame, YoloDetector};
use crate::overlay::{layout_all, OverlayBox, Viewport};

/// Lifecycle flags shared with background tasks. Always locked after the detector, never before.
#[derive(Debug)]
struct SharedState {
    /// Between `resume()` and `pause()`.
    resumed: bool,
    /// Camera view shown. Never overrides a pause.
    camera_visible: bool,
    /// Bumped whenever detection stops or restarts; results from an older generation are dropped.
    generation: u64,
    in_flight: bool,
    last_results: Option<Vec<DetectionWithDepth>>,
    scene: SceneChangeTracker,
    /// Last known execution backend, readable while an inference holds the detector.
    backend: String,
}

impl SharedState {
    fn new(backend: String) -> Self {
        Self {
            resumed: false,
            camera_visible: true,
            generation: 0,
            in_flight: false,
            last_results: None,
            scene: SceneChangeTracker::new(),
            backend,
        }
    }

    fn is_active(&self) -> bool {
        self.resumed && self.camera_visible
    }
}

pub struct FusionPipeline<F: SensorFrame + 'static> {
    runtime: Handle,
    config: PipelineConfig,
    detector: Arc<Mutex<YoloDetector>>,
    shared: Arc<Mutex<SharedState>>,
    task_token: CancelToken,
    task: Option<JoinHandle<()>>,
    /// Cancelled task that may still be finishing its inference.
    draining: Option<JoinHandle<()>>,
    lifecycle: Option<JoinHandle<()>>,
    frame_counter: u32,
    depth: Option<Arc<DepthSnapshot>>,
    current_frame: Option<Arc<F>>,
    capture: CaptureTrigger,
    viewport: Viewport,
    detection_sink: Arc<dyn DetectionSink>,
    capture_sink: Arc<dyn CaptureSink>,
    announcer: Option<Arc<dyn Announcer>>,
}

impl<F: SensorFrame + 'static> FusionPipeline<F> {
    /// Builds an inactive pipeline; call [`resume`](Self::resume) to start it.
    pub fn new(
        runtime: Handle,
        detector: YoloDetector,
        detection_sink: Arc<dyn DetectionSink>,
        capture_sink: Arc<dyn CaptureSink>,
    ) -> Self {
        let backend = detector.backend_info();
        Self {
            runtime,
            config: PipelineConfig::default(),
            detector: Arc::new(Mutex::new(detector)),
            shared: Arc::new(Mutex::new(SharedState::new(backend))),
            task_token: CancelToken::new(),
            task: None,
            draining: None,
            lifecycle: None,
            frame_counter: 0,
            depth: None,
            current_frame: None,
            capture: CaptureTrigger::default(),
            viewport: Viewport::default(),
            detection_sink,
            capture_sink,
            announcer: None,
        }
    }

    /// Pipeline publishing onto the UI channels.
    pub fn with_channels(runtime: Handle, detector: YoloDetector, senders: UiSenders) -> Self {
        Self::new(runtime, detector, Arc::new(senders.det_tx), Arc::new(senders.capture_tx))
    }

    pub fn with_config(mut self, config: PipelineConfig) -> anyhow::Result<Self> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    pub fn with_announcer(mut self, announcer: Arc<dyn Announcer>) -> Self {
        self.announcer = Some(announcer);
        self
    }

    /// Render-loop entry point. Never blocks on inference.
    pub fn on_draw_frame(&mut self, frame: Arc<F>) {
        if !self.shared.lock().is_active() {
            return;
        }
        self.current_frame = Some(frame.clone());

        if frame.tracking_state() != TrackingState::Tracking {
            return;
        }

        self.frame_counter = self.frame_counter.wrapping_add(1);
        if self.frame_counter % self.config.detection_interval == 0 {
            self.update_depth(frame.as_ref());
            self.dispatch(frame.clone());
        }

        if self.capture.take() {
            log::debug!("Capturing frame {}", frame.timestamp());
            let image = convert_frame(frame.as_ref());
            self.capture_sink.deliver(image);
        }
    }

    fn update_depth(&mut self, frame: &F) {
        self.depth = match frame.acquire_depth_image() {
            Ok(image) => Some(Arc::new(DepthSnapshot::from_image(&image))),
            Err(AcquireError::NotYetAvailable) => None,
            Err(e) if e.is_transient() => {
                log::debug!("Depth unavailable: {e}");
                None
            }
            Err(e) => {
                log::warn!("Failed to acquire depth image: {e}");
                None
            }
        };

        if self.frame_counter % self.config.depth_log_interval == 0 {
            match &self.depth {
                Some(depth) => log::debug!(
                    "Depth {}x{} | {} bytes | center {}mm",
                    depth.width, depth.height, depth.len(), depth.millimeters_at_normalized(0.5, 0.5),
                ),
                None => log::debug!("No depth data at frame {}", self.frame_counter),
            }
        }
    }

    fn dispatch(&mut self, frame: Arc<F>) {
        let Some(detector) = self.detector.try_lock() else {
            log::debug!("Detector busy, skipping frame {}", self.frame_counter);
            return;
        };
        if !detector.is_ready() {
            return;
        }
        let generation = {
            let mut shared = self.shared.lock();
            if !shared.is_active() || shared.in_flight {
                return;
            }
            shared.in_flight = true;
            shared.generation
        };
        drop(detector);

        let token = CancelToken::new();
        self.task_token = token.clone();
        let task = DetectionTask {
            detector: self.detector.clone(),
            shared: self.shared.clone(),
            sink: self.detection_sink.clone(),
            announcer: self.announcer.clone(),
            depth: self.depth.clone(),
            generation,
            token,
        };
        self.task = Some(self.runtime.spawn_blocking(move || task.run(frame)));
    }

    /// Delivers the next tracking frame to the capture sink.
    pub fn request_capture(&self) {
        self.capture.request();
    }

    /// Stops detection and clears the overlay, keeping the detector loaded.
    fn deactivate(&mut self, update: impl FnOnce(&mut SharedState)) {
        {
            let mut shared = self.shared.lock();
            update(&mut shared);
            shared.generation += 1;
            shared.in_flight = false;
            shared.last_results = None;
            shared.scene.reset();
        }
        self.task_token.cancel();
        if let Some(task) = self.task.take() {
            self.draining = Some(task);
        }
        self.depth = None;
        self.current_frame = None;
        self.capture.reset();
        self.detection_sink.publish(Vec::new());
    }

    /// Stops detection, clears every cached result and releases the detector.
    ///
    /// A task already running may finish its inference but never publishes. Nothing is
    /// detected or captured again until [`resume`](Self::resume), whatever the camera toggle says.
    pub fn pause(&mut self) {
        self.deactivate(|shared| shared.resumed = false);

        match self.detector.try_lock() {
            Some(mut detector) => {
                detector.close();
                self.shared.lock().backend = detector.backend_info();
            }
            None => {
                // a task still holds the detector; close once it lets go
                let detector = self.detector.clone();
                let shared = self.shared.clone();
                self.lifecycle = Some(self.runtime.spawn_blocking(move || {
                    let mut detector = detector.lock();
                    let mut shared = shared.lock();
                    if !shared.resumed {
                        detector.close();
                        shared.backend = detector.backend_info();
                    }
                }));
            }
        }
        log::info!("Pipeline paused");
    }

    /// Restarts pacing and re-initializes the detector in the background.
    pub fn resume(&mut self) {
        self.frame_counter = 0;
        {
            let mut shared = self.shared.lock();
            shared.resumed = true;
            shared.generation += 1;
            shared.in_flight = false;
            shared.last_results = None;
        }

        let detector = self.detector.clone();
        let shared = self.shared.clone();
        self.lifecycle = Some(self.runtime.spawn_blocking(move || {
            let mut detector = detector.lock();
            if !shared.lock().resumed {
                return;
            }
            let ready = detector.initialize();
            let backend = detector.backend_info();
            if ready {
                log::info!("Detector initialized: {backend}");
            } else {
                log::warn!("Detector unavailable, continuing without detection");
            }
            shared.lock().backend = backend;
        }));
        log::info!("Pipeline resumed");
    }

    /// Camera visibility toggle. Unlike pause/resume the detector stays loaded, and showing
    /// the camera does not restart a paused pipeline.
    pub fn set_camera_active(&mut self, active: bool) {
        if !active {
            self.deactivate(|shared| shared.camera_visible = false);
            return;
        }
        self.frame_counter = 0;
        let mut shared = self.shared.lock();
        if !shared.camera_visible {
            shared.camera_visible = true;
            shared.generation += 1;
        }
    }

    pub fn on_surface_changed(&mut self, width: u32, height: u32) {
        self.viewport = Viewport { width, height };
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn is_active(&self) -> bool {
        self.shared.lock().is_active()
    }

    pub fn is_detecting(&self) -> bool {
        self.shared.lock().in_flight
    }

    pub fn frame_counter(&self) -> u32 {
        self.frame_counter
    }

    pub fn has_depth(&self) -> bool {
        self.depth.is_some()
    }

    pub fn current_frame(&self) -> Option<&Arc<F>> {
        self.current_frame.as_ref()
    }

    pub fn last_detections(&self) -> Vec<DetectionWithDepth> {
        self.shared.lock().last_results.clone().unwrap_or_default()
    }

    pub fn overlay_boxes(&self) -> Vec<OverlayBox> {
        layout_all(&self.last_detections(), self.viewport)
    }

    /// Speaks what is on each side of the view and returns the sentence.
    pub fn announce_sides(&self) -> String {
        let (text, priority) = describe_sides(&self.last_detections());
        if let Some(announcer) = &self.announcer {
            announcer.announce(text.clone(), priority);
        }
        text
    }

    /// Backend as of the last initialize or close; never waits for a running inference.
    pub fn backend_info(&self) -> String {
        self.shared.lock().backend.clone()
    }

    /// Handle of the most recent pause/resume job.
    pub fn take_lifecycle_task(&mut self) -> Option<JoinHandle<()>> {
        self.lifecycle.take()
    }

    /// Handle of the most recently dispatched detection task.
    pub fn take_detection_task(&mut self) -> Option<JoinHandle<()>> {
        self.task.take()
    }

    /// Handle of the task cancelled by the last pause or camera toggle.
    pub fn take_draining_task(&mut self) -> Option<JoinHandle<()>> {
        self.draining.take()
    }
}

impl<F: SensorFrame + 'static> Drop for FusionPipeline<F> {
    fn drop(&mut self) {
        self.task_token.cancel();
    }
}

/// One background detection run.
struct DetectionTask {
    detector: Arc<Mutex<YoloDetector>>,
    shared: Arc<Mutex<SharedState>>,
    sink: Arc<dyn DetectionSink>,
    announcer: Option<Arc<dyn Announcer>>,
    depth: Option<Arc<DepthSnapshot>>,
    generation: u64,
    token: CancelToken,
}

/// Clears the outstanding flag however the task ends, unless a newer generation took over.
struct InFlightGuard {
    shared: Arc<Mutex<SharedState>>,
    generation: u64,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut shared = self.shared.lock();
        if shared.generation == self.generation {
            shared.in_flight = false;
        }
    }
}

impl DetectionTask {
    fn run<F: SensorFrame + ?Sized>(self, frame: Arc<F>) {
        let _guard = InFlightGuard { shared: self.shared.clone(), generation: self.generation };

        if self.cancelled("conversion") {
            return;
        }
        let Some(image) = convert_frame(frame.as_ref()) else {
            return;
        };
        drop(frame);

        let detections = {
            let mut detector = self.detector.lock();
            if self.cancelled("inference") {
                return;
            }
            detector.detect(&image)
        };

        let fused = fuse_depth(detections, self.depth.as_deref());
        self.publish(fused);
    }

    fn cancelled(&self, stage: &str) -> bool {
        let cancelled = self.token.is_cancelled();
        if cancelled {
            log::debug!("Detection task cancelled before {stage}");
        }
        cancelled
    }

    fn publish(&self, results: Vec<DetectionWithDepth>) {
        let mut shared = self.shared.lock();
        if self.token.is_cancelled() || !shared.is_active() || shared.generation != self.generation {
            log::debug!("Dropping {} stale detections", results.len());
            return;
        }

        let count = results.len();
        shared.last_results = Some(results.clone());
        self.sink.publish(results);

        if let Some(text) = shared.scene.observe(count) {
            if let Some(announcer) = &self.announcer {
                announcer.announce(text, Priority::Low);
            }
        }
    }
}
