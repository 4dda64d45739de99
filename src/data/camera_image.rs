use std::fmt;

/// Pixel layout tag reported by the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// Three planes: full resolution Y, then 2x2 subsampled U and V.
    Yuv420,
    /// One plane: Y rows followed by interleaved V/U rows at half resolution.
    Nv21,
    Other(i32),
}

/// One plane of a camera or depth image.
#[derive(Debug, Clone, Default)]
pub struct Plane {
    pub data: Vec<u8>,
    pub pixel_stride: usize,
    pub row_stride: usize,
}

impl Plane {
    pub fn new(data: Vec<u8>, pixel_stride: usize, row_stride: usize) -> Self {
        Self { data, pixel_stride, row_stride }
    }

    /// Byte offset of `(col, row)` inside this plane.
    pub fn offset(&self, col: usize, row: usize) -> usize {
        row * self.row_stride + col * self.pixel_stride
    }
}

/// Release hook for the sensor resource backing an image. Runs exactly once, on drop.
pub struct NativeHandle(Option<Box<dyn FnOnce() + Send>>);

impl NativeHandle {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self(Some(Box::new(release)))
    }

    pub fn detached() -> Self {
        Self(None)
    }
}

impl Drop for NativeHandle {
    fn drop(&mut self) {
        if let Some(release) = self.0.take() {
            release();
        }
    }
}

impl fmt::Debug for NativeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.0.is_some() { "NativeHandle(held)" } else { "NativeHandle(released)" })
    }
}

/// Raw color frame as acquired from the camera.
#[derive(Debug)]
pub struct CameraImage {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub planes: Vec<Plane>,
    _handle: NativeHandle,
}

impl CameraImage {
    pub fn new(width: u32, height: u32, format: PixelFormat, planes: Vec<Plane>) -> Self {
        Self {
            width,
            height,
            format,
            planes,
            _handle: NativeHandle::detached(),
        }
    }

    pub fn with_release(mut self, release: impl FnOnce() + Send + 'static) -> Self {
        self._handle = NativeHandle::new(release);
        self
    }

    /// Releases the underlying sensor resource now instead of at scope end.
    pub fn close(self) {}
}

/// Raw 16-bit depth frame as acquired from the session.
#[derive(Debug)]
pub struct DepthImage {
    pub width: u32,
    pub height: u32,
    pub plane: Plane,
    _handle: NativeHandle,
}

impl DepthImage {
    pub fn new(width: u32, height: u32, plane: Plane) -> Self {
        Self {
            width,
            height,
            plane,
            _handle: NativeHandle::detached(),
        }
    }

    pub fn with_release(mut self, release: impl FnOnce() + Send + 'static) -> Self {
        self._handle = NativeHandle::new(release);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingState {
    Tracking,
    Paused,
    Stopped,
}

/// Why an image could not be acquired from a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquireError {
    /// The session is pausing and the acquisition timed out.
    DeadlineExceeded,
    NotYetAvailable,
    Failed(String),
}

impl AcquireError {
    /// Timeouts and not-yet-available frames are expected and never reported as errors.
    pub fn is_transient(&self) -> bool {
        matches!(self, AcquireError::DeadlineExceeded | AcquireError::NotYetAvailable)
    }
}

impl fmt::Display for AcquireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AcquireError::DeadlineExceeded => f.write_str("image acquisition deadline exceeded"),
            AcquireError::NotYetAvailable => f.write_str("image not yet available"),
            AcquireError::Failed(msg) => write!(f, "image acquisition failed: {msg}"),
        }
    }
}

impl std::error::Error for AcquireError {}

/// One frame delivered by the rendering/session layer.
pub trait SensorFrame: Send + Sync {
    fn tracking_state(&self) -> TrackingState;

    /// Sensor timestamp in nanoseconds; 0 when the camera has not produced an image yet.
    fn timestamp(&self) -> i64;

    fn acquire_camera_image(&self) -> Result<CameraImage, AcquireError>;

    fn acquire_depth_image(&self) -> Result<DepthImage, AcquireError>;
}
