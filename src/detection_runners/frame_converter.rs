//! Camera frame to RGB conversion.

use anyhow::{bail, Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::{imageops, ImageFormat, RgbImage};
use rayon::prelude::*;

use crate::data::{CameraImage, PixelFormat, Plane, SensorFrame};

const FALLBACK_JPEG_QUALITY: u8 = 100;

/// Acquires the frame's camera image and converts it to an upright RGB image.
///
/// Returns `None` when no image is available, the format is unsupported or conversion fails.
/// The acquired image is released before returning in every case.
pub fn convert_frame<F: SensorFrame + ?Sized>(frame: &F) -> Option<RgbImage> {
    let image = match frame.acquire_camera_image() {
        Ok(image) => image,
        Err(e) if e.is_transient() => {
            log::debug!("Camera image unavailable: {e}");
            return None;
        }
        Err(e) => {
            log::error!("Failed to acquire camera image: {e}");
            return None;
        }
    };
    let rgb = camera_image_to_rgb(&image);
    image.close();
    rgb
}

/// Converts a raw camera image to RGB and rotates it 90° clockwise.
pub fn camera_image_to_rgb(image: &CameraImage) -> Option<RgbImage> {
    let primary = match image.format {
        PixelFormat::Yuv420 => yuv420_to_rgb(image),
        PixelFormat::Nv21 => nv21_to_rgb(image),
        PixelFormat::Other(code) => {
            log::warn!("Unsupported image format: {code}");
            return None;
        }
    };

    let rgb = match primary {
        Ok(rgb) => rgb,
        Err(e) => {
            log::warn!("Per-pixel conversion failed ({e:#}), trying lossy fallback");
            match lossy_fallback(image) {
                Ok(rgb) => rgb,
                Err(e) => {
                    log::error!("Fallback conversion also failed: {e:#}");
                    return None;
                }
            }
        }
    };

    Some(imageops::rotate90(&rgb))
}

/// ITU-R BT.601 with `u`, `v` already centered on zero.
#[inline]
fn bt601(y: f32, u: f32, v: f32) -> [u8; 3] {
    let r = (y + 1.402 * v) as i32;
    let g = (y - 0.344136 * u - 0.714136 * v) as i32;
    let b = (y + 1.772 * u) as i32;
    [r.clamp(0, 255) as u8, g.clamp(0, 255) as u8, b.clamp(0, 255) as u8]
}

fn require_len(plane: &Plane, last_offset: usize, name: &str) -> Result<()> {
    if last_offset >= plane.data.len() {
        bail!("{name} plane holds {} bytes, strides need {}", plane.data.len(), last_offset + 1);
    }
    Ok(())
}

fn dims(image: &CameraImage) -> Result<(usize, usize)> {
    if image.width == 0 || image.height == 0 {
        bail!("Empty {}x{} camera image", image.width, image.height);
    }
    Ok((image.width as usize, image.height as usize))
}

fn yuv420_to_rgb(image: &CameraImage) -> Result<RgbImage> {
    let (w, h) = dims(image)?;
    let (y_plane, u_plane, v_plane) = match image.planes.as_slice() {
        [y, u, v, ..] => (y, u, v),
        planes => bail!("YUV_420 image needs 3 planes, got {}", planes.len()),
    };

    // U and V share strides; the U plane's are authoritative
    let uv_offset = |col: usize, row: usize| row * u_plane.row_stride + col * u_plane.pixel_stride;
    require_len(y_plane, y_plane.offset(w - 1, h - 1), "Y")?;
    let last_uv = uv_offset((w - 1) / 2, (h - 1) / 2);
    require_len(u_plane, last_uv, "U")?;
    require_len(v_plane, last_uv, "V")?;

    let mut out = vec![0u8; w * h * 3];
    out.par_chunks_mut(w * 3).enumerate().for_each(|(row, px_row)| {
        for col in 0..w {
            let luma = y_plane.data[y_plane.offset(col, row)] as f32;
            let idx = uv_offset(col / 2, row / 2);
            let u = u_plane.data[idx] as f32 - 128.0;
            let v = v_plane.data[idx] as f32 - 128.0;
            px_row[col * 3..col * 3 + 3].copy_from_slice(&bt601(luma, u, v));
        }
    });

    RgbImage::from_raw(w as u32, h as u32, out).context("RGB buffer size mismatch")
}

fn nv21_to_rgb(image: &CameraImage) -> Result<RgbImage> {
    let (w, h) = dims(image)?;
    let plane = image.planes.first().context("NV21 image has no planes")?;
    let stride = plane.row_stride.max(w);
    let pixel_stride = plane.pixel_stride.max(1);
    interleaved_to_rgb(&plane.data, w, h, stride, pixel_stride)
}

/// Y rows of `row_stride` bytes, then `h / 2` rows of interleaved V/U at the same stride.
fn interleaved_to_rgb(data: &[u8], w: usize, h: usize, row_stride: usize, pixel_stride: usize) -> Result<RgbImage> {
    let chroma_base = row_stride * h;
    let chroma_at = |col: usize, row: usize| chroma_base + (row / 2) * row_stride + (col / 2) * 2;
    let last_luma = (h - 1) * row_stride + (w - 1) * pixel_stride;
    let last_chroma = chroma_at(w - 1, h - 1) + 1;
    if last_luma.max(last_chroma) >= data.len() {
        bail!("NV21 plane holds {} bytes, strides need {}", data.len(), last_luma.max(last_chroma) + 1);
    }

    let mut out = vec![0u8; w * h * 3];
    out.par_chunks_mut(w * 3).enumerate().for_each(|(row, px_row)| {
        for col in 0..w {
            let luma = data[row * row_stride + col * pixel_stride] as f32;
            let idx = chroma_at(col, row);
            let v = data[idx] as f32 - 128.0;
            let u = data[idx + 1] as f32 - 128.0;
            px_row[col * 3..col * 3 + 3].copy_from_slice(&bt601(luma, u, v));
        }
    });

    RgbImage::from_raw(w as u32, h as u32, out).context("RGB buffer size mismatch")
}

/// Repacks whatever plane data is present into tight NV21, converts it and round-trips the
/// result through JPEG. Missing luma reads as black and missing chroma as neutral.
fn lossy_fallback(image: &CameraImage) -> Result<RgbImage> {
    let (w, h) = dims(image)?;
    let nv21 = repack_nv21(image, w, h)?;
    let rgb = interleaved_to_rgb(&nv21, w, h, w, 1)?;

    let mut encoded = Vec::new();
    JpegEncoder::new_with_quality(&mut encoded, FALLBACK_JPEG_QUALITY).encode_image(&rgb)?;
    let decoded = image::load_from_memory_with_format(&encoded, ImageFormat::Jpeg)?;
    Ok(decoded.to_rgb8())
}

fn repack_nv21(image: &CameraImage, w: usize, h: usize) -> Result<Vec<u8>> {
    let (cw, ch) = (w.div_ceil(2), h.div_ceil(2));
    let mut nv21 = vec![128u8; w * h + ch * w + 2];
    let byte = |plane: Option<&Plane>, offset: usize, default: u8| {
        plane.and_then(|p| p.data.get(offset)).copied().unwrap_or(default)
    };

    match image.format {
        PixelFormat::Yuv420 => {
            let y_plane = image.planes.first();
            let u_plane = image.planes.get(1);
            let v_plane = image.planes.get(2);
            let (uv_pixel, uv_row) = u_plane.map(|p| (p.pixel_stride, p.row_stride)).unwrap_or((1, cw));
            for row in 0..h {
                for col in 0..w {
                    let offset = y_plane.map(|p| p.offset(col, row)).unwrap_or(usize::MAX);
                    nv21[row * w + col] = byte(y_plane, offset, 0);
                }
            }
            for row in 0..ch {
                for col in 0..cw {
                    let src = row * uv_row + col * uv_pixel;
                    let dst = w * h + row * w + col * 2;
                    nv21[dst] = byte(v_plane, src, 128);
                    nv21[dst + 1] = byte(u_plane, src, 128);
                }
            }
        }
        PixelFormat::Nv21 => {
            let plane = image.planes.first();
            let stride = plane.map(|p| p.row_stride.max(w)).unwrap_or(w);
            for row in 0..h {
                for col in 0..w {
                    nv21[row * w + col] = byte(plane, row * stride + col, 0);
                }
            }
            for row in 0..ch {
                for col in 0..cw {
                    let src = stride * h + row * stride + col * 2;
                    let dst = w * h + row * w + col * 2;
                    nv21[dst] = byte(plane, src, 128);
                    nv21[dst + 1] = byte(plane, src + 1, 128);
                }
            }
        }
        PixelFormat::Other(code) => bail!("Cannot repack format {code}"),
    }

    Ok(nv21)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use crate::data::{AcquireError, DepthImage, TrackingState};

    fn yuv_image(w: u32, h: u32, luma: impl Fn(u32, u32) -> u8, u: u8, v: u8) -> CameraImage {
        let mut y_data = Vec::with_capacity((w * h) as usize);
        for row in 0..h {
            for col in 0..w {
                y_data.push(luma(col, row));
            }
        }
        let cw = w.div_ceil(2) as usize;
        let ch = h.div_ceil(2) as usize;
        // interleaved chroma planes as most devices deliver them
        let u_data = vec![u; cw * ch * 2];
        let v_data = vec![v; cw * ch * 2];
        CameraImage::new(w, h, PixelFormat::Yuv420, vec![
            Plane::new(y_data, 1, w as usize),
            Plane::new(u_data, 2, cw * 2),
            Plane::new(v_data, 2, cw * 2),
        ])
    }

    #[test]
    fn neutral_gray_stays_gray() {
        let rgb = camera_image_to_rgb(&yuv_image(4, 2, |_, _| 128, 128, 128)).unwrap();
        assert!(rgb.pixels().all(|p| p.0 == [128, 128, 128]));
    }

    #[test]
    fn bt601_coefficients_truncate() {
        assert_eq!(bt601(81.0, 90.0 - 128.0, 240.0 - 128.0), [238, 14, 13]);
        assert_eq!(bt601(255.0, 127.0, 127.0), [255, 120, 255]);
        assert_eq!(bt601(0.0, -128.0, -128.0), [0, 135, 0]);
    }

    #[test]
    fn output_is_rotated_clockwise() {
        // bright left column becomes the top row
        let image = yuv_image(4, 2, |col, _| if col == 0 { 255 } else { 0 }, 128, 128);
        let rgb = camera_image_to_rgb(&image).unwrap();
        assert_eq!(rgb.dimensions(), (2, 4));
        assert_eq!(rgb.get_pixel(0, 0).0, [255, 255, 255]);
        assert_eq!(rgb.get_pixel(1, 0).0, [255, 255, 255]);
        assert_eq!(rgb.get_pixel(0, 3).0, [0, 0, 0]);
    }

    #[test]
    fn padded_row_strides_are_honored() {
        let (w, h) = (2u32, 2u32);
        let y_data = vec![10, 20, 99, 99, 30, 40, 99, 99];
        let image = CameraImage::new(w, h, PixelFormat::Yuv420, vec![
            Plane::new(y_data, 1, 4),
            Plane::new(vec![128; 4], 1, 4),
            Plane::new(vec![128; 4], 1, 4),
        ]);
        let rgb = camera_image_to_rgb(&image).unwrap();
        // rotated: (x, y) -> (h - 1 - y, x)
        assert_eq!(rgb.get_pixel(1, 0).0, [10, 10, 10]);
        assert_eq!(rgb.get_pixel(0, 1).0, [40, 40, 40]);
    }

    #[test]
    fn nv21_single_plane() {
        let (w, h) = (4usize, 2usize);
        let mut data = vec![100u8; w * h];
        // one chroma row: V, U pairs
        data.extend_from_slice(&[240, 90, 240, 90]);
        let image = CameraImage::new(w as u32, h as u32, PixelFormat::Nv21, vec![Plane::new(data, 1, w)]);
        let rgb = camera_image_to_rgb(&image).unwrap();
        assert_eq!(rgb.dimensions(), (2, 4));
        assert_eq!(rgb.get_pixel(0, 0).0, bt601(100.0, 90.0 - 128.0, 240.0 - 128.0));
    }

    #[test]
    fn unsupported_format_yields_none() {
        let image = CameraImage::new(4, 4, PixelFormat::Other(0x100), vec![Plane::new(vec![0; 64], 1, 4)]);
        assert!(camera_image_to_rgb(&image).is_none());
    }

    #[test]
    fn short_chroma_plane_uses_lossy_fallback() {
        let mut image = yuv_image(16, 16, |_, _| 128, 128, 128);
        image.planes[2].data.truncate(3);
        assert!(yuv420_to_rgb(&image).is_err());

        let rgb = camera_image_to_rgb(&image).unwrap();
        assert_eq!(rgb.dimensions(), (16, 16));
        for p in rgb.pixels() {
            for c in p.0 {
                assert!((c as i32 - 128).abs() <= 3, "{:?}", p.0);
            }
        }
    }

    struct OneShotFrame {
        image: Result<(), AcquireError>,
        released: Arc<AtomicUsize>,
    }

    impl SensorFrame for OneShotFrame {
        fn tracking_state(&self) -> TrackingState {
            TrackingState::Tracking
        }

        fn timestamp(&self) -> i64 {
            1
        }

        fn acquire_camera_image(&self) -> Result<CameraImage, AcquireError> {
            self.image.clone()?;
            let released = self.released.clone();
            Ok(yuv_image(4, 4, |_, _| 50, 128, 128).with_release(move || {
                released.fetch_add(1, Ordering::SeqCst);
            }))
        }

        fn acquire_depth_image(&self) -> Result<DepthImage, AcquireError> {
            Err(AcquireError::NotYetAvailable)
        }
    }

    #[test]
    fn acquired_image_released_once() {
        let released = Arc::new(AtomicUsize::new(0));
        let frame = OneShotFrame { image: Ok(()), released: released.clone() };
        assert!(convert_frame(&frame).is_some());
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn acquisition_failures_yield_none() {
        let released = Arc::new(AtomicUsize::new(0));
        for err in [AcquireError::DeadlineExceeded, AcquireError::Failed("gone".into())] {
            let frame = OneShotFrame { image: Err(err), released: released.clone() };
            assert!(convert_frame(&frame).is_none());
        }
        assert_eq!(released.load(Ordering::SeqCst), 0);
    }
}
