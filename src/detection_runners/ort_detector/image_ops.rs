//! Letterbox preprocessing into the model's planar input tensor.

use anyhow::{bail, Result};
use fast_image_resize::{
    images::{CroppedImageMut, Image as FirImage},
    pixels::PixelType,
    FilterType, ResizeAlg, ResizeOptions, Resizer,
};
use image::RgbImage;
use crate::common::BoundingBox;
use crate::detection_runners::ort_detector::input_wrapper::X;

/// Maps between original-image and letterboxed-canvas normalized coordinates.
///
/// All four fields are fractions of the canvas side. `scale_*` is the share of the canvas the
/// resized image covers on that axis and `offset_*` is where it starts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LetterboxTransform {
    pub scale_x: f32,
    pub scale_y: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

impl LetterboxTransform {
    /// Placement of a `src_w x src_h` image on a centered `side x side` canvas.
    ///
    /// Returns the transform together with the resized size and the left/top padding in pixels.
    pub fn compute(src_w: u32, src_h: u32, side: u32) -> Result<(Self, Placement)> {
        if src_w == 0 || src_h == 0 {
            bail!("Cannot letterbox an empty {src_w}x{src_h} image");
        }
        if side == 0 {
            bail!("Letterbox side must be positive");
        }
        let scale = (side as f32 / src_w as f32).min(side as f32 / src_h as f32);
        let new_w = ((src_w as f32 * scale).round() as u32).clamp(1, side);
        let new_h = ((src_h as f32 * scale).round() as u32).clamp(1, side);
        let left = (side - new_w) / 2;
        let top = (side - new_h) / 2;

        let s = side as f32;
        let transform = Self {
            scale_x: new_w as f32 / s,
            scale_y: new_h as f32 / s,
            offset_x: left as f32 / s,
            offset_y: top as f32 / s,
        };
        Ok((transform, Placement { new_w, new_h, left, top }))
    }

    /// Converts a center-format box in normalized canvas space to a clamped top-left box in
    /// normalized original-image space.
    pub fn unmap_box(&self, cx: f32, cy: f32, w: f32, h: f32) -> BoundingBox {
        let cx = (cx - self.offset_x) / self.scale_x;
        let cy = (cy - self.offset_y) / self.scale_y;
        let w = w / self.scale_x;
        let h = h / self.scale_y;
        BoundingBox::with_cxcy_wh(cx, cy, w, h).clamped()
    }
}

/// Pixel placement of the resized image inside the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub new_w: u32,
    pub new_h: u32,
    pub left: u32,
    pub top: u32,
}

/// Letterboxes `image` onto a `side x side` canvas painted with `fill`, then writes it as
/// `[1, 3, side, side]` RGB scaled to `[0, 1]` into `input`.
pub fn preprocess(image: &RgbImage, side: u32, fill: u8, input: &mut X) -> Result<LetterboxTransform> {
    let (transform, placement) = LetterboxTransform::compute(image.width(), image.height(), side)?;
    let canvas = letterbox_image(image, side, fill, &placement)?;
    nchw_normalize_into(&canvas, input.data_mut()?)?;
    Ok(transform)
}

fn letterbox_image<'a>(image: &RgbImage, side: u32, fill: u8, placement: &Placement) -> Result<FirImage<'a>> {
    let src = FirImage::from_vec_u8(image.width(), image.height(), image.as_raw().clone(), PixelType::U8x3)?;

    let mut padded = FirImage::from_vec_u8(
        side,
        side,
        vec![fill; (side * side * 3) as usize],
        PixelType::U8x3,
    )?;

    let options = ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Bilinear));
    let mut resizer = Resizer::new();
    let mut cropped = CroppedImageMut::new(
        &mut padded,
        placement.left,
        placement.top,
        placement.new_w,
        placement.new_h,
    )?;
    resizer.resize(&src, &mut cropped, &options)?;

    Ok(padded)
}

fn nchw_normalize_into(img: &FirImage, out: &mut [f32]) -> Result<()> {
    let buf = img.buffer();
    let hw = (img.width() * img.height()) as usize;

    if buf.len() != hw * 3 {
        bail!("Unexpected buffer size: got {}, expected {}", buf.len(), hw * 3);
    }
    if out.len() != hw * 3 {
        bail!("Input tensor holds {} values, expected {}", out.len(), hw * 3);
    }

    let (r_plane, rest) = out.split_at_mut(hw);
    let (g_plane, b_plane) = rest.split_at_mut(hw);
    for (i, px) in buf.chunks_exact(3).enumerate() {
        r_plane[i] = px[0] as f32 / 255.0;
        g_plane[i] = px[1] as f32 / 255.0;
        b_plane[i] = px[2] as f32 / 255.0;
    }

    Ok(())
}
