use image::Rgb;

/// Box colour by how close the object is; grey when depth is unknown.
pub(crate) fn get_distance_colour(distance_mm: u32) -> Rgb<u8> {
    match distance_mm {
        0 => Rgb([128, 128, 128]),          // unknown
        1..=999 => Rgb([255, 0, 0]),        // within reach
        1000..=2999 => Rgb([255, 165, 0]),  // a few steps away
        _ => Rgb([0, 255, 0]),              // far
    }
}
