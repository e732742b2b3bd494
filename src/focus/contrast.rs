/// Sharpness estimate of a grayscale window: mean absolute difference of
/// horizontally and vertically adjacent pixels, normalized to `0..=1`.
pub fn image_contrast(data: &[u8], width: usize, height: usize) -> f64 {
    if width == 0 || height == 0 || data.len() < width * height {
        return 0.0;
    }

    let mut total: u64 = 0;
    let mut pairs: u64 = 0;

    for y in 0..height {
        let row = &data[y * width..(y + 1) * width];
        for x in 1..width {
            total += row[x].abs_diff(row[x - 1]) as u64;
        }
        pairs += (width - 1) as u64;

        if y > 0 {
            let prev = &data[(y - 1) * width..y * width];
            for x in 0..width {
                total += row[x].abs_diff(prev[x]) as u64;
            }
            pairs += width as u64;
        }
    }

    if pairs == 0 {
        return 0.0;
    }
    total as f64 / pairs as f64 / 255.0
}
