/// RGBA to BGRA with colour channels premultiplied by alpha.
pub fn rgba_to_bgra_premul(rgba: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(rgba.len());
    for px in rgba.chunks_exact(4) {
        let a = u32::from(px[3]);
        let pm = |c: u8| ((u32::from(c) * a + 127) / 255) as u8;
        out.extend_from_slice(&[pm(px[2]), pm(px[1]), pm(px[0]), px[3]]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_premultiply() {
        assert_eq!(rgba_to_bgra_premul(&[200, 100, 50, 255]), vec![50, 100, 200, 255]);
        assert_eq!(rgba_to_bgra_premul(&[200, 100, 50, 0]), vec![0, 0, 0, 0]);
        assert_eq!(rgba_to_bgra_premul(&[255, 255, 255, 128]), vec![128, 128, 128, 128]);
    }
}
