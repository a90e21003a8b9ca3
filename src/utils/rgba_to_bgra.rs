/// Composites RGBA over an opaque `bg` colour and emits opaque BGRA.
pub fn rgba_to_bgra_with_bg(rgba: &[u8], bg: (u8, u8, u8)) -> Vec<u8> {
    let (bg_r, bg_g, bg_b) = bg;
    let mut out = Vec::with_capacity(rgba.len());
    for px in rgba.chunks_exact(4) {
        let a = u32::from(px[3]);
        let inv_a = 255 - a;
        let blend = |c: u8, back: u8| ((u32::from(c) * a + u32::from(back) * inv_a) / 255) as u8;
        out.extend_from_slice(&[blend(px[2], bg_b), blend(px[1], bg_g), blend(px[0], bg_r), 0xFF]);
    }
    out
}
