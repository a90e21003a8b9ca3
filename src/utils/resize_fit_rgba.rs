/// Nearest-neighbour downscale so the longer side equals `cx`.
/// Images already within `cx` are returned unchanged.
pub fn resize_fit_rgba(src: &[u8], sw: u32, sh: u32, cx: u32) -> (u32, u32, Vec<u8>) {
    if cx == 0 || sw.max(sh) <= cx {
        return (sw, sh, src.to_vec());
    }
    let (tw, th) = if sw >= sh {
        let tw = cx;
        let th = ((u64::from(sh) * u64::from(tw)) / u64::from(sw)).max(1) as u32;
        (tw, th)
    } else {
        let th = cx;
        let tw = ((u64::from(sw) * u64::from(th)) / u64::from(sh)).max(1) as u32;
        (tw, th)
    };
    let mut out = vec![0u8; tw as usize * th as usize * 4];
    for y in 0..th {
        let sy = (u64::from(y) * u64::from(sh) / u64::from(th)) as usize;
        for x in 0..tw {
            let sx = (u64::from(x) * u64::from(sw) / u64::from(tw)) as usize;
            let si = (sy * sw as usize + sx) * 4;
            let di = (y as usize * tw as usize + x as usize) * 4;
            out[di..di + 4].copy_from_slice(&src[si..si + 4]);
        }
    }
    (tw, th, out)
}
