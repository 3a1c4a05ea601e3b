use crate::geometry::ScaleFactors;

/// Map `[x1, y1, .., x4, y4]` from display space to native image space.
///
/// Even indices scale by the width factor, odd by the height factor. No
/// rounding is applied.
pub fn to_native_space(display: &[f32; 8], scale: ScaleFactors) -> [f64; 8] {
    let mut native = [0.0; 8];
    for (i, (out, &v)) in native.iter_mut().zip(display).enumerate() {
        let factor = if i % 2 == 0 { scale.w } else { scale.h };
        *out = f64::from(v) * factor;
    }
    native
}
