//! Portable per-bin kernels.
//!
//! Each function processes whatever slice length it is given; the SSE2
//! variants call these for the bins left over after the vector loop.

/// `y += x * w` (complex).
pub(super) fn multiply_accumulate(
    x_re: &[f32],
    x_im: &[f32],
    w_re: &[f32],
    w_im: &[f32],
    y_re: &mut [f32],
    y_im: &mut [f32],
) {
    for k in 0..y_re.len() {
        y_re[k] += x_re[k] * w_re[k] - x_im[k] * w_im[k];
        y_im[k] += x_re[k] * w_im[k] + x_im[k] * w_re[k];
    }
}

/// `out = conj(x) * e`.
pub(super) fn conjugate_multiply(
    x_re: &[f32],
    x_im: &[f32],
    e_re: &[f32],
    e_im: &[f32],
    out_re: &mut [f32],
    out_im: &mut [f32],
) {
    for k in 0..out_re.len() {
        out_re[k] = x_re[k] * e_re[k] + x_im[k] * e_im[k];
        out_im[k] = x_re[k] * e_im[k] - x_im[k] * e_re[k];
    }
}

/// Normalizes the error by far power, clamps its magnitude to `threshold`
/// and applies the step size.
pub(super) fn scale_error_signal(
    x_pow: &[f32],
    mu: f32,
    threshold: f32,
    e_re: &mut [f32],
    e_im: &mut [f32],
) {
    for k in 0..e_re.len() {
        let denom = x_pow[k] + 1e-10;
        e_re[k] /= denom;
        e_im[k] /= denom;
        let abs = (e_re[k] * e_re[k] + e_im[k] * e_im[k]).sqrt();
        if abs > threshold {
            let factor = threshold / (abs + 1e-10);
            e_re[k] *= factor;
            e_im[k] *= factor;
        }
        e_re[k] *= mu;
        e_im[k] *= mu;
    }
}
