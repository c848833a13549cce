//! SSE2 per-bin kernels (x86/x86_64).
//!
//! Four bins per iteration, remainder through the scalar kernels. The
//! arithmetic is the same sequence of IEEE operations as the scalar code, so
//! results are bit-identical.

#[cfg(target_arch = "x86")]
use std::arch::x86::*;
#[cfg(target_arch = "x86_64")]
use std::arch::x86_64::*;

use super::scalar;

/// SSE2 `y += x * w`.
///
/// # Safety
///
/// The CPU must support SSE2. All slices must be at least `y_re.len()` long.
#[target_feature(enable = "sse2")]
pub(super) unsafe fn multiply_accumulate(
    x_re: &[f32],
    x_im: &[f32],
    w_re: &[f32],
    w_im: &[f32],
    y_re: &mut [f32],
    y_im: &mut [f32],
) {
    let n = y_re.len();
    let vec_end = n - n % 4;
    // SAFETY: every access is at offset `k..k + 4` with `k + 4 <= vec_end <= n`
    // and all slices hold at least `n` elements.
    unsafe {
        let mut k = 0;
        while k < vec_end {
            let xr = _mm_loadu_ps(x_re.as_ptr().add(k));
            let xi = _mm_loadu_ps(x_im.as_ptr().add(k));
            let wr = _mm_loadu_ps(w_re.as_ptr().add(k));
            let wi = _mm_loadu_ps(w_im.as_ptr().add(k));
            let yr = _mm_loadu_ps(y_re.as_ptr().add(k));
            let yi = _mm_loadu_ps(y_im.as_ptr().add(k));
            let re = _mm_sub_ps(_mm_mul_ps(xr, wr), _mm_mul_ps(xi, wi));
            let im = _mm_add_ps(_mm_mul_ps(xr, wi), _mm_mul_ps(xi, wr));
            _mm_storeu_ps(y_re.as_mut_ptr().add(k), _mm_add_ps(yr, re));
            _mm_storeu_ps(y_im.as_mut_ptr().add(k), _mm_add_ps(yi, im));
            k += 4;
        }
    }
    scalar::multiply_accumulate(
        &x_re[vec_end..n],
        &x_im[vec_end..n],
        &w_re[vec_end..n],
        &w_im[vec_end..n],
        &mut y_re[vec_end..],
        &mut y_im[vec_end..n],
    );
}

/// SSE2 `out = conj(x) * e`.
///
/// # Safety
///
/// The CPU must support SSE2. All slices must be at least `out_re.len()` long.
#[target_feature(enable = "sse2")]
pub(super) unsafe fn conjugate_multiply(
    x_re: &[f32],
    x_im: &[f32],
    e_re: &[f32],
    e_im: &[f32],
    out_re: &mut [f32],
    out_im: &mut [f32],
) {
    let n = out_re.len();
    let vec_end = n - n % 4;
    // SAFETY: see `multiply_accumulate`.
    unsafe {
        let mut k = 0;
        while k < vec_end {
            let xr = _mm_loadu_ps(x_re.as_ptr().add(k));
            let xi = _mm_loadu_ps(x_im.as_ptr().add(k));
            let er = _mm_loadu_ps(e_re.as_ptr().add(k));
            let ei = _mm_loadu_ps(e_im.as_ptr().add(k));
            let re = _mm_add_ps(_mm_mul_ps(xr, er), _mm_mul_ps(xi, ei));
            let im = _mm_sub_ps(_mm_mul_ps(xr, ei), _mm_mul_ps(xi, er));
            _mm_storeu_ps(out_re.as_mut_ptr().add(k), re);
            _mm_storeu_ps(out_im.as_mut_ptr().add(k), im);
            k += 4;
        }
    }
    scalar::conjugate_multiply(
        &x_re[vec_end..n],
        &x_im[vec_end..n],
        &e_re[vec_end..n],
        &e_im[vec_end..n],
        &mut out_re[vec_end..],
        &mut out_im[vec_end..n],
    );
}

/// SSE2 error normalization, magnitude clamp and step size.
///
/// # Safety
///
/// The CPU must support SSE2. `x_pow` and `e_im` must be at least
/// `e_re.len()` long.
#[target_feature(enable = "sse2")]
pub(super) unsafe fn scale_error_signal(
    x_pow: &[f32],
    mu: f32,
    threshold: f32,
    e_re: &mut [f32],
    e_im: &mut [f32],
) {
    let n = e_re.len();
    let vec_end = n - n % 4;
    // SAFETY: see `multiply_accumulate`.
    unsafe {
        let eps = _mm_set1_ps(1e-10);
        let one = _mm_set1_ps(1.0);
        let thr = _mm_set1_ps(threshold);
        let step = _mm_set1_ps(mu);
        let mut k = 0;
        while k < vec_end {
            let denom = _mm_add_ps(_mm_loadu_ps(x_pow.as_ptr().add(k)), eps);
            let re = _mm_div_ps(_mm_loadu_ps(e_re.as_ptr().add(k)), denom);
            let im = _mm_div_ps(_mm_loadu_ps(e_im.as_ptr().add(k)), denom);
            let abs = _mm_sqrt_ps(_mm_add_ps(_mm_mul_ps(re, re), _mm_mul_ps(im, im)));
            let over = _mm_cmpgt_ps(abs, thr);
            let clamp = _mm_div_ps(thr, _mm_add_ps(abs, eps));
            let factor = _mm_or_ps(_mm_and_ps(over, clamp), _mm_andnot_ps(over, one));
            let re = _mm_mul_ps(_mm_mul_ps(re, factor), step);
            let im = _mm_mul_ps(_mm_mul_ps(im, factor), step);
            _mm_storeu_ps(e_re.as_mut_ptr().add(k), re);
            _mm_storeu_ps(e_im.as_mut_ptr().add(k), im);
            k += 4;
        }
    }
    scalar::scale_error_signal(
        &x_pow[vec_end..n],
        mu,
        threshold,
        &mut e_re[vec_end..],
        &mut e_im[vec_end..n],
    );
}
