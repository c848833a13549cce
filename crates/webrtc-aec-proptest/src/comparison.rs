//! Assertions over sample buffers.

/// Asserts `actual` and `expected` agree within `max(abs_tol, |expected| * rel_tol)`.
pub fn assert_f32_relative(actual: &[f32], expected: &[f32], rel_tol: f32, abs_tol: f32) {
    assert_eq!(actual.len(), expected.len(), "length mismatch");
    for (i, (&a, &e)) in actual.iter().zip(expected).enumerate() {
        let tol = abs_tol.max(e.abs() * rel_tol);
        let diff = (a - e).abs();
        assert!(
            diff <= tol,
            "mismatch at index {i}: actual={a}, expected={e}, diff={diff}, tol={tol}"
        );
    }
}

/// Asserts two sample buffers are identical.
pub fn assert_i16_exact(actual: &[i16], expected: &[i16]) {
    assert_eq!(actual.len(), expected.len(), "length mismatch");
    for (i, (&a, &e)) in actual.iter().zip(expected).enumerate() {
        assert_eq!(a, e, "mismatch at index {i}: actual={a}, expected={e}");
    }
}

/// Energy of a buffer in dB relative to one, floored at -100.
pub fn energy_db(samples: &[i16]) -> f32 {
    let energy: f64 = samples.iter().map(|&s| f64::from(s) * f64::from(s)).sum();
    if energy <= 0.0 {
        -100.0
    } else {
        (10.0 * energy.log10()) as f32
    }
}
