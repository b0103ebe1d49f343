//! Numeric primitives. Infallible.

/// # Safety
///
/// Always safe to call.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn c_add(a: f64, b: f64) -> f64 {
    a + b
}

/// # Safety
///
/// Always safe to call.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn c_multiply(a: f64, b: f64) -> f64 {
    a * b
}

/// `x*y + x/y`, or `x*y` when `y` is zero.
///
/// # Safety
///
/// Always safe to call.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn c_complex_calculation(x: f64, y: f64) -> f64 {
    let product = x * y;
    if y == 0.0 { product } else { product + x / y }
}
