use ndarray::{Array2, ArrayView3, Zip, s};

const ATOL: f64 = 1e-3;
const RTOL: f64 = 1e-5;

#[inline]
fn differs(a: f64, b: f64) -> bool {
    (a - b).abs() > ATOL + RTOL * b.abs()
}

/// Marks the pixels of a 2D occupation map at which the charge configuration changes.
///
/// `n` has shape `(nx, ny, n_dot)`. Pixel `(i, j)` of the `(nx - 1, ny - 1)` result is `true`
/// when the occupation of any dot at `(i + 1, j)` or at `(i, j + 1)` differs from the one at
/// `(i, j)` by more than `1e-3`. The last row and column have no forward neighbour and are
/// dropped. Thermal (non-integer) occupations are compared with the same tolerance.
pub fn dot_occupation_changes(n: ArrayView3<f64>) -> Array2<bool> {
    let (nx, ny, _) = n.dim();
    let (rows, cols) = (nx.saturating_sub(1), ny.saturating_sub(1));
    if rows == 0 || cols == 0 {
        return Array2::from_elem((rows, cols), false);
    }

    let base = n.slice(s![..-1, ..-1, ..]);
    let next_x = n.slice(s![1.., ..-1, ..]);
    let next_y = n.slice(s![..-1, 1.., ..]);

    Array2::from_shape_fn((rows, cols), |(i, j)| {
        Zip::from(base.slice(s![i, j, ..]))
            .and(next_x.slice(s![i, j, ..]))
            .and(next_y.slice(s![i, j, ..]))
            .fold(false, |changed, &here, &right, &up| {
                changed || differs(right, here) || differs(up, here)
            })
    })
}
