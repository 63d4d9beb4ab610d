//! Dequantization and the 8x8 inverse DCT (A.3.3).

use crate::math::{Level, Simd, dispatch, f32x8};
use crate::segment::QuantTable;

/// 64 DCT coefficients in natural (row-major) order.
pub(crate) type Block = [i32; 64];

/// The natural-order position of each zig-zag index (Figure A.6).
pub(crate) const UNZIG: [usize; 64] = [
    0, 1, 8, 16, 9, 2, 3, 10, //
    17, 24, 32, 25, 18, 11, 4, 5, //
    12, 19, 26, 33, 40, 48, 41, 34, //
    27, 20, 13, 6, 7, 14, 21, 28, //
    35, 42, 49, 56, 57, 50, 43, 36, //
    29, 22, 15, 23, 30, 37, 44, 51, //
    58, 59, 52, 45, 38, 31, 39, 46, //
    53, 60, 61, 54, 47, 55, 62, 63, //
];

/// `COSINES[u][x] = C(u) / 2 * cos((2x + 1) * u * pi / 16)` with
/// `C(0) = 1 / sqrt(2)` and `C(u) = 1` otherwise, so that the 2-D transform is
/// a product of two 1-D passes.
const COSINES: [[f32; 8]; 8] = [
    [
        0.3535534, 0.3535534, 0.3535534, 0.3535534, 0.3535534, 0.3535534, 0.3535534, 0.3535534,
    ],
    [
        0.4903926, 0.4157348, 0.2777851, 0.09754516, -0.09754516, -0.2777851, -0.4157348,
        -0.4903926,
    ],
    [
        0.4619398, 0.1913417, -0.1913417, -0.4619398, -0.4619398, -0.1913417, 0.1913417, 0.4619398,
    ],
    [
        0.4157348, -0.09754516, -0.4903926, -0.2777851, 0.2777851, 0.4903926, 0.09754516,
        -0.4157348,
    ],
    [
        0.3535534, -0.3535534, -0.3535534, 0.3535534, 0.3535534, -0.3535534, -0.3535534, 0.3535534,
    ],
    [
        0.2777851, -0.4903926, 0.09754516, 0.4157348, -0.4157348, -0.09754516, 0.4903926,
        -0.2777851,
    ],
    [
        0.1913417, -0.4619398, 0.4619398, -0.1913417, -0.1913417, 0.4619398, -0.4619398, 0.1913417,
    ],
    [
        0.09754516, -0.2777851, 0.4157348, -0.4903926, 0.4903926, -0.4157348, 0.2777851,
        -0.09754516,
    ],
];

/// Dequantize and inverse-transform a block, then level shift and clamp the
/// samples into the 8 rows of `out` that start `stride` bytes apart.
pub(crate) fn reconstruct(block: &Block, quant: &QuantTable, out: &mut [u8], stride: usize) {
    dispatch!(Level::new(), simd => reconstruct_impl(simd, block, quant, out, stride));
}

#[inline(always)]
fn reconstruct_impl<S: Simd>(
    simd: S,
    block: &Block,
    quant: &QuantTable,
    out: &mut [u8],
    stride: usize,
) {
    let mut coefficients = [0.0_f32; 64];

    for (zig, &q) in quant.iter().enumerate() {
        let i = UNZIG[zig];
        coefficients[i] = block[i].wrapping_mul(i32::from(q)) as f32;
    }

    // Vertical pass: row y of the intermediate is the sum over the vertical
    // frequencies v of COSINES[v][y] times coefficient row v.
    let mut columns = [0.0_f32; 64];

    for (y, dst) in columns.chunks_exact_mut(8).enumerate() {
        let mut acc = f32x8::splat(simd, 0.0);

        for (v, row) in coefficients.chunks_exact(8).enumerate() {
            acc = f32x8::from_slice(simd, row).mul_add(f32x8::splat(simd, COSINES[v][y]), acc);
        }

        acc.store(dst);
    }

    // Horizontal pass, with the +128 level shift and rounding folded into the
    // accumulator's starting value.
    let lower = f32x8::splat(simd, 0.0);
    let upper = f32x8::splat(simd, 255.0);
    let mut samples = [0.0_f32; 8];

    for (y, src) in columns.chunks_exact(8).enumerate() {
        let mut acc = f32x8::splat(simd, 128.5);

        for (u, basis) in COSINES.iter().enumerate() {
            acc = f32x8::from_slice(simd, basis).mul_add(f32x8::splat(simd, src[u]), acc);
        }

        acc.floor().max(lower).min(upper).store(&mut samples);

        let row = &mut out[y * stride..y * stride + 8];
        for (dst, sample) in row.iter_mut().zip(samples) {
            *dst = sample as u8;
        }
    }
}
