/// Output spatial size along one axis of a convolution.
///
/// `floor((input + 2*padding - kernel - (kernel-1)*(dilation-1)) / stride) + 2*output_padding + 1`
///
/// No bounds checks: zero or negative results are returned as-is and the caller
/// decides what to do with them. Note the `2*output_padding` term; the layer only
/// ever passes `output_padding = 0`, so it never contributes.
///
/// # Panics
/// Panics if `stride` is zero.
#[inline]
pub fn compute_output_dim(
    input_size: i64,
    kernel_size: i64,
    padding: i64,
    stride: i64,
    dilation: i64,
    output_padding: i64,
) -> i64 {
    let span = input_size + 2 * padding - kernel_size - (kernel_size - 1) * (dilation - 1);
    // div_euclid floors for a positive divisor, which matches floor() on negative spans
    span.div_euclid(stride) + 2 * output_padding + 1
}

/// Applies [`compute_output_dim`] independently to height and width.
pub fn conv2d_output_hw(
    input_hw: (usize, usize),
    kernel_size: (usize, usize),
    padding: (usize, usize),
    stride: (usize, usize),
    dilation: (usize, usize),
    output_padding: (usize, usize),
) -> (i64, i64) {
    let h = compute_output_dim(
        input_hw.0 as i64,
        kernel_size.0 as i64,
        padding.0 as i64,
        stride.0 as i64,
        dilation.0 as i64,
        output_padding.0 as i64,
    );
    let w = compute_output_dim(
        input_hw.1 as i64,
        kernel_size.1 as i64,
        padding.1 as i64,
        stride.1 as i64,
        dilation.1 as i64,
        output_padding.1 as i64,
    );
    (h, w)
}
