//! Convolution autograd operations: conv2d, conv_transpose2d
//!
//! Both ops lower to a matrix product over an im2col buffer. A transposed
//! convolution is the adjoint of a convolution, so its forward pass is the
//! convolution's input gradient and vice versa.

use super::propagate_grad;
use crate::autograd::{BackwardOp, GradCell, Tensor};
use crate::{Error, Result};
use ndarray::{Array1, Array2, ArrayView2, Axis};
use std::rc::Rc;

/// Kernel size, stride and zero padding of a square 2-D convolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Conv2dSpec {
    pub kernel: usize,
    pub stride: usize,
    pub padding: usize,
}

impl Conv2dSpec {
    pub const fn new(kernel: usize, stride: usize, padding: usize) -> Self {
        Self {
            kernel,
            stride,
            padding,
        }
    }

    /// Spatial output size of a convolution over `input` pixels
    pub fn output_len(&self, input: usize) -> Option<usize> {
        if self.stride == 0 {
            return None;
        }
        (input + 2 * self.padding)
            .checked_sub(self.kernel)
            .map(|span| span / self.stride + 1)
    }

    /// Spatial output size of a transposed convolution over `input` pixels
    pub fn transposed_output_len(&self, input: usize) -> Option<usize> {
        input
            .checked_sub(1)
            .map(|steps| steps * self.stride + self.kernel)
            .and_then(|span| span.checked_sub(2 * self.padding))
            .filter(|&len| len > 0)
    }
}

/// Image plane geometry paired with the sliding-window grid over it.
#[derive(Debug, Clone, Copy)]
struct Window {
    channels: usize,
    height: usize,
    width: usize,
    grid_h: usize,
    grid_w: usize,
    spec: Conv2dSpec,
}

impl Window {
    fn image_len(&self) -> usize {
        self.channels * self.height * self.width
    }

    fn rows(&self) -> usize {
        self.channels * self.spec.kernel * self.spec.kernel
    }

    fn cols(&self) -> usize {
        self.grid_h * self.grid_w
    }

    /// Visit every (column-buffer row, grid cell, image index) triple that
    /// lands inside the image.
    fn for_each_tap(&self, mut f: impl FnMut(usize, usize, usize)) {
        let k = self.spec.kernel;
        let pad = self.spec.padding as isize;
        for ch in 0..self.channels {
            for ki in 0..k {
                for kj in 0..k {
                    let row = (ch * k + ki) * k + kj;
                    for oy in 0..self.grid_h {
                        let iy = (oy * self.spec.stride + ki) as isize - pad;
                        if iy < 0 || iy >= self.height as isize {
                            continue;
                        }
                        for ox in 0..self.grid_w {
                            let ix = (ox * self.spec.stride + kj) as isize - pad;
                            if ix < 0 || ix >= self.width as isize {
                                continue;
                            }
                            let pixel = (ch * self.height + iy as usize) * self.width + ix as usize;
                            f(row, oy * self.grid_w + ox, pixel);
                        }
                    }
                }
            }
        }
    }

    fn im2col(&self, image: &[f32]) -> Array2<f32> {
        let mut cols = Array2::zeros((self.rows(), self.cols()));
        self.for_each_tap(|row, col, pixel| cols[[row, col]] = image[pixel]);
        cols
    }

    fn col2im(&self, cols: &Array2<f32>, image: &mut [f32]) {
        self.for_each_tap(|row, col, pixel| image[pixel] += cols[[row, col]]);
    }
}

fn contiguous(data: &Array1<f32>) -> &[f32] {
    data.as_slice().expect("tensor data is contiguous")
}

fn matrix(data: &[f32], rows: usize, cols: usize) -> ArrayView2<'_, f32> {
    ArrayView2::from_shape((rows, cols), data).expect("matrix shape validated at forward time")
}

fn check_bias(op: &'static str, bias: Option<&Tensor>, channels: usize) -> Result<()> {
    match bias {
        Some(b) if b.len() != channels => Err(Error::shape(op, &[channels], b.shape())),
        _ => Ok(()),
    }
}

fn add_bias(out: &mut [f32], bias: Option<&Tensor>, plane: usize) {
    if let Some(bias) = bias {
        for (channel, &b) in out.chunks_mut(plane).zip(bias.data().iter()) {
            channel.iter_mut().for_each(|v| *v += b);
        }
    }
}

/// 2-D convolution over an NCHW batch.
///
/// `weight` has shape `[out_channels, in_channels, k, k]`, `bias` (optional)
/// has `out_channels` elements.
pub fn conv2d(x: &Tensor, weight: &Tensor, bias: Option<&Tensor>, spec: Conv2dSpec) -> Result<Tensor> {
    let [n, c, h, w] = x.dims4()?;
    let k = spec.kernel;
    let out_channels = weight.shape().first().copied().unwrap_or(0);
    let expected = [out_channels, c, k, k];
    if weight.shape() != expected {
        return Err(Error::shape("conv2d", &expected, weight.shape()));
    }
    check_bias("conv2d", bias, out_channels)?;
    let (Some(grid_h), Some(grid_w)) = (spec.output_len(h), spec.output_len(w)) else {
        return Err(Error::shape("conv2d", &[k, k], &[h, w]));
    };

    let window = Window {
        channels: c,
        height: h,
        width: w,
        grid_h,
        grid_w,
        spec,
    };
    let x_data = contiguous(x.data());
    let w_mat = matrix(contiguous(weight.data()), out_channels, window.rows());
    let sample_out = out_channels * window.cols();

    let mut out = vec![0.0; n * sample_out];
    for (i, out_i) in out.chunks_mut(sample_out).enumerate() {
        let cols = window.im2col(&x_data[i * window.image_len()..(i + 1) * window.image_len()]);
        let product = w_mat.dot(&cols);
        for (dst, src) in out_i.iter_mut().zip(product.iter()) {
            *dst = *src;
        }
        add_bias(out_i, bias, window.cols());
    }

    let requires_grad =
        x.requires_grad() || weight.requires_grad() || bias.is_some_and(Tensor::requires_grad);
    let mut result = Tensor::with_shape(
        Array1::from(out),
        vec![n, out_channels, grid_h, grid_w],
        requires_grad,
    );

    if requires_grad {
        let backward_op = Rc::new(Conv2dBackward {
            x: x.clone(),
            weight: weight.clone(),
            bias: bias.cloned(),
            window,
            batch: n,
            out_channels,
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    Ok(result)
}

struct Conv2dBackward {
    x: Tensor,
    weight: Tensor,
    bias: Option<Tensor>,
    window: Window,
    batch: usize,
    out_channels: usize,
    result_grad: GradCell,
}

impl BackwardOp for Conv2dBackward {
    fn backward(&self) {
        let Some(grad) = self.result_grad.borrow_mut().take() else {
            return;
        };
        let win = &self.window;
        let grad = contiguous(&grad);
        let x_data = contiguous(self.x.data());
        let w_mat = matrix(contiguous(self.weight.data()), self.out_channels, win.rows());
        let sample_out = self.out_channels * win.cols();

        let mut grad_w = Array2::<f32>::zeros((self.out_channels, win.rows()));
        let mut grad_b = Array1::<f32>::zeros(self.out_channels);
        let mut grad_x = vec![0.0; self.batch * win.image_len()];

        for i in 0..self.batch {
            let g_i = matrix(&grad[i * sample_out..(i + 1) * sample_out], self.out_channels, win.cols());
            let image = i * win.image_len()..(i + 1) * win.image_len();

            if self.weight.requires_grad() {
                // ∂L/∂W = ∂L/∂out · colsᵀ
                let cols = win.im2col(&x_data[image.clone()]);
                grad_w += &g_i.dot(&cols.t());
            }
            if self.bias.is_some() {
                grad_b += &g_i.sum_axis(Axis(1));
            }
            if self.x.requires_grad() {
                // ∂L/∂x = col2im(Wᵀ · ∂L/∂out)
                let dcols = w_mat.t().dot(&g_i);
                win.col2im(&dcols, &mut grad_x[image]);
            }
        }

        if let Some(bias) = &self.bias {
            propagate_grad(bias, grad_b);
        }
        propagate_grad(&self.weight, grad_w.iter().copied().collect());
        propagate_grad(&self.x, Array1::from(grad_x));
    }
}

/// 2-D transposed convolution over an NCHW batch.
///
/// `weight` has shape `[in_channels, out_channels, k, k]`, `bias` (optional)
/// has `out_channels` elements. Output size is `(h - 1) * stride + k - 2 * padding`.
pub fn conv_transpose2d(
    x: &Tensor,
    weight: &Tensor,
    bias: Option<&Tensor>,
    spec: Conv2dSpec,
) -> Result<Tensor> {
    let [n, c, h, w] = x.dims4()?;
    let k = spec.kernel;
    let out_channels = weight.shape().get(1).copied().unwrap_or(0);
    let expected = [c, out_channels, k, k];
    if weight.shape() != expected {
        return Err(Error::shape("conv_transpose2d", &expected, weight.shape()));
    }
    check_bias("conv_transpose2d", bias, out_channels)?;
    let (Some(out_h), Some(out_w)) = (spec.transposed_output_len(h), spec.transposed_output_len(w))
    else {
        return Err(Error::shape("conv_transpose2d", &[k, k], &[h, w]));
    };

    // Window over the output plane whose grid is the input plane.
    let window = Window {
        channels: out_channels,
        height: out_h,
        width: out_w,
        grid_h: h,
        grid_w: w,
        spec,
    };
    let x_data = contiguous(x.data());
    let w_mat = matrix(contiguous(weight.data()), c, window.rows());
    let sample_in = c * h * w;

    let mut out = vec![0.0; n * window.image_len()];
    for (i, out_i) in out.chunks_mut(window.image_len()).enumerate() {
        let x_i = matrix(&x_data[i * sample_in..(i + 1) * sample_in], c, h * w);
        let cols = w_mat.t().dot(&x_i);
        window.col2im(&cols, out_i);
        add_bias(out_i, bias, out_h * out_w);
    }

    let requires_grad =
        x.requires_grad() || weight.requires_grad() || bias.is_some_and(Tensor::requires_grad);
    let mut result = Tensor::with_shape(
        Array1::from(out),
        vec![n, out_channels, out_h, out_w],
        requires_grad,
    );

    if requires_grad {
        let backward_op = Rc::new(ConvTranspose2dBackward {
            x: x.clone(),
            weight: weight.clone(),
            bias: bias.cloned(),
            window,
            batch: n,
            in_channels: c,
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    Ok(result)
}

struct ConvTranspose2dBackward {
    x: Tensor,
    weight: Tensor,
    bias: Option<Tensor>,
    window: Window,
    batch: usize,
    in_channels: usize,
    result_grad: GradCell,
}

impl BackwardOp for ConvTranspose2dBackward {
    fn backward(&self) {
        let Some(grad) = self.result_grad.borrow_mut().take() else {
            return;
        };
        let win = &self.window;
        let grad = contiguous(&grad);
        let x_data = contiguous(self.x.data());
        let w_mat = matrix(contiguous(self.weight.data()), self.in_channels, win.rows());
        let sample_in = self.in_channels * win.cols();
        let plane = win.height * win.width;

        let mut grad_w = Array2::<f32>::zeros((self.in_channels, win.rows()));
        let mut grad_b = Array1::<f32>::zeros(win.channels);
        let mut grad_x = Vec::with_capacity(self.batch * sample_in);

        for i in 0..self.batch {
            let g_i = &grad[i * win.image_len()..(i + 1) * win.image_len()];
            let gcols = win.im2col(g_i);

            if self.x.requires_grad() {
                // ∂L/∂x = W · im2col(∂L/∂out)
                grad_x.extend(w_mat.dot(&gcols).iter());
            }
            if self.weight.requires_grad() {
                // ∂L/∂W = x · im2col(∂L/∂out)ᵀ
                let x_i = matrix(&x_data[i * sample_in..(i + 1) * sample_in], self.in_channels, win.cols());
                grad_w += &x_i.dot(&gcols.t());
            }
            if self.bias.is_some() {
                grad_b += &matrix(g_i, win.channels, plane).sum_axis(Axis(1));
            }
        }

        if let Some(bias) = &self.bias {
            propagate_grad(bias, grad_b);
        }
        propagate_grad(&self.weight, grad_w.iter().copied().collect());
        if self.x.requires_grad() {
            propagate_grad(&self.x, Array1::from(grad_x));
        }
    }
}
