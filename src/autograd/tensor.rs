//! Tensor type with gradient tracking

use super::BackwardOp;
use crate::{Error, Result};
use ndarray::Array1;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Shared gradient slot of a tensor.
pub type GradCell = Rc<RefCell<Option<Array1<f32>>>>;

/// Dense `f32` tensor stored flat in row-major order.
///
/// Cloning is cheap: data is reference counted and copied on write, and the
/// gradient cell is shared, so a clone captured by a backward op accumulates
/// into the same slot as the original.
#[derive(Clone)]
pub struct Tensor {
    data: Rc<Array1<f32>>,
    shape: Vec<usize>,
    grad: GradCell,
    backward_op: Option<Rc<dyn BackwardOp>>,
    requires_grad: bool,
}

impl Tensor {
    /// Create a 1-D tensor from an array
    pub fn new(data: Array1<f32>, requires_grad: bool) -> Self {
        let shape = vec![data.len()];
        Self {
            data: Rc::new(data),
            shape,
            grad: Rc::new(RefCell::new(None)),
            backward_op: None,
            requires_grad,
        }
    }

    /// Create a 1-D tensor from a vector
    pub fn from_vec(data: Vec<f32>, requires_grad: bool) -> Self {
        Self::new(Array1::from(data), requires_grad)
    }

    /// Create a tensor with an explicit shape
    pub fn from_shape(shape: &[usize], data: Vec<f32>, requires_grad: bool) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(Error::shape("from_shape", &[expected], &[data.len()]));
        }
        let mut tensor = Self::from_vec(data, requires_grad);
        tensor.shape = shape.to_vec();
        Ok(tensor)
    }

    /// Create a zero-filled tensor
    pub fn zeros(shape: &[usize], requires_grad: bool) -> Self {
        let len: usize = shape.iter().product();
        let mut tensor = Self::new(Array1::zeros(len), requires_grad);
        tensor.shape = shape.to_vec();
        tensor
    }

    /// Build an op output that shares nothing with its inputs.
    pub(crate) fn with_shape(data: Array1<f32>, shape: Vec<usize>, requires_grad: bool) -> Self {
        debug_assert_eq!(data.len(), shape.iter().product::<usize>());
        let mut tensor = Self::new(data, requires_grad);
        tensor.shape = shape;
        tensor
    }

    /// Flat data
    pub fn data(&self) -> &Array1<f32> {
        &self.data
    }

    /// Mutable flat data (copy-on-write if a graph node still holds it)
    pub fn data_mut(&mut self) -> &mut Array1<f32> {
        Rc::make_mut(&mut self.data)
    }

    /// Tensor shape
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Shape as `[n, c, h, w]`, failing for any other rank
    pub fn dims4(&self) -> Result<[usize; 4]> {
        match self.shape.as_slice() {
            &[n, c, h, w] => Ok([n, c, h, w]),
            other => Err(Error::shape("dims4", &[0, 0, 0, 0], other)),
        }
    }

    /// Reinterpret the data with a new shape of the same size
    pub fn reshape(&self, shape: &[usize]) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if expected != self.len() {
            return Err(Error::shape("reshape", &[self.len()], &[expected]));
        }
        let mut tensor = self.clone();
        tensor.shape = shape.to_vec();
        Ok(tensor)
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the tensor holds no elements
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Value of a single-element tensor
    pub fn item(&self) -> f32 {
        self.data.first().copied().unwrap_or(0.0)
    }

    /// Whether gradients flow into this tensor
    pub fn requires_grad(&self) -> bool {
        self.requires_grad
    }

    /// Toggle gradient tracking (leaves only)
    pub fn set_requires_grad(&mut self, requires_grad: bool) {
        self.requires_grad = requires_grad;
    }

    /// Copy of the accumulated gradient
    pub fn grad(&self) -> Option<Array1<f32>> {
        self.grad.borrow().clone()
    }

    /// Shared gradient cell, captured by backward ops
    pub fn grad_cell(&self) -> GradCell {
        Rc::clone(&self.grad)
    }

    /// Replace the gradient
    pub fn set_grad(&self, grad: Array1<f32>) {
        *self.grad.borrow_mut() = Some(grad);
    }

    /// Add to the gradient
    pub fn accumulate_grad(&self, grad: Array1<f32>) {
        let mut slot = self.grad.borrow_mut();
        match slot.as_mut() {
            Some(existing) => *existing += &grad,
            None => *slot = Some(grad),
        }
    }

    /// Clear the gradient
    pub fn zero_grad(&self) {
        *self.grad.borrow_mut() = None;
    }

    /// Take the gradient, leaving the slot empty
    pub fn take_grad(&self) -> Option<Array1<f32>> {
        self.grad.borrow_mut().take()
    }

    /// Backward op that produced this tensor
    pub fn backward_op(&self) -> Option<Rc<dyn BackwardOp>> {
        self.backward_op.clone()
    }

    /// Attach the op that produced this tensor
    pub fn set_backward_op(&mut self, op: Rc<dyn BackwardOp>) {
        self.backward_op = Some(op);
    }

    /// New leaf holding the same values, cut from the graph.
    pub fn detach(&self, requires_grad: bool) -> Self {
        Self {
            data: Rc::clone(&self.data),
            shape: self.shape.clone(),
            grad: Rc::new(RefCell::new(None)),
            backward_op: None,
            requires_grad,
        }
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor")
            .field("shape", &self.shape)
            .field("requires_grad", &self.requires_grad)
            .field("has_grad", &self.grad.borrow().is_some())
            .field("has_backward_op", &self.backward_op.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zeros_shape_and_len() {
        let t = Tensor::zeros(&[2, 3, 4], true);
        assert_eq!(t.shape(), &[2, 3, 4]);
        assert_eq!(t.len(), 24);
        assert!(t.data().iter().all(|&v| v == 0.0));
        assert!(t.requires_grad());
    }

    #[test]
    fn test_zeros_scalar_shape() {
        let t = Tensor::zeros(&[], false);
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn test_detach_shares_data_not_grad() {
        let a = Tensor::from_shape(&[2], vec![1.0, 2.0], true).unwrap();
        a.set_grad(ndarray::arr1(&[1.0, 1.0]));
        let b = a.detach(true);
        assert_eq!(b.data(), a.data());
        assert!(b.grad().is_none());
        assert!(b.backward_op().is_none());
    }
}
