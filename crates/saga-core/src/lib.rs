//! # saga-core
//!
//! Tensor memory model for saga.
//!
//! This crate provides:
//! - [`Storage`] — shared, optionally double-buffered element memory
//! - [`Shape`] / [`Layout`] — dimensions, strides and offset
//! - [`DType`] — element types (U8, F16, F32, I32, I64)
//! - [`TensorAccess`] — per-use views for element reads and writes
//! - [`Tensor`] — concrete, abstract (generator) or shape-only tensor handle
//! - [`Tensors`] — the named-tensor registry
// - DType: scalar element types and their little-endian encoding
// - Shape: dimensions and the canonical element order
// - Layout: shape + strides + offset
// - Storage: physical buffers, flip, memory-mapped backing
// - Access: views opened on a storage or a generator
// - Tensor: identity, backing, slicing, copy/compare/stats
// - Registry: find-or-create by name

pub mod access;
pub mod dtype;
pub mod error;
pub mod layout;
pub mod registry;
pub mod shape;
pub mod storage;
pub mod tensor;

pub use access::{GeneratorAccess, StorageAccess, TensorAccess};
pub use dtype::{DType, WithDType};
pub use error::{Error, Result};
pub use layout::Layout;
pub use registry::Tensors;
pub use shape::{CoordIter, Shape, MAX_RANK};
pub use storage::Storage;
pub use tensor::{Stats, Tensor, TensorId};
