//! # saga
//!
//! Computation graph layer on top of [`saga_core`].
//!
//! ## Usage
//!
//! ```rust
//! use saga::prelude::*;
//!
//! let mut g = Graph::new();
//! let x = Tensor::new(DType::F32, (1, 3, 28, 28), Some("input")).unwrap();
//! let y = g.add_node(
//!     NodeKind::Conv,
//!     [("x", x)],
//!     Attributes::new().with("activations", 8).with("size", 5).with("pad", 0),
//!     Some("conv1"),
//! );
//! assert_eq!(y.dims(), &[1, 8, 24, 24]);
//! ```
//!
//! ## Architecture
//!
//! | Crate | Purpose |
//! |-------|----------|
//! | `saga-core` | Storage, Layout, TensorAccess, Tensor, Tensors registry |
//! | `saga` | Attributes, Node shape inference, Graph, tensor file I/O |
//!
//! ## Modules
//!
//! - [`attributes`] — typed node attributes with get-or-default lookup
//! - [`node`] — node kinds, shape inference, parameter creation
//! - [`graph`] — node list, derived input/output sets, usage index
//! - [`tensor_file`] — single-tensor binary format, memory-mapped loading
//! - [`config`] — graph construction settings

pub mod attributes;
pub mod config;
pub mod graph;
pub mod node;
pub mod tensor_file;

/// Re-export core types.
pub use saga_core::{
    DType, Error, Layout, Result, Shape, Stats, Storage, Tensor, TensorAccess, TensorId, Tensors,
    WithDType,
};

pub use attributes::{Attribute, Attributes};
pub use config::GraphConfig;
pub use graph::{Graph, TensorMapping, TensorResolver};
pub use node::{Node, NodeKind, NodeTensors};
pub use tensor_file::{load_tensor, save_tensor};

/// Convenience prelude.
pub mod prelude {
    pub use crate::attributes::{Attribute, Attributes};
    pub use crate::config::GraphConfig;
    pub use crate::graph::{Graph, TensorResolver};
    pub use crate::node::{NodeKind, NodeTensors};
    pub use saga_core::{DType, Shape, Tensor, TensorAccess, Tensors};
}
