use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

use crate::layout::offset_for;
use crate::storage::Storage;

// TensorAccess — Scoped, per-use accessor for a tensor's elements
//
// A view is opened, used for a batch of reads and writes, then dropped. It
// pins the physical buffer it was opened on, so a flip() that happens while
// the view is alive does not move it.
//
// Two kinds exist:
//
//   - StorageAccess   — reads and writes a Storage through strides + offset
//   - GeneratorAccess — an abstract tensor's view: get() draws a fresh
//                       normal sample on every call, set() and
//                       copy_bytes_from() are no-ops
//
// Every value crosses the view as f64 regardless of the storage type.

/// View over one physical buffer of a Storage.
#[derive(Debug, Clone)]
pub struct StorageAccess {
    storage: Storage,
    strides: Vec<usize>,
    offset: usize,
    buffer: usize,
}

impl StorageAccess {
    /// Open a view. `select` is relative to the storage's active buffer
    /// (0 = active, -1 = the buffer active before the last flip).
    pub fn open(storage: &Storage, strides: Vec<usize>, offset: usize, select: isize) -> Self {
        StorageAccess {
            storage: storage.clone(),
            strides,
            offset,
            buffer: storage.physical(select),
        }
    }

    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    /// Physical buffer this view is pinned to.
    pub fn buffer(&self) -> usize {
        self.buffer
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Flat element offset of a coordinate.
    pub fn offset_for_element(&self, element: &[usize]) -> usize {
        offset_for(self.offset, &self.strides, element)
    }

    pub fn get(&self, element: &[usize]) -> f64 {
        self.storage
            .get(self.buffer, self.offset_for_element(element))
    }

    pub fn set(&self, element: &[usize], value: f64) {
        self.storage
            .set(self.buffer, self.offset_for_element(element), value);
    }

    /// Raw byte copy from host memory, starting at the addressed element.
    pub fn copy_bytes_from(&self, element: &[usize], data: &[u8]) {
        let o = self.offset_for_element(element) * self.storage.dtype().size_in_bytes();
        self.storage.write_bytes(self.buffer, o, data);
    }
}

/// View of an abstract tensor: a stateful normal sampler.
#[derive(Debug, Clone)]
pub struct GeneratorAccess {
    strides: Vec<usize>,
    distribution: Normal<f64>,
    rng: StdRng,
}

impl GeneratorAccess {
    pub fn new(rank: usize, distribution: Normal<f64>, seed: u64) -> Self {
        GeneratorAccess {
            strides: vec![0; rank],
            distribution,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Draw the next sample. The coordinate is ignored.
    pub fn get(&mut self, _element: &[usize]) -> f64 {
        self.distribution.sample(&mut self.rng)
    }
}

/// Accessor returned by `Tensor::access()`.
#[derive(Debug, Clone)]
pub enum TensorAccess {
    Storage(StorageAccess),
    Generator(GeneratorAccess),
}

impl TensorAccess {
    /// Strides of the view, all zero for a generator.
    pub fn strides(&self) -> &[usize] {
        match self {
            TensorAccess::Storage(a) => a.strides(),
            TensorAccess::Generator(g) => &g.strides,
        }
    }

    pub fn get(&mut self, element: &[usize]) -> f64 {
        match self {
            TensorAccess::Storage(a) => a.get(element),
            TensorAccess::Generator(g) => g.get(element),
        }
    }

    pub fn set(&mut self, element: &[usize], value: f64) {
        if let TensorAccess::Storage(a) = self {
            a.set(element, value);
        }
    }

    pub fn copy_bytes_from(&mut self, element: &[usize], data: &[u8]) {
        if let TensorAccess::Storage(a) = self {
            a.copy_bytes_from(element, data);
        }
    }

    pub fn is_generator(&self) -> bool {
        matches!(self, TensorAccess::Generator(_))
    }
}
