use std::collections::hash_map::{self, HashMap};

use crate::dtype::DType;
use crate::error::{Error, Result};
use crate::shape::Shape;
use crate::tensor::Tensor;

// Tensors — The named-tensor registry
//
// Parameters are looked up by name. The first request for a name creates an
// abstract (generator) tensor with the requested initializer and registers
// it. Every later request returns that same tensor, provided dtype and dims
// agree. A disagreement is a configuration error: the graph asked for two
// different tensors under one name.
//
// Tensors loaded from disk are inserted under their file name before the
// graph is built, so `find` hands out the loaded data instead of a fresh
// generator.
//
// Seeds: with a base seed every created generator gets `base + n` where n
// counts the generators created so far, so a rebuilt graph draws the same
// values. Without one, seeds come from the thread RNG.

/// Name → tensor map with find-or-create semantics.
#[derive(Debug, Default, Clone)]
pub struct Tensors {
    map: HashMap<String, Tensor>,
    init_seed: Option<u64>,
    created: u64,
}

impl Tensors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry whose generated tensors draw deterministic seeds.
    pub fn with_seed(seed: u64) -> Self {
        Tensors {
            init_seed: Some(seed),
            ..Self::default()
        }
    }

    pub fn init_seed(&self) -> Option<u64> {
        self.init_seed
    }

    fn next_seed(&mut self) -> u64 {
        let n = self.created;
        self.created += 1;
        match self.init_seed {
            Some(base) => base.wrapping_add(n),
            None => rand::random(),
        }
    }

    /// Return the tensor registered under `name`, or create and register a
    /// generator tensor with the given initializer.
    ///
    /// An unnamed request always creates a fresh, unregistered tensor.
    pub fn try_find(
        &mut self,
        dtype: DType,
        dims: impl Into<Shape>,
        mean: f64,
        stddev: f64,
        name: Option<&str>,
    ) -> Result<Tensor> {
        let dims = dims.into();
        if let Some(existing) = name.and_then(|n| self.map.get(n)) {
            if existing.dtype() != dtype {
                return Err(Error::DTypeMismatch {
                    name: name.map(str::to_string),
                    expected: existing.dtype(),
                    got: dtype,
                });
            }
            if existing.shape() != &dims {
                return Err(Error::ShapeMismatch {
                    name: name.map(str::to_string),
                    expected: existing.shape().clone(),
                    got: dims,
                });
            }
            return Ok(existing.clone());
        }

        let seed = self.next_seed();
        let t = Tensor::normal(dtype, dims, mean, stddev, seed, name)?;
        if let Some(name) = name {
            log::debug!("created {}", t);
            self.map.insert(name.to_string(), t.clone());
        }
        Ok(t)
    }

    /// Like [`Tensors::try_find`], but a dtype or shape mismatch aborts.
    ///
    /// # Panics
    /// If `name` is already registered with a different dtype or dims.
    pub fn find(
        &mut self,
        dtype: DType,
        dims: impl Into<Shape>,
        mean: f64,
        stddev: f64,
        name: Option<&str>,
    ) -> Tensor {
        match self.try_find(dtype, dims, mean, stddev, name) {
            Ok(t) => t,
            Err(e) => panic!("tensor registry: {e}"),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Tensor> {
        self.map.get(name)
    }

    /// `prefix0`, `prefix1`, ... up to the first missing index.
    pub fn getv(&self, prefix: &str) -> Vec<Tensor> {
        (0..)
            .map_while(|i| self.map.get(&format!("{prefix}{i}")).cloned())
            .collect()
    }

    /// Register `tensor` under `name`, returning what it replaced.
    pub fn insert(&mut self, name: impl Into<String>, tensor: Tensor) -> Option<Tensor> {
        self.map.insert(name.into(), tensor)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> hash_map::Iter<'_, String, Tensor> {
        self.map.iter()
    }
}

impl<'a> IntoIterator for &'a Tensors {
    type Item = (&'a String, &'a Tensor);
    type IntoIter = hash_map::Iter<'a, String, Tensor>;

    fn into_iter(self) -> Self::IntoIter {
        self.map.iter()
    }
}

impl FromIterator<(String, Tensor)> for Tensors {
    fn from_iter<I: IntoIterator<Item = (String, Tensor)>>(iter: I) -> Self {
        Tensors {
            map: iter.into_iter().collect(),
            ..Self::default()
        }
    }
}
