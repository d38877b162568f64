use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rand_distr::Normal;

use crate::access::{GeneratorAccess, StorageAccess, TensorAccess};
use crate::dtype::{DType, WithDType};
use crate::bail;
use crate::error::{Error, Result};
use crate::layout::Layout;
use crate::shape::{Shape, MAX_RANK};
use crate::storage::Storage;

// Tensor — A named, typed, shaped handle
//
// A Tensor is cheap to clone: the handle is an Arc around TensorInner, and
// clones keep the same TensorId. Graph sets and usage maps key on that id,
// so "the same tensor" means "the same handle lineage", never "equal
// contents".
//
// A tensor is backed in one of three ways:
//
//   Storage    — materialized. A Storage plus a Layout (strides, offset).
//                Slices share the parent's Storage under a new Layout.
//   Generator  — abstract. No memory, values are drawn from N(mean, stddev).
//                Used as a placeholder initializer for parameters that a
//                backend has not allocated yet.
//   Descriptor — shape and type only. What shape inference produces for node
//                outputs; a backend materializes it later.
//
// The dimension list never changes after construction.

/// Unique identifier for a tensor handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TensorId(u64);

impl TensorId {
    /// Generate a new unique tensor ID (global atomic counter).
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        TensorId(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug)]
enum Backing {
    Descriptor,
    Generator {
        distribution: Normal<f64>,
        mean: f64,
        stddev: f64,
        seed: u64,
    },
    Storage {
        storage: Storage,
        layout: Layout,
    },
}

#[derive(Debug)]
struct TensorInner {
    id: TensorId,
    name: Option<String>,
    dtype: DType,
    shape: Shape,
    backing: Backing,
}

/// An n-dimensional, typed tensor handle.
///
/// # Example
/// ```
/// use saga_core::{DType, Tensor};
///
/// let t = Tensor::new(DType::F32, [2, 3], Some("x")).unwrap();
/// let mut ta = t.access().unwrap();
/// ta.set(&[1, 2], 4.0);
/// assert_eq!(ta.get(&[1, 2]), 4.0);
/// ```
#[derive(Clone)]
pub struct Tensor {
    inner: Arc<TensorInner>,
}

impl PartialEq for Tensor {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Tensor {}

impl Hash for Tensor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tensor(id={:?}, {})", self.inner.id, self)
    }
}

/// Summary string: `"name"<f32>[1, 2]{2, 1}`.
impl fmt::Display for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = &self.inner.name {
            write!(f, "\"{}\"", name)?;
        }
        write!(f, "<{}>{}", self.inner.dtype, self.inner.shape)?;
        match &self.inner.backing {
            Backing::Descriptor => Ok(()),
            Backing::Generator { mean, stddev, .. } => {
                write!(f, "(mean:{}, stddev:{})", mean, stddev)
            }
            Backing::Storage { layout, .. } => {
                write!(f, "{{")?;
                for (i, s) in layout.strides().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", s)?;
                }
                write!(f, "}}")
            }
        }
    }
}

/// Rank limit plus an element count that fits in `usize`. Returns the count.
fn check_shape(shape: &Shape) -> Result<usize> {
    if shape.rank() > MAX_RANK {
        return Err(Error::RankTooHigh {
            rank: shape.rank(),
            max: MAX_RANK,
        });
    }
    shape
        .checked_elem_count()
        .ok_or_else(|| Error::DimensionsTooLarge(shape.clone()))
}

/// Bytes a buffer needs to back `layout`.
fn required_bytes(layout: &Layout, dtype: DType) -> Result<usize> {
    layout
        .required_elems()
        .and_then(|n| n.checked_mul(dtype.size_in_bytes()))
        .ok_or_else(|| Error::DimensionsTooLarge(layout.shape().clone()))
}

impl Tensor {
    fn from_backing(dtype: DType, shape: Shape, name: Option<String>, backing: Backing) -> Self {
        Tensor {
            inner: Arc::new(TensorInner {
                id: TensorId::new(),
                name,
                dtype,
                shape,
                backing,
            }),
        }
    }

    // Creation

    /// Materialized, zero-filled, single-buffered tensor with packed strides.
    pub fn new(dtype: DType, shape: impl Into<Shape>, name: Option<&str>) -> Result<Self> {
        Self::with_buffers(dtype, shape, 1, name)
    }

    /// Materialized tensor with `num_buffers` (1 or 2) physical buffers.
    pub fn with_buffers(
        dtype: DType,
        shape: impl Into<Shape>,
        num_buffers: usize,
        name: Option<&str>,
    ) -> Result<Self> {
        let shape = shape.into();
        check_shape(&shape)?;
        let layout = Layout::contiguous(shape);
        let storage = Storage::new(dtype, required_bytes(&layout, dtype)?, num_buffers)?;
        Self::from_storage(storage, layout, name)
    }

    /// Materialized tensor with caller-supplied (possibly padded) strides.
    pub fn with_strides(
        dtype: DType,
        shape: impl Into<Shape>,
        strides: Vec<usize>,
        name: Option<&str>,
    ) -> Result<Self> {
        let shape = shape.into();
        check_shape(&shape)?;
        let layout = Layout::new(shape, strides, 0);
        let storage = Storage::new(dtype, required_bytes(&layout, dtype)?, 1)?;
        Self::from_storage(storage, layout, name)
    }

    /// Wrap an existing storage. The layout must fit inside it.
    pub fn from_storage(storage: Storage, layout: Layout, name: Option<&str>) -> Result<Self> {
        check_shape(layout.shape())?;
        if layout.strides().len() < layout.rank() {
            bail!(
                "{} strides given for rank {}",
                layout.strides().len(),
                layout.rank()
            );
        }
        let need = layout
            .required_elems()
            .ok_or_else(|| Error::DimensionsTooLarge(layout.shape().clone()))?;
        if need > storage.elem_capacity() {
            bail!(
                "layout {} with strides {:?} at offset {} needs {} elements, storage holds {}",
                layout.shape(),
                layout.strides(),
                layout.offset(),
                need,
                storage.elem_capacity()
            );
        }
        Ok(Self::from_backing(
            storage.dtype(),
            layout.shape().clone(),
            name.map(str::to_string),
            Backing::Storage { storage, layout },
        ))
    }

    /// Materialized tensor holding `data` in canonical order.
    pub fn from_slice<T: WithDType>(
        data: &[T],
        shape: impl Into<Shape>,
        name: Option<&str>,
    ) -> Result<Self> {
        let shape = shape.into();
        let count = check_shape(&shape)?;
        if data.len() != count {
            return Err(Error::ElementCountMismatch {
                expected: count,
                got: data.len(),
            });
        }
        let t = Self::new(T::DTYPE, shape, name)?;
        if let Some(TensorAccess::Storage(ta)) = t.access() {
            for (c, v) in t.shape().coords().zip(data) {
                ta.set(&c, v.as_f64());
            }
        }
        Ok(t)
    }

    /// Abstract tensor drawing from N(mean, stddev). Each opened view
    /// restarts the sequence from `seed`.
    pub fn normal(
        dtype: DType,
        shape: impl Into<Shape>,
        mean: f64,
        stddev: f64,
        seed: u64,
        name: Option<&str>,
    ) -> Result<Self> {
        let shape = shape.into();
        check_shape(&shape)?;
        let distribution = Normal::new(mean, stddev).map_err(|e| {
            Error::msg(format!("invalid initializer mean {mean} stddev {stddev}: {e}"))
        })?;
        Ok(Self::from_backing(
            dtype,
            shape,
            name.map(str::to_string),
            Backing::Generator {
                distribution,
                mean,
                stddev,
                seed,
            },
        ))
    }

    /// Shape-only tensor with neither storage nor generator.
    pub fn descriptor(dtype: DType, shape: impl Into<Shape>, name: Option<&str>) -> Result<Self> {
        let shape = shape.into();
        check_shape(&shape)?;
        Ok(Self::from_backing(
            dtype,
            shape,
            name.map(str::to_string),
            Backing::Descriptor,
        ))
    }

    // Accessors

    pub fn id(&self) -> TensorId {
        self.inner.id
    }

    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    pub fn dtype(&self) -> DType {
        self.inner.dtype
    }

    pub fn shape(&self) -> &Shape {
        &self.inner.shape
    }

    pub fn dims(&self) -> &[usize] {
        self.inner.shape.dims()
    }

    pub fn rank(&self) -> usize {
        self.inner.shape.rank()
    }

    pub fn elem_count(&self) -> usize {
        self.inner.shape.elem_count()
    }

    /// Backing storage, if materialized.
    pub fn storage(&self) -> Option<&Storage> {
        match &self.inner.backing {
            Backing::Storage { storage, .. } => Some(storage),
            _ => None,
        }
    }

    /// Strides and offset into the storage, if materialized.
    pub fn layout(&self) -> Option<&Layout> {
        match &self.inner.backing {
            Backing::Storage { layout, .. } => Some(layout),
            _ => None,
        }
    }

    /// Whether this is a generator-backed (abstract) tensor.
    pub fn is_abstract(&self) -> bool {
        matches!(self.inner.backing, Backing::Generator { .. })
    }

    /// Initializer (mean, stddev) of an abstract tensor.
    pub fn initializer(&self) -> Option<(f64, f64)> {
        match self.inner.backing {
            Backing::Generator { mean, stddev, .. } => Some((mean, stddev)),
            _ => None,
        }
    }

    /// `"{name}.{postfix}"` when the tensor is named.
    pub fn name_postfix(&self, postfix: &str) -> Option<String> {
        self.inner
            .name
            .as_ref()
            .map(|n| format!("{}.{}", n, postfix))
    }

    // Access

    /// Open a view on the active buffer. `None` for a descriptor tensor.
    pub fn access(&self) -> Option<TensorAccess> {
        self.access_buffer(0)
    }

    /// Open a view on the buffer `select` steps from the active one
    /// (-1 reads what was produced before the last flip).
    pub fn access_buffer(&self, select: isize) -> Option<TensorAccess> {
        match &self.inner.backing {
            Backing::Descriptor => None,
            Backing::Generator {
                distribution, seed, ..
            } => Some(TensorAccess::Generator(GeneratorAccess::new(
                self.rank(),
                *distribution,
                *seed,
            ))),
            Backing::Storage { storage, layout } => Some(TensorAccess::Storage(
                StorageAccess::open(storage, layout.strides().to_vec(), layout.offset(), select),
            )),
        }
    }

    /// Advance the storage's active buffer. No-op without storage.
    pub fn flip(&self) {
        if let Some(storage) = self.storage() {
            storage.flip();
        }
    }

    // Views

    /// A tensor of shape `dims` aliasing this one, starting at `offset`.
    ///
    /// Materialized tensors share the storage and keep their strides.
    /// Abstract tensors yield an abstract tensor of the new shape with the
    /// same initializer.
    pub fn slice(&self, offset: &[usize], dims: impl Into<Shape>) -> Result<Self> {
        let dims = dims.into();
        check_shape(&dims)?;
        let name = self.name_postfix("slice");
        let name = name.as_deref();
        match &self.inner.backing {
            Backing::Descriptor => Self::descriptor(self.dtype(), dims, name),
            Backing::Generator {
                mean, stddev, seed, ..
            } => Self::normal(self.dtype(), dims, *mean, *stddev, *seed, name),
            Backing::Storage { storage, layout } => {
                if offset.len() > self.rank() {
                    bail!(
                        "slice offset {:?} has more axes than {}",
                        offset,
                        self.shape()
                    );
                }
                Self::from_storage(storage.clone(), layout.slice(offset, dims), name)
            }
        }
    }

    // Element-order operations
    //
    // These walk both tensors in canonical order, so the two shapes may
    // differ as long as the element counts agree.

    /// Copy every element of `src` into `self`.
    ///
    /// Copying from a descriptor does nothing, copying from an abstract
    /// tensor materializes fresh samples.
    pub fn copy_from(&self, src: &Tensor) -> Result<()> {
        if src.elem_count() != self.elem_count() {
            return Err(Error::ElementCountMismatch {
                expected: self.elem_count(),
                got: src.elem_count(),
            });
        }
        let (Some(mut s), Some(mut d)) = (src.access(), self.access()) else {
            return Ok(());
        };
        for (cs, cd) in src.shape().coords().zip(self.shape().coords()) {
            let v = s.get(&cs);
            d.set(&cd, v);
        }
        Ok(())
    }

    /// Sum of squared differences against `other`.
    ///
    /// 0 when neither side has data, infinity when only one does.
    pub fn sse(&self, other: &Tensor) -> Result<f64> {
        if other.elem_count() != self.elem_count() {
            return Err(Error::ElementCountMismatch {
                expected: self.elem_count(),
                got: other.elem_count(),
            });
        }
        let (mut a, mut b) = match (self.access(), other.access()) {
            (None, None) => return Ok(0.0),
            (Some(a), Some(b)) => (a, b),
            _ => return Ok(f64::INFINITY),
        };
        let mut r = 0.0;
        for (ca, cb) in self.shape().coords().zip(other.shape().coords()) {
            let v = a.get(&ca) - b.get(&cb);
            r += v * v;
        }
        Ok(r)
    }

    /// Min, max, mean and population standard deviation of the elements.
    pub fn stats(&self) -> Option<Stats> {
        let values = self.to_f64_vec()?;
        if values.is_empty() {
            return None;
        }
        let n = values.len() as f64;
        let (mut min, mut max, mut sum) = (f64::INFINITY, f64::NEG_INFINITY, 0.0);
        for &v in &values {
            min = min.min(v);
            max = max.max(v);
            sum += v;
        }
        let mean = sum / n;
        let sum2: f64 = values.iter().map(|v| (v - mean) * (v - mean)).sum();
        Some(Stats {
            min,
            max,
            mean,
            stddev: (sum2 / n).sqrt(),
        })
    }

    /// All elements in canonical order. `None` for a descriptor.
    pub fn to_f64_vec(&self) -> Option<Vec<f64>> {
        let mut ta = self.access()?;
        Some(self.shape().coords().map(|c| ta.get(&c)).collect())
    }

    /// Dense copy with packed C-order strides, same type and shape.
    pub fn contiguous_copy(&self) -> Result<Tensor> {
        if self.access().is_none() {
            bail!("{} has no data to copy", self);
        }
        let copy = Tensor::new(self.dtype(), self.shape().clone(), None)?;
        copy.copy_from(self)?;
        Ok(copy)
    }
}

/// Summary statistics over a tensor's elements.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub stddev: f64,
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{min:{:.6} mean:{:.6} max:{:.6} stddev:{:.6}}}",
            self.min, self.mean, self.max, self.stddev
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iota(dims: &[usize]) -> Tensor {
        let n: usize = dims.iter().product();
        let data: Vec<f32> = (0..n).map(|i| i as f32).collect();
        Tensor::from_slice(&data, dims, None).unwrap()
    }

    #[test]
    fn test_new_is_zeroed_and_contiguous() {
        let t = Tensor::new(DType::F32, (2, 3), Some("t")).unwrap();
        assert_eq!(t.elem_count(), 6);
        assert_eq!(t.layout().unwrap().strides(), &[3, 1]);
        assert_eq!(t.to_f64_vec().unwrap(), vec![0.0; 6]);
    }

    #[test]
    fn test_rank_limit() {
        let dims = vec![1usize; 9];
        assert!(matches!(
            Tensor::new(DType::F32, dims, None),
            Err(Error::RankTooHigh { rank: 9, .. })
        ));
        assert!(Tensor::new(DType::F32, vec![1usize; 8], None).is_ok());
    }

    #[test]
    fn test_oversized_dimensions_are_rejected() {
        let huge = vec![usize::MAX, 2];
        assert!(matches!(
            Tensor::new(DType::F32, huge.clone(), None),
            Err(Error::DimensionsTooLarge(_))
        ));
        assert!(matches!(
            Tensor::descriptor(DType::F32, huge, None),
            Err(Error::DimensionsTooLarge(_))
        ));
        // element count fits, byte count does not
        assert!(matches!(
            Tensor::new(DType::F32, usize::MAX / 2, None),
            Err(Error::DimensionsTooLarge(_))
        ));
        assert!(matches!(
            Tensor::with_strides(DType::U8, (2, 2), vec![usize::MAX, 1], None),
            Err(Error::DimensionsTooLarge(_))
        ));
    }

    #[test]
    fn test_clone_keeps_identity() {
        let a = Tensor::new(DType::U8, 4, None).unwrap();
        let b = a.clone();
        let c = Tensor::new(DType::U8, 4, None).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_slice_aliases_parent() {
        let parent = iota(&[4, 6]);
        let s = parent.slice(&[1, 2], (2, 3)).unwrap();
        assert!(s.storage().unwrap().ptr_eq(parent.storage().unwrap()));
        assert_eq!(s.to_f64_vec().unwrap(), vec![8.0, 9.0, 10.0, 14.0, 15.0, 16.0]);

        s.access().unwrap().set(&[1, 1], -1.0);
        assert_eq!(parent.access().unwrap().get(&[2, 3]), -1.0);

        parent.access().unwrap().set(&[1, 4], 42.0);
        assert_eq!(s.access().unwrap().get(&[0, 2]), 42.0);
    }

    #[test]
    fn test_slice_outlives_parent() {
        let parent = iota(&[2, 2]);
        let s = parent.slice(&[1], (1, 2)).unwrap();
        drop(parent);
        assert_eq!(s.to_f64_vec().unwrap(), vec![2.0, 3.0]);
    }

    #[test]
    fn test_slice_out_of_storage_fails() {
        let parent = iota(&[2, 2]);
        assert!(parent.slice(&[1, 1], (2, 2)).is_err());
    }

    #[test]
    fn test_slice_name() {
        let t = Tensor::new(DType::F32, 4, Some("w")).unwrap();
        let s = t.slice(&[1], 2).unwrap();
        assert_eq!(s.name(), Some("w.slice"));
    }

    #[test]
    fn test_padded_strides() {
        let t = Tensor::with_strides(DType::F32, (2, 3), vec![4, 1], None).unwrap();
        assert_eq!(t.storage().unwrap().elem_capacity(), 7);
        let src = iota(&[6]);
        t.copy_from(&src).unwrap();
        assert_eq!(t.storage().unwrap().get(0, 4), 3.0);
        assert_eq!(t.contiguous_copy().unwrap().to_f64_vec(), src.to_f64_vec());
    }

    #[test]
    fn test_double_buffer_flip() {
        let t = Tensor::with_buffers(DType::F32, 3, 2, None).unwrap();
        let TensorAccess::Storage(before) = t.access().unwrap() else {
            panic!("expected storage view");
        };
        before.set(&[1], 5.0);
        t.flip();
        let TensorAccess::Storage(after) = t.access().unwrap() else {
            panic!("expected storage view");
        };
        assert_ne!(before.buffer(), after.buffer());
        assert_eq!(after.get(&[1]), 0.0);
        assert_eq!(t.access_buffer(-1).unwrap().get(&[1]), 5.0);
    }

    #[test]
    fn test_descriptor_has_no_view() {
        let t = Tensor::descriptor(DType::F32, (1, 8), Some("y")).unwrap();
        assert!(t.access().is_none());
        assert!(t.stats().is_none());
        assert!(t.contiguous_copy().is_err());
    }

    #[test]
    fn test_abstract_tensor() {
        let t = Tensor::normal(DType::F32, (4, 4), 0.0, 1.0, 3, Some("w")).unwrap();
        assert!(t.is_abstract());
        assert!(t.storage().is_none());
        let mut ta = t.access().unwrap();
        assert!(ta.is_generator());
        let a = ta.get(&[0, 0]);
        let b = ta.get(&[0, 0]);
        assert_ne!(a, b);
        // A fresh view restarts from the seed.
        assert_eq!(t.access().unwrap().get(&[0, 0]), a);

        let s = t.slice(&[1, 1], (2, 2)).unwrap();
        assert!(s.is_abstract());
        assert_eq!(s.initializer(), Some((0.0, 1.0)));
    }

    #[test]
    fn test_negative_stddev_rejected() {
        assert!(Tensor::normal(DType::F32, 2, 0.0, -1.0, 0, None).is_err());
    }

    #[test]
    fn test_copy_across_shapes_and_types() {
        let src = iota(&[2, 3]);
        let dst = Tensor::new(DType::F16, (3, 2), None).unwrap();
        dst.copy_from(&src).unwrap();
        assert_eq!(dst.to_f64_vec().unwrap(), vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(dst.sse(&src).unwrap(), 0.0);

        let wrong = Tensor::new(DType::F32, 5, None).unwrap();
        assert!(dst.copy_from(&wrong).is_err());
    }

    #[test]
    fn test_sse() {
        let a = Tensor::from_slice(&[1.0f32, 2.0, 3.0], 3, None).unwrap();
        let b = Tensor::from_slice(&[1.0f32, 0.0, 5.0], 3, None).unwrap();
        assert_eq!(a.sse(&b).unwrap(), 8.0);

        let d1 = Tensor::descriptor(DType::F32, 3, None).unwrap();
        let d2 = Tensor::descriptor(DType::F32, 3, None).unwrap();
        assert_eq!(d1.sse(&d2).unwrap(), 0.0);
        assert_eq!(a.sse(&d1).unwrap(), f64::INFINITY);
    }

    #[test]
    fn test_stats() {
        let t = Tensor::from_slice(&[2.0f32, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0], 8, None).unwrap();
        let s = t.stats().unwrap();
        assert_eq!(s.min, 2.0);
        assert_eq!(s.max, 9.0);
        assert_eq!(s.mean, 5.0);
        assert_eq!(s.stddev, 2.0);
        assert_eq!(
            s.to_string(),
            "{min:2.000000 mean:5.000000 max:9.000000 stddev:2.000000}"
        );
    }

    #[test]
    fn test_display() {
        let t = Tensor::new(DType::F32, (1, 2), Some("x")).unwrap();
        assert_eq!(t.to_string(), "\"x\"<f32>[1, 2]{2, 1}");
        let g = Tensor::normal(DType::F16, 3, 0.0, 0.5, 0, None).unwrap();
        assert_eq!(g.to_string(), "<f16>[3](mean:0, stddev:0.5)");
        let d = Tensor::descriptor(DType::I32, 2, None).unwrap();
        assert_eq!(d.to_string(), "<i32>[2]");
    }
}
