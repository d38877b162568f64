use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use saga_core::{bail, DType, Error, Result, Shape, Tensor, Tensors};

use crate::attributes::Attributes;

// Node — One operation in a graph
//
// A node is a kind tag, an optional name, an attribute bag and two role
// maps: named inputs ("x", "w", "b", "x0", ...) and named outputs. The only
// output produced here is "y", computed by shape inference as a pure
// function of the inputs and attributes. The result is a descriptor tensor
// (shape and type, no memory) that a backend materializes later.
//
// SHAPE RULES (NCHW):
//
//   conv      out = 1 + (in + 2*pad - ((k - 1)*dilation + 1)) / stride
//             batch from x, channels from w.dims[0]
//   pool      out = 1 + (in + 2*pad - size) / stride
//             batch and channels from x
//   fc        [batch, w.dims[0]], type of w
//   reshape   dims read from the 1-D "shape" input, one -1 is inferred
//   concat    x0..xN joined along `axis`
//   sum       like x0
//   others    like x
//
// A result that would be negative, or a zero stride, is a shape-inference
// error rather than a wrapped-around dimension.
//
// PARAMETERS:
//
//   Conv, Fc and BatchNorm can create their own weights through the tensor
//   registry when they are not passed in. See `Node::create_parameters`.

/// Role → tensor map of a node.
pub type NodeTensors = BTreeMap<String, Tensor>;

/// The closed set of operations a graph can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Conv,
    Fc,
    MaxPool,
    AvgPool,
    Reshape,
    BatchNorm,
    Softmax,
    Relu,
    Dropout,
    Sum,
    Concat,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Conv => "conv",
            NodeKind::Fc => "fc",
            NodeKind::MaxPool => "maxpool",
            NodeKind::AvgPool => "avgpool",
            NodeKind::Reshape => "reshape",
            NodeKind::BatchNorm => "batchnorm",
            NodeKind::Softmax => "softmax",
            NodeKind::Relu => "relu",
            NodeKind::Dropout => "dropout",
            NodeKind::Sum => "sum",
            NodeKind::Concat => "concat",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "conv" => NodeKind::Conv,
            "fc" => NodeKind::Fc,
            "maxpool" => NodeKind::MaxPool,
            "avgpool" => NodeKind::AvgPool,
            "reshape" => NodeKind::Reshape,
            "batchnorm" => NodeKind::BatchNorm,
            "softmax" => NodeKind::Softmax,
            "relu" => NodeKind::Relu,
            "dropout" => NodeKind::Dropout,
            "sum" => NodeKind::Sum,
            "concat" => NodeKind::Concat,
            other => bail!("unknown node kind '{other}'"),
        })
    }
}

/// A graph node.
#[derive(Debug, Clone)]
pub struct Node {
    kind: NodeKind,
    name: Option<String>,
    attributes: Attributes,
    inputs: NodeTensors,
    outputs: NodeTensors,
}

impl Node {
    /// A node with no outputs yet.
    pub fn new(
        kind: NodeKind,
        inputs: NodeTensors,
        attributes: Attributes,
        name: Option<&str>,
    ) -> Self {
        Node {
            kind,
            name: name.map(str::to_string),
            attributes,
            inputs,
            outputs: NodeTensors::new(),
        }
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn inputs(&self) -> &NodeTensors {
        &self.inputs
    }

    pub fn outputs(&self) -> &NodeTensors {
        &self.outputs
    }

    pub fn input(&self, role: &str) -> Option<&Tensor> {
        self.inputs.get(role)
    }

    pub fn output(&self, role: &str) -> Option<&Tensor> {
        self.outputs.get(role)
    }

    pub(crate) fn set_output(&mut self, role: &str, tensor: Tensor) {
        self.outputs.insert(role.to_string(), tensor);
    }

    fn fail(&self, reason: impl Into<String>) -> Error {
        Error::ShapeInference {
            kind: self.kind.to_string(),
            reason: reason.into(),
        }
    }

    fn require(&self, role: &str) -> Result<&Tensor> {
        self.input(role)
            .ok_or_else(|| self.fail(format!("missing input '{role}'")))
    }

    fn require_rank(&self, role: &str, rank: usize) -> Result<&Tensor> {
        let t = self.require(role)?;
        if t.rank() != rank {
            return Err(self.fail(format!(
                "input '{role}' {} must have rank {rank}",
                t.shape()
            )));
        }
        Ok(t)
    }

    /// `x0`, `x1`, ... up to the first missing index.
    fn numbered_inputs(&self, prefix: &str) -> Vec<&Tensor> {
        (0..)
            .map_while(|i| self.inputs.get(&format!("{prefix}{i}")))
            .collect()
    }

    // Shape inference

    /// Compute the "y" output of this node as a descriptor tensor named
    /// `"{node}.y"`.
    pub fn infer_output(&self) -> Result<Tensor> {
        let (dtype, dims) = match self.kind {
            NodeKind::Conv => self.infer_conv()?,
            NodeKind::MaxPool | NodeKind::AvgPool => self.infer_pool()?,
            NodeKind::Fc => self.infer_fc()?,
            NodeKind::Reshape => self.infer_reshape()?,
            NodeKind::Concat => self.infer_concat()?,
            NodeKind::BatchNorm | NodeKind::Softmax | NodeKind::Relu | NodeKind::Dropout => {
                let x = self.require("x")?;
                (x.dtype(), x.dims().to_vec())
            }
            NodeKind::Sum => {
                let x0 = self.require("x0")?;
                (x0.dtype(), x0.dims().to_vec())
            }
        };
        let name = self.name.as_ref().map(|n| format!("{n}.y"));
        Tensor::descriptor(dtype, dims, name.as_deref())
    }

    /// One spatial axis of a windowed operation.
    fn window_out(&self, input: usize, window: i64, pad: i64, stride: i64) -> Result<usize> {
        if stride <= 0 {
            return Err(self.fail(format!("stride must be positive, got {stride}")));
        }
        let span = input as i64 + 2 * pad - window;
        if span < 0 {
            return Err(self.fail(format!(
                "window {window} larger than padded input {}",
                input as i64 + 2 * pad
            )));
        }
        Ok((1 + span / stride) as usize)
    }

    fn infer_conv(&self) -> Result<(DType, Vec<usize>)> {
        let stride = self.attributes.get("stride", 1i32) as i64;
        let pad = self.attributes.get("pad", 1i32) as i64;
        let dilation = self.attributes.get("dilation", 1i32) as i64;
        if dilation <= 0 {
            return Err(self.fail(format!("dilation must be positive, got {dilation}")));
        }
        let x = self.require_rank("x", 4)?;
        let w = self.require_rank("w", 4)?;

        let mut dims = vec![x.dims()[0], w.dims()[0]];
        for axis in 2..4 {
            let k = w.dims()[axis] as i64;
            let window = (k - 1) * dilation + 1;
            dims.push(self.window_out(x.dims()[axis], window, pad, stride)?);
        }
        Ok((x.dtype(), dims))
    }

    fn infer_pool(&self) -> Result<(DType, Vec<usize>)> {
        let size = self.attributes.get("size", 1i32) as i64;
        let pad = self.attributes.get("pad", 1i32) as i64;
        let stride = self.attributes.get("stride", 1i32) as i64;
        let x = self.require_rank("x", 4)?;

        let mut dims = vec![x.dims()[0], x.dims()[1]];
        for axis in 2..4 {
            dims.push(self.window_out(x.dims()[axis], size, pad, stride)?);
        }
        Ok((x.dtype(), dims))
    }

    fn infer_fc(&self) -> Result<(DType, Vec<usize>)> {
        let w = self.require("w")?;
        if w.rank() == 0 {
            return Err(self.fail("weight 'w' is a scalar"));
        }
        let batch = self.input("x").and_then(|x| x.dims().first().copied()).unwrap_or(1);
        Ok((w.dtype(), vec![batch, w.dims()[0]]))
    }

    fn infer_reshape(&self) -> Result<(DType, Vec<usize>)> {
        let x = self.require("x")?;
        let shape = self.require_rank("shape", 1)?;
        let values = shape
            .to_f64_vec()
            .ok_or_else(|| self.fail("'shape' input holds no data"))?;

        let mut dims = Vec::with_capacity(values.len());
        let mut inferred = None;
        for (i, v) in values.iter().enumerate() {
            match *v as i64 {
                -1 if inferred.is_none() => {
                    inferred = Some(i);
                    dims.push(1);
                }
                d if d >= 0 => dims.push(d as usize),
                d => return Err(self.fail(format!("invalid dimension {d} in 'shape'"))),
            }
        }
        let product = |dims: &[usize]| {
            dims.iter()
                .try_fold(1usize, |acc, &d| acc.checked_mul(d))
                .ok_or_else(|| self.fail(format!("target shape {values:?} overflows")))
        };
        if let Some(i) = inferred {
            let known = product(&dims)?;
            if known == 0 || x.elem_count() % known != 0 {
                return Err(self.fail(format!(
                    "can't infer dimension {i} of {:?} for {} elements",
                    values,
                    x.elem_count()
                )));
            }
            dims[i] = x.elem_count() / known;
        }
        let count = product(&dims)?;
        if count != x.elem_count() {
            return Err(self.fail(format!(
                "{} holds {} elements, target {} holds {count}",
                x.shape(),
                x.elem_count(),
                Shape::from(dims.clone())
            )));
        }
        Ok((x.dtype(), dims))
    }

    fn infer_concat(&self) -> Result<(DType, Vec<usize>)> {
        let parts = self.numbered_inputs("x");
        let first = *parts
            .first()
            .ok_or_else(|| self.fail("missing input 'x0'"))?;
        let axis = self.attributes.get("axis", 1i32);
        if axis < 0 || axis as usize >= first.rank() {
            return Err(self.fail(format!("axis {axis} out of range for {}", first.shape())));
        }
        let axis = axis as usize;

        let mut dims = first.dims().to_vec();
        for part in &parts[1..] {
            let compatible = part.rank() == first.rank()
                && part
                    .dims()
                    .iter()
                    .zip(first.dims())
                    .enumerate()
                    .all(|(i, (a, b))| i == axis || a == b);
            if !compatible {
                return Err(self.fail(format!(
                    "{} can't be joined with {} along axis {axis}",
                    part.shape(),
                    first.shape()
                )));
            }
            dims[axis] = dims[axis]
                .checked_add(part.dims()[axis])
                .ok_or_else(|| self.fail(format!("axis {axis} overflows")))?;
        }
        Ok((first.dtype(), dims))
    }

    // Parameter creation

    /// Fill in missing weight inputs through the registry.
    ///
    /// - conv: `w` `[activations, C, size, size]` when `activations` and
    ///   `size` are set, plus `b` `[activations]` when `bias` is true
    /// - fc: `w` `[outputs, features]` when `outputs` is set, plus `b`
    ///   `[outputs]` when `bias` is true
    /// - batchnorm: `s`, `b`, `m`, `v`, each `[C]`
    ///
    /// Weights are drawn from N(0, sqrt(2 / fan_in)); biases and the
    /// normalization statistics are constant. Parameters are registered as
    /// `"{node}.{role}"`; an unnamed node gets unregistered ones.
    pub fn create_parameters(&mut self, tensors: &mut Tensors, default_dtype: DType) -> Result<()> {
        match self.kind {
            NodeKind::Conv => self.create_conv_parameters(tensors, default_dtype),
            NodeKind::Fc => self.create_fc_parameters(tensors, default_dtype),
            NodeKind::BatchNorm => self.create_batchnorm_parameters(tensors, default_dtype),
            _ => Ok(()),
        }
    }

    fn parameter_dtype(x: &Tensor, default_dtype: DType) -> DType {
        if x.dtype().is_float() {
            x.dtype()
        } else {
            default_dtype
        }
    }

    fn add_parameter(
        &mut self,
        tensors: &mut Tensors,
        role: &str,
        dtype: DType,
        dims: Vec<usize>,
        mean: f64,
        stddev: f64,
    ) -> Result<()> {
        if self.inputs.contains_key(role) {
            return Ok(());
        }
        let name = self.name.as_ref().map(|n| format!("{n}.{role}"));
        let t = tensors.try_find(dtype, dims, mean, stddev, name.as_deref())?;
        log::debug!("{}: parameter {} = {}", self.kind, role, t);
        self.inputs.insert(role.to_string(), t);
        Ok(())
    }

    fn create_conv_parameters(&mut self, tensors: &mut Tensors, default_dtype: DType) -> Result<()> {
        let activations = self.attributes.try_get::<i32>("activations");
        let size = self.attributes.try_get::<i32>("size");
        let (Some(activations), Some(size)) = (activations, size) else {
            return Ok(());
        };
        if activations <= 0 || size <= 0 {
            return Err(self.fail(format!("invalid activations {activations} / size {size}")));
        }
        let x = self.require_rank("x", 4)?.clone();
        let dtype = Self::parameter_dtype(&x, default_dtype);
        let (activations, size) = (activations as usize, size as usize);
        let channels = x.dims()[1];
        let fan_in = (channels * size * size).max(1) as f64;

        self.add_parameter(
            tensors,
            "w",
            dtype,
            vec![activations, channels, size, size],
            0.0,
            (2.0 / fan_in).sqrt(),
        )?;
        if self.attributes.get("bias", false) {
            self.add_parameter(tensors, "b", dtype, vec![activations], 0.0, 0.0)?;
        }
        Ok(())
    }

    fn create_fc_parameters(&mut self, tensors: &mut Tensors, default_dtype: DType) -> Result<()> {
        let Some(outputs) = self.attributes.try_get::<i32>("outputs") else {
            return Ok(());
        };
        if outputs <= 0 {
            return Err(self.fail(format!("invalid outputs {outputs}")));
        }
        let x = self.require("x")?.clone();
        let dtype = Self::parameter_dtype(&x, default_dtype);
        let outputs = outputs as usize;
        let batch = x.dims().first().copied().unwrap_or(1).max(1);
        let features = x.elem_count() / batch;

        self.add_parameter(
            tensors,
            "w",
            dtype,
            vec![outputs, features],
            0.0,
            (2.0 / features.max(1) as f64).sqrt(),
        )?;
        if self.attributes.get("bias", false) {
            self.add_parameter(tensors, "b", dtype, vec![outputs], 0.0, 0.0)?;
        }
        Ok(())
    }

    fn create_batchnorm_parameters(
        &mut self,
        tensors: &mut Tensors,
        default_dtype: DType,
    ) -> Result<()> {
        let x = self.require("x")?.clone();
        let Some(&channels) = x.dims().get(1) else {
            return Err(self.fail(format!("input 'x' {} has no channel axis", x.shape())));
        };
        let dtype = Self::parameter_dtype(&x, default_dtype);
        for (role, mean) in [("s", 1.0), ("b", 0.0), ("m", 0.0), ("v", 0.0)] {
            self.add_parameter(tensors, role, dtype, vec![channels], mean, 0.0)?;
        }
        Ok(())
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(name) = &self.name {
            write!(f, " {}", name)?;
        }
        for (role, t) in &self.inputs {
            write!(f, "\n\t Input: {}: {}", role, t)?;
        }
        for (key, value) in self.attributes.iter() {
            write!(f, "\n\t Attrib: {}: {}", key, value)?;
        }
        for (role, t) in &self.outputs {
            write!(f, "\n\tOutput: {}: {}", role, t)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(pairs: &[(&str, &Tensor)]) -> NodeTensors {
        pairs
            .iter()
            .map(|(k, t)| (k.to_string(), (*t).clone()))
            .collect()
    }

    fn desc(dims: &[usize]) -> Tensor {
        Tensor::descriptor(DType::F32, dims, None).unwrap()
    }

    #[test]
    fn test_kind_names_round_trip() {
        for name in [
            "conv", "fc", "maxpool", "avgpool", "reshape", "batchnorm", "softmax", "relu",
            "dropout", "sum", "concat",
        ] {
            let kind: NodeKind = name.parse().unwrap();
            assert_eq!(kind.to_string(), name);
        }
        assert!(matches!("lstm".parse::<NodeKind>(), Err(Error::Msg(_))));
    }

    #[test]
    fn test_conv_shape() {
        let x = desc(&[1, 3, 28, 28]);
        let w = desc(&[8, 3, 5, 5]);
        let attrs = Attributes::new().with("stride", 1).with("pad", 0);
        let n = Node::new(NodeKind::Conv, inputs(&[("x", &x), ("w", &w)]), attrs, Some("c1"));
        let y = n.infer_output().unwrap();
        assert_eq!(y.dims(), &[1, 8, 24, 24]);
        assert_eq!(y.name(), Some("c1.y"));
        assert!(y.access().is_none());
    }

    #[test]
    fn test_conv_defaults_and_dilation() {
        let x = desc(&[2, 3, 10, 10]);
        let w = desc(&[4, 3, 3, 3]);
        // pad 1, stride 1: same size
        let n = Node::new(
            NodeKind::Conv,
            inputs(&[("x", &x), ("w", &w)]),
            Attributes::new(),
            None,
        );
        assert_eq!(n.infer_output().unwrap().dims(), &[2, 4, 10, 10]);

        // effective kernel 5 with dilation 2
        let n = Node::new(
            NodeKind::Conv,
            inputs(&[("x", &x), ("w", &w)]),
            Attributes::new().with("dilation", 2).with("pad", 0).with("stride", 2),
            None,
        );
        assert_eq!(n.infer_output().unwrap().dims(), &[2, 4, 3, 3]);
    }

    #[test]
    fn test_conv_failures() {
        let x = desc(&[1, 3, 4, 4]);
        let w = desc(&[8, 3, 7, 7]);
        let n = Node::new(
            NodeKind::Conv,
            inputs(&[("x", &x), ("w", &w)]),
            Attributes::new().with("pad", 0),
            None,
        );
        assert!(matches!(n.infer_output(), Err(Error::ShapeInference { .. })));

        let w = desc(&[8, 3, 1, 1]);
        let n = Node::new(
            NodeKind::Conv,
            inputs(&[("x", &x), ("w", &w)]),
            Attributes::new().with("stride", 0),
            None,
        );
        assert!(n.infer_output().is_err());

        let n = Node::new(NodeKind::Conv, inputs(&[("x", &x)]), Attributes::new(), None);
        let err = n.infer_output().unwrap_err().to_string();
        assert!(err.contains("conv"));
        assert!(err.contains("'w'"));
    }

    #[test]
    fn test_pool_shape() {
        let x = desc(&[1, 16, 24, 24]);
        let n = Node::new(
            NodeKind::MaxPool,
            inputs(&[("x", &x)]),
            Attributes::new().with("size", 2).with("stride", 2).with("pad", 0),
            None,
        );
        assert_eq!(n.infer_output().unwrap().dims(), &[1, 16, 12, 12]);

        // defaults: size 1, pad 1, stride 1 grow by two
        let n = Node::new(NodeKind::AvgPool, inputs(&[("x", &x)]), Attributes::new(), None);
        assert_eq!(n.infer_output().unwrap().dims(), &[1, 16, 26, 26]);
    }

    #[test]
    fn test_passthrough_and_sum() {
        let x = Tensor::descriptor(DType::F16, (2, 5), None).unwrap();
        for kind in [NodeKind::Relu, NodeKind::Softmax, NodeKind::Dropout, NodeKind::BatchNorm] {
            let n = Node::new(kind, inputs(&[("x", &x)]), Attributes::new(), None);
            let y = n.infer_output().unwrap();
            assert_eq!(y.dims(), &[2, 5]);
            assert_eq!(y.dtype(), DType::F16);
        }
        let n = Node::new(NodeKind::Sum, inputs(&[("x0", &x), ("x1", &x)]), Attributes::new(), None);
        assert_eq!(n.infer_output().unwrap().dims(), &[2, 5]);

        let n = Node::new(NodeKind::Sum, inputs(&[("x", &x)]), Attributes::new(), None);
        assert!(n.infer_output().is_err());
    }

    #[test]
    fn test_reshape() {
        let x = desc(&[1, 16, 4, 4]);
        let shape = Tensor::from_slice(&[1i64, 256], 2, None).unwrap();
        let n = Node::new(
            NodeKind::Reshape,
            inputs(&[("x", &x), ("shape", &shape)]),
            Attributes::new(),
            None,
        );
        assert_eq!(n.infer_output().unwrap().dims(), &[1, 256]);

        let shape = Tensor::from_slice(&[-1i64, 16], 2, None).unwrap();
        let n = Node::new(
            NodeKind::Reshape,
            inputs(&[("x", &x), ("shape", &shape)]),
            Attributes::new(),
            None,
        );
        assert_eq!(n.infer_output().unwrap().dims(), &[16, 16]);

        let shape = Tensor::from_slice(&[1i64, 100], 2, None).unwrap();
        let n = Node::new(
            NodeKind::Reshape,
            inputs(&[("x", &x), ("shape", &shape)]),
            Attributes::new(),
            None,
        );
        assert!(n.infer_output().is_err());

        // 2^96 elements wrap to 0 in a plain product
        let empty = desc(&[0, 4]);
        let shape = Tensor::from_slice(&[4294967296i64; 3], 3, None).unwrap();
        let n = Node::new(
            NodeKind::Reshape,
            inputs(&[("x", &empty), ("shape", &shape)]),
            Attributes::new(),
            None,
        );
        assert!(matches!(n.infer_output(), Err(Error::ShapeInference { .. })));

        let shape = Tensor::from_slice(&[-1i64, 4294967296, 4294967296], 3, None).unwrap();
        let n = Node::new(
            NodeKind::Reshape,
            inputs(&[("x", &empty), ("shape", &shape)]),
            Attributes::new(),
            None,
        );
        assert!(matches!(n.infer_output(), Err(Error::ShapeInference { .. })));
    }

    #[test]
    fn test_fc_and_concat() {
        let x = desc(&[4, 256]);
        let w = Tensor::descriptor(DType::F16, (10, 256), None).unwrap();
        let n = Node::new(NodeKind::Fc, inputs(&[("x", &x), ("w", &w)]), Attributes::new(), None);
        let y = n.infer_output().unwrap();
        assert_eq!(y.dims(), &[4, 10]);
        assert_eq!(y.dtype(), DType::F16);

        let a = desc(&[1, 3, 8, 8]);
        let b = desc(&[1, 5, 8, 8]);
        let n = Node::new(
            NodeKind::Concat,
            inputs(&[("x0", &a), ("x1", &b)]),
            Attributes::new(),
            None,
        );
        assert_eq!(n.infer_output().unwrap().dims(), &[1, 8, 8, 8]);

        let c = desc(&[1, 5, 4, 8]);
        let n = Node::new(
            NodeKind::Concat,
            inputs(&[("x0", &a), ("x1", &c)]),
            Attributes::new(),
            None,
        );
        assert!(n.infer_output().is_err());

        let wide = desc(&[0, usize::MAX]);
        let one = desc(&[0, 1]);
        let n = Node::new(
            NodeKind::Concat,
            inputs(&[("x0", &wide), ("x1", &one)]),
            Attributes::new(),
            None,
        );
        assert!(matches!(n.infer_output(), Err(Error::ShapeInference { .. })));
    }

    #[test]
    fn test_conv_creates_parameters() {
        let x = desc(&[1, 3, 28, 28]);
        let mut tensors = Tensors::with_seed(0);
        let mut n = Node::new(
            NodeKind::Conv,
            inputs(&[("x", &x)]),
            Attributes::new()
                .with("activations", 8)
                .with("size", 5)
                .with("pad", 0)
                .with("bias", true),
            Some("c1"),
        );
        n.create_parameters(&mut tensors, DType::F32).unwrap();
        let w = n.input("w").unwrap();
        assert_eq!(w.dims(), &[8, 3, 5, 5]);
        assert_eq!(w.name(), Some("c1.w"));
        assert_eq!(n.input("b").unwrap().dims(), &[8]);
        assert_eq!(tensors.get("c1.w"), Some(w));
        assert_eq!(n.infer_output().unwrap().dims(), &[1, 8, 24, 24]);
    }

    #[test]
    fn test_explicit_weight_is_kept() {
        let x = desc(&[1, 3, 8, 8]);
        let w = desc(&[2, 3, 3, 3]);
        let mut tensors = Tensors::new();
        let mut n = Node::new(
            NodeKind::Conv,
            inputs(&[("x", &x), ("w", &w)]),
            Attributes::new().with("activations", 8).with("size", 5),
            Some("c"),
        );
        n.create_parameters(&mut tensors, DType::F32).unwrap();
        assert_eq!(n.input("w"), Some(&w));
        assert!(tensors.is_empty());
    }

    #[test]
    fn test_batchnorm_parameters() {
        let x = Tensor::descriptor(DType::U8, (1, 6, 4, 4), None).unwrap();
        let mut tensors = Tensors::new();
        let mut n = Node::new(NodeKind::BatchNorm, inputs(&[("x", &x)]), Attributes::new(), None);
        n.create_parameters(&mut tensors, DType::F16).unwrap();
        for role in ["s", "b", "m", "v"] {
            let p = n.input(role).unwrap();
            assert_eq!(p.dims(), &[6]);
            assert_eq!(p.dtype(), DType::F16);
        }
        assert_eq!(n.input("s").unwrap().initializer(), Some((1.0, 0.0)));
        // unnamed node: nothing registered
        assert!(tensors.is_empty());
    }
}
