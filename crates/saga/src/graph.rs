use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use saga_core::{Error, Result, Tensor, Tensors};

use crate::attributes::Attributes;
use crate::config::GraphConfig;
use crate::node::{Node, NodeKind, NodeTensors};
use crate::tensor_file::{load_tensor, save_tensor};

// Graph — Append-only list of nodes plus the named-tensor registry
//
// add_node() builds a node, lets it create missing parameters through the
// registry, runs shape inference and appends it. The returned tensor is the
// node's "y" output, ready to be passed as an input to the next node.
//
// Nothing is stored about edges. Everything structural is derived on demand
// from the node role maps:
//
//   input_tensors()   — read by some node, produced by none
//   output_tensors()  — produced by some node, read by none
//   tensor_mappings() — tensor → [(role, node)] for reads and for writes
//
// A tensor may be read by many nodes, and the derivation does not assume a
// single producer either.
//
// DIRECTORY I/O:
//
//   load_tensors(dir) registers every regular file not starting with '.'
//   under its file name. save_tensors(dir) writes every registered tensor
//   to dir/<name>, optionally swapping each for its realized counterpart
//   via a TensorResolver first.

/// Tensor → every (role, node) touching it.
pub type TensorMapping = HashMap<Tensor, Vec<(String, Arc<Node>)>>;

/// Maps a graph tensor to the tensor whose data should be saved for it,
/// e.g. the materialized buffer a backend allocated for a parameter.
pub trait TensorResolver {
    fn resolve_tensor(&self, tensor: &Tensor) -> Tensor;
}

impl<F> TensorResolver for F
where
    F: Fn(&Tensor) -> Tensor,
{
    fn resolve_tensor(&self, tensor: &Tensor) -> Tensor {
        self(tensor)
    }
}

/// A computation graph.
#[derive(Debug, Default)]
pub struct Graph {
    nodes: Vec<Arc<Node>>,
    tensors: Tensors,
    config: GraphConfig,
}

impl Graph {
    pub fn new() -> Self {
        Self::with_config(GraphConfig::default())
    }

    pub fn with_config(config: GraphConfig) -> Self {
        let tensors = match config.init_seed {
            Some(seed) => Tensors::with_seed(seed),
            None => Tensors::new(),
        };
        Graph {
            nodes: Vec::new(),
            tensors,
            config,
        }
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> &[Arc<Node>] {
        &self.nodes
    }

    pub fn tensors(&self) -> &Tensors {
        &self.tensors
    }

    pub fn tensors_mut(&mut self) -> &mut Tensors {
        &mut self.tensors
    }

    // Construction

    /// Append a node and return its "y" output.
    pub fn try_add_node<I, K>(
        &mut self,
        kind: NodeKind,
        inputs: I,
        attributes: Attributes,
        name: Option<&str>,
    ) -> Result<Tensor>
    where
        I: IntoIterator<Item = (K, Tensor)>,
        K: Into<String>,
    {
        let inputs: NodeTensors = inputs.into_iter().map(|(k, t)| (k.into(), t)).collect();
        let mut node = Node::new(kind, inputs, attributes, name);
        node.create_parameters(&mut self.tensors, self.config.default_dtype)?;
        let y = node.infer_output()?;
        node.set_output("y", y.clone());
        log::debug!("added {}", node);
        self.nodes.push(Arc::new(node));
        Ok(y)
    }

    /// Like [`Graph::try_add_node`], treating a failure as a broken graph
    /// definition.
    ///
    /// # Panics
    /// If the node's parameters clash with the registry or its output shape
    /// can't be computed.
    pub fn add_node<I, K>(
        &mut self,
        kind: NodeKind,
        inputs: I,
        attributes: Attributes,
        name: Option<&str>,
    ) -> Tensor
    where
        I: IntoIterator<Item = (K, Tensor)>,
        K: Into<String>,
    {
        match self.try_add_node(kind, inputs, attributes, name) {
            Ok(y) => y,
            Err(e) => panic!("{} node {:?}: {}", kind, name, e),
        }
    }

    /// Append a node whose inputs are produced lazily by `loader`, which is
    /// handed the registry.
    pub fn add_node_with_loader<F>(
        &mut self,
        kind: NodeKind,
        loader: F,
        attributes: Attributes,
        name: Option<&str>,
    ) -> Result<Tensor>
    where
        F: FnOnce(&mut Tensors) -> Result<NodeTensors>,
    {
        let inputs = loader(&mut self.tensors)?;
        self.try_add_node(kind, inputs, attributes, name)
    }

    // Derived structure

    /// Tensors read by some node and produced by none.
    pub fn input_tensors(&self) -> HashSet<Tensor> {
        let mut set: HashSet<Tensor> = self
            .nodes
            .iter()
            .flat_map(|n| n.inputs().values().cloned())
            .collect();
        for n in &self.nodes {
            for t in n.outputs().values() {
                set.remove(t);
            }
        }
        set
    }

    /// Tensors produced by some node and read by none.
    pub fn output_tensors(&self) -> HashSet<Tensor> {
        let mut set: HashSet<Tensor> = self
            .nodes
            .iter()
            .flat_map(|n| n.outputs().values().cloned())
            .collect();
        for n in &self.nodes {
            for t in n.inputs().values() {
                set.remove(t);
            }
        }
        set
    }

    /// `(input_usage, output_usage)`.
    pub fn tensor_mappings(&self) -> (TensorMapping, TensorMapping) {
        let mut input_usage = TensorMapping::new();
        let mut output_usage = TensorMapping::new();
        for n in &self.nodes {
            for (role, t) in n.inputs() {
                input_usage
                    .entry(t.clone())
                    .or_default()
                    .push((role.clone(), Arc::clone(n)));
            }
            for (role, t) in n.outputs() {
                output_usage
                    .entry(t.clone())
                    .or_default()
                    .push((role.clone(), Arc::clone(n)));
            }
        }
        (input_usage, output_usage)
    }

    // Directory I/O

    /// Register every tensor file in `dir` under its file name.
    ///
    /// Files whose name starts with '.' are skipped. Files that fail to load
    /// are logged and skipped. Returns how many tensors were loaded.
    pub fn load_tensors(&mut self, dir: impl AsRef<Path>) -> Result<usize> {
        let dir = dir.as_ref();
        let entries = fs::read_dir(dir).map_err(|e| {
            log::error!("Unable to load tensors from {}: {}", dir.display(), e);
            Error::io(dir, e)
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Error::io(dir, e))?;
            let path = entry.path();
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                log::warn!("Skipping non UTF-8 file name {}", path.display());
                continue;
            };
            if name.starts_with('.') {
                log::debug!("Skipping {}", path.display());
                continue;
            }
            if !path.is_file() {
                log::debug!("Skipping non-regular {}", path.display());
                continue;
            }
            paths.push((name, path));
        }
        paths.sort();

        let mut loaded = 0;
        for (name, path) in paths {
            match load_tensor(&path, Some(&name)) {
                Ok(t) => {
                    log::info!("Loaded {}: {}", name, t);
                    self.tensors.insert(name, t);
                    loaded += 1;
                }
                Err(_) => log::warn!("Skipping {}", path.display()),
            }
        }
        Ok(loaded)
    }

    /// Write every registered tensor to `dir/<name>`, creating `dir`.
    /// Stops at the first failure.
    pub fn save_tensors(
        &self,
        dir: impl AsRef<Path>,
        resolver: Option<&dyn TensorResolver>,
    ) -> Result<()> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|e| {
            log::error!("Unable to create {}: {}", dir.display(), e);
            Error::io(dir, e)
        })?;

        let mut names: Vec<&String> = self.tensors.iter().map(|(name, _)| name).collect();
        names.sort();
        for name in names {
            let Some(t) = self.tensors.get(name) else {
                continue;
            };
            let t = match resolver {
                Some(r) => r.resolve_tensor(t),
                None => t.clone(),
            };
            log::info!("Saving tensor {} : {}", name, t);
            save_tensor(&t, dir.join(name))?;
        }
        Ok(())
    }
}
