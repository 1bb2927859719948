//! Models as seen by the factories: a set of named parameters

use crate::Tensor;

/// Anything exposing an enumerable set of parameters
///
/// Only parameters with `requires_grad() == true` are trainable; optimizers bind
/// to and update those alone.
pub trait Model {
    /// All parameters, in a stable order
    fn parameters(&self) -> &[Tensor];

    /// Mutable access to all parameters, same order as [`Model::parameters`]
    fn parameters_mut(&mut self) -> &mut [Tensor];

    /// Trainable parameters only
    fn trainable_parameters(&self) -> Vec<&Tensor> {
        self.parameters()
            .iter()
            .filter(|p| p.requires_grad())
            .collect()
    }

    /// Copy of every parameter's data, used for checkpoint snapshots
    fn snapshot(&self) -> Vec<Vec<f32>> {
        self.parameters().iter().map(|p| p.data().to_vec()).collect()
    }
}

/// Flat, named parameter collection
#[derive(Clone, Debug, Default)]
pub struct ParameterStore {
    names: Vec<String>,
    params: Vec<Tensor>,
}

impl ParameterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter under `name`
    pub fn with_parameter(mut self, name: impl Into<String>, tensor: Tensor) -> Self {
        self.insert(name, tensor);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, tensor: Tensor) {
        self.names.push(name.into());
        self.params.push(tensor);
    }

    pub fn get(&self, name: &str) -> Option<&Tensor> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| &self.params[i])
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

impl Model for ParameterStore {
    fn parameters(&self) -> &[Tensor] {
        &self.params
    }

    fn parameters_mut(&mut self) -> &mut [Tensor] {
        &mut self.params
    }
}
