// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Compartments
//!
//! A compartment is a named state slot owned by exactly one component. Its
//! value is unset, a scalar, a key, or a 2-D array. Once an array has been
//! stored, the slot's shape is fixed: later writes must match it, except
//! through [`CompartmentMap::reshape`], which is reserved for resets to a
//! different batch size.

use super::error::{NeuralError, Result};
use super::key::PrngKey;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Array type carried by every tensor compartment
pub type Tensor = Array2<f32>;

/// Value held by a compartment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum CompartmentValue {
    #[default]
    Empty,
    Scalar(f32),
    Tensor(Tensor),
    Key(PrngKey),
}

impl CompartmentValue {
    pub fn kind(&self) -> &'static str {
        match self {
            CompartmentValue::Empty => "empty",
            CompartmentValue::Scalar(_) => "scalar",
            CompartmentValue::Tensor(_) => "tensor",
            CompartmentValue::Key(_) => "key",
        }
    }

    pub fn shape(&self) -> Option<(usize, usize)> {
        match self {
            CompartmentValue::Tensor(t) => Some(t.dim()),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CompartmentValue::Empty)
    }
}

impl From<Tensor> for CompartmentValue {
    fn from(t: Tensor) -> Self {
        CompartmentValue::Tensor(t)
    }
}

impl From<PrngKey> for CompartmentValue {
    fn from(k: PrngKey) -> Self {
        CompartmentValue::Key(k)
    }
}

impl From<f32> for CompartmentValue {
    fn from(v: f32) -> Self {
        CompartmentValue::Scalar(v)
    }
}

/// A single named slot
#[derive(Debug, Clone)]
pub struct Compartment {
    name: String,
    value: CompartmentValue,
    shape: Option<(usize, usize)>,
}

impl Compartment {
    pub fn new(name: impl Into<String>, value: CompartmentValue) -> Self {
        let shape = value.shape();
        Self {
            name: name.into(),
            value,
            shape,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &CompartmentValue {
        &self.value
    }

    /// Fixed shape, once a tensor has been stored
    pub fn shape(&self) -> Option<(usize, usize)> {
        self.shape
    }
}

/// Ordered map of the compartments owned by one component
#[derive(Debug, Clone)]
pub struct CompartmentMap {
    owner: String,
    slots: Vec<Compartment>,
}

impl CompartmentMap {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            slots: Vec::new(),
        }
    }

    /// Declare a compartment with its initial value (construction time only)
    pub fn declare(&mut self, name: &str, value: impl Into<CompartmentValue>) -> &mut Self {
        let value = value.into();
        match self.slots.iter_mut().find(|c| c.name == name) {
            Some(slot) => *slot = Compartment::new(name, value),
            None => self.slots.push(Compartment::new(name, value)),
        }
        self
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn contains(&self, name: &str) -> bool {
        self.slots.iter().any(|c| c.name == name)
    }

    /// Names of every compartment, in declaration order
    pub fn list_compartments(&self) -> Vec<&str> {
        self.slots.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Compartment> {
        self.slots.iter()
    }

    fn slot(&self, name: &str) -> Result<&Compartment> {
        self.slots
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| self.unknown(name))
    }

    fn slot_mut(&mut self, name: &str) -> Result<&mut Compartment> {
        let owner = &self.owner;
        self.slots
            .iter_mut()
            .find(|c| c.name == name)
            .ok_or_else(|| NeuralError::UnknownCompartment {
                component: owner.clone(),
                compartment: name.to_string(),
            })
    }

    fn unknown(&self, name: &str) -> NeuralError {
        NeuralError::UnknownCompartment {
            component: self.owner.clone(),
            compartment: name.to_string(),
        }
    }

    pub fn get(&self, name: &str) -> Result<&CompartmentValue> {
        Ok(&self.slot(name)?.value)
    }

    pub fn shape(&self, name: &str) -> Result<Option<(usize, usize)>> {
        Ok(self.slot(name)?.shape)
    }

    /// Write a value, enforcing the slot's fixed shape
    pub fn set(&mut self, name: &str, value: impl Into<CompartmentValue>) -> Result<()> {
        let value = value.into();
        let owner = self.owner.clone();
        let slot = self.slot_mut(name)?;
        if let (Some(fixed), Some(actual)) = (slot.shape, value.shape()) {
            if fixed != actual {
                return Err(NeuralError::shape(format!("{}.{}", owner, name), fixed, actual));
            }
        }
        if slot.shape.is_none() {
            slot.shape = value.shape();
        }
        slot.value = value;
        Ok(())
    }

    /// Write a value and re-fix the slot's shape (resets only)
    pub fn reshape(&mut self, name: &str, value: impl Into<CompartmentValue>) -> Result<()> {
        let value = value.into();
        let slot = self.slot_mut(name)?;
        if let Some(shape) = value.shape() {
            slot.shape = Some(shape);
        }
        slot.value = value;
        Ok(())
    }

    pub fn tensor(&self, name: &str) -> Result<&Tensor> {
        match &self.slot(name)?.value {
            CompartmentValue::Tensor(t) => Ok(t),
            CompartmentValue::Empty => Err(NeuralError::UnsetCompartment {
                component: self.owner.clone(),
                compartment: name.to_string(),
            }),
            other => Err(NeuralError::CompartmentType {
                compartment: format!("{}.{}", self.owner, name),
                expected: "tensor",
                actual: other.kind(),
            }),
        }
    }

    /// Tensor value, or `None` when the slot is unset
    pub fn tensor_opt(&self, name: &str) -> Result<Option<&Tensor>> {
        match &self.slot(name)?.value {
            CompartmentValue::Empty => Ok(None),
            _ => self.tensor(name).map(Some),
        }
    }

    pub fn set_tensor(&mut self, name: &str, value: Tensor) -> Result<()> {
        self.set(name, CompartmentValue::Tensor(value))
    }

    pub fn key(&self, name: &str) -> Result<PrngKey> {
        match &self.slot(name)?.value {
            CompartmentValue::Key(k) => Ok(*k),
            CompartmentValue::Empty => Err(NeuralError::UnsetCompartment {
                component: self.owner.clone(),
                compartment: name.to_string(),
            }),
            other => Err(NeuralError::CompartmentType {
                compartment: format!("{}.{}", self.owner, name),
                expected: "key",
                actual: other.kind(),
            }),
        }
    }

    pub fn set_key(&mut self, name: &str, key: PrngKey) -> Result<()> {
        self.set(name, CompartmentValue::Key(key))
    }

    pub fn scalar(&self, name: &str) -> Result<f32> {
        match &self.slot(name)?.value {
            CompartmentValue::Scalar(v) => Ok(*v),
            CompartmentValue::Empty => Err(NeuralError::UnsetCompartment {
                component: self.owner.clone(),
                compartment: name.to_string(),
            }),
            other => Err(NeuralError::CompartmentType {
                compartment: format!("{}.{}", self.owner, name),
                expected: "scalar",
                actual: other.kind(),
            }),
        }
    }
}

/// Per-compartment statistics, one line each
impl fmt::Display for CompartmentMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "PATH: {}", self.owner)?;
        let width = self.slots.iter().map(|c| c.name.len()).max().unwrap_or(0) + 4;
        for slot in &self.slots {
            let label = format!("({})", slot.name);
            match &slot.value {
                CompartmentValue::Tensor(t) if !t.is_empty() => {
                    let min = t.iter().copied().fold(f32::INFINITY, f32::min);
                    let max = t.iter().copied().fold(f32::NEG_INFINITY, f32::max);
                    let mean = t.mean().unwrap_or(0.0);
                    writeln!(
                        f,
                        "  {:<width$}shape: {:?}, min: {}, max: {}, mean: {}",
                        label,
                        t.dim(),
                        min,
                        max,
                        mean,
                        width = width
                    )?;
                }
                CompartmentValue::Scalar(v) => writeln!(f, "  {:<width$}{}", label, v, width = width)?,
                CompartmentValue::Key(k) => writeln!(f, "  {:<width$}{:?}", label, k, width = width)?,
                _ => writeln!(f, "  {:<width$}None", label, width = width)?,
            }
        }
        Ok(())
    }
}
