// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Component Context
//!
//! Explicit builder that owns registered components, the directed links
//! between their compartments, and compiled execution schedules.
//!
//! ## Execution Model
//! ```text
//! for component in schedule (fixed order):
//!     gather:  copy every linked source value into this component
//!     execute: run the command once
//! ```
//! A component gathering from a producer that runs later in the same
//! schedule observes the producer's value from the previous step.

use crate::component::{Command, Component, StepClock};
use crate::types::{CompartmentValue, NeuralError, Result};
use ahash::AHashMap;
use std::path::Path;
use tracing::{debug, info, trace};

/// Address of one compartment on one component
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompartmentRef {
    pub component: String,
    pub compartment: String,
}

impl CompartmentRef {
    pub fn new(component: impl Into<String>, compartment: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            compartment: compartment.into(),
        }
    }
}

impl From<(&str, &str)> for CompartmentRef {
    fn from((component, compartment): (&str, &str)) -> Self {
        Self::new(component, compartment)
    }
}

/// Directed link `src -> dst`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub src: CompartmentRef,
    pub dst: CompartmentRef,
}

/// Compiled execution order for one command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    command: Command,
    order: Vec<String>,
}

impl Schedule {
    pub fn command(&self) -> Command {
        self.command
    }

    pub fn order(&self) -> &[String] {
        &self.order
    }
}

/// Registry of components and links
pub struct Context {
    name: String,
    components: Vec<Box<dyn Component>>,
    index: AHashMap<String, usize>,
    links: Vec<Link>,
}

impl Context {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            components: Vec::new(),
            index: AHashMap::new(),
            links: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register a component under its own unique name
    pub fn register<C: Component>(&mut self, component: C) -> Result<()> {
        let name = component.name().to_string();
        if self.index.contains_key(&name) {
            return Err(NeuralError::DuplicateComponent(name));
        }
        debug!(context = %self.name, component = %name, "component registered");
        self.index.insert(name, self.components.len());
        self.components.push(Box::new(component));
        Ok(())
    }

    /// Declare a directed link between two compartments
    pub fn link(&mut self, src: impl Into<CompartmentRef>, dst: impl Into<CompartmentRef>) -> Result<()> {
        let src = src.into();
        let dst = dst.into();
        let src_shape = self.get(&src.component)?.compartments().shape(&src.compartment)?;
        let dst_shape = self.get(&dst.component)?.compartments().shape(&dst.compartment)?;
        if let (Some(s), Some(d)) = (src_shape, dst_shape) {
            if s != d {
                return Err(NeuralError::shape(
                    format!(
                        "link {}.{} -> {}.{}",
                        src.component, src.compartment, dst.component, dst.compartment
                    ),
                    d,
                    s,
                ));
            }
        }
        debug!(
            context = %self.name,
            "link {}.{} -> {}.{}",
            src.component, src.compartment, dst.component, dst.compartment
        );
        self.links.push(Link { src, dst });
        Ok(())
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// Schedule every component supporting `command`, in registration order
    pub fn compile(&self, command: Command) -> Schedule {
        let order: Vec<String> = self
            .components
            .iter()
            .filter(|c| c.supports(command))
            .map(|c| c.name().to_string())
            .collect();
        info!(context = %self.name, %command, ?order, "schedule compiled");
        Schedule { command, order }
    }

    /// Schedule an explicit component order for `command`
    pub fn compile_ordered(&self, command: Command, names: &[&str]) -> Result<Schedule> {
        let mut order = Vec::with_capacity(names.len());
        for name in names {
            let component = self.get(name)?;
            if !component.supports(command) {
                return Err(NeuralError::InvalidParameter(format!(
                    "component '{}' does not support '{}'",
                    name, command
                )));
            }
            order.push(name.to_string());
        }
        info!(context = %self.name, %command, ?order, "schedule compiled");
        Ok(Schedule { command, order })
    }

    /// Execute a compiled schedule once
    pub fn run(&mut self, schedule: &Schedule, clock: StepClock) -> Result<()> {
        trace!(context = %self.name, command = %schedule.command, t = clock.t, "running schedule");
        for name in &schedule.order {
            let idx = self.position(name)?;
            if schedule.command != Command::Reset {
                self.gather(idx)?;
            }
            self.components[idx].execute(schedule.command, clock)?;
        }
        Ok(())
    }

    /// Copy linked source values into the component at `idx`
    fn gather(&mut self, idx: usize) -> Result<()> {
        let target = self.components[idx].name().to_string();
        let mut inbound: Vec<(String, CompartmentValue)> = Vec::new();
        for link in self.links.iter().filter(|l| l.dst.component == target) {
            let src_idx = self.position(&link.src.component)?;
            let value = self.components[src_idx]
                .compartments()
                .get(&link.src.compartment)?;
            // An unset producer leaves the destination untouched
            if !value.is_empty() {
                inbound.push((link.dst.compartment.clone(), value.clone()));
            }
        }
        let compartments = self.components[idx].compartments_mut();
        for (name, value) in inbound {
            compartments.set(&name, value)?;
        }
        Ok(())
    }

    fn position(&self, name: &str) -> Result<usize> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| NeuralError::UnknownComponent(name.to_string()))
    }

    pub fn get(&self, name: &str) -> Result<&dyn Component> {
        let idx = self.position(name)?;
        Ok(self.components[idx].as_ref())
    }

    pub fn get_mut(&mut self, name: &str) -> Result<&mut dyn Component> {
        let idx = self.position(name)?;
        Ok(self.components[idx].as_mut())
    }

    /// Typed access to a registered component
    pub fn component<T: Component>(&self, name: &str) -> Result<&T> {
        self.get(name)?
            .as_any()
            .downcast_ref::<T>()
            .ok_or_else(|| NeuralError::UnknownComponent(format!("{} (type mismatch)", name)))
    }

    pub fn component_mut<T: Component>(&mut self, name: &str) -> Result<&mut T> {
        self.get_mut(name)?
            .as_any_mut()
            .downcast_mut::<T>()
            .ok_or_else(|| NeuralError::UnknownComponent(format!("{} (type mismatch)", name)))
    }

    /// Clamp an external value into a compartment
    pub fn set(&mut self, target: impl Into<CompartmentRef>, value: impl Into<CompartmentValue>) -> Result<()> {
        let target = target.into();
        self.get_mut(&target.component)?
            .compartments_mut()
            .set(&target.compartment, value)
    }

    pub fn value(&self, target: impl Into<CompartmentRef>) -> Result<&CompartmentValue> {
        let target = target.into();
        self.get(&target.component)?.compartments().get(&target.compartment)
    }

    pub fn component_names(&self) -> Vec<&str> {
        self.components.iter().map(|c| c.name()).collect()
    }

    pub fn save_all(&self, directory: &Path) -> Result<()> {
        for component in &self.components {
            component.save(directory)?;
        }
        info!(context = %self.name, dir = %directory.display(), "context saved");
        Ok(())
    }

    pub fn load_all(&mut self, directory: &Path) -> Result<()> {
        for component in &mut self.components {
            component.load(directory)?;
        }
        info!(context = %self.name, dir = %directory.display(), "context loaded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoders::{BernoulliCell, LatencyCell, LatencyParameters};
    use crate::models::{LIFCell, LIFParameters};
    use crate::types::{PrngKey, Tensor};
    use ndarray::array;

    fn context() -> Context {
        let mut ctx = Context::new("test");
        ctx.register(BernoulliCell::new("x", 2, 1, PrngKey::new(1))).unwrap();
        ctx.register(LIFCell::new("z", 2, 1, LIFParameters::default(), PrngKey::new(2)).unwrap())
            .unwrap();
        ctx
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut ctx = context();
        let err = ctx
            .register(BernoulliCell::new("x", 2, 1, PrngKey::new(3)))
            .unwrap_err();
        assert!(matches!(err, NeuralError::DuplicateComponent(name) if name == "x"));
    }

    #[test]
    fn test_link_validation() {
        let mut ctx = context();
        assert!(matches!(
            ctx.link(("ghost", "outputs"), ("z", "j")),
            Err(NeuralError::UnknownComponent(_))
        ));
        assert!(matches!(
            ctx.link(("x", "nope"), ("z", "j")),
            Err(NeuralError::UnknownCompartment { .. })
        ));
        ctx.register(BernoulliCell::new("wide", 5, 1, PrngKey::new(4))).unwrap();
        assert!(matches!(
            ctx.link(("wide", "outputs"), ("z", "j")),
            Err(NeuralError::ShapeMismatch { .. })
        ));
        assert!(ctx.link(("x", "outputs"), ("z", "j")).is_ok());
        assert_eq!(ctx.links().len(), 1);
    }

    #[test]
    fn test_compile_filters_by_command() {
        let mut ctx = context();
        ctx.register(LatencyCell::new("lat", 2, 1, LatencyParameters::default()).unwrap())
            .unwrap();
        assert_eq!(ctx.compile(Command::Advance).order(), ["x", "z", "lat"]);
        assert_eq!(ctx.compile(Command::CalcSpikeTimes).order(), ["lat"]);
        assert!(ctx.compile(Command::Evolve).order().is_empty());
        assert!(ctx.compile_ordered(Command::CalcSpikeTimes, &["z"]).is_err());
        let custom = ctx.compile_ordered(Command::Advance, &["z", "x"]).unwrap();
        assert_eq!(custom.order(), ["z", "x"]);
    }

    #[test]
    fn test_run_gathers_linked_values() {
        let mut ctx = context();
        ctx.link(("x", "outputs"), ("z", "j")).unwrap();
        ctx.set(("x", "inputs"), array![[1.0, 0.0]]).unwrap();

        let advance = ctx.compile(Command::Advance);
        ctx.run(&advance, StepClock::new(0.0, 1.0)).unwrap();

        assert_eq!(ctx.value(("z", "j")).unwrap(), &CompartmentValue::Tensor(array![[1.0, 0.0]]));
        let z: &LIFCell = ctx.component("z").unwrap();
        assert_eq!(z.n_units(), 2);
        assert!(ctx.component::<BernoulliCell>("z").is_err());
    }

    #[test]
    fn test_consumer_before_producer_sees_previous_step() {
        let mut ctx = context();
        ctx.link(("x", "outputs"), ("z", "j")).unwrap();
        ctx.set(("x", "inputs"), array![[1.0, 1.0]]).unwrap();

        let advance = ctx.compile_ordered(Command::Advance, &["z", "x"]).unwrap();
        ctx.run(&advance, StepClock::new(0.0, 1.0)).unwrap();
        // z gathered x.outputs before x produced its first spikes
        assert_eq!(ctx.value(("z", "j")).unwrap(), &CompartmentValue::Tensor(Tensor::zeros((1, 2))));

        ctx.run(&advance, StepClock::new(1.0, 1.0)).unwrap();
        assert_eq!(ctx.value(("z", "j")).unwrap(), &CompartmentValue::Tensor(array![[1.0, 1.0]]));
    }

    #[test]
    fn test_save_and_load_all() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context();
        ctx.save_all(dir.path()).unwrap();
        assert!(dir.path().join("x.json").exists());
        assert!(dir.path().join("z.json").exists());

        let mut other = context();
        other.load_all(dir.path()).unwrap();

        let mut empty = Context::new("fresh");
        empty
            .register(BernoulliCell::new("missing", 2, 1, PrngKey::new(1)))
            .unwrap();
        assert!(matches!(empty.load_all(dir.path()), Err(NeuralError::MissingArchive(_))));
    }
}
