// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # One-Step ODE Integrators
//!
//! ```text
//! Euler:  x(t+dt) = x(t) + dt · f(t, x, p)
//! RK2:    k1 = f(t, x, p)
//!         k2 = f(t + dt/2, x + (dt/2)·k1, p)
//!         x(t+dt) = x(t) + dt · k2
//! ```
//!
//! Pure and deterministic. NaN/Inf coming out of `f` is propagated as-is.

use crate::types::{NeuralError, Tensor};
use core::str::FromStr;
use serde::{Deserialize, Serialize};

/// Integration scheme selector
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Integrator {
    #[default]
    Euler,
    Rk2,
}

impl Integrator {
    /// Advance `x` by one step of size `dt`; returns `(t + dt, x')`
    pub fn step<P, F>(&self, t: f32, x: &Tensor, dt: f32, params: &P, dfx: F) -> (f32, Tensor)
    where
        F: Fn(f32, &Tensor, &P) -> Tensor,
    {
        match self {
            Integrator::Euler => step_euler(t, x, dt, params, dfx),
            Integrator::Rk2 => step_rk2(t, x, dt, params, dfx),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Integrator::Euler => "euler",
            Integrator::Rk2 => "rk2",
        }
    }
}

impl FromStr for Integrator {
    type Err = NeuralError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "euler" => Ok(Integrator::Euler),
            "rk2" | "midpoint" => Ok(Integrator::Rk2),
            other => Err(NeuralError::InvalidParameter(format!("unknown integrator '{}'", other))),
        }
    }
}

/// Forward Euler step
pub fn step_euler<P, F>(t: f32, x: &Tensor, dt: f32, params: &P, dfx: F) -> (f32, Tensor)
where
    F: Fn(f32, &Tensor, &P) -> Tensor,
{
    let dx_dt = dfx(t, x, params);
    (t + dt, x + &(dx_dt * dt))
}

/// Second-order Runge-Kutta (midpoint) step
pub fn step_rk2<P, F>(t: f32, x: &Tensor, dt: f32, params: &P, dfx: F) -> (f32, Tensor)
where
    F: Fn(f32, &Tensor, &P) -> Tensor,
{
    let half = dt * 0.5;
    let k1 = dfx(t, x, params);
    let x_mid = x + &(k1 * half);
    let k2 = dfx(t + half, &x_mid, params);
    (t + dt, x + &(k2 * dt))
}

#[cfg(test)]
mod tests {
    use super::*;

    // dx/dt = -k·x
    fn decay(_t: f32, x: &Tensor, k: &f32) -> Tensor {
        x.mapv(|v| -k * v)
    }

    #[test]
    fn test_euler_matches_closed_form() {
        let x = Tensor::from_elem((1, 2), 1.0);
        let (t, x1) = step_euler(0.0, &x, 0.1, &2.0, decay);
        assert!((t - 0.1).abs() < 1e-6);
        // 1 + 0.1 * (-2) = 0.8
        assert!(x1.iter().all(|&v| (v - 0.8).abs() < 1e-6));
    }

    #[test]
    fn test_rk2_midpoint() {
        let x = Tensor::from_elem((1, 1), 1.0);
        let (_, x1) = step_rk2(0.0, &x, 0.1, &2.0, decay);
        // k1 = -2, x_mid = 0.9, k2 = -1.8, x' = 1 - 0.18 = 0.82
        assert!((x1[[0, 0]] - 0.82).abs() < 1e-6);
    }

    #[test]
    fn test_rk2_closer_to_exact_than_euler() {
        let x = Tensor::from_elem((1, 1), 1.0);
        let exact = (-0.2f32).exp();
        let (_, euler) = Integrator::Euler.step(0.0, &x, 0.1, &2.0, decay);
        let (_, rk2) = Integrator::Rk2.step(0.0, &x, 0.1, &2.0, decay);
        assert!((rk2[[0, 0]] - exact).abs() < (euler[[0, 0]] - exact).abs());
    }

    #[test]
    fn test_integrator_from_str() {
        assert_eq!("Euler".parse::<Integrator>().unwrap(), Integrator::Euler);
        assert_eq!("rk2".parse::<Integrator>().unwrap(), Integrator::Rk2);
        assert!("rk4".parse::<Integrator>().is_err());
    }
}
