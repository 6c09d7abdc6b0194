// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Saving and restoring a trained context

use ndarray::array;
use neurodyn::prelude::*;
use neurodyn_npu_plasticity::{CableParameters, HebbianParameters, HebbianSynapse, STPDenseSynapse, STPParameters};

fn build(seed: u64) -> Context {
    let mut ctx = Context::new("model");
    ctx.register(
        RateCell::new(
            "a",
            3,
            1,
            RateParameters {
                tau_m: 0.0,
                ..RateParameters::default()
            },
        )
        .unwrap(),
    )
    .unwrap();
    let lif = LIFParameters {
        tau_theta: 100.0,
        theta_plus: 0.5,
        ..LIFParameters::default()
    };
    ctx.register(LIFCell::new("z", 2, 1, lif, PrngKey::new(seed)).unwrap())
        .unwrap();
    let hebb = HebbianParameters {
        eta: 0.1,
        sign_val: -1.0,
        cable: CableParameters {
            weight_init: WeightInit::uniform(0.5, 0.9),
            bias_init: Some(WeightInit::Constant { value: 0.0 }),
            ..CableParameters::default()
        },
        ..HebbianParameters::default()
    };
    ctx.register(HebbianSynapse::new("W", (3, 2), 1, hebb, PrngKey::new(seed + 1)).unwrap())
        .unwrap();
    ctx.register(STPDenseSynapse::new("S", (3, 2), 1, STPParameters::default(), PrngKey::new(seed + 2)).unwrap())
        .unwrap();

    ctx.link(("a", "z_f"), ("W", "inputs")).unwrap();
    ctx.link(("a", "z_f"), ("W", "pre")).unwrap();
    ctx.link(("W", "outputs"), ("z", "j")).unwrap();
    ctx.link(("z", "s"), ("W", "post")).unwrap();
    ctx
}

fn train(ctx: &mut Context, steps: usize) {
    let advance = ctx.compile_ordered(Command::Advance, &["a", "W", "z", "S"]).unwrap();
    let evolve = ctx.compile(Command::Evolve);
    let mut clock = StepClock::new(0.0, 1.0);
    for _ in 0..steps {
        ctx.set(("a", "j"), array![[1.0, 1.0, 0.0]]).unwrap();
        ctx.run(&advance, clock).unwrap();
        ctx.run(&evolve, clock).unwrap();
        clock = clock.tick();
    }
}

fn tensor(ctx: &Context, component: &str, compartment: &str) -> Tensor {
    match ctx.value((component, compartment)).unwrap() {
        CompartmentValue::Tensor(t) => t.clone(),
        other => panic!("{}.{} is not a tensor: {:?}", component, compartment, other),
    }
}

#[test]
fn test_save_all_and_load_all_restore_learned_state() {
    let dir = tempfile::tempdir().unwrap();
    let mut trained = build(1);
    train(&mut trained, 60);
    trained.save_all(dir.path()).unwrap();

    let theta = tensor(&trained, "z", "thr_theta");
    assert!(theta.sum() > 0.0, "trained population should have fired");

    let mut restored = build(100);
    assert_ne!(tensor(&restored, "W", "weights"), tensor(&trained, "W", "weights"));
    restored.load_all(dir.path()).unwrap();

    for (component, compartment) in [
        ("W", "weights"),
        ("W", "biases"),
        ("z", "thr_theta"),
        ("S", "weights"),
        ("S", "resources"),
    ] {
        assert_eq!(
            tensor(&restored, component, compartment),
            tensor(&trained, component, compartment),
            "{}.{} differs after reload",
            component,
            compartment
        );
    }
    assert_eq!(
        restored.value(("z", "key")).unwrap(),
        trained.value(("z", "key")).unwrap()
    );
}

#[test]
fn test_load_from_empty_directory_fails() {
    let dir = tempfile::tempdir().unwrap();
    let mut ctx = build(3);
    let err = ctx.load_all(dir.path()).unwrap_err();
    assert!(matches!(err, NeuralError::MissingArchive(_)));
}

#[test]
fn test_reset_keeps_learned_weights() {
    let mut ctx = build(7);
    train(&mut ctx, 10);
    let weights = tensor(&ctx, "W", "weights");
    let reset = ctx.compile(Command::Reset);
    ctx.run(&reset, StepClock::new(0.0, 1.0)).unwrap();
    assert_eq!(tensor(&ctx, "W", "weights"), weights);
    assert_eq!(tensor(&ctx, "W", "outputs").sum(), 0.0);
    assert_eq!(tensor(&ctx, "z", "s").sum(), 0.0);
}
