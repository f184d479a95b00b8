//! End-to-end transient scenarios built directly against the device API.

use std::f64::consts::TAU;

use simlogue_core::{Circuit, Element, PinRef, Scope};
use simlogue_devices::{
    AcVoltageSource, AcVoltageSource2, Capacitor, CurrentSource, Device, Ground, Inductor, OpAmp,
    Resistor, Switch, VoltageSource, VoltageSource2,
};
use simlogue_solver::{Error, Simulator};

fn pin(device: usize, pin: usize) -> PinRef {
    PinRef::new(device, pin)
}

/// `V1(5V) - R1(10) - mid - R2(10) - GND`.
fn voltage_divider() -> (Circuit<Device>, usize, usize, usize) {
    let mut circuit: Circuit<Device> = Circuit::new();
    let v1 = circuit
        .add_device(VoltageSource::new("V1", 5.0).into())
        .unwrap();
    let r1 = circuit.add_device(Resistor::new("R1", 10.0).into()).unwrap();
    let r2 = circuit.add_device(Resistor::new("R2", 10.0).into()).unwrap();
    circuit.connect(pin(v1, 0), pin(r1, 0));
    circuit.connect(pin(r1, 1), pin(r2, 0));
    circuit.attach(pin(r2, 1), circuit.ground());
    (circuit, v1, r1, r2)
}

#[test]
fn divider_reaches_half_rail_in_one_step() {
    let (circuit, _, r1, _) = voltage_divider();
    let mut sim = Simulator::new(circuit, 1e-3);
    sim.run_for_steps(1).unwrap();

    let mid = sim.pin_voltage(pin(r1, 1));
    assert!((mid - 2.5).abs() < 1e-9, "mid = {mid}");
    let i_r1 = sim.circuit().device(r1).current_between(0, 1);
    assert!((i_r1 - 0.25).abs() < 1e-9, "i = {i_r1}");
}

#[test]
fn divider_satisfies_kcl_and_kvl() {
    let (circuit, v1, r1, r2) = voltage_divider();
    let mut sim = Simulator::new(circuit, 1e-3);
    sim.run_for_steps(3).unwrap();

    // KVL on the source row: the driven node is exactly at 5 V.
    let top = sim.pin_voltage(pin(v1, 0));
    assert!((top - 5.0).abs() <= 1e-9);

    // KCL at the driven node: current into R1 balances the source branch.
    let devices = sim.circuit().devices();
    let leaving_top = devices[v1].current_between(0, 0) + devices[r1].current_between(0, 1);
    assert!(leaving_top.abs() <= 1e-9, "KCL residual {leaving_top}");

    // KCL at the midpoint.
    let leaving_mid = devices[r1].current_between(1, 0) + devices[r2].current_between(0, 1);
    assert!(leaving_mid.abs() <= 1e-9, "KCL residual {leaving_mid}");
}

#[test]
fn ground_stays_at_zero_exactly() {
    let (circuit, ..) = voltage_divider();
    let mut sim = Simulator::new(circuit, 1e-3);
    for _ in 0..10 {
        sim.step().unwrap();
        assert_eq!(sim.node_voltage(sim.circuit().ground()), 0.0);
    }
}

#[test]
fn two_pin_source_enforces_its_voltage() {
    let mut circuit: Circuit<Device> = Circuit::new();
    let v = circuit
        .add_device(VoltageSource2::new("V1", 3.0).into())
        .unwrap();
    let ra = circuit.add_device(Resistor::new("Ra", 50.0).into()).unwrap();
    let rb = circuit.add_device(Resistor::new("Rb", 70.0).into()).unwrap();
    circuit.connect(pin(v, 0), pin(ra, 0));
    circuit.attach(pin(ra, 1), circuit.ground());
    circuit.connect(pin(v, 1), pin(rb, 0));
    circuit.attach(pin(rb, 1), circuit.ground());

    let mut sim = Simulator::new(circuit, 1e-3);
    sim.run_for_steps(1).unwrap();

    let va = sim.pin_voltage(pin(v, 0));
    let vb = sim.pin_voltage(pin(v, 1));
    assert!((va - vb - 3.0).abs() <= 1e-9, "KVL violated: {va} - {vb}");
}

#[test]
fn current_source_drops_ir_over_resistor() {
    let mut circuit: Circuit<Device> = Circuit::new();
    let i = circuit
        .add_device(CurrentSource::new("I1", 2e-3).into())
        .unwrap();
    let r = circuit.add_device(Resistor::new("R1", 1000.0).into()).unwrap();
    circuit.attach(pin(i, 0), circuit.ground());
    circuit.connect(pin(i, 1), pin(r, 0));
    circuit.attach(pin(r, 1), circuit.ground());

    let mut sim = Simulator::new(circuit, 1e-3);
    sim.run_for_steps(1).unwrap();
    assert!((sim.pin_voltage(pin(r, 0)) - 2.0).abs() < 1e-9);
}

#[test]
fn rc_charge_hits_tau_voltage() {
    // V1(1V) - R1(1k) - C1(1uF) - GND, tau = 1 ms.
    let mut circuit: Circuit<Device> = Circuit::new();
    let v1 = circuit
        .add_device(VoltageSource::new("V1", 1.0).into())
        .unwrap();
    let r1 = circuit
        .add_device(Resistor::new("R1", 1000.0).into())
        .unwrap();
    let c1 = circuit
        .add_device(Capacitor::new("C1", 1e-6).into())
        .unwrap();
    circuit.connect(pin(v1, 0), pin(r1, 0));
    circuit.connect(pin(r1, 1), pin(c1, 0));
    circuit.attach(pin(c1, 1), circuit.ground());

    let dt = 10e-6;
    let mut sim = Simulator::new(circuit, dt);
    sim.run_for_steps(101).unwrap(); // through t = 1 ms

    let v_c = sim.pin_voltage(pin(c1, 0));
    assert!((v_c - 0.632).abs() < 0.01, "V(C) = {v_c}");
}

#[test]
fn lr_step_response_current() {
    // V1(1V) - R1(1 Ohm) - L1(1H) - GND, tau = 1 s.
    let mut circuit: Circuit<Device> = Circuit::new();
    let v1 = circuit
        .add_device(VoltageSource::new("V1", 1.0).into())
        .unwrap();
    let r1 = circuit.add_device(Resistor::new("R1", 1.0).into()).unwrap();
    let l1 = circuit.add_device(Inductor::new("L1", 1.0).into()).unwrap();
    circuit.connect(pin(v1, 0), pin(r1, 0));
    circuit.connect(pin(r1, 1), pin(l1, 0));
    circuit.attach(pin(l1, 1), circuit.ground());

    let dt = 1e-3;
    let mut sim = Simulator::new(circuit, dt);
    sim.run_for_steps(1001).unwrap(); // through t = 1 s

    let i_l = sim.circuit().device(l1).current_between(0, 1);
    assert!((i_l - 0.632).abs() < 0.01, "I(L) = {i_l}");
}

#[test]
fn ac_source_reproduces_sine_exactly() {
    // 1 Hz, 1 V source driving a 1k load; the driven node tracks
    // sin(2*pi*t) at every sample.
    let mut circuit: Circuit<Device> = Circuit::new();
    let gnd = circuit.add_device(Ground::new("GND").into()).unwrap();
    circuit.attach(pin(gnd, 0), circuit.ground());
    let v1 = circuit
        .add_device(AcVoltageSource::new("V1", 1.0, 1.0, 0.0).into())
        .unwrap();
    let r1 = circuit
        .add_device(Resistor::new("R1", 1000.0).into())
        .unwrap();
    circuit.connect(pin(v1, 0), pin(r1, 0));
    circuit.connect(pin(r1, 1), pin(gnd, 0));

    let dt = 1e-3;
    let mut sim = Simulator::new(circuit, dt);
    sim.add_scope(Scope::voltage("v_src", pin(v1, 0), pin(gnd, 0)));
    sim.run_for_steps(1000).unwrap();

    let samples = sim.scopes()[0].samples();
    assert_eq!(samples.len(), 1000);
    for &(t, v) in samples {
        let expected = (TAU * t).sin();
        assert!(
            (v - expected).abs() < 1e-6,
            "t = {t}: {v} vs {expected}"
        );
    }
}

#[test]
fn switch_toggles_mid_run() {
    // The divider with a switch in series, closed at t = 0.5 s.
    let mut circuit: Circuit<Device> = Circuit::new();
    let v1 = circuit
        .add_device(VoltageSource::new("V1", 5.0).into())
        .unwrap();
    let r1 = circuit.add_device(Resistor::new("R1", 10.0).into()).unwrap();
    let sw = circuit.add_device(Switch::new("SW1").into()).unwrap();
    let r2 = circuit.add_device(Resistor::new("R2", 10.0).into()).unwrap();
    circuit.connect(pin(v1, 0), pin(r1, 0));
    circuit.connect(pin(r1, 1), pin(sw, 0));
    circuit.connect(pin(sw, 1), pin(r2, 0));
    circuit.attach(pin(r2, 1), circuit.ground());

    circuit
        .device_mut(sw)
        .as_switch_mut()
        .unwrap()
        .schedule_on(0.5);

    let dt = 1e-3;
    let mut sim = Simulator::new(circuit, dt);
    sim.add_scope(Scope::voltage("v_mid", pin(r2, 0), pin(r2, 1)));
    sim.run_for_seconds(1.0).unwrap();

    for &(t, v) in sim.scopes()[0].samples() {
        if t < 0.5 - dt / 2.0 {
            assert!(v.abs() < 1e-9, "open switch leaked at t = {t}: {v}");
        } else {
            assert!((v - 2.5).abs() < 1e-9, "closed switch at t = {t}: {v}");
        }
    }
}

#[test]
fn repeated_turn_on_matches_single_turn_on() {
    let build = |double: bool| {
        let mut circuit: Circuit<Device> = Circuit::new();
        let v1 = circuit
            .add_device(VoltageSource::new("V1", 5.0).into())
            .unwrap();
        let sw = circuit.add_device(Switch::new("SW1").into()).unwrap();
        let r = circuit.add_device(Resistor::new("R1", 10.0).into()).unwrap();
        circuit.connect(pin(v1, 0), pin(sw, 0));
        circuit.connect(pin(sw, 1), pin(r, 0));
        circuit.attach(pin(r, 1), circuit.ground());
        {
            let sw = circuit.device_mut(sw).as_switch_mut().unwrap();
            sw.schedule_on(0.3);
            if double {
                sw.schedule_on(0.3);
            }
        }
        let mut sim = Simulator::new(circuit, 1e-3);
        sim.add_scope(Scope::voltage("v_r", pin(r, 0), pin(r, 1)));
        sim.run_for_seconds(0.6).unwrap();
        sim.scopes()[0].samples().to_vec()
    };

    assert_eq!(build(false), build(true));
}

#[test]
fn opamp_comparator_saturates_both_ways() {
    let run = |v_plus: f64, v_minus: f64| {
        let mut circuit: Circuit<Device> = Circuit::new();
        let vp = circuit
            .add_device(VoltageSource::new("Vp", v_plus).into())
            .unwrap();
        let vm = circuit
            .add_device(VoltageSource::new("Vm", v_minus).into())
            .unwrap();
        let op = circuit
            .add_device(OpAmp::new("OP1", -12.0, 12.0, 1e5).into())
            .unwrap();
        let load = circuit
            .add_device(Resistor::new("RL", 1000.0).into())
            .unwrap();
        circuit.connect(pin(vp, 0), pin(op, 0));
        circuit.connect(pin(vm, 0), pin(op, 1));
        circuit.connect(pin(op, 2), pin(load, 0));
        circuit.attach(pin(load, 1), circuit.ground());

        let mut sim = Simulator::new(circuit, 1e-3);
        sim.run_for_steps(5).unwrap();
        sim.pin_voltage(pin(op, 2))
    };

    let high = run(0.2, 0.0);
    assert!((high - 12.0).abs() < 1e-9, "expected +rail, got {high}");
    let low = run(0.0, 0.2);
    assert!((low + 12.0).abs() < 1e-9, "expected -rail, got {low}");
}

#[test]
fn capacitor_current_matches_derivative() {
    // AC source straight across a capacitor: i = C dV/dt in the
    // backward-difference sense, which tracks the analytic derivative
    // to O(dt).
    let c = 1e-3;
    let dt = 1e-3;
    let mut circuit: Circuit<Device> = Circuit::new();
    let v1 = circuit
        .add_device(AcVoltageSource2::new("V1", 1.0, 1.0, 0.0).into())
        .unwrap();
    let c1 = circuit.add_device(Capacitor::new("C1", c).into()).unwrap();
    circuit.connect(pin(v1, 0), pin(c1, 0));
    circuit.attach(pin(v1, 1), circuit.ground());
    circuit.attach(pin(c1, 1), circuit.ground());

    let mut sim = Simulator::new(circuit, dt);
    sim.add_scope(Scope::current("i_c", pin(c1, 0), pin(c1, 1)));
    sim.run_for_seconds(1.0).unwrap();

    for &(t, i) in sim.scopes()[0].samples().iter().skip(1) {
        // The backward difference approximates the derivative at the
        // midpoint of the step.
        let expected = c * TAU * (TAU * (t - dt / 2.0)).cos();
        assert!(
            (i - expected).abs() < c * TAU * TAU * dt,
            "t = {t}: {i} vs {expected}"
        );
    }
}

#[test]
fn identical_runs_are_bitwise_identical() {
    let run = || {
        let (circuit, _, r1, _) = voltage_divider();
        let mut sim = Simulator::new(circuit, 1e-4);
        sim.add_scope(Scope::voltage("v_r1", pin(r1, 0), pin(r1, 1)));
        sim.add_scope(Scope::current("i_r1", pin(r1, 0), pin(r1, 1)));
        sim.run_for_steps(500).unwrap();
        (
            sim.scopes()[0].samples().to_vec(),
            sim.scopes()[1].samples().to_vec(),
            sim.solution().clone(),
        )
    };

    let (va, ia, xa) = run();
    let (vb, ib, xb) = run();
    assert_eq!(va, vb);
    assert_eq!(ia, ib);
    assert_eq!(xa, xb);
}

#[test]
fn conflicting_sources_report_singular() {
    let mut circuit: Circuit<Device> = Circuit::new();
    let v1 = circuit
        .add_device(VoltageSource::new("V1", 5.0).into())
        .unwrap();
    let v2 = circuit
        .add_device(VoltageSource::new("V2", 3.0).into())
        .unwrap();
    let r = circuit.add_device(Resistor::new("R1", 10.0).into()).unwrap();
    circuit.connect(pin(v1, 0), pin(v2, 0));
    circuit.connect(pin(v1, 0), pin(r, 0));
    circuit.attach(pin(r, 1), circuit.ground());

    let mut sim = Simulator::new(circuit, 1e-3);
    let err = sim.run_for_steps(1).unwrap_err();
    assert!(
        matches!(err, Error::Singular { step: 0, .. }),
        "got {err:?}"
    );
}

#[test]
fn scope_data_survives_mid_run_failure() {
    // A switch shorting the two pins of an ideal source at 0.3 s makes
    // the system singular; everything recorded before that stays intact.
    let mut circuit: Circuit<Device> = Circuit::new();
    let v1 = circuit
        .add_device(VoltageSource::new("V1", 5.0).into())
        .unwrap();
    let sw = circuit.add_device(Switch::new("SW1").into()).unwrap();
    let r = circuit.add_device(Resistor::new("R1", 10.0).into()).unwrap();
    circuit.connect(pin(v1, 0), pin(sw, 0));
    circuit.connect(pin(v1, 0), pin(r, 0));
    circuit.attach(pin(sw, 1), circuit.ground());
    circuit.attach(pin(r, 1), circuit.ground());
    circuit
        .device_mut(sw)
        .as_switch_mut()
        .unwrap()
        .schedule_on(0.3);

    let dt = 1e-3;
    let mut sim = Simulator::new(circuit, dt);
    sim.add_scope(Scope::voltage("v_r", pin(r, 0), pin(r, 1)));
    let err = sim.run_for_seconds(1.0).unwrap_err();
    assert!(matches!(err, Error::Singular { .. }), "got {err:?}");

    let samples = sim.scopes()[0].samples();
    assert!(!samples.is_empty());
    for &(t, v) in samples {
        assert!(t < 0.3);
        assert!((v - 5.0).abs() < 1e-9);
    }
}
