// vim: tw=80
//! The scope lifecycle: recording, replay, and the strict phase order.

use mockling::{
    matcher, CallDescriptor, MethodSig, MockError, TestScope, TypeDesc, Value,
};

#[test]
fn returns_recorded_value() {
    let scope = TestScope::new();
    let svc = scope.new_mock("Service");
    let greet = MethodSig::new("greet", [TypeDesc::Str], TypeDesc::Str);
    scope
        .record(|r| {
            r.expect(&svc, &greet)
                .with(vec![matcher::eq("bob")])
                .result("hi bob");
        })
        .unwrap();
    let out = scope
        .dispatch(CallDescriptor::on(&svc, &greet, [Value::str("bob")]))
        .unwrap();
    assert!(out.returned().unwrap().bit_eq(&Value::str("hi bob")));
    scope.finish().unwrap();
}

#[test]
fn result_queue_tail_repeats() {
    let scope = TestScope::new();
    let svc = scope.new_mock("Counter");
    let next = MethodSig::new("next", [], TypeDesc::Int);
    scope
        .record(|r| {
            r.expect(&svc, &next).results([1i32, 2, 3]);
        })
        .unwrap();
    let got = || {
        scope
            .dispatch(CallDescriptor::on(&svc, &next, []))
            .unwrap()
            .returned()
            .unwrap()
            .clone()
    };
    assert!(got().bit_eq(&Value::Int(1)));
    assert!(got().bit_eq(&Value::Int(2)));
    assert!(got().bit_eq(&Value::Int(3)));
    assert!(got().bit_eq(&Value::Int(3)));
    assert!(got().bit_eq(&Value::Int(3)));
}

#[test]
fn recording_after_replay_is_rejected() {
    let scope = TestScope::new();
    let svc = scope.new_mock("Service");
    let ping = MethodSig::new("ping", [], TypeDesc::Bool);
    scope.dispatch(CallDescriptor::on(&svc, &ping, [])).unwrap();
    let err = scope
        .record(|r| {
            r.expect(&svc, &ping).result(true);
        })
        .unwrap_err();
    assert!(matches!(err, MockError::Config(_)));
}

#[test]
fn dispatch_after_verification_is_rejected() {
    let scope = TestScope::new();
    let svc = scope.new_mock("Service");
    let ping = MethodSig::new("ping", [], TypeDesc::Bool);
    scope.dispatch(CallDescriptor::on(&svc, &ping, [])).unwrap();
    scope.verify(|_| {}).unwrap();
    let err = scope
        .dispatch(CallDescriptor::on(&svc, &ping, []))
        .unwrap_err();
    assert!(matches!(err, MockError::Config(_)));
}

#[test]
fn unmatched_call_yields_type_default() {
    let scope = TestScope::new();
    let svc = scope.new_mock("Service");
    let count = MethodSig::new("count", [], TypeDesc::Int);
    let name = MethodSig::new("name", [], TypeDesc::Str);
    let out = scope
        .dispatch(CallDescriptor::on(&svc, &count, []))
        .unwrap();
    assert!(out.returned().unwrap().bit_eq(&Value::Int(0)));
    let out = scope.dispatch(CallDescriptor::on(&svc, &name, [])).unwrap();
    assert!(out.returned().unwrap().is_null());
    scope.finish().unwrap();
}

#[test]
fn matched_expectation_without_results_yields_default() {
    let scope = TestScope::new();
    let svc = scope.new_mock("Sink");
    let put = MethodSig::new("put", [TypeDesc::Int], TypeDesc::Void);
    scope
        .record(|r| {
            r.expect(&svc, &put).with(vec![matcher::eq(1i32)]).times(1);
        })
        .unwrap();
    let out = scope
        .dispatch(CallDescriptor::on(&svc, &put, [Value::Int(1)]))
        .unwrap();
    assert!(out.returned().unwrap().is_null());
    scope.finish().unwrap();
}

#[test]
fn static_members_dispatch_by_class() {
    let scope = TestScope::new();
    let now = MethodSig::new("now", [], TypeDesc::Long);
    scope
        .record(|r| {
            r.expect_static("Clock", &now).result(1234i64);
        })
        .unwrap();
    let out = scope
        .dispatch(CallDescriptor::on_static("Clock", &now, []))
        .unwrap();
    assert!(out.returned().unwrap().bit_eq(&Value::Long(1234)));
    // A different class's static side is untouched.
    let out = scope
        .dispatch(CallDescriptor::on_static("Timer", &now, []))
        .unwrap();
    assert!(out.returned().unwrap().bit_eq(&Value::Long(0)));
    scope.finish().unwrap();
}

#[test]
fn incompatible_result_rejected_at_recording() {
    let scope = TestScope::new();
    let svc = scope.new_mock("Service");
    let count = MethodSig::new("count", [], TypeDesc::Int);
    let err = scope
        .record(|r| {
            r.expect(&svc, &count).result("not a number");
        })
        .unwrap_err();
    assert!(matches!(err, MockError::Config(_)));
    // The failed block published nothing.
    let out = scope
        .dispatch(CallDescriptor::on(&svc, &count, []))
        .unwrap();
    assert!(out.returned().unwrap().bit_eq(&Value::Int(0)));
}
