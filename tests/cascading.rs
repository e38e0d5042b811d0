// vim: tw=80
//! Cascaded stand-in instances for unmocked call chains.

use mockling::{
    matcher, CallDescriptor, CascadeConfig, InstanceId, MethodSig, TestScope,
    TypeDesc, Value,
};

fn ref_of(v: &Value) -> InstanceId {
    match v {
        Value::Ref(id) => *id,
        other => panic!("not a reference: {other}"),
    }
}

#[test]
fn mockable_return_cascades_and_memoizes() {
    let scope = TestScope::new();
    let factory = scope.new_mock("Factory");
    let build =
        MethodSig::new("build", [TypeDesc::Int], TypeDesc::object("Engine"));
    let call = |n| CallDescriptor::on(&factory, &build, [Value::Int(n)]);
    let a = ref_of(scope.dispatch(call(1)).unwrap().returned().unwrap());
    let b = ref_of(scope.dispatch(call(1)).unwrap().returned().unwrap());
    let c = ref_of(scope.dispatch(call(2)).unwrap().returned().unwrap());
    // Same arguments, same instance; different arguments, fresh instance.
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_eq!(scope.class_of(a).as_deref(), Some("Engine"));
    scope.finish().unwrap();
}

#[test]
fn wildcard_pattern_shares_one_instance() {
    let scope = TestScope::new();
    let factory = scope.new_mock("Factory");
    let build =
        MethodSig::new("build", [TypeDesc::Int], TypeDesc::object("Engine"));
    scope
        .record(|r| {
            r.expect(&factory, &build).with(vec![matcher::any()]);
        })
        .unwrap();
    let call = |n| CallDescriptor::on(&factory, &build, [Value::Int(n)]);
    let a = ref_of(scope.dispatch(call(1)).unwrap().returned().unwrap());
    let b = ref_of(scope.dispatch(call(2)).unwrap().returned().unwrap());
    assert_eq!(a, b);
    scope.finish().unwrap();
}

#[test]
fn chained_calls_cascade_transitively() {
    let scope = TestScope::new();
    let root = scope.new_mock("App");
    let engine = MethodSig::new("engine", [], TypeDesc::object("Engine"));
    let pump = MethodSig::new("pump", [], TypeDesc::object("Pump"));
    let rate = MethodSig::new("rate", [], TypeDesc::Int);

    let e = ref_of(
        scope
            .dispatch(CallDescriptor::on(&root, &engine, []))
            .unwrap()
            .returned()
            .unwrap(),
    );
    let e_class = scope.class_of(e).unwrap();
    let p = ref_of(
        scope
            .dispatch(CallDescriptor::on_instance(e, &e_class, &pump, []))
            .unwrap()
            .returned()
            .unwrap(),
    );
    let p_class = scope.class_of(p).unwrap();
    assert_eq!(&*p_class, "Pump");
    let out = scope
        .dispatch(CallDescriptor::on_instance(p, &p_class, &rate, []))
        .unwrap();
    assert!(out.returned().unwrap().bit_eq(&Value::Int(0)));
    scope.finish().unwrap();
}

#[test]
fn cascaded_instances_take_their_own_expectations() {
    let scope = TestScope::new();
    let factory = scope.new_mock("Factory");
    let build = MethodSig::new("build", [], TypeDesc::object("Engine"));
    let rate = MethodSig::new("rate", [], TypeDesc::Int);
    // Any Engine instance, including cascaded ones.
    scope
        .record(|r| {
            r.expect_any("Engine", &rate).result(99i32);
        })
        .unwrap();
    let e = ref_of(
        scope
            .dispatch(CallDescriptor::on(&factory, &build, []))
            .unwrap()
            .returned()
            .unwrap(),
    );
    let e_class = scope.class_of(e).unwrap();
    let out = scope
        .dispatch(CallDescriptor::on_instance(e, &e_class, &rate, []))
        .unwrap();
    assert!(out.returned().unwrap().bit_eq(&Value::Int(99)));
    scope.finish().unwrap();
}

#[test]
fn denylisted_classes_return_null() {
    let scope = TestScope::new();
    let svc = scope.new_mock("Service");
    let raw = MethodSig::new("raw", [], TypeDesc::object("Object"));
    let out = scope.dispatch(CallDescriptor::on(&svc, &raw, [])).unwrap();
    assert!(out.returned().unwrap().is_null());
    scope.finish().unwrap();
}

#[test]
fn registered_final_types_do_not_cascade() {
    let mut config = CascadeConfig::new();
    config.deny("SealedThing");
    let scope = TestScope::with_config(config);
    let svc = scope.new_mock("Service");
    let get = MethodSig::new("get", [], TypeDesc::object("SealedThing"));
    let out = scope.dispatch(CallDescriptor::on(&svc, &get, [])).unwrap();
    assert!(out.returned().unwrap().is_null());
    scope.finish().unwrap();
}

#[test]
fn unresolved_generics_return_null() {
    let scope = TestScope::new();
    let svc = scope.new_mock("Holder");
    let get = MethodSig::new("get", [], TypeDesc::Unresolved);
    let out = scope.dispatch(CallDescriptor::on(&svc, &get, [])).unwrap();
    assert!(out.returned().unwrap().is_null());
    scope.finish().unwrap();
}
