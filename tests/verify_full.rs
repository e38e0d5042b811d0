// vim: tw=80
//! Full verification: every replayed call must be accounted for.

use mockling::{
    matcher, CallDescriptor, MethodSig, MockError, TestScope, TypeDesc, Value,
};

#[test]
fn all_calls_covered_by_clauses_pass() {
    let scope = TestScope::new();
    let svc = scope.new_mock("Mailer");
    let send = MethodSig::new("send", [TypeDesc::Str], TypeDesc::Void);
    scope
        .dispatch(CallDescriptor::on(&svc, &send, [Value::str("ann")]))
        .unwrap();
    scope
        .dispatch(CallDescriptor::on(&svc, &send, [Value::str("bob")]))
        .unwrap();
    scope
        .verify_all(|v| {
            v.expect(&svc, &send).with(vec![matcher::any()]).times(2);
        })
        .unwrap();
}

#[test]
fn uncovered_call_fails() {
    let scope = TestScope::new();
    let svc = scope.new_mock("Mailer");
    let send = MethodSig::new("send", [TypeDesc::Str], TypeDesc::Void);
    let purge = MethodSig::new("purge", [], TypeDesc::Void);
    scope
        .dispatch(CallDescriptor::on(&svc, &send, [Value::str("ann")]))
        .unwrap();
    scope.dispatch(CallDescriptor::on(&svc, &purge, [])).unwrap();
    let err = scope
        .verify_all(|v| {
            v.expect(&svc, &send).with(vec![matcher::any()]).once();
        })
        .unwrap_err();
    match err {
        MockError::UnexpectedInvocation { call, .. } => {
            assert!(call.contains("purge"), "{call}");
        }
        other => panic!("wrong error: {other}"),
    }
}

#[test]
fn explicitly_bounded_expectations_preaccount_their_calls() {
    let scope = TestScope::new();
    let svc = scope.new_mock("Mailer");
    let send = MethodSig::new("send", [TypeDesc::Str], TypeDesc::Void);
    let purge = MethodSig::new("purge", [], TypeDesc::Void);
    scope
        .record(|r| {
            r.expect(&svc, &purge).times(1);
        })
        .unwrap();
    scope
        .dispatch(CallDescriptor::on(&svc, &send, [Value::str("ann")]))
        .unwrap();
    scope.dispatch(CallDescriptor::on(&svc, &purge, [])).unwrap();
    // The purge call was already constrained at recording time, so the
    // block only needs to cover the send.
    scope
        .verify_all(|v| {
            v.expect(&svc, &send).with(vec![matcher::any()]).once();
        })
        .unwrap();
}

#[test]
fn permissively_recorded_calls_still_need_coverage() {
    let scope = TestScope::new();
    let svc = scope.new_mock("Mailer");
    let purge = MethodSig::new("purge", [], TypeDesc::Void);
    // Recorded with no explicit bounds, so full verification does not treat
    // its calls as pre-accounted.
    scope
        .record(|r| {
            r.expect(&svc, &purge);
        })
        .unwrap();
    scope.dispatch(CallDescriptor::on(&svc, &purge, [])).unwrap();
    assert!(scope.verify_all(|_| {}).is_err());
    scope
        .verify_all(|v| {
            v.expect(&svc, &purge).once();
        })
        .unwrap();
}

#[test]
fn empty_log_passes_an_empty_block() {
    let scope = TestScope::new();
    scope.verify_all(|_| {}).unwrap();
}

#[test]
fn zero_min_clauses_can_account_without_requiring() {
    let scope = TestScope::new();
    let svc = scope.new_mock("Mailer");
    let send = MethodSig::new("send", [TypeDesc::Str], TypeDesc::Void);
    scope
        .dispatch(CallDescriptor::on(&svc, &send, [Value::str("ann")]))
        .unwrap();
    scope
        .verify_all(|v| {
            v.expect(&svc, &send)
                .with(vec![matcher::any()])
                .min_times(0);
        })
        .unwrap();
}
