// vim: tw=80
//! Concurrent dispatch from several threads against one scope.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::thread;

use mockling::{
    matcher, CallDescriptor, Captor, InstanceId, MethodSig, TestScope,
    TypeDesc, Value,
};

const THREADS: usize = 4;
const CALLS_PER_THREAD: usize = 10;

#[test]
fn concurrent_dispatch_counts_and_captures_every_call() {
    let scope = Arc::new(TestScope::new());
    let svc = scope.new_mock("Counter");
    let bump = MethodSig::new("bump", [TypeDesc::Int], TypeDesc::Int);
    let captor = Captor::new();
    let total = THREADS * CALLS_PER_THREAD;
    scope
        .record(|r| {
            r.expect(&svc, &bump)
                .with(vec![matcher::captures(&captor)])
                .result(7i32)
                .times(total);
        })
        .unwrap();
    let mut workers = Vec::new();
    for t in 0..THREADS {
        let scope = Arc::clone(&scope);
        let svc = svc.clone();
        let bump = Arc::clone(&bump);
        workers.push(thread::spawn(move || {
            for i in 0..CALLS_PER_THREAD {
                let arg = Value::Int((t * CALLS_PER_THREAD + i) as i32);
                let out = scope
                    .dispatch(CallDescriptor::on(&svc, &bump, [arg]))
                    .unwrap();
                assert!(out.returned().unwrap().bit_eq(&Value::Int(7)));
            }
        }));
    }
    for w in workers {
        w.join().unwrap();
    }
    assert_eq!(captor.len(), total);
    scope
        .verify(|v| {
            v.expect(&svc, &bump).with(vec![matcher::any()]).times(total);
        })
        .unwrap();
}

#[test]
fn concurrent_cascading_is_memoized_per_key() {
    let scope = Arc::new(TestScope::new());
    let factory = scope.new_mock("Factory");
    let build =
        MethodSig::new("build", [TypeDesc::Int], TypeDesc::object("Engine"));
    let mut workers = Vec::new();
    for _ in 0..THREADS {
        let scope = Arc::clone(&scope);
        let factory = factory.clone();
        let build = Arc::clone(&build);
        workers.push(thread::spawn(move || {
            (0i32..5)
                .map(|n| {
                    let out = scope
                        .dispatch(CallDescriptor::on(
                            &factory,
                            &build,
                            [Value::Int(n)],
                        ))
                        .unwrap();
                    match out.returned().unwrap() {
                        Value::Ref(id) => (n, *id),
                        other => panic!("not a reference: {other}"),
                    }
                })
                .collect::<Vec<_>>()
        }));
    }
    let mut seen: HashMap<i32, InstanceId> = HashMap::new();
    for w in workers {
        for (n, id) in w.join().unwrap() {
            // Every thread must observe the same instance for equal
            // arguments.
            let prior = *seen.entry(n).or_insert(id);
            assert_eq!(prior, id);
        }
    }
    assert_eq!(seen.len(), 5);
    let distinct: HashSet<InstanceId> = seen.values().copied().collect();
    assert_eq!(distinct.len(), 5);
    scope.finish().unwrap();
}
