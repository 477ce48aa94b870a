//! Blocking semantics and independence of concurrent calls.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tether_types::{CallSite, status};

use crate::common::{Script, ScriptedCapability, call, gateway_with};

#[test]
fn call_blocks_until_completion() {
    let delay = Duration::from_millis(120);
    let capability = Arc::new(
        ScriptedCapability::new(CallSite::Inference, Script::Succeed("late".into()))
            .with_delay(delay),
    );
    let gateway = gateway_with(&[capability]);

    let started = Instant::now();
    let reply = call(&gateway, CallSite::Inference, "x", None, 0.0, 0);

    assert!(
        started.elapsed() >= delay,
        "returned after {:?}, before the {delay:?} delay",
        started.elapsed()
    );
    assert_eq!(reply.payload.as_deref(), Some("late"));
}

#[test]
fn concurrent_calls_get_their_own_results() {
    const CALLS: usize = 32;
    let capability = Arc::new(
        ScriptedCapability::new(CallSite::ModelInvocation, Script::Echo)
            .with_delay(Duration::from_millis(10)),
    );
    let gateway = Arc::new(gateway_with(&[capability.clone()]));

    let handles: Vec<_> = (0..CALLS)
        .map(|i| {
            let gateway = Arc::clone(&gateway);
            thread::spawn(move || {
                let input = format!("input-{i}");
                let reply = call(&gateway, CallSite::ModelInvocation, &input, None, 0.0, 0);
                (input, reply)
            })
        })
        .collect();

    for handle in handles {
        let (input, reply) = handle.join().unwrap();
        assert_eq!(reply.status, status::SUCCESS);
        assert_eq!(reply.payload, Some(format!("model:{input}")));
        assert!(reply.error.is_none());
    }
    assert_eq!(capability.calls(), CALLS);
    assert_eq!(gateway.dispatched(), CALLS as u64);
}

#[test]
fn concurrent_calls_overlap() {
    const CALLS: u32 = 8;
    let delay = Duration::from_millis(150);
    let capability = Arc::new(
        ScriptedCapability::new(CallSite::Inference, Script::Echo).with_delay(delay),
    );
    let gateway = Arc::new(gateway_with(&[capability]));

    let started = Instant::now();
    let handles: Vec<_> = (0..CALLS)
        .map(|i| {
            let gateway = Arc::clone(&gateway);
            thread::spawn(move || call(&gateway, CallSite::Inference, &i.to_string(), None, 0.0, 0))
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap().status, status::SUCCESS);
    }

    // The capability sleeps cooperatively, so calls must not run back to back.
    assert!(started.elapsed() < delay * CALLS);
}

#[test]
fn mixed_outcomes_do_not_cross() {
    let gateway = Arc::new(gateway_with(&[
        Arc::new(ScriptedCapability::new(CallSite::Inference, Script::Echo)),
        ScriptedCapability::fail(CallSite::CredentialIssuance, Some(5), "denied"),
    ]));

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let gateway = Arc::clone(&gateway);
            thread::spawn(move || {
                let site = if i % 2 == 0 {
                    CallSite::Inference
                } else {
                    CallSite::CredentialIssuance
                };
                (site, i, call(&gateway, site, &i.to_string(), None, 0.0, 0))
            })
        })
        .collect();

    for handle in handles {
        let (site, i, reply) = handle.join().unwrap();
        reply.assert_one_slot();
        match site {
            CallSite::Inference => {
                assert_eq!(reply.payload, Some(format!("inference:{i}")));
            }
            _ => {
                assert_eq!(reply.status, 5);
                assert_eq!(reply.error.as_deref(), Some("denied"));
            }
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn gateway_can_be_dropped_inside_async_code() {
    let capability = ScriptedCapability::succeed(CallSite::Inference, "ok");
    let gateway = gateway_with(&[capability]);

    let reply = call(&gateway, CallSite::Inference, "x", None, 0.0, 0);
    assert_eq!(reply.status, status::SUCCESS);

    drop(gateway);
}
