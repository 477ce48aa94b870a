//! Output slot contract: status plus exactly one owned handle.

use std::ptr;

use tether::call_with;
use tether_types::{CallSite, status};

use crate::common::{Script, ScriptedCapability, call, gateway_with};

#[test]
fn summarize_hello_returns_ok_payload() {
    let capability = ScriptedCapability::succeed(CallSite::Inference, "ok");
    let gateway = gateway_with(&[capability.clone()]);

    let reply = call(&gateway, CallSite::Inference, "summarize: hello", None, 0.2, 0);

    assert_eq!(reply.status, status::SUCCESS);
    assert_eq!(reply.payload.as_deref(), Some("ok"));
    assert!(reply.error.is_none());
    assert_eq!(capability.calls(), 1);
}

#[test]
fn every_outcome_fills_exactly_one_slot() {
    let gateway = gateway_with(&[
        ScriptedCapability::succeed(CallSite::Inference, "payload"),
        ScriptedCapability::fail(CallSite::ModelInvocation, Some(31), "model busy"),
        ScriptedCapability::fail(CallSite::CredentialIssuance, None, "attestation failed"),
    ]);

    for site in CallSite::all() {
        for input in ["a", "summarize: hello", "ünïcödé ✓"] {
            call(&gateway, *site, input, None, 0.0, 0).assert_one_slot();
            call(&gateway, *site, input, Some("ctx"), 1.0, 16).assert_one_slot();
        }
    }
}

#[test]
fn domain_code_passes_through_and_zero_collapses() {
    let gateway = gateway_with(&[
        ScriptedCapability::fail(CallSite::ModelInvocation, Some(1042), "quota exceeded"),
        ScriptedCapability::fail(CallSite::CredentialIssuance, Some(0), "zero code"),
    ]);

    let reply = call(&gateway, CallSite::ModelInvocation, "x", None, 0.0, 0);
    assert_eq!(reply.status, 1042);
    assert_eq!(reply.error.as_deref(), Some("quota exceeded"));
    assert!(reply.payload.is_none());

    let reply = call(&gateway, CallSite::CredentialIssuance, "x", None, 0.0, 0);
    assert_eq!(reply.status, status::GENERIC_FAILURE);
    assert_eq!(reply.error.as_deref(), Some("zero code"));
}

#[test]
fn negative_domain_code_is_not_rewritten() {
    let gateway = gateway_with(&[ScriptedCapability::fail(
        CallSite::Inference,
        Some(-77),
        "model not loaded",
    )]);
    let reply = call(&gateway, CallSite::Inference, "x", None, 0.0, 0);
    assert_eq!(reply.status, -77);
    reply.assert_one_slot();
}

#[test]
fn panicking_capability_reports_generic_failure() {
    let gateway = gateway_with(&[std::sync::Arc::new(ScriptedCapability::new(
        CallSite::Inference,
        Script::Panic,
    ))]);

    let reply = call(&gateway, CallSite::Inference, "x", None, 0.0, 0);
    assert_eq!(reply.status, status::GENERIC_FAILURE);
    assert!(!reply.error.unwrap().trim().is_empty());
    assert!(reply.payload.is_none());
}

#[test]
fn empty_payload_is_still_a_payload() {
    let gateway = gateway_with(&[ScriptedCapability::succeed(CallSite::Inference, "")]);
    let reply = call(&gateway, CallSite::Inference, "x", None, 0.0, 0);
    assert_eq!(reply.status, status::SUCCESS);
    assert_eq!(reply.payload.as_deref(), Some(""));
    assert!(reply.error.is_none());
}

#[test]
fn null_output_slot_is_rejected_without_dispatch() {
    let capability = ScriptedCapability::succeed(CallSite::Inference, "ok");
    let gateway = gateway_with(&[capability.clone()]);
    let mut payload = ptr::null_mut();

    let code = unsafe {
        call_with(
            &gateway,
            CallSite::Inference,
            c"x".as_ptr(),
            ptr::null(),
            0.0,
            0,
            &mut payload,
            ptr::null_mut(),
        )
    };

    assert_eq!(code, status::INVALID_INPUT);
    assert!(payload.is_null());
    assert_eq!(capability.calls(), 0);
}
