//! Metadata (`$`-suffixed) request/response stays local, root-`Rsp`
//! delivery, unaffected by an attached port; topology notifications
//! (`_/topic/add` / `_/topic/remove`) do cross the port, since the
//! forwarding subscriber explicitly lets those two reserved topics through
//! its otherwise-blanket `_`-prefix filter.

use std::sync::{Arc, Mutex};

use fbp_value::{SubscriberFlags, Value, ValueData, ValueFlags};
use fitterbap::{PubsubEngine, Port, Role};

#[test]
fn metadata_request_response_is_unaffected_by_an_attached_port() {
    let engine = Arc::new(PubsubEngine::new("h/", 4096));
    engine.publish_meta("h/en", r#"{"dtype":"u32"}"#).unwrap();
    engine.process();

    // Attach a port (never pumped) purely to confirm its root `Pub`
    // subscriber doesn't intercept or shadow metadata traffic, which is
    // delivered through a separate `Rsp` channel entirely.
    let (transport, _peer) = fbp_test_support::channel();
    let _port = Port::new(Role::Downstream, transport, engine.clone());

    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = seen.clone();
    engine
        .subscribe(
            "",
            SubscriberFlags::RSP,
            Box::new(move |topic, value| {
                s.lock().unwrap().push((topic.to_string(), value.clone()));
                0
            }),
        )
        .unwrap();

    engine.publish("$", Value::null(), None).unwrap();
    engine.process();

    let seen = seen.lock().unwrap();
    assert!(seen.iter().any(|(t, _)| t == "h/en$"));
}

#[test]
fn topic_add_notifications_cross_a_connected_port() {
    let downstream = Arc::new(PubsubEngine::new("h/", 4096));
    let upstream = Arc::new(PubsubEngine::new("c/", 4096));

    let (t_down, t_up) = fbp_test_support::channel();
    let mut port_down = Port::new(Role::Downstream, t_down, downstream.clone());
    let mut port_up = Port::new(Role::Upstream, t_up, upstream.clone());

    for now_ms in 0..500u64 {
        port_down.pump(now_ms);
        port_up.pump(now_ms);
        if port_down.is_connected() && port_up.is_connected() {
            break;
        }
    }
    assert!(port_down.is_connected() && port_up.is_connected());

    downstream
        .publish("_/topic/add", Value::str_const("x/", ValueFlags::NONE), None)
        .unwrap();

    for now_ms in 500..540u64 {
        port_down.pump(now_ms);
        port_up.pump(now_ms);
    }

    let list = upstream.query("_/topic/list").expect("topic list is always retained");
    let ValueData::Str(encoded) = list.data else {
        panic!("topic list value should be a string");
    };
    let prefixes = fbp_pubsub::decode_topic_list(&encoded);
    assert!(
        prefixes.iter().any(|p| p == "x/"),
        "expected 'x/' to appear in upstream's topic list after the forwarded add, got {prefixes:?}"
    );
}
