//! Integration tests for the transport seam.
//!
//! These tests use the stub transport so no SMTP server is needed.

use std::sync::Arc;
use std::thread;

use courier_mime::Address;
use courier_smtp::{Envelope, Session, SessionConfig, StubTransport, Transport};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn envelope(to: &str) -> Envelope {
    Envelope::new(
        Address::new("sender@example.com").unwrap(),
        vec![Address::new(to).unwrap()],
    )
    .unwrap()
}

#[test]
fn test_shared_transport_across_threads() {
    init_tracing();
    let transport = Arc::new(StubTransport::new());

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let transport = Arc::clone(&transport);
            thread::spawn(move || {
                let to = format!("user{i}@example.com");
                transport
                    .send(&envelope(&to), format!("Subject: {i}\r\n\r\nbody").as_bytes())
                    .unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let mut recipients: Vec<String> = transport
        .messages()
        .iter()
        .map(|m| m.envelope.recipients()[0].to_string())
        .collect();
    recipients.sort();
    assert_eq!(
        recipients,
        vec![
            "user0@example.com",
            "user1@example.com",
            "user2@example.com",
            "user3@example.com"
        ]
    );
}

#[test]
fn test_transport_trait_object() {
    init_tracing();
    let transports: Vec<Box<dyn Transport>> = vec![
        Box::new(StubTransport::new()),
        Box::new(Session::new(SessionConfig::new("localhost")).unwrap()),
    ];
    assert_eq!(transports[0].describe(), "stub");
    assert_eq!(transports[1].describe(), "localhost:25");
}
