//! End-to-end tests: build, render and deliver through the stub transport.

use std::sync::Arc;

use courier::resolver::{CompositeResolver, FileResolver, UrlResolver};
use courier::{
    Disposition, EmailAttachment, Error, HtmlEmail, ImageHtmlEmail, MultiPartEmail, SimpleEmail,
    StubTransport,
};
use courier_mime::encoding::decode_rfc2047;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn header<'a>(text: &'a str, name: &str) -> Option<&'a str> {
    let prefix = format!("{name}: ");
    text.lines().find_map(|line| line.strip_prefix(prefix.as_str()))
}

#[test]
fn test_simple_email_delivery() {
    init_tracing();
    let mut email = SimpleEmail::new();
    email
        .set_from_with_name("alice@example.com", "Alice")
        .unwrap()
        .add_to("bob@example.com")
        .unwrap()
        .add_cc("carol@example.com")
        .unwrap()
        .set_subject("Lunch?")
        .set_msg("Noon at the usual place.")
        .unwrap();

    let transport = StubTransport::new();
    let message_id = email.send_with(&transport).unwrap();

    let sent = transport.messages();
    assert_eq!(sent.len(), 1);
    let text = sent[0].text();
    assert_eq!(header(&text, "From"), Some("Alice <alice@example.com>"));
    assert_eq!(header(&text, "To"), Some("bob@example.com"));
    assert_eq!(header(&text, "Cc"), Some("carol@example.com"));
    assert_eq!(header(&text, "Subject"), Some("Lunch?"));
    assert_eq!(header(&text, "Message-ID"), Some(message_id.as_str()));
    assert_eq!(header(&text, "MIME-Version"), Some("1.0"));
    assert!(message_id.ends_with("@example.com>"));
    assert!(text.contains("\r\n\r\nNoon at the usual place."));
}

#[test]
fn test_latin1_subject_encoded() {
    let mut email = SimpleEmail::new();
    email
        .set_charset("ISO-8859-1")
        .unwrap()
        .set_from("alice@example.com")
        .unwrap()
        .add_to("bob@example.com")
        .unwrap()
        .set_subject("Caf\u{e9} au lait")
        .set_msg("Un caf\u{e9}")
        .unwrap();
    email.build().unwrap();

    let message = email.mime_message().unwrap();
    let subject = message.subject().unwrap();
    assert!(subject.starts_with("=?ISO-8859-1?Q?"));
    assert_eq!(decode_rfc2047(subject).unwrap(), "Caf\u{e9} au lait");
}

#[test]
fn test_multipart_with_attachment() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("minutes.txt");
    std::fs::write(&path, "1. budget\r\n2. hiring\r\n").unwrap();

    let mut email = MultiPartEmail::new();
    email
        .set_from("alice@example.com")
        .unwrap()
        .add_to("bob@example.com")
        .unwrap()
        .set_subject("Minutes")
        .set_msg("See attached.")
        .unwrap();
    email
        .attach(
            &EmailAttachment::from_path(&path)
                .with_description("Meeting minutes")
                .with_disposition(Disposition::Attachment),
        )
        .unwrap();
    assert!(email.has_attachments());

    let transport = StubTransport::new();
    email.send_with(&transport).unwrap();
    let text = transport.messages()[0].text();

    assert!(header(&text, "Content-Type").unwrap().starts_with("multipart/mixed"));
    assert!(text.contains("Content-Disposition: attachment; filename=\"minutes.txt\""));
    assert!(text.contains("Content-Description: Meeting minutes"));
    assert!(text.contains("1. budget"));
    // primary body part comes before the attachment
    assert!(text.find("See attached.").unwrap() < text.find("1. budget").unwrap());
}

#[test]
fn test_html_email_plain_fallback() {
    let mut email = HtmlEmail::new();
    email
        .set_from("alice@example.com")
        .unwrap()
        .add_to("bob@example.com")
        .unwrap()
        .set_msg("<script> & friends")
        .unwrap();
    email.build().unwrap();

    let raw = String::from_utf8(email.mime_message().unwrap().to_bytes().unwrap()).unwrap();
    assert!(header(&raw, "Content-Type").unwrap().starts_with("multipart/alternative"));
    assert!(raw.contains("<pre>&lt;script&gt; &amp; friends</pre>"));
}

#[test]
fn test_image_html_email_embeds_files() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("images")).unwrap();
    std::fs::write(dir.path().join("images/logo.gif"), b"GIF89a").unwrap();

    let base = url::Url::from_directory_path(dir.path()).unwrap();
    let resolver = CompositeResolver::new(vec![
        Arc::new(UrlResolver::new(Some(base.join("missing-dir/").unwrap()))),
        Arc::new(FileResolver::new(dir.path())),
    ]);

    let mut email = ImageHtmlEmail::new();
    email
        .set_from("alice@example.com")
        .unwrap()
        .add_to("bob@example.com")
        .unwrap()
        .set_subject("Newsletter");
    email.set_data_source_resolver(Arc::new(resolver));
    email
        .set_html_msg(r#"<html><body><img src="images/logo.gif"> <img src="cid:kept"></body></html>"#)
        .unwrap()
        .set_text_msg("Newsletter")
        .unwrap();

    let transport = StubTransport::new();
    email.send_with(&transport).unwrap();

    let (name, resource) = email.inline_resources().iter().next().unwrap();
    assert_eq!(name, "logo.gif");
    let text = transport.messages()[0].text();
    assert!(text.contains(&format!("src=\"cid:{}\"", resource.cid())));
    assert!(text.contains("src=\"cid:kept\""));
    assert!(text.contains(&format!("Content-ID: <{}>", resource.cid())));
    assert!(text.contains("multipart/related"));
}

#[test]
fn test_send_without_host() {
    let mut email = SimpleEmail::new();
    email
        .set_from("alice@example.com")
        .unwrap()
        .add_to("bob@example.com")
        .unwrap()
        .set_msg("hi")
        .unwrap();
    assert!(matches!(email.send(), Err(Error::MissingHostName)));
    // the build already happened
    assert!(matches!(email.build(), Err(Error::AlreadyBuilt)));
}

#[test]
fn test_injected_transport_used_by_send() {
    let transport = Arc::new(StubTransport::new());
    let mut email = SimpleEmail::new();
    email
        .set_from("alice@example.com")
        .unwrap()
        .add_to("bob@example.com")
        .unwrap()
        .set_msg("hi")
        .unwrap();
    email.set_transport(transport.clone());
    email.send().unwrap();
    assert_eq!(transport.messages().len(), 1);
}
