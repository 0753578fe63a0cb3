use super::*;

#[test]
fn test_envelope_keeps_delivery_id_from_header() {
    let envelope = WebhookEnvelope::new(
        Bytes::from_static(b"{}"),
        None,
        Some("pull_request".to_string()),
        Some("72d3162e-cc78-11e3-81ab-4c9367dc0958".to_string()),
    );

    assert_eq!(envelope.delivery_id(), "72d3162e-cc78-11e3-81ab-4c9367dc0958");
    assert_eq!(envelope.body(), b"{}");
}

#[test]
fn test_envelope_generates_delivery_id_when_absent() {
    let first = WebhookEnvelope::new(Bytes::new(), None, None, None);
    let second = WebhookEnvelope::new(Bytes::new(), None, None, Some("  ".to_string()));

    assert!(uuid::Uuid::parse_str(first.delivery_id()).is_ok());
    assert!(uuid::Uuid::parse_str(second.delivery_id()).is_ok());
    assert_ne!(first.delivery_id(), second.delivery_id());
}

#[test]
fn test_foreign_event_detection() {
    let ping = WebhookEnvelope::new(Bytes::new(), None, Some("ping".to_string()), None);
    let pr = WebhookEnvelope::new(Bytes::new(), None, Some("pull_request".to_string()), None);
    let unknown = WebhookEnvelope::new(Bytes::new(), None, None, None);

    assert!(ping.is_foreign_event());
    assert!(!pr.is_foreign_event());
    assert!(!unknown.is_foreign_event());
}
