use std::sync::Arc;
use tokio::sync::mpsc;
use trailmark_common::protocol::RuntimeMessage;
use trailmark_common::sensitivity::{KeywordClassifier, MASKED_VALUE};
use trailmark_scanner::detector::input::INPUT_DEBOUNCE_MS;
use trailmark_scanner::detector::{ClickDetector, DomEvent, DomEventKind, InputDetector};
use trailmark_scanner::dom::{MemoryDocument, NodeId};
use trailmark_scanner::highlight::RECORDER_UI_ATTRIBUTE;

const EPOCH: i64 = 1_700_000_000_000;

fn page() -> MemoryDocument {
    MemoryDocument::new("https://example.com/login")
}

fn input_detector() -> InputDetector {
    InputDetector::new(Arc::new(KeywordClassifier::default()))
}

fn ev(kind: DomEventKind, target: NodeId) -> DomEvent {
    DomEvent::new(kind, target)
}

#[test]
fn test_click_on_icon_inside_button_records_button() {
    let mut doc = page();
    let body = doc.body_id();
    let button = doc.element(body, "button", &[("class", "submit-btn")]);
    let icon = doc.element(button, "span", &[("class", "icon")]);
    let label = doc.element(button, "span", &[]);
    doc.text_node(label, "Submit Form");

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut detector = ClickDetector::new();
    detector.start(EPOCH, tx);

    let event = detector.on_click(&doc, icon, EPOCH + 5000).unwrap();
    assert_eq!(event.element.tag_name, "button");
    assert_eq!(event.element.selector, "button.submit-btn");
    assert_eq!(event.element.text, "Submit Form");
    assert_eq!(event.timestamp, 5000);
    assert_eq!(event.url, "https://example.com/login");

    match rx.try_recv().unwrap() {
        RuntimeMessage::ClickEvent(sent) => assert_eq!(sent, event),
        other => panic!("unexpected message: {:?}", other),
    }
}

#[test]
fn test_click_on_text_node_resolves_to_link() {
    let mut doc = page();
    let body = doc.body_id();
    let link = doc.element(body, "a", &[("href", "/docs")]);
    let text = doc.text_node(link, "Docs");

    let (tx, _rx) = mpsc::unbounded_channel();
    let mut detector = ClickDetector::new();
    detector.start(EPOCH, tx);

    let event = detector.on_click(&doc, text, EPOCH).unwrap();
    assert_eq!(event.element.tag_name, "a");
    assert_eq!(event.element.text, "Docs");
}

#[test]
fn test_click_on_checkbox_records_the_input() {
    let mut doc = page();
    let body = doc.body_id();
    let label = doc.element(body, "label", &[]);
    let checkbox = doc.element(label, "input", &[("type", "checkbox"), ("name", "remember")]);
    doc.text_node(label, "Remember me");

    let (tx, _rx) = mpsc::unbounded_channel();
    let mut detector = ClickDetector::new();
    detector.start(EPOCH, tx);

    let event = detector.on_click(&doc, checkbox, EPOCH).unwrap();
    assert_eq!(event.element.tag_name, "input");
    assert_eq!(event.element.input_type.as_deref(), Some("checkbox"));
    assert_eq!(event.element.selector, "[name=\"remember\"]");
}

#[test]
fn test_click_on_non_interactive_content_ignored() {
    let mut doc = page();
    let body = doc.body_id();
    let div = doc.element(body, "div", &[("class", "hero")]);
    let p = doc.element(div, "p", &[]);
    doc.text_node(p, "Welcome");

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut detector = ClickDetector::new();
    detector.start(EPOCH, tx);

    assert!(detector.on_click(&doc, p, EPOCH).is_none());
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_click_on_role_and_tabindex_elements() {
    let mut doc = page();
    let body = doc.body_id();
    let tab = doc.element(body, "div", &[("role", "tab")]);
    let inner = doc.element(tab, "span", &[]);
    let focusable = doc.element(body, "div", &[("tabindex", "0")]);

    let (tx, _rx) = mpsc::unbounded_channel();
    let mut detector = ClickDetector::new();
    detector.start(EPOCH, tx);

    assert_eq!(detector.on_click(&doc, inner, EPOCH).unwrap().element.selector, "[role=\"tab\"]");
    assert!(detector.on_click(&doc, focusable, EPOCH).is_some());
}

#[test]
fn test_click_inside_recorder_ui_ignored() {
    let mut doc = page();
    let body = doc.body_id();
    let panel = doc.element(body, "div", &[(RECORDER_UI_ATTRIBUTE, "panel")]);
    let stop = doc.element(panel, "button", &[]);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut detector = ClickDetector::new();
    detector.start(EPOCH, tx);

    assert!(detector.on_click(&doc, stop, EPOCH).is_none());
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_click_detector_lifecycle() {
    let mut doc = page();
    let body = doc.body_id();
    let button = doc.element(body, "button", &[]);

    let mut detector = ClickDetector::new();
    detector.stop();
    assert!(!detector.is_active());
    assert!(detector.on_click(&doc, button, EPOCH).is_none());

    let (tx, _rx) = mpsc::unbounded_channel();
    detector.start(EPOCH, tx);
    assert!(detector.is_active());
    detector.stop();
    assert!(!detector.is_active());
    assert!(detector.on_click(&doc, button, EPOCH).is_none());
}

#[test]
fn test_typing_is_debounced_into_one_record() {
    let mut doc = page();
    let body = doc.body_id();
    let email = doc.element(body, "input", &[("type", "email"), ("name", "email")]);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut detector = input_detector();
    detector.start(EPOCH, tx);

    doc.set_value(email, "u");
    assert!(detector.on_event(&doc, ev(DomEventKind::Input, email), EPOCH + 100).is_none());
    doc.set_value(email, "user@example.com");
    assert!(detector.on_event(&doc, ev(DomEventKind::Input, email), EPOCH + 400).is_none());

    assert_eq!(detector.next_deadline(), Some(EPOCH + 400 + INPUT_DEBOUNCE_MS));
    assert!(detector.flush_due(&doc, EPOCH + 1399).is_empty());

    let flushed = detector.flush_due(&doc, EPOCH + 1500);
    assert_eq!(flushed.len(), 1);
    assert_eq!(flushed[0].value, "user@example.com");
    assert!(!flushed[0].is_sensitive);
    assert_eq!(flushed[0].timestamp, 1500);
    assert_eq!(detector.next_deadline(), None);

    assert!(matches!(rx.try_recv().unwrap(), RuntimeMessage::InputEvent(_)));
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_blur_flushes_once_and_cancels_timer() {
    let mut doc = page();
    let body = doc.body_id();
    let name = doc.element(body, "input", &[("name", "full_name")]);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut detector = input_detector();
    detector.start(EPOCH, tx);

    doc.set_value(name, "Ada");
    detector.on_event(&doc, ev(DomEventKind::Input, name), EPOCH);
    assert!(detector.has_pending(name));

    let recorded = detector.on_event(&doc, ev(DomEventKind::Blur, name), EPOCH + 200).unwrap();
    assert_eq!(recorded.value, "Ada");
    assert!(!detector.has_pending(name));
    assert!(detector.flush_due(&doc, EPOCH + 5000).is_empty());

    assert!(rx.try_recv().is_ok());
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_blur_without_edit_records_nothing() {
    let mut doc = page();
    let body = doc.body_id();
    let field = doc.element(body, "textarea", &[]);

    let (tx, _rx) = mpsc::unbounded_channel();
    let mut detector = input_detector();
    detector.start(EPOCH, tx);

    assert!(detector.on_event(&doc, ev(DomEventKind::Blur, field), EPOCH).is_none());
}

#[test]
fn test_identical_value_suppressed() {
    let mut doc = page();
    let body = doc.body_id();
    let notes = doc.element(body, "textarea", &[("name", "notes")]);

    let (tx, _rx) = mpsc::unbounded_channel();
    let mut detector = input_detector();
    detector.start(EPOCH, tx);

    doc.set_value(notes, "hello");
    detector.on_event(&doc, ev(DomEventKind::Input, notes), EPOCH);
    assert!(detector.on_event(&doc, ev(DomEventKind::Blur, notes), EPOCH + 10).is_some());

    detector.on_event(&doc, ev(DomEventKind::Change, notes), EPOCH + 20);
    assert!(detector.on_event(&doc, ev(DomEventKind::Blur, notes), EPOCH + 30).is_none());

    doc.set_value(notes, "hello world");
    detector.on_event(&doc, ev(DomEventKind::Input, notes), EPOCH + 40);
    assert_eq!(
        detector.flush_due(&doc, EPOCH + 2000)[0].value,
        "hello world"
    );
}

#[test]
fn test_sensitive_fields_masked() {
    let mut doc = page();
    let body = doc.body_id();
    let password = doc.element(body, "input", &[("type", "password"), ("name", "pw")]);
    let card = doc.element(body, "input", &[("name", "card-number")]);

    let (tx, _rx) = mpsc::unbounded_channel();
    let mut detector = input_detector();
    detector.start(EPOCH, tx);

    doc.set_value(password, "hunter2");
    detector.on_event(&doc, ev(DomEventKind::Input, password), EPOCH);
    let recorded = detector.on_event(&doc, ev(DomEventKind::Blur, password), EPOCH).unwrap();
    assert_eq!(recorded.value, MASKED_VALUE);
    assert!(recorded.is_sensitive);

    doc.set_value(card, "4111 1111 1111 1111");
    detector.on_event(&doc, ev(DomEventKind::Input, card), EPOCH);
    let recorded = detector.on_event(&doc, ev(DomEventKind::Blur, card), EPOCH).unwrap();
    assert_eq!(recorded.value, MASKED_VALUE);
    assert!(recorded.is_sensitive);
}

#[test]
fn test_described_label_reaches_classifier() {
    let mut doc = page();
    let body = doc.body_id();
    let key = doc.element(body, "input", &[("title", "API token")]);

    let (tx, _rx) = mpsc::unbounded_channel();
    let mut detector = input_detector();
    detector.start(EPOCH, tx);

    doc.set_value(key, "sk-live-123");
    detector.on_event(&doc, ev(DomEventKind::Input, key), EPOCH);
    let recorded = detector.on_event(&doc, ev(DomEventKind::Blur, key), EPOCH).unwrap();
    assert_eq!(recorded.element.text, "API token");
    assert_eq!(recorded.value, MASKED_VALUE);
    assert!(recorded.is_sensitive);
}

#[test]
fn test_discrete_controls_record_immediately() {
    let mut doc = page();
    let body = doc.body_id();
    let remember = doc.element(body, "input", &[("type", "checkbox"), ("name", "remember")]);
    let plan = doc.element(body, "input", &[("type", "radio"), ("name", "plan"), ("value", "pro")]);
    let country = doc.element(body, "select", &[("name", "country")]);

    let (tx, _rx) = mpsc::unbounded_channel();
    let mut detector = input_detector();
    detector.start(EPOCH, tx);

    doc.set_checked(remember, true);
    let recorded = detector.on_event(&doc, ev(DomEventKind::Change, remember), EPOCH).unwrap();
    assert_eq!(recorded.value, "checked");
    doc.set_checked(remember, false);
    let recorded = detector.on_event(&doc, ev(DomEventKind::Change, remember), EPOCH).unwrap();
    assert_eq!(recorded.value, "unchecked");

    let recorded = detector.on_event(&doc, ev(DomEventKind::Change, plan), EPOCH).unwrap();
    assert_eq!(recorded.value, "pro");

    doc.set_value(country, "NZ");
    let recorded = detector.on_event(&doc, ev(DomEventKind::Change, country), EPOCH).unwrap();
    assert_eq!(recorded.value, "NZ");
    assert!(!detector.has_pending(country));
    assert_eq!(detector.next_deadline(), None);
}

#[test]
fn test_filtered_elements_ignored() {
    let mut doc = page();
    let body = doc.body_id();
    let hidden = doc.element(body, "input", &[("type", "hidden"), ("value", "csrf")]);
    let submit = doc.element(body, "input", &[("type", "submit")]);
    let editable = doc.element(body, "div", &[("contenteditable", "true")]);
    let panel = doc.element(body, "div", &[(RECORDER_UI_ATTRIBUTE, "panel")]);
    let note = doc.element(panel, "textarea", &[]);

    let (tx, _rx) = mpsc::unbounded_channel();
    let mut detector = input_detector();
    detector.start(EPOCH, tx);

    for node in [hidden, submit, editable, note] {
        assert!(detector.on_event(&doc, ev(DomEventKind::Input, node), EPOCH).is_none());
        assert!(!detector.has_pending(node));
    }
    assert_eq!(detector.next_deadline(), None);
}

#[test]
fn test_non_text_inputs_ignored() {
    let mut doc = page();
    let body = doc.body_id();
    let file = doc.element(body, "input", &[("type", "file")]);
    let range = doc.element(body, "input", &[("type", "range")]);
    let color = doc.element(body, "input", &[("type", "color")]);
    doc.set_value(file, "C:\\fakepath\\me.png");
    doc.set_value(range, "42");
    doc.set_value(color, "#ff0000");

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut detector = input_detector();
    detector.start(EPOCH, tx);

    for node in [file, range, color] {
        assert!(detector.on_event(&doc, ev(DomEventKind::Change, node), EPOCH).is_none());
        assert!(!detector.has_pending(node));
    }
    assert!(detector.flush_due(&doc, EPOCH + 2000).is_empty());
    detector.stop(&doc, EPOCH + 2000);
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_stop_force_flushes_pending_values() {
    let mut doc = page();
    let body = doc.body_id();
    let search = doc.element(body, "input", &[("type", "search"), ("name", "q")]);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut detector = input_detector();
    detector.start(EPOCH, tx);

    doc.set_value(search, "rust");
    detector.on_event(&doc, ev(DomEventKind::Input, search), EPOCH + 50);
    detector.stop(&doc, EPOCH + 60);

    match rx.try_recv().unwrap() {
        RuntimeMessage::InputEvent(event) => {
            assert_eq!(event.value, "rust");
            assert_eq!(event.timestamp, 60);
        }
        other => panic!("unexpected message: {:?}", other),
    }
    assert!(!detector.is_active());
    assert_eq!(detector.next_deadline(), None);

    // Not started: a no-op.
    detector.stop(&doc, EPOCH + 70);
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_restart_forgets_last_values() {
    let mut doc = page();
    let body = doc.body_id();
    let city = doc.element(body, "input", &[("name", "city")]);

    let (tx, _rx) = mpsc::unbounded_channel();
    let mut detector = input_detector();
    detector.start(EPOCH, tx.clone());

    doc.set_value(city, "Oslo");
    detector.on_event(&doc, ev(DomEventKind::Input, city), EPOCH);
    assert!(detector.on_event(&doc, ev(DomEventKind::Blur, city), EPOCH).is_some());
    detector.stop(&doc, EPOCH);

    detector.start(EPOCH, tx);
    detector.on_event(&doc, ev(DomEventKind::Input, city), EPOCH);
    assert!(detector.on_event(&doc, ev(DomEventKind::Blur, city), EPOCH).is_some());
}
