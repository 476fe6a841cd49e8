//! Requests that outlive the configured timeout are abandoned

use chunk_types::{ChunkView, Delta, FieldName};
use services_chunks_field::{AddOrigin, ServerOperation, WidgetEvent};
use services_field_registry::{ChunksWidget, UiControl, WidgetConfig};
use tests_chunks::{click, visible_deltas, FakeServer};

fn body() -> FieldName {
    FieldName::new("body")
}

fn widget_with_timeout(ticks: u64) -> ChunksWidget {
    ChunksWidget::new(WidgetConfig::default().with_timeout(Some(ticks)))
}

#[test]
fn test_timed_out_add_is_retried() {
    let mut server = FakeServer::new();
    let mut widget = widget_with_timeout(5);
    widget
        .attach(vec![server.page("body", &[("text", "a"), ("text", "b")], false)])
        .unwrap();

    click(&mut widget, "body", 0, UiControl::AddAfter).unwrap();
    let first = widget.take_requests();
    assert_eq!(first.len(), 1);
    assert_eq!(
        widget.field(&body()).unwrap().follow_up(),
        Some(AddOrigin::After(Delta::new(0)))
    );

    assert!(widget.advance(4).unwrap().is_empty());
    assert_eq!(widget.advance(1).unwrap(), vec![first[0].id]);
    assert_eq!(
        widget
            .audit()
            .count(|e| matches!(e, WidgetEvent::RequestTimedOut { .. })),
        1
    );

    // The recorded add fires again as a fresh request.
    let field = widget.field(&body()).unwrap();
    let retry = field.in_flight().unwrap();
    assert_ne!(retry, first[0].id);
    assert_eq!(field.claims().len(), 1);

    let late = server.respond(&first[0]);
    assert!(!widget.deliver(late).unwrap());
    assert_eq!(
        widget
            .audit()
            .count(|e| matches!(e, WidgetEvent::ResponseDiscarded { .. })),
        1
    );

    server.pump(&mut widget).unwrap();
    let field = widget.field(&body()).unwrap();
    assert!(field.claims().is_empty());
    assert!(!field.is_busy());
    assert_eq!(visible_deltas(&widget, "body"), vec![0, 2, 1]);
}

#[test]
fn test_timed_out_preview_releases_chunk() {
    let mut server = FakeServer::new();
    let mut widget = widget_with_timeout(3);
    widget
        .attach(vec![server.page("body", &[("heading", "Title")], true)])
        .unwrap();

    click(&mut widget, "body", 0, UiControl::Edit).unwrap();
    click(&mut widget, "body", 0, UiControl::Preview).unwrap();
    let requests = widget.take_requests();
    assert_eq!(requests[0].operation, ServerOperation::PreviewRender(Delta::new(0)));

    assert_eq!(widget.advance(3).unwrap().len(), 1);
    let field = widget.field(&body()).unwrap();
    let chunk = field.chunk(Delta::new(0)).unwrap();
    assert!(!chunk.is_preview_loading());
    assert_eq!(chunk.view(), ChunkView::Preview);
    assert!(!field.is_busy());

    assert!(!widget.deliver(server.respond(&requests[0])).unwrap());

    // The chunk is usable again without waiting.
    click(&mut widget, "body", 0, UiControl::Edit).unwrap();
    assert_eq!(
        widget.field(&body()).unwrap().chunk(Delta::new(0)).unwrap().view(),
        ChunkView::Configuration
    );
}

#[test]
fn test_no_timeout_waits_forever() {
    let mut widget = ChunksWidget::new(WidgetConfig::default().with_timeout(None));
    let server = FakeServer::new();
    widget
        .attach(vec![server.page("body", &[("text", "a")], false)])
        .unwrap();

    click(&mut widget, "body", 0, UiControl::AddAfter).unwrap();
    assert!(widget.advance(10_000).unwrap().is_empty());
    assert!(widget.field(&body()).unwrap().is_busy());
    assert_eq!(widget.clock(), 10_000);
}
