//! Re-rendered containers are reconciled with live client state

use chunk_types::{ChunkTypeId, ChunkView, Delta, FieldName, FocusTarget};
use services_chunks_field::{Signal, WidgetEvent};
use services_field_registry::{ChunksWidget, UiControl};
use tests_chunks::{click, row_node, FakeServer};
use widget_dom::Handler;

fn body() -> FieldName {
    FieldName::new("body")
}

fn count(widget: &ChunksWidget, predicate: impl Fn(&WidgetEvent) -> bool) -> usize {
    widget.audit().count(predicate)
}

#[test]
fn test_validation_errors_force_configuration() {
    let mut server = FakeServer::new();
    let mut widget = ChunksWidget::default();
    widget
        .attach(vec![server.page("body", &[("heading", "Title")], true)])
        .unwrap();

    click(&mut widget, "body", 0, UiControl::Edit).unwrap();
    server.reject("body", 0, "heading", "text");
    click(&mut widget, "body", 0, UiControl::Preview).unwrap();
    server.step(&mut widget).unwrap();

    let chunk = widget.field(&body()).unwrap().chunk(Delta::new(0)).unwrap();
    assert_eq!(chunk.view(), ChunkView::Configuration);
    let row = widget.container(&body()).unwrap().row(Delta::new(0)).unwrap();
    assert_eq!(row.view, ChunkView::Configuration);
    assert!(row.has_errors());

    assert_eq!(
        widget.focused(),
        Some(&FocusTarget::ConfigControl {
            field: body(),
            delta: Delta::new(0),
            chunk_type: ChunkTypeId::new("heading"),
            property: "text".to_string(),
        })
    );
    assert_eq!(
        count(&widget, |e| matches!(e, WidgetEvent::ValidationErrors { .. })),
        1
    );
    assert!(widget
        .field(&body())
        .unwrap()
        .config_cache()
        .contains(Delta::new(0)));
}

#[test]
fn test_reattach_while_in_flight_keeps_client_state() {
    let server = FakeServer::new();
    let mut widget = ChunksWidget::default();
    let page = || server.page("body", &[("text", "a"), ("heading", "b")], true);
    widget.attach(vec![page()]).unwrap();

    click(&mut widget, "body", 0, UiControl::AddAfter).unwrap();
    click(&mut widget, "body", 1, UiControl::Edit).unwrap();
    let in_flight = widget.field(&body()).unwrap().in_flight();
    assert!(in_flight.is_some());

    widget.attach(vec![page()]).unwrap();

    let field = widget.field(&body()).unwrap();
    assert_eq!(field.in_flight(), in_flight);
    assert_eq!(field.chunk(Delta::new(1)).unwrap().view(), ChunkView::Configuration);
    assert_eq!(
        field.chunk(Delta::new(2)).unwrap().view(),
        ChunkView::InstanceSelection
    );
    let row = widget.container(&body()).unwrap().row(Delta::new(1)).unwrap();
    assert_eq!(row.view, ChunkView::Configuration);
    assert!(row.cancel_visible);
    assert_eq!(field.chunk(Delta::new(1)).unwrap().node(), row.node);

    assert_eq!(
        count(&widget, |e| matches!(e, WidgetEvent::FieldAttached { .. })),
        1
    );
    assert_eq!(
        count(&widget, |e| matches!(e, WidgetEvent::FieldUpdated { .. })),
        1
    );
}

#[test]
fn test_server_rows_are_prepared_once() {
    let mut server = FakeServer::new();
    let mut widget = ChunksWidget::default();
    widget
        .attach(vec![server.page("body", &[("text", "a")], true)])
        .unwrap();
    assert_eq!(
        count(&widget, |e| matches!(e, WidgetEvent::RowPrepared { .. })),
        0
    );

    click(&mut widget, "body", 0, UiControl::AddAfter).unwrap();
    assert_eq!(server.step(&mut widget).unwrap(), 1);
    assert!(widget.take_requests().is_empty());

    let container = widget.container(&body()).unwrap();
    assert_eq!(container.rows.len(), 3);
    assert!(container.rows.iter().all(|r| r.draggable));
    assert_eq!(
        count(&widget, |e| matches!(e, WidgetEvent::RowPrepared { .. })),
        3
    );
}

#[test]
fn test_stale_preview_signal_is_discarded() {
    let mut server = FakeServer::new();
    let mut widget = ChunksWidget::default();
    widget
        .attach(vec![server.page("body", &[("text", "a")], true)])
        .unwrap();

    click(&mut widget, "body", 0, UiControl::AddAfter).unwrap();
    let requests = widget.take_requests();
    let response = server.respond(&requests[0]).with_signal(Signal::PreviewLoaded {
        field: body(),
        delta: Delta::new(42),
    });
    assert!(widget.deliver(response).unwrap());

    assert_eq!(
        count(&widget, |e| matches!(
            e,
            WidgetEvent::StaleSignalDiscarded { delta, .. } if *delta == Delta::new(42)
        )),
        1
    );
    assert_eq!(
        count(&widget, |e| matches!(e, WidgetEvent::PreviewLoaded { .. })),
        0
    );
}

#[test]
fn test_old_nodes_are_unbound_after_render() {
    let mut server = FakeServer::new();
    let mut widget = ChunksWidget::default();
    widget
        .attach(vec![server.page("body", &[("text", "a"), ("text", "b")], true)])
        .unwrap();
    let old_nodes: Vec<_> = (0..3).map(|d| row_node(&widget, "body", d)).collect();

    click(&mut widget, "body", 1, UiControl::AddAfter).unwrap();
    server.pump(&mut widget).unwrap();

    let bindings = widget.document().bindings();
    for node in old_nodes {
        assert!(!bindings.is_bound(node, Handler::Preview));
    }
    let chunks = widget.field(&body()).unwrap().chunks().count();
    assert_eq!(chunks, 4);
    assert_eq!(bindings.count(), chunks * Handler::CHUNK_HANDLERS.len() + 1);
}
