//! Remove and Reset, and where focus lands afterwards

use chunk_types::{ChunkView, Delta, FieldName, FocusTarget, InstanceName};
use services_chunks_field::{ChunksError, WidgetEvent};
use services_field_registry::{ChunksWidget, UiControl, WidgetError};
use tests_chunks::{click, row_node, visible_deltas, FakeServer};
use widget_dom::Handler;

fn body() -> FieldName {
    FieldName::new("body")
}

fn four_chunks(server: &FakeServer, staged: bool) -> ChunksWidget {
    let mut widget = ChunksWidget::default();
    widget
        .attach(vec![server.page(
            "body",
            &[("text", "a"), ("heading", "b"), ("text", "c"), ("text", "d")],
            staged,
        )])
        .unwrap();
    widget
}

#[test]
fn test_focus_moves_to_previous_visible_chunk() {
    let server = FakeServer::new();
    let mut widget = four_chunks(&server, false);

    click(&mut widget, "body", 2, UiControl::Remove).unwrap();
    assert_eq!(
        widget.focused(),
        Some(&FocusTarget::AddAfter {
            field: body(),
            delta: Delta::new(1)
        })
    );

    click(&mut widget, "body", 0, UiControl::Remove).unwrap();
    assert_eq!(widget.focused(), Some(&FocusTarget::AddBefore { field: body() }));

    // Chunk 2 is already gone, so 1 is the nearest visible chunk before 3.
    click(&mut widget, "body", 3, UiControl::Remove).unwrap();
    assert_eq!(
        widget.focused(),
        Some(&FocusTarget::AddAfter {
            field: body(),
            delta: Delta::new(1)
        })
    );
    assert_eq!(visible_deltas(&widget, "body"), vec![1]);
    assert!(widget.take_requests().is_empty());
}

#[test]
fn test_removed_row_survives_round_trip() {
    let mut server = FakeServer::new();
    let mut widget = four_chunks(&server, false);

    let removed_node = row_node(&widget, "body", 2);
    click(&mut widget, "body", 2, UiControl::Remove).unwrap();
    assert!(!widget
        .document()
        .bindings()
        .is_bound(removed_node, Handler::Remove));

    click(&mut widget, "body", 1, UiControl::AddAfter).unwrap();
    server.pump(&mut widget).unwrap();

    let submitted = &server.handled()[0].form;
    let row = submitted.rows.iter().find(|r| r.delta == Delta::new(2)).unwrap();
    assert_eq!(row.view, ChunkView::Removed);

    let container = widget.container(&body()).unwrap();
    let row = container.row(Delta::new(2)).unwrap();
    assert_eq!(row.view, ChunkView::Removed);
    assert!(!row.visible);
    assert!(widget.field(&body()).unwrap().get(Delta::new(2)).is_none());
    assert!(!visible_deltas(&widget, "body").contains(&2));
}

#[test]
fn test_reset_returns_to_instance_selection() {
    let server = FakeServer::new();
    let mut widget = four_chunks(&server, false);

    click(&mut widget, "body", 1, UiControl::Edit).unwrap();
    click(&mut widget, "body", 1, UiControl::Reset).unwrap();

    let field = widget.field(&body()).unwrap();
    let chunk = field.chunk(Delta::new(1)).unwrap();
    assert_eq!(chunk.view(), ChunkView::InstanceSelection);
    assert_eq!(chunk.instance(), None);
    assert!(!field.config_cache().contains(Delta::new(1)));
    assert_eq!(field.active_chunk(), Some(Delta::new(1)));

    let row = widget.container(&body()).unwrap().row(Delta::new(1)).unwrap();
    assert_eq!(row.instance, None);
    assert!(!row.cancel_visible);
    assert!(row.preview_markup.is_empty());

    assert_eq!(
        widget.focused(),
        Some(&FocusTarget::InstanceOption {
            field: body(),
            delta: Delta::new(1),
            instance: InstanceName::new("heading"),
        })
    );
    assert!(widget.take_requests().is_empty());
}

#[test]
fn test_staged_chunk_cannot_be_removed() {
    let server = FakeServer::new();
    let mut widget = four_chunks(&server, true);
    let staged = widget.field(&body()).unwrap().staged_delta().unwrap();

    let err = click(&mut widget, "body", staged.get(), UiControl::Remove).unwrap_err();
    assert!(matches!(
        err,
        WidgetError::Chunks(ChunksError::InvalidTransition {
            from: ChunkView::Staged,
            ..
        })
    ));
    assert_eq!(
        widget.field(&body()).unwrap().chunk(staged).unwrap().view(),
        ChunkView::Staged
    );
}

#[test]
fn test_removal_survives_render_issued_before_it() {
    let mut server = FakeServer::new();
    let mut widget = ChunksWidget::default();
    widget
        .attach(vec![server.page(
            "body",
            &[("text", "a"), ("text", "b"), ("text", "c")],
            false,
        )])
        .unwrap();

    click(&mut widget, "body", 0, UiControl::AddAfter).unwrap();
    click(&mut widget, "body", 2, UiControl::Remove).unwrap();

    // The add's render still carries "c" in preview.
    assert_eq!(server.step(&mut widget).unwrap(), 1);
    let row = widget.container(&body()).unwrap().row(Delta::new(2)).unwrap();
    assert_eq!(row.view, ChunkView::Removed);
    assert!(!row.visible);
    assert!(!widget
        .document()
        .bindings()
        .is_bound(row_node(&widget, "body", 2), Handler::Remove));
    assert!(widget.field(&body()).unwrap().get(Delta::new(2)).is_none());
    assert_eq!(visible_deltas(&widget, "body"), vec![0, 3, 1]);
    assert_eq!(
        widget
            .audit()
            .count(|e| matches!(e, WidgetEvent::RemovedRowSuppressed { .. })),
        1
    );

    server.pump(&mut widget).unwrap();
    assert!(widget.field(&body()).unwrap().get(Delta::new(2)).is_none());
    assert_eq!(visible_deltas(&widget, "body"), vec![0, 3, 1]);
    assert_eq!(
        widget
            .audit()
            .count(|e| matches!(e, WidgetEvent::RemovedRowSuppressed { .. })),
        1
    );
}
