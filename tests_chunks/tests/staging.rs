//! Staged-chunk claims, redemption order and follow-up adds

use chunk_types::{ChunkView, Delta, FieldName, TicketId};
use services_chunks_field::{AddOrigin, WidgetEvent};
use services_field_registry::{ChunksWidget, UiControl};
use tests_chunks::{click, click_add_before, select, staged_counts, visible_deltas, FakeServer};

fn body() -> FieldName {
    FieldName::new("body")
}

fn redemptions(widget: &ChunksWidget) -> Vec<(TicketId, AddOrigin, Delta)> {
    widget
        .audit()
        .events()
        .filter_map(|e| match e {
            WidgetEvent::Redeemed {
                ticket,
                origin,
                delta,
                ..
            } => Some((*ticket, *origin, *delta)),
            _ => None,
        })
        .collect()
}

#[test]
fn test_staged_slot_never_exceeds_one() {
    let mut server = FakeServer::new();
    let mut widget = ChunksWidget::default();
    widget
        .attach(vec![server.page("body", &[("text", "a"), ("text", "b")], true)])
        .unwrap();

    for round in 0..4 {
        let (rows, chunks) = staged_counts(&widget, "body");
        assert!(rows <= 1 && chunks <= 1, "round {}", round);

        click(&mut widget, "body", 0, UiControl::AddAfter).unwrap();
        let (rows, chunks) = staged_counts(&widget, "body");
        assert!(rows <= 1 && chunks <= 1, "round {}", round);

        server.pump(&mut widget).unwrap();
        let (rows, chunks) = staged_counts(&widget, "body");
        assert_eq!((rows, chunks), (1, 1), "round {}", round);
    }
    assert_eq!(visible_deltas(&widget, "body").len(), 6);
}

#[test]
fn test_claims_redeem_in_claim_order() {
    let mut server = FakeServer::new();
    let mut widget = ChunksWidget::default();
    widget
        .attach(vec![server.page("body", &[("text", "a"), ("text", "b")], false)])
        .unwrap();

    click(&mut widget, "body", 0, UiControl::AddAfter).unwrap();
    click(&mut widget, "body", 1, UiControl::AddAfter).unwrap();
    click_add_before(&mut widget, "body").unwrap();
    assert_eq!(widget.field(&body()).unwrap().claims().len(), 3);

    server.pump(&mut widget).unwrap();

    let redeemed = redemptions(&widget);
    let origins: Vec<AddOrigin> = redeemed.iter().map(|r| r.1).collect();
    assert_eq!(
        origins,
        vec![
            AddOrigin::After(Delta::new(0)),
            AddOrigin::After(Delta::new(1)),
            AddOrigin::Before
        ]
    );
    let tickets: Vec<TicketId> = redeemed.iter().map(|r| r.0).collect();
    let mut sorted = tickets.clone();
    sorted.sort();
    assert_eq!(tickets, sorted);

    // Each new chunk sits right after its origin, "before" at the start.
    let shown: Vec<u32> = redeemed.iter().map(|r| r.2.get()).collect();
    assert_eq!(
        visible_deltas(&widget, "body"),
        vec![shown[2], 0, shown[0], 1, shown[1]]
    );
    assert!(widget.field(&body()).unwrap().claims().is_empty());
}

#[test]
fn test_second_add_waits_for_settle() {
    let mut server = FakeServer::new();
    let mut widget = ChunksWidget::default();
    widget
        .attach(vec![server.page("body", &[("text", "a"), ("text", "b")], false)])
        .unwrap();

    click(&mut widget, "body", 1, UiControl::AddAfter).unwrap();
    click(&mut widget, "body", 1, UiControl::AddAfter).unwrap();

    let field = widget.field(&body()).unwrap();
    assert_eq!(field.claims().len(), 2);
    assert!(field.in_flight().is_some());
    assert_eq!(field.follow_up(), Some(AddOrigin::After(Delta::new(1))));
    let row = widget.container(&body()).unwrap().row(Delta::new(1)).unwrap();
    assert_eq!(row.progress.as_deref(), Some("Please wait..."));

    assert_eq!(server.step(&mut widget).unwrap(), 1);
    assert_eq!(redemptions(&widget).len(), 1);
    let row = widget.container(&body()).unwrap().row(Delta::new(1)).unwrap();
    assert!(row.progress.is_some());

    assert_eq!(server.step(&mut widget).unwrap(), 1);
    assert_eq!(redemptions(&widget).len(), 2);
    let row = widget.container(&body()).unwrap().row(Delta::new(1)).unwrap();
    assert!(row.progress.is_none());

    server.pump(&mut widget).unwrap();
    assert_eq!(redemptions(&widget).len(), 2);
    assert_eq!(
        widget
            .audit()
            .count(|e| matches!(e, WidgetEvent::FollowUpFired { .. })),
        2
    );
}

#[test]
fn test_promoted_chunk_gets_focus_after_settle() {
    let mut server = FakeServer::new();
    let mut widget = ChunksWidget::default();
    widget
        .attach(vec![server.page("body", &[("text", "a")], true)])
        .unwrap();

    click(&mut widget, "body", 0, UiControl::AddAfter).unwrap();
    server.pump(&mut widget).unwrap();

    let focused = widget.focused().cloned().unwrap();
    assert_eq!(focused.delta(), Some(Delta::new(1)));
    assert!(matches!(
        focused,
        chunk_types::FocusTarget::InstanceOption { .. }
    ));

    select(&mut widget, "body", 1, "heading").unwrap();
    assert_eq!(
        widget.field(&body()).unwrap().chunk(Delta::new(1)).unwrap().view(),
        ChunkView::Configuration
    );
}

#[test]
fn test_staged_chunk_shown_hook_sees_origin() {
    use chunk_plugins::{HookCommand, LifecycleHooks};
    use std::cell::RefCell;
    use std::rc::Rc;

    let mut server = FakeServer::new();
    let mut widget = ChunksWidget::default();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let log = seen.clone();
    widget.plugins_mut().register_hooks(
        "text",
        LifecycleHooks::new().on_staged_chunk_shown(move |shown, origin| {
            log.borrow_mut()
                .push((shown.delta, origin.map(|o| o.delta)));
            vec![HookCommand::SelectInstance {
                delta: shown.delta,
                instance: "text".into(),
            }]
        }),
    );
    widget
        .attach(vec![server.page("body", &[("text", "a")], true)])
        .unwrap();

    click(&mut widget, "body", 0, UiControl::AddAfter).unwrap();
    assert_eq!(*seen.borrow(), vec![(Delta::new(1), Some(Delta::new(0)))]);
    assert_eq!(
        widget.field(&body()).unwrap().chunk(Delta::new(1)).unwrap().view(),
        ChunkView::Configuration
    );

    server.pump(&mut widget).unwrap();
    click_add_before(&mut widget, "body").unwrap();
    assert_eq!(seen.borrow().last(), Some(&(Delta::new(2), None)));
}
