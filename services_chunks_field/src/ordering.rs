//! Drag-reorder weights and odd/even striping

use chunk_types::Stripe;
use widget_dom::FieldContainer;

/// Weight of the row at `visible_index` among `visible_count` rows
///
/// Weights are centered on zero in steps of two: three rows get -2, 0, 2.
pub fn visible_weight(visible_count: usize, visible_index: usize) -> i64 {
    let n = visible_count as i64;
    -(n - 1) + 2 * visible_index as i64
}

/// Reassigns every row's weight from its document position
///
/// Visible rows take the centered weights. Hidden rows follow, one apart,
/// so they never collide with a visible row. Every row's weight options
/// become the contiguous range spanning all assigned weights.
pub fn reset_weights(container: &mut FieldContainer) {
    let visible_count = container.visible_count();
    let first_hidden = visible_count as i64;

    let mut visible_index = 0;
    let mut hidden_index = 0;
    for row in container.rows.iter_mut() {
        if row.visible {
            row.weight = visible_weight(visible_count, visible_index);
            visible_index += 1;
        } else {
            row.weight = first_hidden + hidden_index;
            hidden_index += 1;
        }
    }

    let low = container.rows.iter().map(|r| r.weight).min().unwrap_or(0);
    let high = container.rows.iter().map(|r| r.weight).max().unwrap_or(0);
    let options: Vec<i64> = (low..=high).collect();
    for row in container.rows.iter_mut() {
        row.weight_options = options.clone();
    }
}

/// Labels visible rows odd/even by visible position; hidden rows get none
pub fn reset_stripes(container: &mut FieldContainer) {
    let mut visible_index = 0;
    for row in container.rows.iter_mut() {
        if row.visible {
            row.stripe = Some(Stripe::for_position(visible_index));
            visible_index += 1;
        } else {
            row.stripe = None;
        }
    }
}
