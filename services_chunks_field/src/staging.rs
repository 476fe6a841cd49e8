//! Claims on a field's staged chunk
//!
//! Every add request takes a ticket. Only the oldest ticket may be
//! redeemed, so staged chunks are handed out strictly in claim order.

use chunk_types::{Delta, TicketId};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// Where a requested chunk goes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddOrigin {
    /// The field-level "add before" control
    Before,
    /// The "add after" control of a chunk
    After(Delta),
}

impl AddOrigin {
    /// Follows the anchor chunk to the delta a render gave it
    pub fn renumbered(self, map: impl Fn(Delta) -> Delta) -> Self {
        match self {
            AddOrigin::Before => AddOrigin::Before,
            AddOrigin::After(delta) => AddOrigin::After(map(delta)),
        }
    }
}

impl fmt::Display for AddOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddOrigin::Before => write!(f, "before all"),
            AddOrigin::After(delta) => write!(f, "after {}", delta),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub ticket: TicketId,
    pub origin: AddOrigin,
}

#[derive(Debug, Default)]
pub struct StagingQueue {
    claims: VecDeque<Claim>,
    next_ticket: u64,
    /// A request that will produce a staged chunk is outstanding
    loading: bool,
}

impl StagingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes a ticket at the back of the line
    pub fn claim(&mut self, origin: AddOrigin) -> Claim {
        let claim = Claim {
            ticket: TicketId::new(self.next_ticket),
            origin,
        };
        self.next_ticket += 1;
        self.claims.push_back(claim);
        claim
    }

    pub fn head(&self) -> Option<&Claim> {
        self.claims.front()
    }

    pub fn is_head(&self, ticket: TicketId) -> bool {
        self.head().map(|c| c.ticket == ticket).unwrap_or(false)
    }

    /// Removes the head-of-line claim for redemption
    pub fn redeem_head(&mut self) -> Option<Claim> {
        self.claims.pop_front()
    }

    pub fn claims(&self) -> impl Iterator<Item = &Claim> {
        self.claims.iter()
    }

    /// Claims behind the head
    pub fn waiting(&self) -> impl Iterator<Item = &Claim> {
        self.claims.iter().skip(1)
    }

    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
    }

    /// Re-points every claim at renumbered anchors
    pub fn renumber(&mut self, map: impl Fn(Delta) -> Delta) {
        for claim in self.claims.iter_mut() {
            claim.origin = claim.origin.renumbered(&map);
        }
    }

    pub fn clear(&mut self) {
        self.claims.clear();
        self.loading = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claims_are_redeemed_in_order() {
        let mut staging = StagingQueue::new();
        let a = staging.claim(AddOrigin::After(Delta::new(0)));
        let b = staging.claim(AddOrigin::Before);
        let c = staging.claim(AddOrigin::After(Delta::new(2)));

        assert!(staging.is_head(a.ticket));
        assert!(!staging.is_head(b.ticket));
        assert_eq!(staging.waiting().count(), 2);

        assert_eq!(staging.redeem_head(), Some(a));
        assert_eq!(staging.redeem_head(), Some(b));
        assert_eq!(staging.redeem_head(), Some(c));
        assert!(staging.redeem_head().is_none());
    }

    #[test]
    fn test_tickets_are_unique() {
        let mut staging = StagingQueue::new();
        let a = staging.claim(AddOrigin::Before);
        staging.redeem_head();
        let b = staging.claim(AddOrigin::Before);
        assert_ne!(a.ticket, b.ticket);
    }

    #[test]
    fn test_origin_display() {
        assert_eq!(AddOrigin::Before.to_string(), "before all");
        assert_eq!(AddOrigin::After(Delta::new(3)).to_string(), "after 3");
    }

    #[test]
    fn test_renumber_moves_anchors_only() {
        let mut staging = StagingQueue::new();
        let a = staging.claim(AddOrigin::After(Delta::new(3)));
        staging.claim(AddOrigin::Before);
        staging.claim(AddOrigin::After(Delta::new(1)));

        staging.renumber(|d| if d == Delta::new(3) { Delta::new(2) } else { d });
        let origins: Vec<AddOrigin> = staging.claims().map(|c| c.origin).collect();
        assert_eq!(
            origins,
            vec![
                AddOrigin::After(Delta::new(2)),
                AddOrigin::Before,
                AddOrigin::After(Delta::new(1))
            ]
        );
        assert!(staging.is_head(a.ticket));
    }
}
