//! Pagination state machine for one feed instance.
//!
//! ```text
//! Uninitialized -> Discovering -> Ready(offset, has_more) -> Exhausted
//!                       |                  |
//!                       +-> Empty          +-> Failed
//! ```
//!
//! Every discovery starts a new generation. Discovery results and page tickets
//! carry the generation they were issued under; anything from an older
//! generation is rejected instead of clobbering newer state.

use serde::Serialize;
use utoipa::ToSchema;

use crate::models::Discovered;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FeedState {
    Uninitialized,
    Discovering,
    Ready { offset: usize, has_more: bool },
    /// Content was shown and nothing is left.
    Exhausted,
    /// Nothing to show: discovery found nothing, or no discovered post loaded.
    Empty,
    Failed { message: String },
}

/// Permission to fetch one page, bound to the generation that issued it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageTicket {
    generation: u64,
    start: usize,
    end: usize,
}

impl PageTicket {
    pub fn generation(&self) -> u64 { self.generation }
    pub fn len(&self) -> usize { self.end - self.start }
    pub fn is_empty(&self) -> bool { self.start == self.end }
}

#[derive(Debug)]
pub struct Paginator<T> {
    state: FeedState,
    ids: Vec<Discovered>,
    items: Vec<T>,
    page_size: usize,
    in_flight: bool,
    generation: u64,
}

impl<T> Paginator<T> {
    pub fn new(page_size: usize) -> Self {
        Self {
            state: FeedState::Uninitialized,
            ids: Vec::new(),
            items: Vec::new(),
            page_size: page_size.max(1),
            in_flight: false,
            generation: 0,
        }
    }

    pub fn state(&self) -> &FeedState { &self.state }
    pub fn items(&self) -> &[T] { &self.items }
    pub fn items_mut(&mut self) -> &mut [T] { &mut self.items }
    pub fn discovered(&self) -> &[Discovered] { &self.ids }
    pub fn generation(&self) -> u64 { self.generation }
    pub fn is_loading(&self) -> bool {
        self.in_flight || self.state == FeedState::Discovering
    }
    pub fn has_more(&self) -> bool {
        matches!(self.state, FeedState::Ready { has_more: true, .. })
    }

    /// Invalidates everything loaded so far and opens a new generation.
    pub fn begin_discovery(&mut self) -> u64 {
        self.generation += 1;
        self.ids.clear();
        self.items.clear();
        self.in_flight = false;
        self.state = FeedState::Discovering;
        self.generation
    }

    /// Returns false when `generation` has been superseded.
    pub fn finish_discovery(&mut self, generation: u64, ids: Vec<Discovered>) -> bool {
        if generation != self.generation {
            return false;
        }
        self.state = if ids.is_empty() {
            FeedState::Empty
        } else {
            FeedState::Ready { offset: 0, has_more: true }
        };
        self.ids = ids;
        true
    }

    /// Marks the current generation failed. Returns false when stale.
    pub fn fail(&mut self, generation: u64, message: impl Into<String>) -> bool {
        if generation != self.generation {
            return false;
        }
        self.in_flight = false;
        self.state = FeedState::Failed { message: message.into() };
        true
    }

    /// Hands out the next page, or `None` while a page is in flight or
    /// nothing is left to load.
    pub fn begin_page(&mut self) -> Option<PageTicket> {
        if self.in_flight {
            return None;
        }
        let offset = match self.state {
            FeedState::Ready { offset, has_more: true } => offset,
            _ => return None,
        };
        let end = (offset + self.page_size).min(self.ids.len());
        self.in_flight = true;
        Some(PageTicket { generation: self.generation, start: offset, end })
    }

    /// Ids covered by `ticket`; empty when the ticket is stale.
    pub fn page_ids(&self, ticket: &PageTicket) -> &[Discovered] {
        if ticket.generation != self.generation {
            return &[];
        }
        &self.ids[ticket.start..ticket.end]
    }

    /// Appends a fetched page. Returns false (and drops `items`) when stale.
    pub fn complete_page(&mut self, ticket: PageTicket, items: Vec<T>) -> bool {
        if ticket.generation != self.generation {
            return false;
        }
        self.in_flight = false;
        self.items.extend(items);
        self.state = if ticket.end >= self.ids.len() {
            // every discovered post failed to load
            if self.items.is_empty() { FeedState::Empty } else { FeedState::Exhausted }
        } else {
            FeedState::Ready { offset: ticket.end, has_more: true }
        };
        true
    }
}
