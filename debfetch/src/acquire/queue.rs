//! Per-method FIFO of download requests.
//!
//! Requests are kept in enqueue order. A send cursor marks the first request
//! not yet written to the method; everything before it is in flight. The
//! queue is an arena of doubly linked slots so that advancing the cursor,
//! removing an answered request from the middle, and moving a request to the
//! tail are all O(1) and never invalidate other handles.
//!
//! ```text
//!   head ─► [sent] ◄─► [sent] ◄─► [unsent] ◄─► [unsent] ◄─ tail
//!                                   ▲
//!                                 cursor
//! ```

use super::request::DownloadRequest;

/// Stable handle to a queued request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(usize);

#[derive(Debug)]
struct Slot {
    request: DownloadRequest,
    prev: Option<usize>,
    next: Option<usize>,
    sent: bool,
}

/// FIFO of requests with a cursor separating sent from unsent entries.
#[derive(Debug, Default)]
pub struct RequestQueue {
    slots: Vec<Option<Slot>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    cursor: Option<usize>,
    len: usize,
    in_flight: usize,
}

impl RequestQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of unresolved requests.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of requests written to the method and not yet answered.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Whether some request still waits to be written.
    pub fn has_unsent(&self) -> bool {
        self.cursor.is_some()
    }

    /// Appends a request at the tail; it becomes eligible for sending.
    pub fn push_back(&mut self, request: DownloadRequest) -> RequestId {
        let slot = Slot {
            request,
            prev: self.tail,
            next: None,
            sent: false,
        };
        let index = match self.free.pop() {
            Some(index) => {
                self.slots[index] = Some(slot);
                index
            }
            None => {
                self.slots.push(Some(slot));
                self.slots.len() - 1
            }
        };
        match self.tail {
            Some(tail) => self.slot_mut(tail).next = Some(index),
            None => self.head = Some(index),
        }
        self.tail = Some(index);
        if self.cursor.is_none() {
            self.cursor = Some(index);
        }
        self.len += 1;
        RequestId(index)
    }

    /// Returns the request under the cursor and moves the cursor past it.
    pub fn next_unsent(&mut self) -> Option<(RequestId, &DownloadRequest)> {
        let index = self.cursor?;
        let slot = self.slot_mut(index);
        slot.sent = true;
        let next = slot.next;
        self.cursor = next;
        self.in_flight += 1;
        Some((RequestId(index), &self.slot(index).request))
    }

    /// Finds the first request whose current target URI equals `uri`.
    ///
    /// Both sent and unsent requests are searched.
    pub fn find_by_uri(&self, uri: &str) -> Option<RequestId> {
        let mut current = self.head;
        while let Some(index) = current {
            let slot = self.slot(index);
            if slot.request.uri() == uri {
                return Some(RequestId(index));
            }
            current = slot.next;
        }
        None
    }

    pub fn get(&self, id: RequestId) -> Option<&DownloadRequest> {
        self.slots.get(id.0)?.as_ref().map(|slot| &slot.request)
    }

    pub fn get_mut(&mut self, id: RequestId) -> Option<&mut DownloadRequest> {
        self.slots
            .get_mut(id.0)?
            .as_mut()
            .map(|slot| &mut slot.request)
    }

    /// Unlinks a request and hands it back.
    pub fn remove(&mut self, id: RequestId) -> Option<DownloadRequest> {
        let slot = self.slots.get_mut(id.0)?.take()?;
        match slot.prev {
            Some(prev) => self.slot_mut(prev).next = slot.next,
            None => self.head = slot.next,
        }
        match slot.next {
            Some(next) => self.slot_mut(next).prev = slot.prev,
            None => self.tail = slot.prev,
        }
        if self.cursor == Some(id.0) {
            self.cursor = slot.next;
        }
        if slot.sent {
            self.in_flight -= 1;
        }
        self.len -= 1;
        self.free.push(id.0);
        Some(slot.request)
    }

    /// Moves a request to the tail so that it is sent again.
    ///
    /// The handle changes; the returned one replaces it.
    pub fn requeue(&mut self, id: RequestId) -> Option<RequestId> {
        let request = self.remove(id)?;
        Some(self.push_back(request))
    }

    /// Marks every request unsent, as after a method restart.
    pub fn rewind(&mut self) {
        let mut current = self.head;
        while let Some(index) = current {
            let slot = self.slot_mut(index);
            slot.sent = false;
            current = slot.next;
        }
        self.cursor = self.head;
        self.in_flight = 0;
    }

    /// Removes every request in FIFO order.
    pub fn drain(&mut self) -> Vec<DownloadRequest> {
        let mut drained = Vec::with_capacity(self.len);
        while let Some(head) = self.head {
            if let Some(request) = self.remove(RequestId(head)) {
                drained.push(request);
            }
        }
        self.slots.clear();
        self.free.clear();
        drained
    }

    /// Iterates over requests in FIFO order.
    pub fn iter(&self) -> impl Iterator<Item = &DownloadRequest> + '_ {
        let mut current = self.head;
        std::iter::from_fn(move || {
            let index = current?;
            let slot = self.slot(index);
            current = slot.next;
            Some(&slot.request)
        })
    }

    // Linked indices always point at occupied slots.
    fn slot(&self, index: usize) -> &Slot {
        match self.slots[index].as_ref() {
            Some(slot) => slot,
            None => unreachable!("queue link to empty slot {}", index),
        }
    }

    fn slot_mut(&mut self, index: usize) -> &mut Slot {
        match self.slots[index].as_mut() {
            Some(slot) => slot,
            None => unreachable!("queue link to empty slot {}", index),
        }
    }
}
