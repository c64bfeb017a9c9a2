use core::fmt;
use core::num::NonZeroUsize;

const NIL: usize = usize::MAX;

/// Stable handle to a node in a [`List`].
///
/// Handles are slot indices and are recycled after removal, so a handle must
/// not be used once its node has been removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct NodeId(usize);

struct Slot<T> {
    val: Option<T>,
    prev: usize,
    next: usize,
}

/// A doubly linked list stored in an arena, with fixed capacity.
///
/// Nodes live in a `Vec` and link to each other by index, so move-to-front and
/// removal are O(1) without raw pointers. Freed slots are recycled through a
/// free list; the arena never grows beyond `cap` slots.
///
/// The front of the list is the most recently used node.
pub(crate) struct List<T> {
    cap: NonZeroUsize,
    len: usize,
    slots: Vec<Slot<T>>,
    free: Vec<usize>,
    head: usize,
    tail: usize,
}

impl<T> List<T> {
    /// Creates a new list that holds at most `cap` items.
    pub(crate) fn new(cap: NonZeroUsize) -> List<T> {
        List {
            cap,
            len: 0,
            slots: Vec::new(),
            free: Vec::new(),
            head: NIL,
            tail: NIL,
        }
    }

    #[inline]
    pub(crate) fn cap(&self) -> NonZeroUsize {
        self.cap
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub(crate) fn is_full(&self) -> bool {
        self.len >= self.cap.get()
    }

    /// Adds a value at the front. The caller makes room first.
    pub(crate) fn add(&mut self, v: T) -> NodeId {
        debug_assert!(!self.is_full(), "list is at capacity");
        let idx = match self.free.pop() {
            Some(idx) => {
                self.slots[idx].val = Some(v);
                idx
            }
            None => {
                self.slots.push(Slot {
                    val: Some(v),
                    prev: NIL,
                    next: NIL,
                });
                self.slots.len() - 1
            }
        };
        self.attach(idx);
        NodeId(idx)
    }

    fn attach(&mut self, idx: usize) {
        self.slots[idx].prev = NIL;
        self.slots[idx].next = self.head;
        if self.head == NIL {
            self.tail = idx;
        } else {
            self.slots[self.head].prev = idx;
        }
        self.head = idx;
        self.len += 1;
    }

    fn detach(&mut self, idx: usize) {
        let (prev, next) = (self.slots[idx].prev, self.slots[idx].next);
        if prev == NIL {
            self.head = next;
        } else {
            self.slots[prev].next = next;
        }
        if next == NIL {
            self.tail = prev;
        } else {
            self.slots[next].prev = prev;
        }
        self.slots[idx].prev = NIL;
        self.slots[idx].next = NIL;
        self.len -= 1;
    }

    fn is_live(&self, id: NodeId) -> bool {
        self.slots.get(id.0).is_some_and(|s| s.val.is_some())
    }

    /// Moves a node to the front of the list.
    pub(crate) fn move_to_front(&mut self, id: NodeId) {
        if !self.is_live(id) || self.head == id.0 {
            return;
        }
        self.detach(id.0);
        self.attach(id.0);
    }

    /// Unlinks a node and returns its value.
    pub(crate) fn remove(&mut self, id: NodeId) -> Option<T> {
        if !self.is_live(id) {
            return None;
        }
        self.detach(id.0);
        self.free.push(id.0);
        self.slots[id.0].val.take()
    }

    /// Handle of the back (least recently used) node.
    #[inline]
    pub(crate) fn last(&self) -> Option<NodeId> {
        (self.tail != NIL).then_some(NodeId(self.tail))
    }

    pub(crate) fn get_value(&self, id: NodeId) -> Option<&T> {
        self.slots.get(id.0).and_then(|s| s.val.as_ref())
    }

    pub(crate) fn get_value_mut(&mut self, id: NodeId) -> Option<&mut T> {
        self.slots.get_mut(id.0).and_then(|s| s.val.as_mut())
    }

    /// Handle of the node before `id` (towards the front).
    pub(crate) fn prev_of(&self, id: NodeId) -> Option<NodeId> {
        let prev = self.slots.get(id.0)?.prev;
        (prev != NIL).then_some(NodeId(prev))
    }

    /// Iterates values from front (MRU) to back (LRU).
    pub(crate) fn iter(&self) -> Iter<'_, T> {
        Iter {
            list: self,
            cursor: self.head,
        }
    }

    /// Drops every node and releases the arena.
    pub(crate) fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.head = NIL;
        self.tail = NIL;
        self.len = 0;
    }

    /// Walks the list in both directions and checks link consistency.
    #[cfg(test)]
    pub(crate) fn validate(&self) {
        let mut count = 0;
        let mut prev = NIL;
        let mut cursor = self.head;
        while cursor != NIL {
            assert_eq!(self.slots[cursor].prev, prev, "broken back link");
            assert!(self.slots[cursor].val.is_some(), "dead node linked");
            prev = cursor;
            cursor = self.slots[cursor].next;
            count += 1;
        }
        assert_eq!(prev, self.tail, "tail does not terminate the list");
        assert_eq!(count, self.len, "len does not match reachable nodes");
        assert!(self.len <= self.cap.get());
    }
}

pub(crate) struct Iter<'a, T> {
    list: &'a List<T>,
    cursor: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        if self.cursor == NIL {
            return None;
        }
        let slot = &self.list.slots[self.cursor];
        self.cursor = slot.next;
        slot.val.as_ref()
    }
}

impl<T> fmt::Debug for List<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("List")
            .field("cap", &self.cap)
            .field("len", &self.len)
            .finish()
    }
}
