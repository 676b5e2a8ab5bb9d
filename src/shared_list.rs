use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;

/// Persistent singly-linked list whose nodes are shared between handles.
/// Cloning a handle shares the tail; mutating an element through one handle
/// is visible through every handle that reaches the same node.
#[derive(Debug)]
pub struct SharedList<T> {
    head: Link<T>,
}

type Link<T> = Option<Rc<RefCell<Node<T>>>>;

#[derive(Debug)]
struct Node<T> {
    elem: T,
    next: Link<T>,
}

impl<T> Clone for SharedList<T> {
    fn clone(&self) -> SharedList<T> {
        SharedList {
            head: self.head.clone(),
        }
    }
}

impl<T> SharedList<T> {
    pub fn new() -> Self {
        SharedList { head: None }
    }

    /// A new list with `elem` in front of this one.
    pub fn prepend(&self, elem: T) -> SharedList<T> {
        SharedList {
            head: Some(Rc::new(RefCell::new(Node {
                elem,
                next: self.head.clone(),
            }))),
        }
    }

    pub fn peek(&self) -> Option<Ref<'_, T>> {
        self.head
            .as_ref()
            .map(|node| Ref::map(node.borrow(), |node| &node.elem))
    }

    pub fn peek_mut(&self) -> Option<RefMut<'_, T>> {
        self.head
            .as_ref()
            .map(|node| RefMut::map(node.borrow_mut(), |node| &mut node.elem))
    }

    pub fn tail(&self) -> SharedList<T> {
        SharedList {
            head: self
                .head
                .as_ref()
                .and_then(|old_head| old_head.borrow().next.clone()),
        }
    }

    /// The list starting `distance` nodes further along, if it is that long.
    pub fn nth_tail(&self, distance: usize) -> Option<SharedList<T>> {
        let mut list = self.clone();
        for _ in 0..distance {
            if list.empty() {
                return None;
            }
            list = list.tail();
        }
        if list.empty() {
            None
        } else {
            Some(list)
        }
    }

    /// Applies `f` front to back, stopping at the first `Some`.
    pub fn find_map<R>(&self, mut f: impl FnMut(&mut T) -> Option<R>) -> Option<R> {
        let mut cur = self.head.clone();
        while let Some(node) = cur {
            if let Some(found) = f(&mut node.borrow_mut().elem) {
                return Some(found);
            }
            cur = node.borrow().next.clone();
        }
        None
    }

    pub fn len(&self) -> usize {
        let mut count = 0;
        self.find_map(|_| -> Option<()> {
            count += 1;
            None
        });
        count
    }

    pub fn empty(&self) -> bool {
        self.head.is_none()
    }

    pub fn equals(&self, other: &SharedList<T>) -> bool {
        match (&self.head, &other.head) {
            (None, None) => true,
            (Some(l), Some(r)) => Rc::ptr_eq(l, r),
            _ => false,
        }
    }
}

impl<T> Drop for SharedList<T> {
    // Unlink uniquely owned nodes iteratively so long chains don't recurse.
    fn drop(&mut self) {
        let mut cur = self.head.take();
        while let Some(node) = cur {
            match Rc::try_unwrap(node) {
                Ok(node) => cur = node.into_inner().next,
                Err(_) => break,
            }
        }
    }
}
