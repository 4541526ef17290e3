//! Destroyed flag shared with in-flight store continuations.
//!
//! Store calls cannot be cancelled. Instead every continuation holds a clone of
//! the token and checks it before touching annotator or thread state.

use std::cell::Cell;
use std::rc::Rc;

/// Single-threaded destroy token.
///
/// All clones observe [`DestroyToken::destroy`]. The flag is one-way.
#[derive(Debug, Clone, Default)]
pub struct DestroyToken {
    destroyed: Rc<Cell<bool>>,
}

impl DestroyToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark as destroyed. Idempotent.
    pub fn destroy(&self) {
        self.destroyed.set(true);
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.get()
    }

    /// Token that reports destroyed when either this one or `other` is.
    pub fn join<'a>(&'a self, other: &'a DestroyToken) -> JoinedToken<'a> {
        JoinedToken { first: self, second: other }
    }
}

/// Borrowed view over two tokens.
#[derive(Debug, Clone, Copy)]
pub struct JoinedToken<'a> {
    first: &'a DestroyToken,
    second: &'a DestroyToken,
}

impl JoinedToken<'_> {
    pub fn is_destroyed(&self) -> bool {
        self.first.is_destroyed() || self.second.is_destroyed()
    }
}
