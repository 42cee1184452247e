//! Lexical environments ("stashes") used for closures that capture
//! variables by reference rather than by value.
//!
//! Most local variables live directly on the VM's operand stack (see the
//! "stashless" optimization in `bytecode::compiler`): a stash is only
//! allocated for a function whose body contains a nested function
//! literal that reaches outward to one of its variables. Because a
//! stash can only ever point to the stash of its *lexically enclosing*
//! scope at the moment it was created, the resulting graph is a DAG
//! rooted at the program's top-level stash — never a cycle — so plain
//! `Rc` reference counting reclaims it with no collector.

use std::cell::RefCell;
use std::rc::Rc;

use crate::value::Value;

/// One level of captured lexical scope: a fixed-size vector of slots
/// plus a link to the next scope outward, or `None` at the top level.
#[derive(Debug)]
pub struct Stash {
    slots: RefCell<Vec<Value>>,
    pub outer: Option<Rc<Stash>>,
}

impl Stash {
    pub fn new(size: usize, outer: Option<Rc<Stash>>) -> Rc<Stash> {
        Rc::new(Stash {
            slots: RefCell::new(vec![Value::Null; size]),
            outer,
        })
    }

    /// Walks `level` stashes outward (0 = this one) and reads `index`.
    pub fn load(self: &Rc<Self>, level: u32, index: usize) -> Value {
        self.at_level(level).slots.borrow()[index].clone()
    }

    pub fn store(self: &Rc<Self>, level: u32, index: usize, value: Value) {
        self.at_level(level).slots.borrow_mut()[index] = value;
    }

    fn at_level(self: &Rc<Self>, level: u32) -> Rc<Stash> {
        let mut cur = Rc::clone(self);
        for _ in 0..level {
            cur = Rc::clone(cur.outer.as_ref().expect("compiler guarantees enough outer levels"));
        }
        cur
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_and_writes_same_level() {
        let stash = Stash::new(2, None);
        stash.store(0, 0, Value::Int(7));
        assert_eq!(stash.load(0, 0).to_int(), 7);
    }

    #[test]
    fn walks_outer_chain_for_captures() {
        let outer = Stash::new(1, None);
        outer.store(0, 0, Value::Int(42));
        let inner = Stash::new(1, Some(Rc::clone(&outer)));
        assert_eq!(inner.load(1, 0).to_int(), 42);
    }

    #[test]
    fn mutation_through_one_handle_is_visible_through_another() {
        let outer = Stash::new(1, None);
        let inner_a = Stash::new(0, Some(Rc::clone(&outer)));
        let inner_b = Stash::new(0, Some(Rc::clone(&outer)));
        inner_a.store(1, 0, Value::Int(1));
        assert_eq!(inner_b.load(1, 0).to_int(), 1);
    }
}
