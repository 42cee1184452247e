//! Lexical scope resolution during compilation.
//!
//! Each function literal (and the top-level program) gets one [`Scope`]
//! on the compiler's scope stack while its body is being compiled.
//! `resolve` walks the stack from the innermost scope outward, and as a
//! side effect marks every scope it passes through as `needs_stash`:
//! the function owning a captured variable needs a stash to hold it,
//! and every function lexically between the capture site and the
//! reference site needs one too, purely to keep the `Stash::outer`
//! chain unbroken. A scope nobody ever reaches into stays
//! `needs_stash == false` and its function is compiled "stashless": its
//! locals live directly on the VM's operand stack (see
//! `Compiler::close_function`).

#[derive(Debug, Default)]
pub struct Scope {
    names: Vec<(String, u32)>,
    next_slot: u32,
    pub needs_stash: bool,
    /// Instruction range `[start, end)` this scope's function body
    /// occupies in the shared instruction stream, filled in when the
    /// scope closes.
    pub range: (u32, u32),
}

impl Scope {
    pub fn new(start: u32) -> Self {
        Scope {
            range: (start, start),
            ..Default::default()
        }
    }

    pub fn declare(&mut self, name: &str) -> u32 {
        let slot = self.next_slot;
        self.next_slot += 1;
        self.names.push((name.to_string(), slot));
        slot
    }

    pub fn frame_size(&self) -> usize {
        self.next_slot as usize
    }

    fn find(&self, name: &str) -> Option<u32> {
        self.names.iter().rev().find(|(n, _)| n == name).map(|(_, s)| *s)
    }
}

pub enum Resolved {
    /// Found at `level` scopes outward (0 = the innermost/current
    /// scope) at the given slot.
    Found { level: u32, slot: u32 },
    /// Not declared in any enclosing lexical scope; the caller should
    /// fall back to the host's global table.
    Global,
}

#[derive(Default)]
pub struct ScopeStack {
    scopes: Vec<Scope>,
}

impl ScopeStack {
    pub fn push(&mut self, start: u32) {
        self.scopes.push(Scope::new(start));
    }

    pub fn pop(&mut self) -> Scope {
        self.scopes.pop().expect("scope stack underflow")
    }

    pub fn current(&mut self) -> &mut Scope {
        self.scopes.last_mut().expect("no active scope")
    }

    pub fn declare(&mut self, name: &str) -> u32 {
        self.current().declare(name)
    }

    /// Resolves `name` against the lexical scope stack, innermost
    /// first, marking every scope on the path `needs_stash` when the
    /// binding is found outside the current scope.
    pub fn resolve(&mut self, name: &str) -> Resolved {
        let top = self.scopes.len();
        for depth in 0..top {
            let idx = top - 1 - depth;
            if let Some(slot) = self.scopes[idx].find(name) {
                if depth > 0 {
                    for mark in idx..top {
                        self.scopes[mark].needs_stash = true;
                    }
                }
                return Resolved::Found { level: depth as u32, slot };
            }
        }
        Resolved::Global
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_own_scope_without_marking_stash() {
        let mut stack = ScopeStack::default();
        stack.push(0);
        stack.declare("x");
        match stack.resolve("x") {
            Resolved::Found { level, slot } => {
                assert_eq!(level, 0);
                assert_eq!(slot, 0);
            }
            Resolved::Global => panic!("expected Found"),
        }
        assert!(!stack.current().needs_stash);
    }

    #[test]
    fn resolving_outer_name_marks_chain_needing_stash() {
        let mut stack = ScopeStack::default();
        stack.push(0);
        stack.declare("x");
        stack.push(10);
        match stack.resolve("x") {
            Resolved::Found { level, .. } => assert_eq!(level, 1),
            Resolved::Global => panic!("expected Found"),
        }
        assert!(stack.scopes[0].needs_stash);
        assert!(stack.scopes[1].needs_stash);
    }

    #[test]
    fn unresolved_name_is_global() {
        let mut stack = ScopeStack::default();
        stack.push(0);
        assert!(matches!(stack.resolve("missing"), Resolved::Global));
    }
}
