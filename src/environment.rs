use std::rc::Rc;

use crate::types::{Table, Value};

/// The scope stack for one evaluation session. Frame 0 is the permanent
/// global frame; frames above it belong to function calls, bare-scope
/// blocks and `pass` containers. Never empty.
#[derive(Debug)]
pub struct Context {
    frames: Vec<Rc<Table>>,
}

impl Context {
    pub fn new(global: Rc<Table>) -> Context {
        Context { frames: vec![global] }
    }

    pub fn global(&self) -> &Rc<Table> {
        &self.frames[0]
    }

    pub fn local(&self) -> &Rc<Table> {
        &self.frames[self.frames.len() - 1]
    }

    pub fn by_index(&self, index: usize) -> Option<&Rc<Table>> {
        self.frames.get(index)
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Pushes a frame, a fresh empty table when none is supplied. Used by
    /// function calls, bare-scope blocks, `pass` and the script-facing
    /// push hook.
    pub fn push(&mut self, frame: Option<Rc<Table>>) {
        self.frames.push(frame.unwrap_or_default());
    }

    /// Removes the top frame. The global frame is never removed, even when
    /// the script-facing pop hook is misused.
    pub fn pop(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    /// Reads from the local frame, falling back to the global frame when
    /// the local read yields null. A local slot explicitly holding null is
    /// indistinguishable from a missing one, by design of the value model.
    pub fn get_var(&self, name: &str) -> Value {
        let local = self.local().get(name);
        if matches!(local, Value::Null) {
            self.global().get(name)
        } else {
            local
        }
    }

    /// Writes into the local frame only.
    pub fn set_var(&self, name: &str, value: Value) {
        self.local().set(name, value);
    }

    pub fn get_global_var(&self, name: &str) -> Value {
        self.global().get(name)
    }

    pub fn set_global_var(&self, name: &str, value: Value) {
        self.global().set(name, value);
    }

    /// Variable-assignment frame resolution: an explicit global marker or a
    /// name already present in the global frame targets the global frame
    /// (this is what makes `global name;` declarations effective inside
    /// functions); everything else lands in the local frame.
    pub fn assign_var(&self, name: &str, value: Value, global: bool) {
        if global || self.global().exists(name) {
            self.global().set(name, value);
        } else {
            self.local().set(name, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_fall_back_to_global() {
        let mut ctx = Context::new(Rc::new(Table::new()));
        ctx.set_global_var("x", Value::Number(1.0));
        ctx.push(None);
        assert!(ctx.get_var("x").is_equal(&Value::Number(1.0)));
        ctx.set_var("x", Value::Number(2.0));
        assert!(ctx.get_var("x").is_equal(&Value::Number(2.0)));
        ctx.pop();
        assert!(ctx.get_var("x").is_equal(&Value::Number(1.0)));
    }

    #[test]
    fn global_frame_survives_pop() {
        let mut ctx = Context::new(Rc::new(Table::new()));
        ctx.pop();
        ctx.pop();
        assert_eq!(ctx.depth(), 1);
    }

    #[test]
    fn assignment_targets_global_when_declared_there() {
        let mut ctx = Context::new(Rc::new(Table::new()));
        ctx.set_global_var("declared", Value::Null);
        ctx.push(None);
        ctx.assign_var("declared", Value::Number(5.0), false);
        ctx.assign_var("fresh", Value::Number(6.0), false);
        ctx.pop();
        assert!(ctx.get_global_var("declared").is_equal(&Value::Number(5.0)));
        assert!(matches!(ctx.get_global_var("fresh"), Value::Null));
    }
}
