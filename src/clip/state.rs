use crate::clip::stack::ClipStack;

/// Save/restore stack of clip stacks owned by a framebuffer.
///
/// The last element is the current clip. A saved frame starts out as an
/// empty stack, so clips pushed before `save` don't apply until `restore`.
#[derive(Clone, Debug)]
pub struct ClipState {
    stacks: Vec<ClipStack>,
}

impl Default for ClipState {
    fn default() -> Self {
        Self::new()
    }
}

impl ClipState {
    /// A single frame holding an empty stack.
    pub fn new() -> Self {
        Self {
            stacks: vec![ClipStack::new()],
        }
    }

    /// Number of frames, including the initial one.
    pub fn depth(&self) -> usize {
        self.stacks.len()
    }

    /// Start a new frame with an empty stack.
    pub fn save(&mut self) {
        self.stacks.push(ClipStack::new());
    }

    /// # Panics
    ///
    /// Panics when there is no matching `save`.
    pub fn restore(&mut self) {
        assert!(
            self.stacks.len() > 1,
            "clip stack restore without a matching save"
        );
        self.stacks.pop();
    }

    /// The current frame's stack.
    pub fn current(&self) -> &ClipStack {
        let last = self.stacks.len() - 1;
        &self.stacks[last]
    }

    /// Mutable access to the current frame's stack.
    pub fn current_mut(&mut self) -> &mut ClipStack {
        let last = self.stacks.len() - 1;
        &mut self.stacks[last]
    }

    /// Replace the current frame's stack, dropping the old one.
    pub fn set_current(&mut self, stack: ClipStack) {
        *self.current_mut() = stack;
    }
}

#[cfg(test)]
#[path = "../../tests/unit/clip/state.rs"]
mod tests;
