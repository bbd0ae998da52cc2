//! Rendering boundary.

use crate::event::RenderInstruction;

/// Paints render instructions. Must not block.
pub trait Renderer: Send {
    /// Apply one instruction.
    fn render(&mut self, instruction: RenderInstruction);
}
