// C11: Error Report Entry. Invoked by the VM when a script exception goes
// unhandled; finds the nearest scripted frame and enters the front end the
// same way a breakpoint hit would, except the halt is never resumed to
// continue the faulted instruction (the caller is responsible for actually
// unwinding/terminating - this module only decides what to show).

use crate::frames::{self, SelectedFrame};
use crate::vm::{ContextRegistry, FrameIterator};

pub struct ErrorReport {
    pub selected: SelectedFrame,
}

// Returns `None` if no scripted frame exists anywhere on the stack - an
// unhandled error with no scripted frame can't be meaningfully shown and the
// caller should fall back to terminating without entering the console.
pub fn prepare(frames: &dyn FrameIterator, contexts: &dyn ContextRegistry) -> Option<ErrorReport> {
    let selected = frames::enter(frames, contexts)?;
    Some(ErrorReport { selected })
}
