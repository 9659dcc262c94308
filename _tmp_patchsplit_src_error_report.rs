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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::mock::MockMetadata;
    use crate::metadata::DebugMetadata;
    use crate::vm::{AddressSpace, Cell, ContextId, UCell, VmContext};
    use std::collections::HashMap;

    struct FakeSpace;
    impl AddressSpace for FakeSpace {
        fn translate(&self, addr: Cell) -> Option<usize> { Some(addr as usize) }
        fn read_cell_phys(&self, _phys: usize) -> Option<Cell> { Some(0) }
        fn write_cell_phys(&mut self, _phys: usize, _value: Cell) -> bool { true }
        fn read_cstring(&self, _addr: Cell, _max_len: usize) -> Option<Vec<u8>> { None }
    }

    struct FakeContext { id: ContextId, space: FakeSpace, meta: MockMetadata }
    impl VmContext for FakeContext {
        fn id(&self) -> ContextId { self.id }
        fn frm(&self) -> Cell { 0 }
        fn address_space(&self) -> &dyn AddressSpace { &self.space }
        fn address_space_mut(&mut self) -> &mut dyn AddressSpace { &mut self.space }
        fn image(&self) -> &dyn DebugMetadata { &self.meta }
    }

    struct FakeRegistry(FakeContext);
    impl ContextRegistry for FakeRegistry {
        fn context(&self, id: ContextId) -> Option<&dyn VmContext> { if id == self.0.id { Some(&self.0) } else { None } }
        fn context_mut(&mut self, id: ContextId) -> Option<&mut dyn VmContext> { if id == self.0.id { Some(&mut self.0) } else { None } }
    }

    struct FakeFrames { scripted: Vec<bool>, ctx: ContextId }
    impl FrameIterator for FakeFrames {
        fn len(&self) -> usize { self.scripted.len() }
        fn is_scripted(&self, index: usize) -> bool { self.scripted[index] }
        fn context_id(&self, _index: usize) -> ContextId { self.ctx }
        fn function_name(&self, _index: usize) -> Option<String> { None }
        fn file_path(&self, _index: usize) -> Option<String> { None }
        fn line_number(&self, _index: usize) -> Option<u32> { None }
        fn cip(&self, index: usize) -> UCell { index as UCell }
    }

    #[test]
    fn finds_nearest_scripted_frame() {
        let ctx_id = ContextId(1);
        let _ = HashMap::<u8, u8>::new();
        let reg = FakeRegistry(FakeContext { id: ctx_id, space: FakeSpace, meta: MockMetadata::new() });
        let frames = FakeFrames { scripted: vec![false, false, true], ctx: ctx_id };
        let report = prepare(&frames, &reg).unwrap();
        assert_eq!(report.selected.index, 2);
    }

    #[test]
    fn no_scripted_frame_returns_none() {
        let ctx_id = ContextId(1);
        let reg = FakeRegistry(FakeContext { id: ctx_id, space: FakeSpace, meta: MockMetadata::new() });
        let frames = FakeFrames { scripted: vec![false, false], ctx: ctx_id };
        assert!(prepare(&frames, &reg).is_none());
    }
}


