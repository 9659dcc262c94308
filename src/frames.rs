// C6: Frame Selector. Picks the initially-selected scripted frame, validates
// frame re-selection, and walks the saved-frame-pointer chain to compute
// `frm` for any scripted frame below the top of its context.

use crate::vm::{Cell, ContextId, FrameIterator, UCell, VmContext};

// Saved previous-frame pointer sits one cell above `frm` in the VM's data
// segment, per the original layout (`*(cell_t*)(memory + frm + 4)`).
pub const SAVED_FRAME_OFFSET: Cell = 4;

#[derive(Debug, Clone, Copy)]
pub struct SelectedFrame {
    pub index: usize,
    pub context: ContextId,
    pub cip: UCell,
    pub frm: Cell,
}

// Returns the index of the first scripted frame at or after `start`, if any.
fn first_scripted_from(frames: &dyn FrameIterator, start: usize) -> Option<usize> {
    (start..frames.len()).find(|&i| frames.is_scripted(i))
}

// Walks the saved-frame chain within `ctx`'s address space from `ctx.frm()`,
// following `scripted_rank` additional scripted frames in the same context.
// Native frames along the way are skipped but do not advance the chain.
fn walk_frame_chain(ctx: &dyn VmContext, scripted_rank: usize) -> Option<Cell> {
    let mut frm = ctx.frm();
    for _ in 0..scripted_rank {
        let addr = frm.checked_add(SAVED_FRAME_OFFSET)?;
        frm = ctx.address_space().read_cell(addr)?;
    }
    Some(frm)
}

// Entered fresh on every halt / console re-entry, per the design note that
// selection state must never leak across halts.
pub fn enter(frames: &dyn FrameIterator, contexts: &dyn crate::vm::ContextRegistry) -> Option<SelectedFrame> {
    let index = first_scripted_from(frames, 0)?;
    select(frames, contexts, index)
}

// Re-validates that `index` names a scripted frame and computes its `frm` by
// counting how many scripted frames in the same context precede it.
pub fn select(frames: &dyn FrameIterator, contexts: &dyn crate::vm::ContextRegistry, index: usize) -> Option<SelectedFrame> {
    if index >= frames.len() || !frames.is_scripted(index) {
        return None;
    }
    let context_id = frames.context_id(index);
    let scripted_rank = (0..index).filter(|&i| frames.is_scripted(i) && frames.context_id(i) == context_id).count();
    let ctx = contexts.context(context_id)?;
    let frm = walk_frame_chain(ctx, scripted_rank)?;
    Some(SelectedFrame { index, context: context_id, cip: frames.cip(index), frm })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::mock::MockMetadata;
    use crate::metadata::DebugMetadata;
    use crate::vm::AddressSpace;
    use std::collections::HashMap;

    struct FakeSpace(HashMap<Cell, Cell>);
    impl AddressSpace for FakeSpace {
        fn translate(&self, addr: Cell) -> Option<usize> { Some(addr as usize) }
        fn read_cell_phys(&self, phys: usize) -> Option<Cell> { self.0.get(&(phys as Cell)).copied() }
        fn write_cell_phys(&mut self, phys: usize, value: Cell) -> bool { self.0.insert(phys as Cell, value); true }
        fn read_cstring(&self, _addr: Cell, _max_len: usize) -> Option<Vec<u8>> { None }
    }

    struct FakeContext {
        id: ContextId,
        frm: Cell,
        space: FakeSpace,
        meta: MockMetadata,
    }
    impl VmContext for FakeContext {
        fn id(&self) -> ContextId { self.id }
        fn frm(&self) -> Cell { self.frm }
        fn address_space(&self) -> &dyn AddressSpace { &self.space }
        fn address_space_mut(&mut self) -> &mut dyn AddressSpace { &mut self.space }
        fn image(&self) -> &dyn DebugMetadata { &self.meta }
    }

    struct FakeRegistry(FakeContext);
    impl crate::vm::ContextRegistry for FakeRegistry {
        fn context(&self, id: ContextId) -> Option<&dyn VmContext> {
            if id == self.0.id { Some(&self.0) } else { None }
        }
        fn context_mut(&mut self, id: ContextId) -> Option<&mut dyn VmContext> {
            if id == self.0.id { Some(&mut self.0) } else { None }
        }
    }

    struct FakeFrames {
        scripted: Vec<bool>,
        ctx: ContextId,
    }
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
    fn enter_selects_first_scripted_frame() {
        let ctx_id = ContextId(1);
        let mut space = FakeSpace(HashMap::new());
        space.0.insert(100 + SAVED_FRAME_OFFSET, 40); // frame below top
        let reg = FakeRegistry(FakeContext { id: ctx_id, frm: 100, space, meta: MockMetadata::new() });
        let frames = FakeFrames { scripted: vec![false, true, true], ctx: ctx_id };
        let sel = enter(&frames, &reg).unwrap();
        assert_eq!(sel.index, 1);
        assert_eq!(sel.frm, 100);
    }

    #[test]
    fn select_rejects_native_frame() {
        let ctx_id = ContextId(1);
        let space = FakeSpace(HashMap::new());
        let reg = FakeRegistry(FakeContext { id: ctx_id, frm: 100, space, meta: MockMetadata::new() });
        let frames = FakeFrames { scripted: vec![true, false], ctx: ctx_id };
        assert!(select(&frames, &reg, 1).is_none());
    }

    #[test]
    fn select_walks_saved_frame_chain_for_non_top_scripted_frame() {
        let ctx_id = ContextId(1);
        let mut space = FakeSpace(HashMap::new());
        space.0.insert(100 + SAVED_FRAME_OFFSET, 40);
        let reg = FakeRegistry(FakeContext { id: ctx_id, frm: 100, space, meta: MockMetadata::new() });
        let frames = FakeFrames { scripted: vec![true, true], ctx: ctx_id };
        let sel = select(&frames, &reg, 1).unwrap();
        assert_eq!(sel.frm, 40);
    }
}
