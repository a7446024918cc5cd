// patcher.rs — Structural window match and single-instruction rewrite for
// the swim motor's UpdateMove body.
//
// The field and method tokens inside UpdateMove are internal and unnamed in
// the host build, so the window is matched purely by opcode shape. The
// rewrite swaps the rotation-multiply call (window element 6) for a call to
// the policy's rotation entry point, which takes the same arguments and
// returns the same type, so the surrounding stack layout is untouched.
//
// If a host update ships an UpdateMove that no longer contains the shape,
// find_window comes up empty and the body is returned unchanged: the
// feature is simply inert on that build. Known fragility of any structural
// patch; there is no in-band signal for it (see DESIGN.md).

use thiserror::Error;

use crate::il::{Inst, MethodRef, Op, Operand};

/// One element of a structural pattern.
#[derive(Clone, Copy, Debug)]
pub enum OpMatch {
    /// Match the opcode category, ignore the operand.
    Kind(Op),
    /// Match the category and a specific local slot.
    LocalSlot(Op, u8),
}

impl OpMatch {
    pub fn matches(&self, inst: &Inst) -> bool {
        match *self {
            OpMatch::Kind(op) => inst.op == op,
            OpMatch::LocalSlot(op, slot) => inst.op == op && inst.operand == Operand::Slot(slot),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PatchError {
    /// The replacement consumes or produces a different number of stack
    /// values than the instruction it replaces.
    #[error("stack shape mismatch at {index}: replacing {want:?} with {have:?}")]
    StackShape {
        index: usize,
        want: (u8, u8),
        have: (u8, u8),
    },
    #[error("instruction index {index} out of range (body has {len})")]
    OutOfRange { index: usize, len: usize },
}

/// Shape of the rotation computation inside UpdateMove:
///
/// ```text
/// localDir2 = this.playerController.forwardReference.rotation * localDir;
/// ```
///
/// load-self, the controller field, two property getters, the flattened
/// direction local (always slot 2 in the host build), the quaternion-vector
/// multiply, and the store of the result.
pub const MOVE_UPDATE_SHAPE: [OpMatch; 7] = [
    OpMatch::Kind(Op::LoadSelf),
    OpMatch::Kind(Op::LoadField),
    OpMatch::Kind(Op::CallVirt),
    OpMatch::Kind(Op::CallVirt),
    OpMatch::LocalSlot(Op::LoadLocal, 2),
    OpMatch::Kind(Op::Call), // the multiply; this is the one we take over
    OpMatch::Kind(Op::StoreLocal),
];

/// Offset of the multiply call within the matched window.
pub const MULTIPLY_OFFSET: usize = 5;

/// First index at which `pattern` matches `body` contiguously.
pub fn find_window(body: &[Inst], pattern: &[OpMatch]) -> Option<usize> {
    if pattern.is_empty() || body.len() < pattern.len() {
        return None;
    }
    (0..=body.len() - pattern.len()).find(|&start| {
        pattern
            .iter()
            .zip(&body[start..])
            .all(|(m, inst)| m.matches(inst))
    })
}

/// New body with the instruction at `index` substituted. Never mutates the
/// input, and refuses any replacement that would change the evaluation
/// stack shape at that point.
pub fn replace_at(body: &[Inst], index: usize, replacement: Inst) -> Result<Vec<Inst>, PatchError> {
    let old = body.get(index).ok_or(PatchError::OutOfRange {
        index,
        len: body.len(),
    })?;
    let want = old.stack_effect();
    let have = replacement.stack_effect();
    if want != have {
        return Err(PatchError::StackShape { index, want, have });
    }
    let mut out = body.to_vec();
    out[index] = replacement;
    Ok(out)
}

/// Patch entry point for the swim motor's UpdateMove, run once at load
/// time by the host's patch infrastructure.
///
/// On a shape match, the multiply call becomes a static call to
/// `get_rotation`, which must keep the multiply's `(Orientation, Vec3) ->
/// Vec3` signature. On no match the body passes through untouched.
pub fn apply_move_update_patch(body: &[Inst], get_rotation: MethodRef) -> Vec<Inst> {
    let Some(start) = find_window(body, &MOVE_UPDATE_SHAPE) else {
        return body.to_vec();
    };
    match replace_at(body, start + MULTIPLY_OFFSET, Inst::call(get_rotation)) {
        Ok(patched) => patched,
        // Only reachable if get_rotation's signature drifts away from the
        // host's multiply; better inert than a corrupted stack.
        Err(err) => {
            log::error!("[PATCH] UpdateMove rewrite rejected: {err}");
            body.to_vec()
        }
    }
}
