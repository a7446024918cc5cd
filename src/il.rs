// il.rs — Tagged model of the host's compiled instruction stream.
//
// The host's patch infrastructure hands method bodies over as a flat
// instruction list. We model only what structural matching needs: the
// opcode category, the operand (which matching ignores), and the stack
// effect, which any rewrite must preserve exactly.

/// Opcode category. Two instructions with the same category match
/// structurally regardless of their operands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Op {
    /// Push the receiver (the host IL's `ldarg.0`).
    LoadSelf,
    /// Push an argument slot.
    LoadArg,
    /// Pop an object reference, push one of its fields.
    LoadField,
    /// Push a local slot.
    LoadLocal,
    /// Pop the stack top into a local slot.
    StoreLocal,
    /// Static/direct call.
    Call,
    /// Virtual call (receiver on the stack).
    CallVirt,
    /// Return from the method.
    Ret,
}

/// Call-target descriptor. Carries exactly what the stack-effect check
/// needs; the host side resolves the name to a real method token.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MethodRef {
    pub name: String,
    /// Declared argument count, receiver excluded.
    pub args: u8,
    pub returns: bool,
}

impl MethodRef {
    pub fn new(name: impl Into<String>, args: u8, returns: bool) -> Self {
        Self {
            name: name.into(),
            args,
            returns,
        }
    }
}

/// Instruction operand. Matching ignores these; the rewrite only ever
/// introduces a `Method` operand.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum Operand {
    #[default]
    None,
    /// Local or argument slot index.
    Slot(u8),
    /// Field token, by declared name.
    Field(String),
    Method(MethodRef),
}

/// One instruction of a compiled method body.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Inst {
    pub op: Op,
    pub operand: Operand,
}

impl Inst {
    pub fn new(op: Op, operand: Operand) -> Self {
        Self { op, operand }
    }

    /// Instruction with no operand.
    pub fn plain(op: Op) -> Self {
        Self::new(op, Operand::None)
    }

    pub fn load_local(slot: u8) -> Self {
        Self::new(Op::LoadLocal, Operand::Slot(slot))
    }

    pub fn store_local(slot: u8) -> Self {
        Self::new(Op::StoreLocal, Operand::Slot(slot))
    }

    pub fn load_field(name: impl Into<String>) -> Self {
        Self::new(Op::LoadField, Operand::Field(name.into()))
    }

    pub fn call(target: MethodRef) -> Self {
        Self::new(Op::Call, Operand::Method(target))
    }

    pub fn callvirt(target: MethodRef) -> Self {
        Self::new(Op::CallVirt, Operand::Method(target))
    }

    /// Values this instruction pops from and pushes onto the evaluation
    /// stack, as (pops, pushes). Calls derive theirs from the method
    /// reference; `CallVirt` additionally pops the receiver. A call with
    /// no method operand is malformed and counted as (0, 0).
    pub fn stack_effect(&self) -> (u8, u8) {
        match (self.op, &self.operand) {
            (Op::LoadSelf, _) | (Op::LoadArg, _) | (Op::LoadLocal, _) => (0, 1),
            (Op::LoadField, _) => (1, 1),
            (Op::StoreLocal, _) => (1, 0),
            (Op::Call, Operand::Method(m)) => (m.args, m.returns as u8),
            (Op::CallVirt, Operand::Method(m)) => (m.args + 1, m.returns as u8),
            (Op::Call, _) | (Op::CallVirt, _) | (Op::Ret, _) => (0, 0),
        }
    }
}
