use std::rc::Rc;

use wasmparser::{FuncType, ValType};

use crate::context::ExecutionContext;
use crate::error::Trap;
use crate::instance::MemoryInst;
use crate::instr::Instr;
use crate::store::ModuleAddr;
use crate::value::Value;

/// A host-provided callable.
///
/// Receives the active frame's memory 0 (if any; the host must tolerate
/// `None`), the arguments in call order by move, and a result slot sized by
/// the signature.
pub type HostCallee =
    Rc<dyn Fn(Option<&mut MemoryInst>, Vec<Value>, &mut [Value]) -> Result<(), Trap>>;

/// Opaque entry symbol of an ahead-of-time compiled function body.
pub type CompiledEntry = *const ();

/// Trampoline adapting the executor ABI to a compiled entry symbol.
///
/// Arguments are read from `args` in call order; results are written to
/// `rets`, which is sized by the signature. Synchronous faults leave the
/// trampoline through the fault region, never through a normal return.
pub type CompiledWrapper =
    unsafe extern "C" fn(*mut ExecutionContext, CompiledEntry, *const Value, *mut Value);

/// The three execution strategies behind the single call protocol.
pub enum FuncKind {
    /// Interpreted bytecode with declared (count, type) local groups.
    Native {
        locals: Vec<(u32, ValType)>,
        body: Vec<Instr>,
    },
    /// Host callable with its metering cost.
    Host { callee: HostCallee, cost: u64 },
    /// AOT-compiled symbol invoked through its trampoline.
    Compiled {
        entry: CompiledEntry,
        wrapper: CompiledWrapper,
    },
}

/// A function instance: signature, owning module, and kind-specific payload.
pub struct FuncInst {
    pub ty: FuncType,
    pub module: ModuleAddr,
    pub kind: FuncKind,
}

impl FuncInst {
    pub fn native(
        ty: FuncType,
        module: ModuleAddr,
        locals: Vec<(u32, ValType)>,
        body: Vec<Instr>,
    ) -> Self {
        FuncInst {
            ty,
            module,
            kind: FuncKind::Native { locals, body },
        }
    }

    pub fn host(ty: FuncType, module: ModuleAddr, cost: u64, callee: HostCallee) -> Self {
        FuncInst {
            ty,
            module,
            kind: FuncKind::Host { callee, cost },
        }
    }

    pub fn compiled(
        ty: FuncType,
        module: ModuleAddr,
        entry: CompiledEntry,
        wrapper: CompiledWrapper,
    ) -> Self {
        FuncInst {
            ty,
            module,
            kind: FuncKind::Compiled { entry, wrapper },
        }
    }

    pub fn param_count(&self) -> usize {
        self.ty.params().len()
    }

    pub fn result_count(&self) -> usize {
        self.ty.results().len()
    }
}
