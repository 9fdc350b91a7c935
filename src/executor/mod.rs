//! The function-call executor.
//!
//! One call protocol drives three execution strategies: interpreted
//! bytecode, host callables, and AOT-compiled symbols. The executor owns
//! the stack manager and the execution context; the store stays external
//! and is threaded through every operation by handle.

mod entry;
mod run;

use wasmparser::ValType;

use crate::context::ExecutionContext;
use crate::error::Trap;
use crate::instance::FuncKind;
use crate::instr::{Instr, Pc};
use crate::metering::Meter;
use crate::stack::StackMgr;
use crate::store::{FuncAddr, Store};
use crate::value::Value;

pub struct Executor {
    stack: StackMgr,
    meter: Option<Meter>,
    context: ExecutionContext,
    /// Scratch table the context's globals array points into; rebuilt on
    /// every compiled-function entry.
    global_ptrs: Vec<*mut Value>,
}

impl Default for Executor {
    fn default() -> Self {
        Executor::new()
    }
}

impl Executor {
    pub fn new() -> Self {
        Executor {
            stack: StackMgr::new(),
            meter: None,
            context: ExecutionContext::empty(),
            global_ptrs: Vec::new(),
        }
    }

    pub fn with_meter(meter: Meter) -> Self {
        Executor {
            meter: Some(meter),
            ..Executor::new()
        }
    }

    pub fn meter(&self) -> Option<&Meter> {
        self.meter.as_ref()
    }

    pub fn stack(&self) -> &StackMgr {
        &self.stack
    }

    /// The opcode dispatcher owns operand traffic; it shares the manager.
    pub fn stack_mut(&mut self) -> &mut StackMgr {
        &mut self.stack
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    /// Call `func` with `args`, running to completion.
    ///
    /// Checks the arguments against the signature, enters the function, and
    /// drives the dispatch loop until the outermost boundary pops. On a
    /// trap the stacks unwind to the sentinel, leaving the executor ready
    /// for the next call.
    pub fn invoke(
        &mut self,
        store: &mut Store,
        func: FuncAddr,
        args: &[Value],
    ) -> anyhow::Result<Vec<Value>> {
        let inst = store
            .func(func)
            .ok_or_else(|| anyhow::anyhow!("function {func:?} not in store"))?;
        let params: Vec<ValType> = inst.ty.params().to_vec();
        let results_n = inst.ty.results().len();
        anyhow::ensure!(
            args.len() == params.len(),
            "expected {} arguments, got {}",
            params.len(),
            args.len()
        );
        for (arg, ty) in args.iter().zip(&params) {
            anyhow::ensure!(
                arg.ty() == *ty,
                "argument type mismatch: expected {ty:?}, got {:?}",
                arg.ty()
            );
        }

        for arg in args {
            self.stack.push(*arg);
        }

        if let Some(meter) = &mut self.meter {
            meter.start_wasm();
        }
        let outcome = self
            .enter_function(store, func, None, false)
            .and_then(|pc| match pc {
                Some(pc) => self.run(store, pc),
                None => Ok(()),
            });
        if let Some(meter) = &mut self.meter {
            meter.stop_wasm();
        }

        match outcome {
            Ok(()) => Ok(self.stack.pop_top_n(results_n)),
            Err(trap) => {
                // The raise site has already logged. Unwind so the executor
                // is restartable.
                self.stack.unwind();
                Err(trap.into())
            }
        }
    }
}

/// Fetch the instruction at `pc`. Validated bodies transfer control before
/// running off the end, and a PC only ever points into native code.
pub(crate) fn fetch(store: &Store, pc: Pc) -> Result<Instr, Trap> {
    let func = store.func(pc.func).ok_or(Trap::InstanceNotFound)?;
    match &func.kind {
        FuncKind::Native { body, .. } => body
            .get(pc.instr as usize)
            .copied()
            .ok_or(Trap::InstanceNotFound),
        _ => Err(Trap::InstanceNotFound),
    }
}
