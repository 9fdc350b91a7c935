//! Function entry, branching, and instance resolution.
//!
//! This is the call protocol the dispatch loop is built on: `enter_function`
//! pushes a frame and hands control to one of the three function kinds,
//! `branch_to_label` walks the label stack, and the `*_by_index` resolvers
//! translate local index spaces through the active frame's module.

use wasmparser::{BlockType, ValType};

use crate::context;
use crate::error::Trap;
use crate::fault;
use crate::instance::{
    CompiledEntry, CompiledWrapper, DataInst, ElemInst, FuncKind, GlobalInst, HostCallee,
    MemoryInst, TableInst,
};
use crate::instr::{Instr, Pc};
use crate::stack::Label;
use crate::store::{FuncAddr, ModuleAddr, Store};
use crate::value::Value;

use super::{Executor, fetch};

/// Kind payload lifted out of the store so the entry protocol can borrow
/// the store again for memory and context lookups.
enum Callee {
    Native(Vec<(u32, ValType)>),
    Host(HostCallee, u64),
    Compiled(CompiledEntry, CompiledWrapper),
}

impl Executor {
    /// Enter `callee`, leaving the next PC to execute, or `None` when the
    /// call completed in place (host and compiled functions have no
    /// instruction stream; they return straight to the popped frame's
    /// continuation).
    ///
    /// Expects the top `|params|` operands to be the arguments in call
    /// order, with types already guaranteed by validation.
    pub fn enter_function(
        &mut self,
        store: &mut Store,
        callee: FuncAddr,
        return_pc: Option<Pc>,
        tail_call: bool,
    ) -> Result<Option<Pc>, Trap> {
        let func = store.func(callee).ok_or(Trap::InstanceNotFound)?;
        let ty = func.ty.clone();
        let module = func.module;
        let payload = match &func.kind {
            FuncKind::Native { locals, .. } => Callee::Native(locals.clone()),
            FuncKind::Host { callee, cost } => Callee::Host(callee.clone(), *cost),
            FuncKind::Compiled { entry, wrapper } => Callee::Compiled(*entry, *wrapper),
        };
        let args_n = ty.params().len() as u32;
        let rets_n = ty.results().len() as u32;

        // The arguments stay on the operand stack across the push; they
        // become the callee's leading locals, or move into its argument
        // buffer below.
        self.stack.push_frame(module, args_n, rets_n, return_pc, tail_call);
        // Read back from the frame: a tail call inherits the caller's
        // return site.
        let cont = self.stack.top_frame().return_pc;

        match payload {
            Callee::Native(locals) => {
                for (count, ty) in locals {
                    for _ in 0..count {
                        self.stack.push(Value::zero(ty));
                    }
                }
                self.push_boundary_label(rets_n, cont);
                Ok(Some(Pc::new(callee, 0)))
            }

            Callee::Host(host, cost) => {
                self.push_boundary_label(rets_n, cont);

                // Memory 0 of the active frame. May be None (a sentinel
                // caller, or a memory-less module); the host must tolerate
                // that.
                let memory = self.memory_by_index(store, 0);

                if let Some(meter) = &mut self.meter {
                    // Charge before the call so a refusal leaves no
                    // partial state.
                    if !meter.charge(cost) {
                        log::error!("{}", Trap::CostLimitExceeded);
                        return Err(Trap::CostLimitExceeded);
                    }
                    meter.stop_wasm();
                    meter.start_host();
                }

                let args = self.stack.pop_top_n(args_n as usize);
                let mut rets: Vec<Value> =
                    ty.results().iter().map(|t| Value::zero(*t)).collect();
                let outcome = (*host)(memory, args, &mut rets);

                if let Some(meter) = &mut self.meter {
                    meter.stop_host();
                    meter.start_wasm();
                }

                if let Err(failure) = outcome {
                    if failure != Trap::Terminated {
                        log::error!("host function failed: {failure}");
                    }
                    return Err(failure);
                }

                for ret in rets {
                    self.stack.push(ret);
                }
                Ok(self.stack.pop_frame())
            }

            Callee::Compiled(entry, wrapper) => {
                self.push_boundary_label(rets_n, cont);

                let args = self.stack.pop_top_n(args_n as usize);
                let mut rets: Vec<Value> =
                    ty.results().iter().map(|t| Value::zero(*t)).collect();

                self.refresh_context(store, module);
                let ctx: *mut crate::context::ExecutionContext = &mut self.context;
                let store_guard = context::install_current_store(store);
                let status = fault::protect(|| unsafe {
                    wrapper(ctx, entry, args.as_ptr(), rets.as_mut_ptr())
                });
                drop(store_guard);

                if let Err(failure) = status {
                    if failure != Trap::Terminated {
                        log::error!("{failure}");
                    }
                    return Err(failure);
                }

                for ret in rets {
                    self.stack.push(ret);
                }
                Ok(self.stack.pop_frame())
            }
        }
    }

    /// One boundary label per call; popping it returns from the function.
    fn push_boundary_label(&mut self, rets_n: u32, cont: Option<Pc>) {
        self.stack.push_label(Label {
            height: self.stack.height(),
            entry_arity: 0,
            exit_arity: rets_n,
            cont,
            loop_instr: None,
        });
    }

    /// Decode a block type into (values consumed on entry, values produced
    /// on exit) using the active module's type section.
    pub fn block_arity(&self, store: &Store, ty: BlockType) -> Result<(u32, u32), Trap> {
        match ty {
            BlockType::Empty => Ok((0, 0)),
            BlockType::Type(_) => Ok((0, 1)),
            BlockType::FuncType(idx) => {
                let module = self.stack.module_addr().ok_or(Trap::InstanceNotFound)?;
                let func_ty = store
                    .module(module)
                    .and_then(|m| m.func_type(idx))
                    .ok_or(Trap::InstanceNotFound)?;
                Ok((func_ty.params().len() as u32, func_ty.results().len() as u32))
            }
        }
    }

    /// Branch to the label at `depth`, leaving the next PC, or `None` when
    /// the branch retired the outermost frame.
    ///
    /// Keeps the top `k` operands (exit arity for a block, entry arity for
    /// a loop), discards everything between them and the label's saved
    /// height, and pops `depth + 1` labels. A loop target pushes a fresh
    /// label for the next round and resumes at the first body instruction.
    pub fn branch_to_label(&mut self, store: &Store, depth: u32) -> Result<Option<Pc>, Trap> {
        // A branch targeting the function boundary is a return.
        if self.stack.label_is_boundary(depth) {
            return Ok(self.stack.pop_frame());
        }

        let target = *self.stack.label(depth);
        let keep = if target.loop_instr.is_some() {
            target.entry_arity
        } else {
            target.exit_arity
        };
        let cont = self.stack.pop_labels(depth as usize + 1, keep as usize);

        if let Some(loop_pc) = target.loop_instr {
            let ty = match fetch(store, loop_pc)? {
                Instr::Loop { ty, .. } => ty,
                _ => return Err(Trap::InstanceNotFound),
            };
            let (entry, _) = self.block_arity(store, ty)?;
            self.stack.push_label(Label {
                height: self.stack.height() - entry as usize,
                entry_arity: entry,
                exit_arity: entry,
                cont,
                loop_instr: Some(loop_pc),
            });
            return Ok(Some(Pc::new(loop_pc.func, loop_pc.instr + 1)));
        }

        Ok(cont)
    }

    // Instance resolution. One operation per resource kind, all the same
    // shape: nothing resolves while the sentinel frame is active, and an
    // unbound index or stale address yields nothing. The calling opcode
    // translates "nothing" into its own trap.

    pub fn table_by_index<'s>(&self, store: &'s mut Store, idx: u32) -> Option<&'s mut TableInst> {
        let module = self.stack.module_addr()?;
        let addr = store.module(module)?.table_addr(idx)?;
        store.table_mut(addr)
    }

    pub fn memory_by_index<'s>(&self, store: &'s mut Store, idx: u32) -> Option<&'s mut MemoryInst> {
        let module = self.stack.module_addr()?;
        let addr = store.module(module)?.mem_addr(idx)?;
        store.memory_mut(addr)
    }

    pub fn global_by_index<'s>(&self, store: &'s mut Store, idx: u32) -> Option<&'s mut GlobalInst> {
        let module = self.stack.module_addr()?;
        let addr = store.module(module)?.global_addr(idx)?;
        store.global_mut(addr)
    }

    pub fn elem_by_index<'s>(&self, store: &'s mut Store, idx: u32) -> Option<&'s mut ElemInst> {
        let module = self.stack.module_addr()?;
        let addr = store.module(module)?.elem_addr(idx)?;
        store.elem_mut(addr)
    }

    pub fn data_by_index<'s>(&self, store: &'s mut Store, idx: u32) -> Option<&'s mut DataInst> {
        let module = self.stack.module_addr()?;
        let addr = store.module(module)?.data_addr(idx)?;
        store.data_mut(addr)
    }

    /// Point the execution context at the callee module's memory and
    /// globals. Runs on every compiled entry, so a resize between calls is
    /// always observed before compiled code runs again.
    fn refresh_context(&mut self, store: &mut Store, module: ModuleAddr) {
        let (mem_addr, global_addrs) = match store.module(module) {
            Some(inst) => (inst.mem_addr(0), inst.global_addrs.clone()),
            None => (None, Vec::new()),
        };

        self.context.memory = mem_addr
            .and_then(|addr| store.memory_mut(addr))
            .map(|mem| mem.base_ptr())
            .unwrap_or(std::ptr::null_mut());

        self.global_ptrs.clear();
        for addr in global_addrs {
            if let Some(global) = store.global_mut(addr) {
                self.global_ptrs.push(global.value_ptr());
            }
        }
        self.context.globals = if self.global_ptrs.is_empty() {
            std::ptr::null()
        } else {
            self.global_ptrs.as_ptr()
        };
    }
}
