//! The dispatch loop.
//!
//! Control instructions assign the next PC explicitly; everything else
//! falls through to the already-incremented PC. Execution ends when the
//! outermost boundary pops (a frame pop yielding no return PC).

use crate::error::Trap;
use crate::instr::{Instr, Pc};
use crate::stack::Label;
use crate::store::{FuncAddr, Store};
use crate::value::Value;

use super::{Executor, fetch};

/// Report a surfaced trap once, where it is raised. `Terminated` stays
/// silent.
fn trap(t: Trap) -> Trap {
    if t != Trap::Terminated {
        log::error!("{t}");
    }
    t
}

impl Executor {
    /// Run from `pc` until the outermost boundary pops or a trap unwinds
    /// out. Trap paths leave the stacks as they stood at the fault; the
    /// caller decides when to unwind to the sentinel.
    pub fn run(&mut self, store: &mut Store, mut pc: Pc) -> Result<(), Trap> {
        loop {
            // Cancellation point: cost exhaustion aborts between
            // instructions.
            if let Some(meter) = &mut self.meter {
                if !meter.charge(1) {
                    return Err(trap(Trap::CostLimitExceeded));
                }
            }

            let here = pc;
            let instr = fetch(store, pc)?;
            pc.instr += 1;

            match instr {
                Instr::Unreachable => return Err(trap(Trap::Unreachable)),
                Instr::Nop => {}

                Instr::Block { ty, end } => {
                    let (entry, exit) = self.block_arity(store, ty)?;
                    self.stack.push_label(Label {
                        height: self.stack.height() - entry as usize,
                        entry_arity: entry,
                        exit_arity: exit,
                        cont: Some(Pc::new(here.func, end + 1)),
                        loop_instr: None,
                    });
                }

                Instr::Loop { ty, end } => {
                    let (entry, exit) = self.block_arity(store, ty)?;
                    self.stack.push_label(Label {
                        height: self.stack.height() - entry as usize,
                        entry_arity: entry,
                        exit_arity: exit,
                        cont: Some(Pc::new(here.func, end + 1)),
                        loop_instr: Some(here),
                    });
                }

                Instr::If { ty, else_, end } => {
                    let cond = self.stack.pop().unwrap_i32();
                    let (entry, exit) = self.block_arity(store, ty)?;
                    self.stack.push_label(Label {
                        height: self.stack.height() - entry as usize,
                        entry_arity: entry,
                        exit_arity: exit,
                        cont: Some(Pc::new(here.func, end + 1)),
                        loop_instr: None,
                    });
                    if cond == 0 {
                        // Fall to the else arm, or to the `end` so the
                        // label pops there.
                        pc.instr = match else_ {
                            Some(e) => e + 1,
                            None => end,
                        };
                    }
                }

                Instr::Else { end } => {
                    // Reached from the then arm: skip to the `end`, which
                    // pops the label.
                    pc.instr = end;
                }

                Instr::End => {
                    if self.stack.label_is_boundary(0) {
                        match self.stack.pop_frame() {
                            Some(next) => pc = next,
                            None => return Ok(()),
                        }
                    } else {
                        self.stack.pop_label();
                    }
                }

                Instr::Br { depth } => match self.branch_to_label(store, depth)? {
                    Some(next) => pc = next,
                    None => return Ok(()),
                },

                Instr::BrIf { depth } => {
                    if self.stack.pop().unwrap_i32() != 0 {
                        match self.branch_to_label(store, depth)? {
                            Some(next) => pc = next,
                            None => return Ok(()),
                        }
                    }
                }

                Instr::Return => match self.stack.pop_frame() {
                    Some(next) => pc = next,
                    None => return Ok(()),
                },

                Instr::Call { func } => {
                    let callee = self.local_func_addr(store, func)?;
                    match self.enter_function(store, callee, Some(pc), false)? {
                        Some(next) => pc = next,
                        None => return Ok(()),
                    }
                }

                Instr::ReturnCall { func } => {
                    let callee = self.local_func_addr(store, func)?;
                    match self.enter_function(store, callee, Some(pc), true)? {
                        Some(next) => pc = next,
                        None => return Ok(()),
                    }
                }

                Instr::CallIndirect { ty, table } => {
                    let elem = self.stack.pop().unwrap_i32() as u32;
                    let callee = self
                        .table_by_index(store, table)
                        .and_then(|t| t.get(elem))
                        .flatten()
                        .ok_or_else(|| trap(Trap::UninitializedElement))?;
                    self.check_indirect_type(store, callee, ty)?;
                    match self.enter_function(store, callee, Some(pc), false)? {
                        Some(next) => pc = next,
                        None => return Ok(()),
                    }
                }

                Instr::Drop => {
                    self.stack.pop();
                }

                Instr::Select => {
                    let cond = self.stack.pop().unwrap_i32();
                    let b = self.stack.pop();
                    let a = self.stack.pop();
                    self.stack.push(if cond != 0 { a } else { b });
                }

                Instr::LocalGet { idx } => {
                    let value = self.stack.local(idx);
                    self.stack.push(value);
                }

                Instr::LocalSet { idx } => {
                    let value = self.stack.pop();
                    self.stack.set_local(idx, value);
                }

                Instr::LocalTee { idx } => {
                    let value = self.stack.top();
                    self.stack.set_local(idx, value);
                }

                Instr::GlobalGet { idx } => {
                    let value = self
                        .global_by_index(store, idx)
                        .ok_or(Trap::InstanceNotFound)?
                        .value;
                    self.stack.push(value);
                }

                Instr::GlobalSet { idx } => {
                    let value = self.stack.pop();
                    let global = self
                        .global_by_index(store, idx)
                        .ok_or(Trap::InstanceNotFound)?;
                    // Validation rejects writes to const globals; a write
                    // arriving here means the store was built against a
                    // different module.
                    if !global.mutable {
                        return Err(Trap::InstanceNotFound);
                    }
                    global.value = value;
                }

                Instr::I32Load { offset } => {
                    let base = self.stack.pop().unwrap_i32() as u32 as u64;
                    let memory = self
                        .memory_by_index(store, 0)
                        .ok_or_else(|| trap(Trap::MemoryOutOfBounds))?;
                    let bytes: [u8; 4] = memory.load(base + offset as u64).map_err(trap)?;
                    self.stack.push(Value::I32(i32::from_le_bytes(bytes)));
                }

                Instr::I32Store { offset } => {
                    let value = self.stack.pop().unwrap_i32();
                    let base = self.stack.pop().unwrap_i32() as u32 as u64;
                    let memory = self
                        .memory_by_index(store, 0)
                        .ok_or_else(|| trap(Trap::MemoryOutOfBounds))?;
                    memory
                        .store(base + offset as u64, &value.to_le_bytes())
                        .map_err(trap)?;
                }

                Instr::MemorySize => {
                    let pages = self
                        .memory_by_index(store, 0)
                        .ok_or(Trap::InstanceNotFound)?
                        .size_pages();
                    self.stack.push(Value::I32(pages as i32));
                }

                Instr::MemoryGrow => {
                    let pages = self.stack.pop().unwrap_i32() as u32;
                    let memory = self
                        .memory_by_index(store, 0)
                        .ok_or(Trap::InstanceNotFound)?;
                    let result = match memory.grow(pages) {
                        Some(old) => old as i32,
                        None => -1,
                    };
                    self.stack.push(Value::I32(result));
                }

                Instr::ElemDrop { idx } => {
                    self.elem_by_index(store, idx)
                        .ok_or(Trap::InstanceNotFound)?
                        .clear();
                }

                Instr::DataDrop { idx } => {
                    self.data_by_index(store, idx)
                        .ok_or(Trap::InstanceNotFound)?
                        .clear();
                }

                Instr::I32Const(v) => self.stack.push(Value::I32(v)),
                Instr::I64Const(v) => self.stack.push(Value::I64(v)),
                Instr::F64Const(v) => self.stack.push(Value::F64(v)),
                Instr::RefNull => self.stack.push(Value::FuncRef(None)),

                Instr::RefFunc { idx } => {
                    let addr = self.local_func_addr(store, idx)?;
                    self.stack.push(Value::FuncRef(Some(addr)));
                }

                Instr::I32Eqz => {
                    let a = self.stack.pop().unwrap_i32();
                    self.stack.push(Value::I32((a == 0) as i32));
                }
                Instr::I32Eq => self.cmpop_i32(|a, b| a == b),
                Instr::I32LtS => self.cmpop_i32(|a, b| a < b),
                Instr::I32GtS => self.cmpop_i32(|a, b| a > b),

                Instr::I32Add => self.binop_i32(i32::wrapping_add),
                Instr::I32Sub => self.binop_i32(i32::wrapping_sub),
                Instr::I32Mul => self.binop_i32(i32::wrapping_mul),

                Instr::I32DivS => {
                    let b = self.stack.pop().unwrap_i32();
                    let a = self.stack.pop().unwrap_i32();
                    if b == 0 {
                        return Err(trap(Trap::DivideByZero));
                    }
                    if a == i32::MIN && b == -1 {
                        return Err(trap(Trap::IntegerOverflow));
                    }
                    self.stack.push(Value::I32(a / b));
                }

                Instr::I64Add => {
                    let b = self.stack.pop().unwrap_i64();
                    let a = self.stack.pop().unwrap_i64();
                    self.stack.push(Value::I64(a.wrapping_add(b)));
                }

                Instr::I32TruncF64S => {
                    let a = self.stack.pop().unwrap_f64();
                    if a.is_nan() {
                        return Err(trap(Trap::InvalidConversion));
                    }
                    let t = a.trunc();
                    if t >= 2_147_483_648.0 || t < -2_147_483_648.0 {
                        return Err(trap(Trap::IntegerOverflow));
                    }
                    self.stack.push(Value::I32(t as i32));
                }
            }
        }
    }

    fn binop_i32(&mut self, f: impl Fn(i32, i32) -> i32) {
        let b = self.stack.pop().unwrap_i32();
        let a = self.stack.pop().unwrap_i32();
        self.stack.push(Value::I32(f(a, b)));
    }

    fn cmpop_i32(&mut self, f: impl Fn(i32, i32) -> bool) {
        let b = self.stack.pop().unwrap_i32();
        let a = self.stack.pop().unwrap_i32();
        self.stack.push(Value::I32(f(a, b) as i32));
    }

    /// Translate a local function index through the active module.
    /// Validated streams always resolve; a miss means a malformed store.
    fn local_func_addr(&self, store: &Store, idx: u32) -> Result<FuncAddr, Trap> {
        self.stack
            .module_addr()
            .and_then(|m| store.module(m))
            .and_then(|m| m.func_addr(idx))
            .ok_or(Trap::InstanceNotFound)
    }

    /// `call_indirect` signature check against the expected type index.
    fn check_indirect_type(&self, store: &Store, callee: FuncAddr, ty_idx: u32) -> Result<(), Trap> {
        let expected = self
            .stack
            .module_addr()
            .and_then(|m| store.module(m))
            .and_then(|m| m.func_type(ty_idx))
            .ok_or(Trap::InstanceNotFound)?;
        let actual = store.func(callee).ok_or(Trap::InstanceNotFound)?;
        if actual.ty != *expected {
            return Err(trap(Trap::CallIndirectTypeMismatch));
        }
        Ok(())
    }
}
