//! Stack manager: operand values, labels, and call frames.
//!
//! Three stacks move in lockstep. The operand stack holds values; the label
//! stack holds one record per open block plus one boundary label per call;
//! the frame stack holds one record per live call on top of a permanent
//! sentinel frame. Each frame snapshots the operand and label heights at
//! entry, and every terminal transition (return, branch past a boundary,
//! unwind) restores to a snapshot, so the stacks above a frame can never
//! underflow into its caller.
//!
//! The sentinel frame owns no module; resolvers treat it as "no instance".
//!
//! Pops assume a validated instruction stream: the stack is non-empty at
//! every pop site and heights are never exceeded downward.

use crate::instr::Pc;
use crate::store::ModuleAddr;
use crate::value::Value;

/// Per-block record enabling structured branching.
///
/// `cont` is the exact PC where execution resumes when the label is exited;
/// `None` marks the outermost boundary, whose pop ends execution. Loop
/// labels additionally remember their `loop` instruction so a branch can
/// re-enter the body.
#[derive(Debug, Clone, Copy)]
pub struct Label {
    /// Operand height at label creation, below the entry values.
    pub height: usize,
    /// Values a branch carries into the label when it guards a loop.
    pub entry_arity: u32,
    /// Values a branch carries out when the label guards a block.
    pub exit_arity: u32,
    pub cont: Option<Pc>,
    /// Set iff the label guards a loop.
    pub loop_instr: Option<Pc>,
}

/// Per-call record enclosing locals, arity, and the return PC.
#[derive(Debug, Clone, Copy)]
pub struct Frame {
    /// Owning module; `None` only for the sentinel frame.
    pub module: Option<ModuleAddr>,
    pub arg_count: u32,
    pub arity: u32,
    pub tail: bool,
    /// Operand height at entry, below the arguments.
    pub vheight: usize,
    /// Label height at entry.
    pub lheight: usize,
    pub return_pc: Option<Pc>,
}

impl Frame {
    fn sentinel() -> Self {
        Frame {
            module: None,
            arg_count: 0,
            arity: 0,
            tail: false,
            vheight: 0,
            lheight: 0,
            return_pc: None,
        }
    }
}

pub struct StackMgr {
    values: Vec<Value>,
    labels: Vec<Label>,
    frames: Vec<Frame>,
}

impl Default for StackMgr {
    fn default() -> Self {
        StackMgr::new()
    }
}

impl StackMgr {
    pub fn new() -> Self {
        StackMgr {
            values: Vec::with_capacity(256),
            labels: Vec::with_capacity(64),
            frames: vec![Frame::sentinel()],
        }
    }

    // --- Operand stack ---

    pub fn push(&mut self, value: Value) {
        self.values.push(value);
    }

    pub fn pop(&mut self) -> Value {
        self.values.pop().unwrap()
    }

    pub fn top(&self) -> Value {
        *self.values.last().unwrap()
    }

    /// Pop the top `n` values, preserving their order.
    pub fn pop_top_n(&mut self, n: usize) -> Vec<Value> {
        self.values.split_off(self.values.len() - n)
    }

    pub fn height(&self) -> usize {
        self.values.len()
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Read local `idx` of the active frame. Locals sit at the frame base:
    /// arguments first, then the declared locals pushed at entry.
    pub fn local(&self, idx: u32) -> Value {
        self.values[self.top_frame().vheight + idx as usize]
    }

    pub fn set_local(&mut self, idx: u32, value: Value) {
        let at = self.top_frame().vheight + idx as usize;
        self.values[at] = value;
    }

    // --- Frame stack ---

    pub fn top_frame(&self) -> &Frame {
        self.frames.last().unwrap()
    }

    /// True while no user call is live; resolvers then yield no instance.
    pub fn is_top_sentinel(&self) -> bool {
        self.top_frame().module.is_none()
    }

    pub fn module_addr(&self) -> Option<ModuleAddr> {
        self.top_frame().module
    }

    /// Number of frames including the sentinel.
    pub fn frame_depth(&self) -> usize {
        self.frames.len()
    }

    /// Push a call frame over the top `arg_count` operands.
    ///
    /// A tail call retires the caller frame in place: its labels are
    /// discarded, the arguments slide down to the caller's frame base, and
    /// the new frame inherits the caller's saved heights and return PC.
    /// Returning from the callee then lands directly in the caller's caller,
    /// so a self-tail-calling chain occupies one frame.
    pub fn push_frame(
        &mut self,
        module: ModuleAddr,
        arg_count: u32,
        arity: u32,
        return_pc: Option<Pc>,
        tail: bool,
    ) {
        if tail && self.frames.len() > 1 {
            let caller = self.frames.pop().unwrap();
            self.labels.truncate(caller.lheight);
            let args_start = self.values.len() - arg_count as usize;
            self.values.drain(caller.vheight..args_start);
            self.frames.push(Frame {
                module: Some(module),
                arg_count,
                arity,
                tail: true,
                vheight: caller.vheight,
                lheight: caller.lheight,
                return_pc: caller.return_pc,
            });
        } else {
            self.frames.push(Frame {
                module: Some(module),
                arg_count,
                arity,
                tail: false,
                vheight: self.values.len() - arg_count as usize,
                lheight: self.labels.len(),
                return_pc,
            });
        }
    }

    /// Pop the active frame: discard its labels, keep the top `arity`
    /// operands over the saved height, and yield the recorded return PC.
    /// Never called with the sentinel active.
    pub fn pop_frame(&mut self) -> Option<Pc> {
        debug_assert!(self.frames.len() > 1, "popped the sentinel frame");
        let frame = self.frames.pop().unwrap();
        self.labels.truncate(frame.lheight);
        let cut = self.values.len() - frame.arity as usize;
        self.values.drain(frame.vheight..cut);
        frame.return_pc
    }

    // --- Label stack ---

    pub fn push_label(&mut self, label: Label) {
        self.labels.push(label);
    }

    /// Label at `depth` from the top of the stack.
    pub fn label(&self, depth: u32) -> &Label {
        &self.labels[self.labels.len() - 1 - depth as usize]
    }

    pub fn label_depth(&self) -> usize {
        self.labels.len()
    }

    /// True when the label at `depth` is the active frame's boundary label.
    pub fn label_is_boundary(&self, depth: u32) -> bool {
        self.labels.len() - 1 - depth as usize == self.top_frame().lheight
    }

    /// Pop the top label, keeping operands. Used by `end`, where validation
    /// guarantees exactly the exit arity sits above the label height.
    pub fn pop_label(&mut self) {
        self.labels.pop();
    }

    /// Pop `count` labels, keeping the top `keep` operands over the target
    /// label's saved height. Yields the target's continuation.
    pub fn pop_labels(&mut self, count: usize, keep: usize) -> Option<Pc> {
        let target = self.labels[self.labels.len() - count];
        let cut = self.values.len() - keep;
        self.values.drain(target.height..cut);
        self.labels.truncate(self.labels.len() - count);
        target.cont
    }

    /// Unwind everything down to the sentinel after a trap.
    pub fn unwind(&mut self) {
        self.frames.truncate(1);
        self.labels.clear();
        self.values.clear();
    }
}
