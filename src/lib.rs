mod context;
mod error;
mod executor;
mod fault;
mod instance;
mod instr;
mod metering;
mod stack;
mod store;
mod value;

pub use context::{ExecutionContext, with_current_store};
pub use error::Trap;
pub use executor::Executor;
pub use fault::raise;
pub use instance::{
    CompiledEntry, CompiledWrapper, DataInst, ElemInst, FuncInst, FuncKind, GlobalInst,
    HostCallee, MemoryInst, ModuleInst, TableInst,
};
pub use instr::{Instr, Pc};
pub use metering::Meter;
pub use stack::{Frame, Label, StackMgr};
pub use store::{
    DataAddr, ElemAddr, FuncAddr, GlobalAddr, MemAddr, ModuleAddr, Store, TableAddr,
};
pub use value::Value;
