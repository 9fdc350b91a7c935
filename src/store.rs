//! Flat address tables, one per resource kind.
//!
//! The store has sole ownership of every runtime instance. Frames, tables,
//! and module index spaces refer to instances through opaque 32-bit
//! addresses, never through back-pointers, which keeps the
//! frame → module → function graph acyclic. Lookups are total on valid
//! addresses; a miss is an internal signal (`None`), not an error.

use crate::instance::{
    DataInst, ElemInst, FuncInst, GlobalInst, MemoryInst, ModuleInst, TableInst,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FuncAddr(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableAddr(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemAddr(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalAddr(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElemAddr(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataAddr(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleAddr(pub u32);

/// Owner of all runtime instances, addressed by kind-typed handles.
#[derive(Default)]
pub struct Store {
    funcs: Vec<FuncInst>,
    tables: Vec<TableInst>,
    memories: Vec<MemoryInst>,
    globals: Vec<GlobalInst>,
    elems: Vec<ElemInst>,
    datas: Vec<DataInst>,
    modules: Vec<ModuleInst>,
}

impl Store {
    pub fn new() -> Self {
        Store::default()
    }

    pub fn add_func(&mut self, inst: FuncInst) -> FuncAddr {
        self.funcs.push(inst);
        FuncAddr(self.funcs.len() as u32 - 1)
    }

    pub fn add_table(&mut self, inst: TableInst) -> TableAddr {
        self.tables.push(inst);
        TableAddr(self.tables.len() as u32 - 1)
    }

    pub fn add_memory(&mut self, inst: MemoryInst) -> MemAddr {
        self.memories.push(inst);
        MemAddr(self.memories.len() as u32 - 1)
    }

    pub fn add_global(&mut self, inst: GlobalInst) -> GlobalAddr {
        self.globals.push(inst);
        GlobalAddr(self.globals.len() as u32 - 1)
    }

    pub fn add_elem(&mut self, inst: ElemInst) -> ElemAddr {
        self.elems.push(inst);
        ElemAddr(self.elems.len() as u32 - 1)
    }

    pub fn add_data(&mut self, inst: DataInst) -> DataAddr {
        self.datas.push(inst);
        DataAddr(self.datas.len() as u32 - 1)
    }

    pub fn add_module(&mut self, inst: ModuleInst) -> ModuleAddr {
        self.modules.push(inst);
        ModuleAddr(self.modules.len() as u32 - 1)
    }

    pub fn func(&self, addr: FuncAddr) -> Option<&FuncInst> {
        self.funcs.get(addr.0 as usize)
    }

    pub fn table(&self, addr: TableAddr) -> Option<&TableInst> {
        self.tables.get(addr.0 as usize)
    }

    pub fn table_mut(&mut self, addr: TableAddr) -> Option<&mut TableInst> {
        self.tables.get_mut(addr.0 as usize)
    }

    pub fn memory(&self, addr: MemAddr) -> Option<&MemoryInst> {
        self.memories.get(addr.0 as usize)
    }

    pub fn memory_mut(&mut self, addr: MemAddr) -> Option<&mut MemoryInst> {
        self.memories.get_mut(addr.0 as usize)
    }

    pub fn global(&self, addr: GlobalAddr) -> Option<&GlobalInst> {
        self.globals.get(addr.0 as usize)
    }

    pub fn global_mut(&mut self, addr: GlobalAddr) -> Option<&mut GlobalInst> {
        self.globals.get_mut(addr.0 as usize)
    }

    pub fn elem(&self, addr: ElemAddr) -> Option<&ElemInst> {
        self.elems.get(addr.0 as usize)
    }

    pub fn elem_mut(&mut self, addr: ElemAddr) -> Option<&mut ElemInst> {
        self.elems.get_mut(addr.0 as usize)
    }

    pub fn data(&self, addr: DataAddr) -> Option<&DataInst> {
        self.datas.get(addr.0 as usize)
    }

    pub fn data_mut(&mut self, addr: DataAddr) -> Option<&mut DataInst> {
        self.datas.get_mut(addr.0 as usize)
    }

    pub fn module(&self, addr: ModuleAddr) -> Option<&ModuleInst> {
        self.modules.get(addr.0 as usize)
    }

    pub fn module_mut(&mut self, addr: ModuleAddr) -> Option<&mut ModuleInst> {
        self.modules.get_mut(addr.0 as usize)
    }
}
