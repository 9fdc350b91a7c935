use wasmparser::FuncType;

use crate::store::{DataAddr, ElemAddr, FuncAddr, GlobalAddr, MemAddr, TableAddr};

/// Runtime image of an instantiated module.
///
/// Maps each local index space to store-wide addresses and carries the type
/// section for block-type and indirect-call signature lookups. Instances are
/// reached through the store only; the module holds no back-pointers.
#[derive(Default)]
pub struct ModuleInst {
    pub types: Vec<FuncType>,
    pub func_addrs: Vec<FuncAddr>,
    pub table_addrs: Vec<TableAddr>,
    pub mem_addrs: Vec<MemAddr>,
    pub global_addrs: Vec<GlobalAddr>,
    pub elem_addrs: Vec<ElemAddr>,
    pub data_addrs: Vec<DataAddr>,
}

impl ModuleInst {
    pub fn new(types: Vec<FuncType>) -> Self {
        ModuleInst {
            types,
            ..ModuleInst::default()
        }
    }

    pub fn func_type(&self, idx: u32) -> Option<&FuncType> {
        self.types.get(idx as usize)
    }

    // Index-space translation. `None` means the index is not bound in this
    // module, which the resolvers pass through as their "no instance" signal.

    pub fn func_addr(&self, idx: u32) -> Option<FuncAddr> {
        self.func_addrs.get(idx as usize).copied()
    }

    pub fn table_addr(&self, idx: u32) -> Option<TableAddr> {
        self.table_addrs.get(idx as usize).copied()
    }

    pub fn mem_addr(&self, idx: u32) -> Option<MemAddr> {
        self.mem_addrs.get(idx as usize).copied()
    }

    pub fn global_addr(&self, idx: u32) -> Option<GlobalAddr> {
        self.global_addrs.get(idx as usize).copied()
    }

    pub fn elem_addr(&self, idx: u32) -> Option<ElemAddr> {
        self.elem_addrs.get(idx as usize).copied()
    }

    pub fn data_addr(&self, idx: u32) -> Option<DataAddr> {
        self.data_addrs.get(idx as usize).copied()
    }
}
