use wasmparser::ValType;

use crate::value::Value;

/// A global variable instance.
pub struct GlobalInst {
    pub ty: ValType,
    pub mutable: bool,
    pub value: Value,
}

impl GlobalInst {
    pub fn new(mutable: bool, value: Value) -> Self {
        GlobalInst {
            ty: value.ty(),
            mutable,
            value,
        }
    }

    /// Pointer into the stored value for the execution context. Valid while
    /// the store holds this instance at a stable address.
    pub fn value_ptr(&mut self) -> *mut Value {
        &mut self.value
    }
}
