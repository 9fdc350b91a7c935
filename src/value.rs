use wasmparser::ValType;

use crate::store::FuncAddr;

/// A wasm runtime value.
///
/// The operand stack stores these directly; every payload fits 64 bits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    /// Function reference: Some(store address) or None (ref.null func).
    FuncRef(Option<FuncAddr>),
    /// External reference: opaque host handle or None (ref.null extern).
    ExternRef(Option<u32>),
}

impl Value {
    // Typed accessors. Validation guarantees the variant at every use site.

    pub fn unwrap_i32(self) -> i32 {
        match self {
            Value::I32(v) => v,
            _ => panic!("expected i32, got {:?}", self),
        }
    }

    pub fn unwrap_i64(self) -> i64 {
        match self {
            Value::I64(v) => v,
            _ => panic!("expected i64, got {:?}", self),
        }
    }

    pub fn unwrap_f32(self) -> f32 {
        match self {
            Value::F32(v) => v,
            _ => panic!("expected f32, got {:?}", self),
        }
    }

    pub fn unwrap_f64(self) -> f64 {
        match self {
            Value::F64(v) => v,
            _ => panic!("expected f64, got {:?}", self),
        }
    }

    pub fn unwrap_func_ref(self) -> Option<FuncAddr> {
        match self {
            Value::FuncRef(v) => v,
            _ => panic!("expected funcref, got {:?}", self),
        }
    }

    /// Zero value for a declared local or a fresh result slot.
    ///
    /// v128 never reaches the executor; reference types default to null.
    pub fn zero(ty: ValType) -> Value {
        match ty {
            ValType::I32 => Value::I32(0),
            ValType::I64 => Value::I64(0),
            ValType::F32 => Value::F32(0.0),
            ValType::F64 => Value::F64(0.0),
            ValType::Ref(r) if r.is_func_ref() => Value::FuncRef(None),
            _ => Value::ExternRef(None),
        }
    }

    pub fn ty(&self) -> ValType {
        match self {
            Value::I32(_) => ValType::I32,
            Value::I64(_) => ValType::I64,
            Value::F32(_) => ValType::F32,
            Value::F64(_) => ValType::F64,
            Value::FuncRef(_) => ValType::FUNCREF,
            Value::ExternRef(_) => ValType::EXTERNREF,
        }
    }
}
