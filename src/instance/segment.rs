use crate::store::FuncAddr;

/// A passive element segment. `elem.drop` releases the references; later
/// reads see an empty segment.
pub struct ElemInst {
    refs: Vec<Option<FuncAddr>>,
}

impl ElemInst {
    pub fn new(refs: Vec<Option<FuncAddr>>) -> Self {
        ElemInst { refs }
    }

    pub fn refs(&self) -> &[Option<FuncAddr>] {
        &self.refs
    }

    pub fn clear(&mut self) {
        self.refs.clear();
    }
}

/// A passive data segment. `data.drop` releases the bytes.
pub struct DataInst {
    bytes: Vec<u8>,
}

impl DataInst {
    pub fn new(bytes: Vec<u8>) -> Self {
        DataInst { bytes }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn clear(&mut self) {
        self.bytes.clear();
    }
}
