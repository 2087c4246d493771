use upp_common::Ident;
use upp_types::TypeId;

use crate::ids::BlockId;

#[derive(Debug, Clone)]
pub struct IrFunction {
    pub name: Ident,
    pub signature: TypeId,
    pub entry: BlockId,
}
