//! A small typed expression language over fixed-width unsigned integers.
//!
//! Expressions are trees with exclusive ownership of their children. Leaves
//! are typed constants or variables bound to a row of an
//! [`NpArray`](glimmer_np::NpArray); nodes are bitwise and shift operators,
//! truncations and the AES S-box lookups. A [`Context`] maps variable names
//! to shared row cursors and can step all of them to the next trace at once,
//! so one parsed expression can be evaluated over a whole matrix.

mod parser;

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use thiserror::Error;

use glimmer_np::{Element, NpArray};

pub use parser::Parser;

/// The forward AES S-box.
pub const AES_SBOX: [u8; 256] = [
    0x63, 0x7c, 0x77, 0x7b, 0xf2, 0x6b, 0x6f, 0xc5, 0x30, 0x01, 0x67, 0x2b, 0xfe, 0xd7, 0xab,
    0x76, 0xca, 0x82, 0xc9, 0x7d, 0xfa, 0x59, 0x47, 0xf0, 0xad, 0xd4, 0xa2, 0xaf, 0x9c, 0xa4,
    0x72, 0xc0, 0xb7, 0xfd, 0x93, 0x26, 0x36, 0x3f, 0xf7, 0xcc, 0x34, 0xa5, 0xe5, 0xf1, 0x71,
    0xd8, 0x31, 0x15, 0x04, 0xc7, 0x23, 0xc3, 0x18, 0x96, 0x05, 0x9a, 0x07, 0x12, 0x80, 0xe2,
    0xeb, 0x27, 0xb2, 0x75, 0x09, 0x83, 0x2c, 0x1a, 0x1b, 0x6e, 0x5a, 0xa0, 0x52, 0x3b, 0xd6,
    0xb3, 0x29, 0xe3, 0x2f, 0x84, 0x53, 0xd1, 0x00, 0xed, 0x20, 0xfc, 0xb1, 0x5b, 0x6a, 0xcb,
    0xbe, 0x39, 0x4a, 0x4c, 0x58, 0xcf, 0xd0, 0xef, 0xaa, 0xfb, 0x43, 0x4d, 0x33, 0x85, 0x45,
    0xf9, 0x02, 0x7f, 0x50, 0x3c, 0x9f, 0xa8, 0x51, 0xa3, 0x40, 0x8f, 0x92, 0x9d, 0x38, 0xf5,
    0xbc, 0xb6, 0xda, 0x21, 0x10, 0xff, 0xf3, 0xd2, 0xcd, 0x0c, 0x13, 0xec, 0x5f, 0x97, 0x44,
    0x17, 0xc4, 0xa7, 0x7e, 0x3d, 0x64, 0x5d, 0x19, 0x73, 0x60, 0x81, 0x4f, 0xdc, 0x22, 0x2a,
    0x90, 0x88, 0x46, 0xee, 0xb8, 0x14, 0xde, 0x5e, 0x0b, 0xdb, 0xe0, 0x32, 0x3a, 0x0a, 0x49,
    0x06, 0x24, 0x5c, 0xc2, 0xd3, 0xac, 0x62, 0x91, 0x95, 0xe4, 0x79, 0xe7, 0xc8, 0x37, 0x6d,
    0x8d, 0xd5, 0x4e, 0xa9, 0x6c, 0x56, 0xf4, 0xea, 0x65, 0x7a, 0xae, 0x08, 0xba, 0x78, 0x25,
    0x2e, 0x1c, 0xa6, 0xb4, 0xc6, 0xe8, 0xdd, 0x74, 0x1f, 0x4b, 0xbd, 0x8b, 0x8a, 0x70, 0x3e,
    0xb5, 0x66, 0x48, 0x03, 0xf6, 0x0e, 0x61, 0x35, 0x57, 0xb9, 0x86, 0xc1, 0x1d, 0x9e, 0xe1,
    0xf8, 0x98, 0x11, 0x69, 0xd9, 0x8e, 0x94, 0x9b, 0x1e, 0x87, 0xe9, 0xce, 0x55, 0x28, 0xdf,
    0x8c, 0xa1, 0x89, 0x0d, 0xbf, 0xe6, 0x42, 0x68, 0x41, 0x99, 0x2d, 0x0f, 0xb0, 0x54, 0xbb,
    0x16,
];

/// The inverse AES S-box.
pub const AES_ISBOX: [u8; 256] = [
    0x52, 0x09, 0x6a, 0xd5, 0x30, 0x36, 0xa5, 0x38, 0xbf, 0x40, 0xa3, 0x9e, 0x81, 0xf3, 0xd7,
    0xfb, 0x7c, 0xe3, 0x39, 0x82, 0x9b, 0x2f, 0xff, 0x87, 0x34, 0x8e, 0x43, 0x44, 0xc4, 0xde,
    0xe9, 0xcb, 0x54, 0x7b, 0x94, 0x32, 0xa6, 0xc2, 0x23, 0x3d, 0xee, 0x4c, 0x95, 0x0b, 0x42,
    0xfa, 0xc3, 0x4e, 0x08, 0x2e, 0xa1, 0x66, 0x28, 0xd9, 0x24, 0xb2, 0x76, 0x5b, 0xa2, 0x49,
    0x6d, 0x8b, 0xd1, 0x25, 0x72, 0xf8, 0xf6, 0x64, 0x86, 0x68, 0x98, 0x16, 0xd4, 0xa4, 0x5c,
    0xcc, 0x5d, 0x65, 0xb6, 0x92, 0x6c, 0x70, 0x48, 0x50, 0xfd, 0xed, 0xb9, 0xda, 0x5e, 0x15,
    0x46, 0x57, 0xa7, 0x8d, 0x9d, 0x84, 0x90, 0xd8, 0xab, 0x00, 0x8c, 0xbc, 0xd3, 0x0a, 0xf7,
    0xe4, 0x58, 0x05, 0xb8, 0xb3, 0x45, 0x06, 0xd0, 0x2c, 0x1e, 0x8f, 0xca, 0x3f, 0x0f, 0x02,
    0xc1, 0xaf, 0xbd, 0x03, 0x01, 0x13, 0x8a, 0x6b, 0x3a, 0x91, 0x11, 0x41, 0x4f, 0x67, 0xdc,
    0xea, 0x97, 0xf2, 0xcf, 0xce, 0xf0, 0xb4, 0xe6, 0x73, 0x96, 0xac, 0x74, 0x22, 0xe7, 0xad,
    0x35, 0x85, 0xe2, 0xf9, 0x37, 0xe8, 0x1c, 0x75, 0xdf, 0x6e, 0x47, 0xf1, 0x1a, 0x71, 0x1d,
    0x29, 0xc5, 0x89, 0x6f, 0xb7, 0x62, 0x0e, 0xaa, 0x18, 0xbe, 0x1b, 0xfc, 0x56, 0x3e, 0x4b,
    0xc6, 0xd2, 0x79, 0x20, 0x9a, 0xdb, 0xc0, 0xfe, 0x78, 0xcd, 0x5a, 0xf4, 0x1f, 0xdd, 0xa8,
    0x33, 0x88, 0x07, 0xc7, 0x31, 0xb1, 0x12, 0x10, 0x59, 0x27, 0x80, 0xec, 0x5f, 0x60, 0x51,
    0x7f, 0xa9, 0x19, 0xb5, 0x4a, 0x0d, 0x2d, 0xe5, 0x7a, 0x9f, 0x93, 0xc9, 0x9c, 0xef, 0xa0,
    0xe0, 0x3b, 0x4d, 0xae, 0x2a, 0xf5, 0xb0, 0xc8, 0xeb, 0xbb, 0x3c, 0x83, 0x53, 0x99, 0x61,
    0x17, 0x2b, 0x04, 0x7e, 0xba, 0x77, 0xd6, 0x26, 0xe1, 0x69, 0x14, 0x63, 0x55, 0x21, 0x0c,
    0x7d,
];

/// The width of an expression value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ValueType {
    /// 8-bit unsigned.
    U8,
    /// 16-bit unsigned.
    U16,
    /// 32-bit unsigned.
    U32,
    /// 64-bit unsigned.
    U64,
}

impl ValueType {
    /// The number of bits of this type.
    pub fn bits(self) -> u32 {
        match self {
            ValueType::U8 => 8,
            ValueType::U16 => 16,
            ValueType::U32 => 32,
            ValueType::U64 => 64,
        }
    }

    fn mask(self) -> u64 {
        match self {
            ValueType::U64 => u64::MAX,
            ty => (1u64 << ty.bits()) - 1,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "u{}", self.bits())
    }
}

/// A 64-bit payload truncated to its declared type on construction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Value(u64);

impl Value {
    /// Construct a value of type `ty`, truncating `v` to its width.
    pub fn new(v: u64, ty: ValueType) -> Self {
        Self(v & ty.mask())
    }

    /// The payload.
    pub fn value(self) -> u64 {
        self.0
    }
}

/// Errors raised when building ill-typed expressions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExprError {
    /// The operands of a binary operator must share one type.
    #[error("operands of a binary operator must have the same type")]
    TypeMismatch,
    /// Truncation must narrow its operand.
    #[error("truncation must be to a strictly smaller type")]
    TruncationMustNarrow,
    /// The AES operators work on bytes.
    #[error("AES operation input must be of type u8")]
    AesOperandMustBeU8,
}

/// An element type usable as the backing store of expression variables.
pub trait ExprElement: Element {
    /// The expression-level type of this element.
    const VALUE_TYPE: ValueType;

    /// Wrap a concrete cursor in the type-erased [`VarRef`].
    fn wrap(cursor: VarCursor<Self>) -> VarRef;
}

macro_rules! expr_element {
    ($t:ty, $vt:ident) => {
        impl ExprElement for $t {
            const VALUE_TYPE: ValueType = ValueType::$vt;

            fn wrap(cursor: VarCursor<Self>) -> VarRef {
                VarRef::$vt(cursor)
            }
        }
    };
}

expr_element!(u8, U8);
expr_element!(u16, U16);
expr_element!(u32, U32);
expr_element!(u64, U64);

struct CursorState<T: Element> {
    arr: Rc<NpArray<T>>,
    row: usize,
    init: usize,
}

/// A shared, advanceable cursor over the rows of one array. All clones step
/// together.
pub struct VarCursor<T: Element>(Rc<RefCell<CursorState<T>>>);

impl<T: Element> Clone for VarCursor<T> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<T: Element> VarCursor<T> {
    /// A cursor over `arr`, starting at `row`.
    pub fn new(arr: Rc<NpArray<T>>, row: usize) -> Self {
        Self(Rc::new(RefCell::new(CursorState { arr, row, init: row })))
    }

    /// The element at column `index` of the current row.
    pub fn get(&self, index: usize) -> T {
        let state = self.0.borrow();
        state.arr.get(state.row, index)
    }

    /// Step to the next row.
    pub fn advance(&self) {
        self.0.borrow_mut().row += 1;
    }

    /// Rewind to the starting row.
    pub fn reset(&self) {
        let mut state = self.0.borrow_mut();
        state.row = state.init;
    }
}

/// A type-erased variable cursor, one variant per legal element width.
#[derive(Clone)]
pub enum VarRef {
    /// A cursor over a `u8` array.
    U8(VarCursor<u8>),
    /// A cursor over a `u16` array.
    U16(VarCursor<u16>),
    /// A cursor over a `u32` array.
    U32(VarCursor<u32>),
    /// A cursor over a `u64` array.
    U64(VarCursor<u64>),
}

impl VarRef {
    /// The expression type of the elements behind this cursor.
    pub fn value_type(&self) -> ValueType {
        match self {
            VarRef::U8(_) => ValueType::U8,
            VarRef::U16(_) => ValueType::U16,
            VarRef::U32(_) => ValueType::U32,
            VarRef::U64(_) => ValueType::U64,
        }
    }

    /// The element at column `index` of the current row.
    pub fn get(&self, index: usize) -> u64 {
        match self {
            VarRef::U8(c) => c.get(index) as u64,
            VarRef::U16(c) => c.get(index) as u64,
            VarRef::U32(c) => c.get(index) as u64,
            VarRef::U64(c) => c.get(index),
        }
    }
}

impl fmt::Debug for VarRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VarRef<{}>", self.value_type())
    }
}

/// Maps variable names to row cursors over arrays of one element type.
pub struct Context<T: ExprElement> {
    variables: BTreeMap<String, VarCursor<T>>,
}

impl<T: ExprElement> Default for Context<T> {
    fn default() -> Self {
        Self { variables: BTreeMap::new() }
    }
}

impl<T: ExprElement> Context<T> {
    /// An empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to a cursor over the first row of `arr`.
    pub fn add_variable(&mut self, name: impl Into<String>, arr: Rc<NpArray<T>>) -> &mut Self {
        self.variables.insert(name.into(), VarCursor::new(arr, 0));
        self
    }

    /// Is `name` bound?
    pub fn has_variable(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    /// The cursor bound to `name`.
    pub fn variable(&self, name: &str) -> Option<VarCursor<T>> {
        self.variables.get(name).cloned()
    }

    /// Step every bound cursor to its next row.
    pub fn advance(&mut self) {
        for cursor in self.variables.values() {
            cursor.advance();
        }
    }

    /// Rewind every bound cursor to its starting row.
    pub fn reset(&mut self) {
        for cursor in self.variables.values() {
            cursor.reset();
        }
    }
}

/// A typed expression tree with owned children.
#[derive(Debug)]
pub enum Expr {
    /// A typed literal.
    Constant {
        /// The literal's type.
        ty: ValueType,
        /// The literal's value, truncated to `ty`.
        value: Value,
    },
    /// One element of the current row of a named matrix.
    Variable {
        /// The row cursor.
        var: VarRef,
        /// The column read at evaluation time.
        index: usize,
        /// The variable's name, for `repr`.
        name: String,
    },
    /// Bitwise complement.
    Not(Box<Expr>),
    /// Truncation to a strictly narrower type.
    Truncate {
        /// The type truncated to.
        ty: ValueType,
        /// The truncated operand.
        op: Box<Expr>,
    },
    /// Forward AES S-box lookup (u8 → u8).
    AesSbox(Box<Expr>),
    /// Inverse AES S-box lookup (u8 → u8).
    AesISbox(Box<Expr>),
    /// Bitwise AND.
    And(Box<Expr>, Box<Expr>),
    /// Bitwise OR.
    Or(Box<Expr>, Box<Expr>),
    /// Bitwise XOR.
    Xor(Box<Expr>, Box<Expr>),
    /// Logical shift left.
    Lsl(Box<Expr>, Box<Expr>),
    /// Logical shift right (zero fill).
    Lsr(Box<Expr>, Box<Expr>),
    /// Arithmetic shift right (sign fill at the operand's width).
    Asr(Box<Expr>, Box<Expr>),
}

impl Expr {
    /// A typed constant, truncated to `ty`.
    pub fn constant(ty: ValueType, value: u64) -> Expr {
        Expr::Constant { ty, value: Value::new(value, ty) }
    }

    /// A variable bound to column `index` of a row cursor.
    pub fn variable(var: VarRef, index: usize, name: impl Into<String>) -> Expr {
        Expr::Variable { var, index, name: name.into() }
    }

    /// Bitwise complement of `op`.
    pub fn not(op: Expr) -> Expr {
        Expr::Not(Box::new(op))
    }

    /// Truncate `op` to the strictly narrower type `ty`.
    pub fn truncate(ty: ValueType, op: Expr) -> Result<Expr, ExprError> {
        if ty.bits() >= op.value_type().bits() {
            return Err(ExprError::TruncationMustNarrow);
        }
        Ok(Expr::Truncate { ty, op: Box::new(op) })
    }

    /// Forward AES S-box lookup; `op` must be u8.
    pub fn aes_sbox(op: Expr) -> Result<Expr, ExprError> {
        if op.value_type() != ValueType::U8 {
            return Err(ExprError::AesOperandMustBeU8);
        }
        Ok(Expr::AesSbox(Box::new(op)))
    }

    /// Inverse AES S-box lookup; `op` must be u8.
    pub fn aes_isbox(op: Expr) -> Result<Expr, ExprError> {
        if op.value_type() != ValueType::U8 {
            return Err(ExprError::AesOperandMustBeU8);
        }
        Ok(Expr::AesISbox(Box::new(op)))
    }

    fn binary(
        lhs: Expr,
        rhs: Expr,
        build: impl FnOnce(Box<Expr>, Box<Expr>) -> Expr,
    ) -> Result<Expr, ExprError> {
        if lhs.value_type() != rhs.value_type() {
            return Err(ExprError::TypeMismatch);
        }
        Ok(build(Box::new(lhs), Box::new(rhs)))
    }

    /// Bitwise AND of two same-typed expressions.
    pub fn and(lhs: Expr, rhs: Expr) -> Result<Expr, ExprError> {
        Self::binary(lhs, rhs, Expr::And)
    }

    /// Bitwise OR of two same-typed expressions.
    pub fn or(lhs: Expr, rhs: Expr) -> Result<Expr, ExprError> {
        Self::binary(lhs, rhs, Expr::Or)
    }

    /// Bitwise XOR of two same-typed expressions.
    pub fn xor(lhs: Expr, rhs: Expr) -> Result<Expr, ExprError> {
        Self::binary(lhs, rhs, Expr::Xor)
    }

    /// Logical shift left.
    pub fn lsl(lhs: Expr, rhs: Expr) -> Result<Expr, ExprError> {
        Self::binary(lhs, rhs, Expr::Lsl)
    }

    /// Logical shift right.
    pub fn lsr(lhs: Expr, rhs: Expr) -> Result<Expr, ExprError> {
        Self::binary(lhs, rhs, Expr::Lsr)
    }

    /// Arithmetic shift right.
    pub fn asr(lhs: Expr, rhs: Expr) -> Result<Expr, ExprError> {
        Self::binary(lhs, rhs, Expr::Asr)
    }

    /// The type of this expression's value.
    pub fn value_type(&self) -> ValueType {
        match self {
            Expr::Constant { ty, .. } => *ty,
            Expr::Variable { var, .. } => var.value_type(),
            Expr::Not(op) => op.value_type(),
            Expr::Truncate { ty, .. } => *ty,
            Expr::AesSbox(_) | Expr::AesISbox(_) => ValueType::U8,
            Expr::And(lhs, _)
            | Expr::Or(lhs, _)
            | Expr::Xor(lhs, _)
            | Expr::Lsl(lhs, _)
            | Expr::Lsr(lhs, _)
            | Expr::Asr(lhs, _) => lhs.value_type(),
        }
    }

    /// Evaluate this expression, post-order.
    pub fn eval(&self) -> Value {
        match self {
            Expr::Constant { value, .. } => *value,
            Expr::Variable { var, index, .. } => Value::new(var.get(*index), var.value_type()),
            Expr::Not(op) => Value::new(!op.eval().value(), op.value_type()),
            Expr::Truncate { ty, op } => Value::new(op.eval().value(), *ty),
            Expr::AesSbox(op) => {
                Value::new(AES_SBOX[op.eval().value() as usize] as u64, ValueType::U8)
            }
            Expr::AesISbox(op) => {
                Value::new(AES_ISBOX[op.eval().value() as usize] as u64, ValueType::U8)
            }
            Expr::And(lhs, rhs) => {
                Value::new(lhs.eval().value() & rhs.eval().value(), lhs.value_type())
            }
            Expr::Or(lhs, rhs) => {
                Value::new(lhs.eval().value() | rhs.eval().value(), lhs.value_type())
            }
            Expr::Xor(lhs, rhs) => {
                Value::new(lhs.eval().value() ^ rhs.eval().value(), lhs.value_type())
            }
            Expr::Lsl(lhs, rhs) => {
                let sh = rhs.eval().value();
                let v = if sh >= 64 { 0 } else { lhs.eval().value() << sh };
                Value::new(v, lhs.value_type())
            }
            Expr::Lsr(lhs, rhs) => {
                let sh = rhs.eval().value();
                let v = if sh >= 64 { 0 } else { lhs.eval().value() >> sh };
                Value::new(v, lhs.value_type())
            }
            Expr::Asr(lhs, rhs) => {
                let ty = lhs.value_type();
                let w = ty.bits();
                let sh = rhs.eval().value().min(63);
                // Sign-extend the operand from its width, then shift.
                let extended = ((lhs.eval().value() << (64 - w)) as i64) >> (64 - w);
                Value::new((extended >> sh) as u64, ty)
            }
        }
    }

    /// The canonical textual form of this expression, with the current value
    /// of each variable in parentheses.
    pub fn repr(&self) -> String {
        match self {
            Expr::Constant { ty, value } => format!("{}_{}", value.value(), ty),
            Expr::Variable { var, index, name } => {
                if name.is_empty() {
                    format!("{}", var.get(*index))
                } else {
                    format!("${name}[{index}]({})", var.get(*index))
                }
            }
            Expr::Not(op) => format!("NOT({})", op.repr()),
            Expr::Truncate { ty, op } => format!("TRUNC{}({})", ty.bits(), op.repr()),
            Expr::AesSbox(op) => format!("AES_SBOX({})", op.repr()),
            Expr::AesISbox(op) => format!("AES_ISBOX({})", op.repr()),
            Expr::And(lhs, rhs) => format!("AND({},{})", lhs.repr(), rhs.repr()),
            Expr::Or(lhs, rhs) => format!("OR({},{})", lhs.repr(), rhs.repr()),
            Expr::Xor(lhs, rhs) => format!("XOR({},{})", lhs.repr(), rhs.repr()),
            Expr::Lsl(lhs, rhs) => format!("LSL({},{})", lhs.repr(), rhs.repr()),
            Expr::Lsr(lhs, rhs) => format!("LSR({},{})", lhs.repr(), rhs.repr()),
            Expr::Asr(lhs, rhs) => format!("ASR({},{})", lhs.repr(), rhs.repr()),
        }
    }
}
