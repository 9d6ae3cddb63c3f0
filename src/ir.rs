//! The IR ("three-address code"): the target of stage I, and the source of
//! stage S. Flat, linear, name-addressed - no nested expressions.

use crate::ast::{BinaryOp, Constant, UnaryOp};
use crate::types::{StaticInit, Type};

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Constant(Constant),
    Var(String),
}

impl Value {
    pub fn ty(&self, symbols: &crate::types::SymbolTable) -> Type {
        match self {
            Value::Constant(c) => c.ty(),
            Value::Var(name) => symbols
                .get(name)
                .unwrap_or_else(|| panic!("ir value '{name}' missing from the symbol table"))
                .ty
                .clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    Return(Option<Value>),
    Unary {
        op: UnaryOp,
        src: Value,
        dst: Value,
    },
    Binary {
        op: BinaryOp,
        src1: Value,
        src2: Value,
        dst: Value,
    },
    Copy {
        src: Value,
        dst: Value,
    },
    Jump(String),
    JumpIfZero {
        cond: Value,
        target: String,
    },
    JumpIfNotZero {
        cond: Value,
        target: String,
    },
    Label(String),
    FunCall {
        name: String,
        args: Vec<Value>,
        dst: Value,
    },
    SignExtend {
        src: Value,
        dst: Value,
    },
    ZeroExtend {
        src: Value,
        dst: Value,
    },
    Truncate {
        src: Value,
        dst: Value,
    },
    DoubleToInt {
        src: Value,
        dst: Value,
    },
    DoubleToUInt {
        src: Value,
        dst: Value,
    },
    IntToDouble {
        src: Value,
        dst: Value,
    },
    UIntToDouble {
        src: Value,
        dst: Value,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub global: bool,
    pub params: Vec<String>,
    pub body: Vec<Instruction>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StaticVariable {
    pub name: String,
    pub global: bool,
    pub ty: Type,
    pub init: StaticInit,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TopLevel {
    Function(Function),
    StaticVariable(StaticVariable),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub top_level: Vec<TopLevel>,
}
