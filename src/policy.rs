//! generation policy.
//!
//! A bundle of weighted categorical distributions that drives every random
//! choice made by the generator. Composing two policies means element-wise
//! merging of weights: rather than mutate a shared global, a [`Policy`]
//! value is cloned and re-weighted as it is threaded down the recursion
//! (self-similar patterns).

use crate::typed_val::IntegerKind;

/// A small (value, weight) table. Weight 0 means "never chosen".
#[derive(Clone, Debug)]
pub struct WeightedSet<T: Clone> {
    entries: Vec<(T, u32)>,
}

impl<T: Clone> WeightedSet<T> {
    pub fn new(entries: Vec<(T, u32)>) -> Self {
        WeightedSet { entries }
    }

    pub fn total_weight(&self) -> u32 {
        self.entries.iter().map(|(_, w)| *w).sum()
    }

    pub fn entries(&self) -> &[(T, u32)] {
        &self.entries
    }

    /// Multiply matching entries' weights by `factor` (self-similar pattern bias).
    pub fn bias<F: Fn(&T) -> bool>(&mut self, pred: F, factor: u32) {
        for (v, w) in self.entries.iter_mut() {
            if pred(v) {
                *w = w.saturating_mul(factor);
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CvQualChoice {
    None,
    Volatile,
    Const,
    ConstVolatile,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemberClass {
    Scalar,
    Struct,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BitFieldChoice {
    None,
    Named,
    Unnamed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOpChoice {
    PreInc,
    PreDec,
    PostInc,
    PostDec,
    Plus,
    Negate,
    LogNot,
    BitNot,
}

pub const ALL_UNARY_OPS: [UnaryOpChoice; 8] = [
    UnaryOpChoice::PreInc,
    UnaryOpChoice::PreDec,
    UnaryOpChoice::PostInc,
    UnaryOpChoice::PostDec,
    UnaryOpChoice::Plus,
    UnaryOpChoice::Negate,
    UnaryOpChoice::LogNot,
    UnaryOpChoice::BitNot,
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOpChoice {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Shl,
    Shr,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
    BitAnd,
    BitXor,
    BitOr,
    LogAnd,
    LogOr,
}

impl std::fmt::Display for UnaryOpChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use UnaryOpChoice::*;
        let s = match self {
            PreInc => "++",
            PreDec => "--",
            PostInc => "++",
            PostDec => "--",
            Plus => "+",
            Negate => "-",
            LogNot => "!",
            BitNot => "~",
        };
        write!(f, "{}", s)
    }
}

impl std::fmt::Display for BinaryOpChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use BinaryOpChoice::*;
        let s = match self {
            Add => "+",
            Sub => "-",
            Mul => "*",
            Div => "/",
            Mod => "%",
            Shl => "<<",
            Shr => ">>",
            Lt => "<",
            Gt => ">",
            Le => "<=",
            Ge => ">=",
            Eq => "==",
            Ne => "!=",
            BitAnd => "&",
            BitXor => "^",
            BitOr => "|",
            LogAnd => "&&",
            LogOr => "||",
        };
        write!(f, "{}", s)
    }
}

pub const ALL_BINARY_OPS: [BinaryOpChoice; 18] = [
    BinaryOpChoice::Add,
    BinaryOpChoice::Sub,
    BinaryOpChoice::Mul,
    BinaryOpChoice::Div,
    BinaryOpChoice::Mod,
    BinaryOpChoice::Shl,
    BinaryOpChoice::Shr,
    BinaryOpChoice::Lt,
    BinaryOpChoice::Gt,
    BinaryOpChoice::Le,
    BinaryOpChoice::Ge,
    BinaryOpChoice::Eq,
    BinaryOpChoice::Ne,
    BinaryOpChoice::BitAnd,
    BinaryOpChoice::BitXor,
    BinaryOpChoice::BitOr,
    BinaryOpChoice::LogAnd,
    BinaryOpChoice::LogOr,
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StmtKind {
    Decl,
    ExprStmt,
    If,
    Scope,
}

/// One of the two self-similar-pattern flavors (this engine, glossary "SSP").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SspKind {
    ConstUse,
    SimilarOp,
}

#[derive(Clone, Debug)]
pub struct Policy {
    pub allowed_int_kinds: WeightedSet<IntegerKind>,
    pub allowed_cv_qual: WeightedSet<CvQualChoice>,
    pub allow_static_var: bool,
    pub allow_static_members: bool,
    pub allow_mix_cv_qual_in_struct: bool,
    pub allow_mix_static_in_struct: bool,
    pub allow_mix_types_in_struct: bool,
    pub bit_field_prob: WeightedSet<BitFieldChoice>,
    pub member_class_prob: WeightedSet<MemberClass>,
    pub min_struct_members: u32,
    pub max_struct_members: u32,
    pub max_struct_depth: u32,
    pub allowed_stmt_kinds: WeightedSet<StmtKind>,
    pub allowed_unary_ops: WeightedSet<UnaryOpChoice>,
    pub allowed_binary_ops: WeightedSet<BinaryOpChoice>,
    pub ssp_weight: u32,
    pub ssp_const_use_factor: u32,
    pub ssp_similar_op_factor: u32,
    pub max_expr_depth: u32,
    pub max_scope_depth: u32,
    pub max_if_depth: u32,
    pub total_expr_budget_per_function: u32,
    pub min_scope_stmts: u32,
    pub max_scope_stmts: u32,
    pub arith_const_buf_size: u32,
    pub bit_logical_const_buf_size: u32,
    pub num_input_vars: u32,
    pub num_mixed_vars: u32,
    pub num_output_vars: u32,
    pub num_struct_types: u32,
    pub num_functions: u32,
}

impl Default for Policy {
    fn default() -> Self {
        use BinaryOpChoice::*;
        use UnaryOpChoice::*;
        Policy {
            allowed_int_kinds: WeightedSet::new(
                crate::typed_val::ALL_INTEGER_KINDS.iter().map(|k| (*k, 10)).collect(),
            ),
            allowed_cv_qual: WeightedSet::new(vec![
                (CvQualChoice::None, 70),
                (CvQualChoice::Volatile, 10),
                (CvQualChoice::Const, 15),
                (CvQualChoice::ConstVolatile, 5),
            ]),
            allow_static_var: true,
            allow_static_members: true,
            allow_mix_cv_qual_in_struct: true,
            allow_mix_static_in_struct: true,
            allow_mix_types_in_struct: true,
            bit_field_prob: WeightedSet::new(vec![
                (BitFieldChoice::None, 80),
                (BitFieldChoice::Named, 15),
                (BitFieldChoice::Unnamed, 5),
            ]),
            member_class_prob: WeightedSet::new(vec![
                (MemberClass::Scalar, 85),
                (MemberClass::Struct, 15),
            ]),
            min_struct_members: 1,
            max_struct_members: 6,
            max_struct_depth: 2,
            allowed_stmt_kinds: WeightedSet::new(vec![
                (StmtKind::Decl, 25),
                (StmtKind::ExprStmt, 45),
                (StmtKind::If, 20),
                (StmtKind::Scope, 10),
            ]),
            allowed_unary_ops: WeightedSet::new(
                ALL_UNARY_OPS.iter().map(|o| (*o, 10)).collect::<Vec<_>>()
                    .into_iter()
                    .map(|(o, w)| match o {
                        PreInc | PreDec | PostInc | PostDec => (o, w / 2),
                        _ => (o, w),
                    })
                    .collect(),
            ),
            allowed_binary_ops: WeightedSet::new(ALL_BINARY_OPS.iter().map(|o| (*o, 10)).collect()),
            ssp_weight: 30,
            ssp_const_use_factor: 4,
            ssp_similar_op_factor: 4,
            max_expr_depth: 5,
            max_scope_depth: 3,
            max_if_depth: 3,
            total_expr_budget_per_function: 400,
            min_scope_stmts: 2,
            max_scope_stmts: 8,
            arith_const_buf_size: 4,
            bit_logical_const_buf_size: 4,
            num_input_vars: 6,
            num_mixed_vars: 6,
            num_output_vars: 4,
            num_struct_types: 3,
            num_functions: 5,
        }
    }
}

impl Policy {
    /// Element-wise weight merge of two policies.
    pub fn compose(&self, other: &Policy) -> Policy {
        fn merge<T: Clone + PartialEq>(a: &WeightedSet<T>, b: &WeightedSet<T>) -> WeightedSet<T> {
            let mut out = Vec::new();
            for (v, w) in a.entries() {
                let bw = b.entries().iter().find(|(bv, _)| bv == v).map(|(_, w)| *w).unwrap_or(*w);
                // normalized element-wise weight product, floor of 1 so no entry goes unreachable.
                let merged = (*w as u64 * bw as u64 / 10).max(1) as u32;
                out.push((v.clone(), merged));
            }
            WeightedSet::new(out)
        }
        let mut composed = self.clone();
        composed.allowed_int_kinds = merge(&self.allowed_int_kinds, &other.allowed_int_kinds);
        composed.allowed_cv_qual = merge(&self.allowed_cv_qual, &other.allowed_cv_qual);
        composed.allowed_unary_ops = merge(&self.allowed_unary_ops, &other.allowed_unary_ops);
        composed.allowed_binary_ops = merge(&self.allowed_binary_ops, &other.allowed_binary_ops);
        composed
    }
}
