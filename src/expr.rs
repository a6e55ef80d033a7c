//! Expression IR — tree shape, type/value propagation, UB repair.

use std::cell::RefCell;
use std::rc::Rc;

use log::trace;

use crate::context::Context;
use crate::data::Data;
use crate::error::{bail_invariant, Result};
pub use crate::policy::{BinaryOpChoice as BinaryOp, UnaryOpChoice as UnaryOp};
use crate::typed_val::{BitMode, IntegerKind, TypedVal, UBTag};
use crate::types::Type;

/// A DAG-friendly tree: `VarUse`/`Member` nodes alias a shared
/// `Rc<RefCell<Data>>`, so the same storage location can appear under
/// several expression nodes even though each node owns its own subtree
/// ("ownership of child nodes" — we use `Box` trees with `Rc`
/// aliasing at the `Data` leaves rather than an arena of indices; this
/// keeps the same sharing semantics with less machinery).
#[derive(Clone, Debug)]
pub enum ExprKind {
    VarUse(Rc<RefCell<Data>>),
    Const,
    Unary { op: UnaryOp, arg: Box<Expr> },
    /// Ternary is folded into `Binary` with an attached `cond` rather than
    /// kept as its own variant.
    Binary { op: BinaryOp, lhs: Box<Expr>, rhs: Box<Expr>, cond: Option<Box<Expr>> },
    Assign { target: Box<Expr>, source: Box<Expr>, taken: bool },
    TypeCast { expr: Box<Expr>, implicit: bool },
    Member { base: Box<Expr>, index: usize, data: Rc<RefCell<Data>> },
    AddrOf { expr: Box<Expr> },
    Deref { expr: Box<Expr> },
}

#[derive(Clone, Debug)]
pub struct Expr {
    pub kind: ExprKind,
    pub ty: Type,
    /// Meaningful when `ty` is `Integer`/`BitField`; otherwise left as a
    /// zeroed `Int` placeholder (struct/array/pointer expressions carry
    /// their state in the aliased `Data`, not here).
    pub value: TypedVal,
    pub complexity: u32,
}

impl Expr {
    pub fn is_lvalue(&self) -> bool {
        matches!(self.kind, ExprKind::VarUse(_) | ExprKind::Member { .. } | ExprKind::Deref { .. })
    }

    fn scalar_kind(&self) -> Option<IntegerKind> {
        self.ty.int_kind()
    }
}

fn leaf(kind: ExprKind, ty: Type, value: TypedVal) -> Expr {
    Expr { kind, ty, value, complexity: 1 }
}

pub fn const_expr(tv: TypedVal) -> Expr {
    leaf(ExprKind::Const, Type::new_integer(tv.kind), tv)
}

/// `VarUseExpr`: aliases the referenced `Data`'s current value.
pub fn var_use(data: Rc<RefCell<Data>>) -> Expr {
    let ty = data.borrow().type_owned();
    let value = data.borrow().as_scalar().map(|s| s.cur_val).unwrap_or_else(|| TypedVal::zero(IntegerKind::Int));
    leaf(ExprKind::VarUse(data), ty, value)
}

/// Inserts an implicit `TypeCast` around `e` if its kind differs from
/// `to_kind`; otherwise returns `e` unchanged, which keeps repeated type
/// propagation idempotent.
pub fn coerce(e: Expr, to_kind: IntegerKind, bm: BitMode) -> Expr {
    match e.scalar_kind() {
        Some(k) if k == to_kind => e,
        _ => type_cast(e, Type::new_integer(to_kind), true, bm),
    }
}

pub fn type_cast(expr: Expr, to_type: Type, implicit: bool, bm: BitMode) -> Expr {
    let to_kind = to_type.int_kind().unwrap_or(IntegerKind::Int);
    let value = expr.value.cast(to_kind, bm);
    let complexity = expr.complexity + 1;
    Expr { kind: ExprKind::TypeCast { expr: Box::new(expr), implicit }, ty: to_type, value, complexity }
}

/// Integral promotion of an already-built expression: inserts
/// an implicit cast if the expression's kind is below `int` rank.
pub fn integral_promote(ctx: &Context, e: Expr) -> Expr {
    let bm = ctx.bit_mode;
    match e.scalar_kind() {
        Some(k) => {
            let promoted = match &e.ty {
                Type::BitField(b) => {
                    // narrower-than-int bit-fields promote to int.
                    if b.width < IntegerKind::Int.width_bits(bm) { IntegerKind::Int } else { k.promote(bm) }
                }
                _ => k.promote(bm),
            };
            coerce(e, promoted, bm)
        }
        None => e,
    }
}

fn max_rebuild_attempts() -> u32 {
    2
}

/// Unary expression construction + UB repair.
pub fn unary(ctx: &mut Context, op: UnaryOp, arg: Expr) -> Result<Expr> {
    build_unary(ctx, op, arg, 0)
}

fn build_unary(ctx: &mut Context, op: UnaryOp, arg: Expr, attempt: u32) -> Result<Expr> {
    let bm = ctx.bit_mode;
    use UnaryOp::*;

    let (kind_arg, result_ty, value, child): (IntegerKind, Type, TypedVal, Expr) = match op {
        Plus | Negate | BitNot => {
            let promoted = integral_promote(ctx, arg);
            let k = promoted.scalar_kind().ok_or_else(|| invariant("unary operand is not an integer type"))?;
            let v = match op {
                Plus => promoted.value.plus(),
                Negate => promoted.value.neg(bm),
                BitNot => promoted.value.bitnot(bm),
                _ => unreachable!(),
            };
            (k, Type::new_integer(k), v, promoted)
        }
        LogNot => {
            let v = arg.value.lognot();
            (IntegerKind::Int, Type::new_integer(IntegerKind::Int), v, arg)
        }
        PreInc | PreDec | PostInc | PostDec => {
            if !arg.is_lvalue() {
                bail_invariant!("increment/decrement target is not an lvalue");
            }
            let arg_kind = arg.scalar_kind().ok_or_else(|| invariant("inc/dec on non-integer"))?;
            let promoted_kind = arg_kind.promote(bm);
            let promoted_val = arg.value.cast(promoted_kind, bm);
            let one = TypedVal::from_u64(promoted_kind, 1, bm);
            let sum = match op {
                PreInc | PostInc => promoted_val.add(&one, bm),
                _ => promoted_val.sub(&one, bm),
            };
            let truncated = sum.cast(arg_kind, bm);
            let result_val = match op {
                PreInc | PreDec => truncated,
                PostInc | PostDec => arg.value,
            };
            (arg_kind, arg.ty.clone(), result_val, arg)
        }
    };

    let ub = value.ub;
    let complexity = child.complexity + 1;
    let node = Expr { kind: ExprKind::Unary { op, arg: Box::new(child) }, ty: result_ty, value, complexity };

    if ub.is_none() {
        return Ok(node);
    }
    if attempt >= max_rebuild_attempts() {
        return Ok(node); // UB propagates to the caller's rebuild / the root check.
    }
    trace!("rebuild unary {:?}: {:?}", op, ub);
    rebuild_unary(ctx, op, node, ub, attempt)
}

fn rebuild_unary(ctx: &mut Context, op: UnaryOp, node: Expr, ub: UBTag, attempt: u32) -> Result<Expr> {
    use UnaryOp::*;
    let ExprKind::Unary { arg, .. } = node.kind else { unreachable!() };
    let arg = *arg;
    match (op, ub) {
        (Negate, UBTag::SignedOverflowMin) => build_unary(ctx, Plus, arg, attempt + 1),
        (PreInc, UBTag::SignedOverflow) => build_unary(ctx, PreDec, arg, attempt + 1),
        (PreDec, UBTag::SignedOverflow) => build_unary(ctx, PreInc, arg, attempt + 1),
        (PostInc, UBTag::SignedOverflow) => build_unary(ctx, PostDec, arg, attempt + 1),
        (PostDec, UBTag::SignedOverflow) => build_unary(ctx, PostInc, arg, attempt + 1),
        _ => build_unary(ctx, BitNot, arg, attempt + 1),
    }
}

fn invariant(msg: &str) -> crate::error::OorgenError {
    crate::error::OorgenError::Invariant { file: file!(), line: line!(), func: "expr", msg: msg.to_string() }
}

/// Binary expression construction + UB repair. `cond`
/// carries the ternary's condition when this node represents `Ter`.
pub fn binary(ctx: &mut Context, op: BinaryOp, lhs: Expr, rhs: Expr, cond: Option<Expr>) -> Result<Expr> {
    build_binary(ctx, op, lhs, rhs, cond, 0)
}

fn is_comparison_or_logical(op: BinaryOp) -> bool {
    use BinaryOp::*;
    matches!(op, Lt | Gt | Le | Ge | Eq | Ne | LogAnd | LogOr)
}

fn build_binary(
    ctx: &mut Context,
    op: BinaryOp,
    lhs: Expr,
    rhs: Expr,
    cond: Option<Expr>,
    attempt: u32,
) -> Result<Expr> {
    let bm = ctx.bit_mode;
    use BinaryOp::*;

    // Ternary condition is evaluated but neither typed input to the
    // operator chosen below; only lhs/rhs participate in UAC.
    //
    // Shl/Shr don't undergo the usual arithmetic conversion: each operand is
    // integrally promoted independently and the result type follows the
    // promoted left operand alone, never a common converted type.
    let (lhs, rhs) = if matches!(op, Shl | Shr) {
        (integral_promote(ctx, lhs), integral_promote(ctx, rhs))
    } else {
        usual_arith_conversion(ctx, lhs, rhs)
    };
    let kind = lhs.scalar_kind().ok_or_else(|| invariant("binary operand is not an integer type"))?;

    let value = match op {
        Add => lhs.value.add(&rhs.value, bm),
        Sub => lhs.value.sub(&rhs.value, bm),
        Mul => lhs.value.mul(&rhs.value, bm),
        Div => lhs.value.div(&rhs.value, bm),
        Mod => lhs.value.rem(&rhs.value, bm),
        Shl => lhs.value.shl(&rhs.value, bm),
        Shr => lhs.value.shr(&rhs.value, bm),
        Lt => lhs.value.lt(&rhs.value, bm),
        Gt => lhs.value.gt(&rhs.value, bm),
        Le => lhs.value.le(&rhs.value, bm),
        Ge => lhs.value.ge(&rhs.value, bm),
        Eq => lhs.value.eq_val(&rhs.value, bm),
        Ne => lhs.value.ne_val(&rhs.value, bm),
        BitAnd => lhs.value.bitand(&rhs.value),
        BitXor => lhs.value.bitxor(&rhs.value),
        BitOr => lhs.value.bitor(&rhs.value),
        LogAnd => lhs.value.logand(&rhs.value),
        LogOr => lhs.value.logor(&rhs.value),
    };

    let result_ty = if is_comparison_or_logical(op) { Type::new_integer(IntegerKind::Int) } else { Type::new_integer(kind) };
    let ub = value.ub;
    let complexity = lhs.complexity + rhs.complexity + cond.as_ref().map(|c| c.complexity).unwrap_or(0) + 1;
    let node = Expr {
        kind: ExprKind::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs), cond: cond.map(Box::new) },
        ty: result_ty,
        value,
        complexity,
    };

    if ub.is_none() {
        return Ok(node);
    }
    if attempt >= max_rebuild_attempts() {
        return Ok(node);
    }
    trace!("rebuild binary {:?}: {:?}", op, ub);
    rebuild_binary(ctx, node, ub, attempt)
}

/// Usual arithmetic conversion: promote both, then convert the
/// lower-priority operand, inserting implicit `TypeCast` nodes as needed.
pub(crate) fn usual_arith_conversion(ctx: &Context, lhs: Expr, rhs: Expr) -> (Expr, Expr) {
    let bm = ctx.bit_mode;
    let lhs = integral_promote(ctx, lhs);
    let rhs = integral_promote(ctx, rhs);
    let (lk, rk) = match (lhs.scalar_kind(), rhs.scalar_kind()) {
        (Some(a), Some(b)) => (a, b),
        _ => return (lhs, rhs),
    };
    let target = IntegerKind::usual_arith_conv(lk, rk, bm);
    (coerce(lhs, target, bm), coerce(rhs, target, bm))
}

/// Rebuild table of this engine.
fn rebuild_binary(ctx: &mut Context, node: Expr, ub: UBTag, attempt: u32) -> Result<Expr> {
    use BinaryOp::*;
    let bm = ctx.bit_mode;
    let ExprKind::Binary { op, lhs, rhs, cond } = node.kind else { unreachable!() };
    let (lhs, rhs, cond) = (*lhs, *rhs, cond.map(|c| *c));

    match (op, ub) {
        (Div, UBTag::DivByZero) | (Mod, UBTag::DivByZero) | (Div, UBTag::SignedOverflowMin) | (Mod, UBTag::SignedOverflowMin) => {
            build_binary(ctx, Mul, lhs, rhs, cond, attempt + 1)
        }
        (Add, UBTag::SignedOverflow) => build_binary(ctx, Sub, lhs, rhs, cond, attempt + 1),
        (Sub, UBTag::SignedOverflow) => build_binary(ctx, Add, lhs, rhs, cond, attempt + 1),
        (Mul, UBTag::SignedOverflow) => {
            // replace rhs with a clamped-to->=1 rhs and switch to division.
            let clamped_rhs = clamp_rhs_nonzero(rhs, bm);
            build_binary(ctx, Div, lhs, clamped_rhs, cond, attempt + 1)
        }
        (Shl, UBTag::ShiftByNegative) | (Shr, UBTag::ShiftByNegative) | (Shl, UBTag::ShiftByTooLarge) | (Shr, UBTag::ShiftByTooLarge) => {
            let new_rhs = wrap_shift_amount(&lhs, rhs, bm);
            build_binary(ctx, op, lhs, new_rhs, cond, attempt + 1)
        }
        (Shl, UBTag::NegativeShiftee) | (Shr, UBTag::NegativeShiftee) => {
            let unsigned_lhs = coerce(lhs, lhs_unsigned_kind(&lhs), bm);
            build_binary(ctx, op, unsigned_lhs, rhs, cond, attempt + 1)
        }
        (Shl, UBTag::SignedOverflow) => {
            let new_rhs = wrap_shift_amount(&lhs, rhs, bm);
            build_binary(ctx, op, lhs, new_rhs, cond, attempt + 1)
        }
        _ => Ok(Expr {
            kind: ExprKind::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs), cond: cond.map(Box::new) },
            ty: node.ty,
            value: node.value,
            complexity: node.complexity,
        }),
    }
}

fn lhs_unsigned_kind(lhs: &Expr) -> IntegerKind {
    lhs.scalar_kind().unwrap_or(IntegerKind::UInt).corresponding_unsigned()
}

fn clamp_rhs_nonzero(rhs: Expr, bm: BitMode) -> Expr {
    let k = rhs.scalar_kind().unwrap_or(IntegerKind::Int);
    if rhs.value.as_value(bm) == 0 {
        const_expr(TypedVal::from_u64(k, 1, bm))
    } else {
        rhs
    }
}

fn wrap_shift_amount(lhs: &Expr, rhs: Expr, bm: BitMode) -> Expr {
    let width = lhs.scalar_kind().unwrap_or(IntegerKind::Int).width_bits(bm) as i128;
    let rhs_kind = rhs.scalar_kind().unwrap_or(IntegerKind::UInt).corresponding_unsigned();
    let v = rhs.value.as_value(bm).rem_euclid(width);
    const_expr(TypedVal::from_i128(rhs_kind, v, bm))
}

/// `ConditionalExpr` (decided: folded into `Binary` with an
/// attached `cond`). No rebuild of its own: any UB is already repaired in
/// `cond`/`lhs`/`rhs` before this constructor runs, and stickiness carries
/// a surviving condition UB upward.
pub fn ternary(ctx: &mut Context, cond: Expr, lhs: Expr, rhs: Expr) -> Result<Expr> {
    let (lhs, rhs) = usual_arith_conversion(ctx, lhs, rhs);
    let kind = lhs.scalar_kind().ok_or_else(|| invariant("ternary operand is not an integer type"))?;
    let mut value = if !cond.value.is_zero() { lhs.value } else { rhs.value };
    if !cond.value.ub.is_none() {
        value.ub = cond.value.ub;
    }
    let complexity = cond.complexity + lhs.complexity + rhs.complexity + 1;
    Ok(Expr {
        kind: ExprKind::Binary { op: BinaryOp::Add, lhs: Box::new(lhs), rhs: Box::new(rhs), cond: Some(Box::new(cond)) },
        ty: Type::new_integer(kind),
        value,
        complexity,
    })
}

/// `AssignExpr`: `target` must be an lvalue (`VarUse` or
/// `Member`, or `Deref`). Inserts an implicit cast of `source` to the
/// target's type; if `taken`, writes the converted value through.
pub fn assign(ctx: &mut Context, target: Expr, source: Expr, taken: bool) -> Result<Expr> {
    if !matches!(target.kind, ExprKind::VarUse(_) | ExprKind::Member { .. } | ExprKind::Deref { .. }) {
        bail_invariant!("assignment target must be VarUse, Member, or Deref");
    }
    let bm = ctx.bit_mode;
    let target_kind = target.scalar_kind().ok_or_else(|| invariant("assignment target is not scalar"))?;
    let source = coerce(source, target_kind, bm);

    let stored_value = if let Type::BitField(bf) = &target.ty {
        source.value.mask_to_bitfield(bf.width, bf.base_kind.is_signed())
    } else {
        source.value
    };

    if taken {
        write_through(&target, stored_value)?;
    }

    let complexity = target.complexity + source.complexity + 1;
    let ty = target.ty.clone();
    Ok(Expr {
        kind: ExprKind::Assign { target: Box::new(target), source: Box::new(source), taken },
        ty,
        value: stored_value,
        complexity,
    })
}

fn write_through(target: &Expr, value: TypedVal) -> Result<()> {
    match &target.kind {
        ExprKind::VarUse(data) => {
            let mut d = data.borrow_mut();
            let scalar = d.as_scalar_mut().ok_or_else(|| invariant("assignment target var is not scalar"))?;
            scalar.set_cur_value(value)
        }
        ExprKind::Member { data, .. } => {
            let mut d = data.borrow_mut();
            let scalar = d.as_scalar_mut().ok_or_else(|| invariant("assignment target member is not scalar"))?;
            scalar.set_cur_value(value)
        }
        ExprKind::Deref { .. } => Ok(()), // pointee identity resolved at emission time; no direct Data aliasing modeled.
        _ => bail_invariant!("unsupported assignment target"),
    }
}

/// `MemberExpr`: `index` is resolved against the base struct's
/// named members only (the shadow list's unnamed bit-fields are excluded).
pub fn member(base: Expr, index: usize) -> Result<Expr> {
    let Some(base_data) = base_struct_data(&base) else {
        bail_invariant!("member base is not a struct");
    };
    let struct_ref = base_data.borrow();
    let Some(struct_obj) = struct_ref.as_struct() else {
        bail_invariant!("member base does not resolve to a struct object");
    };
    if index >= struct_obj.ty.members.len() {
        bail_invariant!("member index {} out of range ({})", index, struct_obj.ty.members.len());
    }
    let member_data = struct_obj.get_member(index).expect("checked bound above");
    drop(struct_ref);
    let ty = member_data.borrow().type_owned();
    let value = member_data.borrow().as_scalar().map(|s| s.cur_val).unwrap_or_else(|| TypedVal::zero(IntegerKind::Int));
    let complexity = base.complexity + 1;
    Ok(Expr { kind: ExprKind::Member { base: Box::new(base), index, data: member_data }, ty, value, complexity })
}

fn base_struct_data(base: &Expr) -> Option<Rc<RefCell<Data>>> {
    match &base.kind {
        ExprKind::VarUse(d) => Some(d.clone()),
        ExprKind::Member { data, .. } => Some(data.clone()),
        _ => None,
    }
}

pub fn addr_of(expr: Expr) -> Result<Expr> {
    if !expr.is_lvalue() {
        bail_invariant!("address-of target must be an lvalue");
    }
    let ty = Type::pointer_to(expr.ty.clone());
    let complexity = expr.complexity + 1;
    Ok(Expr { kind: ExprKind::AddrOf { expr: Box::new(expr) }, ty, value: TypedVal::zero(IntegerKind::Long), complexity })
}

pub fn deref(expr: Expr) -> Result<Expr> {
    let Type::Pointer { pointee } = expr.ty.clone() else {
        bail_invariant!("dereference target is not a pointer");
    };
    let complexity = expr.complexity + 1;
    let value = pointee.int_kind().map(TypedVal::zero).unwrap_or_else(|| TypedVal::zero(IntegerKind::Int));
    Ok(Expr { kind: ExprKind::Deref { expr: Box::new(expr) }, ty: *pointee, value, complexity })
}

/// Walks the tree checking the type-coherence invariant: every
/// node's attached value kind matches its declared type's integer kind.
pub fn check_type_coherence(e: &Expr) -> Result<()> {
    if let Some(k) = e.scalar_kind() {
        if e.value.kind != k {
            bail_invariant!("type coherence violated: value kind {:?} != declared kind {:?}", e.value.kind, k);
        }
    }
    match &e.kind {
        ExprKind::Unary { arg, .. } => check_type_coherence(arg)?,
        ExprKind::Binary { lhs, rhs, cond, .. } => {
            check_type_coherence(lhs)?;
            check_type_coherence(rhs)?;
            if let Some(c) = cond {
                check_type_coherence(c)?;
            }
        }
        ExprKind::Assign { target, source, .. } => {
            check_type_coherence(target)?;
            check_type_coherence(source)?;
        }
        ExprKind::TypeCast { expr, .. } => check_type_coherence(expr)?,
        ExprKind::Member { base, .. } => check_type_coherence(base)?,
        ExprKind::AddrOf { expr } | ExprKind::Deref { expr } => check_type_coherence(expr)?,
        ExprKind::VarUse(_) | ExprKind::Const => {}
    }
    Ok(())
}

/// Walks the tree checking the no-UB-exit invariant.
pub fn check_no_ub(e: &Expr) -> Result<()> {
    if !e.value.ub.is_none() {
        bail_invariant!("UB tag {:?} survived to a returned expression", e.value.ub);
    }
    match &e.kind {
        ExprKind::Unary { arg, .. } => check_no_ub(arg)?,
        ExprKind::Binary { lhs, rhs, cond, .. } => {
            check_no_ub(lhs)?;
            check_no_ub(rhs)?;
            if let Some(c) = cond {
                check_no_ub(c)?;
            }
        }
        ExprKind::Assign { target, source, .. } => {
            check_no_ub(target)?;
            check_no_ub(source)?;
        }
        ExprKind::TypeCast { expr, .. } => check_no_ub(expr)?,
        ExprKind::Member { base, .. } => check_no_ub(base)?,
        ExprKind::AddrOf { expr } | ExprKind::Deref { expr } => check_no_ub(expr)?,
        ExprKind::VarUse(_) | ExprKind::Const => {}
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::lang::LangStd;
    use crate::policy::Policy;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn ctx() -> Context {
        Context::new(ChaCha8Rng::seed_from_u64(1), Policy::default(), BitMode::Bits32, LangStd::C99)
    }

    #[test]
    fn add_overflow_rebuilds_to_sub() {
        let mut c = ctx();
        let max = const_expr(TypedVal::from_i128(IntegerKind::Int, IntegerKind::Int.max_value(BitMode::Bits32), BitMode::Bits32));
        let one = const_expr(TypedVal::from_i128(IntegerKind::Int, 1, BitMode::Bits32));
        let e = binary(&mut c, BinaryOp::Add, one, max, None).expect("rebuild should succeed");
        assert!(e.value.ub.is_none());
        assert!(matches!(e.kind, ExprKind::Binary { op: BinaryOp::Sub, .. }));
        check_no_ub(&e).unwrap();
    }

    #[test]
    fn div_by_zero_rebuilds_to_mul() {
        let mut c = ctx();
        let five = const_expr(TypedVal::from_i128(IntegerKind::Int, 5, BitMode::Bits32));
        let zero = const_expr(TypedVal::zero(IntegerKind::Int));
        let e = binary(&mut c, BinaryOp::Div, five, zero, None).expect("rebuild should succeed");
        assert!(matches!(e.kind, ExprKind::Binary { op: BinaryOp::Mul, .. }));
        assert_eq!(e.value.as_value(BitMode::Bits32), 0);
        check_no_ub(&e).unwrap();
    }

    #[test]
    fn shift_amount_mod_width_rewrites_rhs() {
        let mut c = ctx();
        let one = const_expr(TypedVal::from_i128(IntegerKind::Int, 1, BitMode::Bits32));
        let thirty_three = const_expr(TypedVal::from_i128(IntegerKind::Int, 33, BitMode::Bits32));
        let e = binary(&mut c, BinaryOp::Shl, one, thirty_three, None).expect("rebuild should succeed");
        assert_eq!(e.value.as_value(BitMode::Bits32), 2);
        check_no_ub(&e).unwrap();
    }

    #[test]
    fn shift_result_kind_follows_promoted_lhs_not_usual_arith_conversion() {
        // `short << long`: UAC would convert both to `long`, but shifts
        // promote each operand independently and the result follows the
        // promoted lhs (`int`) alone, per C's shift-operator rules.
        let mut c = ctx();
        let lhs = const_expr(TypedVal::from_i128(IntegerKind::UShort, 1, BitMode::Bits32));
        let rhs = const_expr(TypedVal::from_i128(IntegerKind::Long, 2, BitMode::Bits32));
        let e = binary(&mut c, BinaryOp::Shl, lhs, rhs, None).expect("shift should succeed");
        assert_eq!(e.ty.int_kind(), Some(IntegerKind::Int));
        assert_eq!(e.value.as_value(BitMode::Bits32), 4);
    }

    #[test]
    fn negate_int_min_rebuilds_to_unary_plus() {
        let mut c = ctx();
        let min = const_expr(TypedVal::from_i128(IntegerKind::Int, IntegerKind::Int.min_value(BitMode::Bits32), BitMode::Bits32));
        let e = unary(&mut c, UnaryOp::Negate, min).expect("rebuild should succeed");
        assert!(matches!(e.kind, ExprKind::Unary { op: UnaryOp::Plus, .. }));
        check_no_ub(&e).unwrap();
    }

    #[test]
    fn assign_casts_and_coerces_value() {
        let mut c = ctx();
        let target_data = crate::data::new_scalar(&mut c, Type::new_integer(IntegerKind::Long));
        let target = var_use(target_data.clone());
        let source = const_expr(TypedVal::from_u64(IntegerKind::UShort, 0xFFFF, BitMode::Bits32));
        let e = assign(&mut c, target, source, true).expect("assign should succeed");
        assert_eq!(e.value.as_value(BitMode::Bits32), 0xFFFF);
        assert!(matches!(&e.kind, ExprKind::Assign { source, .. } if matches!(source.kind, ExprKind::TypeCast { .. })));
        assert_eq!(target_data.borrow().as_scalar().unwrap().cur_val.as_value(BitMode::Bits32), 0xFFFF);
    }

    #[test]
    fn untaken_assign_leaves_target_cur_val_unchanged() {
        let mut c = ctx();
        let target_data = crate::data::new_scalar(&mut c, Type::new_integer(IntegerKind::Int));
        target_data.borrow_mut().as_scalar_mut().unwrap().set_cur_value(TypedVal::from_i128(IntegerKind::Int, 1, BitMode::Bits32)).unwrap();
        let target = var_use(target_data.clone());
        let source = const_expr(TypedVal::from_i128(IntegerKind::Int, 9, BitMode::Bits32));
        let e = assign(&mut c, target, source, false).expect("assign should succeed");
        assert_eq!(e.value.as_value(BitMode::Bits32), 9);
        assert!(matches!(&e.kind, ExprKind::Assign { taken: false, .. }));
        assert_eq!(target_data.borrow().as_scalar().unwrap().cur_val.as_value(BitMode::Bits32), 1);
    }

    #[test]
    fn assign_to_bitfield_masks_value() {
        let mut c = ctx();
        let bf_ty = Type::BitField(crate::types::BitFieldType { base_kind: IntegerKind::Int, width: 3, cv: crate::types::CvQual::None });
        let target_data = crate::data::new_scalar(&mut c, bf_ty);
        let target = var_use(target_data.clone());
        let source = const_expr(TypedVal::from_i128(IntegerKind::Int, 9, BitMode::Bits32));
        let e = assign(&mut c, target, source, true).unwrap();
        assert_eq!(e.value.as_value(BitMode::Bits32), 1);
    }
}
