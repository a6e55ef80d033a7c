//! expression generator.

use std::cell::RefCell;
use std::rc::Rc;

use rand::Rng;

use crate::context::{Context, VarCategory};
use crate::data::Data;
use crate::error::Result;
use crate::expr::{self, BinaryOp, Expr, UnaryOp};
use crate::policy::{Policy, SspKind};
use crate::typed_val::TypedVal;

/// Refills `arith_const_buf`/`bit_log_const_buf`. Called
/// before each new statement so that constants within that statement are
/// drawn from (and reused from) the same small pool.
pub fn fill_const_buf(ctx: &mut Context) {
    let policy = ctx.policy().clone();
    let bm = ctx.bit_mode;
    let arith: Vec<TypedVal> = (0..policy.arith_const_buf_size)
        .map(|_| {
            let kind = ctx.pick_weighted(&policy.allowed_int_kinds);
            let lo = kind.min_value(bm);
            let hi = kind.max_value(bm);
            TypedVal::from_i128(kind, ctx.rng_mut().gen_range(lo..=hi), bm)
        })
        .collect();
    ctx.set_arith_const_buf(arith);

    let bit_log: Vec<TypedVal> = (0..policy.bit_logical_const_buf_size)
        .map(|_| {
            let kind = ctx.pick_weighted(&policy.allowed_int_kinds);
            let v: u64 = ctx.rng_mut().gen();
            TypedVal::from_u64(kind, v, bm)
        })
        .collect();
    ctx.set_bit_logical_const_buf(bit_log);
}

/// Finds a scalar-valued expression reachable from `data`: direct for a
/// `Scalar`, a (possibly nested) `Member` chain for a `StructObj`.
fn scalar_leaf_from(ctx: &mut Context, data: &Rc<RefCell<Data>>) -> Option<Expr> {
    let is_struct = data.borrow().as_struct().is_some();
    if !is_struct {
        return Some(expr::var_use(data.clone()));
    }
    let member_count = data.borrow().as_struct().unwrap().ty.members.len();
    if member_count == 0 {
        return None;
    }
    // Walk down a random chain of members until a scalar is reached, or give up.
    let mut base = expr::var_use(data.clone());
    for _ in 0..4 {
        let struct_data = match &base.kind {
            crate::expr::ExprKind::VarUse(d) => d.clone(),
            crate::expr::ExprKind::Member { data, .. } => data.clone(),
            _ => return None,
        };
        let struct_ref = struct_data.borrow();
        let Some(s) = struct_ref.as_struct() else { return Some(base) };
        let count = s.ty.members.len();
        if count == 0 {
            return None;
        }
        let idx = ctx.rng_mut().gen_range(0..count);
        drop(struct_ref);
        base = expr::member(base, idx).ok()?;
        if base.ty.int_kind().is_some() {
            return Some(base);
        }
    }
    None
}

fn generate_leaf(ctx: &mut Context, inputs: &[Rc<RefCell<Data>>]) -> Expr {
    let bm = ctx.bit_mode;
    let have_inputs = !inputs.is_empty();
    let use_var = have_inputs && ctx.rng_mut().gen_bool(0.6);
    if use_var {
        let idx = ctx.rng_mut().gen_range(0..inputs.len());
        if let Some(e) = scalar_leaf_from(ctx, &inputs[idx]) {
            return e;
        }
    }
    let buf = ctx.arith_const_buf();
    if !buf.is_empty() && ctx.rng_mut().gen_bool(0.7) {
        let idx = ctx.rng_mut().gen_range(0..buf.len());
        return expr::const_expr(buf[idx]);
    }
    let kind = ctx.pick_weighted(&ctx.policy().allowed_int_kinds.clone());
    let lo = kind.min_value(bm);
    let hi = kind.max_value(bm);
    let v = ctx.rng_mut().gen_range(lo..=hi);
    expr::const_expr(TypedVal::from_i128(kind, v, bm))
}

/// Nudges the leaf draw towards the constant buffer by shrinking the
/// weight of every other integer kind relative to the most common one,
/// matching the "constant-heavy" flavor described in the glossary.
fn choose_and_apply_ssp_const_use(ctx: &mut Context) -> Policy {
    let mut p = ctx.policy().clone();
    let factor = p.ssp_const_use_factor;
    p.arith_const_buf_size = p.arith_const_buf_size.saturating_add(factor);
    p
}

/// Raises the weight of `parent_op` among the binary operator table, the
/// "same operator as parent" flavor of self-similar pattern.
fn choose_and_apply_ssp_similar_op(ctx: &mut Context, parent_op: BinaryOp) -> Policy {
    let mut p = ctx.policy().clone();
    p.allowed_binary_ops.bias(|op| *op == parent_op, p.ssp_similar_op_factor);
    p
}

/// Top-level recursive function for expression tree generation.
pub fn generate_expr(ctx: &mut Context, inputs: &[Rc<RefCell<Data>>], depth: u32) -> Result<Expr> {
    ctx.count_expr();
    let force_leaf = depth >= ctx.policy().max_expr_depth || ctx.expr_budget_exhausted();
    if force_leaf || ctx.rng_mut().gen_bool(0.3) {
        return Ok(generate_leaf(ctx, inputs));
    }

    let choice = ctx.rng_mut().gen_range(0..100);
    if choice < 25 {
        generate_unary(ctx, inputs, depth)
    } else if choice < 90 {
        generate_binary(ctx, inputs, depth)
    } else {
        generate_ternary(ctx, inputs, depth)
    }
}

fn generate_unary(ctx: &mut Context, inputs: &[Rc<RefCell<Data>>], depth: u32) -> Result<Expr> {
    let op: UnaryOp = ctx.pick_weighted(&ctx.policy().allowed_unary_ops.clone());
    let arg = generate_expr(ctx, inputs, depth + 1)?;
    expr::unary(ctx, op, arg)
}

fn generate_binary(ctx: &mut Context, inputs: &[Rc<RefCell<Data>>], depth: u32) -> Result<Expr> {
    let op: BinaryOp = ctx.pick_weighted(&ctx.policy().allowed_binary_ops.clone());

    let use_ssp = ctx.rng_mut().gen_bool(ctx.policy().ssp_weight as f64 / 100.0);
    let pushed = if use_ssp {
        let kind = if ctx.rng_mut().gen_bool(0.5) { SspKind::ConstUse } else { SspKind::SimilarOp };
        let biased = match kind {
            SspKind::ConstUse => choose_and_apply_ssp_const_use(ctx),
            SspKind::SimilarOp => choose_and_apply_ssp_similar_op(ctx, op),
        };
        ctx.push_policy(biased);
        true
    } else {
        false
    };

    let lhs = generate_expr(ctx, inputs, depth + 1);
    let rhs = generate_expr(ctx, inputs, depth + 1);

    if pushed {
        ctx.pop_policy();
    }

    expr::binary(ctx, op, lhs?, rhs?, None)
}

fn generate_ternary(ctx: &mut Context, inputs: &[Rc<RefCell<Data>>], depth: u32) -> Result<Expr> {
    let cond = generate_expr(ctx, inputs, depth + 1)?;
    let lhs = generate_expr(ctx, inputs, depth + 1)?;
    let rhs = generate_expr(ctx, inputs, depth + 1)?;
    expr::ternary(ctx, cond, lhs, rhs)
}

/// Generates an expression guaranteed to be a valid assignment target
/// (`VarUse`/`Member`), biased towards `mixed`/`output`/`local` variables.
pub fn generate_lvalue(ctx: &mut Context) -> Option<Expr> {
    let candidates = ctx.vars_in(&[VarCategory::Mixed, VarCategory::Output, VarCategory::Local]);
    if candidates.is_empty() {
        return None;
    }
    let idx = ctx.rng_mut().gen_range(0..candidates.len());
    scalar_leaf_from(ctx, &candidates[idx])
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::lang::LangStd;
    use crate::policy::Policy;
    use crate::typed_val::BitMode;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn ctx() -> Context {
        Context::new(ChaCha8Rng::seed_from_u64(9), Policy::default(), BitMode::Bits64, LangStd::C99)
    }

    #[test]
    fn fill_const_buf_draws_the_policy_configured_count() {
        let mut c = ctx();
        fill_const_buf(&mut c);
        assert_eq!(c.arith_const_buf().len(), c.policy().arith_const_buf_size as usize);
        assert_eq!(c.bit_logical_const_buf().len(), c.policy().bit_logical_const_buf_size as usize);
    }

    #[test]
    fn generate_expr_at_max_depth_returns_a_leaf() {
        let mut c = ctx();
        let max_depth = c.policy().max_expr_depth;
        let e = generate_expr(&mut c, &[], max_depth).unwrap();
        assert!(matches!(e.kind, crate::expr::ExprKind::Const | crate::expr::ExprKind::VarUse(_)));
    }

    #[test]
    fn generate_expr_stops_once_the_per_function_budget_is_exhausted() {
        let mut c = ctx();
        let budget = c.policy().total_expr_budget_per_function;
        for _ in 0..budget {
            c.count_expr();
        }
        let e = generate_expr(&mut c, &[], 0).unwrap();
        assert!(matches!(e.kind, crate::expr::ExprKind::Const | crate::expr::ExprKind::VarUse(_)));
    }

    #[test]
    fn generate_lvalue_is_none_with_no_candidate_vars_in_scope() {
        let mut c = ctx();
        assert!(generate_lvalue(&mut c).is_none());
    }

    #[test]
    fn generate_lvalue_finds_a_declared_local() {
        let mut c = ctx();
        let data = crate::data::new_scalar(&mut c, crate::types::Type::new_integer(crate::typed_val::IntegerKind::Int));
        let name = data.borrow().name().to_string();
        c.declare_var(name, data, VarCategory::Local);
        let lv = generate_lvalue(&mut c);
        assert!(lv.is_some());
        assert!(lv.unwrap().is_lvalue());
    }
}
