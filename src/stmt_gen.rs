//! statement generator.

use rand::Rng;

use crate::context::{Context, VarCategory};
use crate::data;
use crate::error::Result;
use crate::expr_gen::{fill_const_buf, generate_expr, generate_lvalue};
use crate::policy::StmtKind;
use crate::stmt::Stmt;
use crate::types;

/// Generates a scope body: a random-length run of statements, pushing and
/// popping a fresh symbol-table frame around it ("Scope"). `taken` tracks
/// whether this scope actually executes along the path chosen at
/// generation time; `false` propagates down so assignments nested inside
/// an untaken `if`-branch never update their target's `cur_val` even
/// through further nested scopes.
pub fn generate_scope(ctx: &mut Context, taken: bool) -> Result<Vec<Stmt>> {
    ctx.push_scope();
    let result = generate_scope_body(ctx, taken);
    ctx.pop_scope();
    result
}

fn generate_scope_body(ctx: &mut Context, taken: bool) -> Result<Vec<Stmt>> {
    let policy = ctx.policy().clone();
    let count = ctx.rng_mut().gen_range(policy.min_scope_stmts..=policy.max_scope_stmts.max(policy.min_scope_stmts));
    let mut stmts = Vec::with_capacity(count as usize);
    for _ in 0..count {
        if ctx.expr_budget_exhausted() {
            break;
        }
        stmts.push(generate_stmt(ctx, taken)?);
    }
    Ok(stmts)
}

/// Draws one statement kind and builds it, refilling the constant buffers
/// first so every expression within this statement shares one pool.
pub fn generate_stmt(ctx: &mut Context, taken: bool) -> Result<Stmt> {
    fill_const_buf(ctx);
    ctx.count_stmt();

    let mut kind = ctx.pick_weighted(&ctx.policy().allowed_stmt_kinds.clone());
    if ctx.scope_depth >= ctx.policy().max_scope_depth && kind == StmtKind::Scope {
        kind = StmtKind::ExprStmt;
    }
    if ctx.if_depth >= ctx.policy().max_if_depth && kind == StmtKind::If {
        kind = StmtKind::ExprStmt;
    }

    match kind {
        StmtKind::Decl => generate_decl_stmt(ctx),
        StmtKind::ExprStmt => generate_expr_stmt(ctx, taken),
        StmtKind::If => generate_if_stmt(ctx, taken),
        StmtKind::Scope => Ok(Stmt::Scope(generate_scope(ctx, taken)?)),
    }
}

/// Declares a fresh local scalar, optionally with an initializer expression
/// drawn over the variables currently in scope ("Decl").
fn generate_decl_stmt(ctx: &mut Context) -> Result<Stmt> {
    let ty = types::generate_integer_type(ctx);
    let data = data::new_scalar(ctx, ty.clone());
    let name = data.borrow().name().to_string();

    let inputs = ctx.vars_in(&[VarCategory::Input, VarCategory::Mixed, VarCategory::Output, VarCategory::Local]);
    let init = if ctx.rng_mut().gen_bool(0.7) {
        Some(generate_expr(ctx, &inputs, 0)?)
    } else {
        None
    };

    if let (Some(e), Some(k)) = (&init, ty.int_kind()) {
        if let Some(scalar) = data.borrow_mut().as_scalar_mut() {
            let coerced = crate::expr::coerce(e.clone(), k, ctx.bit_mode);
            scalar.set_init_value(coerced.value);
        }
    }

    ctx.declare_var(name, data.clone(), VarCategory::Local);
    Ok(Stmt::Decl { data, init, is_extern: false })
}

/// An assignment expression statement, or a bare expression if no lvalue
/// candidate is in scope ("ExprStmt"). `taken` is `false` anywhere inside
/// an untaken `if`-branch, in which case the assignment is still emitted
/// but its evaluated value never reaches the target's `cur_val`.
fn generate_expr_stmt(ctx: &mut Context, taken: bool) -> Result<Stmt> {
    let inputs = ctx.vars_in(&[VarCategory::Input, VarCategory::Mixed, VarCategory::Output, VarCategory::Local]);
    if let Some(target) = generate_lvalue(ctx) {
        let source = generate_expr(ctx, &inputs, 0)?;
        let e = crate::expr::assign(ctx, target, source, taken)?;
        crate::expr::check_type_coherence(&e)?;
        crate::expr::check_no_ub(&e)?;
        return Ok(Stmt::ExprStmt(e));
    }
    let e = generate_expr(ctx, &inputs, 0)?;
    crate::expr::check_type_coherence(&e)?;
    crate::expr::check_no_ub(&e)?;
    Ok(Stmt::ExprStmt(e))
}

/// `If`, with independently generated then/else branches. The condition's
/// value is already known at generation time, so the branch that would
/// not execute is marked untaken: its assignments are still emitted but
/// must not update `cur_val` (this propagates through further nested
/// scopes/ifs via `taken`).
fn generate_if_stmt(ctx: &mut Context, taken: bool) -> Result<Stmt> {
    let inputs = ctx.vars_in(&[VarCategory::Input, VarCategory::Mixed, VarCategory::Output, VarCategory::Local]);
    let cond = generate_expr(ctx, &inputs, 0)?;
    let cond_true = !cond.value.is_zero();

    ctx.if_depth += 1;
    let then_scope = generate_scope(ctx, taken && cond_true)?;
    let else_scope = if ctx.rng_mut().gen_bool(0.5) { Some(generate_scope(ctx, taken && !cond_true)?) } else { None };
    ctx.if_depth = ctx.if_depth.saturating_sub(1);

    Ok(Stmt::If { cond, then_scope, else_scope })
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
        Context::new(ChaCha8Rng::seed_from_u64(11), Policy::default(), BitMode::Bits64, LangStd::C99)
    }

    #[test]
    fn generate_scope_restores_the_enclosing_scope_depth() {
        let mut c = ctx();
        let before = c.scope_depth;
        generate_scope(&mut c, true).unwrap();
        assert_eq!(c.scope_depth, before);
    }

    #[test]
    fn generate_stmt_demotes_scope_past_the_max_scope_depth() {
        let mut c = ctx();
        let max = c.policy().max_scope_depth;
        for _ in 0..max {
            c.push_scope();
        }
        // scope_depth is now at the cap; any Scope draw must demote to ExprStmt.
        for _ in 0..20 {
            let stmt = generate_stmt(&mut c, true).unwrap();
            assert!(!matches!(stmt, Stmt::Scope(_)));
        }
    }

    #[test]
    fn generate_stmt_demotes_if_past_the_max_if_depth() {
        let mut c = ctx();
        c.if_depth = c.policy().max_if_depth;
        for _ in 0..20 {
            let stmt = generate_stmt(&mut c, true).unwrap();
            assert!(!matches!(stmt, Stmt::If { .. }));
        }
    }

    #[test]
    fn generate_decl_stmt_declares_a_lookup_visible_local() {
        let mut c = ctx();
        let stmt = generate_decl_stmt(&mut c).unwrap();
        let Stmt::Decl { data, .. } = &stmt else { panic!("expected Decl") };
        let name = data.borrow().name().to_string();
        assert!(c.lookup_var(&name).is_some());
    }
}
