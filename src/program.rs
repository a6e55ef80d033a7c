//! Program assembly: the top-level driver tying the generator together.

use std::cell::RefCell;
use std::rc::Rc;

use rand::Rng;

use crate::context::{Context, VarCategory};
use crate::data::{self, Data};
use crate::error::Result;
use crate::expr_gen::fill_const_buf;
use crate::policy::MemberClass;
use crate::stmt::Stmt;
use crate::stmt_gen::generate_scope;
use crate::types::{self, StructType};

pub struct Function {
    pub name: String,
    pub body: Vec<Stmt>,
}

pub struct Program {
    pub struct_types: Vec<StructType>,
    pub input_vars: Vec<Rc<RefCell<Data>>>,
    pub mixed_vars: Vec<Rc<RefCell<Data>>>,
    pub output_vars: Vec<Rc<RefCell<Data>>>,
    pub functions: Vec<Function>,
}

fn generate_top_level_var(ctx: &mut Context) -> Rc<RefCell<Data>> {
    let class = ctx.pick_weighted(&ctx.policy().member_class_prob.clone());
    let pool = ctx.struct_type_pool().to_vec();
    if class == MemberClass::Struct && !pool.is_empty() {
        let idx = ctx.rng_mut().gen_range(0..pool.len());
        return data::new_struct(ctx, &pool[idx]);
    }
    let ty = types::generate_integer_type(ctx);
    data::new_scalar(ctx, ty)
}

fn generate_var_bucket(ctx: &mut Context, count: u32, category: VarCategory) -> Vec<Rc<RefCell<Data>>> {
    let mut vars = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let data = generate_top_level_var(ctx);
        let name = data.borrow().name().to_string();
        ctx.declare_var(name, data.clone(), category);
        vars.push(data);
    }
    vars
}

fn generate_struct_type_pool(ctx: &mut Context) {
    let count = ctx.policy().num_struct_types;
    let bm = ctx.bit_mode;
    for _ in 0..count {
        let nested = ctx.struct_type_pool().to_vec();
        let ty = types::generate_struct_type(ctx, bm, &nested);
        if let Some(s) = ty.as_struct() {
            ctx.declare_struct_type(s.clone());
        }
    }
}

fn generate_function(ctx: &mut Context, index: u32) -> Result<Function> {
    ctx.reset_func_counters();
    fill_const_buf(ctx);
    let body = generate_scope(ctx, true)?;
    Ok(Function { name: format!("func_{}", index), body })
}

/// Root generation entry point: materializes struct types, the
/// three extern symbol tables, then generates functions until the policy's
/// function budget is exhausted.
pub fn generate_program(ctx: &mut Context) -> Result<Program> {
    generate_struct_type_pool(ctx);

    let (n_input, n_mixed, n_output) = (ctx.policy().num_input_vars, ctx.policy().num_mixed_vars, ctx.policy().num_output_vars);
    let input_vars = generate_var_bucket(ctx, n_input, VarCategory::Input);
    let mixed_vars = generate_var_bucket(ctx, n_mixed, VarCategory::Mixed);
    let output_vars = generate_var_bucket(ctx, n_output, VarCategory::Output);

    let num_functions = ctx.policy().num_functions;
    let mut functions = Vec::with_capacity(num_functions as usize);
    for i in 0..num_functions {
        functions.push(generate_function(ctx, i)?);
    }

    Ok(Program { struct_types: ctx.struct_type_pool().to_vec(), input_vars, mixed_vars, output_vars, functions })
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
        Context::new(ChaCha8Rng::seed_from_u64(5), Policy::default(), BitMode::Bits64, LangStd::C99)
    }

    #[test]
    fn generate_program_honors_the_policy_variable_and_function_counts() {
        let mut c = ctx();
        let program = generate_program(&mut c).unwrap();
        assert_eq!(program.input_vars.len(), c.policy().num_input_vars as usize);
        assert_eq!(program.mixed_vars.len(), c.policy().num_mixed_vars as usize);
        assert_eq!(program.output_vars.len(), c.policy().num_output_vars as usize);
        assert_eq!(program.functions.len(), c.policy().num_functions as usize);
    }

    #[test]
    fn generate_program_is_deterministic_for_a_fixed_seed() {
        let mut c1 = Context::new(ChaCha8Rng::seed_from_u64(99), Policy::default(), BitMode::Bits64, LangStd::C99);
        let mut c2 = Context::new(ChaCha8Rng::seed_from_u64(99), Policy::default(), BitMode::Bits64, LangStd::C99);
        crate::types::reset_struct_type_ids();
        crate::data::reset_static_member_registry();
        let p1 = generate_program(&mut c1).unwrap();
        crate::types::reset_struct_type_ids();
        crate::data::reset_static_member_registry();
        let p2 = generate_program(&mut c2).unwrap();
        let d1 = crate::emit::emit_declarations(&p1, BitMode::Bits64);
        let d2 = crate::emit::emit_declarations(&p2, BitMode::Bits64);
        assert_eq!(d1, d2);
        let f1 = crate::emit::emit_functions(&p1, BitMode::Bits64);
        let f2 = crate::emit::emit_functions(&p2, BitMode::Bits64);
        assert_eq!(f1, f2);
        assert_eq!(crate::emit::predetermined_checksum(&p1), crate::emit::predetermined_checksum(&p2));
    }

    #[test]
    fn generate_struct_type_pool_grows_the_context_struct_type_pool() {
        let mut c = ctx();
        generate_struct_type_pool(&mut c);
        assert_eq!(c.struct_type_pool().len(), c.policy().num_struct_types as usize);
    }
}
