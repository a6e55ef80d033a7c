//! `oorgen`: a deterministic random generator of valid C/C++/OpenCL test
//! programs for compiler stress testing.

pub mod cli;
pub mod context;
pub mod data;
pub mod emit;
pub mod error;
pub mod expr;
pub mod expr_gen;
pub mod lang;
pub mod policy;
pub mod program;
pub mod stmt;
pub mod stmt_gen;
pub mod typed_val;
pub mod types;

pub use error::{OorgenError, Result};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::context::Context;
use crate::policy::Policy;
use crate::typed_val::BitMode;

/// Resets every piece of process-wide state a run depends on (/// "must be reset at the start of each generation run"): struct type ids
/// and static member aliases. Per-category name counters live inside the
/// fresh [`Context`] and need no separate reset.
pub fn reset_global_state() {
    types::reset_struct_type_ids();
    data::reset_static_member_registry();
}

/// Runs one full generation: resets global state, builds a seeded
/// [`Context`], and drives [`program::generate_program`] to completion.
pub fn generate(seed: u64, bit_mode: BitMode, std: lang::LangStd) -> Result<program::Program> {
    reset_global_state();
    let rng = ChaCha8Rng::seed_from_u64(seed);
    let mut ctx = Context::new(rng, Policy::default(), bit_mode, std);
    program::generate_program(&mut ctx)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::lang::LangStd;

    #[test]
    fn reset_global_state_restarts_struct_type_ids_from_one() {
        let mut ctx = Context::new(ChaCha8Rng::seed_from_u64(1), Policy::default(), BitMode::Bits64, LangStd::C99);
        let ty = types::generate_struct_type(&mut ctx, BitMode::Bits64, &[]);
        let first_id = ty.as_struct().unwrap().id;

        reset_global_state();
        let mut ctx2 = Context::new(ChaCha8Rng::seed_from_u64(1), Policy::default(), BitMode::Bits64, LangStd::C99);
        let ty2 = types::generate_struct_type(&mut ctx2, BitMode::Bits64, &[]);
        assert_eq!(ty2.as_struct().unwrap().id, first_id);
    }

    #[test]
    fn generate_produces_a_program_with_the_requested_function_count() {
        let program = generate(42, BitMode::Bits64, LangStd::C99).unwrap();
        assert_eq!(program.functions.len(), Policy::default().num_functions as usize);
    }
}
