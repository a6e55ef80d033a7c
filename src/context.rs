//! symbol table & context.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::data::Data;
use crate::lang::LangStd;
use crate::policy::{Policy, WeightedSet};
use crate::typed_val::{BitMode, TypedVal};
use crate::types::StructType;

/// The four checksum-relevant variable categories used later by emission:
/// `input` read-only after init, `mixed` read-write, `output` written at
/// most once, `local` scope-private.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VarCategory {
    Input,
    Mixed,
    Output,
    Local,
}

#[derive(Default)]
struct SymbolTable {
    // Insertion-ordered: `vars_in` feeds candidate selection for lvalue/leaf
    // draws, so its iteration order must be reproducible across runs for the
    // same seed. A `HashMap` here would make generation non-deterministic.
    vars: Vec<(String, Rc<RefCell<Data>>, VarCategory)>,
    types: HashMap<String, StructType>,
}

/// Monotonic per-category name counter, reset at the start of each
/// generation run.
#[derive(Default)]
pub struct NameHandler {
    scalar_var: u64,
    struct_var: u64,
    array_var: u64,
    struct_type: u64,
}

impl NameHandler {
    pub fn reset(&mut self) {
        *self = NameHandler::default();
    }

    pub fn next_scalar_var_name(&mut self) -> String {
        self.scalar_var += 1;
        format!("var_{}", self.scalar_var)
    }

    pub fn next_struct_var_name(&mut self) -> String {
        self.struct_var += 1;
        format!("struct_var_{}", self.struct_var)
    }

    pub fn next_array_var_name(&mut self) -> String {
        self.array_var += 1;
        format!("array_{}", self.array_var)
    }

    pub fn next_struct_type_name(&mut self) -> String {
        self.struct_type += 1;
        format!("Struct_{}", self.struct_type)
    }
}

/// Per-scope generation state. A single `Context` value models the whole
/// stack of this engine's linked frames: `scopes` is the chain from outermost
/// (index 0) to innermost (last); reads search from the back, writes always
/// land in the last entry, matching "inherits by reference the parent's
/// symbol table view for reads, but writes land only in the child's local
/// table."
pub struct Context {
    rng: ChaCha8Rng,
    name_handler: NameHandler,
    policy_stack: Vec<Policy>,
    scopes: Vec<SymbolTable>,
    pub scope_depth: u32,
    pub if_depth: u32,
    pub bit_mode: BitMode,
    pub std: LangStd,
    total_expr_count: u64,
    total_stmt_count: u64,
    func_expr_count: u32,
    func_stmt_count: u32,
    arith_const_buf: Vec<TypedVal>,
    bit_logical_const_buf: Vec<TypedVal>,
    struct_type_pool: Vec<StructType>,
}

impl Context {
    pub fn new(rng: ChaCha8Rng, policy: Policy, bit_mode: BitMode, std: LangStd) -> Self {
        Context {
            rng,
            name_handler: NameHandler::default(),
            policy_stack: vec![policy],
            scopes: vec![SymbolTable::default()],
            scope_depth: 0,
            if_depth: 0,
            bit_mode,
            std,
            total_expr_count: 0,
            total_stmt_count: 0,
            func_expr_count: 0,
            func_stmt_count: 0,
            arith_const_buf: Vec::new(),
            bit_logical_const_buf: Vec::new(),
            struct_type_pool: Vec::new(),
        }
    }

    pub fn is_c_standard(&self) -> bool {
        self.std.is_c()
    }

    pub fn rng_mut(&mut self) -> &mut ChaCha8Rng {
        &mut self.rng
    }

    pub fn name_handler_mut(&mut self) -> &mut NameHandler {
        &mut self.name_handler
    }

    pub fn policy(&self) -> &Policy {
        self.policy_stack.last().expect("policy stack never empty")
    }

    pub fn push_policy(&mut self, p: Policy) {
        self.policy_stack.push(p);
    }

    pub fn pop_policy(&mut self) {
        if self.policy_stack.len() > 1 {
            self.policy_stack.pop();
        }
    }

    pub fn pick_weighted<T: Clone>(&mut self, set: &WeightedSet<T>) -> T {
        let total = set.total_weight().max(1);
        let mut roll = self.rng.gen_range(0..total);
        for (v, w) in set.entries() {
            if roll < *w {
                return v.clone();
            }
            roll -= w;
        }
        set.entries().last().expect("non-empty weighted set").0.clone()
    }

    // -- scopes --------------------------------------------------------

    pub fn push_scope(&mut self) {
        self.scopes.push(SymbolTable::default());
        self.scope_depth += 1;
    }

    pub fn pop_scope(&mut self) {
        self.scopes.pop();
        self.scope_depth = self.scope_depth.saturating_sub(1);
    }

    pub fn declare_var(&mut self, name: String, data: Rc<RefCell<Data>>, category: VarCategory) {
        let vars = &mut self.scopes.last_mut().unwrap().vars;
        if let Some(entry) = vars.iter_mut().find(|(n, _, _)| *n == name) {
            *entry = (name, data, category);
        } else {
            vars.push((name, data, category));
        }
    }

    pub fn lookup_var(&self, name: &str) -> Option<Rc<RefCell<Data>>> {
        self.scopes.iter().rev().find_map(|s| s.vars.iter().rev().find(|(n, _, _)| n == name).map(|(_, d, _)| d.clone()))
    }

    /// All in-scope variables of the given categories, innermost scopes first.
    pub fn vars_in(&self, categories: &[VarCategory]) -> Vec<Rc<RefCell<Data>>> {
        let mut out = Vec::new();
        for scope in self.scopes.iter().rev() {
            for (_, data, cat) in &scope.vars {
                if categories.contains(cat) {
                    out.push(data.clone());
                }
            }
        }
        out
    }

    pub fn declare_struct_type(&mut self, ty: StructType) {
        self.struct_type_pool.push(ty.clone());
        self.scopes.last_mut().unwrap().types.insert(ty.name.clone(), ty);
    }

    pub fn struct_type_pool(&self) -> &[StructType] {
        &self.struct_type_pool
    }

    // -- counters ---------------------------------------

    pub fn count_expr(&mut self) {
        self.total_expr_count += 1;
        self.func_expr_count += 1;
    }

    pub fn count_stmt(&mut self) {
        self.total_stmt_count += 1;
        self.func_stmt_count += 1;
    }

    pub fn total_expr_count(&self) -> u64 {
        self.total_expr_count
    }

    pub fn func_expr_count(&self) -> u32 {
        self.func_expr_count
    }

    pub fn expr_budget_exhausted(&self) -> bool {
        self.func_expr_count + 1 >= self.policy().total_expr_budget_per_function
    }

    pub fn reset_func_counters(&mut self) {
        self.func_expr_count = 0;
        self.func_stmt_count = 0;
    }

    // -- constant buffers ----------------------------------

    pub fn set_arith_const_buf(&mut self, buf: Vec<TypedVal>) {
        self.arith_const_buf = buf;
    }

    pub fn set_bit_logical_const_buf(&mut self, buf: Vec<TypedVal>) {
        self.bit_logical_const_buf = buf;
    }

    pub fn arith_const_buf(&self) -> &[TypedVal] {
        &self.arith_const_buf
    }

    pub fn bit_logical_const_buf(&self) -> &[TypedVal] {
        &self.bit_logical_const_buf
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::data;
    use crate::lang::LangStd;
    use crate::types::Type;
    use crate::typed_val::IntegerKind;
    use rand::SeedableRng;

    fn ctx() -> Context {
        Context::new(ChaCha8Rng::seed_from_u64(7), Policy::default(), BitMode::Bits64, LangStd::C99)
    }

    #[test]
    fn lookup_finds_var_declared_in_enclosing_scope() {
        let mut c = ctx();
        let data = data::new_scalar(&mut c, Type::new_integer(IntegerKind::Int));
        c.declare_var("x".to_string(), data.clone(), VarCategory::Local);
        c.push_scope();
        assert!(c.lookup_var("x").is_some());
        c.pop_scope();
        assert!(c.lookup_var("x").is_some());
    }

    #[test]
    fn lookup_does_not_see_popped_scope() {
        let mut c = ctx();
        c.push_scope();
        let data = data::new_scalar(&mut c, Type::new_integer(IntegerKind::Int));
        c.declare_var("y".to_string(), data, VarCategory::Local);
        assert!(c.lookup_var("y").is_some());
        c.pop_scope();
        assert!(c.lookup_var("y").is_none());
    }

    #[test]
    fn vars_in_filters_by_category() {
        let mut c = ctx();
        let a = data::new_scalar(&mut c, Type::new_integer(IntegerKind::Int));
        let b = data::new_scalar(&mut c, Type::new_integer(IntegerKind::Int));
        c.declare_var("a".to_string(), a, VarCategory::Input);
        c.declare_var("b".to_string(), b, VarCategory::Output);
        assert_eq!(c.vars_in(&[VarCategory::Input]).len(), 1);
        assert_eq!(c.vars_in(&[VarCategory::Input, VarCategory::Output]).len(), 2);
    }

    #[test]
    fn vars_in_returns_declaration_order_deterministically() {
        let mut c = ctx();
        let names = ["a", "b", "c", "d", "e"];
        for n in names {
            let data = data::new_scalar(&mut c, Type::new_integer(IntegerKind::Int));
            c.declare_var(n.to_string(), data, VarCategory::Mixed);
        }
        let first = c.vars_in(&[VarCategory::Mixed]).iter().map(|d| d.borrow().name().to_string()).collect::<Vec<_>>();
        let second = c.vars_in(&[VarCategory::Mixed]).iter().map(|d| d.borrow().name().to_string()).collect::<Vec<_>>();
        assert_eq!(first, second);
        assert_eq!(first, vec!["var_1", "var_2", "var_3", "var_4", "var_5"]);
    }

    #[test]
    fn declare_var_with_same_name_shadows_the_earlier_entry() {
        let mut c = ctx();
        let a = data::new_scalar(&mut c, Type::new_integer(IntegerKind::Int));
        let b = data::new_scalar(&mut c, Type::new_integer(IntegerKind::Int));
        c.declare_var("x".to_string(), a, VarCategory::Local);
        c.declare_var("x".to_string(), b.clone(), VarCategory::Local);
        assert!(std::rc::Rc::ptr_eq(&c.lookup_var("x").unwrap(), &b));
        assert_eq!(c.vars_in(&[VarCategory::Local]).len(), 1);
    }

    #[test]
    fn policy_stack_push_pop_restores_prior_policy() {
        let mut c = ctx();
        let base_weight = c.policy().ssp_const_use_factor;
        let mut biased = c.policy().clone();
        biased.ssp_const_use_factor = base_weight + 100;
        c.push_policy(biased);
        assert_eq!(c.policy().ssp_const_use_factor, base_weight + 100);
        c.pop_policy();
        assert_eq!(c.policy().ssp_const_use_factor, base_weight);
    }

    #[test]
    fn pop_policy_on_single_entry_stack_is_a_no_op() {
        let mut c = ctx();
        let base_weight = c.policy().ssp_const_use_factor;
        c.pop_policy();
        assert_eq!(c.policy().ssp_const_use_factor, base_weight);
    }

    #[test]
    fn reset_func_counters_clears_only_per_function_counts() {
        let mut c = ctx();
        c.count_expr();
        c.count_expr();
        c.count_stmt();
        assert_eq!(c.func_expr_count(), 2);
        assert_eq!(c.total_expr_count(), 2);
        c.reset_func_counters();
        assert_eq!(c.func_expr_count(), 0);
        assert_eq!(c.total_expr_count(), 2);
    }

    #[test]
    fn expr_budget_exhausted_trips_at_the_configured_limit() {
        let mut c = ctx();
        let budget = c.policy().total_expr_budget_per_function;
        for _ in 0..(budget - 1) {
            c.count_expr();
        }
        assert!(c.expr_budget_exhausted());
    }
}
