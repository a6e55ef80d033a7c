//! Statement IR.

use std::cell::RefCell;
use std::rc::Rc;

use crate::data::Data;
use crate::expr::Expr;

#[derive(Debug)]
pub enum Stmt {
    Decl { data: Rc<RefCell<Data>>, init: Option<Expr>, is_extern: bool },
    ExprStmt(Expr),
    Scope(Vec<Stmt>),
    If { cond: Expr, then_scope: Vec<Stmt>, else_scope: Option<Vec<Stmt>> },
}
