//! Textual emission of the three generated-program artifacts. Rendering
//! builds owned `String`s rather than writing to an `io::Write` directly,
//! so the library surface stays filesystem-free; only the CLI touches disk.

use std::fmt::Write as _;

use crate::context::VarCategory;
use crate::data::Data;
use crate::expr::{Expr, ExprKind};
use crate::program::{Function, Program};
use crate::stmt::Stmt;
use crate::typed_val::{BitMode, TypedVal};
use crate::types::{StructType, Type};

fn render_expr(e: &Expr, bm: BitMode, out: &mut String) {
    match &e.kind {
        ExprKind::Const => {
            write!(out, "{}", e.value.to_literal(bm)).unwrap();
        }
        ExprKind::VarUse(data) => {
            write!(out, "{}", data.borrow().name()).unwrap();
        }
        ExprKind::Unary { op, arg } => {
            use crate::policy::UnaryOpChoice::*;
            match op {
                PostInc | PostDec => {
                    out.push('(');
                    render_expr(arg, bm, out);
                    write!(out, "{})", op).unwrap();
                }
                _ => {
                    write!(out, "({}", op).unwrap();
                    render_expr(arg, bm, out);
                    out.push(')');
                }
            }
        }
        ExprKind::Binary { op, lhs, rhs, cond } => {
            if let Some(c) = cond {
                out.push('(');
                render_expr(c, bm, out);
                out.push_str(" ? ");
                render_expr(lhs, bm, out);
                out.push_str(" : ");
                render_expr(rhs, bm, out);
                out.push(')');
            } else {
                out.push('(');
                render_expr(lhs, bm, out);
                write!(out, " {} ", op).unwrap();
                render_expr(rhs, bm, out);
                out.push(')');
            }
        }
        ExprKind::Assign { target, source, taken } => {
            out.push('(');
            render_expr(target, bm, out);
            out.push_str(" = ");
            render_expr(source, bm, out);
            out.push(')');
            if !taken {
                out.push_str(" /* untaken */");
            }
        }
        ExprKind::TypeCast { expr, .. } => {
            write!(out, "(({})", e.ty.render_qualified()).unwrap();
            render_expr(expr, bm, out);
            out.push(')');
        }
        ExprKind::Member { base, index, .. } => {
            render_expr(base, bm, out);
            write!(out, ".{}", member_name(base, *index)).unwrap();
        }
        ExprKind::AddrOf { expr } => {
            out.push_str("(&");
            render_expr(expr, bm, out);
            out.push(')');
        }
        ExprKind::Deref { expr } => {
            out.push_str("(*");
            render_expr(expr, bm, out);
            out.push(')');
        }
    }
}

fn member_name(base: &Expr, index: usize) -> String {
    if let Some(s) = base.ty.as_struct() {
        if let Some(m) = s.get_member(index) {
            return m.name.clone();
        }
    }
    format!("m{}", index)
}

fn render_stmt(s: &Stmt, bm: BitMode, indent: usize, out: &mut String) {
    let pad = "    ".repeat(indent);
    match s {
        Stmt::Decl { data, init, .. } => {
            let d = data.borrow();
            write!(out, "{}{} {}", pad, d.type_owned().render_qualified(), d.name()).unwrap();
            if let Some(e) = init {
                out.push_str(" = ");
                render_expr(e, bm, out);
            }
            out.push_str(";\n");
        }
        Stmt::ExprStmt(e) => {
            out.push_str(&pad);
            render_expr(e, bm, out);
            out.push_str(";\n");
        }
        Stmt::Scope(body) => {
            writeln!(out, "{}{{", pad).unwrap();
            for st in body {
                render_stmt(st, bm, indent + 1, out);
            }
            writeln!(out, "{}}}", pad).unwrap();
        }
        Stmt::If { cond, then_scope, else_scope } => {
            out.push_str(&pad);
            out.push_str("if (");
            render_expr(cond, bm, out);
            writeln!(out, ") {{").unwrap();
            for st in then_scope {
                render_stmt(st, bm, indent + 1, out);
            }
            writeln!(out, "{}}}", pad).unwrap();
            if let Some(else_body) = else_scope {
                writeln!(out, "{}else {{", pad).unwrap();
                for st in else_body {
                    render_stmt(st, bm, indent + 1, out);
                }
                writeln!(out, "{}}}", pad).unwrap();
            }
        }
    }
}

fn render_struct_def(s: &StructType, out: &mut String) {
    writeln!(out, "struct {} {{", s.name).unwrap();
    for m in &s.shadow_members {
        if m.name.is_empty() {
            if let Some(bf) = m.ty.as_bit_field() {
                writeln!(out, "    {} : {};", bf.base_kind.name(), bf.width).unwrap();
            }
            continue;
        }
        if let Some(bf) = m.ty.as_bit_field() {
            writeln!(out, "    {} {} : {};", bf.base_kind.name(), m.name, bf.width).unwrap();
        } else {
            writeln!(out, "    {} {};", m.ty.render_qualified(), m.name).unwrap();
        }
    }
    writeln!(out, "}};").unwrap();
}

/// Recursively emits out-of-line definitions for `static` members, walking
/// depth-first so nested struct members are covered too.
fn render_static_member_defs(s: &StructType, out: &mut String) {
    for m in &s.members {
        if m.ty.is_static() {
            writeln!(out, "{} {}::{};", m.ty.render_qualified(), s.name, m.name).unwrap();
        }
        if let Some(nested) = m.ty.as_struct() {
            render_static_member_defs(nested, out);
        }
    }
}

fn render_var_decl(data: &Data, category: VarCategory, bm: BitMode, out: &mut String) {
    let prefix = match category {
        VarCategory::Input => "/* input */ ",
        VarCategory::Mixed => "/* mixed */ ",
        VarCategory::Output => "/* output */ ",
        VarCategory::Local => "",
    };
    write!(out, "{}{} {}", prefix, data.type_owned().render_qualified(), data.name()).unwrap();
    if let Data::Scalar(s) = data {
        write!(out, " = {}", s.init_val.to_literal(bm)).unwrap();
    }
    out.push_str(";\n");
}

/// First emitted artifact: struct definitions, static-member out-of-line
/// definitions, and extern variable declarations.
///
/// Scalar globals get their `init_val` baked in as a literal initializer, so
/// the runtime value they start from matches what [`predetermined_checksum`]
/// assumed the generator's simulation started from. Struct-typed globals are
/// left zero-initialized here; [`emit_main`] assigns their scalar members
/// explicitly before any generated function runs, for the same reason.
pub fn emit_declarations(program: &Program, bm: BitMode) -> String {
    let mut out = String::new();
    for s in &program.struct_types {
        render_struct_def(s, &mut out);
    }
    out.push('\n');
    for s in &program.struct_types {
        render_static_member_defs(s, &mut out);
    }
    out.push('\n');
    for v in &program.input_vars {
        render_var_decl(&v.borrow(), VarCategory::Input, bm, &mut out);
    }
    for v in &program.mixed_vars {
        render_var_decl(&v.borrow(), VarCategory::Mixed, bm, &mut out);
    }
    for v in &program.output_vars {
        render_var_decl(&v.borrow(), VarCategory::Output, bm, &mut out);
    }
    out
}

/// Second emitted artifact: function bodies.
pub fn emit_functions(program: &Program, bm: BitMode) -> String {
    let mut out = String::new();
    for f in &program.functions {
        render_function(f, bm, &mut out);
        out.push('\n');
    }
    out
}

fn render_function(f: &Function, bm: BitMode, out: &mut String) {
    writeln!(out, "void {}(void) {{", f.name).unwrap();
    for s in &f.body {
        render_stmt(s, bm, 1, out);
    }
    writeln!(out, "}}").unwrap();
}

/// Walks every scalar leaf reachable from a checksum-bucket variable,
/// recursing into `StructObj` members (in declaration order, arbitrarily
/// nested) since a top-level var can itself be a struct. Pairs each leaf's
/// value with the C access path (`var.member.nested`) needed to read it back
/// at runtime, so the predicted and emitted sums walk exactly the same set
/// of leaves in the same order.
fn checksum_leaves(data: &Data, path: &str, use_init: bool) -> Vec<(String, TypedVal)> {
    match data {
        Data::Scalar(s) => vec![(path.to_string(), if use_init { s.init_val } else { s.cur_val })],
        Data::StructObj(s) => {
            let mut out = Vec::new();
            for (member, child) in s.ty.members.iter().zip(s.members.iter()) {
                let child_path = format!("{}.{}", path, member.name);
                out.extend(checksum_leaves(&child.borrow(), &child_path, use_init));
            }
            out
        }
        _ => Vec::new(),
    }
}

/// Sums the final (post-generation) raw bit patterns of every scalar leaf
/// under a `mixed`/`output` variable into a single checksum value. Since
/// every `Assign` constructed during generation already wrote its value
/// through to the backing `Data`, this is the value the emitted program's
/// runtime execution is expected to reproduce.
pub fn predetermined_checksum(program: &Program) -> u64 {
    let mut csum: u64 = 0;
    for v in program.mixed_vars.iter().chain(program.output_vars.iter()) {
        let data = v.borrow();
        let name = data.name().to_string();
        for (_, val) in checksum_leaves(&data, &name, false) {
            csum = csum.wrapping_add(val.as_unsigned());
            csum = csum.rotate_left(1);
        }
    }
    csum
}

/// Third emitted artifact: a `main` that initializes struct-typed globals'
/// scalar members, calls every generated function, recomputes the checksum
/// at runtime, and prints it alongside the predetermined value.
pub fn emit_main(program: &Program, bm: BitMode, checksum: u64) -> String {
    let mut out = String::new();
    out.push_str("int main(void) {\n");
    for v in program.input_vars.iter().chain(program.mixed_vars.iter()).chain(program.output_vars.iter()) {
        let data = v.borrow();
        if data.as_struct().is_none() {
            continue;
        }
        let name = data.name().to_string();
        for (path, val) in checksum_leaves(&data, &name, true) {
            writeln!(out, "    {} = {};", path, val.to_literal(bm)).unwrap();
        }
    }
    for f in &program.functions {
        writeln!(out, "    {}();", f.name).unwrap();
    }
    out.push_str("    unsigned long csum = 0;\n");
    for v in program.mixed_vars.iter().chain(program.output_vars.iter()) {
        let data = v.borrow();
        let name = data.name().to_string();
        for (path, _) in checksum_leaves(&data, &name, false) {
            writeln!(out, "    csum += (unsigned long){};", path).unwrap();
            writeln!(out, "    csum = (csum << 1) | (csum >> 63);").unwrap();
        }
    }
    writeln!(out, "    /* predetermined checksum = {}UL */", checksum).unwrap();
    out.push_str("    printf(\"checksum = %lx\\n\", csum);\n");
    out.push_str("    return 0;\n");
    out.push_str("}\n");
    out
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::context::Context;
    use crate::data;
    use crate::lang::LangStd;
    use crate::policy::Policy;
    use crate::typed_val::IntegerKind;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn ctx() -> Context {
        Context::new(ChaCha8Rng::seed_from_u64(3), Policy::default(), BitMode::Bits64, LangStd::C99)
    }

    #[test]
    fn render_expr_parenthesizes_binary_operators() {
        let lhs = crate::expr::const_expr(crate::typed_val::TypedVal::from_i128(IntegerKind::Int, 1, BitMode::Bits64));
        let rhs = crate::expr::const_expr(crate::typed_val::TypedVal::from_i128(IntegerKind::Int, 2, BitMode::Bits64));
        let mut c = ctx();
        let e = crate::expr::binary(&mut c, crate::policy::BinaryOpChoice::Add, lhs, rhs, None).unwrap();
        let mut out = String::new();
        render_expr(&e, BitMode::Bits64, &mut out);
        assert_eq!(out, "(1 + 2)");
    }

    #[test]
    fn emit_declarations_tags_each_bucket_with_its_category_comment() {
        let mut c = ctx();
        let input = data::new_scalar(&mut c, Type::new_integer(IntegerKind::Int));
        let program = crate::program::Program {
            struct_types: vec![],
            input_vars: vec![input],
            mixed_vars: vec![],
            output_vars: vec![],
            functions: vec![],
        };
        let decls = emit_declarations(&program, BitMode::Bits64);
        assert!(decls.contains("/* input */"));
    }

    #[test]
    fn predetermined_checksum_is_deterministic_for_the_same_values() {
        let mut c = ctx();
        let a = data::new_scalar(&mut c, Type::new_integer(IntegerKind::Int));
        a.borrow_mut().as_scalar_mut().unwrap().set_cur_value(crate::typed_val::TypedVal::from_i128(IntegerKind::Int, 7, BitMode::Bits64)).unwrap();
        let program = crate::program::Program {
            struct_types: vec![],
            input_vars: vec![],
            mixed_vars: vec![a.clone()],
            output_vars: vec![],
            functions: vec![],
        };
        let c1 = predetermined_checksum(&program);
        let c2 = predetermined_checksum(&program);
        assert_eq!(c1, c2);
        assert_eq!(c1, 7u64.rotate_left(1));
    }

    #[test]
    fn predetermined_checksum_recurses_into_struct_members() {
        let mut c = ctx();
        let mut struct_ty = StructType::new("Pair".to_string());
        struct_ty.add_named_member("a".to_string(), Type::new_integer(IntegerKind::Int));
        struct_ty.add_named_member("b".to_string(), Type::new_integer(IntegerKind::Int));

        let s = data::new_struct(&mut c, &struct_ty);
        {
            let s_ref = s.borrow();
            let obj = s_ref.as_struct().unwrap();
            obj.get_member(0).unwrap().borrow_mut().as_scalar_mut().unwrap()
                .set_cur_value(crate::typed_val::TypedVal::from_i128(IntegerKind::Int, 3, BitMode::Bits64)).unwrap();
            obj.get_member(1).unwrap().borrow_mut().as_scalar_mut().unwrap()
                .set_cur_value(crate::typed_val::TypedVal::from_i128(IntegerKind::Int, 4, BitMode::Bits64)).unwrap();
        }
        let program = crate::program::Program {
            struct_types: vec![struct_ty],
            input_vars: vec![],
            mixed_vars: vec![s],
            output_vars: vec![],
            functions: vec![],
        };
        let expected = 3u64.rotate_left(1).wrapping_add(4).rotate_left(1);
        assert_eq!(predetermined_checksum(&program), expected);
    }

    #[test]
    fn emit_main_initializes_struct_members_before_calling_functions() {
        let mut c = ctx();
        let mut struct_ty = StructType::new("Pair".to_string());
        struct_ty.add_named_member("a".to_string(), Type::new_integer(IntegerKind::Int));
        let s = data::new_struct(&mut c, &struct_ty);
        let program = crate::program::Program {
            struct_types: vec![struct_ty],
            input_vars: vec![],
            mixed_vars: vec![s.clone()],
            output_vars: vec![],
            functions: vec![],
        };
        let main_text = emit_main(&program, BitMode::Bits64, predetermined_checksum(&program));
        let init_val = s.borrow().as_struct().unwrap().get_member(0).unwrap().borrow().as_scalar().unwrap().init_val;
        let expected_init = format!("{}.a = {};", s.borrow().name(), init_val.to_literal(BitMode::Bits64));
        assert!(main_text.contains(&expected_init));
        let init_pos = main_text.find(&expected_init).unwrap();
        let call_pos = main_text.find("csum = 0").unwrap();
        assert!(init_pos < call_pos, "struct member init must precede checksum computation");
    }

    #[test]
    fn render_var_decl_emits_scalar_initializer() {
        let mut c = ctx();
        let v = data::new_scalar(&mut c, Type::new_integer(IntegerKind::Int));
        let init_val = v.borrow().as_scalar().unwrap().init_val;
        let mut out = String::new();
        render_var_decl(&v.borrow(), VarCategory::Mixed, BitMode::Bits64, &mut out);
        assert!(out.contains(&format!("= {};", init_val.to_literal(BitMode::Bits64))));
    }

    #[test]
    fn render_struct_def_renders_unnamed_bitfields_without_a_name() {
        let mut s = StructType::new("S".to_string());
        s.add_unnamed_bitfield(Type::BitField(crate::types::BitFieldType {
            base_kind: IntegerKind::UInt,
            width: 4,
            cv: crate::types::CvQual::None,
        }));
        let mut out = String::new();
        render_struct_def(&s, &mut out);
        assert!(out.contains("unsigned int : 4;"));
    }
}
