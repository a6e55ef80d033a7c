//! data model — runtime state bound to a declaration.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::context::Context;
use crate::error::{bail_invariant, Result};
use crate::typed_val::{BitMode, IntegerKind, TypedVal};
use crate::types::{ArraySubscriptKind, StructType, Type};

#[derive(Clone, Debug)]
pub struct ScalarData {
    pub name: String,
    pub ty: Type,
    pub init_val: TypedVal,
    pub cur_val: TypedVal,
    pub min: TypedVal,
    pub max: TypedVal,
    pub dirty: bool,
}

impl ScalarData {
    pub fn set_init_value(&mut self, v: TypedVal) {
        self.init_val = v;
        self.cur_val = v;
        self.dirty = false;
    }

    pub fn set_cur_value(&mut self, v: TypedVal) -> Result<()> {
        if v.kind != self.cur_val.kind {
            bail_invariant!(
                "kind mismatch assigning to scalar '{}': expected {:?}, got {:?}",
                self.name,
                self.cur_val.kind,
                v.kind
            );
        }
        self.cur_val = v;
        self.dirty = true;
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct StructObjData {
    pub name: String,
    pub ty: StructType,
    pub members: Vec<Rc<RefCell<Data>>>,
}

impl StructObjData {
    pub fn get_member(&self, idx: usize) -> Option<Rc<RefCell<Data>>> {
        self.members.get(idx).cloned()
    }
}

#[derive(Clone, Debug)]
pub struct ArrayObjData {
    pub name: String,
    pub ty: Type,
    pub elements: Vec<Rc<RefCell<Data>>>,
}

impl ArrayObjData {
    pub fn get(&self, idx: usize) -> Result<Rc<RefCell<Data>>> {
        self.elements.get(idx).cloned().ok_or_else(|| {
            crate::error::OorgenError::Invariant {
                file: file!(),
                line: line!(),
                func: "ArrayObjData::get",
                msg: format!("index {} out of range for array '{}' of length {}", idx, self.name, self.elements.len()),
            }
        })
    }
}

#[derive(Clone, Debug)]
pub struct PointerData {
    pub name: String,
    pub ty: Type,
    pub pointee: Option<Rc<RefCell<Data>>>,
}

impl PointerData {
    pub fn set_pointee(&mut self, pointee: Rc<RefCell<Data>>, pointee_ty: &Type) -> Result<()> {
        let Type::Pointer { pointee: declared } = &self.ty else {
            bail_invariant!("set_pointee called on non-pointer '{}'", self.name);
        };
        if declared.as_ref() != pointee_ty {
            bail_invariant!("pointee type mismatch assigning to pointer '{}'", self.name);
        }
        self.pointee = Some(pointee);
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub enum Data {
    Scalar(ScalarData),
    StructObj(StructObjData),
    ArrayObj(ArrayObjData),
    Pointer(PointerData),
}

impl Data {
    pub fn name(&self) -> &str {
        match self {
            Data::Scalar(s) => &s.name,
            Data::StructObj(s) => &s.name,
            Data::ArrayObj(a) => &a.name,
            Data::Pointer(p) => &p.name,
        }
    }

    /// Owned type value; struct objects synthesize a fresh `Type::Struct`
    /// wrapper around their backing `StructType` since they don't store one.
    pub fn type_owned(&self) -> Type {
        match self {
            Data::Scalar(s) => s.ty.clone(),
            Data::StructObj(s) => Type::Struct(s.ty.clone()),
            Data::ArrayObj(a) => a.ty.clone(),
            Data::Pointer(p) => p.ty.clone(),
        }
    }

    pub fn as_scalar(&self) -> Option<&ScalarData> {
        match self {
            Data::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_scalar_mut(&mut self) -> Option<&mut ScalarData> {
        match self {
            Data::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&StructObjData> {
        match self {
            Data::StructObj(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_pointer_mut(&mut self) -> Option<&mut PointerData> {
        match self {
            Data::Pointer(p) => Some(p),
            _ => None,
        }
    }
}

/// Keyed by `(struct_type_id, member_index)`. Exactly one backing `Data`
/// exists per entry (static-member invariant); every `StructObj`
/// instance of that struct type holds the same `Rc`.
thread_local! {
    static STATIC_MEMBER_REGISTRY: RefCell<HashMap<(u64, usize), Rc<RefCell<Data>>>> = RefCell::new(HashMap::new());
}

pub fn reset_static_member_registry() {
    STATIC_MEMBER_REGISTRY.with(|r| r.borrow_mut().clear());
}

fn random_value_in_range(ctx: &mut Context, ty: &Type) -> TypedVal {
    use rand::Rng;
    match ty {
        Type::Integer(i) => {
            let bm = ctx.bit_mode;
            let lo = i.kind.min_value(bm);
            let hi = i.kind.max_value(bm);
            let v = ctx.rng_mut().gen_range(lo..=hi);
            TypedVal::from_i128(i.kind, v, bm)
        }
        Type::BitField(b) => {
            let signed = b.base_kind.is_signed();
            let hi: i128 = if signed { (1i128 << (b.width - 1)) - 1 } else { (1i128 << b.width) - 1 };
            let lo: i128 = if signed { -(1i128 << (b.width - 1)) } else { 0 };
            let v = ctx.rng_mut().gen_range(lo..=hi);
            TypedVal::from_i128(b.base_kind, v, ctx.bit_mode).mask_to_bitfield(b.width, signed)
        }
        _ => TypedVal::zero(IntegerKind::Int),
    }
}

fn allocate_scalar(ctx: &mut Context, name: String, ty: Type) -> ScalarData {
    let init = random_value_in_range(ctx, &ty);
    let bm = ctx.bit_mode;
    let (min, max) = match &ty {
        Type::Integer(i) => (
            TypedVal::from_i128(i.kind, i.kind.min_value(bm), bm),
            TypedVal::from_i128(i.kind, i.kind.max_value(bm), bm),
        ),
        Type::BitField(b) => {
            let signed = b.base_kind.is_signed();
            let hi: i128 = if signed { (1i128 << (b.width - 1)) - 1 } else { (1i128 << b.width) - 1 };
            let lo: i128 = if signed { -(1i128 << (b.width - 1)) } else { 0 };
            (TypedVal::from_i128(b.base_kind, lo, bm).mask_to_bitfield(b.width, signed), TypedVal::from_i128(b.base_kind, hi, bm).mask_to_bitfield(b.width, signed))
        }
        _ => (init, init),
    };
    ScalarData { name, ty, init_val: init, cur_val: init, min, max, dirty: false }
}

/// Allocates a `Struct` instance, walking its type's members in declaration
/// order. Static members reuse the shared singleton (lazily created at
/// first sight); non-static members each get a fresh `Data`.
pub fn allocate_struct(ctx: &mut Context, name: String, struct_ty: &StructType) -> StructObjData {
    let mut members = Vec::with_capacity(struct_ty.members.len());
    for (idx, member) in struct_ty.members.iter().enumerate() {
        let data = if member.ty.is_static() {
            let key = (struct_ty.id, idx);
            STATIC_MEMBER_REGISTRY.with(|reg| {
                reg.borrow_mut()
                    .entry(key)
                    .or_insert_with(|| Rc::new(RefCell::new(allocate_member_data(ctx, member.name.clone(), member.ty.clone()))))
                    .clone()
            })
        } else {
            Rc::new(RefCell::new(allocate_member_data(ctx, member.name.clone(), member.ty.clone())))
        };
        members.push(data);
    }
    StructObjData { name, ty: struct_ty.clone(), members }
}

fn allocate_member_data(ctx: &mut Context, name: String, ty: Type) -> Data {
    match &ty {
        Type::Struct(s) => Data::StructObj(allocate_struct(ctx, name, s)),
        Type::Integer(_) | Type::BitField(_) => Data::Scalar(allocate_scalar(ctx, name, ty)),
        _ => Data::Scalar(allocate_scalar(ctx, name, Type::new_integer(IntegerKind::Int))),
    }
}

pub fn new_scalar(ctx: &mut Context, ty: Type) -> Rc<RefCell<Data>> {
    let name = ctx.name_handler_mut().next_scalar_var_name();
    Rc::new(RefCell::new(Data::Scalar(allocate_scalar(ctx, name, ty))))
}

pub fn new_struct(ctx: &mut Context, struct_ty: &StructType) -> Rc<RefCell<Data>> {
    let name = ctx.name_handler_mut().next_struct_var_name();
    Rc::new(RefCell::new(Data::StructObj(allocate_struct(ctx, name, struct_ty))))
}

pub fn new_array(ctx: &mut Context, element_ty: Type, length: u64, kind: ArraySubscriptKind) -> Rc<RefCell<Data>> {
    let name = ctx.name_handler_mut().next_array_var_name();
    let mut elements = Vec::with_capacity(length as usize);
    for _ in 0..length {
        let elem_name = format!("{}_elem", name);
        elements.push(Rc::new(RefCell::new(allocate_member_data(ctx, elem_name, element_ty.clone()))));
    }
    let ty = Type::Array { element: Box::new(element_ty), length, kind };
    Rc::new(RefCell::new(Data::ArrayObj(ArrayObjData { name, ty, elements })))
}

pub fn new_pointer(name: String, pointee_ty: Type) -> Rc<RefCell<Data>> {
    Rc::new(RefCell::new(Data::Pointer(PointerData { name, ty: Type::pointer_to(pointee_ty), pointee: None })))
}
