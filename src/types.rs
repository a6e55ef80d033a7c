//! the type model.

use std::sync::atomic::{AtomicU64, Ordering};

use rand::Rng;

use crate::context::Context;
use crate::error::bail_invariant;
use crate::error::Result;
use crate::policy::{BitFieldChoice, CvQualChoice, MemberClass};
use crate::typed_val::{BitMode, IntegerKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CvQual {
    None,
    Volatile,
    Const,
    ConstVolatile,
}

impl CvQual {
    fn render(self) -> &'static str {
        match self {
            CvQual::None => "",
            CvQual::Volatile => "volatile ",
            CvQual::Const => "const ",
            CvQual::ConstVolatile => "const volatile ",
        }
    }

    fn from_choice(c: CvQualChoice) -> CvQual {
        match c {
            CvQualChoice::None => CvQual::None,
            CvQualChoice::Volatile => CvQual::Volatile,
            CvQualChoice::Const => CvQual::Const,
            CvQualChoice::ConstVolatile => CvQual::ConstVolatile,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Storage {
    Auto,
    Static,
}

/// Subscript style a generated array prefers at emission time (policy
/// "array element-subscript style", this engine).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArraySubscriptKind {
    Index,
    PointerArith,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IntegerType {
    pub kind: IntegerKind,
    pub cv: CvQual,
    pub storage: Storage,
    pub align: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BitFieldType {
    pub base_kind: IntegerKind,
    pub width: u32,
    pub cv: CvQual,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StructMember {
    pub name: String,
    pub ty: Type,
}

static NEXT_STRUCT_TYPE_ID: AtomicU64 = AtomicU64::new(1);

/// Resets the struct-type id counter; part of the name-handler reset at the
/// start of each generation run.
pub fn reset_struct_type_ids() {
    NEXT_STRUCT_TYPE_ID.store(1, Ordering::SeqCst);
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StructType {
    pub name: String,
    pub id: u64,
    /// Named members only; used for `Member` index resolution.
    pub members: Vec<StructMember>,
    /// Named members + unnamed bit-fields, in declaration order; used for
    /// emitting the struct definition (spec glossary "shadow member").
    pub shadow_members: Vec<StructMember>,
    pub nest_depth: u32,
    pub cv: CvQual,
    pub storage: Storage,
    pub align: u32,
}

impl StructType {
    pub fn new(name: String) -> Self {
        StructType {
            name,
            id: NEXT_STRUCT_TYPE_ID.fetch_add(1, Ordering::SeqCst),
            members: Vec::new(),
            shadow_members: Vec::new(),
            nest_depth: 0,
            cv: CvQual::None,
            storage: Storage::Auto,
            align: 0,
        }
    }

    pub fn add_named_member(&mut self, name: String, ty: Type) {
        if let Type::Struct(s) = &ty {
            self.nest_depth = self.nest_depth.max(s.nest_depth + 1);
        }
        let member = StructMember { name, ty };
        self.members.push(member.clone());
        self.shadow_members.push(member);
    }

    pub fn add_unnamed_bitfield(&mut self, ty: Type) {
        self.shadow_members.push(StructMember { name: String::new(), ty });
    }

    pub fn get_member(&self, idx: usize) -> Option<&StructMember> {
        self.members.get(idx)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Type {
    Integer(IntegerType),
    BitField(BitFieldType),
    Struct(StructType),
    Array { element: Box<Type>, length: u64, kind: ArraySubscriptKind },
    Pointer { pointee: Box<Type> },
}

impl Type {
    pub fn new_integer(kind: IntegerKind) -> Self {
        Type::Integer(IntegerType { kind, cv: CvQual::None, storage: Storage::Auto, align: 0 })
    }

    pub fn pointer_to(pointee: Type) -> Self {
        Type::Pointer { pointee: Box::new(pointee) }
    }

    pub fn cv_qual(&self) -> CvQual {
        match self {
            Type::Integer(i) => i.cv,
            Type::BitField(b) => b.cv,
            Type::Struct(s) => s.cv,
            Type::Array { .. } | Type::Pointer { .. } => CvQual::None,
        }
    }

    pub fn is_static(&self) -> bool {
        match self {
            Type::Integer(i) => i.storage == Storage::Static,
            Type::Struct(s) => s.storage == Storage::Static,
            _ => false,
        }
    }

    pub fn set_static(&mut self, is_static: bool) {
        let storage = if is_static { Storage::Static } else { Storage::Auto };
        match self {
            Type::Integer(i) => i.storage = storage,
            Type::Struct(s) => s.storage = storage,
            _ => {}
        }
    }

    pub fn set_cv(&mut self, cv: CvQual) {
        match self {
            Type::Integer(i) => i.cv = cv,
            Type::BitField(b) => b.cv = cv,
            Type::Struct(s) => s.cv = cv,
            _ => {}
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Type::Integer(_))
    }

    pub fn is_bit_field(&self) -> bool {
        matches!(self, Type::BitField(_))
    }

    pub fn is_struct(&self) -> bool {
        matches!(self, Type::Struct(_))
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, Type::Pointer { .. })
    }

    /// The integer kind backing this type for arithmetic purposes: direct
    /// for `Integer`, the (promoted) base for `BitField`.
    pub fn int_kind(&self) -> Option<IntegerKind> {
        match self {
            Type::Integer(i) => Some(i.kind),
            Type::BitField(b) => Some(b.base_kind),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&StructType> {
        match self {
            Type::Struct(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_struct_mut(&mut self) -> Option<&mut StructType> {
        match self {
            Type::Struct(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bit_field(&self) -> Option<&BitFieldType> {
        match self {
            Type::BitField(b) => Some(b),
            _ => None,
        }
    }

    fn base_name(&self) -> String {
        match self {
            Type::Integer(i) => i.kind.name().to_string(),
            Type::BitField(b) => b.base_kind.name().to_string(),
            Type::Struct(s) => format!("struct {}", s.name),
            Type::Array { element, length, .. } => format!("{}[{}]", element.base_name(), length),
            Type::Pointer { pointee } => format!("{}*", pointee.base_name()),
        }
    }

    /// Full textual rendering including storage/cv/alignment: `static `
    /// then cv-qualifiers then the base name then an alignment attribute.
    pub fn render_qualified(&self) -> String {
        let mut ret = String::new();
        if self.is_static() {
            ret.push_str("static ");
        }
        ret.push_str(self.cv_qual().render());
        ret.push_str(&self.base_name());
        let align = match self {
            Type::Integer(i) => i.align,
            Type::Struct(s) => s.align,
            _ => 0,
        };
        if align != 0 {
            ret.push_str(&format!(" __attribute__((aligned({})))", align));
        }
        ret
    }

    /// Struct nest depth, 0 for non-struct leaves (invariant).
    pub fn nest_depth(&self) -> u32 {
        match self {
            Type::Struct(s) => s.nest_depth,
            _ => 0,
        }
    }

    pub fn validate_invariants(&self) -> Result<()> {
        match self {
            Type::BitField(b) => {
                if b.width == 0 {
                    bail_invariant!("bit-field width {} out of range", b.width);
                }
            }
            Type::Array { length, .. } => {
                if *length == 0 {
                    bail_invariant!("array length must be >= 1, got 0");
                }
            }
            Type::Struct(s) => {
                for m in &s.members {
                    m.ty.validate_invariants()?;
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// Generates a fresh integer type drawing cv/static/align from the policy
/// (`Type::generate`).
pub fn generate_integer_type(ctx: &mut Context) -> Type {
    let kind = ctx.pick_weighted(&ctx.policy().allowed_int_kinds.clone());
    let cv = CvQual::from_choice(ctx.pick_weighted(&ctx.policy().allowed_cv_qual.clone()));
    let is_static = ctx.policy().allow_static_var && ctx.rng_mut().gen_bool(0.2);
    Type::Integer(IntegerType { kind, cv, storage: if is_static { Storage::Static } else { Storage::Auto }, align: 0 })
}

/// Generates a bit-field. C standards restrict the base kind to `int`/`uint`;
/// callers targeting a C++ standard may widen this later.
pub fn generate_bitfield(ctx: &mut Context, bm: BitMode) -> Type {
    let base_kind = if ctx.is_c_standard() {
        if ctx.rng_mut().gen_bool(0.5) { IntegerKind::Int } else { IntegerKind::UInt }
    } else {
        ctx.pick_weighted(&ctx.policy().allowed_int_kinds.clone())
    };
    let max_width = base_kind.width_bits(bm);
    let width = ctx.rng_mut().gen_range(1..=max_width);
    let cv = CvQual::from_choice(ctx.pick_weighted(&ctx.policy().allowed_cv_qual.clone()));
    Type::BitField(BitFieldType { base_kind, width, cv })
}

/// The struct generator: draws a member count, then per-slot decides
/// whether to embed a previously generated struct (from `nested_pool`,
/// filtered by `max_struct_depth`), a bit-field, or a plain integer.
pub fn generate_struct_type(ctx: &mut Context, bm: BitMode, nested_pool: &[StructType]) -> Type {
    let policy = ctx.policy().clone();
    let mut primary_cv = CvQual::from_choice(ctx.pick_weighted(&policy.allowed_cv_qual));
    let mut primary_static = policy.allow_static_var && ctx.rng_mut().gen_bool(0.2);

    let name = ctx.name_handler_mut().next_struct_type_name();
    let mut struct_type = StructType::new(name);
    let member_count =
        ctx.rng_mut().gen_range(policy.min_struct_members..=policy.max_struct_members.max(policy.min_struct_members));

    let mut member_idx = 0;
    for _ in 0..member_count {
        if policy.allow_mix_cv_qual_in_struct {
            primary_cv = CvQual::from_choice(ctx.pick_weighted(&policy.allowed_cv_qual));
        }
        if policy.allow_mix_static_in_struct {
            primary_static = if policy.allow_static_members { ctx.rng_mut().gen_bool(0.2) } else { false };
        }

        let mut primary_type = if !policy.allow_mix_types_in_struct {
            generate_integer_type(ctx)
        } else {
            let member_class = ctx.pick_weighted(&policy.member_class_prob);
            let mut chosen: Option<Type> = None;
            if member_class == MemberClass::Struct && policy.max_struct_depth > 0 && !nested_pool.is_empty() {
                let candidate = &nested_pool[ctx.rng_mut().gen_range(0..nested_pool.len())];
                if candidate.nest_depth + 1 < policy.max_struct_depth {
                    chosen = Some(Type::Struct(candidate.clone()));
                }
            }
            match chosen {
                Some(t) => t,
                None => {
                    let mut bf_choice = ctx.pick_weighted(&policy.bit_field_prob);
                    if ctx.is_c_standard() {
                        let allows_bitfield_base = policy
                            .allowed_int_kinds
                            .entries()
                            .iter()
                            .any(|(k, w)| *w > 0 && (*k == IntegerKind::Int || *k == IntegerKind::UInt));
                        if !allows_bitfield_base {
                            bf_choice = BitFieldChoice::None;
                        }
                    }
                    match bf_choice {
                        BitFieldChoice::Unnamed => {
                            let bf = generate_bitfield(ctx, bm);
                            struct_type.add_unnamed_bitfield(bf);
                            continue;
                        }
                        BitFieldChoice::Named => {
                            primary_static = false; // bit-fields can't be static members
                            generate_bitfield(ctx, bm)
                        }
                        BitFieldChoice::None => generate_integer_type(ctx),
                    }
                }
            }
        };
        primary_type.set_cv(primary_cv);
        primary_type.set_static(primary_static);
        let name = format!("member_{}_{}", struct_type.id, member_idx);
        member_idx += 1;
        struct_type.add_named_member(name, primary_type);
    }
    Type::Struct(struct_type)
}
