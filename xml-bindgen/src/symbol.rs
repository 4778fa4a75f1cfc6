use crate::model::{Model, ScalarKind, ShapeKind, ShapeRef};
use crate::util::{tok_id, type_name};
use crate::GenError;
use proc_macro2::TokenStream;
use quote::{quote, ToTokens};
use std::collections::HashMap;

/// A Rust type as it appears in generated code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RustType {
    String,
    Bool,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    Blob,
    DateTime,
    Vec(Box<RustType>),
    HashMap(Box<RustType>, Box<RustType>),
    /// A generated struct, union or enum.
    Named(String),
    Boxed(Box<RustType>),
}

impl RustType {
    fn scalar(kind: ScalarKind) -> RustType {
        match kind {
            ScalarKind::String => RustType::String,
            ScalarKind::Boolean => RustType::Bool,
            ScalarKind::Byte => RustType::I8,
            ScalarKind::Short => RustType::I16,
            ScalarKind::Integer => RustType::I32,
            ScalarKind::Long => RustType::I64,
            ScalarKind::Float => RustType::F32,
            ScalarKind::Double => RustType::F64,
            ScalarKind::Timestamp => RustType::DateTime,
            ScalarKind::Blob => RustType::Blob,
        }
    }
}

impl ToTokens for RustType {
    fn to_tokens(&self, tokens: &mut TokenStream) {
        tokens.extend(match self {
            RustType::String => quote!(::std::string::String),
            RustType::Bool => quote!(bool),
            RustType::I8 => quote!(i8),
            RustType::I16 => quote!(i16),
            RustType::I32 => quote!(i32),
            RustType::I64 => quote!(i64),
            RustType::F32 => quote!(f32),
            RustType::F64 => quote!(f64),
            RustType::Blob => quote!(::xml_wire::Blob),
            RustType::DateTime => quote!(::xml_wire::DateTime),
            RustType::Vec(item) => quote!(::std::vec::Vec<#item>),
            RustType::HashMap(key, value) => quote!(::std::collections::HashMap<#key, #value>),
            RustType::Named(name) => tok_id(name).into_token_stream(),
            RustType::Boxed(inner) => quote!(::std::boxed::Box<#inner>),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolClass {
    Scalar(ScalarKind),
    Collection,
    Struct,
    Union,
    Enum,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeSymbol {
    pub ty: RustType,
    pub class: SymbolClass,
    pub is_boxed: bool,
}

/// Rust types for every shape of a boxed model.
#[derive(Debug)]
pub struct SymbolTable {
    symbols: HashMap<String, TypeSymbol>,
}

struct Resolver<'m> {
    model: &'m Model,
    done: HashMap<String, TypeSymbol>,
    active: Vec<&'m str>,
}

impl<'m> Resolver<'m> {
    fn shape(&mut self, name: &'m str) -> Result<TypeSymbol, GenError> {
        if let Some(symbol) = self.done.get(name) {
            return Ok(symbol.clone());
        }
        let model = self.model;
        let shape = model.shape(name).ok_or_else(|| GenError::UnknownShape {
            shape: name.to_owned(),
            target: name.to_owned(),
        })?;
        let (ty, class) = match &shape.kind {
            ShapeKind::Scalar(kind) => (RustType::scalar(*kind), SymbolClass::Scalar(*kind)),
            ShapeKind::Struct(_) => (RustType::Named(type_name(name)), SymbolClass::Struct),
            ShapeKind::Union(_) => (RustType::Named(type_name(name)), SymbolClass::Union),
            ShapeKind::Enum(_) => (RustType::Named(type_name(name)), SymbolClass::Enum),
            ShapeKind::List { member } => {
                self.enter(name)?;
                let item = self.reference(&member.target);
                self.active.pop();
                (RustType::Vec(Box::new(item?.ty)), SymbolClass::Collection)
            }
            ShapeKind::Map { key, value } => {
                self.enter(name)?;
                let entry = self
                    .reference(&key.target)
                    .and_then(|k| Ok((k, self.reference(&value.target)?)));
                self.active.pop();
                let (key, value) = entry?;
                (
                    RustType::HashMap(Box::new(key.ty), Box::new(value.ty)),
                    SymbolClass::Collection,
                )
            }
        };
        let symbol = TypeSymbol {
            ty,
            class,
            is_boxed: false,
        };
        self.done.insert(name.to_owned(), symbol.clone());
        Ok(symbol)
    }

    fn enter(&mut self, name: &'m str) -> Result<(), GenError> {
        if self.active.contains(&name) {
            return Err(GenError::AnonymousCycle {
                shape: name.to_owned(),
            });
        }
        self.active.push(name);
        Ok(())
    }

    fn reference(&mut self, target: &'m ShapeRef) -> Result<TypeSymbol, GenError> {
        let symbol = self.shape(&target.target)?;
        Ok(boxed(symbol, target.indirect))
    }
}

fn boxed(symbol: TypeSymbol, indirect: bool) -> TypeSymbol {
    if !indirect {
        return symbol;
    }
    TypeSymbol {
        ty: RustType::Boxed(Box::new(symbol.ty)),
        is_boxed: true,
        ..symbol
    }
}

impl SymbolTable {
    /// Fails on references to unknown shapes and on cycles that pass through
    /// lists and maps only.
    pub fn resolve(model: &Model) -> Result<SymbolTable, GenError> {
        for shape in model.shapes.values() {
            for (_, target) in shape.refs() {
                if model.shape(&target.target).is_none() {
                    return Err(GenError::UnknownShape {
                        shape: shape.name.clone(),
                        target: target.target.clone(),
                    });
                }
            }
        }
        let mut resolver = Resolver {
            model,
            done: HashMap::new(),
            active: vec![],
        };
        for name in model.shapes.keys() {
            resolver.shape(name)?;
        }
        Ok(SymbolTable {
            symbols: resolver.done,
        })
    }

    pub fn shape(&self, name: &str) -> Option<&TypeSymbol> {
        self.symbols.get(name)
    }

    /// The type of a reference: the target's type, boxed when the reference
    /// is indirect.
    pub fn for_ref(&self, target: &ShapeRef) -> Option<TypeSymbol> {
        self.shape(&target.target)
            .map(|symbol| boxed(symbol.clone(), target.indirect))
    }
}
