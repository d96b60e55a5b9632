// Copyright (c) 2019 King's College London created by the Software Development Team
// <http://soft-dev.org/>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0>, or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, or the UPL-1.0 license <http://opensource.org/licenses/UPL>
// at your option. This file may not be copied, modified, or distributed except according to those
// terms.

//! Name resolution for one class. Two scopes: the class scope (`static` and
//! `field` entries, living as long as the class) and the subroutine scope
//! (`argument` and `var` entries, reset per subroutine). Indices are dense
//! per kind, assigned in declaration order; lookups try the subroutine scope
//! first, so its names shadow class-scope names.

use indexmap::IndexMap;
use smartstring::alias::String as SmartString;

use crate::compiler::emitter::Segment;
use crate::compiler::error::{CompileError, CompileErrorKind, CompileResult};

/// The storage classification of an identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Kind {
    Static,
    Field,
    Arg,
    Var,
}

impl Kind {
    /// The VM segment variables of this kind live in.
    pub fn segment(self) -> Segment {
        match self {
            Kind::Static => Segment::Static,
            Kind::Field => Segment::This,
            Kind::Arg => Segment::Argument,
            Kind::Var => Segment::Local,
        }
    }

    fn idx(self) -> usize {
        self as usize
    }
}

#[derive(Clone, Debug)]
pub struct Entry {
    pub name: SmartString,
    pub ty: SmartString,
    pub kind: Kind,
    pub index: u16,
}

pub struct SymbolTable {
    class_scope: IndexMap<SmartString, Entry>,
    sub_scope: IndexMap<SmartString, Entry>,
    counts: [u16; 4],
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable {
            class_scope: IndexMap::new(),
            sub_scope: IndexMap::new(),
            counts: [0; 4],
        }
    }

    /// Begin a new subroutine: clears the `argument` and `var` entries and
    /// resets their index counters.
    pub fn start_subroutine(&mut self) {
        self.sub_scope.clear();
        self.counts[Kind::Arg.idx()] = 0;
        self.counts[Kind::Var.idx()] = 0;
    }

    /// Insert `name` into the scope implied by `kind`, assigning it the next
    /// free index for that kind.
    pub fn define(&mut self, name: &str, ty: &str, kind: Kind) -> CompileResult<()> {
        let scope = match kind {
            Kind::Static | Kind::Field => &mut self.class_scope,
            Kind::Arg | Kind::Var => &mut self.sub_scope,
        };
        if scope.contains_key(name) {
            return Err(CompileError::new(CompileErrorKind::Redefinition(
                name.to_owned(),
            )));
        }
        let index = self.counts[kind.idx()];
        scope.insert(
            SmartString::from(name),
            Entry {
                name: SmartString::from(name),
                ty: SmartString::from(ty),
                kind,
                index,
            },
        );
        self.counts[kind.idx()] += 1;
        Ok(())
    }

    /// How many variables of `kind` the current scope holds.
    pub fn var_count(&self, kind: Kind) -> u16 {
        self.counts[kind.idx()]
    }

    /// The entry for `name`, if any; the subroutine scope shadows the class
    /// scope.
    pub fn lookup(&self, name: &str) -> Option<&Entry> {
        self.sub_scope
            .get(name)
            .or_else(|| self.class_scope.get(name))
    }

    pub fn kind_of(&self, name: &str) -> Option<Kind> {
        self.lookup(name).map(|e| e.kind)
    }

    pub fn type_of(&self, name: &str) -> Option<&str> {
        self.lookup(name).map(|e| &*e.ty)
    }

    pub fn index_of(&self, name: &str) -> Option<u16> {
        self.lookup(name).map(|e| e.index)
    }
}
