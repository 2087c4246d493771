//! The identifier pool. An `Ident` is a pool-owned handle; identity equality
//! (handle equality) is value equality because the pool deduplicates on
//! insert. Lives for the whole compilation and is torn down with it.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Ident(u32);

impl Ident {
    pub fn index(self) -> u32 {
        self.0
    }

    /// Sentinel used where parsing failed to recover a name at all; never
    /// produced by [`IdentPool::intern`].
    pub fn error_placeholder() -> Ident {
        Ident(u32::MAX)
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Default)]
pub struct IdentPool {
    strings: Vec<Box<str>>,
    lookup: HashMap<Box<str>, Ident>,
}

impl IdentPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, text: &str) -> Ident {
        if let Some(id) = self.lookup.get(text) {
            return *id;
        }
        let id = Ident(self.strings.len() as u32);
        let boxed: Box<str> = text.into();
        self.strings.push(boxed.clone());
        self.lookup.insert(boxed, id);
        id
    }

    pub fn resolve(&self, ident: Ident) -> &str {
        &self.strings[ident.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_same_text_returns_same_handle() {
        let mut pool = IdentPool::new();
        let a = pool.intern("main");
        let b = pool.intern("main");
        assert_eq!(a, b);
        let c = pool.intern("other");
        assert_ne!(a, c);
        assert_eq!(pool.resolve(a), "main");
    }
}
