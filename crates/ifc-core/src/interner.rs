//! Append-only string interner (spec §4.1).
//!
//! The empty string always interns to id 0. `get` on an unknown id returns
//! `""` rather than panicking, matching the Entity Store's "never throws"
//! lookup contract (spec §4.2).

use indexmap::IndexSet;

#[derive(Debug, Default)]
pub struct Interner {
    strings: IndexSet<String>,
    frozen: bool,
}

impl Interner {
    pub fn new() -> Self {
        let mut strings = IndexSet::new();
        strings.insert(String::new());
        Self {
            strings,
            frozen: false,
        }
    }

    /// Insert (or look up) a string, returning a dense, monotonically
    /// assigned id. Ids are stable for the lifetime of the interner.
    pub fn intern(&mut self, s: &str) -> u32 {
        if s.is_empty() {
            return 0;
        }
        if let Some(idx) = self.strings.get_index_of(s) {
            return idx as u32;
        }
        debug_assert!(!self.frozen, "interned a new string after freeze: {s:?}");
        let (idx, _) = self.strings.insert_full(s.to_string());
        idx as u32
    }

    pub fn get(&self, id: u32) -> &str {
        self.strings
            .get_index(id as usize)
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.len() <= 1
    }

    /// Called once parsing finishes; further `intern` calls on new strings
    /// are a logic error in debug builds (spec §4.1: "frozen afterward").
    pub fn freeze(&mut self) {
        self.frozen = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_is_reserved_id_zero() {
        let mut interner = Interner::new();
        assert_eq!(interner.intern(""), 0);
        assert_eq!(interner.get(0), "");
    }

    #[test]
    fn unknown_id_returns_empty_string() {
        let interner = Interner::new();
        assert_eq!(interner.get(999), "");
    }

    #[test]
    fn ids_are_dense_and_insertion_ordered() {
        let mut interner = Interner::new();
        let a = interner.intern("IFCWALL");
        let b = interner.intern("IFCSLAB");
        let a2 = interner.intern("IFCWALL");
        assert_eq!(a, a2, "repeated intern returns the same id");
        assert_ne!(a, b);
        assert_eq!(interner.get(a), "IFCWALL");
        assert_eq!(interner.get(b), "IFCSLAB");
    }
}
