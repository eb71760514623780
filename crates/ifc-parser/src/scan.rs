//! Entity statement boundary scanning for Phase B: locate each
//! `#N=TYPE(args);` statement in the DATA section without getting confused
//! by `;` or `#` appearing inside string literals.

use memchr::memchr3;

pub struct EntityStatement<'a> {
    pub express_id: u32,
    pub type_name: &'a str,
    /// Byte offset/length of the `(args);` slice, args included, trailing
    /// `;` excluded — this is what `EntityRecord.byteOffset/byteLength`
    /// stores for lazy decoding (spec §4.2, §9 "Byte-offset references").
    pub args_offset: usize,
    pub args_len: usize,
}

/// Iterates entity statements in `data`, a DATA-section byte slice.
/// Malformed statements are skipped (Phase B malformed-entity handling is
/// the caller's job: this iterator only reports where a statement starts
/// and ends; the caller decides whether the internals parse).
pub struct EntityStatements<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> EntityStatements<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Scans forward from `start`, respecting string-literal quoting, to
    /// the offset of the next unquoted `;`. Returns `None` if the statement
    /// runs off the end of `data` (unterminated).
    fn find_statement_end(&self, start: usize) -> Option<usize> {
        let mut i = start;
        let mut in_string = false;
        loop {
            let rest = &self.data[i..];
            let hit = memchr3(b'\'', b';', b'\\', rest)?;
            let at = i + hit;
            match self.data[at] {
                b'\'' => {
                    // `''` inside a string is an escaped quote, not a close.
                    if in_string && self.data.get(at + 1) == Some(&b'\'') {
                        i = at + 2;
                        continue;
                    }
                    in_string = !in_string;
                    i = at + 1;
                }
                b';' if !in_string => return Some(at),
                _ => i = at + 1,
            }
        }
    }
}

impl<'a> Iterator for EntityStatements<'a> {
    type Item = EntityStatement<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            // Skip whitespace and anything until the next '#'.
            let hash = memchr::memchr(b'#', &self.data[self.pos..])? + self.pos;
            let digits_start = hash + 1;
            let mut i = digits_start;
            while self.data.get(i).is_some_and(u8::is_ascii_digit) {
                i += 1;
            }
            if i == digits_start {
                self.pos = hash + 1;
                continue;
            }
            let express_id: u32 = match std::str::from_utf8(&self.data[digits_start..i]).unwrap().parse() {
                Ok(v) => v,
                Err(_) => {
                    self.pos = i;
                    continue;
                }
            };

            let mut j = i;
            while self.data.get(j).is_some_and(|b| b.is_ascii_whitespace()) {
                j += 1;
            }
            if self.data.get(j) != Some(&b'=') {
                self.pos = i;
                continue;
            }
            j += 1;
            while self.data.get(j).is_some_and(|b| b.is_ascii_whitespace()) {
                j += 1;
            }
            let name_start = j;
            while self.data.get(j).is_some_and(|b| b.is_ascii_alphanumeric() || *b == b'_') {
                j += 1;
            }
            if j == name_start {
                self.pos = i;
                continue;
            }
            let type_name = std::str::from_utf8(&self.data[name_start..j]).unwrap_or("");

            let end = match self.find_statement_end(j) {
                Some(e) => e,
                None => {
                    self.pos = self.data.len();
                    return None;
                }
            };

            self.pos = end + 1;
            return Some(EntityStatement {
                express_id,
                type_name,
                args_offset: name_start + type_name.len(),
                args_len: end - (name_start + type_name.len()),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walks_multiple_entities() {
        let data = b"\n#1=IFCWALL('a',$,$);\n#2=IFCSLAB($,$,$);\n";
        let stmts: Vec<_> = EntityStatements::new(data).collect();
        assert_eq!(stmts.len(), 2);
        assert_eq!(stmts[0].express_id, 1);
        assert_eq!(stmts[0].type_name, "IFCWALL");
        assert_eq!(stmts[1].express_id, 2);
        assert_eq!(stmts[1].type_name, "IFCSLAB");
    }

    #[test]
    fn semicolon_inside_string_is_not_a_boundary() {
        let data = b"#1=IFCWALL('a;b',$);\n#2=IFCSLAB($);\n";
        let stmts: Vec<_> = EntityStatements::new(data).collect();
        assert_eq!(stmts.len(), 2);
        assert_eq!(stmts[1].express_id, 2);
    }

    #[test]
    fn hash_inside_string_is_not_a_reference() {
        let data = b"#1=IFCWALL('room #5',$);\n";
        let stmts: Vec<_> = EntityStatements::new(data).collect();
        assert_eq!(stmts.len(), 1);
        assert_eq!(stmts[0].express_id, 1);
    }
}
