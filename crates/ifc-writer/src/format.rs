//! STEP (ISO-10303-21) value formatting: every number carries a decimal
//! point, strings are single-quoted with `''` escaping, references use
//! `#N` syntax (spec §4.7).

/// Format a real so it always carries a decimal point (`5` is written as
/// `5.`, never `5.0`), matching what the parser's tokenizer accepts back.
pub fn real(value: f64) -> String {
    let s = format!("{value}");
    if s.contains('.') || s.contains('e') || s.contains('E') {
        s
    } else {
        format!("{s}.")
    }
}

/// Single-quote a string, doubling embedded quotes per STEP escaping.
pub fn string(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

pub fn enum_lit(value: &str) -> String {
    format!(".{value}.")
}

pub fn reference(id: u32) -> String {
    format!("#{id}")
}

pub fn reference_list(ids: &[u32]) -> String {
    format!("({})", ids.iter().map(|id| reference(*id)).collect::<Vec<_>>().join(","))
}

pub fn point3(p: [f64; 3]) -> String {
    format!("({},{},{})", real(p[0]), real(p[1]), real(p[2]))
}

pub fn point2(p: [f64; 2]) -> String {
    format!("({},{})", real(p[0]), real(p[1]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integral_reals_get_a_trailing_dot() {
        assert_eq!(real(5.0), "5.");
        assert_eq!(real(-2.0), "-2.");
    }

    #[test]
    fn fractional_reals_pass_through() {
        assert_eq!(real(2.5), "2.5");
    }

    #[test]
    fn strings_escape_embedded_quotes() {
        assert_eq!(string("O'Brien"), "'O''Brien'");
    }

    #[test]
    fn reference_list_joins_hashes() {
        assert_eq!(reference_list(&[1, 2, 3]), "(#1,#2,#3)");
    }
}
