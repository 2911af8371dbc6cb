//! Object id construction and parsing.
//!
//! Child ids extend their parent's id with `$<hex-ordinal>` (see spec Data
//! Model invariant 5), which makes "descendants of X" a simple glob and keeps
//! ids deterministic for a given filesystem scan order.

/// Build the id of the `ordinal`-th child of `parent_id`.
pub fn child_id(parent_id: &str, ordinal: u32) -> String {
    format!("{parent_id}${ordinal:X}")
}

/// The final `$<hex>` segment's ordinal, if `object_id` has one.
pub fn last_ordinal(object_id: &str) -> Option<u32> {
    let (_, last) = object_id.rsplit_once('$')?;
    u32::from_str_radix(last, 16).ok()
}

/// The glob pattern matching all descendants (but not `parent_id` itself).
pub fn descendants_glob(parent_id: &str) -> String {
    if parent_id == "0" {
        "*".to_string()
    } else {
        format!("{parent_id}$*")
    }
}

/// True if `candidate` is an immediate child of `parent_id` (one extra `$` segment).
pub fn is_immediate_child(parent_id: &str, candidate: &str) -> bool {
    match candidate.strip_prefix(parent_id) {
        Some(rest) => {
            let rest = match rest.strip_prefix('$') {
                Some(r) => r,
                None => return false,
            };
            !rest.contains('$')
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_id_is_hex() {
        assert_eq!(child_id("1$0", 10), "1$0$A");
        assert_eq!(child_id("0", 0), "0$0");
    }

    #[test]
    fn last_ordinal_parses_hex() {
        assert_eq!(last_ordinal("1$0$A"), Some(10));
        assert_eq!(last_ordinal("0"), None);
    }

    #[test]
    fn glob_root_is_wildcard() {
        assert_eq!(descendants_glob("0"), "*");
        assert_eq!(descendants_glob("1$0"), "1$0$*");
    }

    #[test]
    fn immediate_child_detection() {
        assert!(is_immediate_child("1$0", "1$0$5"));
        assert!(!is_immediate_child("1$0", "1$0$5$2"));
        assert!(!is_immediate_child("1$0", "1$1$5"));
    }
}
