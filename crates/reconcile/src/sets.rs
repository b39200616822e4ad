//! Set helpers over qualifier lists
//!
//! Qualifiers are stored as ordered lists but compared as sets.

use std::collections::HashSet;

/// The qualifier meaning "everything" (e.g. all columns)
pub const WILDCARD: &str = "*";

/// Whether a qualifier list covers everything
pub fn is_wildcard(qualifiers: &[String]) -> bool {
    qualifiers.iter().any(|q| q == WILDCARD)
}

/// Equality ignoring order and duplicates
pub fn set_equal(a: &[String], b: &[String]) -> bool {
    let a: HashSet<&str> = a.iter().map(String::as_str).collect();
    let b: HashSet<&str> = b.iter().map(String::as_str).collect();
    a == b
}

/// Elements of `a` absent from `b`, in first-occurrence order of `a`, without duplicates
pub fn set_difference(a: &[String], b: &[String]) -> Vec<String> {
    let exclude: HashSet<&str> = b.iter().map(String::as_str).collect();
    let mut seen = HashSet::new();

    a.iter()
        .filter(|item| !exclude.contains(item.as_str()) && seen.insert(item.as_str()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_set_equal_ignores_order_and_duplicates() {
        assert!(set_equal(&v(&["a", "b"]), &v(&["b", "a"])));
        assert!(set_equal(&v(&["a", "a", "b"]), &v(&["b", "a"])));
        assert!(set_equal(&v(&[]), &v(&[])));
        assert!(!set_equal(&v(&["a"]), &v(&["a", "b"])));
    }

    #[test]
    fn test_set_difference() {
        assert_eq!(set_difference(&v(&["a", "b", "c"]), &v(&["b"])), v(&["a", "c"]));
        assert_eq!(set_difference(&v(&["a", "b"]), &v(&["a", "b", "c"])), v(&[]));
        assert_eq!(set_difference(&v(&["c", "a", "c"]), &v(&[])), v(&["c", "a"]));
    }

    #[test]
    fn test_is_wildcard() {
        assert!(is_wildcard(&v(&["*"])));
        assert!(is_wildcard(&v(&["id", "*"])));
        assert!(!is_wildcard(&v(&["id"])));
        assert!(!is_wildcard(&v(&[])));
    }
}
