use std::collections::HashSet;
use std::hash::Hash;

pub mod logging;
pub mod retry;

/// Drops repeated values, keeping the first occurrence of each in order.
pub fn remove_duplicates<T>(values: Vec<T>) -> Vec<T>
where
    T: Eq + Hash + Clone,
{
    let mut seen = HashSet::with_capacity(values.len());
    values.into_iter().filter(|value| seen.insert(value.clone())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remove_duplicates_keeps_first_order() {
        let values = vec!["b", "a", "b", "c", "a"];
        assert_eq!(remove_duplicates(values), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_remove_duplicates_empty() {
        assert!(remove_duplicates(Vec::<String>::new()).is_empty());
    }
}
