// ABOUTME: Pure reordering helpers behind drag-and-drop positions
// ABOUTME: Computes the new order of a scope; storage writes the dense positions

use std::collections::HashSet;

use crate::validation::ValidationError;

/// Move `id` to `index` within `ids`. The index is clamped to the list.
/// Returns `None` when `id` is not in the list.
pub fn move_to_index(ids: &[String], id: &str, index: usize) -> Option<Vec<String>> {
    let from = ids.iter().position(|existing| existing == id)?;
    let mut reordered = ids.to_vec();
    let moved = reordered.remove(from);
    let index = index.min(reordered.len());
    reordered.insert(index, moved);
    Some(reordered)
}

/// Insert `id` at `index` (clamped), removing any earlier occurrence
pub fn insert_at(ids: &[String], id: &str, index: usize) -> Vec<String> {
    let mut reordered = remove(ids, id);
    let index = index.min(reordered.len());
    reordered.insert(index, id.to_string());
    reordered
}

pub fn remove(ids: &[String], id: &str) -> Vec<String> {
    ids.iter().filter(|existing| *existing != id).cloned().collect()
}

/// A reorder request must name every id of the scope exactly once
pub fn validate_permutation(current: &[String], proposed: &[String]) -> Result<(), ValidationError> {
    let mut seen = HashSet::with_capacity(proposed.len());
    for id in proposed {
        if !seen.insert(id.as_str()) {
            return Err(ValidationError::invalid(
                "ordered_ids",
                format!("duplicate id {}", id),
            ));
        }
    }

    let current_set: HashSet<&str> = current.iter().map(String::as_str).collect();
    if let Some(unknown) = proposed.iter().find(|id| !current_set.contains(id.as_str())) {
        return Err(ValidationError::invalid(
            "ordered_ids",
            format!("{} does not belong to this scope", unknown),
        ));
    }
    if proposed.len() != current.len() {
        return Err(ValidationError::invalid(
            "ordered_ids",
            format!("expected {} ids, got {}", current.len(), proposed.len()),
        ));
    }
    Ok(())
}

/// Dense positions for an ordered list, starting at zero
pub fn dense_positions(ids: &[String]) -> Vec<(String, i64)> {
    ids.iter()
        .enumerate()
        .map(|(index, id)| (id.clone(), index as i64))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_move_forward_and_back() {
        let list = ids(&["a", "b", "c", "d"]);
        assert_eq!(move_to_index(&list, "a", 2).unwrap(), ids(&["b", "c", "a", "d"]));
        assert_eq!(move_to_index(&list, "d", 0).unwrap(), ids(&["d", "a", "b", "c"]));
    }

    #[test]
    fn test_move_clamps_index() {
        let list = ids(&["a", "b", "c"]);
        assert_eq!(move_to_index(&list, "a", 99).unwrap(), ids(&["b", "c", "a"]));
    }

    #[test]
    fn test_move_unknown_id() {
        assert!(move_to_index(&ids(&["a"]), "z", 0).is_none());
    }

    #[test]
    fn test_insert_and_remove() {
        let list = ids(&["a", "b"]);
        assert_eq!(insert_at(&list, "x", 1), ids(&["a", "x", "b"]));
        assert_eq!(insert_at(&list, "b", 0), ids(&["b", "a"]));
        assert_eq!(remove(&list, "a"), ids(&["b"]));
    }

    #[test]
    fn test_validate_permutation() {
        let current = ids(&["a", "b", "c"]);
        assert!(validate_permutation(&current, &ids(&["c", "a", "b"])).is_ok());
        assert!(validate_permutation(&current, &ids(&["a", "b"])).is_err());
        assert!(validate_permutation(&current, &ids(&["a", "a", "b"])).is_err());
        assert!(validate_permutation(&current, &ids(&["a", "b", "z"])).is_err());
    }

    #[test]
    fn test_dense_positions() {
        assert_eq!(
            dense_positions(&ids(&["x", "y"])),
            vec![("x".to_string(), 0), ("y".to_string(), 1)]
        );
    }
}
