use std::sync::Arc;

use uuid::Uuid;

/// Fresh opaque identifier. Seeded rows use fixed, non-UUID ids, so the two
/// spaces never overlap.
pub fn new_id() -> Arc<str> {
    Arc::from(Uuid::new_v4().to_string().as_str())
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::schema::{default_rows, Table};

    #[test]
    fn test_ids_are_unique_and_disjoint_from_seeds() {
        let seeded: HashSet<String> = Table::ALL
            .into_iter()
            .flat_map(default_rows)
            .filter_map(|r| r.text("id").map(str::to_string))
            .collect();

        let mut seen = HashSet::new();
        for _ in 0..1000 {
            let id = new_id();
            assert!(!seeded.contains(id.as_ref()));
            assert!(seen.insert(id));
        }
    }
}
