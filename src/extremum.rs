use std::cmp::Ordering;
use std::collections::HashMap;
use std::hash::Hash;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extremum {
    Max,
    Min,
}

/// Picks one row per group: the one that is greatest (or least) under
/// `compare`. Rows that compare equal keep the first one seen. Returned
/// indices are in original row order.
pub fn select_per_group<T, K, FK, FC>(
    rows: &[T],
    key: FK,
    extremum: Extremum,
    compare: FC,
) -> Vec<usize>
where
    K: Eq + Hash,
    FK: Fn(&T) -> K,
    FC: Fn(&T, &T) -> Ordering,
{
    let wanted = match extremum {
        Extremum::Max => Ordering::Greater,
        Extremum::Min => Ordering::Less,
    };

    let mut best: HashMap<K, usize> = HashMap::new();
    for (index, row) in rows.iter().enumerate() {
        best.entry(key(row))
            .and_modify(|current| {
                if compare(row, &rows[*current]) == wanted {
                    *current = index;
                }
            })
            .or_insert(index);
    }

    let mut selected: Vec<usize> = best.into_values().collect();
    selected.sort_unstable();
    selected
}
