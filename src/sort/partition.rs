//! First-element pivot partitioning.

/// A sequence split around its pivot.
#[derive(Debug, PartialEq, Eq)]
pub struct Split<T> {
    /// Elements ordered before the pivot.
    pub lower: Vec<T>,
    /// The first element of the input.
    pub pivot: T,
    /// Elements not ordered before the pivot, ties included.
    pub higher: Vec<T>,
}

/// Reorders `v` so that every element satisfying `pred` comes first.
///
/// Returns the number of such elements. Relative order is not preserved.
pub fn partition_in_place<T>(v: &mut [T], mut pred: impl FnMut(&T) -> bool) -> usize {
    let mut first = 0;
    for i in 0..v.len() {
        if pred(&v[i]) {
            v.swap(first, i);
            first += 1;
        }
    }
    first
}

/// Takes the first element as pivot and partitions the remainder with `less`.
///
/// Returns `None` for an empty sequence.
pub fn split_at_pivot<T, F>(mut data: Vec<T>, less: &F) -> Option<Split<T>>
where
    F: Fn(&T, &T) -> bool,
{
    if data.is_empty() {
        return None;
    }
    let pivot = data.swap_remove(0);
    let mid = partition_in_place(&mut data, |x| less(x, &pivot));
    let higher = data.split_off(mid);
    Some(Split {
        lower: data,
        pivot,
        higher,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lt(a: &i32, b: &i32) -> bool {
        a < b
    }

    #[test]
    fn empty_has_no_split() {
        assert_eq!(split_at_pivot(Vec::<i32>::new(), &lt), None);
    }

    #[test]
    fn ties_go_high() {
        let split = split_at_pivot(vec![2, 2, 1, 3, 2], &lt).unwrap();
        assert_eq!(split.pivot, 2);
        assert_eq!(split.lower, vec![1]);
        let mut higher = split.higher;
        higher.sort_unstable();
        assert_eq!(higher, vec![2, 2, 3]);
    }

    #[test]
    fn single_element_is_just_the_pivot() {
        let split = split_at_pivot(vec![5], &lt).unwrap();
        assert_eq!(split, Split { lower: vec![], pivot: 5, higher: vec![] });
    }

    #[test]
    fn reverse_sorted_puts_everything_low() {
        let split = split_at_pivot((0..10).rev().collect(), &lt).unwrap();
        assert_eq!(split.pivot, 9);
        assert_eq!(split.lower.len(), 9);
        assert!(split.higher.is_empty());
    }

    #[test]
    fn partition_counts_matches() {
        let mut v = [5, 1, 4, 2, 3];
        let mid = partition_in_place(&mut v, |x| *x < 3);
        assert_eq!(mid, 2);
        assert!(v[..mid].iter().all(|x| *x < 3));
        assert!(v[mid..].iter().all(|x| *x >= 3));
    }
}
