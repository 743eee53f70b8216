//! Majority reconciliation over replica responses.
//!
//! Replicas answer every call independently. The coordinator votes on the
//! answers: the value returned by the most members wins, and every member that
//! answered something else is reported as the minority so it can be resynced.
//!
//! # Tie-break
//!
//! When two or more distinct values share the highest count, the value that
//! appears first in enumeration order wins. Callers enumerate responses in a
//! stable member order, so the choice is deterministic for a given response
//! set.

/// Winning value of a vote and the members that disagreed with it.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled<A, T> {
    /// The majority (or tie-break) value.
    pub value: T,
    /// Members whose response differs from `value`, in enumeration order.
    pub minority: Vec<A>,
    /// True if every response was equal.
    pub unanimous: bool,
}

/// Vote on `responses`.
///
/// Returns `None` if there are no responses. Values are compared with
/// `PartialEq` only, so response types need not be hashable or ordered.
pub fn compare_responses<A, T: PartialEq>(responses: Vec<(A, T)>) -> Option<Reconciled<A, T>> {
    // (index of first occurrence, count) per distinct value
    let mut tally: Vec<(usize, usize)> = Vec::new();
    for (i, (_, value)) in responses.iter().enumerate() {
        match tally.iter_mut().find(|(first, _)| responses[*first].1 == *value) {
            Some((_, count)) => *count += 1,
            None => tally.push((i, 1)),
        }
    }

    let mut winner = *tally.first()?;
    for &candidate in &tally[1..] {
        if candidate.1 > winner.1 {
            winner = candidate;
        }
    }

    let unanimous = tally.len() == 1;
    let mut value = None;
    let mut minority = Vec::new();
    for (i, (member, response)) in responses.into_iter().enumerate() {
        // Anything before the winner's first occurrence is a different value.
        if i == winner.0 {
            value = Some(response);
        } else if value.as_ref().is_none_or(|v| *v != response) {
            minority.push(member);
        }
    }

    value.map(|value| Reconciled { value, minority, unanimous })
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn empty_has_no_winner() {
        assert_eq!(compare_responses::<u8, &str>(Vec::new()), None);
    }

    #[test]
    fn unanimous_responses() {
        let result = compare_responses(vec![(1, "A"), (2, "A"), (3, "A")]).unwrap();
        assert_eq!(result, Reconciled { value: "A", minority: vec![], unanimous: true });
    }

    #[test]
    fn majority_wins_and_dissenter_is_minority() {
        let result = compare_responses(vec![(1, "A"), (2, "B"), (3, "A")]).unwrap();
        assert_eq!(result, Reconciled { value: "A", minority: vec![2], unanimous: false });
    }

    #[test]
    fn majority_after_a_dissenter() {
        let result = compare_responses(vec![(1, "B"), (2, "A"), (3, "A")]).unwrap();
        assert_eq!(result.value, "A");
        assert_eq!(result.minority, vec![1]);
    }

    #[test]
    fn all_distinct_picks_first_seen() {
        let result = compare_responses(vec![(1, "A"), (2, "B"), (3, "C")]).unwrap();
        assert_eq!(result, Reconciled { value: "A", minority: vec![2, 3], unanimous: false });
    }

    #[test]
    fn tie_picks_first_seen() {
        let result = compare_responses(vec![(1, "B"), (2, "A"), (3, "A"), (4, "B")]).unwrap();
        assert_eq!(result.value, "B");
        assert_eq!(result.minority, vec![2, 3]);
    }

    #[test]
    fn single_response_is_unanimous() {
        let result = compare_responses(vec![("replica-1", 7)]).unwrap();
        assert!(result.unanimous);
        assert!(result.minority.is_empty());
    }

    proptest! {
        #[test]
        fn winner_count_is_maximal(values in prop::collection::vec(0u8..4, 1..12)) {
            let responses: Vec<_> = values.iter().copied().enumerate().collect();
            let result = compare_responses(responses).unwrap();

            let count = |v: u8| values.iter().filter(|&&x| x == v).count();
            let best = values.iter().map(|&v| count(v)).max().unwrap();
            prop_assert_eq!(count(result.value), best);

            // The winner is the first value to reach the best count.
            let first = values.iter().copied().find(|&v| count(v) == best).unwrap();
            prop_assert_eq!(result.value, first);

            // Minority is exactly the dissenting members.
            let expected: Vec<usize> = values
                .iter()
                .enumerate()
                .filter(|&(_, &v)| v != result.value)
                .map(|(i, _)| i)
                .collect();
            prop_assert_eq!(result.minority, expected);
        }
    }
}
