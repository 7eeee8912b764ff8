//! @ai:module:intent Best one-to-one pairing of expected and actual list elements
//! @ai:module:layer domain
//! @ai:module:public_api Pairing, best_pairing, pairing_score
//! @ai:module:stateless true

use crate::comparator::{Comparator, FieldComparators};
use serde_json::Value;

/// @ai:intent Outcome of matching expected elements to actual elements
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pairing {
    /// `(expected index, actual index)` in ascending expected order
    pub pairs: Vec<(usize, usize)>,
    pub unmatched_expected: Vec<usize>,
    pub unmatched_actual: Vec<usize>,
    /// Sum of pair scores
    pub score: i64,
}

impl Pairing {
    /// @ai:intent Actual index paired with an expected index
    /// @ai:effects pure
    pub fn actual_for(&self, expected: usize) -> Option<usize> {
        self.pairs
            .iter()
            .find(|(e, _)| *e == expected)
            .map(|(_, a)| *a)
    }
}

/// @ai:intent Count deterministic leaves of an element comparator map that pass for a pair
///
/// LLM leaves contribute nothing, so pairing never spends on model calls.
/// @ai:effects pure
pub fn pairing_score(element: &FieldComparators, expected: &Value, actual: &Value) -> i64 {
    let (Value::Object(e), Value::Object(a)) = (expected, actual) else {
        return 0;
    };

    element
        .iter()
        .filter_map(|(key, spec)| Some((spec, e.get(key)?, a.get(key)?)))
        .map(|(spec, e, a)| spec_score(spec, e, a))
        .sum()
}

/// @ai:intent Deterministic pass count for any comparator shape
/// @ai:effects pure
fn spec_score(spec: &Comparator, expected: &Value, actual: &Value) -> i64 {
    match spec {
        Comparator::Fields(map) => pairing_score(map, expected, actual),
        Comparator::Unordered(map) => match (expected, actual) {
            (Value::Array(e), Value::Array(a)) => {
                let scores = score_matrix(map, e, a);
                best_pairing(&scores, e.len(), a.len()).score
            }
            _ => 0,
        },
        leaf => leaf
            .compare_deterministic(expected, actual)
            .map(|verdict| i64::from(verdict.passed))
            .unwrap_or(0),
    }
}

/// @ai:intent Score every (expected, actual) element pair
/// @ai:effects pure
pub fn score_matrix(element: &FieldComparators, expected: &[Value], actual: &[Value]) -> Vec<Vec<i64>> {
    expected
        .iter()
        .map(|e| actual.iter().map(|a| pairing_score(element, e, a)).collect())
        .collect()
}

/// @ai:intent Find the pairing with the highest total score
///
/// Exact optimum via the Hungarian algorithm on a square matrix padded with
/// zero-score "unmatched" slots. Among optimal pairings, expected element `i`
/// (in ascending order) takes the lowest-index actual element that still
/// admits an optimal completion, and prefers any real element over staying
/// unmatched.
/// @ai:pre scores is n x m with non-negative entries
/// @ai:effects pure
pub fn best_pairing(scores: &[Vec<i64>], n: usize, m: usize) -> Pairing {
    if n == 0 || m == 0 {
        return Pairing {
            pairs: Vec::new(),
            unmatched_expected: (0..n).collect(),
            unmatched_actual: (0..m).collect(),
            score: 0,
        };
    }

    let size = n.max(m);
    let padded: Vec<Vec<i64>> = (0..size)
        .map(|i| {
            (0..size)
                .map(|j| if i < n && j < m { scores[i][j] } else { 0 })
                .collect()
        })
        .collect();

    let optimum = max_assignment(&padded, &(0..size).collect::<Vec<_>>(), &(0..size).collect::<Vec<_>>());

    let mut free_cols: Vec<usize> = (0..size).collect();
    let mut fixed_score = 0;
    let mut assignment = vec![usize::MAX; n];

    for (i, slot) in assignment.iter_mut().enumerate() {
        let rest_rows: Vec<usize> = (i + 1..size).collect();
        let mut tried_padding = false;

        for (pos, &j) in free_cols.iter().enumerate() {
            // padding columns are interchangeable, one probe is enough
            if j >= m {
                if tried_padding {
                    continue;
                }
                tried_padding = true;
            }

            let rest_cols: Vec<usize> = free_cols
                .iter()
                .enumerate()
                .filter(|(p, _)| *p != pos)
                .map(|(_, c)| *c)
                .collect();

            let candidate = fixed_score + padded[i][j] + max_assignment(&padded, &rest_rows, &rest_cols);
            if candidate == optimum {
                *slot = j;
                fixed_score += padded[i][j];
                break;
            }
        }

        free_cols.retain(|c| *c != *slot);
    }

    let mut pairs = Vec::new();
    let mut unmatched_expected = Vec::new();
    for (i, &j) in assignment.iter().enumerate() {
        if j < m {
            pairs.push((i, j));
        } else {
            unmatched_expected.push(i);
        }
    }

    let mut unmatched_actual: Vec<usize> = free_cols.into_iter().filter(|j| *j < m).collect();
    unmatched_actual.sort_unstable();

    Pairing {
        pairs,
        unmatched_expected,
        unmatched_actual,
        score: optimum,
    }
}

/// @ai:intent Maximum-weight perfect assignment of the given rows to the given columns
/// @ai:pre rows.len() <= cols.len()
/// @ai:effects pure
fn max_assignment(weights: &[Vec<i64>], rows: &[usize], cols: &[usize]) -> i64 {
    if rows.is_empty() {
        return 0;
    }

    let max_weight = rows
        .iter()
        .flat_map(|&r| cols.iter().map(move |&c| weights[r][c]))
        .max()
        .unwrap_or(0);

    // convert to a minimization problem over non-negative costs
    let cost = |r: usize, c: usize| max_weight - weights[rows[r]][cols[c]];
    let assignment = hungarian(rows.len(), cols.len(), cost);

    assignment
        .iter()
        .enumerate()
        .map(|(r, &c)| weights[rows[r]][cols[c]])
        .sum()
}

/// @ai:intent Minimum-cost assignment of n rows to m columns (n <= m), O(n^2 m)
/// @ai:post result[r] is the column assigned to row r
/// @ai:effects pure
fn hungarian(n: usize, m: usize, cost: impl Fn(usize, usize) -> i64) -> Vec<usize> {
    const INF: i64 = i64::MAX / 4;

    // 1-based potentials; column 0 is the virtual start column
    let mut u = vec![0i64; n + 1];
    let mut v = vec![0i64; m + 1];
    let mut p = vec![0usize; m + 1];
    let mut way = vec![0usize; m + 1];

    for i in 1..=n {
        p[0] = i;
        let mut j0 = 0usize;
        let mut minv = vec![INF; m + 1];
        let mut used = vec![false; m + 1];

        loop {
            used[j0] = true;
            let i0 = p[j0];
            let mut delta = INF;
            let mut j1 = 0usize;

            for j in 1..=m {
                if used[j] {
                    continue;
                }
                let cur = cost(i0 - 1, j - 1) - u[i0] - v[j];
                if cur < minv[j] {
                    minv[j] = cur;
                    way[j] = j0;
                }
                if minv[j] < delta {
                    delta = minv[j];
                    j1 = j;
                }
            }

            for j in 0..=m {
                if used[j] {
                    u[p[j]] += delta;
                    v[j] -= delta;
                } else {
                    minv[j] -= delta;
                }
            }

            j0 = j1;
            if p[j0] == 0 {
                break;
            }
        }

        loop {
            let j1 = way[j0];
            p[j0] = p[j1];
            j0 = j1;
            if j0 == 0 {
                break;
            }
        }
    }

    let mut assignment = vec![0usize; n];
    for j in 1..=m {
        if p[j] != 0 {
            assignment[p[j] - 1] = j - 1;
        }
    }
    assignment
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn line_item_spec() -> FieldComparators {
        [
            ("id".to_string(), Comparator::Exact),
            ("a".to_string(), Comparator::Name),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_identity_pairing() {
        let scores = vec![vec![2, 0], vec![0, 2]];
        let pairing = best_pairing(&scores, 2, 2);
        assert_eq!(pairing.pairs, vec![(0, 0), (1, 1)]);
        assert_eq!(pairing.score, 4);
        assert!(pairing.unmatched_expected.is_empty());
        assert!(pairing.unmatched_actual.is_empty());
    }

    #[test]
    fn test_permuted_pairing() {
        let scores = vec![vec![0, 0, 2], vec![2, 0, 0], vec![0, 2, 0]];
        let pairing = best_pairing(&scores, 3, 3);
        assert_eq!(pairing.pairs, vec![(0, 2), (1, 0), (2, 1)]);
        assert_eq!(pairing.score, 6);
    }

    #[test]
    fn test_optimal_beats_greedy() {
        // greedy would give expected 0 the 3-point actual 0 and leave 1 with nothing
        let scores = vec![vec![3, 2], vec![3, 0]];
        let pairing = best_pairing(&scores, 2, 2);
        assert_eq!(pairing.pairs, vec![(0, 1), (1, 0)]);
        assert_eq!(pairing.score, 5);
    }

    #[test]
    fn test_ties_prefer_lowest_actual_index() {
        let scores = vec![vec![1, 1, 1], vec![1, 1, 1]];
        let pairing = best_pairing(&scores, 2, 3);
        assert_eq!(pairing.pairs, vec![(0, 0), (1, 1)]);
        assert_eq!(pairing.unmatched_actual, vec![2]);
    }

    #[test]
    fn test_surplus_expected_left_unmatched() {
        let scores = vec![vec![0], vec![2], vec![1]];
        let pairing = best_pairing(&scores, 3, 1);
        assert_eq!(pairing.pairs, vec![(1, 0)]);
        assert_eq!(pairing.unmatched_expected, vec![0, 2]);
        assert_eq!(pairing.actual_for(1), Some(0));
        assert_eq!(pairing.actual_for(0), None);
    }

    #[test]
    fn test_zero_scores_still_pair_real_elements() {
        let scores = vec![vec![0, 0], vec![0, 0], vec![0, 0]];
        let pairing = best_pairing(&scores, 3, 2);
        assert_eq!(pairing.pairs, vec![(0, 0), (1, 1)]);
        assert_eq!(pairing.unmatched_expected, vec![2]);
    }

    #[test]
    fn test_empty_sides() {
        let pairing = best_pairing(&[], 0, 2);
        assert_eq!(pairing.unmatched_actual, vec![0, 1]);

        let pairing = best_pairing(&[vec![], vec![]], 2, 0);
        assert_eq!(pairing.unmatched_expected, vec![0, 1]);
    }

    #[test]
    fn test_matching_element_found_in_larger_set() {
        let spec = line_item_spec();
        let expected = vec![json!({"id": 1, "a": "x"})];
        let actual = vec![
            json!({"id": 3, "a": "z"}),
            json!({"id": 2, "a": "y"}),
            json!({"id": 1, "a": "X"}),
        ];

        let scores = score_matrix(&spec, &expected, &actual);
        assert_eq!(scores, vec![vec![0, 0, 2]]);

        let pairing = best_pairing(&scores, 1, 3);
        assert_eq!(pairing.pairs, vec![(0, 2)]);
        assert_eq!(pairing.unmatched_actual, vec![0, 1]);
    }

    #[test]
    fn test_pairing_score_skips_llm_and_missing_keys() {
        let spec: FieldComparators = [
            ("sku".to_string(), Comparator::Exact),
            ("description".to_string(), Comparator::Llm(Default::default())),
            ("qty".to_string(), Comparator::numeric()),
        ]
        .into_iter()
        .collect();

        let score = pairing_score(
            &spec,
            &json!({"sku": "A1", "description": "bolt", "qty": 2}),
            &json!({"sku": "A1", "description": "screw"}),
        );
        assert_eq!(score, 1);
        assert_eq!(pairing_score(&spec, &json!({"sku": "A1"}), &json!("A1")), 0);
    }

    #[test]
    fn test_nested_unordered_scores_best_inner_pairing() {
        let inner: FieldComparators = [("tag".to_string(), Comparator::Exact)].into_iter().collect();
        let spec: FieldComparators = [("tags".to_string(), Comparator::Unordered(inner))]
            .into_iter()
            .collect();

        let score = pairing_score(
            &spec,
            &json!({"tags": [{"tag": "a"}, {"tag": "b"}]}),
            &json!({"tags": [{"tag": "b"}, {"tag": "a"}, {"tag": "c"}]}),
        );
        assert_eq!(score, 2);
    }
}
