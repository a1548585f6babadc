//! Three-way merge of JSON documents.
//!
//! Every leaf path present in any of `base`, `local` and `upstream` is
//! compared against `base`:
//!
//! | local changed | upstream changed | result                          |
//! |---------------|------------------|---------------------------------|
//! | no            | no               | keep                            |
//! | no            | yes              | take upstream                   |
//! | yes           | no               | keep local                      |
//! | yes           | yes, same value  | keep (auto-merged)              |
//! | yes           | yes, different   | conflict, local kept for now    |
//!
//! Arrays are compared index by index, so two sides appending different
//! elements at the same index conflict.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::path::{JsonPath, is_branch, leaf_paths};

/// Which side wins when resolving conflicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeStrategy {
    Local,
    Upstream,
}

/// Both sides changed `path` to different values. `None` means absent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Conflict {
    pub path: JsonPath,
    pub base: Option<Value>,
    pub local: Option<Value>,
    pub upstream: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergeResult {
    /// `false` while unresolved conflicts remain.
    pub success: bool,
    pub conflicts: Vec<Conflict>,
    pub merged: Value,
    /// Set once conflicts were resolved programmatically.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<MergeStrategy>,
}

/// Merge `upstream`'s changes since `base` into `local`.
pub fn perform_merge(base: &Value, local: &Value, upstream: &Value) -> MergeResult {
    let mut paths = leaf_paths(base);
    paths.extend(leaf_paths(local));
    paths.extend(leaf_paths(upstream));

    let mut merged = local.clone();
    let mut conflicts = Vec::new();
    let mut removals = Vec::new();

    for path in paths {
        let b = path.get(base);
        let l = path.get(local);
        let u = path.get(upstream);

        let local_changed = b != l;
        let upstream_changed = b != u;

        match (local_changed, upstream_changed) {
            (_, false) => {}
            (false, true) => match u {
                Some(value) => path.set(&mut merged, value.clone()),
                None => removals.push(path),
            },
            (true, true) if l == u => {}
            (true, true) => {
                // containers on both sides are settled by their own leaves
                if l.is_some_and(is_branch) && u.is_some_and(is_branch) {
                    continue;
                }
                conflicts.push(Conflict {
                    path,
                    base: b.cloned(),
                    local: l.cloned(),
                    upstream: u.cloned(),
                });
            }
        }
    }

    apply_removals(&mut merged, removals);

    MergeResult {
        success: conflicts.is_empty(),
        conflicts,
        merged,
        strategy: None,
    }
}

/// Overwrite every conflicting path with the side chosen by `strategy`.
///
/// Conflicts stay listed for reporting; `success` becomes `true`.
pub fn resolve_conflicts(mut result: MergeResult, strategy: MergeStrategy) -> MergeResult {
    let mut removals = Vec::new();

    for conflict in &result.conflicts {
        let chosen = match strategy {
            MergeStrategy::Local => &conflict.local,
            MergeStrategy::Upstream => &conflict.upstream,
        };
        match chosen {
            Some(value) => conflict.path.set(&mut result.merged, value.clone()),
            None => removals.push(conflict.path.clone()),
        }
    }

    apply_removals(&mut result.merged, removals);
    result.success = true;
    result.strategy = Some(strategy);
    result
}

/// Remove paths deepest and highest-index first so earlier removals do not
/// shift later ones.
fn apply_removals(target: &mut Value, mut removals: Vec<JsonPath>) {
    removals.sort();
    for path in removals.iter().rev() {
        path.remove(target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn description_conflict() {
        let result = perform_merge(
            &json!({"description": "Original"}),
            &json!({"description": "Local"}),
            &json!({"description": "Upstream"}),
        );

        assert!(!result.success);
        assert_eq!(result.conflicts.len(), 1);
        let conflict = &result.conflicts[0];
        assert_eq!(conflict.path.to_string(), "description");
        assert_eq!(conflict.base, Some(json!("Original")));
        assert_eq!(conflict.local, Some(json!("Local")));
        assert_eq!(conflict.upstream, Some(json!("Upstream")));
        assert_eq!(result.merged["description"], "Local");
    }

    #[test]
    fn non_overlapping_changes_merge_cleanly() {
        let base = json!({"name": "t", "version": "1.0.0", "config": {"a": 1, "b": 2}});
        let local = json!({"name": "my-t", "version": "1.0.0", "config": {"a": 1, "b": 3}});
        let upstream = json!({"name": "t", "version": "1.1.0", "config": {"a": 5, "b": 2, "c": 9}});

        let result = perform_merge(&base, &local, &upstream);
        assert!(result.success);
        assert_eq!(
            result.merged,
            json!({"name": "my-t", "version": "1.1.0", "config": {"a": 5, "b": 3, "c": 9}})
        );
    }

    #[test]
    fn upstream_removal_applies() {
        let base = json!({"tags": ["a", "b", "c"], "old": true});
        let local = base.clone();
        let upstream = json!({"tags": ["a"]});

        let result = perform_merge(&base, &local, &upstream);
        assert!(result.success);
        assert_eq!(result.merged, json!({"tags": ["a"]}));
    }

    #[test]
    fn appends_at_same_index_conflict() {
        let base = json!({"tags": ["a"]});
        let result = perform_merge(&base, &json!({"tags": ["a", "x"]}), &json!({"tags": ["a", "y"]}));
        assert!(!result.success);
        assert_eq!(result.conflicts[0].path.to_string(), "tags[1]");
    }

    #[test]
    fn resolve_with_each_strategy() {
        let base = json!({"d": "Original", "gone": 1});
        let local = json!({"d": "Local"});
        let upstream = json!({"d": "Upstream", "gone": 2});

        let result = perform_merge(&base, &local, &upstream);
        assert_eq!(result.conflicts.len(), 2);

        let upstream_wins = resolve_conflicts(result.clone(), MergeStrategy::Upstream);
        assert!(upstream_wins.success);
        assert_eq!(upstream_wins.merged, json!({"d": "Upstream", "gone": 2}));

        let local_wins = resolve_conflicts(result, MergeStrategy::Local);
        assert_eq!(local_wins.merged, json!({"d": "Local"}));
        assert_eq!(local_wins.strategy, Some(MergeStrategy::Local));
    }
}
