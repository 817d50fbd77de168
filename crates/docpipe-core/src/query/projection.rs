//! Hidden-field pruning.

use std::collections::HashSet;

use super::join::JoinSpec;

/// Computes the field paths to strip from query output.
///
/// Joined hidden fields are prefixed with the join alias. For joins over arrays
/// the `alias.field` path applies to every element, so hidden fields are removed
/// from each joined document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectionPruner {
    candidates: Vec<String>,
}

impl ProjectionPruner {
    /// Create a pruner from the base entity's hidden paths.
    pub fn new(base_hidden: &[String]) -> Self {
        let mut pruner = Self::default();
        pruner.extend(base_hidden.iter().cloned());
        pruner
    }

    /// Add the hidden paths of a joined entity under the join's alias.
    pub fn with_join(mut self, join: &JoinSpec, joined_hidden: &[String]) -> Self {
        self.extend(
            joined_hidden
                .iter()
                .map(|field| format!("{}.{}", join.alias, field)),
        );
        self
    }

    fn extend(&mut self, paths: impl IntoIterator<Item = String>) {
        for path in paths {
            if !self.candidates.contains(&path) {
                self.candidates.push(path);
            }
        }
    }

    /// All hidden paths, before any select allow-list is applied.
    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    /// Paths to unset, keeping any path named in `select`.
    pub fn prune(&self, select: &[String]) -> Vec<String> {
        if select.is_empty() {
            return self.candidates.clone();
        }
        let keep: HashSet<&str> = select.iter().map(String::as_str).collect();
        self.candidates
            .iter()
            .filter(|path| !keep.contains(path.as_str()))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn join(alias: &str) -> JoinSpec {
        JoinSpec {
            local_field: "ofUserGroup".to_string(),
            entity: "UserGroup".to_string(),
            collection: "usergroups".to_string(),
            foreign_field: "_id".to_string(),
            alias: alias.to_string(),
            many: false,
        }
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_base_and_joined_hidden() {
        let pruner = ProjectionPruner::new(&strings(&["password", "email"]))
            .with_join(&join("userGroup"), &strings(&["inviteCode"]));

        assert_eq!(
            pruner.prune(&[]),
            strings(&["password", "email", "userGroup.inviteCode"])
        );
    }

    #[test]
    fn test_select_keeps_fields() {
        let pruner = ProjectionPruner::new(&strings(&["password", "email"]))
            .with_join(&join("userGroup"), &strings(&["inviteCode", "email"]));

        // A bare name only re-admits the base field; joined fields need the full path.
        assert_eq!(
            pruner.prune(&strings(&["email"])),
            strings(&["password", "userGroup.inviteCode", "userGroup.email"])
        );
        assert_eq!(
            pruner.prune(&strings(&["userGroup.inviteCode"])),
            strings(&["password", "email", "userGroup.email"])
        );
    }

    #[test]
    fn test_deduplicates() {
        let pruner = ProjectionPruner::new(&strings(&["secret"]))
            .with_join(&join("group"), &strings(&["code"]))
            .with_join(&join("group"), &strings(&["code"]));

        assert_eq!(pruner.candidates(), strings(&["secret", "group.code"]).as_slice());
    }

    #[test]
    fn test_nothing_hidden() {
        assert!(ProjectionPruner::default().prune(&[]).is_empty());
    }
}
