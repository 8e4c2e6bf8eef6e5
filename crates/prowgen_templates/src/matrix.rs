//! Job-matrix expansion.
//!
//! Template file names are expanded one axis at a time. Every entry whose
//! name carries the axis token is replaced by one entry per axis value, with
//! the value's keys merged into the inherited parameter bundle. Names that do
//! not match pass through untouched, so a name matching several axes ends up
//! as the cross product of their values.

use std::collections::btree_map::{self, BTreeMap};

use serde_json::Value;
use tracing::debug;

use crate::axis::{Axis, AxisRegistry, LATEST_RELEASE_BRANCH_KEY};
use crate::error::{TemplateError, TemplateResult};

/// Key/value data a template is rendered with.
pub type ParameterBundle = BTreeMap<String, Value>;

/// One job file in the working set.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateEntry {
    /// Final (possibly expanded) file name.
    pub file_name: String,
    pub parameters: ParameterBundle,
    /// Name of the literal template file this entry came from.
    pub provenance: String,
}

impl TemplateEntry {
    /// Entry for a template file as found on disk.
    pub fn new(file_name: impl Into<String>) -> Self {
        let file_name = file_name.into();
        Self {
            provenance: file_name.clone(),
            file_name,
            parameters: ParameterBundle::new(),
        }
    }

    /// Whether this entry was generated for the newest release branch.
    pub fn is_latest_release_branch(&self) -> bool {
        self.parameters
            .get(LATEST_RELEASE_BRANCH_KEY)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

/// Entries keyed by file name. File names are unique.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkingSet {
    entries: BTreeMap<String, TemplateEntry>,
}

impl WorkingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Working set of unexpanded templates.
    pub fn from_file_names<I, S>(file_names: I) -> TemplateResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = Self::new();
        for name in file_names {
            set.insert(TemplateEntry::new(name))?;
        }
        Ok(set)
    }

    /// Insert an entry, refusing to overwrite an existing file name.
    pub fn insert(&mut self, entry: TemplateEntry) -> TemplateResult<()> {
        match self.entries.entry(entry.file_name.clone()) {
            btree_map::Entry::Occupied(existing) => Err(TemplateError::DuplicateEntry {
                file: existing.key().clone(),
                provenance: entry.provenance,
            }),
            btree_map::Entry::Vacant(slot) => {
                slot.insert(entry);
                Ok(())
            }
        }
    }

    pub fn get(&self, file_name: &str) -> Option<&TemplateEntry> {
        self.entries.get(file_name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in file name order.
    pub fn iter(&self) -> impl Iterator<Item = &TemplateEntry> {
        self.entries.values()
    }

    pub fn file_names(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }
}

impl IntoIterator for WorkingSet {
    type Item = TemplateEntry;
    type IntoIter = btree_map::IntoValues<String, TemplateEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_values()
    }
}

/// Applies axes to a working set.
pub struct MatrixExpander;

impl MatrixExpander {
    /// Expand a working set over every axis of a registry, in registry order.
    pub fn expand_registry(
        working_set: WorkingSet,
        registry: &AxisRegistry,
    ) -> TemplateResult<WorkingSet> {
        Self::expand(working_set, registry.axes())
    }

    /// Expand a working set over the given axes, first to last.
    pub fn expand(working_set: WorkingSet, axes: &[Axis]) -> TemplateResult<WorkingSet> {
        match axes.split_first() {
            None => Ok(working_set),
            Some((axis, rest)) => {
                let expanded = Self::apply_axis(working_set, axis)?;
                Self::expand(expanded, rest)
            }
        }
    }

    /// Apply a single axis.
    ///
    /// A matching entry with an empty value list is an error rather than a
    /// silent drop of the template.
    pub fn apply_axis(working_set: WorkingSet, axis: &Axis) -> TemplateResult<WorkingSet> {
        let mut expanded = WorkingSet::new();

        for entry in working_set {
            if !axis.matches(&entry.file_name) {
                expanded.insert(entry)?;
                continue;
            }

            if axis.values.is_empty() {
                return Err(TemplateError::EmptyAxis {
                    axis: axis.name.clone(),
                    file: entry.file_name,
                });
            }

            debug!(
                "Expanding {} over axis {} ({} values)",
                entry.file_name,
                axis.name,
                axis.values.len()
            );

            for (index, value) in axis.values.iter().enumerate() {
                let mut parameters = entry.parameters.clone();
                parameters.extend(axis.parameters_for(index).into_iter().flatten());

                expanded.insert(TemplateEntry {
                    file_name: axis.substitute(&entry.file_name, value),
                    parameters,
                    provenance: entry.provenance.clone(),
                })?;
            }
        }

        Ok(expanded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axis::{strings, OTHER_RELEASE_BRANCHES_KEY, RELEASE_BRANCH_KEY};

    fn release_axis() -> Axis {
        Axis::release_branch(strings(&["1-27", "1-28", "1-29"]))
    }

    fn golang_axis() -> Axis {
        Axis::golang(strings(&["1-22", "1-23"]))
    }

    #[test]
    fn test_release_branch_expansion() {
        let set = WorkingSet::from_file_names(["job-1-X.yaml"]).unwrap();
        let expanded = MatrixExpander::expand(set, &[release_axis()]).unwrap();

        assert_eq!(
            expanded.file_names(),
            vec!["job-1-27.yaml", "job-1-28.yaml", "job-1-29.yaml"]
        );

        let first = expanded.get("job-1-27.yaml").unwrap();
        assert_eq!(first.parameters[RELEASE_BRANCH_KEY], "1-27");
        assert_eq!(first.parameters[OTHER_RELEASE_BRANCHES_KEY], "1-28|1-29");
        assert!(!first.is_latest_release_branch());

        let middle = expanded.get("job-1-28.yaml").unwrap();
        assert_eq!(middle.parameters[OTHER_RELEASE_BRANCHES_KEY], "1-27|1-29");
        assert!(!middle.is_latest_release_branch());

        let last = expanded.get("job-1-29.yaml").unwrap();
        assert_eq!(last.parameters[OTHER_RELEASE_BRANCHES_KEY], "1-27|1-28");
        assert!(last.is_latest_release_branch());
    }

    #[test]
    fn test_golang_expansion() {
        let set = WorkingSet::from_file_names(["test-golang-1-X.yaml"]).unwrap();
        let expanded = MatrixExpander::expand(set, &[golang_axis()]).unwrap();

        let first = expanded.get("test-golang-1-22.yaml").unwrap();
        assert_eq!(first.parameters["jobGoVersion"], "1-22");
        assert_eq!(first.parameters["golangVersion"], "1.22");

        let second = expanded.get("test-golang-1-23.yaml").unwrap();
        assert_eq!(second.parameters["jobGoVersion"], "1-23");
        assert_eq!(second.parameters["golangVersion"], "1.23");
        assert_eq!(expanded.len(), 2);
    }

    #[test]
    fn test_other_values_exclude_own_value() {
        let axis = Axis::release_branch(strings(&["1-27", "1-28", "1-29", "1-30"]));
        let set = WorkingSet::from_file_names(["job-1-X.yaml"]).unwrap();
        let expanded = MatrixExpander::expand(set, std::slice::from_ref(&axis)).unwrap();

        for entry in expanded.iter() {
            let own = entry.parameters[RELEASE_BRANCH_KEY].as_str().unwrap();
            let others = entry.parameters[OTHER_RELEASE_BRANCHES_KEY].as_str().unwrap();
            let others: Vec<&str> = others.split('|').collect();
            let expected: Vec<&str> = axis
                .values
                .iter()
                .map(String::as_str)
                .filter(|v| *v != own)
                .collect();
            assert_eq!(others, expected);
        }
    }

    #[test]
    fn test_unmatched_name_passes_through() {
        let set = WorkingSet::from_file_names(["lint-presubmits.yaml"]).unwrap();
        let expanded = MatrixExpander::expand(set.clone(), &[golang_axis(), release_axis()]).unwrap();

        assert_eq!(expanded, set);
        let entry = expanded.get("lint-presubmits.yaml").unwrap();
        assert!(entry.parameters.is_empty());
        assert_eq!(entry.provenance, "lint-presubmits.yaml");
    }

    #[test]
    fn test_no_axes_is_identity() {
        let set = WorkingSet::from_file_names(["a-1-X.yaml", "b.yaml"]).unwrap();
        let expanded = MatrixExpander::expand(set.clone(), &[]).unwrap();
        assert_eq!(expanded, set);
    }

    #[test]
    fn test_cross_product_and_provenance() {
        let set = WorkingSet::from_file_names(["build-golang-1-X-1-X.yaml"]).unwrap();
        let expanded = MatrixExpander::expand(set, &[golang_axis(), release_axis()]).unwrap();

        assert_eq!(expanded.len(), 2 * 3);
        for entry in expanded.iter() {
            assert_eq!(entry.provenance, "build-golang-1-X-1-X.yaml");
            assert!(entry.parameters.contains_key("jobGoVersion"));
            assert!(entry.parameters.contains_key(RELEASE_BRANCH_KEY));
        }

        let entry = expanded.get("build-golang-1-23-1-28.yaml").unwrap();
        assert_eq!(entry.parameters["golangVersion"], "1.23");
        assert_eq!(entry.parameters[RELEASE_BRANCH_KEY], "1-28");
    }

    #[test]
    fn test_provenance_survives_later_passes() {
        let set = WorkingSet::from_file_names(["x-golang-1-X-1-X.yaml"]).unwrap();
        let after_go = MatrixExpander::apply_axis(set, &golang_axis()).unwrap();
        let provenances: Vec<String> = after_go.iter().map(|e| e.provenance.clone()).collect();

        let after_branch = MatrixExpander::apply_axis(after_go, &release_axis()).unwrap();
        for entry in after_branch.iter() {
            assert!(provenances.contains(&entry.provenance));
            assert_eq!(entry.provenance, "x-golang-1-X-1-X.yaml");
        }
    }

    #[test]
    fn test_parameters_are_only_added() {
        let set = WorkingSet::from_file_names(["x-golang-1-X-1-X.yaml"]).unwrap();
        let after_go = MatrixExpander::apply_axis(set, &golang_axis()).unwrap();
        let after_branch = MatrixExpander::apply_axis(after_go.clone(), &release_axis()).unwrap();

        for entry in after_branch.iter() {
            let parent = after_go
                .iter()
                .find(|p| entry.file_name.starts_with(&p.file_name.replace("1-X.yaml", "")))
                .unwrap();
            for (key, value) in &parent.parameters {
                assert_eq!(entry.parameters.get(key), Some(value));
            }
        }
    }

    #[test]
    fn test_empty_axis_is_rejected() {
        let set = WorkingSet::from_file_names(["job-1-X.yaml", "other.yaml"]).unwrap();
        let result = MatrixExpander::expand(set, &[Axis::release_branch(Vec::new())]);
        assert!(matches!(result, Err(TemplateError::EmptyAxis { .. })));
    }

    #[test]
    fn test_empty_axis_without_matches_is_harmless() {
        let set = WorkingSet::from_file_names(["other.yaml"]).unwrap();
        let expanded = MatrixExpander::expand(set, &[Axis::release_branch(Vec::new())]).unwrap();
        assert_eq!(expanded.len(), 1);
    }

    #[test]
    fn test_duplicate_names_are_rejected() {
        let set = WorkingSet::from_file_names(["job-1-X.yaml", "job-1-28.yaml"]).unwrap();
        let result = MatrixExpander::expand(set, &[release_axis()]);
        assert!(matches!(
            result,
            Err(TemplateError::DuplicateEntry { ref file, .. }) if file == "job-1-28.yaml"
        ));
    }

    #[test]
    fn test_expansion_is_deterministic() {
        let names = ["b-golang-1-X.yaml", "a-1-X.yaml", "c.yaml"];
        let first = MatrixExpander::expand_registry(
            WorkingSet::from_file_names(names).unwrap(),
            &AxisRegistry::standard(),
        )
        .unwrap();
        let second = MatrixExpander::expand_registry(
            WorkingSet::from_file_names(names).unwrap(),
            &AxisRegistry::standard(),
        )
        .unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 3 + 5 + 1);
    }
}
