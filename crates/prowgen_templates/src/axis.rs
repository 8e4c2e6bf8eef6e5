//! Expansion axes.
//!
//! An axis is a token that may appear in a job template's file name together
//! with the ordered list of values that replace it. Each value contributes a
//! few keys to the parameter bundle the template is later rendered with.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{TemplateError, TemplateResult};
use crate::matrix::ParameterBundle;

pub const RELEASE_BRANCH_KEY: &str = "releaseBranch";
pub const OTHER_RELEASE_BRANCHES_KEY: &str = "otherReleaseBranches";
pub const LATEST_RELEASE_BRANCH_KEY: &str = "latestReleaseBranch";

/// Separator used when joining the other release branches into a regex alternation.
pub const OTHER_VALUES_SEPARATOR: &str = "|";

/// What an axis contributes to the parameter bundle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AxisKind {
    /// Release branches: the branch itself, every other branch, and whether
    /// this is the newest one.
    ReleaseBranch,
    /// Language runtime versions. `job_key` holds the raw value (`1-22`),
    /// `version_key` the dotted form (`1.22`).
    Runtime { job_key: String, version_key: String },
    /// A single key holding the raw value.
    Plain { key: String },
}

/// A named expansion axis.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Axis {
    pub name: String,
    /// Literal substring of file names belonging to this axis.
    pub token: String,
    /// Kept in front of the value when the token is substituted.
    #[serde(default)]
    pub prefix: String,
    pub values: Vec<String>,
    #[serde(flatten)]
    pub kind: AxisKind,
}

impl Axis {
    pub fn new(
        name: impl Into<String>,
        token: impl Into<String>,
        prefix: impl Into<String>,
        kind: AxisKind,
        values: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            token: token.into(),
            prefix: prefix.into(),
            values,
            kind,
        }
    }

    /// Release branch axis matching `1-X`.
    pub fn release_branch(values: Vec<String>) -> Self {
        Self::new("release-branch", "1-X", "", AxisKind::ReleaseBranch, values)
    }

    /// Go version axis matching `golang-1-X`.
    pub fn golang(values: Vec<String>) -> Self {
        Self::new(
            "golang",
            "golang-1-X",
            "golang-",
            AxisKind::Runtime {
                job_key: "jobGoVersion".to_string(),
                version_key: "golangVersion".to_string(),
            },
            values,
        )
    }

    /// Python version axis matching `python-3-X`.
    pub fn python(values: Vec<String>) -> Self {
        Self::new(
            "python",
            "python-3-X",
            "python-",
            AxisKind::Runtime {
                job_key: "jobPythonVersion".to_string(),
                version_key: "pythonVersion".to_string(),
            },
            values,
        )
    }

    /// Amazon Linux version axis matching `al-X`.
    pub fn amazon_linux(values: Vec<String>) -> Self {
        Self::new(
            "amazon-linux",
            "al-X",
            "al-",
            AxisKind::Plain {
                key: "alVersion".to_string(),
            },
            values,
        )
    }

    /// Check whether a file name carries this axis's token.
    pub fn matches(&self, file_name: &str) -> bool {
        file_name.contains(&self.token)
    }

    /// File name with the token replaced by the given value.
    pub fn substitute(&self, file_name: &str, value: &str) -> String {
        file_name.replace(&self.token, &format!("{}{}", self.prefix, value))
    }

    /// Keys contributed by the value at `index`, or `None` when the axis has
    /// no such value.
    pub fn parameters_for(&self, index: usize) -> Option<ParameterBundle> {
        let value = self.values.get(index)?;
        let mut parameters = ParameterBundle::new();

        match &self.kind {
            AxisKind::ReleaseBranch => {
                let others: Vec<&str> = self
                    .values
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != index)
                    .map(|(_, v)| v.as_str())
                    .collect();
                parameters.insert(RELEASE_BRANCH_KEY.to_string(), Value::from(value.as_str()));
                parameters.insert(
                    OTHER_RELEASE_BRANCHES_KEY.to_string(),
                    Value::from(others.join(OTHER_VALUES_SEPARATOR)),
                );
                parameters.insert(
                    LATEST_RELEASE_BRANCH_KEY.to_string(),
                    Value::Bool(index + 1 == self.values.len()),
                );
            }
            AxisKind::Runtime {
                job_key,
                version_key,
            } => {
                parameters.insert(job_key.clone(), Value::from(value.as_str()));
                parameters.insert(version_key.clone(), Value::from(value.replace('-', ".")));
            }
            AxisKind::Plain { key } => {
                parameters.insert(key.clone(), Value::from(value.as_str()));
            }
        }

        Some(parameters)
    }
}

/// Ordered, immutable set of axes applied during expansion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AxisRegistry {
    axes: Vec<Axis>,
}

impl AxisRegistry {
    /// Build a registry, checking that the order lets every axis fire.
    ///
    /// An axis whose token is contained in the token of a later axis would
    /// swallow that axis's files (`1-X` inside `golang-1-X`), so such an
    /// ordering is rejected.
    pub fn new(axes: Vec<Axis>) -> TemplateResult<Self> {
        for (i, earlier) in axes.iter().enumerate() {
            if earlier.token.is_empty() {
                return Err(TemplateError::InvalidRegistry(format!(
                    "axis {} has an empty token",
                    earlier.name
                )));
            }
            for later in &axes[i + 1..] {
                if later.token.contains(&earlier.token) {
                    return Err(TemplateError::InvalidRegistry(format!(
                        "axis {} (token {}) must be applied before axis {} (token {})",
                        later.name, later.token, earlier.name, earlier.token
                    )));
                }
            }
        }

        Ok(Self { axes })
    }

    /// Registry with the built-in axes and default values, runtime axes first
    /// and release branches last.
    pub fn standard() -> Self {
        Self {
            axes: vec![
                Axis::golang(strings(&["1-22", "1-23", "1-24"])),
                Axis::python(strings(&["3-9", "3-11"])),
                Axis::amazon_linux(strings(&["2", "2023"])),
                Axis::release_branch(strings(&["1-27", "1-28", "1-29", "1-30", "1-31"])),
            ],
        }
    }

    pub fn axes(&self) -> &[Axis] {
        &self.axes
    }

    /// Get an axis by name.
    pub fn get(&self, name: &str) -> Option<&Axis> {
        self.axes.iter().find(|a| a.name == name)
    }

    /// Check whether a file name still carries any axis token.
    pub fn is_terminal(&self, file_name: &str) -> bool {
        !self.axes.iter().any(|a| a.matches(file_name))
    }
}

pub(crate) fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substitute_keeps_prefix() {
        let axis = Axis::golang(strings(&["1-22"]));
        assert_eq!(
            axis.substitute("test-golang-1-X.yaml", "1-22"),
            "test-golang-1-22.yaml"
        );

        let axis = Axis::release_branch(strings(&["1-27"]));
        assert_eq!(axis.substitute("job-1-X.yaml", "1-27"), "job-1-27.yaml");
    }

    #[test]
    fn test_runtime_parameters() {
        let axis = Axis::python(strings(&["3-9", "3-11"]));
        let params = axis.parameters_for(1).unwrap();
        assert_eq!(params["jobPythonVersion"], "3-11");
        assert_eq!(params["pythonVersion"], "3.11");
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_release_branch_parameters() {
        let axis = Axis::release_branch(strings(&["1-27", "1-28", "1-29"]));

        let first = axis.parameters_for(0).unwrap();
        assert_eq!(first[RELEASE_BRANCH_KEY], "1-27");
        assert_eq!(first[OTHER_RELEASE_BRANCHES_KEY], "1-28|1-29");
        assert_eq!(first[LATEST_RELEASE_BRANCH_KEY], false);

        let last = axis.parameters_for(2).unwrap();
        assert_eq!(last[OTHER_RELEASE_BRANCHES_KEY], "1-27|1-28");
        assert_eq!(last[LATEST_RELEASE_BRANCH_KEY], true);
    }

    #[test]
    fn test_parameters_for_out_of_range() {
        let axis = Axis::release_branch(strings(&["1-27"]));
        assert!(axis.parameters_for(1).is_none());
        assert!(Axis::golang(Vec::new()).parameters_for(0).is_none());
    }

    #[test]
    fn test_standard_registry_order_is_valid() {
        let standard = AxisRegistry::standard();
        let rebuilt = AxisRegistry::new(standard.axes().to_vec()).unwrap();
        assert_eq!(rebuilt, standard);
        assert_eq!(standard.axes().last().unwrap().token, "1-X");
    }

    #[test]
    fn test_registry_rejects_shadowing_order() {
        let result = AxisRegistry::new(vec![
            Axis::release_branch(strings(&["1-27"])),
            Axis::golang(strings(&["1-22"])),
        ]);
        assert!(matches!(result, Err(TemplateError::InvalidRegistry(_))));
    }

    #[test]
    fn test_is_terminal() {
        let registry = AxisRegistry::standard();
        assert!(registry.is_terminal("lint-presubmits.yaml"));
        assert!(!registry.is_terminal("build-al-X-presubmits.yaml"));
        assert!(registry.is_terminal("build-1-27-presubmits.yaml"));
    }

    #[test]
    fn test_axis_from_yaml() {
        let axis: Axis = serde_yaml::from_str(
            r#"
name: node
token: node-X
prefix: node-
kind: plain
key: nodeVersion
values: ["18", "20"]
"#,
        )
        .unwrap();
        assert_eq!(axis.kind, AxisKind::Plain { key: "nodeVersion".into() });
        assert_eq!(axis.substitute("test-node-X.yaml", "20"), "test-node-20.yaml");
    }
}
