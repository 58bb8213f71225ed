//! Static descriptions of composed stages and field audits over them.

use crate::context::FieldSet;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// The shape of a composed stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Topology {
    /// A leaf stage.
    Stage {
        /// Stage name.
        name: String,
        /// Declared fields.
        #[serde(default)]
        fields: FieldSet,
    },
    /// Stages run one after another.
    Sequence {
        /// Sequence name.
        name: String,
        /// Members in order.
        children: Vec<Topology>,
    },
    /// Stages run concurrently against the same input.
    Concurrent {
        /// Group name.
        name: String,
        /// Members in declaration order.
        children: Vec<Topology>,
    },
}

impl Topology {
    /// Describes a leaf stage.
    #[must_use]
    pub fn stage(name: impl Into<String>, fields: FieldSet) -> Self {
        Self::Stage {
            name: name.into(),
            fields,
        }
    }

    /// Returns the node name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Stage { name, .. } | Self::Sequence { name, .. } | Self::Concurrent { name, .. } => {
                name
            }
        }
    }

    /// Returns the child nodes. Leaves have none.
    #[must_use]
    pub fn children(&self) -> &[Self] {
        match self {
            Self::Stage { .. } => &[],
            Self::Sequence { children, .. } | Self::Concurrent { children, .. } => children,
        }
    }

    /// Returns the number of leaf stages below this node.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        match self {
            Self::Stage { .. } => 1,
            _ => self.children().iter().map(Self::stage_count).sum(),
        }
    }

    /// Aggregates the declared fields of this node.
    ///
    /// A sequence requires what its members require minus what earlier
    /// members provide. A group requires what any member requires.
    #[must_use]
    pub fn fields(&self) -> FieldSet {
        match self {
            Self::Stage { fields, .. } => fields.clone(),
            Self::Sequence { children, .. } => {
                let mut out = FieldSet::new();
                for child in children {
                    let child_fields = child.fields();
                    out.requires.extend(
                        child_fields
                            .requires
                            .into_iter()
                            .filter(|field| !out.provides.contains(field)),
                    );
                    out.provides.extend(child_fields.provides);
                }
                out
            }
            Self::Concurrent { children, .. } => {
                let mut out = FieldSet::new();
                for child in children {
                    let child_fields = child.fields();
                    out.requires.extend(child_fields.requires);
                    out.provides.extend(child_fields.provides);
                }
                out
            }
        }
    }
}

/// A problem found by [`audit`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum FieldIssue {
    /// Nothing upstream provides a required field.
    Unsatisfied {
        /// The stage that requires the field.
        stage: String,
        /// The field.
        field: String,
    },
    /// A group member requires a field only a sibling provides. Siblings
    /// never see each other's additions.
    SiblingDependency {
        /// The stage that requires the field.
        stage: String,
        /// The field.
        field: String,
        /// The sibling providing it.
        sibling: String,
    },
    /// Several members of one group provide the same field. The
    /// last-declared member's value wins.
    Collision {
        /// The group.
        group: String,
        /// The field.
        field: String,
        /// Providing members in declaration order.
        stages: Vec<String>,
    },
}

impl fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unsatisfied { stage, field } => {
                write!(f, "stage '{stage}' requires '{field}' but nothing upstream provides it")
            }
            Self::SiblingDependency {
                stage,
                field,
                sibling,
            } => write!(
                f,
                "stage '{stage}' requires '{field}' which only its concurrent sibling '{sibling}' provides"
            ),
            Self::Collision {
                group,
                field,
                stages,
            } => write!(
                f,
                "group '{group}' members {} all provide '{field}'",
                stages.join(", ")
            ),
        }
    }
}

/// Checks declared fields against the data flow of `topology`.
///
/// `initial` lists fields present in every initial context. Stages that
/// declare nothing are treated as requiring and providing nothing.
pub fn audit<I, S>(topology: &Topology, initial: I) -> Vec<FieldIssue>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let available: BTreeSet<String> = initial.into_iter().map(Into::into).collect();
    let mut issues = Vec::new();
    walk(topology, &available, &mut issues);
    issues
}

/// Records issues below `node` and returns the fields it provides.
fn walk(node: &Topology, available: &BTreeSet<String>, issues: &mut Vec<FieldIssue>) -> BTreeSet<String> {
    match node {
        Topology::Stage { name, fields } => {
            issues.extend(
                fields
                    .requires
                    .iter()
                    .filter(|field| !available.contains(*field))
                    .map(|field| FieldIssue::Unsatisfied {
                        stage: name.clone(),
                        field: field.clone(),
                    }),
            );
            fields.provides.clone()
        }
        Topology::Sequence { children, .. } => {
            let mut running = available.clone();
            let mut provided = BTreeSet::new();
            for child in children {
                let added = walk(child, &running, issues);
                running.extend(added.iter().cloned());
                provided.extend(added);
            }
            provided
        }
        Topology::Concurrent { name, children } => {
            let sibling_provides: Vec<BTreeSet<String>> =
                children.iter().map(|child| child.fields().provides).collect();
            let mut provided = BTreeSet::new();

            for (index, child) in children.iter().enumerate() {
                let mut child_issues = Vec::new();
                provided.extend(walk(child, available, &mut child_issues));

                for issue in child_issues {
                    let sibling = match &issue {
                        FieldIssue::Unsatisfied { field, .. } => sibling_provides
                            .iter()
                            .enumerate()
                            .find(|(other, provides)| *other != index && provides.contains(field))
                            .map(|(other, _)| children[other].name().to_string()),
                        _ => None,
                    };
                    match (issue, sibling) {
                        (FieldIssue::Unsatisfied { stage, field }, Some(sibling)) => {
                            issues.push(FieldIssue::SiblingDependency {
                                stage,
                                field,
                                sibling,
                            });
                        }
                        (issue, _) => issues.push(issue),
                    }
                }
            }

            let mut providers: BTreeMap<&str, Vec<String>> = BTreeMap::new();
            for (child, provides) in children.iter().zip(&sibling_provides) {
                for field in provides {
                    providers
                        .entry(field.as_str())
                        .or_default()
                        .push(child.name().to_string());
                }
            }
            issues.extend(
                providers
                    .into_iter()
                    .filter(|(_, stages)| stages.len() > 1)
                    .map(|(field, stages)| FieldIssue::Collision {
                        group: name.clone(),
                        field: field.to_string(),
                        stages,
                    }),
            );

            provided
        }
    }
}
