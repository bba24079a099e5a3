//! Hierarchical node addresses (`1`, `1.2`, `1.2.1`).
//!
//! A `NodeId` is a non-empty sequence of positive integers whose first
//! component is always `1`. Parent/child relations are derived from the
//! components alone; nothing stores pointers between nodes.

use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NodeIdError {
    #[error("node id must not be empty")]
    Empty,
    #[error("node id {input:?} has an empty component (leading, trailing, or doubled dot)")]
    EmptyComponent { input: String },
    #[error("node id {input:?} has a non-numeric component {component:?}")]
    NonNumeric { input: String, component: String },
    #[error("node id {input:?} has a component with a leading zero: {component:?}")]
    LeadingZero { input: String, component: String },
    #[error("node id {input:?} has a zero component")]
    Zero { input: String },
    #[error("node id {input:?} has a component that overflows: {component:?}")]
    Overflow { input: String, component: String },
    #[error("node id {input:?} must start at the root component 1")]
    NotRooted { input: String },
}

/// Canonical address of a node in the proof tree.
///
/// Ordering is lexicographic over the decoded integer components, so
/// `1 < 1.1 < 1.1.5 < 1.2 < 1.10`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodeId(Vec<NonZeroU32>);

impl NodeId {
    /// The root node, `1`.
    #[must_use]
    pub fn root() -> Self {
        Self(vec![NonZeroU32::MIN])
    }

    pub fn parse(input: &str) -> Result<Self, NodeIdError> {
        if input.is_empty() {
            return Err(NodeIdError::Empty);
        }

        let mut components = Vec::new();
        for component in input.split('.') {
            if component.is_empty() {
                return Err(NodeIdError::EmptyComponent {
                    input: input.to_owned(),
                });
            }
            if !component.bytes().all(|b| b.is_ascii_digit()) {
                return Err(NodeIdError::NonNumeric {
                    input: input.to_owned(),
                    component: component.to_owned(),
                });
            }
            if component.len() > 1 && component.starts_with('0') {
                return Err(NodeIdError::LeadingZero {
                    input: input.to_owned(),
                    component: component.to_owned(),
                });
            }
            let value: u32 = component.parse().map_err(|_| NodeIdError::Overflow {
                input: input.to_owned(),
                component: component.to_owned(),
            })?;
            let value = NonZeroU32::new(value).ok_or_else(|| NodeIdError::Zero {
                input: input.to_owned(),
            })?;
            components.push(value);
        }

        if components[0] != NonZeroU32::MIN {
            return Err(NodeIdError::NotRooted {
                input: input.to_owned(),
            });
        }

        Ok(Self(components))
    }

    /// Number of components; the root has depth 1.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.len() == 1
    }

    /// All components but the last. The root has no parent.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            None
        } else {
            Some(Self(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    /// The child at 1-based position `index` below this node.
    #[must_use]
    pub fn child(&self, index: NonZeroU32) -> Self {
        let mut components = self.0.clone();
        components.push(index);
        Self(components)
    }

    /// Position of this node among its siblings (the last component).
    #[must_use]
    pub fn child_index(&self) -> NonZeroU32 {
        *self.0.last().expect("NodeId always has at least one component")
    }

    /// Strict ancestry: a node is not its own ancestor.
    #[must_use]
    pub fn is_ancestor_of(&self, other: &Self) -> bool {
        self.0.len() < other.0.len() && other.0.starts_with(&self.0)
    }

    /// Whether `other` sits directly below this node.
    #[must_use]
    pub fn is_parent_of(&self, other: &Self) -> bool {
        self.0.len() + 1 == other.0.len() && other.0.starts_with(&self.0)
    }

    /// Every proper ancestor, nearest first.
    #[must_use]
    pub fn ancestors(&self) -> Vec<Self> {
        (1..self.0.len())
            .rev()
            .map(|len| Self(self.0[..len].to_vec()))
            .collect()
    }

    #[must_use]
    pub fn components(&self) -> Vec<u32> {
        self.0.iter().map(|c| c.get()).collect()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for component in &self.0 {
            if !first {
                f.write_str(".")?;
            }
            write!(f, "{component}")?;
            first = false;
        }
        Ok(())
    }
}

impl FromStr for NodeId {
    type Err = NodeIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for NodeId {
    type Error = NodeIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for NodeId {
    type Error = NodeIdError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<NodeId> for String {
    fn from(value: NodeId) -> Self {
        value.to_string()
    }
}
