//! Execution paths observed at run time

use crate::cfg::VertexId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// One visit of a vertex during an execution
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathStep {
    pub position: VertexId,
    /// Predicate-level distance to flipping the decision taken here
    pub local_distance: f64,
}

impl PathStep {
    pub fn new(position: VertexId, local_distance: f64) -> Self {
        Self {
            position,
            local_distance,
        }
    }
}

/// Immutable, ordered sequence of visited vertices
///
/// Cloning is cheap; a recorded path is shared by reference, never edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Path {
    steps: Arc<[PathStep]>,
}

impl Path {
    pub fn new(steps: Vec<PathStep>) -> Self {
        Self {
            steps: steps.into(),
        }
    }

    pub fn steps(&self) -> &[PathStep] {
        &self.steps
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PathStep> {
        self.steps.iter()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Visited positions in order
    pub fn positions(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.steps.iter().map(|s| s.position)
    }
}

impl Default for Path {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl FromIterator<PathStep> for Path {
    fn from_iter<I: IntoIterator<Item = PathStep>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl FromIterator<(VertexId, f64)> for Path {
    fn from_iter<I: IntoIterator<Item = (VertexId, f64)>>(iter: I) -> Self {
        iter.into_iter()
            .map(|(position, local_distance)| PathStep::new(position, local_distance))
            .collect()
    }
}

impl<'a> IntoIterator for &'a Path {
    type Item = &'a PathStep;
    type IntoIter = std::slice::Iter<'a, PathStep>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Error parsing a path from its `id:distance,...` text form
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid path step '{0}': expected <vertex>[:<distance>]")]
pub struct ParsePathError(pub String);

/// Parses `3:0.5,7,9:2`; a missing distance means 0
impl FromStr for Path {
    type Err = ParsePathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.split(',')
            .map(str::trim)
            .filter(|step| !step.is_empty())
            .map(|step| -> Result<PathStep, ParsePathError> {
                let (position, distance) = match step.split_once(':') {
                    Some((p, d)) => (p, Some(d)),
                    None => (step, None),
                };
                let position = position
                    .trim()
                    .parse::<VertexId>()
                    .map_err(|_| ParsePathError(step.to_string()))?;
                let local_distance = match distance {
                    Some(d) => d
                        .trim()
                        .parse::<f64>()
                        .map_err(|_| ParsePathError(step.to_string()))?,
                    None => 0.0,
                };
                Ok(PathStep::new(position, local_distance))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Path::new)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let steps: Vec<String> = self
            .steps
            .iter()
            .map(|s| format!("{}:{}", s.position, s.local_distance))
            .collect();
        f.write_str(&steps.join(","))
    }
}
