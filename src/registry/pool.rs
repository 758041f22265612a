//! Compute-once cache of analyzed classes
//!
//! Threads racing on the same class block on one `OnceCell`; exactly one of
//! them runs the build. A failed build leaves the cell empty so the next
//! request retries.

use crate::pipeline::ClassGraphs;
use dashmap::DashMap;
use once_cell::sync::OnceCell;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Default)]
pub struct GraphPool {
    classes: DashMap<String, Arc<OnceCell<Arc<ClassGraphs>>>>,
}

impl GraphPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Graphs of `class_name`, building them with `build` if no other
    /// thread has done so yet
    pub fn get_or_build<E>(
        &self,
        class_name: &str,
        build: impl FnOnce() -> Result<ClassGraphs, E>,
    ) -> Result<Arc<ClassGraphs>, E> {
        // Clone the cell out so the shard lock is not held during the build
        let cell = Arc::clone(
            self.classes
                .entry(class_name.to_string())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .value(),
        );

        let graphs = cell.get_or_try_init(|| {
            debug!(class = class_name, "building class graphs");
            build().map(Arc::new)
        })?;
        Ok(Arc::clone(graphs))
    }

    /// Already-built graphs of a class
    pub fn get(&self, class_name: &str) -> Option<Arc<ClassGraphs>> {
        self.classes
            .get(class_name)
            .and_then(|cell| cell.get().cloned())
    }

    pub fn contains(&self, class_name: &str) -> bool {
        self.get(class_name).is_some()
    }

    /// Number of classes with a finished build
    pub fn len(&self) -> usize {
        self.classes.iter().filter(|c| c.get().is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
