//! One dwell tracker per live element.
//!
//! Trackers are keyed by [`ElementId`] and never hold the element itself;
//! the owner of the visual tree calls [`TargetRegistry::evict`] when an
//! element is destroyed.

use log::debug;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::time::Duration;

use crate::config::Profile;
use crate::element::{Element, ElementId};
use crate::target::DwellTarget;

/// Not `Send`/`Sync`: all access happens on the thread that drives gaze frames.
#[derive(Debug, Default)]
pub struct TargetRegistry {
    targets: HashMap<ElementId, DwellTarget>,
    _thread_bound: PhantomData<*const ()>,
}

impl TargetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the tracker for `element`, creating (and resetting) it on first use.
    pub fn get_or_create(
        &mut self,
        element: &Element,
        profile: &Profile,
        next_state_time: Duration,
    ) -> &mut DwellTarget {
        self.targets.entry(element.id).or_insert_with(|| {
            debug!("tracking {} ({})", element.id, element.kind.as_str());
            DwellTarget::new(element, profile, next_state_time)
        })
    }

    pub fn contains(&self, id: ElementId) -> bool {
        self.targets.contains_key(&id)
    }

    #[cfg(test)]
    pub fn get(&self, id: ElementId) -> Option<&DwellTarget> {
        self.targets.get(&id)
    }

    pub fn get_mut(&mut self, id: ElementId) -> Option<&mut DwellTarget> {
        self.targets.get_mut(&id)
    }

    pub fn evict(&mut self, id: ElementId) -> Option<DwellTarget> {
        let removed = self.targets.remove(&id);
        if removed.is_some() {
            debug!("evicted tracker for {id}");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}
