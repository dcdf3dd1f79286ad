//! # Scene Graph Store
//!
//! Authoritative, flattened view of what should be on screen.
//!
//! ## Apply Algorithm
//!
//! ```text
//! Frame ──flatten──► objects + touched groups
//!                         │
//!     for each touched group: drop every id indexed under it
//!                         │
//!     upsert every object, index under its group
//!                         │
//!     generation += 1, one SceneChanged
//! ```
//!
//! Groups the frame does not mention keep their objects. A producer that
//! reports a group with no children clears it.

use std::collections::{BTreeMap, HashSet};

use crossbeam_channel::Receiver;
use lanescope_protocol::{Frame, Object};

use crate::error::{SceneError, SceneResult, SceneWarning};
use crate::events::{SceneChanged, SceneNotifier};
use crate::flatten::{flatten_frame, GroupKey};
use crate::index::GroupIndex;
use crate::query::{RenderQuery, VisibilityOverrides};

/// One stored object plus what its ancestry contributed.
#[derive(Clone, Debug)]
pub struct RenderableEntry {
    /// Latest object state.
    pub object: Object,
    /// Group it is indexed under.
    pub group_key: GroupKey,
    /// Owning layer id.
    pub layer_id: String,
    /// True when the layer and every enclosing group were visible.
    pub ancestors_visible: bool,
    /// Intersection of ancestor view masks.
    pub ancestor_view_mask: u8,
}

impl RenderableEntry {
    /// Producer-side visibility of the object and its ancestors.
    #[must_use]
    #[inline]
    pub const fn is_visible(&self) -> bool {
        self.ancestors_visible && self.object.base.visible
    }

    /// View mask after intersecting with ancestors.
    #[must_use]
    #[inline]
    pub const fn effective_view_mask(&self) -> u8 {
        self.ancestor_view_mask & self.object.base.view_mask
    }
}

/// What one [`SceneStore::apply_frame`] call did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ApplySummary {
    /// Applied frame.
    pub frame_id: u64,
    /// Groups invalidated by the frame.
    pub dirty_groups: usize,
    /// Objects written.
    pub upserted: usize,
    /// Objects deleted and not re-sent.
    pub removed: usize,
    /// Ancestry warnings.
    pub warnings: Vec<SceneWarning>,
}

/// Flattened scene keyed by object id.
#[derive(Debug, Default)]
pub struct SceneStore {
    entries: BTreeMap<String, RenderableEntry>,
    index: GroupIndex,
    overrides: VisibilityOverrides,
    notifier: SceneNotifier,
    generation: u64,
}

impl SceneStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a decoded frame.
    pub fn apply_frame(&mut self, frame: Frame) -> ApplySummary {
        let flat = flatten_frame(frame);

        let mut dropped: HashSet<String> = HashSet::new();
        for key in &flat.touched {
            for id in self.index.take_bucket(key) {
                self.entries.remove(&id);
                dropped.insert(id);
            }
        }

        let upserted = flat.objects.len();
        for item in flat.objects {
            let id = item.object.base.id.clone();
            dropped.remove(&id);
            self.index.insert(&item.group_key, &id);
            self.entries.insert(
                id,
                RenderableEntry {
                    object: item.object,
                    group_key: item.group_key,
                    layer_id: item.layer_id,
                    ancestors_visible: item.ancestors_visible,
                    ancestor_view_mask: item.ancestor_view_mask,
                },
            );
        }

        let summary = ApplySummary {
            frame_id: flat.frame_id,
            dirty_groups: flat.touched.len(),
            upserted,
            removed: dropped.len(),
            warnings: flat.warnings,
        };

        tracing::debug!(
            frame_id = summary.frame_id,
            dirty = summary.dirty_groups,
            upserted = summary.upserted,
            removed = summary.removed,
            total = self.entries.len(),
            "frame applied"
        );

        self.publish(Some(summary.frame_id), summary.upserted, summary.removed);
        summary
    }

    /// Visible objects matching `query`, ordered by id.
    #[must_use]
    pub fn renderables(&self, query: &RenderQuery) -> Vec<&Object> {
        let compiled = query.compile();
        self.entries
            .values()
            .filter(|entry| compiled.matches(entry, &self.overrides))
            .map(|entry| &entry.object)
            .collect()
    }

    /// Resolves a caller-held id list, skipping ids no longer stored.
    #[must_use]
    pub fn renderables_for<I, S>(&self, ids: I, query: &RenderQuery) -> Vec<&Object>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let compiled = query.compile();
        ids.into_iter()
            .filter_map(|id| self.entries.get(id.as_ref()))
            .filter(|entry| compiled.matches(entry, &self.overrides))
            .map(|entry| &entry.object)
            .collect()
    }

    /// Client-side layer toggle.
    pub fn set_layer_visible(&mut self, layer_id: &str, visible: bool) {
        self.overrides.set_layer_visible(layer_id, visible);
        self.publish(None, 0, 0);
    }

    /// Client-side group toggle.
    pub fn set_group_visible(&mut self, key: &GroupKey, visible: bool) {
        self.overrides.set_group_visible(key, visible);
        self.publish(None, 0, 0);
    }

    /// Verifies that the group index and the entries agree exactly.
    ///
    /// # Errors
    ///
    /// Returns the first inconsistency found.
    pub fn check_invariants(&self) -> SceneResult<()> {
        for (key, ids) in self.index.buckets() {
            for id in ids {
                let Some(entry) = self.entries.get(id) else {
                    return Err(SceneError::DanglingIndex {
                        id: id.clone(),
                        group: key.to_string(),
                    });
                };
                if &entry.group_key != key {
                    return Err(SceneError::GroupMismatch {
                        id: id.clone(),
                        recorded: entry.group_key.to_string(),
                        indexed: key.to_string(),
                    });
                }
            }
        }
        for id in self.entries.keys() {
            if self.index.group_of(id).is_none() {
                return Err(SceneError::UnindexedEntry { id: id.clone() });
            }
        }
        Ok(())
    }

    /// Registers a change listener.
    pub fn subscribe(&mut self) -> Receiver<SceneChanged> {
        self.notifier.subscribe()
    }

    /// Drops every entry.
    pub fn clear(&mut self) {
        let removed = self.entries.len();
        self.entries.clear();
        self.index.clear();
        self.publish(None, 0, removed);
    }

    /// Stored entry for `id`.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&RenderableEntry> {
        self.entries.get(id)
    }

    /// Number of stored objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bumped on every mutation.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Read access to the group index.
    #[must_use]
    pub const fn index(&self) -> &GroupIndex {
        &self.index
    }

    fn publish(&mut self, frame_id: Option<u64>, upserted: usize, removed: usize) {
        self.generation += 1;
        self.notifier.notify(SceneChanged {
            generation: self.generation,
            frame_id,
            upserted,
            removed,
        });
    }
}
