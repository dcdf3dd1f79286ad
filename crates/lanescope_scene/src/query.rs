//! # Renderable Queries
//!
//! Filters applied when a rendering backend reads the store.

use std::collections::HashSet;

use crate::flatten::GroupKey;
use crate::store::RenderableEntry;

/// What a backend wants to draw.
#[derive(Clone, Debug, Default)]
pub struct RenderQuery {
    /// Case-insensitive substring the object id must contain.
    pub id_filter: Option<String>,
    /// View bits; an entry matches when its effective mask shares one.
    pub view: Option<u8>,
}

impl RenderQuery {
    /// Everything visible.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Restricts to ids containing `filter`, ignoring case.
    #[must_use]
    pub fn with_id_filter(mut self, filter: impl Into<String>) -> Self {
        self.id_filter = Some(filter.into());
        self
    }

    /// Restricts to entries shown in `view`.
    #[must_use]
    pub const fn in_view(mut self, view: u8) -> Self {
        self.view = Some(view);
        self
    }

    pub(crate) fn compile(&self) -> CompiledQuery {
        CompiledQuery {
            needle: self
                .id_filter
                .as_deref()
                .filter(|f| !f.is_empty())
                .map(str::to_lowercase),
            view: self.view,
        }
    }
}

pub(crate) struct CompiledQuery {
    needle: Option<String>,
    view: Option<u8>,
}

impl CompiledQuery {
    pub(crate) fn matches(&self, entry: &RenderableEntry, overrides: &VisibilityOverrides) -> bool {
        if !entry.is_visible() || overrides.hides(entry) {
            return false;
        }
        if let Some(view) = self.view {
            if entry.effective_view_mask() & view == 0 {
                return false;
            }
        }
        match &self.needle {
            Some(needle) => entry.object.base.id.to_lowercase().contains(needle.as_str()),
            None => true,
        }
    }
}

/// Client-side visibility toggles layered over producer visibility.
#[derive(Clone, Debug, Default)]
pub struct VisibilityOverrides {
    hidden_layers: HashSet<String>,
    hidden_groups: HashSet<GroupKey>,
}

impl VisibilityOverrides {
    /// Shows or hides a layer.
    pub fn set_layer_visible(&mut self, layer_id: &str, visible: bool) {
        if visible {
            self.hidden_layers.remove(layer_id);
        } else {
            self.hidden_layers.insert(layer_id.to_owned());
        }
    }

    /// Shows or hides a group.
    pub fn set_group_visible(&mut self, key: &GroupKey, visible: bool) {
        if visible {
            self.hidden_groups.remove(key);
        } else {
            self.hidden_groups.insert(key.clone());
        }
    }

    /// True when the entry's layer or group is toggled off.
    #[must_use]
    pub fn hides(&self, entry: &RenderableEntry) -> bool {
        self.hidden_layers.contains(&entry.layer_id) || self.hidden_groups.contains(&entry.group_key)
    }
}
