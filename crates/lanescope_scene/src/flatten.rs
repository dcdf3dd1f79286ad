//! # Frame Flattening
//!
//! Walks a decoded frame and turns its tree into a flat list of objects,
//! each tagged with the group key it is invalidated by.
//!
//! ## Group Keys
//!
//! ```text
//! explicit "group" property on the object   →  "<value>"
//! nearest enclosing Group node              →  "<layer>/<group>"
//! no enclosing Group                        →  "<layer>/<topic>/default"
//! empty layer or group id                   →  "__default__"  (warning)
//! ```
//!
//! Every group key reached during the walk is reported as touched, even
//! when the group carried no objects this frame.

use std::collections::BTreeSet;
use std::fmt;

use lanescope_protocol::{Frame, Node, Object};

use crate::error::SceneWarning;

/// Property that pins an object to an explicit group.
pub const GROUP_PROPERTY: &str = "group";

/// Key of the synthetic bucket for objects with malformed ancestry.
pub const DEFAULT_GROUP_KEY: &str = "__default__";

/// Invalidation bucket an object belongs to.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupKey(String);

impl GroupKey {
    /// Wraps a raw key.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The synthetic default bucket.
    #[must_use]
    pub fn fallback() -> Self {
        Self(DEFAULT_GROUP_KEY.to_owned())
    }

    /// Key of a Group node inside a layer.
    #[must_use]
    pub fn for_group(layer_id: &str, group_id: &str) -> Self {
        Self(format!("{layer_id}/{group_id}"))
    }

    /// Key for objects hanging directly off a topic.
    #[must_use]
    pub fn topic_default(layer_id: &str, topic_id: &str) -> Self {
        Self(format!("{layer_id}/{topic_id}/default"))
    }

    /// Raw key.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An object lifted out of the frame tree.
#[derive(Debug)]
pub struct FlatObject {
    /// The object, moved out of the frame.
    pub object: Object,
    /// Bucket it is indexed under.
    pub group_key: GroupKey,
    /// Owning layer id.
    pub layer_id: String,
    /// True when the layer and every enclosing group are visible.
    pub ancestors_visible: bool,
    /// Intersection of the layer and enclosing group view masks.
    pub ancestor_view_mask: u8,
}

/// Output of [`flatten_frame`].
#[derive(Debug, Default)]
pub struct FlattenedFrame {
    /// Frame id.
    pub frame_id: u64,
    /// Objects in frame order.
    pub objects: Vec<FlatObject>,
    /// Group keys reported this frame.
    pub touched: BTreeSet<GroupKey>,
    /// Ancestry problems found on the way.
    pub warnings: Vec<SceneWarning>,
}

struct Ancestry<'a> {
    layer_id: &'a str,
    topic_id: &'a str,
    group: Option<GroupKey>,
    visible: bool,
    view_mask: u8,
    malformed: Option<&'static str>,
}

/// Flattens a frame, consuming it.
#[must_use]
pub fn flatten_frame(frame: Frame) -> FlattenedFrame {
    let mut out = FlattenedFrame {
        frame_id: frame.id,
        ..FlattenedFrame::default()
    };

    for layer in frame.layers {
        let layer_malformed = layer.base.id.is_empty().then_some("empty layer id");
        for topic in layer.topics {
            let Some(root) = topic.root else {
                continue;
            };
            let ancestry = Ancestry {
                layer_id: &layer.base.id,
                topic_id: &topic.id,
                group: None,
                visible: layer.base.visible,
                view_mask: layer.base.view_mask,
                malformed: layer_malformed,
            };
            walk(root, &ancestry, &mut out);
        }
    }

    out
}

fn walk(node: Node, ancestry: &Ancestry<'_>, out: &mut FlattenedFrame) {
    match node {
        Node::Group(group) => {
            let malformed = ancestry
                .malformed
                .or_else(|| group.base.id.is_empty().then_some("empty group id"));
            let key = if malformed.is_some() {
                GroupKey::fallback()
            } else {
                GroupKey::for_group(ancestry.layer_id, &group.base.id)
            };
            out.touched.insert(key.clone());

            let nested = Ancestry {
                layer_id: ancestry.layer_id,
                topic_id: ancestry.topic_id,
                group: Some(key),
                visible: ancestry.visible && group.base.visible,
                view_mask: ancestry.view_mask & group.base.view_mask,
                malformed,
            };
            for child in group.children {
                walk(child, &nested, out);
            }
        }
        Node::Object(object) => {
            let explicit = object
                .base
                .property(GROUP_PROPERTY)
                .filter(|g| !g.is_empty())
                .map(GroupKey::new);

            let group_key = match (explicit, ancestry.malformed, &ancestry.group) {
                (Some(key), _, _) => key,
                (None, Some(reason), _) => {
                    let warning = SceneWarning::OrphanAncestry {
                        object_id: object.base.id.clone(),
                        reason,
                    };
                    tracing::warn!(%warning, "orphan object");
                    out.warnings.push(warning);
                    GroupKey::fallback()
                }
                (None, None, Some(group)) => group.clone(),
                (None, None, None) => GroupKey::topic_default(ancestry.layer_id, ancestry.topic_id),
            };
            out.touched.insert(group_key.clone());

            out.objects.push(FlatObject {
                object,
                group_key,
                layer_id: ancestry.layer_id.to_owned(),
                ancestors_visible: ancestry.visible,
                ancestor_view_mask: ancestry.view_mask,
            });
        }
    }
}
