// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Element highlighting.
//!
//! Highlights are kept as named selection groups. The table bridge only ever
//! writes the [`DEFAULT_GROUP`].

use crate::config::HighlightStyle;
use crate::engine::Engine;
use crate::error::Result;
use futures::future::LocalBoxFuture;
use futures::FutureExt;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Selection group written by table interactions.
pub const DEFAULT_GROUP: &str = "default";

/// Identifier of a model element as understood by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(pub String);

impl From<&str> for ElementId {
    fn from(id: &str) -> Self {
        ElementId(id.to_string())
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Named selection groups, at most one set per group.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionSet {
    groups: FxHashMap<String, FxHashSet<ElementId>>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the set of `group`.
    pub fn replace(&mut self, group: &str, ids: FxHashSet<ElementId>) {
        self.groups.insert(group.to_string(), ids);
    }

    pub fn get(&self, group: &str) -> Option<&FxHashSet<ElementId>> {
        self.groups.get(group)
    }

    /// Empty set for unknown groups.
    pub fn ids(&self, group: &str) -> FxHashSet<ElementId> {
        self.groups.get(group).cloned().unwrap_or_default()
    }

    pub fn groups(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.groups.values().all(FxHashSet::is_empty)
    }

    /// Drop every group, returning their names.
    pub fn clear(&mut self) -> Vec<String> {
        self.groups.drain().map(|(group, _)| group).collect()
    }
}

/// Resolves element identifiers for table interactions.
pub trait ElementQuery {
    fn elements_of_type(&self, element_type: &str) -> LocalBoxFuture<'static, Result<Vec<ElementId>>>;
    fn elements_in_level(&self, level: &str) -> LocalBoxFuture<'static, Result<Vec<ElementId>>>;
}

/// Fixed lookup tables standing in for a model query service.
#[derive(Debug, Clone, Default)]
pub struct StaticElementQuery {
    by_type: FxHashMap<String, Vec<ElementId>>,
    by_level: FxHashMap<String, Vec<ElementId>>,
    any_type: Vec<ElementId>,
    any_level: Vec<ElementId>,
}

impl StaticElementQuery {
    /// Every type resolves to `frag_1, frag_2`, every level to `frag_3, frag_4`.
    pub fn reference() -> Self {
        Self {
            any_type: vec!["frag_1".into(), "frag_2".into()],
            any_level: vec!["frag_3".into(), "frag_4".into()],
            ..Default::default()
        }
    }

    pub fn with_type(mut self, element_type: &str, ids: &[&str]) -> Self {
        self.by_type
            .insert(element_type.to_string(), ids.iter().map(|&id| id.into()).collect());
        self
    }

    pub fn with_level(mut self, level: &str, ids: &[&str]) -> Self {
        self.by_level
            .insert(level.to_string(), ids.iter().map(|&id| id.into()).collect());
        self
    }
}

impl ElementQuery for StaticElementQuery {
    fn elements_of_type(&self, element_type: &str) -> LocalBoxFuture<'static, Result<Vec<ElementId>>> {
        tracing::debug!(element_type, "Getting elements of type");
        let ids = self.by_type.get(element_type).unwrap_or(&self.any_type).clone();
        async move { Ok(ids) }.boxed_local()
    }

    fn elements_in_level(&self, level: &str) -> LocalBoxFuture<'static, Result<Vec<ElementId>>> {
        tracing::debug!(level, "Getting elements in level");
        let ids = self.by_level.get(level).unwrap_or(&self.any_level).clone();
        async move { Ok(ids) }.boxed_local()
    }
}

/// Selection state plus the material used to show it.
#[derive(Debug, Clone, Default)]
pub struct Highlighter {
    selection: SelectionSet,
    style: HighlightStyle,
}

impl Highlighter {
    pub fn new(style: HighlightStyle) -> Self {
        Self {
            selection: SelectionSet::new(),
            style,
        }
    }

    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    pub fn style(&self) -> &HighlightStyle {
        &self.style
    }

    /// Replace `group` with `ids` and show it in the engine.
    pub fn highlight<E: Engine>(&mut self, engine: &mut E, group: &str, ids: impl IntoIterator<Item = ElementId>) {
        let ids: FxHashSet<ElementId> = ids.into_iter().collect();
        engine.highlight(group, &ids, &self.style);
        self.selection.replace(group, ids);
    }

    /// Clear every group, in the engine too.
    pub fn reset<E: Engine>(&mut self, engine: &mut E) {
        for group in self.selection.clear() {
            engine.clear_highlight(&group);
        }
    }

    /// Forget the selection without touching the engine (used on teardown).
    pub fn forget(&mut self) {
        self.selection.clear();
    }
}
