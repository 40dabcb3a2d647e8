// Copyright 2026 The ANGLE Project Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.
//
// Maps pixel local storage bindings to whatever replaces the plane: a storage image, or a pair of
// framebuffer fetch variables.

use std::collections::BTreeMap;

#[cfg_attr(debug_assertions, derive(Debug))]
pub struct BackingStoreMap<T> {
    // Ordered by binding, so code generated per plane is deterministic.
    map: BTreeMap<u32, T>,
}

impl<T> Default for BackingStoreMap<T> {
    fn default() -> Self {
        BackingStoreMap { map: BTreeMap::new() }
    }
}

impl<T> BackingStoreMap<T> {
    pub fn new() -> BackingStoreMap<T> {
        BackingStoreMap::default()
    }

    // Sets the backing store of a binding.  The binding must not already have one; planes are
    // declared exactly once per binding.
    pub fn insert_new(&mut self, binding: u32, backing_store: T) {
        if self.map.insert(binding, backing_store).is_some() {
            panic!("Internal error: Pixel local storage binding {binding} is declared twice");
        }
    }

    // The backing store of a binding, which must have been declared before use.
    pub fn find(&self, binding: u32) -> &T {
        self.map.get(&binding).unwrap_or_else(|| {
            panic!("Internal error: Pixel local storage binding {binding} is used before declared")
        })
    }

    pub fn binding_ordered(&self) -> impl Iterator<Item = (u32, &T)> {
        self.map.iter().map(|(&binding, backing_store)| (binding, backing_store))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
