//! String interning across descriptors.
//!
//! Deployments parse hundreds of manifests that repeat the same
//! namespace names, package names and directive values. An `InternPool`
//! folds those into shared allocations. The pool is entirely optional:
//! a descriptor parsed without one behaves identically and simply keeps
//! its own strings.

use crate::descriptor::ModuleDescriptor;
use crate::filter::Filter;
use crate::values::{Attrs, AttrValue, Dirs};
use ahash::AHashSet;
use parking_lot::Mutex;
use std::sync::Arc;

const PURGE_FLOOR: usize = 256;

#[derive(Debug, Default)]
struct PoolState {
    entries: AHashSet<Arc<str>>,
    purge_at: usize,
}

/// Shared string pool. Cheap to clone a handle out of; safe to use from
/// several parsing threads at once.
#[derive(Debug)]
pub struct InternPool {
    state: Mutex<PoolState>,
}

impl Default for InternPool {
    fn default() -> Self {
        Self::new()
    }
}

impl InternPool {
    pub fn new() -> Self {
        InternPool {
            state: Mutex::new(PoolState {
                entries: AHashSet::new(),
                purge_at: PURGE_FLOOR,
            }),
        }
    }

    /// Number of distinct strings currently held.
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return the pooled copy of `value`, adding it if absent. When the
    /// pool grows past its watermark, entries no longer referenced
    /// outside the pool are dropped first.
    pub fn intern(&self, value: &Arc<str>) -> Arc<str> {
        let mut state = self.state.lock();
        if let Some(existing) = state.entries.get(value.as_ref()) {
            return existing.clone();
        }
        if state.entries.len() >= state.purge_at {
            state.entries.retain(|s| Arc::strong_count(s) > 1);
            state.purge_at = PURGE_FLOOR.max(state.entries.len() * 2);
        }
        state.entries.insert(value.clone());
        value.clone()
    }

    /// Rewrite a descriptor's capabilities and requirements to share
    /// pooled strings. Values are unchanged, only their allocations are
    /// deduplicated.
    pub(crate) fn intern_descriptor(&self, descriptor: &mut ModuleDescriptor) {
        let (capabilities, requirements) = descriptor.parts_mut();
        for cap in capabilities {
            cap.namespace = self.intern(&cap.namespace);
            self.intern_dirs(&mut cap.dirs);
            self.intern_attrs(&mut cap.attrs);
        }
        for req in requirements {
            req.namespace = self.intern(&req.namespace);
            self.intern_dirs(&mut req.dirs);
            self.intern_attrs(&mut req.attrs);
            if let Some(filter) = &mut req.filter {
                self.intern_filter(filter);
            }
        }
    }

    fn intern_dirs(&self, dirs: &mut Dirs) {
        let pooled: Dirs = dirs
            .iter()
            .map(|(k, v)| (self.intern(k), self.intern(v)))
            .collect();
        *dirs = pooled;
    }

    fn intern_attrs(&self, attrs: &mut Attrs) {
        let pooled: Attrs = attrs
            .iter()
            .map(|(k, v)| {
                let mut value = v.clone();
                self.intern_value(&mut value);
                (self.intern(k), value)
            })
            .collect();
        *attrs = pooled;
    }

    fn intern_value(&self, value: &mut AttrValue) {
        match value {
            AttrValue::Str(s) => *s = self.intern(s),
            AttrValue::List(items) => {
                for item in items {
                    self.intern_value(item);
                }
            }
            AttrValue::Long(_)
            | AttrValue::Double(_)
            | AttrValue::Version(_)
            | AttrValue::Range(_) => {}
        }
    }

    fn intern_filter(&self, filter: &mut Filter) {
        match filter {
            Filter::And(children) | Filter::Or(children) => {
                for child in children {
                    self.intern_filter(child);
                }
            }
            Filter::Not(child) => self.intern_filter(child),
            Filter::Leaf { attr, value, .. } => {
                *attr = self.intern(attr);
                *value = self.intern(value);
            }
            Filter::MatchAll => {}
        }
    }
}
