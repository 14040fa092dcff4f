//! Multi-experiment server mode (§0.5): several pre-loaded models
//! served side by side, selected with `BASE <name>` on the line
//! protocol or the `/<base>` path segment over HTTP. Grounded in
//! `ServerBase.cxx`'s `exps` map and its `"available bases: ..."`
//! connect-time greeting.

use std::collections::BTreeMap;

use crate::error::MemlearnError;
use crate::server::model::SharedModel;

#[derive(Default)]
pub struct BaseTable {
    bases: BTreeMap<String, SharedModel>,
}

impl BaseTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, model: SharedModel) {
        self.bases.insert(model.name.clone(), model);
    }

    pub fn get(&self, name: &str) -> crate::Result<SharedModel> {
        self.bases
            .get(name)
            .cloned()
            .ok_or_else(|| MemlearnError::Classification(format!("no such base {name:?}")))
    }

    /// the sole base, for single-experiment deployments where `BASE`
    /// is never sent.
    pub fn default_base(&self) -> crate::Result<SharedModel> {
        self.bases
            .values()
            .next()
            .cloned()
            .ok_or_else(|| MemlearnError::Classification("server has no loaded base".into()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bases.keys().map(String::as_str)
    }

    pub fn is_multi(&self) -> bool {
        self.bases.len() > 1
    }
}
