//! Sparse feature vectors and the feature-name interner.

use std::collections::{BTreeMap, HashMap};

pub type FeatureId = u32;

/// Bidirectional feature-name interner. Ids are assigned once, at load time
/// (feature-function registration and grammar reading); the map is frozen
/// before decoding starts so decode-time lookups never mutate it.
#[derive(Debug, Default)]
pub struct FeatureMap {
    names: Vec<String>,
    ids: HashMap<String, FeatureId>,
}

impl FeatureMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, name: &str) -> FeatureId {
        if let Some(&id) = self.ids.get(name) {
            return id;
        }
        let id = self.names.len() as FeatureId;
        self.names.push(name.to_string());
        self.ids.insert(name.to_string(), id);
        id
    }

    pub fn get(&self, name: &str) -> Option<FeatureId> {
        self.ids.get(name).copied()
    }

    pub fn name(&self, id: FeatureId) -> &str {
        &self.names[id as usize]
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Sparse mapping from feature id to value.
///
/// Backed by a `BTreeMap` so iteration (and therefore summation and text
/// output) is deterministic across runs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureVector {
    values: BTreeMap<FeatureId, f32>,
}

impl FeatureVector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_default(&self, id: FeatureId) -> f32 {
        self.values.get(&id).copied().unwrap_or(0.0)
    }

    pub fn put(&mut self, id: FeatureId, value: f32) {
        self.values.insert(id, value);
    }

    pub fn add(&mut self, id: FeatureId, value: f32) {
        *self.values.entry(id).or_insert(0.0) += value;
    }

    /// Adds every entry of `other` into this vector.
    pub fn add_in_place(&mut self, other: &FeatureVector) {
        for (&id, &v) in &other.values {
            self.add(id, v);
        }
    }

    /// Dot product with `other`.
    pub fn inner_product(&self, other: &FeatureVector) -> f32 {
        let (small, large) = if self.values.len() <= other.values.len() {
            (self, other)
        } else {
            (other, self)
        };
        small
            .values
            .iter()
            .map(|(&id, &v)| v * large.get_or_default(id))
            .sum()
    }

    /// Drops entries whose absolute value is below `threshold`.
    pub fn prune(&mut self, threshold: f32) {
        self.values.retain(|_, v| v.abs() >= threshold);
    }

    pub fn iter(&self) -> impl Iterator<Item = (FeatureId, f32)> + '_ {
        self.values.iter().map(|(&id, &v)| (id, v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `name=value` pairs separated by spaces, in feature-id order.
    pub fn text_format(&self, map: &FeatureMap) -> String {
        let mut out = String::new();
        for (&id, &v) in &self.values {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(&format!("{}={:.6}", map.name(id), v));
        }
        out
    }
}

impl FromIterator<(FeatureId, f32)> for FeatureVector {
    fn from_iter<T: IntoIterator<Item = (FeatureId, f32)>>(iter: T) -> Self {
        let mut fv = FeatureVector::new();
        for (id, v) in iter {
            fv.add(id, v);
        }
        fv
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_get() {
        let mut fv = FeatureVector::new();
        fv.add(3, 1.5);
        fv.add(3, 0.5);
        fv.put(1, -2.0);
        assert_eq!(fv.get_or_default(3), 2.0);
        assert_eq!(fv.get_or_default(1), -2.0);
        assert_eq!(fv.get_or_default(99), 0.0);
        assert_eq!(fv.len(), 2);
    }

    #[test]
    fn add_in_place_merges() {
        let mut a: FeatureVector = [(0, 1.0), (1, 2.0)].into_iter().collect();
        let b: FeatureVector = [(1, 3.0), (2, -1.0)].into_iter().collect();
        a.add_in_place(&b);
        assert_eq!(a.get_or_default(0), 1.0);
        assert_eq!(a.get_or_default(1), 5.0);
        assert_eq!(a.get_or_default(2), -1.0);
    }

    #[test]
    fn inner_product_is_symmetric() {
        let a: FeatureVector = [(0, 1.0), (1, 2.0), (5, 0.5)].into_iter().collect();
        let b: FeatureVector = [(1, -1.0), (5, 4.0)].into_iter().collect();
        let expected = 2.0 * -1.0 + 0.5 * 4.0;
        assert_eq!(a.inner_product(&b), expected);
        assert_eq!(b.inner_product(&a), expected);
    }

    #[test]
    fn prune_drops_small_entries() {
        let mut fv: FeatureVector = [(0, 0.0001), (1, 1.0), (2, -0.5)].into_iter().collect();
        fv.prune(0.01);
        assert_eq!(fv.len(), 2);
        assert_eq!(fv.get_or_default(0), 0.0);
    }

    #[test]
    fn text_format_in_id_order() {
        let mut map = FeatureMap::new();
        let lm = map.intern("lm_0");
        let glue = map.intern("glue_0");
        let mut fv = FeatureVector::new();
        fv.put(glue, -2.0);
        fv.put(lm, -7.152632);
        assert_eq!(fv.text_format(&map), "lm_0=-7.152632 glue_0=-2.000000");
    }

    #[test]
    fn feature_map_interns_once() {
        let mut map = FeatureMap::new();
        let a = map.intern("tm_0");
        let b = map.intern("tm_0");
        assert_eq!(a, b);
        assert_eq!(map.name(a), "tm_0");
        assert_eq!(map.get("tm_0"), Some(a));
        assert_eq!(map.get("nope"), None);
    }
}
