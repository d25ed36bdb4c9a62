//! Per-source data packages and the reply that collects them.

use std::collections::BTreeMap;
use std::ops::Index;

use bytes::Bytes;

use super::array::{ArrayView, DType};
use super::value::Value;

#[derive(Debug, Clone)]
struct ArrayEntry {
    /// Index into the package's retained frames.
    frame: usize,
    shape: Vec<usize>,
    dtype: DType,
}

/// Decoded data of one source.
///
/// The package owns every frame of its group (headers included). Array views
/// handed out by [`DataPackage::array`] borrow those frames, so the borrow
/// checker keeps the package alive for as long as any view is in use.
#[derive(Debug, Clone, Default)]
pub struct DataPackage {
    frames: Vec<Bytes>,
    values: BTreeMap<String, Value>,
    arrays: BTreeMap<String, ArrayEntry>,
}

impl DataPackage {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Keep a frame alive for the package's lifetime. Returns its index.
    pub(crate) fn retain(&mut self, frame: Bytes) -> usize {
        self.frames.push(frame);
        self.frames.len() - 1
    }

    /// Insert a value, returning the one it replaced.
    pub(crate) fn insert_value(&mut self, key: String, value: Value) -> Option<Value> {
        self.values.insert(key, value)
    }

    /// Register an array stored in a retained frame. Returns `true` if an
    /// array with the same path was replaced.
    pub(crate) fn insert_array(
        &mut self,
        path: String,
        frame: usize,
        shape: Vec<usize>,
        dtype: DType,
    ) -> bool {
        debug_assert!(frame < self.frames.len());
        self.arrays
            .insert(path, ArrayEntry { frame, shape, dtype })
            .is_some()
    }

    /// Get an inline (msgpack) value by key.
    pub fn value(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Iterate over inline values in key order.
    pub fn values(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Get a view of the array stored under `path`.
    pub fn array(&self, path: &str) -> Option<ArrayView<'_>> {
        self.arrays.get(path).map(|entry| self.view(entry))
    }

    /// Iterate over array views in path order.
    pub fn arrays(&self) -> impl Iterator<Item = (&str, ArrayView<'_>)> {
        self.arrays
            .iter()
            .map(move |(path, entry)| (path.as_str(), self.view(entry)))
    }

    fn view<'a>(&'a self, entry: &'a ArrayEntry) -> ArrayView<'a> {
        ArrayView::new(&self.frames[entry.frame], &entry.shape, &entry.dtype)
    }

    /// Whether `key` names either an inline value or an array.
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key) || self.arrays.contains_key(key)
    }

    /// Total bytes of all retained frames.
    pub fn size(&self) -> usize {
        self.frames.iter().map(Bytes::len).sum()
    }

    /// Number of retained frames.
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }
}

impl Index<&str> for DataPackage {
    type Output = Value;

    /// # Panics
    ///
    /// Panics if no inline value exists under `key`.
    fn index(&self, key: &str) -> &Value {
        match self.values.get(key) {
            Some(value) => value,
            None => panic!("no value under key '{}'", key),
        }
    }
}

/// All packages of one reply, keyed by source name.
///
/// Packages iterate in the order their groups were sealed.
#[derive(Debug, Clone, Default)]
pub struct Reply {
    packages: Vec<(String, DataPackage)>,
}

impl Reply {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sealed package. A source already present keeps its first package.
    pub(crate) fn seal(&mut self, source: String, package: DataPackage) {
        if self.get(&source).is_some() {
            tracing::warn!("Duplicate source '{}' in reply, keeping the first package", source);
            return;
        }
        tracing::debug!(
            "Sealed package for '{}': {} values, {} arrays, {} bytes",
            source,
            package.values.len(),
            package.arrays.len(),
            package.size()
        );
        self.packages.push((source, package));
    }

    pub fn get(&self, source: &str) -> Option<&DataPackage> {
        self.packages
            .iter()
            .find(|(name, _)| name == source)
            .map(|(_, package)| package)
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Source names in seal order.
    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.packages.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DataPackage)> {
        self.packages.iter().map(|(name, p)| (name.as_str(), p))
    }
}

impl Index<&str> for Reply {
    type Output = DataPackage;

    /// # Panics
    ///
    /// Panics if the reply has no package for `source`.
    fn index(&self, source: &str) -> &DataPackage {
        match self.get(source) {
            Some(package) => package,
            None => panic!("no package for source '{}'", source),
        }
    }
}

impl IntoIterator for Reply {
    type Item = (String, DataPackage);
    type IntoIter = std::vec::IntoIter<(String, DataPackage)>;

    fn into_iter(self) -> Self::IntoIter {
        self.packages.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn package_with_array() -> DataPackage {
        let mut package = DataPackage::new();
        package.retain(Bytes::from_static(b"header"));
        let raw: Vec<u8> = [7u32, 8].iter().flat_map(|v| v.to_le_bytes()).collect();
        let frame = package.retain(Bytes::from(raw));
        package.insert_array("data.image".to_string(), frame, vec![2], DType::U32);
        package.insert_value("trainId".to_string(), Value::UInt(10));
        package
    }

    #[test]
    fn test_package_accessors() {
        let package = package_with_array();

        assert_eq!(package.frame_count(), 2);
        assert_eq!(package.size(), 6 + 8);
        assert!(package.contains("trainId"));
        assert!(package.contains("data.image"));
        assert!(!package.contains("nope"));
        assert_eq!(package["trainId"], Value::UInt(10));

        let view = package.array("data.image").unwrap();
        assert_eq!(view.shape(), &[2]);
        assert_eq!(view.to_vec::<u32>().unwrap(), vec![7, 8]);
        assert_eq!(package.arrays().count(), 1);
        assert_eq!(package.values().count(), 1);
    }

    #[test]
    fn test_views_borrow_retained_frames() {
        let mut package = DataPackage::new();
        let frame = Bytes::from(vec![1u8, 2, 3]);
        let ptr = frame.as_ptr();
        let index = package.retain(frame);
        package.insert_array("a".to_string(), index, vec![3], DType::U8);

        assert_eq!(package.array("a").unwrap().as_bytes().as_ptr(), ptr);
    }

    #[test]
    fn test_reply_keeps_seal_order_and_first_duplicate() {
        let mut reply = Reply::new();
        reply.seal("B".to_string(), package_with_array());
        reply.seal("A".to_string(), DataPackage::new());
        reply.seal("B".to_string(), DataPackage::new());

        assert_eq!(reply.len(), 2);
        assert_eq!(reply.sources().collect::<Vec<_>>(), vec!["B", "A"]);
        assert!(reply["B"].contains("trainId"));
        assert!(reply.get("C").is_none());
    }

    #[test]
    #[should_panic(expected = "no value under key")]
    fn test_index_missing_key_panics() {
        let package = DataPackage::new();
        let _ = &package["missing"];
    }
}
