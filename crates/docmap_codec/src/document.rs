//! Insertion-ordered, string-keyed document.

use crate::value::Value;

/// A string-keyed document that keeps fields in insertion order.
///
/// Field order is observable: it is the order fields are written in and
/// the order compound index specifications are read in. Equality is
/// order-sensitive; use canonical encoding when order must not matter.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Document {
    entries: Vec<(String, Value)>,
}

impl Document {
    /// Creates an empty document.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Creates an empty document with room for `capacity` fields.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Number of top-level fields.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the document has no fields.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sets a field, replacing an existing value in place.
    ///
    /// Returns the previous value, if any.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    /// Returns the value of a top-level field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Returns a mutable reference to a top-level field.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.entries
            .iter_mut()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Returns true if a top-level field exists.
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Removes a top-level field, keeping the order of the rest.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let pos = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(pos).1)
    }

    /// Resolves a dotted path through nested documents.
    ///
    /// Arrays are not traversed.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let mut current = self.get(segments.next()?)?;
        for segment in segments {
            current = current.as_document()?.get(segment)?;
        }
        Some(current)
    }

    /// Sets a dotted path, creating intermediate documents.
    ///
    /// An intermediate value that is not a document is replaced.
    pub fn set_path(&mut self, path: &str, value: Value) {
        match path.split_once('.') {
            None => {
                self.insert(path, value);
            }
            Some((head, rest)) => {
                if !matches!(self.get(head), Some(Value::Document(_))) {
                    self.insert(head, Document::new());
                }
                if let Some(Value::Document(inner)) = self.get_mut(head) {
                    inner.set_path(rest, value);
                }
            }
        }
    }

    /// Removes a dotted path. Returns the removed value.
    pub fn remove_path(&mut self, path: &str) -> Option<Value> {
        match path.split_once('.') {
            None => self.remove(path),
            Some((head, rest)) => match self.get_mut(head) {
                Some(Value::Document(inner)) => inner.remove_path(rest),
                _ => None,
            },
        }
    }

    /// Flattens nested documents into dotted paths.
    ///
    /// `{a: {b: 1}, c: 2}` becomes `{"a.b": 1, c: 2}`. Arrays and empty
    /// sub-documents are kept as leaf values.
    #[must_use]
    pub fn flattened(&self) -> Document {
        let mut out = Document::with_capacity(self.len());
        flatten_into(&mut out, None, self);
        out
    }

    /// Iterates fields in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Iterates field names in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Iterates values in order.
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(_, v)| v)
    }
}

fn flatten_into(out: &mut Document, prefix: Option<&str>, doc: &Document) {
    for (key, value) in doc.iter() {
        let path = match prefix {
            Some(p) => format!("{p}.{key}"),
            None => key.to_string(),
        };
        match value {
            Value::Document(inner) if !inner.is_empty() => flatten_into(out, Some(&path), inner),
            other => {
                out.insert(path, other.clone());
            }
        }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Document {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut doc = Document::new();
        doc.extend(iter);
        doc
    }
}

impl<K: Into<String>, V: Into<Value>> Extend<(K, V)> for Document {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl IntoIterator for Document {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_replaces_in_place() {
        let mut doc = Document::new();
        doc.insert("a", 1);
        doc.insert("b", 2);
        let previous = doc.insert("a", 3);

        assert_eq!(previous, Some(Value::Integer(1)));
        assert_eq!(doc.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(doc.get("a"), Some(&Value::Integer(3)));
    }

    #[test]
    fn remove_keeps_order() {
        let mut doc: Document = [("x", 1), ("y", 2), ("z", 3)].into_iter().collect();
        assert_eq!(doc.remove("y"), Some(Value::Integer(2)));
        assert_eq!(doc.keys().collect::<Vec<_>>(), vec!["x", "z"]);
        assert_eq!(doc.remove("y"), None);
    }

    #[test]
    fn dotted_paths() {
        let mut doc = Document::new();
        doc.set_path("owner.name", Value::from("ann"));
        doc.set_path("owner.age", Value::from(7));
        doc.set_path("flag", Value::from(true));

        assert_eq!(doc.get_path("owner.name"), Some(&Value::from("ann")));
        assert_eq!(doc.get_path("owner.missing"), None);
        assert_eq!(doc.get_path("flag.inner"), None);

        assert_eq!(doc.remove_path("owner.age"), Some(Value::from(7)));
        assert_eq!(doc.get_path("owner.age"), None);
    }

    #[test]
    fn flattened_expands_sub_documents() {
        let inner: Document = [("b", 1)].into_iter().collect();
        let mut doc = Document::new();
        doc.insert("a", inner);
        doc.insert("c", vec![1i64, 2]);
        doc.insert("e", Document::new());

        let flat = doc.flattened();
        assert_eq!(flat.keys().collect::<Vec<_>>(), vec!["a.b", "c", "e"]);
        assert_eq!(flat.get("a.b"), Some(&Value::Integer(1)));
    }
}
