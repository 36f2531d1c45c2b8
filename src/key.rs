use std::fmt;

use serde_json::Value;

/// Canonical string form of a [`QueryKey`], used as the cache registry key.
/// Two keys are cache-equivalent iff their hashes are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryHash(String);

impl QueryHash {
  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for QueryHash {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// A structured cache key: an ordered sequence of JSON-representable parts.
///
/// Arrays are order-sensitive, objects are order-insensitive: `[{"a":1,"b":2}]`
/// and `[{"b":2,"a":1}]` name the same cache entry, `[1,2]` and `[2,1]` do not.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryKey(Vec<Value>);

impl QueryKey {
  pub fn new(parts: impl IntoIterator<Item = Value>) -> Self {
    QueryKey(parts.into_iter().collect())
  }

  pub fn parts(&self) -> &[Value] {
    &self.0
  }

  /// Canonical hash of the key: object properties are sorted recursively at
  /// every nesting level, array order is preserved. The writer is explicit
  /// so the result never depends on how `serde_json` happens to order maps.
  pub fn hash(&self) -> QueryHash {
    let mut out = String::new();
    out.push('[');
    for (i, part) in self.0.iter().enumerate() {
      if i > 0 {
        out.push(',');
      }
      write_canonical(part, &mut out);
    }
    out.push(']');
    QueryHash(out)
  }
}

impl From<Vec<Value>> for QueryKey {
  fn from(parts: Vec<Value>) -> Self {
    QueryKey(parts)
  }
}

impl FromIterator<Value> for QueryKey {
  fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
    QueryKey(iter.into_iter().collect())
  }
}

fn write_canonical(value: &Value, out: &mut String) {
  match value {
    Value::Array(items) => {
      out.push('[');
      for (i, item) in items.iter().enumerate() {
        if i > 0 {
          out.push(',');
        }
        write_canonical(item, out);
      }
      out.push(']');
    }
    Value::Object(map) => {
      let mut keys: Vec<&String> = map.keys().collect();
      keys.sort_unstable();
      out.push('{');
      for (i, key) in keys.iter().enumerate() {
        if i > 0 {
          out.push(',');
        }
        // Property names get the same JSON escaping as string values.
        write_canonical(&Value::String((*key).clone()), out);
        out.push(':');
        write_canonical(&map[key.as_str()], out);
      }
      out.push('}');
    }
    // Scalars serialize identically regardless of surrounding order.
    scalar => out.push_str(&scalar.to_string()),
  }
}

/// Builds a [`QueryKey`] from JSON-representable parts.
///
/// ```
/// use requery::query_key;
///
/// let key = query_key!["todos", { "page": 2, "done": false }];
/// assert_eq!(key.parts().len(), 2);
/// ```
#[macro_export]
macro_rules! query_key {
  ($($part:tt),* $(,)?) => {
    $crate::key::QueryKey::new(vec![$($crate::key::__json!($part)),*])
  };
}

#[doc(hidden)]
pub use serde_json::json as __json;
