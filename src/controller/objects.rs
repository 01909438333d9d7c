use crate::error::Result;
use serde_json::Value;

/// Where object routes look up their target, keyed by the controller's
/// lookup field.
pub trait ObjectSource: Send + Sync + 'static {
    fn get(&self, lookup: &Value) -> Result<Option<Value>>;
}

impl<F> ObjectSource for F
where
    F: Fn(&Value) -> Result<Option<Value>> + Send + Sync + 'static,
{
    fn get(&self, lookup: &Value) -> Result<Option<Value>> {
        self(lookup)
    }
}

/// A fixed list of JSON objects searched by one key.
#[derive(Debug, Clone)]
pub struct ObjectList {
    key: String,
    items: Vec<Value>,
}

impl ObjectList {
    pub fn new(key: impl Into<String>, items: Vec<Value>) -> Self {
        Self {
            key: key.into(),
            items,
        }
    }

    pub fn items(&self) -> &[Value] {
        &self.items
    }
}

/// Path values arrive as strings unless annotated, so `"7"` matches `7`.
fn lookup_matches(field: &Value, lookup: &Value) -> bool {
    if field == lookup {
        return true;
    }
    match (field, lookup) {
        (Value::Number(n), Value::String(s)) | (Value::String(s), Value::Number(n)) => {
            n.to_string() == *s
        }
        _ => false,
    }
}

impl ObjectSource for ObjectList {
    fn get(&self, lookup: &Value) -> Result<Option<Value>> {
        Ok(self
            .items
            .iter()
            .find(|item| item.get(&self.key).is_some_and(|field| lookup_matches(field, lookup)))
            .cloned())
    }
}
