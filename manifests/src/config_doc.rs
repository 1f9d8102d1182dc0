use indexmap::IndexMap;
use serde_yaml::{Mapping, Value};

use crate::errors::{NotApplicable, ParseError};

pub type NodeMap = IndexMap<String, ConfigNode>;

/// One node of a parsed collector configuration.
#[derive(Clone, Debug, PartialEq)]
pub enum ConfigNode {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Seq(Vec<ConfigNode>),
    Map(NodeMap),
}

impl ConfigNode {
    pub fn kind(&self) -> &'static str {
        match self {
            ConfigNode::Null => "null",
            ConfigNode::Bool(_) => "bool",
            ConfigNode::Int(_) | ConfigNode::Float(_) => "number",
            ConfigNode::Str(_) => "string",
            ConfigNode::Seq(_) => "sequence",
            ConfigNode::Map(_) => "map",
        }
    }

    pub fn map<K: Into<String>>(entries: impl IntoIterator<Item = (K, ConfigNode)>) -> Self {
        ConfigNode::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn as_map(&self) -> Option<&NodeMap> {
        match self {
            ConfigNode::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut NodeMap> {
        match self {
            ConfigNode::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigNode::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_seq(&self) -> Option<&[ConfigNode]> {
        match self {
            ConfigNode::Seq(items) => Some(items),
            _ => None,
        }
    }

    fn from_yaml(value: Value) -> Result<Self, ParseError> {
        Ok(match value {
            Value::Null => ConfigNode::Null,
            Value::Bool(b) => ConfigNode::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => ConfigNode::Int(i),
                None => ConfigNode::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => ConfigNode::Str(s),
            Value::Sequence(items) => ConfigNode::Seq(
                items
                    .into_iter()
                    .map(ConfigNode::from_yaml)
                    .collect::<Result<_, _>>()?,
            ),
            Value::Mapping(mapping) => {
                let mut map = NodeMap::with_capacity(mapping.len());
                for (key, value) in mapping {
                    map.insert(key_to_string(key)?, ConfigNode::from_yaml(value)?);
                }
                ConfigNode::Map(map)
            }
        })
    }

    fn to_yaml(&self) -> Value {
        match self {
            ConfigNode::Null => Value::Null,
            ConfigNode::Bool(b) => Value::Bool(*b),
            ConfigNode::Int(i) => Value::Number((*i).into()),
            ConfigNode::Float(f) => Value::Number((*f).into()),
            ConfigNode::Str(s) => Value::String(s.clone()),
            ConfigNode::Seq(items) => {
                Value::Sequence(items.iter().map(ConfigNode::to_yaml).collect())
            }
            ConfigNode::Map(map) => {
                let mut mapping = Mapping::new();
                for (key, value) in map {
                    mapping.insert(Value::String(key.clone()), value.to_yaml());
                }
                Value::Mapping(mapping)
            }
        }
    }
}

impl From<&str> for ConfigNode {
    fn from(value: &str) -> Self {
        ConfigNode::Str(value.to_string())
    }
}

impl From<String> for ConfigNode {
    fn from(value: String) -> Self {
        ConfigNode::Str(value)
    }
}

impl From<i64> for ConfigNode {
    fn from(value: i64) -> Self {
        ConfigNode::Int(value)
    }
}

impl From<bool> for ConfigNode {
    fn from(value: bool) -> Self {
        ConfigNode::Bool(value)
    }
}

fn key_to_string(key: Value) -> Result<String, ParseError> {
    match key {
        Value::String(s) => Ok(s),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Err(ParseError::UnsupportedKey("null")),
        Value::Sequence(_) => Err(ParseError::UnsupportedKey("sequence")),
        Value::Mapping(_) => Err(ParseError::UnsupportedKey("mapping")),
    }
}

fn joined(path: &[&str]) -> String {
    path.join(".")
}

/// Path based access into a configuration map. Lookups never panic on absent or
/// differently shaped branches, they report [`NotApplicable`] instead.
pub trait MapExt {
    fn node_at(&self, path: &[&str]) -> Result<&ConfigNode, NotApplicable>;
    fn map_at(&self, path: &[&str]) -> Result<&NodeMap, NotApplicable>;
    fn map_at_mut(&mut self, path: &[&str]) -> Result<&mut NodeMap, NotApplicable>;
    /// Like [`MapExt::map_at_mut`] but creates missing or null intermediate maps.
    fn ensure_map_at(&mut self, path: &[&str]) -> Result<&mut NodeMap, NotApplicable>;
    fn remove_at(&mut self, path: &[&str]) -> Result<ConfigNode, NotApplicable>;
    fn set_at(
        &mut self,
        path: &[&str],
        value: ConfigNode,
    ) -> Result<Option<ConfigNode>, NotApplicable>;
    /// Renames `from` to `to` keeping the entry's position. Fails when `to` already exists.
    fn rename_key(&mut self, from: &str, to: &str) -> Result<(), NotApplicable>;
}

impl MapExt for NodeMap {
    fn node_at(&self, path: &[&str]) -> Result<&ConfigNode, NotApplicable> {
        let Some((last, parents)) = path.split_last() else {
            return Err(NotApplicable::Missing(String::new()));
        };
        self.map_at(parents)?
            .get(*last)
            .ok_or_else(|| NotApplicable::Missing(joined(path)))
    }

    fn map_at(&self, path: &[&str]) -> Result<&NodeMap, NotApplicable> {
        let mut current = self;
        for (depth, key) in path.iter().enumerate() {
            current = match current.get(*key) {
                Some(ConfigNode::Map(next)) => next,
                Some(other) => {
                    return Err(NotApplicable::WrongType {
                        path: joined(&path[..=depth]),
                        expected: "map",
                        found: other.kind(),
                    })
                }
                None => return Err(NotApplicable::Missing(joined(&path[..=depth]))),
            };
        }
        Ok(current)
    }

    fn map_at_mut(&mut self, path: &[&str]) -> Result<&mut NodeMap, NotApplicable> {
        let mut current = self;
        for (depth, key) in path.iter().enumerate() {
            current = match current.get_mut(*key) {
                Some(ConfigNode::Map(next)) => next,
                Some(other) => {
                    return Err(NotApplicable::WrongType {
                        path: joined(&path[..=depth]),
                        expected: "map",
                        found: other.kind(),
                    })
                }
                None => return Err(NotApplicable::Missing(joined(&path[..=depth]))),
            };
        }
        Ok(current)
    }

    fn ensure_map_at(&mut self, path: &[&str]) -> Result<&mut NodeMap, NotApplicable> {
        let mut current = self;
        for (depth, key) in path.iter().enumerate() {
            let entry = current.entry(key.to_string()).or_insert(ConfigNode::Null);
            if matches!(entry, ConfigNode::Null) {
                *entry = ConfigNode::Map(NodeMap::new());
            }
            current = match entry {
                ConfigNode::Map(next) => next,
                other => {
                    return Err(NotApplicable::WrongType {
                        path: joined(&path[..=depth]),
                        expected: "map",
                        found: other.kind(),
                    })
                }
            };
        }
        Ok(current)
    }

    fn remove_at(&mut self, path: &[&str]) -> Result<ConfigNode, NotApplicable> {
        let Some((last, parents)) = path.split_last() else {
            return Err(NotApplicable::Missing(String::new()));
        };
        self.map_at_mut(parents)?
            .shift_remove(*last)
            .ok_or_else(|| NotApplicable::Missing(joined(path)))
    }

    fn set_at(
        &mut self,
        path: &[&str],
        value: ConfigNode,
    ) -> Result<Option<ConfigNode>, NotApplicable> {
        let Some((last, parents)) = path.split_last() else {
            return Err(NotApplicable::Missing(String::new()));
        };
        Ok(self.ensure_map_at(parents)?.insert(last.to_string(), value))
    }

    fn rename_key(&mut self, from: &str, to: &str) -> Result<(), NotApplicable> {
        if self.contains_key(to) {
            return Err(NotApplicable::WrongType {
                path: to.to_string(),
                expected: "absent key",
                found: "existing key",
            });
        }
        let (index, _, value) = self
            .shift_remove_full(from)
            .ok_or_else(|| NotApplicable::Missing(from.to_string()))?;
        self.shift_insert(index, to.to_string(), value);
        Ok(())
    }
}

/// Parsed collector configuration. Key order of the source text is preserved.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConfigDocument {
    root: NodeMap,
}

impl ConfigDocument {
    /// Blank input yields an empty document. The top level must be a mapping.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let value: Value = serde_yaml::from_str(text)?;
        match ConfigNode::from_yaml(value)? {
            ConfigNode::Map(root) => Ok(Self { root }),
            ConfigNode::Null => Ok(Self::default()),
            other => Err(ParseError::NotAMapping(other.kind())),
        }
    }

    pub fn from_map(root: NodeMap) -> Self {
        Self { root }
    }

    pub fn serialize(&self) -> Result<String, serde_yaml::Error> {
        if self.root.is_empty() {
            return Ok(String::new());
        }
        let value = ConfigNode::Map(self.root.clone()).to_yaml();
        let text = serde_yaml::to_string(&value)?;
        let mut text = text.trim_start_matches("---\n").to_string();
        if !text.ends_with('\n') {
            text.push('\n');
        }
        Ok(text)
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    pub fn root(&self) -> &NodeMap {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut NodeMap {
        &mut self.root
    }

    pub fn get(&self, path: &[&str]) -> Option<&ConfigNode> {
        self.root.node_at(path).ok()
    }

    pub fn map_at(&self, path: &[&str]) -> Result<&NodeMap, NotApplicable> {
        self.root.map_at(path)
    }

    pub fn map_at_mut(&mut self, path: &[&str]) -> Result<&mut NodeMap, NotApplicable> {
        self.root.map_at_mut(path)
    }
}
