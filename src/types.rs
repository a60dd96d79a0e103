use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Built-in type families. The numeric ids are the ones literal type providers refer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaseType {
    NoType,
    Int,
    Float,
    Bool,
    String,
    List,
    Pair,
    Map,
    Container,
    Type,
}

impl BaseType {
    pub const fn id(self) -> i32 {
        match self {
            BaseType::NoType => 0,
            BaseType::Int => 1,
            BaseType::Float => 2,
            BaseType::Bool => 3,
            BaseType::String => 4,
            BaseType::List => 5,
            BaseType::Pair => 9,
            BaseType::Map => 10,
            BaseType::Container => 16,
            BaseType::Type => 20,
        }
    }

    pub fn from_id(id: i32) -> Option<BaseType> {
        Some(match id {
            0 => BaseType::NoType,
            1 => BaseType::Int,
            2 => BaseType::Float,
            3 => BaseType::Bool,
            4 => BaseType::String,
            5 => BaseType::List,
            9 => BaseType::Pair,
            10 => BaseType::Map,
            16 => BaseType::Container,
            20 => BaseType::Type,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            BaseType::NoType => "unknown",
            BaseType::Int => "int",
            BaseType::Float => "float",
            BaseType::Bool => "bool",
            BaseType::String => "string",
            BaseType::List => "list",
            BaseType::Pair => "pair",
            BaseType::Map => "map",
            BaseType::Container => "container",
            BaseType::Type => "type",
        }
    }

    pub fn is_container(self) -> bool {
        matches!(
            self,
            BaseType::List | BaseType::Pair | BaseType::Map | BaseType::Container
        )
    }
}

/// Static type of an expression.
///
/// Containers carry a key type and a content type; for every other family both
/// stay empty. An empty slot reads as `unknown`, except the key of a list,
/// which is always `int`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GamlType {
    base: BaseType,
    key: Option<Box<GamlType>>,
    content: Option<Box<GamlType>>,
}

impl GamlType {
    pub fn new(base: BaseType) -> Self {
        Self {
            base,
            key: None,
            content: None,
        }
    }

    pub fn no_type() -> Self {
        Self::new(BaseType::NoType)
    }

    pub fn int() -> Self {
        Self::new(BaseType::Int)
    }

    pub fn float() -> Self {
        Self::new(BaseType::Float)
    }

    pub fn bool() -> Self {
        Self::new(BaseType::Bool)
    }

    pub fn string() -> Self {
        Self::new(BaseType::String)
    }

    pub fn type_literal() -> Self {
        Self::new(BaseType::Type)
    }

    pub fn list(content: GamlType) -> Self {
        Self::container(BaseType::List, GamlType::int(), content)
    }

    pub fn map(key: GamlType, content: GamlType) -> Self {
        Self::container(BaseType::Map, key, content)
    }

    pub fn pair(key: GamlType, content: GamlType) -> Self {
        Self::container(BaseType::Pair, key, content)
    }

    /// Builds a container of the given family. Non-container families ignore
    /// the parameters.
    pub fn container(base: BaseType, key: GamlType, content: GamlType) -> Self {
        if !base.is_container() {
            return Self::new(base);
        }
        let key = if base == BaseType::List {
            GamlType::int()
        } else {
            key
        };
        Self {
            base,
            key: Some(Box::new(key)),
            content: Some(Box::new(content)),
        }
    }

    /// Same family as `template`, with new key and content types.
    pub fn from_parts(template: &GamlType, key: GamlType, content: GamlType) -> Self {
        Self::container(template.base, key, content)
    }

    /// Same container with a new content type.
    pub fn of(&self, content: GamlType) -> Self {
        Self::container(self.base, self.key_type(), content)
    }

    pub fn base(&self) -> BaseType {
        self.base
    }

    pub fn id(&self) -> i32 {
        self.base.id()
    }

    pub fn is_container(&self) -> bool {
        self.base.is_container()
    }

    pub fn is_no_type(&self) -> bool {
        self.base == BaseType::NoType
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self.base, BaseType::Int | BaseType::Float)
    }

    pub fn key_type(&self) -> GamlType {
        match (&self.key, self.base) {
            (_, BaseType::List) => GamlType::int(),
            (Some(key), _) => (**key).clone(),
            (None, _) => GamlType::no_type(),
        }
    }

    pub fn content_type(&self) -> GamlType {
        self.content
            .as_deref()
            .cloned()
            .unwrap_or_else(GamlType::no_type)
    }

    /// One level of wrapping removed: the content of a container, the type
    /// itself otherwise.
    pub fn wrapped_type(&self) -> GamlType {
        if self.is_container() {
            self.content_type()
        } else {
            self.clone()
        }
    }

    /// Whether a value of this type can be used where `target` is expected.
    pub fn is_translatable_into(&self, target: &GamlType) -> bool {
        if target.is_no_type() || self.is_no_type() {
            return true;
        }
        if self.base == BaseType::Int && target.base == BaseType::Float {
            return true;
        }
        if target.base == BaseType::Container && self.is_container() {
            return self.content_type().is_translatable_into(&target.content_type());
        }
        if self.base != target.base {
            return false;
        }
        if !self.is_container() {
            return true;
        }
        self.key_type().is_translatable_into(&target.key_type())
            && self.content_type().is_translatable_into(&target.content_type())
    }
}

impl Default for GamlType {
    fn default() -> Self {
        Self::no_type()
    }
}

impl fmt::Display for GamlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_container() {
            return write!(f, "{}", self.base.name());
        }
        let content = self.content_type();
        match self.base {
            BaseType::List | BaseType::Container => {
                write!(f, "{}<{}>", self.base.name(), content)
            }
            _ => write!(f, "{}<{},{}>", self.base.name(), self.key_type(), content),
        }
    }
}

/// Runtime value produced by evaluating an expression.
///
/// Floats compare and hash by bit pattern so that values can key maps and
/// deduplicate solutions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(Vec<(Value, Value)>),
    Pair(Box<Value>, Box<Value>),
    Type(GamlType),
}

impl Value {
    pub fn gaml_type(&self) -> GamlType {
        match self {
            Value::Nil => GamlType::no_type(),
            Value::Bool(_) => GamlType::bool(),
            Value::Int(_) => GamlType::int(),
            Value::Float(_) => GamlType::float(),
            Value::String(_) => GamlType::string(),
            Value::List(items) => GamlType::list(common_type(items.iter())),
            Value::Map(entries) => GamlType::map(
                common_type(entries.iter().map(|(k, _)| k)),
                common_type(entries.iter().map(|(_, v)| v)),
            ),
            Value::Pair(key, value) => GamlType::pair(key.gaml_type(), value.gaml_type()),
            Value::Type(_) => GamlType::type_literal(),
        }
    }

    pub fn as_bool(&self) -> Result<bool> {
        match self {
            Value::Bool(b) => Ok(*b),
            Value::Int(i) => Ok(*i != 0),
            Value::Float(f) => Ok(*f != 0.0),
            Value::Nil => Ok(false),
            other => bail!("cannot cast {} to bool", other),
        }
    }

    pub fn as_int(&self) -> Result<i64> {
        match self {
            Value::Int(i) => Ok(*i),
            Value::Float(f) => Ok(f.trunc() as i64),
            Value::Bool(b) => Ok(i64::from(*b)),
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map_err(|e| anyhow::anyhow!("cannot cast '{}' to int: {}", s, e)),
            other => bail!("cannot cast {} to int", other),
        }
    }

    pub fn as_float(&self) -> Result<f64> {
        match self {
            Value::Float(f) => Ok(*f),
            Value::Int(i) => Ok(*i as f64),
            Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|e| anyhow::anyhow!("cannot cast '{}' to float: {}", s, e)),
            other => bail!("cannot cast {} to float", other),
        }
    }

    pub fn as_list(&self) -> Result<Vec<Value>> {
        match self {
            Value::List(items) => Ok(items.clone()),
            Value::Map(entries) => Ok(entries.iter().map(|(_, v)| v.clone()).collect()),
            Value::Pair(key, value) => Ok(vec![(**key).clone(), (**value).clone()]),
            Value::Nil => Ok(Vec::new()),
            other => Ok(vec![other.clone()]),
        }
    }

    /// Converts the value to `target`, following the cast rules of the language.
    pub fn cast(&self, target: &GamlType) -> Result<Value> {
        Ok(match target.base() {
            BaseType::NoType => self.clone(),
            BaseType::Int => Value::Int(self.as_int()?),
            BaseType::Float => Value::Float(self.as_float()?),
            BaseType::Bool => Value::Bool(self.as_bool()?),
            BaseType::String => match self {
                Value::String(s) => Value::String(s.clone()),
                other => Value::String(other.to_string()),
            },
            BaseType::List | BaseType::Container => Value::List(self.as_list()?),
            BaseType::Map => match self {
                Value::Map(entries) => Value::Map(entries.clone()),
                Value::Pair(key, value) => Value::Map(vec![((**key).clone(), (**value).clone())]),
                other => bail!("cannot cast {} to map", other),
            },
            BaseType::Pair => match self {
                Value::Pair(..) => self.clone(),
                Value::List(items) if items.len() == 2 => {
                    Value::Pair(Box::new(items[0].clone()), Box::new(items[1].clone()))
                }
                other => bail!("cannot cast {} to pair", other),
            },
            BaseType::Type => match self {
                Value::Type(_) => self.clone(),
                other => Value::Type(other.gaml_type()),
            },
        })
    }

    pub fn map_get(&self, key: &Value) -> Option<&Value> {
        match self {
            Value::Map(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Inserts or replaces `key` in a map value. Non-map values are left untouched.
    pub fn map_put(&mut self, key: Value, value: Value) -> bool {
        let Value::Map(entries) = self else {
            return false;
        };
        match entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => entries.push((key, value)),
        }
        true
    }
}

fn common_type<'a>(mut values: impl Iterator<Item = &'a Value>) -> GamlType {
    let Some(first) = values.next() else {
        return GamlType::no_type();
    };
    let mut result = first.gaml_type();
    for value in values {
        let ty = value.gaml_type();
        if ty == result {
            continue;
        }
        if ty.is_numeric() && result.is_numeric() {
            result = GamlType::float();
        } else {
            return GamlType::no_type();
        }
    }
    result
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Pair(ak, av), Value::Pair(bk, bv)) => ak == bk && av == bv,
            (Value::Type(a), Value::Type(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Nil => {}
            Value::Bool(b) => b.hash(state),
            Value::Int(i) => i.hash(state),
            Value::Float(f) => f.to_bits().hash(state),
            Value::String(s) => s.hash(state),
            Value::List(items) => items.hash(state),
            Value::Map(entries) => entries.hash(state),
            Value::Pair(key, value) => {
                key.hash(state);
                value.hash(state);
            }
            Value::Type(ty) => ty.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) if x.is_finite() && x.fract() == 0.0 => write!(f, "{:.1}", x),
            Value::Float(x) => write!(f, "{}", x),
            Value::String(s) => write!(f, "{:?}", s),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Map(entries) => {
                write!(f, "map([")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}::{}", key, value)?;
                }
                write!(f, "])")
            }
            Value::Pair(key, value) => write!(f, "{}::{}", key, value),
            Value::Type(ty) => write!(f, "{}", ty),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_display() {
        let ty = GamlType::map(GamlType::string(), GamlType::list(GamlType::float()));
        assert_eq!(ty.to_string(), "map<string,list<float>>");
        assert_eq!(GamlType::int().to_string(), "int");
    }

    #[test]
    fn test_list_key_is_always_int() {
        let ty = GamlType::container(BaseType::List, GamlType::string(), GamlType::bool());
        assert_eq!(ty.key_type(), GamlType::int());
        assert_eq!(ty.content_type(), GamlType::bool());
    }

    #[test]
    fn test_type_ids_round_trip() {
        for base in [BaseType::Int, BaseType::Map, BaseType::Pair, BaseType::Type] {
            assert_eq!(BaseType::from_id(base.id()), Some(base));
        }
        assert_eq!(BaseType::from_id(99), None);
    }

    #[test]
    fn test_int_translates_into_float_but_not_back() {
        assert!(GamlType::int().is_translatable_into(&GamlType::float()));
        assert!(!GamlType::float().is_translatable_into(&GamlType::int()));
        assert!(GamlType::list(GamlType::int())
            .is_translatable_into(&GamlType::new(BaseType::Container)));
    }

    #[test]
    fn test_value_type_of_mixed_numeric_list() {
        let value = Value::List(vec![Value::Int(1), Value::Float(2.5)]);
        assert_eq!(value.gaml_type(), GamlType::list(GamlType::float()));
    }

    #[test]
    fn test_float_equality_uses_bits() {
        assert_eq!(Value::Float(f64::NAN), Value::Float(f64::NAN));
        assert_ne!(Value::Float(1.0), Value::Int(1));
    }

    #[test]
    fn test_value_display() {
        assert_eq!(Value::Int(-5).to_string(), "-5");
        assert_eq!(Value::Float(2.0).to_string(), "2.0");
        let map = Value::Map(vec![(Value::String("a".into()), Value::Int(1))]);
        assert_eq!(map.to_string(), "map([\"a\"::1])");
    }

    #[test]
    fn test_cast_to_int_truncates() {
        assert_eq!(Value::Float(3.9).cast(&GamlType::int()).unwrap(), Value::Int(3));
        assert!(Value::String("x".into()).cast(&GamlType::int()).is_err());
    }
}
