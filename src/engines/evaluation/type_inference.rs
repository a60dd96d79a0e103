//! Static typing of operator applications.
//!
//! A prototype carries up to four [`TypeRule`]s: one for the node's own type,
//! one for its content type, one for its key type and one for the content of
//! its content. Each rule either names a type or derives it from an argument.
//! Resolution never fails: a rule that cannot be applied leaves the default in
//! place and stricter checks are left to semantic validators.

use serde::{Deserialize, Serialize};

use super::expression::Expression;
use crate::functions::prototype::OperatorPrototype;
use crate::types::{BaseType, GamlType, Value};

/// Integer encoding of type rules, as found in operator declarations.
pub mod codes {
    pub const NONE: i32 = -1;
    pub const WRAPPED: i32 = -2;
    pub const FIRST_ELEMENT_CONTENT_TYPE: i32 = -3;
    pub const FIRST_CONTENT_TYPE_OR_TYPE: i32 = -4;
    pub const WIDEST_NUMERIC: i32 = -5;
    pub const TYPE_AT_INDEX: i32 = -100;
    pub const CONTENT_TYPE_AT_INDEX: i32 = -200;
    pub const KEY_TYPE_AT_INDEX: i32 = -300;
    pub const DENOTED_TYPE_AT_INDEX: i32 = -400;
    pub const CONTENT_CONTENT_TYPE_AT_INDEX: i32 = -500;
    /// Codes below this value mean "same rule as `code - FLOAT_IN_CASE_OF_INT`,
    /// with int results upgraded to float".
    pub const FLOAT_IN_CASE_OF_INT: i32 = -1000;
    /// Highest argument index an index-based code can address.
    pub const MAX_INDEX: i32 = 49;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeProvider {
    /// Keep the default type.
    None,
    /// A literal type, by id.
    Fixed(i32),
    TypeAt(usize),
    ContentTypeAt(usize),
    ContentContentTypeAt(usize),
    KeyTypeAt(usize),
    DenotedTypeAt(usize),
    Wrapped,
    FirstElementContentType,
    FirstContentTypeOrType,
    /// `float` when any argument is a float, the type of argument 0 otherwise.
    WidestNumeric,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeRule {
    pub provider: TypeProvider,
    pub float_if_int: bool,
}

impl TypeRule {
    pub const NONE: TypeRule = TypeRule {
        provider: TypeProvider::None,
        float_if_int: false,
    };

    pub const fn new(provider: TypeProvider) -> Self {
        Self {
            provider,
            float_if_int: false,
        }
    }

    pub const fn fixed(base: BaseType) -> Self {
        Self::new(TypeProvider::Fixed(base.id()))
    }

    pub const fn float_if_int(self) -> Self {
        Self {
            provider: self.provider,
            float_if_int: true,
        }
    }

    /// Decodes the integer form. Unknown codes decode to [`TypeRule::NONE`].
    pub fn from_code(code: i32) -> Self {
        if code < codes::FLOAT_IN_CASE_OF_INT {
            let mut rule = Self::decode_plain(code - codes::FLOAT_IN_CASE_OF_INT);
            rule.float_if_int = true;
            return rule;
        }
        Self::decode_plain(code)
    }

    fn decode_plain(code: i32) -> Self {
        if code >= 0 {
            return Self::new(TypeProvider::Fixed(code));
        }
        let provider = match code {
            codes::NONE => TypeProvider::None,
            codes::WRAPPED => TypeProvider::Wrapped,
            codes::FIRST_ELEMENT_CONTENT_TYPE => TypeProvider::FirstElementContentType,
            codes::FIRST_CONTENT_TYPE_OR_TYPE => TypeProvider::FirstContentTypeOrType,
            codes::WIDEST_NUMERIC => TypeProvider::WidestNumeric,
            _ => {
                let bases: [(i32, fn(usize) -> TypeProvider); 5] = [
                    (codes::TYPE_AT_INDEX, TypeProvider::TypeAt),
                    (codes::CONTENT_TYPE_AT_INDEX, TypeProvider::ContentTypeAt),
                    (codes::KEY_TYPE_AT_INDEX, TypeProvider::KeyTypeAt),
                    (codes::DENOTED_TYPE_AT_INDEX, TypeProvider::DenotedTypeAt),
                    (
                        codes::CONTENT_CONTENT_TYPE_AT_INDEX,
                        TypeProvider::ContentContentTypeAt,
                    ),
                ];
                bases
                    .iter()
                    .find_map(|&(base, make)| {
                        let offset = code - base - 1;
                        (0..=codes::MAX_INDEX)
                            .contains(&offset)
                            .then(|| make(offset as usize))
                    })
                    .unwrap_or(TypeProvider::None)
            }
        };
        Self::new(provider)
    }

    /// Integer form of the rule.
    pub fn code(&self) -> i32 {
        let plain = match self.provider {
            TypeProvider::None => codes::NONE,
            TypeProvider::Fixed(id) => id,
            TypeProvider::TypeAt(i) => codes::TYPE_AT_INDEX + i as i32 + 1,
            TypeProvider::ContentTypeAt(i) => codes::CONTENT_TYPE_AT_INDEX + i as i32 + 1,
            TypeProvider::ContentContentTypeAt(i) => {
                codes::CONTENT_CONTENT_TYPE_AT_INDEX + i as i32 + 1
            }
            TypeProvider::KeyTypeAt(i) => codes::KEY_TYPE_AT_INDEX + i as i32 + 1,
            TypeProvider::DenotedTypeAt(i) => codes::DENOTED_TYPE_AT_INDEX + i as i32 + 1,
            TypeProvider::Wrapped => codes::WRAPPED,
            TypeProvider::FirstElementContentType => codes::FIRST_ELEMENT_CONTENT_TYPE,
            TypeProvider::FirstContentTypeOrType => codes::FIRST_CONTENT_TYPE_OR_TYPE,
            TypeProvider::WidestNumeric => codes::WIDEST_NUMERIC,
        };
        if self.float_if_int {
            plain + codes::FLOAT_IN_CASE_OF_INT
        } else {
            plain
        }
    }

    /// Applies the rule to `args`, falling back to `default`.
    pub fn resolve(&self, args: &[Expression], default: &GamlType) -> GamlType {
        let arg_type = |i: usize| args.get(i).map(Expression::gaml_type);
        let result = match self.provider {
            TypeProvider::None => None,
            TypeProvider::Fixed(id) => BaseType::from_id(id).map(GamlType::new),
            TypeProvider::TypeAt(i) => arg_type(i).cloned(),
            TypeProvider::ContentTypeAt(i) => arg_type(i).map(GamlType::content_type),
            TypeProvider::ContentContentTypeAt(i) => {
                arg_type(i).map(|t| t.content_type().content_type())
            }
            TypeProvider::KeyTypeAt(i) => arg_type(i).map(GamlType::key_type),
            TypeProvider::DenotedTypeAt(i) => args.get(i).map(Expression::denoted_type),
            TypeProvider::Wrapped => arg_type(0).map(GamlType::wrapped_type),
            TypeProvider::FirstElementContentType => {
                args.first().and_then(first_element_content_type)
            }
            TypeProvider::FirstContentTypeOrType => arg_type(0).map(|t| {
                let content = t.content_type();
                if content.is_no_type() {
                    t.clone()
                } else {
                    content
                }
            }),
            TypeProvider::WidestNumeric => {
                if args.iter().any(|a| a.gaml_type().base() == BaseType::Float) {
                    Some(GamlType::float())
                } else {
                    arg_type(0).cloned()
                }
            }
        };
        let result = result.unwrap_or_else(|| default.clone());
        if self.float_if_int && result.base() == BaseType::Int {
            return GamlType::float();
        }
        result
    }
}

impl Default for TypeRule {
    fn default() -> Self {
        Self::NONE
    }
}

/// Content type of the first element of a literal container; for anything
/// else, the content of the argument's content. `None` leaves the default.
fn first_element_content_type(arg: &Expression) -> Option<GamlType> {
    match arg.as_constant() {
        Some(Value::List(items)) => Some(
            items
                .first()
                .map(|v| v.gaml_type().content_type())
                .unwrap_or_else(GamlType::no_type),
        ),
        Some(Value::Map(entries)) => Some(
            entries
                .first()
                .map(|(_, v)| v.gaml_type().content_type())
                .unwrap_or_else(GamlType::no_type),
        ),
        _ => {
            let ty = arg.gaml_type().content_type().content_type();
            (!ty.is_no_type()).then_some(ty)
        }
    }
}

/// Resolved static type of `prototype` applied to `args`.
pub fn infer_type(prototype: &OperatorPrototype, args: &[Expression]) -> GamlType {
    let ty = prototype.type_rule.resolve(args, &prototype.return_type);
    if !ty.is_container() {
        return ty;
    }

    let mut content = prototype
        .content_type_rule
        .resolve(args, &ty.content_type());
    if content.is_container() {
        // A container content with neither key nor content type (an untyped
        // pair, typically) takes them from the right-hand operand.
        if content.key_type().is_no_type() && content.content_type().is_no_type() {
            if let Some(rhs) = args.last() {
                let rhs_type = rhs.gaml_type();
                content = GamlType::from_parts(&content, rhs_type.key_type(), rhs_type.content_type());
            }
        }
        let content_content = prototype
            .content_content_type_rule
            .resolve(args, &content.content_type());
        content = content.of(content_content);
    }

    let key = prototype.key_type_rule.resolve(args, &ty.key_type());
    GamlType::from_parts(&ty, key, content)
}
