use serde::Serialize;

/// Semantic types carried on declarations and applet boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum WdlType {
    Boolean,
    Int,
    Float,
    Str,
    File,
    Array(Box<WdlType>),
    Optional(Box<WdlType>),
    Map(Box<WdlType>, Box<WdlType>),
    Pair(Box<WdlType>, Box<WdlType>),
}

impl WdlType {
    pub fn is_optional(&self) -> bool {
        matches!(self, WdlType::Optional(_))
    }

    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            WdlType::Boolean | WdlType::Int | WdlType::Float | WdlType::Str | WdlType::File
        )
    }

    /// Whether a value of this type maps directly onto a platform-native
    /// slot: a primitive, an array of primitives, or an optional primitive.
    /// Anything else needs a follow-up aggregation step after a scatter.
    pub fn is_platform_native(&self) -> bool {
        match self {
            t if t.is_primitive() => true,
            WdlType::Array(inner) => inner.is_primitive(),
            WdlType::Optional(inner) => inner.is_primitive(),
            _ => false,
        }
    }

    /// The type a block-local value has outside a scatter.
    pub fn promote_array(&self) -> WdlType {
        WdlType::Array(Box::new(self.clone()))
    }

    /// The type a block-local value has outside a conditional. Already
    /// optional types are left unchanged.
    pub fn promote_optional(&self) -> WdlType {
        if self.is_optional() {
            self.clone()
        } else {
            WdlType::Optional(Box::new(self.clone()))
        }
    }
}

impl std::fmt::Display for WdlType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WdlType::Boolean => write!(f, "Boolean"),
            WdlType::Int => write!(f, "Int"),
            WdlType::Float => write!(f, "Float"),
            WdlType::Str => write!(f, "String"),
            WdlType::File => write!(f, "File"),
            WdlType::Array(inner) => write!(f, "Array[{}]", inner),
            WdlType::Optional(inner) => write!(f, "{}?", inner),
            WdlType::Map(key, value) => write!(f, "Map[{}, {}]", key, value),
            WdlType::Pair(left, right) => write!(f, "Pair[{}, {}]", left, right),
        }
    }
}
