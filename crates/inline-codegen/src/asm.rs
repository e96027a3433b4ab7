//! Binary (bytecode-level) types and method signatures
//!
//! These are the types the emitted instruction stream is verified against.
//! Descriptors follow the JVM encoding: `I` for int, `J` for long,
//! `Ljava/lang/String;` for object types and `(IJ)V` for methods.

use std::fmt;

/// Types that can appear in the emitted instruction stream
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AsmType {
    /// No value (method return only)
    Void,
    /// Boolean (stored as an int-sized slot)
    Boolean,
    /// 32-bit integer
    Int,
    /// 64-bit integer (occupies two slots)
    Long,
    /// 64-bit float (occupies two slots)
    Double,
    /// Reference type by internal name, e.g. `java/lang/String`
    Object(String),
}

impl AsmType {
    pub const OBJECT: &'static str = "java/lang/Object";

    /// Reference type from an internal name
    pub fn object(internal_name: impl Into<String>) -> Self {
        AsmType::Object(internal_name.into())
    }

    /// Descriptor string for this type
    pub fn descriptor(&self) -> String {
        match self {
            AsmType::Void => "V".to_string(),
            AsmType::Boolean => "Z".to_string(),
            AsmType::Int => "I".to_string(),
            AsmType::Long => "J".to_string(),
            AsmType::Double => "D".to_string(),
            AsmType::Object(name) => format!("L{};", name),
        }
    }

    /// Number of local/operand slots a value of this type occupies
    pub fn size(&self) -> usize {
        match self {
            AsmType::Void => 0,
            AsmType::Long | AsmType::Double => 2,
            _ => 1,
        }
    }

    pub fn is_primitive(&self) -> bool {
        !matches!(self, AsmType::Object(_))
    }

    pub fn is_void(&self) -> bool {
        matches!(self, AsmType::Void)
    }

    /// Wrapper class used when a primitive is stored in a reference slot
    pub fn boxed(&self) -> AsmType {
        match self {
            AsmType::Void => AsmType::object("kotlin/Unit"),
            AsmType::Boolean => AsmType::object("java/lang/Boolean"),
            AsmType::Int => AsmType::object("java/lang/Integer"),
            AsmType::Long => AsmType::object("java/lang/Long"),
            AsmType::Double => AsmType::object("java/lang/Double"),
            AsmType::Object(_) => self.clone(),
        }
    }
}

impl fmt::Display for AsmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.descriptor())
    }
}

/// A lowered method signature: name, argument types and return type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodSignature {
    pub name: String,
    pub args: Vec<AsmType>,
    pub ret: AsmType,
}

impl MethodSignature {
    pub fn new(name: impl Into<String>, args: Vec<AsmType>, ret: AsmType) -> Self {
        MethodSignature {
            name: name.into(),
            args,
            ret,
        }
    }

    /// Method descriptor, e.g. `(ILjava/lang/String;)J`
    pub fn descriptor(&self) -> String {
        let mut desc = String::from("(");
        for arg in &self.args {
            desc.push_str(&arg.descriptor());
        }
        desc.push(')');
        desc.push_str(&self.ret.descriptor());
        desc
    }

    /// Total slots consumed by the arguments
    pub fn args_size(&self) -> usize {
        self.args.iter().map(AsmType::size).sum()
    }
}

impl fmt::Display for MethodSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name, self.descriptor())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptors() {
        assert_eq!(AsmType::Int.descriptor(), "I");
        assert_eq!(AsmType::Long.descriptor(), "J");
        assert_eq!(
            AsmType::object("java/lang/String").descriptor(),
            "Ljava/lang/String;"
        );
    }

    #[test]
    fn test_wide_types_take_two_slots() {
        assert_eq!(AsmType::Long.size(), 2);
        assert_eq!(AsmType::Double.size(), 2);
        assert_eq!(AsmType::Int.size(), 1);
        assert_eq!(AsmType::Void.size(), 0);
    }

    #[test]
    fn test_method_descriptor() {
        let sig = MethodSignature::new(
            "invoke",
            vec![AsmType::Int, AsmType::object("java/lang/String")],
            AsmType::Long,
        );
        assert_eq!(sig.descriptor(), "(ILjava/lang/String;)J");
        assert_eq!(sig.to_string(), "invoke(ILjava/lang/String;)J");
        assert_eq!(sig.args_size(), 2);
    }

    #[test]
    fn test_boxed() {
        assert_eq!(AsmType::Int.boxed(), AsmType::object("java/lang/Integer"));
        let s = AsmType::object("java/lang/String");
        assert_eq!(s.boxed(), s);
    }
}
