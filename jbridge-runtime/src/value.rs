//! Value model for crossings - JNI-compatible handles and typed values
//!
//! Design: Opaque handles are pointer-sized so a JVM backend passes them
//! through untouched, while the sandbox encodes table indices in them.

use core::ffi::c_void;
use core::fmt;

/// Managed type descriptor, one per JNI signature character
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum JavaType {
    Void,
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    Object,
}

impl JavaType {
    /// Signature character (`L` stands for every reference type)
    #[inline]
    pub const fn sig_char(self) -> char {
        match self {
            Self::Void => 'V',
            Self::Boolean => 'Z',
            Self::Byte => 'B',
            Self::Char => 'C',
            Self::Short => 'S',
            Self::Int => 'I',
            Self::Long => 'J',
            Self::Float => 'F',
            Self::Double => 'D',
            Self::Object => 'L',
        }
    }

    /// Get size of the crossing representation in bytes
    #[inline]
    pub const fn size(self) -> usize {
        match self {
            Self::Void => 0,
            Self::Boolean | Self::Byte => 1,
            Self::Char | Self::Short => 2,
            Self::Int | Self::Float => 4,
            Self::Long | Self::Double | Self::Object => 8,
        }
    }

    #[inline]
    pub const fn is_primitive(self) -> bool {
        !matches!(self, Self::Void | Self::Object)
    }

    /// Type of a single field signature such as `J` or `Ljava/lang/String;`
    pub fn from_field_signature(sig: &str) -> Option<Self> {
        let mut chars = sig.chars();
        let ty = Self::from_sig_char(chars.next()?)?;
        match ty {
            Self::Object if !sig.ends_with(';') && !sig.starts_with('[') => None,
            Self::Object => Some(ty),
            _ if chars.next().is_some() => None,
            _ => Some(ty),
        }
    }

    fn from_sig_char(c: char) -> Option<Self> {
        Some(match c {
            'V' => Self::Void,
            'Z' => Self::Boolean,
            'B' => Self::Byte,
            'C' => Self::Char,
            'S' => Self::Short,
            'I' => Self::Int,
            'J' => Self::Long,
            'F' => Self::Float,
            'D' => Self::Double,
            'L' | '[' => Self::Object,
            _ => return None,
        })
    }
}

/// Parsed method signature: parameter types and return type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSignature {
    pub params: Vec<JavaType>,
    pub ret: JavaType,
}

impl MethodSignature {
    /// Parse a JNI method descriptor such as `(ILjava/lang/String;)Z`
    pub fn parse(sig: &str) -> Option<Self> {
        let rest = sig.strip_prefix('(')?;
        let close = rest.find(')')?;
        let (args, ret) = (&rest[..close], &rest[close + 1..]);

        let mut params = Vec::new();
        let bytes = args.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            let start = i;
            while bytes[i] == b'[' {
                i += 1;
                if i == bytes.len() {
                    return None;
                }
            }
            if bytes[i] == b'L' {
                i += args[i..].find(';')?;
            }
            i += 1;
            let ty = JavaType::from_field_signature(&args[start..i])?;
            if ty == JavaType::Void {
                return None;
            }
            params.push(ty);
        }

        let ret = JavaType::from_field_signature(ret)?;
        Some(Self { params, ret })
    }
}

/// Typed crossing value, the tagged counterpart of JNI's `jvalue`
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JValue {
    Void,
    Boolean(bool),
    Byte(i8),
    Char(u16),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Object(RawObject),
}

impl JValue {
    /// Zero value of a type (what a call returns while an exception is pending)
    pub const fn zero(ty: JavaType) -> Self {
        match ty {
            JavaType::Void => Self::Void,
            JavaType::Boolean => Self::Boolean(false),
            JavaType::Byte => Self::Byte(0),
            JavaType::Char => Self::Char(0),
            JavaType::Short => Self::Short(0),
            JavaType::Int => Self::Int(0),
            JavaType::Long => Self::Long(0),
            JavaType::Float => Self::Float(0.0),
            JavaType::Double => Self::Double(0.0),
            JavaType::Object => Self::Object(RawObject::null()),
        }
    }

    pub const fn java_type(&self) -> JavaType {
        match self {
            Self::Void => JavaType::Void,
            Self::Boolean(_) => JavaType::Boolean,
            Self::Byte(_) => JavaType::Byte,
            Self::Char(_) => JavaType::Char,
            Self::Short(_) => JavaType::Short,
            Self::Int(_) => JavaType::Int,
            Self::Long(_) => JavaType::Long,
            Self::Float(_) => JavaType::Float,
            Self::Double(_) => JavaType::Double,
            Self::Object(_) => JavaType::Object,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Self::Boolean(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match *self {
            Self::Int(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match *self {
            Self::Long(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match *self {
            Self::Double(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<RawObject> {
        match *self {
            Self::Object(v) => Some(v),
            _ => None,
        }
    }
}

/// Raw managed object reference (local or global, as handed out by an `Env`)
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawObject(*mut c_void);

impl RawObject {
    #[inline]
    pub const fn null() -> Self {
        Self(core::ptr::null_mut())
    }

    #[inline]
    pub const fn from_ptr(ptr: *mut c_void) -> Self {
        Self(ptr)
    }

    #[inline]
    pub const fn as_ptr(self) -> *mut c_void {
        self.0
    }

    #[inline]
    pub fn is_null(self) -> bool {
        self.0.is_null()
    }
}

impl Default for RawObject {
    fn default() -> Self {
        Self::null()
    }
}

// Safety: a handle is an opaque value; the runtime that issued it checks
// validity and thread affinity when it is used
unsafe impl Send for RawObject {}
unsafe impl Sync for RawObject {}

impl fmt::Debug for RawObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RawObject({:p})", self.0)
    }
}

/// Resolved method identifier
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodId(*mut c_void);

/// Resolved instance field identifier
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldId(*mut c_void);

macro_rules! opaque_id {
    ($name:ident) => {
        impl $name {
            #[inline]
            pub const fn null() -> Self {
                Self(core::ptr::null_mut())
            }

            #[inline]
            pub const fn from_ptr(ptr: *mut c_void) -> Self {
                Self(ptr)
            }

            #[inline]
            pub const fn as_ptr(self) -> *mut c_void {
                self.0
            }

            #[inline]
            pub fn is_null(self) -> bool {
                self.0.is_null()
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({:p})"), self.0)
            }
        }

        // Safety: method and field IDs stay valid on every thread for as
        // long as their class is loaded
        unsafe impl Send for $name {}
        unsafe impl Sync for $name {}
    };
}

opaque_id!(MethodId);
opaque_id!(FieldId);
