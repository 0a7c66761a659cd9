//! Typed property values

use crate::foundation::math::{Mat4, Vec2, Vec3, Vec4};
use crate::render::VertexBuffer;
use std::any::Any;
use std::fmt;
use std::rc::Rc;

/// Category of a stored value, used for type checks and error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyKind {
    /// Signed integer
    Int,
    /// Unsigned integer
    UInt,
    /// 32-bit float
    Float,
    /// Boolean flag
    Bool,
    /// Text
    String,
    /// 2D vector
    Vec2,
    /// 3D vector
    Vec3,
    /// 4D vector
    Vec4,
    /// 4x4 matrix
    Mat4,
    /// Shared vertex buffer handle
    VertexBuffer,
    /// Opaque shared resource handle
    Resource,
}

impl fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Int => "int",
            Self::UInt => "uint",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::String => "string",
            Self::Vec2 => "vec2",
            Self::Vec3 => "vec3",
            Self::Vec4 => "vec4",
            Self::Mat4 => "mat4",
            Self::VertexBuffer => "vertex buffer",
            Self::Resource => "resource",
        };
        f.write_str(name)
    }
}

/// Opaque, shared reference to an engine resource (texture, effect, ...)
///
/// Two resources are equal when they point at the same object.
#[derive(Clone)]
pub struct Resource {
    label: String,
    handle: Rc<dyn Any>,
}

impl Resource {
    /// Wrap a shared object under a debug label
    pub fn new<T: Any>(label: impl Into<String>, object: Rc<T>) -> Self {
        Self {
            label: label.into(),
            handle: object,
        }
    }

    /// Debug label
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Shared handle to the object, if it is a `T`
    pub fn downcast<T: Any>(&self) -> Option<Rc<T>> {
        Rc::clone(&self.handle).downcast::<T>().ok()
    }

    fn same_object(&self, other: &Self) -> bool {
        std::ptr::eq(
            Rc::as_ptr(&self.handle).cast::<()>(),
            Rc::as_ptr(&other.handle).cast::<()>(),
        )
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource").field("label", &self.label).finish()
    }
}

impl PartialEq for Resource {
    fn eq(&self, other: &Self) -> bool {
        self.same_object(other)
    }
}

/// Value stored under a property name
///
/// Handle variants (`VertexBuffer`, `Resource`) compare by identity, so swapping
/// in a different buffer object is a change even when its contents match.
/// Float payloads compare bitwise.
#[derive(Debug, Clone)]
pub enum PropertyValue {
    /// Signed integer
    Int(i32),
    /// Unsigned integer
    UInt(u32),
    /// 32-bit float
    Float(f32),
    /// Boolean flag
    Bool(bool),
    /// Text
    String(String),
    /// 2D vector
    Vec2(Vec2),
    /// 3D vector
    Vec3(Vec3),
    /// 4D vector
    Vec4(Vec4),
    /// 4x4 matrix
    Mat4(Mat4),
    /// Shared vertex buffer handle
    VertexBuffer(Rc<VertexBuffer>),
    /// Opaque shared resource handle
    Resource(Resource),
}

impl PropertyValue {
    /// Category of this value
    pub const fn kind(&self) -> PropertyKind {
        match self {
            Self::Int(_) => PropertyKind::Int,
            Self::UInt(_) => PropertyKind::UInt,
            Self::Float(_) => PropertyKind::Float,
            Self::Bool(_) => PropertyKind::Bool,
            Self::String(_) => PropertyKind::String,
            Self::Vec2(_) => PropertyKind::Vec2,
            Self::Vec3(_) => PropertyKind::Vec3,
            Self::Vec4(_) => PropertyKind::Vec4,
            Self::Mat4(_) => PropertyKind::Mat4,
            Self::VertexBuffer(_) => PropertyKind::VertexBuffer,
            Self::Resource(_) => PropertyKind::Resource,
        }
    }
}

impl PartialEq for PropertyValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::UInt(a), Self::UInt(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Vec2(a), Self::Vec2(b)) => same_bits(a.as_slice(), b.as_slice()),
            (Self::Vec3(a), Self::Vec3(b)) => same_bits(a.as_slice(), b.as_slice()),
            (Self::Vec4(a), Self::Vec4(b)) => same_bits(a.as_slice(), b.as_slice()),
            (Self::Mat4(a), Self::Mat4(b)) => same_bits(a.as_slice(), b.as_slice()),
            (Self::VertexBuffer(a), Self::VertexBuffer(b)) => Rc::ptr_eq(a, b),
            (Self::Resource(a), Self::Resource(b)) => a == b,
            _ => false,
        }
    }
}

/// Bitwise float comparison: an identical NaN is not a change
fn same_bits(a: &[f32], b: &[f32]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits())
}

/// Rust types that can be stored in and read back from a [`PropertyValue`]
pub trait Property: Sized {
    /// Kind this type maps to
    const KIND: PropertyKind;

    /// Extract a copy of the value, or `None` if the kinds differ
    fn from_value(value: &PropertyValue) -> Option<Self>;

    /// Wrap into a property value
    fn into_value(self) -> PropertyValue;
}

macro_rules! impl_property {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl Property for $ty {
                const KIND: PropertyKind = PropertyKind::$variant;

                fn from_value(value: &PropertyValue) -> Option<Self> {
                    match value {
                        PropertyValue::$variant(v) => Some(v.clone()),
                        _ => None,
                    }
                }

                fn into_value(self) -> PropertyValue {
                    PropertyValue::$variant(self)
                }
            }

            impl From<$ty> for PropertyValue {
                fn from(value: $ty) -> Self {
                    Self::$variant(value)
                }
            }
        )*
    };
}

impl_property! {
    i32 => Int,
    u32 => UInt,
    f32 => Float,
    bool => Bool,
    String => String,
    Vec2 => Vec2,
    Vec3 => Vec3,
    Vec4 => Vec4,
    Mat4 => Mat4,
    Rc<VertexBuffer> => VertexBuffer,
    Resource => Resource,
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_extraction() {
        let value = 3.5_f32.into_value();

        assert_eq!(value.kind(), PropertyKind::Float);
        assert_eq!(f32::from_value(&value), Some(3.5));
        assert_eq!(i32::from_value(&value), None);
    }

    #[test]
    fn test_handles_compare_by_identity() {
        let a = Rc::new(VertexBuffer::from_positions(&[Vec3::zeros()]));
        let b = Rc::new(VertexBuffer::from_positions(&[Vec3::zeros()]));

        assert_eq!(PropertyValue::VertexBuffer(Rc::clone(&a)), PropertyValue::VertexBuffer(Rc::clone(&a)));
        assert_ne!(PropertyValue::VertexBuffer(a), PropertyValue::VertexBuffer(b));
    }

    #[test]
    fn test_resource_downcast() {
        let texture = Rc::new(String::from("diffuse.png"));
        let resource = Resource::new("diffuse", Rc::clone(&texture));

        assert_eq!(resource.label(), "diffuse");
        assert!(Rc::ptr_eq(&resource.downcast::<String>().unwrap(), &texture));
        assert!(resource.downcast::<u32>().is_none());
        assert_eq!(resource.clone(), resource);
    }

    #[test]
    fn test_floats_compare_bitwise() {
        let nan = PropertyValue::Float(f32::NAN);
        assert_eq!(nan, nan.clone());
        assert_eq!(
            PropertyValue::Mat4(Mat4::from_element(f32::NAN)),
            PropertyValue::Mat4(Mat4::from_element(f32::NAN))
        );
        assert_ne!(PropertyValue::Float(0.0), PropertyValue::Float(-0.0));
        assert_ne!(PropertyValue::Vec3(Vec3::zeros()), PropertyValue::Vec3(Vec3::new(0.0, 1.0, 0.0)));
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(PropertyKind::Mat4.to_string(), "mat4");
        assert_eq!(PropertyKind::VertexBuffer.to_string(), "vertex buffer");
    }
}
