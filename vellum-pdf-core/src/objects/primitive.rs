use crate::objects::{Dictionary, PdfString, Stream};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId {
    number: u32,
    generation: u16,
}

impl ObjectId {
    pub fn new(number: u32, generation: u16) -> Self {
        Self { number, generation }
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn generation(&self) -> u16 {
        self.generation
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} R", self.number, self.generation)
    }
}

/// Every value a PDF file can hold.
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    String(PdfString),
    Name(String),
    Array(Vec<Object>),
    Dictionary(Dictionary),
    Stream(Stream),
    Reference(ObjectId),
}

impl Object {
    pub fn name(name: impl Into<String>) -> Self {
        Object::Name(name.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Object::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Object::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Object::Integer(i) => Some(*i),
            // Some producers write integral values as reals
            Object::Real(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_real(&self) -> Option<f64> {
        match self {
            Object::Real(f) => Some(*f),
            Object::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&PdfString> {
        match self {
            Object::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_name(&self) -> Option<&str> {
        match self {
            Object::Name(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<Object>> {
        match self {
            Object::Array(arr) => Some(arr),
            _ => None,
        }
    }

    pub fn as_array_mut(&mut self) -> Option<&mut Vec<Object>> {
        match self {
            Object::Array(arr) => Some(arr),
            _ => None,
        }
    }

    /// Dictionary of a dictionary or stream object.
    pub fn as_dict(&self) -> Option<&Dictionary> {
        match self {
            Object::Dictionary(dict) => Some(dict),
            Object::Stream(stream) => Some(stream.dictionary()),
            _ => None,
        }
    }

    pub fn as_dict_mut(&mut self) -> Option<&mut Dictionary> {
        match self {
            Object::Dictionary(dict) => Some(dict),
            Object::Stream(stream) => Some(stream.dictionary_mut()),
            _ => None,
        }
    }

    pub fn as_stream(&self) -> Option<&Stream> {
        match self {
            Object::Stream(stream) => Some(stream),
            _ => None,
        }
    }

    pub fn as_stream_mut(&mut self) -> Option<&mut Stream> {
        match self {
            Object::Stream(stream) => Some(stream),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<ObjectId> {
        match self {
            Object::Reference(id) => Some(*id),
            _ => None,
        }
    }

    /// Short variant name used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Object::Null => "null",
            Object::Boolean(_) => "boolean",
            Object::Integer(_) => "integer",
            Object::Real(_) => "real",
            Object::String(_) => "string",
            Object::Name(_) => "name",
            Object::Array(_) => "array",
            Object::Dictionary(_) => "dictionary",
            Object::Stream(_) => "stream",
            Object::Reference(_) => "reference",
        }
    }

    /// Calls `f` for every reference contained in this object, at any depth.
    pub fn for_each_reference(&self, f: &mut impl FnMut(ObjectId)) {
        match self {
            Object::Reference(id) => f(*id),
            Object::Array(items) => {
                for item in items {
                    item.for_each_reference(f);
                }
            }
            Object::Dictionary(dict) => {
                for value in dict.values() {
                    value.for_each_reference(f);
                }
            }
            Object::Stream(stream) => {
                for value in stream.dictionary().values() {
                    value.for_each_reference(f);
                }
            }
            _ => {}
        }
    }

    /// Rewrites every reference in place.
    pub fn map_references(&mut self, f: &mut impl FnMut(ObjectId) -> ObjectId) {
        match self {
            Object::Reference(id) => *id = f(*id),
            Object::Array(items) => {
                for item in items {
                    item.map_references(f);
                }
            }
            Object::Dictionary(dict) => {
                for (_, value) in dict.entries_mut() {
                    value.map_references(f);
                }
            }
            Object::Stream(stream) => {
                for (_, value) in stream.dictionary_mut().entries_mut() {
                    value.map_references(f);
                }
            }
            _ => {}
        }
    }
}

impl From<bool> for Object {
    fn from(b: bool) -> Self {
        Object::Boolean(b)
    }
}

impl From<i32> for Object {
    fn from(i: i32) -> Self {
        Object::Integer(i as i64)
    }
}

impl From<i64> for Object {
    fn from(i: i64) -> Self {
        Object::Integer(i)
    }
}

impl From<u32> for Object {
    fn from(i: u32) -> Self {
        Object::Integer(i as i64)
    }
}

impl From<usize> for Object {
    fn from(i: usize) -> Self {
        Object::Integer(i as i64)
    }
}

impl From<f32> for Object {
    fn from(f: f32) -> Self {
        Object::Real(f as f64)
    }
}

impl From<f64> for Object {
    fn from(f: f64) -> Self {
        Object::Real(f)
    }
}

impl From<PdfString> for Object {
    fn from(s: PdfString) -> Self {
        Object::String(s)
    }
}

impl From<&str> for Object {
    fn from(s: &str) -> Self {
        Object::String(PdfString::from_text(s))
    }
}

impl From<String> for Object {
    fn from(s: String) -> Self {
        Object::String(PdfString::from_text(&s))
    }
}

impl From<Vec<Object>> for Object {
    fn from(v: Vec<Object>) -> Self {
        Object::Array(v)
    }
}

impl From<Dictionary> for Object {
    fn from(d: Dictionary) -> Self {
        Object::Dictionary(d)
    }
}

impl From<Stream> for Object {
    fn from(s: Stream) -> Self {
        Object::Stream(s)
    }
}

impl From<ObjectId> for Object {
    fn from(id: ObjectId) -> Self {
        Object::Reference(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_id_display_and_order() {
        let a = ObjectId::new(3, 0);
        let b = ObjectId::new(3, 1);
        let c = ObjectId::new(10, 0);
        assert_eq!(a.to_string(), "3 0 R");
        assert!(a < b && b < c);
    }

    #[test]
    fn test_accessors() {
        assert_eq!(Object::Integer(4).as_real(), Some(4.0));
        assert_eq!(Object::Real(2.0).as_integer(), Some(2));
        assert_eq!(Object::Real(2.5).as_integer(), None);
        assert_eq!(Object::name("Page").as_name(), Some("Page"));
        assert!(Object::Null.is_null());
        assert_eq!(Object::Boolean(true).type_name(), "boolean");
    }

    #[test]
    fn test_stream_exposes_dictionary() {
        let mut dict = Dictionary::new();
        dict.set("Subtype", Object::name("Image"));
        let obj = Object::Stream(Stream::with_dictionary(dict, vec![1, 2, 3]));
        assert_eq!(
            obj.as_dict().and_then(|d| d.get_name("Subtype")),
            Some("Image")
        );
    }

    #[test]
    fn test_for_each_and_map_references() {
        let mut inner = Dictionary::new();
        inner.set("Font", ObjectId::new(5, 0));
        let mut obj = Object::Array(vec![
            Object::Reference(ObjectId::new(1, 0)),
            Object::Dictionary(inner),
            Object::Integer(9),
        ]);

        let mut seen = Vec::new();
        obj.for_each_reference(&mut |id| seen.push(id.number()));
        seen.sort();
        assert_eq!(seen, vec![1, 5]);

        obj.map_references(&mut |id| ObjectId::new(id.number() + 100, 0));
        let mut remapped = Vec::new();
        obj.for_each_reference(&mut |id| remapped.push(id.number()));
        remapped.sort();
        assert_eq!(remapped, vec![101, 105]);
    }
}
