//! A read-only PDF object graph with typed accessors.
//!
//! The decoder consumes an already-parsed object graph: dictionaries, arrays,
//! names, numbers, strings and streams, delivered by the host as owned,
//! clone-cheap values. Indirect references are resolved by the host before the
//! graph reaches this crate.

use std::fmt::{Debug, Formatter};
use std::ops::Deref;
use std::sync::Arc;

/// Any PDF object the image decoder can encounter.
#[derive(Debug, Clone)]
pub enum Object {
    /// The null object.
    Null,
    /// A boolean.
    Bool(bool),
    /// An integer number.
    Int(i64),
    /// A real number.
    Real(f32),
    /// A name.
    Name(Name),
    /// A byte string.
    String(Arc<[u8]>),
    /// An array.
    Array(Array),
    /// A dictionary.
    Dict(Dict),
    /// A stream.
    Stream(Stream),
}

impl Object {
    /// Create a name object.
    pub fn name(name: &str) -> Self {
        Object::Name(Name::new(name))
    }

    /// Create a byte-string object.
    pub fn string(data: impl Into<Vec<u8>>) -> Self {
        Object::String(data.into().into())
    }

    /// Convert the object into a specific type.
    pub fn cast<T: FromObject>(&self) -> Option<T> {
        T::from_object(self)
    }
}

impl From<bool> for Object {
    fn from(value: bool) -> Self {
        Object::Bool(value)
    }
}

impl From<i64> for Object {
    fn from(value: i64) -> Self {
        Object::Int(value)
    }
}

impl From<i32> for Object {
    fn from(value: i32) -> Self {
        Object::Int(value as i64)
    }
}

impl From<f32> for Object {
    fn from(value: f32) -> Self {
        Object::Real(value)
    }
}

impl From<Name> for Object {
    fn from(value: Name) -> Self {
        Object::Name(value)
    }
}

impl From<Array> for Object {
    fn from(value: Array) -> Self {
        Object::Array(value)
    }
}

impl From<Dict> for Object {
    fn from(value: Dict) -> Self {
        Object::Dict(value)
    }
}

impl From<Stream> for Object {
    fn from(value: Stream) -> Self {
        Object::Stream(value)
    }
}

/// A PDF name.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Name(Arc<str>);

impl Name {
    /// Create a new name. The leading slash is not part of the name.
    pub fn new(name: &str) -> Self {
        Self(Arc::from(name))
    }

    /// The name as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for Name {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for Name {
    fn eq(&self, other: &str) -> bool {
        &*self.0 == other
    }
}

impl PartialEq<&str> for Name {
    fn eq(&self, other: &&str) -> bool {
        &*self.0 == *other
    }
}

impl Debug for Name {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "/{}", self.0)
    }
}

/// An array of objects.
#[derive(Debug, Clone)]
pub struct Array(Arc<[Object]>);

impl Default for Array {
    fn default() -> Self {
        Self(Arc::from(Vec::new()))
    }
}

impl Array {
    /// Create an array from objects.
    pub fn from_objects(objects: impl IntoIterator<Item = Object>) -> Self {
        Self(objects.into_iter().collect())
    }

    /// The number of elements.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the array is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Get the element at `index` as a specific type.
    pub fn get<T: FromObject>(&self, index: usize) -> Option<T> {
        T::from_object(self.0.get(index)?)
    }

    /// Iterate over the elements, converting each to `T`. Elements that fail
    /// to convert are skipped.
    pub fn iter<'a, T: FromObject + 'a>(&'a self) -> impl Iterator<Item = T> + 'a {
        self.0.iter().filter_map(T::from_object)
    }

    /// Iterate over the raw objects.
    pub fn objects(&self) -> impl Iterator<Item = &Object> {
        self.0.iter()
    }
}

impl FromIterator<Object> for Array {
    fn from_iter<I: IntoIterator<Item = Object>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A dictionary mapping names to objects.
#[derive(Clone, Default)]
pub struct Dict(Arc<Vec<(Name, Object)>>);

impl Dict {
    /// Create an empty dictionary.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create a dictionary from key/value pairs.
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = (&'a str, Object)>) -> Self {
        Self(Arc::new(
            entries
                .into_iter()
                .map(|(k, v)| (Name::new(k), v))
                .collect(),
        ))
    }

    /// Whether the dictionary contains an entry for `key`.
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.iter().any(|(k, _)| k == key)
    }

    /// Get the entry for `key` as a specific type.
    pub fn get<T: FromObject>(&self, key: &str) -> Option<T> {
        T::from_object(self.get_object(key)?)
    }

    /// Get the raw entry for `key`.
    pub fn get_object(&self, key: &str) -> Option<&Object> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
            .filter(|v| !matches!(v, Object::Null))
    }

    /// Iterate over all keys.
    pub fn keys(&self) -> impl Iterator<Item = &Name> {
        self.0.iter().map(|(k, _)| k)
    }
}

impl Debug for Dict {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.0.iter().map(|(k, v)| (k, v)))
            .finish()
    }
}

/// A stream: a dictionary plus raw (still encoded) data.
#[derive(Clone)]
pub struct Stream {
    dict: Dict,
    data: Arc<[u8]>,
    obj_num: u32,
    inline: bool,
}

impl Stream {
    /// Create a stream from a dictionary and raw data. The stream has no
    /// object number (it behaves like a synthesized or inline object).
    pub fn new(dict: Dict, data: impl Into<Vec<u8>>) -> Self {
        Self {
            dict,
            data: data.into().into(),
            obj_num: 0,
            inline: false,
        }
    }

    /// Attach the indirect object number of the stream.
    pub fn with_obj_num(mut self, obj_num: u32) -> Self {
        self.obj_num = obj_num;
        self
    }

    /// Mark the stream as an inline image.
    pub fn with_inline(mut self) -> Self {
        self.inline = true;
        self
    }

    /// The stream dictionary.
    pub fn dict(&self) -> &Dict {
        &self.dict
    }

    /// The raw, still encoded stream data.
    pub fn raw_data(&self) -> &[u8] {
        &self.data
    }

    /// The indirect object number, or 0 if the stream has none.
    pub fn obj_num(&self) -> u32 {
        self.obj_num
    }

    /// Whether this is an inline image stream.
    pub fn is_inline(&self) -> bool {
        self.inline
    }
}

impl Debug for Stream {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Stream (len: {})", self.data.len())
    }
}

/// Conversion from a PDF object into a concrete type.
pub trait FromObject: Sized {
    /// Convert the object, returning `None` on a type mismatch.
    fn from_object(object: &Object) -> Option<Self>;
}

impl FromObject for Object {
    fn from_object(object: &Object) -> Option<Self> {
        Some(object.clone())
    }
}

impl FromObject for bool {
    fn from_object(object: &Object) -> Option<Self> {
        match object {
            Object::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl FromObject for i64 {
    fn from_object(object: &Object) -> Option<Self> {
        match object {
            Object::Int(i) => Some(*i),
            Object::Real(r) => Some(*r as i64),
            _ => None,
        }
    }
}

impl FromObject for i32 {
    fn from_object(object: &Object) -> Option<Self> {
        i64::from_object(object).map(|i| i as i32)
    }
}

impl FromObject for u32 {
    fn from_object(object: &Object) -> Option<Self> {
        i64::from_object(object).and_then(|i| u32::try_from(i).ok())
    }
}

impl FromObject for f32 {
    fn from_object(object: &Object) -> Option<Self> {
        match object {
            Object::Int(i) => Some(*i as f32),
            Object::Real(r) => Some(*r),
            _ => None,
        }
    }
}

impl FromObject for Name {
    fn from_object(object: &Object) -> Option<Self> {
        match object {
            Object::Name(n) => Some(n.clone()),
            _ => None,
        }
    }
}

impl FromObject for Array {
    fn from_object(object: &Object) -> Option<Self> {
        match object {
            Object::Array(a) => Some(a.clone()),
            _ => None,
        }
    }
}

impl FromObject for Dict {
    fn from_object(object: &Object) -> Option<Self> {
        match object {
            Object::Dict(d) => Some(d.clone()),
            Object::Stream(s) => Some(s.dict().clone()),
            _ => None,
        }
    }
}

impl FromObject for Stream {
    fn from_object(object: &Object) -> Option<Self> {
        match object {
            Object::Stream(s) => Some(s.clone()),
            _ => None,
        }
    }
}

impl FromObject for Arc<[u8]> {
    fn from_object(object: &Object) -> Option<Self> {
        match object {
            Object::String(s) => Some(s.clone()),
            _ => None,
        }
    }
}

/// Dictionary keys read by the decoder.
#[allow(missing_docs)]
pub mod keys {
    macro_rules! key {
        ($i:ident, $e:expr) => {
            pub const $i: &str = $e;
        };
    }

    key!(ALTERNATE, "Alternate");
    key!(BITS_PER_COMPONENT, "BitsPerComponent");
    key!(BLACK_IS_1, "BlackIs1");
    key!(BLACK_POINT, "BlackPoint");
    key!(COLORSPACE, "ColorSpace");
    key!(COLORS, "Colors");
    key!(COLOR_TRANSFORM, "ColorTransform");
    key!(COLUMNS, "Columns");
    key!(DECODE, "Decode");
    key!(DECODE_PARMS, "DecodeParms");
    key!(EARLY_CHANGE, "EarlyChange");
    key!(ENCODED_BYTE_ALIGN, "EncodedByteAlign");
    key!(END_OF_LINE, "EndOfLine");
    key!(FILTER, "Filter");
    key!(GAMMA, "Gamma");
    key!(HEIGHT, "Height");
    key!(IMAGE_MASK, "ImageMask");
    key!(JBIG2_GLOBALS, "JBIG2Globals");
    key!(K, "K");
    key!(MASK, "Mask");
    key!(MATTE, "Matte");
    key!(N, "N");
    key!(PREDICTOR, "Predictor");
    key!(RANGE, "Range");
    key!(ROWS, "Rows");
    key!(SMASK, "SMask");
    key!(SMASK_IN_DATA, "SMaskInData");
    key!(SUBTYPE, "Subtype");
    key!(TYPE, "Type");
    key!(WHITE_POINT, "WhitePoint");
    key!(WIDTH, "Width");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_access() {
        let dict = Dict::from_entries([
            ("Width", Object::from(3)),
            ("Scale", Object::from(1.5f32)),
            ("Kind", Object::name("Image")),
            ("Flag", Object::from(true)),
        ]);

        assert_eq!(dict.get::<u32>("Width"), Some(3));
        assert_eq!(dict.get::<f32>("Width"), Some(3.0));
        assert_eq!(dict.get::<i32>("Scale"), Some(1));
        assert_eq!(dict.get::<Name>("Kind").unwrap().as_str(), "Image");
        assert_eq!(dict.get::<bool>("Flag"), Some(true));
        assert_eq!(dict.get::<u32>("Missing"), None);
        assert!(!dict.contains_key("Missing"));
    }

    #[test]
    fn null_entries_are_absent() {
        let dict = Dict::from_entries([("Mask", Object::Null)]);
        assert!(dict.get_object("Mask").is_none());
    }

    #[test]
    fn array_iteration() {
        let array = Array::from_objects([Object::from(1), Object::from(2.5f32), Object::from(3)]);

        let floats: Vec<f32> = array.iter::<f32>().collect();
        assert_eq!(floats, vec![1.0, 2.5, 3.0]);
        assert_eq!(array.get::<i32>(1), Some(2));
        assert_eq!(array.len(), 3);
    }

    #[test]
    fn negative_values_do_not_become_unsigned() {
        let dict = Dict::from_entries([("Width", Object::from(-5))]);
        assert_eq!(dict.get::<u32>("Width"), None);
        assert_eq!(dict.get::<i32>("Width"), Some(-5));
    }

    #[test]
    fn stream_keeps_dict_and_data() {
        let dict = Dict::from_entries([("Length", Object::from(3))]);
        let stream = Stream::new(dict, vec![1, 2, 3]).with_obj_num(12);

        assert_eq!(stream.raw_data(), &[1, 2, 3]);
        assert_eq!(stream.obj_num(), 12);
        assert!(stream.dict().contains_key("Length"));
    }
}
