use crate::objects::{Dictionary, Object};
use crate::parser::{filters, ParseResult};

/// A stream object: dictionary plus raw, still-filtered bytes.
///
/// `Length` is not kept in sync while the data changes; the writer
/// sets it from the actual byte count.
#[derive(Debug, Clone, PartialEq)]
pub struct Stream {
    dictionary: Dictionary,
    data: Vec<u8>,
}

impl Stream {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            dictionary: Dictionary::new(),
            data,
        }
    }

    pub fn with_dictionary(dictionary: Dictionary, data: Vec<u8>) -> Self {
        Self { dictionary, data }
    }

    pub fn dictionary(&self) -> &Dictionary {
        &self.dictionary
    }

    pub fn dictionary_mut(&mut self) -> &mut Dictionary {
        &mut self.dictionary
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Vec<u8> {
        &mut self.data
    }

    pub fn set_data(&mut self, data: Vec<u8>) {
        self.data = data;
    }

    pub fn into_parts(self) -> (Dictionary, Vec<u8>) {
        (self.dictionary, self.data)
    }

    pub(crate) fn parts_mut(&mut self) -> (&mut Dictionary, &mut Vec<u8>) {
        (&mut self.dictionary, &mut self.data)
    }

    /// Filter names in application order.
    pub fn filters(&self) -> Vec<&str> {
        match self.dictionary.get("Filter") {
            Some(Object::Name(name)) => vec![name.as_str()],
            Some(Object::Array(items)) => items.iter().filter_map(Object::as_name).collect(),
            _ => Vec::new(),
        }
    }

    pub fn is_filtered(&self) -> bool {
        !self.filters().is_empty()
    }

    pub fn set_filter(&mut self, filter: &str) {
        self.dictionary.set("Filter", Object::name(filter));
    }

    /// Removes `Filter` and `DecodeParms`.
    pub fn clear_filters(&mut self) {
        self.dictionary.remove("Filter");
        self.dictionary.remove("DecodeParms");
    }

    /// Data with every filter of the chain undone.
    pub fn decoded_data(&self) -> ParseResult<Vec<u8>> {
        filters::decode_stream(&self.data, &self.dictionary)
    }

    /// Replaces the content with Flate-compressed `data`.
    #[cfg(feature = "compression")]
    pub fn set_flate_data(&mut self, data: &[u8]) -> crate::Result<()> {
        self.data = crate::compression::compress(data)?;
        self.dictionary.remove("DecodeParms");
        self.set_filter("FlateDecode");
        Ok(())
    }

    /// Compresses an unfiltered stream in place. Returns whether it did.
    #[cfg(feature = "compression")]
    pub fn compress_flate(&mut self) -> crate::Result<bool> {
        if self.is_filtered() {
            return Ok(false);
        }
        let compressed = crate::compression::compress(&self.data)?;
        if compressed.len() >= self.data.len() {
            return Ok(false);
        }
        self.data = compressed;
        self.set_filter("FlateDecode");
        Ok(true)
    }
}
