//! Object syntax serialization (ISO 32000-1 Section 7.3)

use crate::objects::{Dictionary, Object, PdfString, StringFormat};
use crate::parser::lexer::{is_delimiter, is_whitespace};

/// Appends the textual form of `object` to `out`.
///
/// Streams write their dictionary with `Length` taken from the data, then the
/// raw bytes between `stream` and `endstream`.
pub fn write_object(out: &mut Vec<u8>, object: &Object) {
    // Explicit stack of pending pieces keeps deeply nested arrays off the call stack.
    enum Piece<'a> {
        Value(&'a Object),
        Raw(&'static [u8]),
        Key(&'a str),
    }

    let mut pending = vec![Piece::Value(object)];
    while let Some(piece) = pending.pop() {
        let value = match piece {
            Piece::Raw(bytes) => {
                out.extend_from_slice(bytes);
                continue;
            }
            Piece::Key(key) => {
                write_name(out, key);
                out.push(b' ');
                continue;
            }
            Piece::Value(value) => value,
        };

        match value {
            Object::Null => out.extend_from_slice(b"null"),
            Object::Boolean(true) => out.extend_from_slice(b"true"),
            Object::Boolean(false) => out.extend_from_slice(b"false"),
            Object::Integer(i) => out.extend_from_slice(i.to_string().as_bytes()),
            Object::Real(r) => out.extend_from_slice(format_real(*r).as_bytes()),
            Object::String(s) => write_string(out, s),
            Object::Name(name) => write_name(out, name),
            Object::Reference(id) => {
                out.extend_from_slice(format!("{} {} R", id.number(), id.generation()).as_bytes())
            }
            Object::Array(items) => {
                out.push(b'[');
                pending.push(Piece::Raw(b"]"));
                for (i, item) in items.iter().enumerate().rev() {
                    pending.push(Piece::Value(item));
                    if i > 0 {
                        pending.push(Piece::Raw(b" "));
                    }
                }
            }
            Object::Dictionary(dict) => push_dictionary(&mut pending, out, dict),
            Object::Stream(stream) => {
                let mut dict = stream.dictionary().clone();
                dict.set("Length", stream.data().len());
                let mut head = Vec::new();
                write_dictionary(&mut head, &dict);
                out.extend_from_slice(&head);
                out.extend_from_slice(b"\nstream\n");
                out.extend_from_slice(stream.data());
                out.extend_from_slice(b"\nendstream");
            }
        }
    }

    fn push_dictionary<'a>(pending: &mut Vec<Piece<'a>>, out: &mut Vec<u8>, dict: &'a Dictionary) {
        out.extend_from_slice(b"<<");
        pending.push(Piece::Raw(b" >>"));
        for (key, value) in dict.sorted_entries().into_iter().rev() {
            pending.push(Piece::Value(value));
            pending.push(Piece::Key(key));
            pending.push(Piece::Raw(b" "));
        }
    }
}

pub fn write_dictionary(out: &mut Vec<u8>, dict: &Dictionary) {
    write_object(out, &Object::Dictionary(dict.clone()));
}

/// Up to six decimals, no trailing zeros, never `-0` or exponent notation.
pub fn format_real(value: f64) -> String {
    if !value.is_finite() {
        tracing::warn!("non-finite real {value} written as 0");
        return "0".to_string();
    }
    let text = format!("{value:.6}");
    let text = text.trim_end_matches('0').trim_end_matches('.');
    match text {
        "-0" | "" => "0".to_string(),
        other => other.to_string(),
    }
}

pub fn write_name(out: &mut Vec<u8>, name: &str) {
    out.push(b'/');
    for &byte in name.as_bytes() {
        if byte == b'#' || is_delimiter(byte) || is_whitespace(byte) || !(0x21..=0x7E).contains(&byte)
        {
            out.extend_from_slice(format!("#{byte:02X}").as_bytes());
        } else {
            out.push(byte);
        }
    }
}

/// Text-like strings are written literally; binary data goes out as hex.
pub fn write_string(out: &mut Vec<u8>, string: &PdfString) {
    let bytes = string.as_bytes();
    if string.format() == StringFormat::Hexadecimal || is_binary(bytes) {
        out.push(b'<');
        out.extend_from_slice(hex::encode_upper(bytes).as_bytes());
        out.push(b'>');
        return;
    }

    out.push(b'(');
    for &byte in bytes {
        match byte {
            b'(' | b')' | b'\\' => out.extend_from_slice(&[b'\\', byte]),
            b'\n' => out.extend_from_slice(b"\\n"),
            b'\r' => out.extend_from_slice(b"\\r"),
            b'\t' => out.extend_from_slice(b"\\t"),
            _ => out.push(byte),
        }
    }
    out.push(b')');
}

fn is_binary(bytes: &[u8]) -> bool {
    bytes
        .iter()
        .any(|&b| !(0x20..0x7F).contains(&b) && !matches!(b, b'\n' | b'\r' | b'\t'))
}
