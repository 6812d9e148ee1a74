//! Content stream tokenization into operator/operand groups

use crate::objects::{Dictionary, Object, PdfString};
use crate::parser::lexer::{Lexer, Token};
use crate::parser::{ParseError, ParseResult};
use crate::writer::write_object;

/// One content stream operator with the operands preceding it.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub operator: String,
    pub operands: Vec<Object>,
}

impl Operation {
    pub fn new(operator: impl Into<String>, operands: Vec<Object>) -> Self {
        Self {
            operator: operator.into(),
            operands,
        }
    }

    /// Serializes as `operand ... operator`.
    pub fn encode(&self, out: &mut Vec<u8>) {
        for operand in &self.operands {
            write_object(out, operand);
            out.push(b' ');
        }
        out.extend_from_slice(self.operator.as_bytes());
    }
}

enum Container {
    Array(Vec<Object>),
    Dict(Dictionary, Option<String>),
}

/// Splits `data` into operations. Inline image data (`BI ... ID ... EI`) is
/// skipped; the image dictionary entries become operands of `ID`.
pub fn parse_operations(data: &[u8]) -> ParseResult<Vec<Operation>> {
    let mut lexer = Lexer::new(data);
    let mut operations = Vec::new();
    let mut operands = Vec::new();
    let mut containers: Vec<Container> = Vec::new();

    loop {
        let position = lexer.position();
        let error = |message: &str| ParseError::SyntaxError {
            position,
            message: message.to_string(),
        };

        let value = match lexer.next_token()? {
            Token::Eof => break,
            Token::Boolean(b) => Object::Boolean(b),
            Token::Integer(i) => Object::Integer(i),
            Token::Real(r) => Object::Real(r),
            Token::String(bytes) => Object::String(PdfString::new(bytes)),
            Token::HexString(bytes) => Object::String(PdfString::hex(bytes)),
            Token::Null => Object::Null,
            Token::Name(name) => {
                if let Some(Container::Dict(_, key)) = containers.last_mut() {
                    if key.is_none() {
                        *key = Some(name);
                        continue;
                    }
                }
                Object::Name(name)
            }
            Token::ArrayStart => {
                containers.push(Container::Array(Vec::new()));
                continue;
            }
            Token::DictStart => {
                containers.push(Container::Dict(Dictionary::new(), None));
                continue;
            }
            Token::ArrayEnd => match containers.pop() {
                Some(Container::Array(items)) => Object::Array(items),
                _ => return Err(error("unbalanced ']'")),
            },
            Token::DictEnd => match containers.pop() {
                Some(Container::Dict(dict, None)) => Object::Dictionary(dict),
                _ => return Err(error("unbalanced '>>'")),
            },
            Token::Keyword(operator) => {
                if !containers.is_empty() {
                    return Err(error("operator inside array or dictionary"));
                }
                let inline_image = operator == "ID";
                operations.push(Operation::new(operator, std::mem::take(&mut operands)));
                if inline_image {
                    lexer.skip_inline_image_data();
                    operations.push(Operation::new("EI", Vec::new()));
                }
                continue;
            }
            other => return Err(error(&format!("unexpected {other:?} in content stream"))),
        };

        match containers.last_mut() {
            Some(Container::Array(items)) => items.push(value),
            Some(Container::Dict(dict, key)) => match key.take() {
                Some(key) => dict.set(key, value),
                None => return Err(error("dictionary key must be a name")),
            },
            None => operands.push(value),
        }
    }

    if !containers.is_empty() {
        return Err(ParseError::SyntaxError {
            position: data.len(),
            message: "unterminated array or dictionary".to_string(),
        });
    }
    Ok(operations)
}

/// Inverse of [`parse_operations`], one operation per line.
pub fn encode_operations(operations: &[Operation]) -> Vec<u8> {
    let mut out = Vec::new();
    for operation in operations {
        operation.encode(&mut out);
        out.push(b'\n');
    }
    out
}
