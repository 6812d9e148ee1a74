mod dictionary;
mod primitive;
mod stream;
mod string;

pub use dictionary::Dictionary;
pub use primitive::{Object, ObjectId};
pub use stream::Stream;
pub use string::{PdfString, StringFormat};
