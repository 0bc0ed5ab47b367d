//! Document model.
//!
//! The unit of storage is a [`Document`]: an insertion-ordered mapping from
//! field names to [`Value`]s. Values form a closed tagged union covering
//! every type the wire format can carry, including the 12-byte [`ObjectId`]
//! identifier generated for documents inserted without an `_id` field.
//!
//! # Example
//!
//! ```rust
//! use docstore_driver::{doc, Value};
//!
//! let user = doc! {
//!     "nome" => "Diogo",
//!     "tipo" => "Servidor",
//!     "idade" => 38,
//! };
//!
//! assert_eq!(user.get_str("tipo"), Some("Servidor"));
//! assert_eq!(user.get("idade"), Some(&Value::Int64(38)));
//! ```

mod oid;
mod value;

pub use oid::ObjectId;
pub use value::{Document, Value};

/// Construct a [`Document`] from `key => value` pairs.
///
/// Field order follows the order written. Values are converted through
/// [`Value::from`], so literals, strings, nested documents and `ObjectId`s
/// can be mixed freely.
#[macro_export]
macro_rules! doc {
    () => {
        $crate::document::Document::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut document = $crate::document::Document::new();
        $(
            document.insert($key, $crate::document::Value::from($value));
        )+
        document
    }};
}
