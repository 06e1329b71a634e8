//! The entity management and character decoding core of a streaming XML parser.
//!
//! - [`entity::XmlEntityManager`] opens and closes entities and keeps the
//!   entity stack and the reader stack in sync.
//! - [`reader::XmlReaderFactory`] builds readers from input sources, detecting
//!   the encoding of undeclared byte streams.
//! - [`encoding`] provides the charset table, the recognizers and the streaming
//!   decoders.
//!
//! ```
//! use exent::{
//!     entity::{XmlEntityContext, XmlEntityManager},
//!     io::XmlInputSource,
//! };
//!
//! let mut manager = XmlEntityManager::new(0);
//! assert!(manager.start_reading_from_document(XmlInputSource::from_bytes("<doc>&foo;</doc>")));
//! manager.add_internal_entity_decl("foo", "bar");
//! assert!(manager.start_reading_from_entity("foo", 1, XmlEntityContext::InContent));
//! let mut text = String::new();
//! while let Some(c) = manager.read_char() {
//!     text.push(c);
//! }
//! assert_eq!(text, "bar");
//! assert!(manager.change_readers().is_some());
//! ```

#![allow(clippy::new_without_default)]
#![warn(unused_assignments)]
#![warn(unused_mut)]
#![warn(unused_imports)]
#![warn(unused_variables)]

pub mod dict;
pub mod encoding;
pub mod entity;
pub mod error;
pub mod globals;
pub mod io;
pub mod reader;
pub mod uri;
