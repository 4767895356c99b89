#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate serde_derive;

use quick_xml as xml;

pub mod error;

pub mod consts;

mod digit;

pub mod metadata;
pub use crate::metadata::Metadata;

pub mod as_you_type;
pub use crate::as_you_type::AsYouTypeFormatter;
