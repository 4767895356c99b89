mod format;
pub use self::format::Format;

mod descriptor;
pub use self::descriptor::Descriptor;

mod metadata;
pub use self::metadata::Metadata;

pub mod loader;

mod database;
pub use self::database::{Database, DEFAULT as DATABASE};
