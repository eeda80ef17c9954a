pub mod extract;
pub mod frontmatter;
pub mod note_parser;
pub mod note_serializer;

pub use extract::{LinePatterns, ScanFields};
pub use frontmatter::Frontmatter;
pub use note_parser::{markdown_to_task, parse_document, ParsedBody};
pub use note_serializer::task_to_document;
