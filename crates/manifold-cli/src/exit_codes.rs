//! Standard exit codes for CLI operations

/// Success - operation completed without errors
#[allow(dead_code)]
pub const SUCCESS: i32 = 0;

/// General error - unspecified failure or rejected input
pub const ERROR: i32 = 1;

/// A component, document, parameter or app directory does not exist
pub const NOT_FOUND: i32 = 2;

/// Template error - a `.j2` component failed to render
pub const TEMPLATE_ERROR: i32 = 3;

/// A manifest, the overlay file or app.yaml could not be parsed
pub const PARSE_ERROR: i32 = 4;

/// IO error - permission denied, unreadable files, etc.
pub const IO_ERROR: i32 = 5;

/// The overlay file changed on disk since it was read
pub const WRITE_CONFLICT: i32 = 6;
