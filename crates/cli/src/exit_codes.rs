//! CLI exit code registry.
//!
//! Exit codes are part of the shell contract; scripts rely on them.
//!
//! | Code | Meaning                                   |
//! |------|-------------------------------------------|
//! | 0    | Success                                   |
//! | 1    | General error                             |
//! | 2    | Usage error (bad args, missing file)      |
//! | 3    | Queue or status file could not be used    |
//! | 10   | The script faulted (syntax or runtime)    |

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, unreadable script.
pub const EXIT_USAGE: u8 = 2;

/// The shared queue or the status snapshot could not be read or written.
pub const EXIT_STORE: u8 = 3;

/// The script stopped on a syntax or runtime fault.
pub const EXIT_SCRIPT_FAULT: u8 = 10;
