/// Router Module Index
///
/// Splits the API surface by access requirement so the authentication layer
/// is attached at the module boundary rather than per handler.

/// Routes open to anonymous callers: catalog browsing, stats, sign-up, sign-in.
pub mod public;

/// Routes behind the `AuthUser` layer. Role checks happen in the handlers.
pub mod authenticated;
