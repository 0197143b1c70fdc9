/// Middleware for the API server
///
/// - `security`: response security headers
///
/// JWT authentication lives in [`crate::app`] as a `from_fn_with_state`
/// layer, since it needs the application state.

pub mod security;
