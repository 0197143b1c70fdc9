/// Database plumbing
///
/// - `pool`: PostgreSQL connection pool setup and health checks
/// - `migrations`: embedded schema migrations
///
/// Table access lives in [`crate::models`].

pub mod migrations;
pub mod pool;
