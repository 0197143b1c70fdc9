/// Authentication and authorization utilities
///
/// # Modules
///
/// - [`password`]: Argon2id hashing and password strength rules
/// - [`jwt`]: access/refresh token issuing, validation and rotation
/// - [`otp`]: six-digit one-time code generation
/// - [`google`]: Google ID-token verification
/// - [`middleware`]: request authentication and role checks
///
/// # Example
///
/// ```no_run
/// use restohub_shared::auth::password::{hash_password, verify_password};
/// use restohub_shared::auth::jwt::issue_token_pair;
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("correct horse battery")?;
/// assert!(verify_password("correct horse battery", &hash)?);
///
/// let tokens = issue_token_pair(Uuid::new_v4(), "a-secret-of-at-least-32-characters!")?;
/// # Ok(())
/// # }
/// ```

pub mod google;
pub mod jwt;
pub mod middleware;
pub mod otp;
pub mod password;
