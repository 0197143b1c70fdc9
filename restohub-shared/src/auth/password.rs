/// Password hashing and strength checks
///
/// Hashing uses Argon2id (64 MB memory, 3 passes, 4 lanes, 32-byte output)
/// and produces PHC strings, so the parameters travel with each hash.
///
/// Strength checks mirror the usual account-password rules: a minimum
/// length, no all-digit passwords, no well-known passwords, and nothing too
/// close to the account's email address.
///
/// # Example
///
/// ```
/// use restohub_shared::auth::password::{hash_password, verify_password};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("super_secret_password_123")?;
/// assert!(verify_password("super_secret_password_123", &hash)?);
/// assert!(!verify_password("wrong_password", &hash)?);
/// # Ok(())
/// # }
/// ```

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, ParamsBuilder, Version,
};

/// Minimum accepted password length, in characters
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Similarity ratio at or above which a password counts as "too similar"
const MAX_SIMILARITY: f64 = 0.7;

/// Passwords rejected outright regardless of length
const COMMON_PASSWORDS: &[&str] = &[
    "password", "password1", "password12", "password123", "password1234",
    "passw0rd", "p@ssw0rd", "p@ssword", "123456789", "12345678", "1234567890",
    "qwerty123", "qwertyuiop", "1q2w3e4r", "1q2w3e4r5t", "qwerty12", "qwerty1234",
    "iloveyou", "sunshine", "princess", "football", "baseball", "welcome1",
    "welcome123", "admin123", "administrator", "letmein1", "abc12345", "abcd1234",
    "trustno1", "superman", "starwars", "whatever", "michael1", "jennifer",
    "computer", "internet", "corvette", "mercedes", "maverick", "dragon123",
    "monkey123", "shadow123", "master123", "freedom1", "changeme", "secret123",
    "football1", "baseball1", "aa123456", "asdfghjkl", "zxcvbnm1", "11111111",
    "00000000", "88888888", "qazwsxedc", "1qaz2wsx", "restaurant", "password!",
];

/// Error type for password hashing operations
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    /// Failed to hash password
    #[error("Failed to hash password: {0}")]
    HashError(String),

    /// Failed to verify password
    #[error("Failed to verify password: {0}")]
    VerifyError(String),

    /// Invalid password hash format
    #[error("Invalid password hash format: {0}")]
    InvalidHash(String),
}

/// Hashes a password using Argon2id
///
/// Output is a PHC string such as
/// `$argon2id$v=19$m=65536,t=3,p=4$<salt>$<hash>`.
///
/// # Errors
///
/// Returns `PasswordError::HashError` if hashing fails
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);

    let params = ParamsBuilder::new()
        .m_cost(65536)
        .t_cost(3)
        .p_cost(4)
        .output_len(32)
        .build()
        .map_err(|e| PasswordError::HashError(format!("Invalid parameters: {}", e)))?;

    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, params);

    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::HashError(format!("Hash generation failed: {}", e)))?;

    Ok(password_hash.to_string())
}

/// Verifies a password against a PHC hash
///
/// Returns `Ok(false)` for a wrong password and `Err` only when the stored
/// hash cannot be parsed or verification itself fails.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| PasswordError::InvalidHash(format!("Failed to parse hash: {}", e)))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(_) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::VerifyError(format!("Verification failed: {}", e))),
    }
}

/// Checks a candidate password and returns every rule it breaks
///
/// An empty vector means the password is acceptable. `email` is the
/// account's address; its local part and the pieces of it split on
/// punctuation are compared against the password.
///
/// # Example
///
/// ```
/// use restohub_shared::auth::password::validate_password_strength;
///
/// assert!(validate_password_strength("Grill&Chill2024", "chef@example.com").is_empty());
/// assert!(!validate_password_strength("12345678", "chef@example.com").is_empty());
/// ```
pub fn validate_password_strength(password: &str, email: &str) -> Vec<String> {
    let mut problems = Vec::new();

    if password.chars().count() < MIN_PASSWORD_LENGTH {
        problems.push(format!(
            "This password is too short. It must contain at least {} characters.",
            MIN_PASSWORD_LENGTH
        ));
    }

    if !password.is_empty() && password.chars().all(|c| c.is_ascii_digit()) {
        problems.push("This password is entirely numeric.".to_string());
    }

    let lowered = password.trim().to_lowercase();
    if COMMON_PASSWORDS.contains(&lowered.as_str()) {
        problems.push("This password is too common.".to_string());
    }

    if is_too_similar(&lowered, email) {
        problems.push("The password is too similar to the email address.".to_string());
    }

    problems
}

fn is_too_similar(password: &str, email: &str) -> bool {
    if password.is_empty() {
        return false;
    }

    let email = email.to_lowercase();
    let local = email.split('@').next().unwrap_or_default();

    let mut candidates = vec![email.as_str(), local];
    candidates.extend(local.split(|c: char| !c.is_alphanumeric()).filter(|p| p.len() > 2));

    candidates
        .into_iter()
        .filter(|c| !c.is_empty())
        .any(|candidate| similarity(password, candidate) >= MAX_SIMILARITY)
}

/// Ratcliff/Obershelp similarity: `2 * matched / (len(a) + len(b))`
fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    (2 * matching_chars(&a, &b)) as f64 / total as f64
}

fn matching_chars(a: &[char], b: &[char]) -> usize {
    let (start_a, start_b, len) = longest_common_block(a, b);
    if len == 0 {
        return 0;
    }
    len + matching_chars(&a[..start_a], &b[..start_b])
        + matching_chars(&a[start_a + len..], &b[start_b + len..])
}

fn longest_common_block(a: &[char], b: &[char]) -> (usize, usize, usize) {
    let mut best = (0, 0, 0);
    let mut prev = vec![0usize; b.len() + 1];

    for i in 0..a.len() {
        let mut row = vec![0usize; b.len() + 1];
        for j in 0..b.len() {
            if a[i] == b[j] {
                row[j + 1] = prev[j] + 1;
                if row[j + 1] > best.2 {
                    best = (i + 1 - row[j + 1], j + 1 - row[j + 1], row[j + 1]);
                }
            }
        }
        prev = row;
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_password() {
        let hash = hash_password("test_password_123").expect("Hash should succeed");

        assert!(hash.starts_with("$argon2id$"));
        assert!(hash.contains("v=19"));
        assert!(hash.contains("m=65536"));
        assert!(hash.contains("t=3"));
        assert!(hash.contains("p=4"));
    }

    #[test]
    fn test_hash_password_produces_different_salts() {
        let hash1 = hash_password("same_password").unwrap();
        let hash2 = hash_password("same_password").unwrap();
        assert_ne!(hash1, hash2);
    }

    #[test]
    fn test_verify_password() {
        let hash = hash_password("correct_password").unwrap();

        assert!(verify_password("correct_password", &hash).unwrap());
        assert!(!verify_password("wrong_password", &hash).unwrap());
        assert!(!verify_password("", &hash).unwrap());
    }

    #[test]
    fn test_verify_password_invalid_hash() {
        assert!(verify_password("password", "invalid_hash").is_err());
        assert!(verify_password("password", "$argon2id$invalid").is_err());
    }

    #[test]
    fn test_strong_password_accepted() {
        for password in ["MyP@ssw0rd!", "Grill&Chill2024", "tacos on tuesday"] {
            let problems = validate_password_strength(password, "owner@bistro.com");
            assert!(problems.is_empty(), "{password}: {problems:?}");
        }
    }

    #[test]
    fn test_short_password_rejected() {
        let problems = validate_password_strength("Sh0rt!", "owner@bistro.com");
        assert!(problems.iter().any(|p| p.contains("too short")));
    }

    #[test]
    fn test_numeric_password_rejected() {
        let problems = validate_password_strength("904412345678", "owner@bistro.com");
        assert_eq!(problems, vec!["This password is entirely numeric.".to_string()]);
    }

    #[test]
    fn test_common_password_rejected() {
        let problems = validate_password_strength("Password123", "owner@bistro.com");
        assert!(problems.iter().any(|p| p.contains("too common")));
    }

    #[test]
    fn test_password_similar_to_email_rejected() {
        let problems = validate_password_strength("mariorossi1", "mario.rossi@bistro.com");
        assert!(problems.iter().any(|p| p.contains("too similar")));

        let problems = validate_password_strength("mario1234", "mario@bistro.com");
        assert!(problems.iter().any(|p| p.contains("too similar")));
    }

    #[test]
    fn test_multiple_problems_reported_together() {
        let problems = validate_password_strength("1234567", "owner@bistro.com");
        assert!(problems.len() >= 2);
    }

    #[test]
    fn test_similarity_ratio() {
        assert_eq!(similarity("abcd", "abcd"), 1.0);
        assert_eq!(similarity("abcd", "wxyz"), 0.0);
        assert!((similarity("abcd", "bcde") - 0.75).abs() < f64::EPSILON);
    }
}
