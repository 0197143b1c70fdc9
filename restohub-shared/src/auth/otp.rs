/// One-time verification codes
///
/// Codes are six decimal digits drawn from the OS-seeded thread RNG.
/// Storage, expiry and attempt counting live in [`crate::models::otp`].

use rand::Rng;

/// Number of digits in a code
pub const OTP_LENGTH: usize = 6;

/// Generates a fresh code; codes never start with zero
pub fn generate_otp() -> String {
    let code: u32 = rand::thread_rng().gen_range(100_000..1_000_000);
    code.to_string()
}

/// Whether `code` has the shape of a code (exactly six ASCII digits)
pub fn is_well_formed(code: &str) -> bool {
    code.len() == OTP_LENGTH && code.bytes().all(|b| b.is_ascii_digit())
}
