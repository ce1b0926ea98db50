use base64::Engine;
use ring::rand::{SecureRandom, SystemRandom};

/// Random bytes behind each share token (256 bits).
const TOKEN_BYTES: usize = 32;

/// Generate an unguessable, URL-safe share token.
pub fn generate_share_token() -> Result<String, ring::error::Unspecified> {
    let mut buf = [0u8; TOKEN_BYTES];
    SystemRandom::new().fill(&mut buf)?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buf))
}
