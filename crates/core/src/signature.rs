//! HMAC verification of webhook bodies.
//!
//! The platform signs the raw request body with the app secret and sends the
//! digest as `<method>=<hex-digest>`, e.g. `sha1=5d41...`. `sha1` is carried in
//! `x-hub-signature`; newer deliveries also carry `sha256` in
//! `x-hub-signature-256`.

use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::Sha256;

use crate::errors::SignatureError;

pub const SHA1_HEADER: &str = "x-hub-signature";
pub const SHA256_HEADER: &str = "x-hub-signature-256";

type HmacSha1 = Hmac<Sha1>;
type HmacSha256 = Hmac<Sha256>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignatureMethod {
    Sha1,
    Sha256,
}

impl SignatureMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
        }
    }

    pub fn header_name(self) -> &'static str {
        match self {
            Self::Sha1 => SHA1_HEADER,
            Self::Sha256 => SHA256_HEADER,
        }
    }
}

impl std::str::FromStr for SignatureMethod {
    type Err = SignatureError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "sha1" => Ok(Self::Sha1),
            "sha256" => Ok(Self::Sha256),
            other => Err(SignatureError::UnsupportedMethod(other.to_owned())),
        }
    }
}

/// Returns `true` only when `header` carries a digest of `raw_body` keyed by
/// `secret`.
pub fn verify(raw_body: &[u8], header: Option<&str>, secret: &[u8]) -> bool {
    verify_header(raw_body, header, secret).is_ok()
}

pub fn verify_header(
    raw_body: &[u8],
    header: Option<&str>,
    secret: &[u8],
) -> Result<(), SignatureError> {
    let header = header.ok_or(SignatureError::Missing)?;
    let (method, digest) = header.split_once('=').ok_or(SignatureError::Malformed)?;
    let method: SignatureMethod = method.parse()?;
    // The platform emits lowercase hex; anything else is not a digest it sent.
    if !digest.bytes().all(|byte| matches!(byte, b'0'..=b'9' | b'a'..=b'f')) {
        return Err(SignatureError::Malformed);
    }
    let expected = hex::decode(digest).map_err(|_| SignatureError::Malformed)?;

    match method {
        SignatureMethod::Sha1 => {
            let mut mac = HmacSha1::new_from_slice(secret).map_err(|_| SignatureError::Mismatch)?;
            mac.update(raw_body);
            mac.verify_slice(&expected).map_err(|_| SignatureError::Mismatch)
        }
        SignatureMethod::Sha256 => {
            let mut mac =
                HmacSha256::new_from_slice(secret).map_err(|_| SignatureError::Mismatch)?;
            mac.update(raw_body);
            mac.verify_slice(&expected).map_err(|_| SignatureError::Mismatch)
        }
    }
}

/// Produces a header value in the form the platform sends.
pub fn sign(raw_body: &[u8], secret: &[u8], method: SignatureMethod) -> String {
    let digest = match method {
        SignatureMethod::Sha1 => match HmacSha1::new_from_slice(secret) {
            Ok(mut mac) => {
                mac.update(raw_body);
                hex::encode(mac.finalize().into_bytes())
            }
            Err(_) => String::new(),
        },
        SignatureMethod::Sha256 => match HmacSha256::new_from_slice(secret) {
            Ok(mut mac) => {
                mac.update(raw_body);
                hex::encode(mac.finalize().into_bytes())
            }
            Err(_) => String::new(),
        },
    };
    format!("{}={digest}", method.as_str())
}

#[cfg(test)]
mod tests {
    use super::{sign, verify, verify_header, SignatureMethod};
    use crate::errors::SignatureError;

    const SECRET: &[u8] = b"app-secret";
    const BODY: &[u8] = br#"{"object":"page","entry":[]}"#;

    #[test]
    fn known_sha1_vector_verifies() {
        // RFC 2202 test case 2.
        let header = "sha1=effcdf6ae5eb2fa2d27416d5f184df9c259a7c79";
        assert!(verify(b"what do ya want for nothing?", Some(header), b"Jefe"));
    }

    #[test]
    fn signatures_from_sign_verify_for_both_methods() {
        for method in [SignatureMethod::Sha1, SignatureMethod::Sha256] {
            let header = sign(BODY, SECRET, method);
            assert!(header.starts_with(method.as_str()));
            assert!(verify(BODY, Some(&header), SECRET), "{method:?} should verify");
        }
    }

    #[test]
    fn any_single_bit_flip_in_body_fails() {
        let header = sign(BODY, SECRET, SignatureMethod::Sha1);
        for index in 0..BODY.len() {
            for bit in 0..8 {
                let mut mutated = BODY.to_vec();
                mutated[index] ^= 1 << bit;
                assert!(!verify(&mutated, Some(&header), SECRET));
            }
        }
    }

    #[test]
    fn any_single_bit_flip_in_header_fails() {
        let header = sign(BODY, SECRET, SignatureMethod::Sha1);
        for index in 0..header.len() {
            for bit in 0..8 {
                let mut bytes = header.clone().into_bytes();
                bytes[index] ^= 1 << bit;
                let Ok(mutated) = String::from_utf8(bytes) else { continue };
                assert!(!verify(BODY, Some(&mutated), SECRET), "mutated header `{mutated}`");
            }
        }
    }

    #[test]
    fn wrong_secret_is_a_mismatch() {
        let header = sign(BODY, SECRET, SignatureMethod::Sha256);
        assert_eq!(verify_header(BODY, Some(&header), b"other"), Err(SignatureError::Mismatch));
    }

    #[test]
    fn missing_and_malformed_headers_are_rejected() {
        assert_eq!(verify_header(BODY, None, SECRET), Err(SignatureError::Missing));
        assert_eq!(verify_header(BODY, Some("sha1"), SECRET), Err(SignatureError::Malformed));
        assert_eq!(verify_header(BODY, Some("sha1=zz"), SECRET), Err(SignatureError::Malformed));
        assert_eq!(verify_header(BODY, Some("sha1=ABCD"), SECRET), Err(SignatureError::Malformed));
        assert_eq!(
            verify_header(BODY, Some("md5=abcd"), SECRET),
            Err(SignatureError::UnsupportedMethod("md5".to_owned()))
        );
        assert!(!verify(BODY, Some(""), SECRET));
    }
}
