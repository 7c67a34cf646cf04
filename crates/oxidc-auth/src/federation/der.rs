//! ASN.1/DER public-key construction from raw JWK fields.
//!
//! JWKS documents carry RSA keys as raw base64url modulus/exponent pairs.
//! Verifying a signature needs an actual public-key object, so this module
//! rebuilds the standard `SubjectPublicKeyInfo` DER structure from those
//! two byte strings:
//!
//! ```text
//! SEQUENCE {
//!     SEQUENCE {
//!         OBJECT IDENTIFIER rsaEncryption (1.2.840.113549.1.1.1)
//!         NULL
//!     }
//!     BIT STRING {
//!         SEQUENCE {
//!             INTEGER n
//!             INTEGER e
//!         }
//!     }
//! }
//! ```
//!
//! Everything here is a pure function over byte slices, so the encoding
//! can be tested exhaustively against known fixtures without touching any
//! cryptographic library.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// DER AlgorithmIdentifier for rsaEncryption with NULL parameters.
const RSA_ALGORITHM_IDENTIFIER: [u8; 15] = [
    0x30, 0x0d, // SEQUENCE, 13 bytes
    0x06, 0x09, 0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01, 0x01, 0x01, // OID 1.2.840.113549.1.1.1
    0x05, 0x00, // NULL
];

/// Encodes a definite DER length (short or long form).
fn encode_length(len: usize) -> Vec<u8> {
    if len < 0x80 {
        return vec![len as u8];
    }
    let bytes = len.to_be_bytes();
    let significant: Vec<u8> = bytes.iter().copied().skip_while(|&b| b == 0).collect();
    let mut out = Vec::with_capacity(1 + significant.len());
    out.push(0x80 | significant.len() as u8);
    out.extend_from_slice(&significant);
    out
}

/// Encodes an unsigned big-endian byte string as a DER INTEGER.
///
/// Leading zero bytes are stripped; a single `0x00` is prepended when the
/// high bit of the first content byte is set, since DER INTEGERs are
/// signed two's-complement values.
fn encode_unsigned_integer(value: &[u8]) -> Vec<u8> {
    let stripped: &[u8] = {
        let first = value.iter().position(|&b| b != 0).unwrap_or(value.len());
        &value[first..]
    };

    let mut content = Vec::with_capacity(stripped.len() + 1);
    if stripped.is_empty() {
        content.push(0x00);
    } else {
        if stripped[0] & 0x80 != 0 {
            content.push(0x00);
        }
        content.extend_from_slice(stripped);
    }

    let mut out = Vec::with_capacity(content.len() + 4);
    out.push(0x02);
    out.extend_from_slice(&encode_length(content.len()));
    out.extend_from_slice(&content);
    out
}

/// Wraps content bytes in a DER SEQUENCE.
fn encode_sequence(content: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(content.len() + 4);
    out.push(0x30);
    out.extend_from_slice(&encode_length(content.len()));
    out.extend_from_slice(content);
    out
}

/// Wraps content bytes in a DER BIT STRING with zero unused bits.
fn encode_bit_string(content: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(content.len() + 5);
    out.push(0x03);
    out.extend_from_slice(&encode_length(content.len() + 1));
    out.push(0x00);
    out.extend_from_slice(content);
    out
}

/// Builds a `SubjectPublicKeyInfo` DER document from raw RSA modulus and
/// exponent bytes (big-endian, as decoded from the JWK `n`/`e` fields).
#[must_use]
pub fn rsa_public_key_to_der(modulus: &[u8], exponent: &[u8]) -> Vec<u8> {
    let mut rsa_key = encode_unsigned_integer(modulus);
    rsa_key.extend_from_slice(&encode_unsigned_integer(exponent));
    let rsa_key_sequence = encode_sequence(&rsa_key);

    let mut spki = RSA_ALGORITHM_IDENTIFIER.to_vec();
    spki.extend_from_slice(&encode_bit_string(&rsa_key_sequence));
    encode_sequence(&spki)
}

/// Renders a DER document as a PEM `PUBLIC KEY` block with 64-column
/// base64 lines.
#[must_use]
pub fn der_to_pem(der: &[u8]) -> String {
    let encoded = STANDARD.encode(der);
    let mut pem = String::with_capacity(encoded.len() + 64);
    pem.push_str("-----BEGIN PUBLIC KEY-----\n");
    for chunk in encoded.as_bytes().chunks(64) {
        // chunks of an ASCII string are valid UTF-8
        pem.push_str(std::str::from_utf8(chunk).expect("base64 output is ASCII"));
        pem.push('\n');
    }
    pem.push_str("-----END PUBLIC KEY-----\n");
    pem
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::RsaPrivateKey;
    use rsa::pkcs8::DecodePublicKey;
    use rsa::traits::PublicKeyParts;

    #[test]
    fn test_encode_length_short_form() {
        assert_eq!(encode_length(0), vec![0x00]);
        assert_eq!(encode_length(42), vec![0x2a]);
        assert_eq!(encode_length(127), vec![0x7f]);
    }

    #[test]
    fn test_encode_length_long_form() {
        assert_eq!(encode_length(128), vec![0x81, 0x80]);
        assert_eq!(encode_length(257), vec![0x82, 0x01, 0x01]);
        assert_eq!(encode_length(65536), vec![0x83, 0x01, 0x00, 0x00]);
    }

    #[test]
    fn test_integer_high_bit_gets_leading_zero() {
        // 0xBEEF has the high bit set, so a 0x00 pad byte is required
        assert_eq!(
            encode_unsigned_integer(&[0xbe, 0xef]),
            vec![0x02, 0x03, 0x00, 0xbe, 0xef]
        );
        // 0x7F does not
        assert_eq!(encode_unsigned_integer(&[0x7f]), vec![0x02, 0x01, 0x7f]);
    }

    #[test]
    fn test_integer_strips_redundant_leading_zeros() {
        assert_eq!(
            encode_unsigned_integer(&[0x00, 0x00, 0x01]),
            vec![0x02, 0x01, 0x01]
        );
        // All-zero input encodes as INTEGER 0
        assert_eq!(encode_unsigned_integer(&[0x00, 0x00]), vec![0x02, 0x01, 0x00]);
        assert_eq!(encode_unsigned_integer(&[]), vec![0x02, 0x01, 0x00]);
    }

    #[test]
    fn test_standard_exponent_encoding() {
        // AQAB == 65537, the ubiquitous RSA public exponent
        assert_eq!(
            encode_unsigned_integer(&[0x01, 0x00, 0x01]),
            vec![0x02, 0x03, 0x01, 0x00, 0x01]
        );
    }

    #[test]
    fn test_spki_structure_for_tiny_key() {
        let der = rsa_public_key_to_der(&[0x7f], &[0x01, 0x00, 0x01]);
        let expected = vec![
            0x30, 0x1e, // SEQUENCE, 30 bytes
            0x30, 0x0d, 0x06, 0x09, 0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01, 0x01, 0x01, 0x05,
            0x00, // AlgorithmIdentifier
            0x03, 0x0d, 0x00, // BIT STRING, 13 bytes, 0 unused bits
            0x30, 0x0a, // SEQUENCE, 10 bytes
            0x02, 0x01, 0x7f, // INTEGER 0x7f
            0x02, 0x03, 0x01, 0x00, 0x01, // INTEGER 65537
        ];
        assert_eq!(der, expected);
    }

    #[test]
    fn test_der_round_trips_through_rsa_parser() {
        let mut rng = rand::thread_rng();
        let private_key = RsaPrivateKey::new(&mut rng, 2048).unwrap();
        let public_key = private_key.to_public_key();

        let der = rsa_public_key_to_der(
            &public_key.n().to_bytes_be(),
            &public_key.e().to_bytes_be(),
        );
        let parsed = rsa::RsaPublicKey::from_public_key_der(&der).unwrap();

        assert_eq!(parsed.n(), public_key.n());
        assert_eq!(parsed.e(), public_key.e());
    }

    #[test]
    fn test_pem_rendering() {
        let der = rsa_public_key_to_der(&[0x7f], &[0x01, 0x00, 0x01]);
        let pem = der_to_pem(&der);

        assert!(pem.starts_with("-----BEGIN PUBLIC KEY-----\n"));
        assert!(pem.ends_with("-----END PUBLIC KEY-----\n"));
        for line in pem.lines().filter(|l| !l.starts_with("-----")) {
            assert!(line.len() <= 64);
        }
    }
}
