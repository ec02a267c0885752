//! Device public key material.

use crate::error::CodecError;
use crate::principal::Principal;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::pkcs8::EncodePublicKey;
use std::fmt;

/// Length of a SEC1 uncompressed secp256k1 point as reported by the device.
pub const SEC1_UNCOMPRESSED_LEN: usize = 65;

/// A secp256k1 public key fetched from the signing device.
///
/// The device reports the key as a 65-byte SEC1 uncompressed point. This
/// wrapper validates the point once at construction; everything downstream
/// (DER encoding for envelopes, principal derivation) works from the parsed
/// key, so a malformed device response can never reach the wire.
#[derive(Clone, PartialEq, Eq)]
pub struct DevicePublicKey {
    key: k256::PublicKey,
}

impl DevicePublicKey {
    /// Parses a SEC1-encoded point (compressed or uncompressed).
    pub fn from_sec1(bytes: &[u8]) -> Result<Self, CodecError> {
        let key = k256::PublicKey::from_sec1_bytes(bytes)
            .map_err(|e| CodecError::InvalidPublicKey(e.to_string()))?;
        Ok(Self { key })
    }

    /// The key as a 65-byte SEC1 uncompressed point.
    pub fn to_sec1_uncompressed(&self) -> Vec<u8> {
        self.key.to_encoded_point(false).as_bytes().to_vec()
    }

    /// DER (SPKI) encoding, the form attached to envelopes as
    /// `sender_pubkey` and hashed into the principal.
    pub fn to_der(&self) -> Result<Vec<u8>, CodecError> {
        let document = self
            .key
            .to_public_key_der()
            .map_err(|e| CodecError::Der(e.to_string()))?;
        Ok(document.into_vec())
    }

    /// The self-authenticating principal controlled by this key.
    pub fn principal(&self) -> Result<Principal, CodecError> {
        Ok(Principal::self_authenticating(&self.to_der()?))
    }
}

impl fmt::Debug for DevicePublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DevicePublicKey")
            .field("sec1", &hex::encode(self.to_sec1_uncompressed()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k256::ecdsa::SigningKey;

    fn test_key() -> DevicePublicKey {
        let signing_key = SigningKey::from_slice(&[7u8; 32]).unwrap();
        let point = signing_key.verifying_key().to_encoded_point(false);
        DevicePublicKey::from_sec1(point.as_bytes()).unwrap()
    }

    #[test]
    fn sec1_round_trip_is_uncompressed() {
        let key = test_key();
        let sec1 = key.to_sec1_uncompressed();
        assert_eq!(sec1.len(), SEC1_UNCOMPRESSED_LEN);
        assert_eq!(sec1[0], 0x04);
        assert_eq!(DevicePublicKey::from_sec1(&sec1).unwrap(), key);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(DevicePublicKey::from_sec1(&[0xff; 65]).is_err());
        assert!(DevicePublicKey::from_sec1(&[]).is_err());
    }

    #[test]
    fn principal_is_self_authenticating() {
        let key = test_key();
        let principal = key.principal().unwrap();
        assert_eq!(principal.as_slice().len(), 29);
        assert_eq!(principal.as_slice()[28], 0x02);
        assert_eq!(
            principal,
            Principal::self_authenticating(&key.to_der().unwrap())
        );
    }
}
