//! Raw RSA verification primitives for the first generation security
//! mechanisms: PKCS#1 v1.5 with SHA-1 over transfer data, and the
//! message recovery step of the ISO/IEC 9796-2 style certificate
//! signatures. The certificate format is not X.509 and the recovery
//! operation is not offered by any packaged RSA crate, so the two
//! public-key operations are written out against bigint arithmetic.

use num_bigint::BigUint;
use sha1::{Digest, Sha1};

/// DigestInfo prefix for SHA-1 inside a PKCS#1 v1.5 encoded message.
const SHA1_DIGEST_INFO: [u8; 15] = [
    0x30, 0x21, 0x30, 0x09, 0x06, 0x05, 0x2b, 0x0e, 0x03, 0x02, 0x1a, 0x05, 0x00, 0x04, 0x14,
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsaPublicKey {
    modulus: BigUint,
    exponent: BigUint,
    size: usize,
}

impl RsaPublicKey {
    pub fn new(modulus: &[u8], exponent: &[u8]) -> RsaPublicKey {
        RsaPublicKey {
            modulus: BigUint::from_bytes_be(modulus),
            exponent: BigUint::from_bytes_be(exponent),
            size: modulus.len(),
        }
    }

    /// Modulus width in bytes; the width of every signature made under
    /// this key.
    pub fn size(&self) -> usize {
        self.size
    }

    /// The public-key operation `input^e mod n`, left padded back to
    /// modulus width. `None` when the input is not a valid signature
    /// width or does not reduce.
    pub fn apply(&self, input: &[u8]) -> Option<Vec<u8>> {
        if input.len() != self.size {
            return None;
        }
        let value = BigUint::from_bytes_be(input);
        if value >= self.modulus {
            return None;
        }
        let result = value.modpow(&self.exponent, &self.modulus);
        let bytes = result.to_bytes_be();
        let mut out = vec![0u8; self.size - bytes.len()];
        out.extend(bytes);
        Some(out)
    }

    /// PKCS#1 v1.5 verification with SHA-1.
    pub fn verify_pkcs1_sha1(&self, data: &[u8], signature: &[u8]) -> bool {
        let Some(encoded) = self.apply(signature) else {
            return false;
        };
        let digest = Sha1::digest(data);
        // EM = 0x00 0x01 PS 0x00 DigestInfo H, PS being at least eight
        // 0xff bytes.
        let suffix_len = SHA1_DIGEST_INFO.len() + digest.len();
        if encoded.len() < suffix_len + 11 {
            return false;
        }
        let padding_end = encoded.len() - suffix_len - 1;
        encoded[0] == 0x00
            && encoded[1] == 0x01
            && encoded[2..padding_end].iter().all(|&b| b == 0xff)
            && encoded[padding_end] == 0x00
            && encoded[padding_end + 1..padding_end + 1 + SHA1_DIGEST_INFO.len()]
                == SHA1_DIGEST_INFO
            && encoded[encoded.len() - digest.len()..] == *digest
    }

    /// ISO/IEC 9796-2 message recovery: open the signature and return
    /// the recovered bytes between the `0x6a` header and the trailing
    /// SHA-1 hash plus `0xbc`, together with that hash.
    pub fn recover(&self, signature: &[u8]) -> Option<(Vec<u8>, Vec<u8>)> {
        let message = self.apply(signature)?;
        if message.first() != Some(&0x6a) || message.last() != Some(&0xbc) {
            return None;
        }
        let hash_start = message.len() - 1 - 20;
        let recovered = message[1..hash_start].to_vec();
        let hash = message[hash_start..message.len() - 1].to_vec();
        Some((recovered, hash))
    }
}

#[cfg(test)]
pub(crate) mod testkey {
    use super::*;

    /// Fixed RSA-1024 key pair for building certificate hierarchies in
    /// tests. Signing is the private operation `input^d mod n`.
    pub(crate) struct RsaTestKey {
        pub modulus: Vec<u8>,
        pub exponent: Vec<u8>,
        private: BigUint,
    }

    impl RsaTestKey {
        pub fn public(&self) -> RsaPublicKey {
            RsaPublicKey::new(&self.modulus, &self.exponent)
        }

        pub fn raw_sign(&self, message: &[u8]) -> Vec<u8> {
            let n = BigUint::from_bytes_be(&self.modulus);
            let value = BigUint::from_bytes_be(message);
            let bytes = value.modpow(&self.private, &n).to_bytes_be();
            let mut out = vec![0u8; self.modulus.len() - bytes.len()];
            out.extend(bytes);
            out
        }

        pub fn sign_pkcs1_sha1(&self, data: &[u8]) -> Vec<u8> {
            let digest = Sha1::digest(data);
            let mut encoded = vec![0x00, 0x01];
            encoded.resize(self.modulus.len() - SHA1_DIGEST_INFO.len() - digest.len() - 1, 0xff);
            encoded.push(0x00);
            encoded.extend(SHA1_DIGEST_INFO);
            encoded.extend(digest);
            self.raw_sign(&encoded)
        }
    }

    pub(crate) fn key() -> RsaTestKey {
        RsaTestKey {
            modulus: hex::decode(TEST_MODULUS).unwrap(),
            exponent: vec![0x01, 0x00, 0x01],
            private: BigUint::parse_bytes(TEST_PRIVATE.as_bytes(), 16).unwrap(),
        }
    }

    const TEST_MODULUS: &str = "bc3cd847f6266625578c659074f3b6b732c6ea2f551ac93056a5da28fdf88104e8afa72bced77659e72c7b880cdc4dfcc206f33c9580a8da6f7ae154a1b80d8acd21294f573bf0cce6fb60f5a422180eab1baaf1e744f436f83f040cdaf0f268b57f791ef40cbda26e432dad2f24b01c3aa52298e4b7c7cfa7667b077751c941";
    const TEST_PRIVATE: &str = "051c15b6e65ca67b2f0435a1953b246396b2459b215147d2d3174f73bb692a7f6a9d920923653fe632db47432b2e33c3bfb49697b76b35aa304a82a15c7e75879a1c1246fba5343769f16b47565f96ee244cb9440f8ca20f66e1a9de6daa09db1ddb47b8b3a2a650fa2cb333b9f95a21d8fa1ab44441b6c2ea104544d57eb901";
}

#[cfg(test)]
mod tests {
    use super::testkey;
    use super::*;

    #[test]
    fn pkcs1_sha1_round_trip() {
        let key = testkey::key();
        let signature = key.sign_pkcs1_sha1(b"transfer data");
        assert!(key.public().verify_pkcs1_sha1(b"transfer data", &signature));
        assert!(!key.public().verify_pkcs1_sha1(b"other data", &signature));
    }

    #[test]
    fn zero_filled_signature_fails() {
        let key = testkey::key();
        assert!(!key.public().verify_pkcs1_sha1(b"data", &[0u8; 128]));
    }

    #[test]
    fn recovery_round_trip() {
        let key = testkey::key();
        let mut message = vec![0x6a];
        message.extend([0x42u8; 106]);
        message.extend(Sha1::digest(b"linked content"));
        message.push(0xbc);
        let signature = key.raw_sign(&message);
        let (recovered, hash) = key.public().recover(&signature).unwrap();
        assert_eq!(vec![0x42u8; 106], recovered);
        assert_eq!(Sha1::digest(b"linked content").to_vec(), hash);
    }

    #[test]
    fn recovery_rejects_bad_framing() {
        let key = testkey::key();
        let mut message = vec![0x00; 128];
        message[0] = 0x6a;
        let signature = key.raw_sign(&message);
        assert!(key.public().recover(&signature).is_none());
    }
}
