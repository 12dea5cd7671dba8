//! Plain-format ECDSA verification over the short Weierstrass curves
//! the regulation admits: Brainpool P-256/384/512r1 and NIST
//! P-256/384/521.
//!
//! Tachograph signatures are raw `R || S` with no ASN.1 wrapping, and
//! the certificates are not X.509, so verification is expressed
//! directly against the domain parameters. Only public operations are
//! performed here; the crate never holds a private key.

use num_bigint::BigUint;
use num_traits::Zero;
use sha2::{Digest, Sha256, Sha384, Sha512};

/// The domain parameter sets admitted by the regulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Curve {
    NistP256,
    NistP384,
    NistP521,
    BrainpoolP256R1,
    BrainpoolP384R1,
    BrainpoolP512R1,
}

struct CurveParams {
    field_size: usize,
    p: &'static str,
    a: &'static str,
    b: &'static str,
    gx: &'static str,
    gy: &'static str,
    n: &'static str,
}

static NIST_P256: CurveParams = CurveParams {
    field_size: 32,
    p: "ffffffff00000001000000000000000000000000ffffffffffffffffffffffff",
    a: "ffffffff00000001000000000000000000000000fffffffffffffffffffffffc",
    b: "5ac635d8aa3a93e7b3ebbd55769886bc651d06b0cc53b0f63bce3c3e27d2604b",
    gx: "6b17d1f2e12c4247f8bce6e563a440f277037d812deb33a0f4a13945d898c296",
    gy: "4fe342e2fe1a7f9b8ee7eb4a7c0f9e162bce33576b315ececbb6406837bf51f5",
    n: "ffffffff00000000ffffffffffffffffbce6faada7179e84f3b9cac2fc632551",
};

static NIST_P384: CurveParams = CurveParams {
    field_size: 48,
    p: "fffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffeffffffff0000000000000000ffffffff",
    a: "fffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffeffffffff0000000000000000fffffffc",
    b: "b3312fa7e23ee7e4988e056be3f82d19181d9c6efe8141120314088f5013875ac656398d8a2ed19d2a85c8edd3ec2aef",
    gx: "aa87ca22be8b05378eb1c71ef320ad746e1d3b628ba79b9859f741e082542a385502f25dbf55296c3a545e3872760ab7",
    gy: "3617de4a96262c6f5d9e98bf9292dc29f8f41dbd289a147ce9da3113b5f0b8c00a60b1ce1d7e819d7a431d7c90ea0e5f",
    n: "ffffffffffffffffffffffffffffffffffffffffffffffffc7634d81f4372ddf581a0db248b0a77aecec196accc52973",
};

static NIST_P521: CurveParams = CurveParams {
    field_size: 66,
    p: "01ffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff",
    a: "01fffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffc",
    b: "51953eb9618e1c9a1f929a21a0b68540eea2da725b99b315f3b8b489918ef109e156193951ec7e937b1652c0bd3bb1bf073573df883d2c34f1ef451fd46b503f00",
    gx: "00c6858e06b70404e9cd9e3ecb662395b4429c648139053fb521f828af606b4d3dbaa14b5e77efe75928fe1dc127a2ffa8de3348b3c1856a429bf97e7e31c2e5bd66",
    gy: "011839296a789a3bc0045c8a5fb42c7d1bd998f54449579b446817afbd17273e662c97ee72995ef42640c550b9013fad0761353c7086a272c24088be94769fd16650",
    n: "01fffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffa51868783bf2f966b7fcc0148f709a5d03bb5c9b8899c47aebb6fb71e91386409",
};

static BRAINPOOL_P256R1: CurveParams = CurveParams {
    field_size: 32,
    p: "a9fb57dba1eea9bc3e660a909d838d726e3bf623d52620282013481d1f6e5377",
    a: "7d5a0975fc2c3057eef67530417affe7fb8055c126dc5c6ce94a4b44f330b5d9",
    b: "26dc5c6ce94a4b44f330b5d9bbd77cbf958416295cf7e1ce6bccdc18ff8c07b6",
    gx: "8bd2aeb9cb7e57cb2c4b482ffc81b7afb9de27e1e3bd23c23a4453bd9ace3262",
    gy: "547ef835c3dac4fd97f8461a14611dc9c27745132ded8e545c1d54c72f046997",
    n: "a9fb57dba1eea9bc3e660a909d838d718c397aa3b561a6f7901e0e82974856a7",
};

static BRAINPOOL_P384R1: CurveParams = CurveParams {
    field_size: 48,
    p: "8cb91e82a3386d280f5d6f7e50e641df152f7109ed5456b412b1da197fb71123acd3a729901d1a71874700133107ec53",
    a: "7bc382c63d8c150c3c72080ace05afa0c2bea28e4fb22787139165efba91f90f8aa5814a503ad4eb04a8c7dd22ce2826",
    b: "04a8c7dd22ce28268b39b55416f0447c2fb77de107dcd2a62e880ea53eeb62d57cb4390295dbc9943ab78696fa504c11",
    gx: "1d1c64f068cf45ffa2a63a81b7c13f6b8847a3e77ef14fe3db7fcafe0cbd10e8e826e03436d646aaef87b2e247d4af1e",
    gy: "8abe1d7520f9c2a45cb1eb8e95cfd55262b70b29feec5864e19c054ff99129280e4646217791811142820341263c5315",
    n: "8cb91e82a3386d280f5d6f7e50e641df152f7109ed5456b31f166e6cac0425a7cf3ab6af6b7fc3103b883202e9046565",
};

static BRAINPOOL_P512R1: CurveParams = CurveParams {
    field_size: 64,
    p: "aadd9db8dbe9c48b3fd4e6ae33c9fc07cb308db3b3c9d20ed6639cca703308717d4d9b009bc66842aecda12ae6a380e62881ff2f2d82c68528aa6056583a48f3",
    a: "7830a3318b603b89e2327145ac234cc594cbdd8d3df91610a83441caea9863bc2ded5d5aa8253aa10a2ef1c98b9ac8b57f1117a72bf2c7b9e7c1ac4d77fc94ca",
    b: "3df91610a83441caea9863bc2ded5d5aa8253aa10a2ef1c98b9ac8b57f1117a72bf2c7b9e7c1ac4d77fc94cadc083e67984050b75ebae5dd2809bd638016f723",
    gx: "81aee4bdd82ed9645a21322e9c4c6a9385ed9f70b5d916c1b43b62eef4d0098eff3b1f78e2d0d48d50d1687b93b97d5f7c6d5047406a5e688b352209bcb9f822",
    gy: "7dde385d566332ecc0eabfa9cf7822fdf209f70024a57b1aa000c55b881f8111b2dcde494a5f485e5bca4bd88a2763aed1ca2b2fa8f0540678cd1e0f3ad80892",
    n: "aadd9db8dbe9c48b3fd4e6ae33c9fc07cb308db3b3c9d20ed6639cca70330870553e5c414ca92619418661197fac10471db1d381085ddaddb58796829ca90069",
};

impl Curve {
    /// Curve from the DER object identifier content bytes carried in a
    /// certificate's public key domain parameters field.
    pub fn from_oid(oid: &[u8]) -> Option<Curve> {
        Some(match oid {
            [0x2a, 0x86, 0x48, 0xce, 0x3d, 0x03, 0x01, 0x07] => Curve::NistP256,
            [0x2b, 0x81, 0x04, 0x00, 0x22] => Curve::NistP384,
            [0x2b, 0x81, 0x04, 0x00, 0x23] => Curve::NistP521,
            [0x2b, 0x24, 0x03, 0x03, 0x02, 0x08, 0x01, 0x01, 0x07] => Curve::BrainpoolP256R1,
            [0x2b, 0x24, 0x03, 0x03, 0x02, 0x08, 0x01, 0x01, 0x0b] => Curve::BrainpoolP384R1,
            [0x2b, 0x24, 0x03, 0x03, 0x02, 0x08, 0x01, 0x01, 0x0d] => Curve::BrainpoolP512R1,
            _ => return None,
        })
    }

    fn params(self) -> &'static CurveParams {
        match self {
            Curve::NistP256 => &NIST_P256,
            Curve::NistP384 => &NIST_P384,
            Curve::NistP521 => &NIST_P521,
            Curve::BrainpoolP256R1 => &BRAINPOOL_P256R1,
            Curve::BrainpoolP384R1 => &BRAINPOOL_P384R1,
            Curve::BrainpoolP512R1 => &BRAINPOOL_P512R1,
        }
    }

    /// Field element width in bytes; also half the raw signature width.
    pub fn field_size(self) -> usize {
        self.params().field_size
    }

    /// Hash the signed data with the function the key size dictates.
    pub fn digest(self, data: &[u8]) -> Vec<u8> {
        match self {
            Curve::NistP256 | Curve::BrainpoolP256R1 => Sha256::digest(data).to_vec(),
            Curve::NistP384 | Curve::BrainpoolP384R1 => Sha384::digest(data).to_vec(),
            Curve::NistP521 | Curve::BrainpoolP512R1 => Sha512::digest(data).to_vec(),
        }
    }
}

fn hx(value: &'static str) -> BigUint {
    BigUint::parse_bytes(value.as_bytes(), 16).expect("curve constant")
}

/// Affine point; `None` is the point at infinity.
type Point = Option<(BigUint, BigUint)>;

struct Field {
    p: BigUint,
}

impl Field {
    fn add(&self, x: &BigUint, y: &BigUint) -> BigUint {
        (x + y) % &self.p
    }

    fn sub(&self, x: &BigUint, y: &BigUint) -> BigUint {
        ((x + &self.p) - (y % &self.p)) % &self.p
    }

    fn mul(&self, x: &BigUint, y: &BigUint) -> BigUint {
        (x * y) % &self.p
    }

    /// Inverse by Fermat, the modulus being prime.
    fn inv(&self, x: &BigUint) -> BigUint {
        x.modpow(&(&self.p - 2u32), &self.p)
    }
}

struct Arithmetic {
    field: Field,
    a: BigUint,
    b: BigUint,
    g: (BigUint, BigUint),
    n: BigUint,
}

impl Arithmetic {
    fn new(curve: Curve) -> Arithmetic {
        let params = curve.params();
        Arithmetic {
            field: Field { p: hx(params.p) },
            a: hx(params.a),
            b: hx(params.b),
            g: (hx(params.gx), hx(params.gy)),
            n: hx(params.n),
        }
    }

    fn on_curve(&self, point: &(BigUint, BigUint)) -> bool {
        let (x, y) = point;
        if x >= &self.field.p || y >= &self.field.p {
            return false;
        }
        let lhs = self.field.mul(y, y);
        let x3 = self.field.mul(&self.field.mul(x, x), x);
        let rhs = self
            .field
            .add(&self.field.add(&x3, &self.field.mul(&self.a, x)), &self.b);
        lhs == rhs
    }

    fn double(&self, point: &Point) -> Point {
        let (x, y) = point.as_ref()?;
        if y.is_zero() {
            return None;
        }
        let f = &self.field;
        let three = BigUint::from(3u32);
        let two = BigUint::from(2u32);
        let lambda = f.mul(
            &f.add(&f.mul(&three, &f.mul(x, x)), &self.a),
            &f.inv(&f.mul(&two, y)),
        );
        let x3 = f.sub(&f.mul(&lambda, &lambda), &f.add(x, x));
        let y3 = f.sub(&f.mul(&lambda, &f.sub(x, &x3)), y);
        Some((x3, y3))
    }

    fn add(&self, lhs: &Point, rhs: &Point) -> Point {
        let (x1, y1) = match lhs {
            Some(p) => p,
            None => return rhs.clone(),
        };
        let (x2, y2) = match rhs {
            Some(p) => p,
            None => return lhs.clone(),
        };
        let f = &self.field;
        if x1 == x2 {
            return if y1 == y2 {
                self.double(lhs)
            } else {
                None
            };
        }
        let lambda = f.mul(&f.sub(y2, y1), &f.inv(&f.sub(x2, x1)));
        let x3 = f.sub(&f.sub(&f.mul(&lambda, &lambda), x1), x2);
        let y3 = f.sub(&f.mul(&lambda, &f.sub(x1, &x3)), y1);
        Some((x3, y3))
    }

    fn scalar_mul(&self, scalar: &BigUint, point: &Point) -> Point {
        let mut result: Point = None;
        for bit in (0..scalar.bits()).rev() {
            result = self.double(&result);
            if scalar.bit(bit) {
                result = self.add(&result, point);
            }
        }
        result
    }
}

fn decode_point(curve: Curve, encoded: &[u8]) -> Option<(BigUint, BigUint)> {
    let field_size = curve.field_size();
    if encoded.len() != 1 + 2 * field_size || encoded[0] != 0x04 {
        return None;
    }
    let x = BigUint::from_bytes_be(&encoded[1..1 + field_size]);
    let y = BigUint::from_bytes_be(&encoded[1 + field_size..]);
    Some((x, y))
}

/// Leftmost-bits reduction of the digest against the group order.
fn digest_to_scalar(digest: &[u8], n: &BigUint) -> BigUint {
    let mut e = BigUint::from_bytes_be(digest);
    let digest_bits = (digest.len() * 8) as u64;
    if digest_bits > n.bits() {
        e >>= digest_bits - n.bits();
    }
    e
}

/// Verify a plain `R || S` signature over `digest` with the public key
/// point `public_key` (uncompressed `04 || X || Y`).
pub fn verify(curve: Curve, public_key: &[u8], digest: &[u8], signature: &[u8]) -> bool {
    let arithmetic = Arithmetic::new(curve);
    let field_size = curve.field_size();
    if signature.len() != 2 * field_size {
        return false;
    }
    let Some(q) = decode_point(curve, public_key) else {
        return false;
    };
    if !arithmetic.on_curve(&q) {
        return false;
    }
    let r = BigUint::from_bytes_be(&signature[..field_size]);
    let s = BigUint::from_bytes_be(&signature[field_size..]);
    if r.is_zero() || s.is_zero() || r >= arithmetic.n || s >= arithmetic.n {
        return false;
    }
    let e = digest_to_scalar(digest, &arithmetic.n);
    let w = s.modpow(&(&arithmetic.n - 2u32), &arithmetic.n);
    let u1 = &e * &w % &arithmetic.n;
    let u2 = &r * &w % &arithmetic.n;
    let g: Point = Some(arithmetic.g.clone());
    let q: Point = Some(q);
    let point = arithmetic.add(
        &arithmetic.scalar_mul(&u1, &g),
        &arithmetic.scalar_mul(&u2, &q),
    );
    match point {
        Some((x, _)) => x % &arithmetic.n == r,
        None => false,
    }
}

/// Fixed-width big-endian encoding of a field element.
#[cfg(test)]
fn encode_element(value: &BigUint, width: usize) -> Vec<u8> {
    let bytes = value.to_bytes_be();
    let mut out = vec![0u8; width - bytes.len()];
    out.extend(bytes);
    out
}

/// Public key point for a private scalar, uncompressed. Used by tests
/// to build certificate hierarchies.
#[cfg(test)]
pub(crate) fn public_key(curve: Curve, private: &BigUint) -> Vec<u8> {
    let arithmetic = Arithmetic::new(curve);
    let g: Point = Some(arithmetic.g.clone());
    let (x, y) = arithmetic.scalar_mul(private, &g).expect("nonzero scalar");
    let field_size = curve.field_size();
    let mut out = vec![0x04];
    out.extend(encode_element(&x, field_size));
    out.extend(encode_element(&y, field_size));
    out
}

/// Deterministic test-only signer with a caller-chosen nonce.
#[cfg(test)]
pub(crate) fn sign(curve: Curve, private: &BigUint, nonce: &BigUint, digest: &[u8]) -> Vec<u8> {
    let arithmetic = Arithmetic::new(curve);
    let g: Point = Some(arithmetic.g.clone());
    let (x, _) = arithmetic.scalar_mul(nonce, &g).expect("nonzero nonce");
    let r = x % &arithmetic.n;
    assert!(!r.is_zero());
    let e = digest_to_scalar(digest, &arithmetic.n);
    let k_inv = nonce.modpow(&(&arithmetic.n - 2u32), &arithmetic.n);
    let s = (&e + &r * private) % &arithmetic.n * k_inv % &arithmetic.n;
    assert!(!s.is_zero());
    let field_size = curve.field_size();
    let mut out = encode_element(&r, field_size);
    out.extend(encode_element(&s, field_size));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generator_is_on_every_curve() {
        for curve in [
            Curve::NistP256,
            Curve::NistP384,
            Curve::NistP521,
            Curve::BrainpoolP256R1,
            Curve::BrainpoolP384R1,
            Curve::BrainpoolP512R1,
        ] {
            let arithmetic = Arithmetic::new(curve);
            assert!(arithmetic.on_curve(&arithmetic.g), "{curve:?}");
        }
    }

    #[test]
    fn order_times_generator_is_infinity() {
        let arithmetic = Arithmetic::new(Curve::NistP256);
        let g: Point = Some(arithmetic.g.clone());
        let n = arithmetic.n.clone();
        assert_eq!(None, arithmetic.scalar_mul(&n, &g));
    }

    #[test]
    fn signatures_verify_and_tampering_breaks_them() {
        for curve in [Curve::NistP256, Curve::BrainpoolP256R1, Curve::BrainpoolP512R1] {
            let private = BigUint::from(0x0123_4567_89ab_cdefu64);
            let nonce = BigUint::from(0x0fed_cba9_8765_4321u64);
            let key = public_key(curve, &private);
            let digest = curve.digest(b"vehicle unit data");
            let signature = sign(curve, &private, &nonce, &digest);
            assert!(verify(curve, &key, &digest, &signature), "{curve:?}");

            let other = curve.digest(b"tampered data");
            assert!(!verify(curve, &key, &other, &signature), "{curve:?}");

            let mut broken = signature.clone();
            broken[0] ^= 0x01;
            assert!(!verify(curve, &key, &digest, &broken), "{curve:?}");
        }
    }

    #[test]
    fn zero_filled_signature_is_rejected() {
        let key = public_key(Curve::NistP256, &BigUint::from(7u32));
        let digest = Curve::NistP256.digest(b"data");
        assert!(!verify(
            Curve::NistP256,
            &key,
            &digest,
            &vec![0u8; 64]
        ));
    }

    #[test]
    fn oid_lookup_covers_the_admitted_set() {
        assert_eq!(
            Some(Curve::BrainpoolP384R1),
            Curve::from_oid(&[0x2b, 0x24, 0x03, 0x03, 0x02, 0x08, 0x01, 0x01, 0x0b])
        );
        assert_eq!(None, Curve::from_oid(&[0x2a, 0x03]));
    }
}
