//! Signature algorithms: raw signing/verification over the RustCrypto backends
//!
//! COSE conventions apply throughout: ECDSA signatures are the fixed-width
//! `r || s` concatenation, RSA-PSS uses a salt the length of the digest,
//! Ed25519 is the 64-byte signature. X.509 certificate signatures (which use
//! DER-encoded ECDSA and PKCS#1 v1.5 RSA) are handled separately by
//! [`verify_cert_signature`].

use crate::error::{Error, Result};
use rand::RngCore;
use sha2::{Sha256, Sha384, Sha512};
use x509_cert::{spki::SubjectPublicKeyInfoOwned, Certificate};

use super::oid;

/// Signature algorithms accepted for claim signatures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SigningAlg {
    /// ECDSA over P-256 with SHA-256
    Es256,
    /// ECDSA over P-384 with SHA-384
    Es384,
    /// ECDSA over P-521 with SHA-512
    Es512,
    /// RSA-PSS with SHA-256
    Ps256,
    /// RSA-PSS with SHA-384
    Ps384,
    /// RSA-PSS with SHA-512
    Ps512,
    /// EdDSA over Curve25519
    Ed25519,
}

impl SigningAlg {
    /// The label used in signer configuration and reports
    pub fn name(&self) -> &'static str {
        match self {
            Self::Es256 => "es256",
            Self::Es384 => "es384",
            Self::Es512 => "es512",
            Self::Ps256 => "ps256",
            Self::Ps384 => "ps384",
            Self::Ps512 => "ps512",
            Self::Ed25519 => "ed25519",
        }
    }

    /// Parse a label such as "es256"
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "es256" => Ok(Self::Es256),
            "es384" => Ok(Self::Es384),
            "es512" => Ok(Self::Es512),
            "ps256" => Ok(Self::Ps256),
            "ps384" => Ok(Self::Ps384),
            "ps512" => Ok(Self::Ps512),
            "ed25519" => Ok(Self::Ed25519),
            other => Err(Error::UnsupportedAlgorithm(other.to_string())),
        }
    }

    /// Digest paired with this signature algorithm
    pub fn hash_alg(&self) -> super::HashAlgorithm {
        match self {
            Self::Es256 | Self::Ps256 => super::HashAlgorithm::Sha256,
            Self::Es384 | Self::Ps384 => super::HashAlgorithm::Sha384,
            Self::Es512 | Self::Ps512 | Self::Ed25519 => super::HashAlgorithm::Sha512,
        }
    }
}

impl std::fmt::Display for SigningAlg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A parsed private key bound to its signature algorithm
pub enum SigningKeyPair {
    Es256(p256::ecdsa::SigningKey),
    Es384(p384::ecdsa::SigningKey),
    Es512(p521::ecdsa::SigningKey),
    Rsa(Box<rsa::RsaPrivateKey>, SigningAlg),
    Ed25519(ed25519_dalek::SigningKey),
}

impl SigningKeyPair {
    /// Parse a PKCS#8 PEM private key for the given algorithm
    pub fn from_pkcs8_pem(alg: SigningAlg, pem: &str) -> Result<Self> {
        let bad_key = |e: &dyn std::fmt::Display| Error::InvalidKey(e.to_string());
        match alg {
            SigningAlg::Es256 => {
                use p256::pkcs8::DecodePrivateKey as _;
                p256::ecdsa::SigningKey::from_pkcs8_pem(pem)
                    .map(Self::Es256)
                    .map_err(|e| bad_key(&e))
            }
            SigningAlg::Es384 => {
                use p384::pkcs8::DecodePrivateKey as _;
                p384::ecdsa::SigningKey::from_pkcs8_pem(pem)
                    .map(Self::Es384)
                    .map_err(|e| bad_key(&e))
            }
            SigningAlg::Es512 => {
                use p521::pkcs8::DecodePrivateKey as _;
                p521::ecdsa::SigningKey::from_pkcs8_pem(pem)
                    .map(Self::Es512)
                    .map_err(|e| bad_key(&e))
            }
            SigningAlg::Ps256 | SigningAlg::Ps384 | SigningAlg::Ps512 => {
                use rsa::pkcs8::DecodePrivateKey as _;
                rsa::RsaPrivateKey::from_pkcs8_pem(pem)
                    .map(|k| Self::Rsa(Box::new(k), alg))
                    .map_err(|e| bad_key(&e))
            }
            SigningAlg::Ed25519 => {
                use ed25519_dalek::pkcs8::DecodePrivateKey as _;
                ed25519_dalek::SigningKey::from_pkcs8_pem(pem)
                    .map(Self::Ed25519)
                    .map_err(|e| bad_key(&e))
            }
        }
    }

    /// Parse a PKCS#8 DER private key for the given algorithm
    pub fn from_pkcs8_der(alg: SigningAlg, der_bytes: &[u8]) -> Result<Self> {
        let bad_key = |e: &dyn std::fmt::Display| Error::InvalidKey(e.to_string());
        match alg {
            SigningAlg::Es256 => {
                use p256::pkcs8::DecodePrivateKey as _;
                p256::ecdsa::SigningKey::from_pkcs8_der(der_bytes)
                    .map(Self::Es256)
                    .map_err(|e| bad_key(&e))
            }
            SigningAlg::Es384 => {
                use p384::pkcs8::DecodePrivateKey as _;
                p384::ecdsa::SigningKey::from_pkcs8_der(der_bytes)
                    .map(Self::Es384)
                    .map_err(|e| bad_key(&e))
            }
            SigningAlg::Es512 => {
                use p521::pkcs8::DecodePrivateKey as _;
                p521::ecdsa::SigningKey::from_pkcs8_der(der_bytes)
                    .map(Self::Es512)
                    .map_err(|e| bad_key(&e))
            }
            SigningAlg::Ps256 | SigningAlg::Ps384 | SigningAlg::Ps512 => {
                use rsa::pkcs8::DecodePrivateKey as _;
                rsa::RsaPrivateKey::from_pkcs8_der(der_bytes)
                    .map(|k| Self::Rsa(Box::new(k), alg))
                    .map_err(|e| bad_key(&e))
            }
            SigningAlg::Ed25519 => {
                use ed25519_dalek::pkcs8::DecodePrivateKey as _;
                ed25519_dalek::SigningKey::from_pkcs8_der(der_bytes)
                    .map(Self::Ed25519)
                    .map_err(|e| bad_key(&e))
            }
        }
    }

    /// The algorithm this key signs with
    pub fn alg(&self) -> SigningAlg {
        match self {
            Self::Es256(_) => SigningAlg::Es256,
            Self::Es384(_) => SigningAlg::Es384,
            Self::Es512(_) => SigningAlg::Es512,
            Self::Rsa(_, alg) => *alg,
            Self::Ed25519(_) => SigningAlg::Ed25519,
        }
    }

    /// Produce a raw signature over `data` in COSE conventions
    pub fn sign(&self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            Self::Es256(key) => {
                use p256::ecdsa::signature::Signer as _;
                let sig: p256::ecdsa::Signature = key.sign(data);
                Ok(sig.to_bytes().to_vec())
            }
            Self::Es384(key) => {
                use p384::ecdsa::signature::Signer as _;
                let sig: p384::ecdsa::Signature = key.sign(data);
                Ok(sig.to_bytes().to_vec())
            }
            Self::Es512(key) => {
                use p521::ecdsa::signature::Signer as _;
                let sig: p521::ecdsa::Signature = key.sign(data);
                Ok(sig.to_bytes().to_vec())
            }
            Self::Rsa(key, alg) => {
                use rsa::signature::{RandomizedSigner as _, SignatureEncoding as _};
                let mut rng = rand::thread_rng();
                let sig = match alg {
                    SigningAlg::Ps256 => rsa::pss::SigningKey::<Sha256>::new((**key).clone())
                        .sign_with_rng(&mut rng, data)
                        .to_vec(),
                    SigningAlg::Ps384 => rsa::pss::SigningKey::<Sha384>::new((**key).clone())
                        .sign_with_rng(&mut rng, data)
                        .to_vec(),
                    SigningAlg::Ps512 => rsa::pss::SigningKey::<Sha512>::new((**key).clone())
                        .sign_with_rng(&mut rng, data)
                        .to_vec(),
                    other => return Err(Error::Signing(format!("RSA key cannot sign {other}"))),
                };
                Ok(sig)
            }
            Self::Ed25519(key) => {
                use ed25519_dalek::Signer as _;
                Ok(key.sign(data).to_bytes().to_vec())
            }
        }
    }
}

/// Verify a raw COSE-convention signature against a subject public key
///
/// `spki` is the certificate's SubjectPublicKeyInfo; the key type recorded
/// there must agree with `alg` or verification fails.
pub fn verify_raw(
    alg: SigningAlg,
    spki: &SubjectPublicKeyInfoOwned,
    data: &[u8],
    signature: &[u8],
) -> Result<bool> {
    let key_bytes = spki.subject_public_key.raw_bytes();

    let verified = match alg {
        SigningAlg::Es256 => {
            use p256::ecdsa::signature::Verifier as _;
            let key = p256::ecdsa::VerifyingKey::from_sec1_bytes(key_bytes)
                .map_err(|e| Error::InvalidKey(e.to_string()))?;
            let sig = match p256::ecdsa::Signature::from_slice(signature) {
                Ok(sig) => sig,
                Err(_) => return Ok(false),
            };
            key.verify(data, &sig).is_ok()
        }
        SigningAlg::Es384 => {
            use p384::ecdsa::signature::Verifier as _;
            let key = p384::ecdsa::VerifyingKey::from_sec1_bytes(key_bytes)
                .map_err(|e| Error::InvalidKey(e.to_string()))?;
            let sig = match p384::ecdsa::Signature::from_slice(signature) {
                Ok(sig) => sig,
                Err(_) => return Ok(false),
            };
            key.verify(data, &sig).is_ok()
        }
        SigningAlg::Es512 => {
            use p521::ecdsa::signature::Verifier as _;
            let key = p521::ecdsa::VerifyingKey::from_sec1_bytes(key_bytes)
                .map_err(|e| Error::InvalidKey(e.to_string()))?;
            let sig = match p521::ecdsa::Signature::from_slice(signature) {
                Ok(sig) => sig,
                Err(_) => return Ok(false),
            };
            key.verify(data, &sig).is_ok()
        }
        SigningAlg::Ps256 => verify_rsa_pss::<Sha256>(key_bytes, data, signature)?,
        SigningAlg::Ps384 => verify_rsa_pss::<Sha384>(key_bytes, data, signature)?,
        SigningAlg::Ps512 => verify_rsa_pss::<Sha512>(key_bytes, data, signature)?,
        SigningAlg::Ed25519 => {
            use ed25519_dalek::Verifier as _;
            let raw: [u8; 32] = key_bytes
                .try_into()
                .map_err(|_| Error::InvalidKey("Ed25519 key must be 32 bytes".into()))?;
            let key = ed25519_dalek::VerifyingKey::from_bytes(&raw)
                .map_err(|e| Error::InvalidKey(e.to_string()))?;
            let sig = match ed25519_dalek::Signature::from_slice(signature) {
                Ok(sig) => sig,
                Err(_) => return Ok(false),
            };
            key.verify(data, &sig).is_ok()
        }
    };

    Ok(verified)
}

fn verify_rsa_pss<D>(key_bytes: &[u8], data: &[u8], signature: &[u8]) -> Result<bool>
where
    D: sha2::Digest + sha2::digest::FixedOutputReset + der::oid::AssociatedOid,
{
    use rsa::pkcs1::DecodeRsaPublicKey as _;
    use rsa::signature::Verifier as _;

    let public = rsa::RsaPublicKey::from_pkcs1_der(key_bytes)
        .map_err(|e| Error::InvalidKey(e.to_string()))?;
    let key = rsa::pss::VerifyingKey::<D>::new(public);
    let sig = match rsa::pss::Signature::try_from(signature) {
        Ok(sig) => sig,
        Err(_) => return Ok(false),
    };
    Ok(key.verify(data, &sig).is_ok())
}

/// Verify an X.509 certificate's signature against the issuer's public key
pub fn verify_cert_signature(
    cert: &Certificate,
    issuer_spki: &SubjectPublicKeyInfoOwned,
) -> Result<bool> {
    use der::Encode as _;

    let tbs = cert.tbs_certificate.to_der()?;
    let sig_bytes = cert
        .signature
        .as_bytes()
        .ok_or_else(|| Error::Asn1("certificate signature has unused bits".into()))?;
    verify_with_sig_oid(cert.signature_algorithm.oid, issuer_spki, &tbs, sig_bytes)
}

/// Verify a DER-convention signature identified by its X.509/CMS algorithm
/// OID: ecdsa-with-SHA256/384 (DER signatures), sha256/384/512 RSA PKCS#1
/// v1.5, and Ed25519: the algorithms certificate authorities and TSAs
/// actually emit.
pub fn verify_with_sig_oid(
    sig_oid: der::asn1::ObjectIdentifier,
    issuer_spki: &SubjectPublicKeyInfoOwned,
    data: &[u8],
    sig_bytes: &[u8],
) -> Result<bool> {
    let tbs = data;
    let key_bytes = issuer_spki.subject_public_key.raw_bytes();

    let verified = if sig_oid == oid::ECDSA_WITH_SHA256_OID {
        use p256::ecdsa::signature::Verifier as _;
        let key = p256::ecdsa::VerifyingKey::from_sec1_bytes(key_bytes)
            .map_err(|e| Error::InvalidKey(e.to_string()))?;
        match p256::ecdsa::Signature::from_der(sig_bytes) {
            Ok(sig) => key.verify(tbs, &sig).is_ok(),
            Err(_) => false,
        }
    } else if sig_oid == oid::ECDSA_WITH_SHA384_OID {
        use p384::ecdsa::signature::Verifier as _;
        let key = p384::ecdsa::VerifyingKey::from_sec1_bytes(key_bytes)
            .map_err(|e| Error::InvalidKey(e.to_string()))?;
        match p384::ecdsa::Signature::from_der(sig_bytes) {
            Ok(sig) => key.verify(tbs, &sig).is_ok(),
            Err(_) => false,
        }
    } else if sig_oid == oid::SHA256_WITH_RSA_OID {
        verify_rsa_pkcs1v15::<Sha256>(key_bytes, tbs, sig_bytes)?
    } else if sig_oid == oid::SHA384_WITH_RSA_OID {
        verify_rsa_pkcs1v15::<Sha384>(key_bytes, tbs, sig_bytes)?
    } else if sig_oid == oid::SHA512_WITH_RSA_OID {
        verify_rsa_pkcs1v15::<Sha512>(key_bytes, tbs, sig_bytes)?
    } else if sig_oid == oid::ID_ED25519_OID {
        use ed25519_dalek::Verifier as _;
        let raw: [u8; 32] = key_bytes
            .try_into()
            .map_err(|_| Error::InvalidKey("Ed25519 key must be 32 bytes".into()))?;
        let key = ed25519_dalek::VerifyingKey::from_bytes(&raw)
            .map_err(|e| Error::InvalidKey(e.to_string()))?;
        match ed25519_dalek::Signature::from_slice(sig_bytes) {
            Ok(sig) => key.verify(tbs, &sig).is_ok(),
            Err(_) => false,
        }
    } else {
        return Err(Error::UnsupportedAlgorithm(sig_oid.to_string()));
    };

    Ok(verified)
}

fn verify_rsa_pkcs1v15<D>(key_bytes: &[u8], data: &[u8], signature: &[u8]) -> Result<bool>
where
    D: sha2::Digest + der::oid::AssociatedOid,
{
    use rsa::pkcs1::DecodeRsaPublicKey as _;
    use rsa::signature::Verifier as _;

    let public = rsa::RsaPublicKey::from_pkcs1_der(key_bytes)
        .map_err(|e| Error::InvalidKey(e.to_string()))?;
    let key = rsa::pkcs1v15::VerifyingKey::<D>::new(public);
    let sig = match rsa::pkcs1v15::Signature::try_from(signature) {
        Ok(sig) => sig,
        Err(_) => return Ok(false),
    };
    Ok(key.verify(data, &sig).is_ok())
}

/// Validate a DER certificate chain, leaf first.
///
/// Each certificate must be signed by the next one in the list. When trust
/// anchors are supplied, the chain must reach one of them - either by
/// containing an anchor verbatim or by having its last certificate signed
/// by an anchor. An empty anchor list delegates the trust decision to the
/// caller and only the link signatures are checked.
pub fn validate_chain(certs_der: &[Vec<u8>], trust_anchors_der: &[Vec<u8>]) -> Result<()> {
    use der::Decode as _;

    if certs_der.is_empty() {
        return Err(Error::CertificateChainInvalid("empty chain".into()));
    }

    let certs = certs_der
        .iter()
        .map(|der_bytes| Certificate::from_der(der_bytes).map_err(Error::from))
        .collect::<Result<Vec<_>>>()?;

    for i in 0..certs.len() - 1 {
        let issuer_spki = &certs[i + 1].tbs_certificate.subject_public_key_info;
        if !verify_cert_signature(&certs[i], issuer_spki)? {
            return Err(Error::CertificateChainInvalid(format!(
                "certificate {i} is not signed by its issuer"
            )));
        }
    }

    if trust_anchors_der.is_empty() {
        return Ok(());
    }

    if certs_der.iter().any(|c| trust_anchors_der.contains(c)) {
        return Ok(());
    }

    let last = certs.last().expect("chain is non-empty");
    for anchor_der in trust_anchors_der {
        let anchor = Certificate::from_der(anchor_der)?;
        if verify_cert_signature(last, &anchor.tbs_certificate.subject_public_key_info)
            .unwrap_or(false)
        {
            return Ok(());
        }
    }

    Err(Error::CertificateChainInvalid(
        "chain does not reach a trusted root".into(),
    ))
}

/// Fill `n` bytes from the process CSPRNG
pub fn random_bytes(n: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; n];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}
