//! Shared test helpers: throwaway certificate chains and signers

use provenance_core::{crypto::SigningKeyPair, LocalSigner, SigningAlg};
use rcgen::{BasicConstraints, Certificate, CertificateParams, IsCa};

/// A generated CA-signed ES256 signing setup
pub struct TestChain {
    pub signer: LocalSigner,
    pub leaf_der: Vec<u8>,
    pub root_der: Vec<u8>,
}

/// Build a two-certificate chain (leaf signed by a throwaway root CA) and
/// a LocalSigner over it
pub fn es256_chain() -> TestChain {
    let mut root_params = CertificateParams::new(vec![]);
    root_params.alg = &rcgen::PKCS_ECDSA_P256_SHA256;
    root_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    root_params
        .distinguished_name
        .push(rcgen::DnType::CommonName, "Test Root CA");
    let root = Certificate::from_params(root_params).unwrap();
    let root_der = root.serialize_der().unwrap();

    let mut leaf_params = CertificateParams::new(vec!["Test Leaf".to_string()]);
    leaf_params.alg = &rcgen::PKCS_ECDSA_P256_SHA256;
    leaf_params
        .distinguished_name
        .push(rcgen::DnType::CommonName, "Test Leaf");
    let leaf = Certificate::from_params(leaf_params).unwrap();
    let leaf_der = leaf.serialize_der_with_signer(&root).unwrap();
    let leaf_key_der = leaf.serialize_private_key_der();

    let keypair = SigningKeyPair::from_pkcs8_der(SigningAlg::Es256, &leaf_key_der).unwrap();
    let signer = LocalSigner::new(keypair, vec![leaf_der.clone(), root_der.clone()]);

    TestChain {
        signer,
        leaf_der,
        root_der,
    }
}

/// A self-signed single-certificate signer for the given algorithm
pub fn self_signed_signer(alg: SigningAlg) -> (LocalSigner, Vec<u8>) {
    let rcgen_alg = match alg {
        SigningAlg::Es256 => &rcgen::PKCS_ECDSA_P256_SHA256,
        SigningAlg::Es384 => &rcgen::PKCS_ECDSA_P384_SHA384,
        SigningAlg::Ed25519 => &rcgen::PKCS_ED25519,
        other => panic!("no rcgen profile for {other}"),
    };
    let mut params = CertificateParams::new(vec!["Self Signed".to_string()]);
    params.alg = rcgen_alg;
    let cert = Certificate::from_params(params).unwrap();
    let cert_der = cert.serialize_der().unwrap();
    let key_der = cert.serialize_private_key_der();
    let keypair = SigningKeyPair::from_pkcs8_der(alg, &key_der).unwrap();
    (LocalSigner::new(keypair, vec![cert_der.clone()]), cert_der)
}
