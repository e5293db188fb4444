//! Signer interface and the local key-pair implementation

use crate::{
    crypto::{SigningAlg, SigningKeyPair},
    error::{Error, Result},
    time_stamp::TimestampProvider,
};

/// Pluggable signing back-end
///
/// The engine hands implementations the exact to-be-signed bytes and takes
/// back a raw signature; key custody (files, HSM, remote service) stays
/// behind this trait.
pub trait Signer {
    /// The algorithm this signer produces
    fn alg(&self) -> SigningAlg;

    /// Sign the to-be-signed bytes, returning the raw signature
    fn sign(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// DER-encoded certificate chain, leaf first
    fn certs(&self) -> Result<Vec<Vec<u8>>>;

    /// Bytes to reserve for the finished COSE_Sign1 in the signature box
    fn reserve_size(&self) -> usize {
        10240
    }

    /// Time authority used to countersign, if any
    fn time_authority(&self) -> Option<&dyn TimestampProvider> {
        None
    }
}

/// Signer backed by an in-process private key and certificate chain
pub struct LocalSigner {
    keypair: SigningKeyPair,
    certs_der: Vec<Vec<u8>>,
    reserve_size: usize,
    timestamper: Option<Box<dyn TimestampProvider>>,
}

impl LocalSigner {
    /// Create a signer from a parsed key pair and DER chain (leaf first)
    pub fn new(keypair: SigningKeyPair, certs_der: Vec<Vec<u8>>) -> Self {
        Self {
            keypair,
            certs_der,
            reserve_size: 10240,
            timestamper: None,
        }
    }

    /// Create a signer from PKCS#8 PEM key material and a PEM chain
    pub fn from_pem(alg: SigningAlg, key_pem: &str, certs_pem: &str) -> Result<Self> {
        use der::Encode as _;

        let keypair = SigningKeyPair::from_pkcs8_pem(alg, key_pem)?;
        let certs = x509_cert::Certificate::load_pem_chain(certs_pem.as_bytes())
            .map_err(|e| Error::InvalidKey(format!("certificate chain: {e}")))?;
        if certs.is_empty() {
            return Err(Error::InvalidKey("certificate chain is empty".into()));
        }
        let certs_der = certs
            .iter()
            .map(|cert| cert.to_der().map_err(Error::from))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self::new(keypair, certs_der))
    }

    /// Override the reserved signature box size
    pub fn with_reserve_size(mut self, reserve_size: usize) -> Self {
        self.reserve_size = reserve_size;
        self
    }

    /// Attach a time authority for countersigning
    pub fn with_time_authority(mut self, timestamper: Box<dyn TimestampProvider>) -> Self {
        self.timestamper = Some(timestamper);
        self
    }
}

impl Signer for LocalSigner {
    fn alg(&self) -> SigningAlg {
        self.keypair.alg()
    }

    fn sign(&self, data: &[u8]) -> Result<Vec<u8>> {
        self.keypair.sign(data)
    }

    fn certs(&self) -> Result<Vec<Vec<u8>>> {
        Ok(self.certs_der.clone())
    }

    fn reserve_size(&self) -> usize {
        self.reserve_size
    }

    fn time_authority(&self) -> Option<&dyn TimestampProvider> {
        self.timestamper.as_deref()
    }
}
