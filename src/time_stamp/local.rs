//! Local timestamp provider
//!
//! Synthesizes RFC 3161 responses with a supplied certificate and key.
//! Useful for tests and for deployments that run their own time authority.

use crate::{
    crypto::{
        hash, SigningAlg, SigningKeyPair, ECDSA_WITH_SHA256_OID, ECDSA_WITH_SHA384_OID,
        ECDSA_WITH_SHA512_OID, ID_CONTENT_TYPE_OID, ID_CT_TST_INFO_OID, ID_ED25519_OID,
        ID_MESSAGE_DIGEST_OID, ID_SIGNED_DATA_OID,
    },
    error::{Error, Result},
};
use der::{
    asn1::{Any, Int, ObjectIdentifier, OctetString, SetOfVec},
    Decode, Encode,
};
use x509_cert::{attr::Attribute, spki::AlgorithmIdentifierOwned, Certificate};

use super::{
    asn1::{
        ContentInfo, EncapsulatedContentInfo, IssuerAndSerialNumber, PkiStatusInfo,
        SignedData, SignerInfo, TimeStampReq, TimeStampResp, TstInfo,
    },
    TimestampProvider, STATUS_GRANTED,
};

/// Policy OID stamped into locally issued tokens
const LOCAL_POLICY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.4.1.13762.3");

/// Signs timestamp tokens with an in-process key
pub struct LocalTimestamper {
    keypair: SigningKeyPair,
    certs_der: Vec<Vec<u8>>,
}

impl LocalTimestamper {
    /// Create a provider from a key pair and its DER chain, leaf first
    pub fn new(keypair: SigningKeyPair, certs_der: Vec<Vec<u8>>) -> Self {
        Self { keypair, certs_der }
    }

    fn signature_algorithm(&self) -> Result<ObjectIdentifier> {
        match self.keypair.alg() {
            SigningAlg::Es256 => Ok(ECDSA_WITH_SHA256_OID),
            SigningAlg::Es384 => Ok(ECDSA_WITH_SHA384_OID),
            SigningAlg::Es512 => Ok(ECDSA_WITH_SHA512_OID),
            SigningAlg::Ed25519 => Ok(ID_ED25519_OID),
            other => Err(Error::Signing(format!(
                "{other} keys cannot sign CMS timestamp tokens"
            ))),
        }
    }

    /// CMS wants DER ECDSA signatures; COSE-convention raw `r || s` must
    /// be re-encoded
    fn cms_signature(&self, data: &[u8]) -> Result<Vec<u8>> {
        let raw = self.keypair.sign(data)?;
        let der_sig = match self.keypair.alg() {
            SigningAlg::Es256 => p256::ecdsa::Signature::from_slice(&raw)
                .map_err(|e| Error::Signing(e.to_string()))?
                .to_der()
                .as_bytes()
                .to_vec(),
            SigningAlg::Es384 => p384::ecdsa::Signature::from_slice(&raw)
                .map_err(|e| Error::Signing(e.to_string()))?
                .to_der()
                .as_bytes()
                .to_vec(),
            SigningAlg::Es512 => p521::ecdsa::Signature::from_slice(&raw)
                .map_err(|e| Error::Signing(e.to_string()))?
                .to_der()
                .as_bytes()
                .to_vec(),
            _ => raw,
        };
        Ok(der_sig)
    }
}

impl TimestampProvider for LocalTimestamper {
    fn get_signed_timestamp(&self, req: &TimeStampReq) -> Result<TimeStampResp> {
        let leaf_der = self
            .certs_der
            .first()
            .ok_or_else(|| Error::InvalidKey("timestamper has no certificate".into()))?;
        let leaf = Certificate::from_der(leaf_der)?;

        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_err(|e| Error::Signing(e.to_string()))?;
        let gen_time = der::asn1::GeneralizedTime::from_unix_duration(
            std::time::Duration::from_secs(now.as_secs()),
        )?;

        let mut serial = crate::crypto::random_bytes(8);
        serial[0] = (serial[0] & 0x7F) | 0x40;

        let tst_info = TstInfo {
            version: 1,
            policy: LOCAL_POLICY,
            message_imprint: req.message_imprint.clone(),
            serial_number: Int::new(&serial)?,
            gen_time,
            accuracy: None,
            ordering: false,
            nonce: req.nonce.clone(),
            tsa: None,
        };
        let tst_der = tst_info.to_der()?;

        let digest_alg = self.keypair.alg().hash_alg();

        // Signed attributes: content-type and message-digest
        let mut signed_attrs = SetOfVec::new();
        let mut content_type_values = SetOfVec::new();
        content_type_values.insert(Any::encode_from(&ID_CT_TST_INFO_OID)?)?;
        signed_attrs.insert(Attribute {
            oid: ID_CONTENT_TYPE_OID,
            values: content_type_values,
        })?;
        let mut message_digest_values = SetOfVec::new();
        message_digest_values.insert(Any::encode_from(&OctetString::new(
            hash(digest_alg, &tst_der),
        )?)?)?;
        signed_attrs.insert(Attribute {
            oid: ID_MESSAGE_DIGEST_OID,
            values: message_digest_values,
        })?;

        // The signature covers the attributes re-tagged as SET OF
        let attrs_der = signed_attrs.to_der()?;
        let signature = self.cms_signature(&attrs_der)?;

        let signer_info = SignerInfo {
            version: 1,
            sid: IssuerAndSerialNumber {
                issuer: leaf.tbs_certificate.issuer.clone(),
                serial_number: leaf.tbs_certificate.serial_number.clone(),
            },
            digest_algorithm: AlgorithmIdentifierOwned {
                oid: digest_alg.oid(),
                parameters: None,
            },
            signed_attrs: Some(signed_attrs),
            signature_algorithm: AlgorithmIdentifierOwned {
                oid: self.signature_algorithm()?,
                parameters: None,
            },
            signature: OctetString::new(signature)?,
        };

        let mut digest_algorithms = SetOfVec::new();
        digest_algorithms.insert(AlgorithmIdentifierOwned {
            oid: digest_alg.oid(),
            parameters: None,
        })?;

        let mut certificates = SetOfVec::new();
        for cert_der in &self.certs_der {
            certificates.insert(Any::from_der(cert_der)?)?;
        }

        let mut signer_infos = SetOfVec::new();
        signer_infos.insert(signer_info)?;

        let signed_data = SignedData {
            version: 3,
            digest_algorithms,
            encap_content_info: EncapsulatedContentInfo {
                econtent_type: ID_CT_TST_INFO_OID,
                econtent: Some(OctetString::new(tst_der)?),
            },
            certificates: Some(certificates),
            signer_infos,
        };

        Ok(TimeStampResp {
            status: PkiStatusInfo {
                status: STATUS_GRANTED,
                status_string: None,
                fail_info: None,
            },
            time_stamp_token: Some(ContentInfo {
                content_type: ID_SIGNED_DATA_OID,
                content: Any::encode_from(&signed_data)?,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        crypto::HashAlgorithm,
        error::TimestampFailure,
        time_stamp::{build_request, timestamp_token_der, verify_timestamp_token},
    };

    fn test_timestamper() -> (LocalTimestamper, Vec<u8>) {
        let mut params = rcgen::CertificateParams::new(vec!["Test TSA".to_string()]);
        params.alg = &rcgen::PKCS_ECDSA_P256_SHA256;
        let cert = rcgen::Certificate::from_params(params).unwrap();
        let cert_der = cert.serialize_der().unwrap();
        let key_der = cert.serialize_private_key_der();

        let keypair = SigningKeyPair::from_pkcs8_der(SigningAlg::Es256, &key_der).unwrap();
        (
            LocalTimestamper::new(keypair, vec![cert_der.clone()]),
            cert_der,
        )
    }

    #[test]
    fn test_issue_and_verify_round_trip() {
        let (timestamper, cert_der) = test_timestamper();
        let signature = b"cose signature bytes";

        let req = build_request(HashAlgorithm::Sha256, signature).unwrap();
        let resp = timestamper.get_signed_timestamp(&req).unwrap();
        let token = timestamp_token_der(&resp).unwrap();

        let verified = verify_timestamp_token(
            &token,
            signature,
            req.nonce.as_ref(),
            &[cert_der.clone()],
        )
        .unwrap();
        assert_eq!(verified.signer_cert_der, cert_der);
        assert!(verified.gen_time_unix > 1_700_000_000);
    }

    #[test]
    fn test_imprint_mismatch_detected() {
        let (timestamper, cert_der) = test_timestamper();
        let req = build_request(HashAlgorithm::Sha256, b"original").unwrap();
        let resp = timestamper.get_signed_timestamp(&req).unwrap();
        let token = timestamp_token_der(&resp).unwrap();

        let result =
            verify_timestamp_token(&token, b"tampered", req.nonce.as_ref(), &[cert_der]);
        assert!(matches!(
            result,
            Err(Error::TimestampInvalid(TimestampFailure::ImprintMismatch))
        ));
    }

    #[test]
    fn test_nonce_mismatch_detected() {
        let (timestamper, cert_der) = test_timestamper();
        let req = build_request(HashAlgorithm::Sha256, b"payload").unwrap();
        let resp = timestamper.get_signed_timestamp(&req).unwrap();
        let token = timestamp_token_der(&resp).unwrap();

        let other = build_request(HashAlgorithm::Sha256, b"payload").unwrap();
        let result =
            verify_timestamp_token(&token, b"payload", other.nonce.as_ref(), &[cert_der]);
        assert!(matches!(
            result,
            Err(Error::TimestampInvalid(TimestampFailure::NonceMismatch))
        ));
    }

    #[test]
    fn test_untrusted_root_detected() {
        let (timestamper, _) = test_timestamper();
        let (_, other_cert) = test_timestamper();
        let req = build_request(HashAlgorithm::Sha256, b"payload").unwrap();
        let resp = timestamper.get_signed_timestamp(&req).unwrap();
        let token = timestamp_token_der(&resp).unwrap();

        let result =
            verify_timestamp_token(&token, b"payload", req.nonce.as_ref(), &[other_cert]);
        assert!(matches!(
            result,
            Err(Error::TimestampInvalid(TimestampFailure::ChainInvalid))
        ));
    }
}
