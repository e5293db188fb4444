//! DER structures for RFC 3161 and the CMS subset a timestamp token uses

use der::{
    asn1::{Any, BitString, GeneralizedTime, Int, ObjectIdentifier, OctetString, SetOfVec},
    Encode, Sequence, ValueOrd,
};
use x509_cert::{attr::Attribute, name::Name, serial_number::SerialNumber,
    spki::AlgorithmIdentifierOwned};

/// RFC 3161 MessageImprint: digest algorithm plus digest
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct MessageImprint {
    /// Digest algorithm identifier
    pub hash_algorithm: AlgorithmIdentifierOwned,
    /// Digest over the timestamped bytes
    pub hashed_message: OctetString,
}

/// RFC 3161 TimeStampReq
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct TimeStampReq {
    /// Always 1
    pub version: u8,
    /// What is being timestamped
    pub message_imprint: MessageImprint,
    /// TSA policy under which the token should be issued
    #[asn1(optional = "true")]
    pub req_policy: Option<ObjectIdentifier>,
    /// Random nonce echoed back by the TSA
    #[asn1(optional = "true")]
    pub nonce: Option<Int>,
    /// Ask the TSA to include its certificate
    #[asn1(default = "Default::default")]
    pub cert_req: bool,
}

/// RFC 3161 PKIStatusInfo
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct PkiStatusInfo {
    /// PKIStatus; 0 = granted, 1 = grantedWithMods
    pub status: u32,
    /// Free-text status detail
    #[asn1(optional = "true")]
    pub status_string: Option<Any>,
    /// PKIFailureInfo bits
    #[asn1(optional = "true")]
    pub fail_info: Option<BitString>,
}

/// RFC 3161 TimeStampResp
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct TimeStampResp {
    /// Grant/rejection status
    pub status: PkiStatusInfo,
    /// The token, present when granted
    #[asn1(optional = "true")]
    pub time_stamp_token: Option<ContentInfo>,
}

/// CMS ContentInfo
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct ContentInfo {
    /// Content type OID (id-signedData for a timestamp token)
    pub content_type: ObjectIdentifier,
    /// The content itself
    #[asn1(context_specific = "0", tag_mode = "EXPLICIT")]
    pub content: Any,
}

/// CMS EncapsulatedContentInfo
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct EncapsulatedContentInfo {
    /// Inner content type (id-ct-TSTInfo)
    pub econtent_type: ObjectIdentifier,
    /// DER of the inner content
    #[asn1(context_specific = "0", tag_mode = "EXPLICIT", optional = "true")]
    pub econtent: Option<OctetString>,
}

/// CMS IssuerAndSerialNumber
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct IssuerAndSerialNumber {
    /// Issuer distinguished name
    pub issuer: Name,
    /// Certificate serial number
    pub serial_number: SerialNumber,
}

impl ValueOrd for IssuerAndSerialNumber {
    fn value_cmp(&self, other: &Self) -> der::Result<std::cmp::Ordering> {
        Ok(self.to_der()?.cmp(&other.to_der()?))
    }
}

/// CMS SignerInfo (issuerAndSerialNumber variant)
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct SignerInfo {
    /// 1 for issuerAndSerialNumber identification
    pub version: u8,
    /// Which certificate signed
    pub sid: IssuerAndSerialNumber,
    /// Digest algorithm for the signed attributes
    pub digest_algorithm: AlgorithmIdentifierOwned,
    /// Signed attributes (content-type and message-digest at minimum)
    #[asn1(context_specific = "0", tag_mode = "IMPLICIT", optional = "true")]
    pub signed_attrs: Option<SetOfVec<Attribute>>,
    /// Signature algorithm
    pub signature_algorithm: AlgorithmIdentifierOwned,
    /// The signature, computed over the signed attributes re-tagged as SET OF
    pub signature: OctetString,
}

impl ValueOrd for SignerInfo {
    fn value_cmp(&self, other: &Self) -> der::Result<std::cmp::Ordering> {
        Ok(self.to_der()?.cmp(&other.to_der()?))
    }
}

/// CMS SignedData, restricted to what a timestamp token carries
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct SignedData {
    /// CMS version (3 when certificates are present)
    pub version: u8,
    /// Digest algorithms used by the signers
    pub digest_algorithms: SetOfVec<AlgorithmIdentifierOwned>,
    /// The TSTInfo payload
    pub encap_content_info: EncapsulatedContentInfo,
    /// Signer certificates
    #[asn1(context_specific = "0", tag_mode = "IMPLICIT", optional = "true")]
    pub certificates: Option<SetOfVec<Any>>,
    /// Signers (exactly one for a timestamp token)
    pub signer_infos: SetOfVec<SignerInfo>,
}

/// RFC 3161 Accuracy
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct Accuracy {
    /// Seconds of accuracy
    #[asn1(optional = "true")]
    pub seconds: Option<u32>,
    /// Milliseconds of accuracy
    #[asn1(context_specific = "0", tag_mode = "IMPLICIT", optional = "true")]
    pub millis: Option<u16>,
    /// Microseconds of accuracy
    #[asn1(context_specific = "1", tag_mode = "IMPLICIT", optional = "true")]
    pub micros: Option<u16>,
}

/// RFC 3161 TSTInfo: the signed payload of a timestamp token
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct TstInfo {
    /// Always 1
    pub version: u8,
    /// Policy under which the token was issued
    pub policy: ObjectIdentifier,
    /// Echo of the request imprint
    pub message_imprint: MessageImprint,
    /// TSA-unique serial for this token
    pub serial_number: Int,
    /// When the token was produced
    pub gen_time: GeneralizedTime,
    /// Declared accuracy of genTime
    #[asn1(optional = "true")]
    pub accuracy: Option<Accuracy>,
    /// Whether genTime values are strictly ordered
    #[asn1(default = "Default::default")]
    pub ordering: bool,
    /// Echo of the request nonce
    #[asn1(optional = "true")]
    pub nonce: Option<Int>,
    /// TSA name
    #[asn1(context_specific = "0", tag_mode = "EXPLICIT", optional = "true")]
    pub tsa: Option<Any>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use der::Decode;

    #[test]
    fn test_tst_info_round_trip_with_nonce() {
        let tst = TstInfo {
            version: 1,
            policy: ObjectIdentifier::new_unwrap("1.2.3.4.1"),
            message_imprint: MessageImprint {
                hash_algorithm: AlgorithmIdentifierOwned {
                    oid: crate::crypto::SHA256_OID,
                    parameters: None,
                },
                hashed_message: OctetString::new(vec![0xAA; 32]).unwrap(),
            },
            serial_number: Int::new(&[0x01, 0x02, 0x03]).unwrap(),
            gen_time: GeneralizedTime::from_unix_duration(
                std::time::Duration::from_secs(1_700_000_000),
            )
            .unwrap(),
            accuracy: None,
            ordering: false,
            nonce: Some(Int::new(&[0x42; 10]).unwrap()),
            tsa: None,
        };

        let der_bytes = tst.to_der().unwrap();
        assert_eq!(TstInfo::from_der(&der_bytes).unwrap(), tst);
    }

    #[test]
    fn test_content_info_explicit_tag() {
        let inner = OctetString::new(b"payload".to_vec()).unwrap();
        let info = ContentInfo {
            content_type: crate::crypto::ID_SIGNED_DATA_OID,
            content: Any::encode_from(&inner).unwrap(),
        };
        let der_bytes = info.to_der().unwrap();
        let parsed = ContentInfo::from_der(&der_bytes).unwrap();
        assert_eq!(parsed, info);
        let back: OctetString = parsed.content.decode_as().unwrap();
        assert_eq!(back.as_bytes(), b"payload");
    }
}
