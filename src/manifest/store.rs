//! Manifest store: the ordered table of manifests inside the `c2pa` box

use crate::{
    crypto::{hash, HashAlgorithm},
    error::{Error, Result},
    jumbf::{
        CborBox, DataBox, SuperBox, ASSERTION_STORE_UUID, CLAIM_UUID, MANIFEST_STORE_UUID,
        MANIFEST_UUID, SIGNATURE_UUID,
    },
};

use super::{
    assertions::Assertion, claim::Claim, claim::ClaimVersion, claim::HashedUri,
    ASSERTION_STORE_LABEL, CLAIM_LABEL_V1, CLAIM_LABEL_V2, SIGNATURE_LABEL, STORE_LABEL,
};

/// One manifest: a claim, its assertion store, and the claim signature
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    /// Store-unique label (`urn:uuid:...`)
    pub label: String,
    /// The decoded claim
    pub claim: Claim,
    /// The exact claim CBOR bytes the signature covers
    pub claim_raw: Vec<u8>,
    /// Assertion super boxes in store order
    pub assertion_boxes: Vec<SuperBox>,
    /// Tagged COSE_Sign1 bytes from the signature box
    pub signature_cose: Vec<u8>,
    sbox: Option<SuperBox>,
}

impl Manifest {
    /// Create a manifest from freshly built parts
    pub fn new(
        label: impl Into<String>,
        claim: Claim,
        assertion_boxes: Vec<SuperBox>,
        signature_cose: Vec<u8>,
    ) -> Result<Self> {
        let claim_raw = claim.to_cbor_bytes()?;
        Ok(Self {
            label: label.into(),
            claim,
            claim_raw,
            assertion_boxes,
            signature_cose,
            sbox: None,
        })
    }

    /// Generate a store-unique manifest label
    pub fn random_label() -> String {
        format!("urn:uuid:{}", hex::encode(crate::crypto::random_bytes(16)))
    }

    /// Find an assertion super box by its label
    pub fn assertion_box(&self, label: &str) -> Option<&SuperBox> {
        self.assertion_boxes
            .iter()
            .find(|sbox| sbox.label() == Some(label))
    }

    /// Decode every assertion in store order
    pub fn assertions(&self) -> Result<Vec<Assertion>> {
        self.assertion_boxes.iter().map(Assertion::from_jumbf).collect()
    }

    /// Decode the data hash assertion, if present
    pub fn data_hash_assertion(
        &self,
    ) -> Option<Result<super::assertions::DataHashAssertion>> {
        self.assertion_box(super::assertions::DataHashAssertion::LABEL)
            .map(super::assertions::DataHashAssertion::from_jumbf)
    }

    /// Compute the hashed-URI reference for one of this manifest's
    /// assertion boxes, digesting its exact serialized bytes
    pub fn assertion_hashed_uri(alg: HashAlgorithm, sbox: &SuperBox) -> HashedUri {
        let label = sbox.label().unwrap_or("");
        HashedUri::new(
            super::self_uri(&format!("{ASSERTION_STORE_LABEL}/{label}")),
            None,
            hash(alg, &sbox.serialize()),
        )
    }

    /// The original manifest super box, when this manifest was parsed
    pub fn original_box(&self) -> Option<&SuperBox> {
        self.sbox.as_ref()
    }

    /// Serialize this manifest's super box (exact bytes when parsed)
    pub fn serialized_box(&self) -> Result<Vec<u8>> {
        Ok(self.to_jumbf()?.serialize())
    }

    /// Interpret a manifest super box
    pub fn from_jumbf(sbox: &SuperBox) -> Result<Self> {
        let label = sbox
            .desc
            .label
            .clone()
            .ok_or_else(|| Error::ClaimDecoding("manifest box has no label".into()))?;

        let assertion_boxes = match sbox.find_by_label(ASSERTION_STORE_LABEL) {
            Some(store) => store.super_boxes().cloned().collect(),
            None => Vec::new(),
        };

        let (version, claim_box) = match sbox.find_by_label(CLAIM_LABEL_V1) {
            Some(claim_box) => (ClaimVersion::V1, claim_box),
            None => match sbox.find_by_label(CLAIM_LABEL_V2) {
                Some(claim_box) => (ClaimVersion::V2, claim_box),
                None => {
                    return Err(Error::ClaimDecoding(format!(
                        "manifest {label} has no claim box"
                    )))
                }
            },
        };
        let claim_raw = match claim_box.data_box() {
            Some(DataBox::Cbor(cbor)) => cbor.raw().to_vec(),
            _ => {
                return Err(Error::ClaimDecoding(format!(
                    "manifest {label} claim box has no CBOR content"
                )))
            }
        };
        let claim = Claim::from_cbor_bytes(version, &claim_raw)?;

        let signature_box = sbox.find_by_label(SIGNATURE_LABEL).ok_or_else(|| {
            Error::ClaimDecoding(format!("manifest {label} has no signature box"))
        })?;
        let signature_cose = match signature_box.data_box() {
            Some(DataBox::Cbor(cbor)) => cbor.raw().to_vec(),
            Some(DataBox::Binary(binary)) => binary.data.clone(),
            _ => {
                return Err(Error::ClaimDecoding(format!(
                    "manifest {label} signature box has no content"
                )))
            }
        };

        Ok(Self {
            label,
            claim,
            claim_raw,
            assertion_boxes,
            signature_cose,
            sbox: Some(sbox.clone()),
        })
    }

    /// Generate the manifest super box.
    ///
    /// A parsed manifest replays its original box so digests over it stay
    /// stable; a built manifest encodes assertion store, claim, signature.
    pub fn to_jumbf(&self) -> Result<SuperBox> {
        if let Some(sbox) = &self.sbox {
            return Ok(sbox.clone());
        }

        let mut manifest_box = SuperBox::new(MANIFEST_UUID, &self.label);

        let mut assertion_store = SuperBox::new(ASSERTION_STORE_UUID, ASSERTION_STORE_LABEL);
        for sbox in &self.assertion_boxes {
            assertion_store.add_super(sbox.clone());
        }
        manifest_box.add_super(assertion_store);

        let mut claim_box = SuperBox::new(CLAIM_UUID, self.claim.version.box_label());
        claim_box.add_data(DataBox::Cbor(CborBox::from_raw_cbor(self.claim_raw.clone())?));
        manifest_box.add_super(claim_box);

        let mut signature_box = SuperBox::new(SIGNATURE_UUID, SIGNATURE_LABEL);
        signature_box.add_data(DataBox::Cbor(CborBox::from_raw_cbor(
            self.signature_cose.clone(),
        )?));
        manifest_box.add_super(signature_box);

        Ok(manifest_box)
    }
}

/// An ordered list of manifests; the last one is the active manifest.
///
/// Manifests are addressed by label, so ingredient references resolve
/// through this table rather than through owning pointers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ManifestStore {
    manifests: Vec<Manifest>,
}

impl ManifestStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a manifest store from assembled JUMBF bytes
    pub fn from_jumbf_bytes(bytes: &[u8]) -> Result<Self> {
        let root = SuperBox::from_slice(bytes)?;
        Self::from_jumbf(&root)
    }

    /// Interpret a manifest store super box
    pub fn from_jumbf(root: &SuperBox) -> Result<Self> {
        if root.desc.uuid != MANIFEST_STORE_UUID || root.label() != Some(STORE_LABEL) {
            return Err(Error::ClaimDecoding(
                "root box is not a manifest store".into(),
            ));
        }

        // A manifest that fails to parse poisons only itself; later
        // manifests in the store still load
        let mut manifests = Vec::new();
        for sbox in root.super_boxes() {
            match Manifest::from_jumbf(sbox) {
                Ok(manifest) => manifests.push(manifest),
                Err(e) => {
                    tracing::debug!(error = %e, "skipping unparseable manifest");
                }
            }
        }

        Ok(Self { manifests })
    }

    /// Serialize the store to JUMBF bytes
    pub fn to_jumbf_bytes(&self) -> Result<Vec<u8>> {
        let mut root = SuperBox::new(MANIFEST_STORE_UUID, STORE_LABEL);
        for manifest in &self.manifests {
            root.add_super(manifest.to_jumbf()?);
        }
        Ok(root.serialize())
    }

    /// Append a manifest; it becomes the active manifest
    pub fn push(&mut self, manifest: Manifest) {
        self.manifests.push(manifest);
    }

    /// The active manifest: the last one in the store
    pub fn active_manifest(&self) -> Option<&Manifest> {
        self.manifests.last()
    }

    /// Look up a manifest by label
    pub fn get(&self, label: &str) -> Option<&Manifest> {
        self.manifests.iter().find(|m| m.label == label)
    }

    /// Resolve an ingredient manifest reference (`self#jumbf=/c2pa/<label>`)
    pub fn resolve_manifest_ref(&self, hashed_uri: &HashedUri) -> Option<&Manifest> {
        let path = super::parse_self_uri(&hashed_uri.url)?;
        let label = path.strip_prefix("/c2pa/")?;
        self.get(label)
    }

    /// All manifests in store order
    pub fn manifests(&self) -> &[Manifest] {
        &self.manifests
    }

    /// Number of manifests
    pub fn len(&self) -> usize {
        self.manifests.len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.manifests.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::assertions::{Action, ActionsAssertion, DataHashAssertion};

    fn sample_manifest(label: &str) -> Manifest {
        let mut claim = Claim::new("provenance-core/0.1.0", "image/jpeg", ClaimVersion::V1);

        let data_hash = DataHashAssertion::new(HashAlgorithm::Sha256);
        let mut actions = ActionsAssertion::new();
        actions.add_action(Action::new("c2pa.created"));

        let assertion_boxes =
            vec![data_hash.to_jumbf().unwrap(), actions.to_jumbf().unwrap()];
        for sbox in &assertion_boxes {
            claim.add_assertion_ref(Manifest::assertion_hashed_uri(
                HashAlgorithm::Sha256,
                sbox,
            ));
        }

        // Stand-in for a COSE_Sign1: any well-formed CBOR works here
        let signature = {
            let mut bytes = Vec::new();
            ciborium::ser::into_writer(
                &ciborium::Value::Tag(18, Box::new(ciborium::Value::Array(vec![]))),
                &mut bytes,
            )
            .unwrap();
            bytes
        };

        Manifest::new(label, claim, assertion_boxes, signature).unwrap()
    }

    #[test]
    fn test_store_round_trip() {
        let mut store = ManifestStore::new();
        store.push(sample_manifest("urn:uuid:0001"));
        store.push(sample_manifest("urn:uuid:0002"));

        let bytes = store.to_jumbf_bytes().unwrap();
        let parsed = ManifestStore::from_jumbf_bytes(&bytes).unwrap();

        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed.active_manifest().unwrap().label, "urn:uuid:0002");
        assert_eq!(parsed.to_jumbf_bytes().unwrap(), bytes);
    }

    #[test]
    fn test_active_manifest_is_last() {
        let mut store = ManifestStore::new();
        assert!(store.active_manifest().is_none());
        store.push(sample_manifest("urn:uuid:a"));
        store.push(sample_manifest("urn:uuid:b"));
        store.push(sample_manifest("urn:uuid:c"));
        assert_eq!(store.active_manifest().unwrap().label, "urn:uuid:c");
    }

    #[test]
    fn test_parsed_manifest_keeps_exact_claim_bytes() {
        let manifest = sample_manifest("urn:uuid:raw");
        let mut store = ManifestStore::new();
        let claim_raw = manifest.claim_raw.clone();
        store.push(manifest);

        let bytes = store.to_jumbf_bytes().unwrap();
        let parsed = ManifestStore::from_jumbf_bytes(&bytes).unwrap();
        assert_eq!(parsed.active_manifest().unwrap().claim_raw, claim_raw);
    }

    #[test]
    fn test_assertion_lookup_and_hashed_uri() {
        let manifest = sample_manifest("urn:uuid:lookup");
        let sbox = manifest.assertion_box(DataHashAssertion::LABEL).unwrap();
        let hashed_uri = Manifest::assertion_hashed_uri(HashAlgorithm::Sha256, sbox);
        assert_eq!(
            hashed_uri.url,
            "self#jumbf=c2pa.assertions/c2pa.hash.data"
        );
        assert_eq!(
            hashed_uri.hash,
            hash(HashAlgorithm::Sha256, &sbox.serialize())
        );
    }

    #[test]
    fn test_resolve_manifest_ref() {
        let mut store = ManifestStore::new();
        store.push(sample_manifest("urn:uuid:parent"));
        store.push(sample_manifest("urn:uuid:active"));

        let hashed_uri = HashedUri::new(
            "self#jumbf=/c2pa/urn:uuid:parent".into(),
            None,
            vec![0; 32],
        );
        assert_eq!(
            store.resolve_manifest_ref(&hashed_uri).unwrap().label,
            "urn:uuid:parent"
        );

        let missing =
            HashedUri::new("self#jumbf=/c2pa/urn:uuid:nope".into(), None, vec![0; 32]);
        assert!(store.resolve_manifest_ref(&missing).is_none());
    }

    #[test]
    fn test_wrong_root_rejected() {
        let sbox = SuperBox::new(MANIFEST_UUID, "not-a-store");
        let bytes = sbox.serialize();
        assert!(ManifestStore::from_jumbf_bytes(&bytes).is_err());
    }
}
