//! Manifest builder: assemble, hash, sign, and embed in one pass
//!
//! Layout stability is the whole game: the claim is signed over bytes that
//! include the data-hash assertion, but the data hash depends on where the
//! manifest lands in the asset. The builder first embeds a placeholder
//! layout, measures it, computes the real digest and exclusions, and
//! patches them in with the assertion's padding re-fit so every box keeps
//! its size. The signature is padded to the signer's reserved size the
//! same way.

use crate::{
    asset::Asset,
    cose::{sign_claim, Signer},
    crypto::{hash_stream_excluding, HashAlgorithm},
    error::{Error, Result},
    manifest::{
        assertions::{Assertion, DataHashAssertion},
        Claim, ClaimVersion, Manifest, ManifestStore,
    },
};
use std::io::{Cursor, Read, Seek, Write};

/// Builds, signs, and embeds a manifest into an asset
pub struct ManifestBuilder {
    claim_generator: String,
    title: Option<String>,
    version: ClaimVersion,
    hash_alg: HashAlgorithm,
    assertions: Vec<Assertion>,
}

impl ManifestBuilder {
    /// Start a manifest for the given generator product string
    pub fn new(claim_generator: impl Into<String>) -> Self {
        Self {
            claim_generator: claim_generator.into(),
            title: None,
            version: ClaimVersion::V1,
            hash_alg: HashAlgorithm::Sha256,
            assertions: Vec::new(),
        }
    }

    /// Set the asset title recorded in the claim
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Choose the claim dialect written (v1 by default)
    pub fn with_claim_version(mut self, version: ClaimVersion) -> Self {
        self.version = version;
        self
    }

    /// Choose the digest algorithm for assertion references and data hashes
    pub fn with_hash_alg(mut self, hash_alg: HashAlgorithm) -> Self {
        self.hash_alg = hash_alg;
        self
    }

    /// Attach an assertion; insertion order is preserved in the claim
    pub fn add_assertion(mut self, assertion: Assertion) -> Self {
        self.assertions.push(assertion);
        self
    }

    /// Sign the claim and write a copy of the asset with the manifest store
    /// embedded. Returns the store as written.
    ///
    /// An existing manifest store in the asset is preserved: its manifests
    /// become history and the new manifest is appended as the active one.
    pub fn sign_and_embed<R: Read + Seek, W: Write>(
        self,
        asset: &mut Asset<R>,
        signer: &dyn Signer,
        output: &mut W,
    ) -> Result<ManifestStore> {
        let format = asset.kind().to_mime().to_string();
        let label = Manifest::random_label();
        let instance_id = format!("xmp:iid:{}", hex::encode(crate::crypto::random_bytes(16)));
        let box_size = signer.reserve_size();

        let prior_store = match asset.read_manifest_store()? {
            Some(bytes) => ManifestStore::from_jumbf_bytes(&bytes)?,
            None => ManifestStore::new(),
        };

        // Pass 1: placeholder layout with the final sizes
        let placeholder_hash = DataHashAssertion::new(self.hash_alg);
        let assertion_target_size = placeholder_hash.to_jumbf()?.measure();

        let store_bytes_1 = self.assemble(
            &prior_store,
            &label,
            &instance_id,
            &format,
            &placeholder_hash,
            vec![0u8; box_size],
        )?;

        let mut laid_out = Vec::new();
        asset.write_manifest_store(&mut laid_out, Some(&store_bytes_1))?;

        // Measure the placeholder layout and compute the real binding
        let mut laid_out_asset = Asset::from_reader(Cursor::new(&laid_out))?;
        let exclusions = laid_out_asset.data_hash_exclusions(None)?;
        let total_size = laid_out_asset.structure().total_size;
        let digest = hash_stream_excluding(
            self.hash_alg,
            laid_out_asset.reader_mut(),
            total_size,
            &exclusions,
        )?;

        // Pass 2: same layout, real values
        let mut final_hash = placeholder_hash;
        final_hash.finalize(exclusions, digest, assertion_target_size)?;

        let boxes = self.assertion_boxes(&final_hash)?;
        let claim = self.build_claim(&instance_id, &format, &boxes);
        let claim_bytes = claim.to_cbor_bytes()?;
        let signature = sign_claim(&claim_bytes, signer, self.version, box_size)?;

        let manifest = Manifest::new(&label, claim, boxes, signature)?;
        let mut store = prior_store;
        store.push(manifest);
        let store_bytes_2 = store.to_jumbf_bytes()?;

        if store_bytes_2.len() != store_bytes_1.len() {
            return Err(Error::CoseStructure(format!(
                "manifest layout drifted between passes ({} -> {} bytes)",
                store_bytes_1.len(),
                store_bytes_2.len()
            )));
        }

        asset.write_manifest_store(output, Some(&store_bytes_2))?;
        Ok(store)
    }

    fn assertion_boxes(
        &self,
        data_hash: &DataHashAssertion,
    ) -> Result<Vec<crate::jumbf::SuperBox>> {
        let mut boxes = Vec::with_capacity(self.assertions.len() + 1);
        for assertion in &self.assertions {
            boxes.push(assertion.to_jumbf()?);
        }
        boxes.push(data_hash.to_jumbf()?);
        Ok(boxes)
    }

    fn build_claim(
        &self,
        instance_id: &str,
        format: &str,
        boxes: &[crate::jumbf::SuperBox],
    ) -> Claim {
        let mut claim = Claim::new(&self.claim_generator, format, self.version);
        claim.instance_id = instance_id.to_string();
        claim.title = self.title.clone();
        claim.alg = self.hash_alg.name().to_string();
        for sbox in boxes {
            claim.add_assertion_ref(Manifest::assertion_hashed_uri(self.hash_alg, sbox));
        }
        claim
    }

    fn assemble(
        &self,
        prior_store: &ManifestStore,
        label: &str,
        instance_id: &str,
        format: &str,
        data_hash: &DataHashAssertion,
        signature: Vec<u8>,
    ) -> Result<Vec<u8>> {
        let boxes = self.assertion_boxes(data_hash)?;
        let claim = self.build_claim(instance_id, format, &boxes);
        let manifest = Manifest::new(label, claim, boxes, signature)?;

        let mut store = prior_store.clone();
        store.push(manifest);
        store.to_jumbf_bytes()
    }
}
