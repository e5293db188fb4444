//! End-to-end signing and validation across containers

mod common;

use common::{es256_chain, self_signed_signer};
use provenance_core::{
    manifest::assertions::{Action, ActionsAssertion},
    test_utils, validate_asset, Assertion, Asset, ManifestBuilder, SigningAlg,
    ValidationOptions,
};
use std::io::Cursor;

fn fixtures() -> Vec<(&'static str, Vec<u8>)> {
    vec![
        ("jpeg", test_utils::minimal_jpeg()),
        ("png", test_utils::minimal_png()),
        ("mp3", test_utils::minimal_mp3()),
        ("mp3+id3", test_utils::minimal_mp3_with_tag()),
    ]
}

fn creation_actions() -> ActionsAssertion {
    let mut actions = ActionsAssertion::new();
    actions.add_action(
        Action::new("c2pa.created")
            .with_software_agent("provenance-core/0.1.0")
            .with_digital_source_type(
                "http://cv.iptc.org/newscodes/digitalsourcetype/digitalCapture",
            ),
    );
    actions
}

fn sign(data: &[u8], signer: &provenance_core::LocalSigner) -> Vec<u8> {
    let mut asset = Asset::from_reader(Cursor::new(data)).unwrap();
    let mut output = Vec::new();
    ManifestBuilder::new("provenance-core/0.1.0")
        .with_title("integration fixture")
        .add_assertion(Assertion::Actions(creation_actions()))
        .sign_and_embed(&mut asset, signer, &mut output)
        .unwrap();
    output
}

#[test]
fn sign_then_validate_every_container() {
    let chain = es256_chain();
    let opts = ValidationOptions {
        trust_anchors_der: vec![chain.root_der.clone()],
        allowed_algs: None,
    };

    for (name, data) in fixtures() {
        let signed = sign(&data, &chain.signer);
        let mut asset = Asset::from_reader(Cursor::new(&signed)).unwrap();
        let report = validate_asset(&mut asset, &opts).unwrap();
        assert!(
            report.passed(),
            "{name}: {:?}",
            report.failures().collect::<Vec<_>>()
        );
    }
}

#[test]
fn validation_works_per_algorithm() {
    for alg in [SigningAlg::Es256, SigningAlg::Es384, SigningAlg::Ed25519] {
        let (signer, cert_der) = self_signed_signer(alg);
        let signed = sign(&test_utils::minimal_png(), &signer);

        let opts = ValidationOptions {
            trust_anchors_der: vec![cert_der],
            allowed_algs: Some(vec![alg]),
        };
        let mut asset = Asset::from_reader(Cursor::new(&signed)).unwrap();
        let report = validate_asset(&mut asset, &opts).unwrap();
        assert!(
            report.passed(),
            "{alg}: {:?}",
            report.failures().collect::<Vec<_>>()
        );
    }
}

#[test]
fn asset_preservation_on_remove() {
    // removeManifest(writeManifest(A, M)) == removeManifest(A), byte level
    let chain = es256_chain();

    for (name, data) in fixtures() {
        let signed = sign(&data, &chain.signer);

        let mut stripped_signed = Vec::new();
        Asset::from_reader(Cursor::new(&signed))
            .unwrap()
            .write_manifest_store(&mut stripped_signed, None)
            .unwrap();

        let mut stripped_original = Vec::new();
        Asset::from_reader(Cursor::new(&data))
            .unwrap()
            .write_manifest_store(&mut stripped_original, None)
            .unwrap();

        assert_eq!(stripped_signed, stripped_original, "{name}");
    }
}

#[test]
fn resigning_preserves_prior_manifest() {
    let chain = es256_chain();
    let first = sign(&test_utils::minimal_jpeg(), &chain.signer);

    // Sign again on top of the already-signed asset
    let mut asset = Asset::from_reader(Cursor::new(&first)).unwrap();
    let mut second = Vec::new();
    let store = ManifestBuilder::new("provenance-core/0.1.0")
        .add_assertion(Assertion::Actions(creation_actions()))
        .sign_and_embed(&mut asset, &chain.signer, &mut second)
        .unwrap();

    assert_eq!(store.len(), 2);
    let active = store.active_manifest().unwrap().label.clone();

    let opts = ValidationOptions {
        trust_anchors_der: vec![chain.root_der.clone()],
        allowed_algs: None,
    };
    let mut resigned = Asset::from_reader(Cursor::new(&second)).unwrap();
    let report = validate_asset(&mut resigned, &opts).unwrap();
    assert_eq!(report.active_manifest.as_deref(), Some(active.as_str()));
    assert!(
        report.passed(),
        "{:?}",
        report.failures().collect::<Vec<_>>()
    );
}

#[test]
fn manifest_store_reads_back_byte_exact() {
    let chain = es256_chain();
    let signed = sign(&test_utils::minimal_png(), &chain.signer);

    let mut asset = Asset::from_reader(Cursor::new(&signed)).unwrap();
    let store_bytes = asset.read_manifest_store().unwrap().unwrap();

    let store = provenance_core::ManifestStore::from_jumbf_bytes(&store_bytes).unwrap();
    assert_eq!(store.to_jumbf_bytes().unwrap(), store_bytes);
}

#[test]
fn signed_file_on_disk_validates() {
    let chain = es256_chain();
    let signed = sign(&test_utils::minimal_jpeg(), &chain.signer);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("signed.jpg");
    std::fs::write(&path, &signed).unwrap();

    let mut asset = Asset::open(&path).unwrap();
    let opts = ValidationOptions {
        trust_anchors_der: vec![chain.root_der.clone()],
        allowed_algs: None,
    };
    let report = validate_asset(&mut asset, &opts).unwrap();
    assert!(
        report.passed(),
        "{:?}",
        report.failures().collect::<Vec<_>>()
    );
}

#[test]
fn wrong_trust_anchor_fails_trust_but_nothing_else() {
    let chain = es256_chain();
    let stranger = es256_chain();
    let signed = sign(&test_utils::minimal_jpeg(), &chain.signer);

    let opts = ValidationOptions {
        trust_anchors_der: vec![stranger.root_der],
        allowed_algs: None,
    };
    let mut asset = Asset::from_reader(Cursor::new(&signed)).unwrap();
    let report = validate_asset(&mut asset, &opts).unwrap();

    assert!(!report.passed());
    for failure in report.failures() {
        assert_eq!(failure.code, "signingCredential.untrusted");
    }
}
