//! The validation walk

use crate::{
    asset::Asset,
    cose::{verify_cose, ValidationOptions},
    crypto::{hash, HashAlgorithm},
    error::{Error, Result},
    manifest::{
        assertions::{Assertion, BmffHashAssertion, DataHashAssertion},
        parse_self_uri, HashedUri, Manifest, ManifestStore, ASSERTION_STORE_LABEL,
    },
};
use std::collections::HashSet;
use std::io::{Read, Seek};

use super::{codes, ValidationReport};

/// Validate an asset's manifest store end to end.
///
/// Depth-first from the active manifest: COSE signature, every assertion
/// hashed-URI, the data/BMFF hard bindings, the countersignature, then
/// each referenced ingredient manifest. Cryptographic failures become
/// results, never errors; only a missing or unreadable store errors out.
pub fn validate_asset<R: Read + Seek>(
    asset: &mut Asset<R>,
    opts: &ValidationOptions,
) -> Result<ValidationReport> {
    let store_bytes = asset.read_manifest_store()?.ok_or(Error::ManifestAbsent)?;
    let store = ManifestStore::from_jumbf_bytes(&store_bytes)?;
    let active = store.active_manifest().ok_or(Error::ManifestAbsent)?;

    let mut report = ValidationReport {
        results: Vec::new(),
        active_manifest: Some(active.label.clone()),
    };

    let mut visited = HashSet::new();
    validate_manifest(&mut report, &store, active, asset, opts, true, &mut visited)?;

    Ok(report)
}

#[allow(clippy::too_many_arguments)]
fn validate_manifest<R: Read + Seek>(
    report: &mut ValidationReport,
    store: &ManifestStore,
    manifest: &Manifest,
    asset: &mut Asset<R>,
    opts: &ValidationOptions,
    is_active: bool,
    visited: &mut HashSet<String>,
) -> Result<()> {
    if !visited.insert(manifest.label.clone()) {
        return Ok(());
    }
    let manifest_url = crate::manifest::store_uri(&manifest.label);

    check_signature(report, manifest, &manifest_url, opts);

    let claim_alg = manifest
        .claim
        .hash_alg()
        .unwrap_or(HashAlgorithm::Sha256);

    let all_refs: Vec<&HashedUri> = manifest
        .claim
        .assertions
        .iter()
        .chain(manifest.claim.gathered_assertions.iter())
        .collect();

    for hashed_uri in all_refs {
        check_assertion_ref(report, manifest, hashed_uri, claim_alg);
    }

    check_hard_bindings(report, manifest, asset, is_active)?;
    check_ingredients(report, store, manifest, asset, opts, visited)?;

    Ok(())
}

fn check_signature(
    report: &mut ValidationReport,
    manifest: &Manifest,
    manifest_url: &str,
    opts: &ValidationOptions,
) {
    match verify_cose(&manifest.signature_cose, &manifest.claim_raw, opts) {
        Ok(info) => {
            report.pass(
                codes::CLAIM_SIGNATURE_VALIDATED,
                Some(manifest_url.to_string()),
                format!("claim signature valid ({})", info.alg),
            );
            report.pass(
                codes::SIGNING_CREDENTIAL_TRUSTED,
                Some(manifest_url.to_string()),
                info.signer_subject.unwrap_or_default(),
            );
            match info.timestamp {
                Some(Ok(timestamp)) => report.pass(
                    codes::TIMESTAMP_TRUSTED,
                    Some(manifest_url.to_string()),
                    format!("timestamped at {}", timestamp.gen_time_unix),
                ),
                Some(Err(e)) => report.fail(
                    codes::TIMESTAMP_MISMATCH,
                    Some(manifest_url.to_string()),
                    e.to_string(),
                ),
                None => {}
            }
        }
        Err(e) => {
            let code = match &e {
                Error::CertificateChainInvalid(_) => codes::SIGNING_CREDENTIAL_UNTRUSTED,
                Error::SignatureAlgorithmDisallowed(_) | Error::UnsupportedAlgorithm(_) => {
                    codes::ALGORITHM_UNSUPPORTED
                }
                _ => codes::CLAIM_SIGNATURE_MISMATCH,
            };
            report.fail(code, Some(manifest_url.to_string()), e.to_string());
        }
    }
}

fn check_assertion_ref(
    report: &mut ValidationReport,
    manifest: &Manifest,
    hashed_uri: &HashedUri,
    claim_alg: HashAlgorithm,
) {
    let url = hashed_uri.url.clone();

    let label = parse_self_uri(&hashed_uri.url)
        .and_then(|path| path.strip_prefix(&format!("{ASSERTION_STORE_LABEL}/")));
    let Some(label) = label else {
        report.fail(
            codes::ASSERTION_MISSING,
            Some(url),
            "assertion reference is not a store-relative JUMBF URI",
        );
        return;
    };

    let Some(sbox) = manifest.assertion_box(label) else {
        report.fail(
            codes::ASSERTION_MISSING,
            Some(url),
            format!("assertion {label} not present in the assertion store"),
        );
        return;
    };

    let alg = hashed_uri
        .alg
        .as_deref()
        .and_then(|name| HashAlgorithm::from_name(name).ok())
        .unwrap_or(claim_alg);
    let digest = hash(alg, &sbox.serialize());

    if digest == hashed_uri.hash {
        report.pass(codes::ASSERTION_HASHED_URI_MATCH, Some(url), "digest matches");
    } else {
        report.fail(
            codes::ASSERTION_HASHED_URI_MISMATCH,
            Some(url),
            format!("assertion {label} bytes do not match the claim digest"),
        );
    }
}

// Hard bindings tie the claim to the asset bytes; only the active manifest
// binds the current asset state
fn check_hard_bindings<R: Read + Seek>(
    report: &mut ValidationReport,
    manifest: &Manifest,
    asset: &mut Asset<R>,
    is_active: bool,
) -> Result<()> {
    if !is_active {
        return Ok(());
    }

    if let Some(decoded) = manifest.data_hash_assertion() {
        let url = crate::manifest::self_uri(&format!(
            "{ASSERTION_STORE_LABEL}/{}",
            DataHashAssertion::LABEL
        ));
        match decoded {
            Ok(assertion) => {
                let container_exclusions = asset.data_hash_exclusions(None)?;
                let total_size = asset.structure().total_size;
                let digest = assertion.digest_asset(
                    asset.reader_mut(),
                    total_size,
                    &container_exclusions,
                );
                match digest {
                    Ok(digest) if digest == assertion.hash => {
                        report.pass(codes::ASSERTION_DATA_HASH_MATCH, Some(url), "data hash matches");
                    }
                    Ok(_) => report.fail(
                        codes::ASSERTION_DATA_HASH_MISMATCH,
                        Some(url),
                        "asset bytes do not match the declared data hash",
                    ),
                    Err(e) => report.fail(
                        codes::ASSERTION_DATA_HASH_MISMATCH,
                        Some(url),
                        e.to_string(),
                    ),
                }
            }
            Err(e) => report.fail(codes::ASSERTION_UNDECODABLE, Some(url), e.to_string()),
        }
    }

    if let Some(sbox) = manifest.assertion_box(BmffHashAssertion::LABEL) {
        let url = crate::manifest::self_uri(&format!(
            "{ASSERTION_STORE_LABEL}/{}",
            BmffHashAssertion::LABEL
        ));
        match BmffHashAssertion::from_jumbf(sbox) {
            Ok(assertion) => match assertion.digest_box_tree(asset.reader_mut()) {
                Ok(digest) if digest == assertion.hash => {
                    report.pass(codes::ASSERTION_BMFF_HASH_MATCH, Some(url), "BMFF hash matches");
                }
                Ok(_) => report.fail(
                    codes::ASSERTION_BMFF_HASH_MISMATCH,
                    Some(url),
                    "BMFF box tree does not match the declared hash",
                ),
                Err(e) => report.fail(
                    codes::ASSERTION_BMFF_HASH_MISMATCH,
                    Some(url),
                    e.to_string(),
                ),
            },
            Err(e) => report.fail(codes::ASSERTION_UNDECODABLE, Some(url), e.to_string()),
        }
    }

    Ok(())
}

fn check_ingredients<R: Read + Seek>(
    report: &mut ValidationReport,
    store: &ManifestStore,
    manifest: &Manifest,
    asset: &mut Asset<R>,
    opts: &ValidationOptions,
    visited: &mut HashSet<String>,
) -> Result<()> {
    for sbox in &manifest.assertion_boxes {
        let assertion = match Assertion::from_jumbf(sbox) {
            Ok(assertion) => assertion,
            Err(_) => continue, // recorded by the hashed-URI pass when referenced
        };
        let Assertion::Ingredient(ingredient) = assertion else {
            continue;
        };
        let Some(manifest_ref) = &ingredient.manifest_ref else {
            continue;
        };

        let url = manifest_ref.url.clone();
        let Some(referenced) = store.resolve_manifest_ref(manifest_ref) else {
            report.fail(
                codes::INGREDIENT_MANIFEST_MISSING,
                Some(url),
                format!("ingredient manifest for {} not in store", ingredient.title),
            );
            continue;
        };

        let alg = manifest_ref
            .alg
            .as_deref()
            .and_then(|name| HashAlgorithm::from_name(name).ok())
            .unwrap_or(HashAlgorithm::Sha256);
        let digest = hash(alg, &referenced.serialized_box()?);
        if digest == manifest_ref.hash {
            report.pass(
                codes::INGREDIENT_MANIFEST_VALIDATED,
                Some(url),
                format!("ingredient manifest {} bound", referenced.label),
            );
        } else {
            report.fail(
                codes::INGREDIENT_MANIFEST_MISMATCH,
                Some(url),
                format!("ingredient manifest {} bytes changed", referenced.label),
            );
        }

        validate_manifest(report, store, referenced, asset, opts, false, visited)?;
    }

    Ok(())
}
