//! Standard security handler round trips through the writer and parser

mod common;

use common::{contains, numbered_document, page_content, page_marker};
use std::collections::BTreeSet;
use vellum_pdf::page_tree::remove_pages;
use vellum_pdf::render::page_geometry;
use vellum_pdf::{
    decrypt, encrypt, Document, EncryptionAlgorithm, EncryptionOptions, ErrorKind, Permissions,
};

const ALGORITHMS: [EncryptionAlgorithm; 4] = [
    EncryptionAlgorithm::Rc4_40,
    EncryptionAlgorithm::Rc4_128,
    EncryptionAlgorithm::Aes128,
    EncryptionAlgorithm::Aes256,
];

fn encrypted_bytes(algorithm: EncryptionAlgorithm, user: &str, owner: &str) -> Vec<u8> {
    let mut doc = numbered_document(2);
    encrypt(
        &mut doc,
        user,
        owner,
        &Permissions::all().with_copy(false),
        &EncryptionOptions::new(algorithm),
    )
    .unwrap();
    doc.write().unwrap()
}

#[test]
fn test_round_trip_with_user_password() {
    for algorithm in ALGORITHMS {
        let bytes = encrypted_bytes(algorithm, "user", "owner");
        assert!(contains(&bytes, b"/Encrypt"), "{algorithm:?}");
        assert!(!contains(&bytes, &page_marker(0)), "{algorithm:?} left content in clear");

        let mut doc = Document::parse(&bytes).unwrap();
        assert!(doc.is_locked());
        let info = doc.security_info().unwrap();
        assert!(info.locked);
        let err = page_geometry(&doc, 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DocumentLocked);

        decrypt(&mut doc, "user").unwrap();
        assert!(!doc.is_encrypted());
        assert_eq!(page_content(&doc, 0), page_marker(0));
        assert_eq!(page_content(&doc, 1), page_marker(1));
        assert_eq!(doc.summary().title.as_deref(), Some("Numbered"));
    }
}

#[test]
fn test_owner_password_also_opens() {
    for algorithm in ALGORITHMS {
        let bytes = encrypted_bytes(algorithm, "user", "owner");
        let mut doc = Document::parse(&bytes).unwrap();
        decrypt(&mut doc, "owner").unwrap();
        assert_eq!(page_content(&doc, 1), page_marker(1), "{algorithm:?}");
    }
}

#[test]
fn test_wrong_password_leaves_document_locked() {
    for algorithm in ALGORITHMS {
        let bytes = encrypted_bytes(algorithm, "user", "owner");
        let mut doc = Document::parse(&bytes).unwrap();
        let before = doc.objects().clone();

        let err = decrypt(&mut doc, "guess").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IncorrectPassword, "{algorithm:?}");
        assert!(doc.is_locked());
        assert_eq!(doc.objects(), &before);
    }
}

#[test]
fn test_empty_user_password_opens_automatically() {
    for algorithm in ALGORITHMS {
        let bytes = encrypted_bytes(algorithm, "", "owner");
        let doc = Document::parse(&bytes).unwrap();
        assert!(doc.is_encrypted());
        assert!(!doc.is_locked());
        assert_eq!(page_content(&doc, 0), page_marker(0));

        // Writing keeps the protection
        let again = doc.write().unwrap();
        assert!(contains(&again, b"/Encrypt"));
        let reopened = Document::parse(&again).unwrap();
        assert_eq!(page_content(&reopened, 1), page_marker(1));
        assert!(!reopened.security_info().unwrap().permissions.copy);
    }
}

#[test]
fn test_decrypted_document_writes_in_clear() {
    let bytes = encrypted_bytes(EncryptionAlgorithm::Aes256, "user", "owner");
    let mut doc = Document::parse(&bytes).unwrap();
    decrypt(&mut doc, "user").unwrap();

    let clear = doc.write().unwrap();
    assert!(!contains(&clear, b"/Encrypt"));
    let reopened = Document::parse(&clear).unwrap();
    assert!(!reopened.is_encrypted());
    assert_eq!(reopened.page_count().unwrap(), 2);
}

#[test]
fn test_locked_document_rejects_edits() {
    let bytes = encrypted_bytes(EncryptionAlgorithm::Aes128, "user", "owner");
    let mut doc = Document::parse(&bytes).unwrap();
    let err = remove_pages(&mut doc, &BTreeSet::from([0])).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DocumentLocked);

    let err = encrypt(
        &mut doc,
        "a",
        "b",
        &Permissions::all(),
        &EncryptionOptions::default(),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DocumentLocked);
}

#[test]
fn test_not_encrypted() {
    let mut doc = numbered_document(1);
    assert!(decrypt(&mut doc, "anything").is_err());
    assert!(doc.security_info().is_none());
}
