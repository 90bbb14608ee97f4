//! Integration tests for the share-grant lifecycle, including the racing
//! redemption of a single-use grant.

use std::sync::Arc;

use rz_core::types::PrincipalId;
use rz_share::{
    create_grant, encode_share_link, parse_share_link, redeem_grant, revoke_grant, GrantOptions,
    MemoryGrantStore, ShareError,
};

fn alice() -> PrincipalId {
    PrincipalId::new("alice")
}

#[tokio::test]
async fn mint_and_redeem_via_link() {
    let store = MemoryGrantStore::new();
    let payload = b"## Shared note\n\nmeet at the usual place";

    let (grant_id, key) =
        create_grant(&store, payload, GrantOptions::default(), &alice()).await.unwrap();

    // The link is the only artifact the recipient receives.
    let link = encode_share_link("kb.example.com", &grant_id, &key);
    drop(key);

    let (parsed_id, parsed_key) = parse_share_link(&link).unwrap();
    let redeemed = redeem_grant(&store, &parsed_id, &parsed_key, 1000).await.unwrap();

    assert_eq!(redeemed, payload);
}

#[tokio::test]
async fn single_use_grant_allows_exactly_one_redemption() {
    let store = MemoryGrantStore::new();
    let opts = GrantOptions { expires_at: None, max_uses: Some(1) };

    let (grant_id, key) = create_grant(&store, b"once only", opts, &alice()).await.unwrap();

    assert_eq!(redeem_grant(&store, &grant_id, &key, 0).await.unwrap(), b"once only");

    let second = redeem_grant(&store, &grant_id, &key, 0).await;
    assert!(matches!(second, Err(ShareError::NotFound) | Err(ShareError::Exhausted)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_redemptions_spend_exactly_one_use() {
    let store = Arc::new(MemoryGrantStore::new());
    let opts = GrantOptions { expires_at: None, max_uses: Some(1) };

    let (grant_id, key) = create_grant(store.as_ref(), b"raced", opts, &alice()).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let store = store.clone();
        let key = key.clone();
        handles.push(tokio::spawn(async move {
            redeem_grant(store.as_ref(), &grant_id, &key, 0).await
        }));
    }

    let mut successes = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            successes += 1;
        }
    }

    assert_eq!(successes, 1, "atomic check-and-increment must admit exactly one redemption");
}

#[tokio::test]
async fn expired_grant_fails_before_ciphertext_leaves_the_store() {
    let store = MemoryGrantStore::new();
    let opts = GrantOptions { expires_at: Some(500), max_uses: None };

    let (grant_id, key) = create_grant(&store, b"stale", opts, &alice()).await.unwrap();

    let result = redeem_grant(&store, &grant_id, &key, 500).await;
    assert!(matches!(result, Err(ShareError::Expired)));
}

#[tokio::test]
async fn wrong_disclosure_key_is_an_integrity_failure() {
    let store = MemoryGrantStore::new();

    let (grant_id, _key) =
        create_grant(&store, b"secret", GrantOptions::default(), &alice()).await.unwrap();

    let wrong = rz_share::DisclosureKey::generate();
    let result = redeem_grant(&store, &grant_id, &wrong, 0).await;
    assert!(matches!(
        result,
        Err(ShareError::Crypto(rz_crypto::CryptoError::Integrity(_)))
    ));
}

#[tokio::test]
async fn revocation_beats_remaining_quota() {
    let store = MemoryGrantStore::new();
    let opts = GrantOptions { expires_at: None, max_uses: Some(100) };

    let (grant_id, key) = create_grant(&store, b"revocable", opts, &alice()).await.unwrap();

    revoke_grant(&store, &grant_id, &alice()).await.unwrap();

    let result = redeem_grant(&store, &grant_id, &key, 0).await;
    assert!(matches!(result, Err(ShareError::NotFound)));
}
