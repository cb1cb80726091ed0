mod common;

use std::time::Duration;

use alloy_primitives::{Address, U256};
use common::TwoChains;
use confidential_bridge::{
    adapters::MockConfidentialToken,
    ports::{ConfidentialToken, ContractFactory, PlainToken, TypedDataSigner},
    ClaimManager, Error, UnwrapOptions,
};
use fhe_bridge_types::{Claim, ClaimStatus};

const NO_AUTO_CLAIM: UnwrapOptions = UnwrapOptions {
    auto_claim: false,
    settle_delay: Duration::ZERO,
};

async fn funded_holder(world: &TwoChains) -> MockConfidentialToken {
    world.fund_on_origin(&world.sender, 1000).await;
    world
        .origin
        .connect(world.sender.address())
        .confidential_token(world.origin_token.address())
}

#[tokio::test]
async fn claim_one_follows_the_claim_state_machine() {
    let world = TwoChains::new().await;
    let token = funded_holder(&world).await;
    let holder = world.sender.address();
    let claims = ClaimManager::new(&token);

    claims.unwrap(holder, U256::from(250u64), NO_AUTO_CLAIM).await.unwrap();
    let pending = claims.claims(holder).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].status(), ClaimStatus::Pending);
    let ct_hash = pending[0].ct_hash;

    let err = claims.claim_one(ct_hash).await.unwrap_err();
    assert!(matches!(err, Error::ClaimNotDecrypted { .. }));

    world.origin.decrypt_claims(token.address()).await;
    let claimed = claims.claim_one(ct_hash).await.unwrap();
    assert!(claimed.claimed);
    assert_eq!(claimed.decrypted_amount, U256::from(250u64));
    assert_eq!(world.origin_plain.balance_of(holder).await.unwrap(), U256::from(250u64));

    let err = claims.claim_one(ct_hash).await.unwrap_err();
    assert!(matches!(err, Error::ClaimAlreadyClaimed { .. }));

    let err = claims.claim_one(U256::from(12345u64)).await.unwrap_err();
    assert!(matches!(err, Error::ClaimNotFound { .. }));
}

#[tokio::test]
async fn claim_all_reports_ready_and_pending() {
    let world = TwoChains::new().await;
    let token = funded_holder(&world).await;
    let holder = world.sender.address();
    let claims = ClaimManager::new(&token);

    claims.unwrap(holder, U256::from(100u64), NO_AUTO_CLAIM).await.unwrap();
    claims.unwrap(holder, U256::from(200u64), NO_AUTO_CLAIM).await.unwrap();

    let report = claims.claim_all(holder).await.unwrap();
    assert_eq!((report.ready, report.pending), (0, 2));
    assert_eq!(report.claimed_amount, U256::ZERO);
    assert!(report.receipt.is_none());

    world.origin.decrypt_claims(token.address()).await;
    claims.unwrap(holder, U256::from(50u64), NO_AUTO_CLAIM).await.unwrap();

    let report = claims.claim_all(holder).await.unwrap();
    assert_eq!((report.ready, report.pending), (2, 1));
    assert_eq!(report.claimed_amount, U256::from(300u64));
    assert!(report.receipt.is_some());
    assert_eq!(world.origin_plain.balance_of(holder).await.unwrap(), U256::from(300u64));
}

#[tokio::test]
async fn claim_all_only_for_the_caller() {
    let world = TwoChains::new().await;
    let token = funded_holder(&world).await;
    let err = ClaimManager::new(&token)
        .claim_all(Address::repeat_byte(0x99))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::SignerMismatch { .. }));
}

#[tokio::test]
async fn unwrap_can_claim_automatically() {
    let world = TwoChains::new().await;
    let token = funded_holder(&world).await;
    let holder = world.sender.address();
    world.origin.set_claims_decrypt_instantly(true).await;

    let options = UnwrapOptions {
        settle_delay: Duration::from_millis(10),
        ..UnwrapOptions::default()
    };
    let outcome = ClaimManager::new(&token)
        .unwrap(holder, U256::from(400u64), options)
        .await
        .unwrap();

    let report = outcome.claims.unwrap();
    assert_eq!(report.ready, 1);
    assert_eq!(report.claimed_amount, U256::from(400u64));
    assert_eq!(
        world.origin.confidential_balance(token.address(), holder).await,
        U256::from(600u64)
    );
    assert_eq!(world.origin_plain.balance_of(holder).await.unwrap(), U256::from(400u64));
}

#[tokio::test]
async fn unwrapping_to_someone_else_leaves_the_claim_to_them() {
    let world = TwoChains::new().await;
    let token = funded_holder(&world).await;
    world.origin.set_claims_decrypt_instantly(true).await;

    let outcome = ClaimManager::new(&token)
        .unwrap(world.receiver, U256::from(10u64), UnwrapOptions::default())
        .await
        .unwrap();
    assert!(outcome.claims.is_none());

    let theirs = world
        .origin
        .connect(world.receiver)
        .confidential_token(token.address());
    let report = ClaimManager::new(&theirs).claim_all(world.receiver).await.unwrap();
    assert_eq!(report.claimed_amount, U256::from(10u64));
}

#[tokio::test]
async fn zero_unwrap_is_rejected() {
    let world = TwoChains::new().await;
    let token = funded_holder(&world).await;
    let err = ClaimManager::new(&token)
        .unwrap(world.sender.address(), U256::ZERO, NO_AUTO_CLAIM)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ZeroAmount));
}

#[tokio::test]
async fn claimed_but_undecrypted_entry_is_refused() {
    let world = TwoChains::new().await;
    let token = funded_holder(&world).await;
    let holder = world.sender.address();
    let ct_hash = U256::from(0xc1a1u64);
    world
        .origin
        .insert_claim(
            token.address(),
            Claim {
                ct_hash,
                to: holder,
                requested_amount: U256::from(5u64),
                claimed: true,
                ..Default::default()
            },
        )
        .await;
    world.origin.clear_ops().await;

    let claims = ClaimManager::new(&token);
    assert_eq!(claims.claims(holder).await.unwrap()[0].status(), ClaimStatus::Inconsistent);
    let err = claims.claim_one(ct_hash).await.unwrap_err();
    assert!(matches!(err, Error::ClaimInconsistent { ct_hash: failed } if failed == ct_hash));

    let report = claims.claim_all(holder).await.unwrap();
    assert_eq!((report.ready, report.pending), (0, 0));
    assert!(report.receipt.is_none());
    assert!(world.origin.ops().await.is_empty());
}
