mod common;

use alloy_primitives::{Address, U256};
use confidential_bridge::{
    adapters::{MockNetwork, MockOp},
    config::{ContractAddresses, DeploymentRegistry, ARB_SEPOLIA},
    ports::{ConfidentialToken, PlainToken},
    AddressResolver, BalanceProvisioner, Error, NetworkConfig,
};

fn resolver(token: Option<Address>) -> AddressResolver {
    let mut config = NetworkConfig::testnets();
    if let Some(token) = token {
        for n in &mut config.networks {
            if n.chain_id == ARB_SEPOLIA {
                n.contracts = ContractAddresses {
                    confidential_token: Some(token),
                    ..Default::default()
                };
            }
        }
    }
    AddressResolver::new(ARB_SEPOLIA, config, None)
}

#[tokio::test]
async fn provisions_from_zero_then_is_a_noop() {
    let relayer = Address::repeat_byte(0x42);
    let net = MockNetwork::new(ARB_SEPOLIA).connect(relayer);
    let (token, plain) = net.deploy_token_pair("Confidential TEST").await;
    let fhe = net.fhe();
    let resolver = resolver(Some(token.address()));
    let provisioner = BalanceProvisioner::new(&net, &fhe, &resolver);

    let amount = U256::from(1000u64);
    let resolved = provisioner.ensure_balance(relayer, amount, None).await.unwrap();
    assert_eq!(resolved, token.address());

    assert_eq!(
        net.ops().await,
        vec![
            MockOp::Mint {
                token: plain.address(),
                to: relayer,
                amount,
            },
            MockOp::Approve {
                token: plain.address(),
                owner: relayer,
                spender: token.address(),
                amount,
            },
            MockOp::Wrap {
                token: token.address(),
                to: relayer,
                amount,
            },
        ]
    );
    assert_eq!(net.confidential_balance(token.address(), relayer).await, amount);

    net.clear_ops().await;
    provisioner.ensure_balance(relayer, amount, None).await.unwrap();
    assert!(net.ops().await.is_empty());
}

#[tokio::test]
async fn only_the_shortfall_is_minted_and_wrapped() {
    let relayer = Address::repeat_byte(0x42);
    let net = MockNetwork::new(ARB_SEPOLIA).connect(relayer);
    let (token, plain) = net.deploy_token_pair("Confidential TEST").await;
    let fhe = net.fhe();
    let resolver = resolver(None);
    let provisioner = BalanceProvisioner::new(&net, &fhe, &resolver);

    provisioner
        .ensure_balance(relayer, U256::from(400u64), Some(token.address()))
        .await
        .unwrap();
    // Some spare plaintext and an allowance that already covers the next wrap.
    plain.mint(relayer, U256::from(100u64)).await.unwrap();
    plain.approve(token.address(), U256::from(600u64)).await.unwrap();
    net.clear_ops().await;

    provisioner
        .ensure_balance(relayer, U256::from(1000u64), Some(token.address()))
        .await
        .unwrap();

    assert_eq!(
        net.ops().await,
        vec![
            MockOp::Mint {
                token: plain.address(),
                to: relayer,
                amount: U256::from(500u64),
            },
            MockOp::Wrap {
                token: token.address(),
                to: relayer,
                amount: U256::from(600u64),
            },
        ]
    );
    assert_eq!(net.confidential_balance(token.address(), relayer).await, U256::from(1000u64));
}

#[tokio::test]
async fn undecryptable_balance_counts_as_zero() {
    let relayer = Address::repeat_byte(0x42);
    let net = MockNetwork::new(ARB_SEPOLIA).connect(relayer);
    let (token, _) = net.deploy_token_pair("Confidential TEST").await;
    let fhe = net.fhe();
    let resolver = resolver(Some(token.address()));
    let provisioner = BalanceProvisioner::new(&net, &fhe, &resolver);

    provisioner.ensure_balance(relayer, U256::from(300u64), None).await.unwrap();
    let handle = token.confidential_balance_of(relayer).await.unwrap();
    net.set_ready(handle, false).await;
    net.clear_ops().await;

    // Already holds 300 but cannot prove it: over-provisions rather than blocking.
    provisioner.ensure_balance(relayer, U256::from(300u64), None).await.unwrap();
    let top_up = MockOp::Wrap {
        token: token.address(),
        to: relayer,
        amount: U256::from(300u64),
    };
    assert!(net.ops().await.contains(&top_up));
    assert_eq!(net.confidential_balance(token.address(), relayer).await, U256::from(600u64));
}

#[tokio::test]
async fn wraps_for_another_account_from_the_callers_funds() {
    let payer = Address::repeat_byte(0x42);
    let beneficiary = Address::repeat_byte(0x43);
    let net = MockNetwork::new(ARB_SEPOLIA).connect(payer);
    let (token, plain) = net.deploy_token_pair("Confidential TEST").await;
    let fhe = net.fhe();
    let resolver = resolver(Some(token.address()));

    BalanceProvisioner::new(&net, &fhe, &resolver)
        .ensure_balance(beneficiary, U256::from(50u64), None)
        .await
        .unwrap();

    assert_eq!(net.confidential_balance(token.address(), beneficiary).await, U256::from(50u64));
    assert_eq!(net.confidential_balance(token.address(), payer).await, U256::ZERO);
    assert_eq!(net.plain_balance(plain.address(), payer).await, U256::ZERO);
}

#[tokio::test]
async fn resolves_from_the_deployments_registry() {
    let relayer = Address::repeat_byte(0x42);
    let net = MockNetwork::new(ARB_SEPOLIA).connect(relayer);
    let (token, _) = net.deploy_token_pair("Confidential TEST").await;
    let fhe = net.fhe();

    let mut deployments = DeploymentRegistry::default();
    deployments.insert("eERC20", token.address());
    let resolver = AddressResolver::new(ARB_SEPOLIA, NetworkConfig::testnets(), Some(deployments));

    let resolved = BalanceProvisioner::new(&net, &fhe, &resolver)
        .ensure_balance(relayer, U256::from(1u64), None)
        .await
        .unwrap();
    assert_eq!(resolved, token.address());
}

#[tokio::test]
async fn missing_mint_permission_is_fatal() {
    let relayer = Address::repeat_byte(0x42);
    let net = MockNetwork::new(ARB_SEPOLIA).connect(relayer);
    let (token, plain) = net.deploy_token_pair("Confidential TEST").await;
    net.restrict_minting(plain.address()).await;
    let fhe = net.fhe();
    let resolver = resolver(Some(token.address()));

    let err = BalanceProvisioner::new(&net, &fhe, &resolver)
        .ensure_balance(relayer, U256::from(1000u64), None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::MintUnauthorized { .. }));
    assert!(!err.is_retryable());
    assert_eq!(net.confidential_balance(token.address(), relayer).await, U256::ZERO);
}

#[tokio::test]
async fn payer_without_read_access_tops_up_again() {
    let payer = Address::repeat_byte(0x42);
    let beneficiary = Address::repeat_byte(0x43);
    let net = MockNetwork::new(ARB_SEPOLIA).connect(payer);
    let (token, _) = net.deploy_token_pair("Confidential TEST").await;
    let fhe = net.fhe();
    let resolver = resolver(Some(token.address()));
    let provisioner = BalanceProvisioner::new(&net, &fhe, &resolver);

    provisioner.ensure_balance(beneficiary, U256::from(50u64), None).await.unwrap();
    net.clear_ops().await;

    // Only the beneficiary may decrypt its balance, so the payer cannot see the earlier top-up.
    provisioner.ensure_balance(beneficiary, U256::from(50u64), None).await.unwrap();
    let top_up = MockOp::Wrap {
        token: token.address(),
        to: beneficiary,
        amount: U256::from(50u64),
    };
    assert!(net.ops().await.contains(&top_up));
    assert_eq!(net.confidential_balance(token.address(), beneficiary).await, U256::from(100u64));
}

#[tokio::test]
async fn reverted_wrap_keeps_the_allowance() {
    let payer = Address::repeat_byte(0x42);
    let net = MockNetwork::new(ARB_SEPOLIA).connect(payer);
    let (token, plain) = net.deploy_token_pair("Confidential TEST").await;
    plain.approve(token.address(), U256::from(100u64)).await.unwrap();
    net.clear_ops().await;

    // Allowance is in place but there is nothing to pull.
    let err = token.wrap(payer, U256::from(100u64)).await.unwrap_err();
    assert!(err.to_string().contains("exceeds balance"));

    assert_eq!(plain.allowance(payer, token.address()).await.unwrap(), U256::from(100u64));
    assert_eq!(net.confidential_balance(token.address(), payer).await, U256::ZERO);
    assert!(net.ops().await.is_empty());
}
