#![allow(dead_code)]

use alloy_primitives::{Address, U256};
use confidential_bridge::{
    adapters::{LocalSigner, MockBridge, MockConfidentialToken, MockNetwork, MockPlainToken},
    config::{ARB_SEPOLIA, ETH_SEPOLIA},
    ports::{ConfidentialToken, TypedDataSigner},
    AddressResolver, BalanceProvisioner, NetworkConfig,
};

pub const SENDER_KEY: &str = "0x0101010101010101010101010101010101010101010101010101010101010101";
pub const RELAYER_KEY: &str = "0x0202020202020202020202020202020202020202020202020202020202020202";

pub fn signer(key: &str) -> LocalSigner {
    LocalSigner::from_hex(key).unwrap()
}

/// Sepolia -> Arbitrum Sepolia, each side with a token pair and a bridge.
pub struct TwoChains {
    pub origin: MockNetwork,
    pub destination: MockNetwork,
    pub sender: LocalSigner,
    pub relayer: LocalSigner,
    pub receiver: Address,
    pub origin_token: MockConfidentialToken,
    pub origin_plain: MockPlainToken,
    pub origin_bridge: MockBridge,
    pub destination_token: MockConfidentialToken,
    pub destination_plain: MockPlainToken,
    pub destination_bridge: MockBridge,
}

impl TwoChains {
    pub async fn new() -> Self {
        let origin = MockNetwork::new(ETH_SEPOLIA);
        let destination = origin.on_chain(ARB_SEPOLIA);

        let (origin_token, origin_plain) =
            origin.deploy_token_pair("Confidential Sepolia TEST").await;
        let origin_bridge = origin.deploy_bridge().await;
        let (destination_token, destination_plain) =
            destination.deploy_token_pair("Confidential Arbitrum TEST").await;
        let destination_bridge = destination.deploy_bridge().await;

        Self {
            origin,
            destination,
            sender: signer(SENDER_KEY),
            relayer: signer(RELAYER_KEY),
            receiver: Address::repeat_byte(0xee),
            origin_token,
            origin_plain,
            origin_bridge,
            destination_token,
            destination_plain,
            destination_bridge,
        }
    }

    /// Give `who` a confidential balance of `amount` on the origin token.
    pub async fn fund_on_origin(&self, who: &LocalSigner, amount: u64) {
        let net = self.origin.connect(who.address());
        let fhe = net.fhe();
        let resolver = AddressResolver::new(ETH_SEPOLIA, NetworkConfig::testnets(), None);
        BalanceProvisioner::new(&net, &fhe, &resolver)
            .ensure_balance(who.address(), U256::from(amount), Some(self.origin_token.address()))
            .await
            .unwrap();
    }
}
