//! Intent Lifecycle Manager: create on the origin chain, export the unsealed output amount,
//! fulfil on the destination chain.
//!
//! `Created -> Exported -> Fulfilled`, one direction only. An intent that is never fulfilled stays
//! pending on-chain; its timeout is for refund handling elsewhere.

use alloy_primitives::{Address, U256};
use fhe_bridge_types::{BridgeIntent, CiphertextHandle, FheType};
use tracing::{debug, info, warn};

use crate::{
    artifact::IntentArtifact,
    config::{default_destination_chain, AddressResolver, ContractKey, NetworkConfig},
    errors::{Error, Result},
    permit::{PermitBuilder, PermitRequest},
    ports::{
        BridgeContract, BridgeRequest, ConfidentialToken, ContractFactory, FheBackend, IntentOutbox,
        TxReceipt, TypedDataSigner,
    },
    provisioner::BalanceProvisioner,
};

/// What the sender commits to when creating an intent.
#[derive(Debug, Clone)]
pub struct IntentParams {
    pub receiver: Address,
    pub relayer: Address,
    /// Resolved from the destination network's confidential token when `None`.
    pub output_token: Option<Address>,
    pub input_amount: U256,
    pub output_amount: U256,
    /// The origin chain's default peer when `None`.
    pub destination_chain_id: Option<u32>,
}

impl IntentParams {
    pub fn new(
        receiver: Address,
        relayer: Address,
        input_amount: U256,
        output_amount: U256,
    ) -> Self {
        Self {
            receiver,
            relayer,
            output_token: None,
            input_amount,
            output_amount,
            destination_chain_id: None,
        }
    }
}

/// How the relayer rebinds the committed output handle for the destination permit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FulfillOptions {
    pub security_zone: i8,
    pub uint_type: u8,
}

impl Default for FulfillOptions {
    fn default() -> Self {
        Self {
            security_zone: 0,
            uint_type: FheType::Uint128.as_u8(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentStage {
    Created,
    Exported,
    Fulfilled,
}

pub struct IntentManager<'a, B, F, S> {
    bridge: &'a B,
    fhe: &'a F,
    signer: &'a S,
    network: NetworkConfig,
}

impl<'a, B: BridgeContract, F: FheBackend, S: TypedDataSigner> IntentManager<'a, B, F, S> {
    /// Routes intents over the built-in testnets; see [`Self::with_network`].
    pub fn new(bridge: &'a B, fhe: &'a F, signer: &'a S) -> Self {
        Self {
            bridge,
            fhe,
            signer,
            network: NetworkConfig::testnets(),
        }
    }

    /// Network definitions used to default the destination chain and output token.
    pub fn with_network(mut self, network: NetworkConfig) -> Self {
        self.network = network;
        self
    }

    /// Encrypt the amounts and destination, sign a permit for the bridge and submit the intent.
    pub async fn create<T: ConfidentialToken>(
        &self,
        input_token: &T,
        params: IntentParams,
    ) -> Result<U256> {
        if params.input_amount.is_zero() || params.output_amount.is_zero() {
            return Err(Error::ZeroAmount);
        }
        let (destination, output_token) = self.route(&params)?;
        let sender = self.signer.address();

        self.fhe.initialize(self.bridge.chain_id(), sender).await?;
        let input_amount = self.fhe.encrypt(params.input_amount, FheType::Uint64).await?;
        let output_amount = self.fhe.encrypt(params.output_amount, FheType::Uint64).await?;
        let destination_chain_id = self
            .fhe
            .encrypt(U256::from(destination), FheType::Uint32)
            .await?;

        let permit = PermitBuilder::new(input_token, self.signer)
            .build(PermitRequest::new(sender, self.bridge.address(), input_amount.handle()))
            .await?;

        let request = BridgeRequest {
            sender,
            receiver: params.receiver,
            relayer: params.relayer,
            input_token: input_token.address(),
            output_token,
            input_amount,
            output_amount,
            destination_chain_id,
            permit,
        };
        let submission = self.bridge.bridge(&request).await?;

        info!(
            intent_id = %submission.intent_id,
            %sender,
            relayer = %params.relayer,
            destination,
            %output_token,
            tx = %submission.receipt.tx_hash,
            "intent created"
        );
        Ok(submission.intent_id)
    }

    /// Destination chain and output token, filling in whatever the caller left out.
    fn route(&self, params: &IntentParams) -> Result<(u32, Address)> {
        let destination = params
            .destination_chain_id
            .map(u64::from)
            .unwrap_or_else(|| default_destination_chain(self.bridge.chain_id()));
        self.network.require(destination)?;
        let output_token = AddressResolver::new(destination, self.network.clone(), None)
            .resolve(ContractKey::ConfidentialToken, params.output_token)?;
        let destination =
            u32::try_from(destination).map_err(|_| Error::ChainNotConfigured(destination))?;
        debug!(destination, %output_token, "routed intent");
        Ok((destination, output_token))
    }

    /// Unseal the committed output amount and publish the intent for fulfilment.
    ///
    /// Nothing is published on failure. A [`Error::DecryptionPending`] is retryable by calling
    /// `export` again later.
    pub async fn export<O: IntentOutbox>(
        &self,
        intent_id: U256,
        outbox: &O,
    ) -> Result<IntentArtifact> {
        let intent = self.load(intent_id).await?;
        if intent.is_filled() {
            return Err(Error::AlreadyFilled { id: intent_id });
        }

        self.fhe.initialize(self.bridge.chain_id(), self.signer.address()).await?;
        let plain_output_amount = self
            .fhe
            .unseal(intent.output_amount, FheType::Uint128)
            .await
            .map_err(|err| {
                if err.is_retryable() {
                    warn!(%intent_id, error = %err, "output amount not decryptable yet");
                }
                Error::from_unseal(intent.output_amount, err)
            })?;
        debug!(%intent_id, amount = %plain_output_amount, "unsealed output amount");

        let artifact = IntentArtifact {
            intent,
            plain_output_amount,
        };
        outbox.publish(&artifact).await?;
        info!(%intent_id, "intent exported");
        Ok(artifact)
    }

    /// Fulfil an exported intent on this (destination) bridge from the signer's balance.
    ///
    /// The artifact is checked against the intent recorded on `origin` first. The signer must be
    /// the intent's relayer and already hold the output amount; see
    /// [`Self::fulfill_with_provisioning`].
    pub async fn fulfill<O: BridgeContract, T: ConfidentialToken>(
        &self,
        origin: &O,
        output_token: &T,
        artifact: &IntentArtifact,
        options: FulfillOptions,
    ) -> Result<TxReceipt> {
        let value_hash = self.preflight(origin, output_token, artifact, options).await?;
        self.submit_fulfillment(output_token, artifact, value_hash).await
    }

    /// Ensure the relayer holds the exported amount in the output token, then fulfil.
    ///
    /// Nothing is minted or wrapped for an artifact that fails its checks.
    pub async fn fulfill_with_provisioning<C, P, O, T>(
        &self,
        provisioner: &BalanceProvisioner<'_, C, P>,
        origin: &O,
        output_token: &T,
        artifact: &IntentArtifact,
        options: FulfillOptions,
    ) -> Result<TxReceipt>
    where
        C: ContractFactory,
        P: FheBackend,
        O: BridgeContract,
        T: ConfidentialToken,
    {
        let value_hash = self.preflight(origin, output_token, artifact, options).await?;
        provisioner
            .ensure_balance(
                artifact.intent.relayer,
                artifact.plain_output_amount,
                Some(output_token.address()),
            )
            .await?;
        self.submit_fulfillment(output_token, artifact, value_hash).await
    }

    /// Every fulfilment check that needs no transaction; returns the handle the permit commits to.
    async fn preflight<O: BridgeContract, T: ConfidentialToken>(
        &self,
        origin: &O,
        output_token: &T,
        artifact: &IntentArtifact,
        options: FulfillOptions,
    ) -> Result<CiphertextHandle> {
        let intent = &artifact.intent;
        let relayer = self.signer.address();
        if relayer != intent.relayer {
            return Err(Error::SignerMismatch {
                signer: relayer,
                expected: intent.relayer,
            });
        }
        let chain_id = self.bridge.chain_id();
        if chain_id != u64::from(intent.destination_chain_id) {
            return Err(Error::ChainMismatch {
                expected: u64::from(intent.destination_chain_id),
                found: chain_id,
            });
        }
        if output_token.address() != intent.output_token {
            return Err(Error::AddressMismatch {
                what: "output token",
                expected: intent.output_token,
                found: output_token.address(),
            });
        }
        if intent.is_filled() {
            return Err(Error::AlreadyFilled { id: intent.id });
        }
        let filled_here = self
            .bridge
            .get_intent(intent.id)
            .await?
            .is_some_and(|r| {
                r.exists() && r.origin_chain_id == intent.origin_chain_id && r.is_filled()
            });
        if filled_here {
            return Err(Error::AlreadyFilled { id: intent.id });
        }

        verify_artifact(origin, artifact).await?;
        fulfillment_value_hash(intent, options)
    }

    async fn submit_fulfillment<T: ConfidentialToken>(
        &self,
        output_token: &T,
        artifact: &IntentArtifact,
        value_hash: CiphertextHandle,
    ) -> Result<TxReceipt> {
        let intent = &artifact.intent;
        let permit = PermitBuilder::new(output_token, self.signer)
            .build(PermitRequest::new(intent.relayer, self.bridge.address(), value_hash))
            .await?;

        let receipt = self.bridge.fulfill(intent, &permit).await.map_err(|err| {
            if err.is_idempotent_noop() {
                Error::AlreadyFilled { id: intent.id }
            } else {
                Error::Chain(err)
            }
        })?;
        info!(
            intent_id = %intent.id,
            receiver = %intent.receiver,
            tx = %receipt.tx_hash,
            "intent fulfilled"
        );
        Ok(receipt)
    }

    /// Stage as seen by this bridge and the outbox.
    pub async fn status<O: IntentOutbox>(
        &self,
        intent_id: U256,
        outbox: &O,
    ) -> Result<IntentStage> {
        let intent = self.load(intent_id).await?;
        if intent.is_filled() {
            return Ok(IntentStage::Fulfilled);
        }
        Ok(match outbox.fetch(intent_id).await? {
            Some(_) => IntentStage::Exported,
            None => IntentStage::Created,
        })
    }

    async fn load(&self, intent_id: U256) -> Result<BridgeIntent> {
        let intent = self
            .bridge
            .get_intent(intent_id)
            .await?
            .filter(BridgeIntent::exists)
            .ok_or(Error::IntentNotFound { id: intent_id })?;
        debug!(%intent_id, filled = intent.is_filled(), "loaded intent");
        Ok(intent)
    }
}

/// Check an artifact against the intent recorded on its origin bridge.
///
/// The committed output handle must be the recorded one and the intent still open; any other
/// edited field is reported as [`Error::ArtifactMismatch`].
pub async fn verify_artifact<O: BridgeContract>(
    origin: &O,
    artifact: &IntentArtifact,
) -> Result<()> {
    let intent = &artifact.intent;
    let origin_chain_id = origin.chain_id();
    if origin_chain_id != u64::from(intent.origin_chain_id) {
        return Err(Error::ChainMismatch {
            expected: u64::from(intent.origin_chain_id),
            found: origin_chain_id,
        });
    }
    let recorded = origin
        .get_intent(intent.id)
        .await?
        .filter(BridgeIntent::exists)
        .ok_or(Error::IntentNotFound { id: intent.id })?;
    if recorded.is_filled() {
        return Err(Error::AlreadyFilled { id: intent.id });
    }
    if recorded.output_amount != intent.output_amount {
        return Err(Error::HandleMismatch {
            expected: recorded.output_amount,
            found: intent.output_amount,
        });
    }
    if recorded != *intent {
        return Err(Error::ArtifactMismatch { id: intent.id });
    }
    debug!(intent_id = %intent.id, origin = origin_chain_id, "artifact matches the origin record");
    Ok(())
}

/// The committed output handle re-bound with the metadata the destination token verifies.
///
/// Only the metadata bytes change; the pre-image is the one recorded on the origin chain.
pub fn fulfillment_value_hash(
    intent: &BridgeIntent,
    options: FulfillOptions,
) -> Result<CiphertextHandle> {
    if options.uint_type > 0x7f {
        return Err(Error::UintTypeOutOfRange(options.uint_type));
    }
    Ok(intent
        .output_amount
        .with_metadata(options.security_zone, options.uint_type, false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use fhe_bridge_types::FilledStatus;

    fn intent(output_amount: CiphertextHandle) -> BridgeIntent {
        BridgeIntent {
            sender: Address::repeat_byte(1),
            receiver: Address::repeat_byte(2),
            relayer: Address::repeat_byte(3),
            input_token: Address::repeat_byte(4),
            output_token: Address::repeat_byte(5),
            input_amount: CiphertextHandle::ZERO,
            output_amount,
            id: U256::from(1u64),
            origin_chain_id: 11_155_111,
            destination_chain_id: 421_614,
            filled_status: FilledStatus::Pending,
            solver_paid: false,
            timeout: U256::ZERO,
        }
    }

    #[test]
    fn value_hash_keeps_the_committed_preimage() {
        let committed = CiphertextHandle::pack(
            U256::from(0xfeed_0000_0000u64),
            3,
            FheType::Uint64.as_u8(),
            false,
        );
        let hash = fulfillment_value_hash(&intent(committed), FulfillOptions::default()).unwrap();

        assert_eq!(hash.preimage(), committed.preimage());
        assert_eq!(hash.security_zone(), 0);
        assert_eq!(hash.fhe_type(), Some(FheType::Uint128));
        assert!(!hash.is_trivial());
    }

    #[test]
    fn uint_type_beyond_seven_bits_is_rejected() {
        let options = FulfillOptions {
            security_zone: 0,
            uint_type: 0x80,
        };
        assert!(matches!(
            fulfillment_value_hash(&intent(CiphertextHandle::ZERO), options),
            Err(Error::UintTypeOutOfRange(0x80))
        ));
    }
}
