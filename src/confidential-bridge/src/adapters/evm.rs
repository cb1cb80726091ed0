//! JSON-RPC adapters: ethers for transport and signing transactions, alloy `sol!` for the ABI.

use std::sync::Arc;

use alloy_primitives::{aliases::U48, Address, Bytes as AlloyBytes, B256, U256};
use alloy_sol_types::{sol, SolCall, SolEvent};
use ethers::{
    middleware::SignerMiddleware,
    providers::{Http, Middleware, Provider},
    signers::{LocalWallet, Signer},
    types::{transaction::eip2718::TypedTransaction, Bytes, TransactionRequest, H160},
};
use fhe_bridge_types::{
    BridgeIntent, CiphertextHandle, Claim, Eip712Domain, EncryptedInput, FilledStatus,
    TransferPermit,
};
use tracing::debug;

use crate::ports::{
    BridgeContract, BridgeRequest, BridgeSubmission, ChainError, ConfidentialToken, ContractFactory,
    PlainToken, TxReceipt,
};

sol! {
    struct InEuint {
        uint256 ctHash;
        uint8 securityZone;
        uint8 utype;
        bytes signature;
    }

    /// On-chain permit; the nonce is read by the contract, not passed.
    struct Permit {
        address owner;
        address spender;
        uint256 value_hash;
        uint256 deadline;
        uint8 v;
        bytes32 r;
        bytes32 s;
    }

    struct Intent {
        address sender;
        address receiver;
        address relayer;
        address inputToken;
        address outputToken;
        uint256 inputAmount;
        uint256 outputAmount;
        uint256 id;
        uint32 originChainId;
        uint32 destinationChainId;
        uint8 filledStatus;
        bool solverPaid;
        uint256 timeout;
    }

    struct UnwrapClaim {
        address to;
        uint256 ctHash;
        uint64 requestedAmount;
        uint64 decryptedAmount;
        bool decrypted;
        bool claimed;
    }

    interface IConfidentialToken {
        function balanceOf(address account) external view returns (uint256);
        function encBalanceOf(address account) external view returns (uint256);
        function nonces(address owner) external view returns (uint256);
        function eip712Domain() external view returns (
            bytes1 fields,
            string name,
            string version,
            uint256 chainId,
            address verifyingContract,
            bytes32 salt,
            uint256[] extensions
        );
        function erc20() external view returns (address);
        function wrap(address to, uint64 value) external;
        function unwrap(address to, uint64 value) external;
        function confidentialTransferFrom(address from, address to, InEuint value)
            external
            returns (uint256);
        function encTransferFrom(address from, address to, InEuint value, Permit permit)
            external
            returns (uint256);
        function getUserClaims(address user) external view returns (UnwrapClaim[]);
        function getClaim(uint256 ctHash) external view returns (UnwrapClaim);
        function claimUnwrapped(uint256 ctHash) external;
        function claimAllUnwrapped() external;
        function isOperator(address holder, address spender) external view returns (bool);
        function setOperator(address operator, uint48 until) external;
    }

    interface IPlainToken {
        function balanceOf(address account) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 value) external returns (bool);
        function mint(address to, uint256 amount) external;
    }

    interface IFhenixBridge {
        event IntentCreated(Intent intent);

        function bridge(
            address sender,
            address receiver,
            address relayer,
            address inputToken,
            address outputToken,
            InEuint inputAmount,
            InEuint outputAmount,
            InEuint destinationChainId,
            Permit permit
        ) external;
        function getIntent(uint256 id) external view returns (Intent);
        function fulfill(Intent intent, Permit permit) external;
    }
}

type Client = SignerMiddleware<Provider<Http>, LocalWallet>;

fn to_h160(address: Address) -> H160 {
    H160::from_slice(address.as_slice())
}

fn from_h160(address: H160) -> Address {
    Address::from(address.0)
}

fn to_u64(value: U256, what: &str) -> Result<u64, ChainError> {
    u64::try_from(value)
        .map_err(|_| ChainError::InvalidArgument(format!("{what} {value} does not fit uint64")))
}

fn classify(err: impl std::fmt::Display) -> ChainError {
    let message = err.to_string();
    if message.contains("revert") {
        ChainError::Reverted(message)
    } else {
        ChainError::Rpc(message)
    }
}

fn in_euint(input: &EncryptedInput) -> InEuint {
    InEuint {
        ctHash: input.ct_hash,
        securityZone: input.security_zone,
        utype: input.utype.as_u8(),
        signature: AlloyBytes::from(input.signature.clone()),
    }
}

fn permit_tuple(permit: &TransferPermit) -> Permit {
    Permit {
        owner: permit.owner,
        spender: permit.spender,
        value_hash: permit.value_hash.into_raw(),
        deadline: permit.deadline,
        v: permit.signature.v,
        r: permit.signature.r,
        s: permit.signature.s,
    }
}

fn intent_tuple(intent: &BridgeIntent) -> Intent {
    Intent {
        sender: intent.sender,
        receiver: intent.receiver,
        relayer: intent.relayer,
        inputToken: intent.input_token,
        outputToken: intent.output_token,
        inputAmount: intent.input_amount.into_raw(),
        outputAmount: intent.output_amount.into_raw(),
        id: intent.id,
        originChainId: intent.origin_chain_id,
        destinationChainId: intent.destination_chain_id,
        filledStatus: intent.filled_status as u8,
        solverPaid: intent.solver_paid,
        timeout: intent.timeout,
    }
}

fn intent_from_tuple(raw: Intent) -> Result<BridgeIntent, ChainError> {
    let filled_status = FilledStatus::try_from(raw.filledStatus)
        .map_err(|status| ChainError::Decode(format!("unknown filled status {status}")))?;
    Ok(BridgeIntent {
        sender: raw.sender,
        receiver: raw.receiver,
        relayer: raw.relayer,
        input_token: raw.inputToken,
        output_token: raw.outputToken,
        input_amount: CiphertextHandle::from_raw(raw.inputAmount),
        output_amount: CiphertextHandle::from_raw(raw.outputAmount),
        id: raw.id,
        origin_chain_id: raw.originChainId,
        destination_chain_id: raw.destinationChainId,
        filled_status,
        solver_paid: raw.solverPaid,
        timeout: raw.timeout,
    })
}

fn claim_from_tuple(raw: UnwrapClaim) -> Claim {
    Claim {
        ct_hash: raw.ctHash,
        to: raw.to,
        requested_amount: U256::from(raw.requestedAmount),
        decrypted_amount: U256::from(raw.decryptedAmount),
        decrypted: raw.decrypted,
        claimed: raw.claimed,
    }
}

/// Signing JSON-RPC client for one chain.
#[derive(Clone)]
pub struct EvmClient {
    client: Arc<Client>,
    chain_id: u64,
    sender: Address,
}

impl EvmClient {
    pub async fn connect(rpc_url: &str, private_key: &str) -> Result<Self, ChainError> {
        let provider = Provider::<Http>::try_from(rpc_url)
            .map_err(|e| ChainError::InvalidArgument(format!("invalid RPC URL: {e}")))?;
        let chain_id = provider.get_chainid().await.map_err(classify)?.as_u64();

        let key = private_key.trim();
        let wallet: LocalWallet = key
            .strip_prefix("0x")
            .unwrap_or(key)
            .parse()
            .map_err(|e| ChainError::InvalidArgument(format!("invalid private key: {e}")))?;
        let wallet = wallet.with_chain_id(chain_id);
        let sender = from_h160(wallet.address());

        debug!(%sender, chain_id, "connected JSON-RPC client");
        Ok(Self {
            client: Arc::new(SignerMiddleware::new(provider, wallet)),
            chain_id,
            sender,
        })
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn sender(&self) -> Address {
        self.sender
    }

    async fn call<C: SolCall>(&self, to: Address, call: C) -> Result<C::Return, ChainError> {
        let tx: TypedTransaction = TransactionRequest::new()
            .from(to_h160(self.sender))
            .to(to_h160(to))
            .data(Bytes::from(call.abi_encode()))
            .into();
        let raw = self.client.call(&tx, None).await.map_err(classify)?;
        C::abi_decode_returns(&raw, true).map_err(|e| ChainError::Decode(e.to_string()))
    }

    /// Send and wait for inclusion. Returns the receipt's logs alongside.
    async fn send<C: SolCall>(
        &self,
        to: Address,
        call: C,
    ) -> Result<(TxReceipt, Vec<ethers::types::Log>), ChainError> {
        let tx = TransactionRequest::new()
            .to(to_h160(to))
            .data(Bytes::from(call.abi_encode()));
        let pending = self.client.send_transaction(tx, None).await.map_err(classify)?;
        let tx_hash = B256::from(pending.tx_hash().0);
        let receipt = pending.await.map_err(classify)?.ok_or(ChainError::Dropped(tx_hash))?;

        if receipt.status.map(|s| s.as_u64()) != Some(1) {
            return Err(ChainError::Reverted(format!("transaction {tx_hash} reverted")));
        }
        Ok((
            TxReceipt {
                tx_hash,
                block_number: receipt.block_number.map(|n| n.as_u64()),
            },
            receipt.logs,
        ))
    }
}

impl ContractFactory for EvmClient {
    type Confidential = EvmConfidentialToken;
    type Plain = EvmPlainToken;

    fn sender(&self) -> Address {
        self.sender
    }

    fn confidential_token(&self, address: Address) -> EvmConfidentialToken {
        EvmConfidentialToken {
            client: self.clone(),
            address,
        }
    }

    fn plain_token(&self, address: Address) -> EvmPlainToken {
        EvmPlainToken {
            client: self.clone(),
            address,
        }
    }
}

#[derive(Clone)]
pub struct EvmConfidentialToken {
    client: EvmClient,
    address: Address,
}

impl ConfidentialToken for EvmConfidentialToken {
    fn address(&self) -> Address {
        self.address
    }

    fn caller(&self) -> Address {
        self.client.sender
    }

    async fn balance_of(&self, account: Address) -> Result<U256, ChainError> {
        let ret = self
            .client
            .call(self.address, IConfidentialToken::balanceOfCall { account })
            .await?;
        Ok(ret._0)
    }

    async fn confidential_balance_of(
        &self,
        account: Address,
    ) -> Result<CiphertextHandle, ChainError> {
        let ret = self
            .client
            .call(self.address, IConfidentialToken::encBalanceOfCall { account })
            .await?;
        Ok(CiphertextHandle::from_raw(ret._0))
    }

    async fn nonces(&self, owner: Address) -> Result<U256, ChainError> {
        let ret = self
            .client
            .call(self.address, IConfidentialToken::noncesCall { owner })
            .await?;
        Ok(ret._0)
    }

    async fn eip712_domain(&self) -> Result<Eip712Domain, ChainError> {
        let ret = self
            .client
            .call(self.address, IConfidentialToken::eip712DomainCall {})
            .await?;
        Ok(Eip712Domain {
            name: ret.name,
            version: ret.version,
            chain_id: ret.chainId,
            verifying_contract: ret.verifyingContract,
        })
    }

    async fn underlying(&self) -> Result<Address, ChainError> {
        let ret = self
            .client
            .call(self.address, IConfidentialToken::erc20Call {})
            .await?;
        Ok(ret._0)
    }

    async fn wrap(&self, to: Address, amount: U256) -> Result<TxReceipt, ChainError> {
        let value = to_u64(amount, "wrap amount")?;
        let (receipt, _) = self
            .client
            .send(self.address, IConfidentialToken::wrapCall { to, value })
            .await?;
        Ok(receipt)
    }

    async fn unwrap(&self, to: Address, amount: U256) -> Result<TxReceipt, ChainError> {
        let value = to_u64(amount, "unwrap amount")?;
        let (receipt, _) = self
            .client
            .send(self.address, IConfidentialToken::unwrapCall { to, value })
            .await?;
        Ok(receipt)
    }

    async fn confidential_transfer_from(
        &self,
        owner: Address,
        to: Address,
        value: &EncryptedInput,
        permit: Option<&TransferPermit>,
    ) -> Result<TxReceipt, ChainError> {
        let (receipt, _) = match permit {
            Some(permit) => {
                let call = IConfidentialToken::encTransferFromCall {
                    from: owner,
                    to,
                    value: in_euint(value),
                    permit: permit_tuple(permit),
                };
                self.client.send(self.address, call).await?
            }
            None => {
                let call = IConfidentialToken::confidentialTransferFromCall {
                    from: owner,
                    to,
                    value: in_euint(value),
                };
                self.client.send(self.address, call).await?
            }
        };
        Ok(receipt)
    }

    async fn get_user_claims(&self, account: Address) -> Result<Vec<Claim>, ChainError> {
        let ret = self
            .client
            .call(self.address, IConfidentialToken::getUserClaimsCall { user: account })
            .await?;
        Ok(ret._0.into_iter().map(claim_from_tuple).collect())
    }

    async fn get_claim(&self, ct_hash: U256) -> Result<Claim, ChainError> {
        let ret = self
            .client
            .call(self.address, IConfidentialToken::getClaimCall { ctHash: ct_hash })
            .await?;
        Ok(claim_from_tuple(ret._0))
    }

    async fn claim_unwrapped(&self, ct_hash: U256) -> Result<TxReceipt, ChainError> {
        let (receipt, _) = self
            .client
            .send(self.address, IConfidentialToken::claimUnwrappedCall { ctHash: ct_hash })
            .await?;
        Ok(receipt)
    }

    async fn claim_all_unwrapped(&self) -> Result<TxReceipt, ChainError> {
        let (receipt, _) = self
            .client
            .send(self.address, IConfidentialToken::claimAllUnwrappedCall {})
            .await?;
        Ok(receipt)
    }

    async fn is_operator(&self, holder: Address, spender: Address) -> Result<bool, ChainError> {
        let ret = self
            .client
            .call(self.address, IConfidentialToken::isOperatorCall { holder, spender })
            .await?;
        Ok(ret._0)
    }

    async fn set_operator(&self, operator: Address, until: u64) -> Result<TxReceipt, ChainError> {
        // uint48 on-chain; later timestamps saturate.
        let until = U48::from(until.min((1u64 << 48) - 1));
        let (receipt, _) = self
            .client
            .send(self.address, IConfidentialToken::setOperatorCall { operator, until })
            .await?;
        Ok(receipt)
    }
}

#[derive(Clone)]
pub struct EvmPlainToken {
    client: EvmClient,
    address: Address,
}

impl PlainToken for EvmPlainToken {
    fn address(&self) -> Address {
        self.address
    }

    async fn balance_of(&self, account: Address) -> Result<U256, ChainError> {
        let ret = self
            .client
            .call(self.address, IPlainToken::balanceOfCall { account })
            .await?;
        Ok(ret._0)
    }

    async fn allowance(&self, owner: Address, spender: Address) -> Result<U256, ChainError> {
        let ret = self
            .client
            .call(self.address, IPlainToken::allowanceCall { owner, spender })
            .await?;
        Ok(ret._0)
    }

    async fn approve(&self, spender: Address, amount: U256) -> Result<TxReceipt, ChainError> {
        let (receipt, _) = self
            .client
            .send(
                self.address,
                IPlainToken::approveCall {
                    spender,
                    value: amount,
                },
            )
            .await?;
        Ok(receipt)
    }

    async fn mint(&self, to: Address, amount: U256) -> Result<TxReceipt, ChainError> {
        let (receipt, _) = self
            .client
            .send(self.address, IPlainToken::mintCall { to, amount })
            .await?;
        Ok(receipt)
    }
}

#[derive(Clone)]
pub struct EvmBridge {
    client: EvmClient,
    address: Address,
}

impl EvmBridge {
    pub fn new(client: EvmClient, address: Address) -> Self {
        Self { client, address }
    }
}

impl BridgeContract for EvmBridge {
    fn address(&self) -> Address {
        self.address
    }

    fn chain_id(&self) -> u64 {
        self.client.chain_id
    }

    async fn bridge(&self, request: &BridgeRequest) -> Result<BridgeSubmission, ChainError> {
        let call = IFhenixBridge::bridgeCall {
            sender: request.sender,
            receiver: request.receiver,
            relayer: request.relayer,
            inputToken: request.input_token,
            outputToken: request.output_token,
            inputAmount: in_euint(&request.input_amount),
            outputAmount: in_euint(&request.output_amount),
            destinationChainId: in_euint(&request.destination_chain_id),
            permit: permit_tuple(&request.permit),
        };
        let (receipt, logs) = self.client.send(self.address, call).await?;

        let bridge = to_h160(self.address);
        let intent_id = logs
            .iter()
            .filter(|log| log.address == bridge)
            .find_map(|log| {
                let topics = log.topics.iter().map(|t| B256::from(t.0));
                IFhenixBridge::IntentCreated::decode_raw_log(topics, &log.data, true).ok()
            })
            .map(|event| event.intent.id)
            .ok_or_else(|| {
                ChainError::Decode(format!("no IntentCreated event in {}", receipt.tx_hash))
            })?;

        Ok(BridgeSubmission { intent_id, receipt })
    }

    async fn get_intent(&self, id: U256) -> Result<Option<BridgeIntent>, ChainError> {
        let ret = self
            .client
            .call(self.address, IFhenixBridge::getIntentCall { id })
            .await?;
        let intent = intent_from_tuple(ret._0)?;
        Ok(intent.exists().then_some(intent))
    }

    async fn fulfill(
        &self,
        intent: &BridgeIntent,
        permit: &TransferPermit,
    ) -> Result<TxReceipt, ChainError> {
        let call = IFhenixBridge::fulfillCall {
            intent: intent_tuple(intent),
            permit: permit_tuple(permit),
        };
        let (receipt, _) = self.client.send(self.address, call).await?;
        Ok(receipt)
    }
}
