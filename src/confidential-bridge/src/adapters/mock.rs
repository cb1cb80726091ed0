//! In-memory token, bridge and co-processor doubles sharing one ciphertext table.
//!
//! Plaintext values live next to their handles so the doubles can move "encrypted" balances;
//! the ACL and readiness flags reproduce the co-processor's permission and latency behaviour.
//! Every state-changing call is appended to an op log for assertions.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::Arc,
};

use alloy_primitives::{Address, B256, U256};
use fhe_bridge_types::{
    BridgeIntent, CiphertextHandle, Claim, Eip712Domain, EncryptedInput, FheType, FilledStatus,
    PermitError, TransferPermit,
};
use tokio::sync::Mutex;

use crate::{
    adapters::local_signer::recover_signer,
    eip712::{keccak256_bytes, permit_digest},
    now_unix,
    ports::{
        BridgeContract, BridgeRequest, BridgeSubmission, ChainError, ConfidentialToken,
        ContractFactory, FheBackend, FheError, PlainToken, TxReceipt,
    },
};

/// Seconds an intent stays open on the mock bridge before its timeout.
const INTENT_TIMEOUT: u64 = 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOp {
    Mint {
        token: Address,
        to: Address,
        amount: U256,
    },
    Approve {
        token: Address,
        owner: Address,
        spender: Address,
        amount: U256,
    },
    Wrap {
        token: Address,
        to: Address,
        amount: U256,
    },
    Unwrap {
        token: Address,
        to: Address,
        amount: U256,
    },
    Transfer {
        token: Address,
        from: Address,
        to: Address,
        amount: U256,
    },
    Claim {
        token: Address,
        ct_hash: U256,
        amount: U256,
    },
    SetOperator {
        token: Address,
        holder: Address,
        operator: Address,
        until: u64,
    },
    Bridge { bridge: Address, id: U256 },
    Fulfill { bridge: Address, id: U256 },
}

#[derive(Clone)]
struct Ciphertext {
    value: U256,
    acl: HashSet<Address>,
    ready: bool,
}

#[derive(Clone, Default)]
struct PlainState {
    balances: HashMap<Address, U256>,
    allowances: HashMap<(Address, Address), U256>,
    mint_restricted: bool,
}

#[derive(Clone)]
struct ConfidentialState {
    name: String,
    chain_id: u64,
    underlying: Address,
    balances: HashMap<Address, U256>,
    handles: HashMap<Address, CiphertextHandle>,
    nonces: HashMap<Address, U256>,
    operators: HashMap<(Address, Address), u64>,
    claims: BTreeMap<U256, Claim>,
}

#[derive(Clone)]
struct BridgeState {
    chain_id: u64,
    intents: BTreeMap<U256, BridgeIntent>,
    next_id: U256,
}

#[derive(Clone, Default)]
struct MockState {
    /// Keyed by handle pre-image: metadata bits do not change which value a handle names.
    ciphertexts: HashMap<U256, Ciphertext>,
    plain: HashMap<Address, PlainState>,
    confidential: HashMap<Address, ConfidentialState>,
    bridges: HashMap<Address, BridgeState>,
    ops: Vec<MockOp>,
    counter: u64,
    claims_decrypt_instantly: bool,
}

fn revert(reason: &str) -> ChainError {
    ChainError::Reverted(reason.to_string())
}

impl MockState {
    fn next_word(&mut self, tag: &[u8]) -> B256 {
        self.counter += 1;
        let mut buf = tag.to_vec();
        buf.extend_from_slice(&self.counter.to_be_bytes());
        keccak256_bytes(&buf)
    }

    fn receipt(&mut self) -> TxReceipt {
        TxReceipt {
            tx_hash: self.next_word(b"tx"),
            block_number: Some(self.counter),
        }
    }

    fn seal(&mut self, value: U256, utype: FheType, readers: &[Address]) -> CiphertextHandle {
        let word = U256::from_be_bytes(self.next_word(b"ciphertext").0);
        let handle = CiphertextHandle::pack(word, 0, utype.as_u8(), false);
        self.ciphertexts.insert(
            handle.preimage(),
            Ciphertext {
                value,
                acl: readers.iter().copied().collect(),
                ready: true,
            },
        );
        handle
    }

    fn value_of(&self, handle: CiphertextHandle) -> Result<U256, ChainError> {
        self.ciphertexts
            .get(&handle.preimage())
            .map(|ct| ct.value)
            .ok_or_else(|| revert("unknown ciphertext"))
    }

    fn allow(&mut self, handle: CiphertextHandle, account: Address) {
        if let Some(ct) = self.ciphertexts.get_mut(&handle.preimage()) {
            ct.acl.insert(account);
        }
    }

    fn plain_mut(&mut self, token: Address) -> Result<&mut PlainState, ChainError> {
        self.plain.get_mut(&token).ok_or_else(|| revert("no plain token at address"))
    }

    fn confidential_mut(&mut self, token: Address) -> Result<&mut ConfidentialState, ChainError> {
        self.confidential
            .get_mut(&token)
            .ok_or_else(|| revert("no confidential token at address"))
    }

    fn confidential(&self, token: Address) -> Result<&ConfidentialState, ChainError> {
        self.confidential
            .get(&token)
            .ok_or_else(|| revert("no confidential token at address"))
    }

    fn bridge_mut(&mut self, bridge: Address) -> Result<&mut BridgeState, ChainError> {
        self.bridges.get_mut(&bridge).ok_or_else(|| revert("no bridge at address"))
    }

    fn reseal_balance(
        &mut self,
        token: Address,
        account: Address,
        value: U256,
    ) -> Result<(), ChainError> {
        let handle = self.seal(value, FheType::Uint64, &[account]);
        self.confidential_mut(token)?.handles.insert(account, handle);
        Ok(())
    }

    fn credit(&mut self, token: Address, account: Address, amount: U256) -> Result<(), ChainError> {
        let balance = self.confidential_mut(token)?.balances.entry(account).or_default();
        *balance += amount;
        let updated = *balance;
        self.reseal_balance(token, account, updated)
    }

    fn debit(&mut self, token: Address, account: Address, amount: U256) -> Result<(), ChainError> {
        let balance = self.confidential_mut(token)?.balances.entry(account).or_default();
        if *balance < amount {
            return Err(revert("insufficient confidential balance"));
        }
        *balance -= amount;
        let updated = *balance;
        self.reseal_balance(token, account, updated)
    }

    fn move_plain(
        &mut self,
        token: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), ChainError> {
        let state = self.plain_mut(token)?;
        let from_balance = state.balances.entry(from).or_default();
        if *from_balance < amount {
            return Err(revert("ERC20: transfer amount exceeds balance"));
        }
        *from_balance -= amount;
        *state.balances.entry(to).or_default() += amount;
        Ok(())
    }

    fn domain(&self, token: Address) -> Result<Eip712Domain, ChainError> {
        let state = self.confidential(token)?;
        Ok(Eip712Domain {
            name: state.name.clone(),
            version: "1".to_string(),
            chain_id: U256::from(state.chain_id),
            verifying_contract: token,
        })
    }

    /// Verify `permit` the way the token contract does and advance the owner's nonce.
    fn consume_permit(
        &mut self,
        token: Address,
        permit: &TransferPermit,
        spender: Address,
        value_hash: CiphertextHandle,
    ) -> Result<(), ChainError> {
        if permit.spender != spender {
            return Err(revert("permit spender mismatch"));
        }
        if permit.value_hash != value_hash {
            return Err(revert("permit value hash mismatch"));
        }
        let domain = self.domain(token)?;
        let state = self.confidential_mut(token)?;
        let nonce = state.nonces.get(&permit.owner).copied().unwrap_or_default();
        match permit.is_valid_at(now_unix(), nonce) {
            Err(PermitError::Expired { .. }) => return Err(revert("permit expired")),
            Err(PermitError::StaleNonce { .. }) => return Err(revert("invalid permit nonce")),
            Ok(()) => {}
        }
        let digest = permit_digest(
            &domain,
            permit.owner,
            permit.spender,
            permit.value_hash,
            nonce,
            permit.deadline,
        );
        if recover_signer(digest, &permit.signature) != Some(permit.owner) {
            return Err(revert("invalid permit signature"));
        }
        state.nonces.insert(permit.owner, nonce + U256::from(1u64));
        Ok(())
    }

    fn claim(&mut self, token: Address, ct_hash: U256) -> Result<(), ChainError> {
        let state = self.confidential_mut(token)?;
        let underlying = state.underlying;
        let claim = state
            .claims
            .get_mut(&ct_hash)
            .ok_or_else(|| revert("claim not found"))?;
        if claim.claimed {
            return Err(revert("Already claimed"));
        }
        if !claim.decrypted {
            return Err(revert("Not decrypted"));
        }
        claim.claimed = true;
        let (to, amount) = (claim.to, claim.decrypted_amount);
        self.move_plain(underlying, token, to, amount)?;
        self.ops.push(MockOp::Claim {
            token,
            ct_hash,
            amount,
        });
        Ok(())
    }
}

/// Handle to the shared mock world, bound to one chain and one sending account.
#[derive(Clone)]
pub struct MockNetwork {
    state: Arc<Mutex<MockState>>,
    chain_id: u64,
    caller: Address,
}

impl MockNetwork {
    pub fn new(chain_id: u64) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState::default())),
            chain_id,
            caller: Address::ZERO,
        }
    }

    /// Same world, another chain.
    pub fn on_chain(&self, chain_id: u64) -> Self {
        Self {
            chain_id,
            ..self.clone()
        }
    }

    /// Same world, sending as `caller`.
    pub fn connect(&self, caller: Address) -> Self {
        Self {
            caller,
            ..self.clone()
        }
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn caller(&self) -> Address {
        self.caller
    }

    /// Run `f` on a copy of the world and keep the copy only when it succeeds: a reverted call
    /// leaves no effects behind.
    async fn transact<T>(
        &self,
        f: impl FnOnce(&mut MockState) -> Result<T, ChainError>,
    ) -> Result<T, ChainError> {
        let mut state = self.state.lock().await;
        let mut draft = state.clone();
        let out = f(&mut draft)?;
        *state = draft;
        Ok(out)
    }

    async fn new_address(&self) -> Address {
        let word = self.state.lock().await.next_word(b"contract");
        Address::from_word(word)
    }

    pub async fn deploy_plain_token(&self) -> MockPlainToken {
        let address = self.new_address().await;
        self.state.lock().await.plain.insert(address, PlainState::default());
        MockPlainToken {
            net: self.clone(),
            address,
        }
    }

    pub async fn deploy_confidential_token(
        &self,
        name: &str,
        underlying: Address,
    ) -> MockConfidentialToken {
        let address = self.new_address().await;
        self.state.lock().await.confidential.insert(
            address,
            ConfidentialState {
                name: name.to_string(),
                chain_id: self.chain_id,
                underlying,
                balances: HashMap::new(),
                handles: HashMap::new(),
                nonces: HashMap::new(),
                operators: HashMap::new(),
                claims: BTreeMap::new(),
            },
        );
        MockConfidentialToken {
            net: self.clone(),
            address,
        }
    }

    /// A plain ERC20 and its confidential wrapper.
    pub async fn deploy_token_pair(&self, name: &str) -> (MockConfidentialToken, MockPlainToken) {
        let plain = self.deploy_plain_token().await;
        let confidential = self.deploy_confidential_token(name, plain.address).await;
        (confidential, plain)
    }

    pub async fn deploy_bridge(&self) -> MockBridge {
        let address = self.new_address().await;
        self.state.lock().await.bridges.insert(
            address,
            BridgeState {
                chain_id: self.chain_id,
                intents: BTreeMap::new(),
                next_id: U256::from(1u64),
            },
        );
        MockBridge {
            net: self.clone(),
            address,
        }
    }

    /// Client for an already deployed bridge, sending as this handle's caller.
    pub fn bridge(&self, address: Address) -> MockBridge {
        MockBridge {
            net: self.clone(),
            address,
        }
    }

    /// Co-processor client sharing this world's ciphertexts.
    pub fn fhe(&self) -> MockFheBackend {
        MockFheBackend {
            net: self.clone(),
            session: Arc::new(Mutex::new(None)),
        }
    }

    /// Make `mint` revert for everyone.
    pub async fn restrict_minting(&self, token: Address) {
        if let Some(state) = self.state.lock().await.plain.get_mut(&token) {
            state.mint_restricted = true;
        }
    }

    pub async fn set_nonce(&self, token: Address, owner: Address, nonce: U256) {
        if let Some(state) = self.state.lock().await.confidential.get_mut(&token) {
            state.nonces.insert(owner, nonce);
        }
    }

    /// Toggle whether the co-processor can already decrypt `handle`.
    pub async fn set_ready(&self, handle: CiphertextHandle, ready: bool) {
        if let Some(ct) = self.state.lock().await.ciphertexts.get_mut(&handle.preimage()) {
            ct.ready = ready;
        }
    }

    pub async fn allow(&self, handle: CiphertextHandle, account: Address) {
        self.state.lock().await.allow(handle, account);
    }

    /// Unwrap claims are created already decrypted.
    pub async fn set_claims_decrypt_instantly(&self, instant: bool) {
        self.state.lock().await.claims_decrypt_instantly = instant;
    }

    /// Decrypt every pending claim on `token`. Returns how many changed.
    pub async fn decrypt_claims(&self, token: Address) -> usize {
        let mut state = self.state.lock().await;
        let Some(token) = state.confidential.get_mut(&token) else {
            return 0;
        };
        let mut changed = 0;
        for claim in token.claims.values_mut().filter(|c| !c.decrypted) {
            claim.decrypted = true;
            claim.decrypted_amount = claim.requested_amount;
            changed += 1;
        }
        changed
    }

    /// Record a claim as-is, bypassing unwrap.
    pub async fn insert_claim(&self, token: Address, claim: Claim) {
        if let Some(token) = self.state.lock().await.confidential.get_mut(&token) {
            token.claims.insert(claim.ct_hash, claim);
        }
    }

    /// Plaintext view of a confidential balance.
    pub async fn confidential_balance(&self, token: Address, account: Address) -> U256 {
        let state = self.state.lock().await;
        state
            .confidential
            .get(&token)
            .and_then(|t| t.balances.get(&account).copied())
            .unwrap_or_default()
    }

    pub async fn plain_balance(&self, token: Address, account: Address) -> U256 {
        let state = self.state.lock().await;
        state
            .plain
            .get(&token)
            .and_then(|t| t.balances.get(&account).copied())
            .unwrap_or_default()
    }

    pub async fn ops(&self) -> Vec<MockOp> {
        self.state.lock().await.ops.clone()
    }

    pub async fn clear_ops(&self) {
        self.state.lock().await.ops.clear();
    }
}

impl ContractFactory for MockNetwork {
    type Confidential = MockConfidentialToken;
    type Plain = MockPlainToken;

    fn sender(&self) -> Address {
        self.caller
    }

    fn confidential_token(&self, address: Address) -> MockConfidentialToken {
        MockConfidentialToken {
            net: self.clone(),
            address,
        }
    }

    fn plain_token(&self, address: Address) -> MockPlainToken {
        MockPlainToken {
            net: self.clone(),
            address,
        }
    }
}

#[derive(Clone)]
pub struct MockPlainToken {
    net: MockNetwork,
    address: Address,
}

impl PlainToken for MockPlainToken {
    fn address(&self) -> Address {
        self.address
    }

    async fn balance_of(&self, account: Address) -> Result<U256, ChainError> {
        let mut state = self.net.state.lock().await;
        Ok(state.plain_mut(self.address)?.balances.get(&account).copied().unwrap_or_default())
    }

    async fn allowance(&self, owner: Address, spender: Address) -> Result<U256, ChainError> {
        let mut state = self.net.state.lock().await;
        Ok(state
            .plain_mut(self.address)?
            .allowances
            .get(&(owner, spender))
            .copied()
            .unwrap_or_default())
    }

    async fn approve(&self, spender: Address, amount: U256) -> Result<TxReceipt, ChainError> {
        let owner = self.net.caller;
        self.net.transact(|state| {
            state.plain_mut(self.address)?.allowances.insert((owner, spender), amount);
            state.ops.push(MockOp::Approve {
                token: self.address,
                owner,
                spender,
                amount,
            });
            Ok(state.receipt())
        })
        .await
    }

    async fn mint(&self, to: Address, amount: U256) -> Result<TxReceipt, ChainError> {
        self.net.transact(|state| {
            let token = state.plain_mut(self.address)?;
            if token.mint_restricted {
                return Err(revert("caller is not a minter"));
            }
            *token.balances.entry(to).or_default() += amount;
            state.ops.push(MockOp::Mint {
                token: self.address,
                to,
                amount,
            });
            Ok(state.receipt())
        })
        .await
    }
}

#[derive(Clone)]
pub struct MockConfidentialToken {
    net: MockNetwork,
    address: Address,
}

impl ConfidentialToken for MockConfidentialToken {
    fn address(&self) -> Address {
        self.address
    }

    fn caller(&self) -> Address {
        self.net.caller
    }

    /// 1 for a non-zero balance, 0 otherwise.
    async fn balance_of(&self, account: Address) -> Result<U256, ChainError> {
        let state = self.net.state.lock().await;
        let held = state
            .confidential(self.address)?
            .balances
            .get(&account)
            .is_some_and(|b| !b.is_zero());
        Ok(U256::from(u8::from(held)))
    }

    async fn confidential_balance_of(
        &self,
        account: Address,
    ) -> Result<CiphertextHandle, ChainError> {
        let state = self.net.state.lock().await;
        Ok(state
            .confidential(self.address)?
            .handles
            .get(&account)
            .copied()
            .unwrap_or(CiphertextHandle::ZERO))
    }

    async fn nonces(&self, owner: Address) -> Result<U256, ChainError> {
        let state = self.net.state.lock().await;
        Ok(state
            .confidential(self.address)?
            .nonces
            .get(&owner)
            .copied()
            .unwrap_or_default())
    }

    async fn eip712_domain(&self) -> Result<Eip712Domain, ChainError> {
        self.net.state.lock().await.domain(self.address)
    }

    async fn underlying(&self) -> Result<Address, ChainError> {
        Ok(self.net.state.lock().await.confidential(self.address)?.underlying)
    }

    async fn wrap(&self, to: Address, amount: U256) -> Result<TxReceipt, ChainError> {
        let caller = self.net.caller;
        self.net.transact(|state| {
            let underlying = state.confidential(self.address)?.underlying;

            let plain = state.plain_mut(underlying)?;
            let allowance = plain.allowances.entry((caller, self.address)).or_default();
            if *allowance < amount {
                return Err(revert("ERC20: insufficient allowance"));
            }
            *allowance -= amount;
            state.move_plain(underlying, caller, self.address, amount)?;
            state.credit(self.address, to, amount)?;
            state.ops.push(MockOp::Wrap {
                token: self.address,
                to,
                amount,
            });
            Ok(state.receipt())
        })
        .await
    }

    async fn unwrap(&self, to: Address, amount: U256) -> Result<TxReceipt, ChainError> {
        let caller = self.net.caller;
        self.net.transact(|state| {
            state.debit(self.address, caller, amount)?;

            let ct_hash = U256::from_be_bytes(state.next_word(b"claim").0);
            let instant = state.claims_decrypt_instantly;
            state.confidential_mut(self.address)?.claims.insert(
                ct_hash,
                Claim {
                    ct_hash,
                    to,
                    requested_amount: amount,
                    decrypted_amount: if instant { amount } else { U256::ZERO },
                    decrypted: instant,
                    claimed: false,
                },
            );
            state.ops.push(MockOp::Unwrap {
                token: self.address,
                to,
                amount,
            });
            Ok(state.receipt())
        })
        .await
    }

    async fn confidential_transfer_from(
        &self,
        owner: Address,
        to: Address,
        value: &EncryptedInput,
        permit: Option<&TransferPermit>,
    ) -> Result<TxReceipt, ChainError> {
        let caller = self.net.caller;
        let handle = value.handle();
        self.net.transact(|state| {
            let amount = state.value_of(handle)?;

            match permit {
                Some(permit) => {
                    if permit.owner != owner {
                        return Err(revert("permit owner mismatch"));
                    }
                    state.consume_permit(self.address, permit, caller, handle)?;
                }
                None => {
                    let until = state
                        .confidential(self.address)?
                        .operators
                        .get(&(owner, caller))
                        .copied()
                        .unwrap_or_default();
                    if until < now_unix() {
                        return Err(revert("caller is not an operator"));
                    }
                }
            }

            state.debit(self.address, owner, amount)?;
            state.credit(self.address, to, amount)?;
            state.ops.push(MockOp::Transfer {
                token: self.address,
                from: owner,
                to,
                amount,
            });
            Ok(state.receipt())
        })
        .await
    }

    async fn get_user_claims(&self, account: Address) -> Result<Vec<Claim>, ChainError> {
        let state = self.net.state.lock().await;
        Ok(state
            .confidential(self.address)?
            .claims
            .values()
            .filter(|c| c.to == account)
            .cloned()
            .collect())
    }

    async fn get_claim(&self, ct_hash: U256) -> Result<Claim, ChainError> {
        let state = self.net.state.lock().await;
        Ok(state
            .confidential(self.address)?
            .claims
            .get(&ct_hash)
            .cloned()
            .unwrap_or_default())
    }

    async fn claim_unwrapped(&self, ct_hash: U256) -> Result<TxReceipt, ChainError> {
        self.net.transact(|state| {
            state.claim(self.address, ct_hash)?;
            Ok(state.receipt())
        })
        .await
    }

    async fn claim_all_unwrapped(&self) -> Result<TxReceipt, ChainError> {
        let caller = self.net.caller;
        self.net.transact(|state| {
            let ready: Vec<U256> = state
                .confidential(self.address)?
                .claims
                .values()
                .filter(|c| c.to == caller && c.is_ready())
                .map(|c| c.ct_hash)
                .collect();
            for ct_hash in ready {
                state.claim(self.address, ct_hash)?;
            }
            Ok(state.receipt())
        })
        .await
    }

    async fn is_operator(&self, holder: Address, spender: Address) -> Result<bool, ChainError> {
        let state = self.net.state.lock().await;
        let until = state
            .confidential(self.address)?
            .operators
            .get(&(holder, spender))
            .copied()
            .unwrap_or_default();
        Ok(until >= now_unix())
    }

    async fn set_operator(&self, operator: Address, until: u64) -> Result<TxReceipt, ChainError> {
        let holder = self.net.caller;
        self.net.transact(|state| {
            state
                .confidential_mut(self.address)?
                .operators
                .insert((holder, operator), until);
            state.ops.push(MockOp::SetOperator {
                token: self.address,
                holder,
                operator,
                until,
            });
            Ok(state.receipt())
        })
        .await
    }
}

#[derive(Clone)]
pub struct MockBridge {
    net: MockNetwork,
    address: Address,
}

impl MockBridge {
    /// Record an intent directly, as if it had been bridged earlier.
    pub async fn insert_intent(&self, intent: BridgeIntent) {
        if let Some(bridge) = self.net.state.lock().await.bridges.get_mut(&self.address) {
            bridge.intents.insert(intent.id, intent);
        }
    }
}

impl BridgeContract for MockBridge {
    fn address(&self) -> Address {
        self.address
    }

    fn chain_id(&self) -> u64 {
        self.net.chain_id
    }

    async fn bridge(&self, request: &BridgeRequest) -> Result<BridgeSubmission, ChainError> {
        self.net.transact(|state| {
            let permit = &request.permit;
            if permit.owner != request.sender {
                return Err(revert("permit owner is not the sender"));
            }

            let input_handle = request.input_amount.handle();
            let output_handle = request.output_amount.handle();
            let amount = state.value_of(input_handle)?;
            let destination = state.value_of(request.destination_chain_id.handle())?;
            let destination_chain_id = u32::try_from(destination)
                .map_err(|_| revert("destination chain id out of range"))?;

            state.consume_permit(request.input_token, permit, self.address, input_handle)?;
            state.debit(request.input_token, request.sender, amount)?;
            state.credit(request.input_token, self.address, amount)?;
            state.allow(output_handle, request.relayer);
            state.allow(output_handle, request.sender);

            let bridge = state.bridge_mut(self.address)?;
            let id = bridge.next_id;
            bridge.next_id += U256::from(1u64);
            let origin_chain_id =
                u32::try_from(bridge.chain_id).map_err(|_| revert("chain id out of range"))?;
            bridge.intents.insert(
                id,
                BridgeIntent {
                    sender: request.sender,
                    receiver: request.receiver,
                    relayer: request.relayer,
                    input_token: request.input_token,
                    output_token: request.output_token,
                    input_amount: input_handle,
                    output_amount: output_handle,
                    id,
                    origin_chain_id,
                    destination_chain_id,
                    filled_status: FilledStatus::Pending,
                    solver_paid: false,
                    timeout: U256::from(now_unix() + INTENT_TIMEOUT),
                },
            );
            state.ops.push(MockOp::Bridge {
                bridge: self.address,
                id,
            });
            Ok(BridgeSubmission {
                intent_id: id,
                receipt: state.receipt(),
            })
        })
        .await
    }

    async fn get_intent(&self, id: U256) -> Result<Option<BridgeIntent>, ChainError> {
        let mut state = self.net.state.lock().await;
        Ok(state.bridge_mut(self.address)?.intents.get(&id).cloned())
    }

    async fn fulfill(
        &self,
        intent: &BridgeIntent,
        permit: &TransferPermit,
    ) -> Result<TxReceipt, ChainError> {
        let caller = self.net.caller;
        self.net.transact(|state| {
            let bridge = state.bridge_mut(self.address)?;
            if u64::from(intent.destination_chain_id) != bridge.chain_id {
                return Err(revert("wrong destination chain"));
            }
            if bridge.intents.get(&intent.id).is_some_and(BridgeIntent::is_filled) {
                return Err(revert("Intent already filled"));
            }
            if caller != intent.relayer || permit.owner != caller {
                return Err(revert("only the relayer can fulfill"));
            }

            let expected = CiphertextHandle::pack(
                intent.output_amount.preimage(),
                0,
                FheType::Uint128.as_u8(),
                false,
            );
            state.consume_permit(intent.output_token, permit, self.address, expected)?;
            let amount = state.value_of(intent.output_amount)?;
            state.debit(intent.output_token, caller, amount)?;
            state.credit(intent.output_token, intent.receiver, amount)?;

            let mut filled = intent.clone();
            filled.filled_status = FilledStatus::Filled;
            state.bridge_mut(self.address)?.intents.insert(intent.id, filled);

            // Deliver the fill to the origin bridge.
            let origin = u64::from(intent.origin_chain_id);
            for bridge in state.bridges.values_mut().filter(|b| b.chain_id == origin) {
                if let Some(recorded) = bridge.intents.get_mut(&intent.id) {
                    if recorded.sender == intent.sender && recorded.mark_filled().is_ok() {
                        recorded.solver_paid = true;
                    }
                }
            }

            state.ops.push(MockOp::Fulfill {
                bridge: self.address,
                id: intent.id,
            });
            Ok(state.receipt())
        })
        .await
    }
}

/// Co-processor double: encrypts into the shared table and unseals subject to ACL and readiness.
#[derive(Clone)]
pub struct MockFheBackend {
    net: MockNetwork,
    session: Arc<Mutex<Option<(u64, Address)>>>,
}

impl MockFheBackend {
    async fn account(&self) -> Result<Address, FheError> {
        self.session
            .lock()
            .await
            .map(|(_, account)| account)
            .ok_or_else(|| FheError::NotInitialized("call initialize first".into()))
    }
}

fn fits(value: U256, utype: FheType) -> bool {
    value.bit_len() <= utype.bits() as usize
}

impl FheBackend for MockFheBackend {
    async fn initialize(&self, chain_id: u64, account: Address) -> Result<(), FheError> {
        *self.session.lock().await = Some((chain_id, account));
        Ok(())
    }

    async fn encrypt(&self, value: U256, utype: FheType) -> Result<EncryptedInput, FheError> {
        let account = self.account().await?;
        if !fits(value, utype) {
            return Err(FheError::OutOfRange(utype));
        }
        let handle = self.net.state.lock().await.seal(value, utype, &[account]);
        Ok(EncryptedInput {
            ct_hash: handle.preimage(),
            security_zone: 0,
            utype,
            signature: keccak256_bytes(&handle.to_be_bytes()).to_vec(),
        })
    }

    async fn unseal(&self, handle: CiphertextHandle, utype: FheType) -> Result<U256, FheError> {
        let account = self.account().await?;
        let state = self.net.state.lock().await;
        let ct = state
            .ciphertexts
            .get(&handle.preimage())
            .ok_or_else(|| FheError::Backend(format!("unknown ciphertext {handle}")))?;
        if !ct.acl.contains(&account) {
            return Err(FheError::NotPermitted(format!("{account} may not decrypt {handle}")));
        }
        if !ct.ready {
            return Err(FheError::NotReady(format!("{handle} is still being processed")));
        }
        if !fits(ct.value, utype) {
            return Err(FheError::OutOfRange(utype));
        }
        Ok(ct.value)
    }
}
