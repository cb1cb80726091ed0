//! Balance Provisioner: tops up an account's confidential balance from the underlying ERC20.
//!
//! Runs mint -> approve -> wrap as dependent transactions, each awaited to inclusion. Two
//! concurrent calls for the same account can both see a shortfall and both wrap; callers that
//! provision in parallel lock per account.

use alloy_primitives::{Address, U256};
use fhe_bridge_types::FheType;
use tracing::{debug, info, warn};

use crate::{
    config::{AddressResolver, ContractKey},
    errors::{Error, Result},
    ports::{ChainError, ConfidentialToken, ContractFactory, FheBackend, PlainToken},
};

pub struct BalanceProvisioner<'a, C, F> {
    contracts: &'a C,
    fhe: &'a F,
    resolver: &'a AddressResolver,
}

impl<'a, C: ContractFactory, F: FheBackend> BalanceProvisioner<'a, C, F> {
    pub fn new(contracts: &'a C, fhe: &'a F, resolver: &'a AddressResolver) -> Self {
        Self {
            contracts,
            fhe,
            resolver,
        }
    }

    /// Make sure `account` holds at least `required` of the confidential token.
    ///
    /// Returns the resolved token address. A satisfied balance is a no-op. When the current balance
    /// cannot be decrypted it is taken as zero, so the call may over-provision rather than block.
    pub async fn ensure_balance(
        &self,
        account: Address,
        required: U256,
        token: Option<Address>,
    ) -> Result<Address> {
        let token_address = self.resolver.resolve(ContractKey::ConfidentialToken, token)?;
        let token = self.contracts.confidential_token(token_address);

        let current = self.current_balance(&token, account).await?;
        if current >= required {
            debug!(%account, token = %token_address, "confidential balance already sufficient");
            return Ok(token_address);
        }

        let shortfall = required - current;
        let payer = self.contracts.sender();
        let plain = self.contracts.plain_token(token.underlying().await?);
        info!(%account, token = %token_address, %shortfall, "provisioning confidential balance");

        let plain_balance = plain.balance_of(payer).await?;
        if plain_balance < shortfall {
            let missing = shortfall - plain_balance;
            plain.mint(payer, missing).await.map_err(|err| match err {
                ChainError::Reverted(reason) => Error::MintUnauthorized {
                    token: plain.address(),
                    account: payer,
                    reason,
                },
                other => Error::Chain(other),
            })?;
            info!(token = %plain.address(), to = %payer, amount = %missing, "minted underlying");
        }

        let allowance = plain.allowance(payer, token_address).await?;
        if allowance < shortfall {
            plain.approve(token_address, shortfall).await?;
            info!(
                token = %plain.address(),
                spender = %token_address,
                amount = %shortfall,
                "approved wrap"
            );
        }

        token.wrap(account, shortfall).await?;
        info!(
            %account,
            token = %token_address,
            amount = %shortfall,
            "wrapped into confidential balance"
        );

        Ok(token_address)
    }

    async fn current_balance(&self, token: &C::Confidential, account: Address) -> Result<U256> {
        let handle = token.confidential_balance_of(account).await?;
        if handle.is_zero() {
            return Ok(U256::ZERO);
        }

        // Decrypt as the caller: a payer without read access to the account falls back to zero.
        let reader = self.contracts.sender();
        let unsealed = match self.fhe.initialize(self.resolver.chain_id(), reader).await {
            Ok(()) => self.fhe.unseal(handle, FheType::Uint64).await,
            Err(err) => Err(err),
        };
        match unsealed {
            Ok(balance) => {
                debug!(%account, %reader, %balance, "unsealed confidential balance");
                Ok(balance)
            }
            Err(err) => {
                warn!(
                    %account,
                    %reader,
                    %handle,
                    error = %err,
                    "cannot decrypt balance, assuming zero"
                );
                Ok(U256::ZERO)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{adapters::mock::MockNetwork, config::NetworkConfig};

    #[tokio::test]
    async fn unresolvable_token_fails_fast() {
        let net = MockNetwork::new(84532).connect(Address::repeat_byte(1));
        let fhe = net.fhe();
        let resolver = AddressResolver::new(84532, NetworkConfig::testnets(), None);
        let err = BalanceProvisioner::new(&net, &fhe, &resolver)
            .ensure_balance(Address::repeat_byte(1), U256::from(10u64), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AddressNotFound { .. }));
        assert!(net.ops().await.is_empty());
    }

    #[tokio::test]
    async fn mint_revert_is_unauthorised() {
        let relayer = Address::repeat_byte(1);
        let net = MockNetwork::new(84532).connect(relayer);
        let (token, plain) = net.deploy_token_pair("Confidential TEST").await;
        net.restrict_minting(plain.address()).await;
        let fhe = net.fhe();
        let resolver = AddressResolver::new(84532, NetworkConfig::testnets(), None);

        let err = BalanceProvisioner::new(&net, &fhe, &resolver)
            .ensure_balance(relayer, U256::from(10u64), Some(token.address()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MintUnauthorized { account, .. } if account == relayer));
        assert!(net.ops().await.is_empty());
    }
}
