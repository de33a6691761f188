//! Shared fixtures for the cross-crate scenarios.
//!
//! A [`Network`] is one in-process ledger seeded with a trustee NYM. Every
//! [`Agent`] owns its own keyring and talks to that ledger through its own
//! pool handle, the way separate processes would.

use std::sync::Arc;

use indigo_core::{ClientConfig, Did, Role};
use indigo_ledger::{
    GenesisNym, InMemoryLedger, LedgerClient, LedgerError, Pool, PoolConfig, PoolRegistry,
};
use indigo_wallet::Keyring;

pub const TRUSTEE_SEED: [u8; 32] = *b"000000000000000000000000Trustee1";
pub const STEWARD_SEED: [u8; 32] = *b"000000000000000000000000Steward1";

/// One party: a keyring, the DID it acts as, and a ledger connection.
pub struct Agent {
    pub did: Did,
    pub keyring: Arc<Keyring>,
    pub ledger: LedgerClient,
}

pub struct Network {
    ledger: Arc<InMemoryLedger>,
    registry: PoolRegistry,
    config: ClientConfig,
}

impl Network {
    /// Fresh ledger whose genesis holds the trustee derived from
    /// [`TRUSTEE_SEED`]. Returns the network and the trustee agent.
    pub fn with_trustee() -> Result<(Self, Agent), LedgerError> {
        let keyring = Arc::new(Keyring::new());
        let trustee = keyring.create_identity_from_seed(&TRUSTEE_SEED)?;
        let ledger = InMemoryLedger::from_genesis(&[GenesisNym {
            dest: trustee.did.clone(),
            verkey: trustee.verkey,
            role: Some(Role::Trustee),
            seq_no: 1,
        }]);

        let mut config = ClientConfig::default();
        config.retry.request_timeout_ms = 2_000;
        let registry = PoolRegistry::new();
        registry.create_config(&config.pool.name, PoolConfig::from(&config.pool))?;
        let network = Self {
            ledger: Arc::new(ledger),
            registry,
            config,
        };
        let agent = network.agent(trustee.did, keyring)?;
        Ok((network, agent))
    }

    pub fn ledger(&self) -> &Arc<InMemoryLedger> {
        &self.ledger
    }

    pub fn connect(&self, keyring: Arc<Keyring>) -> Result<LedgerClient, LedgerError> {
        let pool = Pool::open_with(&self.registry, &self.config.pool.name, self.ledger.clone())?;
        Ok(LedgerClient::new(Arc::new(pool), keyring).with_retry_policy(self.config.retry))
    }

    pub fn agent(&self, did: Did, keyring: Arc<Keyring>) -> Result<Agent, LedgerError> {
        Ok(Agent {
            did,
            ledger: self.connect(keyring.clone())?,
            keyring,
        })
    }

    /// New agent with a random identity, written to the ledger by `sponsor`.
    pub async fn onboard(&self, sponsor: &Agent, role: Option<Role>) -> Result<Agent, LedgerError> {
        let keyring = Arc::new(Keyring::new());
        let identity = keyring.create_identity()?;
        sponsor
            .ledger
            .submit_nym(&sponsor.did, &identity.did, Some(&identity.verkey), role)
            .await?;
        self.agent(identity.did, keyring)
    }

    /// Like [`Network::onboard`] with an identity derived from `seed`.
    pub async fn onboard_seeded(
        &self,
        sponsor: &Agent,
        seed: &[u8; 32],
        role: Option<Role>,
    ) -> Result<Agent, LedgerError> {
        let keyring = Arc::new(Keyring::new());
        let identity = keyring.create_identity_from_seed(seed)?;
        sponsor
            .ledger
            .submit_nym(&sponsor.did, &identity.did, Some(&identity.verkey), role)
            .await?;
        self.agent(identity.did, keyring)
    }
}

/// Trustee, a steward onboarded from [`STEWARD_SEED`], and an endorser
/// the steward onboarded. The usual starting point for issuer scenarios.
pub async fn steward_and_endorser() -> Result<(Network, Agent, Agent), LedgerError> {
    let (network, trustee) = Network::with_trustee()?;
    let steward = network
        .onboard_seeded(&trustee, &STEWARD_SEED, Some(Role::Steward))
        .await?;
    let endorser = network.onboard(&steward, Some(Role::Endorser)).await?;
    Ok((network, steward, endorser))
}
