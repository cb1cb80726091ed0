pub mod evm;
pub mod file_outbox;
pub mod local_signer;
pub mod memory_outbox;
pub mod mock;

pub use evm::{EvmBridge, EvmClient, EvmConfidentialToken, EvmPlainToken};
pub use file_outbox::FileOutbox;
pub use local_signer::LocalSigner;
pub use memory_outbox::MemoryOutbox;
pub use mock::{
    MockBridge, MockConfidentialToken, MockFheBackend, MockNetwork, MockOp, MockPlainToken,
};
