use alloy_primitives::{keccak256, Address, Bytes, U256};
use serde::{Deserialize, Serialize};

/// How a host provider should treat a cached read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReadMode {
    /// Refreshed on every block the host observes
    Live,
    /// Read once and never reloaded by the host
    NeverReload,
}

/// Contract calls the claim flow reads or sends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContractCall {
    BalanceOf { owner: Address },
    Allowance { owner: Address, spender: Address },
    GetClaimRate,
    Approve { spender: Address, amount: U256 },
    Claim,
}

impl ContractCall {
    pub fn signature(&self) -> &'static str {
        match self {
            ContractCall::BalanceOf { .. } => "balanceOf(address)",
            ContractCall::Allowance { .. } => "allowance(address,address)",
            ContractCall::GetClaimRate => "getClaimRate()",
            ContractCall::Approve { .. } => "approve(address,uint256)",
            ContractCall::Claim => "claim()",
        }
    }

    pub fn selector(&self) -> [u8; 4] {
        let hash = keccak256(self.signature().as_bytes());
        [hash[0], hash[1], hash[2], hash[3]]
    }

    /// ABI calldata: selector followed by one 32-byte word per argument.
    pub fn calldata(&self) -> Bytes {
        let mut data = self.selector().to_vec();
        match self {
            ContractCall::BalanceOf { owner } => {
                data.extend_from_slice(owner.into_word().as_slice());
            }
            ContractCall::Allowance { owner, spender } => {
                data.extend_from_slice(owner.into_word().as_slice());
                data.extend_from_slice(spender.into_word().as_slice());
            }
            ContractCall::Approve { spender, amount } => {
                data.extend_from_slice(spender.into_word().as_slice());
                data.extend_from_slice(&amount.to_be_bytes::<32>());
            }
            ContractCall::GetClaimRate | ContractCall::Claim => {}
        }
        Bytes::from(data)
    }
}

/// A state-changing call to be signed and broadcast by the wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRequest {
    pub from: Address,
    pub to: Address,
    pub call: ContractCall,
    pub data: Bytes,
}

impl TransactionRequest {
    pub fn new(from: Address, to: Address, call: ContractCall) -> Self {
        let data = call.calldata();
        Self { from, to, call, data }
    }
}
