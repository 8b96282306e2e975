use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};

pub const TRANSFER_EVENT: &str = "Transfer(address,address,uint256)";

/// A log entry emitted during transaction execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Log {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
}

/// Receipt of a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub transaction_hash: B256,
    /// `false` when execution reverted
    pub success: bool,
    pub logs: Vec<Log>,
}

impl Receipt {
    /// The first `Transfer` emitted by `token` that credits `recipient`.
    pub fn transfer_to(&self, token: Address, recipient: Address) -> Option<TransferEvent> {
        self.logs
            .iter()
            .filter(|log| log.address == token)
            .filter_map(TransferEvent::decode)
            .find(|event| event.to == recipient)
    }
}

/// Decoded ERC-20 `Transfer(address indexed from, address indexed to, uint256 value)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferEvent {
    pub token: Address,
    pub from: Address,
    pub to: Address,
    pub value: U256,
}

impl TransferEvent {
    pub fn signature_hash() -> B256 {
        keccak256(TRANSFER_EVENT.as_bytes())
    }

    pub fn decode(log: &Log) -> Option<Self> {
        if log.topics.len() != 3 || log.topics[0] != Self::signature_hash() {
            return None;
        }
        if log.data.len() != 32 {
            return None;
        }

        Some(Self {
            token: log.address,
            from: Address::from_word(log.topics[1]),
            to: Address::from_word(log.topics[2]),
            value: U256::from_be_slice(&log.data),
        })
    }

    pub fn into_log(self) -> Log {
        Log {
            address: self.token,
            topics: vec![
                Self::signature_hash(),
                self.from.into_word(),
                self.to.into_word(),
            ],
            data: Bytes::from(self.value.to_be_bytes::<32>().to_vec()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transfer(token: u8, to: u8, value: u64) -> TransferEvent {
        TransferEvent {
            token: Address::repeat_byte(token),
            from: Address::ZERO,
            to: Address::repeat_byte(to),
            value: U256::from(value),
        }
    }

    #[test]
    fn transfer_topic_is_erc20_signature() {
        let expected: B256 = "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"
            .parse()
            .unwrap();
        assert_eq!(TransferEvent::signature_hash(), expected);
    }

    #[test]
    fn decodes_encoded_transfer() {
        let event = transfer(0xaa, 0x01, 1050);
        assert_eq!(TransferEvent::decode(&event.into_log()), Some(event));
    }

    #[test]
    fn ignores_logs_with_other_signatures() {
        let mut log = transfer(0xaa, 0x01, 1).into_log();
        log.topics[0] = B256::repeat_byte(0x42);
        assert_eq!(TransferEvent::decode(&log), None);

        let mut short = transfer(0xaa, 0x01, 1).into_log();
        short.data = Bytes::from(vec![0u8; 8]);
        assert_eq!(TransferEvent::decode(&short), None);
    }

    #[test]
    fn picks_transfer_from_token_to_recipient() {
        let receipt = Receipt {
            transaction_hash: B256::ZERO,
            success: true,
            logs: vec![
                transfer(0xbb, 0x01, 7).into_log(),
                transfer(0xaa, 0x02, 8).into_log(),
                transfer(0xaa, 0x01, 9).into_log(),
            ],
        };

        let found = receipt
            .transfer_to(Address::repeat_byte(0xaa), Address::repeat_byte(0x01))
            .unwrap();
        assert_eq!(found.value, U256::from(9u64));
        assert!(receipt
            .transfer_to(Address::repeat_byte(0xcc), Address::repeat_byte(0x01))
            .is_none());
    }
}
