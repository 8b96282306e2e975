use alloy_primitives::{Address, U256};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use mockall::mock;
use mockall::predicate::*;
use num_bigint::BigUint;
use std::sync::Arc;

use token_claim::{
    models::{
        call::{ContractCall, ReadMode},
        rate::ClaimRate,
        token::{AllowanceBasis, Deployment, DeploymentRegistry, TokenRef},
    },
    repositories::traits::ChainReader,
    services::rate_resolver::{RateResolver, Resolution},
    Account, ClaimError,
};

mock! {
    pub Reader {}
    #[async_trait]
    impl ChainReader for Reader {
        async fn read_contract(&self, address: Address, call: ContractCall, mode: ReadMode) -> Result<U256>;
    }
}

const LEGACY: Address = Address::repeat_byte(0xa1);
const SUCCESSOR: Address = Address::repeat_byte(0xa2);
const CLAIM: Address = Address::repeat_byte(0xa3);
const HOLDER: Address = Address::repeat_byte(0xa4);

fn token(address: Address, decimals: u8, symbol: &str) -> TokenRef {
    TokenRef {
        chain_id: 1,
        address,
        decimals,
        symbol: symbol.to_string(),
    }
}

fn deployment(basis: AllowanceBasis) -> Deployment {
    Deployment {
        chain_id: 1,
        legacy: token(LEGACY, 9, "MISHKA"),
        successor: token(SUCCESSOR, 18, "MISHKA2"),
        claim_contract: CLAIM,
        approval_required: true,
        allowance_basis: basis,
    }
}

fn resolver(reader: MockReader, basis: AllowanceBasis) -> RateResolver<MockReader> {
    RateResolver::new(
        Arc::new(reader),
        Arc::new(DeploymentRegistry::new(vec![deployment(basis)])),
    )
}

fn expect_balance(reader: &mut MockReader, balance: u64, times: usize) {
    reader
        .expect_read_contract()
        .with(
            eq(LEGACY),
            eq(ContractCall::BalanceOf { owner: HOLDER }),
            eq(ReadMode::Live),
        )
        .times(times)
        .returning(move |_, _, _| Ok(U256::from(balance)));
}

fn expect_rate(reader: &mut MockReader, rate: u64, times: usize) {
    reader
        .expect_read_contract()
        .with(eq(CLAIM), eq(ContractCall::GetClaimRate), eq(ReadMode::NeverReload))
        .times(times)
        .returning(move |_, _, _| Ok(U256::from(rate)));
}

#[tokio::test]
async fn resolves_entitlement_from_balance_and_rate() {
    let mut reader = MockReader::new();
    expect_balance(&mut reader, 25_000_000, 1);
    expect_rate(&mut reader, 1050, 1);

    let resolver = resolver(reader, AllowanceBasis::LegacyBalance);
    let resolution = resolver.resolve(1, &Account(HOLDER)).await.unwrap();
    let quote = resolution.quote().unwrap();

    assert_eq!(quote.rate, Some(ClaimRate::new(1050)));
    assert_eq!(
        quote.entitlement.as_ref().map(|e| e.raw().clone()),
        Some(BigUint::from(26_250u32))
    );
    assert_eq!(quote.entitlement.as_ref().map(|e| e.decimals()), Some(18));
    assert!(quote.has_available_claim());
    assert_eq!(quote.required_allowance(), Some(BigUint::from(25_000_000u32)));
}

#[tokio::test]
async fn entitlement_basis_requires_backing_legacy_amount() {
    let mut reader = MockReader::new();
    expect_balance(&mut reader, 2_500_000, 1);
    expect_rate(&mut reader, 1200, 1);

    let resolver = resolver(reader, AllowanceBasis::Entitlement);
    let quote = resolver.resolve(1, &Account(HOLDER)).await.unwrap().quote().cloned().unwrap();

    // 2400 successor units, backed by two whole rebase steps of legacy units
    assert_eq!(
        quote.entitlement.as_ref().map(|e| e.raw().clone()),
        Some(BigUint::from(2_400u32))
    );
    assert_eq!(quote.required_allowance(), Some(BigUint::from(2_000_000u32)));
}

#[tokio::test]
async fn large_balance_entitlement_basis_stays_in_legacy_units() {
    let mut reader = MockReader::new();
    let balance = U256::from(10u64).pow(U256::from(24u64));
    reader
        .expect_read_contract()
        .with(
            eq(LEGACY),
            eq(ContractCall::BalanceOf { owner: HOLDER }),
            eq(ReadMode::Live),
        )
        .times(1)
        .returning(move |_, _, _| Ok(balance));
    expect_rate(&mut reader, 1000, 1);

    let resolver = resolver(reader, AllowanceBasis::Entitlement);
    let quote = resolver.resolve(1, &Account(HOLDER)).await.unwrap().quote().cloned().unwrap();

    let legacy = BigUint::from(10u32).pow(24);
    assert_eq!(quote.required_allowance(), Some(legacy));
}

#[tokio::test]
async fn unknown_chain_is_unavailable_without_reads() {
    let reader = MockReader::new();
    let resolver = resolver(reader, AllowanceBasis::LegacyBalance);

    let resolution = resolver.resolve(137, &Account(HOLDER)).await.unwrap();
    assert_eq!(resolution, Resolution::Unavailable { chain_id: 137 });
    assert!(!resolution.has_available_claim());
}

#[tokio::test]
async fn balance_below_divisor_has_nothing_to_claim() {
    let mut reader = MockReader::new();
    expect_balance(&mut reader, 999_999, 1);
    expect_rate(&mut reader, 1000, 1);

    let resolver = resolver(reader, AllowanceBasis::LegacyBalance);
    let quote = resolver
        .resolve(1, &Account(HOLDER))
        .await
        .unwrap()
        .quote()
        .cloned()
        .unwrap();

    assert!(!quote.has_available_claim());
    assert!(quote.no_claim_available());
}

#[tokio::test]
async fn failed_rate_read_leaves_entitlement_unknown() {
    let mut reader = MockReader::new();
    expect_balance(&mut reader, 5_000_000, 1);
    let mut attempts = 0;
    reader
        .expect_read_contract()
        .with(eq(CLAIM), eq(ContractCall::GetClaimRate), eq(ReadMode::NeverReload))
        .times(2)
        .returning(move |_, _, _| {
            attempts += 1;
            if attempts == 1 {
                Err(anyhow!("execution reverted"))
            } else {
                Ok(U256::from(1000u64))
            }
        });

    let resolver = resolver(reader, AllowanceBasis::LegacyBalance);

    let quote = resolver.resolve(1, &Account(HOLDER)).await.unwrap().quote().cloned().unwrap();
    assert_eq!(quote.rate, None);
    assert_eq!(quote.entitlement, None);
    assert!(!quote.has_available_claim());
    assert!(!quote.no_claim_available());

    // Retried on the next resolve
    let quote = resolver.resolve(1, &Account(HOLDER)).await.unwrap().quote().cloned().unwrap();
    assert_eq!(quote.rate, Some(ClaimRate::PARITY));
    assert_eq!(
        quote.entitlement.map(|e| e.raw().clone()),
        Some(BigUint::from(5_000u32))
    );
}

#[tokio::test]
async fn balance_is_cached_until_refetched() {
    let mut reader = MockReader::new();
    expect_balance(&mut reader, 1_000_000, 2);
    expect_rate(&mut reader, 1000, 1);

    let resolver = resolver(reader, AllowanceBasis::LegacyBalance);
    let account = Account(HOLDER);
    resolver.resolve(1, &account).await.unwrap();
    resolver.resolve(1, &account).await.unwrap();

    let deployment = deployment(AllowanceBasis::LegacyBalance);
    let balance = resolver.refetch_balance(&deployment, &account).await.unwrap();
    assert_eq!(balance, BigUint::from(1_000_000u32));
}

#[tokio::test]
async fn balance_read_failure_is_a_chain_error() {
    let mut reader = MockReader::new();
    reader
        .expect_read_contract()
        .returning(|_, _, _| Err(anyhow!("connection refused")));

    let resolver = resolver(reader, AllowanceBasis::LegacyBalance);
    let err = resolver.resolve(1, &Account(HOLDER)).await.unwrap_err();
    assert!(matches!(err, ClaimError::ChainRead(detail) if detail.contains("connection refused")));
}

#[tokio::test]
async fn allowance_is_never_cached() {
    let mut reader = MockReader::new();
    reader
        .expect_read_contract()
        .with(
            eq(LEGACY),
            eq(ContractCall::Allowance {
                owner: HOLDER,
                spender: CLAIM,
            }),
            eq(ReadMode::Live),
        )
        .times(2)
        .returning(|_, _, _| Ok(U256::from(7u64)));

    let resolver = resolver(reader, AllowanceBasis::LegacyBalance);
    let deployment = deployment(AllowanceBasis::LegacyBalance);
    let account = Account(HOLDER);

    assert_eq!(resolver.allowance(&deployment, &account).await.unwrap(), BigUint::from(7u32));
    assert_eq!(resolver.allowance(&deployment, &account).await.unwrap(), BigUint::from(7u32));
}

#[tokio::test]
async fn out_of_range_rate_is_ignored() {
    let mut reader = MockReader::new();
    expect_balance(&mut reader, 1_000_000, 1);
    reader
        .expect_read_contract()
        .with(eq(CLAIM), eq(ContractCall::GetClaimRate), eq(ReadMode::NeverReload))
        .times(1)
        .returning(|_, _, _| Ok(U256::MAX));

    let resolver = resolver(reader, AllowanceBasis::LegacyBalance);
    let quote = resolver.resolve(1, &Account(HOLDER)).await.unwrap().quote().cloned().unwrap();
    assert_eq!(quote.rate, None);
}
