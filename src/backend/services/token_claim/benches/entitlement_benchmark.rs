use alloy_primitives::{Address, U256};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use num_bigint::BigUint;
use std::sync::Arc;
use std::time::Duration;

use token_claim::{
    models::{
        rate::{entitlement, ClaimRate},
        token::{AllowanceBasis, Deployment, DeploymentRegistry, TokenAmount, TokenRef},
    },
    repositories::memory::InMemoryChain,
    services::rate_resolver::RateResolver,
    Account,
};

const LEGACY: Address = Address::repeat_byte(0x11);
const SUCCESSOR: Address = Address::repeat_byte(0x22);
const CLAIM: Address = Address::repeat_byte(0x33);
const HOLDER: Address = Address::repeat_byte(0x44);

fn deployment() -> Deployment {
    let token = |address, symbol: &str| TokenRef {
        chain_id: 1,
        address,
        decimals: 9,
        symbol: symbol.to_string(),
    };
    Deployment {
        chain_id: 1,
        legacy: token(LEGACY, "MISHKA"),
        successor: token(SUCCESSOR, "MISHKA2"),
        claim_contract: CLAIM,
        approval_required: true,
        allowance_basis: AllowanceBasis::LegacyBalance,
    }
}

fn benchmark_entitlement(c: &mut Criterion) {
    let mut group = c.benchmark_group("entitlement");

    for digits in [7u32, 18, 30].iter() {
        let balance = BigUint::from(10u32).pow(*digits) + BigUint::from(123_456u32);
        group.bench_with_input(BenchmarkId::from_parameter(digits), &balance, |b, balance| {
            b.iter(|| entitlement(black_box(balance), black_box(ClaimRate::new(1050))))
        });
    }

    group.finish();
}

fn benchmark_formatting(c: &mut Criterion) {
    let amount = TokenAmount::new(BigUint::from(123_456_789_012_345_678_901u128), 9);
    c.bench_function("format_token_amount", |b| b.iter(|| black_box(&amount).to_string()));
}

fn benchmark_cached_resolve(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let chain = Arc::new(InMemoryChain::new());
    rt.block_on(async {
        chain
            .deploy_claim_contract(CLAIM, LEGACY, SUCCESSOR, U256::from(1050u64), true)
            .await;
        chain
            .set_balance(LEGACY, HOLDER, U256::from(42_000_000_000u64))
            .await;
    });

    let resolver = RateResolver::new(chain, Arc::new(DeploymentRegistry::new(vec![deployment()])));
    let account = Account(HOLDER);
    // Warm both caches
    rt.block_on(resolver.resolve(1, &account)).unwrap();

    let mut group = c.benchmark_group("resolve");
    group.measurement_time(Duration::from_secs(5));
    group.bench_function("cached", |b| {
        b.iter(|| rt.block_on(resolver.resolve(1, black_box(&account))).unwrap())
    });
    group.finish();
}

criterion_group! {
    name = benches;
    config = Criterion::default().sample_size(50);
    targets = benchmark_entitlement, benchmark_formatting, benchmark_cached_resolve
}
criterion_main!(benches);
