//! End-to-end execution tests: raw bytecode, message dispatch, contract
//! creation, and the transaction runner.

use ember_common::{ChainConfig, Common, Hardfork};
use ember_crypto::secret_key_to_address;
use ember_evm::{create_address, BlockEnv, CodeOpts, Evm, EvmOpts, Message, VmError};
use ember_state::{MemoryStateManager, StateManager};
use ember_tx::test_util::install_mock_kzg;
use ember_tx::{LegacyTx, LegacyTxData, Transaction, TypedTransaction};
use ember_types::{Account, Address, Bytes, StorageKey, StorageValue, U256};

fn addr(n: u8) -> Address {
    Address::new([n; 20])
}

fn secret() -> [u8; 32] {
    let mut key = [0u8; 32];
    key[31] = 0x66;
    key
}

fn evm_at(hardfork: Hardfork, state: &MemoryStateManager) -> Evm {
    install_mock_kzg();
    let common = Common::new(ChainConfig::dev(hardfork));
    let block = BlockEnv {
        number: 100,
        timestamp: 1_700_000_000,
        coinbase: addr(0xc0),
        gas_limit: 30_000_000,
        ..BlockEnv::default()
    };
    Evm::new(common, Box::new(state.clone()), block).unwrap()
}

#[tokio::test]
async fn run_code_adds_and_returns() {
    let state = MemoryStateManager::new();
    let mut evm = evm_at(Hardfork::London, &state);

    // PUSH1 2, PUSH1 3, ADD, PUSH1 0, MSTORE, PUSH1 32, PUSH1 0, RETURN
    let code = vec![
        0x60, 0x02, 0x60, 0x03, 0x01, 0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xf3,
    ];
    let exec = evm
        .run_code(CodeOpts {
            code: Bytes::from_vec(code),
            gas_limit: 100_000,
            ..CodeOpts::default()
        })
        .await
        .unwrap();

    assert!(exec.success());
    assert_eq!(
        U256::from_big_endian(exec.return_value.as_slice()),
        U256::from(5)
    );
    // Seven 3-gas opcodes plus one word of memory expansion.
    assert_eq!(exec.execution_gas_used, 24);
}

#[tokio::test]
async fn revert_preserves_return_data_and_gas() {
    let state = MemoryStateManager::new();
    let mut evm = evm_at(Hardfork::London, &state);

    // PUSH1 0x42, PUSH1 0, MSTORE8, PUSH1 1, PUSH1 0, REVERT
    let code = vec![0x60, 0x42, 0x60, 0x00, 0x53, 0x60, 0x01, 0x60, 0x00, 0xfd];
    let exec = evm
        .run_code(CodeOpts {
            code: Bytes::from_vec(code),
            gas_limit: 100_000,
            ..CodeOpts::default()
        })
        .await
        .unwrap();

    assert_eq!(exec.exception, Some(VmError::Revert));
    assert_eq!(exec.return_value.as_slice(), &[0x42]);
    assert!(exec.execution_gas_used < 100_000);
}

#[tokio::test]
async fn invalid_opcode_consumes_everything() {
    let state = MemoryStateManager::new();
    let mut evm = evm_at(Hardfork::London, &state);

    let exec = evm
        .run_code(CodeOpts {
            code: Bytes::from_vec(vec![0xfe]),
            gas_limit: 50_000,
            ..CodeOpts::default()
        })
        .await
        .unwrap();

    assert_eq!(exec.exception, Some(VmError::InvalidOpcode(0xfe)));
    assert_eq!(exec.execution_gas_used, 50_000);
}

#[tokio::test]
async fn push0_is_fork_gated() {
    let state = MemoryStateManager::new();
    let code = vec![0x5f, 0x00];

    let mut shanghai = evm_at(Hardfork::Shanghai, &state);
    let exec = shanghai
        .run_code(CodeOpts {
            code: Bytes::from_vec(code.clone()),
            gas_limit: 10_000,
            ..CodeOpts::default()
        })
        .await
        .unwrap();
    assert!(exec.success());

    let mut berlin = evm_at(Hardfork::Berlin, &state);
    let exec = berlin
        .run_code(CodeOpts {
            code: Bytes::from_vec(code),
            gas_limit: 10_000,
            ..CodeOpts::default()
        })
        .await
        .unwrap();
    assert_eq!(exec.exception, Some(VmError::InvalidOpcode(0x5f)));
}

#[tokio::test]
async fn transient_storage_round_trip() {
    let state = MemoryStateManager::new();
    let mut evm = evm_at(Hardfork::Cancun, &state);

    // TSTORE(0, 7); TLOAD(0); MSTORE(0, v); RETURN 32 bytes
    let code = vec![
        0x60, 0x07, 0x60, 0x00, 0x5d, 0x60, 0x00, 0x5c, 0x60, 0x00, 0x52, 0x60, 0x20, 0x60,
        0x00, 0xf3,
    ];
    let exec = evm
        .run_code(CodeOpts {
            code: Bytes::from_vec(code),
            gas_limit: 100_000,
            ..CodeOpts::default()
        })
        .await
        .unwrap();

    assert!(exec.success());
    assert_eq!(
        U256::from_big_endian(exec.return_value.as_slice()),
        U256::from(7)
    );
}

#[tokio::test]
async fn static_frame_rejects_writes() {
    let state = MemoryStateManager::new();
    state.seed_code(addr(0x11), Bytes::from_vec(vec![0x60, 0x01, 0x60, 0x00, 0x55]));
    let mut evm = evm_at(Hardfork::London, &state);

    let message = Message {
        is_static: true,
        ..Message::call(addr(1), addr(0x11), U256::zero(), Bytes::new(), 100_000)
    };
    let result = evm.run_call(message).await.unwrap();
    assert_eq!(result.exec.exception, Some(VmError::StaticStateChange));
    assert_eq!(result.exec.execution_gas_used, 100_000);
}

#[tokio::test]
async fn sstore_clear_accrues_refund() {
    let state = MemoryStateManager::new();
    let contract = addr(0x22);
    // SSTORE(5, 0); STOP — slot 5 starts at 1.
    state.seed_code(contract, Bytes::from_vec(vec![0x60, 0x00, 0x60, 0x05, 0x55, 0x00]));
    state.seed_storage(
        contract,
        StorageKey::from_u256(U256::from(5)),
        StorageValue::from_u256(U256::one()),
    );
    let mut evm = evm_at(Hardfork::London, &state);

    let result = evm
        .run_call(Message::call(
            addr(1),
            contract,
            U256::zero(),
            Bytes::new(),
            100_000,
        ))
        .await
        .unwrap();

    assert!(result.exec.success());
    assert_eq!(result.exec.gas_refund, 4_800);
    assert_eq!(
        state
            .get_contract_storage(contract, StorageKey::from_u256(U256::from(5)))
            .await
            .unwrap(),
        StorageValue::ZERO
    );
}

#[tokio::test]
async fn create_deploys_code_at_derived_address() {
    let state = MemoryStateManager::new();
    state.seed_account(addr(1), Account::new_eoa(U256::from(1_000_000u64), 0));
    let mut evm = evm_at(Hardfork::London, &state);

    // Initcode: return one zero byte as runtime code.
    let initcode = vec![0x60, 0x00, 0x60, 0x00, 0x53, 0x60, 0x01, 0x60, 0x00, 0xf3];
    let result = evm
        .run_call(Message::create(
            addr(1),
            U256::zero(),
            Bytes::from_vec(initcode),
            200_000,
        ))
        .await
        .unwrap();

    assert!(result.exec.success());
    let expected = create_address(addr(1), 0);
    assert_eq!(result.created_address, Some(expected));
    assert!(result.exec.created_addresses.contains(&expected));

    let deployed = state.get_contract_code(expected).await.unwrap();
    assert_eq!(deployed.as_slice(), &[0x00]);
    // EIP-161: fresh contracts start at nonce 1.
    let account = state.get_account(expected).await.unwrap().unwrap();
    assert_eq!(account.nonce, 1);
}

#[tokio::test]
async fn deployed_ef_prefix_is_fork_dependent() {
    let initcode = vec![0x60, 0xef, 0x60, 0x00, 0x53, 0x60, 0x01, 0x60, 0x00, 0xf3];

    // Pre-London: 0xEF is a legal first byte.
    let state = MemoryStateManager::new();
    state.seed_account(addr(1), Account::new_eoa(U256::from(1_000_000u64), 0));
    let mut berlin = evm_at(Hardfork::Berlin, &state);
    let result = berlin
        .run_call(Message::create(
            addr(1),
            U256::zero(),
            Bytes::from_vec(initcode.clone()),
            200_000,
        ))
        .await
        .unwrap();
    assert!(result.exec.success());

    // London (EIP-3541): rejected.
    let state = MemoryStateManager::new();
    state.seed_account(addr(1), Account::new_eoa(U256::from(1_000_000u64), 0));
    let mut london = evm_at(Hardfork::London, &state);
    let result = london
        .run_call(Message::create(
            addr(1),
            U256::zero(),
            Bytes::from_vec(initcode),
            200_000,
        ))
        .await
        .unwrap();
    assert_eq!(
        result.exec.exception,
        Some(VmError::InvalidBytecodeResult)
    );
}

#[tokio::test]
async fn initcode_size_cap_and_opt_out() {
    let state = MemoryStateManager::new();
    state.seed_account(addr(1), Account::new_eoa(U256::from(10).pow(U256::from(18)), 0));
    let mut evm = evm_at(Hardfork::Shanghai, &state);

    let oversized = vec![0x00; 49_153];
    let result = evm
        .run_call(Message::create(
            addr(1),
            U256::zero(),
            Bytes::from_vec(oversized.clone()),
            10_000_000,
        ))
        .await
        .unwrap();
    assert!(matches!(
        result.exec.exception,
        Some(VmError::InitcodeSizeViolation { .. })
    ));

    // The debug opt-out skips the ceiling but keeps charging word gas.
    let state = MemoryStateManager::new();
    state.seed_account(addr(1), Account::new_eoa(U256::from(10).pow(U256::from(18)), 0));
    let mut lenient = evm_at(Hardfork::Shanghai, &state).with_opts(EvmOpts {
        allow_unlimited_init_code: true,
        ..EvmOpts::default()
    });
    let result = lenient
        .run_call(Message::create(
            addr(1),
            U256::zero(),
            Bytes::from_vec(oversized),
            10_000_000,
        ))
        .await
        .unwrap();
    assert!(result.exec.success());
}

#[tokio::test]
async fn selfdestruct_honors_eip_6780() {
    // Pre-existing contract: SELFDESTRUCT sends balance to 0x33.
    let mut code = vec![0x73];
    code.extend_from_slice(addr(0x33).as_bytes());
    code.push(0xff);

    // London: marked and (after a tx) deleted.
    let state = MemoryStateManager::new();
    let contract = addr(0x44);
    state.seed_account(contract, Account::new_eoa(U256::from(500u64), 0));
    state.seed_code(contract, Bytes::from_vec(code.clone()));
    let mut evm = evm_at(Hardfork::London, &state);
    let result = evm
        .run_call(Message::call(
            addr(1),
            contract,
            U256::zero(),
            Bytes::new(),
            100_000,
        ))
        .await
        .unwrap();
    assert!(result.exec.success());
    assert!(result.exec.selfdestruct_set.contains(&contract));
    assert_eq!(
        state.get_account(addr(0x33)).await.unwrap().unwrap().balance,
        U256::from(500u64)
    );

    // Cancun: the contract was not created this tx, so it only pays out.
    let state = MemoryStateManager::new();
    state.seed_code(contract, Bytes::from_vec(code));
    let mut evm = evm_at(Hardfork::Cancun, &state);
    let result = evm
        .run_call(Message::call(
            addr(1),
            contract,
            U256::zero(),
            Bytes::new(),
            100_000,
        ))
        .await
        .unwrap();
    assert!(result.exec.success());
    assert!(result.exec.selfdestruct_set.is_empty());
}

#[tokio::test]
async fn run_tx_settles_fees_and_nonce() {
    let state = MemoryStateManager::new();
    let sender = secret_key_to_address(&secret()).unwrap();
    state.seed_account(sender, Account::new_eoa(U256::from(10).pow(U256::from(18)), 0));

    let mut evm = evm_at(Hardfork::Berlin, &state);
    let common = Common::new(ChainConfig::dev(Hardfork::Berlin));

    let gas_price = U256::from(1_000_000_000u64);
    let tx = TypedTransaction::Legacy(
        LegacyTx::new(
            LegacyTxData {
                nonce: 0,
                gas_price,
                gas_limit: 30_000,
                to: Some(addr(0x55)),
                value: U256::from(12_345u64),
                data: Bytes::new(),
                signature: None,
            },
            &common,
        )
        .unwrap(),
    )
    .sign(&secret())
    .unwrap();

    let result = evm.run_tx(&tx).await.unwrap();

    assert!(result.exec.success());
    assert_eq!(result.total_gas_spent, 21_000);
    assert_eq!(result.amount_spent, gas_price * U256::from(21_000u64));
    assert!(result.receipt.succeeded());
    assert_eq!(result.receipt.cumulative_gas_used, 21_000);

    let sender_account = state.get_account(sender).await.unwrap().unwrap();
    assert_eq!(sender_account.nonce, 1);
    assert_eq!(
        sender_account.balance,
        U256::from(10).pow(U256::from(18)) - U256::from(12_345u64) - result.amount_spent
    );
    assert_eq!(
        state.get_account(addr(0x55)).await.unwrap().unwrap().balance,
        U256::from(12_345u64)
    );
    // Pre-1559 the whole fee is the miner tip.
    assert_eq!(
        state.get_account(addr(0xc0)).await.unwrap().unwrap().balance,
        result.amount_spent
    );
}

#[tokio::test]
async fn run_tx_rejects_bad_nonce_and_poverty() {
    let state = MemoryStateManager::new();
    let sender = secret_key_to_address(&secret()).unwrap();
    state.seed_account(sender, Account::new_eoa(U256::from(1_000u64), 5));

    let mut evm = evm_at(Hardfork::Berlin, &state);
    let common = Common::new(ChainConfig::dev(Hardfork::Berlin));

    let tx = TypedTransaction::Legacy(
        LegacyTx::new(
            LegacyTxData {
                nonce: 0,
                gas_price: U256::from(1u64),
                gas_limit: 21_000,
                to: Some(addr(2)),
                ..LegacyTxData::default()
            },
            &common,
        )
        .unwrap(),
    )
    .sign(&secret())
    .unwrap();
    assert!(matches!(
        evm.run_tx(&tx).await.unwrap_err(),
        VmError::NonceMismatch { tx: 0, account: 5 }
    ));

    let tx = TypedTransaction::Legacy(
        LegacyTx::new(
            LegacyTxData {
                nonce: 5,
                gas_price: U256::from(1_000_000u64),
                gas_limit: 21_000,
                to: Some(addr(2)),
                ..LegacyTxData::default()
            },
            &common,
        )
        .unwrap(),
    )
    .sign(&secret())
    .unwrap();
    assert!(matches!(
        evm.run_tx(&tx).await.unwrap_err(),
        VmError::InsufficientBalance { .. }
    ));
}

#[tokio::test]
async fn inner_call_transfers_value() {
    // Contract A calls B with value 7; B's code is a bare STOP.
    let state = MemoryStateManager::new();
    let contract_b = addr(0xbb);
    state.seed_code(contract_b, Bytes::from_vec(vec![0x00]));

    // CALL arguments are popped gas-first, so push outLen..gas in reverse.
    let mut code_a = Vec::new();
    code_a.extend_from_slice(&[0x60, 0x00, 0x60, 0x00]); // outLen, outOff
    code_a.extend_from_slice(&[0x60, 0x00, 0x60, 0x00]); // inLen, inOff
    code_a.extend_from_slice(&[0x60, 0x07]); // value
    code_a.push(0x73); // PUSH20 to
    code_a.extend_from_slice(contract_b.as_bytes());
    code_a.extend_from_slice(&[0x61, 0xff, 0xff]); // PUSH2 gas
    code_a.extend_from_slice(&[0xf1, 0x00]); // CALL, STOP

    let contract_a = addr(0xaa);
    state.seed_account(contract_a, Account::new_eoa(U256::from(100u64), 0));
    state.seed_code(contract_a, Bytes::from_vec(code_a));

    let mut evm = evm_at(Hardfork::Berlin, &state);
    let result = evm
        .run_call(Message::call(
            addr(1),
            contract_a,
            U256::zero(),
            Bytes::new(),
            200_000,
        ))
        .await
        .unwrap();

    assert!(result.exec.success());
    assert_eq!(
        state.get_account(contract_b).await.unwrap().unwrap().balance,
        U256::from(7u64)
    );
    assert_eq!(
        state.get_account(contract_a).await.unwrap().unwrap().balance,
        U256::from(93u64)
    );
}
