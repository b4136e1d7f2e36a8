use payledger::application::ledger::LedgerService;
use payledger::domain::account::AccountId;
use payledger::domain::money::{Currency, Money};
use payledger::domain::ports::{LedgerStore, LedgerStoreBox, UnitOfWork};
use payledger::error::LedgerError;
use payledger::infrastructure::in_memory::InMemoryLedgerStore;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

const ACCOUNTS: usize = 8;
const START_BALANCE: i64 = 1_000;

fn usd() -> Currency {
    Currency::new("USD")
}

fn account(i: usize) -> AccountId {
    AccountId::new(format!("acc-{}", i))
}

async fn ledger_with_accounts(store: LedgerStoreBox) -> Arc<LedgerService> {
    let ledger = Arc::new(LedgerService::new(store));
    for i in 0..ACCOUNTS {
        ledger
            .create_account(account(i), Money::from(START_BALANCE), usd())
            .await
            .unwrap();
    }
    ledger
}

async fn balance(ledger: &LedgerService, id: &AccountId) -> Money {
    ledger.get_account(id).await.unwrap().balance
}

async fn total(ledger: &LedgerService) -> Money {
    let mut sum = Money::ZERO;
    for id in ledger.get_accounts(&usd()).await.unwrap() {
        sum = sum.checked_add(balance(ledger, &id).await).unwrap();
    }
    sum
}

async fn run_opposing_transfers(store: LedgerStoreBox) {
    let ledger = ledger_with_accounts(store).await;
    let a = account(0);
    let b = account(1);

    let mut handles = Vec::new();
    for i in 0..200 {
        let ledger = ledger.clone();
        let (from, to) = if i % 2 == 0 {
            (a.clone(), b.clone())
        } else {
            (b.clone(), a.clone())
        };
        handles.push(tokio::spawn(async move {
            ledger.transfer(&from, &to, Money::from(1), &usd()).await
        }));
    }

    let all = async {
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
    };
    timeout(Duration::from_secs(20), all)
        .await
        .expect("mirror transfers deadlocked");

    assert_eq!(balance(&ledger, &a).await, Money::from(START_BALANCE));
    assert_eq!(balance(&ledger, &b).await, Money::from(START_BALANCE));
    assert_eq!(ledger.get_payments(&a).await.unwrap().len(), 200);
}

async fn run_random_transfers(store: LedgerStoreBox) {
    let ledger = ledger_with_accounts(store).await;
    let expected = total(&ledger).await;

    let mut rng = rand::thread_rng();
    let mut handles = Vec::new();
    for _ in 0..500 {
        let from = rng.gen_range(0..ACCOUNTS);
        let mut to = rng.gen_range(0..ACCOUNTS);
        if to == from {
            to = (to + 1) % ACCOUNTS;
        }
        let amount: i64 = rng.gen_range(1..=400);
        let ledger = ledger.clone();
        handles.push(tokio::spawn(async move {
            ledger
                .transfer(&account(from), &account(to), Money::from(amount), &usd())
                .await
        }));
    }

    let mut committed = 0;
    let all = async {
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => committed += 1,
                Err(LedgerError::InsufficientFunds) => {}
                Err(e) => panic!("unexpected transfer error: {}", e),
            }
        }
    };
    timeout(Duration::from_secs(20), all)
        .await
        .expect("random transfers deadlocked");

    assert_eq!(total(&ledger).await, expected);
    for id in ledger.get_accounts(&usd()).await.unwrap() {
        assert!(!balance(&ledger, &id).await.is_negative());
    }

    let mut recorded = 0;
    for i in 0..ACCOUNTS {
        recorded += ledger
            .get_payments(&account(i))
            .await
            .unwrap()
            .iter()
            .filter(|entry| entry.outgoing)
            .count();
    }
    assert_eq!(recorded, committed);
}

async fn run_cancelled_transfer<S>(store: S)
where
    S: LedgerStore + Clone + 'static,
{
    let ledger = ledger_with_accounts(Box::new(store.clone())).await;
    let from = account(0);
    let to = account(1);

    // Another unit of work holds the receiver, so the transfer parks on its lock.
    let mut blocker = store.begin().await.unwrap();
    blocker.lock_account(&to).await.unwrap();

    let attempt = timeout(
        Duration::from_millis(50),
        ledger.transfer(&from, &to, Money::from(10), &usd()),
    )
    .await;
    assert!(attempt.is_err());
    drop(blocker);

    assert_eq!(balance(&ledger, &from).await, Money::from(START_BALANCE));
    assert!(ledger.get_payments(&from).await.unwrap().is_empty());

    // The sender's row lock was released with the cancelled transfer.
    ledger
        .transfer(&from, &to, Money::from(10), &usd())
        .await
        .unwrap();
    assert_eq!(balance(&ledger, &to).await, Money::from(START_BALANCE + 10));
}

async fn run_rejected_transfers_roll_back(store: LedgerStoreBox) {
    let ledger = ledger_with_accounts(store).await;
    ledger
        .create_account(AccountId::from("ivan"), Money::from(START_BALANCE), Currency::new("RUB"))
        .await
        .unwrap();
    let from = account(0);
    let to = account(1);

    let rejected = [
        (to.clone(), Money::from(START_BALANCE + 1), usd()),
        (AccountId::from("ivan"), Money::from(1), usd()),
        (to.clone(), Money::from(1), Currency::new("EUR")),
        (AccountId::from("nobody"), Money::from(1), usd()),
    ];
    for (target, amount, currency) in rejected {
        assert!(ledger.transfer(&from, &target, amount, &currency).await.is_err());
    }

    assert_eq!(balance(&ledger, &from).await, Money::from(START_BALANCE));
    assert_eq!(balance(&ledger, &to).await, Money::from(START_BALANCE));
    assert!(ledger.get_payments(&from).await.unwrap().is_empty());

    // Every rejection released its row locks.
    let id = timeout(
        Duration::from_secs(1),
        ledger.transfer(&from, &to, Money::from(START_BALANCE), &usd()),
    )
    .await
    .expect("rows left locked after a rejected transfer")
    .unwrap();
    let payments = ledger.get_payments(&to).await.unwrap();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].payment.id, id);
    assert_eq!(balance(&ledger, &from).await, Money::ZERO);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_opposing_transfers_do_not_deadlock() {
    run_opposing_transfers(Box::new(InMemoryLedgerStore::new())).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_random_transfers_conserve_total() {
    run_random_transfers(Box::new(InMemoryLedgerStore::new())).await;
}

#[tokio::test]
async fn test_cancelled_transfer_leaves_no_trace() {
    run_cancelled_transfer(InMemoryLedgerStore::new()).await;
}

#[tokio::test]
async fn test_rejected_transfers_roll_back() {
    run_rejected_transfers_roll_back(Box::new(InMemoryLedgerStore::new())).await;
}

#[cfg(feature = "storage-rocksdb")]
mod rocksdb {
    use super::*;
    use payledger::infrastructure::rocksdb::RocksDBStore;
    use tempfile::tempdir;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_rocksdb_opposing_transfers_do_not_deadlock() {
        let dir = tempdir().unwrap();
        run_opposing_transfers(Box::new(RocksDBStore::open(dir.path()).unwrap())).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_rocksdb_random_transfers_conserve_total() {
        let dir = tempdir().unwrap();
        run_random_transfers(Box::new(RocksDBStore::open(dir.path()).unwrap())).await;
    }

    #[tokio::test]
    async fn test_rocksdb_cancelled_transfer_leaves_no_trace() {
        let dir = tempdir().unwrap();
        run_cancelled_transfer(RocksDBStore::open(dir.path()).unwrap()).await;
    }

    #[tokio::test]
    async fn test_rocksdb_rejected_transfers_roll_back() {
        let dir = tempdir().unwrap();
        run_rejected_transfers_roll_back(Box::new(RocksDBStore::open(dir.path()).unwrap()))
            .await;
    }
}
