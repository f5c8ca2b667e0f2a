//! Account registry integration tests.

mod common;

use common::{date, ledger, ledger_with_chart, post_transfer};
use ledger_core::models::{AccountType, CreateAccount, EntrySource};
use ledger_core::LedgerError;
use rust_decimal_macros::dec;

#[tokio::test]
async fn create_account_success() {
    let ledger = ledger();

    let account = ledger
        .registry()
        .create_account(CreateAccount::new("1000", "Bank", AccountType::Asset))
        .await
        .expect("Failed to create account");

    assert_eq!(account.code, "1000");
    assert_eq!(account.name, "Bank");
    assert_eq!(account.account_type, AccountType::Asset);
    assert!(account.is_active);
    assert!(account.parent_code.is_none());
    assert!(!account.is_sub_account());
}

#[tokio::test]
async fn reject_duplicate_code() {
    let ledger = ledger();

    ledger
        .registry()
        .create_account(CreateAccount::new("1000", "Bank", AccountType::Asset))
        .await
        .expect("Failed to create account");

    let result = ledger
        .registry()
        .create_account(CreateAccount::new("1000", "Second Bank", AccountType::Asset))
        .await;

    assert!(matches!(result, Err(LedgerError::DuplicateCode(code)) if code == "1000"));
}

#[tokio::test]
async fn reject_missing_parent() {
    let ledger = ledger();

    let result = ledger
        .registry()
        .create_account(
            CreateAccount::new("1100-S1", "Receivable - S1", AccountType::Asset)
                .with_parent("1100"),
        )
        .await;

    assert!(matches!(result, Err(LedgerError::InvalidParent(_))));
}

#[tokio::test]
async fn reject_parent_type_mismatch() {
    let ledger = ledger();

    ledger
        .registry()
        .create_account(CreateAccount::new(
            "2000",
            "Accounts Payable",
            AccountType::Liability,
        ))
        .await
        .expect("Failed to create account");

    let result = ledger
        .registry()
        .create_account(
            CreateAccount::new("2000-V1", "Payable - V1", AccountType::Asset).with_parent("2000"),
        )
        .await;

    assert!(matches!(result, Err(LedgerError::InvalidParent(_))));
}

#[tokio::test]
async fn reject_inactive_parent() {
    let ledger = ledger_with_chart().await;

    ledger
        .registry()
        .deactivate_account("1100")
        .await
        .expect("Failed to deactivate");

    let result = ledger
        .registry()
        .create_account(
            CreateAccount::new("1100-S1", "Receivable - S1", AccountType::Asset)
                .with_parent("1100"),
        )
        .await;

    assert!(matches!(result, Err(LedgerError::InvalidParent(_))));
}

#[tokio::test]
async fn scoped_account_is_idempotent() {
    let ledger = ledger_with_chart().await;

    let first = ledger
        .registry()
        .get_or_create_scoped_account("1100", "S1", "Receivable - Alice")
        .await
        .expect("Failed to create scoped account");

    assert_eq!(first.code, "1100-S1");
    assert_eq!(first.account_type, AccountType::Asset);
    assert_eq!(first.parent_code.as_deref(), Some("1100"));
    assert!(first.is_sub_account());

    let second = ledger
        .registry()
        .get_or_create_scoped_account("1100", "S1", "Receivable - Someone Else")
        .await
        .expect("Failed to resolve scoped account");

    // Same account, original display name.
    assert_eq!(second.code, "1100-S1");
    assert_eq!(second.name, "Receivable - Alice");
}

#[tokio::test]
async fn scoped_account_requires_base_account() {
    let ledger = ledger();

    let result = ledger
        .registry()
        .get_or_create_scoped_account("1100", "S1", "Receivable - Alice")
        .await;

    assert!(matches!(result, Err(LedgerError::UnknownAccount(code)) if code == "1100"));
}

#[tokio::test]
async fn list_children_returns_sub_accounts() {
    let ledger = ledger_with_chart().await;

    ledger
        .registry()
        .get_or_create_scoped_account("1100", "S1", "Receivable - Alice")
        .await
        .expect("Failed to create scoped account");
    ledger
        .registry()
        .get_or_create_scoped_account("1100", "S2", "Receivable - Bob")
        .await
        .expect("Failed to create scoped account");

    let children = ledger
        .registry()
        .list_children("1100")
        .await
        .expect("Failed to list children");

    assert_eq!(children.len(), 2);
    assert!(children.iter().all(|a| a.parent_code.as_deref() == Some("1100")));
}

#[tokio::test]
async fn remove_account_rejected_when_referenced() {
    let ledger = ledger_with_chart().await;

    post_transfer(
        &ledger,
        date(2026, 1, 15),
        "1000",
        "4001",
        dec!(500),
        EntrySource::Payment,
    )
    .await;

    let result = ledger.registry().remove_account("1000").await;
    assert!(matches!(result, Err(LedgerError::AccountNotEmpty(code)) if code == "1000"));

    // Still resolvable afterwards.
    let account = ledger
        .registry()
        .resolve_account("1000")
        .await
        .expect("Account should still exist");
    assert!(account.is_active);
}

#[tokio::test]
async fn remove_entry_free_account() {
    let ledger = ledger_with_chart().await;

    ledger
        .registry()
        .remove_account("5200")
        .await
        .expect("Failed to remove entry-free account");

    let result = ledger.registry().resolve_account("5200").await;
    assert!(matches!(result, Err(LedgerError::UnknownAccount(_))));
}

#[tokio::test]
async fn deactivated_account_keeps_history() {
    let ledger = ledger_with_chart().await;

    post_transfer(
        &ledger,
        date(2026, 1, 15),
        "1000",
        "4001",
        dec!(500),
        EntrySource::Payment,
    )
    .await;

    ledger
        .registry()
        .deactivate_account("1000")
        .await
        .expect("Failed to deactivate");

    let account = ledger
        .registry()
        .resolve_account("1000")
        .await
        .expect("Failed to resolve");
    assert!(!account.is_active);

    // Historical balance computation still sees the account's entries.
    let balance = ledger
        .balance("1000", ledger_core::ledger::BalanceQuery::default())
        .await
        .expect("Failed to compute balance");
    assert_eq!(balance, dec!(500));
}

#[tokio::test]
async fn bootstrap_chart_is_idempotent() {
    let ledger = ledger_with_chart().await;

    let second = ledger
        .registry()
        .bootstrap_chart()
        .await
        .expect("Failed to re-bootstrap chart");
    assert!(second.is_empty());

    let accounts = ledger
        .registry()
        .list_accounts()
        .await
        .expect("Failed to list accounts");
    assert_eq!(accounts.len(), 11);
}
