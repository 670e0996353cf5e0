//! Behavior shared by every `Store` backend, run against each in its tests.

use std::thread::sleep;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use renewal_core::{
    Account, AccountId, BillingSettings, Notification, NotificationKind, PaymentDetails,
    Transaction,
};

use crate::{Store, StoreError};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn account_lifecycle(store: &dyn Store) {
    let account = Account::new("alice", date(2025, 3, 1)).with_messaging_address("1001");
    store.insert_account(&account, None).unwrap();

    let duplicate = store.insert_account(&account, None);
    assert!(matches!(duplicate, Err(StoreError::AlreadyExists { .. })));

    let stored = store.get_account(&account.id).unwrap().unwrap();
    assert_eq!(stored, account);
    assert_eq!(store.list_accounts().unwrap().len(), 1);
    assert!(store.get_account(&AccountId::generate()).unwrap().is_none());

    let by_address = store.find_account_by_address("1001").unwrap().unwrap();
    assert_eq!(by_address.id, account.id);
    assert!(store.find_account_by_address("9999").unwrap().is_none());
}

pub fn due_date_index_follows_commits(store: &dyn Store) {
    let mut account = Account::new("bob", date(2025, 3, 1));
    account.balance_cents = 10_000;
    store.insert_account(&account, None).unwrap();
    let other = Account::new("carol", date(2025, 3, 2));
    store.insert_account(&other, None).unwrap();

    let due = store.list_accounts_due_on(date(2025, 3, 1)).unwrap();
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].id, account.id);

    account.next_billing_date = date(2025, 4, 1);
    store.commit_account(&account, None).unwrap();

    assert!(store.list_accounts_due_on(date(2025, 3, 1)).unwrap().is_empty());
    let moved = store.list_accounts_due_on(date(2025, 4, 1)).unwrap();
    assert_eq!(moved.len(), 1);
    assert_eq!(moved[0].version, 1);
}

pub fn optimistic_version_check(store: &dyn Store) {
    let account = Account::new("dave", date(2025, 3, 1));
    store.insert_account(&account, None).unwrap();

    let mut first = store.get_account(&account.id).unwrap().unwrap();
    let mut second = first.clone();

    first.balance_cents = 500;
    let tx = Transaction::deposit(first.id, 500, 500, "cash".into());
    let committed = store.commit_account(&first, Some(&tx)).unwrap();
    assert_eq!(committed.version, 1);

    second.balance_cents = -100;
    let err = store.commit_account(&second, None).unwrap_err();
    assert!(matches!(
        err,
        StoreError::VersionConflict {
            expected: 0,
            found: 1,
            ..
        }
    ));

    let stored = store.get_account(&account.id).unwrap().unwrap();
    assert_eq!(stored.balance_cents, 500);
    assert_eq!(store.get_transaction(&tx.id).unwrap().unwrap(), tx);

    let missing = Account::new("ghost", date(2025, 3, 1));
    assert!(matches!(
        store.commit_account(&missing, None),
        Err(StoreError::NotFound { .. })
    ));
}

pub fn address_uniqueness(store: &dyn Store) {
    let linked = Account::new("erin", date(2025, 3, 1)).with_messaging_address("2002");
    store.insert_account(&linked, None).unwrap();

    let clash = Account::new("frank", date(2025, 3, 1)).with_messaging_address("2002");
    assert!(matches!(
        store.insert_account(&clash, None),
        Err(StoreError::AddressInUse { .. })
    ));

    let mut ghost = Account::new("gina", date(2025, 3, 1));
    store.insert_account(&ghost, None).unwrap();
    ghost.messaging_address = Some("2002".into());
    assert!(matches!(
        store.commit_account(&ghost, None),
        Err(StoreError::AddressInUse { .. })
    ));

    ghost.messaging_address = Some("3003".into());
    let linked_ghost = store.commit_account(&ghost, None).unwrap();
    assert_eq!(
        store.find_account_by_address("3003").unwrap().unwrap().id,
        linked_ghost.id
    );
}

pub fn transaction_history_newest_first(store: &dyn Store) {
    let account = Account::new("hank", date(2025, 3, 1));
    store.insert_account(&account, None).unwrap();
    let other = Account::new("ivy", date(2025, 3, 1));
    store.insert_account(&other, None).unwrap();

    let mut current = account.clone();
    for (i, amount) in [1_000_i64, 2_000, 3_000].into_iter().enumerate() {
        current.balance_cents += amount;
        let tx = Transaction::deposit(current.id, amount, current.balance_cents, format!("d{i}"));
        current = store.commit_account(&current, Some(&tx)).unwrap();
        sleep(Duration::from_millis(2));
    }
    let foreign = Transaction::deposit(other.id, 1, 1, "other".into());
    store.commit_account(&other, Some(&foreign)).unwrap();

    let all = store.list_transactions_by_account(&account.id, 10, 0).unwrap();
    let memos: Vec<&str> = all.iter().map(|t| t.memo.as_str()).collect();
    assert_eq!(memos, ["d2", "d1", "d0"]);

    let page = store.list_transactions_by_account(&account.id, 1, 1).unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].memo, "d1");
}

pub fn insert_with_opening_entry(store: &dyn Store) {
    let mut account = Account::new("kim", date(2025, 3, 1));
    account.balance_cents = 2_500;
    let opening = Transaction::deposit(account.id, 2_500, 2_500, "Opening balance".into());
    store.insert_account(&account, Some(&opening)).unwrap();

    let stored = store.get_account(&account.id).unwrap().unwrap();
    assert_eq!(stored.balance_cents, 2_500);
    assert_eq!(stored.version, 0);
    let history = store.list_transactions_by_account(&account.id, 10, 0).unwrap();
    assert_eq!(history, vec![opening.clone()]);

    // A rejected insert leaves no orphan ledger entry behind.
    let clash = Account::new("lee", date(2025, 3, 1)).with_messaging_address("2002");
    store.insert_account(&clash, None).unwrap();
    let mut taken = Account::new("lou", date(2025, 3, 1)).with_messaging_address("2002");
    taken.balance_cents = 100;
    let orphan = Transaction::deposit(taken.id, 100, 100, "Opening balance".into());
    assert!(matches!(
        store.insert_account(&taken, Some(&orphan)),
        Err(StoreError::AddressInUse { .. })
    ));
    assert!(store.get_account(&taken.id).unwrap().is_none());
    assert!(store.list_transactions_by_account(&taken.id, 10, 0).unwrap().is_empty());
}

pub fn pending_notifications_and_marking(store: &dyn Store) {
    let account = Account::new("jack", date(2025, 3, 1));
    store.insert_account(&account, None).unwrap();

    let first = Notification::for_account(account.id, "one", NotificationKind::AdminMessage);
    sleep(Duration::from_millis(2));
    let second = Notification::for_operator("9000", "two");
    store.insert_notification(&first).unwrap();
    store.insert_notification(&second).unwrap();
    assert!(matches!(
        store.insert_notification(&first),
        Err(StoreError::AlreadyExists { .. })
    ));

    let pending = store.list_pending_notifications(None).unwrap();
    let ids: Vec<_> = pending.iter().map(|n| n.id).collect();
    assert_eq!(ids, [first.id, second.id]);

    let for_account = store.list_pending_notifications(Some(&account.id)).unwrap();
    assert_eq!(for_account.len(), 1);
    assert_eq!(for_account[0].id, first.id);

    assert!(store.mark_notification_sent(&first.id, Utc::now()).unwrap());
    assert!(!store.mark_notification_sent(&first.id, Utc::now()).unwrap());

    let pending = store.list_pending_notifications(None).unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, second.id);
    assert!(store.get_notification(&first.id).unwrap().unwrap().sent);

    let missing = Notification::for_operator("1", "never stored");
    assert!(matches!(
        store.mark_notification_sent(&missing.id, Utc::now()),
        Err(StoreError::NotFound { .. })
    ));
}

pub fn settings_roundtrip(store: &dyn Store) {
    assert!(store.get_settings().unwrap().is_none());

    let mut settings = BillingSettings::new(15_000).unwrap();
    settings.payment_details = PaymentDetails {
        phone: Some("+100".into()),
        account: None,
        qr_code_path: None,
    };
    store.put_settings(&settings).unwrap();
    assert_eq!(store.get_settings().unwrap().unwrap(), settings);

    settings.set_price(20_000).unwrap();
    store.put_settings(&settings).unwrap();
    assert_eq!(
        store.get_settings().unwrap().unwrap().subscription_price_cents,
        20_000
    );
}
